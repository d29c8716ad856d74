//! Configuration types for customizing client and parser behavior.
//!
//! Every component accepts a typed configuration record with enumerated fields and a
//! `Default` implementation tuned for SEC.gov compliance and typical filing sizes. Most
//! users can rely on the defaults; custom configurations are useful for testing, research
//! applications with specific performance requirements, or compliance scenarios.

use std::time::Duration;

/// Configuration settings for the Edgar HTTP client.
///
/// This struct contains all the settings needed to customize how the HTTP layer behaves,
/// including network timeouts, rate limiting, and service endpoints. The default
/// configuration is optimized for general use and SEC.gov compliance.
///
/// The user agent doubles as the SEC-required identity string (`"Name email@domain"`).
/// It is supplied here, at client construction, and nowhere else; no process-global
/// identity exists.
///
/// # Examples
///
/// Using defaults:
/// ```rust
/// # use filingkit::EdgarConfig;
/// let config = EdgarConfig::default();
/// ```
///
/// Custom configuration:
/// ```rust
/// # use filingkit::{EdgarConfig, EdgarUrls};
/// # use std::time::Duration;
/// let config = EdgarConfig::new(
///     "research_app/1.0 contact@university.edu",
///     5,  // More conservative rate
///     Duration::from_secs(45),
///     None,  // Use default URLs
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// User agent string for HTTP requests (required by SEC)
    pub user_agent: String,

    /// Rate limit in requests per second (default: 10)
    pub rate_limit: u32,

    /// HTTP request timeout duration
    pub timeout: Duration,

    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
}

/// Base URLs for the different SEC EDGAR service endpoints.
///
/// The SEC EDGAR system is distributed across multiple domains, each serving
/// different types of content. The archives domain hosts historical filings,
/// the data domain provides structured API access, and the files domain serves
/// various data files. You typically won't need to change these unless you're
/// running tests against a mock server.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Archives base URL (historical filings)
    pub archives: String,

    /// Data API base URL (structured data)
    pub data: String,

    /// Files base URL (company tickers, etc.)
    pub files: String,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: "filingkit/0.1.0".to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls::default(),
        }
    }
}

impl EdgarConfig {
    /// Creates custom Edgar configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use filingkit::{EdgarConfig, EdgarUrls};
    /// use std::time::Duration;
    ///
    /// let config = EdgarConfig::new(
    ///     "MyApp contact@example.com",
    ///     10,
    ///     Duration::from_secs(30),
    ///     None,
    /// );
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<EdgarUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
        }
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
        }
    }
}

/// Configuration for the HTML document parser.
///
/// Controls document size gates, which postprocessing stages run, and the size of the
/// style intern pool. Feature flags exist so that bulk pipelines which only need tables
/// (or only need sections) can skip the work they don't use.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Documents larger than this are parsed via the streaming path (default: 50 MB).
    pub streaming_threshold: usize,

    /// Hard upper bound on document size; larger inputs fail with `DocumentTooLarge`.
    pub max_document_size: usize,

    /// Run section detection after parsing (default: true).
    pub detect_sections: bool,

    /// Extract tables into `TableMatrix` form (default: true).
    pub table_extraction: bool,

    /// Extract inline-XBRL facts from `ix:*` wrappers (default: true).
    pub extract_xbrl: bool,

    /// Run the postprocessing strategies at all (default: true).
    pub postprocess: bool,

    /// Maximum number of distinct CSS styles kept in the intern pool.
    pub style_cache_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            streaming_threshold: 50 * 1024 * 1024,
            max_document_size: 500 * 1024 * 1024,
            detect_sections: true,
            table_extraction: true,
            extract_xbrl: true,
            postprocess: true,
            style_cache_size: 4096,
        }
    }
}

/// Configuration for the concept standardizer.
#[derive(Debug, Clone, Default)]
pub struct StandardizerConfig {
    /// Industry descriptor used to activate industry-specific mapping rules
    /// (case-insensitive substring match, e.g. "Diversified Banks").
    pub industry_hint: Option<String>,

    /// Path to a JSON mapping schema that replaces the built-in schemas.
    pub mapping_schema_path: Option<String>,
}

/// Configuration for the multi-filing stitching engine.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Derive Q4 facts via FY − YTD-9M subtraction (default: true).
    pub derive_q4: bool,

    /// Retroactively adjust per-share and share-count facts for stock splits (default: true).
    pub apply_split_adjustments: bool,

    /// Prefer annual facts over quarterly when both cover a period (default: false).
    pub prefer_annual: bool,

    /// Number of periods to retain in the stitched view.
    pub periods: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            derive_q4: true,
            apply_split_adjustments: true,
            prefer_annual: false,
            periods: 8,
        }
    }
}

/// Configuration for entity facts queries.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Drop facts below this confidence score (0.0 accepts everything).
    pub min_confidence: f64,

    /// Only return facts with HIGH data quality.
    pub high_quality_only: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            high_quality_only: false,
        }
    }
}

/// Configuration for section detection.
#[derive(Debug, Clone)]
pub struct SectionConfig {
    /// Weighted-vote acceptance threshold for header candidates.
    pub header_threshold: f64,

    /// Extract section *content* from cross-reference index page ranges.
    /// Detection always runs; content extraction via page correlation is opt-in
    /// because the page-break heuristics have only been validated against a
    /// handful of filer formats.
    pub crossref_content_extraction: bool,

    /// Maximum chunk size in characters when splitting sections for LLM consumption.
    pub max_chunk_chars: usize,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            header_threshold: 0.6,
            crossref_content_extraction: false,
            max_chunk_chars: 16_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EdgarConfig::default();
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.base_urls.data.contains("data.sec.gov"));
    }

    #[test]
    fn test_parser_config_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.streaming_threshold, 50 * 1024 * 1024);
        assert!(config.detect_sections);
        assert!(config.extract_xbrl);
    }

    #[test]
    fn test_section_config_defaults() {
        let config = SectionConfig::default();
        assert!((config.header_threshold - 0.6).abs() < f64::EPSILON);
        assert!(!config.crossref_content_extraction);
    }
}
