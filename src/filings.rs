//! Per-company filing retrieval: submissions metadata, documents, headers, and
//! XBRL document sets.
//!
//! The submissions endpoint (`/submissions/CIK##########.json`) is the entry point
//! for everything company-scoped. Its wire format is awkward on purpose: recent
//! filings arrive as *parallel arrays* (`accessionNumber[i]` lines up with
//! `form[i]` and `filingDate[i]`), so the first thing this module does is fold
//! them into row-oriented [`DetailedFiling`] records with real dates. From a row,
//! the rest follows: the filing's archive directory, its primary document, its
//! SGML header, or the whole six-file XBRL document set.
//!
//! The XBRL path is the one the analysis pipeline cares about.
//! [`FilingOperations::xbrl_documents`] is the feeder for the stitching engine: it
//! resolves each matching filing's document set by filename convention, parses
//! them, and reports per-filing failures alongside the successes so one corrupt
//! filing cannot sink a multi-year backfill.

use super::core::EdgarClient;
use super::error::{FilingError, Result};
use super::options::{FilingOptions, FilingRecord};
use super::traits::FilingOperations;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use crate::parsing::sgml::SgmlHeader;
use crate::xbrl::{FilingSource, XbrlDocument, XbrlFiles};

/// A company's submissions payload: entity metadata plus recent filing history.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    /// Zero-padded CIK (e.g., "0000320193")
    pub cik: String,

    /// Entity type (e.g., operating, investment)
    #[serde(rename = "entityType")]
    pub entity_type: String,

    /// Standard Industrial Classification code
    pub sic: String,

    /// Human-readable SIC description. Doubles as the industry hint for the
    /// concept standardizer.
    #[serde(rename = "sicDescription")]
    pub sic_description: String,

    /// Conformed company name
    pub name: String,

    /// Exchange tickers (usually 1)
    pub tickers: Vec<String>,

    /// Exchanges for tickers, each corresponding to `tickers`
    pub exchanges: Vec<Option<String>>,

    /// Employer Identification Number
    pub ein: Option<String>,

    /// Business description
    pub description: Option<String>,

    /// Company website
    pub website: Option<String>,

    /// Category (e.g., Large Accelerated Filer)
    pub category: Option<String>,

    /// Fiscal year end (e.g., "0930")
    #[serde(rename = "fiscalYearEnd")]
    pub fiscal_year_end: Option<String>,

    /// State code of incorporation
    #[serde(rename = "stateOfIncorporation")]
    pub state_of_incorporation: String,

    /// Historical names
    #[serde(rename = "formerNames", default)]
    pub former_names: Vec<FormerName>,

    /// Recent filings data
    pub filings: FilingsData,
}

impl Submission {
    /// Fiscal year end as (month, day) from the submissions "MMDD" spelling,
    /// which drives quarterly classification in the XBRL loader.
    pub fn fiscal_year_end_md(&self) -> Option<(u32, u32)> {
        let raw = self.fiscal_year_end.as_deref()?;
        if raw.len() != 4 {
            return None;
        }
        let month: u32 = raw[..2].parse().ok()?;
        let day: u32 = raw[2..].parse().ok()?;
        ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some((month, day))
    }
}

/// A historical company name and the date range it was used.
#[derive(Debug, Clone, Deserialize)]
pub struct FormerName {
    pub name: String,
    pub from: String,
    pub to: String,
}

/// Filing history container in a `Submission` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingsData {
    pub recent: RecentFilings,
    #[serde(default)]
    pub files: Vec<FilingFile>,
}

/// Metadata for an older filing file segment referenced by a `Submission` payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FilingFile {
    pub name: String,

    #[serde(rename = "filingCount")]
    pub filing_count: u64,

    #[serde(rename = "filingFrom")]
    pub filing_from: String,

    #[serde(rename = "filingTo")]
    pub filing_to: String,
}

/// The "recent filings" table in its wire shape: parallel arrays, one slot per
/// filing, optional arrays simply absent for older payloads.
///
/// Use [`RecentFilings::rows`] to fold this into [`DetailedFiling`] records.
#[derive(Debug, Clone, Deserialize)]
pub struct RecentFilings {
    #[serde(rename = "accessionNumber")]
    pub accession_number: Vec<String>,

    #[serde(rename = "filingDate")]
    pub filing_date: Vec<String>,

    #[serde(rename = "reportDate")]
    pub report_date: Option<Vec<String>>,

    #[serde(rename = "acceptanceDateTime")]
    pub acceptance_date_time: Vec<String>,

    pub form: Vec<String>,

    /// 8-K item strings (e.g., "1.01,2.03,5.01")
    pub items: Option<Vec<String>>,

    /// Document sizes in bytes
    pub size: Vec<i64>,

    #[serde(rename = "isXBRL")]
    pub is_xbrl: Option<Vec<i32>>,

    #[serde(rename = "isInlineXBRL")]
    pub is_inline_xbrl: Option<Vec<i32>>,

    #[serde(rename = "primaryDocument")]
    pub primary_document: Option<Vec<String>>,

    #[serde(rename = "primaryDocDescription")]
    pub primary_doc_description: Option<Vec<String>>,
}

impl RecentFilings {
    /// Folds the parallel arrays into rows.
    ///
    /// A slot whose filing date or acceptance timestamp does not parse is dropped
    /// with a warning; the SEC does emit the occasional malformed row and one bad
    /// slot should not hide a company's entire history.
    pub fn rows(&self) -> Vec<DetailedFiling> {
        let text_at = |column: &Option<Vec<String>>, i: usize| -> Option<String> {
            column
                .as_ref()
                .and_then(|v| v.get(i))
                .filter(|s| !s.is_empty())
                .cloned()
        };
        let flag_at = |column: &Option<Vec<i32>>, i: usize| -> bool {
            column
                .as_ref()
                .and_then(|v| v.get(i))
                .is_some_and(|v| *v == 1)
        };

        let mut rows = Vec::with_capacity(self.accession_number.len());
        for i in 0..self.accession_number.len() {
            let filed = self
                .filing_date
                .get(i)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let accepted = self
                .acceptance_date_time
                .get(i)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok());
            let (Some(filing_date), Some(accepted_at), Some(form)) =
                (filed, accepted, self.form.get(i))
            else {
                tracing::warn!(
                    "Dropping submissions row {} with unparseable dates or missing form",
                    i
                );
                continue;
            };

            rows.push(DetailedFiling {
                accession_number: self.accession_number[i].clone(),
                filing_date,
                report_date: text_at(&self.report_date, i)
                    .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                accepted_at,
                form: form.clone(),
                items: text_at(&self.items, i),
                size: self.size.get(i).copied().unwrap_or(0),
                is_xbrl: flag_at(&self.is_xbrl, i),
                is_inline_xbrl: flag_at(&self.is_inline_xbrl, i),
                primary_document: text_at(&self.primary_document, i),
                primary_doc_description: text_at(&self.primary_doc_description, i),
            });
        }
        rows
    }
}

/// One filing, row-oriented and date-typed.
#[derive(Debug, Clone)]
pub struct DetailedFiling {
    /// EDGAR accession number
    pub accession_number: String,

    pub filing_date: NaiveDate,

    /// Period the filing reports on, when stated
    pub report_date: Option<NaiveDate>,

    /// EDGAR acceptance timestamp
    pub accepted_at: DateTime<FixedOffset>,

    /// Form type ("10-K", "8-K", ...)
    pub form: String,

    /// 8-K item string (e.g., "1.01,2.03,5.01")
    pub items: Option<String>,

    /// Primary document size in bytes; feeds the HTML parser's streaming decision
    pub size: i64,

    /// Contains XBRL
    pub is_xbrl: bool,

    /// Contains Inline XBRL
    pub is_inline_xbrl: bool,

    /// Primary document filename
    pub primary_document: Option<String>,

    /// Primary document description
    pub primary_doc_description: Option<String>,
}

impl DetailedFiling {
    /// Whether an XBRL document set can be expected for this filing.
    pub fn has_structured_data(&self) -> bool {
        self.is_xbrl || self.is_inline_xbrl
    }
}

impl FilingRecord for DetailedFiling {
    fn form_type(&self) -> &str {
        &self.form
    }
}

/// Response wrapper for EDGAR `index.json` directory listings.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryResponse {
    pub directory: Directory,
}

/// Directory listing payload for filings and entities.
#[derive(Debug, Clone, Deserialize)]
pub struct Directory {
    pub item: Vec<DirectoryItem>,
    pub name: String,
    #[serde(rename = "parent-dir")]
    pub parent_dir: String,
}

/// A file entry inside a directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryItem {
    #[serde(rename = "last-modified")]
    pub last_modified: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub size: String,
}

impl EdgarClient {
    fn submissions_url(&self, cik: &str) -> String {
        format!("{}/submissions/CIK{:0>10}.json", self.urls.data, cik)
    }

    /// URL of one file inside a filing's archive directory. The directory name is
    /// the accession number with its dashes removed; `file` is anything the
    /// directory listing names, including `index.json` itself.
    fn archive_url(&self, cik: &str, accession: &str, file: &str) -> String {
        format!(
            "{}/data/{}/{}/{}",
            self.urls.archives,
            cik,
            accession.replace('-', ""),
            file
        )
    }

    fn entity_directory_url(&self, cik: &str) -> String {
        format!("{}/data/{:0>10}/index.json", self.urls.archives, cik)
    }

    /// Downloads one member of a filing's document set, if present.
    async fn fetch_optional(
        &self,
        cik: &str,
        accession: &str,
        name: Option<&str>,
    ) -> Result<Option<String>> {
        match name {
            Some(name) => {
                let url = self.archive_url(cik, accession, name);
                self.get(&url).await.map(Some)
            }
            None => Ok(None),
        }
    }
}

/// The filenames of a filing's XBRL document set, classified by suffix convention.
#[derive(Debug, Clone, Default)]
struct XbrlFileNames {
    schema: Option<String>,
    label: Option<String>,
    presentation: Option<String>,
    definition: Option<String>,
    calculation: Option<String>,
    instance: Option<String>,
}

impl XbrlFileNames {
    fn classify(items: &[DirectoryItem]) -> Self {
        let mut names = XbrlFileNames::default();
        for item in items {
            let name = item.name.as_str();
            let lower = name.to_ascii_lowercase();
            if lower.ends_with(".xsd") {
                names.schema = Some(name.to_string());
            } else if lower.ends_with("_lab.xml") {
                names.label = Some(name.to_string());
            } else if lower.ends_with("_pre.xml") {
                names.presentation = Some(name.to_string());
            } else if lower.ends_with("_def.xml") {
                names.definition = Some(name.to_string());
            } else if lower.ends_with("_cal.xml") {
                names.calculation = Some(name.to_string());
            } else if lower.ends_with("_htm.xml") {
                names.instance = Some(name.to_string());
            } else if lower.ends_with(".xml")
                && !lower.contains("filingsummary")
                && names.instance.is_none()
                && !lower.starts_with("r")
            {
                // Older filings name the instance "<ticker>-<date>.xml".
                names.instance = Some(name.to_string());
            }
        }
        names
    }
}

/// Company-scoped filing operations.
///
/// Retrieval is metadata-first: list rows, narrow them with [`FilingOptions`],
/// then download only what survives. Rows come back in the SEC's order, which is
/// newest-first, and the form filter folds amendments into their base form unless
/// told otherwise.
#[async_trait]
impl FilingOperations for EdgarClient {
    /// The raw submissions payload for a CIK: entity metadata plus the recent
    /// filings table. CIK zero-padding is handled here.
    ///
    /// # Errors
    ///
    /// `FilingError::NotFound` for an unknown CIK; JSON errors for a malformed
    /// payload.
    async fn submissions(&self, cik: &str) -> Result<Submission> {
        let body = self.get(&self.submissions_url(cik)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// All recent filings for a CIK as row-oriented records.
    async fn get_recent_filings(&self, cik: &str) -> Result<Vec<DetailedFiling>> {
        Ok(self.submissions(cik).await?.filings.recent.rows())
    }

    /// Recent filings narrowed by `opts` (form types with amendment folding,
    /// offset, limit).
    async fn filings(&self, cik: &str, opts: Option<FilingOptions>) -> Result<Vec<DetailedFiling>> {
        let rows = self.get_recent_filings(cik).await?;
        Ok(opts.unwrap_or_default().apply(rows))
    }

    /// The `index.json` listing of one filing's archive directory: primary
    /// document, exhibits, XBRL artifacts, graphics.
    async fn filing_directory(
        &self,
        cik: &str,
        accession_number: &str,
    ) -> Result<DirectoryResponse> {
        let url = self.archive_url(cik, accession_number, "index.json");
        let body = self.get(&url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// The company-level archive listing under `/Archives/edgar/data/<CIK>/`.
    async fn entity_directory(&self, cik: &str) -> Result<DirectoryResponse> {
        let body = self.get(&self.entity_directory_url(cik)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Builds a document URL from a compact `"<accession>:<filename>"` reference,
    /// the form in which document hits are typically stored and passed around.
    fn get_filing_url_from_id(&self, cik: &str, filing_id: &str) -> Result<String> {
        let (accession, file) = filing_id.split_once(':').ok_or_else(|| {
            FilingError::InvalidFormat(
                "filing id must be '<accession_number>:<filename>'".to_string(),
            )
        })?;
        Ok(self.archive_url(cik, accession, file))
    }

    /// Downloads the document referenced by a compact filing id.
    async fn get_filing_content_by_id(&self, cik: &str, filing_id: &str) -> Result<String> {
        let url = self.get_filing_url_from_id(cik, filing_id)?;
        self.get(&url).await
    }

    /// Downloads the primary document of the newest filing matching any of
    /// `form_types` (amendments included).
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing matches; `InvalidResponse` when the match has no
    /// primary document on record.
    async fn get_latest_filing_content(&self, cik: &str, form_types: &[&str]) -> Result<String> {
        let opts = FilingOptions::new().forms(form_types.iter().copied()).limit(1);
        let rows = self.filings(cik, Some(opts)).await?;
        let filing = rows.first().ok_or(FilingError::NotFound)?;

        let document = filing
            .primary_document
            .as_deref()
            .ok_or_else(|| FilingError::InvalidResponse("No primary document found".to_string()))?;
        self.get(&self.archive_url(cik, &filing.accession_number, document))
            .await
    }

    /// Downloads and parses the SGML submission header for a filing.
    async fn sgml_header(&self, cik: &str, accession_number: &str) -> Result<SgmlHeader> {
        let header_file = format!("{}.hdr.sgml", accession_number);
        let content = self
            .get(&self.archive_url(cik, accession_number, &header_file))
            .await?;
        SgmlHeader::parse(&content)
    }

    /// Downloads a filing's XBRL document set and parses it.
    ///
    /// The archive directory is listed first and its files classified by suffix
    /// convention; missing linkbases degrade inside the XBRL loader, but a filing
    /// with no instance document at all is an error.
    async fn xbrl_document(&self, cik: &str, filing: &DetailedFiling) -> Result<XbrlDocument> {
        let directory = self.filing_directory(cik, &filing.accession_number).await?;
        let names = XbrlFileNames::classify(&directory.directory.item);

        let accession = filing.accession_number.as_str();
        let schema = self
            .fetch_optional(cik, accession, names.schema.as_deref())
            .await?;
        let label = self
            .fetch_optional(cik, accession, names.label.as_deref())
            .await?;
        let presentation = self
            .fetch_optional(cik, accession, names.presentation.as_deref())
            .await?;
        let definition = self
            .fetch_optional(cik, accession, names.definition.as_deref())
            .await?;
        let calculation = self
            .fetch_optional(cik, accession, names.calculation.as_deref())
            .await?;
        let instance = self
            .fetch_optional(cik, accession, names.instance.as_deref())
            .await?;

        let source = FilingSource {
            accession: Some(filing.accession_number.clone()),
            form_type: Some(filing.form.clone()),
            filing_date: Some(filing.filing_date),
            fiscal_year_end: None,
            document_name: names
                .instance
                .clone()
                .unwrap_or_else(|| filing.accession_number.clone()),
        };

        XbrlDocument::parse(
            XbrlFiles {
                schema: schema.as_deref(),
                label: label.as_deref(),
                presentation: presentation.as_deref(),
                definition: definition.as_deref(),
                calculation: calculation.as_deref(),
                instance: instance.as_deref(),
            },
            source,
        )
    }

    /// Downloads and parses XBRL for every filing matching the options.
    ///
    /// Returns `(successes, failures)`; a single bad filing is reported in the
    /// failure list and the batch continues.
    async fn xbrl_documents(
        &self,
        cik: &str,
        opts: Option<FilingOptions>,
    ) -> Result<(Vec<XbrlDocument>, Vec<(String, FilingError)>)> {
        let filings = self.filings(cik, opts).await?;

        let mut documents = Vec::new();
        let mut failures = Vec::new();
        for filing in filings.iter().filter(|f| f.has_structured_data()) {
            match self.xbrl_document(cik, filing).await {
                Ok(document) => documents.push(document),
                Err(error) => {
                    tracing::warn!(
                        "XBRL parse failed for {}: {}",
                        filing.accession_number,
                        error
                    );
                    failures.push((filing.accession_number.clone(), error));
                }
            }
        }

        Ok((documents, failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSION: &str = r#"{
        "cik": "0000320193",
        "entityType": "operating",
        "sic": "3571",
        "sicDescription": "Electronic Computers",
        "name": "Apple Inc.",
        "tickers": ["AAPL"],
        "exchanges": ["Nasdaq"],
        "ein": "942404110",
        "description": "",
        "website": "",
        "category": "Large accelerated filer",
        "fiscalYearEnd": "0930",
        "stateOfIncorporation": "CA",
        "formerNames": [],
        "filings": {
            "recent": {
                "accessionNumber": ["0000320193-23-000106", "0000320193-23-000077"],
                "filingDate": ["2023-11-03", "2023-08-04"],
                "reportDate": ["2023-09-30", "2023-07-01"],
                "acceptanceDateTime": ["2023-11-02T18:08:06.000Z", "2023-08-03T18:04:43.000Z"],
                "form": ["10-K", "10-Q"],
                "items": ["", ""],
                "size": [14327014, 6151862],
                "isXBRL": [1, 1],
                "isInlineXBRL": [1, 1],
                "primaryDocument": ["aapl-20230930.htm", "aapl-20230701.htm"],
                "primaryDocDescription": ["10-K", "10-Q"]
            },
            "files": []
        }
    }"#;

    #[test]
    fn test_rows_from_parallel_arrays() {
        let submission: Submission = serde_json::from_str(SUBMISSION).unwrap();
        assert_eq!(submission.name, "Apple Inc.");
        assert_eq!(submission.fiscal_year_end_md(), Some((9, 30)));

        let rows = submission.filings.recent.rows();
        assert_eq!(rows.len(), 2);

        let annual = &rows[0];
        assert_eq!(annual.form, "10-K");
        assert_eq!(
            annual.filing_date,
            NaiveDate::from_ymd_opt(2023, 11, 3).unwrap()
        );
        assert_eq!(
            annual.report_date,
            NaiveDate::from_ymd_opt(2023, 9, 30)
        );
        assert!(annual.is_inline_xbrl);
        assert!(annual.has_structured_data());
        // Empty items string folds to None
        assert!(annual.items.is_none());
    }

    #[test]
    fn test_rows_skip_malformed_slots() {
        let mut submission: Submission = serde_json::from_str(SUBMISSION).unwrap();
        submission.filings.recent.filing_date[1] = "not-a-date".to_string();
        let rows = submission.filings.recent.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].form, "10-K");
    }

    #[test]
    fn test_filing_filter_over_rows() {
        let submission: Submission = serde_json::from_str(SUBMISSION).unwrap();
        let rows = submission.filings.recent.rows();

        let annuals = FilingOptions::new().form("10-K").apply(rows.clone());
        assert_eq!(annuals.len(), 1);

        let paged = FilingOptions::new().offset(1).apply(rows);
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].form, "10-Q");
    }

    #[test]
    fn test_archive_urls() {
        let edgar = EdgarClient::new("test_agent example@example.com").unwrap();
        let cik = "1889983";
        let accession = "0001213900-23-009668";

        assert_eq!(
            edgar.archive_url(cik, accession, "doc.htm"),
            format!(
                "{}/data/1889983/000121390023009668/doc.htm",
                edgar.urls.archives
            )
        );

        // The SGML header lives beside the documents, named after the accession.
        let header = format!("{}.hdr.sgml", accession);
        assert!(
            edgar
                .archive_url(cik, accession, &header)
                .ends_with("/000121390023009668/0001213900-23-009668.hdr.sgml")
        );

        assert_eq!(
            edgar.submissions_url("320193"),
            format!("{}/submissions/CIK0000320193.json", edgar.urls.data)
        );
    }

    #[test]
    fn test_filing_id_parsing() {
        let edgar = EdgarClient::new("test_agent example@example.com").unwrap();
        let url = edgar
            .get_filing_url_from_id("320193", "0000320193-23-000106:aapl-20230930.htm")
            .unwrap();
        assert!(url.ends_with("/data/320193/000032019323000106/aapl-20230930.htm"));

        assert!(matches!(
            edgar.get_filing_url_from_id("320193", "no-colon-here"),
            Err(FilingError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_classify_xbrl_files() {
        let item = |name: &str| DirectoryItem {
            last_modified: "2023-11-03 18:08:06".to_string(),
            name: name.to_string(),
            type_: "file".to_string(),
            size: "1000".to_string(),
        };
        let items = vec![
            item("aapl-20230930.htm"),
            item("aapl-20230930.xsd"),
            item("aapl-20230930_lab.xml"),
            item("aapl-20230930_pre.xml"),
            item("aapl-20230930_def.xml"),
            item("aapl-20230930_cal.xml"),
            item("aapl-20230930_htm.xml"),
            item("FilingSummary.xml"),
            item("R1.htm"),
        ];
        let names = XbrlFileNames::classify(&items);
        assert_eq!(names.schema.as_deref(), Some("aapl-20230930.xsd"));
        assert_eq!(names.label.as_deref(), Some("aapl-20230930_lab.xml"));
        assert_eq!(names.presentation.as_deref(), Some("aapl-20230930_pre.xml"));
        assert_eq!(names.definition.as_deref(), Some("aapl-20230930_def.xml"));
        assert_eq!(names.calculation.as_deref(), Some("aapl-20230930_cal.xml"));
        assert_eq!(names.instance.as_deref(), Some("aapl-20230930_htm.xml"));
    }
}
