//! Trait definitions organizing operations by feature area and decoupling the
//! analysis core from I/O.
//!
//! Two kinds of traits live here:
//!
//! - **Boundary contracts** ([`Fetcher`], [`BlobStore`], [`FormParser`]): the seams
//!   between the pure parsing/analysis core and the outside world. The core never
//!   talks HTTP or disk directly; it depends on these traits, and [`EdgarClient`]
//!   is the stock `Fetcher` implementation.
//! - **Operation groups** ([`EntityOperations`], [`FilingOperations`],
//!   [`IndexOperations`]): the client's API surface, grouped by domain so the
//!   methods stay discoverable and mockable.

use async_trait::async_trait;
use std::time::Duration;

use crate::entity::{CompanyTicker, CompanyTickerExchange, EntityFacts};
use crate::error::Result;
use crate::filings::{DetailedFiling, DirectoryResponse, Submission};
use crate::html::Document;
use crate::index::{EdgarDay, EdgarPeriod, IndexListing};
use crate::options::FilingOptions;
use crate::parsing::index::IndexEntry;
use crate::parsing::sgml::SgmlHeader;
use crate::xbrl::XbrlDocument;

/// Byte-level fetch boundary.
///
/// Implementations own HTTP semantics: rate limiting (the SEC's 10 req/s cap),
/// retries, timeouts, and the identity user-agent. The analysis core only ever sees
/// text and bytes.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a text resource.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Fetches a binary resource.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl Fetcher for crate::EdgarClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.get(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.get_bytes(url).await
    }
}

/// Key-value blob store boundary for caching fetched documents.
///
/// `get` returns None for both absent and expired entries; `put` accepts an optional
/// TTL. Implementations decide eviction policy beyond TTL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>);
    async fn evict(&self, key: &str);
}

/// Capability for form-specific leaf parsers (10-K records, 13F tables, Forms
/// 3/4/5, ...). They consume the core's parsed document plus filing metadata and
/// produce their own record type; the core never depends on them.
pub trait FormParser {
    type Output;

    /// Form types this parser accepts (e.g. `["10-K", "10-K/A"]`).
    fn form_types(&self) -> &[&str];

    fn parse_form(&self, document: &Document, filing: &DetailedFiling) -> Result<Self::Output>;
}

/// Operations for company identity and aggregated XBRL facts.
///
/// Company data is retrieved from SEC's data API which provides JSON-formatted
/// company facts based on XBRL filings. This is the entry point for financial
/// analysis that does not need per-filing parsing.
#[async_trait]
pub trait EntityOperations {
    /// Retrieves a list of all company tickers from EDGAR.
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>>;
    /// Retrieves the Central Index Key (CIK) for a given company ticker symbol.
    async fn company_cik(&self, ticker: &str) -> Result<u64>;
    /// Retrieves a list of company tickers along with their exchange information.
    async fn company_tickers_with_exchange(&self) -> Result<Vec<CompanyTickerExchange>>;
    /// Downloads and ingests a company's aggregated facts into a queryable store.
    async fn entity_facts(&self, cik: u64) -> Result<EntityFacts>;
}

/// Operations for accessing SEC filings and related documents.
///
/// Filing operations are the core of most EDGAR use cases, enabling you to discover
/// what a company has filed and retrieve the actual filing documents for analysis:
/// submissions metadata, filing directories, primary documents, SGML headers, and
/// complete per-filing XBRL document sets.
#[async_trait]
pub trait FilingOperations {
    /// Retrieves all submissions for a specific company identified by CIK.
    async fn submissions(&self, cik: &str) -> Result<Submission>;
    /// Helper function to get recent filings in a form of a Vec.
    async fn get_recent_filings(&self, cik: &str) -> Result<Vec<DetailedFiling>>;
    /// Retrieves a list of filings for a specific company identified by CIK.
    async fn filings(&self, cik: &str, opts: Option<FilingOptions>) -> Result<Vec<DetailedFiling>>;
    /// Retrieves the directory structure for a specific filing.
    async fn filing_directory(
        &self,
        cik: &str,
        accession_number: &str,
    ) -> Result<DirectoryResponse>;
    /// Retrieves the directory structure for a specific entity.
    async fn entity_directory(&self, cik: &str) -> Result<DirectoryResponse>;
    /// Constructs a filing URL from a combined filing ID (format: "accession_number:filename")
    fn get_filing_url_from_id(&self, cik: &str, filing_id: &str) -> Result<String>;
    /// Fetches a filing's content directly using its URL
    async fn get_filing_content_by_id(&self, cik: &str, filing_id: &str) -> Result<String>;
    /// Fetches the latest filing for a company matching one of the requested form types.
    ///
    /// Use this when you want "latest 10-Q **or** 10-K", etc. The forms are applied
    /// as a filter, and the newest matching filing is downloaded.
    async fn get_latest_filing_content(&self, cik: &str, form_types: &[&str]) -> Result<String>;
    /// Downloads and parses the SGML submission header for a filing.
    async fn sgml_header(&self, cik: &str, accession_number: &str) -> Result<SgmlHeader>;
    /// Downloads the six XBRL files of a filing and parses them into a unified
    /// document.
    async fn xbrl_document(&self, cik: &str, filing: &DetailedFiling) -> Result<XbrlDocument>;
    /// Downloads and parses XBRL for every matching filing.
    ///
    /// One bad filing does not sink the batch: the result pairs successes with
    /// per-accession failures.
    async fn xbrl_documents(
        &self,
        cik: &str,
        opts: Option<FilingOptions>,
    ) -> Result<(Vec<XbrlDocument>, Vec<(String, crate::FilingError)>)>;
}

/// Operations for retrieving daily and quarterly filing indices.
///
/// The SEC publishes index files that list all filings for a given day or quarter.
/// Indices provide a lightweight way to get filing metadata without downloading full
/// documents, making them ideal for bulk ingestion or monitoring pipelines.
#[async_trait]
pub trait IndexOperations {
    /// Retrieves the full index file for a specific year and quarter.
    async fn full_index(&self, period: Option<EdgarPeriod>) -> Result<IndexListing>;
    /// Retrieves the daily index file for a specific period.
    async fn daily_index(&self, period: Option<EdgarPeriod>) -> Result<IndexListing>;
    /// Gets and parses daily index file for specific date
    async fn get_daily_filings(
        &self,
        day: EdgarDay,
        options: Option<FilingOptions>,
    ) -> Result<Vec<IndexEntry>>;
    /// Gets and parses the quarterly index file for a specific period
    async fn get_period_filings(
        &self,
        period: EdgarPeriod,
        options: Option<FilingOptions>,
    ) -> Result<Vec<IndexEntry>>;
}
