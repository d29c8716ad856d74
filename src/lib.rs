//! # FilingKit - a Rust client and analysis library for SEC EDGAR
//!
//! FilingKit turns the semi-structured world of SEC submissions into a uniform,
//! queryable data model: SGML headers, filing indices, full XBRL document sets,
//! inline XBRL, and free-form filing HTML all land in the same typed fact and
//! document structures.
//!
//! ## Features
//!
//! - **Rate-limited HTTP client** - Complies with SEC.gov fair access rules
//! - **XBRL engine** - Instance + five linkbases into a unified fact store with
//!   presentation trees, labels, fiscal-period classification, and statement assembly
//! - **Entity facts** - The SEC's per-company aggregated feed behind a fluent,
//!   index-backed query builder
//! - **HTML parser** - Semantic node trees, table extraction with span expansion,
//!   section detection, inline-XBRL extraction, Markdown rendering
//! - **Stitching** - Multi-filing views with deduplication, revision handling,
//!   derived quarters, and stock-split adjustment
//! - **Standardization** - Company-specific concepts mapped onto canonical fields
//!   via prioritized, industry-aware rules
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use filingkit::{EdgarClient, EntityOperations, FiscalPeriod};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize with a proper user agent (required by SEC.gov)
//!     let edgar = EdgarClient::new("YourAppName contact@example.com")?;
//!
//!     let cik = edgar.company_cik("AAPL").await?;
//!     let facts = edgar.entity_facts(cik).await?;
//!
//!     let revenue = facts
//!         .query()
//!         .by_concept("Revenues", false)
//!         .by_fiscal_period(FiscalPeriod::FY)
//!         .latest(3)
//!         .execute();
//!
//!     for fact in revenue {
//!         println!("{}: {:?}", fact.period_end, fact.numeric_value);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
mod cache;
mod config;
mod core;
mod entity;
mod error;
mod facts;
mod filings;
pub mod html;
mod index;
mod options;
pub mod parsing;
mod query;
mod splits;
mod standardize;
mod statements;
mod stitch;
mod traits;
mod units;
pub mod xbrl;

// Re-export core types and traits for a clean API
pub use cache::MemoryBlobStore;
pub use config::{
    EdgarConfig, EdgarUrls, ParserConfig, QueryConfig, SectionConfig, StandardizerConfig,
    StitchConfig,
};
pub use core::EdgarClient;
pub use entity::{CompanyTicker, CompanyTickerExchange, EntityFacts};
pub use error::{FilingError, Result};
pub use facts::{
    Context, ContextId, DataQuality, Decimals, Fact, FactBuilder, FactId, FactStore, FiscalPeriod,
    Period, PeriodType, StatementType, Value,
};
pub use filings::{
    DetailedFiling, Directory, DirectoryItem, DirectoryResponse, FilingFile, FilingsData,
    FormerName, RecentFilings, Submission,
};
pub use html::{Document, MarkdownOptions, Section, SectionDetector, TableMatrix};
pub use index::{EdgarDay, EdgarPeriod, IndexListing, ListedFile, Quarter};
pub use options::{FilingOptions, FilingRecord};
pub use query::{FactQuery, PeriodPivot};
pub use splits::{StockSplit, adjust_fact, cumulative_ratio, detect_splits};
pub use standardize::{
    Expr, FieldMapping, MappingSchema, Op, Rule, StandardizedFinancials, Standardizer,
};
pub use statements::{PeriodView, Statement, StatementAssembler, StatementCell, StatementRow};
pub use stitch::Stitcher;
pub use traits::{
    BlobStore, EntityOperations, Fetcher, FilingOperations, FormParser, IndexOperations,
};
pub use units::{PeriodBucket, Unit, UnitType, is_additive};
pub use xbrl::{FilingSource, XbrlDocument, XbrlFiles};

// Version information
/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
