//! Error types for the FilingKit library.
//!
//! All fallible operations in FilingKit return `Result<T, FilingError>` where `FilingError`
//! is an enum covering the various failure modes: network errors, HTTP status codes, parsing
//! failures, validation errors, and SEC-specific issues.
//!
//! Parse errors carry the document identifier and the offset where the problem was detected,
//! so that a failure inside a 400-file batch can be traced back to one filing. Degradable
//! conditions (a missing label linkbase, an unrecognized unit) are not errors at all: the
//! parsers log a warning and continue with defaults. The error types use `thiserror` for
//! clean `Display` implementations and proper `Error` trait support.

use std::string::FromUtf8Error;
use thiserror::Error;

/// Comprehensive error type for all FilingKit operations.
///
/// This enum covers the various ways that operations can fail when fetching or parsing
/// SEC EDGAR content. Errors are categorized by their source: network issues, HTTP status
/// codes, document parsing problems, configuration mistakes, or validation failures.
///
/// Each parse variant includes the document identity (URL or accession) and where in the
/// document the problem was detected, which matters when a multi-filing operation reports
/// one failure among many successes.
///
/// # Examples
///
/// Handling specific error types:
/// ```rust
/// # use filingkit::{EdgarClient, FilingError, EntityOperations};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let edgar = EdgarClient::new("app contact@example.com")?;
/// match edgar.entity_facts(320193).await {
///     Ok(store) => println!("Ingested {} facts", store.len()),
///     Err(FilingError::NotFound) => println!("Company not found"),
///     Err(FilingError::RateLimitExceeded) => println!("Rate limited, try again later"),
///     Err(e) => println!("Error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum FilingError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid year: must be 1994 or greater")]
    InvalidYear,

    #[error("Invalid quarter: must be between 1 and 4")]
    InvalidQuarter,

    #[error("Invalid month: must be between 1 and 12")]
    InvalidMonth,

    #[error("Invalid day: must be between 1 and 31")]
    InvalidDay,

    #[error("Ticker not found")]
    TickerNotFound,

    #[error("XBRL parse error in {context}: {reason}")]
    XbrlParse { context: String, reason: String },

    /// An instance fact references a concept that the schema never declared.
    #[error("Schema violation: concept '{concept}' not declared in schema ({context})")]
    SchemaViolation { concept: String, context: String },

    #[error("HTML parse error in {context}: {reason}")]
    HtmlParse { context: String, reason: String },

    #[error("SGML header parse error: {0}")]
    SgmlParse(String),

    #[error("Document is {size} bytes, exceeding the {limit} byte limit")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("Mapping schema error: {0}")]
    MappingSchema(String),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML deserialization error: {0}")]
    XmlDe(#[from] quick_xml::DeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Value conversion error: {0}")]
    ValueConversion(String),

    #[error("String parsing error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] FromUtf8Error),

    #[error(
        "Unexpected content type from URL {url}. Expected pattern {expected_pattern}, but got Content-Type: {got_content_type}. Content preview: {content_preview}..."
    )]
    UnexpectedContentType {
        url: String,
        expected_pattern: String,
        got_content_type: String,
        content_preview: String,
    },
}

impl FilingError {
    /// Builds an XBRL parse error, capturing where in which document the failure happened.
    pub fn xbrl(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::XbrlParse {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Builds an HTML parse error with document identity.
    pub fn html(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HtmlParse {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilingError>;
