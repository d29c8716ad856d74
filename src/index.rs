//! Bulk filing discovery through the daily and quarterly indices.
//!
//! When the question is "what did *everyone* file?" rather than "what did this
//! company file?", the submissions endpoint is the wrong tool: EDGAR's index files
//! list every submission for a day or a quarter in one shot. This module locates
//! the right index file for a date or period, downloads it (decompressing the
//! `.gz` variant when one is published), and parses it with
//! [`crate::parsing::index`] into typed [`IndexEntry`] records.
//!
//! Entries carry the accession number recoverable from their listed path, so a
//! bulk sweep composes directly with the per-filing operations: discover through
//! an index, then fetch each hit's XBRL document set and stitch. [`FilingOptions`]
//! does the narrowing (form types, CIKs, pagination) through the same
//! [`FilingRecord`](crate::options::FilingRecord) seam the submissions feed uses.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;

use super::core::EdgarClient;
use super::error::{FilingError, Result};
use super::options::FilingOptions;
use super::traits::IndexOperations;
use crate::parsing::index::{Dialect, IndexEntry, parse_index};

/// EDGAR's electronic records begin here; earlier dates have no index files.
const EDGAR_EPOCH_YEAR: i32 = 1994;

/// Calendar quarter, as used in EDGAR's `QTR1`..`QTR4` directory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// The quarter containing a (validated) calendar month.
    fn of_month(month: u32) -> Self {
        match month {
            1..=3 => Quarter::Q1,
            4..=6 => Quarter::Q2,
            7..=9 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    /// 1-based quarter number.
    pub fn number(&self) -> u32 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }
}

/// A calendar date inside EDGAR's coverage, used to address daily index files.
///
/// Construction validates the date properly (a February 30th is rejected, not just
/// an out-of-range day number) and enforces the 1994 floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgarDay(NaiveDate);

impl EdgarDay {
    /// # Errors
    ///
    /// `InvalidYear` before 1994, `InvalidMonth` outside 1-12, `InvalidDay` when
    /// the day does not exist in that month.
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self> {
        if year < EDGAR_EPOCH_YEAR {
            return Err(FilingError::InvalidYear);
        }
        if !(1..=12).contains(&month) {
            return Err(FilingError::InvalidMonth);
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(EdgarDay)
            .ok_or(FilingError::InvalidDay)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The `YYYYMMDD` stamp daily index filenames embed.
    pub fn stamp(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    pub fn quarter(&self) -> Quarter {
        Quarter::of_month(self.0.month())
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }
}

/// A year/quarter pair addressing a quarterly index directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgarPeriod {
    year: i32,
    quarter: Quarter,
}

impl EdgarPeriod {
    /// # Errors
    ///
    /// `InvalidYear` before 1994.
    pub fn new(year: i32, quarter: Quarter) -> Result<Self> {
        if year < EDGAR_EPOCH_YEAR {
            return Err(FilingError::InvalidYear);
        }
        Ok(Self { year, quarter })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> Quarter {
        self.quarter
    }
}

/// A directory listing of available index files (`index.json` payload).
#[derive(Debug, Clone)]
pub struct IndexListing {
    pub files: Vec<ListedFile>,
}

/// One file or subdirectory in an index listing.
#[derive(Debug, Clone)]
pub struct ListedFile {
    pub name: String,
    pub href: String,
    pub size: String,
    pub last_modified: String,
    kind: String,
}

impl ListedFile {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

impl IndexListing {
    /// Parses the SEC's `index.json` shape (`{"directory": {"item": [...]}}`).
    pub fn from_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Payload {
            directory: Dir,
        }
        #[derive(Deserialize)]
        struct Dir {
            item: Vec<Item>,
        }
        #[derive(Deserialize)]
        struct Item {
            name: String,
            href: String,
            #[serde(default)]
            size: String,
            #[serde(rename = "last-modified", default)]
            last_modified: String,
            #[serde(rename = "type")]
            kind: String,
        }

        let payload: Payload = serde_json::from_str(json)?;
        Ok(IndexListing {
            files: payload
                .directory
                .item
                .into_iter()
                .map(|i| ListedFile {
                    name: i.name,
                    href: i.href,
                    size: i.size,
                    last_modified: i.last_modified,
                    kind: i.kind,
                })
                .collect(),
        })
    }

    /// The index file to download for a dialect, preferring the compressed
    /// variant. Daily files embed the date stamp; quarterly files do not.
    pub fn pick(&self, dialect: Dialect, stamp: Option<&str>) -> Option<&ListedFile> {
        let wanted: Vec<String> = match stamp {
            Some(stamp) => vec![
                format!("{}.{}.gz", dialect.stem, stamp),
                format!("{}.{}.idx", dialect.stem, stamp),
            ],
            None => vec![
                format!("{}.gz", dialect.stem),
                format!("{}.idx", dialect.stem),
            ],
        };
        wanted
            .iter()
            .find_map(|name| self.files.iter().find(|f| f.is_file() && &f.name == name))
    }
}

/// Inflates a gzipped index file; plain files pass through as UTF-8.
fn inflate(bytes: Vec<u8>, compressed: bool) -> Result<String> {
    if compressed {
        let mut text = String::new();
        GzDecoder::new(&bytes[..]).read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(String::from_utf8(bytes)?)
    }
}

impl EdgarClient {
    /// `daily-index` or `full-index` directory path for a year/quarter.
    fn index_dir(&self, kind: &str, year: i32, quarter: &Quarter) -> String {
        format!(
            "{}/{}-index/{}/QTR{}",
            self.urls.archives,
            kind,
            year,
            quarter.number()
        )
    }

    async fn listing_at(&self, dir: &str) -> Result<IndexListing> {
        let json = self.get(&format!("{}/index.json", dir)).await?;
        IndexListing::from_json(&json)
    }

    /// Downloads and parses the chosen index file from `dir`.
    async fn load_entries(&self, dir: &str, file: &ListedFile) -> Result<Vec<IndexEntry>> {
        let compressed = file.name.ends_with(".gz");
        let url = format!("{}/{}", dir, file.href);
        let text = if compressed {
            inflate(self.get_bytes(&url).await?, true)?
        } else {
            self.get(&url).await?
        };
        parse_index(&text, Some(Dialect::MASTER))
    }
}

/// Bulk index retrieval.
///
/// Both entry points answer "what was filed then?" with parsed, typed entries:
/// [`get_daily_filings`](IndexOperations::get_daily_filings) for a single day,
/// [`get_period_filings`](IndexOperations::get_period_filings) for a quarter. The
/// master dialect is requested because it is the most stable of the three and
/// covers every filing the other dialects list.
#[async_trait]
impl IndexOperations for EdgarClient {
    /// Every filing submitted on one day, optionally narrowed by `options`.
    ///
    /// # Errors
    ///
    /// `FilingError::NotFound` when the day has no published index (weekends,
    /// holidays, and the current day before publication).
    async fn get_daily_filings(
        &self,
        day: EdgarDay,
        options: Option<FilingOptions>,
    ) -> Result<Vec<IndexEntry>> {
        let dir = self.index_dir("daily", day.year(), &day.quarter());
        let listing = self.listing_at(&dir).await?;
        let file = listing
            .pick(Dialect::MASTER, Some(&day.stamp()))
            .ok_or(FilingError::NotFound)?;

        let entries = self.load_entries(&dir, file).await?;
        Ok(options.unwrap_or_default().apply(entries))
    }

    /// Every filing submitted in one quarter, optionally narrowed by `options`.
    ///
    /// Quarterly files run to millions of lines; pass a form or CIK filter unless
    /// you really want all of it.
    async fn get_period_filings(
        &self,
        period: EdgarPeriod,
        options: Option<FilingOptions>,
    ) -> Result<Vec<IndexEntry>> {
        let dir = self.index_dir("full", period.year(), &period.quarter());
        let listing = self.listing_at(&dir).await?;
        let file = listing
            .pick(Dialect::MASTER, None)
            .ok_or(FilingError::NotFound)?;

        let entries = self.load_entries(&dir, file).await?;
        Ok(options.unwrap_or_default().apply(entries))
    }

    /// Lists the daily index files available for a period (or the top-level
    /// daily-index directory when no period is given).
    async fn daily_index(&self, period: Option<EdgarPeriod>) -> Result<IndexListing> {
        let dir = match period {
            Some(p) => self.index_dir("daily", p.year(), &p.quarter()),
            None => format!("{}/daily-index", self.urls.archives),
        };
        self.listing_at(&dir).await
    }

    /// Lists the quarterly index files available for a period (or the top-level
    /// full-index directory).
    async fn full_index(&self, period: Option<EdgarPeriod>) -> Result<IndexListing> {
        let dir = match period {
            Some(p) => self.index_dir("full", p.year(), &p.quarter()),
            None => format!("{}/full-index", self.urls.archives),
        };
        self.listing_at(&dir).await
    }
}
