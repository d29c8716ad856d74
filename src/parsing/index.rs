//! EDGAR filing-index file parsing.
//!
//! Index files are the bulk-discovery side of EDGAR: one line per filing, listing
//! every submission for a day or a quarter. Three dialects exist in the wild, and
//! the differences are entirely mechanical, so each is described as a
//! [`Dialect`] value (field order, separator, fixed column widths) rather than as
//! its own code path:
//!
//! - **master** (`master.idx`): pipe-separated, CIK first. The most stable dialect
//!   and the one the retrieval layer requests.
//! - **company** (`company.idx`): fixed-width columns, company name first, archive
//!   paths relative to sec.gov.
//! - **crawler** (`crawler.idx`): fixed-width like company, but with absolute URLs.
//!
//! Entries come out typed: the filing date is a real [`NaiveDate`] (both the
//! `2023-02-14` and `20230214` spellings appear across dialects), the URL is
//! absolute, and [`IndexEntry::accession_number`] recovers the accession from the
//! listed path so an entry can be handed straight to the per-filing XBRL retrieval
//! without a second lookup. Lines that don't parse are skipped with a warning; a
//! corrupt line in a million-line quarterly index should cost one filing, not the
//! batch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::FilingRecord;

const SEC_ARCHIVES: &str = "https://www.sec.gov/Archives/";

/// One filing listed in an index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub cik: u64,
    pub company_name: String,
    pub form_type: String,
    pub date_filed: NaiveDate,

    /// Absolute URL of the submission text file.
    pub url: String,
}

impl IndexEntry {
    /// The accession number encoded in the listed path
    /// (`.../0000320193-23-000106.txt` → `0000320193-23-000106`).
    pub fn accession_number(&self) -> Option<&str> {
        let file = self.url.rsplit('/').next()?;
        let stem = file.strip_suffix(".txt").unwrap_or(file);
        // Accessions are dash-separated numeric triples; anything else is some
        // other artifact the index happened to point at.
        let mut parts = stem.split('-');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next(), parts.next()),
            (Some(a), Some(b), Some(c), None)
                if !a.is_empty()
                    && a.bytes().all(|ch| ch.is_ascii_digit())
                    && b.len() == 2
                    && b.bytes().all(|ch| ch.is_ascii_digit())
                    && c.bytes().all(|ch| ch.is_ascii_digit())
        );
        well_formed.then_some(stem)
    }
}

impl FilingRecord for IndexEntry {
    fn form_type(&self) -> &str {
        &self.form_type
    }

    fn cik(&self) -> Option<u64> {
        Some(self.cik)
    }
}

/// Positions of the four data fields within a parsed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldOrder {
    cik: usize,
    company: usize,
    form: usize,
    date: usize,
}

/// The shape of one index dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Base name of the file this dialect lives in ("master", "company", "crawler").
    pub stem: &'static str,

    /// Header phrase that identifies the dialect.
    marker: &'static str,

    /// Pipe-separated when None; fixed column widths otherwise.
    widths: Option<&'static [usize]>,

    order: FieldOrder,

    /// Whether listed paths are relative to the SEC archives root.
    relative_paths: bool,
}

impl Dialect {
    pub const MASTER: Dialect = Dialect {
        stem: "master",
        marker: "Master Index",
        widths: None,
        order: FieldOrder {
            cik: 0,
            company: 1,
            form: 2,
            date: 3,
        },
        relative_paths: true,
    };

    pub const COMPANY: Dialect = Dialect {
        stem: "company",
        marker: "by Company Name",
        widths: Some(&[62, 12, 12, 12]),
        order: FieldOrder {
            company: 0,
            form: 1,
            cik: 2,
            date: 3,
        },
        relative_paths: true,
    };

    pub const CRAWLER: Dialect = Dialect {
        stem: "crawler",
        marker: "Crawler Index",
        widths: Some(&[62, 12, 12, 12]),
        order: FieldOrder {
            company: 0,
            form: 1,
            cik: 2,
            date: 3,
        },
        relative_paths: false,
    };

    const ALL: &'static [Dialect] = &[Dialect::MASTER, Dialect::COMPANY, Dialect::CRAWLER];

    /// Identifies the dialect from the header block, if any marker appears.
    pub fn detect(header: &str) -> Option<Dialect> {
        // "XBRL Index" files share the master layout.
        if header.contains("XBRL Index") {
            return Some(Dialect::MASTER);
        }
        Dialect::ALL
            .iter()
            .copied()
            .find(|d| header.contains(d.marker))
    }

    /// Splits a data line into its fields.
    fn fields<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self.widths {
            None => line.split('|').map(str::trim).collect(),
            Some(widths) => {
                let mut fields = Vec::with_capacity(widths.len() + 1);
                let mut rest = line;
                for &width in widths {
                    let mut cut = width.min(rest.len());
                    while !rest.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    fields.push(rest[..cut].trim());
                    rest = &rest[cut..];
                }
                fields.push(rest.trim());
                fields
            }
        }
    }

    fn entry(&self, line: &str) -> Option<IndexEntry> {
        let fields = self.fields(line);
        if fields.len() < 5 {
            return None;
        }

        let cik = fields[self.order.cik].parse::<u64>().ok()?;
        let date_filed = parse_filed_date(fields[self.order.date])?;
        let path = *fields.last()?;
        let url = if self.relative_paths && !path.starts_with("http") {
            format!("{}{}", SEC_ARCHIVES, path)
        } else {
            path.to_string()
        };

        Some(IndexEntry {
            cik,
            company_name: fields[self.order.company].to_string(),
            form_type: fields[self.order.form].to_string(),
            date_filed,
            url,
        })
    }
}

/// Parses an index file into entries.
///
/// The header block (everything up to the dashed separator line) is scanned for a
/// dialect marker when no dialect is given; with neither a separator nor a marker
/// the content is treated as having no entries at all.
pub fn parse_index(content: &str, dialect: Option<Dialect>) -> Result<Vec<IndexEntry>> {
    let lines: Vec<&str> = content.lines().collect();
    let Some(separator) = lines.iter().position(|l| l.trim_start().starts_with("---")) else {
        return Ok(Vec::new());
    };

    let dialect = match dialect {
        Some(d) => d,
        None => {
            let header = lines[..separator].join("\n");
            match Dialect::detect(&header) {
                Some(d) => d,
                None => {
                    tracing::warn!("No index dialect marker found; assuming master layout");
                    Dialect::MASTER
                }
            }
        }
    };

    let body = &lines[separator + 1..];

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for line in body {
        if line.trim().is_empty() || line.trim_start().starts_with("---") {
            continue;
        }
        // Column-header lines repeat inside some dailies; entry() rejects them.
        match dialect.entry(line) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!("Skipped {} unparseable index line(s)", skipped);
    }

    Ok(entries)
}

/// Filed dates appear as `2023-02-14` (master, crawler) or `20230214` (company).
fn parse_filed_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .ok()
}
