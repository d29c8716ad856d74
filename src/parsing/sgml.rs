//! SGML submission header parsing.
//!
//! Every EDGAR submission carries an SGML header (the `.hdr.sgml` file, also embedded
//! at the top of the full-text `.txt` rendition) describing who filed what and when.
//! This parser handles the narrow dialect the SEC actually emits, in both of its
//! spellings:
//!
//! - tag-per-line: `<ACCESSION-NUMBER>0000320193-23-000106`
//! - caption form: `ACCESSION NUMBER:  0000320193-23-000106`
//!
//! Only the defined subset is modeled: `<SEC-HEADER>`, `<FILER>`, `<FILING-VALUES>`,
//! `<SUBJECT-COMPANY>`, `<REPORTING-OWNER>`. Everything else is skipped without
//! complaint. It is a line-oriented parser, not a general SGML parser.

use chrono::NaiveDate;

use crate::error::{FilingError, Result};

/// Company identification block (`<COMPANY-DATA>` or filer-level captions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyData {
    pub conformed_name: Option<String>,
    pub cik: Option<u64>,
    pub sic: Option<String>,
    pub irs_number: Option<String>,
    pub state_of_incorporation: Option<String>,
    pub fiscal_year_end: Option<String>,
}

/// `<FILING-VALUES>` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingValues {
    pub form_type: Option<String>,
    pub act: Option<String>,
    pub file_number: Option<String>,
    pub film_number: Option<String>,
}

/// One `<FILER>`, `<SUBJECT-COMPANY>` or `<REPORTING-OWNER>` record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilerRecord {
    pub company: CompanyData,
    pub filing_values: FilingValues,
}

/// Parsed submission header.
#[derive(Debug, Clone, Default)]
pub struct SgmlHeader {
    pub accession_number: Option<String>,
    pub submission_type: Option<String>,
    pub filing_date: Option<NaiveDate>,
    pub period_of_report: Option<NaiveDate>,
    pub document_count: Option<u32>,

    pub filers: Vec<FilerRecord>,
    pub subject_companies: Vec<FilerRecord>,
    pub reporting_owners: Vec<FilerRecord>,
}

impl SgmlHeader {
    /// Parses an SGML submission header.
    ///
    /// # Errors
    ///
    /// Returns `SgmlParse` when the input contains no recognizable header fields at
    /// all; individual malformed lines are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut header = SgmlHeader::default();
        let mut recognized = 0usize;

        // Which record list the parser is currently filling.
        #[derive(PartialEq)]
        enum Block {
            None,
            Filer,
            SubjectCompany,
            ReportingOwner,
        }
        let mut block = Block::None;
        let mut record = FilerRecord::default();

        let flush =
            |header: &mut SgmlHeader, block: &Block, record: &mut FilerRecord| match block {
                Block::Filer => header.filers.push(std::mem::take(record)),
                Block::SubjectCompany => header.subject_companies.push(std::mem::take(record)),
                Block::ReportingOwner => header.reporting_owners.push(std::mem::take(record)),
                Block::None => {}
            };

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some((key, value)) = split_line(trimmed) else {
                continue;
            };

            match key.as_str() {
                "SEC-HEADER" | "SEC-DOCUMENT" | "ACCEPTANCE-DATETIME" => {
                    recognized += 1;
                }
                "/SEC-HEADER" => {
                    flush(&mut header, &block, &mut record);
                    block = Block::None;
                }
                "FILER" => {
                    flush(&mut header, &block, &mut record);
                    block = Block::Filer;
                    recognized += 1;
                }
                "SUBJECT-COMPANY" => {
                    flush(&mut header, &block, &mut record);
                    block = Block::SubjectCompany;
                    recognized += 1;
                }
                "REPORTING-OWNER" => {
                    flush(&mut header, &block, &mut record);
                    block = Block::ReportingOwner;
                    recognized += 1;
                }
                "/FILER" | "/SUBJECT-COMPANY" | "/REPORTING-OWNER" => {
                    flush(&mut header, &block, &mut record);
                    block = Block::None;
                }
                "ACCESSION-NUMBER" | "ACCESSION NUMBER" => {
                    header.accession_number = non_empty(value);
                    recognized += 1;
                }
                "TYPE" | "CONFORMED-SUBMISSION-TYPE" | "CONFORMED SUBMISSION TYPE" => {
                    header.submission_type = non_empty(value);
                    recognized += 1;
                }
                "FILING-DATE" | "FILED-AS-OF-DATE" | "FILED AS OF DATE" => {
                    header.filing_date = parse_sgml_date(&value);
                    recognized += 1;
                }
                "PERIOD" | "CONFORMED-PERIOD-OF-REPORT" | "CONFORMED PERIOD OF REPORT" => {
                    header.period_of_report = parse_sgml_date(&value);
                    recognized += 1;
                }
                "PUBLIC-DOCUMENT-COUNT" | "PUBLIC DOCUMENT COUNT" => {
                    header.document_count = value.trim().parse().ok();
                    recognized += 1;
                }
                _ if block != Block::None => {
                    apply_record_field(&mut record, &key, &value);
                }
                _ => {}
            }
        }
        flush(&mut header, &block, &mut record);

        if recognized == 0 {
            return Err(FilingError::SgmlParse(
                "no recognizable SEC header fields".to_string(),
            ));
        }
        Ok(header)
    }

    /// Fiscal year end as (month, day), parsed from the filer's `FISCAL-YEAR-END`
    /// MMDD value.
    pub fn fiscal_year_end(&self) -> Option<(u32, u32)> {
        let raw = self
            .filers
            .first()
            .and_then(|f| f.company.fiscal_year_end.as_deref())?;
        if raw.len() != 4 {
            return None;
        }
        let month: u32 = raw[..2].parse().ok()?;
        let day: u32 = raw[2..].parse().ok()?;
        if (1..=12).contains(&month) && (1..=31).contains(&day) {
            Some((month, day))
        } else {
            None
        }
    }
}

/// Splits a header line in either dialect into (KEY, value).
fn split_line(line: &str) -> Option<(String, String)> {
    if let Some(rest) = line.strip_prefix('<') {
        let (tag, value) = rest.split_once('>')?;
        return Some((tag.trim().to_string(), value.trim().to_string()));
    }
    // Caption dialect: "ACCESSION NUMBER:  value". Keys are upper-case captions;
    // anything with lower-case letters before the colon is prose.
    let (caption, value) = line.split_once(':')?;
    let caption = caption.trim();
    if caption.is_empty()
        || caption
            .chars()
            .any(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return None;
    }
    Some((caption.to_string(), value.trim().to_string()))
}

fn apply_record_field(record: &mut FilerRecord, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "COMPANY-CONFORMED-NAME" | "COMPANY CONFORMED NAME" | "CONFORMED-NAME" => {
            record.company.conformed_name = non_empty(value.to_string());
        }
        "CENTRAL-INDEX-KEY" | "CENTRAL INDEX KEY" | "CIK" => {
            record.company.cik = value.trim_start_matches('0').parse().ok();
        }
        "STANDARD-INDUSTRIAL-CLASSIFICATION" | "STANDARD INDUSTRIAL CLASSIFICATION"
        | "ASSIGNED-SIC" => {
            record.company.sic = non_empty(value.to_string());
        }
        "IRS-NUMBER" | "IRS NUMBER" => {
            record.company.irs_number = non_empty(value.to_string());
        }
        "STATE-OF-INCORPORATION" | "STATE OF INCORPORATION" => {
            record.company.state_of_incorporation = non_empty(value.to_string());
        }
        "FISCAL-YEAR-END" | "FISCAL YEAR END" => {
            record.company.fiscal_year_end = non_empty(value.to_string());
        }
        "FORM-TYPE" | "FORM TYPE" => {
            record.filing_values.form_type = non_empty(value.to_string());
        }
        "SEC-ACT" | "ACT" => {
            record.filing_values.act = non_empty(value.to_string());
        }
        "SEC-FILE-NUMBER" | "SEC FILE NUMBER" | "FILE-NUMBER" => {
            record.filing_values.file_number = non_empty(value.to_string());
        }
        "FILM-NUMBER" | "FILM NUMBER" => {
            record.filing_values.film_number = non_empty(value.to_string());
        }
        _ => {}
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Header dates are YYYYMMDD.
fn parse_sgml_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<SEC-HEADER>0000320193-23-000106.hdr.sgml : 20231103
<ACCEPTANCE-DATETIME>20231102180806
<ACCESSION-NUMBER>0000320193-23-000106
<TYPE>10-K
<PUBLIC-DOCUMENT-COUNT>88
<PERIOD>20230930
<FILING-DATE>20231103
<FILER>
<COMPANY-DATA>
<CONFORMED-NAME>Apple Inc.
<CIK>0000320193
<ASSIGNED-SIC>3571
<IRS-NUMBER>942404110
<STATE-OF-INCORPORATION>CA
<FISCAL-YEAR-END>0930
</COMPANY-DATA>
<FILING-VALUES>
<FORM-TYPE>10-K
<ACT>34
<FILE-NUMBER>001-36743
<FILM-NUMBER>231373899
</FILING-VALUES>
</FILER>
</SEC-HEADER>"#;

    #[test]
    fn test_parse_tag_dialect() {
        let header = SgmlHeader::parse(HEADER).unwrap();
        assert_eq!(
            header.accession_number.as_deref(),
            Some("0000320193-23-000106")
        );
        assert_eq!(header.submission_type.as_deref(), Some("10-K"));
        assert_eq!(
            header.filing_date,
            NaiveDate::from_ymd_opt(2023, 11, 3)
        );
        assert_eq!(
            header.period_of_report,
            NaiveDate::from_ymd_opt(2023, 9, 30)
        );
        assert_eq!(header.document_count, Some(88));

        assert_eq!(header.filers.len(), 1);
        let filer = &header.filers[0];
        assert_eq!(filer.company.conformed_name.as_deref(), Some("Apple Inc."));
        assert_eq!(filer.company.cik, Some(320193));
        assert_eq!(filer.filing_values.form_type.as_deref(), Some("10-K"));
        assert_eq!(header.fiscal_year_end(), Some((9, 30)));
    }

    #[test]
    fn test_parse_caption_dialect() {
        let content = r#"ACCESSION NUMBER:		0001104659-24-000123
CONFORMED SUBMISSION TYPE:	SC 13D/A
PUBLIC DOCUMENT COUNT:		2
FILED AS OF DATE:		20240112
SUBJECT-COMPANY:

	COMPANY CONFORMED NAME:			GameStop Corp.
	CENTRAL INDEX KEY:			0001326380
	STANDARD INDUSTRIAL CLASSIFICATION:	RETAIL STORES [5990]
"#;
        let header = SgmlHeader::parse(content).unwrap();
        assert_eq!(
            header.accession_number.as_deref(),
            Some("0001104659-24-000123")
        );
        assert_eq!(header.submission_type.as_deref(), Some("SC 13D/A"));
        assert_eq!(header.subject_companies.len(), 1);
        assert_eq!(
            header.subject_companies[0].company.conformed_name.as_deref(),
            Some("GameStop Corp.")
        );
        assert_eq!(header.subject_companies[0].company.cik, Some(1326380));
    }

    #[test]
    fn test_multiple_reporting_owners() {
        let content = r#"<ACCESSION-NUMBER>0000000000-24-000001
<TYPE>4
<REPORTING-OWNER>
<CONFORMED-NAME>Cohen Ryan
<CIK>0001822479
</REPORTING-OWNER>
<REPORTING-OWNER>
<CONFORMED-NAME>RC Ventures LLC
<CIK>0001822480
</REPORTING-OWNER>"#;
        let header = SgmlHeader::parse(content).unwrap();
        assert_eq!(header.reporting_owners.len(), 2);
        assert_eq!(
            header.reporting_owners[0].company.conformed_name.as_deref(),
            Some("Cohen Ryan")
        );
        assert_eq!(
            header.reporting_owners[1].company.conformed_name.as_deref(),
            Some("RC Ventures LLC")
        );
    }

    #[test]
    fn test_garbage_input_fails() {
        assert!(SgmlHeader::parse("just some text\nwith no header").is_err());
    }
}
