//! SGML submission header parsing against fixtures.

mod common;

use chrono::NaiveDate;
use common::read_fixture;
use filingkit::parsing::sgml::SgmlHeader;

#[test]
fn test_parse_header_fixture() {
    let header = SgmlHeader::parse(&read_fixture("sgml/header.sgml")).unwrap();

    assert_eq!(
        header.accession_number.as_deref(),
        Some("0000320193-23-000106")
    );
    assert_eq!(header.submission_type.as_deref(), Some("10-K"));
    assert_eq!(header.filing_date, NaiveDate::from_ymd_opt(2023, 11, 3));
    assert_eq!(
        header.period_of_report,
        NaiveDate::from_ymd_opt(2023, 9, 30)
    );

    assert_eq!(header.filers.len(), 1);
    let filer = &header.filers[0];
    assert_eq!(filer.company.conformed_name.as_deref(), Some("Apple Inc."));
    assert_eq!(filer.company.cik, Some(320193));
    assert_eq!(filer.company.state_of_incorporation.as_deref(), Some("CA"));
    assert_eq!(filer.filing_values.form_type.as_deref(), Some("10-K"));
    assert_eq!(filer.filing_values.file_number.as_deref(), Some("001-36743"));

    // Fiscal year end drives quarterly classification downstream.
    assert_eq!(header.fiscal_year_end(), Some((9, 30)));
}
