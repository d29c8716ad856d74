//! Index file parsing against fixtures.

mod common;

use chrono::NaiveDate;
use common::read_fixture;
use filingkit::FilingOptions;
use filingkit::parsing::index::{Dialect, parse_index};

#[test]
fn test_parse_master_index_fixture() {
    let content = read_fixture("indexes/master.idx");
    let entries = parse_index(&content, None).unwrap();

    assert_eq!(entries.len(), 3);

    let apple = &entries[0];
    assert_eq!(apple.cik, 320193);
    assert_eq!(apple.company_name, "Apple Inc.");
    assert_eq!(apple.form_type, "10-K");
    assert_eq!(
        apple.date_filed,
        NaiveDate::from_ymd_opt(2023, 11, 3).unwrap()
    );
    assert_eq!(
        apple.url,
        "https://www.sec.gov/Archives/edgar/data/320193/0000320193-23-000106.txt"
    );
    // The accession comes straight off the listed path, ready for per-filing
    // retrieval.
    assert_eq!(apple.accession_number(), Some("0000320193-23-000106"));

    assert_eq!(entries[1].company_name, "NVIDIA CORP");
    assert_eq!(entries[2].form_type, "8-K");
}

#[test]
fn test_dialect_detected_from_header() {
    let content = read_fixture("indexes/master.idx");
    // No dialect given: the "Master Index" header line decides.
    let detected = parse_index(&content, None).unwrap();
    let forced = parse_index(&content, Some(Dialect::MASTER)).unwrap();
    assert_eq!(detected.len(), forced.len());
}

#[test]
fn test_entries_filter_through_filing_options() {
    let content = read_fixture("indexes/master.idx");
    let entries = parse_index(&content, None).unwrap();

    // Index entries carry CIKs, so bulk results narrow by company.
    let apple_only = FilingOptions::new().cik(320193).apply(entries.clone());
    assert_eq!(apple_only.len(), 1);
    assert_eq!(apple_only[0].company_name, "Apple Inc.");

    let capped = FilingOptions::new().limit(1).apply(entries);
    assert_eq!(capped.len(), 1);
}
