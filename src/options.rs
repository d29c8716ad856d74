//! Filing selection: one filter applied to every source of filing records.
//!
//! Filings reach the library through two doors: the per-company submissions feed
//! (row-oriented [`DetailedFiling`](crate::DetailedFiling) records) and the bulk
//! daily/quarterly indices ([`IndexEntry`](crate::parsing::index::IndexEntry)
//! records). Both end up in the same downstream pipeline, so both are filtered by
//! the same [`FilingOptions`] through the [`FilingRecord`] seam instead of each
//! retrieval path growing its own retain/skip/truncate code.
//!
//! The builder vocabulary mirrors the fact query engine: short, chainable methods,
//! no mutation of anything but the builder itself.

/// The minimal view of a filing that selection needs.
///
/// Submissions rows and index entries both implement this; index entries also
/// expose their CIK since a bulk index spans many companies.
pub trait FilingRecord {
    /// Form type as reported ("10-K", "8-K", "S-1/A", ...).
    fn form_type(&self) -> &str;

    /// Filer CIK, when the record carries one. Per-company submissions rows do
    /// not; bulk index entries do.
    fn cik(&self) -> Option<u64> {
        None
    }
}

/// Filter and pagination settings for filing retrieval.
///
/// An empty filter selects everything. Form matching treats amendments as part of
/// the base form by default, so asking for "10-K" also returns "10-K/A"; turn that
/// off with [`FilingOptions::exact_forms`].
///
/// # Examples
///
/// ```rust
/// # use filingkit::FilingOptions;
/// let latest_annuals = FilingOptions::new().form("10-K").limit(10);
/// ```
///
/// ```rust
/// # use filingkit::FilingOptions;
/// // Only original S-1 registrations, no amendments.
/// let originals = FilingOptions::new().form("S-1").exact_forms();
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilingOptions {
    forms: Vec<String>,
    ciks: Vec<u64>,
    offset: usize,
    limit: Option<usize>,
    exact_forms: bool,
}

impl FilingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a single form type (replaces any previously selected forms).
    pub fn form(mut self, form: impl Into<String>) -> Self {
        self.forms = vec![form.into()];
        self
    }

    /// Selects several form types.
    pub fn forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forms = forms.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts bulk-index results to one CIK.
    pub fn cik(mut self, cik: u64) -> Self {
        self.ciks = vec![cik];
        self
    }

    /// Restricts bulk-index results to a set of CIKs.
    pub fn ciks(mut self, ciks: Vec<u64>) -> Self {
        self.ciks = ciks;
        self
    }

    /// Skips the first `n` matching records.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Caps the number of returned records.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Matches form types literally: "S-1" no longer implies "S-1/A".
    pub fn exact_forms(mut self) -> Self {
        self.exact_forms = true;
        self
    }

    /// Whether a form type passes the form filter.
    pub fn matches_form(&self, form: &str) -> bool {
        if self.forms.is_empty() {
            return true;
        }
        let form = form.trim();
        self.forms.iter().any(|wanted| {
            if form == wanted {
                return true;
            }
            // "10-K/A" counts as "10-K" unless exact matching was requested.
            !self.exact_forms
                && form
                    .strip_suffix("/A")
                    .map(|base| base == wanted)
                    .unwrap_or(false)
        })
    }

    /// Runs the full selection over any filing source: form filter, CIK filter,
    /// then offset/limit pagination in the source's order.
    pub fn apply<T: FilingRecord>(&self, records: Vec<T>) -> Vec<T> {
        let selected = records.into_iter().filter(|r| {
            if !self.matches_form(r.form_type()) {
                return false;
            }
            if !self.ciks.is_empty() {
                match r.cik() {
                    Some(cik) if self.ciks.contains(&cik) => {}
                    _ => return false,
                }
            }
            true
        });

        match self.limit {
            Some(limit) => selected.skip(self.offset).take(limit).collect(),
            None => selected.skip(self.offset).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Record(&'static str, Option<u64>);

    impl FilingRecord for Record {
        fn form_type(&self) -> &str {
            self.0
        }

        fn cik(&self) -> Option<u64> {
            self.1
        }
    }

    fn records() -> Vec<Record> {
        vec![
            Record("10-K", Some(320193)),
            Record("10-K/A", Some(320193)),
            Record("10-Q", Some(320193)),
            Record("8-K", Some(1045810)),
            Record("10-K", Some(1045810)),
        ]
    }

    #[test]
    fn test_form_matching_includes_amendments() {
        let options = FilingOptions::new().form("10-K");
        assert!(options.matches_form("10-K"));
        assert!(options.matches_form("10-K/A"));
        assert!(!options.matches_form("10-Q"));

        let selected = options.apply(records());
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_exact_form_matching() {
        let options = FilingOptions::new().form("10-K").exact_forms();
        assert!(!options.matches_form("10-K/A"));
        assert_eq!(options.apply(records()).len(), 2);
    }

    #[test]
    fn test_cik_filter_skips_records_without_cik() {
        let options = FilingOptions::new().cik(1045810);
        let selected = options.apply(records());
        assert_eq!(selected.len(), 2);

        // A record that cannot name its CIK never passes a CIK filter.
        let anonymous = vec![Record("10-K", None)];
        assert!(options.apply(anonymous).is_empty());
    }

    #[test]
    fn test_pagination_after_filtering() {
        let options = FilingOptions::new().form("10-K").offset(1).limit(1);
        let selected = options.apply(records());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].form_type(), "10-K/A");
    }

    #[test]
    fn test_empty_filter_selects_all() {
        let selected = FilingOptions::new().apply(records());
        assert_eq!(selected.len(), 5);
    }
}
