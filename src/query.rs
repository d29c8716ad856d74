//! Fluent, index-backed queries over a [`FactStore`].
//!
//! [`FactQuery`] is an immutable builder: each filter returns a new builder, the store is
//! never mutated, and the same builder can be terminalized any number of times with
//! identical results. Filters on orthogonal attributes commute.
//!
//! ```rust
//! # use filingkit::{FactStore, FactQuery, FiscalPeriod};
//! # let store = FactStore::new();
//! let revenue = FactQuery::new(&store)
//!     .by_concept("Revenues", false)
//!     .by_fiscal_period(FiscalPeriod::FY)
//!     .latest(3)
//!     .execute();
//! ```

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::config::QueryConfig;
use crate::facts::{DataQuality, Fact, FactStore, FiscalPeriod, StatementType};

/// Sort order applied before `latest`/limit truncation and in `execute` output.
/// Descending by period end, ties broken by later filing date.
fn period_order(a: &Fact, b: &Fact) -> std::cmp::Ordering {
    b.period_end
        .cmp(&a.period_end)
        .then(b.filing_date.cmp(&a.filing_date))
}

/// Immutable query builder over a fact store.
///
/// Builders are cheap to clone; chaining moves the builder, so keep a clone around if
/// you want to branch a query into several refinements.
#[derive(Debug, Clone)]
pub struct FactQuery<'a> {
    store: &'a FactStore,

    concept: Option<(String, bool)>,
    label: Option<(String, bool)>,
    fiscal_year: Option<i32>,
    fiscal_period: Option<FiscalPeriod>,
    date_range: Option<(NaiveDate, NaiveDate)>,
    as_of: Option<NaiveDate>,
    min_quality: Option<DataQuality>,
    min_confidence: Option<f64>,
    statement_type: Option<StatementType>,
    form_types: Option<Vec<String>>,
    default_member_only: bool,
    limit: Option<usize>,
    latest_periods: Option<usize>,
}

impl<'a> FactQuery<'a> {
    pub fn new(store: &'a FactStore) -> Self {
        Self {
            store,
            concept: None,
            label: None,
            fiscal_year: None,
            fiscal_period: None,
            date_range: None,
            as_of: None,
            min_quality: None,
            min_confidence: None,
            statement_type: None,
            form_types: None,
            default_member_only: false,
            limit: None,
            latest_periods: None,
        }
    }

    /// Applies query-level defaults from a [`QueryConfig`].
    pub fn with_config(self, config: &QueryConfig) -> Self {
        let mut q = self;
        if config.high_quality_only {
            q = q.high_quality_only();
        }
        if config.min_confidence > 0.0 {
            q = q.min_confidence(config.min_confidence);
        }
        q
    }

    /// Filters by concept name.
    ///
    /// With `exact = true` the full prefixed name must match. Otherwise the match is
    /// smart: the query string matches the full name, the local name, or (case-folded)
    /// a substring of the local name.
    pub fn by_concept(mut self, concept: impl Into<String>, exact: bool) -> Self {
        self.concept = Some((concept.into(), exact));
        self
    }

    /// Filters by standard label, substring match; `fuzzy = true` folds case and
    /// ignores whitespace runs.
    pub fn by_label(mut self, text: impl Into<String>, fuzzy: bool) -> Self {
        self.label = Some((text.into(), fuzzy));
        self
    }

    pub fn by_fiscal_year(mut self, year: i32) -> Self {
        self.fiscal_year = Some(year);
        self
    }

    pub fn by_fiscal_period(mut self, period: FiscalPeriod) -> Self {
        self.fiscal_period = Some(period);
        self
    }

    /// Keeps facts whose period end falls within `[start, end]`.
    pub fn date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    /// Time-travel view: keeps facts filed on or before `date`. Facts without a filing
    /// date are excluded, since their visibility at `date` cannot be established.
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn high_quality_only(mut self) -> Self {
        self.min_quality = Some(DataQuality::High);
        self
    }

    pub fn min_confidence(mut self, threshold: f64) -> Self {
        self.min_confidence = Some(threshold);
        self
    }

    pub fn by_statement_type(mut self, statement: StatementType) -> Self {
        self.statement_type = Some(statement);
        self
    }

    pub fn by_form_type(mut self, form: impl Into<String>) -> Self {
        self.form_types = Some(vec![form.into()]);
        self
    }

    pub fn by_form_types(mut self, forms: Vec<String>) -> Self {
        self.form_types = Some(forms);
        self
    }

    /// Keeps only facts without dimensional qualifiers.
    pub fn default_member_only(mut self) -> Self {
        self.default_member_only = true;
        self
    }

    /// Keeps the `n` most recent facts after sorting.
    pub fn latest(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Keeps facts belonging to the `n` most recent distinct periods.
    pub fn latest_periods(mut self, n: usize) -> Self {
        self.latest_periods = Some(n);
        self
    }

    fn matches(&self, fact: &Fact) -> bool {
        if let Some((concept, exact)) = &self.concept {
            if *exact {
                if fact.concept != *concept {
                    return false;
                }
            } else {
                let local = fact.local_name();
                let query_lower = concept.to_ascii_lowercase();
                let matched = fact.concept == *concept
                    || local == concept
                    || local.to_ascii_lowercase().contains(&query_lower);
                if !matched {
                    return false;
                }
            }
        }

        if let Some((text, fuzzy)) = &self.label {
            let label = match self.store.label(&fact.concept) {
                Some(l) => l,
                None => return false,
            };
            let matched = if *fuzzy {
                normalize_label(label).contains(&normalize_label(text))
            } else {
                label.contains(text.as_str())
            };
            if !matched {
                return false;
            }
        }

        if let Some(year) = self.fiscal_year {
            if fact.fiscal_year != Some(year) {
                return false;
            }
        }
        if let Some(period) = self.fiscal_period {
            if fact.fiscal_period != Some(period) {
                return false;
            }
        }
        if let Some((start, end)) = self.date_range {
            if fact.period_end < start || fact.period_end > end {
                return false;
            }
        }
        if let Some(cutoff) = self.as_of {
            match fact.filing_date {
                Some(filed) if filed <= cutoff => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_quality {
            if fact.data_quality < min {
                return false;
            }
        }
        if let Some(threshold) = self.min_confidence {
            if fact.confidence_score < threshold {
                return false;
            }
        }
        if let Some(statement) = self.statement_type {
            if fact.statement_type != statement {
                return false;
            }
        }
        if let Some(forms) = &self.form_types {
            match &fact.form_type {
                Some(form) if forms.iter().any(|f| f == form) => {}
                _ => return false,
            }
        }
        if self.default_member_only && !fact.is_default_member() {
            return false;
        }

        true
    }

    /// Candidate facts, pulled from the narrowest applicable index.
    fn candidates(&self) -> Vec<&'a Fact> {
        // An exact concept filter or a fiscal filter can use an index; everything else
        // scans. Post-filtering applies the full predicate set either way.
        if let Some((concept, true)) = &self.concept {
            return self
                .store
                .ids_by_concept(concept)
                .iter()
                .filter_map(|id| self.store.get(*id))
                .collect();
        }
        if let (Some(year), Some(period)) = (self.fiscal_year, self.fiscal_period) {
            return self
                .store
                .ids_by_fiscal(year, period)
                .iter()
                .filter_map(|id| self.store.get(*id))
                .collect();
        }
        if let Some(statement) = self.statement_type {
            return self
                .store
                .ids_by_statement(statement)
                .iter()
                .filter_map(|id| self.store.get(*id))
                .collect();
        }
        self.store.facts().iter().collect()
    }

    /// Runs the query, returning matching facts sorted newest-period first.
    pub fn execute(&self) -> Vec<&'a Fact> {
        let mut results: Vec<&Fact> = self
            .candidates()
            .into_iter()
            .filter(|f| self.matches(f))
            .collect();

        results.sort_by(|a, b| period_order(a, b));

        if let Some(n) = self.latest_periods {
            let mut periods: Vec<(Option<NaiveDate>, NaiveDate)> = Vec::new();
            for fact in &results {
                let key = (fact.period_start, fact.period_end);
                if !periods.contains(&key) {
                    periods.push(key);
                }
            }
            periods.truncate(n);
            results.retain(|f| periods.contains(&(f.period_start, f.period_end)));
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        results
    }

    /// Counts matches without materializing the sorted result.
    pub fn count(&self) -> usize {
        self.candidates()
            .into_iter()
            .filter(|f| self.matches(f))
            .count()
    }

    /// Pivots matching numeric facts into concept rows × period-end columns.
    ///
    /// When several facts land in the same cell, the latest filing wins (the results
    /// are already sorted newest-filing first within a period).
    pub fn pivot_by_period(&self) -> PeriodPivot {
        let facts = self.execute();
        let mut columns: Vec<NaiveDate> = facts.iter().map(|f| f.period_end).collect();
        columns.sort_unstable();
        columns.dedup();
        columns.reverse();

        let mut rows: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        for fact in &facts {
            if let Some(n) = fact.numeric_value {
                rows.entry(fact.concept.clone())
                    .or_default()
                    .entry(fact.period_end)
                    .or_insert(n);
            }
        }

        PeriodPivot { columns, rows }
    }

    /// Renders matching facts as CSV: concept, label, period, value, unit, form, filed.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("concept,label,period_start,period_end,value,unit,form,filed\n");
        for fact in self.execute() {
            let label = self.store.label(&fact.concept).unwrap_or("");
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                fact.concept,
                csv_escape(label),
                fact.period_start.map(|d| d.to_string()).unwrap_or_default(),
                fact.period_end,
                fact.numeric_value
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| csv_escape(&fact.raw)),
                fact.unit,
                fact.form_type.as_deref().unwrap_or(""),
                fact.filing_date.map(|d| d.to_string()).unwrap_or_default(),
            ));
        }
        out
    }

    /// Renders matching facts as a compact plain-text block for LLM consumption:
    /// one line per fact, label-first, values with period and provenance.
    pub fn to_llm_context(&self) -> String {
        let mut out = String::new();
        for fact in self.execute() {
            let label = self
                .store
                .label(&fact.concept)
                .unwrap_or_else(|| fact.local_name());
            let period = match fact.period_start {
                Some(start) => format!("{} to {}", start, fact.period_end),
                None => format!("as of {}", fact.period_end),
            };
            let value = fact
                .numeric_value
                .map(|n| format_compact(n))
                .unwrap_or_else(|| fact.raw.clone());
            out.push_str(&format!(
                "{}: {} {} ({}{})\n",
                label,
                value,
                fact.unit,
                period,
                fact.form_type
                    .as_deref()
                    .map(|f| format!(", {}", f))
                    .unwrap_or_default(),
            ));
        }
        out
    }
}

/// Concept rows pivoted across period-end columns.
#[derive(Debug, Clone)]
pub struct PeriodPivot {
    /// Period-end dates, newest first.
    pub columns: Vec<NaiveDate>,

    /// Concept → (period end → numeric value).
    pub rows: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl PeriodPivot {
    pub fn value(&self, concept: &str, period_end: NaiveDate) -> Option<f64> {
        self.rows.get(concept).and_then(|r| r.get(&period_end)).copied()
    }
}

fn normalize_label(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Formats large numbers with thousands separators for readability in text output.
fn format_compact(n: f64) -> String {
    if n.abs() >= 1000.0 && n.fract() == 0.0 {
        let raw = format!("{}", n.abs() as i64);
        let mut grouped = String::new();
        for (i, c) in raw.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let grouped: String = grouped.chars().rev().collect();
        if n < 0.0 {
            format!("-{}", grouped)
        } else {
            grouped
        }
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::FactBuilder;
    use crate::units::Unit;

    fn store_with_facts() -> FactStore {
        let mut store = FactStore::new();
        let usd = Unit::parse("USD");

        let mut add = |concept: &str, year: i32, fp: FiscalPeriod, end: (i32, u32, u32), n: f64, filed: (i32, u32, u32), form: &str| {
            let end = NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap();
            let filed = NaiveDate::from_ymd_opt(filed.0, filed.1, filed.2).unwrap();
            store.add(
                FactBuilder::new(concept, usd.clone(), end)
                    .numeric(n)
                    .period(None, end)
                    .fiscal(Some(year), Some(fp))
                    .provenance(Some(filed), Some(form.to_string()), None)
                    .build(),
            );
        };

        add("us-gaap:Revenues", 2023, FiscalPeriod::FY, (2023, 9, 30), 383.0, (2023, 11, 3), "10-K");
        add("us-gaap:Revenues", 2022, FiscalPeriod::FY, (2022, 9, 24), 394.0, (2022, 10, 28), "10-K");
        add("us-gaap:Revenues", 2023, FiscalPeriod::Q3, (2023, 7, 1), 81.8, (2023, 8, 4), "10-Q");
        add("us-gaap:NetIncomeLoss", 2023, FiscalPeriod::FY, (2023, 9, 30), 97.0, (2023, 11, 3), "10-K");

        store.set_label("us-gaap:Revenues", "Revenues");
        store.set_label("us-gaap:NetIncomeLoss", "Net Income (Loss)");
        store.freeze();
        store
    }

    #[test]
    fn test_concept_exact_and_fuzzy() {
        let store = store_with_facts();
        assert_eq!(
            FactQuery::new(&store)
                .by_concept("us-gaap:Revenues", true)
                .count(),
            3
        );
        assert_eq!(FactQuery::new(&store).by_concept("revenues", false).count(), 3);
        assert_eq!(FactQuery::new(&store).by_concept("netincome", false).count(), 1);
    }

    #[test]
    fn test_label_match() {
        let store = store_with_facts();
        assert_eq!(
            FactQuery::new(&store).by_label("net income", true).count(),
            1
        );
        assert_eq!(FactQuery::new(&store).by_label("net income", false).count(), 0);
    }

    #[test]
    fn test_fiscal_filters() {
        let store = store_with_facts();
        let results = FactQuery::new(&store)
            .by_fiscal_year(2023)
            .by_fiscal_period(FiscalPeriod::FY)
            .execute();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_as_of() {
        let store = store_with_facts();
        let cutoff = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
        let results = FactQuery::new(&store).as_of(cutoff).execute();
        // Only the Q3 10-Q and FY2022 10-K were filed by Sep 2023.
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_latest_sorting() {
        let store = store_with_facts();
        let results = FactQuery::new(&store)
            .by_concept("us-gaap:Revenues", true)
            .latest(1)
            .execute();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].numeric_value, Some(383.0));
    }

    #[test]
    fn test_commutativity() {
        let store = store_with_facts();
        let a = FactQuery::new(&store)
            .by_concept("us-gaap:Revenues", true)
            .by_form_type("10-K")
            .execute();
        let b = FactQuery::new(&store)
            .by_form_type("10-K")
            .by_concept("us-gaap:Revenues", true)
            .execute();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.numeric_value, y.numeric_value);
        }
    }

    #[test]
    fn test_repeatable_terminals() {
        let store = store_with_facts();
        let query = FactQuery::new(&store).by_concept("us-gaap:Revenues", true);
        let first = query.execute();
        let second = query.execute();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_pivot() {
        let store = store_with_facts();
        let pivot = FactQuery::new(&store)
            .by_concept("us-gaap:Revenues", true)
            .pivot_by_period();
        assert_eq!(pivot.columns.len(), 3);
        let fy2023 = NaiveDate::from_ymd_opt(2023, 9, 30).unwrap();
        assert_eq!(pivot.value("us-gaap:Revenues", fy2023), Some(383.0));
    }

    #[test]
    fn test_csv_header() {
        let store = store_with_facts();
        let csv = FactQuery::new(&store).by_concept("netincome", false).to_csv();
        assert!(csv.starts_with("concept,label,"));
        assert!(csv.contains("us-gaap:NetIncomeLoss"));
        assert!(csv.contains("Net Income (Loss)"));
    }

    #[test]
    fn test_llm_context() {
        let store = store_with_facts();
        let text = FactQuery::new(&store)
            .by_concept("us-gaap:NetIncomeLoss", true)
            .to_llm_context();
        assert!(text.contains("Net Income (Loss): 97"));
        assert!(text.contains("10-K"));
    }
}
