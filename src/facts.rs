//! The fact data model and the indexed in-memory fact store.
//!
//! A [`Fact`] is the atomic record of the library: one reported value for one concept in
//! one context with one unit, plus filing provenance and quality metadata. Facts are
//! immutable once inserted; corrections and derivations always create new facts (the
//! stitching engine produces whole new stores rather than editing in place).
//!
//! [`FactStore`] holds the facts of one parsed filing or one companyfacts download.
//! It is append-only during ingestion, then frozen; a frozen store is safe to share
//! across threads for reads. Five indices back the query engine: concept, period,
//! statement type, form type, and fiscal (year, period).
//!
//! Contexts are interned: two logically equal contexts (same entity, period and
//! dimension set) share one [`ContextId`] within a store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::error::{FilingError, Result};
use crate::units::{Unit, UnitType, is_additive};

/// Index of an interned [`Context`] within one [`FactStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub usize);

/// Index of a [`Fact`] within one [`FactStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactId(pub usize);

/// Whether a fact asserts a point-in-time value or a flow over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    Instant,
    Duration,
}

/// Fiscal period designator as reported by the SEC (`fp` field) or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
    FY,
}

impl FromStr for FiscalPeriod {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" => Ok(FiscalPeriod::Q1),
            "Q2" => Ok(FiscalPeriod::Q2),
            "Q3" => Ok(FiscalPeriod::Q3),
            "Q4" => Ok(FiscalPeriod::Q4),
            "FY" => Ok(FiscalPeriod::FY),
            other => Err(FilingError::InvalidFormat(format!(
                "Unknown fiscal period: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FiscalPeriod::Q1 => "Q1",
            FiscalPeriod::Q2 => "Q2",
            FiscalPeriod::Q3 => "Q3",
            FiscalPeriod::Q4 => "Q4",
            FiscalPeriod::FY => "FY",
        };
        f.write_str(s)
    }
}

/// Which financial statement a fact most plausibly belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementType {
    Income,
    Balance,
    CashFlow,
    Equity,
    Other,
}

impl StatementType {
    /// Infers the statement a concept belongs to from its local name.
    ///
    /// This is a coarse keyword heuristic; presentation-tree membership is authoritative
    /// when a full XBRL document is available, and the assembler overrides this value
    /// for facts it binds to a statement role.
    pub fn infer(concept: &str) -> Self {
        let local = concept.rsplit_once(':').map(|(_, l)| l).unwrap_or(concept);

        const CASH_FLOW: &[&str] = &[
            "CashProvidedByUsedIn",
            "CashAndCashEquivalentsPeriodIncrease",
            "PaymentsTo",
            "PaymentsOf",
            "PaymentsFor",
            "ProceedsFrom",
            "DepreciationDepletionAndAmortization",
        ];
        const INCOME: &[&str] = &[
            "Revenue",
            "CostOf",
            "GrossProfit",
            "OperatingExpense",
            "OperatingIncome",
            "NetIncome",
            "EarningsPerShare",
            "IncomeTaxExpense",
            "InterestExpense",
            "ResearchAndDevelopment",
            "SellingGeneralAndAdministrative",
        ];
        const BALANCE: &[&str] = &[
            "Assets",
            "Liabilities",
            "StockholdersEquity",
            "CashAndCashEquivalentsAtCarryingValue",
            "Inventory",
            "AccountsReceivable",
            "AccountsPayable",
            "LongTermDebt",
            "Goodwill",
            "RetainedEarnings",
            "CommonStockValue",
        ];
        const EQUITY: &[&str] = &[
            "TreasuryStock",
            "DividendsDeclared",
            "StockIssuedDuringPeriod",
            "StockRepurchased",
        ];

        // Cash flow first: "PaymentsToAcquire..." would otherwise match balance fragments.
        if CASH_FLOW.iter().any(|k| local.contains(k)) {
            return StatementType::CashFlow;
        }
        if EQUITY.iter().any(|k| local.contains(k)) {
            return StatementType::Equity;
        }
        if INCOME.iter().any(|k| local.contains(k)) {
            return StatementType::Income;
        }
        if BALANCE.iter().any(|k| local.contains(k)) {
            return StatementType::Balance;
        }
        StatementType::Other
    }
}

/// Reliability grade assigned at parse time and refined by later stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

/// XBRL `decimals` attribute: a precision exponent or the INF sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decimals {
    Value(i32),
    Infinite,
}

impl Decimals {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("INF") {
            Some(Decimals::Infinite)
        } else {
            s.parse::<i32>().ok().map(Decimals::Value)
        }
    }
}

/// A typed fact value. The tag is decided at parse time by the unit normalizer,
/// replacing lazy "compute numeric on access" semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Monetary(f64),
    Shares(f64),
    PerShare(f64),
    Ratio(f64),
    Date(NaiveDate),
    Text(String),
    Unknown(String),
}

impl Value {
    /// Tags a raw lexical value according to the already-canonicalized unit.
    pub fn from_lexical(raw: &str, unit: &Unit) -> Self {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Value::Date(date);
        }
        let numeric = trimmed.replace(',', "").parse::<f64>();
        match (numeric, unit.unit_type) {
            (Ok(n), UnitType::Monetary) => Value::Monetary(n),
            (Ok(n), UnitType::Shares) => Value::Shares(n),
            (Ok(n), UnitType::PerShare) => Value::PerShare(n),
            (Ok(n), UnitType::Ratio) => Value::Ratio(n),
            (Ok(n), UnitType::Other) => Value::Ratio(n),
            (Err(_), _) => {
                if trimmed.is_empty() {
                    Value::Unknown(String::new())
                } else {
                    Value::Text(trimmed.to_string())
                }
            }
        }
    }

    /// Re-tags a numeric amount with the same variant family as the unit.
    pub fn from_numeric(n: f64, unit: &Unit) -> Self {
        match unit.unit_type {
            UnitType::Monetary => Value::Monetary(n),
            UnitType::Shares => Value::Shares(n),
            UnitType::PerShare => Value::PerShare(n),
            UnitType::Ratio | UnitType::Other => Value::Ratio(n),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Monetary(n) | Value::Shares(n) | Value::PerShare(n) | Value::Ratio(n) => {
                Some(*n)
            }
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }
}

/// The period half of a context: an instant date or a closed date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Instant(NaiveDate),
    Duration { start: NaiveDate, end: NaiveDate },
}

impl Period {
    pub fn end(&self) -> NaiveDate {
        match self {
            Period::Instant(d) => *d,
            Period::Duration { end, .. } => *end,
        }
    }

    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            Period::Instant(_) => None,
            Period::Duration { start, .. } => Some(*start),
        }
    }

    pub fn period_type(&self) -> PeriodType {
        match self {
            Period::Instant(_) => PeriodType::Instant,
            Period::Duration { .. } => PeriodType::Duration,
        }
    }
}

/// The scoping tuple of a fact: entity, period, and dimensional qualifiers.
///
/// Two contexts are equal iff all three components match; equal contexts within one
/// store share a single [`ContextId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    /// Entity identifier (CIK as reported in the instance, zero-padding preserved).
    pub entity: String,

    /// Instant or duration period.
    pub period: Period,

    /// Axis → member pairs. Empty for the default (undimensioned) context.
    pub dimensions: BTreeMap<String, String>,
}

impl Context {
    pub fn new(entity: impl Into<String>, period: Period) -> Self {
        Self {
            entity: entity.into(),
            period,
            dimensions: BTreeMap::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: BTreeMap<String, String>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn is_default(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// The atomic record: one reported value with full context and provenance.
///
/// Immutable once constructed and inserted into a store. Derived facts (quarterized,
/// split-adjusted) are new facts carrying the original provenance plus a non-null
/// `calculation_context` describing the method and operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Canonical concept string, prefixed form (`us-gaap:Revenues`).
    pub concept: String,

    /// Interned context within the owning store.
    pub context: ContextId,

    /// Canonicalized unit.
    pub unit: Unit,

    /// Raw lexical value as it appeared in the source.
    pub raw: String,

    /// Typed value; the tag was decided by the unit normalizer at parse time.
    pub value: Value,

    /// Scaled numeric value when applicable.
    pub numeric_value: Option<f64>,

    /// XBRL decimals attribute.
    pub decimals: Option<Decimals>,

    pub period_start: Option<NaiveDate>,
    pub period_end: NaiveDate,
    pub period_type: PeriodType,

    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<FiscalPeriod>,

    /// Provenance: when and in what submission this value was reported.
    pub filing_date: Option<NaiveDate>,
    pub form_type: Option<String>,
    pub accession: Option<String>,

    /// Inferred statement membership.
    pub statement_type: StatementType,

    /// Axis → member pairs, duplicated from the context for direct filtering.
    pub dimensions: BTreeMap<String, String>,

    pub data_quality: DataQuality,
    pub is_audited: bool,
    pub is_restated: bool,
    pub is_estimated: bool,

    /// Confidence in [0, 1].
    pub confidence_score: f64,

    /// Derived labels such as "revenue", "recurring", "operating".
    pub semantic_tags: Vec<String>,

    /// Non-null for derived facts: "derived_q4_fy_minus_ytd9", "split_adj_ratio_10.00", ...
    pub calculation_context: Option<String>,
}

impl Fact {
    /// Whether this fact may participate in add/subtract period derivations.
    pub fn is_additive(&self) -> bool {
        is_additive(
            &self.concept,
            &self.unit,
            self.period_type == PeriodType::Instant,
        )
    }

    /// Duration in days, None for instants.
    pub fn duration_days(&self) -> Option<i64> {
        self.period_start
            .map(|start| self.period_end.signed_duration_since(start).num_days())
    }

    /// Local concept name without the taxonomy prefix.
    pub fn local_name(&self) -> &str {
        self.concept
            .rsplit_once(':')
            .map(|(_, l)| l)
            .unwrap_or(&self.concept)
    }

    /// True when no dimensional qualifier applies.
    pub fn is_default_member(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// Builder used by parsers and engines to assemble facts with sensible defaults.
///
/// Audited defaults to true for 10-K forms; confidence defaults to 1.0 for reported
/// facts and is reduced by derivation stages.
#[derive(Debug, Clone)]
pub struct FactBuilder {
    fact: Fact,
}

impl FactBuilder {
    pub fn new(concept: impl Into<String>, unit: Unit, period_end: NaiveDate) -> Self {
        let unit_clone = unit.clone();
        Self {
            fact: Fact {
                concept: concept.into(),
                context: ContextId(0),
                unit,
                raw: String::new(),
                value: Value::Unknown(String::new()),
                numeric_value: None,
                decimals: None,
                period_start: None,
                period_end,
                period_type: PeriodType::Instant,
                fiscal_year: None,
                fiscal_period: None,
                filing_date: None,
                form_type: None,
                accession: None,
                statement_type: StatementType::Other,
                dimensions: BTreeMap::new(),
                data_quality: DataQuality::High,
                is_audited: false,
                is_restated: false,
                is_estimated: false,
                confidence_score: 1.0,
                semantic_tags: Vec::new(),
                calculation_context: None,
            },
        }
        .raw_value("", &unit_clone)
    }

    pub fn raw_value(mut self, raw: &str, unit: &Unit) -> Self {
        self.fact.raw = raw.to_string();
        self.fact.value = Value::from_lexical(raw, unit);
        self.fact.numeric_value = self.fact.value.as_f64();
        self
    }

    pub fn numeric(mut self, n: f64) -> Self {
        self.fact.value = Value::from_numeric(n, &self.fact.unit);
        self.fact.numeric_value = Some(n);
        self.fact.raw = format!("{}", n);
        self
    }

    pub fn period(mut self, start: Option<NaiveDate>, end: NaiveDate) -> Self {
        self.fact.period_start = start;
        self.fact.period_end = end;
        self.fact.period_type = if start.is_some() {
            PeriodType::Duration
        } else {
            PeriodType::Instant
        };
        self
    }

    pub fn fiscal(mut self, year: Option<i32>, period: Option<FiscalPeriod>) -> Self {
        self.fact.fiscal_year = year;
        self.fact.fiscal_period = period;
        self
    }

    pub fn provenance(
        mut self,
        filing_date: Option<NaiveDate>,
        form_type: Option<String>,
        accession: Option<String>,
    ) -> Self {
        self.fact.is_audited = form_type.as_deref() == Some("10-K");
        self.fact.filing_date = filing_date;
        self.fact.form_type = form_type;
        self.fact.accession = accession;
        self
    }

    pub fn dimensions(mut self, dimensions: BTreeMap<String, String>) -> Self {
        self.fact.dimensions = dimensions;
        self
    }

    pub fn decimals(mut self, decimals: Option<Decimals>) -> Self {
        self.fact.decimals = decimals;
        self
    }

    pub fn quality(mut self, quality: DataQuality) -> Self {
        self.fact.data_quality = quality;
        self
    }

    pub fn confidence(mut self, score: f64) -> Self {
        self.fact.confidence_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn statement(mut self, statement_type: StatementType) -> Self {
        self.fact.statement_type = statement_type;
        self
    }

    pub fn calculation_context(mut self, ctx: impl Into<String>) -> Self {
        self.fact.calculation_context = Some(ctx.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.fact.semantic_tags.push(tag.into());
        self
    }

    pub fn restated(mut self, restated: bool) -> Self {
        self.fact.is_restated = restated;
        self
    }

    /// Finalizes the fact, inferring statement membership if none was set explicitly.
    pub fn build(mut self) -> Fact {
        if self.fact.statement_type == StatementType::Other {
            self.fact.statement_type = StatementType::infer(&self.fact.concept);
        }
        self.fact
    }
}

/// Indexed, append-then-freeze store of facts for one filing or one entity download.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: Vec<Fact>,
    contexts: Vec<Context>,
    context_lookup: HashMap<Context, ContextId>,

    /// Standard labels keyed by concept, used by label-based queries.
    labels: HashMap<String, String>,

    by_concept: HashMap<String, Vec<FactId>>,
    by_period: HashMap<(Option<NaiveDate>, NaiveDate), Vec<FactId>>,
    by_statement: HashMap<StatementType, Vec<FactId>>,
    by_form: HashMap<String, Vec<FactId>>,
    by_fiscal: HashMap<(i32, FiscalPeriod), Vec<FactId>>,

    frozen: bool,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Interns a context, returning the shared id for logically equal contexts.
    pub fn intern_context(&mut self, context: Context) -> ContextId {
        if let Some(&id) = self.context_lookup.get(&context) {
            return id;
        }
        let id = ContextId(self.contexts.len());
        self.contexts.push(context.clone());
        self.context_lookup.insert(context, id);
        id
    }

    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(id.0)
    }

    /// Appends a fact and updates every index. Amortized O(1).
    ///
    /// # Panics
    ///
    /// Panics if the store has been frozen; parsers are the only writers and they
    /// finish before any consumer sees the store.
    pub fn add(&mut self, fact: Fact) -> FactId {
        assert!(!self.frozen, "FactStore is frozen");
        let id = FactId(self.facts.len());

        self.by_concept
            .entry(fact.concept.clone())
            .or_default()
            .push(id);
        self.by_period
            .entry((fact.period_start, fact.period_end))
            .or_default()
            .push(id);
        self.by_statement
            .entry(fact.statement_type)
            .or_default()
            .push(id);
        if let Some(form) = &fact.form_type {
            self.by_form.entry(form.clone()).or_default().push(id);
        }
        if let (Some(year), Some(period)) = (fact.fiscal_year, fact.fiscal_period) {
            self.by_fiscal.entry((year, period)).or_default().push(id);
        }

        self.facts.push(fact);
        id
    }

    /// Records the standard label for a concept.
    pub fn set_label(&mut self, concept: impl Into<String>, label: impl Into<String>) {
        assert!(!self.frozen, "FactStore is frozen");
        self.labels.insert(concept.into(), label.into());
    }

    pub fn label(&self, concept: &str) -> Option<&str> {
        self.labels.get(concept).map(String::as_str)
    }

    /// Marks ingestion complete. After this the store is read-only and may be shared
    /// across threads.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id.0)
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactId, &Fact)> {
        self.facts.iter().enumerate().map(|(i, f)| (FactId(i), f))
    }

    pub fn ids_by_concept(&self, concept: &str) -> &[FactId] {
        self.by_concept
            .get(concept)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids_by_period(&self, start: Option<NaiveDate>, end: NaiveDate) -> &[FactId] {
        self.by_period
            .get(&(start, end))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids_by_statement(&self, statement: StatementType) -> &[FactId] {
        self.by_statement
            .get(&statement)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids_by_form(&self, form: &str) -> &[FactId] {
        self.by_form.get(form).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids_by_fiscal(&self, year: i32, period: FiscalPeriod) -> &[FactId] {
        self.by_fiscal
            .get(&(year, period))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All concept names present in the store, sorted and deduplicated.
    pub fn concepts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_concept.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Facts for a concept, newest period first.
    pub fn facts_by_concept(&self, concept: &str) -> Vec<&Fact> {
        let mut facts: Vec<&Fact> = self
            .ids_by_concept(concept)
            .iter()
            .filter_map(|id| self.get(*id))
            .collect();
        facts.sort_by(|a, b| {
            b.period_end
                .cmp(&a.period_end)
                .then(b.filing_date.cmp(&a.filing_date))
        });
        facts
    }

    /// The most recently reported fact for a concept.
    pub fn latest_fact(&self, concept: &str) -> Option<&Fact> {
        self.facts_by_concept(concept).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fact(concept: &str, end: NaiveDate, n: f64) -> Fact {
        FactBuilder::new(concept, Unit::parse("USD"), end)
            .numeric(n)
            .period(None, end)
            .build()
    }

    #[test]
    fn test_value_tagging() {
        let usd = Unit::parse("USD");
        assert_eq!(Value::from_lexical("42.5", &usd), Value::Monetary(42.5));

        let shares = Unit::parse("shares");
        assert_eq!(
            Value::from_lexical("1000", &shares),
            Value::Shares(1000.0)
        );

        assert_eq!(
            Value::from_lexical("2023-09-30", &usd),
            Value::Date(NaiveDate::from_ymd_opt(2023, 9, 30).unwrap())
        );

        assert_eq!(
            Value::from_lexical("see note 7", &usd),
            Value::Text("see note 7".to_string())
        );
    }

    #[test]
    fn test_context_interning() {
        let mut store = FactStore::new();
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let a = store.intern_context(Context::new("0000320193", Period::Instant(date)));
        let b = store.intern_context(Context::new("0000320193", Period::Instant(date)));
        let c = store.intern_context(Context::new("0000320194", Period::Instant(date)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_indices() {
        let mut store = FactStore::new();
        let d1 = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2022, 12, 31).unwrap();

        store.add(sample_fact("us-gaap:Assets", d1, 100.0));
        store.add(sample_fact("us-gaap:Assets", d2, 90.0));
        store.add(sample_fact("us-gaap:Liabilities", d1, 40.0));
        store.freeze();

        assert_eq!(store.ids_by_concept("us-gaap:Assets").len(), 2);
        assert_eq!(store.ids_by_period(None, d1).len(), 2);
        assert_eq!(store.ids_by_statement(StatementType::Balance).len(), 3);

        let latest = store.latest_fact("us-gaap:Assets").unwrap();
        assert_eq!(latest.numeric_value, Some(100.0));
    }

    #[test]
    fn test_statement_inference() {
        assert_eq!(
            StatementType::infer("us-gaap:Revenues"),
            StatementType::Income
        );
        assert_eq!(
            StatementType::infer("us-gaap:Assets"),
            StatementType::Balance
        );
        assert_eq!(
            StatementType::infer("us-gaap:NetCashProvidedByUsedInOperatingActivities"),
            StatementType::CashFlow
        );
        assert_eq!(
            StatementType::infer("us-gaap:PaymentsToAcquirePropertyPlantAndEquipment"),
            StatementType::CashFlow
        );
        assert_eq!(
            StatementType::infer("custom:SomethingElse"),
            StatementType::Other
        );
    }

    #[test]
    fn test_period_invariant() {
        let d = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let fact = FactBuilder::new("us-gaap:Revenues", Unit::parse("USD"), d)
            .numeric(1.0)
            .period(Some(start), d)
            .build();
        assert_eq!(fact.period_type, PeriodType::Duration);
        assert!(fact.period_end >= fact.period_start.unwrap());
        assert_eq!(fact.duration_days(), Some(364));
    }

    #[test]
    fn test_fiscal_period_parse() {
        assert_eq!("FY".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::FY);
        assert_eq!("q2".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::Q2);
        assert!("Q5".parse::<FiscalPeriod>().is_err());
    }
}
