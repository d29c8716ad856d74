//! Multi-filing stitching: one continuous view from N filings.
//!
//! A single filing shows at most a handful of periods. Stitching merges the fact
//! stores of many filings of the same entity into one new store with three
//! transformations applied:
//!
//! 1. **Deduplication.** For each `(concept, context, unit)` key, every fact is kept
//!    but all except the latest-filed one are marked `is_restated`; the visible value
//!    always comes from the most recent filing.
//! 2. **Split adjustment.** Per-share and share-count facts filed before a detected
//!    split are rescaled (see [`crate::splits`]); originals stay behind as restated.
//! 3. **Quarterization.** Discrete Q2/Q3/Q4 values are derived by subtracting
//!    cumulative periods (`Q4 = FY − YTD-9M` and friends), gated on additivity.
//!    Q4 EPS cannot be subtracted and is instead computed from derived Q4 net income
//!    over derived Q4 weighted shares (`4·FY − 3·YTD9`).
//!
//! The input stores are never modified; stitching always produces a fresh store.
//! Running the stitcher over its own output is idempotent.

use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::config::StitchConfig;
use crate::facts::{
    Context, DataQuality, Fact, FactStore, FiscalPeriod, Period, PeriodType, Value,
};
use crate::splits::{StockSplit, adjust_fact, detect_splits};
use crate::units::PeriodBucket;

const Q4_FROM_YTD9: &str = "derived_q4_fy_minus_ytd9";
const Q4_FROM_QUARTERS: &str = "derived_q4_fy_minus_q1q2q3";
const Q3_FROM_YTD: &str = "derived_q3_ytd9_minus_ytd6";
const Q2_FROM_YTD: &str = "derived_q2_ytd6_minus_q1";
const Q4_EPS: &str = "derived_q4_eps";
const Q4_WAS: &str = "derived_q4_was_4fy_minus_3ytd9";

/// Stitches filings together according to a [`StitchConfig`].
#[derive(Debug, Clone, Default)]
pub struct Stitcher {
    config: StitchConfig,
}

impl Stitcher {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Merges the given stores into a single stitched store.
    ///
    /// Facts are laid down in a total order of `(period_end desc, filing_date desc)`.
    /// The output store is frozen.
    pub fn stitch(&self, stores: &[&FactStore]) -> FactStore {
        let mut merged: Vec<(Fact, String)> = Vec::new();
        for store in stores {
            for (_, fact) in store.iter() {
                let entity = store
                    .context(fact.context)
                    .map(|c| c.entity.clone())
                    .unwrap_or_default();
                merged.push((fact.clone(), entity));
            }
        }

        merged.sort_by(|(a, _), (b, _)| {
            b.period_end
                .cmp(&a.period_end)
                .then(b.filing_date.cmp(&a.filing_date))
        });

        // Deduplicate: latest filing date per (concept, entity, period, dims, unit)
        // stays visible; the rest are restated.
        let mut seen: HashMap<DedupKey, ()> = HashMap::new();
        let mut deduped: Vec<(Fact, String)> = Vec::with_capacity(merged.len());
        for (mut fact, entity) in merged {
            let key = DedupKey::of(&fact, &entity);
            if seen.insert(key, ()).is_some() {
                fact.is_restated = true;
            }
            deduped.push((fact, entity));
        }

        // Split adjustments replace visible per-share/share-count facts.
        let splits = if self.config.apply_split_adjustments {
            let scan = Self::build_store(&deduped);
            detect_splits(&scan)
        } else {
            Vec::new()
        };
        if !splits.is_empty() {
            tracing::debug!("Applying {} split adjustment(s)", splits.len());
            deduped = Self::apply_splits(deduped, &splits);
        }

        // Quarter derivation over the visible facts.
        if self.config.derive_q4 {
            let derived = self.derive_quarters(&deduped);
            deduped.extend(derived);
        }

        if self.config.periods > 0 {
            deduped = Self::trim_periods(deduped, self.config.periods);
        }

        let mut out = Self::build_store(&deduped);
        out.freeze();
        out
    }

    fn build_store(facts: &[(Fact, String)]) -> FactStore {
        let mut store = FactStore::new();
        for (fact, entity) in facts {
            let period = match fact.period_start {
                Some(start) => Period::Duration {
                    start,
                    end: fact.period_end,
                },
                None => Period::Instant(fact.period_end),
            };
            let context = Context::new(entity.clone(), period)
                .with_dimensions(fact.dimensions.clone());
            let context_id = store.intern_context(context);
            let mut fact = fact.clone();
            fact.context = context_id;
            store.add(fact);
        }
        store
    }

    fn apply_splits(
        facts: Vec<(Fact, String)>,
        splits: &[StockSplit],
    ) -> Vec<(Fact, String)> {
        let mut out = Vec::with_capacity(facts.len());
        for (fact, entity) in facts {
            if !fact.is_restated {
                if let Some(adjusted) = adjust_fact(&fact, splits) {
                    // Original stays behind in the restated chain.
                    let mut original = fact.clone();
                    original.is_restated = true;
                    out.push((original, entity.clone()));
                    out.push((adjusted, entity));
                    continue;
                }
            }
            out.push((fact, entity));
        }
        out
    }

    /// Retains facts in the N most recent distinct period-end dates.
    fn trim_periods(facts: Vec<(Fact, String)>, n: usize) -> Vec<(Fact, String)> {
        let mut ends: Vec<NaiveDate> = facts.iter().map(|(f, _)| f.period_end).collect();
        ends.sort_unstable();
        ends.dedup();
        ends.reverse();
        ends.truncate(n);
        facts
            .into_iter()
            .filter(|(f, _)| ends.contains(&f.period_end))
            .collect()
    }

    /// Derives missing discrete quarters from cumulative periods.
    fn derive_quarters(&self, facts: &[(Fact, String)]) -> Vec<(Fact, String)> {
        // Group visible default-member facts by (concept, unit, entity, fiscal_year).
        let mut groups: BTreeMap<(String, String, String, i32), Vec<&Fact>> = BTreeMap::new();
        for (fact, entity) in facts {
            if fact.is_restated || !fact.is_default_member() {
                continue;
            }
            let Some(year) = fact.fiscal_year else { continue };
            if fact.period_start.is_none() {
                continue;
            }
            groups
                .entry((
                    fact.concept.clone(),
                    fact.unit.canonical.clone(),
                    entity.clone(),
                    year,
                ))
                .or_default()
                .push(fact);
        }

        let mut derived: Vec<(Fact, String)> = Vec::new();
        let mut was_by_year: HashMap<(String, i32), Fact> = HashMap::new();
        let mut net_income_q4: HashMap<(String, i32), Fact> = HashMap::new();

        for ((concept, _unit, entity, year), group) in &groups {
            let spans = PeriodSpans::collect(group);

            // EPS and weighted shares are handled by the dedicated derivation below.
            let additive = group
                .first()
                .map(|f| f.is_additive())
                .unwrap_or(false);
            if !additive {
                continue;
            }

            // Q2 = YTD6 − Q1, when Q1 starts the same fiscal year as the YTD span.
            if spans.q2.is_none() {
                if let (Some(ytd6), Some(q1)) = (spans.ytd6, spans.q1) {
                    if q1.period_start == ytd6.period_start {
                        if let Some(fact) =
                            derive_subtraction(ytd6, q1, FiscalPeriod::Q2, Q2_FROM_YTD)
                        {
                            derived.push((fact, entity.clone()));
                        }
                    }
                }
            }

            // Q3 = YTD9 − YTD6.
            if spans.q3.is_none() {
                if let (Some(ytd9), Some(ytd6)) = (spans.ytd9, spans.ytd6) {
                    if let Some(fact) =
                        derive_subtraction(ytd9, ytd6, FiscalPeriod::Q3, Q3_FROM_YTD)
                    {
                        derived.push((fact, entity.clone()));
                    }
                }
            }

            // Q4 = FY − YTD9 preferred, else FY − (Q1 + Q2 + Q3).
            if spans.q4.is_none() {
                let fact = match (spans.fy, spans.ytd9) {
                    (Some(fy), Some(ytd9)) => {
                        derive_subtraction(fy, ytd9, FiscalPeriod::Q4, Q4_FROM_YTD9)
                    }
                    (Some(fy), None) => {
                        match (spans.q1, spans.q2, spans.q3) {
                            (Some(q1), Some(q2), Some(q3)) => {
                                let sum = q1.numeric_value.unwrap_or(0.0)
                                    + q2.numeric_value.unwrap_or(0.0)
                                    + q3.numeric_value.unwrap_or(0.0);
                                derive_q4_from_sum(fy, sum, q3)
                            }
                            _ => None,
                        }
                    }
                    _ => None,
                };
                if let Some(fact) = fact {
                    if is_net_income(concept) {
                        net_income_q4.insert((entity.clone(), *year), fact.clone());
                    }
                    derived.push((fact, entity.clone()));
                }
            } else if let Some(q4) = spans.q4 {
                if is_net_income(concept) {
                    net_income_q4.insert((entity.clone(), *year), q4.clone());
                }
            }
        }

        // Weighted average shares: Q4_WAS = 4·FY − 3·YTD9, fallback FY.
        for ((concept, _unit, entity, year), group) in &groups {
            if !is_weighted_shares(concept) {
                continue;
            }
            let spans = PeriodSpans::collect(group);
            if spans.q4.is_some() {
                if let Some(q4) = spans.q4 {
                    was_by_year.insert((entity.clone(), *year), q4.clone());
                }
                continue;
            }
            let Some(fy) = spans.fy else { continue };
            let Some(fy_value) = fy.numeric_value else { continue };

            let (value, context) = match spans.ytd9.and_then(|f| f.numeric_value) {
                Some(ytd9_value) => (4.0 * fy_value - 3.0 * ytd9_value, Q4_WAS),
                None => (fy_value, Q4_WAS),
            };

            let mut fact = q4_template(fy, spans.ytd9);
            fact.numeric_value = Some(value);
            fact.value = Value::from_numeric(value, &fact.unit);
            fact.raw = format!("{}", value);
            fact.calculation_context = Some(context.to_string());
            fact.confidence_score = (fy.confidence_score * 0.9).clamp(0.0, 1.0);
            if value <= 0.0 {
                fact.data_quality = DataQuality::Low;
            }
            was_by_year.insert((entity.clone(), *year), fact.clone());
            derived.push((fact, entity.clone()));
        }

        // Derived Q4 EPS = derived Q4 net income / derived Q4 weighted shares.
        for ((concept, _unit, entity, year), group) in &groups {
            if !is_eps(concept) {
                continue;
            }
            let spans = PeriodSpans::collect(group);
            if spans.q4.is_some() {
                continue;
            }
            let Some(net_income) = net_income_q4.get(&(entity.clone(), *year)) else {
                continue;
            };
            let Some(shares) = was_by_year.get(&(entity.clone(), *year)) else {
                continue;
            };
            let (Some(ni), Some(ws)) = (net_income.numeric_value, shares.numeric_value) else {
                continue;
            };
            if ws <= 0.0 {
                continue;
            }
            let Some(template_src) = spans.fy.or(spans.ytd9) else { continue };

            let mut fact = template_src.clone();
            fact.period_start = net_income.period_start;
            fact.period_end = net_income.period_end;
            fact.period_type = PeriodType::Duration;
            fact.fiscal_period = Some(FiscalPeriod::Q4);
            let eps = ni / ws;
            fact.numeric_value = Some(eps);
            fact.value = Value::from_numeric(eps, &fact.unit);
            fact.raw = format!("{}", eps);
            fact.calculation_context = Some(Q4_EPS.to_string());
            fact.confidence_score = (template_src.confidence_score * 0.8).clamp(0.0, 1.0);
            fact.data_quality = if shares.data_quality == DataQuality::Low {
                DataQuality::Low
            } else {
                DataQuality::Medium
            };
            derived.push((fact, entity.clone()));
        }

        derived
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey {
    hash: u64,
}

impl DedupKey {
    fn of(fact: &Fact, entity: &str) -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        fact.concept.hash(&mut hasher);
        entity.hash(&mut hasher);
        fact.period_start.hash(&mut hasher);
        fact.period_end.hash(&mut hasher);
        fact.dimensions.hash(&mut hasher);
        fact.unit.canonical.hash(&mut hasher);
        fact.calculation_context.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
        }
    }
}

/// The cumulative and discrete spans of one (concept, fiscal year) group.
#[derive(Debug, Clone, Copy, Default)]
struct PeriodSpans<'a> {
    q1: Option<&'a Fact>,
    q2: Option<&'a Fact>,
    q3: Option<&'a Fact>,
    q4: Option<&'a Fact>,
    ytd6: Option<&'a Fact>,
    ytd9: Option<&'a Fact>,
    fy: Option<&'a Fact>,
}

impl<'a> PeriodSpans<'a> {
    fn collect(group: &[&'a Fact]) -> Self {
        let mut spans = PeriodSpans::default();
        // Derived facts fill the same slots as reported ones, which is what makes
        // re-stitching idempotent.
        for fact in group {
            let Some(start) = fact.period_start else { continue };
            match PeriodBucket::from_dates(start, fact.period_end) {
                PeriodBucket::Quarter => match fact.fiscal_period {
                    Some(FiscalPeriod::Q1) => spans.q1 = pick(spans.q1, fact),
                    Some(FiscalPeriod::Q2) => spans.q2 = pick(spans.q2, fact),
                    Some(FiscalPeriod::Q3) => spans.q3 = pick(spans.q3, fact),
                    Some(FiscalPeriod::Q4) => spans.q4 = pick(spans.q4, fact),
                    _ => {}
                },
                PeriodBucket::Ytd6M => spans.ytd6 = pick(spans.ytd6, fact),
                PeriodBucket::Ytd9M => spans.ytd9 = pick(spans.ytd9, fact),
                PeriodBucket::Annual => spans.fy = pick(spans.fy, fact),
                PeriodBucket::Other => {}
            }
        }
        spans
    }
}

fn pick<'a>(current: Option<&'a Fact>, candidate: &'a Fact) -> Option<&'a Fact> {
    match current {
        Some(existing) if existing.filing_date >= candidate.filing_date => Some(existing),
        _ => Some(candidate),
    }
}

/// Derives `minuend − subtrahend` as a discrete quarter fact.
fn derive_subtraction(
    minuend: &Fact,
    subtrahend: &Fact,
    fiscal_period: FiscalPeriod,
    method: &str,
) -> Option<Fact> {
    let a = minuend.numeric_value?;
    let b = subtrahend.numeric_value?;

    let mut fact = minuend.clone();
    fact.period_start = Some(subtrahend.period_end + Duration::days(1));
    fact.period_end = minuend.period_end;
    fact.period_type = PeriodType::Duration;
    fact.fiscal_period = Some(fiscal_period);
    let value = a - b;
    fact.numeric_value = Some(value);
    fact.value = Value::from_numeric(value, &fact.unit);
    fact.raw = format!("{}", value);
    fact.calculation_context = Some(method.to_string());
    fact.confidence_score = (minuend
        .confidence_score
        .min(subtrahend.confidence_score)
        * 0.9)
        .clamp(0.0, 1.0);
    fact.data_quality = DataQuality::Medium;
    fact.filing_date = minuend.filing_date.max(subtrahend.filing_date);
    Some(fact)
}

fn derive_q4_from_sum(fy: &Fact, quarters_sum: f64, q3: &Fact) -> Option<Fact> {
    let fy_value = fy.numeric_value?;
    let mut fact = fy.clone();
    fact.period_start = Some(q3.period_end + Duration::days(1));
    fact.period_end = fy.period_end;
    fact.period_type = PeriodType::Duration;
    fact.fiscal_period = Some(FiscalPeriod::Q4);
    let value = fy_value - quarters_sum;
    fact.numeric_value = Some(value);
    fact.value = Value::from_numeric(value, &fact.unit);
    fact.raw = format!("{}", value);
    fact.calculation_context = Some(Q4_FROM_QUARTERS.to_string());
    fact.confidence_score = (fy.confidence_score * 0.85).clamp(0.0, 1.0);
    fact.data_quality = DataQuality::Medium;
    Some(fact)
}

/// Template for a synthesized Q4 fact spanning from the YTD9 end to the FY end.
fn q4_template(fy: &Fact, ytd9: Option<&Fact>) -> Fact {
    let mut fact = fy.clone();
    fact.period_start = ytd9
        .map(|f| f.period_end + Duration::days(1))
        .or(fy.period_start);
    fact.period_type = PeriodType::Duration;
    fact.fiscal_period = Some(FiscalPeriod::Q4);
    fact.data_quality = DataQuality::Medium;
    fact
}

fn is_net_income(concept: &str) -> bool {
    let local = concept.rsplit_once(':').map(|(_, l)| l).unwrap_or(concept);
    local == "NetIncomeLoss" || local == "ProfitLoss"
}

fn is_weighted_shares(concept: &str) -> bool {
    let local = concept.rsplit_once(':').map(|(_, l)| l).unwrap_or(concept);
    local.contains("WeightedAverageNumberOf") && local.contains("Shares")
}

fn is_eps(concept: &str) -> bool {
    let local = concept.rsplit_once(':').map(|(_, l)| l).unwrap_or(concept);
    local.starts_with("EarningsPerShare")
}
