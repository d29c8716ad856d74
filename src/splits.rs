//! Stock split detection and retrospective adjustment.
//!
//! Issuers report splits as `StockSplitConversionRatio` facts. Once a split takes
//! effect, newly filed per-share and share-count figures are already adjusted by the
//! issuer, but figures from *earlier* filings are not. Mixing the two silently corrupts
//! EPS history, so the adjuster rescales historical facts by the cumulative ratio of
//! every split that happened after the fact's period but was not yet reflected in its
//! filing.

use chrono::NaiveDate;

use crate::facts::{Fact, FactStore, PeriodType};
use crate::units::UnitType;

/// Maximum staleness of a conversion-ratio fact: a ratio filed more than 280 days
/// after its period end is a historical recap, not a split announcement.
const MAX_FILING_LAG_DAYS: i64 = 280;

/// A split event may be reported as an instant or a short duration; anything longer
/// than a month is a summary over multiple events.
const MAX_EVENT_DURATION_DAYS: i64 = 31;

/// A detected stock split.
#[derive(Debug, Clone, PartialEq)]
pub struct StockSplit {
    /// Effective date (the ratio fact's period end).
    pub date: NaiveDate,

    /// Forward conversion ratio: 10.0 means ten post-split shares per pre-split share.
    pub ratio: f64,

    /// When the split was reported.
    pub filing_date: Option<NaiveDate>,

    pub accession: Option<String>,
}

/// Scans a store for split events.
///
/// Accepts conversion-ratio facts that were filed within [`MAX_FILING_LAG_DAYS`] of
/// their period end and are instants or at most month-long durations. Duplicate
/// reports of the same `(year, ratio)` collapse into one event. The result is sorted
/// ascending by date.
pub fn detect_splits(store: &FactStore) -> Vec<StockSplit> {
    let mut splits: Vec<StockSplit> = Vec::new();

    for fact in store.facts() {
        if !fact.local_name().contains("StockSplitConversionRatio") {
            continue;
        }
        let Some(ratio) = fact.numeric_value else {
            continue;
        };
        if ratio <= 0.0 || (ratio - 1.0).abs() < f64::EPSILON {
            continue;
        }

        if let Some(filed) = fact.filing_date {
            let lag = filed.signed_duration_since(fact.period_end).num_days();
            if lag > MAX_FILING_LAG_DAYS {
                continue;
            }
        }
        if fact.period_type == PeriodType::Duration {
            match fact.duration_days() {
                Some(days) if days <= MAX_EVENT_DURATION_DAYS => {}
                _ => continue,
            }
        }

        let year = fact.period_end.format("%Y").to_string();
        let duplicate = splits.iter().any(|s| {
            s.date.format("%Y").to_string() == year && (s.ratio - ratio).abs() < f64::EPSILON
        });
        if duplicate {
            continue;
        }

        splits.push(StockSplit {
            date: fact.period_end,
            ratio,
            filing_date: fact.filing_date,
            accession: fact.accession.clone(),
        });
    }

    splits.sort_by_key(|s| s.date);
    splits
}

/// The cumulative forward ratio that applies to one fact.
///
/// A split applies when it postdates the fact's period AND the fact was filed before
/// the split took effect (facts filed after are assumed already adjusted by the
/// issuer). Facts without a filing date are treated as pre-split reports.
pub fn cumulative_ratio(fact: &Fact, splits: &[StockSplit]) -> f64 {
    splits
        .iter()
        .filter(|split| split.date > fact.period_end)
        .filter(|split| match fact.filing_date {
            Some(filed) => filed <= split.date,
            None => true,
        })
        .map(|split| split.ratio)
        .product()
}

/// Returns the split-adjusted replacement for a fact, or None when no adjustment
/// applies.
///
/// Per-share values divide by the cumulative ratio, share counts multiply, and
/// everything else is untouched. The adjusted fact carries a
/// `split_adj_ratio_<ratio>` calculation context and the original's provenance.
pub fn adjust_fact(fact: &Fact, splits: &[StockSplit]) -> Option<Fact> {
    // Adjusting twice with the same split list must be the identity.
    if fact
        .calculation_context
        .as_deref()
        .is_some_and(|c| c.starts_with("split_adj_ratio_"))
    {
        return None;
    }
    let ratio = cumulative_ratio(fact, splits);
    if (ratio - 1.0).abs() < f64::EPSILON {
        return None;
    }
    let value = fact.numeric_value?;

    let adjusted_value = match fact.unit.unit_type {
        UnitType::PerShare => value / ratio,
        UnitType::Shares => value * ratio,
        _ => return None,
    };

    let mut adjusted = fact.clone();
    adjusted.numeric_value = Some(adjusted_value);
    adjusted.value = crate::facts::Value::from_numeric(adjusted_value, &fact.unit);
    adjusted.raw = format!("{}", adjusted_value);
    adjusted.calculation_context = Some(format!("split_adj_ratio_{:.2}", ratio));
    Some(adjusted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::FactBuilder;
    use crate::units::Unit;

    fn ratio_fact(
        period_end: (i32, u32, u32),
        filed: (i32, u32, u32),
        ratio: f64,
    ) -> Fact {
        let end = NaiveDate::from_ymd_opt(period_end.0, period_end.1, period_end.2).unwrap();
        FactBuilder::new(
            "us-gaap:StockholdersEquityNoteStockSplitConversionRatio1",
            Unit::parse("pure"),
            end,
        )
        .numeric(ratio)
        .period(None, end)
        .provenance(
            NaiveDate::from_ymd_opt(filed.0, filed.1, filed.2),
            Some("8-K".to_string()),
            Some("acc-split".to_string()),
        )
        .build()
    }

    fn eps_fact(period_end: (i32, u32, u32), filed: (i32, u32, u32), value: f64) -> Fact {
        let end = NaiveDate::from_ymd_opt(period_end.0, period_end.1, period_end.2).unwrap();
        let start = end - chrono::Duration::days(90);
        FactBuilder::new(
            "us-gaap:EarningsPerShareBasic",
            Unit::divide("USD", "shares"),
            end,
        )
        .numeric(value)
        .period(Some(start), end)
        .provenance(
            NaiveDate::from_ymd_opt(filed.0, filed.1, filed.2),
            Some("10-Q".to_string()),
            None,
        )
        .build()
    }

    #[test]
    fn test_detect_split() {
        let mut store = FactStore::new();
        store.add(ratio_fact((2024, 6, 10), (2024, 6, 12), 10.0));
        store.freeze();

        let splits = detect_splits(&store);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].ratio, 10.0);
        assert_eq!(
            splits[0].date,
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
    }

    #[test]
    fn test_stale_ratio_rejected() {
        let mut store = FactStore::new();
        // Filed over a year after the period end: a recap, not an event.
        store.add(ratio_fact((2020, 8, 28), (2024, 2, 1), 4.0));
        store.freeze();
        assert!(detect_splits(&store).is_empty());
    }

    #[test]
    fn test_duplicate_year_ratio_rejected() {
        let mut store = FactStore::new();
        store.add(ratio_fact((2024, 6, 10), (2024, 6, 12), 10.0));
        store.add(ratio_fact((2024, 6, 11), (2024, 6, 13), 10.0));
        store.freeze();
        assert_eq!(detect_splits(&store).len(), 1);
    }

    #[test]
    fn test_eps_adjustment_nvidia_scenario() {
        // NVIDIA Q1 FY2025 basic EPS $6.00 filed 2024-05-22; 10:1 split effective
        // 2024-06-10. Visible EPS must become $0.60.
        let splits = vec![StockSplit {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            ratio: 10.0,
            filing_date: NaiveDate::from_ymd_opt(2024, 6, 12),
            accession: None,
        }];

        let pre_split = eps_fact((2024, 4, 28), (2024, 5, 22), 6.00);
        let adjusted = adjust_fact(&pre_split, &splits).unwrap();
        assert!((adjusted.numeric_value.unwrap() - 0.60).abs() < 1e-9);
        assert_eq!(
            adjusted.calculation_context.as_deref(),
            Some("split_adj_ratio_10.00")
        );

        // Q3 filed 2024-11-20, after the split: already adjusted by the issuer.
        let post_split = eps_fact((2024, 10, 27), (2024, 11, 20), 0.81);
        assert!(adjust_fact(&post_split, &splits).is_none());
    }

    #[test]
    fn test_share_count_multiplies() {
        let end = NaiveDate::from_ymd_opt(2024, 4, 28).unwrap();
        let shares = FactBuilder::new(
            "us-gaap:CommonStockSharesOutstanding",
            Unit::parse("shares"),
            end,
        )
        .numeric(2_500_000_000.0)
        .period(None, end)
        .provenance(NaiveDate::from_ymd_opt(2024, 5, 22), None, None)
        .build();

        let splits = vec![StockSplit {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            ratio: 10.0,
            filing_date: None,
            accession: None,
        }];

        let adjusted = adjust_fact(&shares, &splits).unwrap();
        assert_eq!(adjusted.numeric_value, Some(25_000_000_000.0));
    }

    #[test]
    fn test_monetary_untouched() {
        let end = NaiveDate::from_ymd_opt(2024, 4, 28).unwrap();
        let revenue = FactBuilder::new("us-gaap:Revenues", Unit::parse("USD"), end)
            .numeric(26_044_000_000.0)
            .period(None, end)
            .provenance(NaiveDate::from_ymd_opt(2024, 5, 22), None, None)
            .build();

        let splits = vec![StockSplit {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            ratio: 10.0,
            filing_date: None,
            accession: None,
        }];

        assert!(adjust_fact(&revenue, &splits).is_none());
    }

    #[test]
    fn test_double_adjustment_is_identity() {
        let splits = vec![StockSplit {
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            ratio: 10.0,
            filing_date: None,
            accession: None,
        }];

        let fact = eps_fact((2024, 4, 28), (2024, 5, 22), 6.00);
        let once = adjust_fact(&fact, &splits).unwrap();
        assert!((once.numeric_value.unwrap() * 10.0 - fact.numeric_value.unwrap()).abs() < 1e-9);
        // An already-adjusted fact is never re-adjusted with the same list.
        assert!(adjust_fact(&once, &splits).is_none());
    }
}
