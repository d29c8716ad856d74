//! Unit canonicalization and reporting-period classification.
//!
//! XBRL filings express units in several spellings for the same measure: `iso4217:USD`,
//! `USD`, a `divide` of `iso4217:USD` over `xbrli:shares`, and so on. This module folds
//! those spellings onto canonical strings (`USD`, `shares`, `USD/shares`, `pure`) and
//! classifies each unit into a [`UnitType`] that the rest of the library keys off: the
//! stitching engine refuses to subtract share counts, the split adjuster divides per-share
//! units and multiplies share counts, and the standardizer only aggregates monetary values.
//!
//! Duration classification maps a fact's day count into a [`PeriodBucket`]. The bands are
//! deliberately wide because 13-week fiscal quarters and 52/53-week fiscal years drift
//! around the calendar: a "quarter" can legitimately run anywhere from 70 to 120 days.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Broad classification of a unit of measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    /// A currency amount (USD, EUR, ...).
    Monetary,
    /// A share count.
    Shares,
    /// A currency amount per share (EPS, dividends per share).
    PerShare,
    /// A dimensionless ratio (`pure`).
    Ratio,
    /// Anything else (compound units, physical quantities, unrecognized strings).
    Other,
}

/// A canonicalized unit of measure.
///
/// Construction never fails: an unparseable unit string canonicalizes to itself with
/// [`UnitType::Other`], and the caller downgrades the owning fact's quality instead of
/// aborting the parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Canonical spelling, e.g. `USD`, `shares`, `USD/shares`, `pure`.
    pub canonical: String,

    /// Classification used by additivity and adjustment logic.
    pub unit_type: UnitType,
}

impl Unit {
    /// Canonicalizes a simple measure string (a single XBRL `measure` element or a
    /// companyfacts unit key).
    ///
    /// Taxonomy prefixes are stripped (`iso4217:USD` → `USD`), currency codes are folded
    /// to upper case, and `shares`/`pure` to lower case. A `/` in the input is treated as
    /// an already-flattened divide expression.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((num, den)) = raw.split_once('/') {
            return Self::divide(num, den);
        }

        let local = strip_prefix(raw);
        if local.eq_ignore_ascii_case("shares") {
            return Self {
                canonical: "shares".to_string(),
                unit_type: UnitType::Shares,
            };
        }
        if local.eq_ignore_ascii_case("pure") {
            return Self {
                canonical: "pure".to_string(),
                unit_type: UnitType::Ratio,
            };
        }
        if is_currency_code(local) {
            return Self {
                canonical: local.to_ascii_uppercase(),
                unit_type: UnitType::Monetary,
            };
        }

        Self {
            canonical: local.to_string(),
            unit_type: UnitType::Other,
        }
    }

    /// Canonicalizes an XBRL `divide` expression from its numerator and denominator
    /// measures. `USD / shares` is the per-share compound; anything else keeps the
    /// flattened `num/den` spelling with [`UnitType::Other`].
    pub fn divide(numerator: &str, denominator: &str) -> Self {
        let num = Self::parse(numerator);
        let den = Self::parse(denominator);
        let canonical = format!("{}/{}", num.canonical, den.canonical);

        let unit_type = if num.unit_type == UnitType::Monetary && den.unit_type == UnitType::Shares
        {
            UnitType::PerShare
        } else {
            UnitType::Other
        };

        Self {
            canonical,
            unit_type,
        }
    }

    /// A unit that could not be interpreted at all. The owning fact should carry
    /// LOW data quality.
    pub fn unknown(raw: &str) -> Self {
        Self {
            canonical: raw.to_string(),
            unit_type: UnitType::Other,
        }
    }

    pub fn is_monetary(&self) -> bool {
        self.unit_type == UnitType::Monetary
    }

    pub fn is_per_share(&self) -> bool {
        self.unit_type == UnitType::PerShare
    }

    pub fn is_shares(&self) -> bool {
        self.unit_type == UnitType::Shares
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

fn strip_prefix(raw: &str) -> &str {
    raw.rsplit_once(':').map(|(_, local)| local).unwrap_or(raw)
}

/// Three ASCII letters is treated as an ISO 4217 currency code.
fn is_currency_code(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Reporting-period length classes used by the stitching engine.
///
/// The day-count bands accommodate 13-week quarters and 52/53-week fiscal years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodBucket {
    /// 70-120 days: a single fiscal quarter.
    Quarter,
    /// 140-240 days: first-half year-to-date.
    Ytd6M,
    /// 230-330 days: nine-month year-to-date.
    Ytd9M,
    /// 330-420 days: a full fiscal year.
    Annual,
    /// Anything else. Excluded from quarterization.
    Other,
}

impl PeriodBucket {
    /// Classifies a duration in days.
    ///
    /// The YTD_9M and ANNUAL bands overlap the neighbouring ones; classification checks
    /// the narrower classes first so a 115-day period is a quarter, not unknown, and a
    /// 335-day period lands in ANNUAL only after failing the YTD_9M upper bound.
    pub fn from_days(days: i64) -> Self {
        match days {
            70..=120 => PeriodBucket::Quarter,
            140..=229 => PeriodBucket::Ytd6M,
            230..=329 => PeriodBucket::Ytd9M,
            330..=420 => PeriodBucket::Annual,
            _ => PeriodBucket::Other,
        }
    }

    /// Classifies the span between two dates, end-exclusive semantics are not assumed;
    /// SEC period endpoints are inclusive dates and off-by-one never crosses a band.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self::from_days(end.signed_duration_since(start).num_days())
    }
}

/// Concept name fragments that mark values as non-additive even when monetary.
///
/// Averages and ratios cannot be derived by subtracting cumulative periods.
const NON_ADDITIVE_FRAGMENTS: &[&str] = &[
    "PerShare",
    "EarningsPerShare",
    "Ratio",
    "Percentage",
    "Average",
    "WeightedAverage",
    "EffectiveIncomeTaxRate",
];

/// Whether a fact's value may be derived by adding or subtracting values of
/// neighbouring periods.
///
/// Returns false for instants (balance-sheet stocks), for share counts, ratios and
/// per-share amounts, and for concepts on the known non-additive list. The stitching
/// engine consults this before any `FY − YTD` style derivation.
pub fn is_additive(concept: &str, unit: &Unit, is_instant: bool) -> bool {
    if is_instant {
        return false;
    }
    match unit.unit_type {
        UnitType::Shares | UnitType::Ratio | UnitType::PerShare => return false,
        UnitType::Monetary | UnitType::Other => {}
    }
    let local = strip_prefix(concept);
    !NON_ADDITIVE_FRAGMENTS
        .iter()
        .any(|fragment| local.contains(fragment))
}
