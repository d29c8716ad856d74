//! Concept standardization: mapping heterogeneous taxonomy concepts onto canonical
//! fields.
//!
//! Every filer tags revenue differently: `Revenues`,
//! `RevenueFromContractWithCustomerExcludingAssessedTax`, `SalesRevenueNet`, or a bank's
//! interest/noninterest split. The standardizer evaluates per-statement mapping schemas
//! against a fact store and produces canonical fields (`revenue`, `netIncome`,
//! `totalAssets`, ...) so downstream analytics never see the raw taxonomy.
//!
//! Rules evaluate in descending priority. Industry-specific rules (priority ≥ 150)
//! outrank generic selections (110-120), which outrank computed fallbacks (80-100).
//! A field with no successful rule is `None`; the operation still succeeds and the
//! caller inspects [`StandardizedFinancials::coverage`].

mod schema;

pub use schema::{Expr, FieldMapping, MappingSchema, Op, Rule};

use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};

use crate::config::StandardizerConfig;
use crate::error::Result;
use crate::facts::{Fact, FactStore, FiscalPeriod};

/// Built-in income statement schema.
static INCOME_SCHEMA: Lazy<MappingSchema> = Lazy::new(|| {
    MappingSchema::from_json(include_str!("schemas/income.json"))
        .expect("built-in income schema is valid")
});

/// Built-in balance sheet schema.
static BALANCE_SCHEMA: Lazy<MappingSchema> = Lazy::new(|| {
    MappingSchema::from_json(include_str!("schemas/balance.json"))
        .expect("built-in balance schema is valid")
});

/// Built-in cash flow schema.
static CASHFLOW_SCHEMA: Lazy<MappingSchema> = Lazy::new(|| {
    MappingSchema::from_json(include_str!("schemas/cashflow.json"))
        .expect("built-in cashflow schema is valid")
});

/// Canonical fields resolved for one reporting period.
#[derive(Debug, Clone)]
pub struct StandardizedFinancials {
    /// Field name → resolved value. `None` records a field no rule could satisfy.
    pub fields: BTreeMap<String, Option<f64>>,

    /// Names of rules that produced each resolved field.
    pub resolved_by: BTreeMap<String, String>,

    /// Share of fields that resolved, in [0, 1].
    pub coverage: f64,
}

impl StandardizedFinancials {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied().flatten()
    }
}

/// Evaluates mapping schemas against fact stores.
#[derive(Debug, Clone)]
pub struct Standardizer {
    income: MappingSchema,
    balance: MappingSchema,
    cashflow: MappingSchema,
    industry: Option<String>,
}

impl Standardizer {
    /// Builds a standardizer with the built-in schemas.
    pub fn new(config: &StandardizerConfig) -> Result<Self> {
        let mut standardizer = Self {
            income: INCOME_SCHEMA.clone(),
            balance: BALANCE_SCHEMA.clone(),
            cashflow: CASHFLOW_SCHEMA.clone(),
            industry: config.industry_hint.clone(),
        };
        if let Some(path) = &config.mapping_schema_path {
            let json = std::fs::read_to_string(path)?;
            standardizer.replace_schema(MappingSchema::from_json(&json)?);
        }
        Ok(standardizer)
    }

    /// Replaces the schema matching the given statement name.
    pub fn replace_schema(&mut self, schema: MappingSchema) {
        match schema.statement.as_str() {
            "income" => self.income = schema,
            "balance" => self.balance = schema,
            "cashflow" => self.cashflow = schema,
            other => {
                tracing::warn!("Ignoring mapping schema for unknown statement '{}'", other);
            }
        }
    }

    /// Standardizes the income statement for one fiscal selection.
    pub fn income_statement(
        &self,
        store: &FactStore,
        year: Option<i32>,
        period: Option<FiscalPeriod>,
    ) -> StandardizedFinancials {
        self.evaluate(&self.income, store, year, period)
    }

    /// Standardizes the balance sheet for one fiscal selection.
    pub fn balance_sheet(
        &self,
        store: &FactStore,
        year: Option<i32>,
        period: Option<FiscalPeriod>,
    ) -> StandardizedFinancials {
        self.evaluate(&self.balance, store, year, period)
    }

    /// Standardizes the cash flow statement for one fiscal selection.
    pub fn cash_flow(
        &self,
        store: &FactStore,
        year: Option<i32>,
        period: Option<FiscalPeriod>,
    ) -> StandardizedFinancials {
        self.evaluate(&self.cashflow, store, year, period)
    }

    fn industry_matches(&self, hints: &[String]) -> bool {
        if hints.is_empty() {
            return true;
        }
        let Some(industry) = &self.industry else {
            return false;
        };
        let industry = industry.to_ascii_lowercase();
        hints
            .iter()
            .any(|h| industry.contains(&h.to_ascii_lowercase()))
    }

    fn evaluate(
        &self,
        schema: &MappingSchema,
        store: &FactStore,
        year: Option<i32>,
        period: Option<FiscalPeriod>,
    ) -> StandardizedFinancials {
        let ctx = EvalContext {
            schema,
            standardizer: self,
            store,
            year,
            period,
        };

        let mut fields = BTreeMap::new();
        let mut resolved_by = BTreeMap::new();
        let mut resolved = 0usize;

        for field in schema.field_names() {
            let mut in_flight = HashSet::new();
            match ctx.resolve_field(field, &mut in_flight) {
                Some((value, rule)) => {
                    fields.insert(field.to_string(), Some(value));
                    resolved_by.insert(field.to_string(), rule);
                    resolved += 1;
                }
                None => {
                    fields.insert(field.to_string(), None);
                }
            }
        }

        let total = fields.len().max(1);
        StandardizedFinancials {
            fields,
            resolved_by,
            coverage: resolved as f64 / total as f64,
        }
    }
}

struct EvalContext<'a> {
    schema: &'a MappingSchema,
    standardizer: &'a Standardizer,
    store: &'a FactStore,
    year: Option<i32>,
    period: Option<FiscalPeriod>,
}

impl EvalContext<'_> {
    /// Resolves one field by trying its rules in descending priority.
    ///
    /// `in_flight` guards against computeAny cycles: a field referenced while it is
    /// already being resolved yields None for that expression.
    fn resolve_field(
        &self,
        field: &str,
        in_flight: &mut HashSet<String>,
    ) -> Option<(f64, String)> {
        if !in_flight.insert(field.to_string()) {
            tracing::warn!("Cyclic field reference while resolving '{}'", field);
            return None;
        }

        let result = self.schema.rules_for(field).into_iter().find_map(|rule| {
            if !self.standardizer.industry_matches(&rule.industry_hints) {
                return None;
            }
            if let Some(concepts) = &rule.select_any {
                // Order matters: aggregates are listed before components.
                for concept in concepts {
                    if let Some(value) = self.concept_value(concept) {
                        return Some((value, rule.name.clone()));
                    }
                }
                return None;
            }
            if let Some(expressions) = &rule.compute_any {
                for expr in expressions {
                    if let Some(value) = self.eval_expr(expr, in_flight) {
                        return Some((value, rule.name.clone()));
                    }
                }
            }
            None
        });

        in_flight.remove(field);
        result
    }

    fn eval_expr(&self, expr: &Expr, in_flight: &mut HashSet<String>) -> Option<f64> {
        match expr {
            Expr::ConceptAny { concept_any } => {
                concept_any.iter().find_map(|c| self.concept_value(c))
            }
            Expr::FieldRef { field } => self
                .resolve_field(field, in_flight)
                .map(|(value, _)| value),
            Expr::Operation { op, terms } => {
                let mut values = Vec::with_capacity(terms.len());
                for term in terms {
                    values.push(self.eval_expr(term, in_flight)?);
                }
                let mut iter = values.into_iter();
                let first = iter.next()?;
                let result = match op {
                    Op::Id => first,
                    Op::Add => iter.fold(first, |acc, v| acc + v),
                    Op::Sub => iter.fold(first, |acc, v| acc - v),
                    Op::Mul => iter.fold(first, |acc, v| acc * v),
                    Op::Div => {
                        let mut acc = first;
                        for v in iter {
                            if v == 0.0 {
                                return None;
                            }
                            acc /= v;
                        }
                        acc
                    }
                };
                Some(result)
            }
        }
    }

    /// Latest-filed numeric value of a concept within the fiscal selection, default
    /// member only.
    fn concept_value(&self, concept: &str) -> Option<f64> {
        let mut best: Option<&Fact> = None;
        for id in self.store.ids_by_concept(concept) {
            let Some(fact) = self.store.get(*id) else {
                continue;
            };
            if !fact.is_default_member() || fact.numeric_value.is_none() {
                continue;
            }
            if let Some(year) = self.year {
                if fact.fiscal_year != Some(year) {
                    continue;
                }
            }
            if let Some(period) = self.period {
                if fact.fiscal_period != Some(period) {
                    continue;
                }
            }
            best = match best {
                Some(current)
                    if (current.filing_date, current.period_end)
                        >= (fact.filing_date, fact.period_end) =>
                {
                    Some(current)
                }
                _ => Some(fact),
            };
        }
        best.and_then(|f| f.numeric_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::FactBuilder;
    use crate::units::Unit;
    use chrono::NaiveDate;

    fn store(facts: &[(&str, f64)]) -> FactStore {
        let mut store = FactStore::new();
        let usd = Unit::parse("USD");
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        for (concept, value) in facts {
            store.add(
                FactBuilder::new(*concept, usd.clone(), end)
                    .numeric(*value)
                    .period(Some(start), end)
                    .fiscal(Some(2023), Some(FiscalPeriod::FY))
                    .provenance(
                        NaiveDate::from_ymd_opt(2024, 2, 15),
                        Some("10-K".to_string()),
                        None,
                    )
                    .build(),
            );
        }
        store.freeze();
        store
    }

    #[test]
    fn test_generic_revenue_selection() {
        let store = store(&[
            ("us-gaap:RevenueFromContractWithCustomerExcludingAssessedTax", 100.0),
            ("us-gaap:NetIncomeLoss", 20.0),
        ]);
        let standardizer = Standardizer::new(&StandardizerConfig::default()).unwrap();
        let result = standardizer.income_statement(&store, Some(2023), Some(FiscalPeriod::FY));
        assert_eq!(result.get("revenue"), Some(100.0));
        assert_eq!(result.get("netIncome"), Some(20.0));
    }

    #[test]
    fn test_bank_rule_outranks_generic() {
        // A bank reporting Revenues plus NoninterestIncome: the industry rule at
        // priority 150 must add them, not return the bare Revenues figure.
        let store = store(&[
            ("us-gaap:Revenues", 101_900_000_000.0),
            ("us-gaap:NoninterestIncome", 45_800_000_000.0),
        ]);
        let config = StandardizerConfig {
            industry_hint: Some("Diversified Banks".to_string()),
            mapping_schema_path: None,
        };
        let standardizer = Standardizer::new(&config).unwrap();
        let result = standardizer.income_statement(&store, Some(2023), Some(FiscalPeriod::FY));
        assert_eq!(result.get("revenue"), Some(147_700_000_000.0));
        assert_eq!(
            result.resolved_by.get("revenue").map(String::as_str),
            Some("bank_total_revenue")
        );
    }

    #[test]
    fn test_bank_rule_skipped_without_industry() {
        let store = store(&[
            ("us-gaap:Revenues", 101.9),
            ("us-gaap:NoninterestIncome", 45.8),
        ]);
        let standardizer = Standardizer::new(&StandardizerConfig::default()).unwrap();
        let result = standardizer.income_statement(&store, Some(2023), Some(FiscalPeriod::FY));
        // Without the industry hint the generic selectAny wins.
        assert_eq!(result.get("revenue"), Some(101.9));
    }

    #[test]
    fn test_computed_gross_profit_fallback() {
        let store = store(&[
            ("us-gaap:Revenues", 1000.0),
            ("us-gaap:CostOfRevenue", 600.0),
        ]);
        let standardizer = Standardizer::new(&StandardizerConfig::default()).unwrap();
        let result = standardizer.income_statement(&store, Some(2023), Some(FiscalPeriod::FY));
        // No us-gaap:GrossProfit fact; the computed fallback subtracts.
        assert_eq!(result.get("grossProfit"), Some(400.0));
    }

    #[test]
    fn test_unresolved_field_is_null_with_partial_coverage() {
        let store = store(&[("us-gaap:Revenues", 1000.0)]);
        let standardizer = Standardizer::new(&StandardizerConfig::default()).unwrap();
        let result = standardizer.income_statement(&store, Some(2023), Some(FiscalPeriod::FY));
        assert_eq!(result.get("revenue"), Some(1000.0));
        assert_eq!(result.get("netIncome"), None);
        assert!(result.coverage > 0.0 && result.coverage < 1.0);
    }

    #[test]
    fn test_balance_sheet_fields() {
        let mut store = FactStore::new();
        let usd = Unit::parse("USD");
        let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        for (concept, value) in [
            ("us-gaap:Assets", 352.6),
            ("us-gaap:Liabilities", 290.4),
            ("us-gaap:StockholdersEquity", 62.2),
        ] {
            store.add(
                FactBuilder::new(concept, usd.clone(), end)
                    .numeric(value)
                    .period(None, end)
                    .fiscal(Some(2023), Some(FiscalPeriod::Q4))
                    .build(),
            );
        }
        store.freeze();

        let standardizer = Standardizer::new(&StandardizerConfig::default()).unwrap();
        let result = standardizer.balance_sheet(&store, Some(2023), Some(FiscalPeriod::Q4));
        assert_eq!(result.get("totalAssets"), Some(352.6));
        assert_eq!(result.get("totalLiabilities"), Some(290.4));
        assert_eq!(result.get("stockholdersEquity"), Some(62.2));
    }
}
