//! Entity facts: the SEC's per-company aggregated XBRL feed.
//!
//! The companyfacts endpoint returns every XBRL fact a company has ever reported,
//! grouped by taxonomy → concept → unit. This module covers two broad sets of data:
//! - Company identity lookups (ticker ↔ CIK) used to bootstrap most EDGAR requests.
//! - The companyfacts payload itself, ingested straight into the [`FactStore`] schema
//!   so the fluent query engine works identically over per-filing XBRL and the
//!   aggregated feed.
//!
//! Most users will start with `company_cik("AAPL")` to resolve a ticker into a CIK,
//! then call `entity_facts(cik)` and query the result:
//!
//! ```ignore
//! let cik = edgar.company_cik("AAPL").await?;
//! let facts = edgar.entity_facts(cik).await?;
//! let revenue = facts.query().by_concept("Revenues", false).latest(4).execute();
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;

use crate::core::EdgarClient;
use crate::error::{FilingError, Result};
use crate::facts::{DataQuality, FactBuilder, FactStore, FiscalPeriod};
use crate::query::FactQuery;
use crate::traits::EntityOperations;
use crate::units::Unit;

/// Mapping between stock ticker symbols and company CIKs.
///
/// The SEC maintains this mapping to help users discover company identifiers for
/// EDGAR queries. Note that companies can have multiple tickers across different
/// exchanges.
#[derive(Debug, Deserialize)]
pub struct CompanyTicker {
    #[serde(rename = "cik_str")]
    pub cik: u64,
    pub ticker: String,
    pub title: String,
}

/// Company ticker with exchange information included.
#[derive(Debug, Deserialize)]
pub struct CompanyTickerExchange {
    pub cik: u64,
    pub ticker: String,
    pub name: String,
    pub exchange: String,
}

/// A company's complete aggregated facts, ingested into the fact store schema.
///
/// Hundreds of thousands of facts for a large filer; the store's indices make the
/// query surface tractable. The store is frozen at construction.
#[derive(Debug, Clone)]
pub struct EntityFacts {
    pub cik: u64,
    pub entity_name: String,
    store: FactStore,
}

impl EntityFacts {
    /// Parses a companyfacts JSON payload.
    ///
    /// Non-numeric values and unparseable dates degrade the individual fact (quality
    /// LOW or a skip with a warning) rather than failing the whole payload.
    pub fn parse_json(json: &str) -> Result<Self> {
        let payload: CompanyFactsJson = serde_json::from_str(json)?;
        let entity = format!("{:0>10}", payload.cik);

        let mut store = FactStore::new();
        let mut skipped = 0usize;

        for (taxonomy, concepts) in &payload.facts {
            for (local_name, concept_data) in concepts {
                let concept = format!("{}:{}", taxonomy, local_name);
                if let Some(label) = &concept_data.label {
                    store.set_label(concept.clone(), label.clone());
                }

                for (unit_key, points) in &concept_data.units {
                    let unit = Unit::parse(unit_key);
                    for point in points {
                        let Ok(end) = NaiveDate::parse_from_str(&point.end, "%Y-%m-%d") else {
                            skipped += 1;
                            continue;
                        };
                        let start = point
                            .start
                            .as_deref()
                            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                        let filed = point
                            .filed
                            .as_deref()
                            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
                        let fiscal_period = point
                            .fp
                            .as_deref()
                            .and_then(|fp| fp.parse::<FiscalPeriod>().ok());

                        let mut builder = FactBuilder::new(concept.clone(), unit.clone(), end)
                            .period(start, end)
                            .fiscal(point.fy, fiscal_period)
                            .provenance(filed, point.form.clone(), point.accn.clone());

                        match point.val.as_f64() {
                            Some(n) => builder = builder.numeric(n),
                            None => {
                                let text = point.val.as_str().unwrap_or_default().to_string();
                                builder =
                                    builder.raw_value(&text, &unit).quality(DataQuality::Medium);
                            }
                        }

                        let mut fact = builder.build();
                        fact.context = store.intern_context(crate::facts::Context::new(
                            entity.clone(),
                            match start {
                                Some(start) => crate::facts::Period::Duration { start, end },
                                None => crate::facts::Period::Instant(end),
                            },
                        ));
                        store.add(fact);
                    }
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} companyfacts data points with unparseable dates for CIK {}",
                skipped,
                payload.cik
            );
        }

        store.freeze();
        tracing::debug!(
            "Ingested {} facts for {} (CIK {})",
            store.len(),
            payload.entity_name,
            payload.cik
        );

        Ok(EntityFacts {
            cik: payload.cik,
            entity_name: payload.entity_name,
            store,
        })
    }

    pub fn store(&self) -> &FactStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Fluent query over the aggregated facts.
    pub fn query(&self) -> FactQuery<'_> {
        FactQuery::new(&self.store)
    }
}

// Wire format of the companyfacts endpoint.

#[derive(Debug, Deserialize)]
struct CompanyFactsJson {
    cik: u64,
    #[serde(rename = "entityName")]
    entity_name: String,
    facts: HashMap<String, HashMap<String, ConceptJson>>,
}

#[derive(Debug, Deserialize)]
struct ConceptJson {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
    units: HashMap<String, Vec<DataPointJson>>,
}

#[derive(Debug, Deserialize)]
struct DataPointJson {
    #[serde(default)]
    start: Option<String>,
    end: String,
    val: serde_json::Value,
    #[serde(default)]
    accn: Option<String>,
    #[serde(default)]
    fy: Option<i32>,
    #[serde(default)]
    fp: Option<String>,
    #[serde(default)]
    form: Option<String>,
    #[serde(default)]
    filed: Option<String>,
}

#[derive(Debug)]
enum EntityUrlType {
    CompanyTickers,
    CompanyTickersExchange,
    CompanyFacts,
}

impl EdgarClient {
    fn build_entity_url(&self, url_type: EntityUrlType, params: &[&str]) -> String {
        match url_type {
            EntityUrlType::CompanyTickers => {
                format!("{}/company_tickers.json", self.urls.files)
            }
            EntityUrlType::CompanyTickersExchange => {
                format!("{}/company_tickers_exchange.json", self.urls.files)
            }
            EntityUrlType::CompanyFacts => {
                let padded_cik = format!("{:0>10}", params[0]);
                format!(
                    "{}/api/xbrl/companyfacts/CIK{}.json",
                    self.urls.data, padded_cik
                )
            }
        }
    }
}

/// A trait for parsing tabular SEC JSON content into a collection of structured data.
///
/// Several SEC endpoints represent data as `{ "fields": [...], "data": [...] }` where
/// each row in `data` is positional. This helper maps those rows into strongly typed
/// structs. Internal to `EntityOperations`.
trait JsonParser {
    fn parse_json_array<T, F>(
        &self,
        content: &str,
        required_fields: &[&str],
        mapper: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&FieldExtractor, &[serde_json::Value]) -> Option<T>;
}

impl JsonParser for EdgarClient {
    fn parse_json_array<T, F>(
        &self,
        content: &str,
        required_fields: &[&str],
        mapper: F,
    ) -> Result<Vec<T>>
    where
        F: Fn(&FieldExtractor, &[serde_json::Value]) -> Option<T>,
    {
        let json: serde_json::Value = serde_json::from_str(content)?;

        let fields = json["fields"]
            .as_array()
            .ok_or_else(|| FilingError::InvalidResponse("Missing 'fields' array".to_string()))?;

        let data = json["data"]
            .as_array()
            .ok_or_else(|| FilingError::InvalidResponse("Missing 'data' array".to_string()))?;

        let extractor = FieldExtractor::new(fields.to_vec(), required_fields)?;

        Ok(data
            .iter()
            .filter_map(|row| row.as_array().and_then(|r| mapper(&extractor, r)))
            .collect())
    }
}

/// Maps field names to their positions in positional SEC JSON rows.
struct FieldExtractor {
    indices: HashMap<String, usize>,
}

impl FieldExtractor {
    fn new(fields: Vec<serde_json::Value>, required: &[&str]) -> Result<Self> {
        let mut indices = HashMap::new();

        for field_name in required {
            let idx = fields
                .iter()
                .position(|field| field.as_str() == Some(field_name))
                .ok_or_else(|| {
                    FilingError::InvalidResponse(format!("Missing '{}' field", field_name))
                })?;
            indices.insert(field_name.to_string(), idx);
        }

        Ok(Self { indices })
    }

    fn get_index(&self, field: &str) -> Result<usize> {
        self.indices
            .get(field)
            .copied()
            .ok_or_else(|| FilingError::InvalidResponse(format!("Field '{}' not found", field)))
    }

    fn extract_value<T, F>(&self, row: &[serde_json::Value], field: &str, converter: F) -> Option<T>
    where
        F: Fn(&serde_json::Value) -> Option<T>,
    {
        let idx = self.get_index(field).ok()?;
        row.get(idx).and_then(converter)
    }
}

/// Implementation of entity operations against the live SEC endpoints.
#[async_trait]
impl EntityOperations for EdgarClient {
    /// Retrieves the full ticker → CIK mapping file.
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>> {
        let url = self.build_entity_url(EntityUrlType::CompanyTickers, &[]);
        let response = self.get(&url).await?;
        let map: HashMap<String, CompanyTicker> = serde_json::from_str(&response)?;
        Ok(map.into_values().collect())
    }

    /// Resolves a ticker symbol into its CIK.
    ///
    /// # Errors
    ///
    /// Returns `FilingError::TickerNotFound` if the symbol is unknown.
    async fn company_cik(&self, ticker: &str) -> Result<u64> {
        let tickers = self.company_tickers().await?;

        let company = tickers
            .iter()
            .find(|t| t.ticker == ticker.to_uppercase())
            .ok_or(FilingError::TickerNotFound)?;

        Ok(company.cik)
    }

    /// Retrieves company tickers with their exchange information.
    async fn company_tickers_with_exchange(&self) -> Result<Vec<CompanyTickerExchange>> {
        let url = self.build_entity_url(EntityUrlType::CompanyTickersExchange, &[]);
        let response = self.get(&url).await?;

        self.parse_json_array(
            &response,
            &["cik", "name", "ticker", "exchange"],
            |extractor, row| {
                Some(CompanyTickerExchange {
                    cik: extractor.extract_value(row, "cik", |v| v.as_u64())?,
                    name: extractor.extract_value(row, "name", |v| v.as_str().map(String::from))?,
                    ticker: extractor
                        .extract_value(row, "ticker", |v| v.as_str().map(String::from))?,
                    exchange: extractor
                        .extract_value(row, "exchange", |v| v.as_str().map(String::from))?,
                })
            },
        )
    }

    /// Downloads and ingests a company's aggregated facts.
    async fn entity_facts(&self, cik: u64) -> Result<EntityFacts> {
        let url = self.build_entity_url(EntityUrlType::CompanyFacts, &[&cik.to_string()]);
        let response = self.get(&url).await?;
        EntityFacts::parse_json(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANY_FACTS: &str = r#"{
        "cik": 320193,
        "entityName": "Apple Inc.",
        "facts": {
            "us-gaap": {
                "Revenues": {
                    "label": "Revenues",
                    "description": "Total revenue",
                    "units": {
                        "USD": [
                            {"start": "2022-09-25", "end": "2023-09-30", "val": 383285000000,
                             "accn": "0000320193-23-000106", "fy": 2023, "fp": "FY",
                             "form": "10-K", "filed": "2023-11-03"},
                            {"start": "2021-09-26", "end": "2022-09-24", "val": 394328000000,
                             "accn": "0000320193-22-000108", "fy": 2022, "fp": "FY",
                             "form": "10-K", "filed": "2022-10-28"}
                        ]
                    }
                },
                "EarningsPerShareBasic": {
                    "label": "Earnings Per Share, Basic",
                    "units": {
                        "USD/shares": [
                            {"start": "2022-09-25", "end": "2023-09-30", "val": 6.16,
                             "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"}
                        ]
                    }
                }
            },
            "dei": {
                "EntityCommonStockSharesOutstanding": {
                    "label": "Entity Common Stock, Shares Outstanding",
                    "units": {
                        "shares": [
                            {"end": "2023-10-20", "val": 15552752000,
                             "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"}
                        ]
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_company_facts() {
        let facts = EntityFacts::parse_json(COMPANY_FACTS).unwrap();
        assert_eq!(facts.cik, 320193);
        assert_eq!(facts.entity_name, "Apple Inc.");
        assert_eq!(facts.len(), 4);

        let revenue = facts.store().latest_fact("us-gaap:Revenues").unwrap();
        assert_eq!(revenue.numeric_value, Some(383_285_000_000.0));
        assert_eq!(revenue.fiscal_year, Some(2023));
        assert_eq!(revenue.fiscal_period, Some(FiscalPeriod::FY));
        assert_eq!(revenue.form_type.as_deref(), Some("10-K"));
        assert!(revenue.is_audited);

        // Per-share unit canonicalized from the feed's spelling
        let eps = facts
            .store()
            .latest_fact("us-gaap:EarningsPerShareBasic")
            .unwrap();
        assert_eq!(eps.unit.canonical, "USD/shares");
        assert!(!eps.is_additive());

        // Instant fact: no start date
        let shares = facts
            .store()
            .latest_fact("dei:EntityCommonStockSharesOutstanding")
            .unwrap();
        assert!(shares.period_start.is_none());
    }

    #[test]
    fn test_query_over_entity_facts() {
        let facts = EntityFacts::parse_json(COMPANY_FACTS).unwrap();
        let results = facts
            .query()
            .by_concept("Revenues", false)
            .by_fiscal_year(2022)
            .execute();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].numeric_value, Some(394_328_000_000.0));

        // Label lookup works from the feed's labels
        let by_label = facts.query().by_label("earnings per share", true).execute();
        assert_eq!(by_label.len(), 1);
    }

    #[test]
    fn test_invalid_json() {
        assert!(EntityFacts::parse_json("not json").is_err());
    }

    #[test]
    fn test_parse_fact_with_null_fields() {
        let json = r#"{
            "cik": 1,
            "entityName": "Test Co",
            "facts": {
                "us-gaap": {
                    "Assets": {
                        "label": null,
                        "description": null,
                        "units": {
                            "USD": [
                                {"end": "2021-12-31", "val": 1000000,
                                 "accn": "0001234567-21-000001", "fy": 2021, "fp": "FY",
                                 "form": "10-K", "filed": "2022-01-31"}
                            ]
                        }
                    }
                }
            }
        }"#;
        let facts = EntityFacts::parse_json(json).unwrap();
        assert_eq!(facts.len(), 1);
        assert!(facts.store().label("us-gaap:Assets").is_none());
    }
}
