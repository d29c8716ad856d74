//! The unified XBRL document: six files loaded in deterministic order.
//!
//! [`XbrlDocument::parse`] always loads schema → label → presentation → definition →
//! calculation → instance. A missing linkbase degrades (warning + defaults); a missing
//! or malformed schema or instance is fatal. Fact resolution interns contexts, attaches
//! canonical units, classifies fiscal periods, and assigns statement membership from the
//! presentation roles each concept appears under.

use chrono::{Datelike, NaiveDate};
use std::collections::{HashMap, HashSet};

use crate::error::{FilingError, Result};
use crate::facts::{
    Context, DataQuality, Decimals, FactBuilder, FactStore, FiscalPeriod, Period, StatementType,
};
use crate::query::FactQuery;
use crate::units::{PeriodBucket, Unit};
use crate::xbrl::instance::InstanceDocument;
use crate::xbrl::linkbase::{LabelSet, Linkbase, RelationshipTree};
use crate::xbrl::schema::SchemaDocument;

/// Filing provenance stamped onto every fact resolved from the instance.
#[derive(Debug, Clone, Default)]
pub struct FilingSource {
    pub accession: Option<String>,
    pub form_type: Option<String>,
    pub filing_date: Option<NaiveDate>,

    /// Fiscal year end as (month, day), from the submissions metadata or DEI facts.
    /// Used to classify quarters; None assumes a calendar year end.
    pub fiscal_year_end: Option<(u32, u32)>,

    /// Identifier used in error and log context (primary document name or URL).
    pub document_name: String,
}

/// The six inputs of a filing's XBRL document set. The instance and schema are
/// mandatory; each linkbase may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct XbrlFiles<'a> {
    pub schema: Option<&'a str>,
    pub label: Option<&'a str>,
    pub presentation: Option<&'a str>,
    pub definition: Option<&'a str>,
    pub calculation: Option<&'a str>,
    pub instance: Option<&'a str>,
}

/// A fully loaded XBRL filing: concept metadata, labels, relationship trees and the
/// frozen fact store.
#[derive(Debug, Clone)]
pub struct XbrlDocument {
    pub source: FilingSource,
    pub schema: SchemaDocument,
    pub labels: LabelSet,

    presentation: Linkbase,
    definition: Linkbase,
    calculation: Linkbase,

    presentation_trees: HashMap<String, RelationshipTree>,
    definition_trees: HashMap<String, RelationshipTree>,
    calculation_trees: HashMap<String, RelationshipTree>,

    store: FactStore,
}

impl XbrlDocument {
    /// Parses a document set in the canonical order.
    ///
    /// # Errors
    ///
    /// - `XbrlParse` for a missing/malformed instance or schema, unresolvable context
    ///   references, and duplicate numeric facts for one `(concept, context, unit)` key.
    /// - `SchemaViolation` when an instance fact uses a concept in the extension
    ///   taxonomy's own namespace that the schema never declared. Concepts from
    ///   imported standard taxonomies (us-gaap, dei, srt) are synthesized instead,
    ///   since their schemas are not part of the filing's document set.
    pub fn parse(files: XbrlFiles<'_>, source: FilingSource) -> Result<Self> {
        let context = source.document_name.clone();

        // 1. Schema
        let schema = match files.schema {
            Some(xml) => SchemaDocument::parse(xml, &context)?,
            None => {
                tracing::warn!("No schema for {}; concept metadata will be synthesized", context);
                SchemaDocument::default()
            }
        };

        // 2. Label linkbase
        let labels = match files.label {
            Some(xml) => LabelSet::parse(xml, &schema, &context)?,
            None => {
                tracing::warn!("No label linkbase for {}; using pretty-printed names", context);
                LabelSet::default()
            }
        };

        // 3. Presentation linkbase
        let presentation = Self::load_linkbase(files.presentation, &schema, &context, "presentation")?;
        // 4. Definition linkbase
        let definition = Self::load_linkbase(files.definition, &schema, &context, "definition")?;
        // 5. Calculation linkbase
        let calculation = Self::load_linkbase(files.calculation, &schema, &context, "calculation")?;

        // 6. Instance
        let instance = match files.instance {
            Some(xml) => InstanceDocument::parse(xml, &context)?,
            None => {
                return Err(FilingError::xbrl(&context, "no instance document"));
            }
        };

        let presentation_trees = Self::build_trees(&presentation);
        let definition_trees = Self::build_trees(&definition);
        let calculation_trees = Self::build_trees(&calculation);

        let statement_membership = Self::statement_membership(&presentation_trees);

        let mut doc = XbrlDocument {
            source,
            schema,
            labels,
            presentation,
            definition,
            calculation,
            presentation_trees,
            definition_trees,
            calculation_trees,
            store: FactStore::new(),
        };

        doc.resolve_facts(instance, &statement_membership, &context)?;
        Ok(doc)
    }

    fn load_linkbase(
        xml: Option<&str>,
        schema: &SchemaDocument,
        context: &str,
        kind: &str,
    ) -> Result<Linkbase> {
        match xml {
            Some(xml) => Linkbase::parse(xml, schema, context),
            None => {
                tracing::warn!("No {} linkbase for {}", kind, context);
                Ok(Linkbase::default())
            }
        }
    }

    fn build_trees(linkbase: &Linkbase) -> HashMap<String, RelationshipTree> {
        linkbase
            .relationships
            .keys()
            .map(|role| (role.clone(), linkbase.tree(role)))
            .collect()
    }

    /// Maps every concept appearing under a statement-like presentation role to that
    /// statement. Role URIs carry the statement identity in SEC taxonomies.
    fn statement_membership(
        trees: &HashMap<String, RelationshipTree>,
    ) -> HashMap<String, StatementType> {
        let mut membership = HashMap::new();
        for (role, tree) in trees {
            let statement = statement_type_for_role(role);
            if statement == StatementType::Other {
                continue;
            }
            for id in tree.walk() {
                if let Some(node) = tree.node(id) {
                    membership
                        .entry(node.concept.clone())
                        .or_insert(statement);
                }
            }
        }
        membership
    }

    fn resolve_facts(
        &mut self,
        instance: InstanceDocument,
        statement_membership: &HashMap<String, StatementType>,
        context_name: &str,
    ) -> Result<()> {
        // Intern contexts up front so logically equal declarations share identity.
        let mut context_ids: HashMap<String, (crate::facts::ContextId, Period, std::collections::BTreeMap<String, String>)> =
            HashMap::new();
        for (id, raw) in &instance.contexts {
            let context = Context::new(raw.entity.clone(), raw.period)
                .with_dimensions(raw.dimensions.clone());
            let interned = self.store.intern_context(context);
            context_ids.insert(id.clone(), (interned, raw.period, raw.dimensions.clone()));
        }

        let extension_prefix = self.schema.target_prefix.clone();
        let mut numeric_keys: HashSet<(String, crate::facts::ContextId, String)> = HashSet::new();

        for raw in instance.facts {
            if raw.is_nil {
                continue;
            }

            let (context_id, period, dimensions) = context_ids
                .get(&raw.context_ref)
                .cloned()
                .ok_or_else(|| {
                    FilingError::xbrl(
                        context_name,
                        format!(
                            "fact {} references undeclared context {}",
                            raw.concept, raw.context_ref
                        ),
                    )
                })?;

            // Concept resolution: extension concepts must be declared; imported
            // standard-taxonomy concepts are synthesized from the fact itself.
            let concept_known = self.schema.concept(&raw.concept).is_some();
            if !concept_known {
                let prefix = raw.concept.split(':').next().unwrap_or("");
                if Some(prefix) == extension_prefix.as_deref() {
                    return Err(FilingError::SchemaViolation {
                        concept: raw.concept.clone(),
                        context: context_name.to_string(),
                    });
                }
            }

            let (unit, mut quality) = match &raw.unit_ref {
                Some(unit_ref) => match instance.units.get(unit_ref) {
                    Some(unit) => (unit.clone(), DataQuality::High),
                    None => {
                        tracing::warn!(
                            "Unknown unit {} for fact {} in {}",
                            unit_ref,
                            raw.concept,
                            context_name
                        );
                        (Unit::unknown(unit_ref), DataQuality::Low)
                    }
                },
                None => (Unit::unknown(""), DataQuality::High),
            };

            let decimals = raw.decimals.as_deref().and_then(Decimals::parse);

            let (fiscal_year, fiscal_period) =
                infer_fiscal(&period, self.source.fiscal_year_end);

            let statement = statement_membership
                .get(&raw.concept)
                .copied()
                .unwrap_or_else(|| StatementType::infer(&raw.concept));

            let builder = FactBuilder::new(raw.concept.clone(), unit.clone(), period.end())
                .raw_value(&raw.value, &unit)
                .period(period.start(), period.end())
                .fiscal(fiscal_year, fiscal_period)
                .provenance(
                    self.source.filing_date,
                    self.source.form_type.clone(),
                    self.source.accession.clone(),
                )
                .dimensions(dimensions)
                .decimals(decimals)
                .statement(statement);

            let mut fact = builder.build();
            fact.context = context_id;
            if quality == DataQuality::High && fact.numeric_value.is_none() && raw.unit_ref.is_some()
            {
                // Numeric unit but unparseable value
                quality = DataQuality::Low;
            }
            fact.data_quality = quality;

            // Within one filing, (concept, context, unit) must be unique for numerics.
            if fact.numeric_value.is_some() {
                let key = (fact.concept.clone(), context_id, fact.unit.canonical.clone());
                if !numeric_keys.insert(key) {
                    return Err(FilingError::xbrl(
                        context_name,
                        format!(
                            "duplicate numeric fact for ({}, {}, {})",
                            fact.concept, raw.context_ref, fact.unit
                        ),
                    ));
                }
            }

            let concept = fact.concept.clone();
            self.store.add(fact);
            if self.store.label(&concept).is_none() {
                self.store
                    .set_label(concept.clone(), self.labels.standard(&concept));
            }
        }

        self.store.freeze();
        Ok(())
    }

    /// The frozen fact store for this filing.
    pub fn store(&self) -> &FactStore {
        &self.store
    }

    /// Fluent query over this filing's facts.
    pub fn query(&self) -> FactQuery<'_> {
        FactQuery::new(&self.store)
    }

    /// All presentation roles, sorted.
    pub fn presentation_roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.presentation_trees.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Roles that look like primary financial statements.
    pub fn statement_roles(&self) -> Vec<&str> {
        self.presentation_roles()
            .into_iter()
            .filter(|role| statement_type_for_role(role) != StatementType::Other)
            .collect()
    }

    /// The first role matching a statement type, if any.
    pub fn role_for_statement(&self, statement: StatementType) -> Option<&str> {
        self.presentation_roles()
            .into_iter()
            .find(|role| statement_type_for_role(role) == statement)
    }

    pub fn presentation_tree(&self, role: &str) -> Option<&RelationshipTree> {
        self.presentation_trees.get(role)
    }

    pub fn definition_tree(&self, role: &str) -> Option<&RelationshipTree> {
        self.definition_trees.get(role)
    }

    pub fn calculation_tree(&self, role: &str) -> Option<&RelationshipTree> {
        self.calculation_trees.get(role)
    }

    /// Calculation linkbase access (structure only; sums are never enforced).
    pub fn calculation(&self) -> &Linkbase {
        &self.calculation
    }

    pub fn definition(&self) -> &Linkbase {
        &self.definition
    }

    pub fn presentation(&self) -> &Linkbase {
        &self.presentation
    }
}

/// Classifies a presentation role URI into a statement type.
pub fn statement_type_for_role(role: &str) -> StatementType {
    let lower = role.to_ascii_lowercase();
    // Parenthetical variants are supplemental disclosures, not the statement proper.
    if lower.contains("parenthetical") {
        return StatementType::Other;
    }
    if lower.contains("balancesheet") || lower.contains("financialposition") {
        return StatementType::Balance;
    }
    if lower.contains("cashflow") {
        return StatementType::CashFlow;
    }
    if lower.contains("stockholdersequity") || lower.contains("shareholdersequity") {
        return StatementType::Equity;
    }
    if lower.contains("incomestatement")
        || lower.contains("statementsofincome")
        || lower.contains("statementofincome")
        || lower.contains("statementsofoperations")
        || lower.contains("statementofoperations")
        || lower.contains("comprehensiveincome")
    {
        return StatementType::Income;
    }
    StatementType::Other
}

/// Infers (fiscal year, fiscal period) from a context period and the filer's fiscal
/// year end.
///
/// Annual durations map to FY in the calendar year of the period end. Quarterly
/// durations and instants map to the quarter position relative to the fiscal year end
/// month; YTD durations take the quarter they terminate in (Q2 for six months, Q3 for
/// nine).
pub fn infer_fiscal(
    period: &Period,
    fiscal_year_end: Option<(u32, u32)>,
) -> (Option<i32>, Option<FiscalPeriod>) {
    let fye_month = fiscal_year_end.map(|(m, _)| m).unwrap_or(12);
    let end = period.end();

    // Months elapsed since the fiscal year started, folded into a quarter index.
    let quarter_of = |month: u32| -> FiscalPeriod {
        let fiscal_start = fye_month % 12 + 1;
        let offset = (month + 12 - fiscal_start) % 12;
        match offset / 3 {
            0 => FiscalPeriod::Q1,
            1 => FiscalPeriod::Q2,
            2 => FiscalPeriod::Q3,
            _ => FiscalPeriod::Q4,
        }
    };

    let fiscal_year_of = |date: NaiveDate| -> i32 {
        if date.month() > fye_month {
            date.year() + 1
        } else {
            date.year()
        }
    };

    match period {
        Period::Instant(date) => {
            let fp = quarter_of(date.month());
            (Some(fiscal_year_of(*date)), Some(fp))
        }
        Period::Duration { start, end: _ } => {
            let bucket = PeriodBucket::from_dates(*start, end);
            let fp = match bucket {
                PeriodBucket::Annual => Some(FiscalPeriod::FY),
                PeriodBucket::Quarter => Some(quarter_of(end.month())),
                PeriodBucket::Ytd6M => Some(FiscalPeriod::Q2),
                PeriodBucket::Ytd9M => Some(FiscalPeriod::Q3),
                PeriodBucket::Other => None,
            };
            let fy = match bucket {
                PeriodBucket::Annual => Some(end.year()),
                PeriodBucket::Other => None,
                _ => Some(fiscal_year_of(end)),
            };
            (fy, fp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:aapl="http://www.apple.com/20230930"
    targetNamespace="http://www.apple.com/20230930">
  <xsd:element name="AdjustedRevenue" id="aapl_AdjustedRevenue" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="duration"/>
</xsd:schema>"#;

    const INSTANCE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:us-gaap="http://fasb.org/us-gaap/2023"
    xmlns:aapl="http://www.apple.com/20230930"
    xmlns:iso4217="http://www.xbrl.org/2003/iso4217">
  <xbrli:context id="FY2023">
    <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:startDate>2022-09-25</xbrli:startDate><xbrli:endDate>2023-09-30</xbrli:endDate></xbrli:period>
  </xbrli:context>
  <xbrli:context id="AsOf2023">
    <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier></xbrli:entity>
    <xbrli:period><xbrli:instant>2023-09-30</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
  <us-gaap:Revenues contextRef="FY2023" unitRef="usd" decimals="-6">383285000000</us-gaap:Revenues>
  <aapl:AdjustedRevenue contextRef="FY2023" unitRef="usd" decimals="-6">390000000000</aapl:AdjustedRevenue>
  <us-gaap:Assets contextRef="AsOf2023" unitRef="usd" decimals="-6">352583000000</us-gaap:Assets>
</xbrli:xbrl>"#;

    fn source() -> FilingSource {
        FilingSource {
            accession: Some("0000320193-23-000106".to_string()),
            form_type: Some("10-K".to_string()),
            filing_date: NaiveDate::from_ymd_opt(2023, 11, 3),
            fiscal_year_end: Some((9, 30)),
            document_name: "aapl-20230930.htm".to_string(),
        }
    }

    #[test]
    fn test_parse_document_set() {
        let files = XbrlFiles {
            schema: Some(SCHEMA),
            instance: Some(INSTANCE),
            ..Default::default()
        };
        let doc = XbrlDocument::parse(files, source()).unwrap();
        assert_eq!(doc.store().len(), 3);

        let revenue = doc.store().latest_fact("us-gaap:Revenues").unwrap();
        assert_eq!(revenue.numeric_value, Some(383_285_000_000.0));
        assert_eq!(revenue.fiscal_period, Some(FiscalPeriod::FY));
        assert_eq!(revenue.fiscal_year, Some(2023));
        assert_eq!(revenue.form_type.as_deref(), Some("10-K"));
        assert!(revenue.is_audited);

        // Extension concept declared in the schema resolves fine
        assert!(doc.store().latest_fact("aapl:AdjustedRevenue").is_some());
    }

    #[test]
    fn test_undeclared_extension_concept_is_schema_violation() {
        let bad_instance = INSTANCE.replace("aapl:AdjustedRevenue", "aapl:NeverDeclared");
        let files = XbrlFiles {
            schema: Some(SCHEMA),
            instance: Some(&bad_instance),
            ..Default::default()
        };
        let result = XbrlDocument::parse(files, source());
        assert!(matches!(
            result,
            Err(FilingError::SchemaViolation { .. })
        ));
    }

    #[test]
    fn test_duplicate_numeric_fact_is_error() {
        let dup = INSTANCE.replace(
            "<us-gaap:Assets contextRef=\"AsOf2023\" unitRef=\"usd\" decimals=\"-6\">352583000000</us-gaap:Assets>",
            "<us-gaap:Assets contextRef=\"AsOf2023\" unitRef=\"usd\" decimals=\"-6\">352583000000</us-gaap:Assets>\n  <us-gaap:Assets contextRef=\"AsOf2023\" unitRef=\"usd\" decimals=\"-6\">352583000001</us-gaap:Assets>",
        );
        let files = XbrlFiles {
            schema: Some(SCHEMA),
            instance: Some(&dup),
            ..Default::default()
        };
        assert!(XbrlDocument::parse(files, source()).is_err());
    }

    #[test]
    fn test_missing_instance_is_fatal() {
        let files = XbrlFiles {
            schema: Some(SCHEMA),
            ..Default::default()
        };
        assert!(XbrlDocument::parse(files, source()).is_err());
    }

    #[test]
    fn test_infer_fiscal_apple_quarters() {
        let fye = Some((9, 30));
        // Q1 FY2024 ends Dec 2023
        let q1 = Period::Duration {
            start: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 12, 30).unwrap(),
        };
        assert_eq!(infer_fiscal(&q1, fye), (Some(2024), Some(FiscalPeriod::Q1)));

        // FY2023 annual
        let fy = Period::Duration {
            start: NaiveDate::from_ymd_opt(2022, 9, 25).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
        };
        assert_eq!(infer_fiscal(&fy, fye), (Some(2023), Some(FiscalPeriod::FY)));

        // YTD-9M ends at Q3
        let ytd9 = Period::Duration {
            start: NaiveDate::from_ymd_opt(2022, 9, 25).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap(),
        };
        assert_eq!(infer_fiscal(&ytd9, fye), (Some(2023), Some(FiscalPeriod::Q3)));
    }

    #[test]
    fn test_infer_fiscal_calendar_year() {
        let q = Period::Duration {
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
        };
        assert_eq!(infer_fiscal(&q, None), (Some(2023), Some(FiscalPeriod::Q1)));

        let instant = Period::Instant(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(
            infer_fiscal(&instant, None),
            (Some(2023), Some(FiscalPeriod::Q4))
        );
    }

    #[test]
    fn test_statement_role_classification() {
        assert_eq!(
            statement_type_for_role("http://www.apple.com/role/CONSOLIDATEDSTATEMENTSOFOPERATIONS"),
            StatementType::Income
        );
        assert_eq!(
            statement_type_for_role("http://www.apple.com/role/CONSOLIDATEDBALANCESHEETS"),
            StatementType::Balance
        );
        assert_eq!(
            statement_type_for_role(
                "http://www.apple.com/role/CONSOLIDATEDBALANCESHEETSParenthetical"
            ),
            StatementType::Other
        );
        assert_eq!(
            statement_type_for_role("http://www.apple.com/role/CONSOLIDATEDSTATEMENTSOFCASHFLOWS"),
            StatementType::CashFlow
        );
    }
}
