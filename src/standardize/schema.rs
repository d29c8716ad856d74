//! Mapping-schema data model for the concept standardizer.
//!
//! Schemas are JSON documents parsed once at startup into an explicit expression AST.
//! Rule evaluation never resolves names reflectively at query time; `computeAny`
//! expressions are trees of operations over field references and concept lists.
//!
//! Two invariants are enforced at load time rather than documented and hoped for:
//! a rule carries exactly one of `selectAny` / `computeAny`, and priorities are
//! plain integers so industry rules (≥150 by convention) always outrank generic
//! rules (110-120) and computed fallbacks (80-100).

use serde::Deserialize;

use crate::error::{FilingError, Result};

/// A full mapping schema: one statement's canonical fields.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingSchema {
    /// Statement this schema covers: "income", "balance", "cashflow".
    pub statement: String,

    pub fields: Vec<FieldMapping>,
}

/// One canonical output field and its prioritized resolution rules.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Canonical field name, e.g. "revenue", "netIncome", "totalAssets".
    pub name: String,

    pub rules: Vec<Rule>,
}

/// A single resolution rule.
///
/// `selectAny` lists concepts in resolution order; aggregate totals must be listed
/// before their components, or the first match silently underreports. `computeAny`
/// lists candidate expressions tried in order; an expression only produces a value
/// when every referenced field resolves.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub name: String,
    pub priority: i32,

    /// Case-insensitive substring matches against the filer's industry descriptor.
    /// A rule with hints is skipped entirely when none match.
    #[serde(default, rename = "industryHints")]
    pub industry_hints: Vec<String>,

    #[serde(default, rename = "selectAny")]
    pub select_any: Option<Vec<String>>,

    #[serde(default, rename = "computeAny")]
    pub compute_any: Option<Vec<Expr>>,
}

impl Rule {
    /// A rule must carry exactly one resolution strategy.
    pub fn validate(&self) -> Result<()> {
        match (&self.select_any, &self.compute_any) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(FilingError::MappingSchema(format!(
                "rule '{}' mixes selectAny and computeAny; split into two rules",
                self.name
            ))),
            (None, None) => Err(FilingError::MappingSchema(format!(
                "rule '{}' has neither selectAny nor computeAny",
                self.name
            ))),
        }
    }
}

/// Arithmetic operation kinds for computed expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Id,
}

/// Expression tree node.
///
/// JSON spellings:
/// - `{"op": "add", "terms": [...]}`: an operation over sub-expressions
/// - `{"field": "revenue"}`: reference to another canonical field
/// - `{"conceptAny": ["us-gaap:Revenues", ...]}`: first matching concept's value
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expr {
    Operation { op: Op, terms: Vec<Expr> },
    FieldRef { field: String },
    ConceptAny {
        #[serde(rename = "conceptAny")]
        concept_any: Vec<String>,
    },
}

impl MappingSchema {
    /// Parses and validates a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: MappingSchema = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Validates every rule and sorts rules within each field by descending priority.
    pub fn validate(&self) -> Result<()> {
        for field in &self.fields {
            for rule in &field.rules {
                rule.validate()?;
            }
        }
        Ok(())
    }

    /// Rules of a field in descending priority order.
    pub fn rules_for(&self, field: &str) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self
            .fields
            .iter()
            .filter(|f| f.name == field)
            .flat_map(|f| f.rules.iter())
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        rules
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
