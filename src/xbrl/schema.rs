//! XBRL taxonomy schema (XSD) parsing.
//!
//! The schema declares every concept the instance may reference: its data type, period
//! type, balance attribute, substitution group, and whether it is abstract. Linkbase
//! locators point at these declarations by element id (`us-gaap_Revenues`), so the parser
//! indexes concepts both by prefixed name and by id.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use crate::error::{FilingError, Result};
use crate::facts::PeriodType;

/// Balance attribute of a monetary concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    Debit,
    Credit,
    None,
}

/// Coarse data type classification derived from the XSD `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConceptDataType {
    Monetary,
    Shares,
    PerShare,
    Percent,
    Date,
    Text,
    Other,
}

impl ConceptDataType {
    fn from_xsd_type(t: &str) -> Self {
        let local = t.rsplit_once(':').map(|(_, l)| l).unwrap_or(t);
        match local {
            "monetaryItemType" => ConceptDataType::Monetary,
            "sharesItemType" => ConceptDataType::Shares,
            "perShareItemType" => ConceptDataType::PerShare,
            "percentItemType" | "pureItemType" => ConceptDataType::Percent,
            "dateItemType" => ConceptDataType::Date,
            "stringItemType" | "textBlockItemType" => ConceptDataType::Text,
            _ => ConceptDataType::Other,
        }
    }
}

/// A taxonomy element: one concept declaration from the schema.
#[derive(Debug, Clone)]
pub struct Concept {
    /// Prefixed name, e.g. `us-gaap:Revenues`.
    pub name: String,

    /// Element id used by linkbase locator fragments, e.g. `us-gaap_Revenues`.
    pub id: Option<String>,

    pub data_type: ConceptDataType,
    pub period_type: PeriodType,
    pub balance: Balance,
    pub substitution_group: Option<String>,
    pub is_abstract: bool,
}

impl Concept {
    /// Local name without the taxonomy prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map(|(_, l)| l)
            .unwrap_or(&self.name)
    }
}

/// Parsed schema: the element table indexed by name and by id.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    concepts: HashMap<String, Concept>,
    by_id: HashMap<String, String>,

    /// Namespace prefix declared for the target namespace (e.g. `us-gaap`, or the
    /// company ticker for extension taxonomies).
    pub target_prefix: Option<String>,
}

impl SchemaDocument {
    /// Parses an XSD taxonomy schema.
    ///
    /// Only `xsd:element` declarations are consumed; imports, role types and type
    /// definitions are skipped. Elements without a `name` attribute are ignored.
    pub fn parse(xml: &str, context: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = SchemaDocument::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = e.name();
                    let local = local_tag(name.as_ref());
                    if local == b"schema" {
                        doc.target_prefix = target_prefix(e);
                    } else if local == b"element" {
                        if let Some(concept) = parse_element(e, doc.target_prefix.as_deref()) {
                            if let Some(id) = &concept.id {
                                doc.by_id.insert(id.clone(), concept.name.clone());
                            }
                            doc.concepts.insert(concept.name.clone(), concept);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FilingError::xbrl(context, format!("schema: {}", e)));
                }
            }
            buf.clear();
        }

        tracing::debug!(
            "Parsed schema {}: {} concepts",
            context,
            doc.concepts.len()
        );
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Looks up a concept by prefixed name.
    pub fn concept(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Resolves a locator fragment id (`us-gaap_Revenues`) to its concept.
    pub fn concept_by_id(&self, id: &str) -> Option<&Concept> {
        self.by_id.get(id).and_then(|name| self.concepts.get(name))
    }

    /// Resolves a concept from either a prefixed name or a fragment id.
    pub fn resolve(&self, reference: &str) -> Option<&Concept> {
        self.concept(reference)
            .or_else(|| self.concept_by_id(reference))
            .or_else(|| self.concept(&reference.replace('_', ":")))
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// Registers a concept directly, used by tests and by instance-driven recovery
    /// when a standard-taxonomy concept is referenced but the schema file only covers
    /// the company extension.
    pub fn insert(&mut self, concept: Concept) {
        if let Some(id) = &concept.id {
            self.by_id.insert(id.clone(), concept.name.clone());
        }
        self.concepts.insert(concept.name.clone(), concept);
    }
}

fn local_tag(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr_value(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        let name = a.key.as_ref();
        let local = local_tag(name);
        if local == key.as_bytes() {
            String::from_utf8(a.value.to_vec()).ok()
        } else {
            None
        }
    })
}

/// Finds the prefix bound to the `targetNamespace` URI on the schema root.
fn target_prefix(e: &BytesStart<'_>) -> Option<String> {
    let target = attr_value(e, "targetNamespace")?;
    for attr in e.attributes().flatten() {
        let key = attr.key.as_ref();
        if let Some(prefix) = key.strip_prefix(b"xmlns:") {
            if attr.value.as_ref() == target.as_bytes() {
                return String::from_utf8(prefix.to_vec()).ok();
            }
        }
    }
    None
}

fn parse_element(e: &BytesStart<'_>, target_prefix: Option<&str>) -> Option<Concept> {
    let local_name = attr_value(e, "name")?;
    let id = attr_value(e, "id");

    // Prefer the prefix encoded in the id ("us-gaap_Revenues"), then the schema's
    // target prefix.
    let prefix = id
        .as_deref()
        .and_then(|i| i.split_once('_').map(|(p, _)| p.to_string()))
        .or_else(|| target_prefix.map(String::from));

    let name = match prefix {
        Some(p) => format!("{}:{}", p, local_name),
        None => local_name.clone(),
    };

    let data_type = attr_value(e, "type")
        .map(|t| ConceptDataType::from_xsd_type(&t))
        .unwrap_or(ConceptDataType::Other);

    let period_type = match attr_value(e, "periodType").as_deref() {
        Some("instant") => PeriodType::Instant,
        _ => PeriodType::Duration,
    };

    let balance = match attr_value(e, "balance").as_deref() {
        Some("debit") => Balance::Debit,
        Some("credit") => Balance::Credit,
        _ => Balance::None,
    };

    let is_abstract = attr_value(e, "abstract").as_deref() == Some("true");

    Some(Concept {
        name,
        id,
        data_type,
        period_type,
        balance,
        substitution_group: attr_value(e, "substitutionGroup"),
        is_abstract,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xsd:schema xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:aapl="http://www.apple.com/20230930"
    targetNamespace="http://www.apple.com/20230930">
  <xsd:element name="Revenues" id="aapl_Revenues" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="duration" xbrli:balance="credit"/>
  <xsd:element name="Assets" id="aapl_Assets" type="xbrli:monetaryItemType"
      substitutionGroup="xbrli:item" xbrli:periodType="instant" xbrli:balance="debit"/>
  <xsd:element name="IncomeStatementAbstract" id="aapl_IncomeStatementAbstract"
      type="xbrli:stringItemType" abstract="true" substitutionGroup="xbrli:item"
      xbrli:periodType="duration"/>
  <xsd:element name="EarningsPerShareBasic" id="aapl_EarningsPerShareBasic"
      type="num:perShareItemType" xmlns:num="http://www.xbrl.org/dtr/type/numeric"
      substitutionGroup="xbrli:item" xbrli:periodType="duration"/>
</xsd:schema>"#;

    #[test]
    fn test_parse_schema() {
        let schema = SchemaDocument::parse(SCHEMA, "test.xsd").unwrap();
        assert_eq!(schema.len(), 4);

        let revenues = schema.concept("aapl:Revenues").unwrap();
        assert_eq!(revenues.data_type, ConceptDataType::Monetary);
        assert_eq!(revenues.period_type, PeriodType::Duration);
        assert_eq!(revenues.balance, Balance::Credit);
        assert!(!revenues.is_abstract);

        let assets = schema.concept("aapl:Assets").unwrap();
        assert_eq!(assets.period_type, PeriodType::Instant);
        assert_eq!(assets.balance, Balance::Debit);

        let heading = schema.concept("aapl:IncomeStatementAbstract").unwrap();
        assert!(heading.is_abstract);

        let eps = schema.concept("aapl:EarningsPerShareBasic").unwrap();
        assert_eq!(eps.data_type, ConceptDataType::PerShare);
    }

    #[test]
    fn test_resolve_by_id() {
        let schema = SchemaDocument::parse(SCHEMA, "test.xsd").unwrap();
        let concept = schema.concept_by_id("aapl_Revenues").unwrap();
        assert_eq!(concept.name, "aapl:Revenues");

        // resolve() accepts both spellings
        assert!(schema.resolve("aapl:Assets").is_some());
        assert!(schema.resolve("aapl_Assets").is_some());
    }

    #[test]
    fn test_malformed_schema() {
        let result = SchemaDocument::parse("<xsd:schema><unclosed", "bad.xsd");
        assert!(result.is_err());
    }
}
