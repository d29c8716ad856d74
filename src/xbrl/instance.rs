//! XBRL 2.1 instance document parsing.
//!
//! The instance holds three kinds of children: `context` elements (entity + period +
//! dimensional segment/scenario), `unit` elements (`measure` or `divide`), and the facts
//! themselves, which are elements in taxonomy namespaces carrying `contextRef` and
//! (for numeric facts) `unitRef` and `decimals` attributes.
//!
//! The parser is a single quick-xml event loop. It does not resolve facts against the
//! schema; that happens in [`XbrlDocument`](crate::xbrl::XbrlDocument) so that schema
//! violations can be reported with full document context. Facts are emitted in document
//! order.

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{BTreeMap, HashMap};

use crate::error::{FilingError, Result};
use crate::facts::Period;
use crate::units::Unit;

/// A context as declared in the instance, before interning.
#[derive(Debug, Clone)]
pub struct RawContext {
    pub id: String,
    pub entity: String,
    pub period: Period,
    pub dimensions: BTreeMap<String, String>,
}

/// A fact as read from the instance, before schema resolution.
#[derive(Debug, Clone)]
pub struct RawFact {
    /// Prefixed element name, e.g. `us-gaap:Revenues`.
    pub concept: String,
    pub context_ref: String,
    pub unit_ref: Option<String>,
    pub decimals: Option<String>,
    pub value: String,
    pub is_nil: bool,
}

/// Parsed instance document: contexts, units, and facts in document order.
#[derive(Debug, Clone, Default)]
pub struct InstanceDocument {
    pub contexts: HashMap<String, RawContext>,
    pub units: HashMap<String, Unit>,
    pub facts: Vec<RawFact>,
}

/// Element names that structure the instance rather than carrying fact values.
const STRUCTURAL_PREFIXES: &[&str] = &["xbrli", "link", "xlink", "xsi", "xbrldi", "iso4217"];

impl InstanceDocument {
    /// Parses an XBRL instance. Malformed XML is fatal; the error carries the document
    /// identity and the parser's byte position.
    pub fn parse(xml: &str, context_name: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = InstanceDocument::default();
        let mut buf = Vec::new();

        // Context being assembled
        let mut ctx_state: Option<ContextState> = None;
        // Unit being assembled
        let mut unit_state: Option<UnitState> = None;
        // Fact element being read (facts are leaves; nested fact elements do not occur
        // in the SEC dialect)
        let mut fact_state: Option<RawFact> = None;
        // Which simple element inside a context/unit we are inside of
        let mut leaf: Leaf = Leaf::None;
        let mut text_acc = String::new();

        loop {
            let position = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = qname(e);
                    let local = name.local.as_str();

                    if let Some(unit) = unit_state.as_mut() {
                        match local {
                            "measure" => leaf = Leaf::Measure,
                            "unitNumerator" => unit.in_numerator = true,
                            "unitDenominator" => unit.in_denominator = true,
                            _ => {}
                        }
                        text_acc.clear();
                    } else if ctx_state.is_some() {
                        match local {
                            "identifier" => leaf = Leaf::Identifier,
                            "instant" => leaf = Leaf::Instant,
                            "startDate" => leaf = Leaf::StartDate,
                            "endDate" => leaf = Leaf::EndDate,
                            "explicitMember" => {
                                leaf = Leaf::ExplicitMember(
                                    attr(e, "dimension").unwrap_or_default(),
                                );
                            }
                            _ => {}
                        }
                        text_acc.clear();
                    } else if fact_state.is_none() {
                        match local {
                            "context" => {
                                ctx_state = Some(ContextState::new(
                                    attr(e, "id").unwrap_or_default(),
                                ));
                            }
                            "unit" => {
                                unit_state =
                                    Some(UnitState::new(attr(e, "id").unwrap_or_default()));
                            }
                            _ if is_fact_element(&name) => {
                                if let Some(context_ref) = attr(e, "contextRef") {
                                    fact_state = Some(RawFact {
                                        concept: name.prefixed(),
                                        context_ref,
                                        unit_ref: attr(e, "unitRef"),
                                        decimals: attr(e, "decimals"),
                                        value: String::new(),
                                        is_nil: attr(e, "nil").as_deref() == Some("true"),
                                    });
                                    text_acc.clear();
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let name = qname(e);
                    if ctx_state.is_none()
                        && unit_state.is_none()
                        && fact_state.is_none()
                        && is_fact_element(&name)
                    {
                        // Nil facts are frequently self-closing.
                        if let Some(context_ref) = attr(e, "contextRef") {
                            doc.facts.push(RawFact {
                                concept: name.prefixed(),
                                context_ref,
                                unit_ref: attr(e, "unitRef"),
                                decimals: attr(e, "decimals"),
                                value: String::new(),
                                is_nil: true,
                            });
                        }
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if let Ok(text) = t.unescape() {
                        text_acc.push_str(&text);
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = qname_end(e.name().as_ref());
                    let local = name.local.as_str();

                    if unit_state.is_some() {
                        if local == "unit" {
                            if let Some(unit) = unit_state.take() {
                                let (id, resolved) = unit.finish();
                                doc.units.insert(id, resolved);
                            }
                        } else if let Some(unit) = unit_state.as_mut() {
                            match local {
                                "measure" => {
                                    unit.push_measure(text_acc.trim());
                                    leaf = Leaf::None;
                                }
                                "unitNumerator" => unit.in_numerator = false,
                                "unitDenominator" => unit.in_denominator = false,
                                _ => {}
                            }
                        }
                    } else if ctx_state.is_some() {
                        if local == "context" {
                            match ctx_state.take().and_then(ContextState::finish) {
                                Some(raw) => {
                                    doc.contexts.insert(raw.id.clone(), raw);
                                }
                                None => {
                                    tracing::warn!(
                                        "Context without a valid period in {}, skipping",
                                        context_name
                                    );
                                }
                            }
                        } else if let Some(ctx) = ctx_state.as_mut() {
                            match (&leaf, local) {
                                (Leaf::Identifier, "identifier") => {
                                    ctx.entity = text_acc.trim().to_string();
                                }
                                (Leaf::Instant, "instant") => {
                                    ctx.instant = parse_date(text_acc.trim());
                                }
                                (Leaf::StartDate, "startDate") => {
                                    ctx.start = parse_date(text_acc.trim());
                                }
                                (Leaf::EndDate, "endDate") => {
                                    ctx.end = parse_date(text_acc.trim());
                                }
                                (Leaf::ExplicitMember(dimension), "explicitMember") => {
                                    ctx.dimensions.insert(
                                        dimension.clone(),
                                        text_acc.trim().to_string(),
                                    );
                                }
                                _ => {}
                            }
                            leaf = Leaf::None;
                        }
                    } else if let Some(fact) = fact_state.take() {
                        if name.prefixed() == fact.concept {
                            doc.facts.push(RawFact {
                                value: text_acc.trim().to_string(),
                                ..fact
                            });
                        } else {
                            // Closing something else (nested markup inside a text
                            // block); keep collecting.
                            fact_state = Some(fact);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FilingError::xbrl(
                        context_name,
                        format!("instance at byte {}: {}", position, e),
                    ));
                }
            }
            buf.clear();
        }

        tracing::debug!(
            "Parsed instance {}: {} contexts, {} units, {} facts",
            context_name,
            doc.contexts.len(),
            doc.units.len(),
            doc.facts.len()
        );
        Ok(doc)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Leaf {
    None,
    Identifier,
    Instant,
    StartDate,
    EndDate,
    Measure,
    ExplicitMember(String),
}

struct ContextState {
    id: String,
    entity: String,
    instant: Option<NaiveDate>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    dimensions: BTreeMap<String, String>,
}

impl ContextState {
    fn new(id: String) -> Self {
        Self {
            id,
            entity: String::new(),
            instant: None,
            start: None,
            end: None,
            dimensions: BTreeMap::new(),
        }
    }

    fn finish(self) -> Option<RawContext> {
        let period = if let Some(date) = self.instant {
            Period::Instant(date)
        } else if let (Some(start), Some(end)) = (self.start, self.end) {
            Period::Duration { start, end }
        } else {
            return None;
        };
        Some(RawContext {
            id: self.id,
            entity: self.entity,
            period,
            dimensions: self.dimensions,
        })
    }
}

struct UnitState {
    id: String,
    measures: Vec<String>,
    numerator: Vec<String>,
    denominator: Vec<String>,
    in_numerator: bool,
    in_denominator: bool,
}

impl UnitState {
    fn new(id: String) -> Self {
        Self {
            id,
            measures: Vec::new(),
            numerator: Vec::new(),
            denominator: Vec::new(),
            in_numerator: false,
            in_denominator: false,
        }
    }

    fn push_measure(&mut self, measure: &str) {
        if self.in_numerator {
            self.numerator.push(measure.to_string());
        } else if self.in_denominator {
            self.denominator.push(measure.to_string());
        } else {
            self.measures.push(measure.to_string());
        }
    }

    fn finish(self) -> (String, Unit) {
        let unit = if !self.numerator.is_empty() && !self.denominator.is_empty() {
            Unit::divide(&self.numerator[0], &self.denominator[0])
        } else if let Some(measure) = self.measures.first() {
            if self.measures.len() > 1 {
                // Compound product unit, e.g. USD * shares; keep the flattened spelling.
                Unit::unknown(&self.measures.join("*"))
            } else {
                Unit::parse(measure)
            }
        } else {
            Unit::unknown("")
        };
        (self.id, unit)
    }
}

struct QName {
    prefix: Option<String>,
    local: String,
}

impl QName {
    fn prefixed(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

fn qname(e: &BytesStart<'_>) -> QName {
    let raw = e.name();
    let raw = raw.as_ref();
    match raw.iter().position(|&b| b == b':') {
        Some(pos) => QName {
            prefix: String::from_utf8(raw[..pos].to_vec()).ok(),
            local: String::from_utf8_lossy(&raw[pos + 1..]).into_owned(),
        },
        None => QName {
            prefix: None,
            local: String::from_utf8_lossy(raw).into_owned(),
        },
    }
}

fn qname_end(raw: &[u8]) -> QName {
    match raw.iter().position(|&b| b == b':') {
        Some(pos) => QName {
            prefix: String::from_utf8(raw[..pos].to_vec()).ok(),
            local: String::from_utf8_lossy(&raw[pos + 1..]).into_owned(),
        },
        None => QName {
            prefix: None,
            local: String::from_utf8_lossy(raw).into_owned(),
        },
    }
}

fn is_fact_element(name: &QName) -> bool {
    match &name.prefix {
        Some(prefix) => !STRUCTURAL_PREFIXES.contains(&prefix.as_str()),
        None => !matches!(name.local.as_str(), "xbrl" | "context" | "unit"),
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        let name = a.key.as_ref();
        let local = match name.iter().rposition(|&b| b == b':') {
            Some(pos) => &name[pos + 1..],
            None => name,
        };
        if local == key.as_bytes() {
            String::from_utf8(a.value.to_vec()).ok()
        } else {
            None
        }
    })
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitType;

    const INSTANCE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
    xmlns:xbrldi="http://xbrl.org/2006/xbrldi"
    xmlns:us-gaap="http://fasb.org/us-gaap/2023"
    xmlns:srt="http://fasb.org/srt/2023"
    xmlns:iso4217="http://www.xbrl.org/2003/iso4217">
  <xbrli:context id="FY2023">
    <xbrli:entity>
      <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
    </xbrli:entity>
    <xbrli:period>
      <xbrli:startDate>2022-09-25</xbrli:startDate>
      <xbrli:endDate>2023-09-30</xbrli:endDate>
    </xbrli:period>
  </xbrli:context>
  <xbrli:context id="AsOf2023">
    <xbrli:entity>
      <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
    </xbrli:entity>
    <xbrli:period>
      <xbrli:instant>2023-09-30</xbrli:instant>
    </xbrli:period>
  </xbrli:context>
  <xbrli:context id="FY2023_Americas">
    <xbrli:entity>
      <xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier>
      <xbrli:segment>
        <xbrldi:explicitMember dimension="srt:StatementGeographicalAxis">srt:AmericasMember</xbrldi:explicitMember>
      </xbrli:segment>
    </xbrli:entity>
    <xbrli:period>
      <xbrli:startDate>2022-09-25</xbrli:startDate>
      <xbrli:endDate>2023-09-30</xbrli:endDate>
    </xbrli:period>
  </xbrli:context>
  <xbrli:unit id="usd">
    <xbrli:measure>iso4217:USD</xbrli:measure>
  </xbrli:unit>
  <xbrli:unit id="usdPerShare">
    <xbrli:divide>
      <xbrli:unitNumerator>
        <xbrli:measure>iso4217:USD</xbrli:measure>
      </xbrli:unitNumerator>
      <xbrli:unitDenominator>
        <xbrli:measure>xbrli:shares</xbrli:measure>
      </xbrli:unitDenominator>
    </xbrli:divide>
  </xbrli:unit>
  <us-gaap:Revenues contextRef="FY2023" unitRef="usd" decimals="-6">383285000000</us-gaap:Revenues>
  <us-gaap:Revenues contextRef="FY2023_Americas" unitRef="usd" decimals="-6">162560000000</us-gaap:Revenues>
  <us-gaap:Assets contextRef="AsOf2023" unitRef="usd" decimals="-6">352583000000</us-gaap:Assets>
  <us-gaap:EarningsPerShareBasic contextRef="FY2023" unitRef="usdPerShare" decimals="2">6.16</us-gaap:EarningsPerShareBasic>
</xbrli:xbrl>"#;

    #[test]
    fn test_parse_contexts() {
        let doc = InstanceDocument::parse(INSTANCE, "test.xml").unwrap();
        assert_eq!(doc.contexts.len(), 3);

        let fy = &doc.contexts["FY2023"];
        assert_eq!(fy.entity, "0000320193");
        assert!(matches!(fy.period, Period::Duration { .. }));
        assert!(fy.dimensions.is_empty());

        let instant = &doc.contexts["AsOf2023"];
        assert!(matches!(instant.period, Period::Instant(_)));

        let segmented = &doc.contexts["FY2023_Americas"];
        assert_eq!(
            segmented.dimensions.get("srt:StatementGeographicalAxis"),
            Some(&"srt:AmericasMember".to_string())
        );
    }

    #[test]
    fn test_parse_units() {
        let doc = InstanceDocument::parse(INSTANCE, "test.xml").unwrap();
        assert_eq!(doc.units["usd"].canonical, "USD");
        assert_eq!(doc.units["usd"].unit_type, UnitType::Monetary);
        assert_eq!(doc.units["usdPerShare"].canonical, "USD/shares");
        assert_eq!(doc.units["usdPerShare"].unit_type, UnitType::PerShare);
    }

    #[test]
    fn test_parse_facts_in_document_order() {
        let doc = InstanceDocument::parse(INSTANCE, "test.xml").unwrap();
        assert_eq!(doc.facts.len(), 4);
        assert_eq!(doc.facts[0].concept, "us-gaap:Revenues");
        assert_eq!(doc.facts[0].value, "383285000000");
        assert_eq!(doc.facts[0].decimals.as_deref(), Some("-6"));
        assert_eq!(doc.facts[2].concept, "us-gaap:Assets");
        assert_eq!(doc.facts[3].concept, "us-gaap:EarningsPerShareBasic");
        assert_eq!(doc.facts[3].unit_ref.as_deref(), Some("usdPerShare"));
    }

    #[test]
    fn test_malformed_instance_is_fatal() {
        let result = InstanceDocument::parse("<xbrli:xbrl><broken", "bad.xml");
        assert!(result.is_err());
    }
}
