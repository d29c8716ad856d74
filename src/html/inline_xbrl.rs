//! Inline XBRL (`ix:*`) extraction from filing HTML.
//!
//! An iXBRL document is one file that is both the human-readable filing and the
//! machine-readable instance: numeric values are wrapped in `ix:nonFraction`, text in
//! `ix:nonNumeric`, and the contexts/units hide inside an `ix:header` block. The HTML
//! parser calls into this module to resolve those wrappers into facts for the
//! document's co-parsed fact store.
//!
//! Transformations follow the inline XBRL spec's subset that SEC filings use:
//! `scale` multiplies by a power of ten, `sign="-"` negates, and `format`ted values
//! (`ixt:num-dot-decimal` and friends) are read leniently by stripping separators.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};

use crate::facts::{Context, DataQuality, FactBuilder, FactStore, Period};
use crate::html::table::parse_numeric;
use crate::units::Unit;
use crate::xbrl::{FilingSource, infer_fiscal};

/// Contexts and units pulled from the `ix:header` resources block.
#[derive(Debug, Clone, Default)]
pub struct InlineResources {
    pub contexts: HashMap<String, (Period, String, BTreeMap<String, String>)>,
    pub units: HashMap<String, Unit>,
}

/// Scans the parsed HTML for `xbrli:context` and `xbrli:unit` declarations.
///
/// html5ever folds element names to lower case, so the selectors match the folded
/// spellings.
pub fn parse_inline_resources(html: &Html) -> InlineResources {
    let mut resources = InlineResources::default();

    let context_sel = Selector::parse(r#"xbrli\:context"#).expect("valid selector");
    let instant_sel = Selector::parse(r#"xbrli\:instant"#).expect("valid selector");
    let start_sel = Selector::parse(r#"xbrli\:startdate"#).expect("valid selector");
    let end_sel = Selector::parse(r#"xbrli\:enddate"#).expect("valid selector");
    let identifier_sel = Selector::parse(r#"xbrli\:identifier"#).expect("valid selector");
    let member_sel = Selector::parse(r#"xbrldi\:explicitmember"#).expect("valid selector");

    for context in html.select(&context_sel) {
        let Some(id) = context.value().attr("id") else {
            continue;
        };

        let date_of = |sel: &Selector| -> Option<NaiveDate> {
            context
                .select(sel)
                .next()
                .and_then(|e| NaiveDate::parse_from_str(text_of(&e).trim(), "%Y-%m-%d").ok())
        };

        let period = if let Some(instant) = date_of(&instant_sel) {
            Period::Instant(instant)
        } else if let (Some(start), Some(end)) = (date_of(&start_sel), date_of(&end_sel)) {
            Period::Duration { start, end }
        } else {
            continue;
        };

        let entity = context
            .select(&identifier_sel)
            .next()
            .map(|e| text_of(&e).trim().to_string())
            .unwrap_or_default();

        let mut dimensions = BTreeMap::new();
        for member in context.select(&member_sel) {
            if let Some(dimension) = member.value().attr("dimension") {
                dimensions.insert(dimension.to_string(), text_of(&member).trim().to_string());
            }
        }

        resources
            .contexts
            .insert(id.to_string(), (period, entity, dimensions));
    }

    let unit_sel = Selector::parse(r#"xbrli\:unit"#).expect("valid selector");
    let measure_sel = Selector::parse(r#"xbrli\:measure"#).expect("valid selector");
    for unit in html.select(&unit_sel) {
        let Some(id) = unit.value().attr("id") else {
            continue;
        };
        let measures: Vec<String> = unit
            .select(&measure_sel)
            .map(|m| text_of(&m).trim().to_string())
            .collect();
        let resolved = match measures.len() {
            0 => Unit::unknown(""),
            1 => Unit::parse(&measures[0]),
            // A divide block yields numerator then denominator in document order.
            _ => Unit::divide(&measures[0], &measures[1]),
        };
        resources.units.insert(id.to_string(), resolved);
    }

    resources
}

/// Resolves one `ix:nonFraction` or `ix:nonNumeric` element into a fact and adds it
/// to the store. Returns the concept and context reference for the tree node, or
/// None when the wrapper is unresolvable.
pub fn extract_fact(
    element: &ElementRef<'_>,
    resources: &InlineResources,
    store: &mut FactStore,
    source: &FilingSource,
) -> Option<(String, String)> {
    let attrs = element.value();
    let concept = attrs.attr("name")?.to_string();
    let context_ref = attrs.attr("contextref")?.to_string();

    let (period, entity, dimensions) = resources.contexts.get(&context_ref)?.clone();

    let is_non_fraction = element.value().name().ends_with("nonfraction");
    let unit = if is_non_fraction {
        match attrs.attr("unitref").and_then(|u| resources.units.get(u)) {
            Some(unit) => unit.clone(),
            None => Unit::unknown(attrs.attr("unitref").unwrap_or("")),
        }
    } else {
        Unit::unknown("")
    };

    let raw_text: String = text_of(element);
    let raw_text = raw_text.trim().to_string();

    let (fiscal_year, fiscal_period) = infer_fiscal(&period, source.fiscal_year_end);

    let mut builder = FactBuilder::new(concept.clone(), unit.clone(), period.end())
        .period(period.start(), period.end())
        .fiscal(fiscal_year, fiscal_period)
        .provenance(
            source.filing_date,
            source.form_type.clone(),
            source.accession.clone(),
        )
        .dimensions(dimensions);

    if is_non_fraction {
        let sign_negates = attrs.attr("sign") == Some("-");
        let scale: i32 = attrs
            .attr("scale")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        match parse_numeric(&raw_text) {
            Some(mut value) => {
                value *= 10f64.powi(scale);
                if sign_negates {
                    value = -value;
                }
                builder = builder.numeric(value);
            }
            None => {
                builder = builder.raw_value(&raw_text, &unit).quality(DataQuality::Low);
            }
        }
        if let Some(decimals) = attrs.attr("decimals").and_then(crate::facts::Decimals::parse) {
            builder = builder.decimals(Some(decimals));
        }
    } else {
        builder = builder.raw_value(&raw_text, &unit);
    }

    let mut fact = builder.build();
    let context = Context::new(entity, period).with_dimensions(fact.dimensions.clone());
    fact.context = store.intern_context(context);
    store.add(fact);

    Some((concept, context_ref))
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const IXBRL: &str = r#"<html><body>
<div style="display:none">
  <ix:header>
    <ix:resources>
      <xbrli:context id="FY2023">
        <xbrli:entity><xbrli:identifier scheme="http://www.sec.gov/CIK">0000320193</xbrli:identifier></xbrli:entity>
        <xbrli:period><xbrli:startDate>2022-09-25</xbrli:startDate><xbrli:endDate>2023-09-30</xbrli:endDate></xbrli:period>
      </xbrli:context>
      <xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
    </ix:resources>
  </ix:header>
</div>
<p>Net sales of <ix:nonFraction name="us-gaap:Revenues" contextRef="FY2023" unitRef="usd" scale="6" decimals="-6">383,285</ix:nonFraction> million.</p>
<p>Loss of <ix:nonFraction name="us-gaap:OperatingIncomeLoss" contextRef="FY2023" unitRef="usd" scale="0" sign="-" decimals="0">500</ix:nonFraction>.</p>
</body></html>"#;

    #[test]
    fn test_parse_resources() {
        let html = Html::parse_document(IXBRL);
        let resources = parse_inline_resources(&html);
        assert_eq!(resources.contexts.len(), 1);
        assert_eq!(resources.units.len(), 1);
        assert_eq!(resources.units["usd"].canonical, "USD");
        let (period, entity, dims) = &resources.contexts["FY2023"];
        assert!(matches!(period, Period::Duration { .. }));
        assert_eq!(entity, "0000320193");
        assert!(dims.is_empty());
    }

    #[test]
    fn test_extract_scaled_fact() {
        let html = Html::parse_document(IXBRL);
        let resources = parse_inline_resources(&html);
        let mut store = FactStore::new();
        let source = FilingSource {
            form_type: Some("10-K".to_string()),
            fiscal_year_end: Some((9, 30)),
            document_name: "test".to_string(),
            ..Default::default()
        };

        let sel = Selector::parse(r#"ix\:nonfraction"#).unwrap();
        for element in html.select(&sel) {
            extract_fact(&element, &resources, &mut store, &source);
        }
        store.freeze();

        assert_eq!(store.len(), 2);
        let revenue = store.latest_fact("us-gaap:Revenues").unwrap();
        // 383,285 at scale 6
        assert_eq!(revenue.numeric_value, Some(383_285_000_000.0));

        let loss = store.latest_fact("us-gaap:OperatingIncomeLoss").unwrap();
        assert_eq!(loss.numeric_value, Some(-500.0));
    }
}
