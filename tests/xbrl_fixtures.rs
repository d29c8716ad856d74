//! Full XBRL document-set parsing and statement assembly against fixtures.

mod common;

use common::read_fixture;
use filingkit::xbrl::{FilingSource, XbrlDocument, XbrlFiles};
use filingkit::{
    FiscalPeriod, PeriodView, StatementAssembler, StatementType, UnitType,
};

fn parse_document() -> XbrlDocument {
    let schema = read_fixture("xbrl/acme-20231231.xsd");
    let label = read_fixture("xbrl/acme-20231231_lab.xml");
    let presentation = read_fixture("xbrl/acme-20231231_pre.xml");
    let calculation = read_fixture("xbrl/acme-20231231_cal.xml");
    let instance = read_fixture("xbrl/acme-20231231.xml");

    XbrlDocument::parse(
        XbrlFiles {
            schema: Some(&schema),
            label: Some(&label),
            presentation: Some(&presentation),
            definition: None,
            calculation: Some(&calculation),
            instance: Some(&instance),
        },
        FilingSource {
            accession: Some("0009999999-24-000001".to_string()),
            form_type: Some("10-K".to_string()),
            filing_date: chrono::NaiveDate::from_ymd_opt(2024, 2, 15),
            fiscal_year_end: Some((12, 31)),
            document_name: "acme-20231231.xml".to_string(),
        },
    )
    .expect("fixture document set should parse")
}

#[test]
fn test_full_document_set() {
    let doc = parse_document();

    // 11 facts in the instance
    assert_eq!(doc.store().len(), 11);

    let revenue = doc.store().latest_fact("acme:Revenues").unwrap();
    assert_eq!(revenue.numeric_value, Some(1_000_000.0));
    assert_eq!(revenue.fiscal_year, Some(2023));
    assert_eq!(revenue.fiscal_period, Some(FiscalPeriod::FY));
    assert_eq!(revenue.accession.as_deref(), Some("0009999999-24-000001"));

    // Labels resolved through the label linkbase
    assert_eq!(doc.labels.standard("acme:Revenues"), "Net sales");
    // Missing label falls back to a pretty-printed local name
    assert_eq!(doc.labels.standard("acme:Assets"), "Assets");

    // Per-share unit from the divide declaration
    let eps = doc.store().latest_fact("acme:EarningsPerShareBasic").unwrap();
    assert_eq!(eps.unit.unit_type, UnitType::PerShare);
}

#[test]
fn test_dimensional_context() {
    let doc = parse_document();
    let segmented: Vec<_> = doc
        .store()
        .facts_by_concept("acme:Revenues")
        .into_iter()
        .filter(|f| !f.is_default_member())
        .collect();
    assert_eq!(segmented.len(), 1);
    assert_eq!(
        segmented[0]
            .dimensions
            .get("srt:StatementGeographicalAxis")
            .map(String::as_str),
        Some("srt:AmericasMember")
    );
}

#[test]
fn test_statement_roles() {
    let doc = parse_document();
    let roles = doc.statement_roles();
    assert_eq!(roles.len(), 1);
    assert!(roles[0].contains("STATEMENTSOFOPERATIONS"));
    assert!(
        doc.role_for_statement(StatementType::Income).is_some(),
        "income role should be classified"
    );
}

#[test]
fn test_assemble_income_statement() {
    let doc = parse_document();
    let role = doc.role_for_statement(StatementType::Income).unwrap();
    let assembler = StatementAssembler::new(&doc);
    let statement = assembler.assemble(role, PeriodView::AnnualComparison);

    assert_eq!(statement.periods.len(), 2);
    assert_eq!(statement.periods[0].heading(), "FY2023");
    assert_eq!(statement.rows.len(), 5);

    // Abstract header row
    assert!(statement.rows[0].is_abstract);

    // Dimensional facts are projected onto the default member only.
    let revenue = statement.row("acme:Revenues").unwrap();
    assert_eq!(revenue.label, "Net sales");
    assert_eq!(revenue.cells[0].value, Some(1_000_000.0));
    assert_eq!(revenue.cells[1].value, Some(900_000.0));

    // Preferred total label from the presentation arc, confirmed by calculation tree
    let gross = statement.row("acme:GrossProfit").unwrap();
    assert_eq!(gross.label, "Total gross margin");

    let csv = statement.to_csv();
    assert!(csv.starts_with("label,FY2023,FY2022"));
    assert!(csv.contains("Net sales,1000000,900000"));
}

#[test]
fn test_missing_linkbases_degrade() {
    let schema = read_fixture("xbrl/acme-20231231.xsd");
    let instance = read_fixture("xbrl/acme-20231231.xml");

    let doc = XbrlDocument::parse(
        XbrlFiles {
            schema: Some(&schema),
            instance: Some(&instance),
            ..Default::default()
        },
        FilingSource {
            document_name: "acme-20231231.xml".to_string(),
            ..Default::default()
        },
    )
    .expect("missing linkbases must not be fatal");

    assert_eq!(doc.store().len(), 11);
    assert!(doc.presentation_roles().is_empty());
    // Label fallback
    assert_eq!(doc.labels.standard("acme:NetIncomeLoss"), "Net Income Loss");
}

#[test]
fn test_context_interning_invariant() {
    let doc = parse_document();
    // FY2023 facts share a single interned context.
    let facts = doc.store().facts_by_concept("acme:Revenues");
    let fy2023: Vec<_> = facts
        .iter()
        .filter(|f| {
            f.is_default_member()
                && f.period_end == chrono::NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        })
        .collect();
    let cost = doc.store().facts_by_concept("acme:CostOfRevenue");
    let cost_fy2023 = cost
        .iter()
        .find(|f| f.period_end == chrono::NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
        .unwrap();
    assert_eq!(fy2023[0].context, cost_fy2023.context);
}
