//! Statement assembly: binding facts to presentation trees.
//!
//! The assembler walks the presentation tree of one role, selects the reporting periods
//! to show, and emits one row per concept with one cell per period. Abstract concepts
//! become section headers with blank cells. Dimensioned facts are projected onto the
//! default member; other slices stay reachable through the query API. When a line item
//! has facts only under non-default members, its cell is left empty.
//!
//! Total rows are detected by the last-sibling-at-level heuristic, confirmed by either
//! a `totalLabel` preferred label on the arc or a summation parent in the calculation
//! tree for the same role.

use chrono::NaiveDate;

use crate::facts::{Fact, FiscalPeriod, StatementType};
use crate::units::PeriodBucket;
use crate::xbrl::{XbrlDocument, label_roles, statement_type_for_role};

/// Named period-selection policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodView {
    /// The single most recent period.
    CurrentPeriod,
    /// Up to three annual periods.
    ThreeYearAnnual,
    /// Up to four quarterly periods.
    QuarterlyComparison,
    /// Two annual periods, current and prior.
    AnnualComparison,
    /// Every distinct period with data.
    All,
}

/// One column of an assembled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPeriod {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<FiscalPeriod>,
}

impl StatementPeriod {
    /// Column header text: "FY2023", "Q3 2024", or the bare end date.
    pub fn heading(&self) -> String {
        match (self.fiscal_period, self.fiscal_year) {
            (Some(FiscalPeriod::FY), Some(year)) => format!("FY{}", year),
            (Some(period), Some(year)) => format!("{} {}", period, year),
            _ => self.end.to_string(),
        }
    }
}

/// One cell: the bound value plus enough provenance to audit it.
#[derive(Debug, Clone, Default)]
pub struct StatementCell {
    pub value: Option<f64>,
    /// Raw text for non-numeric facts; empty-string facts keep a marker here so a
    /// present-but-empty column is distinguishable from a truly absent fact.
    pub raw: Option<String>,
    pub accession: Option<String>,
}

impl StatementCell {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.raw.is_none()
    }
}

/// One row of an assembled statement.
#[derive(Debug, Clone)]
pub struct StatementRow {
    pub concept: String,
    pub label: String,
    pub depth: usize,
    pub is_abstract: bool,
    pub is_total: bool,
    pub cells: Vec<StatementCell>,
}

/// An assembled financial statement: ordered rows × selected periods.
#[derive(Debug, Clone)]
pub struct Statement {
    pub role: String,
    pub statement_type: StatementType,
    pub periods: Vec<StatementPeriod>,
    pub rows: Vec<StatementRow>,
}

impl Statement {
    /// Finds a row by concept name.
    pub fn row(&self, concept: &str) -> Option<&StatementRow> {
        self.rows.iter().find(|r| r.concept == concept)
    }

    /// CSV export: label column plus one column per period.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("label");
        for period in &self.periods {
            out.push(',');
            out.push_str(&period.heading());
        }
        out.push('\n');
        for row in &self.rows {
            out.push_str(&escape(&row.label));
            for cell in &row.cells {
                out.push(',');
                if let Some(value) = cell.value {
                    out.push_str(&value.to_string());
                }
            }
            out.push('\n');
        }
        out
    }
}

fn escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Assembles statements from a parsed XBRL document.
#[derive(Debug, Clone, Copy)]
pub struct StatementAssembler<'a> {
    doc: &'a XbrlDocument,
}

impl<'a> StatementAssembler<'a> {
    pub fn new(doc: &'a XbrlDocument) -> Self {
        Self { doc }
    }

    /// Assembles the statement for a role under a period view.
    ///
    /// A role with no presentation tree yields an empty statement, not an error:
    /// missing data is an empty result.
    pub fn assemble(&self, role: &str, view: PeriodView) -> Statement {
        let statement_type = statement_type_for_role(role);
        let Some(tree) = self.doc.presentation_tree(role) else {
            return Statement {
                role: role.to_string(),
                statement_type,
                periods: Vec::new(),
                rows: Vec::new(),
            };
        };

        // Concepts participating in this statement.
        let node_ids = tree.walk();
        let concepts: Vec<&str> = node_ids
            .iter()
            .filter_map(|&id| tree.node(id))
            .map(|n| n.concept.as_str())
            .collect();

        let instant_only = statement_type == StatementType::Balance;
        let periods = self.select_periods(&concepts, view, instant_only);

        let calc_tree = self.doc.calculation_tree(role);

        let mut rows = Vec::with_capacity(node_ids.len());
        for &id in &node_ids {
            let Some(node) = tree.node(id) else { continue };
            let concept_meta = self.doc.schema.concept(&node.concept);
            let is_abstract = concept_meta.map(|c| c.is_abstract).unwrap_or_else(|| {
                node.concept.ends_with("Abstract") || !node.children.is_empty()
            });

            let label_role = node
                .preferred_label
                .as_deref()
                .unwrap_or(label_roles::STANDARD);
            let label = self
                .doc
                .labels
                .get(&node.concept, label_role, "en-US")
                .map(String::from)
                .unwrap_or_else(|| self.doc.labels.standard(&node.concept));

            let cells = if is_abstract {
                vec![StatementCell::default(); periods.len()]
            } else {
                periods
                    .iter()
                    .map(|p| self.bind_cell(&node.concept, p))
                    .collect()
            };

            let preferred_total = node
                .preferred_label
                .as_deref()
                .map(|r| r == label_roles::TOTAL)
                .unwrap_or(false);
            let calc_parent = calc_tree
                .map(|ct| {
                    ct.walk().into_iter().any(|cid| {
                        ct.node(cid)
                            .map(|n| n.concept == node.concept && !n.children.is_empty())
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            let is_total =
                !is_abstract && tree.is_last_sibling(id) && (preferred_total || calc_parent);

            rows.push(StatementRow {
                concept: node.concept.clone(),
                label,
                depth: node.depth,
                is_abstract,
                is_total,
                cells,
            });
        }

        Statement {
            role: role.to_string(),
            statement_type,
            periods,
            rows,
        }
    }

    /// Convenience: assemble the first role matching a statement type.
    pub fn assemble_statement(
        &self,
        statement: StatementType,
        view: PeriodView,
    ) -> Option<Statement> {
        self.doc
            .role_for_statement(statement)
            .map(|role| self.assemble(role, view))
    }

    /// Chooses the period columns for a statement.
    ///
    /// Candidates are the distinct default-member fact periods of the statement's
    /// concepts, ordered descending by period end with ties broken by later filing
    /// date. Balance sheets consider only instants.
    fn select_periods(
        &self,
        concepts: &[&str],
        view: PeriodView,
        instant_only: bool,
    ) -> Vec<StatementPeriod> {
        let store = self.doc.store();
        let mut seen: Vec<(Option<NaiveDate>, NaiveDate)> = Vec::new();
        let mut candidates: Vec<StatementPeriod> = Vec::new();

        let mut facts: Vec<&Fact> = concepts
            .iter()
            .flat_map(|c| store.ids_by_concept(c))
            .filter_map(|id| store.get(*id))
            .filter(|f| f.is_default_member())
            .collect();
        facts.sort_by(|a, b| {
            b.period_end
                .cmp(&a.period_end)
                .then(b.filing_date.cmp(&a.filing_date))
        });

        for fact in facts {
            let is_instant = fact.period_start.is_none();
            if instant_only != is_instant {
                continue;
            }
            let key = (fact.period_start, fact.period_end);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            candidates.push(StatementPeriod {
                start: fact.period_start,
                end: fact.period_end,
                fiscal_year: fact.fiscal_year,
                fiscal_period: fact.fiscal_period,
            });
        }

        match view {
            PeriodView::CurrentPeriod => {
                candidates.truncate(1);
            }
            PeriodView::ThreeYearAnnual => {
                candidates.retain(|p| is_annual(p, instant_only));
                candidates.truncate(3);
            }
            PeriodView::AnnualComparison => {
                candidates.retain(|p| is_annual(p, instant_only));
                candidates.truncate(2);
            }
            PeriodView::QuarterlyComparison => {
                candidates.retain(|p| match p.start {
                    Some(start) => {
                        PeriodBucket::from_dates(start, p.end) == PeriodBucket::Quarter
                    }
                    // Instants qualify for quarterly comparison as-is.
                    None => true,
                });
                candidates.truncate(4);
            }
            PeriodView::All => {}
        }

        candidates
    }

    /// Binds the best fact for (concept, period) to a cell.
    ///
    /// Only default-member facts participate; among candidates the latest filing date
    /// wins. A fact whose value is an empty string produces a present-but-empty cell
    /// rather than being dropped, so column counts are conserved.
    fn bind_cell(&self, concept: &str, period: &StatementPeriod) -> StatementCell {
        let store = self.doc.store();
        let mut best: Option<&Fact> = None;
        for id in store.ids_by_concept(concept) {
            let Some(fact) = store.get(*id) else { continue };
            if !fact.is_default_member() {
                continue;
            }
            if fact.period_start != period.start || fact.period_end != period.end {
                continue;
            }
            best = match best {
                Some(current) if current.filing_date >= fact.filing_date => Some(current),
                _ => Some(fact),
            };
        }

        match best {
            Some(fact) => StatementCell {
                value: fact.numeric_value,
                raw: Some(fact.raw.clone()),
                accession: fact.accession.clone(),
            },
            None => StatementCell::default(),
        }
    }
}

fn is_annual(period: &StatementPeriod, instant_only: bool) -> bool {
    if instant_only {
        // Annual balance-sheet columns are fiscal-year-end instants.
        return period.fiscal_period == Some(FiscalPeriod::Q4)
            || period.fiscal_period == Some(FiscalPeriod::FY)
            || period.fiscal_period.is_none();
    }
    match period.start {
        Some(start) => PeriodBucket::from_dates(start, period.end) == PeriodBucket::Annual,
        None => false,
    }
}
