//! Section detection: locating 10-K/10-Q "Items" in the node tree.
//!
//! No single signal is reliable across filers. Item headings appear as `<h2>`
//! elements, bold one-line divs, all-caps paragraphs, and occasionally only as rows of
//! a cross-reference index table. Detection therefore runs four strategies and
//! accepts a candidate when the weighted vote clears the configured threshold:
//!
//! - **Pattern** (0.5, or 0.35 for a bare "Item N" without the expected caption):
//!   regex match of the normalized node text against the item caption table.
//! - **Style** (0.25): the node is a heading, original or promoted from a prominent
//!   style.
//! - **TOC-guided** (0.3): a table of contents was found earlier and the item appears
//!   after it in its expected position.
//! - **Structural** (0.15): the item number follows the previously accepted item.
//!
//! Ties for the same item resolve to the earlier offset. A cross-reference index
//! (items mapped to page ranges) is always *detected*; extracting content by page
//! correlation is opt-in via [`SectionConfig::crossref_content_extraction`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::SectionConfig;
use crate::html::node::{NodeArena, NodeId, NodeKind};
use crate::html::parser::Document;
use crate::html::table::parse_numeric;

const WEIGHT_PATTERN_FULL: f64 = 0.5;
const WEIGHT_PATTERN_BARE: f64 = 0.35;
const WEIGHT_STYLE: f64 = 0.25;
const WEIGHT_TOC: f64 = 0.3;
const WEIGHT_STRUCTURAL: f64 = 0.15;

/// One 10-K item: canonical name, friendly alias, and the caption regex.
struct ItemSpec {
    canonical: &'static str,
    alias: &'static str,
    sequence: u32,
    pattern: &'static str,
}

const ITEMS_10K: &[ItemSpec] = &[
    ItemSpec { canonical: "item_1", alias: "business", sequence: 10, pattern: r"^item\s*1\b[\.\:\-–—]?\s*business" },
    ItemSpec { canonical: "item_1a", alias: "risk_factors", sequence: 15, pattern: r"^item\s*1a\b[\.\:\-–—]?\s*risk\s*factors" },
    ItemSpec { canonical: "item_1b", alias: "unresolved_staff_comments", sequence: 16, pattern: r"^item\s*1b\b[\.\:\-–—]?\s*unresolved" },
    ItemSpec { canonical: "item_1c", alias: "cybersecurity", sequence: 17, pattern: r"^item\s*1c\b[\.\:\-–—]?\s*cybersecurity" },
    ItemSpec { canonical: "item_2", alias: "properties", sequence: 20, pattern: r"^item\s*2\b[\.\:\-–—]?\s*propert" },
    ItemSpec { canonical: "item_3", alias: "legal_proceedings", sequence: 30, pattern: r"^item\s*3\b[\.\:\-–—]?\s*legal" },
    ItemSpec { canonical: "item_4", alias: "mine_safety", sequence: 40, pattern: r"^item\s*4\b[\.\:\-–—]?\s*mine" },
    ItemSpec { canonical: "item_5", alias: "market_information", sequence: 50, pattern: r"^item\s*5\b[\.\:\-–—]?\s*market" },
    ItemSpec { canonical: "item_7", alias: "mda", sequence: 70, pattern: r"^item\s*7\b[\.\:\-–—]?\s*management" },
    ItemSpec { canonical: "item_7a", alias: "market_risk", sequence: 75, pattern: r"^item\s*7a\b[\.\:\-–—]?\s*quantitative" },
    ItemSpec { canonical: "item_8", alias: "financial_statements", sequence: 80, pattern: r"^item\s*8\b[\.\:\-–—]?\s*financial" },
    ItemSpec { canonical: "item_9a", alias: "controls_procedures", sequence: 95, pattern: r"^item\s*9a\b[\.\:\-–—]?\s*controls" },
    ItemSpec { canonical: "item_10", alias: "directors_officers", sequence: 100, pattern: r"^item\s*10\b[\.\:\-–—]?\s*directors" },
    ItemSpec { canonical: "item_11", alias: "executive_compensation", sequence: 110, pattern: r"^item\s*11\b[\.\:\-–—]?\s*executive" },
    ItemSpec { canonical: "item_15", alias: "exhibits", sequence: 150, pattern: r"^item\s*15\b[\.\:\-–—]?\s*exhibit" },
];

static ITEM_REGEXES: Lazy<Vec<(usize, Regex)>> = Lazy::new(|| {
    ITEMS_10K
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            (
                i,
                Regex::new(&format!("(?i){}", spec.pattern)).expect("valid item pattern"),
            )
        })
        .collect()
});

/// Bare "Item N" without its caption, used with a lower pattern weight.
static BARE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^item\s*(\d{1,2})(a|b|c)?\b").expect("valid pattern"));

/// A detected section: a named, contiguous slice of the node tree.
#[derive(Debug, Clone)]
pub struct Section {
    /// Canonical name, e.g. "item_1a".
    pub name: String,

    /// Friendly aliases, e.g. "risk_factors".
    pub aliases: Vec<String>,

    /// The heading text as it appeared.
    pub title: String,

    pub start_node: NodeId,
    pub end_node: NodeId,

    /// Final vote score.
    pub confidence: f64,
}

impl Section {
    /// Section text: everything from the start node up to and including the end node.
    pub fn text(&self, arena: &NodeArena, order: &[NodeId]) -> String {
        let start = order.iter().position(|&id| id == self.start_node);
        let end = order.iter().position(|&id| id == self.end_node);
        let (Some(start), Some(end)) = (start, end) else {
            return String::new();
        };
        let mut parts = Vec::new();
        for &id in &order[start..=end] {
            if let Some(node) = arena.get(id) {
                if !node.text.is_empty() {
                    parts.push(node.text.as_str());
                }
            }
        }
        parts.join("\n")
    }
}

/// A size-bounded slice of a section for LLM consumption.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Canonical section name, when the chunk belongs to one.
    pub section: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    position: usize,
    node: NodeId,
    item: usize,
    score: f64,
    title: String,
}

/// Multi-strategy section detector.
#[derive(Debug, Clone)]
pub struct SectionDetector {
    config: SectionConfig,
}

impl SectionDetector {
    pub fn new(config: SectionConfig) -> Self {
        Self { config }
    }

    /// Runs all strategies over a parsed document and returns the accepted sections
    /// in document order.
    pub fn detect(&self, document: &Document) -> Vec<Section> {
        let arena = &document.arena;
        let order = arena.walk(document.root);

        let toc = find_toc(document, &order);
        if let Some(toc) = &toc {
            tracing::debug!(
                "Table of contents found at position {} with {} expected items",
                toc.position,
                toc.expected.len()
            );
        }
        let crossref = find_crossref_index(document, &order);
        if crossref.is_some() {
            tracing::debug!("Cross-reference index table detected");
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut last_accepted_sequence: Option<u32> = None;

        for (position, &node_id) in order.iter().enumerate() {
            let Some(node) = arena.get(node_id) else { continue };
            let text = node.text.trim();
            if text.is_empty() || text.len() > 200 {
                continue;
            }
            let is_heading = node.is_heading();
            if !is_heading && !matches!(node.kind, NodeKind::Paragraph) {
                continue;
            }
            // Everything before the TOC ends is front matter or the TOC itself.
            if let Some(toc) = &toc {
                if position <= toc.position {
                    continue;
                }
            }

            let matched = ITEM_REGEXES
                .iter()
                .find(|(_, regex)| regex.is_match(text))
                .map(|(index, _)| (*index, WEIGHT_PATTERN_FULL))
                .or_else(|| {
                    BARE_ITEM.captures(text).and_then(|caps| {
                        let number = format!(
                            "item_{}{}",
                            caps.get(1).map(|m| m.as_str()).unwrap_or(""),
                            caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default()
                        );
                        ITEMS_10K
                            .iter()
                            .position(|s| s.canonical == number)
                            .map(|index| (index, WEIGHT_PATTERN_BARE))
                    })
                });
            let Some((item, mut score)) = matched else {
                continue;
            };

            if is_heading {
                score += WEIGHT_STYLE;
            }
            if let Some(toc) = &toc {
                if toc.expected.contains(&item) {
                    score += WEIGHT_TOC;
                }
            }
            let sequence = ITEMS_10K[item].sequence;
            if last_accepted_sequence.map(|prev| sequence > prev).unwrap_or(true) {
                score += WEIGHT_STRUCTURAL;
            }

            if score >= self.config.header_threshold {
                // Earlier offset wins for the same item.
                if candidates.iter().any(|c| c.item == item) {
                    continue;
                }
                last_accepted_sequence = Some(sequence);
                candidates.push(Candidate {
                    position,
                    node: node_id,
                    item,
                    score,
                    title: text.to_string(),
                });
            }
        }

        candidates.sort_by_key(|c| c.position);

        let mut sections: Vec<Section> = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let end_position = candidates
                .get(index + 1)
                .map(|next| next.position.saturating_sub(1))
                .unwrap_or(order.len() - 1);
            let item_spec = &ITEMS_10K[candidate.item];
            sections.push(Section {
                name: item_spec.canonical.to_string(),
                aliases: vec![item_spec.alias.to_string()],
                title: candidate.title.clone(),
                start_node: candidate.node,
                end_node: order[end_position],
                confidence: candidate.score,
            });
        }

        // Cross-reference fallback: page-range extraction for items the vote missed.
        if self.config.crossref_content_extraction {
            if let Some(crossref) = crossref {
                self.extract_by_pages(document, &order, &crossref, &mut sections);
            }
        }

        sections
    }

    /// Page-range extraction from a cross-reference index. Correlates page-break
    /// markers with the index's page numbers for items not already detected.
    fn extract_by_pages(
        &self,
        document: &Document,
        order: &[NodeId],
        crossref: &CrossrefIndex,
        sections: &mut Vec<Section>,
    ) {
        // Page n starts after the (n-1)th page break.
        let breaks: Vec<usize> = order
            .iter()
            .enumerate()
            .filter(|&(_, &id)| {
                document
                    .arena
                    .get(id)
                    .map(|n| matches!(n.kind, NodeKind::PageBreak))
                    .unwrap_or(false)
            })
            .map(|(position, _)| position)
            .collect();
        if breaks.is_empty() {
            return;
        }

        for (item, start_page, end_page) in &crossref.ranges {
            let item_spec = &ITEMS_10K[*item];
            if sections.iter().any(|s| s.name == item_spec.canonical) {
                continue;
            }
            let start_break = start_page.saturating_sub(1);
            let start_position = if start_break == 0 {
                0
            } else {
                match breaks.get(start_break - 1) {
                    Some(&p) => p + 1,
                    None => continue,
                }
            };
            // Page e ends just before the break that closes it; the last page runs
            // to the end of the document.
            let end_position = breaks
                .get(end_page.saturating_sub(1))
                .map(|&p| p.saturating_sub(1))
                .unwrap_or(order.len() - 1);
            if start_position >= order.len() || end_position < start_position {
                continue;
            }
            sections.push(Section {
                name: item_spec.canonical.to_string(),
                aliases: vec![item_spec.alias.to_string()],
                title: item_spec.alias.replace('_', " "),
                start_node: order[start_position],
                end_node: order[end_position],
                confidence: self.config.header_threshold,
            });
        }

        sections.sort_by_key(|s| {
            order
                .iter()
                .position(|&id| id == s.start_node)
                .unwrap_or(usize::MAX)
        });
    }

    /// Splits a document into LLM-sized chunks: whole sections where they fit,
    /// paragraph-bounded slices where they don't.
    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let order = document.arena.walk(document.root);
        let mut chunks = Vec::new();

        let push_text = |chunks: &mut Vec<Chunk>, section: Option<&str>, text: &str| {
            if text.trim().is_empty() {
                return;
            }
            if text.len() <= self.config.max_chunk_chars {
                chunks.push(Chunk {
                    section: section.map(String::from),
                    text: text.to_string(),
                });
                return;
            }
            // Split at paragraph boundaries.
            let mut current = String::new();
            for paragraph in text.split('\n') {
                if !current.is_empty()
                    && current.len() + paragraph.len() + 1 > self.config.max_chunk_chars
                {
                    chunks.push(Chunk {
                        section: section.map(String::from),
                        text: std::mem::take(&mut current),
                    });
                }
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(paragraph);
            }
            if !current.is_empty() {
                chunks.push(Chunk {
                    section: section.map(String::from),
                    text: current,
                });
            }
        };

        if document.sections.is_empty() {
            push_text(&mut chunks, None, &document.text());
            return chunks;
        }

        for section in &document.sections {
            let text = section.text(&document.arena, &order);
            push_text(&mut chunks, Some(&section.name), &text);
        }
        chunks
    }
}

/// A located table of contents: its position in the walk order and the items it
/// promises.
#[derive(Debug, Clone)]
struct Toc {
    position: usize,
    expected: Vec<usize>,
}

/// A table of contents is an early table whose cells reference at least three items.
fn find_toc(document: &Document, order: &[NodeId]) -> Option<Toc> {
    for (position, &node_id) in order.iter().enumerate() {
        let Some(node) = document.arena.get(node_id) else {
            continue;
        };
        let Some(table) = node.table() else { continue };

        let mut expected = Vec::new();
        for r in 0..table.rows {
            for cell in table.row(r) {
                let text = cell.text.trim();
                if let Some(item) = match_item(text) {
                    if !expected.contains(&item) {
                        expected.push(item);
                    }
                }
            }
        }
        if expected.len() >= 3 {
            return Some(Toc { position, expected });
        }
    }
    None
}

/// Items mapped to page ranges by a cross-reference index table.
#[derive(Debug, Clone)]
struct CrossrefIndex {
    /// (item index, first page, last page)
    ranges: Vec<(usize, usize, usize)>,
}

/// A cross-reference index is a TOC-like table that also carries page numbers.
fn find_crossref_index(document: &Document, order: &[NodeId]) -> Option<CrossrefIndex> {
    for &node_id in order {
        let Some(node) = document.arena.get(node_id) else {
            continue;
        };
        let Some(table) = node.table() else { continue };

        let mut ranges = Vec::new();
        for r in 0..table.rows {
            let cells: Vec<&crate::html::table::MatrixCell> = table.row(r).collect();
            let item = cells.iter().find_map(|c| match_item(c.text.trim()));
            // Page numbers come only from cells that are not the item caption; an
            // "Item 1A" label would otherwise contribute its own digits.
            let pages: Vec<usize> = cells
                .iter()
                .filter(|c| match_item(c.text.trim()).is_none())
                .filter_map(|c| {
                    let text = c.text.trim();
                    // "26-33", "26–33" or a single page number
                    if let Some((a, b)) = text.split_once(['-', '–']) {
                        let a: usize = a.trim().parse().ok()?;
                        let b: usize = b.trim().parse().ok()?;
                        return Some(vec![a, b]);
                    }
                    parse_numeric(text)
                        .filter(|n| *n > 0.0 && n.fract() == 0.0 && *n < 2000.0)
                        .map(|n| vec![n as usize])
                })
                .flatten()
                .collect();
            if let (Some(item), [first, .., last]) = (item, pages.as_slice()) {
                ranges.push((item, *first, *last));
            } else if let (Some(item), [only]) = (item, pages.as_slice()) {
                ranges.push((item, *only, *only));
            }
        }

        if ranges.len() >= 3 {
            return Some(CrossrefIndex { ranges });
        }
    }
    None
}

fn match_item(text: &str) -> Option<usize> {
    if text.len() > 120 {
        return None;
    }
    ITEM_REGEXES
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(index, _)| *index)
        .or_else(|| {
            BARE_ITEM.captures(text).and_then(|caps| {
                let number = format!(
                    "item_{}{}",
                    caps.get(1).map(|m| m.as_str()).unwrap_or(""),
                    caps.get(2)
                        .map(|m| m.as_str().to_lowercase())
                        .unwrap_or_default()
                );
                ITEMS_10K.iter().position(|s| s.canonical == number)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    const TEN_K: &str = r#"<html><body>
<table>
  <tr><td>Item 1. Business</td><td>3</td></tr>
  <tr><td>Item 1A. Risk Factors</td><td>10</td></tr>
  <tr><td>Item 7. Management's Discussion and Analysis</td><td>30</td></tr>
</table>
<h2>Item 1. Business</h2>
<p>We design, manufacture and market smartphones.</p>
<h2>Item 1A. Risk Factors</h2>
<p>The Company's business can be affected by macroeconomic conditions.</p>
<p>Additional risks relate to supply chain concentration.</p>
<h2>Item 7. Management's Discussion and Analysis of Financial Condition</h2>
<p>Net sales increased during 2023.</p>
</body></html>"#;

    fn parse() -> Document {
        Document::parse(TEN_K, &ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_detects_items() {
        let doc = parse();
        let names: Vec<&str> = doc.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["item_1", "item_1a", "item_7"]);
        assert!(doc.sections.iter().all(|s| s.confidence >= 0.6));
    }

    #[test]
    fn test_toc_rows_not_detected_as_sections() {
        let doc = parse();
        // Exactly one section per item even though the TOC repeats the captions.
        let count = doc.sections.iter().filter(|s| s.name == "item_1a").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_section_text_slice() {
        let doc = parse();
        let order = doc.arena.walk(doc.root);
        let risk = doc.section("risk_factors").unwrap();
        let text = risk.text(&doc.arena, &order);
        assert!(text.contains("macroeconomic conditions"));
        assert!(text.contains("supply chain"));
        assert!(!text.contains("Net sales increased"));
    }

    #[test]
    fn test_alias_lookup() {
        let doc = parse();
        assert!(doc.section("item_7").is_some());
        assert!(doc.section("mda").is_some());
    }

    #[test]
    fn test_chunking_respects_bounds() {
        let doc = parse();
        let detector = SectionDetector::new(SectionConfig {
            max_chunk_chars: 60,
            ..Default::default()
        });
        let chunks = detector.chunk(&doc);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            // A single paragraph longer than the bound stays whole; multi-paragraph
            // chunks stay within it.
            if chunk.text.contains('\n') {
                assert!(chunk.text.len() <= 60 * 2);
            }
        }
    }

    #[test]
    fn test_no_items_no_sections() {
        let html = "<html><body><p>Just a press release.</p></body></html>";
        let doc = Document::parse(html, &ParserConfig::default()).unwrap();
        assert!(doc.sections.is_empty());
    }

    /// The rare cross-reference-index format: items never appear as headings, only
    /// as index rows mapping to page ranges, with page breaks marking pagination.
    const CROSSREF_10K: &str = r#"<html><body>
<table>
  <tr><td>Item 1. Business</td><td>2-2</td></tr>
  <tr><td>Item 1A. Risk Factors</td><td>3</td></tr>
  <tr><td>Item 7. Management's Discussion and Analysis</td><td>3</td></tr>
</table>
<p>Cover page with general information.</p>
<hr>
<p>Business description resides on page two.</p>
<hr>
<p>Risk factors discussion on page three.</p>
</body></html>"#;

    #[test]
    fn test_crossref_extraction_opt_in() {
        let doc = Document::parse(CROSSREF_10K, &ParserConfig::default()).unwrap();
        // With content extraction off (the default), detection alone yields nothing:
        // there are no item headings to vote on.
        assert!(doc.sections.is_empty());

        let detector = SectionDetector::new(SectionConfig {
            crossref_content_extraction: true,
            ..Default::default()
        });
        let sections = detector.detect(&doc);
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["item_1", "item_1a", "item_7"]);
    }

    #[test]
    fn test_crossref_page_boundaries() {
        let doc = Document::parse(CROSSREF_10K, &ParserConfig::default()).unwrap();
        let detector = SectionDetector::new(SectionConfig {
            crossref_content_extraction: true,
            ..Default::default()
        });
        let sections = detector.detect(&doc);
        let order = doc.arena.walk(doc.root);

        let business = sections.iter().find(|s| s.name == "item_1").unwrap();
        let text = business.text(&doc.arena, &order);
        assert!(text.contains("Business description"));
        assert!(!text.contains("Risk factors discussion"));
        assert!(!text.contains("Cover page"));

        let risk = sections.iter().find(|s| s.name == "item_1a").unwrap();
        let text = risk.text(&doc.arena, &order);
        assert!(text.contains("Risk factors discussion"));
        assert!(!text.contains("Business description"));
    }

    #[test]
    fn test_crossref_does_not_override_voted_sections() {
        // When an item was already detected by the vote, the page-range fallback
        // must leave it alone.
        let html = r#"<html><body>
<table>
  <tr><td>Item 1. Business</td><td>2</td></tr>
  <tr><td>Item 1A. Risk Factors</td><td>2</td></tr>
  <tr><td>Item 7. Management's Discussion and Analysis</td><td>2</td></tr>
</table>
<hr>
<h2>Item 1. Business</h2>
<p>Heading-detected business text.</p>
</body></html>"#;
        let doc = Document::parse(html, &ParserConfig::default()).unwrap();
        let detector = SectionDetector::new(SectionConfig {
            crossref_content_extraction: true,
            ..Default::default()
        });
        let sections = detector.detect(&doc);
        let business: Vec<_> = sections.iter().filter(|s| s.name == "item_1").collect();
        assert_eq!(business.len(), 1);
        assert!(business[0].title.contains("Business"));
    }
}
