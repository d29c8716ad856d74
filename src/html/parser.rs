//! The filing HTML parser: DOM walk into a semantic node tree.
//!
//! SEC filing HTML is a `<div>` soup of inline styles, rarely well-formed, sometimes
//! hundreds of megabytes. The parser runs in three phases:
//!
//! 1. **Preprocess**: size gates (hard limit, streaming threshold), inline-XBRL
//!    resource discovery.
//! 2. **Parse**: one pass over the html5ever tree building the node arena. Inline
//!    styles are parsed once per distinct string through an LRU intern pool.
//! 3. **Postprocess**: pluggable strategies: header promotion, table classification,
//!    section extraction (see [`crate::html::sections`]).
//!
//! Documents above the streaming threshold get the reduced pipeline: no style
//! interning and no postprocessing, tables and text only.

use lru::LruCache;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::num::NonZeroUsize;

use crate::config::{ParserConfig, SectionConfig};
use crate::error::{FilingError, Result};
use crate::facts::FactStore;
use crate::html::inline_xbrl::{InlineResources, extract_fact, parse_inline_resources};
use crate::html::node::{NodeArena, NodeId, NodeKind, Style, StyleId};
use crate::html::sections::{Section, SectionDetector};
use crate::html::table::{SourceCell, TableMatrix};
use crate::xbrl::FilingSource;

/// A parsed filing document: the semantic tree plus derived indices.
#[derive(Debug, Clone)]
pub struct Document {
    pub arena: NodeArena,
    pub root: NodeId,

    /// Table nodes in document order.
    pub tables: Vec<NodeId>,

    /// Detected sections, empty unless section detection ran.
    pub sections: Vec<Section>,

    /// Inline-XBRL facts co-parsed from `ix:*` wrappers (frozen).
    pub facts: FactStore,

    /// Document identity for errors and logs.
    pub name: String,

    /// True when the document exceeded the streaming threshold and was parsed with
    /// the reduced pipeline.
    pub streamed: bool,
}

impl Document {
    /// Parses filing HTML with default provenance.
    pub fn parse(html: &str, config: &ParserConfig) -> Result<Self> {
        Self::parse_with_source(html, config, &FilingSource::default())
    }

    /// Parses filing HTML, stamping extracted inline-XBRL facts with `source`.
    pub fn parse_with_source(
        html: &str,
        config: &ParserConfig,
        source: &FilingSource,
    ) -> Result<Self> {
        let parser = HtmlParser::new(config.clone());
        parser.parse(html, source)
    }

    /// Full document text, paragraph-separated.
    pub fn text(&self) -> String {
        self.arena.subtree_text(self.root)
    }

    /// Finds a section by canonical name ("risk_factors", "mda", "item_1a", ...).
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name == name || s.aliases.iter().any(|a| a == name))
    }

    /// The extracted tables in document order.
    pub fn table_matrices(&self) -> Vec<&TableMatrix> {
        self.tables
            .iter()
            .filter_map(|id| self.arena.get(*id))
            .filter_map(|node| node.table())
            .collect()
    }
}

/// Tags that never contribute content.
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "noscript", "meta", "link", "title"];

static TR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static CAPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("caption").expect("valid selector"));
static IX_FACT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"ix\:nonfraction, ix\:nonnumeric"#).expect("valid selector")
});

/// Block-level containers that get their own tree handling. `ix:header` is listed
/// so containers recurse into it and the dedicated branch can strip it.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "table", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "section",
    "article", "center", "ix:header",
];

pub struct HtmlParser {
    config: ParserConfig,
}

struct ParseState {
    arena: NodeArena,
    tables: Vec<NodeId>,
    facts: FactStore,
    resources: InlineResources,
    style_pool: LruCache<String, StyleId>,
    source: FilingSource,
    extract_xbrl: bool,
    intern_styles: bool,
}

impl HtmlParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, html: &str, source: &FilingSource) -> Result<Document> {
        if html.len() > self.config.max_document_size {
            return Err(FilingError::DocumentTooLarge {
                size: html.len(),
                limit: self.config.max_document_size,
            });
        }
        let streamed = html.len() > self.config.streaming_threshold;
        if streamed {
            tracing::debug!(
                "Document {} is {} bytes; using reduced streaming pipeline",
                source.document_name,
                html.len()
            );
        }

        let dom = Html::parse_document(html);

        let resources = if self.config.extract_xbrl {
            parse_inline_resources(&dom)
        } else {
            InlineResources::default()
        };

        let mut state = ParseState {
            arena: NodeArena::new(),
            tables: Vec::new(),
            facts: FactStore::new(),
            resources,
            style_pool: LruCache::new(
                NonZeroUsize::new(self.config.style_cache_size).unwrap_or(NonZeroUsize::MIN),
            ),
            source: source.clone(),
            extract_xbrl: self.config.extract_xbrl,
            intern_styles: !streamed,
        };

        let root = state.arena.alloc(NodeKind::Document, None);
        for child in dom.root_element().children() {
            if let Some(element) = ElementRef::wrap(child) {
                walk_element(&element, root, &mut state);
            }
        }

        state.facts.freeze();

        let mut document = Document {
            arena: state.arena,
            root,
            tables: state.tables,
            sections: Vec::new(),
            facts: state.facts,
            name: source.document_name.clone(),
            streamed,
        };

        if self.config.postprocess && !streamed {
            promote_styled_headings(&mut document);
            if self.config.detect_sections {
                let detector = SectionDetector::new(SectionConfig::default());
                document.sections = detector.detect(&document);
            }
        }

        tracing::debug!(
            "Parsed {}: {} nodes, {} tables, {} inline facts, {} sections",
            document.name,
            document.arena.len(),
            document.tables.len(),
            document.facts.len(),
            document.sections.len()
        );
        Ok(document)
    }
}

fn tag_name<'a>(element: &'a ElementRef<'a>) -> &'a str {
    element.value().name()
}

fn intern_style(element: &ElementRef<'_>, state: &mut ParseState) -> Option<StyleId> {
    if !state.intern_styles {
        return None;
    }
    let css = element.value().attr("style")?;
    if let Some(&id) = state.style_pool.get(css) {
        return Some(id);
    }
    let id = state.arena.push_style(Style::parse(css));
    state.style_pool.put(css.to_string(), id);
    Some(id)
}

/// Recursive element walk. `parent` is the semantic parent in the arena.
fn walk_element(element: &ElementRef<'_>, parent: NodeId, state: &mut ParseState) {
    let tag = tag_name(element);

    if SKIPPED_TAGS.contains(&tag) {
        return;
    }
    // The ix:header holds resources and hidden facts, not displayable content.
    if tag == "ix:header" {
        if state.extract_xbrl {
            extract_hidden_facts(element, state);
        }
        return;
    }

    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag.as_bytes()[1] - b'0';
            let id = state.arena.alloc(NodeKind::Heading { level }, Some(parent));
            let style = intern_style(element, state);
            let text = collapse_whitespace(&element_text(element));
            if let Some(node) = state.arena.get_mut(id) {
                node.text = text;
                node.style = style;
            }
        }
        "table" => {
            if let Some(matrix) = extract_table(element, state) {
                let id = state
                    .arena
                    .alloc(NodeKind::Table(matrix), Some(parent));
                state.tables.push(id);
            }
        }
        "ul" | "ol" => {
            let id = state
                .arena
                .alloc(NodeKind::List { ordered: tag == "ol" }, Some(parent));
            for child in element.children() {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if tag_name(&child_el) == "li" {
                        let item = state.arena.alloc(NodeKind::ListItem, Some(id));
                        let text = collapse_whitespace(&element_text(&child_el));
                        if let Some(node) = state.arena.get_mut(item) {
                            node.text = text;
                        }
                    }
                }
            }
        }
        "hr" => {
            state.arena.alloc(NodeKind::PageBreak, Some(parent));
        }
        "ix:nonfraction" | "ix:nonnumeric" => {
            inline_fact_node(element, parent, state);
        }
        _ => {
            // Page-break styles on arbitrary containers mark pagination.
            if let Some(css) = element.value().attr("style") {
                let css = css.to_ascii_lowercase();
                if css.contains("page-break-before") || css.contains("page-break-after") {
                    state.arena.alloc(NodeKind::PageBreak, Some(parent));
                }
            }

            if has_block_child(element) {
                // Container: recurse, keeping `parent` as the semantic parent.
                for child in element.children() {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        walk_element(&child_el, parent, state);
                    }
                }
            } else {
                // Leaf block: a paragraph's worth of text. Inline ix wrappers nested
                // in the running text are extracted here, since the walk does not
                // descend into leaf blocks.
                if state.extract_xbrl {
                    let wrappers: Vec<ElementRef<'_>> =
                        element.select(&IX_FACT_SELECTOR).collect();
                    for ix in wrappers {
                        extract_fact(&ix, &state.resources, &mut state.facts, &state.source);
                    }
                }
                // Hidden blocks carry machine-readable resources, not content.
                let hidden = element
                    .value()
                    .attr("style")
                    .map(|css| css.replace(' ', "").to_ascii_lowercase().contains("display:none"))
                    .unwrap_or(false);
                if hidden {
                    return;
                }
                let text = collapse_whitespace(&element_text(element));
                if text.is_empty() {
                    return;
                }
                let id = state.arena.alloc(NodeKind::Paragraph, Some(parent));
                let style = intern_style(element, state);
                if let Some(node) = state.arena.get_mut(id) {
                    node.text = text;
                    node.style = style;
                }
            }
        }
    }
}

/// Emits an Xbrl node and the extracted fact for a visible ix wrapper.
fn inline_fact_node(element: &ElementRef<'_>, parent: NodeId, state: &mut ParseState) {
    let linkage = if state.extract_xbrl {
        extract_fact(element, &state.resources, &mut state.facts, &state.source)
    } else {
        None
    };
    let text = collapse_whitespace(&element_text(element));
    match linkage {
        Some((concept, context_ref)) => {
            let id = state.arena.alloc(
                NodeKind::Xbrl {
                    concept,
                    context_ref,
                },
                Some(parent),
            );
            if let Some(node) = state.arena.get_mut(id) {
                node.text = text;
            }
        }
        None if !text.is_empty() => {
            let id = state.arena.alloc(NodeKind::Paragraph, Some(parent));
            if let Some(node) = state.arena.get_mut(id) {
                node.text = text;
            }
        }
        None => {}
    }
}

/// Facts declared inside `ix:header` (hidden block) still belong in the store.
fn extract_hidden_facts(header: &ElementRef<'_>, state: &mut ParseState) {
    let mut stack: Vec<ElementRef<'_>> = vec![*header];
    while let Some(element) = stack.pop() {
        for child in element.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                let tag = tag_name(&child_el);
                if tag == "ix:nonfraction" || tag == "ix:nonnumeric" {
                    extract_fact(
                        &child_el,
                        &state.resources,
                        &mut state.facts,
                        &state.source,
                    );
                } else {
                    stack.push(child_el);
                }
            }
        }
    }
}

fn has_block_child(element: &ElementRef<'_>) -> bool {
    element.children().any(|child| {
        ElementRef::wrap(child)
            .map(|el| BLOCK_TAGS.contains(&tag_name(&el)))
            .unwrap_or(false)
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    // Non-breaking spaces survive split_whitespace only when alone; normalize them.
    collapsed.replace('\u{a0}', " ").trim().to_string()
}

/// Extracts a `<table>` element into a [`TableMatrix`].
fn extract_table(element: &ElementRef<'_>, state: &mut ParseState) -> Option<TableMatrix> {
    let caption = element
        .select(&CAPTION_SELECTOR)
        .next()
        .map(|c| collapse_whitespace(&element_text(&c)));

    let trs: Vec<ElementRef<'_>> = element.select(&TR_SELECTOR).collect();
    let mut rows: Vec<Vec<SourceCell>> = Vec::with_capacity(trs.len());
    for tr in trs {
        rows.push(extract_row(&tr, state));
    }

    if rows.is_empty() {
        return None;
    }
    let matrix = TableMatrix::from_rows(&rows, caption);
    if matrix.is_empty() { None } else { Some(matrix) }
}

fn extract_row(tr: &ElementRef<'_>, state: &mut ParseState) -> Vec<SourceCell> {
    let mut cells = Vec::new();
    for child in tr.children() {
        let Some(cell_el) = ElementRef::wrap(child) else {
            continue;
        };
        let tag = tag_name(&cell_el);
        if tag != "td" && tag != "th" {
            continue;
        }

        // Inline facts inside table cells still reach the fact store.
        if state.extract_xbrl {
            let wrappers: Vec<ElementRef<'_>> = cell_el.select(&IX_FACT_SELECTOR).collect();
            for ix in wrappers {
                extract_fact(&ix, &state.resources, &mut state.facts, &state.source);
            }
        }

        let attr_usize = |name: &str| -> usize {
            cell_el
                .value()
                .attr(name)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&v| v > 0)
                .unwrap_or(1)
        };

        cells.push(SourceCell {
            text: collapse_whitespace(&element_text(&cell_el)),
            colspan: attr_usize("colspan"),
            rowspan: attr_usize("rowspan"),
            is_header: tag == "th",
        });
    }
    cells
}

/// Postprocessing: paragraphs whose style is prominent and whose text is short get
/// promoted to headings so the section detector sees them.
fn promote_styled_headings(document: &mut Document) {
    let ids = document.arena.walk(document.root);
    for id in ids {
        let Some(node) = document.arena.get(id) else { continue };
        if !matches!(node.kind, NodeKind::Paragraph) {
            continue;
        }
        let text_len = node.text.len();
        if text_len == 0 || text_len > 120 {
            continue;
        }
        let prominent = document
            .arena
            .effective_style(id)
            .map(|s| s.is_prominent())
            .unwrap_or(false);
        let all_caps = node.text.len() > 3
            && node
                .text
                .chars()
                .filter(|c| c.is_alphabetic())
                .all(|c| c.is_uppercase());
        if prominent || all_caps {
            if let Some(node) = document.arena.get_mut(id) {
                node.kind = NodeKind::Heading { level: 3 };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"<html><body>
<h1>ACME CORP</h1>
<p>Annual report for fiscal 2023.</p>
<div style="font-weight:bold">Overview</div>
<table>
  <tr><th>Label</th><th>2023</th><th>2022</th></tr>
  <tr><td>Revenue</td><td>1,000</td><td>900</td></tr>
</table>
<ul><li>First</li><li>Second</li></ul>
</body></html>"#;

    #[test]
    fn test_parse_simple_document() {
        let doc = Document::parse(SIMPLE, &ParserConfig::default()).unwrap();
        assert!(!doc.streamed);
        assert_eq!(doc.tables.len(), 1);

        let text = doc.text();
        assert!(text.contains("ACME CORP"));
        assert!(text.contains("Annual report for fiscal 2023."));

        let table = doc.table_matrices()[0];
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 3);
        assert_eq!(table.cell(1, 1).unwrap().text, "1,000");
    }

    #[test]
    fn test_styled_heading_promotion() {
        let doc = Document::parse(SIMPLE, &ParserConfig::default()).unwrap();
        let headings: Vec<_> = doc
            .arena
            .walk(doc.root)
            .into_iter()
            .filter_map(|id| doc.arena.get(id))
            .filter(|n| n.is_heading())
            .map(|n| n.text.clone())
            .collect();
        assert!(headings.contains(&"ACME CORP".to_string()));
        // Bold short div promoted to heading
        assert!(headings.contains(&"Overview".to_string()));
    }

    #[test]
    fn test_document_too_large() {
        let config = ParserConfig {
            max_document_size: 10,
            ..Default::default()
        };
        let result = Document::parse(SIMPLE, &config);
        assert!(matches!(
            result,
            Err(FilingError::DocumentTooLarge { .. })
        ));
    }

    #[test]
    fn test_streaming_skips_postprocess() {
        let config = ParserConfig {
            streaming_threshold: 10,
            ..Default::default()
        };
        let doc = Document::parse(SIMPLE, &config).unwrap();
        assert!(doc.streamed);
        assert!(doc.sections.is_empty());
        // Tables still extracted on the streaming path
        assert_eq!(doc.tables.len(), 1);
    }

    #[test]
    fn test_malformed_html_is_tolerated() {
        let html = "<html><body><p>Unclosed paragraph<div>Next</body>";
        let doc = Document::parse(html, &ParserConfig::default()).unwrap();
        assert!(doc.text().contains("Unclosed paragraph"));
        assert!(doc.text().contains("Next"));
    }

    #[test]
    fn test_inline_xbrl_in_table() {
        let html = r#"<html><body>
<div style="display:none"><ix:header><ix:resources>
<xbrli:context id="I2023">
  <xbrli:entity><xbrli:identifier scheme="cik">0000000001</xbrli:identifier></xbrli:entity>
  <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
</xbrli:context>
<xbrli:unit id="usd"><xbrli:measure>iso4217:USD</xbrli:measure></xbrli:unit>
</ix:resources></ix:header></div>
<table><tr><td>Assets</td><td><ix:nonFraction name="us-gaap:Assets" contextRef="I2023" unitRef="usd" scale="3">352,583</ix:nonFraction></td></tr></table>
</body></html>"#;
        let doc = Document::parse(html, &ParserConfig::default()).unwrap();
        assert_eq!(doc.facts.len(), 1);
        let assets = doc.facts.latest_fact("us-gaap:Assets").unwrap();
        assert_eq!(assets.numeric_value, Some(352_583_000.0));
    }
}
