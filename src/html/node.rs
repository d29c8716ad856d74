//! Semantic node tree for filing HTML.
//!
//! Nodes live in an arena ([`NodeArena`]) and refer to each other by [`NodeId`] index;
//! the parent link is an index, never a pointer, so the finished tree is immutable and
//! trivially sharable across threads. The tree is semantic, not syntactic: a `<div>`
//! soup collapses into paragraphs, headings, tables and lists.

use serde::{Deserialize, Serialize};

use crate::html::table::TableMatrix;

/// Index of a node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Interned style handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleId(pub usize);

/// Parsed subset of inline CSS that matters for structure detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    /// Font size in points, when parseable.
    pub font_size: Option<f32>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub centered: bool,
}

impl Style {
    /// Parses the attributes header detection cares about from an inline `style`
    /// attribute. Unknown properties are ignored.
    pub fn parse(css: &str) -> Self {
        let mut style = Style::default();
        for declaration in css.split(';') {
            let Some((property, value)) = declaration.split_once(':') else {
                continue;
            };
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim().to_ascii_lowercase();
            match property.as_str() {
                "font-weight" => {
                    style.bold = value == "bold"
                        || value == "bolder"
                        || value.parse::<u32>().map(|w| w >= 600).unwrap_or(false);
                }
                "font-style" => style.italic = value.starts_with("italic"),
                "text-decoration" => style.underline = value.contains("underline"),
                "text-align" => style.centered = value == "center",
                "font-size" => {
                    let digits: String = value
                        .chars()
                        .take_while(|c| c.is_ascii_digit() || *c == '.')
                        .collect();
                    if let Ok(size) = digits.parse::<f32>() {
                        // px ≈ 3/4 pt
                        style.font_size = Some(if value.ends_with("px") {
                            size * 0.75
                        } else {
                            size
                        });
                    }
                }
                _ => {}
            }
        }
        style
    }

    /// Whether this style marks text as visually prominent.
    pub fn is_prominent(&self) -> bool {
        self.bold || self.font_size.map(|s| s >= 12.0).unwrap_or(false)
    }
}

/// Semantic node variants.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document root.
    Document,

    /// A heading with its level (1-6 from `<h*>`, or inferred).
    Heading { level: u8 },

    /// A block of running text.
    Paragraph,

    /// Inline text run (only appears under paragraphs that mix styles).
    Text,

    /// An extracted table.
    Table(TableMatrix),

    /// Ordered or unordered list.
    List { ordered: bool },

    ListItem,

    /// An inline XBRL wrapper; the extracted fact lives in the document's fact store,
    /// this node records the linkage for rendering.
    Xbrl {
        concept: String,
        context_ref: String,
    },

    /// A page break marker (explicit `page-break-*` style or `<hr>` used as one).
    PageBreak,
}

/// One node: kind, text, style and tree links.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,

    /// Flattened text content of this node (already whitespace-normalized).
    pub text: String,

    /// Interned style, inherited where the source nested styles.
    pub style: Option<StyleId>,

    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, NodeKind::Heading { .. })
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, NodeKind::Table(_))
    }

    pub fn table(&self) -> Option<&TableMatrix> {
        match &self.kind {
            NodeKind::Table(table) => Some(table),
            _ => None,
        }
    }
}

/// Arena of nodes; the only mutation is appending during parse.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    styles: Vec<Style>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            text: String::new(),
            style: None,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registers a style and returns its handle. Interning happens in the parser's
    /// LRU pool; the arena just owns the storage.
    pub fn push_style(&mut self, style: Style) -> StyleId {
        let id = StyleId(self.styles.len());
        self.styles.push(style);
        id
    }

    pub fn style(&self, id: StyleId) -> Option<&Style> {
        self.styles.get(id.0)
    }

    /// Style of a node, following parent links until one is found.
    pub fn effective_style(&self, id: NodeId) -> Option<&Style> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id)?;
            if let Some(style_id) = node.style {
                return self.style(style_id);
            }
            current = node.parent;
        }
        None
    }

    /// Depth-first document-order walk starting at `root`.
    pub fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.get(id) {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Concatenated text of a subtree, paragraph-separated.
    pub fn subtree_text(&self, root: NodeId) -> String {
        let mut parts = Vec::new();
        for id in self.walk(root) {
            if let Some(node) = self.get(id) {
                if !node.text.is_empty() {
                    parts.push(node.text.as_str());
                }
            }
        }
        parts.join("\n")
    }
}
