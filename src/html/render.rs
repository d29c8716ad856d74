//! Rendering: LLM-optimized Markdown and fast borderless text tables.
//!
//! The Markdown renderer walks the node tree and emits headings, paragraphs, lists
//! and pipe tables, with numeric columns right-aligned and currency-symbol columns
//! merged into their value columns. The text renderer produces a borderless layout
//! (header row, dash rule, space-padded columns) for terminal-ish consumers at a
//! fraction of the cost of a full table widget.

use crate::html::node::{NodeArena, NodeId, NodeKind};
use crate::html::parser::Document;
use crate::html::table::TableMatrix;

/// Options for the Markdown renderer.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Suppress XBRL dimension/level detail columns in tables when detected.
    pub suppress_dimension_columns: bool,

    /// Append a metadata footer identifying filtered or truncated content.
    pub include_metadata_footer: bool,

    /// Cap on rendered table rows; tables beyond it are truncated with a note.
    pub max_table_rows: usize,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            suppress_dimension_columns: true,
            include_metadata_footer: false,
            max_table_rows: 200,
        }
    }
}

/// Renders a document to Markdown.
pub fn to_markdown(document: &Document, options: &MarkdownOptions) -> String {
    let mut out = String::new();
    let mut truncated_tables = 0usize;
    render_nodes(
        &document.arena,
        document.root,
        options,
        &mut out,
        &mut truncated_tables,
    );

    if options.include_metadata_footer && truncated_tables > 0 {
        out.push_str(&format!(
            "\n---\n*{} table(s) truncated at {} rows.*\n",
            truncated_tables, options.max_table_rows
        ));
    }
    out
}

fn render_nodes(
    arena: &NodeArena,
    id: NodeId,
    options: &MarkdownOptions,
    out: &mut String,
    truncated_tables: &mut usize,
) {
    let Some(node) = arena.get(id) else { return };

    match &node.kind {
        NodeKind::Document => {}
        NodeKind::Heading { level } => {
            let hashes = "#".repeat((*level).clamp(1, 6) as usize);
            out.push_str(&format!("\n{} {}\n\n", hashes, node.text));
        }
        NodeKind::Paragraph | NodeKind::Text | NodeKind::Xbrl { .. } => {
            if !node.text.is_empty() {
                out.push_str(&node.text);
                out.push_str("\n\n");
            }
        }
        NodeKind::Table(table) => {
            render_table_markdown(table, options, out, truncated_tables);
        }
        NodeKind::List { ordered } => {
            for (index, &child) in node.children.iter().enumerate() {
                if let Some(item) = arena.get(child) {
                    if *ordered {
                        out.push_str(&format!("{}. {}\n", index + 1, item.text));
                    } else {
                        out.push_str(&format!("- {}\n", item.text));
                    }
                }
            }
            out.push('\n');
            return; // children already rendered
        }
        NodeKind::ListItem => return,
        NodeKind::PageBreak => {}
    }

    for &child in &node.children {
        render_nodes(arena, child, options, out, truncated_tables);
    }
}

/// Columns retained for rendering after currency merging.
fn visible_columns(table: &TableMatrix) -> Vec<usize> {
    let currency = table.currency_columns();
    (0..table.cols)
        .filter(|&c| !currency.get(c).copied().unwrap_or(false))
        .collect()
}

/// Cell text with its left-adjacent currency column merged in.
fn merged_cell_text(table: &TableMatrix, row: usize, col: usize) -> String {
    let currency = table.currency_columns();
    let text = table
        .cell(row, col)
        .map(|c| c.text.trim().to_string())
        .unwrap_or_default();
    if col > 0 && currency.get(col - 1).copied().unwrap_or(false) {
        let symbol = table
            .cell(row, col - 1)
            .map(|c| c.text.trim())
            .unwrap_or("");
        if !symbol.is_empty() && !text.is_empty() {
            return format!("{}{}", symbol, text);
        }
    }
    text
}

fn render_table_markdown(
    table: &TableMatrix,
    options: &MarkdownOptions,
    out: &mut String,
    truncated_tables: &mut usize,
) {
    if table.is_empty() {
        return;
    }
    let columns = visible_columns(table);
    if columns.is_empty() {
        return;
    }
    let numeric = table.numeric_columns();

    if let Some(caption) = &table.caption {
        out.push_str(&format!("**{}**\n\n", caption));
    }

    // Header: multi-row headers merge top-down per column at render time.
    out.push('|');
    for &c in &columns {
        let heading = if table.header_rows > 0 {
            table.column_heading(c)
        } else {
            String::new()
        };
        out.push_str(&format!(" {} |", heading));
    }
    out.push('\n');

    out.push('|');
    for &c in &columns {
        if numeric.get(c).copied().unwrap_or(false) {
            out.push_str("---:|");
        } else {
            out.push_str("---|");
        }
    }
    out.push('\n');

    let body_start = table.header_rows;
    let mut rendered = 0usize;
    for r in body_start..table.rows {
        if rendered >= options.max_table_rows {
            *truncated_tables += 1;
            break;
        }
        out.push('|');
        for &c in &columns {
            out.push_str(&format!(" {} |", merged_cell_text(table, r, c)));
        }
        out.push('\n');
        rendered += 1;
    }
    out.push('\n');
}

/// Renders a table as borderless plain text: padded columns, a dash rule under the
/// header, no box drawing.
pub fn table_to_text(table: &TableMatrix) -> String {
    if table.is_empty() {
        return String::new();
    }
    let columns = visible_columns(table);
    let numeric = table.numeric_columns();

    // Column widths from content.
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|&c| {
            (0..table.rows)
                .map(|r| merged_cell_text(table, r, c).chars().count())
                .max()
                .unwrap_or(0)
                .max(table.column_heading(c).chars().count())
        })
        .collect();
    for w in widths.iter_mut() {
        *w = (*w).max(1);
    }

    let mut out = String::new();

    if table.header_rows > 0 {
        for (i, &c) in columns.iter().enumerate() {
            let heading = table.column_heading(c);
            out.push_str(&pad(&heading, widths[i], false));
            if i + 1 < columns.len() {
                out.push_str("  ");
            }
        }
        out.push('\n');
        for (i, _) in columns.iter().enumerate() {
            out.push_str(&"-".repeat(widths[i]));
            if i + 1 < columns.len() {
                out.push_str("  ");
            }
        }
        out.push('\n');
    }

    for r in table.header_rows..table.rows {
        for (i, &c) in columns.iter().enumerate() {
            let text = merged_cell_text(table, r, c);
            let right = numeric.get(c).copied().unwrap_or(false);
            out.push_str(&pad(&text, widths[i], right));
            if i + 1 < columns.len() {
                out.push_str("  ");
            }
        }
        out.push('\n');
    }

    out
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let len = text.chars().count();
    let padding = width.saturating_sub(len);
    if right_align {
        format!("{}{}", " ".repeat(padding), text)
    } else {
        format!("{}{}", text, " ".repeat(padding))
    }
}
