//! Filing HTML: semantic parsing, tables, sections, inline XBRL, rendering.
//!
//! The entry point is [`Document::parse`] (or `parse_with_source` to stamp extracted
//! inline-XBRL facts with filing provenance). The result is an arena-backed semantic
//! node tree with extracted [`TableMatrix`] tables, detected [`Section`]s, and a
//! frozen fact store of any inline-XBRL values found.
//!
//! ```rust
//! use filingkit::{Document, ParserConfig};
//!
//! let html = "<html><body><h1>Report</h1><p>Body text.</p></body></html>";
//! let doc = Document::parse(html, &ParserConfig::default())?;
//! assert!(doc.text().contains("Body text."));
//! # Ok::<(), filingkit::FilingError>(())
//! ```

mod inline_xbrl;
mod node;
mod parser;
mod render;
mod sections;
mod table;

pub use inline_xbrl::{InlineResources, parse_inline_resources};
pub use node::{Node, NodeArena, NodeId, NodeKind, Style, StyleId};
pub use parser::{Document, HtmlParser};
pub use render::{MarkdownOptions, table_to_text, to_markdown};
pub use sections::{Chunk, Section, SectionDetector};
pub use table::{MatrixCell, SourceCell, TableMatrix, parse_numeric};
