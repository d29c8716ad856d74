//! XBRL document parsing: instance, schema, and the five linkbases.
//!
//! A full XBRL filing is six files. This module loads them in a deterministic order
//! (schema → label → presentation → definition → calculation → instance) and produces a
//! unified [`XbrlDocument`]: concept metadata, resolved labels, per-role relationship
//! trees, interned contexts, canonical units, and a frozen [`FactStore`](crate::FactStore).
//!
//! Linkbases are arc-based graphs. Locators point into the schema's element table via
//! fragment ids, arcs connect locators with an `order` and (for calculation) a `weight`,
//! and the tree builders resolve those into ordered parent/child structures keyed by the
//! extended link role. Roles identify statements: one presentation tree per income
//! statement, balance sheet, cash flow statement, and each note.
//!
//! Missing linkbases degrade: absent labels fall back to pretty-printed local names and a
//! warning, absent presentation produces an empty tree set. A malformed instance is fatal.

mod document;
mod instance;
mod linkbase;
mod schema;

pub use document::{FilingSource, XbrlDocument, XbrlFiles, infer_fiscal, statement_type_for_role};
pub use instance::{InstanceDocument, RawFact};
pub use linkbase::{LabelSet, Linkbase, Relationship, RelationshipNode, RelationshipTree};
pub use schema::{Balance, Concept, ConceptDataType, SchemaDocument};

/// Well-known label linkbase roles.
pub mod label_roles {
    pub const STANDARD: &str = "http://www.xbrl.org/2003/role/label";
    pub const TERSE: &str = "http://www.xbrl.org/2003/role/terseLabel";
    pub const VERBOSE: &str = "http://www.xbrl.org/2003/role/verboseLabel";
    pub const NEGATED: &str = "http://www.xbrl.org/2009/role/negatedLabel";
    pub const TOTAL: &str = "http://www.xbrl.org/2003/role/totalLabel";
    pub const DOCUMENTATION: &str = "http://www.xbrl.org/2003/role/documentation";
}

/// Standard arcroles for the relationship linkbases.
pub mod arcroles {
    pub const PARENT_CHILD: &str = "http://www.xbrl.org/2003/arcrole/parent-child";
    pub const SUMMATION_ITEM: &str = "http://www.xbrl.org/2003/arcrole/summation-item";
    pub const CONCEPT_LABEL: &str = "http://www.xbrl.org/2003/arcrole/concept-label";
    pub const HYPERCUBE_DIMENSION: &str = "http://xbrl.org/int/dim/arcrole/hypercube-dimension";
    pub const DIMENSION_DOMAIN: &str = "http://xbrl.org/int/dim/arcrole/dimension-domain";
    pub const DIMENSION_DEFAULT: &str = "http://xbrl.org/int/dim/arcrole/dimension-default";
    pub const DOMAIN_MEMBER: &str = "http://xbrl.org/int/dim/arcrole/domain-member";
    pub const ALL: &str = "http://xbrl.org/int/dim/arcrole/all";
}

/// Pretty-prints a CamelCase local name into a human-readable label.
///
/// Used when the label linkbase is missing or lacks an entry for a concept:
/// `NetIncomeLoss` → `Net Income Loss`.
pub(crate) fn pretty_print_local_name(local: &str) -> String {
    let mut out = String::with_capacity(local.len() + 8);
    let chars: Vec<char> = local.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase()
            && i > 0
            && (chars[i - 1].is_ascii_lowercase()
                || (i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase()))
        {
            out.push(' ');
        }
        out.push(c);
    }
    out
}
