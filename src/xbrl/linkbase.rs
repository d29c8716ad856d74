//! Linkbase parsing and relationship tree construction.
//!
//! All five linkbases share one arc-based format: locators point at schema elements,
//! arcs connect locators (or, for labels, a locator to a text resource), and everything
//! is grouped under extended links keyed by role URI. The role identifies the statement
//! or note the relationships belong to.
//!
//! The parser resolves locator fragments through the schema's element table as it goes,
//! so the output deals in prefixed concept names, never in raw `xlink:label` strings.
//! Tree building orders children by arc `order` and refuses cycles: an arc that would
//! close a loop is dropped with a warning, keeping every per-role tree acyclic.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::{HashMap, HashSet};

use crate::error::{FilingError, Result};
use crate::xbrl::schema::SchemaDocument;
use crate::xbrl::{label_roles, pretty_print_local_name};

/// One resolved arc: a directed, ordered relationship between two concepts.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub order: f64,
    /// Summation weight, calculation linkbase only.
    pub weight: Option<f64>,
    /// Preferred label role, presentation linkbase only.
    pub preferred_label: Option<String>,
    pub arcrole: String,
}

/// A parsed relationship linkbase: arcs grouped by extended link role.
#[derive(Debug, Clone, Default)]
pub struct Linkbase {
    pub relationships: HashMap<String, Vec<Relationship>>,
}

impl Linkbase {
    /// Parses a presentation, calculation or definition linkbase, resolving locators
    /// through `schema`.
    ///
    /// Arcs whose endpoints cannot be resolved to schema concepts are dropped with a
    /// warning; a filer-side locator typo should not sink the whole statement.
    pub fn parse(xml: &str, schema: &SchemaDocument, context: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut linkbase = Linkbase::default();
        let mut buf = Vec::new();

        // Per-extended-link state
        let mut current_role: Option<String> = None;
        let mut locators: HashMap<String, String> = HashMap::new();
        let mut pending: Vec<RawArc> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = e.name();
                    let local = local_tag(name.as_ref());
                    match local {
                        b"presentationLink" | b"calculationLink" | b"definitionLink" => {
                            current_role = attr(e, "role");
                            locators.clear();
                            pending.clear();
                        }
                        b"loc" => {
                            if let (Some(label), Some(href)) = (attr(e, "label"), attr(e, "href")) {
                                locators.insert(label, fragment(&href).to_string());
                            }
                        }
                        b"presentationArc" | b"calculationArc" | b"definitionArc" => {
                            if let Some(arc) = RawArc::from_event(e) {
                                pending.push(arc);
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = e.name();
                    let local = local_tag(name.as_ref());
                    if matches!(
                        local,
                        b"presentationLink" | b"calculationLink" | b"definitionLink"
                    ) {
                        if let Some(role) = current_role.take() {
                            let resolved =
                                resolve_arcs(&pending, &locators, schema, context, &role);
                            linkbase
                                .relationships
                                .entry(role)
                                .or_default()
                                .extend(resolved);
                        }
                        locators.clear();
                        pending.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FilingError::xbrl(context, format!("linkbase: {}", e)));
                }
            }
            buf.clear();
        }

        Ok(linkbase)
    }

    /// Roles present in this linkbase, sorted for deterministic iteration.
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.relationships.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Builds the ordered tree for one role.
    pub fn tree(&self, role: &str) -> RelationshipTree {
        let relationships = self
            .relationships
            .get(role)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        RelationshipTree::build(role, relationships)
    }
}

struct RawArc {
    from: String,
    to: String,
    order: f64,
    weight: Option<f64>,
    preferred_label: Option<String>,
    arcrole: String,
}

impl RawArc {
    fn from_event(e: &BytesStart<'_>) -> Option<Self> {
        Some(RawArc {
            from: attr(e, "from")?,
            to: attr(e, "to")?,
            order: attr(e, "order")
                .and_then(|o| o.parse().ok())
                .unwrap_or(0.0),
            weight: attr(e, "weight").and_then(|w| w.parse().ok()),
            preferred_label: attr(e, "preferredLabel"),
            arcrole: attr(e, "arcrole").unwrap_or_default(),
        })
    }
}

fn resolve_arcs(
    pending: &[RawArc],
    locators: &HashMap<String, String>,
    schema: &SchemaDocument,
    context: &str,
    role: &str,
) -> Vec<Relationship> {
    let mut resolved = Vec::with_capacity(pending.len());
    for arc in pending {
        let from = locators.get(&arc.from).and_then(|f| schema.resolve(f));
        let to = locators.get(&arc.to).and_then(|f| schema.resolve(f));
        match (from, to) {
            (Some(from), Some(to)) => resolved.push(Relationship {
                from: from.name.clone(),
                to: to.name.clone(),
                order: arc.order,
                weight: arc.weight,
                preferred_label: arc.preferred_label.clone(),
                arcrole: arc.arcrole.clone(),
            }),
            _ => {
                tracing::warn!(
                    "Dropping unresolvable arc {} -> {} in role {} ({})",
                    arc.from,
                    arc.to,
                    role,
                    context
                );
            }
        }
    }
    resolved
}

/// Resolved labels: concept → (label role, language) → text.
#[derive(Debug, Clone, Default)]
pub struct LabelSet {
    labels: HashMap<String, HashMap<(String, String), String>>,
}

impl LabelSet {
    /// Parses a label linkbase.
    ///
    /// Label arcs connect concept locators to `label` resources; resources carry the
    /// label role, language and text. Unresolvable arcs are dropped with a warning.
    pub fn parse(xml: &str, schema: &SchemaDocument, context: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut set = LabelSet::default();
        let mut buf = Vec::new();

        let mut locators: HashMap<String, String> = HashMap::new();
        // resource label → (role, lang, text)
        let mut resources: HashMap<String, Vec<(String, String, String)>> = HashMap::new();
        let mut arcs: Vec<(String, String)> = Vec::new();

        // State while inside a <label> element
        let mut open_resource: Option<(String, String, String)> = None;
        let mut text_acc = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(event @ (Event::Start(_) | Event::Empty(_))) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let e = match &event {
                        Event::Start(e) | Event::Empty(e) => e,
                        _ => unreachable!(),
                    };
                    let name = e.name();
                    let local = local_tag(name.as_ref());
                    match local {
                        b"loc" => {
                            if let (Some(label), Some(href)) = (attr(e, "label"), attr(e, "href")) {
                                locators.insert(label, fragment(&href).to_string());
                            }
                        }
                        b"labelArc" => {
                            if let (Some(from), Some(to)) = (attr(e, "from"), attr(e, "to")) {
                                arcs.push((from, to));
                            }
                        }
                        b"label" => {
                            let resource_label = attr(e, "label").unwrap_or_default();
                            let role = attr(e, "role")
                                .unwrap_or_else(|| label_roles::STANDARD.to_string());
                            let lang = attr(e, "lang").unwrap_or_else(|| "en-US".to_string());
                            if is_empty {
                                resources.entry(resource_label).or_default().push((
                                    role,
                                    lang,
                                    String::new(),
                                ));
                            } else {
                                open_resource = Some((resource_label, role, lang));
                                text_acc.clear();
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(ref t)) => {
                    if open_resource.is_some() {
                        if let Ok(text) = t.unescape() {
                            text_acc.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(ref e)) => {
                    if local_tag(e.name().as_ref()) == b"label" {
                        if let Some((resource_label, role, lang)) = open_resource.take() {
                            resources.entry(resource_label).or_default().push((
                                role,
                                lang,
                                text_acc.clone(),
                            ));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(FilingError::xbrl(context, format!("label linkbase: {}", e)));
                }
            }
            buf.clear();
        }

        for (from, to) in arcs {
            let concept = locators.get(&from).and_then(|f| schema.resolve(f));
            let texts = resources.get(&to);
            match (concept, texts) {
                (Some(concept), Some(texts)) => {
                    let entry = set.labels.entry(concept.name.clone()).or_default();
                    for (role, lang, text) in texts {
                        entry.insert((role.clone(), lang.clone()), text.clone());
                    }
                }
                _ => {
                    tracing::warn!(
                        "Dropping unresolvable label arc {} -> {} ({})",
                        from,
                        to,
                        context
                    );
                }
            }
        }

        Ok(set)
    }

    /// Number of concepts with at least one label.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Looks up a label by role and language with fallbacks: exact role in the requested
    /// language, the role in any language, then the standard label.
    pub fn get(&self, concept: &str, role: &str, lang: &str) -> Option<&str> {
        let entry = self.labels.get(concept)?;
        if let Some(text) = entry.get(&(role.to_string(), lang.to_string())) {
            return Some(text);
        }
        if let Some(text) = entry
            .iter()
            .find(|((r, _), _)| r == role)
            .map(|(_, text)| text)
        {
            return Some(text);
        }
        entry
            .iter()
            .find(|((r, _), _)| r == label_roles::STANDARD)
            .map(|(_, text)| text.as_str())
    }

    /// Standard label with pretty-printed local-name fallback for missing entries.
    pub fn standard(&self, concept: &str) -> String {
        self.get(concept, label_roles::STANDARD, "en-US")
            .map(String::from)
            .unwrap_or_else(|| {
                let local = concept
                    .rsplit_once(':')
                    .map(|(_, l)| l)
                    .unwrap_or(concept);
                pretty_print_local_name(local)
            })
    }
}

/// Node in an ordered relationship tree, arena-allocated with index links.
#[derive(Debug, Clone)]
pub struct RelationshipNode {
    pub concept: String,
    pub preferred_label: Option<String>,
    pub order: f64,
    pub weight: Option<f64>,
    pub arcrole: String,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// Ordered, acyclic tree of relationships for one role.
///
/// Nodes live in an arena; parents and children are indices, never pointers, which
/// keeps the structure trivially sharable read-only across threads.
#[derive(Debug, Clone)]
pub struct RelationshipTree {
    pub role: String,
    nodes: Vec<RelationshipNode>,
    roots: Vec<usize>,
}

impl RelationshipTree {
    /// Builds the tree for a role from its arcs.
    ///
    /// Children are ordered by arc `order`. Roots are concepts that appear as an arc
    /// source but never as a target. Arcs that would create a cycle are skipped with
    /// a warning.
    pub fn build(role: &str, relationships: &[Relationship]) -> Self {
        let mut children_of: HashMap<&str, Vec<&Relationship>> = HashMap::new();
        let mut targets: HashSet<&str> = HashSet::new();
        for rel in relationships {
            children_of.entry(rel.from.as_str()).or_default().push(rel);
            targets.insert(rel.to.as_str());
        }
        for children in children_of.values_mut() {
            children.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        }

        let mut root_concepts: Vec<&str> = children_of
            .keys()
            .copied()
            .filter(|c| !targets.contains(c))
            .collect();
        root_concepts.sort_unstable();

        let mut tree = RelationshipTree {
            role: role.to_string(),
            nodes: Vec::new(),
            roots: Vec::new(),
        };

        let mut path: HashSet<String> = HashSet::new();
        for root in root_concepts {
            let id = tree.insert_node(root, None, 0.0, None, None, String::new(), 0);
            tree.roots.push(id);
            path.insert(root.to_string());
            tree.attach_children(root, id, 1, &children_of, &mut path);
            path.remove(root);
        }

        tree
    }

    fn insert_node(
        &mut self,
        concept: &str,
        parent: Option<usize>,
        order: f64,
        weight: Option<f64>,
        preferred_label: Option<String>,
        arcrole: String,
        depth: usize,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(RelationshipNode {
            concept: concept.to_string(),
            preferred_label,
            order,
            weight,
            arcrole,
            depth,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(id);
        }
        id
    }

    fn attach_children(
        &mut self,
        concept: &str,
        node_id: usize,
        depth: usize,
        children_of: &HashMap<&str, Vec<&Relationship>>,
        path: &mut HashSet<String>,
    ) {
        let Some(children) = children_of.get(concept) else {
            return;
        };
        let children: Vec<Relationship> = children.iter().map(|r| (*r).clone()).collect();
        for rel in children {
            if path.contains(&rel.to) {
                tracing::warn!(
                    "Cycle detected in role {}: skipping arc {} -> {}",
                    self.role,
                    rel.from,
                    rel.to
                );
                continue;
            }
            let child_id = self.insert_node(
                &rel.to,
                Some(node_id),
                rel.order,
                rel.weight,
                rel.preferred_label.clone(),
                rel.arcrole.clone(),
                depth,
            );
            path.insert(rel.to.clone());
            self.attach_children(&rel.to, child_id, depth + 1, children_of, path);
            path.remove(&rel.to);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, id: usize) -> Option<&RelationshipNode> {
        self.nodes.get(id)
    }

    /// Depth-first, document-order traversal of all node indices.
    pub fn walk(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Leaf concepts in presentation order.
    pub fn leaves(&self) -> Vec<&RelationshipNode> {
        self.walk()
            .into_iter()
            .filter_map(|id| self.node(id))
            .filter(|n| n.children.is_empty())
            .collect()
    }

    /// True when `child` is the last sibling under its parent, the heuristic input
    /// for total-row detection.
    pub fn is_last_sibling(&self, id: usize) -> bool {
        match self.nodes.get(id).and_then(|n| n.parent) {
            Some(parent) => self.nodes[parent].children.last() == Some(&id),
            None => self.roots.last() == Some(&id),
        }
    }

    /// Whether `parent` sums over `child` anywhere in this tree (calculation trees).
    pub fn has_summation(&self, parent: &str, child: &str) -> bool {
        self.walk().into_iter().any(|id| {
            let node = &self.nodes[id];
            node.concept == child
                && node
                    .parent
                    .map(|p| self.nodes[p].concept == parent)
                    .unwrap_or(false)
        })
    }
}

fn local_tag(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        let name = a.key.as_ref();
        let local = local_tag(name);
        if local == key.as_bytes() {
            String::from_utf8(a.value.to_vec()).ok()
        } else {
            None
        }
    })
}

fn fragment(href: &str) -> &str {
    href.rsplit_once('#').map(|(_, f)| f).unwrap_or(href)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::PeriodType;
    use crate::xbrl::schema::{Balance, Concept, ConceptDataType};

    fn schema_with(names: &[&str]) -> SchemaDocument {
        let mut schema = SchemaDocument::default();
        for name in names {
            let local = name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name);
            schema.insert(Concept {
                name: name.to_string(),
                id: Some(name.replace(':', "_")),
                data_type: ConceptDataType::Monetary,
                period_type: PeriodType::Duration,
                balance: Balance::None,
                substitution_group: Some("xbrli:item".to_string()),
                is_abstract: local.ends_with("Abstract"),
            });
        }
        schema
    }

    const PRESENTATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink">
  <link:presentationLink xlink:type="extended" xlink:role="http://example.com/role/IncomeStatement">
    <link:loc xlink:type="locator" xlink:href="x.xsd#t_IncomeStatementAbstract" xlink:label="loc_abstract"/>
    <link:loc xlink:type="locator" xlink:href="x.xsd#t_Revenues" xlink:label="loc_rev"/>
    <link:loc xlink:type="locator" xlink:href="x.xsd#t_CostOfRevenue" xlink:label="loc_cost"/>
    <link:loc xlink:type="locator" xlink:href="x.xsd#t_GrossProfit" xlink:label="loc_gp"/>
    <link:presentationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
        xlink:from="loc_abstract" xlink:to="loc_rev" order="1"/>
    <link:presentationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
        xlink:from="loc_abstract" xlink:to="loc_cost" order="2"/>
    <link:presentationArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/parent-child"
        xlink:from="loc_abstract" xlink:to="loc_gp" order="3"
        preferredLabel="http://www.xbrl.org/2003/role/totalLabel"/>
  </link:presentationLink>
</link:linkbase>"#;

    #[test]
    fn test_parse_presentation() {
        let schema = schema_with(&[
            "t:IncomeStatementAbstract",
            "t:Revenues",
            "t:CostOfRevenue",
            "t:GrossProfit",
        ]);
        let linkbase = Linkbase::parse(PRESENTATION, &schema, "pre.xml").unwrap();
        assert_eq!(linkbase.roles().len(), 1);

        let tree = linkbase.tree("http://example.com/role/IncomeStatement");
        assert_eq!(tree.roots().len(), 1);
        let root = tree.node(tree.roots()[0]).unwrap();
        assert_eq!(root.concept, "t:IncomeStatementAbstract");
        assert_eq!(root.children.len(), 3);

        // Children ordered by arc order
        let first = tree.node(root.children[0]).unwrap();
        assert_eq!(first.concept, "t:Revenues");
        assert_eq!(first.depth, 1);

        let last = tree.node(root.children[2]).unwrap();
        assert_eq!(last.concept, "t:GrossProfit");
        assert_eq!(
            last.preferred_label.as_deref(),
            Some("http://www.xbrl.org/2003/role/totalLabel")
        );
        assert!(tree.is_last_sibling(root.children[2]));
        assert!(!tree.is_last_sibling(root.children[0]));
    }

    #[test]
    fn test_cycle_is_dropped() {
        let rels = vec![
            Relationship {
                from: "a".into(),
                to: "b".into(),
                order: 1.0,
                weight: None,
                preferred_label: None,
                arcrole: String::new(),
            },
            Relationship {
                from: "b".into(),
                to: "a".into(),
                order: 1.0,
                weight: None,
                preferred_label: None,
                arcrole: String::new(),
            },
        ];
        let tree = RelationshipTree::build("role", &rels);
        // "a" and "b" are both targets, so neither is a root and the cycle never expands.
        // A root-free cyclic component yields an empty tree rather than infinite recursion.
        assert!(tree.is_empty());
    }

    #[test]
    fn test_partial_cycle() {
        let mk = |from: &str, to: &str| Relationship {
            from: from.into(),
            to: to.into(),
            order: 1.0,
            weight: None,
            preferred_label: None,
            arcrole: String::new(),
        };
        // root -> a -> b -> a (back edge)
        let rels = vec![mk("root", "a"), mk("a", "b"), mk("b", "a")];
        let tree = RelationshipTree::build("role", &rels);
        assert_eq!(tree.len(), 3); // root, a, b; the back edge is skipped
    }

    const LABELS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<link:linkbase xmlns:link="http://www.xbrl.org/2003/linkbase" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:xml="http://www.w3.org/XML/1998/namespace">
  <link:labelLink xlink:type="extended" xlink:role="http://www.xbrl.org/2003/role/link">
    <link:loc xlink:type="locator" xlink:href="x.xsd#t_Revenues" xlink:label="loc_rev"/>
    <link:label xlink:type="resource" xlink:label="res_rev" xlink:role="http://www.xbrl.org/2003/role/label" xml:lang="en-US">Net sales</link:label>
    <link:label xlink:type="resource" xlink:label="res_rev" xlink:role="http://www.xbrl.org/2003/role/terseLabel" xml:lang="en-US">Sales</link:label>
    <link:labelArc xlink:type="arc" xlink:arcrole="http://www.xbrl.org/2003/arcrole/concept-label" xlink:from="loc_rev" xlink:to="res_rev"/>
  </link:labelLink>
</link:linkbase>"#;

    #[test]
    fn test_parse_labels() {
        let schema = schema_with(&["t:Revenues"]);
        let labels = LabelSet::parse(LABELS, &schema, "lab.xml").unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels.standard("t:Revenues"), "Net sales");
        assert_eq!(
            labels.get("t:Revenues", label_roles::TERSE, "en-US"),
            Some("Sales")
        );
        // Unknown role falls back to standard
        assert_eq!(
            labels.get("t:Revenues", label_roles::NEGATED, "en-US"),
            Some("Net sales")
        );
    }

    #[test]
    fn test_missing_label_pretty_prints() {
        let labels = LabelSet::default();
        assert_eq!(labels.standard("t:NetIncomeLoss"), "Net Income Loss");
    }
}
