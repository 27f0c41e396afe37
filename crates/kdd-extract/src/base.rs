//! Shared helpers available to every kind extractor.

use chrono::Utc;
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode, Layer, Section};
use kdd_parser::{extract_wiki_links, WikiLink};
use serde_json::Value;
use std::collections::BTreeMap;

/// Build the node skeleton common to every kind; the caller fills in
/// `indexed_fields`.
#[must_use]
pub(crate) fn base_node(
    document: &Document,
    fields: BTreeMap<String, Value>,
) -> GraphNode {
    GraphNode {
        id: document.kind.node_id(&document.id),
        kind: document.kind,
        source_file: document.source_path.clone(),
        source_hash: document.source_hash.clone(),
        layer: document.layer,
        status: document.status(),
        aliases: document.aliases(),
        domain: document.domain.clone(),
        indexed_fields: fields,
        indexed_at: Utc::now(),
    }
}

/// Best-effort resolution of a wiki-link target to a node id.
///
/// Targets carrying a spec prefix (`EVT-`, `BR-`, `CMD-`, …) map to their
/// kind's namespace; bare PascalCase names are assumed to be entities.
#[must_use]
pub fn resolve_link_target(target: &str) -> String {
    const PREFIXES: [(&str, &str); 13] = [
        ("EVT-", "Event"),
        ("BR-", "BR"),
        ("BP-", "BP"),
        ("XP-", "XP"),
        ("CMD-", "CMD"),
        ("QRY-", "QRY"),
        ("UC-", "UC"),
        ("PROC-", "PROC"),
        ("REQ-", "REQ"),
        ("OBJ-", "OBJ"),
        ("ADR-", "ADR"),
        ("PRD-", "PRD"),
        ("UI-", "UIView"),
    ];
    for (prefix, node_prefix) in PREFIXES {
        if target.starts_with(prefix) {
            return format!("{node_prefix}:{target}");
        }
    }
    format!("Entity:{target}")
}

/// Guess the layer of a node id from its prefix, for violation checks on
/// edges whose destination is not yet indexed.
#[must_use]
pub fn guess_layer_of_node_id(node_id: &str) -> Option<Layer> {
    let prefix = node_id.split(':').next().unwrap_or("");
    match prefix {
        "Entity" | "Event" | "BR" => Some(Layer::Domain),
        "BP" | "XP" | "CMD" | "QRY" | "PROC" | "UC" => Some(Layer::Behavior),
        "UIView" | "UIComp" => Some(Layer::Experience),
        "REQ" => Some(Layer::Verification),
        "OBJ" | "PRD" | "ADR" => Some(Layer::Requirements),
        _ => None,
    }
}

/// Find the first section whose heading matches any of `names`
/// (case-insensitive).
#[must_use]
pub(crate) fn find_section<'a>(document: &'a Document, names: &[&str]) -> Option<&'a Section> {
    document.sections.iter().find(|s| {
        let h = s.heading.to_lowercase();
        names.iter().any(|n| h == *n)
    })
}

/// Find a section by heading and concatenate its content with all child
/// sub-sections. Sections like `## Flujos Alternativos` keep their content
/// in `###` children.
#[must_use]
pub(crate) fn section_with_children(document: &Document, names: &[&str]) -> Option<String> {
    let idx = document.sections.iter().position(|s| {
        let h = s.heading.to_lowercase();
        names.iter().any(|n| h == *n)
    })?;

    let parent = &document.sections[idx];
    let mut parts: Vec<String> = Vec::new();
    if !parent.content.trim().is_empty() {
        parts.push(parent.content.clone());
    }
    for section in &document.sections[idx + 1..] {
        if section.level <= parent.level {
            break;
        }
        parts.push(format!("### {}\n\n{}", section.heading, section.content));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Extract `- item` / `* item` list entries.
#[must_use]
pub(crate) fn parse_list_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .map(|s| s.trim().to_string())
        })
        .collect()
}

/// Table rows as JSON objects for `indexed_fields`.
#[must_use]
pub(crate) fn table_as_json(content: &str) -> Value {
    let rows: Vec<Value> = kdd_parser::parse_table_rows(content)
        .into_iter()
        .map(|row| {
            Value::Object(
                row.into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
            )
        })
        .collect();
    Value::Array(rows)
}

pub(crate) fn string_field(fields: &mut BTreeMap<String, Value>, key: &str, section: Option<&Section>) {
    if let Some(section) = section {
        if !section.content.trim().is_empty() {
            fields.insert(key.to_string(), Value::String(section.content.clone()));
        }
    }
}

/// Build an edge originating from this document's node.
#[must_use]
pub(crate) fn make_edge(
    document: &Document,
    from_node: &str,
    to_node: String,
    edge_type: String,
    method: ExtractionMethod,
    metadata: BTreeMap<String, Value>,
) -> GraphEdge {
    GraphEdge {
        from_node: from_node.to_string(),
        to_node,
        edge_type,
        source_file: document.source_path.clone(),
        extraction_method: method,
        metadata,
        layer_violation: false,
        bidirectional: false,
    }
}

/// One edge per wiki-link anywhere in the document. Cross-domain links
/// become `CROSS_DOMAIN_REF` edges whose target is qualified by the other
/// domain's namespace.
#[must_use]
pub(crate) fn wiki_link_edges(document: &Document, from_node: &str) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for section in &document.sections {
        for link in extract_wiki_links(&section.content) {
            edges.push(link_edge(document, from_node, &link, &section.path));
        }
    }
    edges
}

/// An edge for a single wiki-link, typed by whether it crosses domains.
#[must_use]
pub(crate) fn link_edge(
    document: &Document,
    from_node: &str,
    link: &WikiLink,
    section_path: &str,
) -> GraphEdge {
    let mut metadata = BTreeMap::new();
    metadata.insert(
        "section".to_string(),
        Value::String(section_path.to_string()),
    );
    if let Some(alias) = &link.alias {
        metadata.insert("display_alias".to_string(), Value::String(alias.clone()));
    }

    let (to_node, edge_type) = match &link.domain {
        Some(domain) => {
            metadata.insert("domain".to_string(), Value::String(domain.clone()));
            (
                format!("{domain}::{}", resolve_link_target(&link.target)),
                EdgeType::CrossDomainRef.as_str().to_string(),
            )
        }
        None => (
            resolve_link_target(&link.target),
            EdgeType::WikiLink.as_str().to_string(),
        ),
    };

    let mut edge = make_edge(
        document,
        from_node,
        to_node,
        edge_type,
        ExtractionMethod::WikiLink,
        metadata,
    );
    edge.bidirectional = true;
    edge
}

/// Remove duplicates by `(from, to, type)`, merging metadata by union so the
/// first occurrence keeps any keys the duplicates carried.
#[must_use]
pub(crate) fn dedupe_edges(edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let mut result: Vec<GraphEdge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(existing) = result.iter_mut().find(|e| {
            e.from_node == edge.from_node
                && e.to_node == edge.to_node
                && e.edge_type == edge.edge_type
        }) {
            for (k, v) in edge.metadata {
                existing.metadata.entry(k).or_insert(v);
            }
        } else {
            result.push(edge);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_targets_resolve_to_their_kind() {
        assert_eq!(resolve_link_target("EVT-Pedido-Creado"), "Event:EVT-Pedido-Creado");
        assert_eq!(resolve_link_target("BR-001"), "BR:BR-001");
        assert_eq!(resolve_link_target("CMD-CrearPedido"), "CMD:CMD-CrearPedido");
        assert_eq!(resolve_link_target("Usuario"), "Entity:Usuario");
    }

    #[test]
    fn layer_guess_by_prefix() {
        assert_eq!(guess_layer_of_node_id("Entity:Pedido"), Some(Layer::Domain));
        assert_eq!(guess_layer_of_node_id("UC:UC-001"), Some(Layer::Behavior));
        assert_eq!(guess_layer_of_node_id("REQ:REQ-001"), Some(Layer::Verification));
        assert_eq!(guess_layer_of_node_id("billing::Entity:X"), None);
    }

    #[test]
    fn list_items() {
        let items = parse_list_items("- uno\n* dos\nno item\n-sin espacio");
        assert_eq!(items, vec!["uno", "dos"]);
    }
}
