//! `business-rule`, `business-policy`, and `cross-policy` extraction.
//!
//! All three link the entities referenced from `## Declaración`:
//! rules via `ENTITY_RULE`, policies via `ENTITY_POLICY`.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, string_field,
    wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode, Kind};
use kdd_parser::extract_wiki_links;
use std::collections::BTreeMap;

const SPEC_PREFIXES: [&str; 12] = [
    "EVT-", "BR-", "BP-", "XP-", "CMD-", "QRY-", "UC-", "PROC-", "REQ-", "OBJ-", "ADR-", "PRD-",
];

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "declaration",
        find_section(document, &["declaración", "declaration"]),
    );
    string_field(
        &mut fields,
        "when_applies",
        find_section(document, &["cuándo aplica", "when applies"]),
    );
    string_field(
        &mut fields,
        "why_exists",
        find_section(document, &["por qué existe", "why it exists"]),
    );
    string_field(
        &mut fields,
        "violation",
        find_section(
            document,
            &["qué pasa si se incumple", "violation", "what happens if violated"],
        ),
    );
    string_field(
        &mut fields,
        "examples",
        find_section(document, &["ejemplos", "examples"]),
    );
    if document.kind == Kind::CrossPolicy {
        string_field(
            &mut fields,
            "purpose",
            find_section(document, &["propósito", "purpose"]),
        );
    }

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);

    let entity_edge_type = match document.kind {
        Kind::BusinessRule => EdgeType::EntityRule,
        _ => EdgeType::EntityPolicy,
    };
    if let Some(decl) = find_section(document, &["declaración", "declaration"]) {
        for link in extract_wiki_links(&decl.content) {
            // Only bare entity names; prefixed spec references stay WIKI_LINK.
            let is_spec_ref = SPEC_PREFIXES.iter().any(|p| link.target.starts_with(p));
            if !is_spec_ref && link.domain.is_none() {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(&link.target),
                    entity_edge_type.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }

    (node, dedupe_edges(edges))
}
