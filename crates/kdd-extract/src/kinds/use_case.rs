//! `kind: use-case` extraction.
//!
//! Edges: `UC_APPLIES_RULE` from `## Reglas Aplicadas`, `UC_EXECUTES_CMD`
//! from `## Comandos Ejecutados`, `UC_STORY` to any `OBJ-*` reference.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, section_with_children,
    string_field, wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode};
use kdd_parser::extract_wiki_links;
use serde_json::Value;
use std::collections::BTreeMap;

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "description",
        find_section(document, &["descripción", "description"]),
    );
    string_field(
        &mut fields,
        "actors",
        find_section(document, &["actores", "actors"]),
    );
    string_field(
        &mut fields,
        "preconditions",
        find_section(document, &["precondiciones", "preconditions"]),
    );
    string_field(
        &mut fields,
        "main_flow",
        find_section(document, &["flujo principal", "main flow"]),
    );
    if let Some(alt) = section_with_children(document, &["flujos alternativos", "alternative flows"])
    {
        fields.insert("alternatives".into(), Value::String(alt));
    }
    if let Some(exc) = section_with_children(document, &["excepciones", "exceptions"]) {
        fields.insert("exceptions".into(), Value::String(exc));
    }
    string_field(
        &mut fields,
        "postconditions",
        find_section(document, &["postcondiciones", "postconditions"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);

    if let Some(section) = find_section(document, &["reglas aplicadas", "applied rules", "rules applied"]) {
        for link in extract_wiki_links(&section.content) {
            let t = &link.target;
            if t.starts_with("BR-") || t.starts_with("BP-") || t.starts_with("XP-") {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(t),
                    EdgeType::UcAppliesRule.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }

    if let Some(section) = find_section(document, &["comandos ejecutados", "commands executed"]) {
        for link in extract_wiki_links(&section.content) {
            if link.target.starts_with("CMD-") {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(&link.target),
                    EdgeType::UcExecutesCmd.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }

    for link_ref in &document.wiki_links {
        if link_ref.target.starts_with("OBJ-") {
            edges.push(make_edge(
                document,
                &from,
                resolve_link_target(&link_ref.target),
                EdgeType::UcStory.as_str().to_string(),
                ExtractionMethod::WikiLink,
                BTreeMap::new(),
            ));
        }
    }

    (node, dedupe_edges(edges))
}
