//! `kind: requirement` extraction.
//!
//! Edges: `REQ_TRACES_TO` for every reference in `## Trazabilidad`,
//! `VALIDATES` for scenario references in a validation section,
//! `WIKI_LINK` elsewhere.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, string_field,
    wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode};
use kdd_parser::extract_wiki_links;
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
        "acceptance_criteria",
        find_section(document, &["criterios de aceptación", "acceptance criteria"]),
    );
    string_field(
        &mut fields,
        "traceability",
        find_section(document, &["trazabilidad", "traceability"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);

    if let Some(trace) = find_section(document, &["trazabilidad", "traceability"]) {
        for link in extract_wiki_links(&trace.content) {
            if link.domain.is_none() {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(&link.target),
                    EdgeType::ReqTracesTo.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }

    if let Some(validation) = find_section(document, &["validación", "validation", "escenarios", "scenarios"]) {
        for link in extract_wiki_links(&validation.content) {
            if link.domain.is_none() {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(&link.target),
                    EdgeType::Validates.as_str().to_string(),
                    ExtractionMethod::SectionContent,
                    BTreeMap::new(),
                ));
            }
        }
    }

    (node, dedupe_edges(edges))
}
