//! `kind: command` extraction.
//!
//! Indexed fields: purpose, input_params, preconditions, postconditions,
//! errors. Edges: `EMITS` for events referenced in postconditions,
//! `WIKI_LINK` elsewhere.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, string_field,
    table_as_json, wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode};
use kdd_parser::extract_wiki_links;
use std::collections::BTreeMap;

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "purpose",
        find_section(document, &["purpose", "propósito"]),
    );
    if let Some(input) = find_section(document, &["input", "entrada"]) {
        fields.insert("input_params".into(), table_as_json(&input.content));
    }
    string_field(
        &mut fields,
        "preconditions",
        find_section(document, &["preconditions", "precondiciones"]),
    );
    string_field(
        &mut fields,
        "postconditions",
        find_section(document, &["postconditions", "postcondiciones"]),
    );
    if let Some(errors) = find_section(document, &["possible errors", "errores posibles"]) {
        fields.insert("errors".into(), table_as_json(&errors.content));
    }

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);
    if let Some(post) = find_section(document, &["postconditions", "postcondiciones"]) {
        for link in extract_wiki_links(&post.content) {
            if link.target.starts_with("EVT-") {
                edges.push(make_edge(
                    document,
                    &from,
                    resolve_link_target(&link.target),
                    EdgeType::Emits.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }

    (node, dedupe_edges(edges))
}
