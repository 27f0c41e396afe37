//! `kind: adr` extraction.
//!
//! An ADR decides for everything it references: every wiki-link anywhere in
//! the document becomes a `DECIDES_FOR` edge.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, string_field,
    wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode};
use std::collections::BTreeMap;

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "context",
        find_section(document, &["contexto", "context"]),
    );
    string_field(
        &mut fields,
        "decision",
        find_section(document, &["decisión", "decision"]),
    );
    string_field(
        &mut fields,
        "consequences",
        find_section(document, &["consecuencias", "consequences"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);
    for link_ref in &document.wiki_links {
        edges.push(make_edge(
            document,
            &from,
            resolve_link_target(&link_ref.target),
            EdgeType::DecidesFor.as_str().to_string(),
            ExtractionMethod::WikiLink,
            BTreeMap::new(),
        ));
    }

    (node, dedupe_edges(edges))
}
