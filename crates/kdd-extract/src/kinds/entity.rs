//! `kind: entity` extraction.
//!
//! Indexed fields: description, attributes, relations, invariants,
//! state_machine. Edges: `DOMAIN_RELATION` (+ a business edge per relation
//! row), `EMITS`/`CONSUMES` from lifecycle-event sections, `WIKI_LINK`.

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, parse_list_items, resolve_link_target,
    string_field, table_as_json, wiki_link_edges,
};
use kdd_domain::{edge_type_name, Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode};
use kdd_parser::{extract_wiki_links, parse_table_rows};
use serde_json::Value;
use std::collections::BTreeMap;

const EMITS_SECTIONS: [&str; 4] = [
    "eventos del ciclo de vida",
    "lifecycle events",
    "eventos emitidos",
    "emitted events",
];
const CONSUMES_SECTIONS: [&str; 2] = ["eventos consumidos", "consumed events"];

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "description",
        find_section(document, &["descripción", "description"]),
    );
    if let Some(attrs) = find_section(document, &["atributos", "attributes"]) {
        fields.insert("attributes".into(), table_as_json(&attrs.content));
    }
    if let Some(rels) = find_section(document, &["relaciones", "relations", "relationships"]) {
        fields.insert("relations".into(), table_as_json(&rels.content));
    }
    if let Some(inv) = find_section(document, &["invariantes", "invariants", "constraints"]) {
        let items: Vec<Value> = parse_list_items(&inv.content)
            .into_iter()
            .map(Value::String)
            .collect();
        if !items.is_empty() {
            fields.insert("invariants".into(), Value::Array(items));
        }
    }
    string_field(
        &mut fields,
        "state_machine",
        find_section(document, &["ciclo de vida", "lifecycle", "state machine"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);
    if let Some(rels) = find_section(document, &["relaciones", "relations", "relationships"]) {
        edges.extend(relation_edges(document, &from, &rels.content));
    }
    edges.extend(event_edges(document, &from));

    (node, dedupe_edges(edges))
}

/// One `DOMAIN_RELATION` edge plus one business edge per relations-table
/// row that links an entity.
fn relation_edges(document: &Document, from: &str, content: &str) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for row in parse_table_rows(content) {
        let Some(link) = row
            .iter()
            .find_map(|(_, cell)| extract_wiki_links(cell).into_iter().next())
        else {
            continue;
        };
        let to = resolve_link_target(&link.target);

        let relation = row.first().map(|(_, v)| v.clone()).unwrap_or_default();
        let cardinality = row
            .iter()
            .find(|(k, _)| {
                let k = k.to_lowercase();
                k == "cardinalidad" || k == "cardinality"
            })
            .map(|(_, v)| v.clone());

        let mut metadata = BTreeMap::new();
        metadata.insert("relation".to_string(), Value::String(relation.clone()));
        if let Some(card) = cardinality {
            metadata.insert("cardinality".to_string(), Value::String(card));
        }
        if let Some(alias) = &link.alias {
            metadata.insert("display_alias".to_string(), Value::String(alias.clone()));
        }

        edges.push(make_edge(
            document,
            from,
            to.clone(),
            EdgeType::DomainRelation.as_str().to_string(),
            ExtractionMethod::SectionContent,
            metadata,
        ));

        let business = edge_type_name(&relation);
        if !business.is_empty() {
            edges.push(make_edge(
                document,
                from,
                to,
                business,
                ExtractionMethod::SectionContent,
                BTreeMap::new(),
            ));
        }
    }
    edges
}

/// `EMITS` / `CONSUMES` edges from event links in their dedicated sections.
fn event_edges(document: &Document, from: &str) -> Vec<GraphEdge> {
    let mut edges = Vec::new();
    for section in &document.sections {
        let heading = section.heading.to_lowercase();
        let edge_type = if EMITS_SECTIONS.contains(&heading.as_str()) {
            EdgeType::Emits
        } else if CONSUMES_SECTIONS.contains(&heading.as_str()) {
            EdgeType::Consumes
        } else {
            continue;
        };

        for link in extract_wiki_links(&section.content) {
            if link.target.starts_with("EVT-") {
                edges.push(make_edge(
                    document,
                    from,
                    resolve_link_target(&link.target),
                    edge_type.as_str().to_string(),
                    ExtractionMethod::WikiLink,
                    BTreeMap::new(),
                ));
            }
        }
    }
    edges
}
