//! Node-only kinds: `event`, `query`, `process`, `objective`, `prd`.
//!
//! These produce a node with their kind's indexed fields plus generic
//! `WIKI_LINK` edges; no dedicated edge types.

use crate::base::{base_node, dedupe_edges, find_section, string_field, table_as_json, wiki_link_edges};
use kdd_domain::{Document, GraphEdge, GraphNode, Kind};
use std::collections::BTreeMap;

pub(crate) fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();

    match document.kind {
        Kind::Event => {
            string_field(
                &mut fields,
                "description",
                find_section(document, &["descripción", "description"]),
            );
            if let Some(payload) = find_section(document, &["payload", "carga"]) {
                fields.insert("payload".into(), table_as_json(&payload.content));
            }
            string_field(
                &mut fields,
                "producer",
                find_section(document, &["productor", "producer"]),
            );
            string_field(
                &mut fields,
                "consumers",
                find_section(document, &["consumidores", "consumers"]),
            );
        }
        Kind::Query => {
            string_field(
                &mut fields,
                "purpose",
                find_section(document, &["purpose", "propósito"]),
            );
            if let Some(params) = find_section(document, &["parameters", "parámetros"]) {
                fields.insert("parameters".into(), table_as_json(&params.content));
            }
            string_field(
                &mut fields,
                "response",
                find_section(document, &["response", "respuesta"]),
            );
        }
        Kind::Process => {
            string_field(
                &mut fields,
                "participants",
                find_section(document, &["participantes", "participants"]),
            );
            string_field(
                &mut fields,
                "steps",
                find_section(document, &["pasos", "steps"]),
            );
        }
        Kind::Objective => {
            string_field(
                &mut fields,
                "objective",
                find_section(document, &["objetivo", "objective"]),
            );
            string_field(
                &mut fields,
                "key_results",
                find_section(document, &["resultados clave", "key results"]),
            );
        }
        Kind::Prd => {
            string_field(
                &mut fields,
                "problem",
                find_section(document, &["problema / oportunidad", "problem / opportunity"]),
            );
            string_field(
                &mut fields,
                "scope",
                find_section(document, &["alcance", "scope"]),
            );
        }
        _ => {}
    }

    let node = base_node(document, fields);
    let from = node.id.clone();
    let edges = dedupe_edges(wiki_link_edges(document, &from));
    (node, edges)
}
