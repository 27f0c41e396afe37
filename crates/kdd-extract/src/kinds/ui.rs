//! `ui-view` and `ui-component` extraction.
//!
//! Views trigger use cases (`VIEW_TRIGGERS_UC`) and embed components
//! (`VIEW_USES_COMPONENT`); components reference entities
//! (`COMPONENT_USES_ENTITY`).

use crate::base::{
    base_node, dedupe_edges, find_section, make_edge, resolve_link_target, string_field,
    wiki_link_edges,
};
use kdd_domain::{Document, EdgeType, ExtractionMethod, GraphEdge, GraphNode, Kind};
use kdd_parser::extract_wiki_links;
use std::collections::BTreeMap;

pub(crate) fn extract_view(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "description",
        find_section(document, &["descripción", "description"]),
    );
    string_field(
        &mut fields,
        "layout",
        find_section(document, &["layout", "diseño"]),
    );
    string_field(
        &mut fields,
        "components",
        find_section(document, &["componentes", "components"]),
    );
    string_field(
        &mut fields,
        "states",
        find_section(document, &["estados", "states"]),
    );
    string_field(
        &mut fields,
        "behavior",
        find_section(document, &["comportamiento", "behavior"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);

    for link_ref in &document.wiki_links {
        if link_ref.target.starts_with("UC-") {
            edges.push(make_edge(
                document,
                &from,
                resolve_link_target(&link_ref.target),
                EdgeType::ViewTriggersUc.as_str().to_string(),
                ExtractionMethod::WikiLink,
                BTreeMap::new(),
            ));
        }
    }

    if let Some(section) = find_section(document, &["componentes", "components"]) {
        for link in extract_wiki_links(&section.content) {
            if link.domain.is_none() {
                edges.push(make_edge(
                    document,
                    &from,
                    format!("{}:{}", Kind::UiComponent.node_prefix(), link.target),
                    EdgeType::ViewUsesComponent.as_str().to_string(),
                    ExtractionMethod::SectionContent,
                    BTreeMap::new(),
                ));
            }
        }
    }

    (node, dedupe_edges(edges))
}

pub(crate) fn extract_component(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let mut fields = BTreeMap::new();
    string_field(
        &mut fields,
        "description",
        find_section(document, &["descripción", "description"]),
    );
    string_field(
        &mut fields,
        "props",
        find_section(document, &["props", "propiedades", "properties"]),
    );

    let node = base_node(document, fields);
    let from = node.id.clone();

    let mut edges = wiki_link_edges(document, &from);

    for link_ref in &document.wiki_links {
        let target = resolve_link_target(&link_ref.target);
        if target.starts_with("Entity:") {
            edges.push(make_edge(
                document,
                &from,
                target,
                EdgeType::ComponentUsesEntity.as_str().to_string(),
                ExtractionMethod::WikiLink,
                BTreeMap::new(),
            ));
        }
    }

    (node, dedupe_edges(edges))
}
