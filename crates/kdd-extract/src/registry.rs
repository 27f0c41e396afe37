//! Kind dispatch and edge layer classification.

use crate::base::guess_layer_of_node_id;
use crate::kinds;
use kdd_domain::{is_layer_violation, Document, GraphEdge, GraphNode, Kind};

/// Extract the node and edges for a parsed document.
///
/// Every produced edge is classified against the layer rules: the source
/// layer is the document's, the destination layer is guessed from the
/// target id's kind prefix.
#[must_use]
pub fn extract(document: &Document) -> (GraphNode, Vec<GraphEdge>) {
    let (node, mut edges) = match document.kind {
        Kind::Entity => kinds::entity::extract(document),
        Kind::BusinessRule | Kind::BusinessPolicy | Kind::CrossPolicy => {
            kinds::rules::extract(document)
        }
        Kind::Command => kinds::command::extract(document),
        Kind::UseCase => kinds::use_case::extract(document),
        Kind::UiView => kinds::ui::extract_view(document),
        Kind::UiComponent => kinds::ui::extract_component(document),
        Kind::Requirement => kinds::requirement::extract(document),
        Kind::Adr => kinds::adr::extract(document),
        Kind::Event | Kind::Query | Kind::Process | Kind::Objective | Kind::Prd => {
            kinds::simple::extract(document)
        }
    };

    for edge in &mut edges {
        if let Some(to_layer) = guess_layer_of_node_id(&edge.to_node) {
            edge.layer_violation = is_layer_violation(document.layer, to_layer);
        }
    }

    (node, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdd_domain::{EdgeType, Layer};
    use kdd_parser::{parse_document, ParseOutcome};

    fn parse(path: &str, source: &str) -> Document {
        match parse_document(path, source.as_bytes()) {
            ParseOutcome::Parsed { document, .. } => document,
            other => panic!("expected parsed document, got {other:?}"),
        }
    }

    const ENTITY: &str = "---\nkind: entity\nid: Pedido\naliases: [Orden, Order]\n---\n\n# Pedido\n\n## Descripción\n\nUn pedido realizado por un [[Usuario]].\n\n## Relaciones\n\n| Relación | Cardinalidad | Entidad |\n|---|---|---|\n| pertenece_a | N:1 | [[Usuario]] |\n\n## Eventos del Ciclo de Vida\n\n- [[EVT-Pedido-Creado]]\n";

    #[test]
    fn entity_produces_expected_edges() {
        let document = parse("specs/01-domain/entities/Pedido.md", ENTITY);
        let (node, edges) = extract(&document);

        assert_eq!(node.id, "Entity:Pedido");
        assert_eq!(node.aliases, vec!["Orden", "Order"]);
        assert!(node.indexed_fields.contains_key("description"));
        assert!(node.indexed_fields.contains_key("relations"));

        let has = |ty: &str, to: &str| {
            edges
                .iter()
                .any(|e| e.edge_type == ty && e.to_node == to)
        };
        assert!(has("WIKI_LINK", "Entity:Usuario"));
        assert!(has("DOMAIN_RELATION", "Entity:Usuario"));
        assert!(has("pertenece_a", "Entity:Usuario"));
        assert!(has("EMITS", "Event:EVT-Pedido-Creado"));

        let relation = edges
            .iter()
            .find(|e| e.edge_type == "DOMAIN_RELATION")
            .unwrap();
        assert_eq!(
            relation.metadata.get("cardinality").unwrap().as_str(),
            Some("N:1")
        );
    }

    #[test]
    fn embeddable_description_only() {
        // The `Atributos` table is indexed but not embeddable for entities.
        let document = parse("specs/01-domain/entities/Pedido.md", ENTITY);
        let embeddable = kdd_domain::embeddable_sections(document.kind);
        assert!(embeddable.contains(&"descripción"));
        assert!(!embeddable.contains(&"relaciones"));
    }

    #[test]
    fn use_case_dedicated_edges() {
        let src = "---\nkind: use-case\nid: UC-001\n---\n\n# UC-001\n\n## Descripción\n\nCompra con [[OBJ-001]].\n\n## Reglas Aplicadas\n\n- [[BR-001]]\n- [[Usuario]]\n\n## Comandos Ejecutados\n\n- [[CMD-CrearPedido]]\n";
        let document = parse("specs/02-behavior/use-cases/UC-001.md", src);
        let (node, edges) = extract(&document);

        assert_eq!(node.id, "UC:UC-001");
        assert!(edges
            .iter()
            .any(|e| e.edge_type == "UC_APPLIES_RULE" && e.to_node == "BR:BR-001"));
        assert!(edges
            .iter()
            .any(|e| e.edge_type == "UC_EXECUTES_CMD" && e.to_node == "CMD:CMD-CrearPedido"));
        assert!(edges
            .iter()
            .any(|e| e.edge_type == "UC_STORY" && e.to_node == "OBJ:OBJ-001"));
        // A bare entity link in the rules section is not an applied rule.
        assert!(!edges
            .iter()
            .any(|e| e.edge_type == "UC_APPLIES_RULE" && e.to_node == "Entity:Usuario"));
    }

    #[test]
    fn business_rule_links_declared_entities() {
        let src = "---\nkind: business-rule\nid: BR-001\n---\n\n# BR-001\n\n## Declaración\n\nUn [[Pedido]] no puede superar el crédito de [[Usuario]]. Ver [[CMD-CrearPedido]].\n";
        let document = parse("specs/01-domain/rules/BR-001.md", src);
        let (_, edges) = extract(&document);

        let rule_edges: Vec<&GraphEdge> = edges
            .iter()
            .filter(|e| e.edge_type == "ENTITY_RULE")
            .collect();
        assert_eq!(rule_edges.len(), 2);
        assert!(rule_edges.iter().all(|e| e.to_node.starts_with("Entity:")));
    }

    #[test]
    fn command_emits_from_postconditions() {
        let src = "---\nkind: command\nid: CMD-CrearPedido\n---\n\n# CMD\n\n## Purpose\n\nCrear un pedido.\n\n## Preconditions\n\nReferencia a [[EVT-Otro]].\n\n## Postconditions\n\nEmite [[EVT-Pedido-Creado]].\n";
        let document = parse("specs/02-behavior/commands/CMD-CrearPedido.md", src);
        let (_, edges) = extract(&document);

        let emits: Vec<&GraphEdge> = edges.iter().filter(|e| e.edge_type == "EMITS").collect();
        assert_eq!(emits.len(), 1);
        assert_eq!(emits[0].to_node, "Event:EVT-Pedido-Creado");
    }

    #[test]
    fn adr_decides_for_every_link() {
        let src = "---\nkind: adr\nid: ADR-001\n---\n\n# ADR-001\n\n## Contexto\n\n[[Pedido]]\n\n## Decisión\n\n[[CMD-CrearPedido]]\n";
        let document = parse("specs/00-requirements/decisions/ADR-001.md", src);
        let (_, edges) = extract(&document);

        let decides: Vec<&str> = edges
            .iter()
            .filter(|e| e.edge_type == "DECIDES_FOR")
            .map(|e| e.to_node.as_str())
            .collect();
        assert!(decides.contains(&"Entity:Pedido"));
        assert!(decides.contains(&"CMD:CMD-CrearPedido"));
    }

    #[test]
    fn cross_domain_link_becomes_cross_domain_ref() {
        let src = "---\nkind: entity\nid: Pedido\n---\n\n## Descripción\n\nFactura en [[billing::Factura]].\n";
        let document = parse("specs/01-domain/entities/Pedido.md", src);
        let (_, edges) = extract(&document);

        let cross = edges
            .iter()
            .find(|e| e.is_type(EdgeType::CrossDomainRef))
            .unwrap();
        assert_eq!(cross.to_node, "billing::Entity:Factura");
        assert_eq!(
            cross.metadata.get("domain").unwrap().as_str(),
            Some("billing")
        );
    }

    #[test]
    fn upward_reference_is_layer_violation() {
        let src = "---\nkind: entity\nid: Pedido\n---\n\n## Descripción\n\nUsa [[UC-001]].\n";
        let document = parse("specs/01-domain/entities/Pedido.md", src);
        assert_eq!(document.layer, Layer::Domain);
        let (_, edges) = extract(&document);

        let edge = edges.iter().find(|e| e.to_node == "UC:UC-001").unwrap();
        assert!(edge.layer_violation);
    }

    #[test]
    fn requirements_layer_never_violates() {
        let src = "---\nkind: adr\nid: ADR-001\n---\n\n## Decisión\n\n[[UC-001]]\n";
        let document = parse("specs/00-requirements/decisions/ADR-001.md", src);
        let (_, edges) = extract(&document);
        assert!(edges.iter().all(|e| !e.layer_violation));
    }
}
