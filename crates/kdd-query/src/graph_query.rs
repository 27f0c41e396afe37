//! Graph traversal query.

use crate::common::{node_snippet, validate_depth, QueryFilters};
use crate::error::{QueryError, Result};
use crate::snapshot::Snapshot;
use kdd_domain::{GraphEdge, GraphNode, Kind};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct GraphQueryInput {
    pub root_node: String,
    pub depth: usize,
    pub edge_types: Vec<String>,
    pub filters: QueryFilters,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedNode {
    pub node_id: String,
    pub kind: Kind,
    pub distance: usize,
    pub score: f32,
    pub snippet: String,
}

#[derive(Debug, Serialize)]
pub struct GraphQueryResult {
    pub center: GraphNode,
    pub related: Vec<RelatedNode>,
    pub edges: Vec<GraphEdge>,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// BFS around `root_node`, scoring related nodes by `1 / (1 + distance)`.
pub fn run(snapshot: &Snapshot, input: &GraphQueryInput) -> Result<GraphQueryResult> {
    validate_depth(input.depth)?;
    input.filters.validate()?;

    let center = snapshot
        .graph
        .get_node(&input.root_node)
        .ok_or_else(|| QueryError::NodeNotFound(input.root_node.clone()))?
        .clone();

    let edge_types = if input.edge_types.is_empty() {
        None
    } else {
        Some(input.edge_types.as_slice())
    };
    let traversal = snapshot.graph.traverse(
        &input.root_node,
        input.depth,
        edge_types,
        input.filters.respect_layers,
    );

    let mut related: Vec<RelatedNode> = traversal
        .nodes
        .iter()
        .filter(|(id, _)| *id != input.root_node)
        .filter_map(|(id, distance)| {
            let node = snapshot.graph.get_node(id)?;
            if !input.filters.matches(node) {
                return None;
            }
            Some(RelatedNode {
                node_id: id.clone(),
                kind: node.kind,
                distance: *distance,
                score: 1.0 / (1.0 + *distance as f32),
                snippet: node_snippet(node),
            })
        })
        .collect();

    related.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    related.truncate(input.filters.limit);

    Ok(GraphQueryResult {
        total_nodes: related.len() + 1,
        total_edges: traversal.edges.len(),
        center,
        related,
        edges: traversal.edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_with;
    use kdd_domain::Layer;

    #[test]
    fn traverses_and_scores_by_distance() {
        let snapshot = snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("Entity:Usuario", Kind::Entity, Layer::Domain),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
            ],
            &[
                ("Entity:Pedido", "Entity:Usuario", "WIKI_LINK", false),
                ("UC:UC-001", "Entity:Usuario", "WIKI_LINK", false),
            ],
        );

        let result = run(
            &snapshot,
            &GraphQueryInput {
                root_node: "Entity:Pedido".into(),
                depth: 2,
                edge_types: vec![],
                filters: QueryFilters::default(),
            },
        )
        .unwrap();

        assert_eq!(result.center.id, "Entity:Pedido");
        assert_eq!(result.related.len(), 2);
        assert_eq!(result.related[0].node_id, "Entity:Usuario");
        assert_eq!(result.related[0].distance, 1);
        assert!(result.related[0].score > result.related[1].score);
    }

    #[test]
    fn unknown_root_fails() {
        let snapshot = snapshot_with(&[], &[]);
        let err = run(
            &snapshot,
            &GraphQueryInput {
                root_node: "Entity:Nada".into(),
                depth: 1,
                edge_types: vec![],
                filters: QueryFilters::default(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NODE_NOT_FOUND");
    }

    #[test]
    fn depth_out_of_range_fails() {
        let snapshot = snapshot_with(&[("Entity:Pedido", Kind::Entity, Layer::Domain)], &[]);
        let err = run(
            &snapshot,
            &GraphQueryInput {
                root_node: "Entity:Pedido".into(),
                depth: 6,
                edge_types: vec![],
                filters: QueryFilters::default(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_DEPTH");
    }

    #[test]
    fn respect_layers_excludes_violation_edges() {
        let snapshot = snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
            ],
            &[("Entity:Pedido", "UC:UC-001", "WIKI_LINK", true)],
        );

        let input = GraphQueryInput {
            root_node: "Entity:Pedido".into(),
            depth: 1,
            edge_types: vec![],
            filters: QueryFilters::default(),
        };
        let strict = run(&snapshot, &input).unwrap();
        assert!(strict.related.is_empty());

        let mut relaxed_input = input;
        relaxed_input.filters.respect_layers = false;
        let relaxed = run(&snapshot, &relaxed_input).unwrap();
        assert_eq!(relaxed.related.len(), 1);
    }
}
