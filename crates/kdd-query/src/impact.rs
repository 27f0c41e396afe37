//! Impact analysis: what depends on a node, and which scenarios to re-run.

use crate::common::validate_depth;
use crate::error::{QueryError, Result};
use crate::snapshot::Snapshot;
use kdd_domain::{EdgeType, GraphNode, Kind};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ImpactInput {
    pub node_id: String,
    pub depth: usize,
}

impl ImpactInput {
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            depth: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AffectedNode {
    pub node_id: String,
    pub kind: Kind,
    pub edge_type: String,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitivelyAffected {
    pub node_id: String,
    pub kind: Kind,
    pub distance: usize,
    /// Node ids from the analyzed node out to this dependent.
    pub path: Vec<String>,
    pub edge_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioToRerun {
    pub node_id: String,
    pub scenario: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ImpactResult {
    pub analyzed: GraphNode,
    pub directly_affected: Vec<AffectedNode>,
    pub transitively_affected: Vec<TransitivelyAffected>,
    pub scenarios_to_rerun: Vec<ScenarioToRerun>,
}

/// Follow incoming edges up to `depth` hops. Distance 1 is directly
/// affected; beyond that the full dependency path is recorded. BDD
/// scenarios arrive through `VALIDATES` edges into any affected node.
pub fn run(snapshot: &Snapshot, input: &ImpactInput) -> Result<ImpactResult> {
    validate_depth(input.depth)?;

    let analyzed = snapshot
        .graph
        .get_node(&input.node_id)
        .ok_or_else(|| QueryError::NodeNotFound(input.node_id.clone()))?
        .clone();

    let reverse = snapshot.graph.reverse_traverse(&input.node_id, input.depth);

    let mut directly_affected = Vec::new();
    let mut transitively_affected = Vec::new();
    for reached in &reverse {
        let Some(node) = snapshot.graph.get_node(&reached.node_id) else {
            continue;
        };
        if reached.distance == 1 {
            let edge = &reached.path[0];
            directly_affected.push(AffectedNode {
                node_id: node.id.clone(),
                kind: node.kind,
                edge_type: edge.edge_type.clone(),
                impact: describe_impact(&edge.edge_type),
            });
        } else {
            let mut path = vec![input.node_id.clone()];
            path.extend(reached.path.iter().map(|e| e.from_node.clone()));
            transitively_affected.push(TransitivelyAffected {
                node_id: node.id.clone(),
                kind: node.kind,
                distance: reached.distance,
                path,
                edge_types: reached.path.iter().map(|e| e.edge_type.clone()).collect(),
            });
        }
    }

    // Scenario lookup over the whole affected set, root included.
    let mut affected_ids: BTreeSet<&str> = BTreeSet::new();
    affected_ids.insert(input.node_id.as_str());
    affected_ids.extend(directly_affected.iter().map(|a| a.node_id.as_str()));
    affected_ids.extend(transitively_affected.iter().map(|t| t.node_id.as_str()));

    let mut scenarios = Vec::new();
    for edge in snapshot.graph.all_edges() {
        if !edge.is_type(EdgeType::Validates) || !affected_ids.contains(edge.to_node.as_str()) {
            continue;
        }
        let Some(feature) = snapshot.graph.get_node(&edge.from_node) else {
            continue;
        };
        scenarios.push(ScenarioToRerun {
            node_id: feature.id.clone(),
            scenario: feature
                .indexed_fields
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or(&feature.id)
                .to_string(),
            reason: format!("validates {}, which is affected", edge.to_node),
        });
    }
    scenarios.sort_by(|a, b| a.node_id.cmp(&b.node_id));
    scenarios.dedup_by(|a, b| a.node_id == b.node_id && a.reason == b.reason);

    Ok(ImpactResult {
        analyzed,
        directly_affected,
        transitively_affected,
        scenarios_to_rerun: scenarios,
    })
}

fn describe_impact(edge_type: &str) -> String {
    let description = match edge_type {
        "ENTITY_RULE" => "business rule validates this artifact",
        "ENTITY_POLICY" => "policy constrains this artifact",
        "UC_APPLIES_RULE" => "use case applies this rule",
        "UC_EXECUTES_CMD" => "use case executes this command",
        "EMITS" => "emits this event",
        "CONSUMES" => "consumes this event",
        "WIKI_LINK" => "references this artifact",
        "DOMAIN_RELATION" => "holds a domain relationship",
        "REQ_TRACES_TO" => "requirement traces to this artifact",
        "VALIDATES" => "validates this artifact",
        "DECIDES_FOR" => "decision covers this artifact",
        other => return format!("connected via {other}"),
    };
    description.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_with;
    use kdd_domain::Layer;

    fn impact_snapshot() -> Snapshot {
        snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("CMD:CMD-001", Kind::Command, Layer::Behavior),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
                ("REQ:REQ-001", Kind::Requirement, Layer::Verification),
            ],
            &[
                ("CMD:CMD-001", "Entity:Pedido", "WIKI_LINK", false),
                ("UC:UC-001", "CMD:CMD-001", "UC_EXECUTES_CMD", false),
                ("REQ:REQ-001", "UC:UC-001", "VALIDATES", false),
            ],
        )
    }

    #[test]
    fn direct_and_transitive_dependents() {
        let result = run(&impact_snapshot(), &ImpactInput::new("Entity:Pedido")).unwrap();

        assert_eq!(result.directly_affected.len(), 1);
        assert_eq!(result.directly_affected[0].node_id, "CMD:CMD-001");
        assert_eq!(result.directly_affected[0].edge_type, "WIKI_LINK");

        let uc = result
            .transitively_affected
            .iter()
            .find(|t| t.node_id == "UC:UC-001")
            .unwrap();
        assert_eq!(uc.distance, 2);
        assert_eq!(uc.path, vec!["Entity:Pedido", "CMD:CMD-001", "UC:UC-001"]);
        assert_eq!(uc.edge_types, vec!["WIKI_LINK", "UC_EXECUTES_CMD"]);
    }

    #[test]
    fn scenarios_found_through_validates_edges() {
        let result = run(&impact_snapshot(), &ImpactInput::new("Entity:Pedido")).unwrap();
        assert_eq!(result.scenarios_to_rerun.len(), 1);
        assert_eq!(result.scenarios_to_rerun[0].node_id, "REQ:REQ-001");
    }

    #[test]
    fn missing_node_fails() {
        let err = run(&impact_snapshot(), &ImpactInput::new("Entity:Nada")).unwrap_err();
        assert_eq!(err.code(), "NODE_NOT_FOUND");
    }

    #[test]
    fn depth_one_has_no_transitives() {
        let mut input = ImpactInput::new("Entity:Pedido");
        input.depth = 1;
        let result = run(&impact_snapshot(), &input).unwrap();
        assert_eq!(result.directly_affected.len(), 1);
        assert!(result.transitively_affected.is_empty());
    }
}
