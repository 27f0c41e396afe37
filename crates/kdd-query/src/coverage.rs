//! Governance coverage: which related artifacts a node should have.

use crate::error::{QueryError, Result};
use crate::snapshot::Snapshot;
use kdd_domain::{EdgeType, GraphNode, Kind};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CoverageInput {
    pub node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Covered,
    /// References exist but none of the targets are loaded in the index.
    Partial,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverageCategory {
    pub name: String,
    pub description: String,
    pub edge_type: String,
    pub status: CoverageStatus,
    pub found: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CoverageResult {
    pub analyzed: GraphNode,
    pub categories: Vec<CoverageCategory>,
    /// Categories with at least one reference (covered or partial).
    pub present: usize,
    pub missing: usize,
    pub coverage_percent: f32,
}

enum Direction {
    Outgoing,
    Incoming,
}

struct Rule {
    name: &'static str,
    description: &'static str,
    edge_type: EdgeType,
    direction: Direction,
    /// Restrict which kind must sit on the other end (e.g. an incoming
    /// `WIKI_LINK` only counts for entity coverage when a use case wrote it).
    from_kind: Option<Kind>,
}

fn rules_for(kind: Kind) -> Option<Vec<Rule>> {
    let rules = match kind {
        Kind::Entity => vec![
            Rule {
                name: "events",
                description: "domain events emitted by this entity",
                edge_type: EdgeType::Emits,
                direction: Direction::Outgoing,
                from_kind: None,
            },
            Rule {
                name: "business_rules",
                description: "business rules validating this entity",
                edge_type: EdgeType::EntityRule,
                direction: Direction::Incoming,
                from_kind: None,
            },
            Rule {
                name: "use_cases",
                description: "use cases referencing this entity",
                edge_type: EdgeType::WikiLink,
                direction: Direction::Incoming,
                from_kind: Some(Kind::UseCase),
            },
            Rule {
                name: "requirements",
                description: "requirements tracing to this entity",
                edge_type: EdgeType::ReqTracesTo,
                direction: Direction::Incoming,
                from_kind: None,
            },
        ],
        Kind::Command => vec![
            Rule {
                name: "events",
                description: "events emitted by this command",
                edge_type: EdgeType::Emits,
                direction: Direction::Outgoing,
                from_kind: None,
            },
            Rule {
                name: "use_cases",
                description: "use cases executing this command",
                edge_type: EdgeType::UcExecutesCmd,
                direction: Direction::Incoming,
                from_kind: None,
            },
        ],
        Kind::UseCase => vec![
            Rule {
                name: "commands",
                description: "commands executed by this use case",
                edge_type: EdgeType::UcExecutesCmd,
                direction: Direction::Outgoing,
                from_kind: None,
            },
            Rule {
                name: "rules",
                description: "business rules applied by this use case",
                edge_type: EdgeType::UcAppliesRule,
                direction: Direction::Outgoing,
                from_kind: None,
            },
            Rule {
                name: "requirements",
                description: "requirements tracing to this use case",
                edge_type: EdgeType::ReqTracesTo,
                direction: Direction::Incoming,
                from_kind: None,
            },
        ],
        Kind::BusinessRule => vec![
            Rule {
                name: "entities",
                description: "entities this rule validates",
                edge_type: EdgeType::EntityRule,
                direction: Direction::Outgoing,
                from_kind: None,
            },
            Rule {
                name: "use_cases",
                description: "use cases applying this rule",
                edge_type: EdgeType::UcAppliesRule,
                direction: Direction::Incoming,
                from_kind: None,
            },
        ],
        Kind::Requirement => vec![Rule {
            name: "traces",
            description: "artifacts this requirement traces to",
            edge_type: EdgeType::ReqTracesTo,
            direction: Direction::Outgoing,
            from_kind: None,
        }],
        _ => return None,
    };
    Some(rules)
}

/// Evaluate the per-kind coverage table for one node.
pub fn run(snapshot: &Snapshot, input: &CoverageInput) -> Result<CoverageResult> {
    let node = snapshot
        .graph
        .get_node(&input.node_id)
        .ok_or_else(|| QueryError::NodeNotFound(input.node_id.clone()))?
        .clone();

    let rules = rules_for(node.kind)
        .ok_or_else(|| QueryError::UnknownKind(node.kind.to_string()))?;

    let mut categories = Vec::with_capacity(rules.len());
    let mut present = 0;
    let mut missing = 0;

    for rule in &rules {
        let edge_type = [rule.edge_type.as_str().to_string()];
        let others: Vec<String> = match rule.direction {
            Direction::Outgoing => snapshot
                .graph
                .outgoing_edges(&node.id, Some(&edge_type))
                .iter()
                .map(|e| e.to_node.clone())
                .collect(),
            Direction::Incoming => snapshot
                .graph
                .incoming_edges(&node.id, Some(&edge_type))
                .iter()
                .map(|e| e.from_node.clone())
                .collect(),
        };

        let mut found: Vec<String> = Vec::new();
        for other in others {
            if let Some(required) = rule.from_kind {
                match snapshot.graph.get_node(&other) {
                    Some(n) if n.kind == required => {}
                    _ => continue,
                }
            }
            if !found.contains(&other) {
                found.push(other);
            }
        }

        let loaded = found
            .iter()
            .filter(|id| snapshot.graph.has_node(id))
            .count();
        let status = if found.is_empty() {
            missing += 1;
            CoverageStatus::Missing
        } else if loaded == 0 {
            present += 1;
            CoverageStatus::Partial
        } else {
            present += 1;
            CoverageStatus::Covered
        };

        categories.push(CoverageCategory {
            name: rule.name.to_string(),
            description: rule.description.to_string(),
            edge_type: rule.edge_type.as_str().to_string(),
            status,
            found,
        });
    }

    let total = categories.len();
    let coverage_percent = if total > 0 {
        (present as f32 / total as f32 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(CoverageResult {
        analyzed: node,
        categories,
        present,
        missing,
        coverage_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_with;
    use kdd_domain::Layer;

    fn entity_snapshot() -> Snapshot {
        snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("Event:EVT-Pedido-Creado", Kind::Event, Layer::Domain),
                ("BR:BR-001", Kind::BusinessRule, Layer::Domain),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
            ],
            &[
                ("Entity:Pedido", "Event:EVT-Pedido-Creado", "EMITS", false),
                ("BR:BR-001", "Entity:Pedido", "ENTITY_RULE", false),
                ("UC:UC-001", "Entity:Pedido", "WIKI_LINK", false),
            ],
        )
    }

    #[test]
    fn entity_coverage_counts_categories() {
        let result = run(
            &entity_snapshot(),
            &CoverageInput {
                node_id: "Entity:Pedido".into(),
            },
        )
        .unwrap();

        assert_eq!(result.categories.len(), 4);
        assert_eq!(result.present, 3);
        assert_eq!(result.missing, 1);
        assert_eq!(result.present + result.missing, result.categories.len());
        assert_eq!(result.coverage_percent, 75.0);

        let missing = result
            .categories
            .iter()
            .find(|c| c.status == CoverageStatus::Missing)
            .unwrap();
        assert_eq!(missing.name, "requirements");
    }

    #[test]
    fn wiki_link_from_non_use_case_does_not_count() {
        let snapshot = snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("Entity:Usuario", Kind::Entity, Layer::Domain),
            ],
            &[("Entity:Usuario", "Entity:Pedido", "WIKI_LINK", false)],
        );
        let result = run(
            &snapshot,
            &CoverageInput {
                node_id: "Entity:Pedido".into(),
            },
        )
        .unwrap();
        let use_cases = result
            .categories
            .iter()
            .find(|c| c.name == "use_cases")
            .unwrap();
        assert_eq!(use_cases.status, CoverageStatus::Missing);
    }

    #[test]
    fn kind_without_rules_fails() {
        let snapshot = snapshot_with(
            &[("Event:EVT-X", Kind::Event, Layer::Domain)],
            &[],
        );
        let err = run(
            &snapshot,
            &CoverageInput {
                node_id: "Event:EVT-X".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_KIND");
    }

    #[test]
    fn missing_node_fails() {
        let err = run(
            &entity_snapshot(),
            &CoverageInput {
                node_id: "Entity:Nada".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NODE_NOT_FOUND");
    }
}
