//! Layer-violation report over the loaded edges.

use crate::common::QueryFilters;
use crate::error::Result;
use crate::snapshot::Snapshot;
use kdd_domain::{Layer, LayerViolation};
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct ViolationsInput {
    pub filters: QueryFilters,
}

#[derive(Debug, Serialize)]
pub struct ViolationsResult {
    pub violations: Vec<LayerViolation>,
    pub total_violations: usize,
    pub total_edges: usize,
    /// Percentage of loaded edges in violation, rounded to 2 decimals.
    pub violation_rate: f64,
}

/// Collect every loaded edge flagged as a layer violation, applying the
/// optional kind/layer filters to either endpoint.
pub fn run(snapshot: &Snapshot, input: &ViolationsInput) -> Result<ViolationsResult> {
    input.filters.validate()?;

    let total_edges = snapshot.graph.edge_count();
    let mut violations = Vec::new();

    for edge in snapshot.graph.violations() {
        let from_node = snapshot.graph.get_node(&edge.from_node);
        let to_node = snapshot.graph.get_node(&edge.to_node);

        if !input.filters.include_kinds.is_empty() {
            let hit = from_node.is_some_and(|n| input.filters.include_kinds.contains(&n.kind))
                || to_node.is_some_and(|n| input.filters.include_kinds.contains(&n.kind));
            if !hit {
                continue;
            }
        }

        let from_layer = from_node.map(|n| n.layer).unwrap_or(Layer::Domain);
        let to_layer = to_node.map(|n| n.layer).unwrap_or(Layer::Domain);

        if !input.filters.include_layers.is_empty()
            && !input.filters.include_layers.contains(&from_layer)
            && !input.filters.include_layers.contains(&to_layer)
        {
            continue;
        }

        violations.push(LayerViolation {
            from_node: edge.from_node.clone(),
            to_node: edge.to_node.clone(),
            from_layer,
            to_layer,
            edge_type: edge.edge_type.clone(),
            source_file: edge.source_file.clone(),
            section: edge
                .metadata
                .get("section")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            explanation: format!(
                "{} ({}) references {} ({}): lower layers must not depend on higher layers",
                edge.from_node, from_layer, edge.to_node, to_layer
            ),
        });
    }

    violations.sort_by(|a, b| {
        a.from_node
            .cmp(&b.from_node)
            .then_with(|| a.to_node.cmp(&b.to_node))
    });

    let violation_rate = if total_edges > 0 {
        (violations.len() as f64 / total_edges as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };

    Ok(ViolationsResult {
        total_violations: violations.len(),
        total_edges,
        violation_rate,
        violations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_with;
    use kdd_domain::Kind;

    fn violation_snapshot() -> Snapshot {
        snapshot_with(
            &[
                ("Entity:Pedido", Kind::Entity, Layer::Domain),
                ("UC:UC-001", Kind::UseCase, Layer::Behavior),
                ("Entity:Usuario", Kind::Entity, Layer::Domain),
            ],
            &[
                ("Entity:Pedido", "UC:UC-001", "WIKI_LINK", true),
                ("Entity:Pedido", "Entity:Usuario", "WIKI_LINK", false),
                ("UC:UC-001", "Entity:Usuario", "WIKI_LINK", false),
                ("UC:UC-001", "Entity:Pedido", "WIKI_LINK", false),
            ],
        )
    }

    #[test]
    fn reports_violations_with_rate() {
        let result = run(&violation_snapshot(), &ViolationsInput::default()).unwrap();
        assert_eq!(result.total_violations, 1);
        assert_eq!(result.total_edges, 4);
        assert_eq!(result.violation_rate, 25.0);
        assert_eq!(result.violations[0].from_layer, Layer::Domain);
        assert_eq!(result.violations[0].to_layer, Layer::Behavior);
    }

    #[test]
    fn kind_filter_applies_to_either_endpoint() {
        let mut input = ViolationsInput::default();
        input.filters.include_kinds = vec![Kind::UseCase];
        let result = run(&violation_snapshot(), &input).unwrap();
        assert_eq!(result.total_violations, 1);

        input.filters.include_kinds = vec![Kind::Adr];
        let result = run(&violation_snapshot(), &input).unwrap();
        assert_eq!(result.total_violations, 0);
    }

    #[test]
    fn empty_index_is_zero_rate() {
        let snapshot = snapshot_with(&[], &[]);
        let result = run(&snapshot, &ViolationsInput::default()).unwrap();
        assert_eq!(result.violation_rate, 0.0);
        assert!(result.violations.is_empty());
    }
}
