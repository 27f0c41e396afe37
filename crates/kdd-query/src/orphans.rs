//! Orphan-edge report: references whose endpoints never loaded.

use crate::error::Result;
use crate::snapshot::Snapshot;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct OrphanInput {
    pub include_edge_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanReport {
    pub from_node: String,
    pub to_node: String,
    pub edge_type: String,
    pub source_file: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct OrphanResult {
    pub orphans: Vec<OrphanReport>,
    pub total_orphans: usize,
    pub total_edges_on_disk: usize,
    /// `orphans / (loaded + orphans) × 100`, rounded to 2 decimals.
    pub orphan_rate: f64,
}

/// Never fails; an empty index reports an empty result.
pub fn run(snapshot: &Snapshot, input: &OrphanInput) -> Result<OrphanResult> {
    let all_orphans = snapshot.graph.orphan_edges();
    let loaded_edges = snapshot.graph.edge_count();
    let total_on_disk = loaded_edges + all_orphans.len();

    let mut orphans: Vec<OrphanReport> = all_orphans
        .iter()
        .filter(|o| {
            input.include_edge_types.is_empty()
                || input.include_edge_types.contains(&o.edge.edge_type)
        })
        .map(|o| OrphanReport {
            from_node: o.edge.from_node.clone(),
            to_node: o.edge.to_node.clone(),
            edge_type: o.edge.edge_type.clone(),
            source_file: o.edge.source_file.clone(),
            reason: o.reason.as_str().to_string(),
        })
        .collect();
    orphans.sort_by(|a, b| {
        a.from_node
            .cmp(&b.from_node)
            .then_with(|| a.to_node.cmp(&b.to_node))
            .then_with(|| a.edge_type.cmp(&b.edge_type))
    });

    let orphan_rate = if total_on_disk > 0 {
        (all_orphans.len() as f64 / total_on_disk as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };

    Ok(OrphanResult {
        total_orphans: all_orphans.len(),
        total_edges_on_disk: total_on_disk,
        orphan_rate,
        orphans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::snapshot_with;
    use kdd_domain::{Kind, Layer};

    #[test]
    fn orphan_rate_counts_disk_edges() {
        let snapshot = snapshot_with(
            &[
                ("Entity:A", Kind::Entity, Layer::Domain),
                ("Entity:B", Kind::Entity, Layer::Domain),
            ],
            &[
                ("Entity:A", "Entity:B", "WIKI_LINK", false),
                ("Entity:A", "Entity:MISSING1", "WIKI_LINK", false),
                ("Entity:A", "Entity:MISSING2", "EMITS", false),
                ("Entity:B", "Entity:MISSING3", "WIKI_LINK", false),
            ],
        );

        let result = run(&snapshot, &OrphanInput::default()).unwrap();
        assert_eq!(result.total_orphans, 3);
        assert_eq!(result.total_edges_on_disk, 4);
        assert_eq!(result.orphan_rate, 75.0);
        assert_eq!(result.orphans[0].reason, "missing_target");
    }

    #[test]
    fn edge_type_filter_keeps_global_rate() {
        let snapshot = snapshot_with(
            &[("Entity:A", Kind::Entity, Layer::Domain)],
            &[
                ("Entity:A", "Entity:M1", "WIKI_LINK", false),
                ("Entity:A", "Entity:M2", "EMITS", false),
            ],
        );
        let result = run(
            &snapshot,
            &OrphanInput {
                include_edge_types: vec!["EMITS".into()],
            },
        )
        .unwrap();
        assert_eq!(result.orphans.len(), 1);
        assert_eq!(result.total_orphans, 2);
        assert_eq!(result.orphan_rate, 100.0);
    }

    #[test]
    fn empty_index_never_fails() {
        let snapshot = snapshot_with(&[], &[]);
        let result = run(&snapshot, &OrphanInput::default()).unwrap();
        assert_eq!(result.total_orphans, 0);
        assert_eq!(result.orphan_rate, 0.0);
    }
}
