//! Query engine: validation, lifecycle events, deadlines, snapshot swap.

use crate::common::Deadline;
use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::{
    context, coverage, graph_query, hybrid, impact, orphans, semantic, violations, ContextInput,
    ContextResult, CoverageInput, CoverageResult, GraphQueryInput, GraphQueryResult, HybridInput,
    HybridResult, ImpactInput, ImpactResult, OrphanInput, OrphanResult, SemanticInput,
    SemanticResult, ViolationsInput, ViolationsResult,
};
use chrono::Utc;
use kdd_domain::{EmbeddingModel, Event, EventBus};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Multi-reader façade over an immutable [`Snapshot`].
///
/// Readers take the current snapshot pointer; an incremental rebuild swaps
/// in a new one without disturbing queries already in flight.
pub struct QueryEngine {
    snapshot: RwLock<Arc<Snapshot>>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    bus: Option<Arc<EventBus>>,
}

impl QueryEngine {
    #[must_use]
    pub fn new(
        snapshot: Arc<Snapshot>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
        bus: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            embedder,
            bus,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .expect("snapshot lock poisoned")
            .clone()
    }

    /// Replace the snapshot; in-flight readers keep the old one.
    pub fn swap_snapshot(&self, snapshot: Arc<Snapshot>) {
        *self.snapshot.write().expect("snapshot lock poisoned") = snapshot;
    }

    pub fn graph(&self, input: &GraphQueryInput) -> Result<GraphQueryResult> {
        self.instrument("graph", |snapshot, _| {
            graph_query::run(snapshot, input).map(|r| (r.total_nodes, r))
        })
    }

    pub fn semantic(&self, input: &SemanticInput) -> Result<SemanticResult> {
        self.instrument("semantic", |snapshot, _| {
            semantic::run(snapshot, self.embedder.as_deref(), input)
                .map(|r| (r.total_results, r))
        })
    }

    pub fn hybrid(&self, input: &HybridInput) -> Result<HybridResult> {
        self.instrument("hybrid", |snapshot, deadline| {
            hybrid::run(snapshot, self.embedder.as_deref(), input, deadline)
                .map(|r| (r.hits.len(), r))
        })
    }

    pub fn impact(&self, input: &ImpactInput) -> Result<ImpactResult> {
        self.instrument("impact", |snapshot, _| {
            impact::run(snapshot, input)
                .map(|r| (r.directly_affected.len() + r.transitively_affected.len(), r))
        })
    }

    pub fn coverage(&self, input: &CoverageInput) -> Result<CoverageResult> {
        self.instrument("coverage", |snapshot, _| {
            coverage::run(snapshot, input).map(|r| (r.categories.len(), r))
        })
    }

    pub fn violations(&self, input: &ViolationsInput) -> Result<ViolationsResult> {
        self.instrument("layer-violations", |snapshot, _| {
            violations::run(snapshot, input).map(|r| (r.total_violations, r))
        })
    }

    pub fn orphans(&self, input: &OrphanInput) -> Result<OrphanResult> {
        self.instrument("orphans", |snapshot, _| {
            orphans::run(snapshot, input).map(|r| (r.total_orphans, r))
        })
    }

    pub fn context(&self, input: &ContextInput) -> Result<ContextResult> {
        self.instrument("context", |snapshot, deadline| {
            context::run(snapshot, input, deadline)
                .map(|r| (r.constraints.len() + r.behavior.len(), r))
        })
    }

    fn instrument<T>(
        &self,
        strategy: &str,
        body: impl FnOnce(&Snapshot, &Deadline) -> Result<(usize, T)>,
    ) -> Result<T> {
        let query_id = Uuid::new_v4().to_string();
        let deadline = Deadline::start();
        self.publish(Event::QueryReceived {
            query_id: query_id.clone(),
            strategy: strategy.to_string(),
            received_at: Utc::now(),
        });

        let snapshot = self.snapshot();
        match body(&snapshot, &deadline) {
            Ok((total_results, result)) => {
                self.publish(Event::QueryCompleted {
                    query_id,
                    strategy: strategy.to_string(),
                    total_results,
                    duration_ms: deadline.elapsed_ms(),
                    completed_at: Utc::now(),
                });
                Ok(result)
            }
            Err(err) => {
                log::debug!("query {strategy} failed: {err}");
                self.publish(Event::QueryFailed {
                    query_id,
                    strategy: strategy.to_string(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                    duration_ms: deadline.elapsed_ms(),
                    failed_at: Utc::now(),
                });
                Err(err)
            }
        }
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("QueryEngine")
            .field("nodes", &snapshot.graph.node_count())
            .field("edges", &snapshot.graph.edge_count())
            .field("semantic", &snapshot.supports_semantic())
            .finish()
    }
}
