//! Filters, validation, and deadlines shared by every query.

use crate::error::{QueryError, Result};
use kdd_domain::{GraphNode, Kind, Layer};
use std::time::{Duration, Instant};

pub(crate) const MAX_DEPTH: usize = 5;

/// Filters accepted by every query.
#[derive(Debug, Clone)]
pub struct QueryFilters {
    pub include_kinds: Vec<Kind>,
    pub include_layers: Vec<Layer>,
    /// Exclude results reached through a layer-violation edge.
    pub respect_layers: bool,
    pub limit: usize,
    pub min_score: f32,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            include_kinds: Vec::new(),
            include_layers: Vec::new(),
            respect_layers: true,
            limit: 10,
            min_score: 0.0,
        }
    }
}

impl QueryFilters {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > 100 {
            return Err(QueryError::InvalidParams(format!(
                "limit {} out of range 1..=100",
                self.limit
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(QueryError::InvalidParams(format!(
                "min_score {} out of range 0..=1",
                self.min_score
            )));
        }
        Ok(())
    }

    #[must_use]
    pub(crate) fn matches(&self, node: &GraphNode) -> bool {
        if !self.include_kinds.is_empty() && !self.include_kinds.contains(&node.kind) {
            return false;
        }
        if !self.include_layers.is_empty() && !self.include_layers.contains(&node.layer) {
            return false;
        }
        true
    }
}

pub(crate) fn validate_depth(depth: usize) -> Result<()> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(QueryError::InvalidDepth(depth));
    }
    Ok(())
}

pub(crate) fn validate_query_text(text: &str) -> Result<()> {
    if text.trim().chars().count() < 3 {
        return Err(QueryError::QueryTooShort);
    }
    Ok(())
}

/// Soft/hard deadline pair carried by every query.
///
/// At the soft deadline a query returns what it has with `partial = true`;
/// at the hard deadline it aborts with `TIMEOUT`.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    soft: Duration,
    hard: Duration,
}

impl Deadline {
    pub const DEFAULT_SOFT: Duration = Duration::from_millis(300);
    pub const DEFAULT_HARD: Duration = Duration::from_secs(2);

    #[must_use]
    pub fn start() -> Self {
        Self::with_limits(Self::DEFAULT_SOFT, Self::DEFAULT_HARD)
    }

    #[must_use]
    pub fn with_limits(soft: Duration, hard: Duration) -> Self {
        Self {
            started: Instant::now(),
            soft,
            hard,
        }
    }

    #[must_use]
    pub fn soft_exceeded(&self) -> bool {
        self.started.elapsed() >= self.soft
    }

    pub fn check_hard(&self) -> Result<()> {
        if self.started.elapsed() >= self.hard {
            return Err(QueryError::Timeout);
        }
        Ok(())
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// `[{kind}] {title-or-id}` snippet used in scored results.
#[must_use]
pub(crate) fn node_snippet(node: &GraphNode) -> String {
    let title = node
        .indexed_fields
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty());
    match title {
        Some(title) => format!("[{}] {title}", node.kind),
        None => format!("[{}] {}", node.kind, node.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_bounds() {
        let mut f = QueryFilters::default();
        assert!(f.validate().is_ok());
        f.limit = 0;
        assert!(f.validate().is_err());
        f.limit = 101;
        assert!(f.validate().is_err());
        f.limit = 100;
        assert!(f.validate().is_ok());
    }

    #[test]
    fn min_score_bounds() {
        let mut f = QueryFilters::default();
        f.min_score = 1.1;
        assert!(f.validate().is_err());
        f.min_score = -0.1;
        assert!(f.validate().is_err());
    }

    #[test]
    fn depth_bounds() {
        assert!(validate_depth(0).is_err());
        assert!(validate_depth(1).is_ok());
        assert!(validate_depth(5).is_ok());
        assert!(validate_depth(6).is_err());
    }

    #[test]
    fn short_query_rejected() {
        assert_eq!(validate_query_text("ab"), Err(QueryError::QueryTooShort));
        assert!(validate_query_text("abc").is_ok());
    }
}
