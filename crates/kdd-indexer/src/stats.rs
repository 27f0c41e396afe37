//! Aggregate outcome of an ingest run.

/// Per-run counters plus the per-file failures, reported by the
/// incremental driver.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub indexed: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub degraded: usize,
    pub errors: Vec<(String, String)>,
    pub full_scan: bool,
    pub time_ms: u64,
}

impl IngestReport {
    /// True when at least one document failed while others succeeded.
    #[must_use]
    pub fn partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn processed(&self) -> usize {
        self.indexed + self.up_to_date + self.skipped + self.errors.len()
    }
}
