//! Content-group metrics and observability module.
//!
//! Counts sibling synchronization, locale-resolved reads, translations built
//! and writes that were rolled back.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Counters for content-group operations.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Number of bulk sibling updates issued
    sibling_syncs: AtomicUsize,

    /// Number of sibling rows touched by those updates
    sibling_rows: AtomicUsize,

    /// Number of queries compiled with an active locale filter
    resolved_queries: AtomicUsize,

    /// Number of translation rows built by the factory
    translations_built: AtomicUsize,

    /// Number of create/update operations that were rolled back
    failed_writes: AtomicUsize,
}

/// Global metrics instance (initialized lazily)
static METRICS: OnceLock<SyncMetrics> = OnceLock::new();

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the global metrics instance.
    pub fn global() -> &'static SyncMetrics {
        METRICS.get_or_init(SyncMetrics::new)
    }

    /// Record one bulk sibling update that touched `rows` rows.
    pub fn record_sibling_sync(&self, rows: usize) {
        self.sibling_syncs.fetch_add(1, Ordering::Relaxed);
        self.sibling_rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_resolved_query(&self) {
        self.resolved_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translation_built(&self) {
        self.translations_built.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_write(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sibling_syncs(&self) -> usize {
        self.sibling_syncs.load(Ordering::Relaxed)
    }

    pub fn sibling_rows(&self) -> usize {
        self.sibling_rows.load(Ordering::Relaxed)
    }

    pub fn resolved_queries(&self) -> usize {
        self.resolved_queries.load(Ordering::Relaxed)
    }

    pub fn translations_built(&self) -> usize {
        self.translations_built.load(Ordering::Relaxed)
    }

    pub fn failed_writes(&self) -> usize {
        self.failed_writes.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let syncs = self.sibling_syncs();
        let rows = self.sibling_rows();
        let avg_rows_per_sync = if syncs > 0 {
            rows as f64 / syncs as f64
        } else {
            0.0
        };

        MetricsReport {
            sibling_syncs: syncs,
            sibling_rows: rows,
            avg_rows_per_sync,
            resolved_queries: self.resolved_queries(),
            translations_built: self.translations_built(),
            failed_writes: self.failed_writes(),
        }
    }
}

/// Snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub sibling_syncs: usize,
    pub sibling_rows: usize,
    /// Average group fan-out per sync (0 when nothing was synced)
    pub avg_rows_per_sync: f64,
    pub resolved_queries: usize,
    pub translations_built: usize,
    pub failed_writes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sibling_sync() {
        let metrics = SyncMetrics::new();
        metrics.record_sibling_sync(2);
        metrics.record_sibling_sync(0);
        assert_eq!(metrics.sibling_syncs(), 2);
        assert_eq!(metrics.sibling_rows(), 2);
    }

    #[test]
    fn test_report_empty() {
        let report = SyncMetrics::new().report();
        assert_eq!(report.sibling_syncs, 0);
        assert_eq!(report.avg_rows_per_sync, 0.0);
        assert_eq!(report.failed_writes, 0);
    }

    #[test]
    fn test_report_average_fan_out() {
        let metrics = SyncMetrics::new();
        metrics.record_sibling_sync(3);
        metrics.record_sibling_sync(1);
        metrics.record_resolved_query();
        metrics.record_translation_built();
        metrics.record_failed_write();

        let report = metrics.report();
        assert_eq!(report.avg_rows_per_sync, 2.0);
        assert_eq!(report.resolved_queries, 1);
        assert_eq!(report.translations_built, 1);
        assert_eq!(report.failed_writes, 1);
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(SyncMetrics::new().report()).unwrap();
        assert_eq!(json["sibling_syncs"], 0);
        assert!(json.get("avg_rows_per_sync").is_some());
    }

    #[test]
    fn test_global_returns_same_instance() {
        assert!(std::ptr::eq(SyncMetrics::global(), SyncMetrics::global()));
    }
}
