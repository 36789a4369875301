use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing document lifecycle activity.
#[derive(Default)]
pub struct PortalMetrics {
    documents_uploaded: AtomicU64,
    documents_deleted: AtomicU64,
    compensating_deletes: AtomicU64,
    orphaned_blobs: AtomicU64,
    background_failures: AtomicU64,
}

impl PortalMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document whose row and blob were both persisted.
    pub fn record_upload(&self) {
        self.documents_uploaded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a document row removed by the removal coordinator.
    pub fn record_delete(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blob deleted because its row could not be written.
    pub fn record_compensation(&self) {
        self.compensating_deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a blob left behind after a failed storage delete.
    pub fn record_orphaned_blob(&self) {
        self.orphaned_blobs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fire-and-forget task that ended in an error.
    pub fn record_background_failure(&self) {
        self.background_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            compensating_deletes: self.compensating_deletes.load(Ordering::Relaxed),
            orphaned_blobs: self.orphaned_blobs.load(Ordering::Relaxed),
            background_failures: self.background_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of lifecycle counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents uploaded since startup.
    pub documents_uploaded: u64,
    /// Documents deleted since startup.
    pub documents_deleted: u64,
    /// Blobs removed to undo a failed row insert.
    pub compensating_deletes: u64,
    /// Blobs that could not be removed during document deletion.
    pub orphaned_blobs: u64,
    /// Search indexing or activity tasks that failed.
    pub background_failures: u64,
}
