//! Writer metrics hook.
//!
//! Lock-free counters updated by the batched writer and read by whatever
//! observability layer the host wires up. Only the last full-tick duration
//! and per-kind batch figures are tracked here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::QueueKind;

#[derive(Debug, Default)]
struct KindCounters {
    last_batch: AtomicU64,
    committed_rows: AtomicU64,
    committed_batches: AtomicU64,
    failed_batches: AtomicU64,
    dropped_rows: AtomicU64,
}

#[derive(Debug, Default)]
pub struct WriterMetrics {
    last_write_nanos: AtomicU64,
    completed_ticks: AtomicU64,
    kinds: [KindCounters; QueueKind::COUNT],
}

/// Per-kind counters at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMetrics {
    pub kind: QueueKind,
    pub last_batch: u64,
    pub committed_rows: u64,
    pub committed_batches: u64,
    pub failed_batches: u64,
    pub dropped_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub last_write_duration: Duration,
    pub completed_ticks: u64,
    pub kinds: Vec<KindMetrics>,
}

impl WriterMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, kind: QueueKind) -> &KindCounters {
        &self.kinds[kind.index()]
    }

    pub(crate) fn record_tick(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.last_write_nanos.store(nanos, Ordering::Release);
        self.completed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, kind: QueueKind, rows: usize) {
        let counters = self.counters(kind);
        counters.last_batch.store(rows as u64, Ordering::Release);
        counters
            .committed_rows
            .fetch_add(rows as u64, Ordering::Relaxed);
        counters.committed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, kind: QueueKind, rows: usize) {
        let counters = self.counters(kind);
        counters.last_batch.store(rows as u64, Ordering::Release);
        counters.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, kind: QueueKind, rows: usize) {
        self.counters(kind)
            .dropped_rows
            .fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Duration of the most recently completed full-tick drain.
    #[must_use]
    pub fn last_write_duration(&self) -> Duration {
        Duration::from_nanos(self.last_write_nanos.load(Ordering::Acquire))
    }

    /// Size of the last batch the writer attempted for `kind`.
    #[must_use]
    pub fn last_batch(&self, kind: QueueKind) -> u64 {
        self.counters(kind).last_batch.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn completed_ticks(&self) -> u64 {
        self.completed_ticks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn kind(&self, kind: QueueKind) -> KindMetrics {
        let counters = self.counters(kind);
        KindMetrics {
            kind,
            last_batch: counters.last_batch.load(Ordering::Acquire),
            committed_rows: counters.committed_rows.load(Ordering::Relaxed),
            committed_batches: counters.committed_batches.load(Ordering::Relaxed),
            failed_batches: counters.failed_batches.load(Ordering::Relaxed),
            dropped_rows: counters.dropped_rows.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            last_write_duration: self.last_write_duration(),
            completed_ticks: self.completed_ticks(),
            kinds: QueueKind::DRAIN_ORDER
                .iter()
                .map(|kind| self.kind(*kind))
                .collect(),
        }
    }
}
