//! Batched writer: the single consumer of the relational queues.
//!
//! Every tick drains each queue in [`QueueKind::DRAIN_ORDER`], so deferred
//! missions and entity registrations commit before the rows that reference
//! them.
//! A batch that fails to commit goes back to the head of its queue untouched
//! and is retried on the next tick.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::Queues;
use super::rows::{Resolution, Row};
use super::store::SqliteStore;
use crate::metrics::WriterMetrics;
use crate::probe::FailureProbe;
use crate::queue::{QueueKind, TypedQueue};

/// Outcome of one drain cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Rows committed per kind
    pub committed: Vec<(QueueKind, usize)>,
    /// Kinds whose batch was rejected by the store and requeued
    pub failed: Vec<QueueKind>,
    /// Kinds held back because a referenced registration is still pending
    pub deferred: Vec<QueueKind>,
    /// Rows discarded because they reference an entity that is never written
    pub dropped: usize,
    /// Queues skipped because the probe forbids commits
    pub skipped: usize,
    /// Stop was observed before every queue was visited
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl TickReport {
    #[must_use]
    pub fn committed_rows(&self, kind: QueueKind) -> usize {
        self.committed
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, rows)| rows)
            .sum()
    }
}

pub(crate) struct BatchWriter {
    queues: Arc<Queues>,
    store: Arc<SqliteStore>,
    probe: Arc<FailureProbe>,
    metrics: Arc<WriterMetrics>,
    /// Held for the duration of a cycle
    cycle: tokio::sync::Mutex<()>,
}

impl BatchWriter {
    pub fn new(
        queues: Arc<Queues>,
        store: Arc<SqliteStore>,
        probe: Arc<FailureProbe>,
        metrics: Arc<WriterMetrics>,
    ) -> Self {
        Self {
            queues,
            store,
            probe,
            metrics,
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Run the tick loop until `shutdown` flips, then drain once more.
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = interval.tick() => {
                        self.drain_cycle(Some(&shutdown)).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("batched writer stopping, running final drain");
            let report = self.drain_cycle(None).await;
            tracing::info!(
                committed = report.committed.iter().map(|(_, n)| n).sum::<usize>(),
                failed = report.failed.len(),
                "batched writer exited"
            );
        })
    }

    /// Visit every queue once. With `stop`, returns early when it flips.
    pub async fn drain_cycle(&self, stop: Option<&watch::Receiver<bool>>) -> TickReport {
        let _cycle = self.cycle.lock().await;
        let started = Instant::now();
        let mut report = TickReport::default();
        let q = &self.queues;

        macro_rules! drain_in_order {
            ($($queue:ident),+ $(,)?) => {
                $(
                    if stop.is_some_and(|rx| *rx.borrow()) {
                        report.interrupted = true;
                        report.elapsed = started.elapsed();
                        return report;
                    }
                    self.drain(&q.$queue, &mut report).await;
                )+
            };
        }

        drain_in_order!(
            missions,
            soldiers,
            vehicles,
            markers,
            soldier_states,
            vehicle_states,
            marker_states,
            projectile_events,
            general_events,
            kill_events,
            chat_events,
            radio_events,
            server_fps_events,
            ace3_death_events,
            ace3_unconscious_events,
        );

        report.elapsed = started.elapsed();
        if report.skipped < QueueKind::COUNT {
            self.metrics.record_tick(report.elapsed);
        }
        report
    }

    async fn drain<R: Row>(&self, queue: &TypedQueue<R>, report: &mut TickReport) {
        if !self.probe.writer_may_commit() {
            report.skipped += 1;
            return;
        }

        let mut batch = queue.get_and_empty();
        if batch.is_empty() {
            return;
        }

        // prepare: discard orphans, hold the batch while a registration is pending
        let before = batch.len();
        batch.retain(|row| row.resolution() != Resolution::Orphaned);
        let orphaned = before - batch.len();
        if orphaned > 0 {
            report.dropped += orphaned;
            self.metrics.record_dropped(R::KIND, orphaned);
            tracing::debug!(
                kind = %R::KIND,
                dropped = orphaned,
                "dropped rows referencing unregistered entities"
            );
        }
        if batch.is_empty() {
            return;
        }
        if batch
            .iter()
            .any(|row| row.resolution() == Resolution::Pending)
        {
            tracing::trace!(kind = %R::KIND, batch = batch.len(), "waiting for entity registration");
            queue.requeue(batch);
            report.deferred.push(R::KIND);
            return;
        }

        let size = batch.len();
        let (batch, result) = self.store.insert_batch(batch).await;
        match result {
            Ok(row_ids) => {
                for (row, row_id) in batch.iter().zip(row_ids) {
                    row.committed(row_id);
                }
                self.probe.record_commit_success();
                self.metrics.record_commit(R::KIND, size);
                report.committed.push((R::KIND, size));
                tracing::trace!(kind = %R::KIND, batch = size, "batch committed");
            }
            Err(err) => {
                let failures = self.probe.record_commit_failure();
                self.metrics.record_failure(R::KIND, size);
                tracing::error!(
                    kind = %R::KIND,
                    batch = size,
                    consecutive_failures = failures,
                    error = %err,
                    "batch insert failed, requeued"
                );
                queue.requeue(batch);
                report.failed.push(R::KIND);
            }
        }
    }
}
