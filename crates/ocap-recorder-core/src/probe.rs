//! Failure probe: the three predicates that gate admission and the writer.
//!
//! - `db valid`: the relational store is open and usable
//! - `should save local`: the backend fell back to local files
//! - `inserts paused`: a local snapshot is being taken, drop admissions and
//!   hold the writer

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct FailureProbe {
    db_valid: AtomicBool,
    save_local: AtomicBool,
    inserts_paused: AtomicBool,
    consecutive_failures: AtomicU32,
}

/// Point-in-time copy of the probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    pub db_valid: bool,
    pub should_save_local: bool,
    pub inserts_paused: bool,
    pub consecutive_failures: u32,
}

impl FailureProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_db_valid(&self) -> bool {
        self.db_valid.load(Ordering::Acquire)
    }

    pub fn set_db_valid(&self, valid: bool) {
        self.db_valid.store(valid, Ordering::Release);
    }

    #[must_use]
    pub fn should_save_local(&self) -> bool {
        self.save_local.load(Ordering::Acquire)
    }

    pub fn set_should_save_local(&self, save_local: bool) {
        self.save_local.store(save_local, Ordering::Release);
    }

    #[must_use]
    pub fn inserts_paused(&self) -> bool {
        self.inserts_paused.load(Ordering::Acquire)
    }

    pub fn set_inserts_paused(&self, paused: bool) {
        self.inserts_paused.store(paused, Ordering::Release);
    }

    /// Pause inserts until the returned guard drops.
    #[must_use]
    pub fn pause_inserts(&self) -> InsertsPausedGuard<'_> {
        self.set_inserts_paused(true);
        InsertsPausedGuard { probe: self }
    }

    /// The writer may contact the store.
    #[must_use]
    pub fn writer_may_commit(&self) -> bool {
        self.is_db_valid() && !self.inserts_paused()
    }

    /// Returns the new consecutive failure count.
    pub fn record_commit_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_commit_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            db_valid: self.is_db_valid(),
            should_save_local: self.should_save_local(),
            inserts_paused: self.inserts_paused(),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

/// Clears `inserts paused` on drop
#[derive(Debug)]
pub struct InsertsPausedGuard<'a> {
    probe: &'a FailureProbe,
}

impl Drop for InsertsPausedGuard<'_> {
    fn drop(&mut self) {
        self.probe.set_inserts_paused(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_probe_is_invalid_and_unpaused() {
        let probe = FailureProbe::new();
        assert_eq!(probe.snapshot(), ProbeSnapshot::default());
        assert!(!probe.writer_may_commit());
    }

    #[test]
    fn pause_guard_restores_on_drop() {
        let probe = FailureProbe::new();
        probe.set_db_valid(true);
        assert!(probe.writer_may_commit());
        {
            let _guard = probe.pause_inserts();
            assert!(probe.inserts_paused());
            assert!(!probe.writer_may_commit());
        }
        assert!(!probe.inserts_paused());
        assert!(probe.writer_may_commit());
    }

    #[test]
    fn failure_counter_resets_on_success() {
        let probe = FailureProbe::new();
        assert_eq!(probe.record_commit_failure(), 1);
        assert_eq!(probe.record_commit_failure(), 2);
        probe.record_commit_success();
        assert_eq!(probe.consecutive_failures(), 0);
    }
}
