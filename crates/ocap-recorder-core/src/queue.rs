//! Per-kind FIFO buffers between the admission API and the batched writer.
//!
//! Producers only [`TypedQueue::push`]. The writer is the single consumer:
//! it swaps the contents out with [`TypedQueue::get_and_empty`] and, if the
//! commit fails, puts the snapshot back in front with
//! [`TypedQueue::requeue`]. All operations hold the lock for O(1) amortised
//! work per element and never wait on I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Queue / table identity, in writer drain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Missions started while the store was not writable
    Missions,
    Soldiers,
    Vehicles,
    Markers,
    SoldierStates,
    VehicleStates,
    MarkerStates,
    ProjectileEvents,
    GeneralEvents,
    KillEvents,
    ChatEvents,
    RadioEvents,
    ServerFpsEvents,
    Ace3DeathEvents,
    Ace3UnconsciousEvents,
}

impl QueueKind {
    pub const COUNT: usize = 15;

    /// Missions, then entity registrations, so every later queue can
    /// resolve its foreign keys.
    pub const DRAIN_ORDER: [Self; Self::COUNT] = [
        Self::Missions,
        Self::Soldiers,
        Self::Vehicles,
        Self::Markers,
        Self::SoldierStates,
        Self::VehicleStates,
        Self::MarkerStates,
        Self::ProjectileEvents,
        Self::GeneralEvents,
        Self::KillEvents,
        Self::ChatEvents,
        Self::RadioEvents,
        Self::ServerFpsEvents,
        Self::Ace3DeathEvents,
        Self::Ace3UnconsciousEvents,
    ];

    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Missions => "missions",
            Self::Soldiers => "soldiers",
            Self::Vehicles => "vehicles",
            Self::Markers => "markers",
            Self::SoldierStates => "soldier_states",
            Self::VehicleStates => "vehicle_states",
            Self::MarkerStates => "marker_states",
            Self::ProjectileEvents => "projectile_events",
            Self::GeneralEvents => "general_events",
            Self::KillEvents => "kill_events",
            Self::ChatEvents => "chat_events",
            Self::RadioEvents => "radio_events",
            Self::ServerFpsEvents => "server_fps_events",
            Self::Ace3DeathEvents => "ace3_death_events",
            Self::Ace3UnconsciousEvents => "ace3_unconscious_events",
        }
    }

    /// Registration queues: missions and the entities that reference only
    /// their mission.
    #[must_use]
    pub const fn is_registration(self) -> bool {
        matches!(
            self,
            Self::Missions | Self::Soldiers | Self::Vehicles | Self::Markers
        )
    }

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Homogeneous FIFO with snapshot-drain semantics
#[derive(Debug)]
pub struct TypedQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for TypedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypedQueue<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: T) {
        self.lock().push(item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Swap the contents for an empty buffer and return them.
    #[must_use]
    pub fn get_and_empty(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Put an uncommitted snapshot back in front of anything pushed since.
    pub fn requeue(&self, mut snapshot: Vec<T>) {
        if snapshot.is_empty() {
            return;
        }
        let mut items = self.lock();
        snapshot.append(&mut items);
        *items = snapshot;
    }
}

/// Depth of every queue at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths(BTreeMap<QueueKind, usize>);

impl QueueDepths {
    pub fn set(&mut self, kind: QueueKind, depth: usize) {
        self.0.insert(kind, depth);
    }

    /// Depth of one queue, 0 for kinds the backend does not queue.
    #[must_use]
    pub fn get(&self, kind: QueueKind) -> usize {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QueueKind, usize)> + '_ {
        self.0.iter().map(|(kind, depth)| (*kind, *depth))
    }
}
