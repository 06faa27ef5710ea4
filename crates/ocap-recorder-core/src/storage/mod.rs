//! Storage backends and the router that picks one from configuration.
//!
//! Every backend implements [`Backend`]: lifecycle hooks (init, close,
//! mission start/end), the synchronous admission surface called from the
//! host's callback threads, and lookups into the shared caches.
//! [`StorageBackend`] dispatches to the configured implementation.

pub mod local_dump;
pub mod null;
pub mod relational;

use std::sync::Arc;

use crate::cache::{CachedSoldier, CachedVehicle, EntityCache, EntityRef, MarkerCache};
use crate::config::{Config, StorageKind};
use crate::error::{Result, StorageError};
use crate::metrics::WriterMetrics;
use crate::mission::MissionContext;
use crate::model::{
    Ace3DeathEvent, Ace3UnconsciousEvent, ChatEvent, FiredEvent, GeneralEvent, HitEvent,
    KillEvent, Marker, MarkerDeletion, MarkerState, Mission, ObjectId, ProjectileEvent,
    RadioEvent, ServerFpsEvent, Soldier, SoldierState, TimeState, Vehicle, VehicleState, World,
};
use crate::queue::QueueDepths;

pub use self::local_dump::LocalDumpBackend;
pub use self::null::NullBackend;
pub use self::relational::RelationalBackend;

/// Shared state handed to the selected backend
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    pub entities: Arc<EntityCache>,
    pub markers: Arc<MarkerCache>,
    pub mission: Arc<MissionContext>,
    pub probe: Arc<crate::probe::FailureProbe>,
    pub metrics: Arc<WriterMetrics>,
}

impl Dependencies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// A recording sink.
///
/// Admission methods must not block on I/O: they run on the host's callback
/// threads. They return `Ok(())` for records that are dropped by policy
/// (closed backend, no mission, unknown entity) and `Err` only for records
/// that are malformed.
#[allow(async_fn_in_trait)]
pub trait Backend: Send + Sync {
    fn kind(&self) -> StorageKind;

    async fn init(&self) -> Result<()>;

    /// Stop background work and flush what can be flushed. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Register the mission; assigns `mission.id` (and `world.id` where the
    /// backend stores worlds).
    async fn start_mission(&self, mission: &mut Mission, world: &mut World) -> Result<()>;

    async fn end_mission(&self) -> Result<()>;

    fn add_soldier(&self, soldier: Soldier) -> Result<()>;
    fn add_vehicle(&self, vehicle: Vehicle) -> Result<()>;
    fn add_marker(&self, marker: Marker) -> Result<()>;

    fn record_soldier_state(&self, state: SoldierState) -> Result<()>;
    fn record_vehicle_state(&self, state: VehicleState) -> Result<()>;
    fn record_marker_state(&self, state: MarkerState) -> Result<()>;
    fn delete_marker(&self, deletion: MarkerDeletion) -> Result<()>;

    fn record_fired_event(&self, event: FiredEvent) -> Result<()>;
    fn record_projectile_event(&self, event: ProjectileEvent) -> Result<()>;
    fn record_general_event(&self, event: GeneralEvent) -> Result<()>;
    fn record_hit_event(&self, event: HitEvent) -> Result<()>;
    fn record_kill_event(&self, event: KillEvent) -> Result<()>;
    fn record_chat_event(&self, event: ChatEvent) -> Result<()>;
    fn record_radio_event(&self, event: RadioEvent) -> Result<()>;
    fn record_server_fps_event(&self, event: ServerFpsEvent) -> Result<()>;
    fn record_ace3_death_event(&self, event: Ace3DeathEvent) -> Result<()>;
    fn record_ace3_unconscious_event(&self, event: Ace3UnconsciousEvent) -> Result<()>;
    fn record_time_state(&self, state: TimeState) -> Result<()>;

    fn get_soldier_by_object_id(&self, object_id: ObjectId) -> Option<CachedSoldier>;
    fn get_vehicle_by_object_id(&self, object_id: ObjectId) -> Option<CachedVehicle>;
    fn get_marker_by_name(&self, name: &str) -> Option<EntityRef>;

    /// Rows admitted but not yet persisted. Backends without queues report
    /// all zeros.
    fn queue_depths(&self) -> QueueDepths {
        QueueDepths::default()
    }
}

// =============================================================================
// Router
// =============================================================================

/// The configured backend
pub enum StorageBackend {
    Relational(RelationalBackend),
    LocalDump(LocalDumpBackend),
    Null(NullBackend),
}

impl std::fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StorageBackend").field(&self.kind()).finish()
    }
}

/// Pick the backend named by `storage.type`.
pub fn build_backend(config: &Config, deps: Dependencies) -> Result<StorageBackend> {
    let backend = match &config.storage.kind {
        StorageKind::Relational => StorageBackend::Relational(RelationalBackend::new(
            relational::RelationalSettings::from_config(config),
            deps,
        )),
        StorageKind::LocalFile => StorageBackend::LocalDump(LocalDumpBackend::new(
            local_dump::LocalDumpSettings::from_config(config),
            deps,
        )),
        StorageKind::Null => StorageBackend::Null(NullBackend::new(deps)),
        StorageKind::Unknown(name) => {
            return Err(StorageError::UnknownBackend(name.clone()).into());
        }
    };
    tracing::debug!(kind = %backend.kind(), "storage backend selected");
    Ok(backend)
}

impl StorageBackend {
    #[must_use]
    pub fn as_relational(&self) -> Option<&RelationalBackend> {
        match self {
            Self::Relational(backend) => Some(backend),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_local_dump(&self) -> Option<&LocalDumpBackend> {
        match self {
            Self::LocalDump(backend) => Some(backend),
            _ => None,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            StorageBackend::Relational($backend) => $call,
            StorageBackend::LocalDump($backend) => $call,
            StorageBackend::Null($backend) => $call,
        }
    };
}

impl Backend for StorageBackend {
    fn kind(&self) -> StorageKind {
        dispatch!(self, b => b.kind())
    }

    async fn init(&self) -> Result<()> {
        dispatch!(self, b => b.init().await)
    }

    async fn close(&self) -> Result<()> {
        dispatch!(self, b => b.close().await)
    }

    async fn start_mission(&self, mission: &mut Mission, world: &mut World) -> Result<()> {
        dispatch!(self, b => b.start_mission(mission, world).await)
    }

    async fn end_mission(&self) -> Result<()> {
        dispatch!(self, b => b.end_mission().await)
    }

    fn add_soldier(&self, soldier: Soldier) -> Result<()> {
        dispatch!(self, b => b.add_soldier(soldier))
    }

    fn add_vehicle(&self, vehicle: Vehicle) -> Result<()> {
        dispatch!(self, b => b.add_vehicle(vehicle))
    }

    fn add_marker(&self, marker: Marker) -> Result<()> {
        dispatch!(self, b => b.add_marker(marker))
    }

    fn record_soldier_state(&self, state: SoldierState) -> Result<()> {
        dispatch!(self, b => b.record_soldier_state(state))
    }

    fn record_vehicle_state(&self, state: VehicleState) -> Result<()> {
        dispatch!(self, b => b.record_vehicle_state(state))
    }

    fn record_marker_state(&self, state: MarkerState) -> Result<()> {
        dispatch!(self, b => b.record_marker_state(state))
    }

    fn delete_marker(&self, deletion: MarkerDeletion) -> Result<()> {
        dispatch!(self, b => b.delete_marker(deletion))
    }

    fn record_fired_event(&self, event: FiredEvent) -> Result<()> {
        dispatch!(self, b => b.record_fired_event(event))
    }

    fn record_projectile_event(&self, event: ProjectileEvent) -> Result<()> {
        dispatch!(self, b => b.record_projectile_event(event))
    }

    fn record_general_event(&self, event: GeneralEvent) -> Result<()> {
        dispatch!(self, b => b.record_general_event(event))
    }

    fn record_hit_event(&self, event: HitEvent) -> Result<()> {
        dispatch!(self, b => b.record_hit_event(event))
    }

    fn record_kill_event(&self, event: KillEvent) -> Result<()> {
        dispatch!(self, b => b.record_kill_event(event))
    }

    fn record_chat_event(&self, event: ChatEvent) -> Result<()> {
        dispatch!(self, b => b.record_chat_event(event))
    }

    fn record_radio_event(&self, event: RadioEvent) -> Result<()> {
        dispatch!(self, b => b.record_radio_event(event))
    }

    fn record_server_fps_event(&self, event: ServerFpsEvent) -> Result<()> {
        dispatch!(self, b => b.record_server_fps_event(event))
    }

    fn record_ace3_death_event(&self, event: Ace3DeathEvent) -> Result<()> {
        dispatch!(self, b => b.record_ace3_death_event(event))
    }

    fn record_ace3_unconscious_event(&self, event: Ace3UnconsciousEvent) -> Result<()> {
        dispatch!(self, b => b.record_ace3_unconscious_event(event))
    }

    fn record_time_state(&self, state: TimeState) -> Result<()> {
        dispatch!(self, b => b.record_time_state(state))
    }

    fn get_soldier_by_object_id(&self, object_id: ObjectId) -> Option<CachedSoldier> {
        dispatch!(self, b => b.get_soldier_by_object_id(object_id))
    }

    fn get_vehicle_by_object_id(&self, object_id: ObjectId) -> Option<CachedVehicle> {
        dispatch!(self, b => b.get_vehicle_by_object_id(object_id))
    }

    fn get_marker_by_name(&self, name: &str) -> Option<EntityRef> {
        dispatch!(self, b => b.get_marker_by_name(name))
    }

    fn queue_depths(&self) -> QueueDepths {
        dispatch!(self, b => b.queue_depths())
    }
}
