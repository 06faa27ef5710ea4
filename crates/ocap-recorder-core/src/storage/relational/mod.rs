//! Relational backend: admission into typed queues, batched writes to SQLite.
//!
//! Admission never touches the store. Each call stamps the row with the
//! active mission id, resolves host ids through the caches, and pushes onto
//! the matching queue; the [`writer::BatchWriter`] task does the rest.
//!
//! When the configured database cannot be opened, the backend runs on an
//! in-memory store, raises `should save local`, and periodically snapshots
//! that store to `<outputDir>/<database>_fallback.db`.

mod rows;
mod schema;
mod store;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use self::rows::{
    Ace3DeathRow, Ace3UnconsciousRow, ChatEventRow, GeneralEventRow, KillEventRow,
    MarkerRow, MarkerStateRow, MissionRow, ProjectileRow, RadioEventRow, ServerFpsRow, SoldierRow,
    SoldierStateRow, VehicleRow, VehicleStateRow,
};
use self::store::SqliteStore;
use self::writer::BatchWriter;
use super::{Backend, Dependencies};
use crate::cache::{CachedSoldier, CachedVehicle, EntityRef};
use crate::config::{Config, StorageKind};
use crate::error::{AdmissionError, Result, StorageError};
use crate::model::{
    Ace3DeathEvent, Ace3UnconsciousEvent, ChatEvent, FiredEvent, GeneralEvent, HitEvent,
    KillEvent, Marker, MarkerDeletion, MarkerState, Mission, ObjectId, ProjectileEvent,
    RadioEvent, ServerFpsEvent, Soldier, SoldierState, TimeState, Vehicle, VehicleState, World,
};
use crate::queue::{QueueDepths, QueueKind, TypedQueue};

pub use self::store::StoreLocation;
pub use self::writer::TickReport;

/// One queue per relational table
#[derive(Debug, Default)]
pub struct Queues {
    pub(crate) missions: TypedQueue<MissionRow>,
    pub(crate) soldiers: TypedQueue<SoldierRow>,
    pub(crate) vehicles: TypedQueue<VehicleRow>,
    pub(crate) markers: TypedQueue<MarkerRow>,
    pub(crate) soldier_states: TypedQueue<SoldierStateRow>,
    pub(crate) vehicle_states: TypedQueue<VehicleStateRow>,
    pub(crate) marker_states: TypedQueue<MarkerStateRow>,
    pub(crate) projectile_events: TypedQueue<ProjectileRow>,
    pub(crate) general_events: TypedQueue<GeneralEventRow>,
    pub(crate) kill_events: TypedQueue<KillEventRow>,
    pub(crate) chat_events: TypedQueue<ChatEventRow>,
    pub(crate) radio_events: TypedQueue<RadioEventRow>,
    pub(crate) server_fps_events: TypedQueue<ServerFpsRow>,
    pub(crate) ace3_death_events: TypedQueue<Ace3DeathRow>,
    pub(crate) ace3_unconscious_events: TypedQueue<Ace3UnconsciousRow>,
}

impl Queues {
    #[must_use]
    pub fn len(&self, kind: QueueKind) -> usize {
        match kind {
            QueueKind::Missions => self.missions.len(),
            QueueKind::Soldiers => self.soldiers.len(),
            QueueKind::Vehicles => self.vehicles.len(),
            QueueKind::Markers => self.markers.len(),
            QueueKind::SoldierStates => self.soldier_states.len(),
            QueueKind::VehicleStates => self.vehicle_states.len(),
            QueueKind::MarkerStates => self.marker_states.len(),
            QueueKind::ProjectileEvents => self.projectile_events.len(),
            QueueKind::GeneralEvents => self.general_events.len(),
            QueueKind::KillEvents => self.kill_events.len(),
            QueueKind::ChatEvents => self.chat_events.len(),
            QueueKind::RadioEvents => self.radio_events.len(),
            QueueKind::ServerFpsEvents => self.server_fps_events.len(),
            QueueKind::Ace3DeathEvents => self.ace3_death_events.len(),
            QueueKind::Ace3UnconsciousEvents => self.ace3_unconscious_events.len(),
        }
    }

    #[must_use]
    pub fn depths(&self) -> QueueDepths {
        let mut depths = QueueDepths::default();
        for kind in QueueKind::DRAIN_ORDER {
            depths.set(kind, self.len(kind));
        }
        depths
    }
}

/// Settings the relational backend reads at construction
#[derive(Debug, Clone)]
pub struct RelationalSettings {
    /// `None` opens an in-memory store directly (no fallback flag)
    pub database: Option<PathBuf>,
    pub target: String,
    pub drain_interval: Duration,
    pub dump_interval: Duration,
    pub dump_path: PathBuf,
}

impl RelationalSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let relational = &config.storage.relational;
        let database = relational.database_path();
        let stem = database
            .as_ref()
            .and_then(|path| path.file_stem())
            .map_or_else(|| "ocap".to_string(), |s| s.to_string_lossy().to_string());
        Self {
            database,
            target: relational.display_target(),
            drain_interval: relational.drain_interval,
            dump_interval: config.storage.sqlite.dump_interval,
            dump_path: config
                .storage
                .memory
                .output_dir
                .join(format!("{stem}_fallback.db")),
        }
    }
}

struct Running {
    writer: Arc<BatchWriter>,
    shutdown_tx: watch::Sender<bool>,
    writer_task: JoinHandle<()>,
    dump_task: Option<JoinHandle<()>>,
}

pub struct RelationalBackend {
    settings: RelationalSettings,
    deps: Dependencies,
    queues: Arc<Queues>,
    ready: AtomicBool,
    /// Highest mission id handed out, seeded from the store at init
    last_mission_id: AtomicU32,
    running: tokio::sync::Mutex<Option<Running>>,
}

impl RelationalBackend {
    #[must_use]
    pub fn new(settings: RelationalSettings, deps: Dependencies) -> Self {
        Self {
            settings,
            deps,
            queues: Arc::new(Queues::default()),
            ready: AtomicBool::new(false),
            last_mission_id: AtomicU32::new(0),
            running: tokio::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    /// Where the open store lives, `None` before init and after close.
    pub async fn store_location(&self) -> Option<StoreLocation> {
        self.running
            .lock()
            .await
            .as_ref()
            .map(|running| running.writer.store().location().clone())
    }

    /// Run one drain cycle now, serialised with the background writer.
    pub async fn flush(&self) -> Option<TickReport> {
        let writer = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.writer))?;
        Some(writer.drain_cycle(None).await)
    }

    /// Snapshot the store to the fallback file now.
    pub async fn dump_now(&self) -> Result<Option<PathBuf>> {
        let writer = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.writer));
        let Some(writer) = writer else {
            return Ok(None);
        };
        dump_store(writer.store(), &self.deps, &self.settings.dump_path).await?;
        Ok(Some(self.settings.dump_path.clone()))
    }

    async fn open_store(&self) -> Result<Arc<SqliteStore>> {
        let Some(path) = self.settings.database.clone() else {
            return Ok(Arc::new(SqliteStore::open_in_memory()?));
        };
        match SqliteStore::open_file(path.clone()).await {
            Ok(store) => Ok(Arc::new(store)),
            Err(err) => {
                tracing::warn!(
                    target_db = %self.settings.target,
                    path = %path.display(),
                    error = %err,
                    "relational store unavailable, falling back to in-memory store with local dumps"
                );
                self.deps.probe.set_should_save_local(true);
                Ok(Arc::new(SqliteStore::open_in_memory()?))
            }
        }
    }

    /// Admission gate: closed backend, paused inserts and idle missions all
    /// turn the call into a no-op.
    fn admit(&self) -> Option<u32> {
        if self.deps.probe.inserts_paused() {
            return None;
        }
        self.admit_registration()
    }

    /// Entity registrations ignore the insert pause: dropping one would
    /// orphan every later state for that entity. The writer still holds
    /// them back while commits are gated.
    fn admit_registration(&self) -> Option<u32> {
        if !self.ready.load(Ordering::Acquire) {
            return None;
        }
        self.deps.mission.mission_id()
    }
}

async fn dump_store(store: &SqliteStore, deps: &Dependencies, path: &std::path::Path) -> Result<()> {
    let _paused = deps.probe.pause_inserts();
    store.vacuum_into(path.to_path_buf()).await?;
    tracing::info!(path = %path.display(), "fallback store dumped");
    Ok(())
}

fn spawn_dumper(
    store: Arc<SqliteStore>,
    deps: Dependencies,
    path: PathBuf,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = dump_store(&store, &deps, &path).await {
                        tracing::warn!(error = %err, "fallback dump failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

impl Backend for RelationalBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Relational
    }

    async fn init(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let store = self.open_store().await?;
        let last = store.max_mission_id().await?;
        self.last_mission_id.fetch_max(last, Ordering::AcqRel);
        self.deps.probe.set_db_valid(true);

        let writer = Arc::new(BatchWriter::new(
            Arc::clone(&self.queues),
            Arc::clone(&store),
            Arc::clone(&self.deps.probe),
            Arc::clone(&self.deps.metrics),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let writer_task =
            Arc::clone(&writer).spawn(self.settings.drain_interval, shutdown_rx.clone());
        let dump_task = self.deps.probe.should_save_local().then(|| {
            spawn_dumper(
                Arc::clone(&store),
                self.deps.clone(),
                self.settings.dump_path.clone(),
                self.settings.dump_interval,
                shutdown_rx,
            )
        });

        tracing::info!(
            location = ?store.location(),
            drain_interval_ms = self.settings.drain_interval.as_millis() as u64,
            save_local = self.deps.probe.should_save_local(),
            "relational backend ready"
        );

        *running = Some(Running {
            writer,
            shutdown_tx,
            writer_task,
            dump_task,
        });
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        self.ready.store(false, Ordering::Release);

        let _ = running.shutdown_tx.send(true);
        if let Some(task) = running.dump_task {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "fallback dump task ended abnormally");
            }
        }
        running
            .writer_task
            .await
            .map_err(|e| StorageError::Join(e.to_string()))?;

        if self.deps.probe.should_save_local() {
            dump_store(running.writer.store(), &self.deps, &self.settings.dump_path).await?;
        }
        self.deps.probe.set_db_valid(false);

        let left = self.queues.depths().total();
        if left > 0 {
            tracing::warn!(rows = left, "relational backend closed with undrained rows");
        } else {
            tracing::info!("relational backend closed");
        }
        Ok(())
    }

    async fn start_mission(&self, mission: &mut Mission, world: &mut World) -> Result<()> {
        let store = self
            .running
            .lock()
            .await
            .as_ref()
            .map(|running| Arc::clone(running.writer.store()));

        let Some(store) = store else {
            return Err(StorageError::NotInitialised.into());
        };

        mission.id = self.last_mission_id.fetch_add(1, Ordering::AcqRel) + 1;
        if self.deps.probe.is_db_valid() {
            world.id = store.insert_mission(mission.clone(), world.clone()).await?;
        } else {
            tracing::warn!(
                mission_id = mission.id,
                "store not writable, mission queued behind the writer"
            );
            self.queues.missions.push(MissionRow {
                mission: mission.clone(),
                world: world.clone(),
            });
        }
        Ok(())
    }

    async fn end_mission(&self) -> Result<()> {
        Ok(())
    }

    fn add_soldier(&self, soldier: Soldier) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let slot = EntityRef::pending();
        match self.admit_registration() {
            Some(mission_id) => self.queues.soldiers.push(SoldierRow {
                mission_id,
                slot: slot.clone(),
                soldier: soldier.clone(),
            }),
            None => slot.detach(),
        }
        self.deps.entities.add_soldier(soldier, slot);
        Ok(())
    }

    fn add_vehicle(&self, vehicle: Vehicle) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        let slot = EntityRef::pending();
        match self.admit_registration() {
            Some(mission_id) => self.queues.vehicles.push(VehicleRow {
                mission_id,
                slot: slot.clone(),
                vehicle: vehicle.clone(),
            }),
            None => slot.detach(),
        }
        self.deps.entities.add_vehicle(vehicle, slot);
        Ok(())
    }

    fn add_marker(&self, marker: Marker) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        if marker.marker_name.is_empty() {
            return Err(AdmissionError::InvalidRecord {
                kind: "marker",
                reason: "empty marker name".to_string(),
            }
            .into());
        }
        let Some(mission_id) = self.admit_registration() else {
            return Ok(());
        };
        let slot = EntityRef::pending();
        self.deps.markers.set(marker.marker_name.clone(), slot.clone());
        self.queues.markers.push(MarkerRow {
            mission_id,
            slot,
            marker,
        });
        Ok(())
    }

    fn record_soldier_state(&self, state: SoldierState) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(soldier) = self.deps.entities.soldier_ref(state.soldier_object_id) else {
            tracing::trace!(object_id = state.soldier_object_id, "soldier state for unknown soldier");
            return Ok(());
        };
        self.queues.soldier_states.push(SoldierStateRow {
            mission_id,
            soldier,
            state,
        });
        Ok(())
    }

    fn record_vehicle_state(&self, state: VehicleState) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(vehicle) = self.deps.entities.vehicle_ref(state.vehicle_object_id) else {
            tracing::trace!(object_id = state.vehicle_object_id, "vehicle state for unknown vehicle");
            return Ok(());
        };
        self.queues.vehicle_states.push(VehicleStateRow {
            mission_id,
            vehicle,
            state,
        });
        Ok(())
    }

    fn record_marker_state(&self, state: MarkerState) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(marker) = self.deps.markers.get(&state.marker_name) else {
            tracing::trace!(marker = %state.marker_name, "state for unknown marker");
            return Ok(());
        };
        self.queues.marker_states.push(MarkerStateRow {
            mission_id,
            marker,
            time: state.time,
            capture_frame: state.capture_frame,
            position: state.position,
            direction: state.direction,
            alpha: state.alpha,
            deletes_marker: false,
        });
        Ok(())
    }

    fn delete_marker(&self, deletion: MarkerDeletion) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(marker) = self.deps.markers.get(&deletion.marker_name) else {
            return Ok(());
        };
        self.queues.marker_states.push(MarkerStateRow {
            mission_id,
            marker,
            time: Utc::now(),
            capture_frame: deletion.capture_frame,
            position: Default::default(),
            direction: 0.0,
            alpha: 0.0,
            deletes_marker: true,
        });
        Ok(())
    }

    fn record_fired_event(&self, _event: FiredEvent) -> Result<()> {
        Ok(())
    }

    fn record_projectile_event(&self, event: ProjectileEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        if self.deps.probe.should_save_local() {
            return Ok(());
        }
        let Some(firer) = self.deps.entities.soldier_ref(event.firer_object_id) else {
            tracing::trace!(object_id = event.firer_object_id, "projectile from unknown firer");
            return Ok(());
        };
        let vehicle = match event.vehicle_object_id {
            Some(object_id) => match self.deps.entities.vehicle_ref(object_id) {
                Some(slot) => Some(slot),
                None => return Ok(()),
            },
            None => None,
        };
        self.queues.projectile_events.push(ProjectileRow {
            mission_id,
            firer,
            vehicle,
            event,
        });
        Ok(())
    }

    fn record_general_event(&self, event: GeneralEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        self.queues
            .general_events
            .push(GeneralEventRow { mission_id, event });
        Ok(())
    }

    fn record_hit_event(&self, _event: HitEvent) -> Result<()> {
        Ok(())
    }

    fn record_kill_event(&self, event: KillEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let entities = &self.deps.entities;
        let (Some(victim), Some(killer)) = (
            entities.target(event.victim_object_id),
            entities.target(event.killer_object_id),
        ) else {
            tracing::trace!(
                victim = event.victim_object_id,
                killer = event.killer_object_id,
                "kill event references unknown entity"
            );
            return Ok(());
        };
        self.queues.kill_events.push(KillEventRow {
            mission_id,
            victim,
            killer,
            event,
        });
        Ok(())
    }

    fn record_chat_event(&self, event: ChatEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let sender = match event.sender_object_id {
            Some(object_id) => match self.deps.entities.soldier_ref(object_id) {
                Some(slot) => Some(slot),
                None => return Ok(()),
            },
            None => None,
        };
        self.queues.chat_events.push(ChatEventRow {
            mission_id,
            sender,
            event,
        });
        Ok(())
    }

    fn record_radio_event(&self, event: RadioEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let sender = match event.sender_object_id {
            Some(object_id) => match self.deps.entities.soldier_ref(object_id) {
                Some(slot) => Some(slot),
                None => return Ok(()),
            },
            None => None,
        };
        self.queues.radio_events.push(RadioEventRow {
            mission_id,
            sender,
            event,
        });
        Ok(())
    }

    fn record_server_fps_event(&self, event: ServerFpsEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        self.queues
            .server_fps_events
            .push(ServerFpsRow { mission_id, event });
        Ok(())
    }

    fn record_ace3_death_event(&self, event: Ace3DeathEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(soldier) = self.deps.entities.soldier_ref(event.soldier_object_id) else {
            return Ok(());
        };
        let last_damage_source = match event.last_damage_source_object_id {
            Some(object_id) => match self.deps.entities.soldier_ref(object_id) {
                Some(slot) => Some(slot),
                None => return Ok(()),
            },
            None => None,
        };
        self.queues.ace3_death_events.push(Ace3DeathRow {
            mission_id,
            soldier,
            last_damage_source,
            event,
        });
        Ok(())
    }

    fn record_ace3_unconscious_event(&self, event: Ace3UnconsciousEvent) -> Result<()> {
        let Some(mission_id) = self.admit() else {
            return Ok(());
        };
        let Some(soldier) = self.deps.entities.soldier_ref(event.soldier_object_id) else {
            return Ok(());
        };
        self.queues
            .ace3_unconscious_events
            .push(Ace3UnconsciousRow {
                mission_id,
                soldier,
                event,
            });
        Ok(())
    }

    fn record_time_state(&self, _state: TimeState) -> Result<()> {
        Ok(())
    }

    fn get_soldier_by_object_id(&self, object_id: ObjectId) -> Option<CachedSoldier> {
        self.deps.entities.get_soldier(object_id)
    }

    fn get_vehicle_by_object_id(&self, object_id: ObjectId) -> Option<CachedVehicle> {
        self.deps.entities.get_vehicle(object_id)
    }

    fn get_marker_by_name(&self, name: &str) -> Option<EntityRef> {
        self.deps.markers.get(name)
    }

    fn queue_depths(&self) -> QueueDepths {
        self.queues.depths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RelationalSettings {
        RelationalSettings {
            database: None,
            target: "test".to_string(),
            drain_interval: Duration::from_secs(3600),
            dump_interval: Duration::from_secs(3600),
            dump_path: PathBuf::from("unused_fallback.db"),
        }
    }

    async fn ready_backend() -> (RelationalBackend, Dependencies) {
        let deps = Dependencies::default();
        let backend = RelationalBackend::new(settings(), deps.clone());
        backend.init().await.unwrap();
        let mut mission = Mission::default();
        let mut world = World::default();
        backend.start_mission(&mut mission, &mut world).await.unwrap();
        deps.mission.set_mission(mission, world);
        (backend, deps)
    }

    #[tokio::test]
    async fn closed_backend_ignores_admission() {
        let deps = Dependencies::default();
        let backend = RelationalBackend::new(settings(), deps.clone());
        backend
            .add_soldier(Soldier {
                object_id: 1,
                ..Soldier::default()
            })
            .unwrap();
        assert!(deps.entities.get_soldier(1).is_none());
        assert_eq!(backend.queue_depths().total(), 0);
    }

    #[tokio::test]
    async fn soldier_without_mission_is_cached_but_detached() {
        let deps = Dependencies::default();
        let backend = RelationalBackend::new(settings(), deps.clone());
        backend.init().await.unwrap();
        backend
            .add_soldier(Soldier {
                object_id: 9,
                ..Soldier::default()
            })
            .unwrap();
        let cached = backend.get_soldier_by_object_id(9).unwrap();
        assert_eq!(cached.id.state(), crate::cache::RefState::Detached);
        assert_eq!(backend.queues().len(QueueKind::Soldiers), 0);
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn paused_inserts_drop_admission() {
        let (backend, deps) = ready_backend().await;
        deps.probe.set_inserts_paused(true);
        backend
            .record_server_fps_event(ServerFpsEvent::default())
            .unwrap();
        assert_eq!(backend.queues().len(QueueKind::ServerFpsEvents), 0);
        deps.probe.set_inserts_paused(false);
        backend
            .record_server_fps_event(ServerFpsEvent::default())
            .unwrap();
        assert_eq!(backend.queues().len(QueueKind::ServerFpsEvents), 1);
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn paused_inserts_still_queue_registrations() {
        let (backend, deps) = ready_backend().await;
        let paused = deps.probe.pause_inserts();
        backend
            .add_soldier(Soldier {
                object_id: 5,
                ..Soldier::default()
            })
            .unwrap();
        backend
            .add_vehicle(Vehicle {
                object_id: 6,
                ..Vehicle::default()
            })
            .unwrap();
        backend
            .add_marker(Marker {
                marker_name: "obj".to_string(),
                ..Marker::default()
            })
            .unwrap();
        drop(paused);

        assert_eq!(backend.queues().len(QueueKind::Soldiers), 1);
        assert_eq!(backend.queues().len(QueueKind::Vehicles), 1);
        assert_eq!(backend.queues().len(QueueKind::Markers), 1);
        let soldier = backend.get_soldier_by_object_id(5).unwrap();
        assert_eq!(soldier.id.state(), crate::cache::RefState::Pending);

        let report = backend.flush().await.unwrap();
        assert_eq!(report.committed_rows(QueueKind::Soldiers), 1);
        assert!(soldier.id.id().is_some());
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn mission_ids_continue_past_the_store_while_invalid() {
        let (backend, deps) = ready_backend().await;
        let first = deps.mission.mission_id().unwrap();

        deps.probe.set_db_valid(false);
        let mut mission = Mission::default();
        backend
            .start_mission(&mut mission, &mut World::default())
            .await
            .unwrap();
        assert!(mission.id > first);
        assert_eq!(backend.queues().len(QueueKind::Missions), 1);

        // nothing commits while the store is invalid
        let report = backend.flush().await.unwrap();
        assert_eq!(report.skipped, QueueKind::COUNT);

        deps.probe.set_db_valid(true);
        let report = backend.flush().await.unwrap();
        assert_eq!(report.committed_rows(QueueKind::Missions), 1);

        let mut third = Mission::default();
        backend
            .start_mission(&mut third, &mut World::default())
            .await
            .unwrap();
        assert_eq!(third.id, mission.id + 1);
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn start_mission_before_init_is_an_error() {
        let backend = RelationalBackend::new(settings(), Dependencies::default());
        let err = backend
            .start_mission(&mut Mission::default(), &mut World::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Storage(StorageError::NotInitialised)
        ));
    }

    #[tokio::test]
    async fn chat_from_unknown_sender_is_dropped_but_system_chat_kept() {
        let (backend, _deps) = ready_backend().await;
        backend
            .record_chat_event(ChatEvent {
                sender_object_id: Some(77),
                ..ChatEvent::default()
            })
            .unwrap();
        backend.record_chat_event(ChatEvent::default()).unwrap();
        assert_eq!(backend.queues().len(QueueKind::ChatEvents), 1);
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_marker_name_is_an_admission_error() {
        let (backend, _deps) = ready_backend().await;
        let err = backend.add_marker(Marker::default()).unwrap_err();
        assert!(matches!(err, crate::Error::Admission(_)));
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn flush_before_init_is_none() {
        let backend = RelationalBackend::new(settings(), Dependencies::default());
        assert!(backend.flush().await.is_none());
        assert!(backend.store_location().await.is_none());
    }
}
