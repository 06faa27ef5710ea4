//! Local dump backend: keep the whole mission in memory, write one replay
//! file at mission end.
//!
//! Records are grouped per entity by host object id. The shared entity cache
//! still gets populated so lookups through [`Backend`] behave the same as on
//! the relational backend; here an entity's id *is* its object id, and
//! markers get sequential ids starting at 1.

pub mod export;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;

use super::{Backend, Dependencies};
use crate::cache::{CachedSoldier, CachedVehicle, EntityRef};
use crate::config::{Config, StorageKind};
use crate::error::{AdmissionError, Result, StorageError};
use crate::model::{
    Ace3DeathEvent, Ace3UnconsciousEvent, ChatEvent, FiredEvent, GeneralEvent, HitEvent,
    KillEvent, Marker, MarkerDeletion, MarkerState, Mission, ObjectId, ProjectileEvent,
    RadioEvent, ServerFpsEvent, Soldier, SoldierState, TimeState, Vehicle, VehicleState, World,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDumpSettings {
    pub output_dir: PathBuf,
    pub compress_output: bool,
}

impl LocalDumpSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.storage.memory.output_dir.clone(),
            compress_output: config.storage.memory.compress_output,
        }
    }
}

// =============================================================================
// Recording
// =============================================================================

#[derive(Debug, Clone)]
pub struct SoldierRecord {
    pub soldier: Soldier,
    pub states: Vec<SoldierState>,
    pub fired_events: Vec<FiredEvent>,
}

#[derive(Debug, Clone)]
pub struct VehicleRecord {
    pub vehicle: Vehicle,
    pub states: Vec<VehicleState>,
}

#[derive(Debug, Clone)]
pub struct MarkerRecord {
    pub id: i64,
    pub marker: Marker,
    pub states: Vec<MarkerState>,
    /// Frame of the deletion, if the marker was deleted
    pub end_frame: Option<u32>,
}

/// Everything captured for one mission
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub mission: Mission,
    pub world: World,
    pub soldiers: BTreeMap<ObjectId, SoldierRecord>,
    pub vehicles: BTreeMap<ObjectId, VehicleRecord>,
    pub markers: Vec<MarkerRecord>,
    marker_index: HashMap<String, usize>,
    last_marker_id: i64,
    pub general_events: Vec<GeneralEvent>,
    pub hit_events: Vec<HitEvent>,
    pub kill_events: Vec<KillEvent>,
    pub chat_events: Vec<ChatEvent>,
    pub radio_events: Vec<RadioEvent>,
    pub server_fps_events: Vec<ServerFpsEvent>,
    pub ace3_death_events: Vec<Ace3DeathEvent>,
    pub ace3_unconscious_events: Vec<Ace3UnconsciousEvent>,
    pub projectile_events: Vec<ProjectileEvent>,
    pub time_states: Vec<TimeState>,
}

impl Recording {
    #[must_use]
    pub fn new(mission: Mission, world: World) -> Self {
        Self {
            mission,
            world,
            ..Self::default()
        }
    }

    /// Add or replace a marker by name; returns its id.
    fn add_marker(&mut self, marker: Marker) -> i64 {
        self.last_marker_id += 1;
        let id = self.last_marker_id;
        let record = MarkerRecord {
            id,
            marker,
            states: Vec::new(),
            end_frame: None,
        };
        match self.marker_index.get(&record.marker.marker_name) {
            Some(&index) => self.markers[index] = record,
            None => {
                self.marker_index
                    .insert(record.marker.marker_name.clone(), self.markers.len());
                self.markers.push(record);
            }
        }
        id
    }

    fn marker_mut(&mut self, name: &str) -> Option<&mut MarkerRecord> {
        let index = *self.marker_index.get(name)?;
        self.markers.get_mut(index)
    }

    #[must_use]
    pub fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            soldiers: self.soldiers.len(),
            vehicles: self.vehicles.len(),
            markers: self.markers.len(),
            soldier_states: self.soldiers.values().map(|r| r.states.len()).sum(),
            vehicle_states: self.vehicles.values().map(|r| r.states.len()).sum(),
            marker_states: self.markers.iter().map(|r| r.states.len()).sum(),
            fired_events: self.soldiers.values().map(|r| r.fired_events.len()).sum(),
            projectile_events: self.projectile_events.len(),
            general_events: self.general_events.len(),
            hit_events: self.hit_events.len(),
            kill_events: self.kill_events.len(),
            chat_events: self.chat_events.len(),
            radio_events: self.radio_events.len(),
            server_fps_events: self.server_fps_events.len(),
            ace3_death_events: self.ace3_death_events.len(),
            ace3_unconscious_events: self.ace3_unconscious_events.len(),
            time_states: self.time_states.len(),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> ExportMetadata {
        let end_frame = export::end_frame(self);
        ExportMetadata {
            world_name: self.world.world_name.clone(),
            mission_name: self.mission.mission_name.clone(),
            mission_duration: f64::from(end_frame) * f64::from(self.mission.capture_delay)
                / 1000.0,
            tag: self.mission.tag.clone(),
        }
    }
}

/// Record counts of the active recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub soldiers: usize,
    pub vehicles: usize,
    pub markers: usize,
    pub soldier_states: usize,
    pub vehicle_states: usize,
    pub marker_states: usize,
    pub fired_events: usize,
    pub projectile_events: usize,
    pub general_events: usize,
    pub hit_events: usize,
    pub kill_events: usize,
    pub chat_events: usize,
    pub radio_events: usize,
    pub server_fps_events: usize,
    pub ace3_death_events: usize,
    pub ace3_unconscious_events: usize,
    pub time_states: usize,
}

/// Upload metadata for a replay file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub world_name: String,
    pub mission_name: String,
    /// Seconds
    pub mission_duration: f64,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub metadata: ExportMetadata,
}

// =============================================================================
// File output
// =============================================================================

/// `<mission name>_<YYYYMMDD_HHMMSS>.json[.zst]`, with spaces and colons
/// replaced by underscores.
#[must_use]
pub fn export_file_name(mission_name: &str, compress: bool) -> String {
    let name = mission_name.replace([' ', ':'], "_");
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    if compress {
        format!("{name}_{stamp}.json.zst")
    } else {
        format!("{name}_{stamp}.json")
    }
}

fn write_export(path: &Path, document: &serde_json::Value, compress: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec(document)?;
    let bytes = if compress {
        zstd::stream::encode_all(bytes.as_slice(), 3)
            .map_err(|e| StorageError::Export(e.to_string()))?
    } else {
        bytes
    };
    std::fs::write(path, bytes)?;
    Ok(())
}

async fn export_recording(
    recording: Recording,
    settings: &LocalDumpSettings,
) -> Result<ExportOutcome> {
    let path = settings.output_dir.join(export_file_name(
        &recording.mission.mission_name,
        settings.compress_output,
    ));
    let compress = settings.compress_output;
    let metadata = recording.metadata();
    let summary = recording.summary();

    let target = path.clone();
    tokio::task::spawn_blocking(move || {
        let document = export::build(&recording);
        write_export(&target, &document, compress)
    })
    .await
    .map_err(StorageError::from)??;

    tracing::info!(
        path = %path.display(),
        soldiers = summary.soldiers,
        vehicles = summary.vehicles,
        markers = summary.markers,
        duration_secs = metadata.mission_duration,
        "mission exported"
    );
    Ok(ExportOutcome { path, metadata })
}

// =============================================================================
// Backend
// =============================================================================

#[derive(Debug)]
pub struct LocalDumpBackend {
    settings: LocalDumpSettings,
    deps: Dependencies,
    ready: AtomicBool,
    recording: Mutex<Option<Recording>>,
    last_export: Mutex<Option<ExportOutcome>>,
}

impl LocalDumpBackend {
    #[must_use]
    pub fn new(settings: LocalDumpSettings, deps: Dependencies) -> Self {
        Self {
            settings,
            deps,
            ready: AtomicBool::new(false),
            recording: Mutex::new(None),
            last_export: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Recording>> {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the active recording; no-op when closed or idle.
    fn with_recording(&self, f: impl FnOnce(&mut Recording)) {
        if !self.ready.load(Ordering::Acquire) {
            return;
        }
        if let Some(recording) = self.lock().as_mut() {
            f(recording);
        }
    }

    /// Path and metadata of the most recent export.
    #[must_use]
    pub fn last_export(&self) -> Option<ExportOutcome> {
        self.last_export
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts for the active recording, `None` when idle.
    #[must_use]
    pub fn summary(&self) -> Option<RecordingSummary> {
        self.lock().as_ref().map(Recording::summary)
    }

    async fn export_active(&self) -> Result<Option<ExportOutcome>> {
        let Some(recording) = self.lock().take() else {
            return Ok(None);
        };
        let outcome = export_recording(recording, &self.settings).await?;
        *self.last_export.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome.clone());
        Ok(Some(outcome))
    }
}

impl Backend for LocalDumpBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::LocalFile
    }

    async fn init(&self) -> Result<()> {
        self.ready.store(true, Ordering::Release);
        tracing::info!(
            output_dir = %self.settings.output_dir.display(),
            compress = self.settings.compress_output,
            "local dump backend ready"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.ready.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.export_active().await?;
        tracing::info!("local dump backend closed");
        Ok(())
    }

    async fn start_mission(&self, mission: &mut Mission, world: &mut World) -> Result<()> {
        let mut recording = self.lock();
        if recording.is_some() {
            tracing::warn!("starting a mission over an unexported recording, discarding it");
        }
        *recording = Some(Recording::new(mission.clone(), world.clone()));
        Ok(())
    }

    async fn end_mission(&self) -> Result<()> {
        match self.export_active().await? {
            Some(_) => Ok(()),
            None => Err(StorageError::NoActiveMission.into()),
        }
    }

    fn add_soldier(&self, soldier: Soldier) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.deps.entities.add_soldier(
            soldier.clone(),
            EntityRef::resolved(i64::from(soldier.object_id)),
        );
        self.with_recording(|recording| {
            recording.soldiers.insert(
                soldier.object_id,
                SoldierRecord {
                    soldier,
                    states: Vec::new(),
                    fired_events: Vec::new(),
                },
            );
        });
        Ok(())
    }

    fn add_vehicle(&self, vehicle: Vehicle) -> Result<()> {
        if !self.ready.load(Ordering::Acquire) {
            return Ok(());
        }
        self.deps.entities.add_vehicle(
            vehicle.clone(),
            EntityRef::resolved(i64::from(vehicle.object_id)),
        );
        self.with_recording(|recording| {
            recording.vehicles.insert(
                vehicle.object_id,
                VehicleRecord {
                    vehicle,
                    states: Vec::new(),
                },
            );
        });
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
        let markers = &self.deps.markers;
        self.with_recording(|recording| {
            let name = marker.marker_name.clone();
            let id = recording.add_marker(marker);
            markers.set(name, EntityRef::resolved(id));
        });
        Ok(())
    }

    fn record_soldier_state(&self, state: SoldierState) -> Result<()> {
        self.with_recording(|recording| {
            if let Some(record) = recording.soldiers.get_mut(&state.soldier_object_id) {
                record.states.push(state);
            }
        });
        Ok(())
    }

    fn record_vehicle_state(&self, state: VehicleState) -> Result<()> {
        self.with_recording(|recording| {
            if let Some(record) = recording.vehicles.get_mut(&state.vehicle_object_id) {
                record.states.push(state);
            }
        });
        Ok(())
    }

    fn record_marker_state(&self, state: MarkerState) -> Result<()> {
        self.with_recording(|recording| {
            if let Some(record) = recording.marker_mut(&state.marker_name) {
                record.states.push(state);
            }
        });
        Ok(())
    }

    fn delete_marker(&self, deletion: MarkerDeletion) -> Result<()> {
        self.with_recording(|recording| {
            if let Some(record) = recording.marker_mut(&deletion.marker_name) {
                record.end_frame = Some(deletion.capture_frame);
            }
        });
        Ok(())
    }

    fn record_fired_event(&self, event: FiredEvent) -> Result<()> {
        self.with_recording(|recording| {
            if let Some(record) = recording.soldiers.get_mut(&event.soldier_object_id) {
                record.fired_events.push(event);
            }
        });
        Ok(())
    }

    fn record_projectile_event(&self, event: ProjectileEvent) -> Result<()> {
        self.with_recording(|recording| recording.projectile_events.push(event));
        Ok(())
    }

    fn record_general_event(&self, event: GeneralEvent) -> Result<()> {
        self.with_recording(|recording| recording.general_events.push(event));
        Ok(())
    }

    fn record_hit_event(&self, event: HitEvent) -> Result<()> {
        self.with_recording(|recording| recording.hit_events.push(event));
        Ok(())
    }

    fn record_kill_event(&self, event: KillEvent) -> Result<()> {
        self.with_recording(|recording| recording.kill_events.push(event));
        Ok(())
    }

    fn record_chat_event(&self, event: ChatEvent) -> Result<()> {
        self.with_recording(|recording| recording.chat_events.push(event));
        Ok(())
    }

    fn record_radio_event(&self, event: RadioEvent) -> Result<()> {
        self.with_recording(|recording| recording.radio_events.push(event));
        Ok(())
    }

    fn record_server_fps_event(&self, event: ServerFpsEvent) -> Result<()> {
        self.with_recording(|recording| recording.server_fps_events.push(event));
        Ok(())
    }

    fn record_ace3_death_event(&self, event: Ace3DeathEvent) -> Result<()> {
        self.with_recording(|recording| recording.ace3_death_events.push(event));
        Ok(())
    }

    fn record_ace3_unconscious_event(&self, event: Ace3UnconsciousEvent) -> Result<()> {
        self.with_recording(|recording| recording.ace3_unconscious_events.push(event));
        Ok(())
    }

    fn record_time_state(&self, state: TimeState) -> Result<()> {
        self.with_recording(|recording| recording.time_states.push(state));
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
}
