//! Records handed to the admission API by the host glue.
//!
//! Entities are addressed by their host object id (`u16`). Translation to
//! store ids happens inside the backends; nothing here carries one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host object id assigned by the game server.
pub type ObjectId = u16;

/// Capture frame (simulation tick) supplied by the host.
pub type Frame = u32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
    /// Elevation
    pub z: f64,
}

impl Position3D {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Planar distance, ignoring elevation.
    #[must_use]
    pub fn distance_2d(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.hypot(dy)
    }

    pub(crate) fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

// =============================================================================
// Mission and world
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableSlots {
    pub east: u16,
    pub west: u16,
    pub independent: u16,
    pub civilian: u16,
    pub logic: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideFriendly {
    pub east_west: bool,
    pub east_independent: bool,
    pub west_independent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub name: String,
    pub workshop_id: String,
}

/// A recording session. `id` is assigned by the backend at StartMission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: u32,
    pub mission_name: String,
    pub briefing_name: String,
    pub mission_name_source: String,
    pub on_load_name: String,
    pub author: String,
    pub server_name: String,
    pub server_profile: String,
    pub start_time: DateTime<Utc>,
    /// Milliseconds between capture frames
    pub capture_delay: f32,
    pub addon_version: String,
    pub extension_version: String,
    pub extension_build: String,
    pub tag: String,
    pub playable_slots: PlayableSlots,
    pub side_friendly: SideFriendly,
    pub addons: Vec<Addon>,
}

/// Terrain descriptor, unique by `world_name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct World {
    pub id: u32,
    pub author: String,
    pub workshop_id: String,
    pub display_name: String,
    pub world_name: String,
    pub world_size: f32,
    pub latitude: f32,
    pub longitude: f32,
}

// =============================================================================
// Entities and state samples
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Soldier {
    pub object_id: ObjectId,
    pub join_time: DateTime<Utc>,
    pub join_frame: Frame,
    pub unit_name: String,
    pub group_id: String,
    pub side: String,
    pub is_player: bool,
    pub role_description: String,
    pub class_name: String,
    pub display_name: String,
    pub player_uid: String,
    /// Raw squad parameter array as sent by the host
    pub squad_params: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldierScores {
    pub infantry_kills: u8,
    pub vehicle_kills: u8,
    pub armor_kills: u8,
    pub air_kills: u8,
    pub deaths: u8,
    pub total_score: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldierState {
    pub soldier_object_id: ObjectId,
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub position: Position3D,
    pub bearing: u16,
    pub lifestate: u8,
    pub in_vehicle: bool,
    pub in_vehicle_object_id: Option<ObjectId>,
    pub vehicle_role: String,
    pub unit_name: String,
    pub is_player: bool,
    pub current_role: String,
    pub has_stable_vitals: bool,
    pub is_dragged_carried: bool,
    pub stance: String,
    pub group_id: String,
    pub side: String,
    pub scores: SoldierScores,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub object_id: ObjectId,
    pub join_time: DateTime<Utc>,
    pub join_frame: Frame,
    pub ocap_type: String,
    pub class_name: String,
    pub display_name: String,
    pub customization: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleState {
    pub vehicle_object_id: ObjectId,
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub position: Position3D,
    pub bearing: u16,
    pub is_alive: bool,
    /// Crew as a JSON array of object ids
    pub crew: String,
    pub fuel: f32,
    pub damage: f32,
    pub locked: bool,
    pub engine_on: bool,
    pub side: String,
    pub vector_dir: String,
    pub vector_up: String,
    pub turret_azimuth: f32,
    pub turret_elevation: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub marker_name: String,
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub direction: f32,
    pub marker_type: String,
    pub text: String,
    /// Object id of the creating player, -1 for system markers
    pub owner_id: i32,
    pub color: String,
    /// `"[w,h]"`
    pub size: String,
    pub side: String,
    pub position: Position3D,
    pub shape: String,
    pub alpha: f32,
    pub brush: String,
}

/// Marker movement, addressed by marker name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerState {
    pub marker_name: String,
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub position: Position3D,
    pub direction: f32,
    pub alpha: f32,
}

/// Removal of a named marker at a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerDeletion {
    pub marker_name: String,
    pub capture_frame: Frame,
}

impl MarkerDeletion {
    #[must_use]
    pub fn new(marker_name: impl Into<String>, capture_frame: Frame) -> Self {
        Self {
            marker_name: marker_name.into(),
            capture_frame,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiredEvent {
    pub soldier_object_id: ObjectId,
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub weapon: String,
    pub magazine: String,
    pub firing_mode: String,
    pub start_position: Position3D,
    pub end_position: Position3D,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub position: Position3D,
    pub frame: Frame,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileHit {
    pub capture_frame: Frame,
    pub position: Position3D,
    pub soldier_object_id: Option<ObjectId>,
    pub vehicle_object_id: Option<ObjectId>,
    pub components_hit: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub firer_object_id: ObjectId,
    pub vehicle_object_id: Option<ObjectId>,
    pub weapon: String,
    pub weapon_display: String,
    pub magazine_display: String,
    pub muzzle_display: String,
    pub simulation_type: String,
    pub magazine_icon: String,
    pub trajectory: Vec<TrajectoryPoint>,
    pub hits: Vec<ProjectileHit>,
}

impl ProjectileEvent {
    /// Bullets render as fire lines; everything else as a moving marker.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        if self.simulation_type.is_empty() {
            self.weapon == "throw"
        } else {
            self.simulation_type != "shotBullet"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub name: String,
    pub message: String,
    pub extra_data: serde_json::Map<String, serde_json::Value>,
}

/// Hit on a soldier or vehicle. Both ids resolve soldier first, then vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub victim_object_id: ObjectId,
    pub shooter_object_id: ObjectId,
    pub event_text: String,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub victim_object_id: ObjectId,
    pub killer_object_id: ObjectId,
    pub event_text: String,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    /// `None` for system messages
    pub sender_object_id: Option<ObjectId>,
    pub channel: String,
    pub from_name: String,
    pub sender_name: String,
    pub message: String,
    pub player_uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub sender_object_id: Option<ObjectId>,
    pub radio: String,
    pub radio_type: String,
    pub start_end: String,
    pub channel: i8,
    pub is_additional: bool,
    pub frequency: f32,
    pub code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFpsEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub fps_average: f32,
    pub fps_min: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ace3DeathEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub soldier_object_id: ObjectId,
    pub reason: String,
    pub last_damage_source_object_id: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ace3UnconsciousEvent {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub soldier_object_id: ObjectId,
    pub is_unconscious: bool,
}

/// Mission clock synchronisation sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeState {
    pub time: DateTime<Utc>,
    pub capture_frame: Frame,
    pub system_time_utc: String,
    pub mission_date: String,
    pub time_multiplier: f32,
    pub mission_time: f32,
}
