//! Queued rows: one type per relational table.
//!
//! A row owns its host record, the mission id stamped at admission, and the
//! entity slots it references. The writer asks each row whether its slots are
//! resolved before binding it to the table's INSERT statement.

use chrono::{DateTime, Utc};
use rusqlite::{CachedStatement, Connection, Transaction, params};

use crate::cache::{EntityRef, EntityTarget, RefState};
use crate::model::{
    Ace3DeathEvent, Ace3UnconsciousEvent, ChatEvent, GeneralEvent, KillEvent, Marker, Mission,
    Position3D, ProjectileEvent, RadioEvent, ServerFpsEvent, Soldier, SoldierState, Vehicle,
    VehicleState, World,
};
use crate::queue::QueueKind;

/// Whether a row's entity references can be bound now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Ready,
    /// An entity registration has not committed yet
    Pending,
    /// An entity registration will never be written
    Orphaned,
}

pub(crate) trait Row: Clone + Send + Sync + 'static {
    const KIND: QueueKind;
    const INSERT_SQL: &'static str;

    fn resolution(&self) -> Resolution {
        Resolution::Ready
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()>;

    /// Extra statements in the same transaction, after this row's insert.
    fn after_insert(&self, _tx: &Transaction<'_>) -> rusqlite::Result<()> {
        Ok(())
    }

    /// Called once the batch holding this row has committed.
    fn committed(&self, _row_id: i64) {}
}

fn resolve_refs<'a>(refs: impl IntoIterator<Item = &'a EntityRef>) -> Resolution {
    let mut pending = false;
    for slot in refs {
        match slot.state() {
            RefState::Detached => return Resolution::Orphaned,
            RefState::Pending => pending = true,
            RefState::Resolved(_) => {}
        }
    }
    if pending {
        Resolution::Pending
    } else {
        Resolution::Ready
    }
}

fn millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

// =============================================================================
// Missions
// =============================================================================

/// Worlds are unique by name; an existing row is kept as is.
pub(crate) const WORLD_INSERT_SQL: &str = "INSERT OR IGNORE INTO worlds
    (world_name, display_name, author, workshop_id, world_size, latitude, longitude, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const MISSION_INSERT_SQL: &str = "INSERT INTO missions
    (id, world_id, mission_name, briefing_name, mission_name_source, on_load_name, author,
     server_name, server_profile, start_time, capture_delay, addon_version, extension_version,
     extension_build, tag, playable_slots, side_friendly, addons)
    VALUES (?1, (SELECT id FROM worlds WHERE world_name = ?2), ?3, ?4, ?5, ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)";

fn to_json<T: serde::Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn insert_world(stmt: &mut CachedStatement<'_>, world: &World) -> rusqlite::Result<()> {
    stmt.execute(params![
        world.world_name,
        world.display_name,
        world.author,
        world.workshop_id,
        world.world_size,
        world.latitude,
        world.longitude,
        Utc::now().timestamp_millis(),
    ])?;
    Ok(())
}

/// Insert `mission` under its own id. The world row must already exist.
pub(crate) fn insert_mission(
    conn: &Connection,
    mission: &Mission,
    world: &World,
) -> rusqlite::Result<()> {
    conn.prepare_cached(MISSION_INSERT_SQL)?.execute(params![
        mission.id,
        world.world_name,
        mission.mission_name,
        mission.briefing_name,
        mission.mission_name_source,
        mission.on_load_name,
        mission.author,
        mission.server_name,
        mission.server_profile,
        millis(&mission.start_time),
        mission.capture_delay,
        mission.addon_version,
        mission.extension_version,
        mission.extension_build,
        mission.tag,
        to_json(&mission.playable_slots)?,
        to_json(&mission.side_friendly)?,
        to_json(&mission.addons)?,
    ])?;
    Ok(())
}

/// A mission started while the store refused commits. Its id was assigned at
/// start, so rows stamped with it wait behind this one in drain order.
#[derive(Debug, Clone)]
pub(crate) struct MissionRow {
    pub mission: Mission,
    pub world: World,
}

impl Row for MissionRow {
    const KIND: QueueKind = QueueKind::Missions;
    const INSERT_SQL: &'static str = WORLD_INSERT_SQL;

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        insert_world(stmt, &self.world)
    }

    fn after_insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        insert_mission(tx, &self.mission, &self.world)
    }

    fn committed(&self, _row_id: i64) {
        tracing::info!(
            mission_id = self.mission.id,
            mission = %self.mission.mission_name,
            "deferred mission registered"
        );
    }
}

// =============================================================================
// Entity registrations
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct SoldierRow {
    pub mission_id: u32,
    pub slot: EntityRef,
    pub soldier: Soldier,
}

impl Row for SoldierRow {
    const KIND: QueueKind = QueueKind::Soldiers;
    const INSERT_SQL: &'static str = "INSERT INTO soldiers
        (mission_id, join_time, join_frame, object_id, unit_name, group_id, side, is_player,
         role_description, class_name, display_name, player_uid, squad_params)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let s = &self.soldier;
        stmt.execute(params![
            self.mission_id,
            millis(&s.join_time),
            s.join_frame,
            s.object_id,
            s.unit_name,
            s.group_id,
            s.side,
            s.is_player,
            s.role_description,
            s.class_name,
            s.display_name,
            s.player_uid,
            s.squad_params,
        ])?;
        Ok(())
    }

    fn committed(&self, row_id: i64) {
        self.slot.resolve(row_id);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VehicleRow {
    pub mission_id: u32,
    pub slot: EntityRef,
    pub vehicle: Vehicle,
}

impl Row for VehicleRow {
    const KIND: QueueKind = QueueKind::Vehicles;
    const INSERT_SQL: &'static str = "INSERT INTO vehicles
        (mission_id, join_time, join_frame, object_id, ocap_type, class_name, display_name,
         customization)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let v = &self.vehicle;
        stmt.execute(params![
            self.mission_id,
            millis(&v.join_time),
            v.join_frame,
            v.object_id,
            v.ocap_type,
            v.class_name,
            v.display_name,
            v.customization,
        ])?;
        Ok(())
    }

    fn committed(&self, row_id: i64) {
        self.slot.resolve(row_id);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MarkerRow {
    pub mission_id: u32,
    pub slot: EntityRef,
    pub marker: Marker,
}

impl Row for MarkerRow {
    const KIND: QueueKind = QueueKind::Markers;
    const INSERT_SQL: &'static str = "INSERT INTO markers
        (mission_id, time, capture_frame, marker_name, direction, marker_type, text, owner_id,
         color, size, side, pos_x, pos_y, pos_z, shape, alpha, brush)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let m = &self.marker;
        stmt.execute(params![
            self.mission_id,
            millis(&m.time),
            m.capture_frame,
            m.marker_name,
            m.direction,
            m.marker_type,
            m.text,
            m.owner_id,
            m.color,
            m.size,
            m.side,
            m.position.x,
            m.position.y,
            m.position.z,
            m.shape,
            m.alpha,
            m.brush,
        ])?;
        Ok(())
    }

    fn committed(&self, row_id: i64) {
        self.slot.resolve(row_id);
    }
}

// =============================================================================
// State samples
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct SoldierStateRow {
    pub mission_id: u32,
    pub soldier: EntityRef,
    pub state: SoldierState,
}

impl Row for SoldierStateRow {
    const KIND: QueueKind = QueueKind::SoldierStates;
    const INSERT_SQL: &'static str = "INSERT INTO soldier_states
        (mission_id, soldier_id, time, capture_frame, pos_x, pos_y, pos_z, bearing, lifestate,
         in_vehicle, in_vehicle_object_id, vehicle_role, unit_name, is_player, current_role,
         has_stable_vitals, is_dragged_carried, stance, group_id, side,
         score_infantry_kills, score_vehicle_kills, score_armor_kills, score_air_kills,
         score_deaths, score_total)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)";

    fn resolution(&self) -> Resolution {
        resolve_refs([&self.soldier])
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let s = &self.state;
        stmt.execute(params![
            self.mission_id,
            self.soldier.id(),
            millis(&s.time),
            s.capture_frame,
            s.position.x,
            s.position.y,
            s.position.z,
            s.bearing,
            s.lifestate,
            s.in_vehicle,
            s.in_vehicle_object_id,
            s.vehicle_role,
            s.unit_name,
            s.is_player,
            s.current_role,
            s.has_stable_vitals,
            s.is_dragged_carried,
            s.stance,
            s.group_id,
            s.side,
            s.scores.infantry_kills,
            s.scores.vehicle_kills,
            s.scores.armor_kills,
            s.scores.air_kills,
            s.scores.deaths,
            s.scores.total_score,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VehicleStateRow {
    pub mission_id: u32,
    pub vehicle: EntityRef,
    pub state: VehicleState,
}

impl Row for VehicleStateRow {
    const KIND: QueueKind = QueueKind::VehicleStates;
    const INSERT_SQL: &'static str = "INSERT INTO vehicle_states
        (mission_id, vehicle_id, time, capture_frame, pos_x, pos_y, pos_z, bearing, is_alive,
         crew, fuel, damage, locked, engine_on, side, vector_dir, vector_up, turret_azimuth,
         turret_elevation)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19)";

    fn resolution(&self) -> Resolution {
        resolve_refs([&self.vehicle])
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let s = &self.state;
        stmt.execute(params![
            self.mission_id,
            self.vehicle.id(),
            millis(&s.time),
            s.capture_frame,
            s.position.x,
            s.position.y,
            s.position.z,
            s.bearing,
            s.is_alive,
            s.crew,
            s.fuel,
            s.damage,
            s.locked,
            s.engine_on,
            s.side,
            s.vector_dir,
            s.vector_up,
            s.turret_azimuth,
            s.turret_elevation,
        ])?;
        Ok(())
    }
}

/// Marker movement, or a deletion (alpha 0) that also flags the marker row.
#[derive(Debug, Clone)]
pub(crate) struct MarkerStateRow {
    pub mission_id: u32,
    pub marker: EntityRef,
    pub time: DateTime<Utc>,
    pub capture_frame: u32,
    pub position: Position3D,
    pub direction: f32,
    pub alpha: f32,
    pub deletes_marker: bool,
}

impl Row for MarkerStateRow {
    const KIND: QueueKind = QueueKind::MarkerStates;
    const INSERT_SQL: &'static str = "INSERT INTO marker_states
        (mission_id, marker_id, time, capture_frame, pos_x, pos_y, pos_z, direction, alpha)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    fn resolution(&self) -> Resolution {
        resolve_refs([&self.marker])
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        stmt.execute(params![
            self.mission_id,
            self.marker.id(),
            millis(&self.time),
            self.capture_frame,
            self.position.x,
            self.position.y,
            self.position.z,
            self.direction,
            self.alpha,
        ])?;
        Ok(())
    }

    fn after_insert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        if self.deletes_marker {
            tx.prepare_cached("UPDATE markers SET is_deleted = 1 WHERE id = ?1")?
                .execute([self.marker.id()])?;
        }
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone)]
pub(crate) struct ProjectileRow {
    pub mission_id: u32,
    pub firer: EntityRef,
    pub vehicle: Option<EntityRef>,
    pub event: ProjectileEvent,
}

impl Row for ProjectileRow {
    const KIND: QueueKind = QueueKind::ProjectileEvents;
    const INSERT_SQL: &'static str = "INSERT INTO projectile_events
        (mission_id, firer_id, vehicle_id, time, capture_frame, weapon, weapon_display,
         magazine_display, muzzle_display, simulation_type, magazine_icon, trajectory, hits)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

    fn resolution(&self) -> Resolution {
        resolve_refs(std::iter::once(&self.firer).chain(self.vehicle.as_ref()))
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        let trajectory = serde_json::to_string(&e.trajectory)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        let hits = serde_json::to_string(&e.hits)
            .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
        stmt.execute(params![
            self.mission_id,
            self.firer.id(),
            self.vehicle.as_ref().and_then(EntityRef::id),
            millis(&e.time),
            e.capture_frame,
            e.weapon,
            e.weapon_display,
            e.magazine_display,
            e.muzzle_display,
            e.simulation_type,
            e.magazine_icon,
            trajectory,
            hits,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GeneralEventRow {
    pub mission_id: u32,
    pub event: GeneralEvent,
}

impl Row for GeneralEventRow {
    const KIND: QueueKind = QueueKind::GeneralEvents;
    const INSERT_SQL: &'static str = "INSERT INTO general_events
        (mission_id, time, capture_frame, name, message, extra_data)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        let extra = serde_json::Value::Object(e.extra_data.clone()).to_string();
        stmt.execute(params![
            self.mission_id,
            millis(&e.time),
            e.capture_frame,
            e.name,
            e.message,
            extra,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct KillEventRow {
    pub mission_id: u32,
    pub victim: EntityTarget,
    pub killer: EntityTarget,
    pub event: KillEvent,
}

impl Row for KillEventRow {
    const KIND: QueueKind = QueueKind::KillEvents;
    const INSERT_SQL: &'static str = "INSERT INTO kill_events
        (mission_id, time, capture_frame, victim_soldier_id, victim_vehicle_id,
         killer_soldier_id, killer_vehicle_id, event_text, distance)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    fn resolution(&self) -> Resolution {
        resolve_refs([self.victim.slot(), self.killer.slot()])
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            millis(&e.time),
            e.capture_frame,
            self.victim.soldier_id(),
            self.victim.vehicle_id(),
            self.killer.soldier_id(),
            self.killer.vehicle_id(),
            e.event_text,
            e.distance,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ChatEventRow {
    pub mission_id: u32,
    pub sender: Option<EntityRef>,
    pub event: ChatEvent,
}

impl Row for ChatEventRow {
    const KIND: QueueKind = QueueKind::ChatEvents;
    const INSERT_SQL: &'static str = "INSERT INTO chat_events
        (mission_id, soldier_id, time, capture_frame, channel, from_name, sender_name, message,
         player_uid)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    fn resolution(&self) -> Resolution {
        resolve_refs(self.sender.as_ref())
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            self.sender.as_ref().and_then(EntityRef::id),
            millis(&e.time),
            e.capture_frame,
            e.channel,
            e.from_name,
            e.sender_name,
            e.message,
            e.player_uid,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RadioEventRow {
    pub mission_id: u32,
    pub sender: Option<EntityRef>,
    pub event: RadioEvent,
}

impl Row for RadioEventRow {
    const KIND: QueueKind = QueueKind::RadioEvents;
    const INSERT_SQL: &'static str = "INSERT INTO radio_events
        (mission_id, soldier_id, time, capture_frame, radio, radio_type, start_end, channel,
         is_additional, frequency, code)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

    fn resolution(&self) -> Resolution {
        resolve_refs(self.sender.as_ref())
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            self.sender.as_ref().and_then(EntityRef::id),
            millis(&e.time),
            e.capture_frame,
            e.radio,
            e.radio_type,
            e.start_end,
            e.channel,
            e.is_additional,
            e.frequency,
            e.code,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerFpsRow {
    pub mission_id: u32,
    pub event: ServerFpsEvent,
}

impl Row for ServerFpsRow {
    const KIND: QueueKind = QueueKind::ServerFpsEvents;
    const INSERT_SQL: &'static str = "INSERT INTO server_fps_events
        (mission_id, time, capture_frame, fps_average, fps_min)
        VALUES (?1, ?2, ?3, ?4, ?5)";

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            millis(&e.time),
            e.capture_frame,
            e.fps_average,
            e.fps_min,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Ace3DeathRow {
    pub mission_id: u32,
    pub soldier: EntityRef,
    pub last_damage_source: Option<EntityRef>,
    pub event: Ace3DeathEvent,
}

impl Row for Ace3DeathRow {
    const KIND: QueueKind = QueueKind::Ace3DeathEvents;
    const INSERT_SQL: &'static str = "INSERT INTO ace3_death_events
        (mission_id, soldier_id, time, capture_frame, reason, last_damage_source_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    fn resolution(&self) -> Resolution {
        resolve_refs(std::iter::once(&self.soldier).chain(self.last_damage_source.as_ref()))
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            self.soldier.id(),
            millis(&e.time),
            e.capture_frame,
            e.reason,
            self.last_damage_source.as_ref().and_then(EntityRef::id),
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Ace3UnconsciousRow {
    pub mission_id: u32,
    pub soldier: EntityRef,
    pub event: Ace3UnconsciousEvent,
}

impl Row for Ace3UnconsciousRow {
    const KIND: QueueKind = QueueKind::Ace3UnconsciousEvents;
    const INSERT_SQL: &'static str = "INSERT INTO ace3_unconscious_events
        (mission_id, soldier_id, time, capture_frame, is_unconscious)
        VALUES (?1, ?2, ?3, ?4, ?5)";

    fn resolution(&self) -> Resolution {
        resolve_refs([&self.soldier])
    }

    fn insert(&self, stmt: &mut CachedStatement<'_>) -> rusqlite::Result<()> {
        let e = &self.event;
        stmt.execute(params![
            self.mission_id,
            self.soldier.id(),
            millis(&e.time),
            e.capture_frame,
            e.is_unconscious,
        ])?;
        Ok(())
    }
}
