//! Relational table layout.
//!
//! One table per entity/state/event kind. Every row carries `mission_id`;
//! rows that reference an entity carry its store id, never the host object
//! id. Times are unix milliseconds.

use rusqlite::Connection;

pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS worlds (
    id INTEGER PRIMARY KEY,
    world_name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    workshop_id TEXT NOT NULL DEFAULT '',
    world_size REAL NOT NULL DEFAULT 0,
    latitude REAL NOT NULL DEFAULT 0,
    longitude REAL NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS missions (
    id INTEGER PRIMARY KEY,
    world_id INTEGER NOT NULL REFERENCES worlds(id),
    mission_name TEXT NOT NULL,
    briefing_name TEXT NOT NULL DEFAULT '',
    mission_name_source TEXT NOT NULL DEFAULT '',
    on_load_name TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    server_name TEXT NOT NULL DEFAULT '',
    server_profile TEXT NOT NULL DEFAULT '',
    start_time INTEGER NOT NULL,
    capture_delay REAL NOT NULL DEFAULT 0,
    addon_version TEXT NOT NULL DEFAULT '',
    extension_version TEXT NOT NULL DEFAULT '',
    extension_build TEXT NOT NULL DEFAULT '',
    tag TEXT NOT NULL DEFAULT '',
    playable_slots TEXT NOT NULL DEFAULT '{}',
    side_friendly TEXT NOT NULL DEFAULT '{}',
    addons TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS soldiers (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    join_time INTEGER NOT NULL,
    join_frame INTEGER NOT NULL,
    object_id INTEGER NOT NULL,
    unit_name TEXT NOT NULL,
    group_id TEXT NOT NULL,
    side TEXT NOT NULL,
    is_player INTEGER NOT NULL,
    role_description TEXT NOT NULL,
    class_name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    player_uid TEXT NOT NULL,
    squad_params TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_soldiers_mission_object ON soldiers(mission_id, object_id);

CREATE TABLE IF NOT EXISTS soldier_states (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    soldier_id INTEGER NOT NULL REFERENCES soldiers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    pos_x REAL NOT NULL,
    pos_y REAL NOT NULL,
    pos_z REAL NOT NULL,
    bearing INTEGER NOT NULL,
    lifestate INTEGER NOT NULL,
    in_vehicle INTEGER NOT NULL,
    in_vehicle_object_id INTEGER,
    vehicle_role TEXT NOT NULL,
    unit_name TEXT NOT NULL,
    is_player INTEGER NOT NULL,
    current_role TEXT NOT NULL,
    has_stable_vitals INTEGER NOT NULL,
    is_dragged_carried INTEGER NOT NULL,
    stance TEXT NOT NULL,
    group_id TEXT NOT NULL,
    side TEXT NOT NULL,
    score_infantry_kills INTEGER NOT NULL,
    score_vehicle_kills INTEGER NOT NULL,
    score_armor_kills INTEGER NOT NULL,
    score_air_kills INTEGER NOT NULL,
    score_deaths INTEGER NOT NULL,
    score_total INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_soldier_states_frame ON soldier_states(soldier_id, capture_frame);

CREATE TABLE IF NOT EXISTS vehicles (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    join_time INTEGER NOT NULL,
    join_frame INTEGER NOT NULL,
    object_id INTEGER NOT NULL,
    ocap_type TEXT NOT NULL,
    class_name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    customization TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vehicle_states (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    vehicle_id INTEGER NOT NULL REFERENCES vehicles(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    pos_x REAL NOT NULL,
    pos_y REAL NOT NULL,
    pos_z REAL NOT NULL,
    bearing INTEGER NOT NULL,
    is_alive INTEGER NOT NULL,
    crew TEXT NOT NULL,
    fuel REAL NOT NULL,
    damage REAL NOT NULL,
    locked INTEGER NOT NULL,
    engine_on INTEGER NOT NULL,
    side TEXT NOT NULL,
    vector_dir TEXT NOT NULL,
    vector_up TEXT NOT NULL,
    turret_azimuth REAL NOT NULL,
    turret_elevation REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_vehicle_states_frame ON vehicle_states(vehicle_id, capture_frame);

CREATE TABLE IF NOT EXISTS markers (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    marker_name TEXT NOT NULL,
    direction REAL NOT NULL,
    marker_type TEXT NOT NULL,
    text TEXT NOT NULL,
    owner_id INTEGER NOT NULL,
    color TEXT NOT NULL,
    size TEXT NOT NULL,
    side TEXT NOT NULL,
    pos_x REAL NOT NULL,
    pos_y REAL NOT NULL,
    pos_z REAL NOT NULL,
    shape TEXT NOT NULL,
    alpha REAL NOT NULL,
    brush TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS marker_states (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    marker_id INTEGER NOT NULL REFERENCES markers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    pos_x REAL NOT NULL,
    pos_y REAL NOT NULL,
    pos_z REAL NOT NULL,
    direction REAL NOT NULL,
    alpha REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS projectile_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    firer_id INTEGER NOT NULL REFERENCES soldiers(id),
    vehicle_id INTEGER REFERENCES vehicles(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    weapon TEXT NOT NULL,
    weapon_display TEXT NOT NULL,
    magazine_display TEXT NOT NULL,
    muzzle_display TEXT NOT NULL,
    simulation_type TEXT NOT NULL,
    magazine_icon TEXT NOT NULL,
    trajectory TEXT NOT NULL,
    hits TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS general_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    name TEXT NOT NULL,
    message TEXT NOT NULL,
    extra_data TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kill_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    victim_soldier_id INTEGER REFERENCES soldiers(id),
    victim_vehicle_id INTEGER REFERENCES vehicles(id),
    killer_soldier_id INTEGER REFERENCES soldiers(id),
    killer_vehicle_id INTEGER REFERENCES vehicles(id),
    event_text TEXT NOT NULL,
    distance REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    soldier_id INTEGER REFERENCES soldiers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    channel TEXT NOT NULL,
    from_name TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    message TEXT NOT NULL,
    player_uid TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS radio_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    soldier_id INTEGER REFERENCES soldiers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    radio TEXT NOT NULL,
    radio_type TEXT NOT NULL,
    start_end TEXT NOT NULL,
    channel INTEGER NOT NULL,
    is_additional INTEGER NOT NULL,
    frequency REAL NOT NULL,
    code TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS server_fps_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    fps_average REAL NOT NULL,
    fps_min REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS ace3_death_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    soldier_id INTEGER NOT NULL REFERENCES soldiers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    reason TEXT NOT NULL,
    last_damage_source_id INTEGER REFERENCES soldiers(id)
);

CREATE TABLE IF NOT EXISTS ace3_unconscious_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    soldier_id INTEGER NOT NULL REFERENCES soldiers(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    is_unconscious INTEGER NOT NULL
);
";

/// Create missing tables. Safe to call on every open.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
