//! v1 replay document, the JSON layout the web player loads.
//!
//! Positional arrays are built with `serde_json::json!` because the format
//! is a mix of tuples and objects that no struct layout maps onto cleanly.

use serde_json::{Value, json};

use super::Recording;
use crate::model::{ObjectId, ProjectileEvent};

/// Frame of the last entity state sample
#[must_use]
pub fn end_frame(recording: &Recording) -> u32 {
    let soldiers = recording
        .soldiers
        .values()
        .flat_map(|record| record.states.iter().map(|s| s.capture_frame));
    let vehicles = recording
        .vehicles
        .values()
        .flat_map(|record| record.states.iter().map(|s| s.capture_frame));
    soldiers.chain(vehicles).max().unwrap_or(0)
}

/// Build the full document for one recording.
#[must_use]
pub fn build(recording: &Recording) -> Value {
    let mission = &recording.mission;
    let mut entities = entities(recording);
    let mut events = Vec::new();
    let mut markers: Vec<Value> = recording.markers.iter().map(marker).collect();

    for event in &recording.general_events {
        events.push(json!([event.capture_frame, event.name, general_message(&event.message)]));
    }
    for hit in &recording.hit_events {
        events.push(json!([
            hit.capture_frame,
            "hit",
            hit.victim_object_id,
            [hit.shooter_object_id, hit.event_text],
            hit.distance,
        ]));
    }
    for kill in &recording.kill_events {
        events.push(json!([
            kill.capture_frame,
            "killed",
            kill.victim_object_id,
            [kill.killer_object_id, kill.event_text],
            kill.distance,
        ]));
    }

    for projectile in &recording.projectile_events {
        if projectile.is_marker() {
            markers.push(projectile_marker(recording, projectile));
        } else if projectile.trajectory.len() >= 2 {
            if let (Some(last), Some(Value::Object(entity))) = (
                projectile.trajectory.last(),
                entities.get_mut(usize::from(projectile.firer_object_id)),
            ) {
                if let Some(Value::Array(fired)) = entity.get_mut("framesFired") {
                    fired.push(json!([projectile.capture_frame, last.position.to_array()]));
                }
            }
        }
        projectile_hits(projectile, &mut events);
    }

    let times: Vec<Value> = recording
        .time_states
        .iter()
        .map(|t| {
            json!({
                "date": t.mission_date,
                "frameNum": t.capture_frame,
                "systemTimeUTC": t.system_time_utc,
                "time": t.mission_time,
                "timeMultiplier": t.time_multiplier,
            })
        })
        .collect();

    json!({
        "addonVersion": mission.addon_version,
        "extensionVersion": mission.extension_version,
        "extensionBuild": mission.extension_build,
        "missionName": mission.mission_name,
        "missionAuthor": mission.author,
        "worldName": recording.world.world_name,
        "endFrame": end_frame(recording),
        "captureDelay": mission.capture_delay,
        "tags": mission.tag,
        "times": times,
        "entities": entities,
        "events": events,
        "Markers": markers,
    })
}

// =============================================================================
// Entities
// =============================================================================

/// Entities sit at the index equal to their object id; gaps get placeholders.
fn entities(recording: &Recording) -> Vec<Value> {
    let max_id = recording
        .soldiers
        .keys()
        .chain(recording.vehicles.keys())
        .copied()
        .max();
    let Some(max_id) = max_id else {
        return Vec::new();
    };
    let mut out: Vec<Value> = (0..=max_id).map(placeholder).collect();

    for (&object_id, record) in &recording.soldiers {
        let soldier = &record.soldier;
        let positions: Vec<Value> = record
            .states
            .iter()
            .map(|state| {
                json!([
                    state.position.to_array(),
                    state.bearing,
                    state.lifestate,
                    state.in_vehicle_object_id.unwrap_or(0),
                    state.unit_name,
                    u8::from(state.is_player),
                    state.current_role,
                    state.group_id,
                    state.side,
                ])
            })
            .collect();
        let frames_fired: Vec<Value> = record
            .fired_events
            .iter()
            .map(|fired| json!([fired.capture_frame, fired.end_position.to_array()]))
            .collect();

        let mut entity = json!({
            "id": object_id,
            "name": soldier.unit_name,
            "side": soldier.side,
            "isPlayer": u8::from(soldier.is_player),
            "type": "unit",
            "startFrameNum": soldier.join_frame,
            "positions": positions,
            "framesFired": frames_fired,
        });
        insert_non_empty(&mut entity, "group", &soldier.group_id);
        insert_non_empty(&mut entity, "role", &soldier.role_description);
        out[usize::from(object_id)] = entity;
    }

    for (&object_id, record) in &recording.vehicles {
        let vehicle = &record.vehicle;
        let positions: Vec<Value> = record
            .states
            .iter()
            .map(|state| {
                json!([
                    state.position.to_array(),
                    state.bearing,
                    u8::from(state.is_alive),
                    parse_crew(&state.crew),
                    [state.capture_frame, state.capture_frame],
                ])
            })
            .collect();

        let mut entity = json!({
            "id": object_id,
            "name": vehicle.display_name,
            "side": "UNKNOWN",
            "isPlayer": 0,
            "type": "vehicle",
            "startFrameNum": vehicle.join_frame,
            "positions": positions,
            "framesFired": [],
        });
        insert_non_empty(&mut entity, "class", &vehicle.ocap_type);
        out[usize::from(object_id)] = entity;
    }

    out
}

fn placeholder(object_id: ObjectId) -> Value {
    json!({
        "id": object_id,
        "name": "",
        "side": "",
        "isPlayer": 0,
        "type": "",
        "startFrameNum": 0,
        "positions": [],
        "framesFired": [],
    })
}

fn insert_non_empty(entity: &mut Value, key: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Value::Object(map) = entity {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn parse_crew(raw: &str) -> Value {
    if raw.is_empty() {
        return json!([]);
    }
    serde_json::from_str(raw).unwrap_or_else(|_| json!([]))
}

/// JSON-looking messages are embedded as values, anything else as a string.
fn general_message(message: &str) -> Value {
    if message.starts_with('[') || message.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str(message) {
            return parsed;
        }
    }
    Value::String(message.to_string())
}

// =============================================================================
// Markers
// =============================================================================

fn marker(record: &super::MarkerRecord) -> Value {
    let m = &record.marker;
    let mut positions = vec![json!([
        m.capture_frame,
        m.position.to_array(),
        m.direction,
        m.alpha
    ])];
    positions.extend(record.states.iter().map(|state| {
        json!([
            state.capture_frame,
            state.position.to_array(),
            state.direction,
            state.alpha
        ])
    }));

    let end_frame = record.end_frame.map_or(-1, i64::from);
    json!([
        m.marker_type,
        m.text,
        m.capture_frame,
        end_frame,
        m.owner_id,
        m.color.strip_prefix('#').unwrap_or(&m.color),
        side_index(&m.side),
        positions,
        parse_marker_size(&m.size),
        m.shape,
        m.brush,
    ])
}

/// EAST 0, WEST 1, GUER 2, CIV 3, anything else is global (-1).
#[must_use]
pub fn side_index(side: &str) -> i8 {
    match side.to_ascii_uppercase().as_str() {
        "EAST" | "OPFOR" => 0,
        "WEST" | "BLUFOR" => 1,
        "GUER" | "INDEPENDENT" => 2,
        "CIV" | "CIVILIAN" => 3,
        _ => -1,
    }
}

/// `"[w,h]"` to `[w, h]`, `[1, 1]` when malformed.
#[must_use]
pub fn parse_marker_size(raw: &str) -> [f64; 2] {
    match serde_json::from_str::<Vec<f64>>(raw) {
        Ok(size) if size.len() == 2 => [size[0], size[1]],
        _ => [1.0, 1.0],
    }
}

// =============================================================================
// Projectiles
// =============================================================================

fn projectile_marker(recording: &Recording, projectile: &ProjectileEvent) -> Value {
    let icon = icon_file_name(&projectile.magazine_icon);
    let (marker_type, color) = if icon.is_empty() {
        ("mil_triangle".to_string(), "ColorRed")
    } else {
        (format!("magIcons/{icon}"), "ColorWhite")
    };

    let text = match projectile.vehicle_object_id {
        Some(vehicle_id) if vehicle_id != projectile.firer_object_id => {
            let vehicle_name = recording
                .vehicles
                .get(&vehicle_id)
                .map_or("", |record| record.vehicle.display_name.as_str());
            format!(
                "{vehicle_name} {} - {}",
                projectile.muzzle_display, projectile.magazine_display
            )
        }
        _ if projectile.simulation_type == "shotGrenade" || projectile.weapon == "throw" => {
            projectile.magazine_display.clone()
        }
        _ => format!(
            "{} - {}",
            projectile.muzzle_display, projectile.magazine_display
        ),
    };

    let positions: Vec<Value> = projectile
        .trajectory
        .iter()
        .map(|point| json!([point.frame, point.position.to_array(), 0, 1.0]))
        .collect();
    let end_frame = projectile
        .trajectory
        .last()
        .map_or(-1, |point| i64::from(point.frame));

    json!([
        marker_type,
        text,
        projectile.capture_frame,
        end_frame,
        projectile.firer_object_id,
        color,
        -1,
        positions,
        [1.0, 1.0],
        "ICON",
        "Solid",
    ])
}

fn projectile_hits(projectile: &ProjectileEvent, events: &mut Vec<Value>) {
    if projectile.hits.is_empty() {
        return;
    }
    let weapon = if projectile.muzzle_display.is_empty() {
        &projectile.weapon_display
    } else {
        &projectile.muzzle_display
    };
    let text = weapon_text(weapon, &projectile.magazine_display);
    let start = projectile
        .trajectory
        .first()
        .map(|point| point.position)
        .unwrap_or_default();

    for hit in &projectile.hits {
        let victim = hit
            .soldier_object_id
            .or(hit.vehicle_object_id)
            .unwrap_or(0);
        #[allow(clippy::cast_possible_truncation)]
        let distance = start.distance_2d(&hit.position) as f32;
        events.push(json!([
            hit.capture_frame,
            "hit",
            victim,
            [projectile.firer_object_id, text],
            distance,
        ]));
    }
}

/// Last path component; the host uses backslashes.
fn icon_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn weapon_text(weapon: &str, magazine: &str) -> String {
    match (weapon.is_empty(), magazine.is_empty()) {
        (false, false) => format!("{weapon} - {magazine}"),
        (false, true) => weapon.to_string(),
        (true, false) => magazine.to_string(),
        (true, true) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position3D, ProjectileHit, TrajectoryPoint};

    #[test]
    fn side_and_size_parsing() {
        assert_eq!(side_index("west"), 1);
        assert_eq!(side_index("INDEPENDENT"), 2);
        assert_eq!(side_index("LOGIC"), -1);
        assert_eq!(parse_marker_size("[2.5,4]"), [2.5, 4.0]);
        assert_eq!(parse_marker_size("[1]"), [1.0, 1.0]);
        assert_eq!(parse_marker_size("garbage"), [1.0, 1.0]);
    }

    #[test]
    fn icon_name_handles_both_separators() {
        assert_eq!(icon_file_name(r"\A3\weapons\grenade_ca.paa"), "grenade_ca.paa");
        assert_eq!(icon_file_name("a/b/c.paa"), "c.paa");
        assert_eq!(icon_file_name("plain.paa"), "plain.paa");
        assert_eq!(icon_file_name(""), "");
    }

    #[test]
    fn general_message_embeds_json() {
        assert_eq!(general_message("[1,2]"), json!([1, 2]));
        assert_eq!(general_message("[broken"), json!("[broken"));
        assert_eq!(general_message("Mission started"), json!("Mission started"));
    }

    #[test]
    fn projectile_hits_measure_from_first_point() {
        let projectile = ProjectileEvent {
            firer_object_id: 4,
            muzzle_display: "MX".to_string(),
            magazine_display: "6.5mm".to_string(),
            trajectory: vec![
                TrajectoryPoint {
                    position: Position3D::new(0.0, 0.0, 0.0),
                    frame: 10,
                },
                TrajectoryPoint {
                    position: Position3D::new(6.0, 8.0, 2.0),
                    frame: 11,
                },
            ],
            hits: vec![ProjectileHit {
                capture_frame: 11,
                position: Position3D::new(6.0, 8.0, 2.0),
                soldier_object_id: Some(9),
                ..ProjectileHit::default()
            }],
            ..ProjectileEvent::default()
        };
        let mut events = Vec::new();
        projectile_hits(&projectile, &mut events);
        assert_eq!(events, vec![json!([11, "hit", 9, [4, "MX - 6.5mm"], 10.0])]);
    }
}
