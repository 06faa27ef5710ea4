//! End-to-end scenarios for the relational pipeline.
//!
//! Each test boots a [`Recorder`] on a SQLite file in a temp dir and reads
//! the results back through a second connection:
//!
//! A. Happy path through the background writer
//! B. Queue-only mode while the store is invalid
//! C. Projectile filter in save-local mode
//! D. Commit failure requeues the whole batch, retry succeeds
//! E. DeleteMarker on unknown and known markers
//! F. Close drains what is left
//! G. Mission and cache policies (after EndMission, cache miss, unknown type)
//! H. In-memory fallback with periodic dumps
//! I. Mission ids across store outages
//! J. Registrations during an insert pause
//! K. Concurrent producers against the background writer

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ocap_recorder_core::config::{Config, StorageKind};
use ocap_recorder_core::model::{
    GeneralEvent, KillEvent, Marker, MarkerDeletion, Mission, Position3D, ProjectileEvent,
    ServerFpsEvent, Soldier, SoldierState, World,
};
use ocap_recorder_core::queue::QueueKind;
use ocap_recorder_core::storage::relational::StoreLocation;
use ocap_recorder_core::{Backend, Error, Recorder, StorageError};
use rusqlite::Connection;

// =============================================================================
// Helpers
// =============================================================================

fn relational_config(dir: &Path, drain_interval: Duration) -> Config {
    let mut config = Config::default();
    config.storage.kind = StorageKind::Relational;
    config.storage.relational.database = dir.join("ocap.db").to_string_lossy().to_string();
    config.storage.relational.drain_interval = drain_interval;
    config.storage.memory.output_dir = dir.join("recordings");
    config
}

/// Long drain period: only explicit flushes and Close write.
async fn manual_recorder(dir: &Path) -> Recorder {
    Recorder::init(relational_config(dir, Duration::from_secs(3600)))
        .await
        .unwrap()
}

async fn start_test_mission(recorder: &Recorder) {
    recorder
        .start_mission(
            Mission {
                mission_name: "Test".to_string(),
                ..Mission::default()
            },
            World {
                world_name: "Altis".to_string(),
                ..World::default()
            },
        )
        .await
        .unwrap();
}

async fn flush(recorder: &Recorder) -> ocap_recorder_core::storage::relational::TickReport {
    recorder
        .backend()
        .as_relational()
        .unwrap()
        .flush()
        .await
        .unwrap()
}

fn soldier(object_id: u16, name: &str) -> Soldier {
    Soldier {
        object_id,
        unit_name: name.to_string(),
        ..Soldier::default()
    }
}

fn db_path(dir: &Path) -> PathBuf {
    dir.join("ocap.db")
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

// =============================================================================
// A. Happy path
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn happy_path_persists_soldier_and_state() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::init(relational_config(dir.path(), Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(recorder.probe().is_db_valid());
    start_test_mission(&recorder).await;

    let backend = recorder.backend();
    backend.add_soldier(soldier(42, "Alpha")).unwrap();
    backend
        .record_soldier_state(SoldierState {
            soldier_object_id: 42,
            capture_frame: 100,
            position: Position3D::new(100.0, 200.0, 10.0),
            ..SoldierState::default()
        })
        .unwrap();

    let conn = Connection::open(db_path(dir.path())).unwrap();
    let mut waited = Duration::ZERO;
    while count(&conn, "soldier_states") == 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    let (soldier_id, name, mission_id): (i64, String, i64) = conn
        .query_row(
            "SELECT id, unit_name, mission_id FROM soldiers",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Alpha");
    assert_eq!(mission_id, 1);

    let (state_soldier, frame, x, y, z, state_mission): (i64, i64, f64, f64, f64, i64) = conn
        .query_row(
            "SELECT soldier_id, capture_frame, pos_x, pos_y, pos_z, mission_id FROM soldier_states",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .unwrap();
    assert_eq!(state_soldier, soldier_id);
    assert_eq!(frame, 100);
    assert_eq!((x, y, z), (100.0, 200.0, 10.0));
    assert_eq!(state_mission, 1);

    let world: String = conn
        .query_row("SELECT world_name FROM worlds", [], |row| row.get(0))
        .unwrap();
    assert_eq!(world, "Altis");
    assert!(recorder.metrics().completed_ticks() > 0);

    recorder.close().await.unwrap();
}

// =============================================================================
// B. Queue-only mode
// =============================================================================

#[tokio::test]
async fn invalid_probe_keeps_rows_queued() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    recorder.probe().set_db_valid(false);

    let backend = recorder.backend();
    backend.add_soldier(soldier(42, "Alpha")).unwrap();
    backend
        .record_soldier_state(SoldierState {
            soldier_object_id: 42,
            capture_frame: 100,
            ..SoldierState::default()
        })
        .unwrap();

    let report = flush(&recorder).await;
    assert_eq!(report.skipped, QueueKind::COUNT);

    let depths = recorder.queue_depths();
    assert_eq!(depths.get(QueueKind::Soldiers), 1);
    assert_eq!(depths.get(QueueKind::SoldierStates), 1);

    let conn = Connection::open(db_path(dir.path())).unwrap();
    assert_eq!(count(&conn, "soldiers"), 0);
    assert_eq!(count(&conn, "soldier_states"), 0);
}

// =============================================================================
// C. Projectile filter
// =============================================================================

#[tokio::test]
async fn save_local_drops_projectiles() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let backend = recorder.backend();
    backend.add_soldier(soldier(7, "Gunner")).unwrap();

    let projectile = ProjectileEvent {
        firer_object_id: 7,
        simulation_type: "shotBullet".to_string(),
        ..ProjectileEvent::default()
    };

    recorder.probe().set_should_save_local(true);
    backend.record_projectile_event(projectile.clone()).unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::ProjectileEvents), 0);

    recorder.probe().set_should_save_local(false);
    backend.record_projectile_event(projectile).unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::ProjectileEvents), 1);
}

// =============================================================================
// D. Commit failure
// =============================================================================

const KILL_EVENTS_DDL: &str = "CREATE TABLE kill_events (
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
)";

#[tokio::test]
async fn failed_commit_requeues_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let backend = recorder.backend();
    backend.add_soldier(soldier(1, "Victim")).unwrap();
    backend.add_soldier(soldier(2, "Killer")).unwrap();
    flush(&recorder).await;

    let side = Connection::open(db_path(dir.path())).unwrap();
    side.execute_batch("DROP TABLE kill_events").unwrap();

    for frame in 0..3 {
        backend
            .record_kill_event(KillEvent {
                capture_frame: frame,
                victim_object_id: 1,
                killer_object_id: 2,
                event_text: "MX".to_string(),
                ..KillEvent::default()
            })
            .unwrap();
    }

    let report = flush(&recorder).await;
    assert_eq!(report.failed, vec![QueueKind::KillEvents]);
    assert_eq!(recorder.queue_depths().get(QueueKind::KillEvents), 3);
    assert_eq!(recorder.probe().consecutive_failures(), 1);
    assert_eq!(recorder.metrics().kind(QueueKind::KillEvents).failed_batches, 1);

    side.execute_batch(KILL_EVENTS_DDL).unwrap();
    let report = flush(&recorder).await;
    assert_eq!(report.committed_rows(QueueKind::KillEvents), 3);
    assert_eq!(recorder.queue_depths().get(QueueKind::KillEvents), 0);
    assert_eq!(recorder.probe().consecutive_failures(), 0);

    let frames: Vec<i64> = side
        .prepare("SELECT capture_frame FROM kill_events ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(frames, vec![0, 1, 2]);
}

// =============================================================================
// E. DeleteMarker
// =============================================================================

#[tokio::test]
async fn delete_unknown_marker_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;

    for _ in 0..2 {
        recorder
            .backend()
            .delete_marker(MarkerDeletion::new("Ghost", 500))
            .unwrap();
    }
    assert_eq!(recorder.queue_depths().get(QueueKind::MarkerStates), 0);
}

#[tokio::test]
async fn delete_marker_writes_state_and_flags_row() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let backend = recorder.backend();

    backend
        .add_marker(Marker {
            marker_name: "M".to_string(),
            alpha: 1.0,
            ..Marker::default()
        })
        .unwrap();
    flush(&recorder).await;
    let marker_id = backend.get_marker_by_name("M").unwrap().id().unwrap();

    backend.delete_marker(MarkerDeletion::new("M", 500)).unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::MarkerStates), 1);
    flush(&recorder).await;

    let conn = Connection::open(db_path(dir.path())).unwrap();
    let (state_marker, frame, alpha): (i64, i64, f64) = conn
        .query_row(
            "SELECT marker_id, capture_frame, alpha FROM marker_states",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!((state_marker, frame, alpha), (marker_id, 500, 0.0));
    let deleted: i64 = conn
        .query_row("SELECT is_deleted FROM markers WHERE id = ?1", [marker_id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn empty_marker_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let err = recorder.backend().add_marker(Marker::default()).unwrap_err();
    assert!(matches!(err, Error::Admission(_)));
}

// =============================================================================
// F. Shutdown drain
// =============================================================================

#[tokio::test]
async fn close_drains_pending_registrations() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    recorder.backend().add_soldier(soldier(1, "One")).unwrap();
    recorder.backend().add_soldier(soldier(2, "Two")).unwrap();

    recorder.close().await.unwrap();
    assert_eq!(recorder.queue_depths().total(), 0);
    assert!(
        recorder
            .backend()
            .as_relational()
            .unwrap()
            .store_location()
            .await
            .is_none()
    );

    let conn = Connection::open(db_path(dir.path())).unwrap();
    assert_eq!(count(&conn, "soldiers"), 2);

    // closed backends accept and discard
    recorder
        .backend()
        .record_server_fps_event(ServerFpsEvent::default())
        .unwrap();
    assert_eq!(recorder.queue_depths().total(), 0);
}

#[tokio::test]
async fn close_with_invalid_store_leaves_rows_queued() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    recorder.backend().add_soldier(soldier(1, "One")).unwrap();
    recorder.probe().set_db_valid(false);

    recorder.close().await.unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::Soldiers), 1);
}

// =============================================================================
// G. Mission and cache policies
// =============================================================================

#[tokio::test]
async fn records_after_end_mission_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    recorder.end_mission().await.unwrap();

    let backend = recorder.backend();
    backend
        .record_server_fps_event(ServerFpsEvent::default())
        .unwrap();
    backend
        .record_kill_event(KillEvent::default())
        .unwrap();
    assert_eq!(recorder.queue_depths().total(), 0);
}

#[tokio::test]
async fn state_before_registration_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let backend = recorder.backend();

    backend
        .record_soldier_state(SoldierState {
            soldier_object_id: 99,
            ..SoldierState::default()
        })
        .unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::SoldierStates), 0);

    backend.add_soldier(soldier(99, "Late")).unwrap();
    backend
        .record_soldier_state(SoldierState {
            soldier_object_id: 99,
            ..SoldierState::default()
        })
        .unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::SoldierStates), 1);
}

#[tokio::test]
async fn soldier_added_before_mission_is_cached_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    recorder.backend().add_soldier(soldier(5, "Early")).unwrap();
    assert!(recorder.backend().get_soldier_by_object_id(5).is_some());
    assert_eq!(recorder.queue_depths().total(), 0);

    // states referencing the unwritten soldier are discarded by the writer
    start_test_mission(&recorder).await;
    recorder.backend().add_soldier(soldier(6, "OnTime")).unwrap();
    recorder
        .backend()
        .record_soldier_state(SoldierState {
            soldier_object_id: 5,
            ..SoldierState::default()
        })
        .unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::SoldierStates), 1);

    let report = flush(&recorder).await;
    assert_eq!(report.committed_rows(QueueKind::Soldiers), 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(recorder.queue_depths().total(), 0);
}

#[tokio::test]
async fn unknown_storage_type_fails_init() {
    let mut config = Config::default();
    config.storage.kind = StorageKind::from("cassandra".to_string());
    let err = Recorder::init(config).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Storage(StorageError::UnknownBackend(ref name)) if name == "cassandra"
    ));
}

// =============================================================================
// H. Fallback
// =============================================================================

#[tokio::test]
async fn unreachable_database_falls_back_to_memory_and_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = relational_config(dir.path(), Duration::from_secs(3600));
    config.storage.relational.database = dir
        .path()
        .join("missing/ocap.db")
        .to_string_lossy()
        .to_string();
    let recorder = Recorder::init(config).await.unwrap();

    assert!(recorder.probe().should_save_local());
    assert!(recorder.probe().is_db_valid());
    let relational = recorder.backend().as_relational().unwrap();
    assert_eq!(relational.store_location().await, Some(StoreLocation::Memory));

    start_test_mission(&recorder).await;
    recorder.backend().add_soldier(soldier(3, "Fallback")).unwrap();
    flush(&recorder).await;

    let dump = relational.dump_now().await.unwrap().unwrap();
    assert_eq!(dump, dir.path().join("recordings/ocap_fallback.db"));
    assert!(!recorder.probe().inserts_paused());

    recorder.backend().add_soldier(soldier(4, "AfterDump")).unwrap();
    recorder.close().await.unwrap();

    let conn = Connection::open(&dump).unwrap();
    assert_eq!(count(&conn, "soldiers"), 2);
}

// =============================================================================
// I. Mission ids across store outages
// =============================================================================

fn named_mission(name: &str) -> Mission {
    Mission {
        mission_name: name.to_string(),
        ..Mission::default()
    }
}

fn fps(average: f32) -> ServerFpsEvent {
    ServerFpsEvent {
        fps_average: average,
        fps_min: average,
        ..ServerFpsEvent::default()
    }
}

#[tokio::test]
async fn mission_started_while_store_invalid_gets_its_own_id() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    let altis = World {
        world_name: "Altis".to_string(),
        ..World::default()
    };

    let first = recorder
        .start_mission(named_mission("First"), altis.clone())
        .await
        .unwrap()
        .unwrap();
    recorder.backend().record_server_fps_event(fps(1.0)).unwrap();
    flush(&recorder).await;

    recorder.probe().set_db_valid(false);
    let second = recorder
        .start_mission(named_mission("Second"), altis)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(first.mission.id, second.mission.id);
    recorder.backend().record_server_fps_event(fps(2.0)).unwrap();
    assert_eq!(recorder.queue_depths().get(QueueKind::Missions), 1);

    recorder.probe().set_db_valid(true);
    let report = flush(&recorder).await;
    assert_eq!(report.committed_rows(QueueKind::Missions), 1);
    assert_eq!(report.committed_rows(QueueKind::ServerFpsEvents), 1);
    assert!(report.failed.is_empty());

    let conn = Connection::open(db_path(dir.path())).unwrap();
    let rows: Vec<(i64, String, f64)> = conn
        .prepare(
            "SELECT m.id, m.mission_name, e.fps_average FROM server_fps_events e
             JOIN missions m ON m.id = e.mission_id ORDER BY e.id",
        )
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![
            (i64::from(first.mission.id), "First".to_string(), 1.0),
            (i64::from(second.mission.id), "Second".to_string(), 2.0),
        ]
    );
    assert_eq!(count(&conn, "worlds"), 1);
    recorder.close().await.unwrap();
}

#[tokio::test]
async fn mission_ids_continue_after_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    start_test_mission(&recorder).await;
    recorder.close().await.unwrap();

    let recorder = manual_recorder(dir.path()).await;
    recorder.probe().set_db_valid(false);
    let active = recorder
        .start_mission(named_mission("Offline"), World::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.mission.id, 3);
    recorder.probe().set_db_valid(true);
    recorder.close().await.unwrap();

    let conn = Connection::open(db_path(dir.path())).unwrap();
    assert_eq!(count(&conn, "missions"), 3);
}

// =============================================================================
// J. Registrations during an insert pause
// =============================================================================

#[tokio::test]
async fn soldier_registered_during_pause_keeps_its_states() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = manual_recorder(dir.path()).await;
    start_test_mission(&recorder).await;
    let backend = recorder.backend();

    {
        let _paused = recorder.probe().pause_inserts();
        backend.add_soldier(soldier(5, "Paused")).unwrap();
        // ordinary records are still dropped while paused
        backend.record_server_fps_event(fps(10.0)).unwrap();
        assert_eq!(recorder.queue_depths().get(QueueKind::ServerFpsEvents), 0);
    }

    for frame in 0..10 {
        backend
            .record_soldier_state(SoldierState {
                soldier_object_id: 5,
                capture_frame: frame,
                ..SoldierState::default()
            })
            .unwrap();
    }

    let report = flush(&recorder).await;
    assert_eq!(report.dropped, 0);
    assert_eq!(report.committed_rows(QueueKind::Soldiers), 1);
    assert_eq!(report.committed_rows(QueueKind::SoldierStates), 10);

    let conn = Connection::open(db_path(dir.path())).unwrap();
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM soldier_states s
             LEFT JOIN soldiers d ON d.id = s.soldier_id WHERE d.unit_name IS NOT 'Paused'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);
    assert_eq!(count(&conn, "soldier_states"), 10);
    recorder.close().await.unwrap();
}

// =============================================================================
// K. Concurrent producers
// =============================================================================

const GENERAL_EVENTS_DDL: &str = "CREATE TABLE general_events (
    id INTEGER PRIMARY KEY,
    mission_id INTEGER NOT NULL REFERENCES missions(id),
    time INTEGER NOT NULL,
    capture_frame INTEGER NOT NULL,
    name TEXT NOT NULL,
    message TEXT NOT NULL,
    extra_data TEXT NOT NULL
)";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_producers_survive_a_failed_commit() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u32 = 250;

    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(
        Recorder::init(relational_config(dir.path(), Duration::from_millis(10)))
            .await
            .unwrap(),
    );
    start_test_mission(&recorder).await;

    let side = Connection::open(db_path(dir.path())).unwrap();
    side.busy_timeout(Duration::from_secs(5)).unwrap();
    side.execute_batch("DROP TABLE general_events").unwrap();

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let recorder = Arc::clone(&recorder);
            tokio::task::spawn_blocking(move || {
                for seq in 0..PER_PRODUCER {
                    recorder
                        .backend()
                        .record_general_event(GeneralEvent {
                            capture_frame: seq,
                            name: format!("producer-{producer}"),
                            message: seq.to_string(),
                            ..GeneralEvent::default()
                        })
                        .unwrap();
                    if seq % 50 == 0 {
                        std::thread::sleep(Duration::from_millis(2));
                    }
                }
            })
        })
        .collect();

    // let the writer hit the missing table at least once
    let mut waited = Duration::ZERO;
    while recorder.metrics().kind(QueueKind::GeneralEvents).failed_batches == 0
        && waited < Duration::from_secs(5)
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    assert!(recorder.metrics().kind(QueueKind::GeneralEvents).failed_batches > 0);
    side.execute_batch(GENERAL_EVENTS_DDL).unwrap();

    for producer in producers {
        producer.await.unwrap();
    }
    recorder.close().await.unwrap();
    assert_eq!(recorder.queue_depths().total(), 0);

    let rows: Vec<(String, i64)> = side
        .prepare("SELECT name, capture_frame FROM general_events ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), PRODUCERS * PER_PRODUCER as usize);

    // every producer's rows are present exactly once, in the order pushed
    let mut per_producer: HashMap<String, Vec<i64>> = HashMap::new();
    for (name, seq) in rows {
        per_producer.entry(name).or_default().push(seq);
    }
    assert_eq!(per_producer.len(), PRODUCERS);
    let expected: Vec<i64> = (0..i64::from(PER_PRODUCER)).collect();
    for (name, seqs) in per_producer {
        assert_eq!(seqs, expected, "{name} rows out of order or missing");
    }
}
