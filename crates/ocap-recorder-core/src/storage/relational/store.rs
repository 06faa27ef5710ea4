//! SQLite store: one connection, all work done inside `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::Connection;

use super::rows::{self, Row};
use super::schema;
use crate::error::StorageError;
use crate::model::{Mission, World};

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug)]
pub(crate) struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    location: StoreLocation,
}

// =============================================================================
// SQLite operations (sync, run inside spawn_blocking)
// =============================================================================

fn open_conn(path: &Path) -> std::result::Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

fn open_memory_conn() -> std::result::Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

fn insert_batch_sync<R: Row>(conn: &Connection, rows: &[R]) -> rusqlite::Result<Vec<i64>> {
    let tx = conn.unchecked_transaction()?;
    let mut row_ids = Vec::with_capacity(rows.len());
    {
        let mut stmt = tx.prepare_cached(R::INSERT_SQL)?;
        for row in rows {
            row.insert(&mut stmt)?;
            row_ids.push(tx.last_insert_rowid());
            row.after_insert(&tx)?;
        }
    }
    tx.commit()?;
    Ok(row_ids)
}

fn insert_mission_sync(
    conn: &Connection,
    mission: &Mission,
    world: &World,
) -> std::result::Result<u32, StorageError> {
    let tx = conn.unchecked_transaction()?;
    rows::insert_world(&mut tx.prepare_cached(rows::WORLD_INSERT_SQL)?, world)?;
    rows::insert_mission(&tx, mission, world)?;
    let world_id: i64 = tx.query_row(
        "SELECT id FROM worlds WHERE world_name = ?1",
        [&world.world_name],
        |row| row.get(0),
    )?;
    tx.commit()?;
    u32::try_from(world_id)
        .map_err(|_| StorageError::Database(format!("world id {world_id} out of range")))
}

fn max_mission_id_sync(conn: &Connection) -> std::result::Result<u32, StorageError> {
    let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM missions", [], |row| row.get(0))?;
    let max = max.unwrap_or(0);
    u32::try_from(max).map_err(|_| StorageError::Database(format!("mission id {max} out of range")))
}

fn vacuum_into_sync(conn: &Connection, target: &Path) -> std::result::Result<(), StorageError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Export(e.to_string()))?;
        }
    }
    // VACUUM INTO refuses to overwrite
    match std::fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::Export(e.to_string())),
    }
    let target = target.to_string_lossy().to_string();
    conn.execute("VACUUM INTO ?1", [target])?;
    Ok(())
}

// =============================================================================
// Async surface
// =============================================================================

impl SqliteStore {
    pub async fn open_file(path: PathBuf) -> std::result::Result<Self, StorageError> {
        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = open_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(StorageError::Database(format!(
                        "database directory {} does not exist",
                        parent.display()
                    )));
                }
            }
            let conn = open_conn(&open_path)?;
            schema::ensure_schema(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: StoreLocation::File(path),
        })
    }

    pub fn open_in_memory() -> std::result::Result<Self, StorageError> {
        let conn = open_memory_conn()?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: StoreLocation::Memory,
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Insert a whole snapshot in one transaction.
    ///
    /// The rows always come back, committed or not, so a failed batch can be
    /// requeued intact.
    pub async fn insert_batch<R: Row>(
        &self,
        rows: Vec<R>,
    ) -> (Vec<R>, std::result::Result<Vec<i64>, StorageError>) {
        let conn = Arc::clone(&self.conn);
        let rows = Arc::new(rows);
        let shared = Arc::clone(&rows);
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            insert_batch_sync(&conn, &shared).map_err(StorageError::from)
        })
        .await
        .map_err(StorageError::from)
        .and_then(|inner| inner);
        let rows = Arc::try_unwrap(rows).unwrap_or_else(|shared| (*shared).clone());
        (rows, result)
    }

    /// Get-or-create the world, insert the mission under `mission.id`;
    /// returns the world id.
    pub async fn insert_mission(
        &self,
        mission: Mission,
        world: World,
    ) -> std::result::Result<u32, StorageError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            insert_mission_sync(&conn, &mission, &world)
        })
        .await?
    }

    /// Highest mission id in the store, 0 when empty.
    pub async fn max_mission_id(&self) -> std::result::Result<u32, StorageError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            max_mission_id_sync(&conn)
        })
        .await?
    }

    /// Snapshot the database into `target`, replacing any previous file.
    pub async fn vacuum_into(&self, target: PathBuf) -> std::result::Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            vacuum_into_sync(&conn, &target)
        })
        .await?
    }
}
