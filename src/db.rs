//! SQLite persistence: the job table feeding node loads and the
//! state-of-charge history.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DbError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS microgrids (
        ID           INTEGER PRIMARY KEY AUTOINCREMENT,
        Timestamp    DATETIME DEFAULT CURRENT_TIMESTAMP,
        Gridname     TEXT,
        Load         REAL,
        Completed_at DATETIME
    );

    CREATE TABLE IF NOT EXISTS state_of_charge (
        ID        INTEGER PRIMARY KEY AUTOINCREMENT,
        Timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        Gridname  TEXT,
        SOC       REAL
    );

    CREATE INDEX IF NOT EXISTS idx_microgrids_gridname ON microgrids(Gridname, ID);
    CREATE INDEX IF NOT EXISTS idx_soc_gridname ON state_of_charge(Gridname, ID);";

/// Demo job rows: grid name, load, completion time.
pub const DEMO_JOBS: [(&str, f64, &str); 3] = [
    ("ES10", 7.5, "2025-04-03 09:05:47"),
    ("PT02", 5.0, "2025-04-03 10:05:47"),
    ("ES12", 2.5, "2025-04-03 10:35:47"),
];

/// A row of the `microgrids` job table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub timestamp: String,
    pub gridname: String,
    /// CPU utilisation reported by the job (percent).
    pub load: f64,
    pub completed_at: Option<String>,
}

/// A row of the `state_of_charge` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocRecord {
    pub id: i64,
    pub timestamp: String,
    pub gridname: String,
    pub soc: f64,
}

/// SQLite connection shared between the dispatch loop and the HTTP handlers.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file and ensures both tables exist.
    ///
    /// Safe to call on an existing database: tables are only created if missing.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened database");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Inserts the demo job rows if the job table is empty.
    ///
    /// Returns the number of rows inserted.
    pub fn seed_demo(&self) -> Result<usize, DbError> {
        if self.job_count()? > 0 {
            return Ok(0);
        }
        for (grid, load, completed_at) in DEMO_JOBS {
            self.insert_job(grid, load, Some(completed_at))?;
        }
        info!(rows = DEMO_JOBS.len(), "seeded demo jobs");
        Ok(DEMO_JOBS.len())
    }

    /// Appends a job row and returns its ID.
    pub fn insert_job(
        &self,
        gridname: &str,
        load: f64,
        completed_at: Option<&str>,
    ) -> Result<i64, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO microgrids (Gridname, Load, Completed_at) VALUES (?1, ?2, ?3)",
            params![gridname, load, completed_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent job rows, newest first, optionally for one grid.
    pub fn list_jobs(&self, gridname: Option<&str>, limit: usize) -> Result<Vec<JobRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ID, Timestamp, Gridname, Load, Completed_at FROM microgrids
             WHERE ?1 IS NULL OR Gridname = ?1
             ORDER BY ID DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![gridname, limit as i64], |row| {
            Ok(JobRecord {
                id: row.get(0)?,
                timestamp: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                gridname: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                load: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                completed_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn job_count(&self) -> Result<u64, DbError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM microgrids", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    /// Load of the most recent job row (by ID) for `gridname`.
    pub fn latest_load(&self, gridname: &str) -> Result<Option<f64>, DbError> {
        let conn = self.conn()?;
        let load = conn
            .query_row(
                "SELECT Load FROM microgrids WHERE Gridname = ?1 ORDER BY ID DESC LIMIT 1",
                params![gridname],
                |row| row.get::<_, Option<f64>>(0),
            )
            .optional()?;
        Ok(load.flatten())
    }

    /// Appends a state-of-charge sample and returns its ID.
    pub fn record_soc(&self, gridname: &str, soc: f64) -> Result<i64, DbError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO state_of_charge (Gridname, SOC) VALUES (?1, ?2)",
            params![gridname, soc],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent state-of-charge samples, newest first, optionally for one grid.
    pub fn soc_history(&self, gridname: Option<&str>, limit: usize) -> Result<Vec<SocRecord>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ID, Timestamp, Gridname, SOC FROM state_of_charge
             WHERE ?1 IS NULL OR Gridname = ?1
             ORDER BY ID DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![gridname, limit as i64], |row| {
            Ok(SocRecord {
                id: row.get(0)?,
                timestamp: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                gridname: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                soc: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
