// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for analysis history and the disease catalog
//!
//! Every operation opens its own connection and drops it before returning, so
//! a [`Database`] is only a handle on the file location and is cheap to clone
//! into request handlers.

pub mod analysis;
pub mod catalog;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{DermaError, Result};

pub use analysis::{ClearSummary, FileCleanup};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the SQLite database file
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

/// Reference data for one disease class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub name: String,
    pub description: String,
    pub symptoms: String,
    pub treatments: String,
    pub prevention: String,
}

/// One persisted classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub image_path: String,
    pub disease_class: String,
    /// Confidence score (0.0 - 100.0)
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Database {
    /// Open or create the database, creating the schema and seeding the catalog
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self { path };
        db.initialize()?;
        let seeded = db.seed_if_empty()?;
        if seeded > 0 {
            debug!("Seeded {} disease catalog entries", seeded);
        }
        Ok(db)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection scoped to a single operation
    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).map_err(|e| {
            DermaError::StorageUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS analysis_history (
                id TEXT PRIMARY KEY,
                image_path TEXT NOT NULL,
                disease_class TEXT NOT NULL,
                confidence REAL NOT NULL,
                timestamp TEXT NOT NULL,
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS disease_info (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                symptoms TEXT NOT NULL,
                treatments TEXT NOT NULL,
                prevention TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON analysis_history(timestamp);
        "#)?;
        Ok(())
    }
}
