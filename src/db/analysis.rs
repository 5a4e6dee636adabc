// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Analysis history: one row per classified upload

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, OptionalExtension, Row};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AnalysisRecord, Database};
use crate::{DermaError, Result};

const RECORD_COLUMNS: &str = "id, image_path, disease_class, confidence, timestamp, notes";

/// Outcome of removing the image file behind a deleted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileCleanup {
    Removed,
    /// The record pointed at a file that was already gone
    Missing,
    Failed { reason: String },
}

/// Result of clearing the whole history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub records_removed: usize,
    pub files_removed: usize,
    pub files_missing: usize,
    pub failures: Vec<String>,
}

/// Generate a new id for an analysis record
pub fn new_analysis_id() -> String {
    Uuid::new_v4().to_string()
}

/// Timestamps are stored with fixed microsecond precision so that text order
/// matches time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        // Naive ISO-8601 rows written without an offset
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()),
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    let raw_ts: String = row.get(4)?;
    let timestamp = parse_timestamp(&raw_ts)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(AnalysisRecord {
        id: row.get(0)?,
        image_path: row.get(1)?,
        disease_class: row.get(2)?,
        confidence: row.get(3)?,
        timestamp,
        notes: row.get(5)?,
    })
}

/// Remove the backing image of a deleted record, reporting what happened
pub fn remove_image(path: &str) -> FileCleanup {
    match std::fs::remove_file(Path::new(path)) {
        Ok(()) => {
            debug!("Removed image {}", path);
            FileCleanup::Removed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Orphaned file reference: {} no longer exists", path);
            FileCleanup::Missing
        }
        Err(e) => {
            warn!("Failed to remove image {}: {}", path, e);
            FileCleanup::Failed { reason: e.to_string() }
        }
    }
}

impl Database {
    /// Persist a new classification result and return its id
    pub fn create_analysis(&self, image_path: &str, disease_class: &str, confidence: f64) -> Result<String> {
        let id = new_analysis_id();
        let timestamp = format_timestamp(&Utc::now());

        let conn = self.connect()?;
        conn.execute(
            r#"INSERT INTO analysis_history (id, image_path, disease_class, confidence, timestamp, notes)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![id, image_path, disease_class, confidence, timestamp, ""],
        )?;

        debug!("Stored analysis {} ({}, {:.2}%)", id, disease_class, confidence);
        Ok(id)
    }

    /// Most recent analyses first, at most `limit` of them
    pub fn list_recent(&self, limit: usize) -> Result<Vec<AnalysisRecord>> {
        if limit == 0 {
            return Err(DermaError::InvalidInput("limit must be a positive integer".to_string()));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM analysis_history ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
            RECORD_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![limit], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Fetch a single analysis by id
    pub fn get_analysis(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM analysis_history WHERE id = ?1", RECORD_COLUMNS),
                params![id],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Number of stored analyses
    pub fn count_analyses(&self) -> Result<i64> {
        let conn = self.connect()?;
        conn.query_row("SELECT COUNT(*) FROM analysis_history", [], |row| row.get(0))
            .map_err(Into::into)
    }

    /// Delete one analysis and then its image file.
    ///
    /// The row is gone once the transaction commits; the file removal that
    /// follows can still fail and is reported rather than swallowed.
    pub fn delete_analysis(&self, id: &str) -> Result<FileCleanup> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let image_path: Option<String> = tx
            .query_row(
                "SELECT image_path FROM analysis_history WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(image_path) = image_path else {
            return Err(DermaError::NotFound(id.to_string()));
        };

        tx.execute("DELETE FROM analysis_history WHERE id = ?1", params![id])?;
        tx.commit()?;
        drop(conn);

        debug!("Deleted analysis {}", id);
        Ok(remove_image(&image_path))
    }

    /// Delete every analysis, then every backing image file
    pub fn clear_history(&self) -> Result<ClearSummary> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let image_paths = {
            let mut stmt = tx.prepare("SELECT image_path FROM analysis_history")?;
            let paths = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            paths
        };
        let records_removed = tx.execute("DELETE FROM analysis_history", [])?;
        tx.commit()?;
        drop(conn);

        let mut summary = ClearSummary {
            records_removed,
            ..ClearSummary::default()
        };
        for path in &image_paths {
            match remove_image(path) {
                FileCleanup::Removed => summary.files_removed += 1,
                FileCleanup::Missing => summary.files_missing += 1,
                FileCleanup::Failed { reason } => summary.failures.push(format!("{}: {}", path, reason)),
            }
        }

        debug!("Cleared {} analyses", summary.records_removed);
        Ok(summary)
    }
}
