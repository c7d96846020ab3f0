//! Shared type definitions for the database layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::period::Period;

/// Errors specific to database and snapshot operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// A record (or every record of a bulk write) failed validation.
    #[error("Invalid record: {0}")]
    Validation(String),

    /// A snapshot file is missing a required section.
    #[error("Malformed snapshot file: {0}")]
    Format(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DbError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A row from the `performance` table.
///
/// `period` is canonical inside the store and snapshots; read APIs hand it
/// out in display form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub name: String,
    pub period: String,
    pub left_value: f64,
    pub right_value: f64,
    pub left_orders: i64,
    pub right_orders: i64,
    pub left_growth_pct: f64,
    pub right_growth_pct: f64,
    pub total_growth_pct: f64,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub sort_order: i64,
}

/// Editor-supplied values for one record. Growth is never supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInput {
    pub name: String,
    pub left_value: f64,
    pub right_value: f64,
    pub left_orders: i64,
    pub right_orders: i64,
    #[serde(default)]
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl RecordInput {
    pub fn new(name: &str, left_value: f64, right_value: f64) -> Self {
        Self {
            name: name.to_string(),
            left_value,
            right_value,
            ..Self::default()
        }
    }

    pub fn with_orders(mut self, left_orders: i64, right_orders: i64) -> Self {
        self.left_orders = left_orders;
        self.right_orders = right_orders;
        self
    }

    pub fn with_position(mut self, position: &str) -> Self {
        self.position = position.to_string();
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Check the record boundary: non-blank name, finite values, no negative orders.
    pub fn validate(&self) -> Result<(), DbError> {
        if self.name.trim().is_empty() {
            return Err(DbError::Validation("name is blank".to_string()));
        }
        validate_values(
            self.left_value,
            self.right_value,
            self.left_orders,
            self.right_orders,
        )
        .map_err(|e| DbError::Validation(format!("{}: {e}", self.name.trim())))
    }
}

/// Parse a period label in any accepted form into its canonical key.
pub(crate) fn canonical_period(label: &str) -> Result<String, DbError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(DbError::Validation("period is blank".to_string()));
    }
    Period::parse(label)
        .map(|period| period.canonical())
        .ok_or_else(|| DbError::Validation(format!("{label:?} is not a half-month period")))
}

pub(crate) fn validate_values(
    left_value: f64,
    right_value: f64,
    left_orders: i64,
    right_orders: i64,
) -> Result<(), String> {
    if !left_value.is_finite() || !right_value.is_finite() {
        return Err("performance values must be finite numbers".to_string());
    }
    if left_orders < 0 || right_orders < 0 {
        return Err("order counts cannot be negative".to_string());
    }
    Ok(())
}

/// A row from the `summaries` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: String,
    pub summary_text: String,
}

/// A row from the `all_names` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub name: String,
    pub created_at: String,
    pub is_active: bool,
}

/// One point of a person's chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub period: String,
    pub left_value: f64,
    pub right_value: f64,
}

/// Counts reported by a snapshot import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub records: usize,
    pub summaries: usize,
    /// Malformed or duplicate rows that were left out.
    pub skipped: usize,
    pub names_added: usize,
}
