//! Snapshot export and import.
//!
//! **Export**: Writes the full dataset to a snapshot file. Every mutation of
//! `PerfDb` calls this with the fixed auto-backup path; the CLI `backup`
//! command writes a timestamped copy next to it.
//!
//! **Import**: Parses a snapshot file completely, then clears the store and
//! reloads it in a single transaction. A missing file, a missing
//! `[PERFORMANCE_DATA]` section, or a section whose rows are all invalid
//! leaves the store untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::db::{DbError, ImportReport, PerfDb};
use crate::interchange;

/// Snapshot refreshed after every mutation.
pub const AUTO_BACKUP_FILE: &str = "performance_backup.csv";

/// `backup_YYYYMMDD_HHMMSS.csv`
pub fn manual_backup_filename(at: DateTime<Local>) -> String {
    format!("backup_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

/// Path for a manual snapshot taken now, inside `dir`.
pub fn manual_backup_path(dir: &Path) -> PathBuf {
    dir.join(manual_backup_filename(Local::now()))
}

/// Write every record and summary to `path`. Returns the number of records
/// written.
pub fn export_snapshot(db: &PerfDb, path: &Path) -> Result<usize, DbError> {
    let snapshot = db.snapshot()?;
    interchange::write_file(path, &snapshot, Local::now().naive_local())?;

    log::info!(
        "Exported {} records and {} summaries to {}",
        snapshot.records.len(),
        snapshot.summaries.len(),
        path.display()
    );
    Ok(snapshot.records.len())
}

/// Replace the store's contents with the snapshot at `path`.
///
/// Malformed rows are skipped and counted in the report. Growth figures are
/// recomputed from the imported values rather than trusted.
pub fn import_snapshot(db: &PerfDb, path: &Path) -> Result<ImportReport, DbError> {
    let decoded = interchange::read_file(path)?;
    if decoded.snapshot.records.is_empty() && decoded.skipped > 0 {
        return Err(DbError::Validation(format!(
            "none of the performance rows in {} are valid ({} skipped)",
            path.display(),
            decoded.skipped
        )));
    }
    let (records, names_added) = db.replace_all(&decoded.snapshot)?;

    let report = ImportReport {
        records,
        summaries: decoded.snapshot.summaries.len(),
        skipped: decoded.skipped,
        names_added,
    };
    log::info!(
        "Imported {} records and {} summaries from {} ({} rows skipped, {} new names)",
        report.records,
        report.summaries,
        path.display(),
        report.skipped,
        report.names_added
    );
    Ok(report)
}
