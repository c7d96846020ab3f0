//! Half-monthly performance records.
//!
//! Each person gets one record per half-month period holding left and right
//! area values and order counts. Growth percentages against the person's
//! previous record are derived and kept current on every write. The dataset
//! moves in and out as a sectioned CSV snapshot.

pub mod db;
pub mod db_backup;
pub mod growth;
pub mod interchange;
pub mod legacy;
mod migrations;
pub mod period;
pub mod state;
pub mod types;

pub use db::{DbError, PerfDb};
pub use period::{to_canonical, to_display, Period};
