//! Conversion of "previous data" spreadsheets into snapshot files.
//!
//! The old export has one row per person, period and area:
//!
//! ```text
//! 姓名,时期,左区,pv,单量
//! 张三,2024.01上,左区,100,5
//! 张三,2024.01上,右区,50,2
//! ```
//!
//! Rows for the same person and period are merged into one record. Records
//! are numbered by first appearance within their period.

use std::collections::HashMap;
use std::path::Path;

use chrono::Local;
use serde::Deserialize;

use crate::db::{DbError, PerformanceRecord};
use crate::interchange::{self, Decoded, Snapshot};
use crate::period::Period;

const LEFT_AREA: &str = "左区";
const RIGHT_AREA: &str = "右区";

#[derive(Debug, Deserialize)]
struct LegacyRow {
    #[serde(rename = "姓名", default)]
    name: Option<String>,
    #[serde(rename = "时期", default)]
    period: Option<String>,
    /// Despite the header, this column holds the area: 左区 or 右区.
    #[serde(rename = "左区", default)]
    area: Option<String>,
    #[serde(default)]
    pv: Option<String>,
    #[serde(rename = "单量", default)]
    orders: Option<String>,
}

fn trimmed(cell: &Option<String>) -> &str {
    cell.as_deref().map(str::trim).unwrap_or("")
}

/// Parse pv and order count together; if either is unreadable both are 0.
fn parse_amounts(pv: &str, orders: &str) -> Option<(f64, i64)> {
    let pv = if pv.is_empty() { 0.0 } else { pv.parse::<f64>().ok()? };
    let orders = if orders.is_empty() {
        0
    } else {
        orders.parse::<i64>().ok()?
    };
    if !pv.is_finite() || orders < 0 {
        return None;
    }
    Some((pv, orders))
}

/// Convert previous-data CSV text. `skipped` counts rows without a name or
/// a recognisable period and rows that could not be read at all.
pub fn convert(input: &str) -> Result<Decoded, DbError> {
    let text = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records: Vec<PerformanceRecord> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut period_counts: HashMap<String, i64> = HashMap::new();
    let mut skipped = 0;

    for result in rdr.deserialize::<LegacyRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                log::warn!("Skipping unreadable legacy row: {e}");
                skipped += 1;
                continue;
            }
        };

        let name = trimmed(&row.name);
        let raw_period = trimmed(&row.period);
        if name.is_empty() || raw_period.is_empty() {
            skipped += 1;
            continue;
        }
        let Some(period) = Period::parse(raw_period).map(|p| p.canonical()) else {
            log::warn!("Skipping legacy row for {name}: {raw_period:?} is not a half-month period");
            skipped += 1;
            continue;
        };

        let key = (name.to_string(), period.clone());
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                let count = period_counts.entry(period.clone()).or_insert(0);
                *count += 1;
                records.push(PerformanceRecord {
                    name: name.to_string(),
                    period: period.clone(),
                    left_value: 0.0,
                    right_value: 0.0,
                    left_orders: 0,
                    right_orders: 0,
                    left_growth_pct: 0.0,
                    right_growth_pct: 0.0,
                    total_growth_pct: 0.0,
                    position: String::new(),
                    sort_order: *count,
                });
                index.insert(key, records.len() - 1);
                records.len() - 1
            }
        };

        let (pv, orders) = parse_amounts(trimmed(&row.pv), trimmed(&row.orders))
            .unwrap_or_else(|| {
                log::warn!("Unreadable pv/单量 for {name} in {period}, using 0");
                (0.0, 0)
            });

        let record = &mut records[slot];
        match trimmed(&row.area) {
            LEFT_AREA => {
                record.left_value = pv;
                record.left_orders = orders;
            }
            RIGHT_AREA => {
                record.right_value = pv;
                record.right_orders = orders;
            }
            other => log::debug!("Ignoring area {other:?} for {name} in {period}"),
        }
    }

    Ok(Decoded {
        snapshot: Snapshot {
            records,
            summaries: Vec::new(),
        },
        skipped,
    })
}

/// Convert the previous-data file at `input` and write a snapshot to
/// `output`. Returns the number of records written.
pub fn convert_file(input: &Path, output: &Path) -> Result<usize, DbError> {
    let text = std::fs::read_to_string(input).map_err(|e| DbError::io(input, e))?;
    let decoded = convert(&text)?;
    interchange::write_file(output, &decoded.snapshot, Local::now().naive_local())?;

    log::info!(
        "Converted {} records from {} into {} ({} rows skipped)",
        decoded.snapshot.records.len(),
        input.display(),
        output.display(),
        decoded.skipped
    );
    Ok(decoded.snapshot.records.len())
}
