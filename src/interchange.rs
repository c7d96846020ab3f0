//! Snapshot file format.
//!
//! A snapshot is a UTF-8 comma-separated file with a comment preamble and two
//! sections:
//!
//! ```text
//! # 业绩数据备份文件
//! # 导出时间:,2024-01-16 09:30:00
//! "# 数据格式: 编号,姓名,时期,..."
//!
//! [PERFORMANCE_DATA]
//! 编号,姓名,时期,左区业绩,右区业绩,左区订单,右区订单,左区增长%,右区增长%,总增长%
//! 1,张三,2024-01-First Half,100,50,5,2,0,0,0
//!
//! [SUMMARY_DATA]
//! 时期,总结内容
//! 2024-01-First Half,line one\nline two
//! ```
//!
//! The sequence number restarts at 1 for every period. Readers also accept
//! rows without the sequence number, rows without the trailing total-growth
//! column, and files without a summary section. Bad rows are skipped and
//! logged.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;

use crate::db::{DbError, PerformanceRecord, PeriodSummary};
use crate::period::Period;

pub const PERFORMANCE_MARKER: &str = "[PERFORMANCE_DATA]";
pub const SUMMARY_MARKER: &str = "[SUMMARY_DATA]";

const TITLE_LINE: &str = "# 业绩数据备份文件";
const EXPORTED_AT_LABEL: &str = "# 导出时间:";
const FORMAT_LINE: &str =
    "# 数据格式: 编号,姓名,时期,左区业绩,右区业绩,左区订单,右区订单,左区增长%,右区增长%,总增长%";
const PERFORMANCE_HEADER: [&str; 10] = [
    "编号",
    "姓名",
    "时期",
    "左区业绩",
    "右区业绩",
    "左区订单",
    "右区订单",
    "左区增长%",
    "右区增长%",
    "总增长%",
];
const SUMMARY_HEADER: [&str; 2] = ["时期", "总结内容"];
const BOM: &str = "\u{feff}";

/// The full dataset as carried by a snapshot file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub records: Vec<PerformanceRecord>,
    pub summaries: Vec<PeriodSummary>,
}

/// Result of reading a snapshot: the rows kept plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub snapshot: Snapshot,
    pub skipped: usize,
}

pub fn escape_summary(text: &str) -> String {
    text.replace('\n', "\\n").replace('\r', "\\r")
}

pub fn unescape_summary(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\r", "\r")
}

fn encode_row<I, T>(fields: I) -> Result<Vec<u8>, DbError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(fields)?;
    wtr.into_inner()
        .map_err(|e| DbError::Csv(csv::Error::from(e.into_error())))
}

/// Serialize `snapshot` to bytes. Records are written in period, sort order,
/// name order regardless of their order in `snapshot`.
pub fn encode(snapshot: &Snapshot, exported_at: NaiveDateTime) -> Result<Vec<u8>, DbError> {
    let mut out = Vec::new();
    out.extend_from_slice(BOM.as_bytes());
    out.extend(encode_row([TITLE_LINE])?);
    out.extend(encode_row([
        EXPORTED_AT_LABEL.to_string(),
        exported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ])?);
    out.extend(encode_row([FORMAT_LINE])?);
    out.push(b'\n');

    out.extend(encode_row([PERFORMANCE_MARKER])?);
    out.extend(encode_row(PERFORMANCE_HEADER)?);

    let mut records: Vec<&PerformanceRecord> = snapshot.records.iter().collect();
    records.sort_by(|a, b| {
        a.period
            .cmp(&b.period)
            .then(a.sort_order.cmp(&b.sort_order))
            .then(a.name.cmp(&b.name))
    });

    let mut current_period: Option<&str> = None;
    let mut number = 0u32;
    for record in records {
        if current_period != Some(record.period.as_str()) {
            current_period = Some(record.period.as_str());
            number = 0;
        }
        number += 1;
        out.extend(encode_row([
            number.to_string(),
            record.name.clone(),
            record.period.clone(),
            record.left_value.to_string(),
            record.right_value.to_string(),
            record.left_orders.to_string(),
            record.right_orders.to_string(),
            record.left_growth_pct.to_string(),
            record.right_growth_pct.to_string(),
            record.total_growth_pct.to_string(),
        ])?);
    }
    out.push(b'\n');

    out.extend(encode_row([SUMMARY_MARKER])?);
    out.extend(encode_row(SUMMARY_HEADER)?);
    for summary in &snapshot.summaries {
        out.extend(encode_row([
            summary.period.clone(),
            escape_summary(&summary.summary_text),
        ])?);
    }

    Ok(out)
}

/// Write a snapshot file. The bytes go to a temporary file next to `path`
/// which is then renamed over it, so an interrupted write leaves the previous
/// file intact.
pub fn write_file(path: &Path, snapshot: &Snapshot, exported_at: NaiveDateTime) -> Result<(), DbError> {
    let bytes = encode(snapshot, exported_at)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| DbError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DbError::io(dir, e))?;
    tmp.write_all(&bytes).map_err(|e| DbError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| DbError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| DbError::io(path, e.error))?;
    Ok(())
}

/// Read and parse a snapshot file.
pub fn read_file(path: &Path) -> Result<Decoded, DbError> {
    let text = std::fs::read_to_string(path).map_err(|e| DbError::io(path, e))?;
    decode(&text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Performance,
    Summary,
    Unknown,
}

/// Parse snapshot text. Fails only when `[PERFORMANCE_DATA]` is missing.
pub fn decode(input: &str) -> Result<Decoded, DbError> {
    let text = input.strip_prefix(BOM).unwrap_or(input);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut section = Section::Preamble;
    let mut saw_performance = false;
    let mut header_pending = false;

    let mut records: Vec<PerformanceRecord> = Vec::new();
    let mut record_index: HashMap<(String, String), usize> = HashMap::new();
    let mut summaries: Vec<PeriodSummary> = Vec::new();
    let mut summary_index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                log::warn!("Skipping unreadable snapshot line: {e}");
                skipped += 1;
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let first = row.get(0).unwrap_or("").trim();
        if first.starts_with('[') && first.ends_with(']') {
            section = match first {
                PERFORMANCE_MARKER => {
                    saw_performance = true;
                    Section::Performance
                }
                SUMMARY_MARKER => Section::Summary,
                _ => Section::Unknown,
            };
            header_pending = true;
            continue;
        }
        // Column header row right after a section marker.
        if header_pending {
            header_pending = false;
            continue;
        }

        match section {
            Section::Preamble | Section::Unknown => {}
            Section::Performance => match parse_record_row(&row, records.len() as i64) {
                Ok(record) => {
                    let key = (record.name.clone(), record.period.clone());
                    if let Some(&existing) = record_index.get(&key) {
                        log::warn!(
                            "Line {line}: duplicate record for {} in {}, keeping the later row",
                            key.0,
                            key.1
                        );
                        records[existing] = record;
                        skipped += 1;
                    } else {
                        record_index.insert(key, records.len());
                        records.push(record);
                    }
                }
                Err(reason) => {
                    log::warn!("Skipping invalid performance row at line {line}: {reason}");
                    skipped += 1;
                }
            },
            Section::Summary => match parse_summary_row(&row) {
                Ok(summary) => {
                    if let Some(&existing) = summary_index.get(&summary.period) {
                        summaries[existing] = summary;
                        skipped += 1;
                    } else {
                        summary_index.insert(summary.period.clone(), summaries.len());
                        summaries.push(summary);
                    }
                }
                Err(reason) => {
                    log::warn!("Skipping invalid summary row at line {line}: {reason}");
                    skipped += 1;
                }
            },
        }
    }

    if !saw_performance {
        return Err(DbError::Format(format!(
            "{PERFORMANCE_MARKER} section not found"
        )));
    }

    Ok(Decoded {
        snapshot: Snapshot { records, summaries },
        skipped,
    })
}

fn parse_f64(cell: &str, field: &str) -> Result<f64, String> {
    let value: f64 = cell
        .parse()
        .map_err(|_| format!("{field} {cell:?} is not a number"))?;
    if !value.is_finite() {
        return Err(format!("{field} {cell:?} is not a finite number"));
    }
    Ok(value)
}

fn parse_orders(cell: &str, field: &str) -> Result<i64, String> {
    let value: i64 = cell
        .parse()
        .map_err(|_| format!("{field} {cell:?} is not a whole number"))?;
    if value < 0 {
        return Err(format!("{field} {value} is negative"));
    }
    Ok(value)
}

fn parse_optional_growth(cell: Option<&str>, field: &str) -> Result<f64, String> {
    match cell {
        Some(c) if !c.is_empty() => parse_f64(c, field),
        _ => Ok(0.0),
    }
}

fn parse_period(cell: &str) -> Result<String, String> {
    if cell.is_empty() {
        return Err("period is blank".to_string());
    }
    Period::parse(cell)
        .map(|period| period.canonical())
        .ok_or_else(|| format!("{cell:?} is not a half-month period"))
}

/// Parse one `[PERFORMANCE_DATA]` row, with or without the leading sequence
/// number. `fallback_order` is used as `sort_order` when there is none.
///
/// A leading integer only counts as the sequence number when the cell after
/// the name is a period; otherwise the row is read as unnumbered, so a
/// numeric name in an unnumbered row is not shifted by a column.
fn parse_record_row(row: &StringRecord, fallback_order: i64) -> Result<PerformanceRecord, String> {
    let cells: Vec<&str> = row.iter().map(str::trim).collect();

    if let Some(number) = cells.first().and_then(|c| c.parse::<i64>().ok()) {
        let numbered = &cells[1..];
        if numbered.get(1).is_some_and(|p| Period::parse(p).is_some()) {
            return record_from_cells(numbered, number - 1);
        }
    }
    record_from_cells(&cells, fallback_order)
}

/// `cells` starts at the name column.
fn record_from_cells(cells: &[&str], sort_order: i64) -> Result<PerformanceRecord, String> {
    if cells.len() < 6 {
        return Err(format!("expected at least 6 fields, found {}", cells.len()));
    }

    let name = cells[0];
    if name.is_empty() {
        return Err("name is blank".to_string());
    }

    Ok(PerformanceRecord {
        name: name.to_string(),
        period: parse_period(cells[1])?,
        left_value: parse_f64(cells[2], "left value")?,
        right_value: parse_f64(cells[3], "right value")?,
        left_orders: parse_orders(cells[4], "left orders")?,
        right_orders: parse_orders(cells[5], "right orders")?,
        left_growth_pct: parse_optional_growth(cells.get(6).copied(), "left growth")?,
        right_growth_pct: parse_optional_growth(cells.get(7).copied(), "right growth")?,
        total_growth_pct: parse_optional_growth(cells.get(8).copied(), "total growth")?,
        position: String::new(),
        sort_order,
    })
}

fn parse_summary_row(row: &StringRecord) -> Result<PeriodSummary, String> {
    let period = parse_period(row.get(0).map(str::trim).unwrap_or(""))?;
    let text = row
        .get(1)
        .ok_or_else(|| format!("no summary text for {period}"))?;
    Ok(PeriodSummary {
        period,
        summary_text: unescape_summary(text),
    })
}
