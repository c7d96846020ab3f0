use std::collections::HashSet;

use rusqlite::{params, Row};

use super::types::canonical_period;
use super::*;
use crate::growth;
use crate::interchange::Snapshot;
use crate::period::{to_canonical, to_display};

const RECORD_COLUMNS: &str = "name, period, left_perf, right_perf, left_orders, right_orders,
     left_growth_pct, right_growth_pct, total_growth_pct, position, sort_order";

impl PerfDb {
    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace every record of `period` with `records`.
    ///
    /// Rows that fail validation (and repeated names) are skipped with a
    /// warning; the call fails without touching the store only if every row
    /// is invalid. An empty list clears the period. `sort_order` defaults to
    /// the row's index in `records`. Returns the number of rows written.
    pub fn upsert_period(&self, period: &str, records: &[RecordInput]) -> Result<usize, DbError> {
        let period = canonical_period(period)?;

        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if let Err(e) = record.validate() {
                log::warn!("Skipping row {} of {period}: {e}", index + 1);
                continue;
            }
            if !seen.insert(record.name.trim().to_string()) {
                log::warn!(
                    "Skipping row {} of {period}: {} appears more than once",
                    index + 1,
                    record.name.trim()
                );
                continue;
            }
            accepted.push((index, record));
        }

        if !records.is_empty() && accepted.is_empty() {
            return Err(DbError::Validation(format!(
                "none of the {} rows for {period} are valid",
                records.len()
            )));
        }

        let written = self.with_transaction(|db| {
            db.conn
                .execute("DELETE FROM performance WHERE period = ?1", params![period])?;
            for (index, record) in &accepted {
                db.register_name(&record.name)?;
                let sort_order = record.sort_order.unwrap_or(*index as i64);
                db.insert_record(&period, record, sort_order)?;
            }
            // A new or removed period can change the base of any later record.
            db.recompute_all_growth()?;
            Ok(accepted.len())
        })?;

        self.auto_backup();
        Ok(written)
    }

    /// Insert or fully replace the record for `(record.name, period)`.
    ///
    /// A missing `sort_order` is stored as 0.
    pub fn upsert_single(&self, period: &str, record: &RecordInput) -> Result<(), DbError> {
        let period = canonical_period(period)?;
        record.validate()?;
        let name = record.name.trim();

        self.with_transaction(|db| {
            db.register_name(name)?;
            db.insert_record(&period, record, record.sort_order.unwrap_or(0))?;
            db.recompute_person_growth(name)?;
            Ok(())
        })?;

        self.auto_backup();
        Ok(())
    }

    /// Delete the record for `(name, period)`. Returns 0 if there was none.
    pub fn delete_record(&self, name: &str, period: &str) -> Result<usize, DbError> {
        let name = name.trim();
        let period = to_canonical(period.trim());

        let deleted = self.with_transaction(|db| {
            let deleted = db.conn.execute(
                "DELETE FROM performance WHERE name = ?1 AND period = ?2",
                params![name, period],
            )?;
            if deleted > 0 {
                db.recompute_person_growth(name)?;
            }
            Ok(deleted)
        })?;

        if deleted > 0 {
            self.auto_backup();
        }
        Ok(deleted)
    }

    /// Move every record and the registry entry of `old_name` to `new_name`.
    ///
    /// Fails if the two share a period, since the merge would drop a record.
    /// Returns the number of records renamed.
    pub fn rename_person(&self, old_name: &str, new_name: &str) -> Result<usize, DbError> {
        let old_name = old_name.trim();
        let new_name = new_name.trim();
        if old_name.is_empty() || new_name.is_empty() {
            return Err(DbError::Validation("rename needs two non-blank names".to_string()));
        }
        if old_name == new_name {
            return Err(DbError::Validation(format!(
                "{old_name} is already called {new_name}"
            )));
        }

        let clashes: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM performance a
             JOIN performance b ON a.period = b.period
             WHERE a.name = ?1 AND b.name = ?2",
            params![old_name, new_name],
            |row| row.get(0),
        )?;
        if clashes > 0 {
            return Err(DbError::Validation(format!(
                "{old_name} and {new_name} both have records in {clashes} period(s)"
            )));
        }

        let renamed = self.with_transaction(|db| {
            let renamed = db.conn.execute(
                "UPDATE performance SET name = ?1 WHERE name = ?2",
                params![new_name, old_name],
            )?;
            if db.get_person_name(new_name)?.is_some() {
                db.deactivate_name(old_name)?;
            } else {
                db.conn.execute(
                    "UPDATE all_names SET name = ?1 WHERE name = ?2",
                    params![new_name, old_name],
                )?;
                db.register_name(new_name)?;
            }
            db.recompute_person_growth(new_name)?;
            Ok(renamed)
        })?;

        log::info!("Renamed {old_name} to {new_name} ({renamed} records)");
        self.auto_backup();
        Ok(renamed)
    }

    fn insert_record(&self, period: &str, record: &RecordInput, sort_order: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO performance
             (name, period, left_perf, right_perf, left_orders, right_orders,
              left_growth_pct, right_growth_pct, total_growth_pct, position, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0, ?7, ?8)",
            params![
                record.name.trim(),
                period,
                record.left_value,
                record.right_value,
                record.left_orders,
                record.right_orders,
                record.position,
                sort_order,
            ],
        )?;
        Ok(())
    }

    /// Replace the whole dataset with `snapshot`. Used by snapshot import;
    /// the caller has already parsed the file, so nothing here can leave the
    /// store half-replaced.
    pub(crate) fn replace_all(&self, snapshot: &Snapshot) -> Result<(usize, usize), DbError> {
        self.with_transaction(|db| {
            db.conn.execute("DELETE FROM performance", [])?;
            db.conn.execute("DELETE FROM summaries", [])?;

            for record in &snapshot.records {
                db.conn.execute(
                    &format!(
                        "INSERT OR REPLACE INTO performance ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        RECORD_COLUMNS
                    ),
                    params![
                        record.name,
                        to_canonical(&record.period),
                        record.left_value,
                        record.right_value,
                        record.left_orders,
                        record.right_orders,
                        record.left_growth_pct,
                        record.right_growth_pct,
                        record.total_growth_pct,
                        record.position,
                        record.sort_order,
                    ],
                )?;
            }
            for summary in &snapshot.summaries {
                db.conn.execute(
                    "INSERT OR REPLACE INTO summaries (period, summary_text) VALUES (?1, ?2)",
                    params![to_canonical(&summary.period), summary.summary_text],
                )?;
            }

            // Files written by older builds can carry stale or missing growth.
            db.recompute_all_growth()?;
            let names_added = db.sync_names_from_records()?;
            Ok((snapshot.records.len(), names_added))
        })
    }

    // =========================================================================
    // Growth
    // =========================================================================

    /// Recompute growth for every person.
    pub fn recalculate_all(&self) -> Result<usize, DbError> {
        self.with_transaction(|db| db.recompute_all_growth())
    }

    /// Recompute growth for one person's history.
    pub fn recalculate_person(&self, name: &str) -> Result<usize, DbError> {
        self.with_transaction(|db| db.recompute_person_growth(name.trim()))
    }

    fn recompute_all_growth(&self) -> Result<usize, DbError> {
        let names = self.distinct_names()?;
        let mut updated = 0;
        for name in &names {
            updated += self.recompute_person_growth(name)?;
        }
        log::debug!("Recomputed growth for {updated} records across {} names", names.len());
        Ok(updated)
    }

    fn recompute_person_growth(&self, name: &str) -> Result<usize, DbError> {
        let history: Vec<(String, f64, f64)> = {
            let mut stmt = self.conn.prepare(
                "SELECT period, left_perf, right_perf FROM performance
                 WHERE name = ?1 ORDER BY period ASC",
            )?;
            let rows = stmt.query_map(params![name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                ))
            })?;
            let mut items = Vec::new();
            for row in rows {
                items.push(row?);
            }
            items
        };

        let values: Vec<(f64, f64)> = history.iter().map(|(_, l, r)| (*l, *r)).collect();
        let series = growth::compute_series(&values);

        let mut stmt = self.conn.prepare(
            "UPDATE performance
             SET left_growth_pct = ?1, right_growth_pct = ?2, total_growth_pct = ?3
             WHERE name = ?4 AND period = ?5",
        )?;
        for ((period, _, _), g) in history.iter().zip(&series) {
            stmt.execute(params![g.left_pct, g.right_pct, g.total_pct, name, period])?;
        }
        Ok(history.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn map_record_row(row: &Row) -> rusqlite::Result<PerformanceRecord> {
        Ok(PerformanceRecord {
            name: row.get(0)?,
            period: row.get(1)?,
            left_value: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            right_value: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            left_orders: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            right_orders: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            left_growth_pct: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
            right_growth_pct: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
            total_growth_pct: row.get::<_, Option<f64>>(8)?.unwrap_or(0.0),
            position: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            sort_order: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        })
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        filter_and_order: &str,
        params: P,
    ) -> Result<Vec<PerformanceRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM performance {}",
            RECORD_COLUMNS, filter_and_order
        ))?;
        let rows = stmt.query_map(params, Self::map_record_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Records of one period in editor order (`sort_order`, then name).
    pub fn get_by_period(&self, period: &str) -> Result<Vec<PerformanceRecord>, DbError> {
        let period = to_canonical(period.trim());
        let mut records = self.query_records(
            "WHERE period = ?1 ORDER BY sort_order ASC, name ASC",
            params![period],
        )?;
        for record in &mut records {
            record.period = to_display(&record.period);
        }
        Ok(records)
    }

    /// Every record of one person, newest period first.
    pub fn get_all_by_name(&self, name: &str) -> Result<Vec<PerformanceRecord>, DbError> {
        let mut records =
            self.query_records("WHERE name = ?1 ORDER BY period DESC", params![name.trim()])?;
        for record in &mut records {
            record.period = to_display(&record.period);
        }
        Ok(records)
    }

    /// Chart series for one person, oldest period first.
    pub fn get_series_by_name(&self, name: &str) -> Result<Vec<SeriesPoint>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT period, left_perf, right_perf FROM performance
             WHERE name = ?1 ORDER BY period ASC",
        )?;
        let rows = stmt.query_map(params![name.trim()], |row| {
            Ok(SeriesPoint {
                period: to_display(&row.get::<_, String>(0)?),
                left_value: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                right_value: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            })
        })?;
        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }

    /// Names that have at least one record, sorted.
    pub fn distinct_names(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT name FROM performance ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Periods that have at least one record, display form, newest first.
    pub fn distinct_periods(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT period FROM performance ORDER BY period DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut periods = Vec::new();
        for row in rows {
            periods.push(to_display(&row?));
        }
        Ok(periods)
    }

    /// The newest period with records, display form.
    pub fn latest_period(&self) -> Result<Option<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT period FROM performance ORDER BY period DESC LIMIT 1")?;
        let mut rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => Ok(Some(to_display(&row?))),
            None => Ok(None),
        }
    }

    /// The full dataset with canonical periods, in export order.
    pub fn snapshot(&self) -> Result<Snapshot, DbError> {
        let records =
            self.query_records("ORDER BY period ASC, sort_order ASC, name ASC", [])?;
        let summaries = self.all_summaries()?;
        Ok(Snapshot { records, summaries })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_db;
    use super::*;

    const H1: &str = "2024-01-First Half";
    const H2: &str = "2024-01-Second Half";

    fn growth_of(db: &PerfDb, name: &str, period: &str) -> (f64, f64, f64) {
        let record = db
            .get_by_period(period)
            .expect("query")
            .into_iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("{} missing from {}", name, period));
        (
            record.left_growth_pct,
            record.right_growth_pct,
            record.total_growth_pct,
        )
    }

    #[test]
    fn test_two_period_growth() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 100.0, 50.0).with_orders(5, 2)])
            .expect("first half");
        db.upsert_period(H2, &[RecordInput::new("A", 150.0, 50.0)])
            .expect("second half");

        assert_eq!(growth_of(&db, "A", H1), (0.0, 0.0, 0.0));
        let (left, right, total) = growth_of(&db, "A", H2);
        assert_eq!(left, 50.0);
        assert_eq!(right, 0.0);
        assert!((total - 33.333_333_333).abs() < 1e-6);
    }

    #[test]
    fn test_zero_base_growth() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 0.0, 0.0)]).expect("h1");
        db.upsert_period(H2, &[RecordInput::new("A", 10.0, 0.0)]).expect("h2");

        let (left, right, total) = growth_of(&db, "A", H2);
        assert_eq!(left, 100.0);
        assert_eq!(right, 0.0);
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_upsert_period_replaces_whole_period() {
        let db = test_db();
        db.upsert_period(
            H1,
            &[RecordInput::new("A", 1.0, 1.0), RecordInput::new("B", 2.0, 2.0)],
        )
        .expect("first write");
        db.upsert_period(H2, &[RecordInput::new("C", 3.0, 3.0)])
            .expect("other period");
        db.upsert_period(H1, &[RecordInput::new("D", 4.0, 4.0)])
            .expect("rewrite");

        let names: Vec<String> = db
            .get_by_period(H1)
            .expect("h1")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["D"]);
        assert_eq!(db.get_by_period(H2).expect("h2").len(), 1);
    }

    #[test]
    fn test_upsert_period_accepts_display_label() {
        let db = test_db();
        db.upsert_period("2024-01-上", &[RecordInput::new("A", 1.0, 2.0)])
            .expect("write");

        let records = db.get_by_period(H1).expect("canonical lookup");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].period, "2024-01-上");
        assert_eq!(db.get_by_period("2024.01上").expect("dotted lookup").len(), 1);
    }

    #[test]
    fn test_sort_order_defaults_to_input_index() {
        let db = test_db();
        db.upsert_period(
            H1,
            &[
                RecordInput::new("Zed", 1.0, 1.0),
                RecordInput::new("Amy", 1.0, 1.0),
                RecordInput::new("Bob", 1.0, 1.0).with_sort_order(0),
            ],
        )
        .expect("write");

        let records = db.get_by_period(H1).expect("read");
        let order: Vec<(&str, i64)> = records
            .iter()
            .map(|r| (r.name.as_str(), r.sort_order))
            .collect();
        // Ties on sort_order fall back to name.
        assert_eq!(order, vec![("Bob", 0), ("Zed", 0), ("Amy", 1)]);
    }

    #[test]
    fn test_invalid_rows_skipped_unless_all_invalid() {
        let db = test_db();
        let written = db
            .upsert_period(
                H1,
                &[
                    RecordInput::new("A", 1.0, 1.0),
                    RecordInput::new("", 1.0, 1.0),
                    RecordInput::new("B", f64::NAN, 1.0),
                    RecordInput::new("C", 1.0, 1.0).with_orders(-1, 0),
                    RecordInput::new("A", 9.0, 9.0),
                ],
            )
            .expect("partial write");
        assert_eq!(written, 1);
        assert_eq!(db.get_by_period(H1).expect("read")[0].left_value, 1.0);

        let err = db
            .upsert_period(H1, &[RecordInput::new(" ", 1.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(db.get_by_period(H1).expect("untouched").len(), 1);
    }

    #[test]
    fn test_empty_list_clears_period() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 1.0, 1.0)]).expect("write");
        assert_eq!(db.upsert_period(H1, &[]).expect("clear"), 0);
        assert!(db.get_by_period(H1).expect("read").is_empty());
        assert_eq!(db.latest_period().expect("latest"), None);
    }

    #[test]
    fn test_unparseable_period_is_rejected() {
        let db = test_db();
        for period in ["2024/01 上", "2024-13-First Half", "Q1", "  "] {
            let err = db
                .upsert_period(period, &[RecordInput::new("A", 1.0, 1.0)])
                .unwrap_err();
            assert!(matches!(err, DbError::Validation(_)), "{period:?}");

            let err = db
                .upsert_single(period, &RecordInput::new("A", 1.0, 1.0))
                .unwrap_err();
            assert!(matches!(err, DbError::Validation(_)), "{period:?}");
        }
        assert!(db.distinct_periods().expect("periods").is_empty());
        assert!(db.distinct_names().expect("names").is_empty());
    }

    #[test]
    fn test_upsert_single_replaces_and_recomputes() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 100.0, 100.0)]).expect("h1");
        db.upsert_single(H2, &RecordInput::new("A", 50.0, 100.0).with_position("lead"))
            .expect("insert");
        assert_eq!(growth_of(&db, "A", H2).0, -50.0);

        db.upsert_single(H2, &RecordInput::new("A", 200.0, 100.0).with_sort_order(3))
            .expect("replace");
        let records = db.get_by_period(H2).expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].left_value, 200.0);
        assert_eq!(records[0].position, "");
        assert_eq!(records[0].sort_order, 3);
        assert_eq!(records[0].left_growth_pct, 100.0);
    }

    #[test]
    fn test_upsert_single_rejects_invalid_record() {
        let db = test_db();
        let err = db
            .upsert_single(H1, &RecordInput::new("A", 1.0, 1.0).with_orders(0, -3))
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert!(db.distinct_names().expect("names").is_empty());
    }

    #[test]
    fn test_writes_register_names() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new(" 张三 ", 1.0, 1.0)]).expect("write");
        db.upsert_single(H2, &RecordInput::new("李四", 1.0, 1.0)).expect("single");
        assert_eq!(db.list_names(true).expect("names"), vec!["", "张三", "李四"]);
        assert_eq!(db.distinct_names().expect("distinct"), vec!["张三", "李四"]);
    }

    #[test]
    fn test_growth_skips_gaps_in_history() {
        let db = test_db();
        db.upsert_period("2024-01-First Half", &[RecordInput::new("A", 100.0, 0.0)])
            .expect("p1");
        db.upsert_period(
            "2024-01-Second Half",
            &[RecordInput::new("B", 10.0, 0.0)],
        )
        .expect("p2");
        db.upsert_period("2024-02-First Half", &[RecordInput::new("A", 120.0, 0.0)])
            .expect("p3");

        let (left, _, _) = growth_of(&db, "A", "2024-02-First Half");
        assert!((left - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_inserting_earlier_period_shifts_base() {
        let db = test_db();
        db.upsert_period(H2, &[RecordInput::new("A", 200.0, 0.0)]).expect("h2");
        assert_eq!(growth_of(&db, "A", H2).0, 0.0);

        db.upsert_period(H1, &[RecordInput::new("A", 100.0, 0.0)]).expect("h1");
        assert_eq!(growth_of(&db, "A", H1).0, 0.0);
        assert_eq!(growth_of(&db, "A", H2).0, 100.0);
    }

    #[test]
    fn test_delete_record() {
        let db = test_db();
        db.upsert_period(
            H1,
            &[RecordInput::new("A", 100.0, 0.0), RecordInput::new("B", 5.0, 5.0)],
        )
        .expect("h1");
        db.upsert_period(H2, &[RecordInput::new("A", 150.0, 0.0)]).expect("h2");

        assert_eq!(db.delete_record("A", "2024-01-上").expect("delete"), 1);
        // A's remaining record is now the first of its history.
        assert_eq!(growth_of(&db, "A", H2), (0.0, 0.0, 0.0));

        let before = db.snapshot().expect("snapshot");
        assert_eq!(db.delete_record("A", H1).expect("delete again"), 0);
        assert_eq!(db.delete_record("nobody", H2).expect("delete missing"), 0);
        assert_eq!(db.snapshot().expect("snapshot"), before);
    }

    #[test]
    fn test_recalculate_all_is_idempotent() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 3.0, 7.0), RecordInput::new("B", 0.0, 1.0)])
            .expect("h1");
        db.upsert_period(H2, &[RecordInput::new("A", 1.0, 9.0), RecordInput::new("B", 2.0, 0.0)])
            .expect("h2");

        db.recalculate_all().expect("first");
        let first = db.snapshot().expect("snapshot");
        db.recalculate_all().expect("second");
        assert_eq!(db.snapshot().expect("snapshot"), first);

        db.recalculate_person("A").expect("person");
        assert_eq!(db.snapshot().expect("snapshot"), first);
    }

    #[test]
    fn test_name_keyed_reads() {
        let db = test_db();
        db.upsert_period("2023-12-Second Half", &[RecordInput::new("A", 1.0, 2.0)])
            .expect("p0");
        db.upsert_period(H1, &[RecordInput::new("A", 3.0, 4.0)]).expect("p1");
        db.upsert_period(H2, &[RecordInput::new("B", 5.0, 6.0)]).expect("p2");

        let periods: Vec<String> = db
            .get_all_by_name("A")
            .expect("all by name")
            .into_iter()
            .map(|r| r.period)
            .collect();
        assert_eq!(periods, vec!["2024-01-上", "2023-12-下"]);

        let series = db.get_series_by_name("A").expect("series");
        assert_eq!(
            series,
            vec![
                SeriesPoint {
                    period: "2023-12-下".to_string(),
                    left_value: 1.0,
                    right_value: 2.0
                },
                SeriesPoint {
                    period: "2024-01-上".to_string(),
                    left_value: 3.0,
                    right_value: 4.0
                },
            ]
        );

        assert_eq!(
            db.distinct_periods().expect("periods"),
            vec!["2024-01-下", "2024-01-上", "2023-12-下"]
        );
        assert_eq!(db.latest_period().expect("latest"), Some("2024-01-下".to_string()));
    }

    #[test]
    fn test_rename_person() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 100.0, 0.0)]).expect("h1");
        db.upsert_period(H2, &[RecordInput::new("A", 150.0, 0.0)]).expect("h2");

        assert_eq!(db.rename_person("A", "Alice").expect("rename"), 2);
        assert!(db.get_all_by_name("A").expect("old").is_empty());
        assert_eq!(growth_of(&db, "Alice", H2).0, 50.0);
        assert_eq!(db.list_names(false).expect("names"), vec!["", "Alice"]);
    }

    #[test]
    fn test_rename_into_existing_person() {
        let db = test_db();
        db.upsert_period(H1, &[RecordInput::new("A", 100.0, 0.0)]).expect("h1");
        db.upsert_period(H2, &[RecordInput::new("B", 150.0, 0.0)]).expect("h2");

        assert_eq!(db.rename_person("A", "B").expect("merge"), 1);
        assert_eq!(growth_of(&db, "B", H2).0, 50.0);
        let old = db.get_person_name("A").expect("get").expect("kept");
        assert!(!old.is_active);
    }

    #[test]
    fn test_rename_rejects_period_clash() {
        let db = test_db();
        db.upsert_period(
            H1,
            &[RecordInput::new("A", 1.0, 0.0), RecordInput::new("B", 2.0, 0.0)],
        )
        .expect("h1");

        assert!(matches!(
            db.rename_person("A", "B").unwrap_err(),
            DbError::Validation(_)
        ));
        assert!(matches!(
            db.rename_person("A", "A").unwrap_err(),
            DbError::Validation(_)
        ));
        assert_eq!(db.get_by_period(H1).expect("read").len(), 2);
    }

    #[test]
    fn test_auto_backup_written_after_mutations() {
        let mut db = test_db();
        let dir = tempfile::tempdir().expect("tempdir");
        let backup = dir.path().join("performance_backup.csv");
        db.set_auto_backup(Some(backup.clone()));

        db.upsert_period(H1, &[RecordInput::new("A", 1.0, 2.0)]).expect("write");
        let text = std::fs::read_to_string(&backup).expect("backup written");
        assert!(text.contains("[PERFORMANCE_DATA]"));
        assert!(text.contains("A,2024-01-First Half,1,2"));

        std::fs::remove_file(&backup).expect("remove");
        assert_eq!(db.delete_record("nobody", H1).expect("noop delete"), 0);
        assert!(!backup.exists(), "no-op delete must not snapshot");

        db.delete_record("A", H1).expect("delete");
        assert!(backup.exists());
    }
}
