use rusqlite::params;

use super::types::canonical_period;
use super::*;
use crate::period::to_canonical;

impl PerfDb {
    // =========================================================================
    // Period summaries
    // =========================================================================

    /// Summary text for a period, or an empty string if none was saved.
    pub fn get_summary(&self, period: &str) -> Result<String, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT summary_text FROM summaries WHERE period = ?1")?;
        let mut rows = stmt.query_map(params![to_canonical(period.trim())], |row| {
            row.get::<_, Option<String>>(0)
        })?;
        match rows.next() {
            Some(row) => Ok(row?.unwrap_or_default()),
            None => Ok(String::new()),
        }
    }

    /// Insert or replace the summary for a period.
    pub fn save_summary(&self, period: &str, text: &str) -> Result<(), DbError> {
        let period = canonical_period(period)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO summaries (period, summary_text) VALUES (?1, ?2)",
            params![period, text],
        )?;
        self.auto_backup();
        Ok(())
    }

    /// All summaries with canonical periods, oldest first.
    pub fn all_summaries(&self) -> Result<Vec<PeriodSummary>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT period, summary_text FROM summaries ORDER BY period")?;
        let rows = stmt.query_map([], |row| {
            Ok(PeriodSummary {
                period: row.get(0)?,
                summary_text: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_db;
    use super::*;

    #[test]
    fn test_summary_round_trip() {
        let db = test_db();
        assert_eq!(db.get_summary("2024-01-上").expect("missing"), "");

        db.save_summary("2024-01-上", "第一行\n第二行").expect("save");
        assert_eq!(
            db.get_summary("2024-01-First Half").expect("canonical"),
            "第一行\n第二行"
        );

        db.save_summary("2024-01-First Half", "replaced").expect("overwrite");
        assert_eq!(db.get_summary("2024.01上").expect("dotted"), "replaced");
        assert_eq!(db.all_summaries().expect("all").len(), 1);
    }

    #[test]
    fn test_summary_rejects_unknown_period() {
        let db = test_db();
        for period in ["", "2024/01 上", "2024-13-上"] {
            let err = db.save_summary(period, "text").unwrap_err();
            assert!(matches!(err, DbError::Validation(_)), "{period:?}");
        }
        assert!(db.all_summaries().expect("all").is_empty());
    }

    #[test]
    fn test_summary_without_records() {
        let db = test_db();
        db.save_summary("2025-06-下", "quiet period").expect("save");
        assert!(db.distinct_periods().expect("periods").is_empty());
        assert_eq!(
            db.all_summaries().expect("all"),
            vec![PeriodSummary {
                period: "2025-06-Second Half".to_string(),
                summary_text: "quiet period".to_string(),
            }]
        );
    }
}
