use chrono::Utc;
use rusqlite::params;

use super::*;

impl PerfDb {
    // =========================================================================
    // Name registry
    // =========================================================================

    /// Register a person name. Returns true only if a new row was inserted:
    /// blank names and names already present are no-ops.
    pub fn register_name(&self, name: &str) -> Result<bool, DbError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO all_names (name, created_at, is_active) VALUES (?1, ?2, 1)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    /// Soft-delete a name. Records keep referring to it.
    pub fn deactivate_name(&self, name: &str) -> Result<(), DbError> {
        self.set_name_active(name, false)
    }

    pub fn activate_name(&self, name: &str) -> Result<(), DbError> {
        self.set_name_active(name, true)
    }

    fn set_name_active(&self, name: &str, active: bool) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE all_names SET is_active = ?1 WHERE name = ?2",
            params![active as i32, name.trim()],
        )?;
        Ok(())
    }

    /// Sorted names for an editor picker, led by an empty "no selection" entry.
    pub fn list_names(&self, active_only: bool) -> Result<Vec<String>, DbError> {
        let sql = if active_only {
            "SELECT name FROM all_names WHERE is_active = 1 ORDER BY name"
        } else {
            "SELECT name FROM all_names ORDER BY name"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = vec![String::new()];
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    pub fn get_person_name(&self, name: &str) -> Result<Option<PersonName>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, created_at, is_active FROM all_names WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name.trim()], |row| {
            Ok(PersonName {
                name: row.get(0)?,
                created_at: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                is_active: row.get::<_, i64>(2)? != 0,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Register every name in `names` that the registry does not know yet.
    /// Returns the number of names added.
    pub fn sync_names<'a, I>(&self, names: I) -> Result<usize, DbError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = 0;
        for name in names {
            if self.register_name(name)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Make sure every name that appears on a record is registered.
    pub fn sync_names_from_records(&self) -> Result<usize, DbError> {
        let names = self.record_names()?;
        let added = self.sync_names(names.iter().map(String::as_str))?;
        if added > 0 {
            log::info!("Added {added} names from performance records to the registry");
        }
        Ok(added)
    }

    fn record_names(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT name FROM performance WHERE name IS NOT NULL AND name != ''",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_db;
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let db = test_db();
        assert!(db.register_name("李四").expect("register"));
        assert!(!db.register_name("李四").expect("register again"));
        assert!(!db.register_name("  李四  ").expect("register trimmed"));
        assert_eq!(db.list_names(true).expect("list"), vec!["", "李四"]);
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let db = test_db();
        assert!(!db.register_name("").expect("empty"));
        assert!(!db.register_name("   ").expect("spaces"));
        assert_eq!(db.list_names(false).expect("list"), vec![""]);
    }

    #[test]
    fn test_deactivate_hides_from_active_list() {
        let db = test_db();
        db.register_name("B").expect("register B");
        db.register_name("A").expect("register A");
        db.deactivate_name("B").expect("deactivate");

        assert_eq!(db.list_names(true).expect("active"), vec!["", "A"]);
        assert_eq!(db.list_names(false).expect("all"), vec!["", "A", "B"]);

        let person = db.get_person_name("B").expect("get").expect("row kept");
        assert!(!person.is_active);
        assert!(!person.created_at.is_empty());

        db.activate_name("B").expect("activate");
        assert_eq!(db.list_names(true).expect("active"), vec!["", "A", "B"]);
    }

    #[test]
    fn test_status_change_on_unknown_name_is_noop() {
        let db = test_db();
        db.deactivate_name("ghost").expect("deactivate");
        db.activate_name("ghost").expect("activate");
        assert!(db.get_person_name("ghost").expect("get").is_none());
    }

    #[test]
    fn test_sync_counts_only_new_names() {
        let db = test_db();
        db.register_name("A").expect("register");
        let added = db.sync_names(["A", "B", "C", ""]).expect("sync");
        assert_eq!(added, 2);
        assert_eq!(db.list_names(false).expect("list"), vec!["", "A", "B", "C"]);
    }
}
