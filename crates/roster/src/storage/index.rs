//! Code lookups backed by `SQLite`.
//!
//! Implemented on [`Connection`] so the same queries run inside a
//! [`rusqlite::Transaction`] through deref.

use rusqlite::{params, Connection};

use crate::code::{year_prefix, CodeIndex};
use crate::error::{Error, Result};

impl CodeIndex for Connection {
    fn codes_with_prefix(&self, prefix: &str, exclude: Option<i64>) -> Result<Vec<String>> {
        let mut stmt = self.prepare_cached(
            r"
            SELECT unique_code FROM registrations
            WHERE substr(unique_code, 1, length(?1)) = ?1
              AND (?2 IS NULL OR id != ?2)
            ",
        )?;
        let codes = stmt
            .query_map(params![prefix, exclude], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(codes)
    }

    fn count_created_in_year(&self, year: i32, exclude: Option<i64>) -> Result<u64> {
        let count: i64 = self.query_row(
            r"
            SELECT COUNT(*) FROM registrations
            WHERE substr(created_at, 1, 5) = ?1
              AND (?2 IS NULL OR id != ?2)
            ",
            params![year_prefix(year), exclude],
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| Error::internal(format!("negative row count {count}")))
    }

    fn code_exists(&self, code: &str) -> Result<bool> {
        let exists: bool = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE unique_code = ?1)",
            [code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
