//! `SQLite` schema definitions for roster.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the registrations table.
///
/// The `unique_code` column is added by the second migration.
pub const CREATE_REGISTRATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS registrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    dob TEXT,
    region TEXT NOT NULL,
    auxiliary_body TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on creation order for listing and backfill.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_registrations_created ON registrations(created_at, id)
";

/// SQL statement to create an index on region for filtering.
pub const CREATE_REGION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_registrations_region ON registrations(region)
";

/// SQL statement to create an index on auxiliary body for filtering.
pub const CREATE_BODY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_registrations_body ON registrations(auxiliary_body)
";

/// SQL statement to create the vitals table.
///
/// One row per registration at most, removed together with it.
pub const CREATE_VITALS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS vitals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    registration_id INTEGER NOT NULL UNIQUE
        REFERENCES registrations(id) ON DELETE CASCADE,
    blood_group TEXT,
    height REAL CHECK (height IS NULL OR (height >= 0 AND height <= 300)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_REGISTRATIONS_TABLE,
    CREATE_CREATED_INDEX,
    CREATE_REGION_INDEX,
    CREATE_BODY_INDEX,
    CREATE_VITALS_TABLE,
    CREATE_METADATA_TABLE,
];

/// SQL statement adding the unique code column (schema version 2).
pub const ADD_UNIQUE_CODE_COLUMN: &str = r"
ALTER TABLE registrations ADD COLUMN unique_code TEXT
";

/// SQL statement enforcing code uniqueness. NULLs do not collide.
pub const CREATE_CODE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_registrations_code ON registrations(unique_code)
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_registrations_table_contains_required_columns() {
        assert!(CREATE_REGISTRATIONS_TABLE.contains("id INTEGER PRIMARY KEY"));
        assert!(CREATE_REGISTRATIONS_TABLE.contains("first_name TEXT NOT NULL"));
        assert!(CREATE_REGISTRATIONS_TABLE.contains("region TEXT NOT NULL"));
        assert!(CREATE_REGISTRATIONS_TABLE.contains("auxiliary_body TEXT NOT NULL"));
        assert!(CREATE_REGISTRATIONS_TABLE.contains("created_at TEXT"));
    }

    #[test]
    fn test_vitals_cascade_on_delete() {
        assert!(CREATE_VITALS_TABLE.contains("ON DELETE CASCADE"));
        assert!(CREATE_VITALS_TABLE.contains("registration_id INTEGER NOT NULL UNIQUE"));
    }

    #[test]
    fn test_code_index_is_unique() {
        assert!(CREATE_CODE_INDEX.contains("UNIQUE INDEX"));
    }
}
