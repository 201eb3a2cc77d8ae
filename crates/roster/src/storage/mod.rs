//! Storage layer for roster.
//!
//! This module provides `SQLite`-based persistent storage for registrations
//! and their vitals, and drives code assignment at save time and in bulk.

mod index;
pub mod migrations;
pub mod schema;

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::code::{self, code_year, year_prefix, Assignment, PendingRecord, UniqueCode};
use crate::error::{Error, Result};
use crate::model::{
    AuxiliaryBody, LegacyRecord, NewRegistration, Region, Registration, RegistrationUpdate,
    Vitals, VitalsUpdate,
};

/// How many times a save is retried after losing a code race.
pub const DEFAULT_ASSIGN_ATTEMPTS: u32 = 3;

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const REGISTRATION_COLUMNS: &str = "id, first_name, last_name, dob, region, auxiliary_body, \
                                    unique_code, created_at, updated_at";

const VITALS_COLUMNS: &str = "id, registration_id, blood_group, height, created_at, updated_at";

/// Storage engine for the roster.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Registration intake with code assignment on save
/// - Search and filtering for listings
/// - Vitals attached one-to-one to registrations
/// - Atomic bulk backfill of missing codes
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Attempts per save when the unique index rejects a code.
    assign_attempts: u32,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn,
            assign_attempts: DEFAULT_ASSIGN_ATTEMPTS,
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            assign_attempts: DEFAULT_ASSIGN_ATTEMPTS,
        })
    }

    /// Set how many times a save is attempted when its code is taken by a
    /// concurrent writer. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_assign_attempts(mut self, attempts: u32) -> Self {
        self.assign_attempts = attempts.max(1);
        self
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Registrations ===

    /// Store a new registration and assign its code.
    ///
    /// The scan and the insert share one immediate transaction, so other
    /// writers wait for it. If the unique index still rejects the code, the
    /// whole assignment is redone from a fresh scan.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, [`Error::CodeConflict`] if
    /// every attempt lost the race, or a database error.
    pub fn create_registration(&mut self, new: NewRegistration) -> Result<Registration> {
        let new = new.validated()?;
        let attempts = self.assign_attempts;
        retry_on_code_conflict(attempts, || {
            let now = current_time();
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let code = code::next_code(&*tx, code_year(Some(now), now), None)?;
            let id = insert_registration(&tx, &new, Some(now), Some(code), now)?;
            tx.commit()?;

            info!(id, code = %code, "Registered {} {}", new.first_name, new.last_name);
            Ok(Registration {
                id,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                dob: new.dob,
                region: new.region,
                auxiliary_body: new.auxiliary_body,
                unique_code: Some(code.to_string()),
                created_at: Some(now),
                updated_at: now,
            })
        })
    }

    /// Store one legacy record without assigning a code.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input, or a database error.
    pub fn import_registration(
        &self,
        new: NewRegistration,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Registration> {
        let new = new.validated()?;
        let now = current_time();
        let created_at = created_at.map(|t| t.trunc_subsecs(6));
        let id = insert_registration(&self.conn, &new, created_at, None, now)?;
        debug!(id, "Imported legacy registration");
        Ok(Registration {
            id,
            first_name: new.first_name,
            last_name: new.last_name,
            dob: new.dob,
            region: new.region,
            auxiliary_body: new.auxiliary_body,
            unique_code: None,
            created_at,
            updated_at: now,
        })
    }

    /// Store legacy records without assigning codes.
    ///
    /// All records are written in one transaction. Their codes are assigned
    /// later by [`Storage::backfill_codes`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for the first bad record, or a database
    /// error. Nothing is stored in either case.
    pub fn import_registrations(&mut self, records: Vec<LegacyRecord>) -> Result<Vec<i64>> {
        let now = current_time();
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let new = record.registration.validated()?;
            let created_at = record.created_at.map(|t| t.trunc_subsecs(6));
            ids.push(insert_registration(&tx, &new, created_at, None, now)?);
        }
        tx.commit()?;
        info!(count = ids.len(), "Imported legacy registrations");
        Ok(ids)
    }

    /// Get a registration by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_registration(&self, id: i64) -> Result<Option<Registration>> {
        get_registration(&self.conn, id)
    }

    /// Get a registration that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such registration.
    pub fn require_registration(&self, id: i64) -> Result<Registration> {
        self.get_registration(id)?
            .ok_or_else(|| Error::registration_not_found(id))
    }

    /// Apply changes to a registration and save it.
    ///
    /// An existing code is never changed. A record saved without a code
    /// receives one, in the year it was created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], a validation error, [`Error::CodeConflict`]
    /// if every attempt lost the race for a code, or a database error.
    pub fn update_registration(
        &mut self,
        id: i64,
        update: &RegistrationUpdate,
    ) -> Result<Registration> {
        let attempts = self.assign_attempts;
        retry_on_code_conflict(attempts, || {
            let now = current_time();
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut registration =
                get_registration(&tx, id)?.ok_or_else(|| Error::registration_not_found(id))?;
            update.apply_to(&mut registration)?;
            registration.updated_at = now;

            let assigned = if registration.unique_code.is_none() {
                let code = code::next_code(&*tx, code_year(registration.created_at, now), Some(id))?;
                registration.unique_code = Some(code.to_string());
                Some(code)
            } else {
                None
            };

            tx.execute(
                r"
                UPDATE registrations SET
                    first_name = ?1, last_name = ?2, dob = ?3, region = ?4,
                    auxiliary_body = ?5, updated_at = ?6,
                    unique_code = COALESCE(unique_code, ?7)
                WHERE id = ?8
                ",
                params![
                    registration.first_name,
                    registration.last_name,
                    registration.dob.map(|d| d.to_string()),
                    registration.region.as_str(),
                    registration.auxiliary_body.as_str(),
                    format_timestamp(now),
                    assigned.map(|c| c.to_string()),
                    id,
                ],
            )
            .map_err(|err| code_write_error(err, assigned))?;
            tx.commit()?;

            if let Some(code) = assigned {
                info!(id, code = %code, "Assigned code on save");
            }
            debug!(id, "Updated registration");
            Ok(registration)
        })
    }

    /// Delete a registration and its vitals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no such registration.
    pub fn delete_registration(&self, id: i64) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM registrations WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(Error::registration_not_found(id));
        }
        info!(id, "Deleted registration");
        Ok(())
    }

    /// List registrations matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_registrations(&self, filter: &RegistrationFilter) -> Result<Vec<Registration>> {
        let query = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));
        let limit = filter
            .limit
            .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {REGISTRATION_COLUMNS} FROM registrations
            WHERE (?1 IS NULL
                   OR first_name LIKE ?1 ESCAPE '\'
                   OR last_name LIKE ?1 ESCAPE '\'
                   OR unique_code LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR region = ?2)
              AND (?3 IS NULL OR auxiliary_body = ?3)
              AND (?4 IS NULL OR substr(created_at, 1, 5) = ?4)
              AND (?5 = 0 OR unique_code IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT ?6
            "
        ))?;

        let registrations = stmt
            .query_map(
                params![
                    query,
                    filter.region.map(Region::as_str),
                    filter.auxiliary_body.map(AuxiliaryBody::as_str),
                    filter.year.map(year_prefix),
                    filter.pending_only,
                    limit,
                ],
                row_to_registration,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(registrations)
    }

    /// Count total registrations in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM registrations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get roster statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<RosterStats> {
        let total = self.count()?;
        let pending: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM registrations WHERE unique_code IS NULL",
            [],
            |row| row.get(0),
        )?;
        let with_vitals: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vitals", [], |row| row.get(0))?;

        let by_region = self
            .group_counts("region")?
            .into_iter()
            .map(|(name, count)| {
                let label = name
                    .parse::<Region>()
                    .map_or_else(|_| name.clone(), |r| r.label().to_string());
                CategoryCount { name, label, count }
            })
            .collect();
        let by_auxiliary_body = self
            .group_counts("auxiliary_body")?
            .into_iter()
            .map(|(name, count)| CategoryCount {
                label: name.clone(),
                name,
                count,
            })
            .collect();

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(RosterStats {
            total,
            coded: total - pending,
            pending,
            with_vitals,
            by_region,
            by_auxiliary_body,
            db_size_bytes,
        })
    }

    /// Row counts per distinct value of `column`, largest first.
    fn group_counts(&self, column: &'static str) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM registrations \
             GROUP BY {column} ORDER BY n DESC, {column} ASC"
        ))?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    // === Vitals ===

    /// Get the vitals of a registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_vitals(&self, registration_id: i64) -> Result<Option<Vitals>> {
        get_vitals(&self.conn, registration_id)
    }

    /// Record vitals for a registration, creating them if needed.
    ///
    /// Fields left as `None` in the update keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the registration does not exist, a
    /// validation error for an out-of-range height, or a database error.
    pub fn upsert_vitals(&mut self, registration_id: i64, update: VitalsUpdate) -> Result<Vitals> {
        let update = update.validated()?;
        let now = format_timestamp(current_time());
        let tx = self.conn.transaction()?;
        if get_registration(&tx, registration_id)?.is_none() {
            return Err(Error::registration_not_found(registration_id));
        }

        tx.execute(
            r"
            INSERT INTO vitals (registration_id, blood_group, height, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(registration_id) DO UPDATE SET
                blood_group = COALESCE(excluded.blood_group, blood_group),
                height = COALESCE(excluded.height, height),
                updated_at = excluded.updated_at
            ",
            params![
                registration_id,
                update.blood_group.map(|g| g.as_str()),
                update.height_cm,
                now,
            ],
        )?;
        let vitals = get_vitals(&tx, registration_id)?
            .ok_or_else(|| Error::internal("vitals missing right after upsert"))?;
        tx.commit()?;

        debug!(registration_id, "Saved vitals");
        Ok(vitals)
    }

    /// Remove the vitals of a registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the registration or its vitals do not exist.
    pub fn delete_vitals(&self, registration_id: i64) -> Result<()> {
        if self.get_registration(registration_id)?.is_none() {
            return Err(Error::registration_not_found(registration_id));
        }
        let affected = self.conn.execute(
            "DELETE FROM vitals WHERE registration_id = ?1",
            [registration_id],
        )?;
        if affected == 0 {
            return Err(Error::vitals_not_found(registration_id));
        }
        info!(registration_id, "Deleted vitals");
        Ok(())
    }

    // === Backfill ===

    /// Number of registrations still waiting for a code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_pending(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM registrations WHERE unique_code IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Compute the codes a backfill would assign, without writing anything.
    ///
    /// Reports the total and the first `sample` assignments in the order a
    /// live run would make them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn preview_backfill(&self, sample: usize) -> Result<BackfillPreview> {
        let pending = pending_records(&self.conn)?;
        let plan = code::plan_backfill(&self.conn, &pending, current_time())?;

        let mut proposed = Vec::with_capacity(sample.min(plan.len()));
        for assignment in plan.iter().take(sample) {
            let registration = self.require_registration(assignment.id)?;
            proposed.push(ProposedCode {
                id: assignment.id,
                name: registration.display_name(),
                code: assignment.code,
            });
        }

        Ok(BackfillPreview {
            total: plan.len(),
            sample: proposed,
        })
    }

    /// Assign codes to every registration that lacks one.
    ///
    /// Runs in a single immediate transaction: either every pending record
    /// receives its code or none does. Running it again right after is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackfillFailed`] wrapping the cause; nothing is
    /// committed in that case.
    pub fn backfill_codes(&mut self) -> Result<BackfillReport> {
        let report = self.run_backfill(current_time()).map_err(|err| {
            warn!(error = %err, "Backfill failed, rolled back");
            Error::backfill_failed(err)
        })?;
        info!(updated = report.updated, "Backfilled unique codes");
        Ok(report)
    }

    fn run_backfill(&mut self, now: DateTime<Utc>) -> Result<BackfillReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let pending = pending_records(&tx)?;
        if pending.is_empty() {
            debug!("No registrations waiting for a code");
            return Ok(BackfillReport::default());
        }

        let plan = code::plan_backfill(&*tx, &pending, now)?;
        {
            let mut stmt = tx.prepare(
                "UPDATE registrations SET unique_code = ?1 WHERE id = ?2 AND unique_code IS NULL",
            )?;
            for Assignment { id, code } in &plan {
                let affected = stmt
                    .execute(params![code.to_string(), id])
                    .map_err(|err| code_write_error(err, Some(*code)))?;
                if affected != 1 {
                    return Err(Error::internal(format!(
                        "registration {id} changed during backfill"
                    )));
                }
            }
        }
        tx.commit()?;

        Ok(BackfillReport {
            updated: plan.len(),
            first: plan.first().map(|a| a.code),
            last: plan.last().map(|a| a.code),
        })
    }
}

/// Filter for listing registrations. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationFilter {
    /// Case-insensitive substring of first name, last name or code.
    pub query: Option<String>,
    /// Only this region.
    pub region: Option<Region>,
    /// Only this auxiliary body.
    pub auxiliary_body: Option<AuxiliaryBody>,
    /// Only records created in this year.
    pub year: Option<i32>,
    /// Only records still waiting for a code.
    pub pending_only: bool,
    /// Maximum number of results; `None` for all.
    pub limit: Option<usize>,
}

/// Number of registrations sharing one category value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Stored value.
    pub name: String,
    /// Human readable value.
    pub label: String,
    /// Number of registrations.
    pub count: i64,
}

/// Statistics about the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterStats {
    /// Total number of registrations.
    pub total: i64,
    /// Registrations with a code.
    pub coded: i64,
    /// Registrations waiting for backfill.
    pub pending: i64,
    /// Registrations with vitals recorded.
    pub with_vitals: i64,
    /// Counts per region, largest first.
    pub by_region: Vec<CategoryCount>,
    /// Counts per auxiliary body, largest first.
    pub by_auxiliary_body: Vec<CategoryCount>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// One line of a backfill dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedCode {
    /// Registration id.
    pub id: i64,
    /// Full name of the member.
    pub name: String,
    /// Code a live run would assign.
    pub code: UniqueCode,
}

/// Result of a backfill dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillPreview {
    /// Number of registrations that would receive a code.
    pub total: usize,
    /// The first few proposed assignments.
    pub sample: Vec<ProposedCode>,
}

/// Result of a committed backfill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Number of registrations that received a code.
    pub updated: usize,
    /// First code assigned.
    pub first: Option<UniqueCode>,
    /// Last code assigned.
    pub last: Option<UniqueCode>,
}

/// Run `op` until it succeeds, fails with something other than a code
/// conflict, or `attempts` runs out.
fn retry_on_code_conflict<T>(attempts: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(err) if err.is_code_conflict() && attempt < attempts => {
                warn!(attempt, error = %err, "Lost race for a unique code, rescanning");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Map a write error, turning a rejection by the code index into
/// [`Error::CodeConflict`].
fn code_write_error(err: rusqlite::Error, code: Option<UniqueCode>) -> Error {
    match (&err, code) {
        (rusqlite::Error::SqliteFailure(e, Some(message)), Some(code))
            if e.code == ErrorCode::ConstraintViolation && message.contains("unique_code") =>
        {
            Error::CodeConflict {
                code: code.to_string(),
            }
        }
        _ => err.into(),
    }
}

fn insert_registration(
    conn: &Connection,
    new: &NewRegistration,
    created_at: Option<DateTime<Utc>>,
    code: Option<UniqueCode>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO registrations
            (first_name, last_name, dob, region, auxiliary_body, unique_code, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            new.first_name,
            new.last_name,
            new.dob.map(|d| d.to_string()),
            new.region.as_str(),
            new.auxiliary_body.as_str(),
            code.map(|c| c.to_string()),
            created_at.map(format_timestamp),
            format_timestamp(now),
        ],
    )
    .map_err(|err| code_write_error(err, code))?;
    Ok(conn.last_insert_rowid())
}

fn get_registration(conn: &Connection, id: i64) -> Result<Option<Registration>> {
    let registration = conn
        .query_row(
            &format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?1"),
            [id],
            row_to_registration,
        )
        .optional()?;
    Ok(registration)
}

fn get_vitals(conn: &Connection, registration_id: i64) -> Result<Option<Vitals>> {
    let vitals = conn
        .query_row(
            &format!("SELECT {VITALS_COLUMNS} FROM vitals WHERE registration_id = ?1"),
            [registration_id],
            row_to_vitals,
        )
        .optional()?;
    Ok(vitals)
}

fn pending_records(conn: &Connection) -> Result<Vec<PendingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, created_at FROM registrations WHERE unique_code IS NULL ORDER BY id",
    )?;
    let pending = stmt
        .query_map([], |row| {
            Ok(PendingRecord {
                id: row.get(0)?,
                created_at: optional_timestamp(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(pending)
}

/// Current time at the precision timestamps are stored with.
fn current_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 in UTC, so text order matches time order.
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Parse a text column into a domain value.
fn parsed<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

fn row_to_registration(row: &Row) -> rusqlite::Result<Registration> {
    let dob: Option<String> = row.get(3)?;
    let dob = dob
        .map(|d| {
            NaiveDate::from_str(&d)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Registration {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        dob,
        region: parsed(row, 4)?,
        auxiliary_body: parsed(row, 5)?,
        unique_code: row.get(6)?,
        created_at: optional_timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn row_to_vitals(row: &Row) -> rusqlite::Result<Vitals> {
    let blood_group: Option<String> = row.get(2)?;
    let blood_group = blood_group
        .map(|g| {
            g.parse().map_err(|e: Error| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.to_string().into())
            })
        })
        .transpose()?;

    Ok(Vitals {
        id: row.get(0)?,
        registration_id: row.get(1)?,
        blood_group,
        height_cm: row.get(3)?,
        created_at: timestamp(row, 4)?,
        updated_at: timestamp(row, 5)?,
    })
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
