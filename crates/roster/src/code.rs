//! Unique code assignment.
//!
//! Every registration carries a permanent code of the form `<year>-<NNNN>`,
//! where the year is the creation year of the record and `NNNN` is a
//! sequence number, zero-padded to at least four digits, that is unique
//! within the year. The next number is derived by scanning the codes that
//! currently exist; there is no persisted counter. The unique index on the
//! code column is the final arbiter when two writers race past the scan.
//!
//! Codes that do not parse (legacy data) are skipped by every scan and are
//! never rewritten.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Minimum width of the zero-padded sequence part.
pub const MIN_SEQUENCE_WIDTH: usize = 4;

/// Exact shape of a well-formed code.
pub const CODE_PATTERN: &str = r"^[0-9]{4}-[0-9]{4,}$";

static CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CODE_PATTERN).expect("code pattern is valid"));

/// A well-formed registration code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueCode {
    year: i32,
    sequence: u64,
}

impl UniqueCode {
    /// Create a code for the given year and sequence number.
    #[must_use]
    pub fn new(year: i32, sequence: u64) -> Self {
        Self { year, sequence }
    }

    /// The year scope of the code.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The sequence number within the year.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The following code in the same year, `None` once the sequence
    /// space is used up.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Some(Self::new(self.year, self.sequence.checked_add(1)?))
    }

    /// Check whether a string has the exact `<year>-<NNNN>` shape.
    #[must_use]
    pub fn is_well_formed(code: &str) -> bool {
        CODE_REGEX.is_match(code)
    }
}

impl fmt::Display for UniqueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:0width$}",
            self.year,
            self.sequence,
            width = MIN_SEQUENCE_WIDTH
        )
    }
}

impl FromStr for UniqueCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedCode {
            code: s.to_string(),
        };
        if !Self::is_well_formed(s) {
            return Err(malformed());
        }
        let (year, sequence) = s.split_once('-').ok_or_else(malformed)?;
        Ok(Self {
            year: year.parse().map_err(|_| malformed())?,
            sequence: sequence.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for UniqueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The `"<year>-"` prefix shared by all codes of a year.
#[must_use]
pub fn year_prefix(year: i32) -> String {
    format!("{year:04}-")
}

/// The year a record's code belongs to.
///
/// Records without a creation time fall into the current year.
#[must_use]
pub fn code_year(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i32 {
    created_at.unwrap_or(now).year()
}

/// Sequence number of `code` if it belongs to `year`.
///
/// Any non-empty run of ASCII digits after the prefix counts, so legacy
/// codes padded differently still block their number. Everything else is
/// malformed and yields `None`.
#[must_use]
pub fn sequence_in_year(code: &str, year: i32) -> Option<u64> {
    let suffix = code.strip_prefix(year_prefix(year).as_str())?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        trace!(code, "Ignoring malformed code");
        return None;
    }
    match suffix.parse() {
        Ok(sequence) => Some(sequence),
        Err(_) => {
            trace!(code, "Ignoring out-of-range code");
            None
        }
    }
}

/// Highest sequence number among the codes of `year`.
pub fn max_sequence<'a>(codes: impl IntoIterator<Item = &'a str>, year: i32) -> Option<u64> {
    codes
        .into_iter()
        .filter_map(|code| sequence_in_year(code, year))
        .max()
}

/// Queries the engine needs from the persistence layer.
pub trait CodeIndex {
    /// All codes starting with `prefix`, skipping the registration `exclude`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn codes_with_prefix(&self, prefix: &str, exclude: Option<i64>) -> Result<Vec<String>>;

    /// Number of registrations created in `year`, skipping `exclude`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn count_created_in_year(&self, year: i32, exclude: Option<i64>) -> Result<u64>;

    /// Whether any registration currently holds `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn code_exists(&self, code: &str) -> Result<bool>;
}

/// Pick the next free code for a single registration in `year`.
///
/// Starts one past the highest well-formed sequence of the year. When the
/// year has no usable codes yet, starts one past the number of
/// registrations created that year. Steps forward past codes that are
/// already taken.
///
/// `exclude` is the registration being assigned, if it is already stored.
///
/// # Errors
///
/// Returns an error if the index cannot be queried, or
/// [`Error::SequenceExhausted`] if the year has no sequence numbers left.
pub fn next_code<I>(index: &I, year: i32, exclude: Option<i64>) -> Result<UniqueCode>
where
    I: CodeIndex + ?Sized,
{
    let existing = index.codes_with_prefix(&year_prefix(year), exclude)?;
    let start = if let Some(max) = max_sequence(existing.iter().map(String::as_str), year) {
        max.checked_add(1)
    } else {
        let count = index.count_created_in_year(year, exclude)?;
        debug!(year, count, "No usable codes for year, starting from record count");
        count.checked_add(1)
    }
    .ok_or(Error::SequenceExhausted { year })?;

    let mut candidate = UniqueCode::new(year, start);
    while index.code_exists(&candidate.to_string())? {
        debug!(code = %candidate, "Candidate code taken, trying next");
        candidate = candidate.next().ok_or(Error::SequenceExhausted { year })?;
    }
    Ok(candidate)
}

/// A registration waiting for a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRecord {
    /// Registration id.
    pub id: i64,
    /// Creation time, if recorded.
    pub created_at: Option<DateTime<Utc>>,
}

/// A code chosen for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// Registration id.
    pub id: i64,
    /// The code it receives.
    pub code: UniqueCode,
}

/// Number every pending record, year by year.
///
/// Years are handled in ascending order. Within a year, records are ordered
/// by creation time and then id, with undated records last, and receive
/// consecutive numbers starting one past the highest well-formed sequence
/// already used that year.
///
/// # Errors
///
/// Returns an error if the index cannot be queried, or
/// [`Error::SequenceExhausted`] if the year has no sequence numbers left.
pub fn plan_backfill<I>(
    index: &I,
    pending: &[PendingRecord],
    now: DateTime<Utc>,
) -> Result<Vec<Assignment>>
where
    I: CodeIndex + ?Sized,
{
    let mut by_year: BTreeMap<i32, Vec<PendingRecord>> = BTreeMap::new();
    for record in pending {
        by_year
            .entry(code_year(record.created_at, now))
            .or_default()
            .push(*record);
    }

    let mut plan = Vec::with_capacity(pending.len());
    for (year, mut records) in by_year {
        records.sort_by_key(|r| (r.created_at.is_none(), r.created_at, r.id));

        let existing = index.codes_with_prefix(&year_prefix(year), None)?;
        let max = max_sequence(existing.iter().map(String::as_str), year).unwrap_or(0);
        debug!(year, max, pending = records.len(), "Planning backfill for year");

        let mut sequence = max;
        for record in records {
            sequence = sequence
                .checked_add(1)
                .ok_or(Error::SequenceExhausted { year })?;
            plan.push(Assignment {
                id: record.id,
                code: UniqueCode::new(year, sequence),
            });
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Index over an in-memory list of `(id, code, created_at)` rows.
    #[derive(Debug, Default)]
    struct MemoryIndex {
        rows: Vec<(i64, Option<String>, Option<DateTime<Utc>>)>,
    }

    impl MemoryIndex {
        fn with(mut self, id: i64, code: Option<&str>, year: Option<i32>) -> Self {
            let created = year.map(|y| Utc.with_ymd_and_hms(y, 3, 1, 0, 0, 0).unwrap());
            self.rows.push((id, code.map(str::to_string), created));
            self
        }
    }

    impl CodeIndex for MemoryIndex {
        fn codes_with_prefix(&self, prefix: &str, exclude: Option<i64>) -> Result<Vec<String>> {
            Ok(self
                .rows
                .iter()
                .filter(|(id, _, _)| Some(*id) != exclude)
                .filter_map(|(_, code, _)| code.clone())
                .filter(|code| code.starts_with(prefix))
                .collect())
        }

        fn count_created_in_year(&self, year: i32, exclude: Option<i64>) -> Result<u64> {
            Ok(self
                .rows
                .iter()
                .filter(|(id, _, created)| {
                    Some(*id) != exclude && created.is_some_and(|c| c.year() == year)
                })
                .count() as u64)
        }

        fn code_exists(&self, code: &str) -> Result<bool> {
            Ok(self.rows.iter().any(|(_, c, _)| c.as_deref() == Some(code)))
        }
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_display_pads_to_four_digits() {
        assert_eq!(UniqueCode::new(2025, 1).to_string(), "2025-0001");
        assert_eq!(UniqueCode::new(2025, 42).to_string(), "2025-0042");
        assert_eq!(UniqueCode::new(2025, 10_000).to_string(), "2025-10000");
    }

    #[test]
    fn test_parse_well_formed() {
        let code: UniqueCode = "2025-0042".parse().unwrap();
        assert_eq!(code.year(), 2025);
        assert_eq!(code.sequence(), 42);
        let wide: UniqueCode = "2025-10000".parse().unwrap();
        assert_eq!(wide.sequence(), 10_000);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["2025-abc", "2025-12", "25-0001", "2025_0001", "", "2025-0001x"] {
            let err = bad.parse::<UniqueCode>().unwrap_err();
            assert!(matches!(err, Error::MalformedCode { .. }), "{bad}");
        }
    }

    #[test]
    fn test_serialize_as_string() {
        let json = serde_json::to_string(&UniqueCode::new(2024, 7)).unwrap();
        assert_eq!(json, "\"2024-0007\"");
    }

    #[test]
    fn test_sequence_in_year() {
        assert_eq!(sequence_in_year("2025-0003", 2025), Some(3));
        assert_eq!(sequence_in_year("2025-7", 2025), Some(7));
        assert_eq!(sequence_in_year("2024-0003", 2025), None);
        assert_eq!(sequence_in_year("2025-abc", 2025), None);
        assert_eq!(sequence_in_year("2025-", 2025), None);
        assert_eq!(sequence_in_year("2025-99999999999999999999999", 2025), None);
    }

    #[test]
    fn test_code_year_defaults_to_now() {
        let now = at(2026, 5, 1);
        assert_eq!(code_year(Some(at(2023, 1, 1)), now), 2023);
        assert_eq!(code_year(None, now), 2026);
    }

    #[test]
    fn test_next_code_follows_max() {
        let index = MemoryIndex::default().with(1, Some("2025-0003"), Some(2025));
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-0004");
    }

    #[test]
    fn test_next_code_ignores_malformed() {
        let index = MemoryIndex::default()
            .with(1, Some("2025-abc"), Some(2025))
            .with(2, Some("2025-0002"), Some(2025));
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-0003");
    }

    #[test]
    fn test_next_code_is_year_scoped() {
        let index = MemoryIndex::default().with(1, Some("2024-0050"), Some(2024));
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-0001");
    }

    #[test]
    fn test_next_code_falls_back_to_count() {
        let index = MemoryIndex::default()
            .with(1, None, Some(2025))
            .with(2, Some("2025-junk"), Some(2025))
            .with(3, None, Some(2024));
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-0003");
    }

    #[test]
    fn test_next_code_excludes_self() {
        let index = MemoryIndex::default()
            .with(1, Some("2025-0001"), Some(2025))
            .with(2, None, Some(2025));
        assert_eq!(next_code(&index, 2025, Some(2)).unwrap().to_string(), "2025-0002");
    }

    #[test]
    fn test_next_code_skips_taken_candidates() {
        // the excluded record hides its code from the scan, so the count
        // fallback lands on a code that is still taken
        let index = MemoryIndex::default()
            .with(1, Some("2025-0002"), Some(2025))
            .with(2, None, Some(2025));
        assert_eq!(next_code(&index, 2025, Some(1)).unwrap().to_string(), "2025-0003");
    }

    #[test]
    fn test_next_code_counts_prefix_matches_regardless_of_date() {
        let index = MemoryIndex::default()
            .with(1, Some("bad"), Some(2025))
            .with(2, Some("2025-0002"), None);
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-0003");
    }

    #[test]
    fn test_next_code_widens_past_9999() {
        let index = MemoryIndex::default().with(1, Some("2025-9999"), Some(2025));
        assert_eq!(next_code(&index, 2025, None).unwrap().to_string(), "2025-10000");
    }

    #[test]
    fn test_next_code_fails_when_sequence_space_is_used_up() {
        let last = format!("2025-{}", u64::MAX);
        let index = MemoryIndex::default().with(1, Some(&last), Some(2025));

        let err = next_code(&index, 2025, None).unwrap_err();
        assert!(matches!(err, Error::SequenceExhausted { year: 2025 }));
    }

    #[test]
    fn test_unique_code_next_stops_at_max() {
        assert_eq!(
            UniqueCode::new(2025, 7).next(),
            Some(UniqueCode::new(2025, 8))
        );
        assert!(UniqueCode::new(2025, u64::MAX).next().is_none());
    }

    #[test]
    fn test_plan_backfill_fails_instead_of_repeating_codes() {
        let index = MemoryIndex::default()
            .with(1, Some(&format!("2025-{}", u64::MAX - 1)), Some(2025));
        let pending = [
            PendingRecord { id: 2, created_at: Some(at(2025, 1, 1)) },
            PendingRecord { id: 3, created_at: Some(at(2025, 1, 2)) },
        ];

        let err = plan_backfill(&index, &pending, at(2026, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::SequenceExhausted { year: 2025 }));
    }

    #[test]
    fn test_plan_backfill_orders_by_creation() {
        let index = MemoryIndex::default();
        let pending = [
            PendingRecord { id: 3, created_at: Some(at(2025, 3, 1)) },
            PendingRecord { id: 1, created_at: Some(at(2025, 1, 1)) },
            PendingRecord { id: 2, created_at: Some(at(2025, 2, 1)) },
        ];
        let plan = plan_backfill(&index, &pending, at(2026, 1, 1)).unwrap();
        let codes: Vec<_> = plan.iter().map(|a| (a.id, a.code.to_string())).collect();
        assert_eq!(
            codes,
            vec![
                (1, "2025-0001".to_string()),
                (2, "2025-0002".to_string()),
                (3, "2025-0003".to_string()),
            ]
        );
    }

    #[test]
    fn test_plan_backfill_breaks_ties_by_id() {
        let index = MemoryIndex::default();
        let same = Some(at(2025, 1, 1));
        let pending = [
            PendingRecord { id: 9, created_at: same },
            PendingRecord { id: 4, created_at: same },
        ];
        let plan = plan_backfill(&index, &pending, at(2026, 1, 1)).unwrap();
        assert_eq!(plan[0].id, 4);
        assert_eq!(plan[1].id, 9);
    }

    #[test]
    fn test_plan_backfill_continues_after_existing() {
        let index = MemoryIndex::default()
            .with(10, Some("2024-0005"), Some(2024))
            .with(11, Some("2024-oops"), Some(2024));
        let pending = [
            PendingRecord { id: 2, created_at: Some(at(2025, 6, 1)) },
            PendingRecord { id: 1, created_at: Some(at(2024, 6, 1)) },
        ];
        let plan = plan_backfill(&index, &pending, at(2026, 1, 1)).unwrap();
        assert_eq!(plan[0].code.to_string(), "2024-0006");
        assert_eq!(plan[1].code.to_string(), "2025-0001");
    }

    #[test]
    fn test_plan_backfill_undated_use_current_year_and_go_last() {
        let index = MemoryIndex::default();
        let pending = [
            PendingRecord { id: 1, created_at: None },
            PendingRecord { id: 2, created_at: Some(at(2026, 2, 1)) },
        ];
        let plan = plan_backfill(&index, &pending, at(2026, 9, 1)).unwrap();
        assert_eq!(plan[0].id, 2);
        assert_eq!(plan[0].code.to_string(), "2026-0001");
        assert_eq!(plan[1].id, 1);
        assert_eq!(plan[1].code.to_string(), "2026-0002");
    }

    #[test]
    fn test_plan_backfill_empty() {
        let plan = plan_backfill(&MemoryIndex::default(), &[], Utc::now()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_well_formed() {
        assert!(UniqueCode::is_well_formed("2025-0001"));
        assert!(UniqueCode::is_well_formed("2025-10000"));
        assert!(!UniqueCode::is_well_formed("2025-001"));
        assert!(!UniqueCode::is_well_formed("2025-٠٠٠١"));
    }
}
