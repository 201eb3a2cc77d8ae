//! Core record types for roster.
//!
//! This module defines registrations, their optional vitals, and the closed
//! sets of values (regions, auxiliary bodies, blood groups) they refer to.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted first or last name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Largest accepted height in centimeters.
pub const MAX_HEIGHT_CM: f64 = 300.0;

/// Region a member is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// Upper River Region.
    #[serde(rename = "URR")]
    Urr,
    /// Lower River Region.
    #[serde(rename = "LRR")]
    Lrr,
    /// Central River Region.
    #[serde(rename = "CRR")]
    Crr,
    /// North Bank Region 1.
    #[serde(rename = "NBR1")]
    Nbr1,
    /// North Bank Region 2.
    #[serde(rename = "NBR2")]
    Nbr2,
    /// Banjul and Kombo.
    #[serde(rename = "BANJUL_KOMBO")]
    BanjulKombo,
    /// Foni.
    #[serde(rename = "FONI")]
    Foni,
}

impl Region {
    /// Every region, in display order.
    pub const ALL: [Self; 7] = [
        Self::Urr,
        Self::Lrr,
        Self::Crr,
        Self::Nbr1,
        Self::Nbr2,
        Self::BanjulKombo,
        Self::Foni,
    ];

    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Urr => "URR",
            Self::Lrr => "LRR",
            Self::Crr => "CRR",
            Self::Nbr1 => "NBR1",
            Self::Nbr2 => "NBR2",
            Self::BanjulKombo => "BANJUL_KOMBO",
            Self::Foni => "FONI",
        }
    }

    /// Human readable name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::BanjulKombo => "BANJUL KOMBO",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s) || r.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation("region", format!("unknown region {s:?}")))
    }
}

/// Auxiliary body (membership category) of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuxiliaryBody {
    /// Children.
    Atfal,
    /// Youth.
    Khuddam,
    /// Elders.
    Ansar,
    /// Non-member guests.
    Guest,
}

impl AuxiliaryBody {
    /// Every auxiliary body, in display order.
    pub const ALL: [Self; 4] = [Self::Atfal, Self::Khuddam, Self::Ansar, Self::Guest];

    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atfal => "Atfal",
            Self::Khuddam => "Khuddam",
            Self::Ansar => "Ansar",
            Self::Guest => "Guest",
        }
    }
}

impl fmt::Display for AuxiliaryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuxiliaryBody {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation("auxiliary_body", format!("unknown auxiliary body {s:?}")))
    }
}

/// ABO/Rh blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APos,
    /// A negative.
    #[serde(rename = "A-")]
    ANeg,
    /// B positive.
    #[serde(rename = "B+")]
    BPos,
    /// B negative.
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive.
    #[serde(rename = "O+")]
    OPos,
    /// O negative.
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodGroup {
    /// Every blood group.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    /// The value stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::validation("blood_group", format!("unknown blood group {s:?}")))
    }
}

/// A stored registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Row identifier, assigned by the storage layer.
    pub id: i64,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<NaiveDate>,
    /// Region the member belongs to.
    pub region: Region,
    /// Membership category.
    pub auxiliary_body: AuxiliaryBody,
    /// Permanent `<year>-<NNNN>` code. `None` only for legacy records
    /// awaiting backfill.
    pub unique_code: Option<String>,
    /// When the record was created. Legacy imports may lack it.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Full name as shown in listings.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on the given date.
    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let dob = self.dob?;
        let mut years = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Age in whole years today.
    #[must_use]
    pub fn age(&self) -> Option<u32> {
        self.age_on(Utc::now().date_naive())
    }

    /// Whether the record still waits for a code.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.unique_code.is_none()
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Input for a new registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth, when known.
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    /// Region the member belongs to.
    pub region: Region,
    /// Membership category.
    pub auxiliary_body: AuxiliaryBody,
}

impl NewRegistration {
    /// Create the input for a registration without a date of birth.
    #[must_use]
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        region: Region,
        auxiliary_body: AuxiliaryBody,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob: None,
            region,
            auxiliary_body,
        }
    }

    /// Set the date of birth.
    #[must_use]
    pub fn with_dob(mut self, dob: NaiveDate) -> Self {
        self.dob = Some(dob);
        self
    }

    /// Check field constraints and normalize names.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first rejected field.
    pub fn validated(mut self) -> Result<Self> {
        self.first_name = validate_name("first_name", &self.first_name)?;
        self.last_name = validate_name("last_name", &self.last_name)?;
        Ok(self)
    }
}

/// A legacy record as accepted by bulk import.
///
/// Legacy records never carry a code; they are picked up by backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRecord {
    /// Identity fields.
    #[serde(flatten)]
    pub registration: NewRegistration,
    /// Original creation time, if it was recorded.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Changes to apply to an existing registration.
///
/// `None` leaves the field untouched. The unique code is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationUpdate {
    /// New given name.
    pub first_name: Option<String>,
    /// New family name.
    pub last_name: Option<String>,
    /// New date of birth; `Some(None)` clears it.
    pub dob: Option<Option<NaiveDate>>,
    /// New region.
    pub region: Option<Region>,
    /// New membership category.
    pub auxiliary_body: Option<AuxiliaryBody>,
}

impl RegistrationUpdate {
    /// Apply the changes to a record, validating the new values.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a new name is rejected.
    pub fn apply_to(&self, registration: &mut Registration) -> Result<()> {
        if let Some(first) = &self.first_name {
            registration.first_name = validate_name("first_name", first)?;
        }
        if let Some(last) = &self.last_name {
            registration.last_name = validate_name("last_name", last)?;
        }
        if let Some(dob) = self.dob {
            registration.dob = dob;
        }
        if let Some(region) = self.region {
            registration.region = region;
        }
        if let Some(body) = self.auxiliary_body {
            registration.auxiliary_body = body;
        }
        Ok(())
    }
}

/// Biometric data attached to one registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Row identifier.
    pub id: i64,
    /// Owning registration.
    pub registration_id: i64,
    /// Blood group, when known.
    pub blood_group: Option<BloodGroup>,
    /// Height in centimeters, when known.
    pub height_cm: Option<f64>,
    /// When the vitals were first recorded.
    pub created_at: DateTime<Utc>,
    /// When the vitals were last written.
    pub updated_at: DateTime<Utc>,
}

/// Values to set on a registration's vitals. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VitalsUpdate {
    /// Blood group to record.
    pub blood_group: Option<BloodGroup>,
    /// Height in centimeters to record.
    pub height_cm: Option<f64>,
}

impl VitalsUpdate {
    /// Check the height range and round it to two decimals.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the height is outside 0-300 cm.
    pub fn validated(mut self) -> Result<Self> {
        if let Some(height) = self.height_cm {
            self.height_cm = Some(validate_height(height)?);
        }
        Ok(self)
    }
}

fn validate_name(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(
            field,
            format!("must be at most {MAX_NAME_LEN} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_height(height: f64) -> Result<f64> {
    if !(0.0..=MAX_HEIGHT_CM).contains(&height) {
        return Err(Error::validation(
            "height",
            format!("{height} is outside 0-{MAX_HEIGHT_CM} cm"),
        ));
    }
    Ok((height * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dob: Option<NaiveDate>) -> Registration {
        Registration {
            id: 1,
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            dob,
            region: Region::Urr,
            auxiliary_body: AuxiliaryBody::Khuddam,
            unique_code: None,
            created_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_registration_display() {
        assert_eq!(sample(None).to_string(), "John Doe");
        assert_eq!(sample(None).display_name(), "John Doe");
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let reg = sample(NaiveDate::from_ymd_opt(1990, 6, 15));
        let before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(reg.age_on(before), Some(34));
        assert_eq!(reg.age_on(on), Some(35));
    }

    #[test]
    fn test_age_without_dob() {
        assert!(sample(None).age().is_none());
    }

    #[test]
    fn test_age_with_future_dob() {
        let reg = sample(NaiveDate::from_ymd_opt(2030, 1, 1));
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(reg.age_on(today), None);
    }

    #[test]
    fn test_region_parse_and_display() {
        assert_eq!("URR".parse::<Region>().unwrap(), Region::Urr);
        assert_eq!("banjul kombo".parse::<Region>().unwrap(), Region::BanjulKombo);
        assert_eq!("BANJUL_KOMBO".parse::<Region>().unwrap(), Region::BanjulKombo);
        assert_eq!(Region::BanjulKombo.to_string(), "BANJUL_KOMBO");
        assert_eq!(Region::BanjulKombo.label(), "BANJUL KOMBO");
        assert!("Mars".parse::<Region>().is_err());
    }

    #[test]
    fn test_auxiliary_body_parse() {
        assert_eq!("ansar".parse::<AuxiliaryBody>().unwrap(), AuxiliaryBody::Ansar);
        let err = "Elder".parse::<AuxiliaryBody>().unwrap_err();
        assert!(err.to_string().contains("auxiliary_body"));
    }

    #[test]
    fn test_blood_group_parse() {
        for group in BloodGroup::ALL {
            assert_eq!(group.as_str().parse::<BloodGroup>().unwrap(), group);
        }
        assert!("C+".parse::<BloodGroup>().is_err());
    }

    #[test]
    fn test_blood_group_serde_uses_symbol() {
        let json = serde_json::to_string(&BloodGroup::AbNeg).unwrap();
        assert_eq!(json, "\"AB-\"");
    }

    #[test]
    fn test_new_registration_trims_names() {
        let reg = NewRegistration::new("  Jane ", "Smith", Region::Lrr, AuxiliaryBody::Atfal)
            .validated()
            .unwrap();
        assert_eq!(reg.first_name, "Jane");
    }

    #[test]
    fn test_new_registration_rejects_blank_name() {
        let err = NewRegistration::new("   ", "Smith", Region::Lrr, AuxiliaryBody::Atfal)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "first_name", .. }));
    }

    #[test]
    fn test_new_registration_rejects_long_name() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = NewRegistration::new("Jane", long, Region::Lrr, AuxiliaryBody::Atfal)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "last_name", .. }));
    }

    #[test]
    fn test_update_applies_only_given_fields() {
        let mut reg = sample(NaiveDate::from_ymd_opt(1990, 1, 1));
        let update = RegistrationUpdate {
            last_name: Some("Updated".to_string()),
            region: Some(Region::Lrr),
            ..RegistrationUpdate::default()
        };
        update.apply_to(&mut reg).unwrap();
        assert_eq!(reg.first_name, "John");
        assert_eq!(reg.last_name, "Updated");
        assert_eq!(reg.region, Region::Lrr);
        assert!(reg.dob.is_some());
    }

    #[test]
    fn test_update_can_clear_dob() {
        let mut reg = sample(NaiveDate::from_ymd_opt(1990, 1, 1));
        let update = RegistrationUpdate {
            dob: Some(None),
            ..RegistrationUpdate::default()
        };
        update.apply_to(&mut reg).unwrap();
        assert!(reg.dob.is_none());
    }

    #[test]
    fn test_vitals_height_bounds() {
        let ok = VitalsUpdate {
            height_cm: Some(175.555),
            ..VitalsUpdate::default()
        };
        assert_eq!(ok.validated().unwrap().height_cm, Some(175.56));

        for bad in [-1.0, 300.01] {
            let update = VitalsUpdate {
                height_cm: Some(bad),
                ..VitalsUpdate::default()
            };
            assert!(update.validated().is_err());
        }
    }

    #[test]
    fn test_legacy_record_deserialize() {
        let json = r#"{
            "first_name": "Awa",
            "last_name": "Jallow",
            "region": "FONI",
            "auxiliary_body": "Guest",
            "created_at": "2023-04-01T10:00:00Z"
        }"#;
        let record: LegacyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.registration.region, Region::Foni);
        assert!(record.registration.dob.is_none());
        assert_eq!(record.created_at.unwrap().year(), 2023);
    }
}
