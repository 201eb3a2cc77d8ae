//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::model::{AuxiliaryBody, BloodGroup, Region, RegistrationUpdate, VitalsUpdate};
use crate::storage::RegistrationFilter;

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Given name
    #[arg(long = "first")]
    pub first_name: String,

    /// Family name
    #[arg(long = "last")]
    pub last_name: String,

    /// Region the member belongs to
    #[arg(short, long, value_enum)]
    pub region: RegionArg,

    /// Membership category
    #[arg(short, long, value_enum)]
    pub body: BodyArg,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub dob: Option<NaiveDate>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding an array of legacy records
    pub file: PathBuf,
}

/// Show command arguments.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Registration id
    pub id: i64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Edit command arguments. Omitted fields are left unchanged.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Registration id
    pub id: i64,

    /// New given name
    #[arg(long = "first")]
    pub first_name: Option<String>,

    /// New family name
    #[arg(long = "last")]
    pub last_name: Option<String>,

    /// New region
    #[arg(short, long, value_enum)]
    pub region: Option<RegionArg>,

    /// New membership category
    #[arg(short, long, value_enum)]
    pub body: Option<BodyArg>,

    /// New date of birth (YYYY-MM-DD)
    #[arg(long, conflicts_with = "clear_dob")]
    pub dob: Option<NaiveDate>,

    /// Remove the date of birth
    #[arg(long)]
    pub clear_dob: bool,
}

impl EditCommand {
    /// The changes requested on the command line.
    #[must_use]
    pub fn to_update(&self) -> RegistrationUpdate {
        let dob = if self.clear_dob {
            Some(None)
        } else {
            self.dob.map(Some)
        };
        RegistrationUpdate {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob,
            region: self.region.map(Into::into),
            auxiliary_body: self.body.map(Into::into),
        }
    }
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Registration id
    pub id: i64,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Search names and codes
    pub query: Option<String>,

    /// Filter by region
    #[arg(short, long, value_enum)]
    pub region: Option<RegionArg>,

    /// Filter by membership category
    #[arg(short, long, value_enum)]
    pub body: Option<BodyArg>,

    /// Only registrations created in this year
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Only registrations still waiting for a code
    #[arg(short, long)]
    pub pending: bool,

    /// Maximum number of results (0 for all)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ListCommand {
    /// Build the storage filter, falling back to `default_limit`.
    #[must_use]
    pub fn to_filter(&self, default_limit: Option<usize>) -> RegistrationFilter {
        let limit = match self.limit {
            Some(0) => None,
            Some(n) => Some(n),
            None => default_limit,
        };
        RegistrationFilter {
            query: self.query.clone(),
            region: self.region.map(Into::into),
            auxiliary_body: self.body.map(Into::into),
            year: self.year,
            pending_only: self.pending,
            limit,
        }
    }
}

/// Vitals commands.
#[derive(Debug, Subcommand)]
pub enum VitalsCommand {
    /// Record blood group and height for a registration
    Set {
        /// Registration id
        id: i64,

        /// Blood group
        #[arg(short, long, value_enum)]
        blood_group: Option<BloodGroupArg>,

        /// Height in centimeters (0-300)
        #[arg(long)]
        height: Option<f64>,
    },

    /// Show the vitals of a registration
    Show {
        /// Registration id
        id: i64,
    },

    /// Remove the vitals of a registration
    Clear {
        /// Registration id
        id: i64,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

impl VitalsCommand {
    /// The values to record, for `vitals set`.
    #[must_use]
    pub fn to_update(&self) -> Option<VitalsUpdate> {
        match self {
            Self::Set {
                blood_group,
                height,
                ..
            } => Some(VitalsUpdate {
                blood_group: blood_group.map(Into::into),
                height_cm: *height,
            }),
            _ => None,
        }
    }
}

/// Backfill command arguments.
#[derive(Debug, Args)]
pub struct BackfillCommand {
    /// Show what would be assigned without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Number of proposed codes to show in a dry run
    #[arg(long, value_name = "N")]
    pub sample: Option<usize>,
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Region argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegionArg {
    /// Upper River Region
    Urr,
    /// Lower River Region
    Lrr,
    /// Central River Region
    Crr,
    /// North Bank Region 1
    Nbr1,
    /// North Bank Region 2
    Nbr2,
    /// Banjul and Kombo
    BanjulKombo,
    /// Foni
    Foni,
}

impl From<RegionArg> for Region {
    fn from(arg: RegionArg) -> Self {
        match arg {
            RegionArg::Urr => Self::Urr,
            RegionArg::Lrr => Self::Lrr,
            RegionArg::Crr => Self::Crr,
            RegionArg::Nbr1 => Self::Nbr1,
            RegionArg::Nbr2 => Self::Nbr2,
            RegionArg::BanjulKombo => Self::BanjulKombo,
            RegionArg::Foni => Self::Foni,
        }
    }
}

/// Auxiliary body argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BodyArg {
    /// Children
    Atfal,
    /// Young men
    Khuddam,
    /// Elders
    Ansar,
    /// Non-members
    Guest,
}

impl From<BodyArg> for AuxiliaryBody {
    fn from(arg: BodyArg) -> Self {
        match arg {
            BodyArg::Atfal => Self::Atfal,
            BodyArg::Khuddam => Self::Khuddam,
            BodyArg::Ansar => Self::Ansar,
            BodyArg::Guest => Self::Guest,
        }
    }
}

/// Blood group argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BloodGroupArg {
    /// A+
    #[value(name = "A+")]
    APos,
    /// A-
    #[value(name = "A-")]
    ANeg,
    /// B+
    #[value(name = "B+")]
    BPos,
    /// B-
    #[value(name = "B-")]
    BNeg,
    /// AB+
    #[value(name = "AB+")]
    AbPos,
    /// AB-
    #[value(name = "AB-")]
    AbNeg,
    /// O+
    #[value(name = "O+")]
    OPos,
    /// O-
    #[value(name = "O-")]
    ONeg,
}

impl From<BloodGroupArg> for BloodGroup {
    fn from(arg: BloodGroupArg) -> Self {
        match arg {
            BloodGroupArg::APos => Self::APos,
            BloodGroupArg::ANeg => Self::ANeg,
            BloodGroupArg::BPos => Self::BPos,
            BloodGroupArg::BNeg => Self::BNeg,
            BloodGroupArg::AbPos => Self::AbPos,
            BloodGroupArg::AbNeg => Self::AbNeg,
            BloodGroupArg::OPos => Self::OPos,
            BloodGroupArg::ONeg => Self::ONeg,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per record
    Plain,
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}
