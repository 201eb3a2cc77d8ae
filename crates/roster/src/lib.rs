//! `roster` - Membership registration tracking with year-scoped unique codes
//!
//! This library stores member registrations and their vitals, assigns each
//! registration a permanent `<year>-<NNNN>` code when it is saved, and
//! backfills codes for legacy records in a single atomic pass.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod code;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;

pub use code::{CodeIndex, UniqueCode};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{AuxiliaryBody, BloodGroup, NewRegistration, Region, Registration, Vitals};
pub use storage::{BackfillPreview, BackfillReport, RegistrationFilter, RosterStats, Storage};
