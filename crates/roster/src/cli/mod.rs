//! Command-line interface for roster.
//!
//! This module provides the CLI structure and command handlers for the
//! `rosterctl` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{
    BackfillCommand, BloodGroupArg, BodyArg, ConfigCommand, DeleteCommand, EditCommand,
    ImportCommand, ListCommand, OutputFormat, RegionArg, RegisterCommand, ShowCommand,
    StatsCommand, VitalsCommand,
};

/// rosterctl - Membership registration roster
///
/// Registers members, assigns each a year-scoped unique code, and backfills
/// codes for records that were stored without one.
#[derive(Debug, Parser)]
#[command(name = "rosterctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register a new member and assign a code
    Register(RegisterCommand),

    /// Import legacy records from a JSON file, without codes
    Import(ImportCommand),

    /// Show one registration
    Show(ShowCommand),

    /// Change fields of a registration
    Edit(EditCommand),

    /// Delete a registration and its vitals
    Delete(DeleteCommand),

    /// Browse, search and export registrations
    List(ListCommand),

    /// Record or remove blood group and height
    #[command(subcommand)]
    Vitals(VitalsCommand),

    /// Assign codes to every registration that lacks one
    Backfill(BackfillCommand),

    /// Show registration counts
    Stats(StatsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
