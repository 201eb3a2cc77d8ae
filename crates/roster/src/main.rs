//! `rosterctl` - CLI for roster
//!
//! This binary provides the command-line interface for registering members,
//! browsing the roster, and running code backfill.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;

use roster::cli::{
    BackfillCommand, Cli, Command, ConfigCommand, DeleteCommand, ImportCommand, ListCommand,
    OutputFormat, RegisterCommand, ShowCommand, StatsCommand, VitalsCommand,
};
use roster::model::{LegacyRecord, NewRegistration, Registration};
use roster::{init_logging, Config, Storage};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Register(cmd) => handle_register(&config, cmd),
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::Show(cmd) => handle_show(&config, &cmd),
        Command::Edit(cmd) => {
            let mut storage = open_storage(&config)?;
            let registration = storage.update_registration(cmd.id, &cmd.to_update())?;
            println!("Updated registration {}.", registration.id);
            print_registration(&registration);
            Ok(())
        }
        Command::Delete(cmd) => handle_delete(&config, &cmd),
        Command::List(cmd) => handle_list(&config, &cmd),
        Command::Vitals(cmd) => handle_vitals(&config, &cmd),
        Command::Backfill(cmd) => handle_backfill(&config, &cmd),
        Command::Stats(cmd) => handle_stats(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("failed to open roster at {}", path.display()))?;
    Ok(storage.with_assign_attempts(config.codes.assign_attempts))
}

fn handle_register(config: &Config, cmd: RegisterCommand) -> anyhow::Result<()> {
    let mut new = NewRegistration::new(
        cmd.first_name,
        cmd.last_name,
        cmd.region.into(),
        cmd.body.into(),
    );
    if let Some(dob) = cmd.dob {
        new = new.with_dob(dob);
    }

    let mut storage = open_storage(config)?;
    let registration = storage.create_registration(new)?;
    println!(
        "Registered {} with code {}",
        registration,
        registration.unique_code.as_deref().unwrap_or("-")
    );
    Ok(())
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&cmd.file)
        .with_context(|| format!("failed to read {}", cmd.file.display()))?;
    let records: Vec<LegacyRecord> = serde_json::from_str(&text)
        .with_context(|| format!("invalid legacy records in {}", cmd.file.display()))?;

    let mut storage = open_storage(config)?;
    let ids = storage.import_registrations(records)?;
    println!("Imported {} registrations without codes.", ids.len());
    if !ids.is_empty() {
        println!("Run `rosterctl backfill` to assign their codes.");
    }
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let registration = storage.require_registration(cmd.id)?;
    let vitals = storage.get_vitals(cmd.id)?;

    if cmd.json {
        let value = serde_json::json!({
            "registration": registration,
            "age": registration.age(),
            "vitals": vitals,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_registration(&registration);
    match vitals {
        Some(vitals) => {
            println!(
                "  Blood group:    {}",
                vitals.blood_group.map_or("-", |g| g.as_str())
            );
            println!(
                "  Height (cm):    {}",
                vitals
                    .height_cm
                    .map_or_else(|| "-".to_string(), |h| format!("{h:.2}"))
            );
        }
        None => println!("  Vitals:         not recorded"),
    }
    Ok(())
}

fn print_registration(registration: &Registration) {
    println!("Registration {}", registration.id);
    println!(
        "  Code:           {}",
        registration.unique_code.as_deref().unwrap_or("(pending)")
    );
    println!("  Name:           {registration}");
    println!(
        "  Date of birth:  {}",
        registration
            .dob
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    if let Some(age) = registration.age() {
        println!("  Age:            {age}");
    }
    println!("  Region:         {}", registration.region.label());
    println!("  Body:           {}", registration.auxiliary_body);
    println!(
        "  Created:        {}",
        registration
            .created_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
    );
}

fn handle_delete(config: &Config, cmd: &DeleteCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let registration = storage.require_registration(cmd.id)?;
    if !cmd.yes {
        println!(
            "This will delete registration {} ({registration}) and its vitals.",
            registration.id
        );
        println!("Use --yes to confirm.");
        return Ok(());
    }
    storage.delete_registration(cmd.id)?;
    println!("Deleted registration {}.", cmd.id);
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let registrations = storage.list_registrations(&cmd.to_filter(config.list_limit()))?;

    match cmd.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&registrations)?);
        }
        OutputFormat::Plain => {
            for registration in &registrations {
                println!(
                    "{}\t{}",
                    registration.unique_code.as_deref().unwrap_or("(pending)"),
                    registration
                );
            }
        }
        OutputFormat::Table => {
            if registrations.is_empty() {
                println!("No registrations found.");
                return Ok(());
            }
            println!(
                "{:>6}  {:<12}  {:<30}  {:<13}  {:<8}  {}",
                "ID", "CODE", "NAME", "REGION", "BODY", "CREATED"
            );
            for registration in &registrations {
                println!(
                    "{:>6}  {:<12}  {:<30}  {:<13}  {:<8}  {}",
                    registration.id,
                    registration.unique_code.as_deref().unwrap_or("(pending)"),
                    truncate(&registration.display_name(), 30),
                    registration.region.label(),
                    registration.auxiliary_body.as_str(),
                    registration
                        .created_at
                        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string())
                );
            }
            println!();
            println!("{} registrations", registrations.len());
        }
    }
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn handle_vitals(config: &Config, cmd: &VitalsCommand) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;
    match cmd {
        VitalsCommand::Set { id, .. } => {
            let Some(update) = cmd.to_update() else {
                bail!("nothing to record");
            };
            if update.blood_group.is_none() && update.height_cm.is_none() {
                bail!("give --blood-group, --height, or both");
            }
            let vitals = storage.upsert_vitals(*id, update)?;
            println!(
                "Recorded vitals for registration {id}: blood group {}, height {}",
                vitals.blood_group.map_or("-", |g| g.as_str()),
                vitals
                    .height_cm
                    .map_or_else(|| "-".to_string(), |h| format!("{h:.2} cm"))
            );
        }
        VitalsCommand::Show { id } => {
            storage.require_registration(*id)?;
            match storage.get_vitals(*id)? {
                Some(vitals) => println!("{}", serde_json::to_string_pretty(&vitals)?),
                None => println!("No vitals recorded for registration {id}."),
            }
        }
        VitalsCommand::Clear { id, yes } => {
            if !yes {
                println!("This will remove the vitals of registration {id}.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            storage.delete_vitals(*id)?;
            println!("Removed vitals for registration {id}.");
        }
    }
    Ok(())
}

fn handle_backfill(config: &Config, cmd: &BackfillCommand) -> anyhow::Result<()> {
    let mut storage = open_storage(config)?;

    if cmd.dry_run {
        let sample = cmd.sample.unwrap_or(config.codes.preview_sample);
        let preview = storage.preview_backfill(sample)?;
        if preview.total == 0 {
            println!("All registrations already have unique codes.");
            return Ok(());
        }

        println!(
            "Would assign unique codes to {} registrations:",
            preview.total
        );
        for proposed in &preview.sample {
            println!("  {} -> {} (id {})", proposed.name, proposed.code, proposed.id);
        }
        let remaining = preview.total - preview.sample.len();
        if remaining > 0 {
            println!("  ... and {remaining} more");
        }
        return Ok(());
    }

    if storage.count_pending()? == 0 {
        println!("All registrations already have unique codes.");
        return Ok(());
    }

    match storage.backfill_codes() {
        Ok(report) => {
            println!(
                "Successfully backfilled unique codes for {} registrations.",
                report.updated
            );
            if let (Some(first), Some(last)) = (report.first, report.last) {
                println!("Assigned {first} through {last}.");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Error during backfill: {err}");
            Err(err.into())
        }
    }
}

fn handle_stats(config: &Config, cmd: &StatsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Roster statistics");
    println!("-----------------");
    println!("Registrations:  {}", stats.total);
    println!("With code:      {}", stats.coded);
    println!("Pending code:   {}", stats.pending);
    println!("With vitals:    {}", stats.with_vitals);
    println!("Database:       {}", storage.path().display());
    println!("Database size:  {} bytes", stats.db_size_bytes);
    println!();
    println!("By region:");
    for entry in &stats.by_region {
        println!("  {:<14} {}", entry.label, entry.count);
    }
    println!();
    println!("By auxiliary body:");
    for entry in &stats.by_auxiliary_body {
        println!("  {:<14} {}", entry.label, entry.count);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Codes]");
                println!("  Assign attempts:    {}", config.codes.assign_attempts);
                println!("  Preview sample:     {}", config.codes.preview_sample);
                println!();
                println!("[Listing]");
                println!(
                    "  Default limit:      {}",
                    config
                        .list_limit()
                        .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
