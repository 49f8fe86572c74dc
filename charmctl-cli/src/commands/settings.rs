//! `charmctl settings show|init`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use charmctl_core::settings::{self, Settings};
use charmctl_reconcile::RetryPolicy;

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print effective settings, environment overrides included.
    Show {
        /// Emit machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write a settings file holding the defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: SettingsCommand) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    match command {
        SettingsCommand::Show { json } => show(&home, json),
        SettingsCommand::Init { force } => init(&home, force),
    }
}

fn show(home: &Path, json: bool) -> Result<()> {
    let effective = settings::load()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    let policy = RetryPolicy::from(&effective.retry);
    println!("{}", settings::settings_path_at(home).display().to_string().bright_black());
    print!("{}", serde_yaml::to_string(&effective)?);
    println!(
        "{} first delay {:?}, x{}, {} attempts",
        "backoff:".bold(),
        policy.initial_delay,
        policy.multiplier,
        policy.max_attempts,
    );
    Ok(())
}

fn init(home: &Path, force: bool) -> Result<()> {
    let path = settings::settings_path_at(home);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    let written = settings::save(&Settings::default())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} {}", "wrote".green(), written.display());
    Ok(())
}
