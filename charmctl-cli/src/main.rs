//! charmctl: offline inspection of charm reconciliation decisions.
//!
//! # Usage
//!
//! ```text
//! charmctl base --charm-bases ubuntu@22.04,ubuntu@20.04 [--major 3] [--base ubuntu@22.04] [--json]
//! charmctl resources <plan.yaml> [--json]
//! charmctl config <config.yaml> [--trust true|false] [--app <name>]
//! charmctl settings show|init [--force]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    base::BaseArgs, config::ConfigArgs, resources::ResourcesArgs, settings::SettingsCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "charmctl",
    version,
    about = "Inspect how charm applications would be reconciled",
    long_about = None,
)]
struct Cli {
    /// Log reconciliation decisions to stderr at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pick the base a deploy would pin.
    Base(BaseArgs),

    /// Plan which resources come from the store and which are uploaded.
    Resources(ResourcesArgs),

    /// Normalize a config file into the strings sent to the control plane.
    Config(ConfigArgs),

    /// Show or initialize ~/.charmctl/settings.yaml.
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Base(args) => args.run(),
        Commands::Resources(args) => args.run(),
        Commands::Config(args) => args.run(),
        Commands::Settings { command } => commands::settings::run(command),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
