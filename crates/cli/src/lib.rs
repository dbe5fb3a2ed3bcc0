pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use voicely_core::config::LoadOptions;

use crate::commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "voicely",
    about = "Voicely operator CLI",
    long_about = "Price quotes against a catalog, inspect configuration, check readiness, and create tenants.",
    after_help = "Examples:\n  voicely quote --catalog config/pricing.sample.toml --package wedding_base --hours 6\n  voicely doctor --json\n  voicely create-tenant photographer_sarah"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to voicely.toml (defaults to ./voicely.toml or ./config/voicely.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price a package with optional hours, addons, and travel distance")]
    Quote {
        #[arg(long, help = "Pricing catalog file (.toml or .json)")]
        catalog: PathBuf,
        #[arg(long, help = "Package key")]
        package: String,
        #[arg(long, help = "Requested coverage hours")]
        hours: Option<Decimal>,
        #[arg(long = "addon", help = "Addon key; repeat for several")]
        addons: Vec<String>,
        #[arg(long, help = "Travel distance in miles")]
        distance: Option<Decimal>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the tenants directory, and the default tenant catalog")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Write a starter tenant record to edit")]
    CreateTenant {
        tenant_id: String,
        #[arg(long, help = "Tenants directory (defaults to tenants.dir from config)")]
        dir: Option<PathBuf>,
        #[arg(long, help = "Overwrite an existing record")]
        force: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Quote { catalog, package, hours, addons, distance } => {
            commands::quote::run(&QuoteArgs { catalog, package, hours, addons, distance })
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Doctor { json } => {
            let (passed, output) = commands::doctor::run(options, json);
            commands::CommandResult { exit_code: if passed { 0 } else { 1 }, output }
        }
        Command::CreateTenant { tenant_id, dir, force } => {
            match dir.map(Ok).unwrap_or_else(|| tenants_dir_from_config(options)) {
                Ok(dir) => commands::create_tenant::run(&tenant_id, &dir, force),
                Err(result) => result,
            }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn tenants_dir_from_config(options: LoadOptions) -> Result<PathBuf, commands::CommandResult> {
    voicely_core::config::AppConfig::load(options).map(|config| config.tenants.dir).map_err(|error| {
        commands::CommandResult::failure("create-tenant", "config_validation", error.to_string(), 2)
    })
}
