//! Point d'entrée CLI pour geolint

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Contrôler, réparer et fusionner des jeux de données vectoriels
#[derive(Parser)]
#[command(name = "geolint")]
#[command(author, version)]
#[command(about = "Lint, repair, reproject and merge vector geospatial datasets")]
#[command(long_about = "Validates GeoJSON files and .tar.bz2 bundles, infers missing coordinate reference systems, repairs invalid geometries and merges datasets into a common CRS.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<ExitCode> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let ok = match &cli.command {
        Commands::Validate {
            input,
            report,
            json,
            location_hint,
        } => cli::cmd_validate(input, report.as_deref(), *json, *location_hint)?,
        Commands::Batch(args) => cli::cmd_batch(args)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stderr : stdout reste réservé aux rapports (--json)
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
