// Copyright 2026 Ilanharvest Contributors
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code, unused_imports)]

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod cli;
mod config;
mod driver;
mod events;
mod export;
mod scrape;
mod stealth;

use config::{DelayBand, PacingConfig, RunConfig};

#[derive(Parser)]
#[command(
    name = "ilanharvest",
    about = "Ilanharvest — paced browser harvester for classified-listing catalogs",
    version,
    after_help = "Run 'ilanharvest <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the catalog and harvest listing details into a CSV file
    Run {
        /// Catalog front page to start from
        #[arg(long, default_value = config::DEFAULT_BASE_URL)]
        url: String,

        /// Stop after this many listings have been collected
        #[arg(long, default_value_t = config::DEFAULT_MAX_LISTINGS)]
        max_listings: usize,

        /// Stop after this many index pages have been visited
        #[arg(long, default_value_t = config::DEFAULT_MAX_PAGES)]
        max_pages: u32,

        /// Path of the CSV file to write
        #[arg(long, short, default_value = config::DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Lower bound of the short pause band, in seconds
        #[arg(long, default_value_t = 2.0)]
        short_min: f64,

        /// Upper bound of the short pause band, in seconds
        #[arg(long, default_value_t = 5.0)]
        short_max: f64,

        /// Lower bound of the long (between-listings) pause band, in seconds
        #[arg(long, default_value_t = 30.0)]
        long_min: f64,

        /// Upper bound of the long (between-listings) pause band, in seconds
        #[arg(long, default_value_t = 60.0)]
        long_max: f64,

        /// Run the browser with a visible window instead of headless
        #[arg(long)]
        headful: bool,

        /// Append every run event as a JSON line to this file
        #[arg(long)]
        event_log: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("ILANHARVEST_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("ILANHARVEST_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("ILANHARVEST_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("ILANHARVEST_NO_COLOR", "1");
    }

    let result = match cli.command {
        Commands::Run {
            url,
            max_listings,
            max_pages,
            output,
            short_min,
            short_max,
            long_min,
            long_max,
            headful,
            event_log,
        } => {
            match build_config(
                url,
                max_listings,
                max_pages,
                output,
                (short_min, short_max),
                (long_min, long_max),
                headful,
                event_log,
            ) {
                Ok(cfg) => cli::run_cmd::run(cfg).await,
                Err(e) => Err(e),
            }
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ilanharvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    url: String,
    max_listings: usize,
    max_pages: u32,
    output: PathBuf,
    short: (f64, f64),
    long: (f64, f64),
    headful: bool,
    event_log: Option<PathBuf>,
) -> Result<RunConfig> {
    if short.0 > short.1 {
        bail!("--short-min must not exceed --short-max");
    }
    if long.0 > long.1 {
        bail!("--long-min must not exceed --long-max");
    }
    if short.0 < 0.0 || long.0 < 0.0 {
        bail!("pause bounds must be non-negative");
    }

    Ok(RunConfig {
        base_url: url,
        max_listings,
        max_pages,
        output,
        pacing: PacingConfig {
            short: DelayBand::from_secs(short.0, short.1),
            long: DelayBand::from_secs(long.0, long.1),
        },
        headful,
        event_log,
        ..RunConfig::default()
    })
}
