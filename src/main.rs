//! `upd` command-line entrypoint.
//! Loads config and state, runs one check pass, renders the report and
//! persists the next state.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use update_tracker::output::{self, Format};
use update_tracker::{config, run_once, state, CheckOptions};

/// Exit code for failed items and load/parse failures.
const EXIT_ERRORS: u8 = 2;

#[derive(Parser)]
#[command(
    name = "upd",
    about = "Check tracked sources for upstream updates",
    version,
    propagate_version = true
)]
struct Cli {
    /// More logging: -v info, -vv debug (overrides RUST_LOG)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every configured source once
    Check(CheckArgs),
    /// Parse and validate the config without touching the network
    ValidateConfig {
        /// Config file (default: $UPD_CONFIG_PATH, then ~/.config/update-tracker/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print a sample config to stdout
    SampleConfig,
}

#[derive(Args)]
struct CheckArgs {
    /// Config file (default: $UPD_CONFIG_PATH, then ~/.config/update-tracker/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// State file (default: $UPD_STATE_PATH, then ~/.config/update-tracker/state.json)
    #[arg(long)]
    state: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Extract release highlights for new releases
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    notes: bool,
    /// Show only update/error items
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    only_updates: bool,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("update_tracker=warn,upd=warn")),
        1 => EnvFilter::new("update_tracker=info,upd=info"),
        _ => EnvFilter::new("update_tracker=debug,upd=debug"),
    };
    let json = std::env::var("UPD_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // stdout carries the report; logs go to stderr
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present; no-op otherwise.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ERRORS)
        }
    }
}

async fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Check(args) => check(args).await,
        Commands::ValidateConfig { config: flag } => {
            let path = config::resolve_config_path(flag.as_deref());
            let cfg = config::load(&path)?;
            cfg.validate()
                .with_context(|| format!("invalid config {}", path.display()))?;
            println!("ok: {} ({} sources)", path.display(), cfg.sources.len());
            Ok(ExitCode::SUCCESS)
        }
        Commands::SampleConfig => {
            print!("{}", config::SAMPLE_CONFIG);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn check(args: CheckArgs) -> Result<ExitCode> {
    let config_path = config::resolve_config_path(args.config.as_deref());
    let state_path = config::resolve_state_path(args.state.as_deref());

    let cfg = config::load(&config_path)?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let previous = state::load(&state_path)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling in-flight checks");
            let _ = cancel_tx.send(true);
        }
    });

    let opts = CheckOptions {
        include_notes: args.notes,
    };
    let (report, next) = run_once(&cfg, &previous, opts, cancel_rx).await?;

    let rendered = if args.only_updates {
        output::render(&report.only_updates(), args.format)?
    } else {
        output::render(&report, args.format)?
    };
    print!("{rendered}");

    state::save(&state_path, &next)?;
    tracing::info!(
        ok = report.summary.ok,
        update = report.summary.update,
        error = report.summary.error,
        duration_ms = report.duration.as_millis() as u64,
        "run finished"
    );

    Ok(if report.has_errors() {
        ExitCode::from(EXIT_ERRORS)
    } else {
        ExitCode::SUCCESS
    })
}
