use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stocksync_core::ledger::ImportStatus;
use stocksync_core::remote::{self, CatalogClient};
use stocksync_core::{db, import_file, register_file, AppConfig, Supervisor};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stock export importer and storefront catalog sync", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "stocksync.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the importer and remote cache sweeper until interrupted
    Run,
    /// Run database migrations
    Migrate,
    /// Register and import a single export file
    Import(ImportArgs),
    /// Run one incremental remote cache sweep
    Sweep,
    /// Page the whole remote catalog into the cache once
    Prime,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Export file (.xml or .zip)
    path: PathBuf,
    /// Import again even if the ledger already marks the file done
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Run => handle_run(&cli.config, config).await,
        Command::Migrate => {
            let pool = db::connect(&config.database_url).await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
        Command::Import(args) => handle_import(config, args).await,
        Command::Sweep => handle_sweep(config, false).await,
        Command::Prime => handle_sweep(config, true).await,
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

async fn open_database(config: &AppConfig) -> Result<db::DbPool> {
    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

async fn handle_run(config_path: &Path, config: AppConfig) -> Result<()> {
    let pool = open_database(&config).await?;
    let shutdown = CancellationToken::new();
    let mut supervisor = Supervisor::new(pool, config, shutdown.clone());
    supervisor.start()?;
    info!(components = ?supervisor.active(), "stocksync running");

    wait_for_shutdown(config_path, &mut supervisor).await?;

    shutdown.cancel();
    supervisor.stop().await;
    info!("stocksync stopped");
    Ok(())
}

/// Returns on Ctrl-C. SIGHUP reloads the configuration file.
#[cfg(unix)]
async fn wait_for_shutdown(config_path: &Path, supervisor: &mut Supervisor) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("shutdown requested");
                return Ok(());
            }
            _ = hangup.recv() => {
                match load_config(config_path) {
                    Ok(config) => {
                        if let Err(err) = supervisor.reload(config).await {
                            error!(error = %err, "configuration reload rejected");
                        }
                    }
                    Err(err) => error!(error = %err, "configuration reload failed"),
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_config_path: &Path, _supervisor: &mut Supervisor) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    Ok(())
}

async fn handle_import(config: AppConfig, args: ImportArgs) -> Result<()> {
    let pool = open_database(&config).await?;
    let registration = register_file(&pool, &args.path)
        .await
        .with_context(|| format!("failed to register {}", args.path.display()))?;

    if registration.status == ImportStatus::Done && !args.force {
        println!(
            "{} is already imported as #{}; pass --force to import it again.",
            args.path.display(),
            registration.import_id
        );
        return Ok(());
    }
    if registration.already_known {
        warn!(import_id = registration.import_id, "importing a file already in the ledger");
    }

    let summary = import_file(&pool, registration.import_id, &args.path, &config.importer).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn handle_sweep(config: AppConfig, full: bool) -> Result<()> {
    config
        .remote
        .validate()
        .context("the [remote] section is incomplete")?;

    let pool = open_database(&config).await?;
    let client = CatalogClient::new(&config.remote)?;
    let cancel = CancellationToken::new();

    let report = if full {
        remote::prime(&pool, &client, &cancel).await?
    } else {
        remote::sweep_once(&pool, &client, config.remote.lookback(), &cancel).await?
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
