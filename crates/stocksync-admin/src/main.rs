use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use stocksync_core::issues::{self, IssueReason};
use stocksync_core::{db, ledger, link_import, AppConfig, IssuePurgeScope};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stocksync administrative tooling", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "stocksync.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Delete the import ledger and all staging rows
    ResetImports(ResetArgs),
    /// List current link issues
    Issues(IssuesArgs),
    /// Re-run the EAN linker for one import
    Relink(RelinkArgs),
}

#[derive(Args, Debug, Default)]
struct ResetArgs {
    /// Actually delete; without this flag only the row counts are shown
    #[arg(long)]
    yes: bool,
}

#[derive(Args, Debug, Default)]
struct IssuesArgs {
    /// Only show issues with this reason (e.g. duplicate_ean_shop)
    #[arg(long)]
    reason: Option<String>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RelinkArgs {
    /// Ledger id of the import to relink
    import_id: i64,
    /// Override the configured issue purge scope
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Global,
    File,
}

impl From<ScopeArg> for IssuePurgeScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Global => IssuePurgeScope::Global,
            ScopeArg::File => IssuePurgeScope::File,
        }
    }
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
        Command::ResetImports(args) => handle_reset(&config, args).await,
        Command::Issues(args) => handle_issues(&config, args).await,
        Command::Relink(args) => handle_relink(&config, args).await,
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config.apply_env();
    Ok(config)
}

async fn connect_pool(config: &AppConfig) -> Result<db::DbPool> {
    let pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

async fn handle_reset(config: &AppConfig, args: ResetArgs) -> Result<()> {
    let pool = connect_pool(config).await?;

    if !args.yes {
        let files = ledger::list(&pool).await?;
        println!("{} imported files would be deleted together with their staging rows.", files.len());
        println!("Run again with --yes to delete them.");
        return Ok(());
    }

    let summary = ledger::reset(&pool).await?;
    info!(
        files = summary.files,
        staging_products = summary.staging_products,
        staging_stock = summary.staging_stock,
        "import ledger reset"
    );
    println!(
        "Deleted {} imported files, {} staged products and {} staged stock rows.",
        summary.files, summary.staging_products, summary.staging_stock
    );
    Ok(())
}

async fn handle_issues(config: &AppConfig, args: IssuesArgs) -> Result<()> {
    let reason = args
        .reason
        .as_deref()
        .map(|raw| {
            IssueReason::parse(raw).ok_or_else(|| {
                let known: Vec<_> = IssueReason::ALL.iter().map(|reason| reason.as_str()).collect();
                anyhow!("unknown reason '{raw}'; expected one of: {}", known.join(", "))
            })
        })
        .transpose()?;

    let pool = connect_pool(config).await?;
    let rows = issues::list(&pool, reason).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No link issues.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["reason", "product", "code", "raw code", "remote ids", "import", "updated", "details"]);
    for issue in &rows {
        let remote_ids: Vec<String> = issue.remote_ids.iter().map(i64::to_string).collect();
        table.add_row(vec![
            issue.reason.as_str().to_string(),
            issue.product_id.to_string(),
            issue.code.clone(),
            issue.raw_code.clone(),
            remote_ids.join(", "),
            issue.import_id.map(|id| id.to_string()).unwrap_or_default(),
            issue.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            issue.details.clone(),
        ]);
    }
    println!("{table}");
    println!("{} issue(s)", rows.len());
    Ok(())
}

async fn handle_relink(config: &AppConfig, args: RelinkArgs) -> Result<()> {
    let pool = connect_pool(config).await?;
    let file = ledger::fetch(&pool, args.import_id).await?;
    let scope = args
        .scope
        .map(IssuePurgeScope::from)
        .unwrap_or(config.importer.issue_purge_scope);

    let report = link_import(&pool, file.import_id, scope).await?;
    info!(import_id = file.import_id, filename = %file.filename, "relink finished");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
