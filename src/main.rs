//! # Main: CLI Entry Point
//!
//! Routes subcommands to the API server and the administrative one-shots.
//!
//! ## Subcommands
//!
//! - `serve`: run the HTTP API.
//! - `migrate`: apply the embedded SQL migrations.
//! - `import-bins`: upsert a JSON array of bins into the catalog.
//! - `create-user`: create an approved account (bootstrap the first admin).
//! - `rank`: run a leaderboard pass for a day and print it as JSON.
//!
//! ## Global Options
//!
//! - `--database-url` / `DATABASE_URL`: PostgreSQL connection, required by
//!   every subcommand.
//! - `LOG_FORMAT=json` switches logs to JSON lines; `RUST_LOG` sets the filter.

mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "stockcount", about = "Warehouse inventory counting service")]
struct Cli {
    /// PostgreSQL connection URL (or set DATABASE_URL env var)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen port (overrides the config file)
        #[arg(long, env = "STOCKCOUNT_PORT")]
        port: Option<u16>,
        /// TOML configuration file
        #[arg(long, env = "STOCKCOUNT_CONFIG")]
        config: Option<PathBuf>,
        /// HS256 secret for access tokens
        #[arg(long, env = "STOCKCOUNT_JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,
    },
    /// Apply database migrations and exit
    Migrate,
    /// Upsert bins from a JSON file: [{"binNo", "warehouseName", "bookQuantity"}]
    ImportBins {
        #[arg(long)]
        file: PathBuf,
    },
    /// Create an approved account
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long, env = "STOCKCOUNT_USER_PASSWORD", hide_env_values = true)]
        password: String,
        /// admin, vendor, team_leader or worker
        #[arg(long)]
        role: String,
        #[arg(long)]
        vendor_id: Option<Uuid>,
        #[arg(long)]
        team_leader_id: Option<Uuid>,
        #[arg(long)]
        full_name: Option<String>,
        /// TOML configuration file (password hash cost)
        #[arg(long, env = "STOCKCOUNT_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Rank a day's performance rows and print them
    Rank {
        /// Day to rank, YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
        #[arg(long)]
        warehouse: Option<String>,
        /// Clamped to the configured leaderboard limits
        #[arg(long)]
        limit: Option<i64>,
        /// TOML configuration file (leaderboard limits)
        #[arg(long, env = "STOCKCOUNT_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // LOG_FORMAT=json for log shippers, human-readable otherwise
    if std::env::var("LOG_FORMAT").unwrap_or_default() == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging();

    let database_url = cli.database_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is required (set via --database-url or env)")
    })?;
    let rt = tokio::runtime::Runtime::new()?;

    match &cli.command {
        Commands::Serve {
            port,
            config,
            jwt_secret,
        } => rt.block_on(cli::run_serve(
            database_url,
            config.as_deref(),
            *port,
            jwt_secret.clone(),
        )),
        Commands::Migrate => rt.block_on(cli::run_migrate(database_url)),
        Commands::ImportBins { file } => rt.block_on(cli::run_import_bins(database_url, file)),
        Commands::CreateUser {
            username,
            password,
            role,
            vendor_id,
            team_leader_id,
            full_name,
            config,
        } => rt.block_on(cli::run_create_user(
            database_url,
            config.as_deref(),
            cli::UserArgs {
                username,
                password,
                role,
                vendor_id: *vendor_id,
                team_leader_id: *team_leader_id,
                full_name: full_name.as_deref(),
            },
        )),
        Commands::Rank {
            date,
            warehouse,
            limit,
            config,
        } => rt.block_on(cli::run_rank(
            database_url,
            config.as_deref(),
            *date,
            warehouse.as_deref(),
            *limit,
        )),
    }
}
