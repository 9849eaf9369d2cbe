mod acquire;
mod ingest;
mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "instifier")]
#[command(about = "Instagram profile acquisition pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Acquire a single profile
    Acquire {
        username: String,

        /// Refetch even if the stored record is still fresh
        #[arg(long)]
        force: bool,

        /// Sign in with the configured credentials before browsing
        #[arg(long)]
        login: bool,
    },
    /// Acquire many profiles concurrently and record the run
    Batch {
        usernames: Vec<String>,

        /// CSV file whose first column lists usernames
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long)]
        force: bool,

        #[arg(long)]
        login: bool,
    },
    /// Print the stored record for a profile
    Show { username: String },
    /// Manage the stored session token
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Merge supplementary profile fields from a CSV file
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// List recent batch runs
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    /// Sign in with the configured credentials and store a fresh token
    Refresh,
    /// Forget the stored token
    Clear,
}

async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = instifier_db::fail_acquisition_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark acquisition run as failed"
        );
    }
}

async fn run_session(
    pool: &sqlx::PgPool,
    config: &instifier_core::AppConfig,
    command: SessionCommands,
) -> anyhow::Result<()> {
    match command {
        SessionCommands::Refresh => {
            let credentials = acquire::login_credentials(config, true)?
                .ok_or_else(|| anyhow::anyhow!("login credentials are not configured"))?;
            let scraper = instifier_scraper::ScraperConfig::from_app_config(config);
            let sessions = store::PgStore::new(pool.clone());
            let saved = acquire::browser_controller(&scraper)
                .refresh_into(&credentials, &sessions)
                .await?;
            if !saved {
                anyhow::bail!("signed in but no session cookie was issued");
            }
            println!("session token refreshed");
        }
        SessionCommands::Clear => {
            if instifier_db::clear_session_token(pool).await? {
                println!("session token cleared");
            } else {
                println!("no session token stored");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("instifier: pass a command, or --help to list them");
        return Ok(());
    };

    let config = instifier_core::load_app_config()
        .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = instifier_db::connect_pool(
        &config.database_url,
        instifier_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                instifier_db::ping(&pool).await?;
                println!("database reachable");
            }
            DbCommands::Migrate => {
                let applied = instifier_db::run_migrations(&pool).await?;
                println!("migrations applied ({applied} newly applied)");
            }
        },
        Commands::Acquire {
            username,
            force,
            login,
        } => acquire::run_acquire(&pool, &config, &username, force, login).await?,
        Commands::Batch {
            usernames,
            file,
            force,
            login,
        } => {
            acquire::run_batch(&pool, &config, usernames, file.as_deref(), force, login).await?;
        }
        Commands::Show { username } => acquire::run_show(&pool, &username).await?,
        Commands::Session { command } => run_session(&pool, &config, command).await?,
        Commands::Ingest { file } => ingest::run_ingest(&pool, &file).await?,
        Commands::Runs { limit } => acquire::run_list_runs(&pool, limit).await?,
    }

    Ok(())
}
