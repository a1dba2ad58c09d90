use clap::{Parser, Subcommand};
use common::db;
use dotenv::dotenv;
use profile_service::{BalanceService, ProfileServiceConfig};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Profile Service CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Database URL (defaults to DATABASE_URL)
    #[arg(short, long, global = true)]
    database_url: Option<String>,

    /// Database pool size
    #[arg(short, long, global = true)]
    pool_size: Option<u32>,

    /// Commands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Provision a profile for an account
    Provision {
        /// Account ID
        #[arg(short, long)]
        account_id: String,
    },
    /// Print the vbucks balance of an account
    Balance {
        /// Account ID
        #[arg(short, long)]
        account_id: String,
    },
    /// Connect to the store and hold the pool open until Ctrl+C
    Start {
        /// Apply pending migrations before starting
        #[arg(short, long)]
        migrate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "profile_service={},common={}",
            cli.log_level, cli.log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match cli.database_url {
        Some(url) => ProfileServiceConfig::new(url, cli.pool_size.unwrap_or(5), false),
        None => ProfileServiceConfig::from_env(),
    };
    if let Some(pool_size) = cli.pool_size {
        config.db_pool_size = pool_size;
    }

    match cli.command {
        Commands::Migrate => {
            let pool = db::init_db_pool(&config.database_url, config.db_pool_size).await?;
            db::run_migrations(&pool).await?;
            info!("Migrations applied");
            pool.close().await;
        }
        Commands::Provision { account_id } => {
            let service = BalanceService::with_config(&config).await?;
            let profile = service.provision(&account_id).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            service.store().close().await;
        }
        Commands::Balance { account_id } => {
            let service = BalanceService::with_config(&config).await?;
            let vbucks = service.get_balance(&account_id).await?;
            println!("{}: {} vbucks", account_id, vbucks);
            service.store().close().await;
        }
        Commands::Start { migrate } => {
            config.run_migrations |= migrate;

            info!(
                "Starting profile service with {:?} store, database pool size: {}",
                config.store, config.db_pool_size
            );

            let service = BalanceService::with_config(&config).await?;

            info!("Profile service started. Press Ctrl+C to stop.");
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutting down profile service...");
                }
                Err(err) => {
                    error!("Error waiting for Ctrl+C: {}", err);
                }
            }

            service.store().close().await;
        }
    }

    Ok(())
}
