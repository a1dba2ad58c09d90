use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, PgPool, Pool, Postgres};
use tracing::info;

use crate::error::Result;

pub mod models;

pub use models::DbProfile;

/// Database pool type
pub type DbPool = Pool<Postgres>;

/// Initialize the database connection pool
pub async fn init_db_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    info!("Connecting to PostgreSQL database with pool size: {}", max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL database");
    Ok(pool)
}

/// SQL migrations from the workspace `migrations/` directory, embedded at build time
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Run migrations on the database
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running {} embedded migrations", MIGRATOR.iter().count());
    MIGRATOR.run(pool).await?;
    Ok(())
}
