// File: tests/test_helpers.rs

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;

// Migrations run once per test binary
static DB_INITIALIZATION: OnceCell<()> = OnceCell::const_new();

/// Prefix of every account id created by these tests
pub const TEST_ACCOUNT_PREFIX: &str = "it-";

pub struct DbTestContext {
    pub pool: PgPool,
    run: String,
}

impl DbTestContext {
    /// Connect to the test database, or `None` when it is not available
    pub async fn connect() -> Option<Self> {
        let db_url = match env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping database test: TEST_DATABASE_URL not set");
                return None;
            }
        };

        let pool = match PgPoolOptions::new()
            .max_connections(10)
            .connect(&db_url)
            .await
        {
            Ok(pool) => pool,
            Err(err) => {
                println!("Skipping database test: could not connect to database: {}", err);
                return None;
            }
        };

        DB_INITIALIZATION
            .get_or_init(|| async {
                println!("Initializing test database schema...");
                common::db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
            })
            .await;

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Some(Self {
            pool,
            run: format!("{}{}", TEST_ACCOUNT_PREFIX, nanos),
        })
    }

    /// Account id unique to this context
    pub fn account_id(&self, name: &str) -> String {
        format!("{}-{}", self.run, name)
    }

    /// Remove profiles created through this context
    pub async fn cleanup(&self) {
        sqlx::query("DELETE FROM profiles WHERE account_id LIKE $1")
            .bind(format!("{}-%", self.run))
            .execute(&self.pool)
            .await
            .expect("Failed to clean up profiles table");
    }
}
