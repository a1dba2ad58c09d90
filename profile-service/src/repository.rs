//! Profile store: the only gateway to persisted profile documents

use async_trait::async_trait;
use common::db::{self, DbPool, DbProfile};
use common::error::{Error, Result};
use common::model::profile::{BalanceUpdate, CurrencyField, Profile, Projection, UpdateOutcome};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::Row;
use tracing::{debug, info};

/// Profile store trait defining the interface for profile persistence
///
/// Implementations apply every update atomically per document and never
/// persist a negative currency value. An update that would do so still
/// matches the document but leaves it unmodified.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Provision a new profile with a zero balance
    async fn create_profile(&self, account_id: &str) -> Result<Profile>;

    /// Get a profile by account ID
    async fn find_by_account_id(&self, account_id: &str, projection: Projection) -> Result<Option<Profile>>;

    /// Atomically apply a set or increment to one currency field
    async fn apply_update(
        &self,
        account_id: &str,
        field: CurrencyField,
        update: BalanceUpdate,
    ) -> Result<UpdateOutcome>;

    /// Release any resources held by the store
    async fn close(&self) {}
}

/// In-memory profile store
pub struct InMemoryProfileStore {
    /// Profiles by account ID
    pub profiles: DashMap<String, Profile>,
}

impl InMemoryProfileStore {
    /// Create a new in-memory profile store
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn create_profile(&self, account_id: &str) -> Result<Profile> {
        match self.profiles.entry(account_id.to_string()) {
            Entry::Occupied(_) => Err(Error::ValidationError(format!(
                "Profile already exists for account: {}",
                account_id
            ))),
            Entry::Vacant(entry) => {
                let profile = Profile::new(account_id);
                entry.insert(profile.clone());
                Ok(profile)
            }
        }
    }

    async fn find_by_account_id(&self, account_id: &str, projection: Projection) -> Result<Option<Profile>> {
        Ok(self
            .profiles
            .get(account_id)
            .map(|p| p.clone().project(projection)))
    }

    async fn apply_update(
        &self,
        account_id: &str,
        field: CurrencyField,
        update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        // The entry guard holds the shard write lock for the whole read-modify-write
        let Some(mut profile) = self.profiles.get_mut(account_id) else {
            return Ok(UpdateOutcome::unmatched());
        };

        let previous = profile.currency(field)?;
        let current = match update.apply(previous) {
            Some(next) if next >= 0 => {
                profile.set_currency(field, next);
                next
            }
            _ => previous,
        };

        Ok(UpdateOutcome::matched(previous, current))
    }
}

const INSERT_PROFILE: &str = "
    INSERT INTO profiles (account_id, created, profiles, vbucks)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (account_id) DO NOTHING
    RETURNING account_id, created, profiles, vbucks";

const SELECT_PROFILE: &str = "
    SELECT account_id, created, profiles, vbucks
    FROM profiles
    WHERE account_id = $1";

const SELECT_BALANCES: &str = "
    SELECT account_id, created, 'null'::jsonb AS profiles, vbucks
    FROM profiles
    WHERE account_id = $1";

// $1 account id, $2 amount, $3 true for an increment and false for a set.
// The CTE takes the row lock before reading, so `previous` is the value the
// update is applied to. Out-of-range results leave the row unchanged.
const UPDATE_VBUCKS: &str = "
    WITH target AS (
        SELECT account_id, vbucks::NUMERIC AS previous
        FROM profiles
        WHERE account_id = $1
        FOR UPDATE
    ), next AS (
        SELECT account_id, previous,
               CASE WHEN $3::BOOLEAN THEN previous + $2::BIGINT ELSE $2::BIGINT::NUMERIC END AS value
        FROM target
    )
    UPDATE profiles AS p
    SET vbucks = CASE
        WHEN next.value BETWEEN 0 AND 9223372036854775807 THEN next.value::BIGINT
        ELSE p.vbucks
    END
    FROM next
    WHERE p.account_id = next.account_id
    RETURNING next.previous::BIGINT AS previous, p.vbucks AS current";

// A missing quantity reads as 0. A path through a non-object, or a quantity
// that is not an integral number in BIGINT range, yields a NULL `previous`
// and leaves the row unchanged.
const UPDATE_MTX_QUANTITY: &str = "
    WITH target AS (
        SELECT account_id,
               jsonb_typeof(profiles) = 'object'
                   AND COALESCE(jsonb_typeof(profiles -> 'common_core'), 'object') = 'object'
                   AND COALESCE(jsonb_typeof(profiles #> '{common_core,items}'), 'object') = 'object'
                   AND COALESCE(jsonb_typeof(profiles #> '{common_core,items,Currency:MtxPurchased}'), 'object') = 'object'
                   AS path_ok,
               profiles #> '{common_core,items,Currency:MtxPurchased,quantity}' AS stored,
               CASE WHEN jsonb_typeof(profiles #> '{common_core,items,Currency:MtxPurchased,quantity}') = 'number'
                   THEN (profiles #>> '{common_core,items,Currency:MtxPurchased,quantity}')::NUMERIC
               END AS stored_number
        FROM profiles
        WHERE account_id = $1
        FOR UPDATE
    ), readable AS (
        SELECT account_id,
               CASE
                   WHEN NOT path_ok THEN NULL
                   WHEN stored IS NULL THEN 0::NUMERIC
                   WHEN stored_number = trunc(stored_number)
                        AND stored_number BETWEEN -9223372036854775808 AND 9223372036854775807
                       THEN stored_number
               END AS previous
        FROM target
    ), next AS (
        SELECT account_id, previous,
               CASE
                   WHEN previous IS NULL THEN NULL
                   WHEN $3::BOOLEAN THEN previous + $2::BIGINT
                   ELSE $2::BIGINT::NUMERIC
               END AS value
        FROM readable
    )
    UPDATE profiles AS p
    SET profiles = CASE
        WHEN next.value BETWEEN 0 AND 9223372036854775807 THEN
            jsonb_set(
                jsonb_set(
                    jsonb_set(
                        jsonb_set(p.profiles, '{common_core}',
                                  COALESCE(p.profiles -> 'common_core', '{}'::jsonb)),
                        '{common_core,items}',
                        COALESCE(p.profiles #> '{common_core,items}', '{}'::jsonb)),
                    '{common_core,items,Currency:MtxPurchased}',
                    COALESCE(p.profiles #> '{common_core,items,Currency:MtxPurchased}', '{}'::jsonb)),
                '{common_core,items,Currency:MtxPurchased,quantity}',
                to_jsonb(next.value::BIGINT))
        ELSE p.profiles
    END
    FROM next
    WHERE p.account_id = next.account_id
    RETURNING next.previous::BIGINT AS previous,
              CASE WHEN next.previous IS NOT NULL THEN
                  COALESCE((p.profiles #>> '{common_core,items,Currency:MtxPurchased,quantity}')::NUMERIC::BIGINT, 0)
              END AS current";

/// PostgreSQL profile store
pub struct PostgresProfileStore {
    /// Database connection pool
    pool: DbPool,
}

impl PostgresProfileStore {
    /// Create a store on top of an existing pool
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new PostgreSQL profile store
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let database_url = match database_url {
            Some(url) => url,
            None => std::env::var("DATABASE_URL")
                .map_err(|_| Error::ConfigurationError("DATABASE_URL must be set".to_string()))?,
        };

        let pool = db::init_db_pool(&database_url, 5).await?;
        Ok(Self::from_pool(pool))
    }

    /// Create a new PostgreSQL profile store with configuration
    pub async fn with_config(config: &crate::config::ProfileServiceConfig) -> Result<Self> {
        let pool = db::init_db_pool(&config.database_url, config.db_pool_size).await?;

        if config.run_migrations {
            db::run_migrations(&pool).await?;
        }

        Ok(Self::from_pool(pool))
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn create_profile(&self, account_id: &str) -> Result<Profile> {
        debug!("Creating profile in database: {}", account_id);

        let profile = Profile::new(account_id);
        let row = sqlx::query_as::<_, DbProfile>(INSERT_PROFILE)
            .bind(&profile.account_id)
            .bind(profile.created)
            .bind(&profile.profiles)
            .bind(profile.vbucks)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Profile::from).ok_or_else(|| {
            Error::ValidationError(format!("Profile already exists for account: {}", account_id))
        })
    }

    async fn find_by_account_id(&self, account_id: &str, projection: Projection) -> Result<Option<Profile>> {
        debug!("Getting profile from database: {} ({:?})", account_id, projection);

        let sql = match projection {
            Projection::Full => SELECT_PROFILE,
            Projection::Balances => SELECT_BALANCES,
        };

        let row = sqlx::query_as::<_, DbProfile>(sql)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Profile::from))
    }

    async fn apply_update(
        &self,
        account_id: &str,
        field: CurrencyField,
        update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        debug!("Applying {:?} to {} for {}", update, field, account_id);

        let sql = match field {
            CurrencyField::Vbucks => UPDATE_VBUCKS,
            CurrencyField::MtxPurchased => UPDATE_MTX_QUANTITY,
        };
        let (amount, is_increment) = match update {
            BalanceUpdate::SetTo(value) => (value, false),
            BalanceUpdate::IncrementBy(delta) => (delta, true),
        };

        let row = sqlx::query(sql)
            .bind(account_id)
            .bind(amount)
            .bind(is_increment)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let previous: Option<i64> = row.try_get("previous")?;
                let current: Option<i64> = row.try_get("current")?;
                match (previous, current) {
                    (Some(previous), Some(current)) => Ok(UpdateOutcome::matched(previous, current)),
                    _ => Err(Error::Internal(format!(
                        "Profile of account {} has an unreadable value at {}",
                        account_id, field
                    ))),
                }
            }
            None => Ok(UpdateOutcome::unmatched()),
        }
    }

    async fn close(&self) {
        info!("Closing PostgreSQL connection pool");
        self.pool.close().await;
    }
}
