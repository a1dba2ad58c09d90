//! Balance service: validation and mutation policy for currency balances

use std::sync::Arc;

use common::error::{Error, ErrorExt, Result};
use common::model::profile::{
    BalanceUpdate, CurrencyField, CurrencyOperation, Profile, Projection, UpdateOutcome,
    VBUCKS_PER_KILL, VBUCKS_PER_WIN,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{ProfileServiceConfig, StoreKind};
use crate::repository::{InMemoryProfileStore, PostgresProfileStore, ProfileStore};

/// Result of a purchased-currency adjustment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAdjustment {
    /// Operation that was applied
    pub operation: CurrencyOperation,
    /// Amount as requested (the target for `set`, the magnitude otherwise)
    pub amount: i64,
    /// Raw store outcome
    pub outcome: UpdateOutcome,
}

/// Result of a vbucks increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    /// Signed delta applied to the balance
    pub delta: i64,
    /// Raw store outcome
    pub outcome: UpdateOutcome,
}

/// Balance service for reading and mutating profile currencies
///
/// Holds no locks of its own. Every mutation is a single atomic update
/// issued to the store, so concurrent increments on one account commute.
pub struct BalanceService {
    /// Store for profile documents
    store: Arc<dyn ProfileStore>,
}

impl BalanceService {
    /// Create a new balance service backed by an in-memory store
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryProfileStore::new()))
    }

    /// Create a balance service on top of an existing store
    pub fn with_store(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Create a new balance service with a configuration
    pub async fn with_config(config: &ProfileServiceConfig) -> Result<Self> {
        let store: Arc<dyn ProfileStore> = match config.store {
            StoreKind::InMemory => {
                warn!("Using in-memory profile store, balances will not survive a restart");
                Arc::new(InMemoryProfileStore::new())
            }
            StoreKind::Postgres => Arc::new(PostgresProfileStore::with_config(config).await?),
        };

        Ok(Self { store })
    }

    /// Underlying profile store
    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Provision a profile for a new account
    pub async fn provision(&self, account_id: &str) -> Result<Profile> {
        validate_account_id(account_id)?;
        info!("Provisioning profile for account {}", account_id);
        self.store.create_profile(account_id).await
    }

    /// Get the full profile document
    pub async fn get_profile(&self, account_id: &str) -> Result<Profile> {
        validate_account_id(account_id)?;
        self.store
            .find_by_account_id(account_id, Projection::Full)
            .await?
            .ok_or_else(|| Error::ProfileNotFound(format!("No profile for account {}", account_id)))
    }

    /// Get the current vbucks balance
    pub async fn get_balance(&self, account_id: &str) -> Result<i64> {
        validate_account_id(account_id)?;
        let profile = self
            .store
            .find_by_account_id(account_id, Projection::Balances)
            .await
            .with_context(|| format!("Failed to load balance for account {}", account_id))?
            .ok_or_else(|| Error::ProfileNotFound(format!("No profile for account {}", account_id)))?;

        Ok(profile.vbucks)
    }

    /// Set, add to or remove from the purchased-currency quantity.
    ///
    /// Both inputs are validated before the store is touched.
    pub async fn adjust_legacy_currency(
        &self,
        account_id: &str,
        operation: &str,
        amount: &Value,
    ) -> Result<LegacyAdjustment> {
        validate_account_id(account_id)?;
        let amount = parse_amount(amount)?;
        let operation: CurrencyOperation = operation.parse()?;
        let update = operation
            .to_update(amount)
            .ok_or_else(|| Error::ValidationError(format!("Amount out of range: {}", amount)))?;

        info!("Applying {:?} {} to purchased currency of account {}", operation, amount, account_id);
        let outcome = self
            .mutate(account_id, CurrencyField::MtxPurchased, update)
            .await?;

        Ok(LegacyAdjustment {
            operation,
            amount,
            outcome,
        })
    }

    /// Award vbucks for eliminations
    pub async fn award_for_kills(&self, account_id: &str, kills: Option<i64>) -> Result<BalanceChange> {
        let kills = kills.unwrap_or(0);
        if kills < 0 {
            return Err(Error::ValidationError(format!("Kills cannot be negative: {}", kills)));
        }
        let delta = kills
            .checked_mul(VBUCKS_PER_KILL)
            .ok_or_else(|| Error::ValidationError(format!("Kill count out of range: {}", kills)))?;

        info!("Awarding {} vbucks for {} kills to account {}", delta, kills, account_id);
        self.increment_vbucks(account_id, delta).await
    }

    /// Award vbucks for a match win
    pub async fn award_for_win(&self, account_id: &str) -> Result<BalanceChange> {
        info!("Awarding {} vbucks for a win to account {}", VBUCKS_PER_WIN, account_id);
        self.increment_vbucks(account_id, VBUCKS_PER_WIN).await
    }

    /// Add a signed delta to the vbucks balance
    pub async fn update_balance(&self, account_id: &str, delta: Option<i64>) -> Result<BalanceChange> {
        let delta = delta.unwrap_or(0);
        info!("Updating vbucks of account {} by {}", account_id, delta);
        self.increment_vbucks(account_id, delta).await
    }

    async fn increment_vbucks(&self, account_id: &str, delta: i64) -> Result<BalanceChange> {
        validate_account_id(account_id)?;
        let outcome = self
            .mutate(account_id, CurrencyField::Vbucks, BalanceUpdate::IncrementBy(delta))
            .await?;

        Ok(BalanceChange { delta, outcome })
    }

    /// Issue one atomic update and classify the store's outcome.
    ///
    /// - nothing matched: `ProfileNotFound`
    /// - matched, and the update asked for no change: success
    /// - matched, a change was asked for, nothing modified: the result was
    ///   out of range (`InsufficientBalance` / `ValidationError`) or the store
    ///   refused it (`MutationFailed`)
    async fn mutate(
        &self,
        account_id: &str,
        field: CurrencyField,
        update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        if let BalanceUpdate::SetTo(value) = update {
            if value < 0 {
                return Err(Error::ValidationError(format!("Cannot set {} to a negative value: {}", field, value)));
            }
        }

        let outcome = self
            .store
            .apply_update(account_id, field, update)
            .await
            .with_context(|| format!("Failed to update {} for account {}", field, account_id))?;

        if outcome.matched_count == 0 {
            return Err(Error::ProfileNotFound(format!("No profile for account {}", account_id)));
        }

        let previous = outcome.previous.unwrap_or_default();
        if outcome.modified_count == 0 && !update.is_noop_for(previous) {
            return Err(match update.apply(previous) {
                Some(next) if next < 0 => Error::InsufficientBalance(format!(
                    "{} of account {} is {}, update would leave {}",
                    field, account_id, previous, next
                )),
                None => Error::ValidationError(format!("{} update out of range for account {}", field, account_id)),
                Some(_) => Error::MutationFailed(format!("{} was not modified for account {}", field, account_id)),
            });
        }

        debug!(
            "Updated {} for account {}: {:?} -> {:?}",
            field, account_id, outcome.previous, outcome.current
        );
        Ok(outcome)
    }
}

impl Default for BalanceService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_account_id(account_id: &str) -> Result<()> {
    if account_id.trim().is_empty() {
        return Err(Error::ValidationError("Account ID must not be empty".to_string()));
    }
    Ok(())
}

/// Parse a request amount as an integer.
///
/// Accepts JSON integers, integral floats (`5.0`) and strings holding either.
/// Anything else, including fractional values, is rejected.
pub fn parse_amount(raw: &Value) -> Result<i64> {
    let invalid = || Error::ValidationError(format!("Amount must be an integer, got {}", raw));

    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)).ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn integral(value: f64) -> Option<i64> {
    // i64::MAX is not exactly representable, so bound with the next power of two
    if value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < 9_223_372_036_854_775_808.0 {
        Some(value as i64)
    } else {
        None
    }
}
