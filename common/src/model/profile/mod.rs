//! Profile models and the typed update expressions applied to them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Template id of the purchased-currency item inside `common_core`
pub const MTX_CURRENCY_TEMPLATE: &str = "Currency:MtxPurchased";

/// Keys leading to the purchased-currency quantity inside the profile document
pub const MTX_QUANTITY_PATH: [&str; 4] = ["common_core", "items", MTX_CURRENCY_TEMPLATE, "quantity"];

/// Award for each elimination
pub const VBUCKS_PER_KILL: i64 = 250;

/// Award for a match win
pub const VBUCKS_PER_WIN: i64 = 1000;

/// Profile document, one per account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Profile {
    /// Account the profile belongs to
    pub account_id: String,
    /// Creation timestamp, never mutated
    pub created: DateTime<Utc>,
    /// Game-mode profile state
    #[serde(default, skip_serializing_if = "Value::is_null")]
    #[cfg_attr(feature = "utoipa", schema(value_type = Object))]
    pub profiles: Value,
    /// Primary currency balance
    #[serde(default)]
    pub vbucks: i64,
}

impl Profile {
    /// Create a freshly provisioned profile with a zero balance
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            created: Utc::now(),
            profiles: default_profiles(),
            vbucks: 0,
        }
    }

    /// Current value of a currency field.
    ///
    /// A missing nested quantity reads as zero. A quantity that is present
    /// but not an integer, or a path running through a non-object, is an
    /// `Internal` error so callers never overwrite data they cannot read.
    pub fn currency(&self, field: CurrencyField) -> Result<i64> {
        match field {
            CurrencyField::Vbucks => Ok(self.vbucks),
            CurrencyField::MtxPurchased => {
                let unreadable = |what: &str| {
                    Error::Internal(format!(
                        "Profile of account {} has {} at {}",
                        self.account_id, what, field
                    ))
                };

                let mut node = &self.profiles;
                for key in MTX_QUANTITY_PATH {
                    let map = node.as_object().ok_or_else(|| unreadable("a non-object"))?;
                    match map.get(key) {
                        Some(next) => node = next,
                        None => return Ok(0),
                    }
                }

                stored_integer(node).ok_or_else(|| unreadable("a non-integer quantity"))
            }
        }
    }

    /// Overwrite a currency field, creating the nested path when absent.
    ///
    /// Call [`Profile::currency`] first: non-object nodes on the path are replaced.
    pub fn set_currency(&mut self, field: CurrencyField, value: i64) {
        match field {
            CurrencyField::Vbucks => self.vbucks = value,
            CurrencyField::MtxPurchased => {
                let [core_key, items_key, item_key, quantity_key] = MTX_QUANTITY_PATH;
                let core = object_entry(&mut self.profiles, core_key);
                let items = object_entry(core, items_key);
                let item = object_entry(items, item_key);
                *object_entry(item, quantity_key) = json!(value);
            }
        }
    }

    /// Apply a projection, dropping what the caller did not ask for
    pub fn project(mut self, projection: Projection) -> Self {
        if projection == Projection::Balances {
            self.profiles = Value::Null;
        }
        self
    }
}

/// Integer held by a stored JSON number; integral floats count
fn stored_integer(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else { return None };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < 9_223_372_036_854_775_808.0)
            .map(|f| f as i64)
    })
}

fn object_entry<'a>(value: &'a mut Value, key: &str) -> &'a mut Value {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map.entry(key).or_insert_with(|| Value::Object(Map::new())),
        _ => unreachable!("value was replaced with an object above"),
    }
}

/// Profile document written on provisioning
pub fn default_profiles() -> Value {
    json!({
        "common_core": {
            "items": {
                "Currency:MtxPurchased": {
                    "templateId": MTX_CURRENCY_TEMPLATE,
                    "attributes": { "platform": "EpicPC" },
                    "quantity": 0
                }
            }
        }
    })
}

/// Currency counters a mutation can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrencyField {
    /// Top-level `vbucks` balance
    Vbucks,
    /// `common_core.items.Currency:MtxPurchased.quantity`
    MtxPurchased,
}

impl std::fmt::Display for CurrencyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrencyField::Vbucks => write!(f, "vbucks"),
            CurrencyField::MtxPurchased => write!(f, "profiles.common_core.items.{}.quantity", MTX_CURRENCY_TEMPLATE),
        }
    }
}

/// Atomic update expression applied by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceUpdate {
    /// Overwrite the field with an absolute value
    SetTo(i64),
    /// Add a signed delta to the field
    IncrementBy(i64),
}

impl BalanceUpdate {
    /// Value the field would hold after applying this update to `current`.
    ///
    /// Returns `None` on arithmetic overflow.
    pub fn apply(&self, current: i64) -> Option<i64> {
        match *self {
            BalanceUpdate::SetTo(value) => Some(value),
            BalanceUpdate::IncrementBy(delta) => current.checked_add(delta),
        }
    }

    /// Whether applying this update to `current` leaves the value unchanged
    pub fn is_noop_for(&self, current: i64) -> bool {
        self.apply(current) == Some(current)
    }
}

/// Operation requested against the purchased-currency counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub enum CurrencyOperation {
    /// Overwrite the quantity
    Set,
    /// Increase the quantity
    Add,
    /// Decrease the quantity
    Remove,
}

impl CurrencyOperation {
    /// Build the update expression for this operation and amount
    pub fn to_update(self, amount: i64) -> Option<BalanceUpdate> {
        match self {
            CurrencyOperation::Set => Some(BalanceUpdate::SetTo(amount)),
            CurrencyOperation::Add => Some(BalanceUpdate::IncrementBy(amount)),
            CurrencyOperation::Remove => amount.checked_neg().map(BalanceUpdate::IncrementBy),
        }
    }
}

impl std::str::FromStr for CurrencyOperation {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "set" => Ok(CurrencyOperation::Set),
            "add" => Ok(CurrencyOperation::Add),
            "remove" => Ok(CurrencyOperation::Remove),
            other => Err(Error::ValidationError(format!(
                "Unknown operation '{}', expected one of: set, add, remove",
                other
            ))),
        }
    }
}

/// What a store reports after applying an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct UpdateOutcome {
    /// Documents matched by account id (0 or 1)
    pub matched_count: u64,
    /// Documents whose field value actually changed (0 or 1)
    pub modified_count: u64,
    /// Field value observed before the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<i64>,
    /// Field value after the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
}

impl UpdateOutcome {
    /// No document matched the account id
    pub fn unmatched() -> Self {
        Self::default()
    }

    /// A document matched; `modified_count` follows from whether the value moved
    pub fn matched(previous: i64, current: i64) -> Self {
        Self {
            matched_count: 1,
            modified_count: u64::from(previous != current),
            previous: Some(previous),
            current: Some(current),
        }
    }
}

/// Which parts of a profile a read needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// The whole document
    #[default]
    Full,
    /// Only the key, timestamps and the top-level balance
    Balances,
}
