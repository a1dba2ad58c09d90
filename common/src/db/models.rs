use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use crate::model::profile::Profile;

/// Database model for the profiles table
#[derive(Debug, Clone, FromRow)]
pub struct DbProfile {
    pub account_id: String,
    pub created: DateTime<Utc>,
    pub profiles: Value,
    pub vbucks: i64,
}

impl From<DbProfile> for Profile {
    fn from(row: DbProfile) -> Self {
        Profile {
            account_id: row.account_id,
            created: row.created,
            profiles: row.profiles,
            vbucks: row.vbucks,
        }
    }
}
