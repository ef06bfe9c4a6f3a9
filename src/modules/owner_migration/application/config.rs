use serde::Serialize;
use std::env;
use std::str::FromStr;

pub const ORPHAN_POLICY_VAR: &str = "OWNER_MIGRATION_ORPHAN_POLICY";
pub const BATCH_SIZE_VAR: &str = "OWNER_MIGRATION_BATCH_SIZE";

const DEFAULT_BATCH_SIZE: u64 = 1000;

/// What the backfill does with a legacy id found in no identity table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Store the row as unowned, count it and log a warning.
    #[default]
    Tolerate,
    /// Abort the migration on the first relation with orphans.
    Reject,
}

impl FromStr for OrphanPolicy {
    type Err = OwnerMigrationConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerate" => Ok(OrphanPolicy::Tolerate),
            "reject" => Ok(OrphanPolicy::Reject),
            other => Err(OwnerMigrationConfigError::InvalidValue {
                key: ORPHAN_POLICY_VAR,
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerMigrationConfigError {
    #[error("Invalid {key} value: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnerMigrationConfig {
    pub orphan_policy: OrphanPolicy,
    /// Rows resolved and written per backfill statement.
    pub batch_size: u64,
}

impl Default for OwnerMigrationConfig {
    fn default() -> Self {
        Self {
            orphan_policy: OrphanPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl OwnerMigrationConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, OwnerMigrationConfigError> {
        dotenvy::dotenv().ok(); // Load environment variables if available

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, OwnerMigrationConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let orphan_policy = match lookup(ORPHAN_POLICY_VAR) {
            Some(raw) => raw.parse()?,
            None => OrphanPolicy::default(),
        };

        let batch_size = match lookup(BATCH_SIZE_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(OwnerMigrationConfigError::InvalidValue {
                    key: BATCH_SIZE_VAR,
                    value: raw,
                })?,
            None => DEFAULT_BATCH_SIZE,
        };

        Ok(Self {
            orphan_policy,
            batch_size,
        })
    }
}
