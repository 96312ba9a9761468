//! Coordinator configuration: defaults, JSON source, env overrides.

use log::warn;
use serde::Deserialize;
use squeeze_entitlement::{DEFAULT_FREE_TIER_MAX_FILE_BYTES, EntitlementPolicy};
use squeeze_pipeline::{DEFAULT_MAX_RETRY_ATTEMPTS, RetryPolicy};
use thiserror::Error;

/// Env var overriding [`CoordinatorConfig::free_tier_max_file_bytes`].
pub const ENV_FREE_MAX_BYTES: &str = "SQUEEZE_FREE_MAX_BYTES";
/// Env var overriding [`CoordinatorConfig::max_retry_attempts`].
pub const ENV_MAX_RETRIES: &str = "SQUEEZE_MAX_RETRIES";
/// Env var overriding [`CoordinatorConfig::strict_invariants`].
pub const ENV_STRICT_INVARIANTS: &str = "SQUEEZE_STRICT_INVARIANTS";

/// Default number of successful runs before the rating request.
pub const DEFAULT_RATING_PROMPT_AFTER_SUCCESSES: u32 = 3;
/// Default total-bytes-saved milestone (100 MiB).
pub const DEFAULT_SAVINGS_MILESTONE_BYTES: u64 = 100 * 1024 * 1024;

/// Tunables of the workflow coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Free-tier file size ceiling enforced by the gate.
    pub free_tier_max_file_bytes: u64,
    /// User-confirmed retries allowed per run.
    pub max_retry_attempts: u32,
    /// Successful runs before the rating request is shown.
    pub rating_prompt_after_successes: u32,
    /// Total bytes saved that also triggers the rating request.
    pub savings_milestone_bytes: u64,
    /// Panic on invariant violations instead of recovering to Home.
    pub strict_invariants: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            free_tier_max_file_bytes: DEFAULT_FREE_TIER_MAX_FILE_BYTES,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            rating_prompt_after_successes: DEFAULT_RATING_PROMPT_AFTER_SUCCESSES,
            savings_milestone_bytes: DEFAULT_SAVINGS_MILESTONE_BYTES,
            strict_invariants: cfg!(debug_assertions),
        }
    }
}

impl CoordinatorConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::InvalidValue`] when [`Self::validate`] fails.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_FREE_MAX_BYTES) {
            match raw.trim().parse::<u64>() {
                Ok(value) => self.free_tier_max_file_bytes = value,
                Err(_) => warn!("config: ignored override key={ENV_FREE_MAX_BYTES} value={raw:?}"),
            }
        }

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            match raw.trim().parse::<u32>() {
                Ok(value) => self.max_retry_attempts = value,
                Err(_) => warn!("config: ignored override key={ENV_MAX_RETRIES} value={raw:?}"),
            }
        }

        if let Some(raw) = lookup(ENV_STRICT_INVARIANTS) {
            match parse_switch(&raw) {
                Some(value) => self.strict_invariants = value,
                None => warn!("config: ignored override key={ENV_STRICT_INVARIANTS} value={raw:?}"),
            }
        }
    }

    /// Checks field ranges.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when the size ceiling is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.free_tier_max_file_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "free_tier_max_file_bytes",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    /// Gate policy derived from this config.
    pub fn entitlement_policy(&self) -> EntitlementPolicy {
        EntitlementPolicy {
            free_tier_max_file_bytes: self.free_tier_max_file_bytes,
        }
    }

    /// Retry policy derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
        }
    }
}

/// Parses `1/true/on` and `0/false/off`, case-insensitive.
fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    /// A field holds an out-of-range value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Constraint that failed.
        reason: &'static str,
    },
}
