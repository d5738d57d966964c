//! Engine configuration.
//!
//! # Responsibility
//! - Define tunables of the sync engine with safe defaults.
//! - Load overrides from JSON supplied by the UI shell.
//!
//! # Invariants
//! - Every field has a default; an empty object is a valid config.
//! - `event_capacity` is non-zero after `validate()`.

use crate::model::stage::Stage;
use crate::sync::reconcile::ReconciliationPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    InvalidEventCapacity,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid engine config: {err}"),
            Self::InvalidEventCapacity => write!(f, "event_capacity must be greater than zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidEventCapacity => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Sync engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Stage receiving items whose container key is missing or unknown.
    pub fallback_stage: Stage,
    /// Buffered events per notification subscriber.
    pub event_capacity: usize,
    /// Keep local values written after a refresh was issued.
    pub guard_recent_writes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_stage: Stage::ToContact,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            guard_recent_writes: true,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config object.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity);
        }
        Ok(())
    }

    pub fn reconciliation_policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy {
            guard_recent_writes: self.guard_recent_writes,
        }
    }
}
