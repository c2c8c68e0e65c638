#![forbid(unsafe_code)]

//! Per-thread tuning of the tracking store.
//!
//! Configuration is read from three sources, lowest precedence first:
//! [`Default`], environment variables ([`ReactivityConfig::from_env`]), and
//! explicit values (JSON via [`ReactivityConfig::from_json_str`], or field
//! assignment). The active configuration is installed with [`configure`].

use std::cell::RefCell;
use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Store and handler tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactivityConfig {
    /// Maximum number of idle tracking tokens kept for reuse.
    pub token_pool_capacity: usize,
    /// Entry count that triggers the first sweep of dead store entries.
    pub sweep_threshold: usize,
    /// Prefix of token debug labels (`"{prefix}@{id}"`).
    pub label_prefix: String,
    /// Emit a `trace` event for every fired token.
    pub trace_notifications: bool,
}

impl Default for ReactivityConfig {
    fn default() -> Self {
        Self {
            token_pool_capacity: 32,
            sweep_threshold: 256,
            label_prefix: "Lucent".into(),
            trace_notifications: false,
        }
    }
}

impl ReactivityConfig {
    /// Defaults overridden by `LUCENT_*` environment variables.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("LUCENT_TOKEN_POOL_CAPACITY")
            && let Ok(n) = val.parse()
        {
            config.token_pool_capacity = n;
        }
        if let Ok(val) = env::var("LUCENT_SWEEP_THRESHOLD")
            && let Ok(n) = val.parse()
        {
            config.sweep_threshold = n;
        }
        if let Ok(val) = env::var("LUCENT_LABEL_PREFIX")
            && !val.is_empty()
        {
            config.label_prefix = val;
        }
        if let Ok(val) = env::var("LUCENT_TRACE_NOTIFICATIONS") {
            config.trace_notifications = val == "1" || val.eq_ignore_ascii_case("true");
        }
        config
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_threshold == 0 {
            return Err(Error::config("sweep_threshold must be at least 1"));
        }
        Ok(())
    }
}

thread_local! {
    static ACTIVE: RefCell<ReactivityConfig> = RefCell::new(ReactivityConfig::default());
}

/// Install `config` for the current thread.
pub fn configure(config: ReactivityConfig) -> Result<()> {
    config.validate()?;
    tracing::debug!(
        message = "config.install",
        token_pool_capacity = config.token_pool_capacity,
        sweep_threshold = config.sweep_threshold,
        label_prefix = %config.label_prefix,
    );
    ACTIVE.with(|active| *active.borrow_mut() = config);
    Ok(())
}

/// Snapshot of the active configuration.
#[must_use]
pub fn config() -> ReactivityConfig {
    ACTIVE.with(|active| active.borrow().clone())
}

pub(crate) fn with_config<R>(f: impl FnOnce(&ReactivityConfig) -> R) -> R {
    ACTIVE.with(|active| f(&active.borrow()))
}
