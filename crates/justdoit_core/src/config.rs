//! Process-wide ordering configuration.
//!
//! # Responsibility
//! - Hold the `increment` / `min_gap` constants used by the ordering engine.
//! - Read them once per process (explicit install or environment fallback).
//!
//! # Invariants
//! - `min_gap >= 1` and `increment > min_gap`.
//! - Once installed, the process-wide value never changes.
//! - Changing the configuration never renormalizes existing data.

use log::{info, warn};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Step used for empty columns, head/tail inserts and renormalization pushes.
pub const DEFAULT_ORDER_INCREMENT: i64 = 1000;
/// Gap between neighbours below which a mid insert triggers renormalization.
pub const DEFAULT_ORDER_MIN_GAP: i64 = 1;

pub const ORDER_INCREMENT_ENV: &str = "JUSTDOIT_ORDER_INCREMENT";
pub const ORDER_MIN_GAP_ENV: &str = "JUSTDOIT_ORDER_MIN_GAP";

static ORDERING_CONFIG: OnceCell<OrderingConfig> = OnceCell::new();

/// Tunable constants of the ordering engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderingConfig {
    increment: i64,
    min_gap: i64,
}

/// Errors from ordering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `min_gap` is below 1.
    MinGapTooSmall(i64),
    /// `increment` does not exceed `min_gap`.
    IncrementNotAboveMinGap { increment: i64, min_gap: i64 },
    /// Environment value is not an integer.
    InvalidEnvValue { key: &'static str, value: String },
    /// A different configuration is already installed.
    AlreadyInitialized {
        active: OrderingConfig,
        requested: OrderingConfig,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MinGapTooSmall(value) => {
                write!(f, "order min gap must be at least 1, got {value}")
            }
            Self::IncrementNotAboveMinGap { increment, min_gap } => write!(
                f,
                "order increment {increment} must be greater than min gap {min_gap}"
            ),
            Self::InvalidEnvValue { key, value } => {
                write!(f, "`{key}` must be an integer, got `{value}`")
            }
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "ordering config already initialized with increment={} min_gap={}; refusing to switch to increment={} min_gap={}",
                active.increment, active.min_gap, requested.increment, requested.min_gap
            ),
        }
    }
}

impl Error for ConfigError {}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            increment: DEFAULT_ORDER_INCREMENT,
            min_gap: DEFAULT_ORDER_MIN_GAP,
        }
    }
}

impl OrderingConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    /// - `MinGapTooSmall` when `min_gap < 1`.
    /// - `IncrementNotAboveMinGap` when `increment <= min_gap`.
    pub fn new(increment: i64, min_gap: i64) -> Result<Self, ConfigError> {
        if min_gap < 1 {
            return Err(ConfigError::MinGapTooSmall(min_gap));
        }
        if increment <= min_gap {
            return Err(ConfigError::IncrementNotAboveMinGap { increment, min_gap });
        }
        Ok(Self { increment, min_gap })
    }

    /// Reads configuration from `JUSTDOIT_ORDER_INCREMENT` and
    /// `JUSTDOIT_ORDER_MIN_GAP`, using defaults for unset or blank keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let increment = read_i64(&lookup, ORDER_INCREMENT_ENV)?.unwrap_or(DEFAULT_ORDER_INCREMENT);
        let min_gap = read_i64(&lookup, ORDER_MIN_GAP_ENV)?.unwrap_or(DEFAULT_ORDER_MIN_GAP);
        Self::new(increment, min_gap)
    }

    pub fn increment(&self) -> i64 {
        self.increment
    }

    pub fn min_gap(&self) -> i64 {
        self.min_gap
    }
}

/// Installs the process-wide ordering configuration.
///
/// Repeating the call with an equal value is a no-op; a different value is
/// rejected.
pub fn init_ordering_config(config: OrderingConfig) -> Result<(), ConfigError> {
    let active = ORDERING_CONFIG.get_or_init(|| {
        info!(
            "event=config_init module=config status=ok source=explicit increment={} min_gap={}",
            config.increment, config.min_gap
        );
        config
    });
    if *active != config {
        return Err(ConfigError::AlreadyInitialized {
            active: *active,
            requested: config,
        });
    }
    Ok(())
}

/// Returns the process-wide ordering configuration.
///
/// Falls back to the environment on first use; invalid environment values
/// are logged and replaced by defaults.
pub fn ordering_config() -> OrderingConfig {
    *ORDERING_CONFIG.get_or_init(|| match OrderingConfig::from_env() {
        Ok(config) => {
            info!(
                "event=config_init module=config status=ok source=env increment={} min_gap={}",
                config.increment, config.min_gap
            );
            config
        }
        Err(err) => {
            warn!(
                "event=config_init module=config status=fallback source=default error={}",
                err
            );
            OrderingConfig::default()
        }
    })
}

fn read_i64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<i64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvValue {
            key,
            value: trimmed.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{
        init_ordering_config, ordering_config, ConfigError, OrderingConfig,
        DEFAULT_ORDER_INCREMENT, DEFAULT_ORDER_MIN_GAP, ORDER_INCREMENT_ENV, ORDER_MIN_GAP_ENV,
    };
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_keep_increment_far_above_min_gap() {
        let config = OrderingConfig::default();
        assert_eq!(config.increment(), DEFAULT_ORDER_INCREMENT);
        assert_eq!(config.min_gap(), DEFAULT_ORDER_MIN_GAP);
        assert!(config.increment() > config.min_gap() * 100);
    }

    #[test]
    fn new_rejects_invalid_pairs() {
        assert_eq!(
            OrderingConfig::new(1000, 0).unwrap_err(),
            ConfigError::MinGapTooSmall(0)
        );
        assert_eq!(
            OrderingConfig::new(5, 5).unwrap_err(),
            ConfigError::IncrementNotAboveMinGap {
                increment: 5,
                min_gap: 5
            }
        );
    }

    #[test]
    fn from_lookup_reads_overrides_and_ignores_blank() {
        let config = OrderingConfig::from_lookup(lookup(&[
            (ORDER_INCREMENT_ENV, " 64 "),
            (ORDER_MIN_GAP_ENV, ""),
        ]))
        .unwrap();
        assert_eq!(config.increment(), 64);
        assert_eq!(config.min_gap(), DEFAULT_ORDER_MIN_GAP);
    }

    #[test]
    fn from_lookup_rejects_non_integer() {
        let err = OrderingConfig::from_lookup(lookup(&[(ORDER_MIN_GAP_ENV, "two")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvValue { key, .. } if key == ORDER_MIN_GAP_ENV
        ));
    }

    #[test]
    fn process_config_is_installed_once() {
        let active = ordering_config();
        init_ordering_config(active).expect("same config should be idempotent");

        let other = OrderingConfig::new(active.increment() + 1, active.min_gap()).unwrap();
        let err = init_ordering_config(other).unwrap_err();
        assert!(err.to_string().contains("refusing to switch"));
        assert_eq!(ordering_config(), active);
    }
}
