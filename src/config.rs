//! Configuration
//!
//! [`PlannerSettings`] is the raw, all-optional form read from YAML or assembled from command
//! line flags. It converts into a validated [`PlannerConfig`] with `TryFrom`.

use std::{fs, num::NonZeroUsize, path::Path, thread, time::Duration};

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{
    Money,
    iso::{self, Currency},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    pricing::{Cost, PricingError, currency_from_code, is_negative, parse_price},
    solvers::assignment::DEFAULT_NODE_LIMIT,
};

/// Default minimum order value, in minor units.
pub const DEFAULT_MINIMUM_ORDER: Cost = 5_000;

/// Default cap on the number of vendors in one plan.
pub const DEFAULT_MAX_VENDOR_COMBINATIONS: usize = 4;

/// Default early-termination tolerance over the global lower bound.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Minimum order below zero.
    #[error("minimum order must not be negative, got {0} minor units")]
    NegativeMinimumOrder(Cost),

    /// Vendor cap below one.
    #[error("max vendor combinations must be at least 1, got {0}")]
    InvalidVendorCap(i64),

    /// Timeout that is zero, negative or not finite.
    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    /// Tolerance below zero.
    #[error("tolerance must not be negative")]
    NegativeTolerance,

    /// Worker count below one.
    #[error("workers must be at least 1, got {0}")]
    InvalidWorkers(i64),

    /// Exhaustive node budget below one.
    #[error("exhaustive node limit must be at least 1, got {0}")]
    InvalidNodeLimit(i64),

    /// Minimum order priced in another currency than the plan.
    #[error("minimum order is in {found}, but the plan is priced in {expected}")]
    CurrencyMismatch {
        /// Currency of the minimum order value
        found: &'static str,

        /// Currency of the plan
        expected: &'static str,
    },

    /// Wrapped price or currency parsing error.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// IO error reading the configuration file
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse configuration YAML: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// How the planner assigns components within a vendor subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Greedy cheapest-vendor assignment, swap repair and single-move improvement
    GreedyRepair,

    /// Depth-first enumeration within a node budget
    #[default]
    Exhaustive,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreedyRepair => write!(f, "greedy-repair"),
            Self::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

/// What to do with required components that no vendor offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncoveredPolicy {
    /// Report a catalog error
    #[default]
    Fail,

    /// Drop them from the plan and list them in the outcome
    Exclude,
}

impl std::fmt::Display for UncoveredPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Exclude => write!(f, "exclude"),
        }
    }
}

/// Raw planner settings, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerSettings {
    /// ISO currency code (e.g. `EUR`)
    pub currency: Option<String>,

    /// Minimum order value, e.g. `"50"` or `"50.00 EUR"`
    pub minimum_order: Option<String>,

    /// Largest number of vendors in one plan
    pub max_vendor_combinations: Option<i64>,

    /// Wall-clock limit in seconds
    pub timeout_secs: Option<f64>,

    /// Early-termination tolerance as a fraction (e.g. 0.05 for 5%)
    pub tolerance: Option<f64>,

    /// Number of search worker threads
    pub workers: Option<i64>,

    /// Whether to drop dominated vendors before searching
    pub dominance_filter: Option<bool>,

    /// Handling of components no vendor offers
    pub uncovered_components: Option<UncoveredPolicy>,

    /// Assignment strategy
    pub strategy: Option<StrategyKind>,

    /// Node budget per subset for the exhaustive strategy
    pub exhaustive_node_limit: Option<i64>,
}

impl PlannerSettings {
    /// Parse settings from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Yaml`] if the document is malformed or has unknown keys.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Read settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Overlay `overrides` on top of `self`: every field set in `overrides` wins.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            currency: overrides.currency.or(self.currency),
            minimum_order: overrides.minimum_order.or(self.minimum_order),
            max_vendor_combinations: overrides
                .max_vendor_combinations
                .or(self.max_vendor_combinations),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            tolerance: overrides.tolerance.or(self.tolerance),
            workers: overrides.workers.or(self.workers),
            dominance_filter: overrides.dominance_filter.or(self.dominance_filter),
            uncovered_components: overrides.uncovered_components.or(self.uncovered_components),
            strategy: overrides.strategy.or(self.strategy),
            exhaustive_node_limit: overrides
                .exhaustive_node_limit
                .or(self.exhaustive_node_limit),
        }
    }
}

/// Validated planner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Currency every amount is priced in
    pub currency: &'static Currency,

    /// Product subtotal every vendor order must reach, in minor units
    pub minimum_order: Cost,

    /// Largest number of vendors in one plan
    pub max_vendor_combinations: usize,

    /// Optional wall-clock limit for the search
    pub timeout: Option<Duration>,

    /// Stop once the incumbent is within this fraction of the global lower bound
    pub tolerance: Percentage,

    /// Number of search worker threads
    pub workers: usize,

    /// Whether to drop dominated vendors before searching
    pub dominance_filter: bool,

    /// Handling of components no vendor offers
    pub uncovered_components: UncoveredPolicy,

    /// Assignment strategy
    pub strategy: StrategyKind,

    /// Node budget per subset for the exhaustive strategy
    pub exhaustive_node_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            currency: iso::EUR,
            minimum_order: DEFAULT_MINIMUM_ORDER,
            max_vendor_combinations: DEFAULT_MAX_VENDOR_COMBINATIONS,
            timeout: None,
            tolerance: Percentage::from(DEFAULT_TOLERANCE),
            workers: default_workers(),
            dominance_filter: true,
            uncovered_components: UncoveredPolicy::Fail,
            strategy: StrategyKind::Exhaustive,
            exhaustive_node_limit: DEFAULT_NODE_LIMIT,
        }
    }
}

impl PlannerConfig {
    /// Check that every value is in range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.minimum_order < 0 {
            return Err(ConfigurationError::NegativeMinimumOrder(self.minimum_order));
        }

        if self.max_vendor_combinations == 0 {
            return Err(ConfigurationError::InvalidVendorCap(0));
        }

        if let Some(timeout) = self.timeout
            && timeout.is_zero()
        {
            return Err(ConfigurationError::InvalidTimeout(0.0));
        }

        if is_negative(&self.tolerance) {
            return Err(ConfigurationError::NegativeTolerance);
        }

        if self.workers == 0 {
            return Err(ConfigurationError::InvalidWorkers(0));
        }

        if self.exhaustive_node_limit == 0 {
            return Err(ConfigurationError::InvalidNodeLimit(0));
        }

        Ok(())
    }

    /// Minimum order value as money.
    pub fn minimum_order_money(&self) -> Money<'static, Currency> {
        Money::from_minor(self.minimum_order, self.currency)
    }

    /// Tolerance as a percentage value (5 for 5%).
    pub fn tolerance_percent(&self) -> Decimal {
        ((self.tolerance * Decimal::ONE) * Decimal::ONE_HUNDRED)
            .round_dp(2)
            .normalize()
    }
}

impl std::fmt::Display for PlannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Planner Configuration:")?;
        writeln!(f, "  Minimum order:   {}", self.minimum_order_money())?;
        writeln!(f, "  Max vendors:     {}", self.max_vendor_combinations)?;
        match self.timeout {
            Some(timeout) => writeln!(f, "  Timeout:         {timeout:.2?}")?,
            None => writeln!(f, "  Timeout:         none")?,
        }
        writeln!(f, "  Tolerance:       {}%", self.tolerance_percent())?;
        writeln!(f, "  Workers:         {}", self.workers)?;
        writeln!(f, "  Dominance:       {}", if self.dominance_filter { "on" } else { "off" })?;
        writeln!(f, "  Uncovered:       {}", self.uncovered_components)?;
        writeln!(f, "  Strategy:        {}", self.strategy)?;
        Ok(())
    }
}

impl TryFrom<PlannerSettings> for PlannerConfig {
    type Error = ConfigurationError;

    fn try_from(settings: PlannerSettings) -> Result<Self, Self::Error> {
        let defaults = Self::default();

        let currency = match settings.currency.as_deref() {
            Some(code) => currency_from_code(code)?,
            None => defaults.currency,
        };

        let minimum_order = match settings.minimum_order.as_deref() {
            Some(value) => {
                let (minor, found) = parse_price(value, currency)?;

                if found != currency {
                    return Err(ConfigurationError::CurrencyMismatch {
                        found: found.iso_alpha_code,
                        expected: currency.iso_alpha_code,
                    });
                }

                minor
            }
            None => defaults.minimum_order,
        };

        let max_vendor_combinations = match settings.max_vendor_combinations {
            Some(cap) => positive(cap).ok_or(ConfigurationError::InvalidVendorCap(cap))?,
            None => defaults.max_vendor_combinations,
        };

        let timeout = settings
            .timeout_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .ok()
                    .filter(|timeout| !timeout.is_zero())
                    .ok_or(ConfigurationError::InvalidTimeout(secs))
            })
            .transpose()?;

        let tolerance = match settings.tolerance {
            Some(value) if value.is_finite() => Percentage::from(value),
            Some(_value) => return Err(ConfigurationError::NegativeTolerance),
            None => defaults.tolerance,
        };

        let workers = match settings.workers {
            Some(count) => positive(count).ok_or(ConfigurationError::InvalidWorkers(count))?,
            None => defaults.workers,
        };

        let exhaustive_node_limit = match settings.exhaustive_node_limit {
            Some(limit) => positive(limit).ok_or(ConfigurationError::InvalidNodeLimit(limit))?,
            None => defaults.exhaustive_node_limit,
        };

        let config = Self {
            currency,
            minimum_order,
            max_vendor_combinations,
            timeout,
            tolerance,
            workers,
            dominance_filter: settings.dominance_filter.unwrap_or(defaults.dominance_filter),
            uncovered_components: settings
                .uncovered_components
                .unwrap_or(defaults.uncovered_components),
            strategy: settings.strategy.unwrap_or(defaults.strategy),
            exhaustive_node_limit,
        };

        config.validate()?;

        Ok(config)
    }
}

fn positive(value: i64) -> Option<usize> {
    usize::try_from(value).ok().filter(|value| *value > 0)
}

fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
