#![forbid(unsafe_code)]

//! Strategy configuration (deterministic, env-overridable).
//!
//! # Environment Variables
//! - `DFUZZ_STRATEGY` = ppct|random
//! - `DFUZZ_MAX_DELAY_STEPS` (u64)
//! - `DFUZZ_PRIORITY_CHANGE_POINTS` (u64)
//! - `DFUZZ_EPOCH_MODE` = fixed|change-points
//! - `DFUZZ_RANDOM_MAX_STEPS` (u64, 0 = unbounded)
//!
//! Parsing never fails outright: unparsable values keep their default and are
//! reported in [`ConfigParse::errors`]. Constraint checks live in
//! [`PpctConfig::validate`], which strategy construction calls.

use std::env;
use std::fmt;

const ENV_STRATEGY: &str = "DFUZZ_STRATEGY";
const ENV_MAX_DELAY_STEPS: &str = "DFUZZ_MAX_DELAY_STEPS";
const ENV_PRIORITY_CHANGE_POINTS: &str = "DFUZZ_PRIORITY_CHANGE_POINTS";
const ENV_EPOCH_MODE: &str = "DFUZZ_EPOCH_MODE";
const ENV_RANDOM_MAX_STEPS: &str = "DFUZZ_RANDOM_MAX_STEPS";

/// Divisor applied to `max_delay_steps` in [`EpochMode::FixedDivisor`].
pub const FIXED_EPOCH_DIVISOR: u64 = 100;

/// How the PPCT epoch length is derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpochMode {
    /// `max_delay_steps / 100`; `priority_change_points` is ignored.
    #[default]
    FixedDivisor,
    /// `max_delay_steps / priority_change_points`.
    ChangePoints,
}

impl EpochMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-divisor" | "fixed_divisor" | "compat" => Some(Self::FixedDivisor),
            "change-points" | "change_points" | "changepoints" | "cp" => Some(Self::ChangePoints),
            _ => None,
        }
    }

    /// Canonical name accepted by `DFUZZ_EPOCH_MODE`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedDivisor => "fixed",
            Self::ChangePoints => "change-points",
        }
    }
}

impl fmt::Display for EpochMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which member of the fuzzing family to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Probabilistic priority-based delays.
    #[default]
    Ppct,
    /// Uniform random delays bounded by the hook's hint.
    Random,
}

impl StrategyKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ppct" | "pct" => Some(Self::Ppct),
            "random" | "rand" => Some(Self::Random),
            _ => None,
        }
    }

    /// Canonical name accepted by `DFUZZ_STRATEGY`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ppct => "ppct",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PPCT tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpctConfig {
    /// Scale of an iteration; bounds the epoch length.
    pub max_delay_steps: u64,
    /// Number of priority reshuffles per `max_delay_steps` window.
    /// Only consulted in [`EpochMode::ChangePoints`].
    pub priority_change_points: u64,
    /// How the epoch length is derived.
    pub epoch_mode: EpochMode,
}

impl Default for PpctConfig {
    fn default() -> Self {
        Self {
            max_delay_steps: 500,
            priority_change_points: 2,
            epoch_mode: EpochMode::FixedDivisor,
        }
    }
}

impl PpctConfig {
    /// Set `max_delay_steps`.
    #[must_use]
    pub fn with_max_delay_steps(mut self, steps: u64) -> Self {
        self.max_delay_steps = steps;
        self
    }

    /// Set `priority_change_points`.
    #[must_use]
    pub fn with_priority_change_points(mut self, points: u64) -> Self {
        self.priority_change_points = points;
        self
    }

    /// Set the epoch derivation mode.
    #[must_use]
    pub fn with_epoch_mode(mut self, mode: EpochMode) -> Self {
        self.epoch_mode = mode;
        self
    }

    /// Number of decisions between priority-set resets.
    ///
    /// Zero means the configuration is degenerate; [`Self::validate`]
    /// rejects it.
    #[must_use]
    pub fn epoch_length(&self) -> u64 {
        let divisor = match self.epoch_mode {
            EpochMode::FixedDivisor => FIXED_EPOCH_DIVISOR,
            EpochMode::ChangePoints => self.priority_change_points,
        };
        self.max_delay_steps.checked_div(divisor).unwrap_or(0)
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.max_delay_steps == 0 {
            errors.push(ConfigError::new(
                "max_delay_steps",
                "0",
                "must be >= 1",
            ));
        }
        match self.epoch_mode {
            EpochMode::FixedDivisor => {
                if self.max_delay_steps < FIXED_EPOCH_DIVISOR {
                    errors.push(ConfigError::new(
                        "max_delay_steps",
                        self.max_delay_steps.to_string(),
                        "must be >= 100 with the fixed epoch divisor",
                    ));
                }
            }
            EpochMode::ChangePoints => {
                if self.priority_change_points == 0 {
                    errors.push(ConfigError::new(
                        "priority_change_points",
                        "0",
                        "must be >= 1",
                    ));
                } else if self.priority_change_points > self.max_delay_steps {
                    errors.push(ConfigError::new(
                        "priority_change_points",
                        self.priority_change_points.to_string(),
                        "must not exceed max_delay_steps",
                    ));
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Top-level selection of a fuzzing strategy and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrategyConfig {
    /// Strategy to build.
    pub kind: StrategyKind,
    /// Parameters used when `kind` is PPCT.
    pub ppct: PpctConfig,
    /// Step budget for [`StrategyKind::Random`]; 0 means unbounded.
    pub random_max_steps: u64,
}

impl StrategyConfig {
    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> StrategyConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> ConfigParse {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Parse config through an arbitrary key lookup.
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = StrategyConfig::default();
        let mut errors = Vec::new();

        if let Some(value) = get(ENV_STRATEGY) {
            match StrategyKind::parse(&value) {
                Some(parsed) => config.kind = parsed,
                None => errors.push(ConfigError::new("kind", value, "expected ppct|random")),
            }
        }

        if let Some(value) = get(ENV_MAX_DELAY_STEPS) {
            match parse_u64(&value) {
                Some(parsed) => config.ppct.max_delay_steps = parsed,
                None => errors.push(ConfigError::new(
                    "max_delay_steps",
                    value,
                    "expected non-negative integer",
                )),
            }
        }

        if let Some(value) = get(ENV_PRIORITY_CHANGE_POINTS) {
            match parse_u64(&value) {
                Some(parsed) => config.ppct.priority_change_points = parsed,
                None => errors.push(ConfigError::new(
                    "priority_change_points",
                    value,
                    "expected non-negative integer",
                )),
            }
        }

        if let Some(value) = get(ENV_EPOCH_MODE) {
            match EpochMode::parse(&value) {
                Some(parsed) => config.ppct.epoch_mode = parsed,
                None => errors.push(ConfigError::new(
                    "epoch_mode",
                    value,
                    "expected fixed|change-points",
                )),
            }
        }

        if let Some(value) = get(ENV_RANDOM_MAX_STEPS) {
            match parse_u64(&value) {
                Some(parsed) => config.random_max_steps = parsed,
                None => errors.push(ConfigError::new(
                    "random_max_steps",
                    value,
                    "expected non-negative integer",
                )),
            }
        }

        if config.kind == StrategyKind::Ppct {
            if let Err(violations) = config.ppct.validate() {
                errors.extend(violations);
            }
        }

        ConfigParse { config, errors }
    }

    /// Short human-readable summary for run headers.
    #[must_use]
    pub fn summary_short(&self) -> String {
        match self.kind {
            StrategyKind::Ppct => format!(
                "ppct · max_delay_steps={} · epoch={} ({})",
                self.ppct.max_delay_steps,
                self.ppct.epoch_length(),
                self.ppct.epoch_mode
            ),
            StrategyKind::Random => format!("random · max_steps={}", self.random_max_steps),
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct ConfigParse {
    /// Parsed config; invalid values keep their defaults.
    pub config: StrategyConfig,
    /// Every parse or validation problem found.
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// Config field at fault.
    pub field: &'static str,
    /// Offending value as given.
    pub value: String,
    /// What was expected.
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

#[inline]
fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
