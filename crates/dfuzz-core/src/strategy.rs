#![forbid(unsafe_code)]

//! The exploration-strategy contract and the closed family of fuzzing
//! strategies that implement it.
//!
//! A driver owns one strategy per engine configuration and reuses it across
//! iterations:
//!
//! ```ignore
//! let mut strategy = FuzzingStrategy::from_config(&config, rng, thread_identity())?;
//! for iteration in 0..iterations {
//!     if !strategy.initialize_next_iteration(iteration) {
//!         break;
//!     }
//!     std::thread::scope(|s| run_program_under_test(s, &strategy));
//!     report(strategy.step_count(), strategy.is_fair());
//! }
//! ```
//!
//! `initialize_next_iteration` takes `&mut self` while `next_delay` takes
//! `&self`, so no decision can be in flight while an iteration is reset.

use crate::config::{ConfigError, StrategyConfig, StrategyKind};
use crate::identity::IdentityProvider;
use crate::ppct::PpctStrategy;
use crate::random::RandomSource;
use crate::random_delay::RandomDelayStrategy;

/// Contract shared by every exploration strategy.
pub trait ExplorationStrategy: Send + Sync {
    /// Reset per-iteration state. Returns `false` to request that
    /// exploration stop.
    fn initialize_next_iteration(&mut self, iteration: u32) -> bool;

    /// Delay to inject at the current yield point.
    ///
    /// `max_value` is an upper-bound hint supplied by the hook; strategies may
    /// ignore it. `None` means the strategy could not produce a decision.
    /// Safe to call concurrently from many units of work.
    fn next_delay(&self, max_value: u32) -> Option<u32>;

    /// Decisions made so far in the current iteration.
    fn step_count(&self) -> u64;

    /// True once the iteration's decision budget is exhausted.
    fn is_max_steps_reached(&self) -> bool;

    /// True if the strategy never starves a unit of delay opportunities.
    fn is_fair(&self) -> bool;

    /// Human-readable identity for reports.
    fn description(&self) -> String;
}

/// Every fuzzing strategy this crate ships, selected at construction.
#[derive(Debug)]
pub enum FuzzingStrategy {
    /// Priority-based probabilistic delays.
    Ppct(PpctStrategy),
    /// Uniform random delays.
    Random(RandomDelayStrategy),
}

impl FuzzingStrategy {
    /// Build the strategy named by `config.kind`.
    ///
    /// The identity provider is only consulted by PPCT.
    pub fn from_config(
        config: &StrategyConfig,
        random: Box<dyn RandomSource>,
        identity: IdentityProvider,
    ) -> Result<Self, ConfigError> {
        match config.kind {
            StrategyKind::Ppct => Ok(Self::Ppct(PpctStrategy::new(
                config.ppct.clone(),
                random,
                identity,
            )?)),
            StrategyKind::Random => Ok(Self::Random(RandomDelayStrategy::new(
                random,
                config.random_max_steps,
            ))),
        }
    }

    /// Which member of the family this is.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Ppct(_) => StrategyKind::Ppct,
            Self::Random(_) => StrategyKind::Random,
        }
    }

    /// The PPCT strategy, if that is what was built.
    #[must_use]
    pub fn as_ppct(&self) -> Option<&PpctStrategy> {
        match self {
            Self::Ppct(strategy) => Some(strategy),
            Self::Random(_) => None,
        }
    }
}

impl From<PpctStrategy> for FuzzingStrategy {
    fn from(strategy: PpctStrategy) -> Self {
        Self::Ppct(strategy)
    }
}

impl From<RandomDelayStrategy> for FuzzingStrategy {
    fn from(strategy: RandomDelayStrategy) -> Self {
        Self::Random(strategy)
    }
}

impl ExplorationStrategy for FuzzingStrategy {
    fn initialize_next_iteration(&mut self, iteration: u32) -> bool {
        match self {
            Self::Ppct(s) => s.initialize_next_iteration(iteration),
            Self::Random(s) => s.initialize_next_iteration(iteration),
        }
    }

    fn next_delay(&self, max_value: u32) -> Option<u32> {
        match self {
            Self::Ppct(s) => s.next_delay(max_value),
            Self::Random(s) => s.next_delay(max_value),
        }
    }

    fn step_count(&self) -> u64 {
        match self {
            Self::Ppct(s) => s.step_count(),
            Self::Random(s) => s.step_count(),
        }
    }

    fn is_max_steps_reached(&self) -> bool {
        match self {
            Self::Ppct(s) => s.is_max_steps_reached(),
            Self::Random(s) => s.is_max_steps_reached(),
        }
    }

    fn is_fair(&self) -> bool {
        match self {
            Self::Ppct(s) => s.is_fair(),
            Self::Random(s) => s.is_fair(),
        }
    }

    fn description(&self) -> String {
        match self {
            Self::Ppct(s) => s.description(),
            Self::Random(s) => s.description(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PpctConfig;
    use crate::identity::{UnitScope, thread_identity};
    use crate::random::SeededRandom;

    fn build(config: &StrategyConfig) -> Result<FuzzingStrategy, ConfigError> {
        FuzzingStrategy::from_config(config, Box::new(SeededRandom::new(11)), thread_identity())
    }

    #[test]
    fn default_config_builds_ppct() {
        let strategy = build(&StrategyConfig::default()).expect("valid config");
        assert_eq!(strategy.kind(), StrategyKind::Ppct);
        assert_eq!(strategy.description(), "PPCT fuzzing");
        assert!(strategy.as_ppct().is_some());
        assert!(strategy.is_fair());
        assert!(!strategy.is_max_steps_reached());
    }

    #[test]
    fn random_kind_builds_random() {
        let config = StrategyConfig {
            kind: StrategyKind::Random,
            random_max_steps: 3,
            ..StrategyConfig::default()
        };
        let mut strategy = build(&config).expect("valid config");
        assert_eq!(strategy.kind(), StrategyKind::Random);
        assert!(strategy.as_ppct().is_none());
        assert!(strategy.initialize_next_iteration(0));
        for _ in 0..3 {
            assert!(strategy.next_delay(10).is_some());
        }
        assert!(strategy.is_max_steps_reached());
    }

    #[test]
    fn degenerate_ppct_config_is_rejected() {
        let config = StrategyConfig {
            ppct: PpctConfig::default().with_max_delay_steps(10),
            ..StrategyConfig::default()
        };
        let err = build(&config).unwrap_err();
        assert_eq!(err.field, "max_delay_steps");
    }

    #[test]
    fn degenerate_ppct_config_ignored_for_random() {
        let config = StrategyConfig {
            kind: StrategyKind::Random,
            ppct: PpctConfig::default().with_max_delay_steps(10),
            random_max_steps: 0,
        };
        assert!(build(&config).is_ok());
    }

    #[test]
    fn enum_delegates_decisions() {
        let mut strategy = build(&StrategyConfig::default()).expect("valid config");
        assert!(strategy.initialize_next_iteration(0));
        assert_eq!(strategy.next_delay(100), Some(0));
        assert_eq!(strategy.step_count(), 0);
        let _unit = UnitScope::enter(1u64);
        assert!(strategy.next_delay(100).is_some());
        assert_eq!(strategy.step_count(), 1);
    }

    #[test]
    fn strategies_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FuzzingStrategy>();
    }
}
