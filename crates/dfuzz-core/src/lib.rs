#![forbid(unsafe_code)]

//! Core: exploration-strategy contract and probabilistic delay injection.
//!
//! # Role in dfuzz
//! `dfuzz-core` decides, at every yield point of a program under test, how
//! long the running unit of work should pause. Perturbing relative speed
//! across many iterations makes interleaving-dependent bugs (races,
//! inversions, starvation) more likely to show up, without controlling the
//! host scheduler.
//!
//! # Primary responsibilities
//! - **ExplorationStrategy**: iteration lifecycle plus the per-decision query.
//! - **PpctStrategy**: probabilistic high/low priority assignment with
//!   epoch-scoped membership and an iteration-scoped probability ramp.
//! - **RandomDelayStrategy**: uniform delays bounded by the hook's hint.
//! - **RandomSource**: seedable randomness so failures can be reproduced.
//! - **IdentityProvider**: injected "who is running now" capability.
//! - **DelayInjector**: reference hook that sleeps outside the strategy lock.
//!
//! # How it fits in the system
//! `dfuzz-telemetry` implements [`InvocationSink`] to count invoked APIs per
//! test; `dfuzz-harness` supplies deterministic seeds and JSONL decision
//! traces for test runs.

pub mod config;
pub mod identity;
pub mod injector;
pub mod ppct;
pub mod random;
pub mod random_delay;
pub mod strategy;

pub use config::{ConfigError, ConfigParse, EpochMode, PpctConfig, StrategyConfig, StrategyKind};
pub use identity::{IdentityProvider, UnitId, UnitScope, no_identity, thread_identity};
pub use injector::{DelayInjector, InvocationSink};
pub use ppct::{Decision, PpctStrategy, Priority};
pub use random::{RandomSource, SeededRandom};
pub use random_delay::RandomDelayStrategy;
pub use strategy::{ExplorationStrategy, FuzzingStrategy};
