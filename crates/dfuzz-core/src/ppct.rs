#![forbid(unsafe_code)]

//! Probabilistic priority-based delay injection (PPCT).
//!
//! Without control over the host scheduler the engine cannot force a specific
//! interleaving. PPCT biases *relative speed* instead: at every yield point the
//! running unit is either high priority (never delayed) or low priority
//! (delayed by a randomized amount).
//!
//! # Lifecycle
//!
//! - **Iteration**: [`PpctStrategy::initialize_next_iteration`] zeroes the step
//!   counter, empties both priority sets and advances the low-priority
//!   probability one notch through the cycle `0.0, 0.1, …, 0.8, 0.0, …`.
//!   A fresh strategy sits at 0.0, so its first iteration runs at 0.1.
//! - **Epoch**: every `epoch_length` identified decisions both priority sets
//!   are cleared and units are re-rolled on their next decision.
//! - **Decision**: an unassigned unit draws `r ∈ [0,1)` and joins the low set
//!   when `r < p`, the high set otherwise. Membership holds until the epoch
//!   ends.
//!
//! # Delays
//!
//! | Membership | `p > 0.4` | `p <= 0.4` |
//! |------------|-----------|------------|
//! | high       | 0         | 0          |
//! | low        | `5 * U{0..9}` (0..=45) | `50 + 5 * U{0..9}` (50..=95) |
//!
//! When many units are low priority, delays stay short to bound slowdown;
//! when few are, each pays a larger delay so it is more likely to be
//! overtaken.
//!
//! # Concurrency
//!
//! All mutable state sits behind one mutex and each decision runs under a
//! single acquisition. The caller sleeps after [`PpctStrategy::next_delay`]
//! returns, never while the lock is held.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::config::{ConfigError, PpctConfig};
use crate::identity::{IdentityProvider, UnitId};
use crate::random::RandomSource;
use crate::strategy::ExplorationStrategy;

/// Upper end of the probability cycle, in tenths.
const MAX_LOW_PRIORITY_TENTHS: u8 = 8;

/// Above this probability (in tenths) low-priority delays are short.
const SHORT_DELAY_ABOVE_TENTHS: u8 = 4;

/// Number of equally likely delay buckets.
const DELAY_BUCKETS: u32 = 10;

/// Width of one delay bucket.
const DELAY_QUANTUM: u32 = 5;

/// Offset added to long low-priority delays.
const LONG_DELAY_BASE: u32 = 50;

/// Set membership of a unit within the current epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Delayed by a randomized amount.
    Low,
    /// Never delayed.
    High,
}

impl Priority {
    /// Lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full record of one identified decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Unit the decision was made for.
    pub unit: UnitId,
    /// Step counter value after this decision (1-based).
    pub step: u64,
    /// Membership after this decision.
    pub priority: Priority,
    /// True when this decision crossed an epoch boundary.
    pub epoch_reset: bool,
    /// True when the unit was (re)assigned by this decision.
    pub assigned: bool,
    /// Delay in abstract units.
    pub delay: u32,
}

struct PpctState {
    random: Box<dyn RandomSource>,
    low: HashSet<UnitId>,
    high: HashSet<UnitId>,
    low_priority_tenths: u8,
    step_count: u64,
}

impl PpctState {
    fn low_priority_probability(&self) -> f64 {
        f64::from(self.low_priority_tenths) / 10.0
    }

    fn priority_of(&self, unit: UnitId) -> Option<Priority> {
        if self.high.contains(&unit) {
            Some(Priority::High)
        } else if self.low.contains(&unit) {
            Some(Priority::Low)
        } else {
            None
        }
    }

    fn clear_sets(&mut self) {
        self.low.clear();
        self.high.clear();
    }
}

/// The PPCT fuzzing strategy.
pub struct PpctStrategy {
    config: PpctConfig,
    epoch_length: u64,
    identity: IdentityProvider,
    state: Mutex<PpctState>,
}

impl PpctStrategy {
    /// Build a strategy. Rejects configurations whose epoch length would be
    /// zero.
    pub fn new(
        config: PpctConfig,
        random: Box<dyn RandomSource>,
        identity: IdentityProvider,
    ) -> Result<Self, ConfigError> {
        if let Err(mut errors) = config.validate() {
            return Err(errors.remove(0));
        }
        let epoch_length = config.epoch_length();
        debug!(
            max_delay_steps = config.max_delay_steps,
            priority_change_points = config.priority_change_points,
            epoch_mode = %config.epoch_mode,
            epoch_length,
            seed = ?random.seed(),
            "PPCT strategy created"
        );
        Ok(Self {
            config,
            epoch_length,
            identity,
            state: Mutex::new(PpctState {
                random,
                low: HashSet::new(),
                high: HashSet::new(),
                low_priority_tenths: 0,
                step_count: 0,
            }),
        })
    }

    /// Configuration this strategy was built from.
    #[must_use]
    pub fn config(&self) -> &PpctConfig {
        &self.config
    }

    /// Identified decisions between priority-set resets.
    #[must_use]
    pub fn epoch_length(&self) -> u64 {
        self.epoch_length
    }

    /// Probability that an unassigned unit lands in the low set.
    #[must_use]
    pub fn low_priority_probability(&self) -> f64 {
        self.lock().low_priority_probability()
    }

    /// Current-epoch membership of `unit`.
    #[must_use]
    pub fn priority_of(&self, unit: UnitId) -> Option<Priority> {
        self.lock().priority_of(unit)
    }

    /// Decide for the calling unit and return the full record.
    ///
    /// Returns `None` without touching any state when the identity provider
    /// reports no active unit.
    pub fn decide(&self) -> Option<Decision> {
        let unit = (self.identity)()?;
        Some(self.decide_for(unit))
    }

    /// Decide for an explicitly named unit.
    pub fn decide_for(&self, unit: UnitId) -> Decision {
        let mut state = self.lock();

        state.step_count += 1;
        let step = state.step_count;

        let epoch_reset = step % self.epoch_length == 0;
        if epoch_reset {
            state.clear_sets();
        }

        let mut assigned = false;
        let priority = match state.priority_of(unit) {
            Some(priority) => priority,
            None => {
                assigned = true;
                let probability = state.low_priority_probability();
                if state.random.next_double() < probability {
                    state.low.insert(unit);
                    Priority::Low
                } else {
                    state.high.insert(unit);
                    Priority::High
                }
            }
        };

        let delay = match priority {
            Priority::High => 0,
            Priority::Low => {
                let base = if state.low_priority_tenths > SHORT_DELAY_ABOVE_TENTHS {
                    0
                } else {
                    LONG_DELAY_BASE
                };
                state.random.next_int(DELAY_BUCKETS) * DELAY_QUANTUM + base
            }
        };
        drop(state);

        trace!(%unit, step, %priority, epoch_reset, assigned, delay, "PPCT decision");
        Decision {
            unit,
            step,
            priority,
            epoch_reset,
            assigned,
            delay,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PpctState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExplorationStrategy for PpctStrategy {
    fn initialize_next_iteration(&mut self, iteration: u32) -> bool {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.step_count = 0;
        state.clear_sets();
        state.low_priority_tenths = if state.low_priority_tenths >= MAX_LOW_PRIORITY_TENTHS {
            0
        } else {
            state.low_priority_tenths + 1
        };
        debug!(
            iteration,
            low_priority_probability = state.low_priority_probability(),
            "PPCT iteration initialized"
        );
        true
    }

    fn next_delay(&self, _max_value: u32) -> Option<u32> {
        Some(self.decide().map_or(0, |decision| decision.delay))
    }

    fn step_count(&self) -> u64 {
        self.lock().step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        false
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "PPCT fuzzing".to_string()
    }
}

impl fmt::Debug for PpctStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("PpctStrategy")
            .field("config", &self.config)
            .field("epoch_length", &self.epoch_length)
            .field("low_priority_probability", &state.low_priority_probability())
            .field("step_count", &state.step_count)
            .field("low", &state.low.len())
            .field("high", &state.high.len())
            .finish_non_exhaustive()
    }
}
