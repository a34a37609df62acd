#![forbid(unsafe_code)]

//! Uniform random delay injection.
//!
//! Every yield point draws a delay uniformly from `[0, max_value)`, where
//! `max_value` is the hook's hint. Unlike PPCT this needs no notion of unit
//! identity, and it honours an optional per-iteration step budget.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::random::RandomSource;
use crate::strategy::ExplorationStrategy;

struct RandomDelayState {
    random: Box<dyn RandomSource>,
    step_count: u64,
}

/// Random-delay fuzzing strategy.
pub struct RandomDelayStrategy {
    /// 0 means unbounded.
    max_steps: u64,
    state: Mutex<RandomDelayState>,
}

impl RandomDelayStrategy {
    /// Strategy drawing from `random`; `max_steps` of 0 is unbounded.
    #[must_use]
    pub fn new(random: Box<dyn RandomSource>, max_steps: u64) -> Self {
        Self {
            max_steps,
            state: Mutex::new(RandomDelayState {
                random,
                step_count: 0,
            }),
        }
    }

    /// Per-iteration step budget (0 = unbounded).
    #[must_use]
    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    fn lock(&self) -> MutexGuard<'_, RandomDelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExplorationStrategy for RandomDelayStrategy {
    fn initialize_next_iteration(&mut self, iteration: u32) -> bool {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.step_count = 0;
        debug!(iteration, max_steps = self.max_steps, "random iteration initialized");
        true
    }

    fn next_delay(&self, max_value: u32) -> Option<u32> {
        let mut state = self.lock();
        state.step_count += 1;
        let delay = state.random.next_int(max_value);
        trace!(step = state.step_count, max_value, delay, "random decision");
        Some(delay)
    }

    fn step_count(&self) -> u64 {
        self.lock().step_count
    }

    fn is_max_steps_reached(&self) -> bool {
        self.max_steps > 0 && self.step_count() >= self.max_steps
    }

    fn is_fair(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "random fuzzing".to_string()
    }
}

impl fmt::Debug for RandomDelayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomDelayStrategy")
            .field("max_steps", &self.max_steps)
            .field("step_count", &self.step_count())
            .finish_non_exhaustive()
    }
}
