#![forbid(unsafe_code)]

//! Reference yield-point hook.
//!
//! Instrumented code calls [`DelayInjector::yield_point`] wherever it wants
//! the strategy to get a say in timing. The injector asks the strategy for a
//! delay, and only once the strategy call has returned (and released its
//! lock) does it suspend the calling thread.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::strategy::ExplorationStrategy;

/// Default wall-clock length of one delay unit.
pub const DEFAULT_TICK: Duration = Duration::from_millis(1);

/// Default upper-bound hint passed to the strategy.
pub const DEFAULT_MAX_VALUE: u32 = 100;

/// Receiver for the names of APIs reached at yield points.
///
/// Reporting is best effort and never influences the delay decision.
pub trait InvocationSink: Send + Sync {
    /// Record that `api` reached a yield point.
    fn log_invocation(&self, api: &str);
}

/// Applies a strategy's delays at yield points.
pub struct DelayInjector<'a, S: ExplorationStrategy + ?Sized> {
    strategy: &'a S,
    max_value: u32,
    tick: Duration,
    sink: Option<Arc<dyn InvocationSink>>,
}

impl<'a, S: ExplorationStrategy + ?Sized> DelayInjector<'a, S> {
    /// Injector with the default hint and tick and no sink.
    #[must_use]
    pub fn new(strategy: &'a S) -> Self {
        Self {
            strategy,
            max_value: DEFAULT_MAX_VALUE,
            tick: DEFAULT_TICK,
            sink: None,
        }
    }

    /// Upper-bound hint forwarded to [`ExplorationStrategy::next_delay`].
    #[must_use]
    pub fn with_max_value(mut self, max_value: u32) -> Self {
        self.max_value = max_value;
        self
    }

    /// Wall-clock duration of one delay unit. `Duration::ZERO` disables
    /// sleeping entirely (decisions are still made).
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Report every yield point to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn InvocationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Strategy consulted at each yield point.
    #[must_use]
    pub fn strategy(&self) -> &'a S {
        self.strategy
    }

    /// Report `api`, decide, then sleep for the decided delay.
    ///
    /// Returns the delay in abstract units. A strategy that cannot decide is
    /// treated as asking for no delay.
    pub fn yield_point(&self, api: &str) -> u32 {
        if let Some(sink) = &self.sink {
            sink.log_invocation(api);
        }
        let delay = self.strategy.next_delay(self.max_value).unwrap_or(0);
        self.pause(delay);
        delay
    }

    fn pause(&self, delay: u32) {
        if delay == 0 || self.tick.is_zero() {
            return;
        }
        thread::sleep(self.tick.saturating_mul(delay));
    }
}

impl<S: ExplorationStrategy + ?Sized> fmt::Debug for DelayInjector<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayInjector")
            .field("strategy", &self.strategy.description())
            .field("max_value", &self.max_value)
            .field("tick", &self.tick)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
