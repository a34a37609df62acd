#![forbid(unsafe_code)]

//! Per-test API invocation telemetry for dfuzz.
//!
//! Records which APIs a test reached at its yield points and how often,
//! persisting the counts to `test.<uuid>.api.json` after every change.
//! [`ApiLogger`] implements [`dfuzz_core::InvocationSink`], so it can be
//! plugged straight into a [`dfuzz_core::DelayInjector`]. Telemetry is
//! best effort: a failed write is logged and never affects delay decisions.

pub mod invocation;
pub mod logger;

pub use invocation::ApiInvocationInfo;
pub use logger::ApiLogger;
