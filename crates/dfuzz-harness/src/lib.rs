#![forbid(unsafe_code)]

//! Test harness support for dfuzz exploration runs.
//!
//! - [`determinism`]: seed selection, deterministic timestamps, JSONL logs.
//! - [`trace_sink`]: JSONL decision traces for comparing runs.

pub mod determinism;
pub mod trace_sink;

pub use determinism::{DeterminismFixture, TestJsonlLogger};
pub use trace_sink::{DecisionRecord, TraceSink, read_trace};
