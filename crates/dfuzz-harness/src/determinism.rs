#![forbid(unsafe_code)]

//! Deterministic fixtures for exploration test runs.
//!
//! Centralizes seed selection, deterministic timestamps, and JSONL logging so
//! a failing run can be replayed by exporting its seed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use dfuzz_core::SeededRandom;
use serde_json::{Map, Value};

/// Shared deterministic fixture for a test run.
#[derive(Debug)]
pub struct DeterminismFixture {
    seed: u64,
    deterministic: bool,
    run_id: String,
    ts_counter: AtomicU64,
}

impl DeterminismFixture {
    /// Create a fixture, honouring seed and mode overrides from the
    /// environment.
    pub fn new(prefix: &str, default_seed: u64) -> Self {
        Self::new_with(prefix, fixture_seed(default_seed), deterministic_mode())
    }

    /// Create a fixture with explicit configuration (used by tests).
    pub fn new_with(prefix: &str, seed: u64, deterministic: bool) -> Self {
        let run_id = if deterministic {
            format!("{prefix}_seed{seed}")
        } else {
            format!("{prefix}_{}_{}", std::process::id(), unix_secs())
        };
        Self {
            seed,
            deterministic,
            run_id,
            ts_counter: AtomicU64::new(0),
        }
    }

    /// Seed every random source of this run derives from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether run ids and timestamps are replay-stable.
    pub fn deterministic(&self) -> bool {
        self.deterministic
    }

    /// Stable run identifier for JSONL logs.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Random source for a strategy under this fixture.
    pub fn random_source(&self) -> SeededRandom {
        SeededRandom::new(self.seed)
    }

    /// Deterministic timestamp string (or wall time if disabled).
    pub fn timestamp(&self) -> String {
        if self.deterministic {
            let n = self.ts_counter.fetch_add(1, Ordering::Relaxed);
            format!("T{n:06}")
        } else {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            format!("{}.{:03}", now.as_secs(), now.subsec_millis())
        }
    }
}

/// Deterministic JSONL logger for tests.
#[derive(Debug)]
pub struct TestJsonlLogger {
    fixture: DeterminismFixture,
    schema_version: u32,
    seq: AtomicU64,
    context: BTreeMap<String, Value>,
}

impl TestJsonlLogger {
    /// Logger over an env-configured fixture.
    pub fn new(prefix: &str, default_seed: u64) -> Self {
        Self::with_fixture(DeterminismFixture::new(prefix, default_seed))
    }

    /// Logger over an explicit fixture.
    pub fn with_fixture(fixture: DeterminismFixture) -> Self {
        Self {
            fixture,
            schema_version: 1,
            seq: AtomicU64::new(0),
            context: BTreeMap::new(),
        }
    }

    /// Fixture backing this logger.
    pub fn fixture(&self) -> &DeterminismFixture {
        &self.fixture
    }

    /// Override the `schema_version` field (default 1).
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    /// Attach a field to every subsequent line under `"context"`.
    pub fn add_context(&mut self, key: &str, value: impl Into<Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    /// Build a JSONL line. Explicit fields override the defaults
    /// (`run_id`, `seed`, `deterministic`).
    pub fn emit_line(&self, event: &str, fields: &[(&str, Value)]) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut line = Map::new();
        line.insert("schema_version".into(), self.schema_version.into());
        line.insert("seq".into(), seq.into());
        line.insert("ts".into(), self.fixture.timestamp().into());
        line.insert("event".into(), event.into());
        line.insert("run_id".into(), self.fixture.run_id().into());
        line.insert("seed".into(), self.fixture.seed().into());
        line.insert("deterministic".into(), self.fixture.deterministic().into());
        if !self.context.is_empty() {
            let context: Map<String, Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            line.insert("context".into(), Value::Object(context));
        }
        for (key, value) in fields {
            line.insert((*key).to_string(), value.clone());
        }
        Value::Object(line).to_string()
    }

    /// Emit a JSONL line to stderr.
    pub fn log(&self, event: &str, fields: &[(&str, Value)]) {
        eprintln!("{}", self.emit_line(event, fields));
    }
}

/// True when deterministic mode is enabled via environment.
pub fn deterministic_mode() -> bool {
    env_flag("DFUZZ_TEST_DETERMINISTIC") || env_flag("DFUZZ_DETERMINISTIC")
}

/// Choose a seed from environment or use the provided default.
pub fn fixture_seed(default_seed: u64) -> u64 {
    env_u64("DFUZZ_TEST_SEED")
        .or_else(|| env_u64("DFUZZ_SEED"))
        .unwrap_or(default_seed)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfuzz_core::RandomSource;

    #[test]
    fn deterministic_timestamps_are_monotonic() {
        let fixture = DeterminismFixture::new_with("fixture_ts", 123, true);
        assert_eq!(fixture.timestamp(), "T000000");
        assert_eq!(fixture.timestamp(), "T000001");
    }

    #[test]
    fn fixture_seed_and_run_id_are_stable() {
        let fixture = DeterminismFixture::new_with("fixture_seed", 4242, true);
        assert_eq!(fixture.seed(), 4242);
        assert!(fixture.deterministic());
        assert_eq!(fixture.run_id(), "fixture_seed_seed4242");
    }

    #[test]
    fn non_deterministic_run_id_contains_pid() {
        let fixture = DeterminismFixture::new_with("nd", 0, false);
        let pid = std::process::id().to_string();
        assert!(fixture.run_id().contains(&pid), "{}", fixture.run_id());
    }

    #[test]
    fn random_source_follows_fixture_seed() {
        let fixture = DeterminismFixture::new_with("rng", 99, true);
        let mut a = fixture.random_source();
        let mut b = SeededRandom::new(99);
        assert_eq!(a.seed(), Some(99));
        for _ in 0..16 {
            assert_eq!(a.next_int(1_000), b.next_int(1_000));
        }
    }

    #[test]
    fn logger_emits_core_fields() {
        let logger =
            TestJsonlLogger::with_fixture(DeterminismFixture::new_with("jsonl", 99, true));
        let line = logger.emit_line("case_start", &[("case", Value::from("alpha"))]);
        let parsed: Value = serde_json::from_str(&line).expect("valid JSON");
        assert_eq!(parsed["event"], "case_start");
        assert_eq!(parsed["case"], "alpha");
        assert_eq!(parsed["seed"], 99);
        assert_eq!(parsed["run_id"], "jsonl_seed99");
        assert_eq!(parsed["deterministic"], true);
        assert_eq!(parsed["schema_version"], 1);
        assert_eq!(parsed["ts"], "T000000");
    }

    #[test]
    fn logger_seq_increments() {
        let logger = TestJsonlLogger::new("seq_test", 1);
        let first: Value = serde_json::from_str(&logger.emit_line("ev0", &[])).unwrap();
        let second: Value = serde_json::from_str(&logger.emit_line("ev1", &[])).unwrap();
        assert_eq!(first["seq"], 0);
        assert_eq!(second["seq"], 1);
    }

    #[test]
    fn logger_includes_context() {
        let mut logger = TestJsonlLogger::new("ctx", 7);
        logger.add_context("suite", "ppct");
        logger.add_context("threads", 8);
        let parsed: Value = serde_json::from_str(&logger.emit_line("step", &[])).unwrap();
        assert_eq!(parsed["context"]["suite"], "ppct");
        assert_eq!(parsed["context"]["threads"], 8);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let logger =
            TestJsonlLogger::with_fixture(DeterminismFixture::new_with("override", 99, true));
        let parsed: Value =
            serde_json::from_str(&logger.emit_line("ev", &[("seed", Value::from(7))])).unwrap();
        assert_eq!(parsed["seed"], 7);
    }

    #[test]
    fn custom_schema_version() {
        let logger = TestJsonlLogger::new("schema", 1).with_schema_version(3);
        let parsed: Value = serde_json::from_str(&logger.emit_line("ev", &[])).unwrap();
        assert_eq!(parsed["schema_version"], 3);
    }

    #[test]
    fn env_helpers_unset() {
        assert!(!env_flag("__DFUZZ_NEVER_SET_FLAG_4c1e"));
        assert_eq!(env_u64("__DFUZZ_NEVER_SET_U64_4c1e"), None);
    }
}
