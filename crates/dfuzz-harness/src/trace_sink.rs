#![forbid(unsafe_code)]

//! JSONL decision traces.
//!
//! A shared, line-oriented sink for per-decision records. Writes are
//! serialized behind a mutex, so line order follows call order. Two runs
//! with the same seed and the same decision order produce byte-identical
//! traces, which makes them the cheapest way to confirm a failure reproduces.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dfuzz_core::{Decision, Priority};
use serde::{Deserialize, Serialize};

/// One identified decision, as written to a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Iteration index passed to `initialize_next_iteration`.
    pub iteration: u32,
    /// Raw unit id.
    pub unit: u64,
    /// 1-based step within the iteration.
    pub step: u64,
    /// `true` for the low-priority set.
    pub low_priority: bool,
    /// This decision cleared both priority sets.
    pub epoch_reset: bool,
    /// Delay in abstract units.
    pub delay: u32,
}

impl DecisionRecord {
    /// Flatten a strategy decision made during `iteration`.
    #[must_use]
    pub fn from_decision(iteration: u32, decision: &Decision) -> Self {
        Self {
            iteration,
            unit: decision.unit.get(),
            step: decision.step,
            low_priority: decision.priority == Priority::Low,
            epoch_reset: decision.epoch_reset,
            delay: decision.delay,
        }
    }
}

/// Shared JSONL writer for decision records.
///
/// Every record is flushed as soon as it is written, so a run that aborts
/// still leaves a complete prefix of its trace behind.
#[derive(Clone)]
pub struct TraceSink {
    writer: Arc<Mutex<BufWriter<Box<dyn Write + Send>>>>,
}

impl TraceSink {
    /// Append records to the file at `path`, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    /// Write records to an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
        }
    }

    /// Write one record as a JSONL line.
    pub fn record(&self, record: &DecisionRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|err| io::Error::other(format!("failed to serialize record: {err}")))?;
        let mut writer = self.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    fn lock(&self) -> MutexGuard<'_, BufWriter<Box<dyn Write + Send>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read every decision record from a trace file, skipping blank lines.
pub fn read_trace(path: impl AsRef<Path>) -> io::Result<Vec<DecisionRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: invalid decision record: {err}", idx + 1),
            )
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfuzz_core::UnitId;

    fn sample(step: u64) -> DecisionRecord {
        DecisionRecord {
            iteration: 0,
            unit: 3,
            step,
            low_priority: true,
            epoch_reset: false,
            delay: 55,
        }
    }

    #[test]
    fn from_decision_maps_fields() {
        let decision = Decision {
            unit: UnitId(9),
            step: 4,
            priority: Priority::High,
            epoch_reset: true,
            assigned: true,
            delay: 0,
        };
        let record = DecisionRecord::from_decision(2, &decision);
        assert_eq!(record.iteration, 2);
        assert_eq!(record.unit, 9);
        assert_eq!(record.step, 4);
        assert!(!record.low_priority);
        assert!(record.epoch_reset);
        assert_eq!(record.delay, 0);
    }

    #[test]
    fn file_sink_appends_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let sink = TraceSink::create(&path).unwrap();
        for step in 1..=3 {
            sink.record(&sample(step)).unwrap();
        }
        let records = read_trace(&path).unwrap();
        assert_eq!(records, vec![sample(1), sample(2), sample(3)]);
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        TraceSink::create(&path).unwrap().record(&sample(1)).unwrap();
        TraceSink::create(&path).unwrap().record(&sample(2)).unwrap();
        assert_eq!(read_trace(&path).unwrap(), vec![sample(1), sample(2)]);
    }

    #[test]
    fn concurrent_records_stay_whole_lines() {
        let buffer = SharedBuffer::default();
        let sink = TraceSink::from_writer(Box::new(buffer.clone()));
        std::thread::scope(|s| {
            for worker in 0..4u64 {
                let sink = sink.clone();
                s.spawn(move || {
                    for step in 1..=25 {
                        sink.record(&sample(worker * 100 + step)).unwrap();
                    }
                });
            }
        });
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let mut steps: Vec<u64> = text
            .lines()
            .map(|line| serde_json::from_str::<DecisionRecord>(line).unwrap().step)
            .collect();
        assert_eq!(steps.len(), 100);
        steps.sort_unstable();
        steps.dedup();
        assert_eq!(steps.len(), 100);
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_trace_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "\n{\"oops\":1}\n").unwrap();
        let err = read_trace(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
