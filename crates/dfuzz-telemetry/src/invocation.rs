#![forbid(unsafe_code)]

//! Serializable per-test API invocation record.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serializes every record write in the process.
static PERSIST_LOCK: Mutex<()> = Mutex::new(());

/// Invocation counts for one test, persisted as pretty JSON.
///
/// The file lives at `<location>/test.<uuid>.api.json` and is rewritten in
/// full on every [`save`](Self::save).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInvocationInfo {
    /// Test name.
    pub name: String,
    /// Directory the record is persisted in.
    pub location: PathBuf,
    /// API name to invocation count, in name order.
    pub apis: BTreeMap<String, u64>,
    #[serde(skip)]
    path: PathBuf,
}

impl ApiInvocationInfo {
    /// Fresh record with a unique file name under `location`. Nothing is
    /// written until [`save`](Self::save).
    #[must_use]
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        let path = location.join(file_name(&Uuid::new_v4()));
        Self {
            name: name.into(),
            location,
            apis: BTreeMap::new(),
            path,
        }
    }

    /// Read a previously saved record.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut info: Self = serde_json::from_reader(reader).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid api record {}: {err}", path.display()),
            )
        })?;
        info.path = path.to_path_buf();
        Ok(info)
    }

    /// Where this record is persisted.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count for one API (0 if never invoked).
    #[must_use]
    pub fn frequency(&self, api: &str) -> u64 {
        self.apis.get(api).copied().unwrap_or(0)
    }

    /// Total invocations across all APIs.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.apis.values().sum()
    }

    /// Increment the counter for `api` without persisting.
    pub fn record(&mut self, api: &str) -> u64 {
        let count = self.apis.entry(api.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Rewrite the record on disk, creating the directory if needed.
    pub fn save(&self) -> io::Result<()> {
        let _guard = PERSIST_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|err| io::Error::other(format!("failed to serialize api record: {err}")))?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

fn file_name(id: &Uuid) -> String {
    format!("test.{id}.api.json")
}
