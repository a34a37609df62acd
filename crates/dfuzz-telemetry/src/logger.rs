#![forbid(unsafe_code)]

//! Test-scoped API invocation logger.
//!
//! An [`ApiLogger`] holds the record of the most recently started test. A new
//! [`log_test_started`](ApiLogger::log_test_started) replaces that record
//! atomically; invocations logged before any test started are dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dfuzz_core::InvocationSink;
use tracing::{debug, warn};

use crate::invocation::ApiInvocationInfo;

/// Logs which APIs a test invoked, persisting counts after every change.
#[derive(Debug)]
pub struct ApiLogger {
    location: PathBuf,
    latest: Mutex<Option<ApiInvocationInfo>>,
}

impl ApiLogger {
    /// Logger persisting records under `location`.
    #[must_use]
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            latest: Mutex::new(None),
        }
    }

    /// Directory new records are written to.
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Start a fresh record for `name`, persist it, and make it current.
    ///
    /// Returns the path of the new record. On failure the previous record
    /// stays current.
    pub fn log_test_started(&self, name: &str) -> io::Result<PathBuf> {
        let info = ApiInvocationInfo::new(name, self.location.clone());
        info.save()?;
        let path = info.path().to_path_buf();
        debug!(test = name, path = %path.display(), "test started");
        *self.lock() = Some(info);
        Ok(path)
    }

    /// Increment `api` on the current record and re-persist it.
    ///
    /// A no-op when no test has started.
    pub fn log_invocation(&self, api: &str) -> io::Result<()> {
        let mut latest = self.lock();
        match latest.as_mut() {
            Some(info) => {
                info.record(api);
                info.save()
            }
            None => Ok(()),
        }
    }

    /// Snapshot of the current record.
    #[must_use]
    pub fn latest(&self) -> Option<ApiInvocationInfo> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ApiInvocationInfo>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InvocationSink for ApiLogger {
    fn log_invocation(&self, api: &str) {
        if let Err(err) = ApiLogger::log_invocation(self, api) {
            warn!(api, error = %err, "failed to persist api invocation");
        }
    }
}
