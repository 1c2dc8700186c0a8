//! Single-flight download coordination.
//!
//! The first caller for a key becomes the leader: it applies the staleness
//! policy and, when needed, runs the fetch action. Callers arriving while the
//! leader is busy wait for it instead of fetching again. Once the attempt
//! finishes, successfully or not, the key is released and every caller opens
//! whatever is now on disk.
//!
//! The table lock is held only to register or release a key, never across a
//! fetch, so a slow download blocks nothing but callers for the same key.

use crate::error::DataError;
use crate::key::ArtifactKey;
use crate::staleness::StalenessPolicy;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Completion signal shared by everyone waiting on one key.
#[derive(Debug, Default)]
struct InFlightFetch {
    done: Mutex<bool>,
    signal: Condvar,
}

impl InFlightFetch {
    fn wait(&self) {
        let mut done = lock(&self.done);
        while !*done {
            done = self
                .signal
                .wait(done)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn complete(&self) {
        *lock(&self.done) = true;
        self.signal.notify_all();
    }
}

/// How a caller took part in a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Registered the key and decided whether to fetch.
    Leader,
    /// Waited on another caller's attempt.
    Follower,
}

/// Outcome of one coordinated fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub role: FlightRole,
    /// True when this caller ran the fetch action.
    pub fetched: bool,
    /// The artifact on disk after the attempt, if any.
    pub file: Option<File>,
}

/// Serializes fetch attempts per key.
#[derive(Debug, Default)]
pub struct DownloadCoordinator {
    policy: StalenessPolicy,
    in_flight: Mutex<HashMap<String, Arc<InFlightFetch>>>,
}

impl DownloadCoordinator {
    pub fn new(policy: StalenessPolicy) -> Self {
        Self {
            policy,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &StalenessPolicy {
        &self.policy
    }

    /// Number of keys with an attempt in progress.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Fetch `path` at most once across concurrent callers, then open it.
    ///
    /// `fetch_action` runs only for the leader and only when the staleness
    /// policy asks for it. Its errors are logged, never returned.
    pub fn fetch<F>(
        &self,
        key: &str,
        artifact: Option<&ArtifactKey>,
        path: &Path,
        now: DateTime<Utc>,
        fetch_action: F,
    ) -> Option<File>
    where
        F: FnOnce() -> Result<(), DataError>,
    {
        self.fetch_with_outcome(key, artifact, path, now, fetch_action)
            .file
    }

    /// Like [`fetch`](Self::fetch), also reporting the caller's role.
    pub fn fetch_with_outcome<F>(
        &self,
        key: &str,
        artifact: Option<&ArtifactKey>,
        path: &Path,
        now: DateTime<Utc>,
        fetch_action: F,
    ) -> FetchOutcome
    where
        F: FnOnce() -> Result<(), DataError>,
    {
        let (entry, role) = {
            let mut table = lock(&self.in_flight);
            match table.get(key) {
                Some(existing) => (Arc::clone(existing), FlightRole::Follower),
                None => {
                    let entry = Arc::new(InFlightFetch::default());
                    table.insert(key.to_string(), Arc::clone(&entry));
                    (entry, FlightRole::Leader)
                }
            }
        };

        let mut fetched = false;
        match role {
            FlightRole::Follower => {
                tracing::debug!(key, "waiting on in-flight fetch");
                entry.wait();
            }
            FlightRole::Leader => {
                let _release = Release {
                    table: &self.in_flight,
                    key,
                    entry: &entry,
                };
                if self.policy.needs_fetch(artifact, path, now) {
                    fetched = true;
                    tracing::debug!(key, "fetching artifact");
                    if let Err(e) = fetch_action() {
                        tracing::error!(key, error = %e, "fetch failed; serving local data");
                    }
                }
            }
        }

        FetchOutcome {
            role,
            fetched,
            file: open_artifact(path),
        }
    }
}

/// Drops the key from the table and wakes waiters, also on unwind.
struct Release<'a> {
    table: &'a Mutex<HashMap<String, Arc<InFlightFetch>>>,
    key: &'a str,
    entry: &'a InFlightFetch,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        lock(self.table).remove(self.key);
        self.entry.complete();
    }
}

fn open_artifact(path: &Path) -> Option<File> {
    match File::open(path) {
        Ok(file) => Some(file),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "artifact not available");
            None
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to open artifact");
            None
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
