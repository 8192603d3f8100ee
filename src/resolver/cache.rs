//! Per-host memo of the provider that last produced a credential.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;

/// Maps a host to the index of the provider that last succeeded for it.
///
/// All access goes through a mutex so concurrent resolutions never race on
/// the map. Entries are only added or overwritten, never removed.
///
/// A second, per-host async gate lets concurrent first lookups for the same
/// host queue behind each other: whoever acquires the gate second re-checks
/// the cache and usually finds the answer already there. Lookups for
/// different hosts use different gates and never wait on each other.
#[derive(Debug, Default)]
pub(crate) struct ResolutionCache {
  entries: Mutex<HashMap<String, usize>>,
  gates: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ResolutionCache {
  pub(crate) fn get(&self, host: &str) -> Option<usize> {
    lock(&self.entries).get(host).copied()
  }

  pub(crate) fn insert(&self, host: &str, provider: usize) {
    lock(&self.entries).insert(host.to_string(), provider);
  }

  pub(crate) fn hosts(&self) -> Vec<String> {
    let mut hosts: Vec<String> = lock(&self.entries).keys().cloned().collect();
    hosts.sort();
    hosts
  }

  pub(crate) fn len(&self) -> usize {
    lock(&self.entries).len()
  }

  /// The scan gate for `host`, created on first use.
  pub(crate) fn gate(&self, host: &str) -> Arc<AsyncMutex<()>> {
    lock(&self.gates).entry(host.to_string()).or_default().clone()
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  // The guarded maps stay consistent even if a holder panicked.
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
