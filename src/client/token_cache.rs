//! Bearer token cache shared with the authenticated client.

use std::collections::HashMap;
use std::sync::Mutex;

/// Get/set store for bearer tokens obtained from registry token endpoints.
///
/// The client keys entries with [`token_cache_key`](super::token_cache_key):
/// the registry host plus the repository scope of the request. Implementations
/// may persist tokens however they like; the client treats keys as opaque.
pub trait TokenCache: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&self, key: &str, token: String);
}

/// Process-local [`TokenCache`].
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
  tokens: Mutex<HashMap<String, String>>,
}

impl MemoryTokenCache {
  pub fn new() -> Self {
    Self::default()
  }
}

impl TokenCache for MemoryTokenCache {
  fn get(&self, key: &str) -> Option<String> {
    let tokens = self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    tokens.get(key).cloned()
  }

  fn set(&self, key: &str, token: String) {
    let mut tokens = self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    tokens.insert(key.to_string(), token);
  }
}
