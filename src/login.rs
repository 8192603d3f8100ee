//! Auto-login before credential lookup.
//!
//! When auto-login is enabled the resolver asks the handler to make sure the
//! user is logged in to a host before walking the providers. A successful
//! login is expected to leave credentials somewhere a provider will find them
//! (for [`StoreLogin`], the Docker config store).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::context::Context;
use crate::credentials::{Credential, DockerConfigStore};
use crate::error::LoginError;

/// Establishes credentials for a host ahead of provider lookup.
#[async_trait]
pub trait AutoLoginHandler: Send + Sync {
  /// Log in to `host`.
  ///
  /// Must be idempotent: logging in to a host that is already logged in is a
  /// successful no-op.
  ///
  /// # Errors
  /// [`LoginError::NotConfigured`] when the handler has no way to log in to
  /// `host`, [`LoginError::Failed`] when the attempt itself failed.
  async fn login(&self, ctx: &Context, host: &str) -> Result<(), LoginError>;
}

/// Logs in by writing preconfigured basic credentials into a
/// [`DockerConfigStore`].
///
/// Hosts are only written once per handler; later logins for the same host
/// return immediately.
#[derive(Debug)]
pub struct StoreLogin {
  store: DockerConfigStore,
  credentials: HashMap<String, Credential>,
  strict: bool,
  logged_in: Mutex<HashSet<String>>,
}

impl StoreLogin {
  pub fn new(store: DockerConfigStore) -> Self {
    Self {
      store,
      credentials: HashMap::new(),
      strict: false,
      logged_in: Mutex::new(HashSet::new()),
    }
  }

  /// Configure the basic credential used to log in to `host`.
  pub fn with_credential(mut self, host: impl Into<String>, credential: Credential) -> Self {
    self.credentials.insert(host.into(), credential);
    self
  }

  /// When `true`, logging in to a host with no configured credential fails
  /// with [`LoginError::NotConfigured`] instead of succeeding as a no-op.
  pub fn strict(mut self, strict: bool) -> Self {
    self.strict = strict;
    self
  }

  pub fn is_logged_in(&self, host: &str) -> bool {
    self.lock().contains(host)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
    self.logged_in.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  async fn write_credential(&self, host: &str, credential: &Credential) -> Result<(), LoginError> {
    let existing = self.store.get(host).await.map_err(|e| LoginError::failed(host, e))?;
    if existing.as_ref() == Some(credential) {
      debug!(host, "Store already holds the login credential");
      return Ok(());
    }

    self
      .store
      .put(host, credential)
      .await
      .map_err(|e| LoginError::failed(host, e))?;

    info!(host, path = %self.store.path().display(), "Logged in");
    Ok(())
  }
}

#[async_trait]
impl AutoLoginHandler for StoreLogin {
  async fn login(&self, ctx: &Context, host: &str) -> Result<(), LoginError> {
    if self.is_logged_in(host) {
      return Ok(());
    }

    let Some(credential) = self.credentials.get(host) else {
      if self.strict {
        return Err(LoginError::NotConfigured { host: host.to_string() });
      }
      debug!(host, "No auto-login credential configured; skipping");
      return Ok(());
    };

    ctx
      .run(self.write_credential(host, credential))
      .await
      .map_err(|e| LoginError::failed(host, e))??;

    self.lock().insert(host.to_string());
    Ok(())
  }
}
