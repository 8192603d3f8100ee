//! Credential provider abstractions.
//!
//! Defines the [`CredentialProvider`] trait so different credential backends
//! (static values, the on-disk store, OAuth2, cloud metadata) can plug into
//! the resolver without changing call sites, plus a few small providers that
//! need no I/O.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use super::Credential;
use crate::context::Context;
use crate::error::ProviderError;

/// A source of credentials for registry hosts.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
  /// Stable name used in logs and error messages.
  fn name(&self) -> &str;

  /// Retrieves credentials for the specified host.
  ///
  /// # Arguments
  /// * `ctx` - Cancellation/deadline context for any I/O performed.
  /// * `host` - Registry host (e.g., `ghcr.io`, `localhost:5000`).
  ///
  /// # Returns
  /// * `Ok(Some(Credential))` when the provider has credentials for the host.
  /// * `Ok(None)` when it has nothing for this host, allowing later
  ///   providers to run.
  ///
  /// # Errors
  /// Returns `Err` when an unexpected failure occurs (unreadable or malformed
  /// store, token endpoint failure). Resolution stops at the first error.
  async fn credential(&self, ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError>;
}

/// Returns the same credential for every host.
#[derive(Debug, Clone)]
pub struct StaticProvider {
  credential: Credential,
}

impl StaticProvider {
  pub fn new(credential: Credential) -> Self {
    Self { credential }
  }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
  fn name(&self) -> &str {
    "static"
  }

  async fn credential(&self, _ctx: &Context, _host: &str) -> Result<Option<Credential>, ProviderError> {
    if self.credential.is_empty() {
      return Ok(None);
    }
    Ok(Some(self.credential.clone()))
  }
}

/// Never has a credential. Useful as an explicit "anonymous" entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProvider;

#[async_trait]
impl CredentialProvider for EmptyProvider {
  fn name(&self) -> &str {
    "empty"
  }

  async fn credential(&self, _ctx: &Context, _host: &str) -> Result<Option<Credential>, ProviderError> {
    Ok(None)
  }
}

type BoxedLookup = Box<
  dyn Fn(Context, String) -> Pin<Box<dyn Future<Output = Result<Option<Credential>, ProviderError>> + Send>>
    + Send
    + Sync,
>;

/// Adapts an async closure into a [`CredentialProvider`].
///
/// ```
/// use regauth::credentials::{Credential, FnProvider};
/// use regauth::error::ProviderError;
///
/// let provider = FnProvider::new("env", |_ctx, host| async move {
///   Ok::<_, ProviderError>((host == "ghcr.io").then(|| Credential::access_token("T1")))
/// });
/// # let _ = provider;
/// ```
pub struct FnProvider {
  name: String,
  lookup: BoxedLookup,
}

impl FnProvider {
  pub fn new<F, Fut>(name: impl Into<String>, lookup: F) -> Self
  where
    F: Fn(Context, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Credential>, ProviderError>> + Send + 'static,
  {
    Self {
      name: name.into(),
      lookup: Box::new(move |ctx, host| Box::pin(lookup(ctx, host))),
    }
  }
}

impl std::fmt::Debug for FnProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FnProvider").field("name", &self.name).finish_non_exhaustive()
  }
}

#[async_trait]
impl CredentialProvider for FnProvider {
  fn name(&self) -> &str {
    &self.name
  }

  async fn credential(&self, ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError> {
    (self.lookup)(ctx.clone(), host.to_string()).await
  }
}
