//! Credential resolution across an ordered chain of providers.
//!
//! [`ChainResolver`] is what the authenticated client calls before every
//! request. For a host it:
//!
//! 1. reuses the provider that last succeeded for the host, if any, and
//!    returns whatever that provider says;
//! 2. otherwise runs auto-login (when configured) and fails if login fails;
//! 3. walks the providers in configured order, stopping at the first error or
//!    the first non-empty credential, which is remembered for the host;
//! 4. returns `Ok(None)` (anonymous access) when nobody had a credential.
//!
//! Every provider and login call runs under the caller's [`Context`], so a
//! cancelled or expired context aborts the chain with a cancellation error.

mod cache;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use self::cache::ResolutionCache;
use crate::context::Context;
use crate::credentials::{Credential, CredentialProvider};
use crate::error::{AuthError, Result};
use crate::login::AutoLoginHandler;

/// Resolves a registry host to the credential to send with a request.
///
/// Implemented by [`ChainResolver`]; tests and embedders can substitute
/// their own implementation when building an
/// [`AuthClient`](crate::client::AuthClient).
#[async_trait]
pub trait CredentialResolver: Send + Sync {
  /// Resolve credentials for `host`.
  ///
  /// # Returns
  /// * `Ok(Some(credential))` to authenticate the request.
  /// * `Ok(None)` to send it anonymously.
  ///
  /// # Errors
  /// Login failures, provider failures and cancellation are returned as-is;
  /// no fallback is attempted.
  async fn resolve(&self, ctx: &Context, host: &str) -> Result<Option<Credential>>;
}

/// Ordered provider chain with a per-host memo of the winning provider.
pub struct ChainResolver {
  providers: Vec<Arc<dyn CredentialProvider>>,
  auto_login: Option<Arc<dyn AutoLoginHandler>>,
  cache: ResolutionCache,
}

impl ChainResolver {
  /// Create a resolver over `providers`, consulted in the given order.
  pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
    Self {
      providers,
      auto_login: None,
      cache: ResolutionCache::default(),
    }
  }

  /// Run `handler` before scanning providers for a host that has no cached
  /// provider yet.
  pub fn with_auto_login(mut self, handler: Arc<dyn AutoLoginHandler>) -> Self {
    self.auto_login = Some(handler);
    self
  }

  pub fn providers(&self) -> impl Iterator<Item = &dyn CredentialProvider> {
    self.providers.iter().map(|p| p.as_ref())
  }

  pub fn has_auto_login(&self) -> bool {
    self.auto_login.is_some()
  }

  /// Name of the provider remembered for `host`, if any.
  pub fn cached_provider(&self, host: &str) -> Option<&str> {
    self.cache.get(host).map(|index| self.providers[index].name())
  }

  /// Hosts with a remembered provider, sorted.
  pub fn cached_hosts(&self) -> Vec<String> {
    self.cache.hosts()
  }

  async fn invoke(&self, ctx: &Context, index: usize, host: &str) -> Result<Option<Credential>> {
    let provider = &self.providers[index];
    trace!(host, provider = provider.name(), "Consulting credential provider");

    let credential = ctx
      .run(provider.credential(ctx, host))
      .await?
      .map_err(|source| AuthError::provider(provider.name(), source))?;

    Ok(credential.filter(|c| !c.is_empty()))
  }

  async fn scan(&self, ctx: &Context, host: &str) -> Result<Option<Credential>> {
    if let Some(handler) = &self.auto_login {
      debug!(host, "Running auto-login");
      ctx.run(handler.login(ctx, host)).await??;
    }

    for index in 0..self.providers.len() {
      if let Some(credential) = self.invoke(ctx, index, host).await? {
        debug!(
          host,
          provider = self.providers[index].name(),
          kind = credential.kind(),
          "Resolved credential"
        );
        self.cache.insert(host, index);
        return Ok(Some(credential));
      }
    }

    debug!(host, "No provider has a credential; using anonymous access");
    Ok(None)
  }
}

impl std::fmt::Debug for ChainResolver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChainResolver")
      .field("providers", &self.providers().map(|p| p.name()).collect::<Vec<_>>())
      .field("auto_login", &self.auto_login.is_some())
      .field("cached_hosts", &self.cache.len())
      .finish()
  }
}

#[async_trait]
impl CredentialResolver for ChainResolver {
  async fn resolve(&self, ctx: &Context, host: &str) -> Result<Option<Credential>> {
    if let Some(index) = self.cache.get(host) {
      trace!(host, "Provider cache hit");
      return self.invoke(ctx, index, host).await;
    }

    // Serialize first lookups per host; a waiter re-checks the cache once it
    // gets the gate.
    let gate = self.cache.gate(host);
    let _scan = ctx.run(gate.lock()).await?;

    if let Some(index) = self.cache.get(host) {
      trace!(host, "Provider cache filled while waiting");
      return self.invoke(ctx, index, host).await;
    }

    self.scan(ctx, host).await
  }
}
