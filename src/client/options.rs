//! Configuration for [`AuthClient`].
//!
//! Options are applied in call order; every provider-adding method appends to
//! the chain, so the order of calls is the order providers are consulted in.
//!
//! ```no_run
//! # async fn demo() -> regauth::error::Result<()> {
//! use regauth::client::ClientOptions;
//! use regauth::credentials::{Credential, DockerConfigStore};
//!
//! let client = ClientOptions::new()
//!   .with_store(DockerConfigStore::new("/home/me/.docker/config.json"))
//!   .with_credential(Credential::basic("robot", "secret"))
//!   .build()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use super::{AuthClient, TokenCache, TransportConfig};
use crate::credentials::{
  Credential, CredentialProvider, DockerConfigStore, GcpMetadataProvider, OAuthClientCredentialsProvider,
  StaticProvider,
};
use crate::error::Result;
use crate::login::AutoLoginHandler;
use crate::resolver::ChainResolver;

/// Everything needed to assemble an [`AuthClient`].
#[derive(Clone, Default)]
pub struct ClientOptions {
  /// Credential providers, consulted in order for uncached hosts.
  pub providers: Vec<Arc<dyn CredentialProvider>>,
  /// Handler invoked before the provider scan for uncached hosts.
  pub auto_login: Option<Arc<dyn AutoLoginHandler>>,
  /// Cache for bearer tokens obtained from registry token endpoints.
  pub token_cache: Option<Arc<dyn TokenCache>>,
  /// Skip TLS certificate verification.
  pub insecure: bool,
  pub transport: TransportConfig,
}

impl ClientOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_auto_login(mut self, handler: Arc<dyn AutoLoginHandler>) -> Self {
    self.auto_login = Some(handler);
    self
  }

  /// Append a provider returning `credential` for every host.
  pub fn with_credential(self, credential: Credential) -> Self {
    self.with_provider(Arc::new(StaticProvider::new(credential)))
  }

  /// Append the on-disk Docker config store.
  pub fn with_store(self, store: DockerConfigStore) -> Self {
    self.with_provider(Arc::new(store))
  }

  /// Append the OAuth2 client-credentials provider.
  pub fn with_oauth(self, provider: OAuthClientCredentialsProvider) -> Self {
    self.with_provider(Arc::new(provider))
  }

  /// Append the GCP metadata-server provider.
  pub fn with_gcp(self, provider: GcpMetadataProvider) -> Self {
    self.with_provider(Arc::new(provider))
  }

  /// Append any provider.
  pub fn with_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
    self.providers.push(provider);
    self
  }

  pub fn with_token_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
    self.token_cache = Some(cache);
    self
  }

  pub fn with_transport(mut self, transport: TransportConfig) -> Self {
    self.transport = transport;
    self
  }

  /// Disable TLS certificate verification.
  pub fn insecure(mut self) -> Self {
    self.insecure = true;
    self
  }

  pub fn validate(&self) -> Result<()> {
    self.transport.validate()
  }

  /// Build the resolver described by these options.
  pub fn resolver(&self) -> ChainResolver {
    let resolver = ChainResolver::new(self.providers.clone());
    match &self.auto_login {
      Some(handler) => resolver.with_auto_login(handler.clone()),
      None => resolver,
    }
  }

  /// Validate the options and assemble the client.
  ///
  /// # Errors
  /// [`AuthError::InvalidConfig`](crate::error::AuthError::InvalidConfig)
  /// for unusable transport settings, or a transport error if the HTTP client
  /// cannot be built.
  pub fn build(self) -> Result<AuthClient> {
    self.validate()?;

    let http = self.transport.build_http_client(self.insecure)?;
    let resolver = Arc::new(self.resolver());

    Ok(AuthClient::from_parts(http, resolver, self.token_cache))
  }
}

impl std::fmt::Debug for ClientOptions {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ClientOptions")
      .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
      .field("auto_login", &self.auto_login.is_some())
      .field("token_cache", &self.token_cache.is_some())
      .field("insecure", &self.insecure)
      .field("transport", &self.transport)
      .finish()
  }
}
