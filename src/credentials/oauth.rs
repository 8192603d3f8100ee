//! OAuth2 client-credentials provider.
//!
//! Registries fronted by an OAuth2 authorization server can be configured with
//! a client id/secret pair per host. The provider exchanges them for an
//! access token at the configured token endpoint:
//!
//! ```text
//! {
//!   "registry.example.com": {
//!     "client_id": "ci-bot",
//!     "client_secret": "...",
//!     "token_url": "https://auth.example.com/oauth2/token",
//!     "scopes": ["registry:pull"]
//!   }
//! }
//! ```
//!
//! Hosts without an entry resolve to no credential and trigger no network
//! traffic. Issued tokens are reused until shortly before they expire.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Credential, CredentialProvider};
use crate::client::USER_AGENT;
use crate::context::Context;
use crate::error::ProviderError;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_SLACK: Duration = Duration::from_secs(30);

/// Client-credentials settings for one registry host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentialsConfig {
  pub client_id: String,
  pub client_secret: String,
  pub token_url: String,
  #[serde(default)]
  pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: Option<String>,
  #[serde(default)]
  refresh_token: Option<String>,
  #[serde(default)]
  expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
  credential: Credential,
  expires_at: Option<Instant>,
}

impl CachedToken {
  fn is_fresh(&self) -> bool {
    self.expires_at.is_none_or(|at| Instant::now() + EXPIRY_SLACK < at)
  }
}

/// Resolves hosts to access tokens obtained through the OAuth2
/// client-credentials grant.
pub struct OAuthClientCredentialsProvider {
  configs: HashMap<String, ClientCredentialsConfig>,
  client: reqwest::Client,
  tokens: Mutex<HashMap<String, CachedToken>>,
}

impl OAuthClientCredentialsProvider {
  /// Create a provider from per-host configurations.
  ///
  /// # Errors
  /// Returns an error if the HTTP client used for token requests cannot be
  /// built.
  pub fn new(configs: HashMap<String, ClientCredentialsConfig>) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(Duration::from_secs(30))
      .build()
      .context("Failed to create OAuth2 HTTP client")?;

    Ok(Self::with_http_client(configs, client))
  }

  /// Create a provider that sends token requests through `client`.
  pub fn with_http_client(configs: HashMap<String, ClientCredentialsConfig>, client: reqwest::Client) -> Self {
    Self {
      configs,
      client,
      tokens: Mutex::new(HashMap::new()),
    }
  }

  /// Load per-host configurations from a JSON file. A missing file yields a
  /// provider with no configured hosts.
  pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
    let configs = match tokio::fs::read_to_string(path).await {
      Ok(contents) => serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse OAuth2 client credentials in {}", path.display()))?,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(err) => {
        return Err(err).with_context(|| format!("Failed to read {}", path.display()));
      }
    };

    Self::new(configs)
  }

  pub fn hosts(&self) -> impl Iterator<Item = &str> {
    self.configs.keys().map(String::as_str)
  }

  fn cached(&self, host: &str) -> Option<Credential> {
    let tokens = self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    tokens.get(host).filter(|t| t.is_fresh()).map(|t| t.credential.clone())
  }

  fn remember(&self, host: &str, token: CachedToken) {
    let mut tokens = self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    tokens.insert(host.to_string(), token);
  }

  async fn fetch_token(&self, host: &str, config: &ClientCredentialsConfig) -> anyhow::Result<CachedToken> {
    let mut form = vec![("grant_type", "client_credentials".to_string())];
    if !config.scopes.is_empty() {
      form.push(("scope", config.scopes.join(" ")));
    }

    debug!(host, token_url = %config.token_url, "Requesting OAuth2 client-credentials token");

    let response = self
      .client
      .post(&config.token_url)
      .basic_auth(&config.client_id, Some(&config.client_secret))
      .header("Accept", "application/json")
      .form(&form)
      .send()
      .await
      .context("Failed to send OAuth2 token request")?;

    let status = response.status();
    if !status.is_success() {
      let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("(no error details)"));
      return Err(anyhow!("OAuth2 token endpoint returned error {status}: {error_text}"));
    }

    let token: TokenResponse = response
      .json()
      .await
      .context("Failed to parse OAuth2 token response")?;

    let access_token = token
      .access_token
      .filter(|t| !t.is_empty())
      .ok_or_else(|| anyhow!("OAuth2 token response did not include an access_token"))?;

    let credential = match token.refresh_token.filter(|t| !t.is_empty()) {
      Some(refresh_token) => Credential::token_pair(access_token, refresh_token),
      None => Credential::access_token(access_token),
    };

    Ok(CachedToken {
      credential,
      expires_at: token.expires_in.map(|secs| Instant::now() + Duration::from_secs(secs)),
    })
  }
}

impl std::fmt::Debug for OAuthClientCredentialsProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OAuthClientCredentialsProvider")
      .field("hosts", &self.configs.keys().collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

#[async_trait]
impl CredentialProvider for OAuthClientCredentialsProvider {
  fn name(&self) -> &str {
    "oauth2"
  }

  async fn credential(&self, ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError> {
    let Some(config) = self.configs.get(host) else {
      return Ok(None);
    };

    if let Some(credential) = self.cached(host) {
      return Ok(Some(credential));
    }

    let token = ctx.run(self.fetch_token(host, config)).await??;
    let credential = token.credential.clone();
    self.remember(host, token);

    Ok(Some(credential))
  }
}
