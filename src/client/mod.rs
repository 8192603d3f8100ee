//! Authenticated HTTP client for registry requests.
//!
//! [`AuthClient`] wraps a `reqwest::Client` and asks its
//! [`CredentialResolver`] for the target host's credential on every request.
//! Registries that answer with a `Bearer` challenge get a token exchange
//! against the advertised realm, after which the request is retried once.

mod challenge;
mod options;
mod token_cache;
mod transport;

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use reqwest::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use serde::Deserialize;
use tracing::{debug, trace};
use url::Url;

pub use self::challenge::{Challenge, parse_challenge};
pub use self::options::ClientOptions;
pub use self::token_cache::{MemoryTokenCache, TokenCache};
pub use self::transport::TransportConfig;
use crate::context::Context;
use crate::credentials::Credential;
use crate::error::{AuthError, Result};
use crate::resolver::CredentialResolver;

/// Identifier sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("regauth/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct RegistryToken {
  #[serde(default)]
  token: Option<String>,
  #[serde(default)]
  access_token: Option<String>,
}

/// HTTP client that authenticates registry requests.
#[derive(Clone)]
pub struct AuthClient {
  http: reqwest::Client,
  resolver: Arc<dyn CredentialResolver>,
  token_cache: Option<Arc<dyn TokenCache>>,
}

impl AuthClient {
  /// Start configuring a client.
  pub fn builder() -> ClientOptions {
    ClientOptions::new()
  }

  /// Assemble a client from an existing HTTP client and resolver.
  pub fn from_parts(
    http: reqwest::Client,
    resolver: Arc<dyn CredentialResolver>,
    token_cache: Option<Arc<dyn TokenCache>>,
  ) -> Self {
    Self {
      http,
      resolver,
      token_cache,
    }
  }

  pub fn http(&self) -> &reqwest::Client {
    &self.http
  }

  pub fn resolver(&self) -> &Arc<dyn CredentialResolver> {
    &self.resolver
  }

  pub fn token_cache(&self) -> Option<&Arc<dyn TokenCache>> {
    self.token_cache.as_ref()
  }

  /// Start a `GET` request; send it with [`AuthClient::send`].
  pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
    self.http.get(url)
  }

  /// Resolve the credential that would be used for `url`.
  pub async fn credential_for(&self, ctx: &Context, url: &Url) -> Result<Option<Credential>> {
    let host = registry_host(url)?;
    self.resolver.resolve(ctx, &host).await
  }

  /// Send `request` with credentials for its host attached.
  ///
  /// # Errors
  /// Resolution errors (login, provider, cancellation) are returned without
  /// sending the request. Transport and token-exchange failures are returned
  /// as [`AuthError::Transport`] / [`AuthError::TokenExchange`]. HTTP error
  /// statuses are not errors; inspect the response.
  pub async fn send(&self, ctx: &Context, mut request: reqwest::Request) -> Result<reqwest::Response> {
    let host = registry_host(request.url())?;
    let credential = self.resolver.resolve(ctx, &host).await?;
    let retry = request.try_clone();

    let cache_key = token_cache_key(&host, request.method(), request.url());

    let cached_token = self.token_cache.as_ref().and_then(|cache| cache.get(&cache_key));
    let sent_cached_token = cached_token.is_some();
    let header = match cached_token {
      Some(token) => Some(format!("Bearer {token}")),
      None => credential.as_ref().and_then(Credential::authorization_header),
    };
    if let Some(header) = header {
      set_authorization(&mut request, &host, &header)?;
    }

    trace!(host, url = %request.url(), "Sending registry request");
    let response = ctx.run(self.http.execute(request)).await??;
    // Registries answer 403 when a token lacks the scope this request needs.
    let rejected = match response.status() {
      StatusCode::UNAUTHORIZED => true,
      StatusCode::FORBIDDEN => sent_cached_token,
      _ => false,
    };
    if !rejected {
      return Ok(response);
    }

    let challenge = response
      .headers()
      .get(WWW_AUTHENTICATE)
      .and_then(|value| value.to_str().ok())
      .and_then(parse_challenge);

    let Some(Challenge::Bearer { realm, service, scope }) = challenge else {
      return Ok(response);
    };

    // A bearer credential was already sent as-is; another round would not
    // change the outcome.
    if credential.as_ref().and_then(Credential::bearer_token).is_some() {
      return Ok(response);
    }

    let Some(mut retry) = retry else {
      debug!(host, "Request body cannot be replayed; returning challenge response");
      return Ok(response);
    };

    let token = self
      .fetch_token(ctx, &realm, service.as_deref(), scope.as_deref(), credential.as_ref())
      .await?;

    if let Some(cache) = &self.token_cache {
      cache.set(&cache_key, token.clone());
    }

    set_authorization(&mut retry, &host, &format!("Bearer {token}"))?;
    Ok(ctx.run(self.http.execute(retry)).await??)
  }

  async fn fetch_token(
    &self,
    ctx: &Context,
    realm: &str,
    service: Option<&str>,
    scope: Option<&str>,
    credential: Option<&Credential>,
  ) -> Result<String> {
    let mut url = Url::parse(realm).map_err(|e| AuthError::TokenExchange(format!("invalid realm '{realm}': {e}")))?;
    {
      let mut query = url.query_pairs_mut();
      if let Some(service) = service {
        query.append_pair("service", service);
      }
      if let Some(scope) = scope {
        query.append_pair("scope", scope);
      }
    }

    debug!(realm, ?scope, "Exchanging credentials for a registry token");

    let mut request = self.http.get(url);
    if let Some(Credential::Basic { username, password }) = credential {
      request = request.basic_auth(username, Some(password));
    }

    let response = ctx.run(request.send()).await??;
    let status = response.status();
    if !status.is_success() {
      return Err(AuthError::TokenExchange(format!("token endpoint returned {status}")));
    }

    let body: RegistryToken = response.json().await?;
    body
      .token
      .filter(|t| !t.is_empty())
      .or(body.access_token.filter(|t| !t.is_empty()))
      .ok_or_else(|| AuthError::TokenExchange("token endpoint response did not include a token".to_string()))
  }
}

impl std::fmt::Debug for AuthClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AuthClient")
      .field("token_cache", &self.token_cache.is_some())
      .finish_non_exhaustive()
  }
}

fn set_authorization(request: &mut reqwest::Request, host: &str, value: &str) -> Result<()> {
  let mut value = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidCredential {
    host: host.to_string(),
  })?;
  value.set_sensitive(true);
  request.headers_mut().insert(AUTHORIZATION, value);
  Ok(())
}

/// Key under which the bearer token for a request is cached.
///
/// Tokens are scoped to a repository and an action, so requests under
/// `/v2/<name>/...` are keyed by host plus `repository:<name>:<actions>`.
/// Requests outside any repository, such as the `/v2/` ping, use the bare
/// host.
pub fn token_cache_key(host: &str, method: &Method, url: &Url) -> String {
  match repository_scope(method, url) {
    Some(scope) => format!("{host} {scope}"),
    None => host.to_string(),
  }
}

fn repository_scope(method: &Method, url: &Url) -> Option<String> {
  const ENDPOINTS: [&str; 4] = ["/manifests/", "/blobs/", "/tags/", "/referrers/"];

  let path = url.path().strip_prefix("/v2/")?;
  let end = ENDPOINTS.iter().filter_map(|endpoint| path.rfind(endpoint)).max()?;
  let name = &path[..end];
  if name.is_empty() {
    return None;
  }

  let actions = if *method == Method::GET || *method == Method::HEAD {
    "pull"
  } else {
    "pull,push"
  };
  Some(format!("repository:{name}:{actions}"))
}

/// Registry host for `url`: the host name plus an explicit port, if any.
pub fn registry_host(url: &Url) -> Result<String> {
  let host = url
    .host_str()
    .filter(|h| !h.is_empty())
    .ok_or_else(|| AuthError::InvalidHost(url.to_string()))?;

  Ok(match url.port() {
    Some(port) => format!("{host}:{port}"),
    None => host.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registry_host_keeps_explicit_port() {
    let url = Url::parse("https://localhost:5000/v2/").unwrap();
    assert_eq!(registry_host(&url).unwrap(), "localhost:5000");

    let url = Url::parse("https://ghcr.io/v2/org/app/manifests/latest").unwrap();
    assert_eq!(registry_host(&url).unwrap(), "ghcr.io");

    // Default ports are dropped by the URL parser.
    let url = Url::parse("https://ghcr.io:443/v2/").unwrap();
    assert_eq!(registry_host(&url).unwrap(), "ghcr.io");
  }

  #[test]
  fn registry_host_requires_a_host() {
    let url = Url::parse("file:///tmp/x").unwrap();
    assert!(matches!(registry_host(&url), Err(AuthError::InvalidHost(_))));
  }

  #[test]
  fn token_cache_key_is_scoped_to_the_repository() {
    let key = |method: Method, url: &str| token_cache_key("ghcr.io", &method, &Url::parse(url).unwrap());

    assert_eq!(key(Method::GET, "https://ghcr.io/v2/"), "ghcr.io");
    assert_eq!(
      key(Method::GET, "https://ghcr.io/v2/org/app/manifests/latest"),
      "ghcr.io repository:org/app:pull"
    );
    assert_eq!(
      key(Method::HEAD, "https://ghcr.io/v2/org/app/blobs/sha256:abc"),
      "ghcr.io repository:org/app:pull"
    );
    assert_eq!(
      key(Method::POST, "https://ghcr.io/v2/org/app/blobs/uploads/"),
      "ghcr.io repository:org/app:pull,push"
    );
    assert_eq!(
      key(Method::GET, "https://ghcr.io/v2/library/tags/tags/list"),
      "ghcr.io repository:library/tags:pull"
    );
    assert_ne!(
      key(Method::GET, "https://ghcr.io/v2/org/a/manifests/1"),
      key(Method::GET, "https://ghcr.io/v2/org/b/manifests/1")
    );
    assert_eq!(key(Method::GET, "https://ghcr.io/v2/_catalog"), "ghcr.io");
  }

  #[test]
  fn user_agent_identifies_product() {
    assert!(USER_AGENT.starts_with("regauth/"));
  }

  #[test]
  fn authorization_header_is_sensitive() {
    let mut request = reqwest::Request::new(reqwest::Method::GET, Url::parse("https://x.io/v2/").unwrap());
    set_authorization(&mut request, "x.io", "Bearer T1").unwrap();

    let value = request.headers().get(AUTHORIZATION).unwrap();
    assert!(value.is_sensitive());
    assert_eq!(value.to_str().unwrap(), "Bearer T1");

    let err = set_authorization(&mut request, "x.io", "Bearer bad\nvalue").unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredential { .. }));
  }
}
