//! Error types shared by providers, the auto-login handler, the resolver and
//! the authenticated client.
//!
//! The taxonomy mirrors how a resolution can end:
//! - [`AuthError::Login`] when auto-login could not establish credentials,
//! - [`AuthError::Provider`] when a configured source failed unexpectedly,
//! - [`AuthError::Cancelled`] / [`AuthError::DeadlineExceeded`] when the
//!   caller gave up.
//!
//! "No credential" is not an error; it is `Ok(None)`.

use thiserror::Error;

/// Boxed error payload returned by credential providers.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type Result<T, E = AuthError> = std::result::Result<T, E>;

/// Failure reported by an auto-login handler.
#[derive(Debug, Error)]
pub enum LoginError {
  /// The handler has nothing configured for this host.
  #[error("auto-login is not configured for {host}")]
  NotConfigured { host: String },

  /// Login was attempted and failed.
  #[error("auto-login to {host} failed: {reason}")]
  Failed { host: String, reason: String },
}

impl LoginError {
  /// Build a [`LoginError::Failed`] from any displayable cause.
  pub fn failed(host: impl Into<String>, reason: impl std::fmt::Display) -> Self {
    Self::Failed {
      host: host.into(),
      reason: reason.to_string(),
    }
  }

  /// Host the failure refers to.
  pub fn host(&self) -> &str {
    match self {
      Self::NotConfigured { host } | Self::Failed { host, .. } => host,
    }
  }
}

/// Errors surfaced by credential resolution and the authenticated client.
#[derive(Debug, Error)]
pub enum AuthError {
  #[error(transparent)]
  Login(#[from] LoginError),

  /// A provider failed; the chain stops here.
  #[error("credential provider '{provider}' failed: {source}")]
  Provider {
    provider: String,
    #[source]
    source: ProviderError,
  },

  #[error("credential resolution was cancelled")]
  Cancelled,

  #[error("credential resolution deadline exceeded")]
  DeadlineExceeded,

  #[error("invalid client configuration: {0}")]
  InvalidConfig(String),

  #[error("cannot derive registry host from '{0}'")]
  InvalidHost(String),

  #[error("credential for {host} cannot be sent in an Authorization header")]
  InvalidCredential { host: String },

  #[error("registry token exchange failed: {0}")]
  TokenExchange(String),

  #[error("HTTP transport error: {0}")]
  Transport(#[from] reqwest::Error),
}

impl AuthError {
  /// Wrap a provider failure, recording which provider produced it.
  pub fn provider(provider: impl Into<String>, source: ProviderError) -> Self {
    Self::Provider {
      provider: provider.into(),
      source,
    }
  }

  /// `true` when the caller gave up (cancellation or deadline), as opposed to
  /// credentials being wrong or unavailable.
  pub fn is_cancellation(&self) -> bool {
    matches!(self, Self::Cancelled | Self::DeadlineExceeded)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_error_keeps_message_and_name() {
    let err = AuthError::provider("docker-config", "disk read failed".into());
    assert_eq!(
      err.to_string(),
      "credential provider 'docker-config' failed: disk read failed"
    );

    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "disk read failed");
  }

  #[test]
  fn login_errors_distinguish_not_configured() {
    let not_configured = LoginError::NotConfigured {
      host: "ghcr.io".to_string(),
    };
    let failed = LoginError::failed("ghcr.io", "bad password");

    assert!(matches!(not_configured, LoginError::NotConfigured { .. }));
    assert_eq!(failed.host(), "ghcr.io");
    assert_eq!(failed.to_string(), "auto-login to ghcr.io failed: bad password");

    let wrapped: AuthError = failed.into();
    assert!(matches!(wrapped, AuthError::Login(LoginError::Failed { .. })));
  }

  #[test]
  fn cancellation_is_recognizable() {
    assert!(AuthError::Cancelled.is_cancellation());
    assert!(AuthError::DeadlineExceeded.is_cancellation());
    assert!(!AuthError::InvalidHost("x".into()).is_cancellation());
  }
}
