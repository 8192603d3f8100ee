//! HTTP transport settings for registry traffic.

use std::time::Duration;

use tracing::warn;

use super::USER_AGENT;
use crate::error::AuthError;

/// Connection and timeout settings for the underlying `reqwest` client.
///
/// `reqwest` bounds the TCP connect and the TLS handshake with a single
/// connect timeout, so the effective connect budget is
/// `connect_timeout + tls_handshake_timeout`. It never sends
/// `Expect: 100-continue`, so `expect_continue_timeout` is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
  pub connect_timeout: Duration,
  pub keep_alive: Duration,
  pub idle_timeout: Duration,
  pub tls_handshake_timeout: Duration,
  pub expect_continue_timeout: Duration,
  /// Idle connections kept per host.
  pub max_idle_connections: usize,
  /// Offer HTTP/2 via ALPN; when `false` the client speaks HTTP/1.1 only.
  pub http2: bool,
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self {
      connect_timeout: Duration::from_secs(30),
      keep_alive: Duration::from_secs(30),
      idle_timeout: Duration::from_secs(90),
      tls_handshake_timeout: Duration::from_secs(10),
      expect_continue_timeout: Duration::from_secs(1),
      max_idle_connections: 100,
      http2: true,
    }
  }
}

impl TransportConfig {
  /// Reject settings that would make the transport unusable.
  pub fn validate(&self) -> Result<(), AuthError> {
    let zero = [
      ("connect_timeout", self.connect_timeout),
      ("idle_timeout", self.idle_timeout),
      ("tls_handshake_timeout", self.tls_handshake_timeout),
    ]
    .into_iter()
    .find(|(_, value)| value.is_zero());

    if let Some((name, _)) = zero {
      return Err(AuthError::InvalidConfig(format!("{name} must be greater than zero")));
    }

    if self.max_idle_connections == 0 {
      return Err(AuthError::InvalidConfig(
        "max_idle_connections must be at least 1".to_string(),
      ));
    }

    Ok(())
  }

  /// Build the HTTP client. `insecure` disables TLS certificate verification.
  pub(crate) fn build_http_client(&self, insecure: bool) -> Result<reqwest::Client, AuthError> {
    let mut builder = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .connect_timeout(self.connect_timeout + self.tls_handshake_timeout)
      .tcp_keepalive(self.keep_alive)
      .pool_idle_timeout(self.idle_timeout)
      .pool_max_idle_per_host(self.max_idle_connections);

    if !self.http2 {
      builder = builder.http1_only();
    }

    if insecure {
      warn!("TLS certificate verification is disabled for registry connections");
      builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
  }
}
