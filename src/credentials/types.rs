//! Strongly typed registry credentials.
//!
//! These types are shared between the credential providers, the resolver and
//! the authenticated client so callers can reason about usernames, tokens and
//! the anonymous case consistently. The absence of a credential is spelled
//! `Option::None` rather than an empty value.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Username used by registries that accept an OAuth2 access token as a basic
/// auth password (GCR, Artifact Registry).
pub const OAUTH2_ACCESS_TOKEN_USER: &str = "oauth2accesstoken";

/// Authentication material resolved for a registry host.
///
/// `Debug` output redacts every secret, so credentials can sit inside structs
/// that get logged without leaking.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
  /// Username and password (or personal access token used as a password).
  Basic { username: String, password: String },
  /// Bearer access token.
  AccessToken(String),
  /// Access token together with the refresh token it was issued with.
  TokenPair { access_token: String, refresh_token: String },
}

impl Credential {
  pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
    Self::Basic {
      username: username.into(),
      password: password.into(),
    }
  }

  pub fn access_token(token: impl Into<String>) -> Self {
    Self::AccessToken(token.into())
  }

  pub fn token_pair(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
    Self::TokenPair {
      access_token: access_token.into(),
      refresh_token: refresh_token.into(),
    }
  }

  /// Returns `true` when the credential carries no usable material. Providers
  /// report such values as "no credential".
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Basic { username, password } => username.is_empty() && password.is_empty(),
      Self::AccessToken(token) => token.is_empty(),
      Self::TokenPair {
        access_token,
        refresh_token,
      } => access_token.is_empty() && refresh_token.is_empty(),
    }
  }

  /// Short label for display and logging.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Basic { .. } => "basic",
      Self::AccessToken(_) => "token",
      Self::TokenPair { .. } => "token-pair",
    }
  }

  /// The bearer token, if this credential carries one.
  pub fn bearer_token(&self) -> Option<&str> {
    match self {
      Self::AccessToken(token) => Some(token),
      Self::TokenPair { access_token, .. } if !access_token.is_empty() => Some(access_token),
      _ => None,
    }
  }

  /// Value for the `Authorization` request header.
  ///
  /// # Returns
  /// `Basic <base64(user:pass)>` for basic credentials, `Bearer <token>` for
  /// token credentials, and `None` for a token pair with no access token.
  pub fn authorization_header(&self) -> Option<String> {
    match self {
      Self::Basic { username, password } => Some(basic_auth_header(username, password)),
      _ => self.bearer_token().map(|token| format!("Bearer {token}")),
    }
  }
}

/// Encode `username:password` as a `Basic` authorization header value.
pub fn basic_auth_header(username: &str, password: &str) -> String {
  let raw = format!("{username}:{password}");
  format!("Basic {}", BASE64.encode(raw.as_bytes()))
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Basic { username, .. } => f
        .debug_struct("Basic")
        .field("username", username)
        .field("password", &"<redacted>")
        .finish(),
      Self::AccessToken(_) => f.debug_tuple("AccessToken").field(&"<redacted>").finish(),
      Self::TokenPair { .. } => f
        .debug_struct("TokenPair")
        .field("access_token", &"<redacted>")
        .field("refresh_token", &"<redacted>")
        .finish(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_credential_equality() {
    let cred1 = Credential::basic("user", "pass");
    let cred2 = Credential::basic("user", "pass");
    let cred3 = Credential::basic("other", "pass");

    assert_eq!(cred1, cred2);
    assert_ne!(cred1, cred3);
    assert_ne!(cred1, Credential::access_token("pass"));
  }

  #[test]
  fn test_empty_detection() {
    assert!(Credential::basic("", "").is_empty());
    assert!(!Credential::basic("user", "").is_empty());
    assert!(Credential::access_token("").is_empty());
    assert!(Credential::token_pair("", "").is_empty());
    assert!(!Credential::token_pair("", "refresh").is_empty());
  }

  #[test]
  fn test_basic_header_format() {
    let header = Credential::basic("u", "p").authorization_header().unwrap();
    let encoded = header.strip_prefix("Basic ").unwrap();
    let decoded = BASE64.decode(encoded.as_bytes()).unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "u:p");
  }

  #[test]
  fn test_bearer_header_format() {
    assert_eq!(
      Credential::access_token("T1").authorization_header().as_deref(),
      Some("Bearer T1")
    );
    assert_eq!(
      Credential::token_pair("A", "R").authorization_header().as_deref(),
      Some("Bearer A")
    );
    assert_eq!(Credential::token_pair("", "R").authorization_header(), None);
  }

  #[test]
  fn test_debug_redacts_secrets() {
    let output = format!(
      "{:?}\n{:?}\n{:?}",
      Credential::basic("robot", "hunter2"),
      Credential::access_token("secret-token"),
      Credential::token_pair("access", "refresh"),
    );

    insta::assert_snapshot!(output, @r###"
    Basic { username: "robot", password: "<redacted>" }
    AccessToken("<redacted>")
    TokenPair { access_token: "<redacted>", refresh_token: "<redacted>" }
    "###);
  }
}
