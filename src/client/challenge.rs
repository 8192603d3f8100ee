//! `WWW-Authenticate` challenge parsing.
//!
//! Registries answer unauthenticated requests with either a `Basic` challenge
//! or a `Bearer` challenge pointing at a token endpoint:
//!
//! ```text
//! Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:org/app:pull"
//! ```

use std::collections::HashMap;

/// A parsed authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
  Basic {
    realm: Option<String>,
  },
  Bearer {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
  },
}

/// Parse a `WWW-Authenticate` header value.
///
/// Returns `None` for unknown schemes and for `Bearer` challenges without a
/// realm.
pub fn parse_challenge(header: &str) -> Option<Challenge> {
  let header = header.trim();
  let (scheme, rest) = match header.split_once(char::is_whitespace) {
    Some((scheme, rest)) => (scheme, rest),
    None => (header, ""),
  };
  let mut params = parse_params(rest);

  if scheme.eq_ignore_ascii_case("basic") {
    return Some(Challenge::Basic {
      realm: params.remove("realm"),
    });
  }

  if scheme.eq_ignore_ascii_case("bearer") {
    return Some(Challenge::Bearer {
      realm: params.remove("realm").filter(|r| !r.is_empty())?,
      service: params.remove("service"),
      scope: params.remove("scope"),
    });
  }

  None
}

/// Parse `key=value` / `key="quoted, value"` pairs separated by commas.
fn parse_params(input: &str) -> HashMap<String, String> {
  let mut params = HashMap::new();
  let mut chars = input.chars().peekable();

  loop {
    while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

    let key: String = std::iter::from_fn(|| chars.next_if(|c| *c != '=' && *c != ',')).collect();
    if key.trim().is_empty() {
      break;
    }
    if chars.next_if_eq(&'=').is_none() {
      continue;
    }

    let mut value = String::new();
    if chars.next_if_eq(&'"').is_some() {
      while let Some(c) = chars.next() {
        match c {
          '\\' => value.extend(chars.next()),
          '"' => break,
          _ => value.push(c),
        }
      }
    } else {
      value.extend(std::iter::from_fn(|| chars.next_if(|c| *c != ',')));
      value = value.trim().to_string();
    }

    params.insert(key.trim().to_ascii_lowercase(), value);
  }

  params
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_bearer_challenge() {
    let challenge = parse_challenge(
      r#"Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:org/app:pull,push""#,
    );

    assert_eq!(
      challenge,
      Some(Challenge::Bearer {
        realm: "https://ghcr.io/token".to_string(),
        service: Some("ghcr.io".to_string()),
        scope: Some("repository:org/app:pull,push".to_string()),
      })
    );
  }

  #[test]
  fn parses_basic_challenge_case_insensitively() {
    assert_eq!(
      parse_challenge(r#"basic realm="Registry Realm""#),
      Some(Challenge::Basic {
        realm: Some("Registry Realm".to_string())
      })
    );
    assert_eq!(parse_challenge("Basic"), Some(Challenge::Basic { realm: None }));
  }

  #[test]
  fn unquoted_values_and_spacing() {
    let challenge = parse_challenge("Bearer realm=https://auth.example.com/token, service=registry");
    assert_eq!(
      challenge,
      Some(Challenge::Bearer {
        realm: "https://auth.example.com/token".to_string(),
        service: Some("registry".to_string()),
        scope: None,
      })
    );
  }

  #[test]
  fn rejects_unknown_or_incomplete_challenges() {
    assert_eq!(parse_challenge("Negotiate abc"), None);
    assert_eq!(parse_challenge(r#"Bearer service="x""#), None);
    assert_eq!(parse_challenge(""), None);
  }
}
