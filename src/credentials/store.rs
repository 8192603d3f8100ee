//! On-disk credential store in Docker `config.json` format.
//!
//! The file is typically located at `~/.docker/config.json` (or under
//! `$DOCKER_CONFIG`) and is shared with Docker, Podman, ORAS and friends:
//!
//! ```text
//! {
//!   "auths": {
//!     "ghcr.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" },
//!     "registry.example.com": { "username": "robot", "password": "secret" }
//!   }
//! }
//! ```
//!
//! The store is re-read on every lookup so that entries written by
//! auto-login become visible to the resolver immediately. All stores for the
//! same path share one lock, and writes replace the file atomically, so a
//! reader never sees a half-written document.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use super::{Credential, CredentialProvider};
use crate::context::Context;
use crate::error::ProviderError;

const DOCKER_HUB_INDEX: &str = "https://index.docker.io/v1/";

/// Parsed Docker `config.json`. Keys other than `auths` are kept verbatim so
/// that saving does not drop settings owned by other tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
  #[serde(default)]
  auths: BTreeMap<String, AuthEntry>,
  #[serde(flatten)]
  other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthEntry {
  /// Base64-encoded "username:password"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  auth: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  password: Option<String>,
  /// Refresh token handed out by `docker login` for token-based registries
  #[serde(default, skip_serializing_if = "Option::is_none")]
  identitytoken: Option<String>,
  /// Bearer token sent to the registry as-is
  #[serde(default, skip_serializing_if = "Option::is_none")]
  registrytoken: Option<String>,
  #[serde(flatten)]
  other: serde_json::Map<String, serde_json::Value>,
}

/// Errors raised while reading or writing the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("malformed auth entry for {registry}: {reason}")]
  MalformedEntry { registry: String, reason: String },
  #[error("only basic credentials can be stored (got {0})")]
  Unsupported(&'static str),
  #[error("cannot determine home directory")]
  NoHome,
}

impl DockerConfig {
  /// Parse a config document.
  pub fn parse(contents: &str, path: &Path) -> Result<Self, StoreError> {
    serde_json::from_str(contents).map_err(|source| StoreError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Look up credentials for `registry`.
  ///
  /// Tries the exact key, then the key with an `https://` or `http://`
  /// prefix, then the legacy Docker Hub index for Docker Hub aliases.
  ///
  /// # Errors
  /// Returns [`StoreError::MalformedEntry`] when an entry exists but its
  /// `auth` field cannot be decoded.
  pub fn credential(&self, registry: &str) -> Result<Option<Credential>, StoreError> {
    let Some((key, entry)) = self.find_entry(registry) else {
      return Ok(None);
    };
    extract_credential(key, entry)
  }

  fn find_entry(&self, registry: &str) -> Option<(&str, &AuthEntry)> {
    let mut candidates = vec![
      registry.to_string(),
      format!("https://{registry}"),
      format!("http://{registry}"),
    ];
    if is_docker_hub(registry) {
      candidates.push(DOCKER_HUB_INDEX.to_string());
    }

    candidates
      .into_iter()
      .find_map(|key| self.auths.get_key_value(&key))
      .map(|(key, entry)| (key.as_str(), entry))
  }

  /// Insert or replace the entry for `registry`.
  pub fn set_basic(&mut self, registry: &str, username: &str, password: &str) {
    let entry = self.auths.entry(registry.to_string()).or_default();
    entry.auth = Some(BASE64.encode(format!("{username}:{password}")));
    entry.username = None;
    entry.password = None;
    entry.identitytoken = None;
    entry.registrytoken = None;
  }

  /// Configured registry keys.
  pub fn registries(&self) -> Vec<String> {
    self.auths.keys().cloned().collect()
  }
}

fn is_docker_hub(registry: &str) -> bool {
  matches!(registry, "docker.io" | "registry-1.docker.io" | "index.docker.io")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.is_empty())
}

fn extract_credential(registry: &str, entry: &AuthEntry) -> Result<Option<Credential>, StoreError> {
  if let Some(token) = non_empty(&entry.identitytoken) {
    return Ok(Some(Credential::token_pair("", token)));
  }
  if let Some(token) = non_empty(&entry.registrytoken) {
    return Ok(Some(Credential::access_token(token)));
  }

  if let (Some(username), Some(password)) = (&entry.username, &entry.password)
    && !(username.is_empty() && password.is_empty())
  {
    return Ok(Some(Credential::basic(username.clone(), password.clone())));
  }

  let Some(auth) = non_empty(&entry.auth) else {
    return Ok(None);
  };

  let malformed = |reason: &str| StoreError::MalformedEntry {
    registry: registry.to_string(),
    reason: reason.to_string(),
  };

  let decoded = BASE64.decode(auth).map_err(|_| malformed("auth is not valid base64"))?;
  let decoded = String::from_utf8(decoded).map_err(|_| malformed("auth is not valid UTF-8"))?;
  let (username, password) = decoded
    .split_once(':')
    .ok_or_else(|| malformed("auth is not in username:password form"))?;

  Ok(Some(Credential::basic(username, password)))
}

/// A credential store backed by a Docker `config.json` file.
///
/// Clones and independently constructed stores for the same path serialize
/// their reads and writes on a shared lock.
#[derive(Debug, Clone)]
pub struct DockerConfigStore {
  path: PathBuf,
  lock: Arc<AsyncMutex<()>>,
}

/// One lock per config path for the whole process.
fn path_lock(path: &Path) -> Arc<AsyncMutex<()>> {
  static LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> = LazyLock::new(Default::default);

  let mut locks = LOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
  locks.entry(path.to_path_buf()).or_default().clone()
}

impl DockerConfigStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let lock = path_lock(&path);
    Self { path, lock }
  }

  /// Store at the default location: `$DOCKER_CONFIG/config.json`, falling back
  /// to `$HOME/.docker/config.json`.
  pub fn from_env() -> Result<Self, StoreError> {
    if let Some(dir) = std::env::var_os("DOCKER_CONFIG").filter(|d| !d.is_empty()) {
      return Ok(Self::new(PathBuf::from(dir).join("config.json")));
    }

    let home = std::env::var_os("HOME").filter(|h| !h.is_empty()).ok_or(StoreError::NoHome)?;
    Ok(Self::new(PathBuf::from(home).join(".docker").join("config.json")))
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the config. A missing file yields an empty config.
  pub async fn load(&self) -> Result<DockerConfig, StoreError> {
    let _guard = self.lock.lock().await;
    self.read_config().await
  }

  async fn read_config(&self) -> Result<DockerConfig, StoreError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(contents) => DockerConfig::parse(&contents, &self.path),
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(DockerConfig::default()),
      Err(source) => Err(StoreError::Read {
        path: self.path.clone(),
        source,
      }),
    }
  }

  /// Look up the credential stored for `registry`.
  pub async fn get(&self, registry: &str) -> Result<Option<Credential>, StoreError> {
    self.load().await?.credential(registry)
  }

  /// Store a basic credential for `registry`, creating the file and parent
  /// directories as needed.
  ///
  /// The lock is held from the read through the rename, so concurrent puts
  /// for different registries all land.
  pub async fn put(&self, registry: &str, credential: &Credential) -> Result<(), StoreError> {
    let Credential::Basic { username, password } = credential else {
      return Err(StoreError::Unsupported(credential.kind()));
    };

    let guard = self.lock.clone().lock_owned().await;
    let mut config = self.read_config().await?;
    config.set_basic(registry, username, password);

    let write_err = |source| StoreError::Write {
      path: self.path.clone(),
      source,
    };

    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;

    let contents = serde_json::to_string_pretty(&config).map_err(|e| write_err(std::io::Error::other(e)))?;
    let path = self.path.clone();
    // The guard moves into the blocking task so a cancelled caller cannot
    // release the lock before the rename has happened.
    tokio::task::spawn_blocking(move || {
      let _guard = guard;
      replace_file(&dir, &path, contents.as_bytes())
    })
    .await
    .map_err(|e| write_err(std::io::Error::other(e)))?
    .map_err(write_err)?;

    debug!(registry, path = %self.path.display(), "Stored credential");
    Ok(())
  }
}

/// Write `contents` to a temporary file in `dir`, then rename it over `path`.
fn replace_file(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
  let mut file = tempfile::NamedTempFile::new_in(dir)?;
  file.write_all(contents)?;
  file.as_file().sync_all()?;
  file.persist(path).map_err(|e| e.error)?;
  Ok(())
}

#[async_trait]
impl CredentialProvider for DockerConfigStore {
  fn name(&self) -> &str {
    "docker-config"
  }

  async fn credential(&self, _ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError> {
    Ok(self.get(host).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(json: &str) -> DockerConfig {
    DockerConfig::parse(json, Path::new("config.json")).unwrap()
  }

  #[test]
  fn test_parse_docker_config() {
    let config = parse(
      r#"
      {
        "auths": {
          "ghcr.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" },
          "docker.io": { "username": "myuser", "password": "mypass" }
        }
      }
      "#,
    );

    assert_eq!(
      config.credential("ghcr.io").unwrap(),
      Some(Credential::basic("username", "password"))
    );
    assert_eq!(
      config.credential("docker.io").unwrap(),
      Some(Credential::basic("myuser", "mypass"))
    );
    assert_eq!(config.credential("quay.io").unwrap(), None);
  }

  #[test]
  fn test_registry_normalization() {
    let config = parse(
      r#"
      {
        "auths": {
          "https://ghcr.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" },
          "https://index.docker.io/v1/": { "auth": "ZG9ja2VyOnBhc3M=" }
        }
      }
      "#,
    );

    assert!(config.credential("ghcr.io").unwrap().is_some());
    assert_eq!(
      config.credential("docker.io").unwrap(),
      Some(Credential::basic("docker", "pass"))
    );
    assert!(config.credential("registry-1.docker.io").unwrap().is_some());
  }

  #[test]
  fn test_password_with_colon() {
    // "user:pa:ss"
    let config = parse(r#"{ "auths": { "x.io": { "auth": "dXNlcjpwYTpzcw==" } } }"#);
    assert_eq!(config.credential("x.io").unwrap(), Some(Credential::basic("user", "pa:ss")));
  }

  #[test]
  fn test_malformed_auth_is_an_error() {
    let config = parse(r#"{ "auths": { "x.io": { "auth": "not base64!!" } } }"#);
    let err = config.credential("x.io").unwrap_err();
    assert!(matches!(err, StoreError::MalformedEntry { .. }));

    // "nocolon"
    let config = parse(r#"{ "auths": { "x.io": { "auth": "bm9jb2xvbg==" } } }"#);
    assert!(config.credential("x.io").is_err());
  }

  #[test]
  fn test_identity_token_is_a_refresh_token() {
    let config = parse(
      r#"{ "auths": { "x.io": { "auth": "dXNlcjpwYXNz", "identitytoken": "refresh-123" } } }"#,
    );
    let cred = config.credential("x.io").unwrap().unwrap();
    assert_eq!(cred, Credential::token_pair("", "refresh-123"));
    assert_eq!(cred.authorization_header(), None);
  }

  #[test]
  fn test_registry_token_is_a_bearer_token() {
    let config = parse(r#"{ "auths": { "x.io": { "username": "u", "password": "p", "registrytoken": "T" } } }"#);
    let cred = config.credential("x.io").unwrap().unwrap();
    assert_eq!(cred, Credential::access_token("T"));
    assert_eq!(cred.authorization_header().as_deref(), Some("Bearer T"));
  }

  #[test]
  fn test_empty_tokens_fall_back_to_auth() {
    let config = parse(
      r#"{ "auths": { "x.io": { "auth": "dXNlcjpwYXNz", "identitytoken": "", "registrytoken": "" } } }"#,
    );
    assert_eq!(config.credential("x.io").unwrap(), Some(Credential::basic("user", "pass")));
  }

  #[test]
  fn test_set_basic_replaces_tokens() {
    let mut config = parse(r#"{ "auths": { "x.io": { "identitytoken": "refresh-123" } } }"#);
    config.set_basic("x.io", "u", "p");
    assert_eq!(config.credential("x.io").unwrap(), Some(Credential::basic("u", "p")));
  }

  #[test]
  fn test_empty_entry_is_no_credential() {
    let config = parse(r#"{ "auths": { "x.io": {} } }"#);
    assert_eq!(config.credential("x.io").unwrap(), None);
  }

  #[tokio::test]
  async fn test_missing_file_is_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = DockerConfigStore::new(dir.path().join("config.json"));

    let cred = store.credential(&Context::background(), "ghcr.io").await.unwrap();
    assert!(cred.is_none());
  }

  #[tokio::test]
  async fn test_malformed_file_fails_provider() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = DockerConfigStore::new(&path);
    let err = store.credential(&Context::background(), "ghcr.io").await.unwrap_err();
    assert!(err.to_string().contains("failed to parse"));
  }

  #[tokio::test]
  async fn test_put_round_trips_and_preserves_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
      &path,
      r#"{ "credsStore": "desktop", "auths": { "quay.io": { "auth": "dTpw" } } }"#,
    )
    .unwrap();

    let store = DockerConfigStore::new(&path);
    store.put("ghcr.io", &Credential::basic("robot", "s3cret")).await.unwrap();

    assert_eq!(
      store.get("ghcr.io").await.unwrap(),
      Some(Credential::basic("robot", "s3cret"))
    );
    assert_eq!(store.get("quay.io").await.unwrap(), Some(Credential::basic("u", "p")));

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["credsStore"], "desktop");
  }

  #[tokio::test]
  async fn test_put_rejects_token_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let store = DockerConfigStore::new(dir.path().join("config.json"));

    let err = store.put("ghcr.io", &Credential::access_token("T")).await.unwrap_err();
    assert!(matches!(err, StoreError::Unsupported("token")));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_puts_all_land() {
    const WRITERS: usize = 32;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let shared = DockerConfigStore::new(&path);

    let mut writers = tokio::task::JoinSet::new();
    for i in 0..WRITERS {
      // Half the writers share one store, the rest open their own.
      let store = if i % 2 == 0 { shared.clone() } else { DockerConfigStore::new(&path) };
      writers.spawn(async move {
        store
          .put(&format!("r{i}.example.com"), &Credential::basic(format!("u{i}"), "p"))
          .await
      });
    }

    let reader = {
      let store = DockerConfigStore::new(&path);
      tokio::spawn(async move {
        let mut errors = 0;
        for _ in 0..200 {
          if store.load().await.is_err() {
            errors += 1;
          }
          tokio::task::yield_now().await;
        }
        errors
      })
    };

    while let Some(result) = writers.join_next().await {
      result.unwrap().unwrap();
    }
    assert_eq!(reader.await.unwrap(), 0);

    let config = shared.load().await.unwrap();
    assert_eq!(config.registries().len(), WRITERS);
    for i in 0..WRITERS {
      assert_eq!(
        config.credential(&format!("r{i}.example.com")).unwrap(),
        Some(Credential::basic(format!("u{i}"), "p"))
      );
    }
  }

  #[tokio::test]
  async fn test_put_leaves_no_temporary_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = DockerConfigStore::new(dir.path().join("config.json"));

    store.put("a.io", &Credential::basic("u", "p")).await.unwrap();
    store.put("b.io", &Credential::basic("u", "p")).await.unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|entry| entry.unwrap().file_name())
      .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("config.json")]);
  }
}
