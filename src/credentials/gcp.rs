//! Google Cloud metadata-server provider.
//!
//! On GCE, GKE and Cloud Run the instance metadata server hands out access
//! tokens for the attached service account. Google's registries accept such a
//! token as the password of the special `oauth2accesstoken` user.
//!
//! The provider only answers for hosts it was enabled for, so that running on
//! a GCP VM does not leak a Google token to unrelated registries.

use std::time::Duration;

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::types::OAUTH2_ACCESS_TOKEN_USER;
use super::{Credential, CredentialProvider};
use crate::client::USER_AGENT;
use crate::context::Context;
use crate::error::ProviderError;

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
  access_token: String,
}

/// Which hosts the provider answers for.
///
/// Entries beginning with `*` match by suffix, so `*-docker.pkg.dev` covers
/// every Artifact Registry region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPatterns(Vec<String>);

impl HostPatterns {
  pub fn new<I, S>(patterns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(patterns.into_iter().map(Into::into).collect())
  }

  /// Google Container Registry and Artifact Registry hosts.
  pub fn google_registries() -> Self {
    Self::new(["gcr.io", "*.gcr.io", "*-docker.pkg.dev"])
  }

  pub fn matches(&self, host: &str) -> bool {
    self.0.iter().any(|pattern| match pattern.strip_prefix('*') {
      Some(suffix) => host.len() > suffix.len() && host.ends_with(suffix),
      None => pattern == host,
    })
  }
}

/// Fetches access tokens from the GCP instance metadata server.
#[derive(Debug, Clone)]
pub struct GcpMetadataProvider {
  hosts: HostPatterns,
  metadata_url: String,
  client: reqwest::Client,
}

impl GcpMetadataProvider {
  /// Create a provider for `hosts`, honoring `GCE_METADATA_HOST` when set.
  pub fn new(hosts: HostPatterns) -> anyhow::Result<Self> {
    let metadata_host = std::env::var("GCE_METADATA_HOST")
      .ok()
      .filter(|h| !h.is_empty())
      .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());

    Self::with_metadata_url(hosts, format!("http://{metadata_host}"))
  }

  /// Create a provider talking to a metadata server at `metadata_url`.
  pub fn with_metadata_url(hosts: HostPatterns, metadata_url: impl Into<String>) -> anyhow::Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(Duration::from_secs(10))
      .no_proxy()
      .build()
      .context("Failed to create metadata HTTP client")?;

    Ok(Self {
      hosts,
      metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
      client,
    })
  }

  async fn fetch_token(&self) -> anyhow::Result<String> {
    let url = format!("{}{}", self.metadata_url, TOKEN_PATH);

    let response = self
      .client
      .get(&url)
      .header("Metadata-Flavor", "Google")
      .send()
      .await
      .context("Failed to reach the GCP metadata server")?;

    let status = response.status();
    if !status.is_success() {
      return Err(anyhow!("GCP metadata server returned error {status}"));
    }

    let token: MetadataToken = response
      .json()
      .await
      .context("Failed to parse GCP metadata token response")?;

    if token.access_token.is_empty() {
      return Err(anyhow!("GCP metadata server returned an empty access token"));
    }

    Ok(token.access_token)
  }
}

#[async_trait]
impl CredentialProvider for GcpMetadataProvider {
  fn name(&self) -> &str {
    "gcp-metadata"
  }

  async fn credential(&self, ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError> {
    if !self.hosts.matches(host) {
      return Ok(None);
    }

    debug!(host, "Fetching access token from GCP metadata server");
    let token = ctx.run(self.fetch_token()).await??;

    Ok(Some(Credential::basic(OAUTH2_ACCESS_TOKEN_USER, token)))
  }
}
