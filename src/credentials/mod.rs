//! Credential sources for registry authentication.
//!
//! This module provides a trait-based interface for retrieving credentials
//! from various sources:
//!
//! - [`StaticProvider`]: a fixed credential supplied by the caller
//! - [`DockerConfigStore`]: the on-disk Docker `config.json` store
//! - [`OAuthClientCredentialsProvider`]: OAuth2 client-credentials exchange
//! - [`GcpMetadataProvider`]: GCP instance metadata tokens
//!
//! Providers answer `Ok(None)` when they have nothing for a host. How they
//! are ordered, cached and combined is the resolver's job.

mod gcp;
mod oauth;
mod provider;
mod store;
mod types;

pub use gcp::{GcpMetadataProvider, HostPatterns};
pub use oauth::{ClientCredentialsConfig, OAuthClientCredentialsProvider};
pub use provider::{CredentialProvider, EmptyProvider, FnProvider, StaticProvider};
pub use store::{DockerConfig, DockerConfigStore, StoreError};
pub use types::{Credential, OAUTH2_ACCESS_TOKEN_USER, basic_auth_header};
