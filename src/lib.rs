//! Registry credential resolution
//!
//! This library resolves the credential to send to an OCI registry by walking
//! an ordered chain of credential sources, remembering per host which source
//! worked, and optionally logging in before the first lookup. The resolver is
//! installed into an HTTP client that authenticates every registry request.

pub mod cli;
pub mod client;
pub mod color;
pub mod commands;
pub mod context;
pub mod credentials;
pub mod error;
pub mod login;
pub mod resolver;

pub use client::{AuthClient, ClientOptions};
pub use context::Context;
pub use credentials::{Credential, CredentialProvider};
pub use error::{AuthError, LoginError};
pub use login::AutoLoginHandler;
pub use resolver::{ChainResolver, CredentialResolver};
