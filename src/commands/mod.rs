//! CLI subcommand handlers.
//!
//! One module per `regauth` subcommand, keeping `cli.rs` limited to argument
//! definitions and dispatch.

pub mod check;
pub mod completions;
pub mod resolve;
pub mod version;

/// Mask a secret for display, keeping only enough to recognize it.
pub(crate) fn mask_secret(secret: &str) -> String {
  let visible: String = secret.chars().take(4).collect();
  if secret.chars().count() <= 8 {
    "*".repeat(secret.chars().count().max(4))
  } else {
    format!("{visible}{}", "*".repeat(8))
  }
}
