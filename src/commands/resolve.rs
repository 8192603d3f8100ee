//! `regauth resolve` subcommand.
//!
//! Walks the configured credential chain for one host and reports which source
//! answered and what kind of credential it produced. Secrets are masked.

use std::process;

use crate::cli::Cli;
use crate::color::ColorScheme;
use crate::commands::mask_secret;
use crate::context::Context;
use crate::credentials::Credential;
use crate::error::AuthError;
use crate::resolver::CredentialResolver;

/// Resolve credentials for `host` and print a summary.
///
/// Exit codes: `1` when the sources cannot be configured or the lookup timed
/// out, `2` when login or a provider failed.
pub(crate) async fn handle_resolve_command(host: &str, cli: &Cli, colors: &ColorScheme) {
  let options = match cli.sources.client_options(host).await {
    Ok(options) => options,
    Err(e) => {
      eprintln!("{} {}", colors.error("✗"), colors.error("Failed to configure credential sources"));
      eprintln!("  {e:#}");
      process::exit(1);
    }
  };

  let resolver = options.resolver();
  let sources: Vec<&str> = resolver.providers().map(|p| p.name()).collect();

  println!("{} {}", colors.info("→"), colors.info("Resolving credentials"));
  println!("  {}: {}", colors.emphasis("Host"), colors.link(host));
  println!(
    "  {}: {}",
    colors.emphasis("Sources"),
    if sources.is_empty() {
      colors.dimmed("(none)")
    } else {
      sources.iter().map(|s| colors.code(s)).collect::<Vec<_>>().join(", ")
    }
  );
  if resolver.has_auto_login() {
    println!("  {}: {}", colors.emphasis("Auto-login"), colors.success("enabled"));
  }

  let ctx = Context::background().with_timeout(cli.sources.timeout());

  match resolver.resolve(&ctx, host).await {
    Ok(Some(credential)) => {
      let source = resolver.cached_provider(host).unwrap_or("unknown");
      println!("\n{} {}", colors.success("✓"), colors.success("Credentials found"));
      println!("  {}: {}", colors.emphasis("Source"), colors.code(source));
      print_credential(&credential, colors);
    }
    Ok(None) => {
      println!("\n{} {}", colors.warning("⚠"), colors.warning("No credentials found"));
      println!("  Requests to {host} will be sent anonymously.");
    }
    Err(e) => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Credential resolution failed"));
      eprintln!("  {e}");
      if let AuthError::Provider { provider, .. } = &e {
        eprintln!("  {}: {}", colors.emphasis("Failing source"), colors.code(provider));
      }
      process::exit(if e.is_cancellation() { 1 } else { 2 });
    }
  }
}

fn print_credential(credential: &Credential, colors: &ColorScheme) {
  println!("  {}: {}", colors.emphasis("Kind"), credential.kind());
  match credential {
    Credential::Basic { username, password } => {
      println!("  {}: {}", colors.emphasis("Username"), username);
      println!("  {}: {}", colors.emphasis("Password"), colors.dimmed(mask_secret(password)));
    }
    Credential::AccessToken(token) => {
      println!("  {}: {}", colors.emphasis("Token"), colors.dimmed(mask_secret(token)));
    }
    Credential::TokenPair {
      access_token,
      refresh_token,
    } => {
      println!("  {}: {}", colors.emphasis("Access token"), colors.dimmed(mask_secret(access_token)));
      println!(
        "  {}: {}",
        colors.emphasis("Refresh token"),
        colors.dimmed(mask_secret(refresh_token))
      );
    }
  }
}
