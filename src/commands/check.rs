//! `regauth check` subcommand.
//!
//! Sends `GET /v2/` to the registry through [`AuthClient`](crate::AuthClient),
//! which exercises the whole path: resolution, bearer token exchange and the
//! authenticated retry.

use std::process;

use reqwest::StatusCode;

use crate::cli::Cli;
use crate::color::ColorScheme;
use crate::context::Context;

/// Call the registry's API version endpoint and report the outcome.
///
/// Exit codes: `1` for configuration or transport failures, `2` when the
/// registry rejects the credentials.
pub(crate) async fn handle_check_command(host: &str, cli: &Cli, colors: &ColorScheme) {
  let url = format!("https://{host}/v2/");

  let client = match cli.sources.client_options(host).await.map(|o| o.build()) {
    Ok(Ok(client)) => client,
    Ok(Err(e)) => fail(colors, "Failed to create registry client", &e, 1),
    Err(e) => fail(colors, "Failed to configure credential sources", &e, 1),
  };

  println!("{} {}", colors.info("→"), colors.info("Checking registry access"));
  println!("  {}: {}", colors.emphasis("URL"), colors.link(&url));

  let request = match client.get(&url).build() {
    Ok(request) => request,
    Err(e) => fail(colors, "Invalid registry URL", &e, 1),
  };

  let ctx = Context::background().with_timeout(cli.sources.timeout());
  let response = match client.send(&ctx, request).await {
    Ok(response) => response,
    Err(e) => {
      let code = if matches!(e, crate::AuthError::Login(_) | crate::AuthError::Provider { .. }) {
        2
      } else {
        1
      };
      fail(colors, "Request failed", &e, code)
    }
  };

  let status = response.status();
  println!("  {}: {}", colors.emphasis("Status"), colors.number(status));

  match status {
    s if s.is_success() => {
      println!("\n{} {}", colors.success("✓"), colors.success("Registry accepted the request"));
    }
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
      eprintln!("\n{} {}", colors.error("✗"), colors.error("Registry rejected the credentials"));
      eprintln!("  Run `regauth resolve {host}` to see which source was used.");
      process::exit(2);
    }
    _ => {
      eprintln!("\n{} {}", colors.warning("⚠"), colors.warning("Unexpected response from registry"));
      process::exit(1);
    }
  }
}

fn fail(colors: &ColorScheme, message: &str, err: &dyn std::fmt::Display, code: i32) -> ! {
  eprintln!("\n{} {}", colors.error("✗"), colors.error(message));
  eprintln!("  {err}");
  process::exit(code);
}
