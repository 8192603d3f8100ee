//! Command-line interface definitions for regauth.
//!
//! This module defines the CLI structure using clap derives and turns the
//! credential-source flags into [`ClientOptions`] for the library.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use url::Url;

use crate::client::{ClientOptions, MemoryTokenCache, registry_host};
use crate::color::ColorScheme;
use crate::commands::check::handle_check_command;
use crate::commands::completions::handle_completions_command;
use crate::commands::resolve::handle_resolve_command;
use crate::commands::version::handle_version_command;
use crate::credentials::{
  Credential, DockerConfigStore, GcpMetadataProvider, HostPatterns, OAuthClientCredentialsProvider,
};
use crate::login::StoreLogin;

/// regauth - Resolve and test OCI registry credentials
#[derive(Debug, Parser)]
#[command(
  name = "regauth",
  version,
  about = "Resolve and test OCI registry credentials",
  long_about = "A command-line tool for inspecting how registry credentials are resolved.\n\
                Consults static flags, the Docker config store, OAuth2 client credentials\n\
                and the GCP metadata server in order, the same way the library does.",
  styles = help_styles()
)]
pub struct Cli {
  /// Subcommand to execute
  #[command(subcommand)]
  pub command: Command,

  /// Credential source options
  #[command(flatten)]
  pub sources: SourceOptions,

  /// Behavior options
  #[command(flatten)]
  pub behavior: BehaviorOptions,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
  /// Show which credential source answers for a registry host
  Resolve {
    /// Registry host or URL (e.g., ghcr.io, localhost:5000)
    #[arg(value_name = "HOST", value_parser = normalize_host)]
    host: String,
  },

  /// Call the registry's /v2/ endpoint with the resolved credentials
  Check {
    /// Registry host or URL (e.g., ghcr.io, localhost:5000)
    #[arg(value_name = "HOST", value_parser = normalize_host)]
    host: String,
  },

  /// Display version and build information
  Version {
    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Show only version number
    #[arg(long)]
    short: bool,
  },

  /// Generate shell completion scripts
  Completions {
    /// Target shell for completions
    #[arg(value_enum)]
    shell: Shell,
  },
}

/// Supported shells for completion scripts
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  Powershell,
  Elvish,
}

/// Reduce a host or URL argument to the registry host (with port).
fn normalize_host(input: &str) -> Result<String, String> {
  let trimmed = input.trim();
  if trimmed.is_empty() {
    return Err("Host must not be empty".to_string());
  }

  let with_scheme = if trimmed.contains("://") {
    trimmed.to_string()
  } else {
    format!("https://{trimmed}")
  };

  let url = Url::parse(&with_scheme).map_err(|e| format!("Invalid host: {e}"))?;
  registry_host(&url).map_err(|e| e.to_string())
}

/// Credential source options
#[derive(Debug, Parser)]
pub struct SourceOptions {
  /// Registry username (static credential, or auto-login with --auto-login)
  #[arg(long, env = "REGAUTH_USER", value_name = "USER")]
  pub user: Option<String>,

  /// Registry password or token
  #[arg(long, env = "REGAUTH_PASSWORD", value_name = "PASSWORD", hide_env_values = true)]
  pub password: Option<String>,

  /// Write --user/--password into the Docker config store before lookup
  #[arg(long)]
  pub auto_login: bool,

  /// Path to the Docker config.json store (defaults to $DOCKER_CONFIG or ~/.docker)
  #[arg(long, env = "REGAUTH_DOCKER_CONFIG", value_name = "FILE")]
  pub docker_config: Option<PathBuf>,

  /// Do not consult the Docker config store
  #[arg(long, conflicts_with_all = ["docker_config", "auto_login"])]
  pub no_docker_config: bool,

  /// JSON file with OAuth2 client credentials keyed by registry host
  #[arg(long, env = "REGAUTH_OAUTH_CONFIG", value_name = "FILE")]
  pub oauth_config: Option<PathBuf>,

  /// Use the GCP metadata server for hosts matching PATTERN (repeatable,
  /// `*` prefix matches by suffix)
  #[arg(long = "gcp-host", value_name = "PATTERN")]
  pub gcp_hosts: Vec<String>,

  /// Skip TLS certificate verification
  #[arg(long)]
  pub insecure: bool,

  /// Overall timeout in seconds
  #[arg(long, default_value = "30", value_name = "SECONDS")]
  pub timeout: u64,
}

impl SourceOptions {
  /// Deadline applied to each command's context.
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout)
  }

  fn static_credential(&self) -> Option<Credential> {
    match (&self.user, &self.password) {
      (Some(user), Some(password)) => Some(Credential::basic(user.clone(), password.clone())),
      _ => None,
    }
  }

  fn store(&self) -> anyhow::Result<DockerConfigStore> {
    match &self.docker_config {
      Some(path) => Ok(DockerConfigStore::new(path)),
      None => DockerConfigStore::from_env().context("Failed to locate the Docker config store"),
    }
  }

  /// Translate the flags into client options. Providers are added in a fixed
  /// order: static credential, Docker config store, OAuth2, GCP metadata.
  ///
  /// # Errors
  /// Returns an error when a configured source cannot be loaded.
  pub async fn client_options(&self, host: &str) -> anyhow::Result<ClientOptions> {
    let mut options = ClientOptions::new().with_token_cache(Arc::new(MemoryTokenCache::new()));

    if self.insecure {
      options = options.insecure();
    }

    if let Some(credential) = self.static_credential() {
      if self.auto_login {
        let login = StoreLogin::new(self.store()?).with_credential(host, credential);
        options = options.with_auto_login(Arc::new(login));
      } else {
        options = options.with_credential(credential);
      }
    }

    if !self.no_docker_config {
      options = options.with_store(self.store()?);
    }

    if let Some(path) = &self.oauth_config {
      options = options.with_oauth(OAuthClientCredentialsProvider::from_file(path).await?);
    }

    if !self.gcp_hosts.is_empty() {
      options = options.with_gcp(GcpMetadataProvider::new(HostPatterns::new(self.gcp_hosts.iter().cloned()))?);
    }

    Ok(options)
  }
}

/// Behavior options
#[derive(Debug, Parser)]
pub struct BehaviorOptions {
  /// Increase verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  pub verbose: u8,

  /// Suppress all output except errors
  #[arg(short, long, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Colorize output
  #[arg(long, value_enum, default_value = "auto", value_name = "WHEN")]
  pub color: ColorOption,
}

/// Color output options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorOption {
  Auto,
  Always,
  Never,
}

impl Cli {
  /// Parse CLI arguments from the environment
  pub fn parse_args() -> Self {
    Self::parse()
  }

  /// Validate CLI arguments
  ///
  /// Returns an error if the CLI configuration is invalid.
  pub fn validate(&self) -> Result<(), String> {
    let sources = &self.sources;

    if sources.password.is_some() && sources.user.is_none() {
      return Err("--password requires --user".to_string());
    }

    if sources.user.is_some() && sources.password.is_none() {
      return Err("--user requires --password".to_string());
    }

    if sources.auto_login && sources.user.is_none() {
      return Err("--auto-login requires --user and --password".to_string());
    }

    if sources.timeout == 0 {
      return Err("--timeout must be at least 1 second".to_string());
    }

    Ok(())
  }
}

/// Parse CLI arguments, initialize shared services, and dispatch to the chosen
/// command.
pub async fn run() {
  let cli = Cli::parse_args();

  init_tracing(&cli.behavior);

  // Create color scheme based on user preference
  let colors = ColorScheme::new(cli.behavior.color);

  // Validate CLI arguments
  if let Err(e) = cli.validate() {
    eprintln!("{} {}", colors.error("Error:"), e);
    process::exit(4); // Invalid arguments exit code
  }

  match &cli.command {
    Command::Resolve { host } => {
      handle_resolve_command(host, &cli, &colors).await;
    }
    Command::Check { host } => {
      handle_check_command(host, &cli, &colors).await;
    }
    Command::Version { json, short } => {
      handle_version_command(*json, *short, &colors);
    }
    Command::Completions { shell } => {
      handle_completions_command(*shell);
    }
  }
}

fn init_tracing(behavior: &BehaviorOptions) {
  let level = if behavior.quiet {
    LevelFilter::ERROR
  } else {
    match behavior.verbose {
      0 => LevelFilter::WARN,
      1 => LevelFilter::INFO,
      2 => LevelFilter::DEBUG,
      _ => LevelFilter::TRACE,
    }
  };

  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .try_init();
}

/// Help styling for `regauth`: headings in yellow, flags and subcommands in
/// green, value placeholders in cyan. Matches the palette of
/// [`ColorScheme`](crate::color::ColorScheme) so help and command output look
/// alike.
fn help_styles() -> clap::builder::Styles {
  use clap::builder::styling::{AnsiColor, Effects};

  clap::builder::Styles::styled()
    .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
    .literal(AnsiColor::Green.on_default() | Effects::BOLD)
    .placeholder(AnsiColor::Cyan.on_default())
    .error(AnsiColor::BrightRed.on_default() | Effects::BOLD)
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default())
}
