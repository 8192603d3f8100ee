//! regauth - inspect registry credential resolution
//!
//! This is the main entry point for the CLI application.

#[tokio::main]
async fn main() {
  regauth::cli::run().await;
}
