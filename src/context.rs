//! Cancellation and deadline propagation.
//!
//! A [`Context`] travels with every resolution into each provider and into
//! auto-login. Long-running calls are wrapped in [`Context::run`], which
//! aborts them as soon as the context is cancelled or its deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// Cancellation token plus optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
  token: CancellationToken,
  deadline: Option<Instant>,
}

impl Context {
  /// A context that is never cancelled and has no deadline.
  pub fn background() -> Self {
    Self::default()
  }

  /// Derive a context that expires after `timeout`, keeping the earlier of the
  /// two deadlines if one is already set.
  pub fn with_timeout(&self, timeout: Duration) -> Self {
    self.with_deadline(Instant::now() + timeout)
  }

  /// Derive a context that expires at `deadline`.
  pub fn with_deadline(&self, deadline: Instant) -> Self {
    let deadline = match self.deadline {
      Some(existing) if existing < deadline => existing,
      _ => deadline,
    };

    Self {
      token: self.token.child_token(),
      deadline: Some(deadline),
    }
  }

  /// Derive a context that is cancelled along with this one but can also be
  /// cancelled on its own.
  pub fn child(&self) -> Self {
    Self {
      token: self.token.child_token(),
      deadline: self.deadline,
    }
  }

  /// Cancel this context and every context derived from it.
  pub fn cancel(&self) {
    self.token.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.token.is_cancelled()
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Fail fast if the context is already done.
  pub fn check(&self) -> Result<(), AuthError> {
    if self.token.is_cancelled() {
      return Err(AuthError::Cancelled);
    }
    if let Some(deadline) = self.deadline
      && Instant::now() >= deadline
    {
      return Err(AuthError::DeadlineExceeded);
    }
    Ok(())
  }

  /// Drive `fut` to completion unless the context is cancelled or expires
  /// first, in which case `fut` is dropped.
  pub async fn run<F, T>(&self, fut: F) -> Result<T, AuthError>
  where
    F: Future<Output = T>,
  {
    self.check()?;

    match self.deadline {
      Some(deadline) => {
        tokio::select! {
          biased;
          _ = self.token.cancelled() => Err(AuthError::Cancelled),
          _ = tokio::time::sleep_until(deadline) => Err(AuthError::DeadlineExceeded),
          value = fut => Ok(value),
        }
      }
      None => {
        tokio::select! {
          biased;
          _ = self.token.cancelled() => Err(AuthError::Cancelled),
          value = fut => Ok(value),
        }
      }
    }
  }
}
