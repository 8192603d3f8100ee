//! Fake credential providers and login handlers for testing
//!
//! Every fake records its invocations into a shared [`CallLog`] so tests can
//! assert exactly which sources were consulted and in what order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regauth::credentials::{Credential, CredentialProvider};
use regauth::error::{LoginError, ProviderError};
use regauth::{AutoLoginHandler, Context};

/// Ordered record of `"<name>:<host>"` invocations shared between fakes.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
  pub fn new() -> Self {
    Self::default()
  }

  fn record(&self, name: &str, host: &str) {
    self.0.lock().unwrap().push(format!("{name}:{host}"));
  }

  pub fn calls(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }

  /// Names of the sources invoked, in order, ignoring the host.
  pub fn names(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .map(|c| c.split(':').next().unwrap_or_default().to_string())
      .collect()
  }

  pub fn count(&self, name: &str) -> usize {
    self.names().iter().filter(|n| n.as_str() == name).count()
  }

  pub fn clear(&self) {
    self.0.lock().unwrap().clear();
  }
}

/// What a [`FakeProvider`] answers.
#[derive(Debug, Clone)]
pub enum Answer {
  Nothing,
  Credential(Credential),
  Fail(String),
  /// Answer only for the listed hosts.
  PerHost(Vec<(String, Credential)>),
}

/// A configurable provider that records every call.
pub struct FakeProvider {
  name: String,
  answer: Answer,
  delay: Option<Duration>,
  log: CallLog,
  calls: AtomicUsize,
}

impl FakeProvider {
  pub fn new(name: &str, answer: Answer, log: &CallLog) -> Self {
    Self {
      name: name.to_string(),
      answer,
      delay: None,
      log: log.clone(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn nothing(name: &str, log: &CallLog) -> Arc<dyn CredentialProvider> {
    Arc::new(Self::new(name, Answer::Nothing, log))
  }

  pub fn returning(name: &str, credential: Credential, log: &CallLog) -> Arc<dyn CredentialProvider> {
    Arc::new(Self::new(name, Answer::Credential(credential), log))
  }

  pub fn failing(name: &str, message: &str, log: &CallLog) -> Arc<dyn CredentialProvider> {
    Arc::new(Self::new(name, Answer::Fail(message.to_string()), log))
  }

  /// Sleep for `delay` before answering.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn call_count(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CredentialProvider for FakeProvider {
  fn name(&self) -> &str {
    &self.name
  }

  async fn credential(&self, _ctx: &Context, host: &str) -> Result<Option<Credential>, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.log.record(&self.name, host);

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }

    match &self.answer {
      Answer::Nothing => Ok(None),
      Answer::Credential(credential) => Ok(Some(credential.clone())),
      Answer::Fail(message) => Err(message.clone().into()),
      Answer::PerHost(entries) => Ok(
        entries
          .iter()
          .find(|(h, _)| h == host)
          .map(|(_, credential)| credential.clone()),
      ),
    }
  }
}

/// Login handler that records calls and either succeeds or fails.
pub struct FakeLogin {
  log: CallLog,
  fail_with: Option<String>,
}

impl FakeLogin {
  pub fn succeeding(log: &CallLog) -> Arc<dyn AutoLoginHandler> {
    Arc::new(Self {
      log: log.clone(),
      fail_with: None,
    })
  }

  pub fn failing(reason: &str, log: &CallLog) -> Arc<dyn AutoLoginHandler> {
    Arc::new(Self {
      log: log.clone(),
      fail_with: Some(reason.to_string()),
    })
  }
}

#[async_trait]
impl AutoLoginHandler for FakeLogin {
  async fn login(&self, _ctx: &Context, host: &str) -> Result<(), LoginError> {
    self.log.record("login", host);
    match &self.fail_with {
      Some(reason) => Err(LoginError::failed(host, reason)),
      None => Ok(()),
    }
  }
}
