pub mod config;

pub use config::ChannelConfig;

use std::fmt;

use strum::Display;
use thiserror::Error;
use tonic::transport::Channel;
use uuid::Uuid;

use crate::failure::BoxError;

/// Lifecycle state of a [`ChannelResource`]
///
/// `Created -> Opened -> {Closed | Aborted}`. Both terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelState {
  Created,
  Opened,
  Closed,
  Aborted,
}

impl ChannelState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ChannelState::Closed | ChannelState::Aborted)
  }
}

/// Failure raised by a graceful close attempt
#[derive(Error, Debug)]
pub enum CloseError {
  #[error("communication failure while closing channel: {0}")]
  Communication(String),

  #[error("timed out while closing channel")]
  Timeout,

  #[error(transparent)]
  Other(BoxError),
}

impl CloseError {
  /// Transport noise that is swallowed during dispose
  pub fn is_transport(&self) -> bool {
    matches!(self, CloseError::Communication(_) | CloseError::Timeout)
  }
}

/// The live network handle behind a [`ChannelResource`]
pub trait Connection: Send {
  /// Graceful close
  fn close(&mut self) -> Result<(), CloseError>;

  /// Forced teardown; never fails
  fn abort(&mut self);
}

/// [`Connection`] over a tonic channel
///
/// Closing releases this handle to the HTTP/2 connection. The connection
/// itself shuts down once the proxy's clone is dropped as well, which the
/// owning [`ChannelResource`] does on dispose.
///
/// tonic has no graceful-close handshake, so `close` never fails and does the
/// same as `abort`. The [`CloseError`] branches of dispose only fire for
/// connections that can report a failed close.
#[derive(Debug)]
pub struct TonicConnection {
  channel: Option<Channel>,
}

impl TonicConnection {
  pub fn new(channel: Channel) -> Self {
    Self {
      channel: Some(channel),
    }
  }
}

impl Connection for TonicConnection {
  fn close(&mut self) -> Result<(), CloseError> {
    drop(self.channel.take());
    Ok(())
  }

  fn abort(&mut self) {
    drop(self.channel.take());
  }
}

/// One channel to the remote contract, owned by exactly one call
///
/// Dispose is idempotent. A resource dropped without being disposed (panic,
/// cancelled future) is aborted.
pub struct ChannelResource<P> {
  id: Uuid,
  binding: String,
  proxy: Option<P>,
  connection: Box<dyn Connection>,
  state: ChannelState,
}

impl<P> ChannelResource<P> {
  pub fn new(binding: impl Into<String>, proxy: P, connection: impl Connection + 'static) -> Self {
    Self::with_id(Uuid::new_v4(), binding, proxy, connection)
  }

  /// Build a resource with a pre-assigned id, used when interceptors on the
  /// proxy must already know which channel they belong to
  pub fn with_id(
    id: Uuid,
    binding: impl Into<String>,
    proxy: P,
    connection: impl Connection + 'static,
  ) -> Self {
    Self {
      id,
      binding: binding.into(),
      proxy: Some(proxy),
      connection: Box::new(connection),
      state: ChannelState::Created,
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn binding(&self) -> &str {
    &self.binding
  }

  pub fn state(&self) -> ChannelState {
    self.state
  }

  /// Release the channel gracefully
  ///
  /// A close that fails with a communication failure or a timeout is turned
  /// into an abort and not reported. Any other close failure aborts the
  /// channel and is returned.
  ///
  /// # Errors
  /// Returns the close failure when it was not transport related.
  pub fn dispose(&mut self) -> Result<(), CloseError> {
    if self.state.is_terminal() {
      return Ok(());
    }

    self.proxy = None;
    match self.connection.close() {
      Ok(()) => {
        self.state = ChannelState::Closed;
        tracing::debug!(
          target: "service_client",
          channel_id = %self.id,
          binding = %self.binding,
          "Channel closed"
        );
        Ok(())
      }
      Err(err) if err.is_transport() => {
        tracing::debug!(
          target: "service_client",
          channel_id = %self.id,
          error = %err,
          "Close failed on transport, aborting channel"
        );
        self.force_abort();
        Ok(())
      }
      Err(err) => {
        tracing::error!(
          target: "service_client",
          channel_id = %self.id,
          error = ?err,
          "Unexpected failure while closing channel"
        );
        self.force_abort();
        Err(err)
      }
    }
  }

  /// Tear the channel down without a graceful close
  pub fn abort(&mut self) {
    if self.state.is_terminal() {
      return;
    }
    self.force_abort();
  }

  fn force_abort(&mut self) {
    self.proxy = None;
    self.connection.abort();
    self.state = ChannelState::Aborted;
    tracing::debug!(
      target: "service_client",
      channel_id = %self.id,
      binding = %self.binding,
      "Channel aborted"
    );
  }
}

impl<P: Clone> ChannelResource<P> {
  /// Typed proxy for this channel, `None` once disposed
  ///
  /// The first call moves the channel to `Opened`; the underlying connection
  /// is established lazily by the first request.
  pub fn proxy(&mut self) -> Option<P> {
    if self.state == ChannelState::Created {
      self.state = ChannelState::Opened;
    }
    self.proxy.clone()
  }
}

impl<P> Drop for ChannelResource<P> {
  fn drop(&mut self) {
    if !self.state.is_terminal() {
      tracing::warn!(
        target: "service_client",
        channel_id = %self.id,
        "Channel dropped without dispose, aborting"
      );
      self.force_abort();
    }
  }
}

impl<P> fmt::Debug for ChannelResource<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelResource")
      .field("id", &self.id)
      .field("binding", &self.binding)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  #[derive(Clone, Copy)]
  enum CloseOutcome {
    Ok,
    Communication,
    Timeout,
    Unexpected,
  }

  #[derive(Default)]
  struct Calls {
    closes: usize,
    aborts: usize,
  }

  struct FakeConnection {
    outcome: CloseOutcome,
    calls: Arc<Mutex<Calls>>,
  }

  impl Connection for FakeConnection {
    fn close(&mut self) -> Result<(), CloseError> {
      self.calls.lock().unwrap().closes += 1;
      match self.outcome {
        CloseOutcome::Ok => Ok(()),
        CloseOutcome::Communication => Err(CloseError::Communication("reset by peer".into())),
        CloseOutcome::Timeout => Err(CloseError::Timeout),
        CloseOutcome::Unexpected => Err(CloseError::Other("disk on fire".into())),
      }
    }

    fn abort(&mut self) {
      self.calls.lock().unwrap().aborts += 1;
    }
  }

  fn resource(outcome: CloseOutcome) -> (ChannelResource<&'static str>, Arc<Mutex<Calls>>) {
    let calls = Arc::new(Mutex::new(Calls::default()));
    let connection = FakeConnection {
      outcome,
      calls: calls.clone(),
    };
    (ChannelResource::new("test-binding", "proxy", connection), calls)
  }

  #[test]
  fn test_proxy_opens_channel() {
    let (mut channel, _) = resource(CloseOutcome::Ok);
    assert_eq!(channel.state(), ChannelState::Created);
    assert_eq!(channel.proxy(), Some("proxy"));
    assert_eq!(channel.state(), ChannelState::Opened);
  }

  #[test]
  fn test_graceful_close() {
    let (mut channel, calls) = resource(CloseOutcome::Ok);
    channel.proxy();
    assert!(channel.dispose().is_ok());
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.proxy(), None);
    assert_eq!(calls.lock().unwrap().closes, 1);
    assert_eq!(calls.lock().unwrap().aborts, 0);
  }

  #[test]
  fn test_dispose_twice_is_noop() {
    let (mut channel, calls) = resource(CloseOutcome::Ok);
    channel.dispose().unwrap();
    channel.dispose().unwrap();
    channel.abort();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(calls.lock().unwrap().closes, 1);
    assert_eq!(calls.lock().unwrap().aborts, 0);

    let (mut channel, calls) = resource(CloseOutcome::Ok);
    channel.abort();
    channel.dispose().unwrap();
    assert_eq!(channel.state(), ChannelState::Aborted);
    assert_eq!(calls.lock().unwrap().closes, 0);
    assert_eq!(calls.lock().unwrap().aborts, 1);
  }

  #[test]
  fn test_transport_close_failures_abort_silently() {
    for outcome in [CloseOutcome::Communication, CloseOutcome::Timeout] {
      let (mut channel, calls) = resource(outcome);
      assert!(channel.dispose().is_ok());
      assert_eq!(channel.state(), ChannelState::Aborted);
      assert_eq!(calls.lock().unwrap().aborts, 1);
    }
  }

  #[test]
  fn test_unexpected_close_failure_aborts_and_surfaces() {
    let (mut channel, calls) = resource(CloseOutcome::Unexpected);
    let err = channel.dispose().unwrap_err();
    assert!(!err.is_transport());
    assert_eq!(err.to_string(), "disk on fire");
    assert_eq!(channel.state(), ChannelState::Aborted);
    assert_eq!(calls.lock().unwrap().aborts, 1);

    // Already terminal
    assert!(channel.dispose().is_ok());
    assert_eq!(calls.lock().unwrap().closes, 1);
  }

  #[test]
  fn test_drop_aborts_undisposed_channel() {
    let (mut channel, calls) = resource(CloseOutcome::Ok);
    channel.proxy();
    drop(channel);
    assert_eq!(calls.lock().unwrap().aborts, 1);

    let (mut channel, calls) = resource(CloseOutcome::Ok);
    channel.dispose().unwrap();
    drop(channel);
    assert_eq!(calls.lock().unwrap().aborts, 0);
  }
}
