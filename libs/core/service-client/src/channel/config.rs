use std::time::Duration;
use tonic::transport::Endpoint;

use crate::config::{env_duration_secs, env_or_default};
use crate::error::ConfigError;

/// Transport tuning applied to every channel opened for a binding
///
/// Builder pattern like the rest of the client configuration. No retries and
/// no pooling: each call gets a fresh lazily-connected channel with these
/// settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
  // HTTP/2 Keep-Alive
  pub http2_keep_alive_interval: Option<Duration>,
  pub keep_alive_timeout: Duration,

  // Connection settings
  pub connect_timeout: Duration,
  /// Per-request deadline; elapsed deadlines surface as timeouts
  pub timeout: Option<Duration>,

  // Window sizes (HTTP/2 flow control)
  pub initial_connection_window_size: Option<u32>,
  pub initial_stream_window_size: Option<u32>,

  // TCP settings
  pub tcp_nodelay: bool,
}

impl Default for ChannelConfig {
  fn default() -> Self {
    Self {
      http2_keep_alive_interval: Some(Duration::from_secs(30)),
      keep_alive_timeout: Duration::from_secs(10),
      connect_timeout: Duration::from_secs(5),
      timeout: Some(Duration::from_secs(60)),
      initial_connection_window_size: Some(1024 * 1024), // 1MB
      initial_stream_window_size: Some(1024 * 1024),     // 1MB
      tcp_nodelay: true,
    }
  }
}

impl ChannelConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load settings from `<PREFIX>_CONNECT_TIMEOUT_SECS` and
  /// `<PREFIX>_REQUEST_TIMEOUT_SECS`, falling back to the defaults.
  /// A request timeout of `0` disables the per-request deadline.
  ///
  /// # Errors
  /// Returns [`ConfigError::ParseError`] when a value is not a whole number.
  pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
    let defaults = Self::default();
    let connect_timeout = env_duration_secs(
      &format!("{prefix}_CONNECT_TIMEOUT_SECS"),
      defaults.connect_timeout,
    )?;

    let request_key = format!("{prefix}_REQUEST_TIMEOUT_SECS");
    let timeout = match env_or_default(&request_key, "").as_str() {
      "" => defaults.timeout,
      "0" => None,
      _ => Some(env_duration_secs(&request_key, Duration::ZERO)?),
    };

    Ok(Self {
      connect_timeout,
      timeout,
      ..defaults
    })
  }

  pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  /// Set the deadline for individual calls
  ///
  /// # Example
  /// ```ignore
  /// let config = ChannelConfig::new()
  ///     .with_request_timeout(Duration::from_secs(120));
  /// ```
  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Leave call deadlines to the caller
  pub fn without_request_timeout(mut self) -> Self {
    self.timeout = None;
    self
  }

  pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
    self.http2_keep_alive_interval = Some(interval);
    self
  }

  pub fn without_keep_alive(mut self) -> Self {
    self.http2_keep_alive_interval = None;
    self
  }

  /// Set both connection and stream window sizes to the same value
  pub fn with_window_size(mut self, size: u32) -> Self {
    self.initial_connection_window_size = Some(size);
    self.initial_stream_window_size = Some(size);
    self
  }

  pub(crate) fn apply_to_endpoint(&self, mut endpoint: Endpoint) -> Endpoint {
    if let Some(interval) = self.http2_keep_alive_interval {
      endpoint = endpoint.http2_keep_alive_interval(interval);
    }
    endpoint = endpoint
      .keep_alive_timeout(self.keep_alive_timeout)
      .connect_timeout(self.connect_timeout);

    if let Some(timeout) = self.timeout {
      endpoint = endpoint.timeout(timeout);
    }

    if let Some(size) = self.initial_connection_window_size {
      endpoint = endpoint.initial_connection_window_size(size);
    }
    if let Some(size) = self.initial_stream_window_size {
      endpoint = endpoint.initial_stream_window_size(size);
    }

    endpoint.tcp_nodelay(self.tcp_nodelay)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = ChannelConfig::default();
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.timeout, Some(Duration::from_secs(60)));
    assert_eq!(config.initial_connection_window_size, Some(1024 * 1024));
    assert!(config.tcp_nodelay);
  }

  #[test]
  fn test_builder_pattern() {
    let config = ChannelConfig::new()
      .with_connect_timeout(Duration::from_secs(10))
      .with_request_timeout(Duration::from_secs(120))
      .with_window_size(2 * 1024 * 1024)
      .without_keep_alive();

    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.timeout, Some(Duration::from_secs(120)));
    assert_eq!(config.initial_stream_window_size, Some(2 * 1024 * 1024));
    assert_eq!(config.http2_keep_alive_interval, None);
    assert_eq!(ChannelConfig::new().without_request_timeout().timeout, None);
  }

  #[test]
  fn test_from_env() {
    temp_env::with_vars(
      [
        ("ORDERS_CONNECT_TIMEOUT_SECS", Some("3")),
        ("ORDERS_REQUEST_TIMEOUT_SECS", Some("0")),
      ],
      || {
        let config = ChannelConfig::from_env("ORDERS").unwrap();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.timeout, None);
      },
    );
  }

  #[test]
  fn test_from_env_defaults_and_errors() {
    temp_env::with_vars_unset(
      ["BILLING_CONNECT_TIMEOUT_SECS", "BILLING_REQUEST_TIMEOUT_SECS"],
      || {
        assert_eq!(ChannelConfig::from_env("BILLING").unwrap(), ChannelConfig::default());
      },
    );

    temp_env::with_var("BILLING_REQUEST_TIMEOUT_SECS", Some("soon"), || {
      let err = ChannelConfig::from_env("BILLING").unwrap_err();
      assert!(matches!(err, ConfigError::ParseError { .. }));
    });
  }
}
