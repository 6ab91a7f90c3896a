//! Client configuration: credentials, certificates and the binding table
//!
//! Everything here is plain data. Validation of what a login method requires
//! happens when a channel is requested (see [`crate::factory::select_binding`]),
//! so a config can be built incrementally or loaded from the environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::error::ConfigError;
use crate::login::LoginMethod;

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
  fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load an environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
  env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load an environment variable or return an error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
  env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn env_optional(key: &str) -> Option<String> {
  env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn env_duration_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
  match env_optional(key) {
    None => Ok(default),
    Some(raw) => raw
      .trim()
      .parse::<u64>()
      .map(Duration::from_secs)
      .map_err(|e| ConfigError::ParseError {
        key: key.to_string(),
        details: e.to_string(),
      }),
  }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
  std::fs::read(path).map_err(|e| ConfigError::Certificate {
    path: path.display().to_string(),
    details: e.to_string(),
  })
}

/// Client certificate and its private key, PEM encoded
#[derive(Clone)]
pub struct ClientCertificate {
  certificate_pem: Vec<u8>,
  private_key_pem: Vec<u8>,
}

impl ClientCertificate {
  pub fn from_pem(certificate_pem: impl Into<Vec<u8>>, private_key_pem: impl Into<Vec<u8>>) -> Self {
    Self {
      certificate_pem: certificate_pem.into(),
      private_key_pem: private_key_pem.into(),
    }
  }

  /// # Errors
  /// Returns [`ConfigError::Certificate`] when either file cannot be read.
  pub fn from_files(certificate: impl AsRef<Path>, private_key: impl AsRef<Path>) -> Result<Self, ConfigError> {
    Ok(Self::from_pem(read_pem(certificate.as_ref())?, read_pem(private_key.as_ref())?))
  }

  pub fn certificate_pem(&self) -> &[u8] {
    &self.certificate_pem
  }

  pub fn private_key_pem(&self) -> &[u8] {
    &self.private_key_pem
  }
}

impl fmt::Debug for ClientCertificate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClientCertificate")
      .field("certificate_len", &self.certificate_pem.len())
      .finish_non_exhaustive()
  }
}

/// Expected certificate of the remote service, PEM encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCertificate {
  pem: Vec<u8>,
}

impl ServiceCertificate {
  pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
    Self { pem: pem.into() }
  }

  /// # Errors
  /// Returns [`ConfigError::Certificate`] when the file cannot be read.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    read_pem(path.as_ref()).map(Self::from_pem)
  }

  pub fn pem(&self) -> &[u8] {
    &self.pem
  }
}

/// Credentials and login method of a client
///
/// Owned by [`ServiceClient`](crate::ServiceClient) and read-only from then
/// on. The client never mutates it, and callers must not swap it out while
/// calls are in flight.
#[derive(Clone)]
pub struct ClientConfig {
  login_method: LoginMethod,
  user_name: Option<String>,
  password: Option<String>,
  client_certificate: Option<ClientCertificate>,
  service_certificate: Option<ServiceCertificate>,
}

impl ClientConfig {
  pub fn new(login_method: LoginMethod) -> Self {
    Self {
      login_method,
      user_name: None,
      password: None,
      client_certificate: None,
      service_certificate: None,
    }
  }

  pub fn no_auth() -> Self {
    Self::new(LoginMethod::NoAuth)
  }

  pub fn basic(user_name: impl Into<String>, password: impl Into<String>) -> Self {
    Self::new(LoginMethod::UserName).with_credentials(user_name, password)
  }

  pub fn certificate(certificate: ClientCertificate) -> Self {
    Self::new(LoginMethod::Certificate).with_client_certificate(certificate)
  }

  pub fn with_credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
    self.user_name = Some(user_name.into());
    self.password = Some(password.into());
    self
  }

  pub fn with_client_certificate(mut self, certificate: ClientCertificate) -> Self {
    self.client_certificate = Some(certificate);
    self
  }

  /// Pin the identity the remote endpoint must present
  pub fn with_service_certificate(mut self, certificate: ServiceCertificate) -> Self {
    self.service_certificate = Some(certificate);
    self
  }

  pub fn login_method(&self) -> LoginMethod {
    self.login_method
  }

  pub fn user_name(&self) -> Option<&str> {
    self.user_name.as_deref()
  }

  pub fn password(&self) -> Option<&str> {
    self.password.as_deref()
  }

  pub fn client_certificate(&self) -> Option<&ClientCertificate> {
    self.client_certificate.as_ref()
  }

  pub fn service_certificate(&self) -> Option<&ServiceCertificate> {
    self.service_certificate.as_ref()
  }
}

impl fmt::Debug for ClientConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClientConfig")
      .field("login_method", &self.login_method)
      .field("user_name", &self.user_name)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("client_certificate", &self.client_certificate)
      .field("service_certificate", &self.service_certificate.is_some())
      .finish()
  }
}

impl FromEnv for ClientConfig {
  /// Environment variables:
  /// - `SERVICE_LOGIN_METHOD`: code or name (default `no_auth`)
  /// - `SERVICE_USER_NAME`, `SERVICE_PASSWORD`
  /// - `SERVICE_CLIENT_CERT_PATH`, `SERVICE_CLIENT_KEY_PATH`
  /// - `SERVICE_CERT_PATH`: expected service certificate
  fn from_env() -> Result<Self, ConfigError> {
    let login_method = LoginMethod::parse(&env_or_default("SERVICE_LOGIN_METHOD", "no_auth"))?;
    let mut config = Self::new(login_method);

    config.user_name = env_optional("SERVICE_USER_NAME");
    config.password = env_optional("SERVICE_PASSWORD");

    if let Some(cert_path) = env_optional("SERVICE_CLIENT_CERT_PATH") {
      let key_path = env_required("SERVICE_CLIENT_KEY_PATH")?;
      config.client_certificate = Some(ClientCertificate::from_files(cert_path, key_path)?);
    }

    if let Some(path) = env_optional("SERVICE_CERT_PATH") {
      config.service_certificate = Some(ServiceCertificate::from_file(path)?);
    }

    Ok(config)
  }
}

/// Transport settings behind a binding name
#[derive(Debug, Clone, PartialEq)]
pub struct BindingConfig {
  pub address: String,
  /// TLS server name, when it differs from the address host
  pub domain_name: Option<String>,
  pub channel: ChannelConfig,
}

impl BindingConfig {
  pub fn new(address: impl Into<String>) -> Self {
    Self {
      address: address.into(),
      domain_name: None,
      channel: ChannelConfig::default(),
    }
  }

  pub fn with_domain_name(mut self, domain_name: impl Into<String>) -> Self {
    self.domain_name = Some(domain_name.into());
    self
  }

  pub fn with_channel_config(mut self, channel: ChannelConfig) -> Self {
    self.channel = channel;
    self
  }

  /// Load `<PREFIX>_ADDRESS` (required), `<PREFIX>_TLS_DOMAIN` and the
  /// channel settings read by [`ChannelConfig::from_env`]
  ///
  /// # Errors
  /// Returns [`ConfigError::MissingEnvVar`] without an address.
  pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
    Ok(Self {
      address: env_required(&format!("{prefix}_ADDRESS"))?,
      domain_name: env_optional(&format!("{prefix}_TLS_DOMAIN")),
      channel: ChannelConfig::from_env(prefix)?,
    })
  }
}

/// Binding name to transport settings
#[derive(Debug, Clone, Default)]
pub struct Bindings {
  entries: HashMap<String, BindingConfig>,
}

impl Bindings {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, name: impl Into<String>, binding: BindingConfig) -> Self {
    self.insert(name, binding);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, binding: BindingConfig) {
    self.entries.insert(name.into(), binding);
  }

  pub fn get(&self, name: &str) -> Option<&BindingConfig> {
    self.entries.get(name)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Load the named bindings from the environment
  ///
  /// The variable prefix is the binding name upper-cased with every
  /// non-alphanumeric character replaced by `_` (`tasks-basic` reads
  /// `TASKS_BASIC_ADDRESS`).
  ///
  /// # Errors
  /// Fails on the first binding that cannot be loaded.
  pub fn from_env<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigError> {
    let mut bindings = Self::new();
    for name in names {
      bindings.insert(name, BindingConfig::from_env(&env_prefix(name))?);
    }
    Ok(bindings)
  }
}

fn env_prefix(binding: &str) -> String {
  binding
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
    .collect()
}
