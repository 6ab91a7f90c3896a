use thiserror::Error;

use crate::channel::CloseError;
use crate::contract::DomainFault;
use crate::failure::CallFailure;
use crate::login::LoginMethod;

pub type ServiceResult<T, F> = Result<T, ServiceError<F>>;

/// Login method value outside the known set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("login method out of range: {0}")]
pub struct LoginMethodOutOfRange(pub String);

/// Errors raised while validating configuration, before any channel exists
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Environment variable '{0}' is required but not set")]
  MissingEnvVar(String),

  #[error("Failed to parse environment variable '{key}': {details}")]
  ParseError { key: String, details: String },

  #[error("binding for {} not specified", .0.binding_label())]
  MissingBinding(LoginMethod),

  #[error("client certificate not specified")]
  MissingCertificate,

  #[error("user name / password not specified")]
  MissingCredentials,

  #[error("credentials cannot be sent: {0}")]
  InvalidCredentials(String),

  #[error("binding '{0}' is not defined")]
  UnknownBinding(String),

  #[error("invalid address for binding '{binding}': {details}")]
  InvalidEndpoint { binding: String, details: String },

  #[error("TLS setup failed for binding '{binding}': {details}")]
  Tls { binding: String, details: String },

  #[error("failed to read certificate '{path}': {details}")]
  Certificate { path: String, details: String },

  #[error(transparent)]
  InvalidLoginMethod(#[from] LoginMethodOutOfRange),
}

/// Errors returned from [`ServiceClient`](crate::ServiceClient) calls
///
/// `UserFacing` carries a sanitized message that is safe to show to end users.
/// `Failed` carries the original failure untouched when it could not be
/// classified, so upstream logs keep the full detail.
#[derive(Error, Debug)]
pub enum ServiceError<F: DomainFault> {
  /// Missing or invalid credentials/binding; no network attempt was made
  #[error("Configuration error: {0}")]
  Configuration(ConfigError),

  #[error("Invalid state: {0}")]
  InvalidState(String),

  #[error("{0}")]
  UserFacing(String),

  #[error(transparent)]
  Failed(CallFailure<F>),

  /// Graceful close failed with something other than a transport error
  #[error("Channel close failed: {0}")]
  Close(CloseError),
}

/// An out-of-range login method is an invalid state wherever it was read from
impl<F: DomainFault> From<ConfigError> for ServiceError<F> {
  fn from(err: ConfigError) -> Self {
    match err {
      ConfigError::InvalidLoginMethod(out_of_range) => out_of_range.into(),
      other => ServiceError::Configuration(other),
    }
  }
}

impl<F: DomainFault> From<LoginMethodOutOfRange> for ServiceError<F> {
  fn from(err: LoginMethodOutOfRange) -> Self {
    ServiceError::InvalidState(err.to_string())
  }
}

impl<F: DomainFault> ServiceError<F> {
  /// Message to display to end users, if this error has one
  pub fn user_message(&self) -> Option<&str> {
    match self {
      ServiceError::UserFacing(message) => Some(message),
      _ => None,
    }
  }

  /// The unclassified original failure, if that is what this error carries
  pub fn failure(&self) -> Option<&CallFailure<F>> {
    match self {
      ServiceError::Failed(failure) => Some(failure),
      _ => None,
    }
  }
}

// Implement conversion to tonic::Status for services that forward errors
impl<F: DomainFault> From<ServiceError<F>> for tonic::Status {
  fn from(err: ServiceError<F>) -> Self {
    match err {
      ServiceError::Configuration(_) | ServiceError::InvalidState(_) => {
        tonic::Status::failed_precondition(err.to_string())
      }
      ServiceError::UserFacing(message) => tonic::Status::unknown(message),
      ServiceError::Failed(failure) => failure.into_status(),
      ServiceError::Close(_) => tonic::Status::internal(err.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_binding_messages() {
    assert_eq!(
      ConfigError::MissingBinding(LoginMethod::NoAuth).to_string(),
      "binding for no-auth not specified"
    );
    assert_eq!(
      ConfigError::MissingBinding(LoginMethod::UserName).to_string(),
      "binding for user name authentication not specified"
    );
  }

  #[test]
  fn test_out_of_range_becomes_invalid_state() {
    let err: ServiceError<crate::contract::NoFault> = LoginMethodOutOfRange("9".into()).into();
    assert!(matches!(err, ServiceError::InvalidState(_)));
    assert_eq!(err.to_string(), "Invalid state: login method out of range: 9");
  }

  #[test]
  fn test_env_login_method_becomes_invalid_state() {
    fn load() -> ServiceResult<crate::config::ClientConfig, crate::contract::NoFault> {
      use crate::config::FromEnv;
      Ok(crate::config::ClientConfig::from_env()?)
    }

    temp_env::with_var("SERVICE_LOGIN_METHOD", Some("7"), || {
      let err = load().unwrap_err();
      assert!(matches!(err, ServiceError::InvalidState(_)));
      assert_eq!(err.to_string(), "Invalid state: login method out of range: 7");
    });

    let err: ServiceError<crate::contract::NoFault> = ConfigError::MissingCertificate.into();
    assert!(matches!(err, ServiceError::Configuration(ConfigError::MissingCertificate)));
  }

  #[test]
  fn test_status_conversion() {
    let err: ServiceError<crate::contract::NoFault> = ServiceError::UserFacing("try later".into());
    assert_eq!(err.user_message(), Some("try later"));
    let status: tonic::Status = err.into();
    assert_eq!(status.code(), tonic::Code::Unknown);
    assert_eq!(status.message(), "try later");

    let err: ServiceError<crate::contract::NoFault> = ConfigError::MissingCredentials.into();
    let status: tonic::Status = err.into();
    assert_eq!(status.code(), tonic::Code::FailedPrecondition);
  }
}
