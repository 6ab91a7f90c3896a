//! Failures raised while a call is in flight
//!
//! [`CallFailure`] is the closed set of failure shapes the translator knows
//! how to classify. Transport errors are sorted into it at the boundary where
//! they are raised (see the `From` impls), so caller logic can use `?` on
//! `tonic::Status` and friends directly.

use std::error::Error;
use std::fmt;

use strum::Display;
use thiserror::Error;
use tonic::{Code, Status};

use crate::contract::DomainFault;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Trailer carrying the fault type of a remote fault
pub const FAULT_TYPE_KEY: &str = "x-fault-type";

/// Fault type value marking a generic warning fault
pub const WARNING_FAULT_TYPE: &str = "warning";

/// Message of the status tonic returns when a channel's request timeout fires
const TRANSPORT_TIMEOUT_MESSAGE: &str = "Timeout expired";

/// Classification of a [`CallFailure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
  Timeout,
  Unreachable,
  SecurityNegotiation,
  Aggregate,
  DomainWarning,
  DomainError,
  Unknown,
}

/// A message with an optional inner cause
///
/// Used for warning fault details and for building cause chains by hand.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct FailureDetail {
  message: String,
  #[source]
  inner: Option<BoxError>,
}

impl FailureDetail {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      inner: None,
    }
  }

  pub fn with_inner(mut self, inner: impl Into<BoxError>) -> Self {
    self.inner = Some(inner.into());
    self
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn inner(&self) -> Option<&(dyn Error + 'static)> {
    self.inner.as_deref().map(|e| e as &(dyn Error + 'static))
  }
}

/// Failure raised by the caller's logic or the transport during a call
#[derive(Debug)]
pub enum CallFailure<F: DomainFault> {
  /// The transport gave up waiting for a response
  Timeout {
    message: String,
    source: Option<BoxError>,
  },
  /// The endpoint could not be reached
  Unreachable {
    message: String,
    source: Option<BoxError>,
  },
  /// Message security (authentication) failed
  SecurityNegotiation {
    message: String,
    inner: Option<BoxError>,
  },
  /// Several failures at once; the first cause is the primary one
  Aggregate {
    message: String,
    causes: Vec<BoxError>,
  },
  /// Remote fault carrying a generic warning detail
  Warning {
    message: String,
    detail: FailureDetail,
  },
  /// Remote fault carrying the contract's typed detail
  Fault { message: String, detail: F },
  /// Anything else, kept as raised
  Other(BoxError),
}

impl<F: DomainFault> CallFailure<F> {
  pub fn timeout(message: impl Into<String>) -> Self {
    CallFailure::Timeout {
      message: message.into(),
      source: None,
    }
  }

  pub fn unreachable(message: impl Into<String>) -> Self {
    CallFailure::Unreachable {
      message: message.into(),
      source: None,
    }
  }

  pub fn security(message: impl Into<String>, inner: Option<BoxError>) -> Self {
    CallFailure::SecurityNegotiation {
      message: message.into(),
      inner,
    }
  }

  pub fn aggregate(message: impl Into<String>, causes: Vec<BoxError>) -> Self {
    CallFailure::Aggregate {
      message: message.into(),
      causes,
    }
  }

  pub fn warning(message: impl Into<String>, detail: FailureDetail) -> Self {
    CallFailure::Warning {
      message: message.into(),
      detail,
    }
  }

  pub fn fault(message: impl Into<String>, detail: F) -> Self {
    CallFailure::Fault {
      message: message.into(),
      detail,
    }
  }

  pub fn other(error: impl Into<BoxError>) -> Self {
    CallFailure::Other(error.into())
  }

  pub fn kind(&self) -> FailureKind {
    match self {
      CallFailure::Timeout { .. } => FailureKind::Timeout,
      CallFailure::Unreachable { .. } => FailureKind::Unreachable,
      CallFailure::SecurityNegotiation { .. } => FailureKind::SecurityNegotiation,
      CallFailure::Aggregate { .. } => FailureKind::Aggregate,
      CallFailure::Warning { .. } => FailureKind::DomainWarning,
      CallFailure::Fault { .. } => FailureKind::DomainError,
      CallFailure::Other(_) => FailureKind::Unknown,
    }
  }

  /// Borrow the original error of an `Other` failure as a concrete type
  pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
    match self {
      CallFailure::Other(error) => error.downcast_ref::<E>(),
      _ => None,
    }
  }

  /// Convert into a gRPC status for services that forward failures
  pub fn into_status(self) -> Status {
    match self {
      CallFailure::Timeout { message, .. } => Status::deadline_exceeded(message),
      CallFailure::Unreachable { message, .. } => Status::unavailable(message),
      CallFailure::SecurityNegotiation { message, .. } => Status::unauthenticated(message),
      CallFailure::Aggregate { message, .. } => Status::internal(message),
      CallFailure::Warning { message, .. } | CallFailure::Fault { message, .. } => {
        Status::unknown(message)
      }
      CallFailure::Other(error) => match error.downcast::<Status>() {
        Ok(status) => *status,
        Err(error) => Status::internal(error.to_string()),
      },
    }
  }
}

impl<F: DomainFault> fmt::Display for CallFailure<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CallFailure::Timeout { message, .. }
      | CallFailure::Unreachable { message, .. }
      | CallFailure::SecurityNegotiation { message, .. }
      | CallFailure::Aggregate { message, .. }
      | CallFailure::Warning { message, .. }
      | CallFailure::Fault { message, .. } => f.write_str(message),
      CallFailure::Other(error) => fmt::Display::fmt(error, f),
    }
  }
}

impl<F: DomainFault> Error for CallFailure<F> {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      CallFailure::Timeout { source, .. } | CallFailure::Unreachable { source, .. } => {
        source.as_deref().map(|e| e as &(dyn Error + 'static))
      }
      CallFailure::SecurityNegotiation { inner, .. } => {
        inner.as_deref().map(|e| e as &(dyn Error + 'static))
      }
      CallFailure::Aggregate { causes, .. } => {
        causes.first().map(|e| e.as_ref() as &(dyn Error + 'static))
      }
      CallFailure::Warning { detail, .. } => Some(detail),
      CallFailure::Fault { .. } => None,
      CallFailure::Other(error) => error.source(),
    }
  }
}

impl<F: DomainFault> From<Status> for CallFailure<F> {
  fn from(status: Status) -> Self {
    let fault_type = status
      .metadata()
      .get(FAULT_TYPE_KEY)
      .and_then(|value| value.to_str().ok())
      .map(str::to_owned);

    match fault_type.as_deref() {
      Some(WARNING_FAULT_TYPE) => {
        let detail = FailureDetail::new(String::from_utf8_lossy(status.details()));
        return CallFailure::warning(status.message(), detail);
      }
      Some(fault_type) if !F::FAULT_TYPE.is_empty() && fault_type == F::FAULT_TYPE => {
        if let Some(detail) = F::decode(status.details()) {
          return CallFailure::fault(status.message(), detail);
        }
        tracing::debug!(
          target: "service_client",
          fault_type,
          "Fault details did not decode, keeping raw status"
        );
        return CallFailure::Other(Box::new(status));
      }
      _ => {}
    }

    // Channel request timeouts surface as `Cancelled` with a transport source
    let timed_out = (status.code() == Code::Cancelled && status.message() == TRANSPORT_TIMEOUT_MESSAGE)
      || Error::source(&status).is_some_and(is_timeout);

    match status.code() {
      Code::DeadlineExceeded => CallFailure::Timeout {
        message: status.message().to_string(),
        source: Some(Box::new(status)),
      },
      Code::Unavailable => CallFailure::Unreachable {
        message: status.message().to_string(),
        source: Some(Box::new(status)),
      },
      _ if timed_out => CallFailure::Timeout {
        message: status.message().to_string(),
        source: Some(Box::new(status)),
      },
      Code::Unauthenticated => {
        let inner: Option<BoxError> = if status.message().is_empty() {
          None
        } else {
          Some(Box::new(FailureDetail::new(status.message())))
        };
        CallFailure::security("security negotiation failed", inner)
      }
      _ => CallFailure::Other(Box::new(status)),
    }
  }
}

impl<F: DomainFault> From<tonic::transport::Error> for CallFailure<F> {
  fn from(err: tonic::transport::Error) -> Self {
    if is_timeout(&err) {
      return CallFailure::Timeout {
        message: err.to_string(),
        source: Some(Box::new(err)),
      };
    }
    CallFailure::Unreachable {
      message: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

/// Whether `err` or one of its causes is a timeout
fn is_timeout(err: &(dyn Error + 'static)) -> bool {
  let mut current = Some(err);
  while let Some(err) = current {
    let io_timeout = err
      .downcast_ref::<std::io::Error>()
      .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut);
    if io_timeout || err.is::<tonic::TimeoutExpired>() || err.is::<tokio::time::error::Elapsed>() {
      return true;
    }
    current = err.source();
  }
  false
}

impl<F: DomainFault> From<tokio::time::error::Elapsed> for CallFailure<F> {
  fn from(err: tokio::time::error::Elapsed) -> Self {
    CallFailure::Timeout {
      message: err.to_string(),
      source: Some(Box::new(err)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::contract::NoFault;
  use tonic::metadata::MetadataMap;

  #[derive(Debug, PartialEq)]
  struct LimitFault(String);

  impl DomainFault for LimitFault {
    const FAULT_TYPE: &'static str = "limit-exceeded";

    fn decode(details: &[u8]) -> Option<Self> {
      std::str::from_utf8(details).ok().map(|s| LimitFault(s.to_string()))
    }
  }

  fn status_with_fault(code: Code, message: &str, fault_type: &str, details: &'static [u8]) -> Status {
    let mut metadata = MetadataMap::new();
    metadata.insert(FAULT_TYPE_KEY, fault_type.parse().unwrap());
    Status::with_details_and_metadata(code, message, details.into(), metadata)
  }

  #[test]
  fn test_status_codes_classification() {
    let failure: CallFailure<NoFault> = Status::deadline_exceeded("slow").into();
    assert_eq!(failure.kind(), FailureKind::Timeout);

    let failure: CallFailure<NoFault> = Status::unavailable("down").into();
    assert_eq!(failure.kind(), FailureKind::Unreachable);

    let failure: CallFailure<NoFault> = Status::unauthenticated("bad token").into();
    assert_eq!(failure.kind(), FailureKind::SecurityNegotiation);
    assert_eq!(failure.source().unwrap().to_string(), "bad token");

    let failure: CallFailure<NoFault> = Status::not_found("missing").into();
    assert_eq!(failure.kind(), FailureKind::Unknown);
    assert!(failure.downcast_ref::<Status>().is_some());
  }

  #[test]
  fn test_channel_request_timeout_is_timeout() {
    let failure: CallFailure<NoFault> = Status::cancelled("Timeout expired").into();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    let original = failure.source().unwrap().downcast_ref::<Status>().unwrap();
    assert_eq!(original.code(), Code::Cancelled);

    let failure: CallFailure<NoFault> = Status::cancelled("client went away").into();
    assert_eq!(failure.kind(), FailureKind::Unknown);
  }

  #[test]
  fn test_transport_timeout_source() {
    let mut status = Status::cancelled("Timeout expired");
    status.set_source(std::sync::Arc::new(tonic::TimeoutExpired(())));
    let failure: CallFailure<NoFault> = status.into();
    assert_eq!(failure.kind(), FailureKind::Timeout);
  }

  #[test]
  fn test_timeout_in_status_source_chain() {
    let mut status = Status::unknown("transport error");
    let cause = FailureDetail::new("transport error")
      .with_inner(std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"));
    status.set_source(std::sync::Arc::new(cause));

    let failure: CallFailure<NoFault> = status.into();
    assert_eq!(failure.kind(), FailureKind::Timeout);
    assert_eq!(failure.to_string(), "transport error");
  }

  #[test]
  fn test_warning_fault_from_trailer() {
    let status = status_with_fault(Code::FailedPrecondition, "rejected", "warning", b"quota low");
    let failure: CallFailure<NoFault> = status.into();
    match failure {
      CallFailure::Warning { message, detail } => {
        assert_eq!(message, "rejected");
        assert_eq!(detail.message(), "quota low");
      }
      other => panic!("unexpected failure: {other:?}"),
    }
  }

  #[test]
  fn test_domain_fault_decoded() {
    let status = status_with_fault(Code::Aborted, "limit", "limit-exceeded", b"10 per minute");
    let failure: CallFailure<LimitFault> = status.into();
    assert_eq!(failure.kind(), FailureKind::DomainError);
    match failure {
      CallFailure::Fault { detail, .. } => assert_eq!(detail, LimitFault("10 per minute".into())),
      other => panic!("unexpected failure: {other:?}"),
    }
  }

  #[test]
  fn test_unknown_fault_type_stays_unclassified() {
    let status = status_with_fault(Code::Aborted, "limit", "something-else", b"");
    let failure: CallFailure<LimitFault> = status.into();
    assert_eq!(failure.kind(), FailureKind::Unknown);
  }

  #[test]
  fn test_aggregate_source_is_first_cause() {
    let failure: CallFailure<NoFault> = CallFailure::aggregate(
      "two failures",
      vec![Box::new(FailureDetail::new("first")), Box::new(FailureDetail::new("second"))],
    );
    assert_eq!(failure.to_string(), "two failures");
    assert_eq!(failure.source().unwrap().to_string(), "first");
  }

  #[test]
  fn test_into_status_keeps_original_status() {
    let failure: CallFailure<NoFault> = Status::permission_denied("nope").into();
    let status = failure.into_status();
    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(status.message(), "nope");
  }
}
