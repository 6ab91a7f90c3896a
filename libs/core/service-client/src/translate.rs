//! Turns call failures into messages that can be shown to end users
//!
//! Transport timeouts and unreachable endpoints get fixed messages; their raw
//! text is noise to a user. Security, aggregate and remote faults expose their
//! own messages. Anything else is left unclassified so the caller sees the
//! original failure.

use std::error::Error;

use crate::contract::ServiceContract;
use crate::failure::CallFailure;

pub const TIMEOUT_MESSAGE: &str = "request channel timed out waiting for a response";
pub const UNREACHABLE_MESSAGE: &str = "unable to connect to the remote server";

const INNER_SEPARATOR: &str = "\nInnerException: ";

/// Join the messages of a failure and its causes, outermost first
///
/// Returns `seed` when `failure` is `None`. A non-empty `seed` replaces the
/// failure's own message; each nested cause adds an `InnerException:` line.
pub fn cause_chain(failure: Option<&(dyn Error + 'static)>, seed: &str) -> String {
  let Some(failure) = failure else {
    return seed.to_string();
  };

  let mut message = if seed.is_empty() {
    failure.to_string()
  } else {
    seed.to_string()
  };

  if let Some(inner) = failure.source() {
    message.push_str(INNER_SEPARATOR);
    message.push_str(&cause_chain(Some(inner), ""));
  }

  message
}

/// Sanitized message for `failure`, `None` when it is not classified
pub fn translate<C: ServiceContract>(contract: &C, failure: &CallFailure<C::Fault>) -> Option<String> {
  let message = match failure {
    CallFailure::Timeout { .. } => TIMEOUT_MESSAGE.to_string(),
    CallFailure::Unreachable { .. } => UNREACHABLE_MESSAGE.to_string(),
    CallFailure::SecurityNegotiation { inner, .. } => {
      cause_chain(inner.as_deref().map(|e| e as &(dyn Error + 'static)), "")
    }
    CallFailure::Aggregate { .. } => cause_chain(Some(failure), ""),
    CallFailure::Warning { message, detail } => {
      format!("{message}\n{}", cause_chain(detail.inner(), detail.message()))
    }
    CallFailure::Fault { message, detail } => {
      format!("{message}\n{}", contract.parse_fault(detail))
    }
    CallFailure::Other(_) => String::new(),
  };

  (!message.is_empty()).then_some(message)
}
