//! Per-call context holding outgoing headers
//!
//! A [`CallScope`] lives in task-local storage for exactly one invocation.
//! Code running inside that invocation on the same task sees the same scope;
//! concurrent invocations on other tasks each see their own.

use std::cell::RefCell;
use std::future::Future;

use thiserror::Error;
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use uuid::Uuid;

use crate::header::OutgoingHeader;

tokio::task_local! {
  static CALL_SCOPE: CallScope;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
  #[error("no active call context")]
  NoActiveCallContext,

  #[error("invalid header name '{0}'")]
  InvalidName(String),

  #[error("invalid value for header '{0}'")]
  InvalidValue(String),
}

/// Context of a single invocation
#[derive(Debug)]
pub struct CallScope {
  id: Uuid,
  channel_id: Uuid,
  headers: RefCell<Vec<OutgoingHeader>>,
}

impl CallScope {
  /// Open a scope bound to the channel with the given id
  pub fn new(channel_id: Uuid) -> Self {
    Self {
      id: Uuid::new_v4(),
      channel_id,
      headers: RefCell::new(Vec::new()),
    }
  }

  /// Correlation id, sent as `x-request-id`
  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn channel_id(&self) -> Uuid {
    self.channel_id
  }

  pub fn headers(&self) -> Vec<OutgoingHeader> {
    self.headers.borrow().clone()
  }

  /// Run `future` with this scope as the current one
  ///
  /// The scope is released when the future completes or is dropped.
  pub async fn run<Fut: Future>(self, future: Fut) -> Fut::Output {
    CALL_SCOPE.scope(self, future).await
  }

  fn append(&self, headers: &[OutgoingHeader]) {
    self.headers.borrow_mut().extend_from_slice(headers);
  }
}

pub(crate) fn with_current<R>(f: impl FnOnce(&CallScope) -> R) -> Option<R> {
  CALL_SCOPE.try_with(f).ok()
}

/// Append headers to the current call scope, preserving order
///
/// An empty slice is accepted without a scope.
///
/// # Errors
/// - [`HeaderError::NoActiveCallContext`] outside of a call scope
/// - [`HeaderError::InvalidName`] / [`HeaderError::InvalidValue`] when a header
///   cannot be sent as ASCII metadata; nothing is appended in that case
pub fn inject_headers(headers: &[OutgoingHeader]) -> Result<(), HeaderError> {
  if headers.is_empty() {
    return Ok(());
  }

  for header in headers {
    MetadataKey::<Ascii>::from_bytes(header.name().as_bytes())
      .map_err(|_| HeaderError::InvalidName(header.name().to_string()))?;
    MetadataValue::<Ascii>::try_from(header.wire_value().as_str())
      .map_err(|_| HeaderError::InvalidValue(header.name().to_string()))?;
  }

  with_current(|scope| {
    scope.append(headers);
    tracing::trace!(
      target: "service_client",
      request_id = %scope.id,
      count = headers.len(),
      "Injected outgoing headers"
    );
  })
  .ok_or(HeaderError::NoActiveCallContext)
}

/// Headers of the current call scope, `None` outside of a call
pub fn current_headers() -> Option<Vec<OutgoingHeader>> {
  with_current(CallScope::headers)
}

/// Id of the current call scope, `None` outside of a call
pub fn current_scope_id() -> Option<Uuid> {
  with_current(CallScope::id)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_headers() -> Vec<OutgoingHeader> {
    vec![OutgoingHeader::new("ns1", "a", 1), OutgoingHeader::new("ns2", "b", 2)]
  }

  #[tokio::test]
  async fn test_headers_keep_order() {
    let scope = CallScope::new(Uuid::new_v4());
    let headers = scope
      .run(async {
        inject_headers(&sample_headers()).unwrap();
        inject_headers(&[OutgoingHeader::new("ns3", "c", "three")]).unwrap();
        current_headers().unwrap()
      })
      .await;

    let names: Vec<_> = headers.iter().map(|h| (h.namespace(), h.name())).collect();
    assert_eq!(names, vec![("ns1", "a"), ("ns2", "b"), ("ns3", "c")]);
    assert_eq!(headers[0].value(), &serde_json::json!(1));
  }

  #[tokio::test]
  async fn test_no_active_scope() {
    assert_eq!(
      inject_headers(&sample_headers()),
      Err(HeaderError::NoActiveCallContext)
    );
    assert!(inject_headers(&[]).is_ok());
    assert!(current_headers().is_none());
    assert!(current_scope_id().is_none());
  }

  #[tokio::test]
  async fn test_invalid_header_rejected() {
    let scope = CallScope::new(Uuid::new_v4());
    let (result, headers) = scope
      .run(async {
        let result = inject_headers(&[
          OutgoingHeader::new("ns", "ok", 1),
          OutgoingHeader::new("ns", "bad name", 2),
        ]);
        (result, current_headers().unwrap())
      })
      .await;

    assert_eq!(result, Err(HeaderError::InvalidName("bad name".into())));
    assert!(headers.is_empty());
  }

  #[tokio::test]
  async fn test_nested_code_sees_same_scope() {
    async fn nested() -> Option<Uuid> {
      current_scope_id()
    }

    let scope = CallScope::new(Uuid::new_v4());
    let id = scope.id();
    let seen = scope.run(async { nested().await }).await;
    assert_eq!(seen, Some(id));
  }

  #[tokio::test]
  async fn test_concurrent_scopes_are_isolated() {
    let first = tokio::spawn(CallScope::new(Uuid::new_v4()).run(async {
      inject_headers(&[OutgoingHeader::new("ns", "tenant", "one")]).unwrap();
      tokio::task::yield_now().await;
      current_headers().unwrap()
    }));
    let second = tokio::spawn(CallScope::new(Uuid::new_v4()).run(async {
      inject_headers(&[OutgoingHeader::new("ns", "tenant", "two")]).unwrap();
      tokio::task::yield_now().await;
      current_headers().unwrap()
    }));

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].wire_value(), "one");
    assert_eq!(second[0].wire_value(), "two");
  }
}
