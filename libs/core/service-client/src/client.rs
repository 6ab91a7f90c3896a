use std::future::Future;

use crate::config::{Bindings, ClientConfig};
use crate::contract::ServiceContract;
use crate::error::{ServiceError, ServiceResult};
use crate::factory::{ChannelFactory, TonicChannelFactory, select_binding};
use crate::failure::CallFailure;
use crate::header::OutgoingHeader;
use crate::scope::{CallScope, inject_headers};
use crate::translate::translate;

/// Invocation orchestrator for one remote contract
///
/// Every call opens its own channel and call scope, and releases both before
/// returning. Nothing is shared between concurrent calls apart from the
/// read-only configuration. There are no retries: each call is one attempt.
///
/// # Example
/// ```ignore
/// use service_client::{Bindings, BindingConfig, ClientConfig, OutgoingHeader, ServiceClient};
///
/// let bindings = Bindings::new().with("tasks-basic", BindingConfig::new("https://tasks.internal"));
/// let client = ServiceClient::new(TasksContract, ClientConfig::basic("operator", "s3cret"), bindings);
///
/// let headers = [OutgoingHeader::new("urn:tenant", "tenant-id", 42)];
/// let task = client
///     .call(|mut tasks| async move { Ok(tasks.get_task(request).await?.into_inner()) }, &headers)
///     .await?;
/// ```
#[derive(Debug)]
pub struct ServiceClient<C: ServiceContract, B: ChannelFactory<C> = TonicChannelFactory> {
  contract: C,
  config: ClientConfig,
  factory: B,
}

impl<C: ServiceContract> ServiceClient<C, TonicChannelFactory> {
  pub fn new(contract: C, config: ClientConfig, bindings: Bindings) -> Self {
    Self::with_factory(contract, config, TonicChannelFactory::new(bindings))
  }
}

impl<C: ServiceContract, B: ChannelFactory<C>> ServiceClient<C, B> {
  pub fn with_factory(contract: C, config: ClientConfig, factory: B) -> Self {
    Self {
      contract,
      config,
      factory,
    }
  }

  pub fn contract(&self) -> &C {
    &self.contract
  }

  pub fn config(&self) -> &ClientConfig {
    &self.config
  }

  /// Call the remote contract and return the invocation's value
  ///
  /// `headers` are added to the call scope, in order, before `invocation`
  /// runs against a fresh proxy. On success the channel is closed gracefully.
  /// On failure it is aborted and the failure is translated.
  ///
  /// # Errors
  /// - [`ServiceError::Configuration`] when credentials or the binding are
  ///   missing; `invocation` is not run and no channel is created
  /// - [`ServiceError::UserFacing`] with a sanitized message for classified
  ///   failures
  /// - [`ServiceError::Failed`] carrying the original failure otherwise
  /// - [`ServiceError::Close`] when a successful call's channel fails to close
  ///   for a reason other than transport noise
  pub async fn call<T, F, Fut>(&self, invocation: F, headers: &[OutgoingHeader]) -> ServiceResult<T, C::Fault>
  where
    F: FnOnce(C::Proxy) -> Fut,
    Fut: Future<Output = Result<T, CallFailure<C::Fault>>>,
  {
    let request = select_binding(&self.config, &self.contract).inspect_err(|e| {
      tracing::warn!(
        target: "service_client",
        login_method = %self.config.login_method(),
        error = %e,
        "Client configuration rejected"
      );
    })?;
    let mut channel = self.factory.create_channel(&self.contract, &request)?;

    let scope = CallScope::new(channel.id());
    let request_id = scope.id();
    let proxy = channel
      .proxy()
      .ok_or_else(|| ServiceError::InvalidState("channel disposed before use".to_string()))?;

    let outcome = scope
      .run(async move {
        inject_headers(headers).map_err(CallFailure::other)?;
        invocation(proxy).await
      })
      .await;

    match outcome {
      Ok(value) => {
        channel.dispose().map_err(ServiceError::Close)?;
        Ok(value)
      }
      Err(failure) => {
        channel.abort();
        let kind = failure.kind();
        match translate(&self.contract, &failure) {
          Some(message) => {
            tracing::warn!(
              target: "service_client",
              binding = %request.binding,
              request_id = %request_id,
              kind = %kind,
              error = %failure,
              "Call failed"
            );
            Err(ServiceError::UserFacing(message))
          }
          None => {
            tracing::error!(
              target: "service_client",
              binding = %request.binding,
              request_id = %request_id,
              kind = %kind,
              error = ?failure,
              "Call failed with unclassified error"
            );
            Err(ServiceError::Failed(failure))
          }
        }
      }
    }
  }

  /// Call the remote contract for its side effects only
  ///
  /// # Errors
  /// Same as [`ServiceClient::call`].
  pub async fn execute<F, Fut>(&self, action: F, headers: &[OutgoingHeader]) -> ServiceResult<(), C::Fault>
  where
    F: FnOnce(C::Proxy) -> Fut,
    Fut: Future<Output = Result<(), CallFailure<C::Fault>>>,
  {
    self.call(action, headers).await
  }
}
