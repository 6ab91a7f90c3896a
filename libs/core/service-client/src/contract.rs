use std::fmt;

use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;

use crate::interceptors::ClientInterceptor;
use crate::login::LoginMethod;

/// Channel handed to [`ServiceContract::proxy`]
///
/// Every request sent through it carries the login credentials and the
/// headers of the active call scope.
pub type ScopedChannel = InterceptedService<Channel, ClientInterceptor>;

/// Typed error detail returned by the remote side of a contract
///
/// The remote service marks faults with an `x-fault-type` trailer. When the
/// trailer matches [`DomainFault::FAULT_TYPE`] the status details are decoded
/// with [`DomainFault::decode`].
pub trait DomainFault: fmt::Debug + Send + Sync + Sized + 'static {
  /// Value of the `x-fault-type` trailer identifying this fault
  const FAULT_TYPE: &'static str;

  /// Decode the fault from the status details, `None` if they do not parse
  fn decode(details: &[u8]) -> Option<Self>;
}

/// Decode a protobuf fault detail
///
/// Convenience for [`DomainFault::decode`] implementations on prost messages.
pub fn decode_prost<M: prost::Message + Default>(details: &[u8]) -> Option<M> {
  M::decode(details).ok()
}

/// Fault type for contracts that never return typed faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFault {}

impl DomainFault for NoFault {
  const FAULT_TYPE: &'static str = "";

  fn decode(_details: &[u8]) -> Option<Self> {
    None
  }
}

/// Hooks a concrete client supplies for its remote contract
///
/// # Example
/// ```ignore
/// use rpc::tasks::tasks_service_client::TasksServiceClient;
///
/// struct TasksContract;
///
/// impl ServiceContract for TasksContract {
///     type Proxy = TasksServiceClient<ScopedChannel>;
///     type Fault = TaskFault;
///
///     fn no_auth_binding(&self) -> &str { "tasks-insecure" }
///     fn user_name_binding(&self) -> &str { "tasks-basic" }
///     fn certificate_binding(&self) -> &str { "tasks-mtls" }
///
///     fn parse_fault(&self, fault: &TaskFault) -> String {
///         format!("{}: {}", fault.code, fault.reason)
///     }
///
///     fn proxy(&self, channel: ScopedChannel) -> Self::Proxy {
///         TasksServiceClient::new(channel)
///     }
/// }
/// ```
pub trait ServiceContract: Send + Sync + 'static {
  /// Typed client for the remote contract
  type Proxy: Clone + Send + 'static;

  /// Contract-specific fault detail
  type Fault: DomainFault;

  /// Binding used without authentication
  fn no_auth_binding(&self) -> &str;

  /// Binding used for user name / password authentication
  fn user_name_binding(&self) -> &str;

  /// Binding used for client certificate authentication
  fn certificate_binding(&self) -> &str;

  /// Binding name for a login method
  fn binding_name(&self, method: LoginMethod) -> &str {
    match method {
      LoginMethod::NoAuth => self.no_auth_binding(),
      LoginMethod::Certificate => self.certificate_binding(),
      LoginMethod::UserName => self.user_name_binding(),
    }
  }

  /// Render a domain fault for display to end users
  fn parse_fault(&self, fault: &Self::Fault) -> String;

  /// Build the typed client on top of a configured channel
  fn proxy(&self, channel: ScopedChannel) -> Self::Proxy;
}
