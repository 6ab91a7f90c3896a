//! # Service Client Library
//!
//! Client-side invocation layer for calling a remote gRPC contract with one
//! of three login methods: none, user name / password, or client certificate.
//!
//! Every call:
//! - validates the login configuration and picks the contract's binding for it,
//!   failing before any channel exists when something is missing
//! - opens a fresh lazily-connected channel and a task-local call scope
//! - injects the caller's outgoing headers into that scope
//! - runs the caller's logic against the typed proxy
//! - closes the channel gracefully on success, aborts it on failure
//! - turns known failures into a short user-facing message and passes
//!   anything else through untouched
//!
//! ## Quick Start
//!
//! ```ignore
//! use service_client::{
//!     BindingConfig, Bindings, CallFailure, ClientConfig, OutgoingHeader, ScopedChannel,
//!     ServiceClient, ServiceContract, ServiceError, decode_prost,
//! };
//! use rpc::tasks::tasks_service_client::TasksServiceClient;
//!
//! let bindings = Bindings::new()
//!     .with("tasks-insecure", BindingConfig::new("http://[::1]:50051"))
//!     .with("tasks-basic", BindingConfig::new("https://tasks.internal"));
//!
//! let client = ServiceClient::new(TasksContract, ClientConfig::basic("operator", "s3cret"), bindings);
//!
//! match client
//!     .call(
//!         |mut tasks| async move { Ok(tasks.list_tasks(request).await?.into_inner()) },
//!         &[OutgoingHeader::new("urn:tenant", "tenant-id", 42)],
//!     )
//!     .await
//! {
//!     Ok(tasks) => render(tasks),
//!     Err(ServiceError::UserFacing(message)) => show_warning(message),
//!     Err(other) => return Err(other.into()),
//! }
//! ```
//!
//! ## Failure classification
//!
//! Failures from the caller's logic are [`CallFailure`]s; `tonic::Status`
//! converts into one with `?`. Timeouts and unreachable endpoints get fixed
//! messages, security failures, aggregates and remote faults get messages
//! built from their cause chain, and everything else is returned unchanged as
//! [`ServiceError::Failed`].

pub mod channel;
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod factory;
pub mod failure;
pub mod header;
pub mod interceptors;
pub mod login;
pub mod scope;
pub mod translate;

// Re-export main types and functions for convenience
pub use channel::{ChannelConfig, ChannelResource, ChannelState, CloseError, Connection, TonicConnection};
pub use client::ServiceClient;
pub use config::{BindingConfig, Bindings, ClientCertificate, ClientConfig, FromEnv, ServiceCertificate};
pub use contract::{DomainFault, NoFault, ScopedChannel, ServiceContract, decode_prost};
pub use error::{ConfigError, LoginMethodOutOfRange, ServiceError, ServiceResult};
pub use factory::{ChannelFactory, ChannelRequest, Credentials, TonicChannelFactory, select_binding};
pub use failure::{BoxError, CallFailure, FAULT_TYPE_KEY, FailureDetail, FailureKind, WARNING_FAULT_TYPE};
pub use header::OutgoingHeader;
pub use login::LoginMethod;
pub use scope::{CallScope, HeaderError, current_headers, current_scope_id, inject_headers};
pub use translate::{TIMEOUT_MESSAGE, UNREACHABLE_MESSAGE, cause_chain, translate};
