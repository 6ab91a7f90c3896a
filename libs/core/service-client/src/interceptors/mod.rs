/// Re-export tonic's Interceptor trait for convenience
pub use tonic::service::Interceptor;

pub mod auth;
pub mod compose;
pub mod scope;

pub use auth::CredentialsInterceptor;
pub use compose::{ComposedInterceptor, compose_interceptors};
pub use scope::CallScopeInterceptor;

/// Interceptor stack installed on every channel the factory opens
pub type ClientInterceptor = ComposedInterceptor<CredentialsInterceptor, CallScopeInterceptor>;
