use tonic::{Request, Status};

/// Compose two interceptors into a single interceptor
///
/// Interceptors are called in order: first, then second.
///
/// # Example
/// ```ignore
/// use service_client::interceptors::{CallScopeInterceptor, CredentialsInterceptor, compose_interceptors};
///
/// let composed = compose_interceptors(
///     CredentialsInterceptor::basic("operator", "s3cret")?,
///     CallScopeInterceptor::new(channel_id),
/// );
/// ```
pub fn compose_interceptors<A, B>(first: A, second: B) -> ComposedInterceptor<A, B>
where
  A: tonic::service::Interceptor,
  B: tonic::service::Interceptor,
{
  ComposedInterceptor { first, second }
}

/// A composed interceptor that applies two interceptors in sequence
#[derive(Clone, Debug)]
pub struct ComposedInterceptor<A, B> {
  first: A,
  second: B,
}

impl<A, B> tonic::service::Interceptor for ComposedInterceptor<A, B>
where
  A: tonic::service::Interceptor,
  B: tonic::service::Interceptor,
{
  fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
    let request = self.first.call(request)?;
    self.second.call(request)
  }
}
