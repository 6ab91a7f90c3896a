use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Request, Status};

/// Interceptor attaching the login credentials to every request
///
/// User name logins send an HTTP Basic `authorization` header. Certificate
/// and anonymous logins authenticate at the TLS layer (or not at all), so the
/// interceptor passes requests through untouched.
///
/// # Example
/// ```ignore
/// use service_client::interceptors::CredentialsInterceptor;
///
/// let auth = CredentialsInterceptor::basic("operator", "s3cret");
/// let client = TasksServiceClient::with_interceptor(channel, auth);
/// ```
#[derive(Clone)]
pub struct CredentialsInterceptor {
    header_value: Option<MetadataValue<Ascii>>,
}

impl CredentialsInterceptor {
    /// Pass-through interceptor for logins without per-request credentials
    pub fn none() -> Self {
        Self { header_value: None }
    }

    /// HTTP Basic credentials
    ///
    /// # Errors
    /// Fails when the encoded value cannot be used as a header, which only
    /// happens for values containing control characters after encoding.
    pub fn basic(user_name: &str, password: &str) -> Result<Self, Status> {
        let token = STANDARD.encode(format!("{user_name}:{password}"));
        let mut value: MetadataValue<Ascii> = format!("Basic {token}")
            .parse()
            .map_err(|_| Status::internal("Invalid auth header"))?;
        value.set_sensitive(true);
        Ok(Self {
            header_value: Some(value),
        })
    }
}

impl std::fmt::Debug for CredentialsInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsInterceptor")
            .field("basic", &self.header_value.is_some())
            .finish()
    }
}

impl tonic::service::Interceptor for CredentialsInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(value) = &self.header_value {
            request.metadata_mut().insert("authorization", value.clone());
        }
        Ok(request)
    }
}
