//! Client factory: login validation and channel construction

use std::fmt;

use tonic::service::interceptor::InterceptedService;
use tonic::transport::Endpoint;
use uuid::Uuid;

use crate::channel::{ChannelResource, TonicConnection};
use crate::config::{BindingConfig, Bindings, ClientCertificate, ClientConfig, ServiceCertificate};
use crate::contract::ServiceContract;
use crate::error::ConfigError;
use crate::interceptors::{CallScopeInterceptor, CredentialsInterceptor, compose_interceptors};
use crate::login::LoginMethod;

/// Credentials bound into a channel
#[derive(Clone)]
pub enum Credentials {
  None,
  Basic { user_name: String, password: String },
  Certificate(ClientCertificate),
}

impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Credentials::None => f.write_str("None"),
      Credentials::Basic { user_name, .. } => f
        .debug_struct("Basic")
        .field("user_name", user_name)
        .finish_non_exhaustive(),
      Credentials::Certificate(certificate) => f.debug_tuple("Certificate").field(certificate).finish(),
    }
  }
}

/// A validated request for one channel
#[derive(Debug, Clone)]
pub struct ChannelRequest {
  pub login_method: LoginMethod,
  pub binding: String,
  pub credentials: Credentials,
  /// Identity the remote endpoint must present
  pub service_certificate: Option<ServiceCertificate>,
}

/// Check that `config` carries everything its login method needs and pick
/// the contract's binding for it
///
/// Nothing is allocated on the network side; this runs before any channel
/// exists.
///
/// # Errors
/// - [`ConfigError::MissingCertificate`] for certificate logins without a
///   client certificate
/// - [`ConfigError::MissingCredentials`] for user name logins with an empty
///   user name or password
/// - [`ConfigError::MissingBinding`] when the contract has no binding for the
///   login method
pub fn select_binding<C: ServiceContract>(
  config: &ClientConfig,
  contract: &C,
) -> Result<ChannelRequest, ConfigError> {
  let login_method = config.login_method();

  let credentials = match login_method {
    LoginMethod::NoAuth => Credentials::None,
    LoginMethod::Certificate => {
      let certificate = config.client_certificate().ok_or(ConfigError::MissingCertificate)?;
      Credentials::Certificate(certificate.clone())
    }
    LoginMethod::UserName => match (config.user_name(), config.password()) {
      (Some(user_name), Some(password)) if !user_name.is_empty() && !password.is_empty() => {
        Credentials::Basic {
          user_name: user_name.to_string(),
          password: password.to_string(),
        }
      }
      _ => return Err(ConfigError::MissingCredentials),
    },
  };

  let binding = contract.binding_name(login_method);
  if binding.is_empty() {
    return Err(ConfigError::MissingBinding(login_method));
  }

  // No-auth channels never pin the service identity
  let service_certificate = match login_method {
    LoginMethod::NoAuth => None,
    LoginMethod::Certificate | LoginMethod::UserName => config.service_certificate().cloned(),
  };

  Ok(ChannelRequest {
    login_method,
    binding: binding.to_string(),
    credentials,
    service_certificate,
  })
}

/// Builds the channel for a validated request
pub trait ChannelFactory<C: ServiceContract>: Send + Sync {
  /// # Errors
  /// Returns a [`ConfigError`] when the binding cannot be turned into a
  /// channel. No network I/O happens here.
  fn create_channel(
    &self,
    contract: &C,
    request: &ChannelRequest,
  ) -> Result<ChannelResource<C::Proxy>, ConfigError>;
}

/// [`ChannelFactory`] opening lazily-connected tonic channels
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TonicChannelFactory {
  bindings: Bindings,
}

impl TonicChannelFactory {
  pub fn new(bindings: Bindings) -> Self {
    Self { bindings }
  }

  pub fn bindings(&self) -> &Bindings {
    &self.bindings
  }
}

impl<C: ServiceContract> ChannelFactory<C> for TonicChannelFactory {
  fn create_channel(
    &self,
    contract: &C,
    request: &ChannelRequest,
  ) -> Result<ChannelResource<C::Proxy>, ConfigError> {
    let binding = self
      .bindings
      .get(&request.binding)
      .ok_or_else(|| ConfigError::UnknownBinding(request.binding.clone()))?;

    let endpoint = Endpoint::from_shared(binding.address.clone()).map_err(|e| {
      tracing::error!(
        target: "service_client",
        binding = %request.binding,
        addr = %binding.address,
        error = ?e,
        "Invalid URI"
      );
      ConfigError::InvalidEndpoint {
        binding: request.binding.clone(),
        details: e.to_string(),
      }
    })?;
    let endpoint = binding.channel.apply_to_endpoint(endpoint);
    let endpoint = apply_tls(endpoint, request, binding)?;

    let credentials = match &request.credentials {
      Credentials::Basic { user_name, password } => CredentialsInterceptor::basic(user_name, password)
        .map_err(|status| ConfigError::InvalidCredentials(status.message().to_string()))?,
      Credentials::None | Credentials::Certificate(_) => CredentialsInterceptor::none(),
    };

    let channel_id = Uuid::new_v4();
    let channel = endpoint.connect_lazy();
    let interceptor = compose_interceptors(credentials, CallScopeInterceptor::new(channel_id));
    let proxy = contract.proxy(InterceptedService::new(channel.clone(), interceptor));

    tracing::debug!(
      target: "service_client",
      binding = %request.binding,
      login_method = %request.login_method,
      channel_id = %channel_id,
      addr = %binding.address,
      "Created lazy channel (connects on first request)"
    );

    Ok(ChannelResource::with_id(
      channel_id,
      request.binding.clone(),
      proxy,
      TonicConnection::new(channel),
    ))
  }
}

#[cfg(feature = "tls")]
fn apply_tls(
  endpoint: Endpoint,
  request: &ChannelRequest,
  binding: &BindingConfig,
) -> Result<Endpoint, ConfigError> {
  use tonic::transport::{Certificate, ClientTlsConfig, Identity};

  let identity = match &request.credentials {
    Credentials::Certificate(certificate) => Some(Identity::from_pem(
      certificate.certificate_pem(),
      certificate.private_key_pem(),
    )),
    Credentials::None | Credentials::Basic { .. } => None,
  };

  if identity.is_none() && request.service_certificate.is_none() {
    return Ok(endpoint);
  }

  let mut tls = ClientTlsConfig::new();
  if let Some(identity) = identity {
    tls = tls.identity(identity);
  }
  if let Some(service) = &request.service_certificate {
    tls = tls.ca_certificate(Certificate::from_pem(service.pem()));
  }
  if let Some(domain) = &binding.domain_name {
    tls = tls.domain_name(domain.clone());
  }

  endpoint.tls_config(tls).map_err(|e| ConfigError::Tls {
    binding: request.binding.clone(),
    details: e.to_string(),
  })
}

#[cfg(not(feature = "tls"))]
fn apply_tls(
  endpoint: Endpoint,
  request: &ChannelRequest,
  _binding: &BindingConfig,
) -> Result<Endpoint, ConfigError> {
  let needs_tls = matches!(request.credentials, Credentials::Certificate(_))
    || request.service_certificate.is_some();
  if needs_tls {
    return Err(ConfigError::Tls {
      binding: request.binding.clone(),
      details: "built without the `tls` feature".to_string(),
    });
  }
  Ok(endpoint)
}
