use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::{Request, Status};
use uuid::Uuid;

use crate::scope::with_current;

/// Interceptor copying the current call scope into request metadata
///
/// Only scopes bound to this interceptor's channel are applied, so a proxy
/// belonging to another channel never picks up this call's headers. Each
/// request also gets `x-request-id` set to the scope id for correlation.
#[derive(Clone, Debug)]
pub struct CallScopeInterceptor {
    channel_id: Uuid,
}

impl CallScopeInterceptor {
    pub fn new(channel_id: Uuid) -> Self {
        Self { channel_id }
    }
}

impl tonic::service::Interceptor for CallScopeInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let scope = with_current(|scope| {
            (scope.channel_id() == self.channel_id).then(|| (scope.id(), scope.headers()))
        })
        .flatten();

        let Some((request_id, headers)) = scope else {
            return Ok(request);
        };

        let metadata = request.metadata_mut();
        for header in &headers {
            let key = MetadataKey::<Ascii>::from_bytes(header.name().as_bytes())
                .map_err(|_| Status::invalid_argument(format!("Invalid header name '{}'", header.name())))?;
            let value = MetadataValue::<Ascii>::try_from(header.wire_value().as_str())
                .map_err(|_| Status::invalid_argument(format!("Invalid value for header '{}'", header.name())))?;
            metadata.append(key, value);
        }

        metadata.insert(
            "x-request-id",
            request_id
                .to_string()
                .parse()
                .map_err(|_| Status::internal("Failed to create request ID"))?,
        );

        tracing::debug!(
            target: "service_client",
            request_id = %request_id,
            headers = headers.len(),
            "Outgoing request"
        );

        Ok(request)
    }
}
