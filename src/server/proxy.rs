//! Fallback route: every non-control request goes through the gateway.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::gateway::request::{is_hop_by_hop, resolve_on_origin, Destination, GatewayRequest};
use crate::gateway::{GatewayError, Served};
use crate::server::api::AppState;

/// Response header naming where a response came from.
pub const SOURCE_HEADER: &str = "x-gateway-source";

pub async fn intercept(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "fetch",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let request = match to_gateway_request(&state, request).await {
            Ok(request) => request,
            Err(response) => return response,
        };

        match state.gateway.handle(request).await {
            Ok(served) => into_response(served),
            Err(GatewayError::Network(e)) => {
                warn!(error = %e, "Network failure with no offline fallback");
                (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
            }
            Err(e) => {
                warn!(error = %e, "Gateway error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Resolve the incoming request against the upstream origin.
async fn to_gateway_request(state: &AppState, request: Request) -> Result<GatewayRequest, Response> {
    let (parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = resolve_on_origin(state.gateway.origin(), path_and_query).map_err(|e| {
        warn!(error = %e, "Rejecting request outside the origin");
        (StatusCode::BAD_REQUEST, e.to_string()).into_response()
    })?;

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let limit = state.gateway.config().server.max_body_bytes;
    let body = to_bytes(body, limit)
        .await
        .map_err(|e| (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response())?;

    let mut request = GatewayRequest::new(parts.method, url)
        .with_destination(Destination::from_headers(&headers))
        .with_body(body);
    request.headers = headers;
    Ok(request)
}

fn into_response(served: Served) -> Response {
    let mut builder = Response::builder().status(served.response.status);
    for (name, value) in &served.response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(SOURCE_HEADER, served.source.as_str());

    builder
        .body(Body::from(served.response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::ResponseSnapshot;
    use crate::gateway::ServedFrom;

    #[test]
    fn test_into_response_copies_headers_and_source() {
        let served = Served {
            response: ResponseSnapshot::ok("<h1>Offline</h1>")
                .with_header("content-type", "text/html")
                .with_header("transfer-encoding", "chunked"),
            source: ServedFrom::Fallback,
        };
        let response = into_response(served);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/html");
        assert_eq!(response.headers()[SOURCE_HEADER], "fallback");
        assert!(response.headers().get("transfer-encoding").is_none());
    }
}
