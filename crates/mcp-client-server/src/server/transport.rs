//! Route assembly and HTTP-level policy for the listener.
//!
//! One multiplexed endpoint serves the chat service, gRPC health, and
//! reflection (`v1` and `v1alpha`). Any other path answers with a `302` to the
//! configured redirect location. The whole mux sits behind a permissive CORS
//! policy and the gRPC-web translation layer; HTTP/1.1 is accepted next to
//! cleartext HTTP/2.

use crate::server::{
    config::ServerConfig,
    model::ModelBackend,
    service::handler::ChatService,
};
use axum::{
    http::{HeaderName, HeaderValue, Method, StatusCode, header::LOCATION},
    response::IntoResponse,
};
use core::time::Duration;
use mcp_client_core::proto::{
    FILE_DESCRIPTOR_SET, mcp_client_service_server::McpClientServiceServer,
};
use tonic::{
    codec::CompressionEncoding,
    service::{Routes, RoutesBuilder},
};
use tonic_health::pb::health_server::{Health, HealthServer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Response headers readable by browser clients. `content-type` is already
/// on the CORS safelist.
pub const EXPOSED_HEADERS: [&str; 11] = [
    "accept",
    "accept-encoding",
    "accept-post",
    "connect-accept-encoding",
    "connect-content-encoding",
    "content-encoding",
    "grpc-accept-encoding",
    "grpc-encoding",
    "grpc-message",
    "grpc-status",
    "grpc-status-details-bin",
];

/// Browsers may cache a preflight answer this long. Chrome caps it at 2h.
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(2 * 60 * 60);

/// Every origin is allowed; the request's `Origin` is echoed back.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::HEAD,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static))
        .max_age(PREFLIGHT_MAX_AGE)
}

pub fn build_chat_service<B: ModelBackend + 'static>(
    service: ChatService<B>,
    config: &ServerConfig,
) -> McpClientServiceServer<ChatService<B>> {
    McpClientServiceServer::new(service)
        .max_decoding_message_size(config.max_message_bytes)
        .max_encoding_message_size(config.max_message_bytes)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

/// Registers the chat service, health, and both reflection versions, then
/// installs the redirect for unmatched paths.
pub fn build_routes<B, H>(
    service: ChatService<B>,
    health: HealthServer<H>,
    config: &ServerConfig,
) -> anyhow::Result<Routes>
where
    B: ModelBackend + 'static,
    H: Health,
{
    let reflection_v1 = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;
    let reflection_v1alpha = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1alpha()?;

    let mut builder = RoutesBuilder::default();
    builder
        .add_service(health)
        .add_service(reflection_v1)
        .add_service(reflection_v1alpha)
        .add_service(build_chat_service(service, config));

    Ok(with_redirect(builder.routes(), config.redirect_location.clone()))
}

/// Answers every path not claimed by a gRPC service with `302 Found`.
pub fn with_redirect(routes: Routes, location: HeaderValue) -> Routes {
    redirect_router(routes, location).into()
}

fn redirect_router(routes: Routes, location: HeaderValue) -> axum::Router {
    routes.into_axum_router().fallback(move || {
        let location = location.clone();
        async move { (StatusCode::FOUND, [(LOCATION, location)]).into_response() }
    })
}
