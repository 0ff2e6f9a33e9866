//! HTTP plumbing: permissive CORS and the OPTIONS short-circuit.

use axum::body::Body as AxumBody;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_http::cors::{Any, CorsLayer};

/// Builds the permissive CORS layer the browser client expects: any
/// origin, the four methods it uses, and the `Content-Type` header.
pub fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::PUT])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Answers any OPTIONS request with an empty 200 before routing.
///
/// The CORS layer sits outside this middleware and still decorates the
/// short-circuited response with the allow headers.
pub async fn handle_options(request: Request<AxumBody>, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}
