//! Dues-tracking backend server binary.
//!
//! Wires together the JSON document store, the multipart upload handlers,
//! the stored-upload responders and a static-file fallback behind one Axum
//! router with permissive CORS. The main entry point parses the CLI
//! arguments, builds the router and starts the HTTP listener.

mod assets;
mod atomic;
mod config;
mod document;
mod error;
mod http;
mod logging;
mod multipart;
mod storage;
mod upload;

use axum::extract::{DefaultBodyLimit, Extension, connect_info::ConnectInfo};
use axum::http::{Request, StatusCode};
use axum::routing::{get, get_service, post, put};
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::config::{Args, MAX_BODY_SIZE};
use crate::storage::Storage;

/// Starts the server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let root = PathBuf::from(&args.root_dir);
    let storage = Arc::new(Storage::new(root.clone()));
    storage.ensure_root().await?;

    let app = build_router(storage, &root);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let addr = SocketAddr::new(host, args.port);
    let handle = Handle::new();

    info!("📂 Root directory: {}", root.display());
    info!("🚀 Starting HTTP server at http://{}", addr);

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

/// Assembles the routing table and middleware stack.
fn build_router(storage: Arc<Storage>, root: &Path) -> Router {
    Router::new()
        .route("/api/save-file.json", put(document::save_document))
        .route("/api/upload-comprovante", post(upload::upload_comprovante))
        .route("/api/upload-boleto", post(upload::upload_boleto))
        .route("/comprovantes/{name}", get(assets::serve_comprovante))
        .route("/boletos/{name}", get(assets::serve_boleto))
        // Static serving answers GET/HEAD only; any other method on an
        // unmatched path is a plain 404, as the browser client expects.
        .fallback_service(get_service(ServeDir::new(root)).fallback(fallback_not_found))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let forwarded_ip = request
                        .headers()
                        .get("x-forwarded-for")
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.split(',').next().unwrap_or("").trim().to_string());
                    let connect_ip = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| addr.to_string());
                    let client_ip = forwarded_ip
                        .or(connect_ip)
                        .unwrap_or_else(|| "unknown".to_string());

                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip,
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(storage))
        .layer(middleware::from_fn(http::handle_options))
        .layer(http::build_cors_layer())
}

async fn fallback_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn make_app() -> (tempfile::TempDir, Router) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        std::fs::create_dir_all(&root).expect("create root");
        let app = build_router(Arc::new(Storage::new(root.clone())), &root);
        (temp, app)
    }

    #[tokio::test]
    async fn put_to_unknown_path_returns_404() {
        let (_temp, app) = make_app();
        let request = Request::builder()
            .method("PUT")
            .uri("/api/other")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_to_unknown_path_returns_404() {
        let (_temp, app) = make_app();
        let request = Request::builder()
            .method("POST")
            .uri("/whatever")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn options_on_any_path_returns_200_empty() {
        let (_temp, app) = make_app();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/save-file.json")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn get_falls_back_to_static_serving() {
        let (temp, app) = make_app();
        std::fs::write(temp.path().join("root").join("index.html"), b"<html>")
            .expect("write static file");
        let request = Request::builder()
            .method("GET")
            .uri("/index.html")
            .body(Body::empty())
            .expect("request");

        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
