//! Stored-upload responders for the `/comprovantes` and `/boletos` prefixes.
//!
//! Requests outside these prefixes never reach this module, the router's
//! fallback serves them straight from the root directory.

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path as UrlPath};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::ApiError;
use crate::storage::{AssetCategory, Storage};

/// `GET /comprovantes/{name}`
pub async fn serve_comprovante(
    UrlPath(name): UrlPath<String>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    serve_asset(&storage, AssetCategory::Comprovantes, &name).await
}

/// `GET /boletos/{name}`, restricted to PDF files.
pub async fn serve_boleto(
    UrlPath(name): UrlPath<String>,
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Response, ApiError> {
    let is_pdf = Path::new(&name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(ApiError::NotFound);
    }
    serve_asset(&storage, AssetCategory::Boletos, &name).await
}

async fn serve_asset(
    storage: &Storage,
    category: AssetCategory,
    name: &str,
) -> Result<Response, ApiError> {
    let target = storage.resolve_asset(category, name)?;
    let file = match File::open(&target).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound);
        }
        Err(err) => return Err(ApiError::Io(err.to_string())),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|err| ApiError::Io(err.to_string()))?;
    if metadata.is_dir() {
        return Err(ApiError::NotFound);
    }

    let mime = mime_guess::from_path(name).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Io("invalid mime type".into()))?,
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::Io("invalid content length".into()))?,
    );

    debug!(category = ?category, name, size = metadata.len(), "serve stored upload");
    let stream = ReaderStream::new(file);
    Ok((StatusCode::OK, headers, AxumBody::from_stream(stream)).into_response())
}
