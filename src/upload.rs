//! Receipt and billing-slip upload handlers.
//!
//! Both endpoints take one multipart body carrying the file plus the
//! `id_irmao`/`competencia` text fields, and store the payload under a
//! deterministic `{id_irmao}_{competencia}{ext}` name so re-uploads for
//! the same member and period replace the previous file.

use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::{HeaderMap, header};
use axum::response::Json as JsonResponse;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::multipart::{self, FilePart, FormField, MultipartError};
use crate::storage::{AssetCategory, Storage};

/// Upload flavor: decides the file field name, destination category and
/// extension policy.
#[derive(Clone, Copy, Debug)]
pub enum UploadKind {
    Comprovante,
    Boleto,
}

impl UploadKind {
    fn field_name(self) -> &'static str {
        match self {
            UploadKind::Comprovante => "comprovante",
            UploadKind::Boleto => "boleto",
        }
    }

    fn label(self) -> &'static str {
        match self {
            UploadKind::Comprovante => "Comprovante",
            UploadKind::Boleto => "Boleto",
        }
    }

    fn category(self) -> AssetCategory {
        match self {
            UploadKind::Comprovante => AssetCategory::Comprovantes,
            UploadKind::Boleto => AssetCategory::Boletos,
        }
    }

    /// Receipts keep the uploaded extension (falling back by content
    /// type); slips are always stored as PDF.
    fn extension(self, part: &FilePart) -> String {
        match self {
            UploadKind::Boleto => ".pdf".to_string(),
            UploadKind::Comprovante => Path::new(&part.filename)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{ext}"))
                .unwrap_or_else(|| {
                    if part.content_type.starts_with("image/") {
                        ".jpg".to_string()
                    } else {
                        ".pdf".to_string()
                    }
                }),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `POST /api/upload-comprovante`
pub async fn upload_comprovante(
    Extension(storage): Extension<Arc<Storage>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    handle_upload(&storage, UploadKind::Comprovante, &headers, &body).await
}

/// `POST /api/upload-boleto`
pub async fn upload_boleto(
    Extension(storage): Extension<Arc<Storage>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    handle_upload(&storage, UploadKind::Boleto, &headers, &body).await
}

async fn handle_upload(
    storage: &Storage,
    kind: UploadKind,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or(MultipartError::NotMultipart)?;
    let fields = multipart::parse(body, content_type)?;

    let id_irmao = required_text(&fields, "id_irmao")?;
    let competencia = required_text(&fields, "competencia")?;
    let part = fields
        .get(kind.field_name())
        .and_then(FormField::as_file)
        .ok_or_else(|| {
            ApiError::Validation(format!("Arquivo de {} não encontrado", kind.field_name()))
        })?;

    let filename = format!("{id_irmao}_{competencia}{}", kind.extension(part));
    storage
        .store_upload(kind.category(), &filename, &part.data)
        .await?;

    info!(
        kind = ?kind,
        filename,
        bytes = part.data.len(),
        "upload stored"
    );
    let url = match kind {
        UploadKind::Comprovante => {
            Some(format!("{}/{filename}", kind.category().url_prefix()))
        }
        UploadKind::Boleto => None,
    };
    Ok(JsonResponse(UploadResponse {
        success: true,
        message: format!("{} enviado com sucesso", kind.label()),
        filename,
        url,
    }))
}

/// Looks up a required text field, trimming whitespace.
///
/// Both fields end up in the stored filename, so values that could steer
/// the write outside the category directory are refused here.
fn required_text<'a>(
    fields: &'a std::collections::HashMap<String, FormField>,
    name: &str,
) -> Result<&'a str, ApiError> {
    let value = fields
        .get(name)
        .and_then(FormField::as_text)
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::Validation(
            "id_irmao e competencia são obrigatórios".into(),
        ));
    }
    if value.contains('/') || value.contains('\\') || value.contains("..") {
        return Err(ApiError::Validation(format!("{name} inválido")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Extension;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio::fs;

    const BOUNDARY: &str = "----uploadboundary";

    fn make_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        std::fs::create_dir_all(&root).expect("create root");
        (temp, Arc::new(Storage::new(root)))
    }

    fn multipart_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&format!("multipart/form-data; boundary={BOUNDARY}"))
                .expect("header value"),
        );
        headers
    }

    fn upload_body(file_field: &str, filename: &str, mime: &str, data: &[u8]) -> Bytes {
        let mut body = Vec::new();
        for (name, value) in [("id_irmao", "12"), ("competencia", "2024-03")] {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{file_field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Bytes::from(body)
    }

    #[tokio::test]
    async fn comprovante_upload_keeps_extension_and_returns_url() {
        let (_temp, storage) = make_storage();
        let body = upload_body("comprovante", "x.png", "image/png", b"png-bytes");

        let JsonResponse(response) = upload_comprovante(
            Extension(storage.clone()),
            multipart_headers(),
            body,
        )
        .await
        .unwrap_or_else(|_| panic!("upload failed"));

        assert!(response.success);
        assert_eq!(response.filename, "12_2024-03.png");
        assert_eq!(response.url.as_deref(), Some("/comprovantes/12_2024-03.png"));

        let stored = fs::read(
            storage
                .category_dir(AssetCategory::Comprovantes)
                .join("12_2024-03.png"),
        )
        .await
        .expect("read stored upload");
        assert_eq!(stored, b"png-bytes");
    }

    #[tokio::test]
    async fn comprovante_without_extension_defaults_by_content_type() {
        let (_temp, storage) = make_storage();
        let body = upload_body("comprovante", "scan", "image/jpeg", b"jpeg");

        let JsonResponse(response) =
            upload_comprovante(Extension(storage), multipart_headers(), body)
                .await
                .unwrap_or_else(|_| panic!("upload failed"));

        assert_eq!(response.filename, "12_2024-03.jpg");
    }

    #[tokio::test]
    async fn boleto_upload_is_always_stored_as_pdf() {
        let (_temp, storage) = make_storage();
        let body = upload_body("boleto", "slip.docx", "application/msword", b"doc");

        let JsonResponse(response) =
            upload_boleto(Extension(storage.clone()), multipart_headers(), body)
                .await
                .unwrap_or_else(|_| panic!("upload failed"));

        assert_eq!(response.filename, "12_2024-03.pdf");
        assert!(response.url.is_none());
        assert!(
            storage
                .category_dir(AssetCategory::Boletos)
                .join("12_2024-03.pdf")
                .exists()
        );
    }

    #[tokio::test]
    async fn missing_file_field_fails_validation() {
        let (_temp, storage) = make_storage();
        // id fields present, file field named wrongly.
        let body = upload_body("anexo", "x.pdf", "application/pdf", b"pdf");

        let result = upload_comprovante(Extension(storage), multipart_headers(), body).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_competencia_fails_validation() {
        let (_temp, storage) = make_storage();
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"id_irmao\"\r\n\r\n12\r\n",
        );
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"comprovante\"; filename=\"x.pdf\"\r\n\r\npdf\r\n",
        );
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let result =
            upload_comprovante(Extension(storage), multipart_headers(), Bytes::from(body)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn traversal_member_id_cannot_escape_the_storage_root() {
        let (temp, storage) = make_storage();
        let mut body = Vec::new();
        for (name, value) in [("id_irmao", "../evil"), ("competencia", "2024-03")] {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"comprovante\"; filename=\"x.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\nOWNED\r\n");
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let result = upload_comprovante(
            Extension(storage.clone()),
            multipart_headers(),
            Bytes::from(body),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert!(
            !temp.path().join("root").join("evil_2024-03.png").exists(),
            "upload must not land outside the category dir"
        );
        assert!(
            !temp.path().join("evil_2024-03.png").exists(),
            "upload must not land outside the root"
        );
    }

    #[tokio::test]
    async fn non_multipart_request_fails_with_protocol_error() {
        let (_temp, storage) = make_storage();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let result =
            upload_comprovante(Extension(storage), headers, Bytes::from_static(b"{}")).await;
        assert!(matches!(result, Err(ApiError::Protocol(_))));
    }
}
