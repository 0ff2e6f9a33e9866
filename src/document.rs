//! State document persistence handler.
//!
//! The browser app owns the document contents; the server only checks the
//! top-level shape (`irmaos` and `pagamentos` must be arrays) and rewrites
//! `file.json` in full. Counts in the response let the client confirm what
//! landed on disk.

use axum::body::Bytes;
use axum::extract::Extension;
use axum::response::Json as JsonResponse;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::PAID_STATUS;
use crate::error::ApiError;
use crate::storage::Storage;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveResponse {
    pub success: bool,
    pub message: String,
    pub irmaos: usize,
    pub pagamentos: usize,
    pub pagamentos_pagos: usize,
}

/// Validates and persists the full members+payments document.
pub async fn save_document(
    Extension(storage): Extension<Arc<Storage>>,
    body: Bytes,
) -> Result<JsonResponse<SaveResponse>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("request body is empty".into()));
    }
    let document: Value =
        serde_json::from_slice(&body).map_err(|err| ApiError::Format(err.to_string()))?;
    let summary = summarize(&document)?;

    // Pretty output keeps the on-disk document diffable and leaves
    // non-ASCII member names unescaped.
    let serialized = serde_json::to_vec_pretty(&document)
        .map_err(|err| ApiError::Format(err.to_string()))?;
    storage.write_document(&serialized).await?;

    info!(
        irmaos = summary.irmaos,
        pagamentos = summary.pagamentos,
        pagamentos_pagos = summary.pagamentos_pagos,
        "document saved"
    );
    Ok(JsonResponse(SaveResponse {
        success: true,
        message: "file.json atualizado com sucesso".to_string(),
        irmaos: summary.irmaos,
        pagamentos: summary.pagamentos,
        pagamentos_pagos: summary.pagamentos_pagos,
    }))
}

pub(crate) struct DocumentSummary {
    pub irmaos: usize,
    pub pagamentos: usize,
    pub pagamentos_pagos: usize,
}

/// Checks the document shape and counts members, payments and paid payments.
fn summarize(document: &Value) -> Result<DocumentSummary, ApiError> {
    let irmaos = document
        .get("irmaos")
        .and_then(Value::as_array)
        .ok_or_else(shape_error)?;
    let pagamentos = document
        .get("pagamentos")
        .and_then(Value::as_array)
        .ok_or_else(shape_error)?;
    let pagamentos_pagos = pagamentos
        .iter()
        .filter(|payment| {
            payment.get("status").and_then(Value::as_str) == Some(PAID_STATUS)
        })
        .count();
    Ok(DocumentSummary {
        irmaos: irmaos.len(),
        pagamentos: pagamentos.len(),
        pagamentos_pagos,
    })
}

fn shape_error() -> ApiError {
    ApiError::Validation("\"irmaos\" e \"pagamentos\" devem ser arrays".into())
}
