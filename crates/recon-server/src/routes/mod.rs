//! HTTP route handlers.
//!
//! The review UI is the only HTTP surface this crate exposes: a filtered
//! list and a per-resolution edit endpoint, both in `corrections`.

pub mod corrections;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// `GET /` — name, version, endpoint list. No auth.
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "recon-server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/corrections/",
            "/corrections/{id}/edit/"
        ]
    })))
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
