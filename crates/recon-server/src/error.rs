use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors the review UI surfaces to its caller: 200 ok, 302 redirect on a
/// successful POST, 404 unknown id, 400 malformed action.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("resolution not found")]
    NotFound,

    #[error("resolution error: {0}")]
    Resolution(#[from] recon_resolution::ResolutionError),

    #[error("storage error: {0}")]
    Store(#[from] recon_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Resolution(recon_resolution::ResolutionError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Resolution(_) | ServerError::Store(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Config(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Resolution(recon_resolution::ResolutionError::NotFound(_)) => "NOT_FOUND",
            ServerError::Resolution(_) => "RESOLUTION_ERROR",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(format!("io error: {err}"))
    }
}
