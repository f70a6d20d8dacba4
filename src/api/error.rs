use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::protocol::HandshakeError;

/// Errors returned before a Socket.IO connection is upgraded.
///
/// The body mirrors what an Engine.IO server sends, so socket.io-client
/// surfaces a meaningful `connect_error`.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - Query parameters or upgrade headers are not acceptable.
    Handshake(HandshakeError),
    /// 503 - Shutdown has started; new connections are refused.
    ShuttingDown,
}

/// Engine.IO error code for a rejected request.
const CODE_FORBIDDEN: u8 = 4;

#[derive(Serialize)]
struct ErrorBody {
    code: u8,
    message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Handshake(_) => StatusCode::BAD_REQUEST,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            ApiError::Handshake(e) => e.code(),
            ApiError::ShuttingDown => CODE_FORBIDDEN,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Handshake(e) => e.to_string(),
            ApiError::ShuttingDown => "Server is shutting down".to_string(),
        }
    }
}

impl From<HandshakeError> for ApiError {
    fn from(e: HandshakeError) -> Self {
        ApiError::Handshake(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
