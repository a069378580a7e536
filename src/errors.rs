use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Error type shared by services and the checkout orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The gateway could not be reached before the request was sent.
    /// Safe to retry by resubmitting the checkout.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway call timed out after the request may have been sent.
    /// The charge outcome is unknown; the caller must not assume "no charge".
    #[error("Payment gateway timed out; charge outcome unknown")]
    GatewayTimeout,

    /// The gateway received the request and rejected it.
    #[error("Payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) | Self::GatewayTimeout | Self::GatewayRejected(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// True once a charge may exist externally even though this call failed.
    /// Used by the orchestrator to decide fail-open vs fail-closed.
    pub fn is_ambiguous_charge(&self) -> bool {
        matches!(self, Self::GatewayTimeout)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "success": false,
            "message": self.response_message(),
        });
        (status, Json(body)).into_response()
    }
}

/// API-level error wrapper for handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized")]
    Unauthorized,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceError(err) => err.status_code(),
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::ServiceError(err) => err.response_message(),
            Self::ValidationError(msg) => msg.clone(),
            Self::Unauthorized => "Unauthorized".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}
