use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error envelope returned for every failed request.
///
/// The storefront frontend only ever inspects `success` and `message`, so the
/// envelope stays deliberately flat: no structured error codes beyond the
/// HTTP status itself.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` for error responses
    pub success: bool,
    /// Human-readable error description
    #[schema(example = "Product 550e8400-e29b-41d4-a716-446655440000 not found")]
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(sea_orm::error::DbErr),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    GatewayError(String),

    #[error("Email delivery error: {0}")]
    EmailError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

// Every `?` on a DbErr goes through the normalization below so that
// constraint violations surface as client errors, not opaque 500s.
impl From<DbErr> for ServiceError {
    fn from(err: DbErr) -> Self {
        ServiceError::from_db(err)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InsufficientStock(_)
            | Self::InvalidTransition(_)
            | Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(_)
            | Self::EmailError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message rendered in the response envelope.
    /// Internal errors get a generic message to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EmailError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Normalizes well-known lower-level database failures into user-facing
    /// errors (bad id format, duplicate key) instead of opaque 500s.
    pub fn from_db(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(what) => ServiceError::NotFound(what.clone()),
            DbErr::Query(runtime) | DbErr::Exec(runtime) => {
                let text = runtime.to_string();
                if text.contains("UNIQUE constraint failed")
                    || text.contains("duplicate key value")
                {
                    ServiceError::ValidationError("Duplicate field value entered".to_string())
                } else {
                    ServiceError::DatabaseError(err)
                }
            }
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let err = ErrorResponse {
            success: false,
            message: self.response_message(),
        };
        (status, Json(err)).into_response()
    }
}
