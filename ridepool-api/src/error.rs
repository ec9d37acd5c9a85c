use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use ridepool_booking::BookingError;
use ridepool_domain::StoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    /// Map lifecycle errors onto the HTTP taxonomy. Conflict covers
    /// duplicate requests, invalid transitions, seat exhaustion and
    /// retry-exhausted store contention; the message carries the
    /// user-facing reason.
    pub fn booking(err: BookingError) -> Self {
        match err {
            BookingError::RideNotFound(_) | BookingError::BookingNotFound(_) => {
                AppError::NotFoundError(err.to_string())
            }
            BookingError::SelfBookingDenied | BookingError::NotAuthorized => {
                AppError::AuthorizationError(err.to_string())
            }
            BookingError::DuplicateBookingRequest
            | BookingError::RideClosed
            | BookingError::InsufficientSeats { .. }
            | BookingError::InvalidTransition { .. }
            | BookingError::TransactionConflict => AppError::ConflictError(err.to_string()),
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::Store(e) => AppError::InternalServerError(e.to_string()),
        }
    }

    pub fn store(err: StoreError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
