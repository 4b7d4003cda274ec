// Error types for the listing engine and conversions for the HTTP layer

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Shown to visitors whenever a listing load fails, whatever the cause
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load cars. Please try again.";

/// Failure talking to the remote document-query endpoint.
#[derive(Debug, Error)]
pub enum RemoteQueryError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query endpoint returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("could not decode query response: {0}")]
    Decode(String),
}

/// Failure of a whole listing load cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Remote(#[from] RemoteQueryError),

    #[error("listing load timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("invalid lead: {0}")]
    Invalid(String),

    #[error("could not store lead: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum EmiError {
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("interest rate cannot be negative")]
    NegativeRate,
}

// Application error type for HTTP handlers
#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    BadRequest(String),
    NotFound(String),
}

// Implement conversion from anyhow::Error for easier error propagation
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<RemoteQueryError> for AppError {
    fn from(error: RemoteQueryError) -> Self {
        AppError::InternalServerError(anyhow::Error::new(error))
    }
}

impl From<EngineError> for AppError {
    fn from(error: EngineError) -> Self {
        AppError::InternalServerError(anyhow::Error::new(error))
    }
}

impl From<LeadError> for AppError {
    fn from(error: LeadError) -> Self {
        match error {
            LeadError::Invalid(message) => AppError::BadRequest(message),
            LeadError::Storage(e) => AppError::InternalServerError(e.context("Failed to store lead")),
        }
    }
}

impl From<EmiError> for AppError {
    fn from(error: EmiError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

// Implement IntoResponse for AppError to convert errors into HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                // Log the detailed error here, never expose it
                tracing::error!("Internal server error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };

        (status, error_message).into_response()
    }
}

// Define a custom Result type using our AppError
pub type AppResult<T> = Result<T, AppError>;
