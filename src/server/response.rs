use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::json;

use super::validation::ValidationReport;
use crate::error::{Error, Result as StoreResult};

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Failure of a form action: either the submission is re-displayed with its
/// field messages, or the request fails outright.
#[derive(Debug)]
pub enum ActionError {
    Invalid(ValidationReport),
    Api(ApiError),
}

impl From<ValidationReport> for ActionError {
    fn from(report: ValidationReport) -> Self {
        ActionError::Invalid(report)
    }
}

impl From<ApiError> for ActionError {
    fn from(error: ApiError) -> Self {
        ActionError::Api(error)
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        match self {
            ActionError::Invalid(report) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(report)).into_response()
            }
            ActionError::Api(error) => error.into_response(),
        }
    }
}

/// Successful actions end in a 303 redirect.
pub type ActionResult = Result<Redirect, ActionError>;

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;

    /// Like [`api_err`](Self::api_err), but a uniqueness violation becomes a
    /// field message on the submitted form.
    fn or_conflict(self, message: &'static str) -> Result<T, ActionError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        })
    }

    fn or_conflict(self, message: &'static str) -> Result<T, ActionError> {
        match self {
            Ok(value) => Ok(value),
            Err(Error::UniqueViolation { field }) => {
                tracing::debug!(field = %field, "Write lost a uniqueness race");
                Err(ValidationReport::conflict(&field).into())
            }
            Err(e) => {
                tracing::error!("{message}: {e}");
                Err(ApiError::internal(message).into())
            }
        }
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
