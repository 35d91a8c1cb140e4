//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vetclinic_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No caller identity, or one the directory does not know.
  #[error("unauthorized")]
  Unauthorized,

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn code(&self) -> &'static str {
    match self {
      Self::Unauthorized => "unauthorized",
      Self::Core(e) => e.code(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::Core(CoreError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
      Self::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
      Self::Core(CoreError::Forbidden(_)) => StatusCode::FORBIDDEN,
      Self::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
      Self::Core(CoreError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::Core(CoreError::Internal(e)) => {
        tracing::error!(error = %e, "request failed");
        "internal server error".to_owned()
      }
      other => other.to_string(),
    };
    (self.status(), Json(json!({ "code": self.code(), "error": message }))).into_response()
  }
}
