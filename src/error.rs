use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::error;

/// Every error a request handler can surface. Each variant maps to one
/// entry of the error taxonomy: per-field validation, generic ownership
/// denial, not-found, the generic post-rollback failure, and internal
/// database/storage faults.
#[derive(Debug)]
pub enum ApiError {
  Validation(BTreeMap<String, Vec<String>>),
  Denied(&'static str),
  NotFound,
  UpdateFailed,
  Database(diesel::result::Error),
  Storage(std::io::Error),
}

impl ApiError {
  pub fn validation(field: &str, message: impl Into<String>) -> Self {
    let mut errors = FieldErrors::default();
    errors.push(field, message);
    ApiError::Validation(errors.errors)
  }
}

/// Accumulates per-field validation messages so a request reports every
/// invalid field at once instead of failing on the first.
#[derive(Debug, Default)]
pub struct FieldErrors {
  errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
  pub fn push(&mut self, field: &str, message: impl Into<String>) {
    self.errors.entry(field.to_string()).or_default().push(message.into());
  }

  pub fn is_empty(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn into_result(self) -> Result<(), ApiError> {
    if self.is_empty() { return Ok(()); }

    Err(ApiError::Validation(self.errors))
  }
}

impl From<diesel::result::Error> for ApiError {
  fn from(e: diesel::result::Error) -> Self {
    match e {
      diesel::result::Error::NotFound => ApiError::NotFound,
      other => ApiError::Database(other),
    }
  }
}

impl From<std::io::Error> for ApiError {
  fn from(e: std::io::Error) -> Self {
    ApiError::Storage(e)
  }
}

impl From<MultipartError> for ApiError {
  fn from(e: MultipartError) -> Self {
    ApiError::validation("images", format!("The upload payload could not be read: {e}"))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::Validation(errors) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "message": "The given data was invalid.", "errors": errors }),
      ),
      ApiError::Denied(message) => (StatusCode::FORBIDDEN, json!({ "message": message })),
      ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "message": "Not found." })),
      ApiError::UpdateFailed => (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "The update failed. Please try again." }),
      ),
      ApiError::Database(e) => {
        error!("Database error: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "Internal server error." }))
      }
      ApiError::Storage(e) => {
        error!("Storage error: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "Internal server error." }))
      }
    };

    (status, Json(body)).into_response()
  }
}
