//! API error handling
//!
//! Author: hephaex@gmail.com

use crate::auth::AuthError;
use address_core::{AddressBookError, ValidationErrors};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Per-field messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            errors: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    /// Validation failure with messages grouped by field
    pub fn validation(errors: &ValidationErrors) -> Self {
        let message = errors
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "Invalid input".to_string());
        let by_field = errors
            .by_field()
            .into_iter()
            .map(|(field, messages)| (field.to_string(), messages))
            .collect();

        Self {
            code: "VALIDATION_ERROR".to_string(),
            message,
            errors: Some(by_field),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Validation(ValidationErrors),
    Auth(AuthError),
    Internal(String),
    Database(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, ApiError::validation(&errors))
            }
            AppError::Auth(err) => return err.into_response(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error())
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("DATABASE_ERROR", "Database operation failed"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<AddressBookError> for AppError {
    fn from(err: AddressBookError) -> Self {
        match err {
            AddressBookError::Validation(errors) => AppError::Validation(errors),
            AddressBookError::DuplicateAddress => AppError::BadRequest(err.to_string()),
            AddressBookError::NotFound | AddressBookError::InvalidPage => {
                AppError::NotFound(err.to_string())
            }
            AddressBookError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use address_core::{validate, AddressInput};

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            AppError::from(AddressBookError::DuplicateAddress),
            AppError::BadRequest(msg) if msg == "attempting to add duplicate address"
        ));
        assert!(matches!(
            AppError::from(AddressBookError::NotFound),
            AppError::NotFound(msg) if msg == "Address not found"
        ));
        assert!(matches!(
            AppError::from(AddressBookError::InvalidPage),
            AppError::NotFound(msg) if msg == "Invalid page."
        ));
        assert!(matches!(
            AppError::from(AddressBookError::DatabaseError("down".into())),
            AppError::Database(_)
        ));
    }

    #[test]
    fn test_validation_body() {
        let input = AddressInput {
            country: Some("JA".to_string()),
            ..AddressInput::new("US", "1 Testerson Street", "Bean City", "TE1 1ST")
        };
        let errors = validate(&input).unwrap_err();

        let body = serde_json::to_value(ApiError::validation(&errors)).unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "Country is not valid");
        assert_eq!(body["errors"]["country"][0], "Country is not valid");
    }

    #[test]
    fn test_errors_omitted_when_absent() {
        let body = serde_json::to_value(ApiError::not_found("Address not found")).unwrap();
        assert_eq!(body["message"], "Address not found");
        assert!(body.get("errors").is_none());
    }
}
