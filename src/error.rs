//! Error handler for Janua.

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("error parsing form data")]
    ParsingForm(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SqlxError),

    #[error("invalid or expired token")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),

    #[error("system clock is set before the unix epoch")]
    Time(#[from] std::time::SystemTimeError),

    #[error("internal server error: {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("missing or invalid credentials")]
    Unauthorized,
}

/// Error on a precise field.
#[derive(Debug, Serialize)]
pub struct FieldError {
    /// Field name.
    pub field: String,
    /// Message related to the field.
    pub message: String,
}

/// Describes `4xx` and `5xx` errors to users.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    /// URI to a specific page detailing the error.
    r#type: String,
    /// Short title of the error.
    title: String,
    /// HTTP error code.
    status: u16,
    /// Explication of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    /// Concerned URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
    /// Custom fields related to errors on precise fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: "about:blank".to_owned(),
            title: "Bad Request".to_owned(),
            status: 400,
            detail: None,
            instance: None,
            errors: Vec::new(),
        }
    }
}

impl ResponseError {
    /// Update status code.
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Update title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Add details about error.
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.detail = Some(details.into());
        self
    }

    /// Add errors on fields.
    pub fn errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }
}

impl IntoResponse for ResponseError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            axum::Json(self),
        )
            .into_response()
    }
}

/// Flatten [`ValidationErrors`] into per-field messages.
pub(crate) fn parse_validation_errors(
    errors: &ValidationErrors,
) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| FieldError {
                field: field.to_string(),
                message: error.to_string(),
            })
        })
        .collect()
}

/// Same flattening, grouped by field. Used by HTML form re-renders.
pub(crate) fn grouped_errors(
    errors: &ValidationErrors,
) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for error in parse_validation_errors(errors) {
        map.entry(error.field).or_default().push(error.message);
    }

    map
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default();

        match self {
            Self::Validation(ref errors) => response
                .title("There were validation errors with your request.")
                .errors(parse_validation_errors(errors))
                .into_response(),
            Self::ParsingForm(_) => response
                .title("Server error during data parsing.")
                .details(self.to_string())
                .into_response(),
            Self::Axum(_) => {
                response.details(self.to_string()).into_response()
            },
            Self::Sql(ref err) => {
                let details = err
                    .as_database_error()
                    .map(|db_err| db_err.message().to_owned())
                    .unwrap_or_else(|| self.to_string());

                response
                    .title("Database request failed.")
                    .details(details)
                    .into_response()
            },
            Self::Token(_) => response
                .status(401)
                .title("Invalid or expired token.")
                .into_response(),
            Self::Unauthorized => response
                .status(401)
                .title("Missing or invalid credentials.")
                .into_response(),
            Self::Crypto(_) | Self::Template(_) | Self::Time(_) => {
                internal_server_error(self)
            },
            Self::Internal { details, source } => {
                tracing::error!(error = details, "internal server error");
                if let Some(source) = source {
                    tracing::error!(error = %source, "caused by");
                }

                ResponseError::default()
                    .status(500)
                    .title("Internal server error.")
                    .into_response()
            },
        }
    }
}

/// Log the real cause, answer with a shell.
pub(crate) fn internal_server_error(
    err: impl std::error::Error,
) -> Response {
    tracing::error!(error = %err, "internal server error");

    ResponseError::default()
        .status(500)
        .title("Internal server error.")
        .into_response()
}
