use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::error;
use validator::ValidationErrors;

use crate::middleware::current_trace_id;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Revocation store error: {0}")]
    RevocationError(#[from] RevocationError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {title}")]
    ValidationError {
        title: String,
        params: Vec<FieldError>,
    },

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Request timeout")]
    RequestTimeout,
}

impl AppError {
    /// Builds a 400 error listing every field that failed validation.
    pub fn validation(title: impl Into<String>, errors: &ValidationErrors) -> Self {
        let mut params: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| {
                    let reason = failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} failed the '{}' check", field, failure.code));
                    FieldError::new(field, reason)
                })
            })
            .collect();
        params.sort_by(|a, b| a.domain.cmp(&b.domain));

        AppError::ValidationError {
            title: title.into(),
            params,
        }
    }

    /// The user-facing title. Internal failures never expose their cause.
    fn title(&self) -> String {
        match self {
            AppError::AuthError(e) => e.to_string(),
            AppError::ValidationError { title, .. } => title.clone(),
            AppError::UnprocessableEntity(_) => "Failed to bind request entity".to_string(),
            AppError::RequestTimeout => "Request timeout".to_string(),
            AppError::DatabaseError(DatabaseError::NotFound) => "Record not found".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let trace_id = current_trace_id();

        if status.is_server_error() {
            error!(error = %self, trace_id = trace_id.as_deref().unwrap_or("-"), "request failed");
        }

        let mut body = RestError::new(status, self.title());
        body.trace_id = trace_id;
        match self {
            AppError::ValidationError { params, .. } => body.invalid_params = params.clone(),
            AppError::UnprocessableEntity(detail) => body.detail = Some(detail.clone()),
            _ => {}
        }
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::TooManyAttempts => StatusCode::FORBIDDEN,
                AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
                AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::TokenNotFound => StatusCode::UNAUTHORIZED,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::DuplicateUser => StatusCode::CONFLICT,
            },
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestError {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,
    pub code: u16,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub invalid_params: Vec<FieldError>,
}

impl RestError {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            kind: None,
            code: status.as_u16(),
            title: title.into(),
            detail: None,
            trace_id: None,
            invalid_params: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub domain: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            reason: reason.into(),
        }
    }
}

/// Every variant here is deliberately phrased so that a client cannot tell
/// whether the username, the email or the password was wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No such user or password is incorrect")]
    InvalidCredentials,

    #[error("Excess maximum retry count")]
    TooManyAttempts,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Forbidden")]
    Forbidden,

    #[error("Username or email is already registered")]
    DuplicateUser,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("23505") => {
                DatabaseError::Duplicate
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum RevocationError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Expiry must be positive")]
    InvalidTtl,
}

impl From<redis::RedisError> for RevocationError {
    fn from(err: redis::RedisError) -> Self {
        RevocationError::Unavailable(err.to_string())
    }
}
