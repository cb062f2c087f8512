//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unsupported database kind: {0}")]
    UnsupportedDatabase(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("table {schema}.{table} has no primary key; {operation} by key is not available")]
    NoPrimaryKey {
        schema: String,
        table: String,
        operation: &'static str,
    },
    #[error("{entity} does not support {operation}")]
    UnsupportedOperation {
        entity: String,
        operation: &'static str,
    },
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database unreachable: {0}")]
    Connectivity(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("connection pool exhausted: no session available before the checkout timeout")]
    PoolExhausted,
    #[error("reload failed: {0}")]
    Reload(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(ConfigError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => AppError::PoolExhausted,
            sqlx::Error::Database(ref db) => {
                let code = db.code().map(|c| c.into_owned());
                let message = db.message().to_string();
                match code.as_deref().and_then(|c| client_error(c, message)) {
                    Some(err) => err,
                    None => AppError::Db(e),
                }
            }
            other => AppError::Db(other),
        }
    }
}

/// Errors caused by the request's data, by SQLSTATE. `None` leaves the error a server fault.
fn client_error(sqlstate: &str, message: String) -> Option<AppError> {
    match sqlstate {
        // unique / foreign key violation
        "23505" | "23503" => Some(AppError::Conflict(message)),
        // not null and check violations
        "23502" | "23514" => Some(AppError::Validation(message)),
        // class 22: data exception (bad input syntax, out of range, too long, bad dates)
        c if c.starts_with("22") => Some(AppError::Validation(message)),
        _ => None,
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Connectivity(_) => (StatusCode::SERVICE_UNAVAILABLE, "database_unavailable"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::PoolExhausted => (StatusCode::SERVICE_UNAVAILABLE, "pool_exhausted"),
            AppError::Reload(_) => (StatusCode::INTERNAL_SERVER_ERROR, "reload_failed"),
            AppError::SchemaMismatch(_) => (StatusCode::METHOD_NOT_ALLOWED, "schema_mismatch"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if matches!(self, AppError::PoolExhausted) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}
