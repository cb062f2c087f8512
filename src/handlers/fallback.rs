//! Enveloped errors for requests no route answers.

use crate::error::AppError;
use axum::http::{Method, Uri};

/// The path matched a route but not for this method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
