use crate::models::ErrorResponse;
use axum::{http::{StatusCode, Uri}, Json};
use tracing::debug;

/// Unmatched path under `/api`. These paths never reach the room entry.
pub async fn api_not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    debug!("No API route for {}", uri.path());
    ErrorResponse::with_status(StatusCode::NOT_FOUND, format!("No API route for {}", uri.path()))
}
