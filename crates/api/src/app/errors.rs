use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use marketing_infra::repository::RepositoryError;
use marketing_infra::{LedgerError, RetryError, TriggerError};

pub fn trigger_error_to_response(err: TriggerError) -> axum::response::Response {
    match err {
        TriggerError::ListTasks(e) => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "task_listing_failed",
            e.to_string(),
        ),
    }
}

pub fn retry_error_to_response(err: RetryError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        RetryError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        RetryError::NotRetriable { .. } => json_error(StatusCode::CONFLICT, "not_retriable", message),
        RetryError::Distribution { .. } => {
            json_error(StatusCode::BAD_GATEWAY, "distribution_failed", message)
        }
        RetryError::Repository(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        LedgerError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        LedgerError::Expired { .. } => json_error(StatusCode::GONE, "grant_expired", message),
        LedgerError::Rejected { .. } => json_error(StatusCode::CONFLICT, "not_usable", message),
        LedgerError::Repository(e) => repository_error_to_response(e),
    }
}

pub fn repository_error_to_response(err: RepositoryError) -> axum::response::Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
