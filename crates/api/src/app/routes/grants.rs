use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use marketing_core::GrantId;
use marketing_infra::repository::GrantRepository;

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:grant_id", get(get_grant))
        .route("/:grant_id/retry", post(retry_grant))
        .route("/:grant_id/use", post(use_grant))
}

fn parse_grant_id(raw: &str) -> Result<GrantId, axum::response::Response> {
    raw.parse::<GrantId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_grant_id", e.to_string()))
}

pub async fn get_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(grant_id): Path<String>,
) -> axum::response::Response {
    let grant_id = match parse_grant_id(&grant_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.engine().repositories().grants.get(grant_id).await {
        Ok(Some(grant)) => (StatusCode::OK, Json(grant)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "grant not found"),
        Err(e) => errors::repository_error_to_response(e),
    }
}

/// POST /v1/grants/:grant_id/retry
pub async fn retry_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(grant_id): Path<String>,
) -> axum::response::Response {
    let grant_id = match parse_grant_id(&grant_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.engine().retry_distribution(grant_id).await {
        Ok(grant) => (StatusCode::OK, Json(grant)).into_response(),
        Err(e) => errors::retry_error_to_response(e),
    }
}

/// POST /v1/grants/:grant_id/use
pub async fn use_grant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(grant_id): Path<String>,
) -> axum::response::Response {
    let grant_id = match parse_grant_id(&grant_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.ledger().redeem(grant_id).await {
        Ok(grant) => (StatusCode::OK, Json(grant)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
