//! Per-user history: grants and completions within one tenant.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use marketing_core::{TenantId, UserId};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:user_id/grants", get(list_user_grants))
        .route("/:user_id/completions", get(list_user_completions))
}

#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub tenant_id: TenantId,
}

/// GET /v1/users/:user_id/grants?tenant_id=
pub async fn list_user_grants(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<i64>,
    Query(query): Query<TenantQuery>,
) -> axum::response::Response {
    match services
        .ledger()
        .grants_for_user(&query.tenant_id, UserId::new(user_id))
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::repository_error_to_response(e),
    }
}

/// GET /v1/users/:user_id/completions?tenant_id=
pub async fn list_user_completions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<i64>,
    Query(query): Query<TenantQuery>,
) -> axum::response::Response {
    match services
        .ledger()
        .completions_for_user(&query.tenant_id, UserId::new(user_id))
        .await
    {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::repository_error_to_response(e),
    }
}
