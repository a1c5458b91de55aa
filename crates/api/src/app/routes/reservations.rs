use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use marketing_infra::repository::ReservationFilter;

use crate::app::{errors, services::AppServices};

/// GET /v1/reservations?resource_id=&campaign_id=&user_id=&status=
pub async fn list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(filter): Query<ReservationFilter>,
) -> axum::response::Response {
    match services.ledger().reservations(&filter).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::repository_error_to_response(e),
    }
}
