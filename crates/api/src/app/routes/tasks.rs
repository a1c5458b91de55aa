use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use marketing_core::{CampaignId, TaskId};

use crate::app::{errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/:task_id/stats", get(task_stats))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub campaign_id: Option<CampaignId>,
}

/// GET /v1/tasks/:task_id/stats?campaign_id=
pub async fn task_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Path(task_id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> axum::response::Response {
    match services
        .ledger()
        .task_stats(&TaskId::new(task_id), query.campaign_id.as_ref())
        .await
    {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::repository_error_to_response(e),
    }
}
