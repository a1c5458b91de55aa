//! Inbound business events.

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use marketing_events::TaskEvent;

use crate::app::{dto, errors, services::AppServices};

/// POST /v1/events
///
/// Runs the event through every active task of its tenant/app. Per-task
/// failures are reported in the body; the request itself is still accepted.
pub async fn trigger_event(
    Extension(services): Extension<Arc<AppServices>>,
    Json(event): Json<TaskEvent>,
) -> axum::response::Response {
    match services.engine().trigger_event(&event).await {
        Ok(report) => (
            StatusCode::ACCEPTED,
            Json(dto::TriggerReportResponse::from(&report)),
        )
            .into_response(),
        Err(e) => errors::trigger_error_to_response(e),
    }
}
