use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use marketing_core::{
    AppId, CampaignId, CompletionId, DomainError, DomainResult, Entity, GrantId, TaskId,
    TenantId, UserId,
};
use marketing_events::TaskEvent;

use crate::condition::ProgressSnapshot;
use crate::task::Task;

/// Audit row written each time an event newly completes a task for a user.
///
/// Append-only apart from `grant_id`, which is back-filled once a grant exists.
/// The count of these rows per `(task, user)` is what enforces `max_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletionLog {
    completion_id: CompletionId,
    task_id: TaskId,
    task_name: String,
    campaign_id: Option<CampaignId>,
    campaign_name: Option<String>,
    user_id: UserId,
    tenant_id: TenantId,
    app_id: AppId,
    grant_id: Option<GrantId>,
    progress_data: JsonValue,
    trigger_event: String,
    completed_at: DateTime<Utc>,
}

impl TaskCompletionLog {
    /// The event's campaign wins; the task's own campaign is the fallback.
    pub fn record(
        completion_id: CompletionId,
        task: &Task,
        event: &TaskEvent,
        progress: Option<&ProgressSnapshot>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let progress_data = progress
            .and_then(|p| serde_json::to_value(p).ok())
            .unwrap_or(JsonValue::Null);

        Self {
            completion_id,
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            campaign_id: event.campaign_id.clone().or_else(|| task.campaign_id.clone()),
            campaign_name: event.campaign_name.clone(),
            user_id: event.user_id,
            tenant_id: event.tenant_id.clone(),
            app_id: event.app_id.clone(),
            grant_id: None,
            progress_data,
            trigger_event: event.event_type.clone(),
            completed_at,
        }
    }

    pub fn completion_id(&self) -> CompletionId {
        self.completion_id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.campaign_id.as_ref()
    }

    pub fn campaign_name(&self) -> Option<&str> {
        self.campaign_name.as_deref()
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn grant_id(&self) -> Option<GrantId> {
        self.grant_id
    }

    pub fn progress_data(&self) -> &JsonValue {
        &self.progress_data
    }

    pub fn trigger_event(&self) -> &str {
        &self.trigger_event
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Link the grant issued for this completion. Re-attaching the same grant is a no-op.
    pub fn attach_grant(&mut self, grant_id: GrantId) -> DomainResult<()> {
        match self.grant_id {
            Some(existing) if existing != grant_id => Err(DomainError::conflict(format!(
                "completion {} already linked to grant {existing}",
                self.completion_id
            ))),
            _ => {
                self.grant_id = Some(grant_id);
                Ok(())
            }
        }
    }
}

impl Entity for TaskCompletionLog {
    type Id = CompletionId;

    fn id(&self) -> &Self::Id {
        &self.completion_id
    }
}
