use serde::Serialize;

use marketing_core::{CompletionId, GrantId, ReservationId};
use marketing_infra::{IssuanceOutcome, PublishOutcome, SkipReason, TaskOutcome, TriggerReport};

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TriggerReportResponse {
    pub accepted: bool,
    pub tasks: Vec<TaskResultResponse>,
}

/// Outcome of one task. Failure detail stays in the engine logs and, once a
/// grant exists, on the grant itself.
#[derive(Debug, Default, Serialize)]
pub struct TaskResultResponse {
    pub task_id: String,
    /// `skipped`, `completed` or `failed`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_id: Option<CompletionId>,
    /// `no_reward`, `reward_not_found`, `issued` or `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuance: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<GrantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<ReservationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

impl From<&TriggerReport> for TriggerReportResponse {
    fn from(report: &TriggerReport) -> Self {
        Self {
            accepted: true,
            tasks: report
                .tasks
                .iter()
                .map(|t| task_result(t.task_id.to_string(), &t.outcome))
                .collect(),
        }
    }
}

fn task_result(task_id: String, outcome: &TaskOutcome) -> TaskResultResponse {
    match outcome {
        TaskOutcome::Skipped(reason) => TaskResultResponse {
            task_id,
            status: "skipped",
            reason: Some(
                match reason {
                    SkipReason::TriggerMismatch => "trigger_mismatch",
                    SkipReason::ConditionNotMet => "condition_not_met",
                    SkipReason::MaxCountReached { .. } => "max_count_reached",
                }
                .to_string(),
            ),
            ..Default::default()
        },
        TaskOutcome::Failed(_) => TaskResultResponse {
            task_id,
            status: "failed",
            ..Default::default()
        },
        TaskOutcome::Completed {
            completion_id,
            issuance,
            publish,
        } => {
            let mut result = TaskResultResponse {
                task_id,
                status: "completed",
                completion_id: Some(*completion_id),
                published: Some(matches!(publish, PublishOutcome::Published)),
                ..Default::default()
            };
            match issuance {
                IssuanceOutcome::NoReward => result.issuance = Some("no_reward"),
                IssuanceOutcome::RewardNotFound => result.issuance = Some("reward_not_found"),
                IssuanceOutcome::Issued {
                    grant_id,
                    reservation_id,
                } => {
                    result.issuance = Some("issued");
                    result.grant_id = Some(*grant_id);
                    result.reservation_id = *reservation_id;
                }
                IssuanceOutcome::Failed(e) => {
                    result.issuance = Some("failed");
                    result.grant_id = e.grant_id();
                }
            }
            result
        }
    }
}
