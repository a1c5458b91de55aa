//! Condition evaluation: does this event complete this task?
//!
//! Pure function over a [`Task`] and a [`TaskEvent`]. Configuration problems
//! never surface as errors; they are logged and read as "no match" (trigger)
//! or "not complete" (condition).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use marketing_events::TaskEvent;

use crate::task::Task;

/// The `{type, value, target}` triple recorded on completion logs for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub target: f64,
}

/// Outcome of evaluating one task against one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The task's trigger does not name this event type (or has no trigger).
    TriggerMismatch,
    /// The trigger matched but the condition is absent, unusable or not met.
    Incomplete { progress: Option<ProgressSnapshot> },
    /// The condition evaluated true for this event.
    Completed { progress: ProgressSnapshot },
}

impl Evaluation {
    pub fn is_completed(&self) -> bool {
        matches!(self, Evaluation::Completed { .. })
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        match self {
            Evaluation::TriggerMismatch => None,
            Evaluation::Incomplete { progress } => progress.as_ref(),
            Evaluation::Completed { progress } => Some(progress),
        }
    }
}

pub fn evaluate(task: &Task, event: &TaskEvent) -> Evaluation {
    let trigger = match task.trigger() {
        Ok(Some(trigger)) => trigger,
        Ok(None) => return Evaluation::TriggerMismatch,
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "unreadable trigger config; skipping task");
            return Evaluation::TriggerMismatch;
        }
    };
    if !trigger.matches(&event.event_type) {
        return Evaluation::TriggerMismatch;
    }

    let condition = match task.condition() {
        Ok(Some(condition)) => condition,
        Ok(None) => return Evaluation::Incomplete { progress: None },
        Err(e) => {
            tracing::warn!(task_id = %task.id, error = %e, "unreadable condition config; task cannot complete");
            return Evaluation::Incomplete { progress: None };
        }
    };

    let progress = ProgressSnapshot {
        value: progress_value(&event.event_data, &condition.kind),
        target: condition.target,
        kind: condition.kind,
    };

    let Some(operator) = condition.operator else {
        tracing::warn!(
            task_id = %task.id,
            operator = %condition.raw_operator,
            "unsupported condition operator; task cannot complete"
        );
        return Evaluation::Incomplete {
            progress: Some(progress),
        };
    };

    if operator.compare(progress.value, progress.target) {
        Evaluation::Completed { progress }
    } else {
        Evaluation::Incomplete {
            progress: Some(progress),
        }
    }
}

/// Left-hand operand: `event_data[key]` coerced to `f64`, `0.0` when unusable.
fn progress_value(data: &Map<String, JsonValue>, key: &str) -> f64 {
    match data.get(key) {
        Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(JsonValue::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %s, "non-numeric progress value; using 0");
                0.0
            }
        },
        Some(other) => {
            tracing::debug!(key, value = %other, "progress value is not a scalar number; using 0");
            0.0
        }
        None => {
            tracing::debug!(key, "progress key missing from event data; using 0");
            0.0
        }
    }
}
