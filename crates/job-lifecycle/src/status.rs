//! Job condition helpers.
//!
//! These only read and append conditions; `startTime` and `completionTime`
//! belong to the per-kind controller and are never touched here.

use crate::api::{JobCondition, JobConditionType, JobStatus};
use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

pub const CONDITION_TRUE: &str = "True";
pub const CONDITION_FALSE: &str = "False";

#[must_use]
pub fn has_condition(status: &JobStatus, type_: JobConditionType) -> bool {
    status
        .conditions
        .iter()
        .any(|condition| condition.type_ == type_ && condition.is_true())
}

#[must_use]
pub fn is_succeeded(status: &JobStatus) -> bool {
    has_condition(status, JobConditionType::Succeeded)
}

#[must_use]
pub fn is_failed(status: &JobStatus) -> bool {
    has_condition(status, JobConditionType::Failed)
}

/// Succeeded or failed.
#[must_use]
pub fn is_finished(status: &JobStatus) -> bool {
    is_succeeded(status) || is_failed(status)
}

/// Sets a `True` condition of `type_`.
///
/// An existing condition of the same type is replaced, keeping its transition
/// time when its status does not change. A terminal condition turns `Running`
/// and `Restarting` to `False`.
pub fn update_job_conditions(
    status: &mut JobStatus,
    type_: JobConditionType,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    let mut transition_time = Some(Time(now));
    if let Some(existing) = status.conditions.iter().find(|c| c.type_ == type_) {
        if existing.is_true() {
            if existing.reason.as_deref() == Some(reason)
                && existing.message.as_deref() == Some(message)
            {
                return;
            }
            transition_time = existing.last_transition_time.clone();
        }
    }

    status.conditions.retain(|c| c.type_ != type_);

    if matches!(type_, JobConditionType::Succeeded | JobConditionType::Failed) {
        for condition in &mut status.conditions {
            if matches!(
                condition.type_,
                JobConditionType::Running | JobConditionType::Restarting
            ) && condition.is_true()
            {
                condition.status = CONDITION_FALSE.to_string();
                condition.last_transition_time = Some(Time(now));
                condition.last_update_time = Some(Time(now));
            }
        }
    }

    status.conditions.push(JobCondition {
        type_,
        status: CONDITION_TRUE.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_update_time: Some(Time(now)),
        last_transition_time: transition_time,
    });
}
