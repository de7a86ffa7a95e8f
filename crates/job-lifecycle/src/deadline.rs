//! Active deadline: wall-clock time since `startTime` against `activeDeadlineSeconds`.

use crate::api::{JobStatus, RunPolicy};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

fn deadline_of(run_policy: &RunPolicy, status: &JobStatus) -> Option<DateTime<Utc>> {
    let seconds = run_policy.active_deadline_seconds?;
    let start = status.start_time.as_ref()?;
    start.0.checked_add_signed(ChronoDuration::try_seconds(seconds)?)
}

/// True when the job has been running for at least `activeDeadlineSeconds`.
/// False when either the deadline or `startTime` is unset.
#[must_use]
pub fn past_active_deadline(run_policy: &RunPolicy, status: &JobStatus) -> bool {
    past_active_deadline_at(run_policy, status, Utc::now())
}

#[must_use]
pub fn past_active_deadline_at(
    run_policy: &RunPolicy,
    status: &JobStatus,
    now: DateTime<Utc>,
) -> bool {
    deadline_of(run_policy, status).is_some_and(|deadline| now >= deadline)
}

/// Time left before the deadline trips, zero once it has.
#[must_use]
pub fn active_deadline_remaining(
    run_policy: &RunPolicy,
    status: &JobStatus,
    now: DateTime<Utc>,
) -> Option<Duration> {
    let deadline = deadline_of(run_policy, status)?;
    Some((deadline - now).to_std().unwrap_or(Duration::ZERO))
}
