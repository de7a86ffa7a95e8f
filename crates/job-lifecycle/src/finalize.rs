//! Post-completion TTL: delete the job object once `ttlSecondsAfterFinished` elapses.

use crate::adapter::JobAdapter;
use crate::api::{JobStatus, RunPolicy};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use kube::runtime::controller::Action;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one finalization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// The job object was deleted (or was already gone).
    Deleted,
    /// TTL not yet elapsed. The caller must re-check no later than `requeue_after`.
    Pending { requeue_after: Duration },
    /// No TTL configured; the job is never deleted by this mechanism.
    Retained,
}

impl Finalization {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Finalization::Deleted)
    }

    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Finalization::Pending { requeue_after } => Some(*requeue_after),
            _ => None,
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        match self.requeue_after() {
            Some(delay) => Action::requeue(delay),
            None => Action::await_change(),
        }
    }
}

/// Deletes the finished job once its TTL has elapsed, otherwise reports how
/// long to wait. `completionTime` must be set; calling earlier is an error.
pub async fn cleanup_job<A>(
    adapter: &A,
    run_policy: &RunPolicy,
    status: &JobStatus,
    job: &A::Job,
) -> Result<Finalization>
where
    A: JobAdapter + ?Sized,
{
    cleanup_job_at(adapter, run_policy, status, job, Utc::now()).await
}

pub async fn cleanup_job_at<A>(
    adapter: &A,
    run_policy: &RunPolicy,
    status: &JobStatus,
    job: &A::Job,
    now: DateTime<Utc>,
) -> Result<Finalization>
where
    A: JobAdapter + ?Sized,
{
    let Some(ttl) = run_policy.ttl_seconds_after_finished else {
        return Ok(Finalization::Retained);
    };

    let job_key = adapter.job_key(job);
    let Some(completion) = status.completion_time.as_ref() else {
        return Err(Error::MissingCompletionTime { job: job_key });
    };

    let expire_at = completion.0 + ChronoDuration::seconds(i64::from(ttl));
    if expire_at > now {
        let requeue_after = (expire_at - now).to_std().unwrap_or(Duration::ZERO);
        debug!(
            job = %job_key,
            remaining_secs = requeue_after.as_secs(),
            "TTL not yet elapsed"
        );
        return Ok(Finalization::Pending { requeue_after });
    }

    match adapter.delete_job(job).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            debug!(job = %job_key, "Job already deleted");
        }
        Err(e) => {
            warn!(job = %job_key, error = %e, "Cleanup job error");
            return Err(e);
        }
    }

    info!(job = %job_key, ttl_seconds = ttl, "TTL expired, deleted job");
    Ok(Finalization::Deleted)
}
