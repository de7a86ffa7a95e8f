//! Lifecycle controller bound to one job kind's adapter.
//!
//! `JobController` is what a per-kind reconciler holds. It exposes the
//! individual primitives and a `reconcile_lifecycle` pass that runs them in
//! the order a reconcile loop needs. It keeps no state between calls.

use crate::adapter::JobAdapter;
use crate::api::{CleanPodPolicy, JobStatus, ReplicaSpecs, RunPolicy};
use crate::backoff;
use crate::cleanup::{self, CleanupReport};
use crate::config::ControllerConfig;
use crate::deadline;
use crate::error::{Error, Result};
use crate::finalize::{self, Finalization};
use crate::status;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::Action;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Why a running job has to be failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    BackoffLimitExceeded,
    DeadlineExceeded,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::BackoffLimitExceeded => write!(f, "BackoffLimitExceeded"),
            FailureReason::DeadlineExceeded => write!(f, "DeadlineExceeded"),
        }
    }
}

/// What the caller should do after a lifecycle pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleDecision {
    /// Still active and within budget. Re-check after `requeue_after` when a
    /// deadline is pending.
    Continue { requeue_after: Option<Duration> },
    /// The job must be marked failed by the caller.
    Fail {
        reason: FailureReason,
        message: String,
    },
    /// The job is finished; pods were cleaned and the TTL was evaluated.
    Finished(Finalization),
}

impl LifecycleDecision {
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            LifecycleDecision::Continue {
                requeue_after: Some(delay),
            } => Action::requeue(*delay),
            LifecycleDecision::Continue { requeue_after: None }
            | LifecycleDecision::Fail { .. } => Action::await_change(),
            LifecycleDecision::Finished(finalization) => finalization.action(),
        }
    }
}

pub struct JobController<A> {
    adapter: A,
    config: Arc<ControllerConfig>,
}

impl<A> JobController<A>
where
    A: JobAdapter,
{
    pub fn new(adapter: A, config: Arc<ControllerConfig>) -> Self {
        Self { adapter, config }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The job's clean-pod policy, or the configured default when unset.
    #[must_use]
    pub fn effective_clean_pod_policy(&self, run_policy: &RunPolicy) -> CleanPodPolicy {
        run_policy
            .clean_pod_policy
            .unwrap_or(self.config.lifecycle.default_clean_pod_policy)
    }

    pub async fn delete_pods_and_services(
        &self,
        run_policy: &RunPolicy,
        job: &A::Job,
        pods: &[Pod],
    ) -> Result<CleanupReport> {
        let policy = self.effective_clean_pod_policy(run_policy);
        cleanup::delete_pods_and_services(&self.adapter, Some(policy), job, pods).await
    }

    pub fn past_backoff_limit(
        &self,
        job_name: &str,
        run_policy: &RunPolicy,
        replicas: &ReplicaSpecs,
        pods: &[Pod],
    ) -> Result<bool> {
        backoff::past_backoff_limit(job_name, run_policy, replicas, pods)
    }

    #[must_use]
    pub fn past_active_deadline(&self, run_policy: &RunPolicy, status: &JobStatus) -> bool {
        deadline::past_active_deadline(run_policy, status)
    }

    /// TTL finalization honouring `ttlCleanupEnabled` and `maxRequeueSeconds`.
    pub async fn cleanup_job(
        &self,
        run_policy: &RunPolicy,
        status: &JobStatus,
        job: &A::Job,
    ) -> Result<Finalization> {
        self.cleanup_job_at(run_policy, status, job, Utc::now()).await
    }

    async fn cleanup_job_at(
        &self,
        run_policy: &RunPolicy,
        status: &JobStatus,
        job: &A::Job,
        now: DateTime<Utc>,
    ) -> Result<Finalization> {
        if !self.config.lifecycle.ttl_cleanup_enabled {
            return Ok(Finalization::Retained);
        }
        let finalization =
            finalize::cleanup_job_at(&self.adapter, run_policy, status, job, now).await?;
        Ok(match finalization {
            Finalization::Pending { requeue_after } => Finalization::Pending {
                requeue_after: self.config.lifecycle.cap_requeue(requeue_after),
            },
            other => other,
        })
    }

    /// One lifecycle pass over `job`.
    pub async fn reconcile_lifecycle(
        &self,
        job: &A::Job,
        run_policy: &RunPolicy,
        replicas: &ReplicaSpecs,
        status: &JobStatus,
    ) -> Result<LifecycleDecision> {
        self.reconcile_lifecycle_at(job, run_policy, replicas, status, Utc::now())
            .await
    }

    #[instrument(skip_all, fields(job = %self.adapter.job_key(job)))]
    pub async fn reconcile_lifecycle_at(
        &self,
        job: &A::Job,
        run_policy: &RunPolicy,
        replicas: &ReplicaSpecs,
        status: &JobStatus,
        now: DateTime<Utc>,
    ) -> Result<LifecycleDecision> {
        let job_key = self.adapter.job_key(job);
        let pods = self.adapter.list_owned_pods(job).await?;

        if status::is_finished(status) {
            return self
                .finish(job, &job_key, run_policy, status, &pods, now)
                .await;
        }

        if self.past_backoff_limit(&job_key, run_policy, replicas, &pods)? {
            let message =
                format!("Job {job_key} has failed because it has reached the specified backoff limit");
            warn!("{}", message);
            return Ok(LifecycleDecision::Fail {
                reason: FailureReason::BackoffLimitExceeded,
                message,
            });
        }

        if deadline::past_active_deadline_at(run_policy, status, now) {
            let message = format!(
                "Job {job_key} has failed because it was active longer than the specified deadline"
            );
            warn!("{}", message);
            return Ok(LifecycleDecision::Fail {
                reason: FailureReason::DeadlineExceeded,
                message,
            });
        }

        let requeue_after = deadline::active_deadline_remaining(run_policy, status, now)
            .map(|remaining| self.config.lifecycle.cap_requeue(remaining));
        Ok(LifecycleDecision::Continue { requeue_after })
    }

    async fn finish(
        &self,
        job: &A::Job,
        job_key: &str,
        run_policy: &RunPolicy,
        status: &JobStatus,
        pods: &[Pod],
        now: DateTime<Utc>,
    ) -> Result<LifecycleDecision> {
        let cleaned = self.delete_pods_and_services(run_policy, job, pods).await;

        let finalized = if status.completion_time.is_some() {
            self.cleanup_job_at(run_policy, status, job, now).await
        } else {
            warn!(
                job = %job_key,
                "Finished job has no completion time yet, skipping TTL cleanup"
            );
            Ok(Finalization::Retained)
        };

        let finalization = match (cleaned, finalized) {
            (Ok(_), Ok(finalization)) => finalization,
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(cleanup_err), Err(finalize_err)) => {
                return Err(Error::Aggregate(vec![cleanup_err, finalize_err]))
            }
        };

        if !finalization.is_deleted() && status::is_succeeded(status) {
            self.settle_replica_statuses(job, job_key, status).await?;
        }

        Ok(LifecycleDecision::Finished(finalization))
    }

    /// Pods of a succeeded job may be gone now, so active replicas are
    /// counted as succeeded.
    async fn settle_replica_statuses(
        &self,
        job: &A::Job,
        job_key: &str,
        status: &JobStatus,
    ) -> Result<()> {
        if status.replica_statuses.values().all(|rs| rs.active == 0) {
            return Ok(());
        }

        let mut settled = status.clone();
        for replica_status in settled.replica_statuses.values_mut() {
            replica_status.succeeded += replica_status.active;
            replica_status.active = 0;
        }
        self.adapter.update_job_status(job, &settled).await?;
        info!(job = %job_key, "Settled replica statuses of succeeded job");
        Ok(())
    }
}
