//! Failure budget: cumulative container restarts against `backoffLimit`.

use crate::api::{ReplicaSpecs, RunPolicy};
use crate::error::{Error, Result};
use crate::labels::replica_type_of;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

const UNLABELED: &str = "<none>";

fn container_restarts(pod: &Pod, statuses: Option<&Vec<ContainerStatus>>) -> Result<i64> {
    let mut total = 0i64;
    for status in statuses.into_iter().flatten() {
        if status.restart_count < 0 {
            return Err(Error::InvalidPodStatus {
                pod: pod.name_any(),
                reason: format!(
                    "container {} reports negative restart count {}",
                    status.name, status.restart_count
                ),
            });
        }
        total += i64::from(status.restart_count);
    }
    Ok(total)
}

/// Restarts of every init and regular container of `pod`. A pod without
/// container statuses contributes zero.
pub fn pod_restarts(pod: &Pod) -> Result<i64> {
    let Some(status) = pod.status.as_ref() else {
        return Ok(0);
    };
    Ok(container_restarts(pod, status.init_container_statuses.as_ref())?
        + container_restarts(pod, status.container_statuses.as_ref())?)
}

/// Sum of restarts over `pods`.
pub fn total_restarts(pods: &[Pod]) -> Result<i64> {
    pods.iter().map(pod_restarts).sum()
}

/// True once the job's total restarts exceed `backoffLimit` (strictly).
/// An unset limit is never exceeded.
///
/// `replicas` only shapes the debug breakdown; every owned pod counts.
pub fn past_backoff_limit(
    job_name: &str,
    run_policy: &RunPolicy,
    replicas: &ReplicaSpecs,
    pods: &[Pod],
) -> Result<bool> {
    let Some(limit) = run_policy.backoff_limit else {
        return Ok(false);
    };

    let mut by_type: BTreeMap<String, i64> = replicas
        .keys()
        .map(|rtype| (rtype.as_str().to_lowercase(), 0))
        .collect();
    let mut total = 0i64;
    for pod in pods {
        let restarts = pod_restarts(pod)?;
        total += restarts;
        let rtype = replica_type_of(&pod.metadata).unwrap_or(UNLABELED);
        *by_type.entry(rtype.to_lowercase()).or_default() += restarts;
    }

    let exceeded = total > i64::from(limit);
    debug!(
        job = %job_name,
        restarts = total,
        limit,
        exceeded,
        breakdown = ?by_type,
        "Evaluated backoff limit"
    );
    Ok(exceeded)
}
