//! Clean-pod policy engine: which pods and services of a finished job to delete.

use crate::adapter::JobAdapter;
use crate::api::CleanPodPolicy;
use crate::classify::{classify_pod, paired_service, PodClass};
use crate::error::{Error, Result};
use futures::future::join_all;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Resources selected for deletion.
#[derive(Debug, Default)]
pub struct CleanupPlan<'a> {
    pub pods: Vec<&'a Pod>,
    pub services: Vec<&'a Service>,
}

/// Names of what was deleted (or was already gone) in one pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub pods: Vec<String>,
    pub services: Vec<String>,
}

fn policy_selects(policy: CleanPodPolicy, class: PodClass) -> bool {
    match policy {
        CleanPodPolicy::None => false,
        CleanPodPolicy::Running => class == PodClass::Running,
        CleanPodPolicy::All => matches!(class, PodClass::Running | PodClass::Succeeded),
    }
}

/// Pure selection step. An unset policy selects nothing.
#[must_use]
pub fn plan_cleanup<'a>(
    policy: Option<CleanPodPolicy>,
    pods: &'a [Pod],
    services: &'a [Service],
) -> CleanupPlan<'a> {
    let Some(policy) = policy else {
        return CleanupPlan::default();
    };

    let mut plan = CleanupPlan::default();
    for pod in pods {
        if !policy_selects(policy, classify_pod(pod)) {
            continue;
        }
        plan.pods.push(pod);
        if let Some(service) = paired_service(pod, services) {
            plan.services.push(service);
        }
    }
    plan
}

/// Deletes the pods (and paired services) of `job` selected by `policy`.
///
/// Every selected resource gets one delete attempt even when others fail;
/// failures come back as one error. Not-found is success.
pub async fn delete_pods_and_services<A>(
    adapter: &A,
    policy: Option<CleanPodPolicy>,
    job: &A::Job,
    pods: &[Pod],
) -> Result<CleanupReport>
where
    A: JobAdapter + ?Sized,
{
    let job_key = adapter.job_key(job);
    let Some(policy) = policy else {
        debug!(job = %job_key, "No clean pod policy, keeping every pod");
        return Ok(CleanupReport::default());
    };
    if !pods
        .iter()
        .any(|pod| policy_selects(policy, classify_pod(pod)))
    {
        debug!(job = %job_key, %policy, "No pods to clean up");
        return Ok(CleanupReport::default());
    }

    let mut errors = Vec::new();
    let services = match adapter.list_owned_services(job).await {
        Ok(services) => services,
        Err(e) => {
            warn!(job = %job_key, error = %e, "Failed to list services, cleaning pods only");
            errors.push(e);
            Vec::new()
        }
    };

    let plan = plan_cleanup(Some(policy), pods, &services);

    let pod_results = join_all(plan.pods.iter().map(|pod| async move {
        (pod.name_any(), adapter.delete_pod(job, pod).await)
    }))
    .await;
    let service_results = join_all(plan.services.iter().map(|service| async move {
        (service.name_any(), adapter.delete_service(job, service).await)
    }))
    .await;

    let mut report = CleanupReport::default();
    for (name, result) in pod_results {
        match result {
            Ok(()) => report.pods.push(name),
            Err(e) if e.is_not_found() => report.pods.push(name),
            Err(e) => {
                warn!(job = %job_key, pod = %name, error = %e, "Failed to delete pod");
                errors.push(e);
            }
        }
    }
    for (name, result) in service_results {
        match result {
            Ok(()) => report.services.push(name),
            Err(e) if e.is_not_found() => report.services.push(name),
            Err(e) => {
                warn!(job = %job_key, service = %name, error = %e, "Failed to delete service");
                errors.push(e);
            }
        }
    }

    info!(
        job = %job_key,
        pods = report.pods.len(),
        services = report.services.len(),
        failures = errors.len(),
        "Cleaned up pods and services"
    );
    Error::from_batch(errors).map(|()| report)
}
