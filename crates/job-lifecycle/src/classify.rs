//! Partition of a job's pods (and their paired services) by retention class.

use k8s_openapi::api::core::v1::{Pod, Service};
use kube::ResourceExt;

pub const POD_PENDING: &str = "Pending";
pub const POD_RUNNING: &str = "Running";
pub const POD_SUCCEEDED: &str = "Succeeded";
pub const POD_FAILED: &str = "Failed";
pub const POD_UNKNOWN: &str = "Unknown";

/// Retention class of a pod. Failed pods are kept as diagnostic evidence;
/// pending and unknown pods have not settled and are never cleanup candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodClass {
    Running,
    Succeeded,
    Retained,
    Unsettled,
}

/// Phase reported on the pod, if any.
#[must_use]
pub fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|status| status.phase.as_deref())
}

#[must_use]
pub fn classify_pod(pod: &Pod) -> PodClass {
    match pod_phase(pod) {
        Some(POD_RUNNING) => PodClass::Running,
        Some(POD_SUCCEEDED) => PodClass::Succeeded,
        Some(POD_FAILED) => PodClass::Retained,
        _ => PodClass::Unsettled,
    }
}

/// Service paired with `pod`: same name, same namespace.
#[must_use]
pub fn paired_service<'a>(pod: &Pod, services: &'a [Service]) -> Option<&'a Service> {
    let name = pod.name_any();
    let namespace = pod.namespace();
    services
        .iter()
        .find(|service| service.name_any() == name && service.namespace() == namespace)
}
