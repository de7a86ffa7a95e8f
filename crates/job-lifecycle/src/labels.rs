//! Labels and names shared by a job and the pods/services it owns.

use crate::api::ReplicaType;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Label that stores the owning job name
pub const LABEL_JOB_NAME: &str = "job-lifecycle.dev/job-name";
/// Label that stores the replica type (lower-cased)
pub const LABEL_REPLICA_TYPE: &str = "job-lifecycle.dev/replica-type";
/// Label that stores the replica index within its group
pub const LABEL_REPLICA_INDEX: &str = "job-lifecycle.dev/replica-index";

/// Labels every pod and service of `job_name` carries.
#[must_use]
pub fn gen_labels(job_name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_JOB_NAME.to_string(), job_name.replace('/', "-"));
    labels
}

/// Label selector matching everything `gen_labels(job_name)` marks.
#[must_use]
pub fn job_selector(job_name: &str) -> String {
    gen_labels(job_name)
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Name of the pod (and of its paired service) for one replica.
/// Format: {job}-{replica type}-{index}
#[must_use]
pub fn gen_general_name(job_name: &str, replica_type: &ReplicaType, index: u32) -> String {
    let rtype = replica_type.as_str().to_lowercase();
    format!("{job_name}-{rtype}-{index}").replace('/', "-")
}

/// Replica type label value of an object, if any.
#[must_use]
pub fn replica_type_of(meta: &ObjectMeta) -> Option<&str> {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(LABEL_REPLICA_TYPE))
        .map(String::as_str)
}
