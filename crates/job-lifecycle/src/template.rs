//! Model output path injection for replica templates.
//!
//! An optional pre-processing step applied to replica specs before they are
//! submitted. Nothing in the lifecycle primitives calls it.

use crate::api::ReplicaSpecs;
use k8s_openapi::api::core::v1::EnvVar;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Environment variable holding the directory a job writes its model to.
pub const MODEL_PATH_ENV: &str = "KUBEDL_MODEL_PATH";
/// Mount path used when the storage backend does not name one.
pub const DEFAULT_MODEL_MOUNT_PATH: &str = "/kubedl-model";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalStorage {
    /// Host path backing the model.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    /// Node the host path lives on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NfsStorage {
    pub server: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwsEfsStorage {
    pub volume_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

/// Where a model version is stored. At most one backend is expected.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelStorage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_storage: Option<LocalStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NfsStorage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_efs: Option<AwsEfsStorage>,
}

impl ModelStorage {
    /// Path the model volume is mounted at inside containers.
    #[must_use]
    pub fn mount_path(&self) -> &str {
        let configured = if let Some(local) = &self.local_storage {
            local.mount_path.as_deref()
        } else if let Some(nfs) = &self.nfs {
            nfs.mount_path.as_deref()
        } else if let Some(efs) = &self.aws_efs {
            efs.mount_path.as_deref()
        } else {
            None
        };
        configured
            .filter(|path| !path.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL_MOUNT_PATH)
    }
}

/// Appends `KUBEDL_MODEL_PATH` to every container of every replica template
/// that does not define it yet.
pub fn add_model_path_env(replicas: &mut ReplicaSpecs, storage: &ModelStorage) {
    let mount_path = storage.mount_path();
    for spec in replicas.values_mut() {
        let Some(pod_spec) = spec.template.spec.as_mut() else {
            continue;
        };
        for container in &mut pod_spec.containers {
            let env = container.env.get_or_insert_with(Vec::new);
            if env.iter().any(|var| var.name == MODEL_PATH_ENV) {
                continue;
            }
            env.push(EnvVar {
                name: MODEL_PATH_ENV.to_string(),
                value: Some(mount_path.to_string()),
                value_from: None,
            });
        }
    }
}
