//! Resource adapter: the per-kind access layer the lifecycle core drives.
//!
//! The core never talks to the API server directly. Every job kind hands it a
//! [`JobAdapter`] and the core only lists, deletes and patches through it.
//! [`KubeJobAdapter`] is the kube-rs implementation usable by any namespaced
//! job CRD whose pods and services carry the labels from [`crate::labels`].

use crate::api::JobStatus;
use crate::error::{Error, Result};
use crate::labels;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use std::marker::PhantomData;
use tracing::{debug, info, instrument};

/// Operations the lifecycle core needs from a job kind.
///
/// Deletes must treat an already-absent object as success. The core also
/// forgives [`Error::is_not_found`] errors, so an adapter that reports them
/// is not wrong, only noisier.
#[cfg_attr(test, mockall::automock(type Job = String;))]
#[async_trait]
pub trait JobAdapter: Send + Sync {
    /// The job object of this kind.
    type Job: Send + Sync;

    /// Identifier used in logs and errors, e.g. `namespace/name`.
    fn job_key(&self, job: &Self::Job) -> String;

    /// Pods controlled by `job`.
    async fn list_owned_pods(&self, job: &Self::Job) -> Result<Vec<Pod>>;

    /// Services controlled by `job`.
    async fn list_owned_services(&self, job: &Self::Job) -> Result<Vec<Service>>;

    async fn delete_pod(&self, job: &Self::Job, pod: &Pod) -> Result<()>;

    async fn delete_service(&self, job: &Self::Job, service: &Service) -> Result<()>;

    async fn delete_job(&self, job: &Self::Job) -> Result<()>;

    async fn update_job_status(&self, job: &Self::Job, status: &JobStatus) -> Result<()>;
}

/// kube-rs backed adapter for a namespaced job resource `K`.
pub struct KubeJobAdapter<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeJobAdapter<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeJobAdapter<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

/// True when `meta` has a controller owner reference pointing at `owner_uid`.
#[must_use]
pub fn is_controlled_by(meta: &ObjectMeta, owner_uid: &str) -> bool {
    meta.owner_references.as_ref().is_some_and(|refs| {
        refs.iter()
            .any(|owner| owner.controller == Some(true) && owner.uid == owner_uid)
    })
}

fn ignore_not_found(result: std::result::Result<(), kube::Error>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl<K> KubeJobAdapter<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    fn namespace_of(job: &K) -> Result<String> {
        job.namespace().ok_or_else(|| {
            Error::Adapter(format!("{} {} has no namespace", K::kind(&()), job.name_any()))
        })
    }

    fn uid_of(job: &K) -> Result<String> {
        job.uid().ok_or_else(|| {
            Error::Adapter(format!("{} {} has no uid", K::kind(&()), job.name_any()))
        })
    }

    async fn list_owned<R>(&self, job: &K) -> Result<Vec<R>>
    where
        R: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let namespace = Self::namespace_of(job)?;
        let uid = Self::uid_of(job)?;
        let api: Api<R> = Api::namespaced(self.client.clone(), &namespace);
        let params = ListParams::default().labels(&labels::job_selector(&job.name_any()));

        let items = api.list(&params).await?.items;
        Ok(items
            .into_iter()
            .filter(|item| is_controlled_by(item.meta(), &uid))
            .collect())
    }
}

#[async_trait]
impl<K> JobAdapter for KubeJobAdapter<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    type Job = K;

    fn job_key(&self, job: &K) -> String {
        match job.namespace() {
            Some(namespace) => format!("{namespace}/{}", job.name_any()),
            None => job.name_any(),
        }
    }

    #[instrument(skip(self, job), fields(job = %self.job_key(job)))]
    async fn list_owned_pods(&self, job: &K) -> Result<Vec<Pod>> {
        let pods: Vec<Pod> = self.list_owned(job).await?;
        debug!(count = pods.len(), "Listed owned pods");
        Ok(pods)
    }

    #[instrument(skip(self, job), fields(job = %self.job_key(job)))]
    async fn list_owned_services(&self, job: &K) -> Result<Vec<Service>> {
        let services: Vec<Service> = self.list_owned(job).await?;
        debug!(count = services.len(), "Listed owned services");
        Ok(services)
    }

    #[instrument(skip(self, job, pod), fields(job = %self.job_key(job), pod = %pod.name_any()))]
    async fn delete_pod(&self, job: &K, pod: &Pod) -> Result<()> {
        let namespace = match pod.namespace() {
            Some(namespace) => namespace,
            None => Self::namespace_of(job)?,
        };
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        let result = api
            .delete(&pod.name_any(), &DeleteParams::background())
            .await
            .map(|_| ());
        if ignore_not_found(result)? {
            info!("Deleted pod");
        } else {
            debug!("Pod already gone");
        }
        Ok(())
    }

    #[instrument(skip(self, job, service), fields(job = %self.job_key(job), service = %service.name_any()))]
    async fn delete_service(&self, job: &K, service: &Service) -> Result<()> {
        let namespace = match service.namespace() {
            Some(namespace) => namespace,
            None => Self::namespace_of(job)?,
        };
        let api: Api<Service> = Api::namespaced(self.client.clone(), &namespace);
        let result = api
            .delete(&service.name_any(), &DeleteParams::background())
            .await
            .map(|_| ());
        if ignore_not_found(result)? {
            info!("Deleted service");
        } else {
            debug!("Service already gone");
        }
        Ok(())
    }

    #[instrument(skip(self, job), fields(job = %self.job_key(job)))]
    async fn delete_job(&self, job: &K) -> Result<()> {
        let namespace = Self::namespace_of(job)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let result = api
            .delete(&job.name_any(), &DeleteParams::background())
            .await
            .map(|_| ());
        if ignore_not_found(result)? {
            info!(kind = %K::kind(&()), "Deleted job");
        } else {
            debug!(kind = %K::kind(&()), "Job already gone");
        }
        Ok(())
    }

    #[instrument(skip(self, job, status), fields(job = %self.job_key(job)))]
    async fn update_job_status(&self, job: &K, status: &JobStatus) -> Result<()> {
        let namespace = Self::namespace_of(job)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let patch = json!({ "status": status });
        api.patch_status(&job.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!("Patched job status");
        Ok(())
    }
}
