use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Resource, ResourceExt};

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkNode};
use crate::error::Result;

pub mod kube_store;
pub mod memory_store;

pub use kube_store::KubeStore;
pub use memory_store::MemoryStore;

/// Namespaced identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectKey { namespace: namespace.into(), name: name.into() }
    }

    pub fn of<K: Resource>(object: &K) -> Self {
        ObjectKey { namespace: object.namespace().unwrap_or_default(), name: object.name_any() }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Result of a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another writer created the object first.
    AlreadyExists,
}

/// The slice of the cluster state store the reconcilers depend on.
///
/// `get_*` return `Ok(None)` for absent objects. Every other failure is an
/// error the caller surfaces for retry.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn get_node(&self, key: &ObjectKey) -> Result<Option<ChainlinkNode>>;
    async fn update_node_status(&self, node: &ChainlinkNode) -> Result<()>;

    async fn get_job(&self, key: &ObjectKey) -> Result<Option<ChainlinkJob>>;
    async fn update_job_status(&self, job: &ChainlinkJob) -> Result<()>;

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>>;
    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome>;

    async fn get_service(&self, key: &ObjectKey) -> Result<Option<Service>>;
    async fn create_service(&self, service: &Service) -> Result<CreateOutcome>;
}
