use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkNode};
use crate::domain::store::{ClusterStore, CreateOutcome, ObjectKey};
use crate::error::{Error, Result};

const FIELD_MANAGER: &str = "chainlink-operator";

/// `ClusterStore` backed by the Kubernetes API server. Cascade deletion of
/// owned objects is left to the cluster's garbage collector.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        KubeStore { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
    {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create<K>(&self, object: &K) -> Result<CreateOutcome>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Serialize + std::fmt::Debug,
    {
        let namespace = object.namespace().ok_or_else(|| Error::StoreError(format!("{} has no namespace", object.name_any())))?;
        let params = PostParams { field_manager: Some(FIELD_MANAGER.to_string()), ..Default::default() };

        match self.api::<K>(&namespace).create(&params, object).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(kube::Error::Api(response)) if response.code == 409 => Ok(CreateOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_status<K, S>(&self, object: &K, status: &S) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + std::fmt::Debug,
        S: Serialize,
    {
        let key = ObjectKey::of(object);
        let patch = Patch::Merge(json!({ "status": status }));
        self.api::<K>(&key.namespace).patch_status(&key.name, &PatchParams::apply(FIELD_MANAGER), &patch).await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_node(&self, key: &ObjectKey) -> Result<Option<ChainlinkNode>> {
        self.get(key).await
    }

    async fn update_node_status(&self, node: &ChainlinkNode) -> Result<()> {
        self.patch_status(node, &node.status).await
    }

    async fn get_job(&self, key: &ObjectKey) -> Result<Option<ChainlinkJob>> {
        self.get(key).await
    }

    async fn update_job_status(&self, job: &ChainlinkJob) -> Result<()> {
        self.patch_status(job, &job.status).await
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>> {
        self.get(key).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome> {
        self.create(deployment).await
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Option<Service>> {
        self.get(key).await
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome> {
        self.create(service).await
    }
}
