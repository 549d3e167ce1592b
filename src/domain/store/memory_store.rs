use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Resource;
use kube::api::ObjectMeta;
use uuid::Uuid;

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkNode};
use crate::domain::store::{ClusterStore, CreateOutcome, ObjectKey};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnedKind {
    Deployment,
    Service,
}

#[derive(Debug, Default)]
struct StoreInner {
    nodes: BTreeMap<ObjectKey, ChainlinkNode>,
    jobs: BTreeMap<ObjectKey, ChainlinkJob>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    services: BTreeMap<ObjectKey, Service>,

    /// Ownership relation table: owned object -> uid of its controller owner.
    owners: HashMap<(OwnedKind, ObjectKey), String>,
}

/// In-process `ClusterStore`.
///
/// Cascade deletion goes through an explicit ownership table: deleting a node
/// runs a sweep that removes every object whose controller owner no longer
/// exists.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// All maps and the ownership table are protected with a single lock.
    inner: Arc<Mutex<StoreInner>>,
}

/// Stamps uid, generation and resource version the way an API server would.
fn admit(meta: &mut ObjectMeta) {
    if meta.uid.is_none() {
        meta.uid = Some(Uuid::new_v4().to_string());
    }
    if meta.generation.is_none() {
        meta.generation = Some(1);
    }
    meta.resource_version = Some("1".to_string());
}

fn bump_resource_version(meta: &mut ObjectMeta) {
    let next = meta.resource_version.as_deref().and_then(|version| version.parse::<u64>().ok()).unwrap_or(0) + 1;
    meta.resource_version = Some(next.to_string());
}

fn controller_uid(meta: &ObjectMeta) -> Option<String> {
    meta.owner_references.as_ref()?.iter().find(|owner| owner.controller == Some(true)).map(|owner| owner.uid.clone())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a node as a user would create it and returns the admitted copy.
    pub fn insert_node(&self, mut node: ChainlinkNode) -> ChainlinkNode {
        admit(node.meta_mut());
        self.lock().nodes.insert(ObjectKey::of(&node), node.clone());
        node
    }

    /// Stores a job as a user would create it and returns the admitted copy.
    pub fn insert_job(&self, mut job: ChainlinkJob) -> ChainlinkJob {
        admit(job.meta_mut());
        self.lock().jobs.insert(ObjectKey::of(&job), job.clone());
        job
    }

    /// Replaces a job spec and bumps its generation.
    pub fn update_job_spec(&self, key: &ObjectKey, job_spec: &str) -> Result<()> {
        let mut guard = self.lock();
        let job = guard.jobs.get_mut(key).ok_or_else(|| Error::ObjectNotFound(key.to_string()))?;
        job.spec.job_spec = job_spec.to_string();
        job.metadata.generation = Some(job.metadata.generation.unwrap_or(0) + 1);
        bump_resource_version(&mut job.metadata);
        Ok(())
    }

    /// Deletes a node and sweeps everything it owned.
    pub fn delete_node(&self, key: &ObjectKey) -> Option<ChainlinkNode> {
        let mut guard = self.lock();
        let removed = guard.nodes.remove(key);
        if removed.is_some() {
            Self::sweep_locked(&mut guard);
        }
        removed
    }

    pub fn delete_job(&self, key: &ObjectKey) -> Option<ChainlinkJob> {
        self.lock().jobs.remove(key)
    }

    /// Removes owned objects whose controller owner is gone. Returns how many
    /// objects were deleted.
    pub fn sweep_orphans(&self) -> usize {
        Self::sweep_locked(&mut self.lock())
    }

    fn sweep_locked(inner: &mut StoreInner) -> usize {
        let live_uids: Vec<String> = inner.nodes.values().filter_map(|node| node.metadata.uid.clone()).collect();

        let orphans: Vec<(OwnedKind, ObjectKey)> =
            inner.owners.iter().filter(|(_, owner_uid)| !live_uids.contains(owner_uid)).map(|(child, _)| child.clone()).collect();

        for (kind, key) in &orphans {
            match kind {
                OwnedKind::Deployment => {
                    inner.deployments.remove(key);
                }
                OwnedKind::Service => {
                    inner.services.remove(key);
                }
            }
            inner.owners.remove(&(*kind, key.clone()));
        }

        if !orphans.is_empty() {
            log::debug!("Swept {} orphaned objects", orphans.len());
        }
        orphans.len()
    }

    pub fn node(&self, key: &ObjectKey) -> Option<ChainlinkNode> {
        self.lock().nodes.get(key).cloned()
    }

    pub fn job(&self, key: &ObjectKey) -> Option<ChainlinkJob> {
        self.lock().jobs.get(key).cloned()
    }

    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        self.lock().deployments.get(key).cloned()
    }

    pub fn service(&self, key: &ObjectKey) -> Option<Service> {
        self.lock().services.get(key).cloned()
    }

    pub fn deployment_count(&self) -> usize {
        self.lock().deployments.len()
    }

    pub fn service_count(&self) -> usize {
        self.lock().services.len()
    }

    /// Uid of the controller owner recorded for an owned object.
    pub fn owner_of(&self, kind: OwnedKind, key: &ObjectKey) -> Option<String> {
        self.lock().owners.get(&(kind, key.clone())).cloned()
    }

    /// Overwrites a stored deployment, e.g. to simulate rollout progress.
    pub fn put_deployment(&self, deployment: Deployment) {
        self.lock().deployments.insert(ObjectKey::of(&deployment), deployment);
    }

    fn insert_owned<K: Resource + Clone>(
        objects: &mut BTreeMap<ObjectKey, K>,
        owners: &mut HashMap<(OwnedKind, ObjectKey), String>,
        kind: OwnedKind,
        object: &K,
    ) -> Result<CreateOutcome> {
        let key = ObjectKey::of(object);
        if key.namespace.is_empty() {
            return Err(Error::StoreError(format!("{:?} {} has no namespace", kind, key.name)));
        }
        if objects.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let mut stored = object.clone();
        admit(stored.meta_mut());
        if let Some(owner_uid) = controller_uid(stored.meta()) {
            owners.insert((kind, key.clone()), owner_uid);
        }
        objects.insert(key, stored);
        Ok(CreateOutcome::Created)
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn get_node(&self, key: &ObjectKey) -> Result<Option<ChainlinkNode>> {
        Ok(self.node(key))
    }

    async fn update_node_status(&self, node: &ChainlinkNode) -> Result<()> {
        let key = ObjectKey::of(node);
        let mut guard = self.lock();
        let stored = guard.nodes.get_mut(&key).ok_or_else(|| Error::ObjectNotFound(key.to_string()))?;
        stored.status = node.status.clone();
        bump_resource_version(&mut stored.metadata);
        Ok(())
    }

    async fn get_job(&self, key: &ObjectKey) -> Result<Option<ChainlinkJob>> {
        Ok(self.job(key))
    }

    async fn update_job_status(&self, job: &ChainlinkJob) -> Result<()> {
        let key = ObjectKey::of(job);
        let mut guard = self.lock();
        let stored = guard.jobs.get_mut(&key).ok_or_else(|| Error::ObjectNotFound(key.to_string()))?;
        stored.status = job.status.clone();
        bump_resource_version(&mut stored.metadata);
        Ok(())
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>> {
        Ok(self.deployment(key))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        Self::insert_owned(&mut inner.deployments, &mut inner.owners, OwnedKind::Deployment, deployment)
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Option<Service>> {
        Ok(self.service(key))
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        Self::insert_owned(&mut inner.services, &mut inner.owners, OwnedKind::Service, service)
    }
}
