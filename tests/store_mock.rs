#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

use chainlink_operator::api::v1alpha1::{ChainlinkJob, ChainlinkJobSpec, ChainlinkNode, ChainlinkNodeSpec};
use chainlink_operator::domain::store::{ClusterStore, CreateOutcome, MemoryStore, ObjectKey};
use chainlink_operator::error::{Error, Result};

/// Store operations a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetNode,
    CreateDeployment,
    CreateService,
    UpdateNodeStatus,
    UpdateJobStatus,
}

/// `MemoryStore` wrapper that counts writes and injects failures.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    /// Remaining failures per operation; `None` fails forever.
    failures: Arc<Mutex<HashMap<StoreOp, Option<usize>>>>,
    strip_node_uid: Arc<AtomicBool>,
    pub deployment_creates: Arc<AtomicUsize>,
    pub service_creates: Arc<AtomicUsize>,
    pub node_status_updates: Arc<AtomicUsize>,
    pub job_status_updates: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, op: StoreOp) {
        self.failures.lock().unwrap().insert(op, None);
    }

    /// Fails the next `times` calls of `op`, then lets them through.
    pub fn fail_times(&self, op: StoreOp, times: usize) {
        self.failures.lock().unwrap().insert(op, Some(times));
    }

    /// Serves nodes as if the API server had not assigned them a uid.
    pub fn strip_node_uid(&self) {
        self.strip_node_uid.store(true, Ordering::SeqCst);
    }

    fn check(&self, op: StoreOp) -> Result<()> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&op) {
            None | Some(Some(0)) => Ok(()),
            Some(None) => Err(Error::StoreError(format!("injected failure on {:?}", op))),
            Some(Some(remaining)) => {
                *remaining -= 1;
                Err(Error::StoreError(format!("injected failure on {:?}", op)))
            }
        }
    }
}

#[async_trait]
impl ClusterStore for RecordingStore {
    async fn get_node(&self, key: &ObjectKey) -> Result<Option<ChainlinkNode>> {
        self.check(StoreOp::GetNode)?;
        let mut node = self.inner.get_node(key).await?;
        if self.strip_node_uid.load(Ordering::SeqCst) {
            if let Some(node) = node.as_mut() {
                node.metadata.uid = None;
            }
        }
        Ok(node)
    }

    async fn update_node_status(&self, node: &ChainlinkNode) -> Result<()> {
        self.check(StoreOp::UpdateNodeStatus)?;
        self.node_status_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_node_status(node).await
    }

    async fn get_job(&self, key: &ObjectKey) -> Result<Option<ChainlinkJob>> {
        self.inner.get_job(key).await
    }

    async fn update_job_status(&self, job: &ChainlinkJob) -> Result<()> {
        self.check(StoreOp::UpdateJobStatus)?;
        self.job_status_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update_job_status(job).await
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Option<Deployment>> {
        self.inner.get_deployment(key).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<CreateOutcome> {
        self.check(StoreOp::CreateDeployment)?;
        self.deployment_creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_deployment(deployment).await
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Option<Service>> {
        self.inner.get_service(key).await
    }

    async fn create_service(&self, service: &Service) -> Result<CreateOutcome> {
        self.check(StoreOp::CreateService)?;
        self.service_creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_service(service).await
    }
}

pub fn node(name: &str, namespace: &str) -> ChainlinkNode {
    let mut node = ChainlinkNode::new(name, ChainlinkNodeSpec::default());
    node.metadata.namespace = Some(namespace.to_string());
    node
}

pub fn job(name: &str, namespace: &str, node_ref: &str, document: &str) -> ChainlinkJob {
    let mut job = ChainlinkJob::new(name, ChainlinkJobSpec { chainlink_node: node_ref.to_string(), job_spec: document.to_string() });
    job.metadata.namespace = Some(namespace.to_string());
    job
}
