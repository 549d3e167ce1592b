use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;

use crate::api::v1alpha1::{ChainlinkNode, ChainlinkNodeStatus};
use crate::domain::config::OperatorConfig;
use crate::domain::context::InvocationContext;
use crate::domain::node::resources::{deployment_for_node, deployment_name, service_for_node, service_name};
use crate::domain::status::{CONDITION_FALSE, CONDITION_TRUE, new_condition, set_status_condition};
use crate::domain::store::{ClusterStore, CreateOutcome, ObjectKey};
use crate::error::{Error, Result};

pub const CONDITION_AVAILABLE: &str = "Available";
pub const REASON_RECONCILING: &str = "Reconciling";
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_PROGRESSING: &str = "Progressing";

/// What the dispatcher should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Steady state; wait for the next change event.
    Done,
    RequeueAfter(Duration),
}

/// Whether an owned resource had to be created during this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ensured {
    Existing,
    Created,
}

/// Converges the Deployment and Service of a `ChainlinkNode`.
pub struct NodeReconciler<S: ClusterStore> {
    store: Arc<S>,
    config: Arc<OperatorConfig>,
}

impl<S: ClusterStore> NodeReconciler<S> {
    pub fn new(store: Arc<S>, config: Arc<OperatorConfig>) -> Self {
        NodeReconciler { store, config }
    }

    pub async fn reconcile(&self, key: &ObjectKey, ctx: &InvocationContext) -> Result<ReconcileOutcome> {
        let Some(mut node) = ctx.run(self.store.get_node(key)).await? else {
            log::info!("ChainlinkNode {} not found. Ignoring since it must have been deleted", key);
            return Ok(ReconcileOutcome::Done);
        };

        let deployment = self.ensure_deployment(&mut node, ctx).await?;
        let service = self.ensure_service(&mut node, ctx).await?;

        if deployment == Ensured::Created || service == Ensured::Created {
            log::debug!("Created owned resources of ChainlinkNode {}, requeueing after {:?}", key, self.config.requeue_after);
            return Ok(ReconcileOutcome::RequeueAfter(self.config.requeue_after));
        }

        self.observe_availability(&mut node, ctx).await?;
        Ok(ReconcileOutcome::Done)
    }

    async fn ensure_deployment(&self, node: &mut ChainlinkNode, ctx: &InvocationContext) -> Result<Ensured> {
        let key = ObjectKey::new(node.namespace().unwrap_or_default(), deployment_name(&node.name_any()));
        if ctx.run(self.store.get_deployment(&key)).await?.is_some() {
            return Ok(Ensured::Existing);
        }

        let created = match deployment_for_node(node, &self.config) {
            Ok(deployment) => {
                log::info!("Creating a new Deployment {}", key);
                ctx.run(self.store.create_deployment(&deployment)).await
            }
            Err(e) => {
                log::error!("Failed to define new Deployment resource for ChainlinkNode {}: {}", node.name_any(), e);
                Err(e)
            }
        };

        self.settle_creation(node, "Deployment", created, ctx).await
    }

    async fn ensure_service(&self, node: &mut ChainlinkNode, ctx: &InvocationContext) -> Result<Ensured> {
        let key = ObjectKey::new(node.namespace().unwrap_or_default(), service_name(&node.name_any()));
        if ctx.run(self.store.get_service(&key)).await?.is_some() {
            return Ok(Ensured::Existing);
        }

        let created = match service_for_node(node) {
            Ok(service) => {
                log::info!("Creating a new Service {}", key);
                ctx.run(self.store.create_service(&service)).await
            }
            Err(e) => {
                log::error!("Failed to define new Service resource for ChainlinkNode {}: {}", node.name_any(), e);
                Err(e)
            }
        };

        self.settle_creation(node, "Service", created, ctx).await
    }

    /// Maps a create attempt to `Ensured`, recording failures on the node status.
    async fn settle_creation(
        &self,
        node: &mut ChainlinkNode,
        kind: &str,
        created: Result<CreateOutcome>,
        ctx: &InvocationContext,
    ) -> Result<Ensured> {
        match created {
            Ok(CreateOutcome::Created) => Ok(Ensured::Created),
            Ok(CreateOutcome::AlreadyExists) => {
                log::debug!("{} of ChainlinkNode {} was created concurrently", kind, node.name_any());
                Ok(Ensured::Existing)
            }
            Err(e @ (Error::Cancelled | Error::DeadlineExceeded)) => Err(e),
            Err(e) => {
                log::error!("Failed to create {} for ChainlinkNode {}: {}", kind, node.name_any(), e);
                let message = format!("Failed to create {} for the custom resource ({}): ({})", kind, node.name_any(), e);
                self.set_available(node, CONDITION_FALSE, REASON_RECONCILING, message, ctx).await?;
                Err(e)
            }
        }
    }

    /// Reflects the Deployment's rollout on the `Available` condition.
    async fn observe_availability(&self, node: &mut ChainlinkNode, ctx: &InvocationContext) -> Result<()> {
        let key = ObjectKey::new(node.namespace().unwrap_or_default(), deployment_name(&node.name_any()));
        let deployment = ctx.run(self.store.get_deployment(&key)).await?;

        let available_replicas = deployment.as_ref().map(available_replicas).unwrap_or(0);
        if available_replicas > 0 {
            let message = format!("Deployment for the custom resource ({}) has {} available replica(s)", node.name_any(), available_replicas);
            self.set_available(node, CONDITION_TRUE, REASON_RECONCILED, message, ctx).await
        } else {
            let message = format!("Waiting for the Deployment of the custom resource ({}) to become available", node.name_any());
            self.set_available(node, CONDITION_FALSE, REASON_PROGRESSING, message, ctx).await
        }
    }

    /// Writes the `Available` condition when it differs from the stored one.
    async fn set_available(&self, node: &mut ChainlinkNode, status: &str, reason: &str, message: String, ctx: &InvocationContext) -> Result<()> {
        let generation = node.metadata.generation;
        let node_status = node.status.get_or_insert_with(ChainlinkNodeStatus::default);

        let condition = new_condition(CONDITION_AVAILABLE, status, reason, message, generation);
        if !set_status_condition(&mut node_status.conditions, condition) {
            return Ok(());
        }

        if let Err(e) = ctx.run(self.store.update_node_status(node)).await {
            log::error!("Failed to update ChainlinkNode {} status: {}", node.name_any(), e);
            return Err(e);
        }
        Ok(())
    }
}

fn available_replicas(deployment: &Deployment) -> i32 {
    deployment.status.as_ref().and_then(|status| status.available_replicas).unwrap_or(0)
}
