use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkNode};
use crate::domain::config::OperatorConfig;
use crate::domain::context::InvocationContext;
use crate::domain::job::{JobSubmitter, SubmissionOutcome};
use crate::domain::node::{NodeReconciler, ReconcileOutcome};
use crate::domain::store::{KubeStore, ObjectKey};
use crate::error::Error;

const RETRY_BACKOFF: Duration = Duration::from_secs(5);
const PERMANENT_FAILURE_BACKOFF: Duration = Duration::from_secs(300);
const BACKOFF_JITTER: f64 = 0.2;

/// Shared state handed to every reconcile invocation.
pub struct Dispatcher {
    pub node_reconciler: NodeReconciler<KubeStore>,
    pub job_submitter: JobSubmitter<KubeStore>,
    pub config: Arc<OperatorConfig>,
    pub shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(client: Client, config: OperatorConfig, shutdown: CancellationToken) -> Self {
        let store = Arc::new(KubeStore::new(client));
        let config = Arc::new(config);

        Dispatcher {
            node_reconciler: NodeReconciler::new(Arc::clone(&store), Arc::clone(&config)),
            job_submitter: JobSubmitter::new(store, Arc::clone(&config)),
            config,
            shutdown,
        }
    }

    fn invocation(&self) -> InvocationContext {
        InvocationContext::new(self.shutdown.child_token(), self.config.reconcile_timeout)
    }
}

pub fn action_for(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

/// Requeue delay after a failed invocation, jittered so that a fleet of
/// failing objects does not retry in lockstep.
pub fn backoff_for(error: &Error) -> Duration {
    let base = if error.is_retryable() { RETRY_BACKOFF } else { PERMANENT_FAILURE_BACKOFF };
    let jitter_scale: f64 = rand::rng().random_range(-BACKOFF_JITTER..=BACKOFF_JITTER);
    base.mul_f64(1.0 + jitter_scale)
}

async fn reconcile_node(node: Arc<ChainlinkNode>, dispatcher: Arc<Dispatcher>) -> Result<Action, Error> {
    let key = ObjectKey::of(node.as_ref());
    let outcome = dispatcher.node_reconciler.reconcile(&key, &dispatcher.invocation()).await?;
    Ok(action_for(outcome))
}

fn node_error_policy(node: Arc<ChainlinkNode>, error: &Error, _dispatcher: Arc<Dispatcher>) -> Action {
    let delay = backoff_for(error);
    log::warn!("Reconcile of ChainlinkNode {} failed, retrying in {:?}: {}", node.name_any(), delay, error);
    Action::requeue(delay)
}

async fn reconcile_job(job: Arc<ChainlinkJob>, dispatcher: Arc<Dispatcher>) -> Result<Action, Error> {
    let key = ObjectKey::of(job.as_ref());
    match dispatcher.job_submitter.submit(&key, &dispatcher.invocation()).await? {
        SubmissionOutcome::Rejected { .. } => log::debug!("ChainlinkJob {} is waiting for a corrected job definition", key),
        SubmissionOutcome::Deleted
        | SubmissionOutcome::AlreadySubmitted
        | SubmissionOutcome::AlreadyRejected
        | SubmissionOutcome::Created { .. } => {}
    }
    Ok(Action::await_change())
}

fn job_error_policy(job: Arc<ChainlinkJob>, error: &Error, _dispatcher: Arc<Dispatcher>) -> Action {
    let delay = backoff_for(error);
    log::warn!("Submission of ChainlinkJob {} failed, retrying in {:?}: {}", job.name_any(), delay, error);
    Action::requeue(delay)
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Runs the node and job controllers until `shutdown` is cancelled.
///
/// Deployments and Services are watched as owned objects so that their
/// changes re-trigger the owning `ChainlinkNode`.
pub async fn run(client: Client, config: OperatorConfig, namespace: Option<String>, shutdown: CancellationToken) {
    let namespace = namespace.as_deref();
    let dispatcher = Arc::new(Dispatcher::new(client.clone(), config, shutdown.clone()));

    let node_controller = Controller::new(scoped_api::<ChainlinkNode>(&client, namespace), watcher::Config::default())
        .owns(scoped_api::<Deployment>(&client, namespace), watcher::Config::default())
        .owns(scoped_api::<Service>(&client, namespace), watcher::Config::default())
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(reconcile_node, node_error_policy, Arc::clone(&dispatcher))
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => log::debug!("ChainlinkNode {} reconciled: {:?}", object.name, action),
                Err(e) => log::warn!("ChainlinkNode controller error: {}", e),
            }
        });

    let job_controller = Controller::new(scoped_api::<ChainlinkJob>(&client, namespace), watcher::Config::default())
        .graceful_shutdown_on(shutdown.clone().cancelled_owned())
        .run(reconcile_job, job_error_policy, Arc::clone(&dispatcher))
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => log::debug!("ChainlinkJob {} reconciled", object.name),
                Err(e) => log::warn!("ChainlinkJob controller error: {}", e),
            }
        });

    log::info!("Starting ChainlinkNode and ChainlinkJob controllers in namespace {}", namespace.unwrap_or("<all>"));
    tokio::join!(node_controller, job_controller);
    log::info!("Controllers stopped");
}
