use std::sync::Arc;
use std::time::Duration;

use kube::ResourceExt;

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkJobStatus};
use crate::domain::config::OperatorConfig;
use crate::domain::context::InvocationContext;
use crate::domain::job::node_api_client::{CreateJobResult, NodeApiClient};
use crate::domain::node::resources::node_service_url;
use crate::domain::status::{CONDITION_FALSE, CONDITION_TRUE, find_condition, new_condition, set_status_condition};
use crate::domain::store::{ClusterStore, ObjectKey};
use crate::error::{Error, Result};

pub const CONDITION_SUBMITTED: &str = "Submitted";
pub const REASON_JOB_CREATED: &str = "JobCreated";
pub const REASON_INPUT_ERRORS: &str = "InputErrors";
pub const REASON_AUTHENTICATION_FAILED: &str = "AuthenticationFailed";
pub const REASON_SUBMISSION_FAILED: &str = "SubmissionFailed";

/// Target of the one structured event emitted per submission attempt.
pub const SUBMISSION_TARGET: &str = "chainlink_operator::submission";

const STATUS_WRITE_ATTEMPTS: u32 = 3;
const STATUS_WRITE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Terminal state of one submission pass.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// The job resource is gone.
    Deleted,
    /// This generation was already registered on the node.
    AlreadySubmitted,
    /// The node already refused this generation.
    AlreadyRejected,
    Created { job_id: String },
    /// The node refused the job definition. Needs a spec change.
    Rejected { errors: Vec<String> },
}

/// Registers `ChainlinkJob` definitions on their node.
///
/// One pass walks `Fetched -> Authenticating -> Submitting -> Done`. A failed
/// authentication ends the pass without attempting the submission.
pub struct JobSubmitter<S: ClusterStore> {
    store: Arc<S>,
    config: Arc<OperatorConfig>,
}

impl<S: ClusterStore> JobSubmitter<S> {
    pub fn new(store: Arc<S>, config: Arc<OperatorConfig>) -> Self {
        JobSubmitter { store, config }
    }

    /// Base URL of the operator API of the node a job targets.
    pub fn node_endpoint(&self, job: &ChainlinkJob) -> String {
        match &self.config.node_api_base_url {
            Some(base_url) => base_url.clone(),
            None => node_service_url(&job.spec.chainlink_node, &job.namespace().unwrap_or_default()),
        }
    }

    pub async fn submit(&self, key: &ObjectKey, ctx: &InvocationContext) -> Result<SubmissionOutcome> {
        let Some(mut job) = ctx.run(self.store.get_job(key)).await? else {
            log::info!("ChainlinkJob {} not found. Ignoring since it must have been deleted", key);
            return Ok(SubmissionOutcome::Deleted);
        };

        if let Some(settled) = settled_outcome(&job) {
            log::debug!("ChainlinkJob {} generation {:?} already settled: {:?}", key, job.metadata.generation, settled);
            return Ok(settled);
        }

        let endpoint = self.node_endpoint(&job);
        log::info!("Submitting ChainlinkJob {} to node {} at {}", key, job.spec.chainlink_node, endpoint);

        let client = NodeApiClient::new(endpoint, self.config.request_timeout, self.config.node_api_version)?;

        if let Err(e) = ctx.run(client.authenticate(&self.config.credentials)).await {
            log::error!("Failed to authenticate with Chainlink node at {} for ChainlinkJob {}: {}", client.base_url(), key, e);
            log_submission(key, &job, REASON_AUTHENTICATION_FAILED, None);
            let message = format!("Failed to authenticate with node {}: {}", job.spec.chainlink_node, e);
            self.record(&mut job, CONDITION_FALSE, REASON_AUTHENTICATION_FAILED, message, None, ctx).await;
            return Err(e);
        }

        match ctx.run(client.create_job(&job.spec.job_spec)).await {
            Ok(CreateJobResult::Created { job_id }) => {
                log::info!("Job {} created on Chainlink node {} for ChainlinkJob {}", job_id, job.spec.chainlink_node, key);
                log_submission(key, &job, REASON_JOB_CREATED, Some(&job_id));
                let message = format!("Job {} created on node {}", job_id, job.spec.chainlink_node);
                self.record_created(&mut job, message, &job_id, ctx).await?;
                Ok(SubmissionOutcome::Created { job_id })
            }
            Ok(CreateJobResult::Rejected { errors }) => {
                log::warn!("Chainlink node {} rejected ChainlinkJob {}: {}", job.spec.chainlink_node, key, errors.join("; "));
                log_submission(key, &job, REASON_INPUT_ERRORS, None);
                let message = format!("Node {} rejected the job: {}", job.spec.chainlink_node, errors.join("; "));
                self.record(&mut job, CONDITION_FALSE, REASON_INPUT_ERRORS, message, None, ctx).await;
                Ok(SubmissionOutcome::Rejected { errors })
            }
            Err(e) => {
                log::error!("Failed to submit ChainlinkJob {} to node at {}: {}", key, client.base_url(), e);
                log_submission(key, &job, REASON_SUBMISSION_FAILED, None);
                let message = format!("Failed to submit job to node {}: {}", job.spec.chainlink_node, e);
                self.record(&mut job, CONDITION_FALSE, REASON_SUBMISSION_FAILED, message, None, ctx).await;
                Err(e)
            }
        }
    }

    /// Writes the `Submitted` condition. A failing status write is logged and
    /// does not mask the submission result.
    async fn record(&self, job: &mut ChainlinkJob, status: &str, reason: &str, message: String, job_id: Option<String>, ctx: &InvocationContext) {
        if !apply_submitted(job, status, reason, message, job_id) {
            return;
        }

        match ctx.run(self.store.update_job_status(job)).await {
            Ok(()) => {}
            Err(Error::Cancelled) | Err(Error::DeadlineExceeded) => {
                log::warn!("Skipped status update of ChainlinkJob {}, invocation ended", job.name_any());
            }
            Err(e) => log::error!("Failed to update ChainlinkJob {} status: {}", job.name_any(), e),
        }
    }

    /// Writes `Submitted=True` after the node created the job. The write is
    /// retried because a lost write leads to a duplicate job on the next pass.
    async fn record_created(&self, job: &mut ChainlinkJob, message: String, job_id: &str, ctx: &InvocationContext) -> Result<()> {
        if !apply_submitted(job, CONDITION_TRUE, REASON_JOB_CREATED, message, Some(job_id.to_string())) {
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            let error = match ctx.run(self.store.update_job_status(job)).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            let interrupted = matches!(error, Error::Cancelled | Error::DeadlineExceeded);
            if interrupted || attempt >= STATUS_WRITE_ATTEMPTS {
                log::error!(
                    "Job {} exists on node {} but ChainlinkJob {} status was not recorded after {} attempt(s): {}",
                    job_id,
                    job.spec.chainlink_node,
                    job.name_any(),
                    attempt,
                    error
                );
                return Err(Error::UnrecordedJobError { job_id: job_id.to_string(), reason: error.to_string() });
            }

            log::warn!("Status write of ChainlinkJob {} failed (attempt {}), retrying: {}", job.name_any(), attempt, error);
            attempt += 1;
            ctx.run(async {
                tokio::time::sleep(STATUS_WRITE_RETRY_DELAY).await;
                Ok(())
            })
            .await
            .map_err(|e| Error::UnrecordedJobError { job_id: job_id.to_string(), reason: e.to_string() })?;
        }
    }
}

/// Sets the `Submitted` condition and observed generation on the local copy.
/// Returns whether anything changed.
fn apply_submitted(job: &mut ChainlinkJob, status: &str, reason: &str, message: String, job_id: Option<String>) -> bool {
    let generation = job.metadata.generation;
    let job_status = job.status.get_or_insert_with(ChainlinkJobStatus::default);

    let changed = set_status_condition(&mut job_status.conditions, new_condition(CONDITION_SUBMITTED, status, reason, message, generation));
    let generation_changed = job_status.observed_generation != generation;
    job_status.observed_generation = generation;
    let id_changed = job_id.is_some() && job_status.job_id != job_id;
    if job_id.is_some() {
        job_status.job_id = job_id;
    }

    changed || generation_changed || id_changed
}

/// Outcome already recorded for the current generation, if it needs no new
/// submission: either created or refused by the node.
fn settled_outcome(job: &ChainlinkJob) -> Option<SubmissionOutcome> {
    let status = job.status.as_ref()?;
    if status.observed_generation.is_none() || status.observed_generation != job.metadata.generation {
        return None;
    }

    let condition = find_condition(&status.conditions, CONDITION_SUBMITTED)?;
    match (condition.status.as_str(), condition.reason.as_str()) {
        (CONDITION_TRUE, _) => Some(SubmissionOutcome::AlreadySubmitted),
        (CONDITION_FALSE, REASON_INPUT_ERRORS) => Some(SubmissionOutcome::AlreadyRejected),
        _ => None,
    }
}

fn log_submission(key: &ObjectKey, job: &ChainlinkJob, reason: &str, job_id: Option<&str>) {
    tracing::info!(
        target: SUBMISSION_TARGET,
        Job = %key,
        Node = %job.spec.chainlink_node,
        Generation = ?job.metadata.generation,
        Reason = reason,
        JobId = ?job_id,
    );
}
