use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A job definition to register on a Chainlink node of the same namespace.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "oracle.example.com",
    version = "v1alpha1",
    kind = "ChainlinkJob",
    namespaced,
    status = "ChainlinkJobStatus",
    shortname = "clj",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ChainlinkJobSpec {
    /// Name of the `ChainlinkNode` the job is registered on.
    pub chainlink_node: String,
    /// Job definition in the node's TOML job format, sent verbatim.
    pub job_spec: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainlinkJobStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Id the node assigned to the created job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Spec generation the last submission attempt was made for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
