use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a Chainlink node.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "oracle.example.com",
    version = "v1alpha1",
    kind = "ChainlinkNode",
    namespaced,
    status = "ChainlinkNodeStatus",
    shortname = "cln",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ChainlinkNodeSpec {
    /// Overrides the operator-wide node image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainlinkNodeStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
