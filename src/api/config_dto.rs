use serde::{Deserialize, Serialize};

/// On-disk operator configuration. Every field is optional; missing values
/// fall back to the defaults of `OperatorConfig`.
#[derive(Debug, Default, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigDto {
    pub node_image: Option<String>,
    pub postgres_image: Option<String>,
    pub postgres_password: Option<String>,
    pub api_email: Option<String>,
    pub api_password: Option<String>,
    pub requeue_after_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub reconcile_timeout_secs: Option<u64>,
    pub node_api_base_url: Option<String>,
    pub node_api_version: Option<String>,
}
