use std::path::Path;

use kube::CustomResourceExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

use crate::api::v1alpha1::{ChainlinkJob, ChainlinkNode};
use crate::domain::config::{EnvSecretSource, OperatorConfig};
use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads the operator configuration, taking secrets from the environment.
pub fn load_operator_config(file_path: Option<&Path>) -> Result<OperatorConfig> {
    let config = OperatorConfig::load(file_path, &EnvSecretSource)?;
    log::info!("Operator configuration loaded. Node image: {}, requeue after {:?}", config.node_image, config.requeue_after);
    Ok(config)
}

/// The CustomResourceDefinitions this operator serves.
pub fn custom_resource_definitions() -> Vec<CustomResourceDefinition> {
    vec![ChainlinkNode::crd(), ChainlinkJob::crd()]
}
