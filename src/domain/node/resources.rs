use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, SecretVolumeSource, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};

use crate::api::v1alpha1::ChainlinkNode;
use crate::domain::config::OperatorConfig;
use crate::error::{Error, Result};

pub const OPERATOR_API_PORT_NAME: &str = "operator-api";
pub const OPERATOR_API_PORT: i32 = 6688;
pub const SERVICE_PORT: i32 = 80;
pub const POSTGRES_PORT: i32 = 5432;

pub const NODE_CONTAINER_NAME: &str = "chainlink-node";
pub const POSTGRES_CONTAINER_NAME: &str = "chainlink-postgres";
pub const SECRET_VOLUME_NAME: &str = "secret-volume";
pub const CONFIG_VOLUME_NAME: &str = "config-volume";
pub const SECRETS_MOUNT_PATH: &str = "/chainlink/secrets/";
pub const CONFIG_MOUNT_PATH: &str = "/chainlink/config";

const NODE_COMMAND: &str = "chainlink";
const NODE_ARGS: [&str; 8] =
    ["node", "-config", "/chainlink/config/config.toml", "-secrets", "/chainlink/secrets/secrets.toml", "start", "-a", "/chainlink/secrets/apiuser.txt"];

pub fn deployment_name(node_name: &str) -> String {
    node_name.to_string()
}

pub fn service_name(node_name: &str) -> String {
    format!("{}-service", node_name)
}

pub fn secrets_name(node_name: &str) -> String {
    format!("{}-secrets", node_name)
}

pub fn config_map_name(node_name: &str) -> String {
    format!("{}-config", node_name)
}

/// In-cluster address of a node's operator API.
pub fn node_service_url(node_name: &str, namespace: &str) -> String {
    format!("http://{}.{}", service_name(node_name), namespace)
}

/// Labels shared by a node's Deployment, its pods and the Service selector.
pub fn labels_for_node(node_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), "Chainlink".to_string()),
        ("app.kubernetes.io/instance".to_string(), node_name.to_string()),
        ("app.kubernetes.io/part-of".to_string(), "chainlink-kubernetes-operator".to_string()),
        ("app.kubernetes.io/created-by".to_string(), "controller-manager".to_string()),
    ])
}

/// Metadata for an object owned by `node`. Fails when the node has not been
/// admitted by the store yet (no uid), since no owner reference can be built.
fn owned_metadata(node: &ChainlinkNode, kind: &'static str, name: String) -> Result<ObjectMeta> {
    let owner = node.controller_owner_ref(&()).ok_or_else(|| Error::ResourceDefinitionError {
        kind,
        owner: node.name_any(),
        reason: "the ChainlinkNode has no uid".to_string(),
    })?;
    let namespace = node.namespace().ok_or_else(|| Error::ResourceDefinitionError {
        kind,
        owner: node.name_any(),
        reason: "the ChainlinkNode has no namespace".to_string(),
    })?;

    Ok(ObjectMeta { name: Some(name), namespace: Some(namespace), owner_references: Some(vec![owner]), ..Default::default() })
}

/// Builds the Deployment running the node and its database sidecar.
pub fn deployment_for_node(node: &ChainlinkNode, config: &OperatorConfig) -> Result<Deployment> {
    let name = node.name_any();
    let labels = labels_for_node(&name);
    let image = node.spec.image.clone().filter(|image| !image.trim().is_empty()).unwrap_or_else(|| config.node_image.clone());

    let metadata = owned_metadata(node, "Deployment", deployment_name(&name))?;

    let volumes = vec![
        Volume {
            name: SECRET_VOLUME_NAME.to_string(),
            secret: Some(SecretVolumeSource { secret_name: Some(secrets_name(&name)), ..Default::default() }),
            ..Default::default()
        },
        Volume {
            name: CONFIG_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource { name: config_map_name(&name), ..Default::default() }),
            ..Default::default()
        },
    ];

    let node_container = Container {
        name: NODE_CONTAINER_NAME.to_string(),
        image: Some(image),
        command: Some(vec![NODE_COMMAND.to_string()]),
        args: Some(NODE_ARGS.iter().map(|arg| arg.to_string()).collect()),
        volume_mounts: Some(vec![
            VolumeMount { name: SECRET_VOLUME_NAME.to_string(), read_only: Some(true), mount_path: SECRETS_MOUNT_PATH.to_string(), ..Default::default() },
            VolumeMount { name: CONFIG_VOLUME_NAME.to_string(), read_only: Some(true), mount_path: CONFIG_MOUNT_PATH.to_string(), ..Default::default() },
        ]),
        ports: Some(vec![ContainerPort {
            container_port: OPERATOR_API_PORT,
            name: Some(OPERATOR_API_PORT_NAME.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let postgres_container = Container {
        name: POSTGRES_CONTAINER_NAME.to_string(),
        image: Some(config.postgres_image.clone()),
        env: Some(vec![EnvVar { name: "POSTGRES_PASSWORD".to_string(), value: Some(config.postgres_password.clone()), ..Default::default() }]),
        ports: Some(vec![ContainerPort { container_port: POSTGRES_PORT, name: Some("postgres".to_string()), ..Default::default() }]),
        ..Default::default()
    };

    Ok(Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector { match_labels: Some(labels.clone()), ..Default::default() },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels.clone()), ..Default::default() }),
                spec: Some(PodSpec { volumes: Some(volumes), containers: vec![node_container, postgres_container], ..Default::default() }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Builds the Service exposing the node's operator API on port 80.
pub fn service_for_node(node: &ChainlinkNode) -> Result<Service> {
    let name = node.name_any();

    let metadata = owned_metadata(node, "Service", service_name(&name))?;

    Ok(Service {
        metadata,
        spec: Some(ServiceSpec {
            selector: Some(labels_for_node(&name)),
            ports: Some(vec![ServicePort {
                name: Some(OPERATOR_API_PORT_NAME.to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(OPERATOR_API_PORT)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}
