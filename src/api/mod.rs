pub mod config_dto;
pub mod node_api_dto;
pub mod v1alpha1;
