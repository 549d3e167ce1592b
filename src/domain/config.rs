use std::path::Path;
use std::time::Duration;

use crate::api::config_dto::OperatorConfigDto;
use crate::api::node_api_dto::CREATE_JOB_MUTATION_V2;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

pub const DEFAULT_NODE_IMAGE: &str = "smartcontract/chainlink:2.1.1";
pub const DEFAULT_POSTGRES_IMAGE: &str = "postgres:latest";
pub const DEFAULT_REQUEUE_AFTER: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(120);

pub const ENV_API_EMAIL: &str = "CHAINLINK_API_EMAIL";
pub const ENV_API_PASSWORD: &str = "CHAINLINK_API_PASSWORD";
pub const ENV_DB_PASSWORD: &str = "CHAINLINK_DB_PASSWORD";

/// Credentials the operator presents to `POST /sessions`.
#[derive(Clone, PartialEq)]
pub struct ApiCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials").field("email", &self.email).field("password", &"<redacted>").finish()
    }
}

/// Versions of the node's GraphQL schema this operator can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeApiVersion {
    V2,
}

impl NodeApiVersion {
    pub fn create_job_mutation(&self) -> &'static str {
        match self {
            NodeApiVersion::V2 => CREATE_JOB_MUTATION_V2,
        }
    }
}

impl std::str::FromStr for NodeApiVersion {
    type Err = Error;

    fn from_str(version: &str) -> Result<Self> {
        match version {
            "v2" | "2" => Ok(NodeApiVersion::V2),
            _ => Err(Error::ConfigError(format!("unsupported node API version '{}', supported: v2", version))),
        }
    }
}

/// Source of secret values that must not live in the config file.
pub trait SecretSource {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub node_image: String,
    pub postgres_image: String,
    pub postgres_password: String,
    pub credentials: ApiCredentials,
    pub requeue_after: Duration,
    pub request_timeout: Duration,
    pub reconcile_timeout: Duration,
    /// Replaces the `http://<node>-service.<namespace>` convention when set.
    pub node_api_base_url: Option<String>,
    pub node_api_version: NodeApiVersion,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            node_image: DEFAULT_NODE_IMAGE.to_string(),
            postgres_image: DEFAULT_POSTGRES_IMAGE.to_string(),
            postgres_password: "mysecretpassword".to_string(),
            credentials: ApiCredentials { email: "test@example.com".to_string(), password: "mysecretpassword".to_string() },
            requeue_after: DEFAULT_REQUEUE_AFTER,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            node_api_base_url: None,
            node_api_version: NodeApiVersion::V2,
        }
    }
}

impl TryFrom<OperatorConfigDto> for OperatorConfig {
    type Error = Error;

    fn try_from(dto: OperatorConfigDto) -> Result<Self> {
        let defaults = OperatorConfig::default();

        let node_api_version = match dto.node_api_version {
            Some(version) => version.parse()?,
            None => defaults.node_api_version,
        };

        let node_api_base_url = match dto.node_api_base_url {
            Some(url) => {
                let trimmed = url.trim_end_matches('/').to_string();
                reqwest::Url::parse(&trimmed).map_err(|e| Error::ConfigError(format!("nodeApiBaseUrl '{}' is not a valid URL: {}", url, e)))?;
                Some(trimmed)
            }
            None => None,
        };

        let config = OperatorConfig {
            node_image: dto.node_image.unwrap_or(defaults.node_image),
            postgres_image: dto.postgres_image.unwrap_or(defaults.postgres_image),
            postgres_password: dto.postgres_password.unwrap_or(defaults.postgres_password),
            credentials: ApiCredentials {
                email: dto.api_email.unwrap_or(defaults.credentials.email),
                password: dto.api_password.unwrap_or(defaults.credentials.password),
            },
            requeue_after: dto.requeue_after_secs.map(Duration::from_secs).unwrap_or(defaults.requeue_after),
            request_timeout: dto.request_timeout_secs.map(Duration::from_secs).unwrap_or(defaults.request_timeout),
            reconcile_timeout: dto.reconcile_timeout_secs.map(Duration::from_secs).unwrap_or(defaults.reconcile_timeout),
            node_api_base_url,
            node_api_version,
        };

        config.validate()?;
        Ok(config)
    }
}

impl OperatorConfig {
    /// Loads the config file (or the defaults when `path` is `None`) and
    /// applies secret overrides.
    pub fn load(path: Option<&Path>, secrets: &dyn SecretSource) -> Result<Self> {
        let dto = match path {
            Some(path) => parse_json_file::<OperatorConfigDto>(path)?,
            None => OperatorConfigDto::default(),
        };

        let mut config = OperatorConfig::try_from(dto)?;
        config.apply_secrets(secrets);
        Ok(config)
    }

    pub fn apply_secrets(&mut self, secrets: &dyn SecretSource) {
        if let Some(email) = secrets.lookup(ENV_API_EMAIL) {
            self.credentials.email = email;
        }
        if let Some(password) = secrets.lookup(ENV_API_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(password) = secrets.lookup(ENV_DB_PASSWORD) {
            self.postgres_password = password;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.node_image.trim().is_empty() {
            return Err(Error::ConfigError("nodeImage must not be empty".to_string()));
        }
        if self.requeue_after.is_zero() {
            return Err(Error::ConfigError("requeueAfterSecs must be greater than zero".to_string()));
        }
        if self.request_timeout.is_zero() || self.reconcile_timeout.is_zero() {
            return Err(Error::ConfigError("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSecrets(HashMap<&'static str, &'static str>);

    impl SecretSource for MapSecrets {
        fn lookup(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| value.to_string())
        }
    }

    #[test]
    fn test_empty_dto_yields_defaults() {
        let config = OperatorConfig::try_from(OperatorConfigDto::default()).unwrap();
        assert_eq!(config.node_image, "smartcontract/chainlink:2.1.1");
        assert_eq!(config.requeue_after, Duration::from_secs(60));
        assert_eq!(config.node_api_version, NodeApiVersion::V2);
        assert!(config.node_api_base_url.is_none());
    }

    #[test]
    fn test_unknown_api_version_is_rejected() {
        let dto = OperatorConfigDto { node_api_version: Some("v1".into()), ..Default::default() };
        assert!(matches!(OperatorConfig::try_from(dto), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_zero_requeue_is_rejected() {
        let dto = OperatorConfigDto { requeue_after_secs: Some(0), ..Default::default() };
        assert!(matches!(OperatorConfig::try_from(dto), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let dto = OperatorConfigDto { node_api_base_url: Some("http://127.0.0.1:6688/".into()), ..Default::default() };
        let config = OperatorConfig::try_from(dto).unwrap();
        assert_eq!(config.node_api_base_url.as_deref(), Some("http://127.0.0.1:6688"));
    }

    #[test]
    fn test_secrets_override_file_values() {
        let mut config = OperatorConfig::default();
        let secrets = MapSecrets(HashMap::from([(ENV_API_EMAIL, "ops@example.com"), (ENV_DB_PASSWORD, "pg-secret")]));
        config.apply_secrets(&secrets);

        assert_eq!(config.credentials.email, "ops@example.com");
        assert_eq!(config.credentials.password, "mysecretpassword");
        assert_eq!(config.postgres_password, "pg-secret");
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", OperatorConfig::default().credentials);
        assert!(!rendered.contains("mysecretpassword"));
    }
}
