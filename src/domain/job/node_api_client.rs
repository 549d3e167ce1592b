use std::sync::Arc;

use reqwest::{Client, StatusCode};

use crate::api::node_api_dto::{CreateJobPayloadDto, CreateJobRequestDto, CreateJobResponseDto, InputErrorDto, SessionRequestDto};
use crate::domain::config::{ApiCredentials, NodeApiVersion};
use crate::domain::cookie_store::CookieStore;
use crate::error::{Error, Result};

#[derive(Debug)]
pub enum NodeApiEndpoint {
    Sessions,
    Query,
}

impl NodeApiEndpoint {
    pub fn path(&self) -> &str {
        match self {
            Self::Sessions => "/sessions",
            Self::Query => "/query",
        }
    }
}

/// Parsed result of the `createJob` mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateJobResult {
    Created { job_id: String },
    Rejected { errors: Vec<String> },
}

/// Session-based client for one node's operator API.
///
/// Each instance owns a fresh `CookieStore`, so the session cookie received
/// from `POST /sessions` is replayed on `POST /query` and nowhere else.
#[derive(Debug)]
pub struct NodeApiClient {
    base_url: String,
    client: Client,
    api_version: NodeApiVersion,
}

impl NodeApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: std::time::Duration, api_version: NodeApiVersion) -> Result<Self> {
        let client = Client::builder().cookie_provider(Arc::new(CookieStore::new())).timeout(request_timeout).build()?;

        Ok(NodeApiClient { base_url: base_url.into().trim_end_matches('/').to_string(), client, api_version })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: NodeApiEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// `POST /sessions`. Any non-success status is an `AuthenticationError`.
    pub async fn authenticate(&self, credentials: &ApiCredentials) -> Result<()> {
        let body = SessionRequestDto { email: credentials.email.clone(), password: credentials.password.clone() };
        let response = self.client.post(self.url(NodeApiEndpoint::Sessions)).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        log::debug!("Session response from {} ({}): {}", self.url(NodeApiEndpoint::Sessions), status, text);

        if !status.is_success() {
            return Err(Error::AuthenticationError(status.as_u16()));
        }
        Ok(())
    }

    /// `POST /query` with the CreateJob mutation wrapping `job_toml` verbatim.
    pub async fn create_job(&self, job_toml: &str) -> Result<CreateJobResult> {
        let body = CreateJobRequestDto::new(self.api_version.create_job_mutation(), job_toml);
        let response = self.client.post(self.url(NodeApiEndpoint::Query)).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        log::debug!("CreateJob response from {} ({}): {}", self.url(NodeApiEndpoint::Query), status, text);

        parse_create_job_response(status, &text)
    }
}

fn describe_input_error(error: &InputErrorDto) -> String {
    match (&error.path, &error.code) {
        (Some(path), Some(code)) => format!("{} ({}): {}", path, code, error.message),
        (Some(path), None) => format!("{}: {}", path, error.message),
        (None, Some(code)) => format!("({}): {}", code, error.message),
        (None, None) => error.message.clone(),
    }
}

pub fn parse_create_job_response(status: StatusCode, body: &str) -> Result<CreateJobResult> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::AuthenticationError(status.as_u16()));
    }
    if !status.is_success() {
        return Err(Error::RemoteApiError(format!("CreateJob returned status {}", status)));
    }

    let response: CreateJobResponseDto =
        serde_json::from_str(body).map_err(|e| Error::RemoteApiError(format!("CreateJob response is not a valid result: {}", e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|error| error.message.as_str()).collect();
        return Err(Error::RemoteApiError(format!("CreateJob failed: {}", messages.join("; "))));
    }

    match response.data.map(|data| data.create_job) {
        Some(CreateJobPayloadDto::CreateJobSuccess { job }) => Ok(CreateJobResult::Created { job_id: job.id }),
        Some(CreateJobPayloadDto::InputErrors { errors }) => Ok(CreateJobResult::Rejected { errors: errors.iter().map(describe_input_error).collect() }),
        None => Err(Error::RemoteApiError("CreateJob response carried no data".to_string())),
    }
}
