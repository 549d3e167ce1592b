use serde::{Deserialize, Serialize};

/// CreateJob mutation understood by node API schema `v2` (node releases 2.x).
pub const CREATE_JOB_MUTATION_V2: &str = r#"mutation CreateJob($input: CreateJobInput!) {
  createJob(input: $input) {
    ... on CreateJobSuccess {
      job {
        id
        __typename
      }
      __typename
    }
    ... on InputErrors {
      errors {
        path
        message
        code
        __typename
      }
      __typename
    }
    __typename
  }
}
"#;

pub const CREATE_JOB_OPERATION: &str = "CreateJob";

/// Body of `POST /sessions`. The node API expects the password key in caps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequestDto {
    pub email: String,
    #[serde(rename = "PASSWORD")]
    pub password: String,
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequestDto {
    pub operation_name: String,
    pub query: String,
    pub variables: CreateJobVariablesDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateJobVariablesDto {
    pub input: CreateJobInputDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateJobInputDto {
    #[serde(rename = "TOML")]
    pub toml: String,
}

impl CreateJobRequestDto {
    pub fn new(query: &str, job_toml: &str) -> Self {
        CreateJobRequestDto {
            operation_name: CREATE_JOB_OPERATION.to_string(),
            query: query.to_string(),
            variables: CreateJobVariablesDto { input: CreateJobInputDto { toml: job_toml.to_string() } },
        }
    }
}

/// GraphQL response envelope of `POST /query`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJobResponseDto {
    pub data: Option<CreateJobDataDto>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobDataDto {
    pub create_job: CreateJobPayloadDto,
}

/// The `createJob` result union, discriminated by `__typename`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "__typename")]
pub enum CreateJobPayloadDto {
    CreateJobSuccess { job: CreatedJobDto },
    InputErrors { errors: Vec<InputErrorDto> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedJobDto {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputErrorDto {
    #[serde(default)]
    pub path: Option<String>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorDto {
    pub message: String,
}
