pub mod node_api_client;
pub mod submitter;

pub use submitter::{JobSubmitter, SubmissionOutcome};
