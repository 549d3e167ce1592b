mod store_mock;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::json;
use tracing_test::traced_test;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chainlink_operator::domain::config::OperatorConfig;
use chainlink_operator::domain::context::InvocationContext;
use chainlink_operator::domain::job::submitter::{CONDITION_SUBMITTED, REASON_AUTHENTICATION_FAILED, REASON_INPUT_ERRORS, REASON_JOB_CREATED};
use chainlink_operator::domain::job::{JobSubmitter, SubmissionOutcome};
use chainlink_operator::domain::status::find_condition;
use chainlink_operator::domain::store::ObjectKey;
use chainlink_operator::error::Error;

use store_mock::{RecordingStore, StoreOp, job};

const JOB_TOML: &str = r#"type = "cron"
schemaVersion = 1
schedule = "CRON_TZ=UTC */10 * * * * *"
observationSource = """
    fetch [type="http" method=GET url="https://example.com/price"];
"""
"#;

const SESSION_COOKIE: &str = "clsession=MTY4NzE5; Path=/; Expires=Wed, 21 Oct 2026 07:28:00 GMT; HttpOnly";

fn submitter(store: &Arc<RecordingStore>, base_url: Option<String>) -> JobSubmitter<RecordingStore> {
    let config = OperatorConfig { node_api_base_url: base_url, request_timeout: Duration::from_secs(5), ..Default::default() };
    JobSubmitter::new(Arc::clone(store), Arc::new(config))
}

fn ctx() -> InvocationContext {
    InvocationContext::with_timeout(Duration::from_secs(10))
}

fn submitted_condition(store: &RecordingStore, key: &ObjectKey) -> (String, String, String) {
    let job = store.inner.job(key).expect("job stored");
    let status = job.status.expect("status written");
    let condition = find_condition(&status.conditions, CONDITION_SUBMITTED).expect("Submitted condition");
    (condition.status.clone(), condition.reason.clone(), condition.message.clone())
}

async fn mount_session(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_partial_json(json!({"email": "test@example.com", "PASSWORD": "mysecretpassword"})))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", SESSION_COOKIE).set_body_json(json!({"data": {"attributes": {"authenticated": true}}})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn created_response(job_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {"createJob": {"__typename": "CreateJobSuccess", "job": {"id": job_id, "__typename": "Job"}}}
    }))
}

#[tokio::test]
async fn test_job_is_created_with_session_cookie() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("cookie", "clsession=MTY4NzE5"))
        .and(body_partial_json(json!({"operationName": "CreateJob", "variables": {"input": {"TOML": JOB_TOML}}})))
        .respond_with(created_response("42"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    let key = ObjectKey::new("ns1", "price-feed");

    let outcome = submitter(&store, Some(server.uri())).submit(&key, &ctx()).await.unwrap();

    assert_eq!(outcome, SubmissionOutcome::Created { job_id: "42".to_string() });
    let (status, reason, _) = submitted_condition(&store, &key);
    assert_eq!((status.as_str(), reason.as_str()), ("True", REASON_JOB_CREATED));

    let status = store.inner.job(&key).unwrap().status.unwrap();
    assert_eq!(status.job_id.as_deref(), Some("42"));
    assert_eq!(status.observed_generation, Some(1));
}

#[tokio::test]
async fn test_submitted_generation_is_not_resubmitted() {
    let server = MockServer::start().await;
    mount_session(&server, 2).await;
    Mock::given(method("POST")).and(path("/query")).respond_with(created_response("42")).expect(2).mount(&server).await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    let key = ObjectKey::new("ns1", "price-feed");
    let submitter = submitter(&store, Some(server.uri()));

    submitter.submit(&key, &ctx()).await.unwrap();
    assert_eq!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::AlreadySubmitted);

    store.inner.update_job_spec(&key, &JOB_TOML.replace("*/10", "*/30")).unwrap();
    assert!(matches!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::Created { .. }));
    assert_eq!(store.inner.job(&key).unwrap().status.unwrap().observed_generation, Some(2));
}

#[tokio::test]
async fn test_input_errors_are_recorded_as_rejection() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"createJob": {"__typename": "InputErrors", "errors": [
                {"path": "TOML", "message": "unrecognised job type: crno", "code": "INVALID_INPUT", "__typename": "InputError"}
            ]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("broken", "ns1", "node-a", "type = \"crno\""));
    let key = ObjectKey::new("ns1", "broken");

    let outcome = submitter(&store, Some(server.uri())).submit(&key, &ctx()).await.unwrap();

    assert_eq!(outcome, SubmissionOutcome::Rejected { errors: vec!["TOML (INVALID_INPUT): unrecognised job type: crno".to_string()] });
    let (status, reason, message) = submitted_condition(&store, &key);
    assert_eq!((status.as_str(), reason.as_str()), ("False", REASON_INPUT_ERRORS));
    assert!(message.contains("unrecognised job type"));
    assert!(store.inner.job(&key).unwrap().status.unwrap().job_id.is_none());
}

#[tokio::test]
async fn test_rejected_generation_is_not_resubmitted() {
    let server = MockServer::start().await;
    mount_session(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"createJob": {"__typename": "InputErrors", "errors": [{"message": "bad"}]}}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("broken", "ns1", "node-a", "type = \"crno\""));
    let key = ObjectKey::new("ns1", "broken");
    let submitter = submitter(&store, Some(server.uri()));

    assert_eq!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::Rejected { errors: vec!["bad".to_string()] });
    assert_eq!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::AlreadyRejected);
    assert_eq!(store.job_status_updates.load(Ordering::SeqCst), 1);
    let query_calls = server.received_requests().await.unwrap().iter().filter(|request| request.url.path() == "/query").count();
    assert_eq!(query_calls, 1);

    store.inner.update_job_spec(&key, "type = \"cron\"").unwrap();
    assert!(matches!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::Rejected { .. }));
}

#[tokio::test]
async fn test_created_status_write_is_retried() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("POST")).and(path("/query")).respond_with(created_response("42")).expect(1).mount(&server).await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    store.fail_times(StoreOp::UpdateJobStatus, 2);
    let key = ObjectKey::new("ns1", "price-feed");
    let submitter = submitter(&store, Some(server.uri()));

    assert_eq!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::Created { job_id: "42".to_string() });
    assert_eq!(store.inner.job(&key).unwrap().status.unwrap().job_id.as_deref(), Some("42"));
    assert_eq!(submitter.submit(&key, &ctx()).await.unwrap(), SubmissionOutcome::AlreadySubmitted);
}

#[tokio::test]
async fn test_unrecorded_creation_is_surfaced_with_job_id() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("POST")).and(path("/query")).respond_with(created_response("42")).expect(1).mount(&server).await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    store.fail_on(StoreOp::UpdateJobStatus);
    let key = ObjectKey::new("ns1", "price-feed");

    let error = submitter(&store, Some(server.uri())).submit(&key, &ctx()).await.unwrap_err();

    assert!(matches!(&error, Error::UnrecordedJobError { job_id, .. } if job_id == "42"));
    assert!(!error.is_retryable());
    assert!(store.inner.job(&key).unwrap().status.is_none());
}

#[tokio::test]
#[traced_test]
async fn test_rejected_credentials_skip_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/sessions")).respond_with(ResponseTemplate::new(401)).expect(1).mount(&server).await;
    Mock::given(method("POST")).and(path("/query")).respond_with(created_response("42")).expect(0).mount(&server).await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    let key = ObjectKey::new("ns1", "price-feed");

    let result = submitter(&store, Some(server.uri())).submit(&key, &ctx()).await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::AuthenticationError(401)));
    assert!(!error.is_retryable());
    let (status, reason, _) = submitted_condition(&store, &key);
    assert_eq!((status.as_str(), reason.as_str()), ("False", REASON_AUTHENTICATION_FAILED));
    assert!(logs_contain("AuthenticationFailed"));
}

#[tokio::test]
#[traced_test]
async fn test_unreachable_node_fails_authentication() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    let key = ObjectKey::new("ns1", "price-feed");

    let result = submitter(&store, Some(base_url)).submit(&key, &ctx()).await;

    let error = result.unwrap_err();
    assert!(matches!(error, Error::NetworkError(_)));
    assert!(error.is_retryable());
    let (_, reason, _) = submitted_condition(&store, &key);
    assert_eq!(reason, REASON_AUTHENTICATION_FAILED);
    assert!(logs_contain("AuthenticationFailed"));
}

#[tokio::test]
async fn test_server_error_on_query_is_retryable() {
    let server = MockServer::start().await;
    mount_session(&server, 1).await;
    Mock::given(method("POST")).and(path("/query")).respond_with(ResponseTemplate::new(502)).expect(1).mount(&server).await;

    let store = Arc::new(RecordingStore::new());
    store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));
    let key = ObjectKey::new("ns1", "price-feed");

    let error = submitter(&store, Some(server.uri())).submit(&key, &ctx()).await.unwrap_err();

    assert!(matches!(error, Error::RemoteApiError(_)));
    let (status, _, _) = submitted_condition(&store, &key);
    assert_eq!(status, "False");
}

#[tokio::test]
async fn test_deleted_job_is_ignored() {
    let store = Arc::new(RecordingStore::new());

    let outcome = submitter(&store, None).submit(&ObjectKey::new("ns1", "gone"), &ctx()).await.unwrap();

    assert_eq!(outcome, SubmissionOutcome::Deleted);
    assert_eq!(store.job_status_updates.load(Ordering::SeqCst), 0);
}

#[test]
fn test_default_endpoint_targets_node_service() {
    let store = Arc::new(RecordingStore::new());
    let job = store.inner.insert_job(job("price-feed", "ns1", "node-a", JOB_TOML));

    assert_eq!(submitter(&store, None).node_endpoint(&job), "http://node-a-service.ns1");
    assert_eq!(submitter(&store, Some("http://127.0.0.1:9000".into())).node_endpoint(&job), "http://127.0.0.1:9000");
}
