use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use touchline_agent::{Collaborators, QuestionWorkflow};
use touchline_core::config::{GatewayConfig, NOT_RELEVANT_ANSWER};
use touchline_gateway::GatewayServer;
use touchline_test_utils::{
    sample_teams, FixedPlanner, MockDomainData, MockGenerator, MockSearch, ScriptedClassifier,
};

fn server(classifier: ScriptedClassifier, generator: MockGenerator) -> GatewayServer {
    let collaborators = Collaborators {
        classifier: Arc::new(classifier),
        web_search: Arc::new(MockSearch::returning(serde_json::json!({"results": []}))),
        domain_data: Arc::new(MockDomainData::with_teams(sample_teams())),
        planner: Arc::new(FixedPlanner::by_name("Arsenal")),
        generator: Arc::new(generator),
    };
    let executor = QuestionWorkflow::new(collaborators).executor().unwrap();
    GatewayServer::new(GatewayConfig::default(), Arc::new(executor))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(server: &GatewayServer, shutdown: CancellationToken, req: Request<Body>) -> (StatusCode, Value) {
    let resp = server.router(shutdown).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let server = server(ScriptedClassifier::returning("both"), MockGenerator::new());
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(&server, CancellationToken::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn chat_returns_answer_envelope() {
    let server = server(ScriptedClassifier::returning("both"), MockGenerator::new());
    let (status, body) = send(
        &server,
        CancellationToken::new(),
        chat_request(r#"{"question":"Where does Arsenal play?"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["answer"],
        MockGenerator::answer_for("Where does Arsenal play?", 2)
    );
}

#[tokio::test]
async fn versioned_path_is_served() {
    let server = server(ScriptedClassifier::returning("conversation"), MockGenerator::new());
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"question":"What is the capital of France?"}"#))
        .unwrap();
    let (status, body) = send(&server, CancellationToken::new(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["answer"], NOT_RELEVANT_ANSWER);
}

#[tokio::test]
async fn empty_or_malformed_question_is_422() {
    let server = server(ScriptedClassifier::returning("both"), MockGenerator::new());
    for body in [r#"{"question":""}"#, r#"{"q":"x"}"#, "not json"] {
        let (status, body) = send(&server, CancellationToken::new(), chat_request(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "validation");
    }
}

#[tokio::test]
async fn routing_fault_is_502() {
    let server = server(ScriptedClassifier::returning("weather"), MockGenerator::new());
    let (status, body) = send(&server, CancellationToken::new(), chat_request(r#"{"question":"q"}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "routing");
}

#[tokio::test]
async fn generation_fault_is_502() {
    let server = server(
        ScriptedClassifier::returning("search"),
        MockGenerator::failing("deployment not found"),
    );
    let (status, body) = send(&server, CancellationToken::new(), chat_request(r#"{"question":"q"}"#)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "generation");
}

#[tokio::test]
async fn shutdown_cancels_runs_with_503() {
    let server = server(ScriptedClassifier::returning("both"), MockGenerator::new());
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let (status, body) = send(&server, shutdown, chat_request(r#"{"question":"q"}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "cancelled");
}
