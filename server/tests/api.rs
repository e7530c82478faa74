//! Router integration tests
//!
//! Exercises the REST surface through `tower::ServiceExt::oneshot` without
//! binding a socket. State is built without Azure credentials, so the
//! Azure-backed routes are expected to reject with configuration errors.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use instanti8_server::chat::ChatAssistant;
use instanti8_server::deploy::executor::IacExecutor;
use instanti8_server::deploy::saas::SaasDeployer;
use instanti8_server::registry::DeploymentRegistry;
use instanti8_server::server::serve::router;
use instanti8_server::server::state::ServerState;

fn test_app() -> (axum::Router, tempfile::TempDir) {
    let scratch = tempfile::tempdir().unwrap();

    let registry = Arc::new(DeploymentRegistry::new());
    let executor = Arc::new(IacExecutor::new(
        Arc::clone(&registry),
        scratch.path().to_path_buf(),
        None,
    ));
    let saas = Arc::new(SaasDeployer::new(Arc::clone(&registry), None));
    let state = Arc::new(ServerState {
        registry,
        executor,
        saas,
        azure: None,
        azure_config: None,
        chat: ChatAssistant::new(None),
    });

    (router(state), scratch)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_service_and_credential_state() {
    let (app, _scratch) = test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "instanti8-server");
    assert_eq!(body["azure"], "pending_credentials");
}

#[tokio::test]
async fn test_deploy_rejects_missing_fields_with_enumeration() {
    let (app, _scratch) = test_app();

    let response = app
        .oneshot(post_json("/api/deploy", json!({ "code": "resource {}" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Missing required fields"));
    assert!(error.contains("codeType"));
    assert!(error.contains("provider"));
}

#[tokio::test]
async fn test_deploy_rejects_unknown_provider() {
    let (app, _scratch) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/deploy",
            json!({
                "code": "resource {}",
                "codeType": "terraform",
                "provider": "digitalocean"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("Invalid provider"));
}

#[tokio::test]
async fn test_deploy_without_credentials_enumerates_missing_vars() {
    let (app, _scratch) = test_app();

    let response = app
        .oneshot(post_json(
            "/api/deploy",
            json!({
                "code": "resource \"azurerm_resource_group\" \"main\" {}",
                "codeType": "terraform",
                "provider": "azure"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Missing Azure credentials"));
}

#[tokio::test]
async fn test_aws_deploy_is_accepted_then_fails_immediately() {
    let (app, _scratch) = test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/deploy",
            json!({
                "code": "resource {}",
                "codeType": "terraform",
                "provider": "aws"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    let deployment_id = body["deploymentId"].as_str().unwrap().to_string();

    // The rejection is recorded before submit returns, so the record is
    // immediately terminal
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/deploy/{}/status", deployment_id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = body_json(response).await;
    assert_eq!(record["status"], "failed");
    assert!(record["error"]
        .as_str()
        .unwrap()
        .contains("not implemented"));
}

#[tokio::test]
async fn test_status_of_unknown_deployment_is_404() {
    let (app, _scratch) = test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/api/deploy/no-such-id/status")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_destroy_of_unknown_deployment_is_404() {
    let (app, _scratch) = test_app();

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/deploy/no-such-id")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deployments_list_includes_submitted_records() {
    let (app, _scratch) = test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/deploy",
            json!({
                "code": "resource {}",
                "codeType": "terraform",
                "provider": "aws"
            }),
        ))
        .await
        .unwrap();
    let deployment_id = body_json(response).await["deploymentId"]
        .as_str()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .method("GET")
        .uri("/api/deployments")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let records = body.as_array().unwrap();
    assert!(records
        .iter()
        .any(|r| r["deploymentId"] == deployment_id.as_str()));
}

#[tokio::test]
async fn test_saas_deploy_validates_like_direct_deploy() {
    let (app, _scratch) = test_app();

    let response = app
        .oneshot(post_json("/api/saas/deploy", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Missing required fields"));
}

#[tokio::test]
async fn test_container_routes_require_credentials() {
    let (app, _scratch) = test_app();

    let request = Request::builder()
        .method("GET")
        .uri("/api/azure/containers")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Missing Azure credentials"));
}

#[tokio::test]
async fn test_create_container_validates_before_touching_azure() {
    let (app, _scratch) = test_app();

    // Field validation fires before the credential check
    let response = app
        .oneshot(post_json(
            "/api/azure/containers",
            json!({ "name": "web" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("image"));
    assert!(error.contains("resourceGroup"));
    assert!(error.contains("location"));
}
