//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Settings;
use crate::errors::ServiceError;
use crate::server::handlers::{
    create_container_handler, delete_container_handler, deploy_handler,
    deployment_status_handler, destroy_handler, get_container_handler, health_handler,
    list_containers_handler, list_deployments_handler, restart_container_handler,
    saas_deploy_handler, stop_container_handler, test_azure_credentials_handler,
};
use crate::server::state::ServerState;
use crate::server::ws::ws_handler;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Deployments
        .route("/api/deploy", post(deploy_handler))
        .route("/api/deploy/{id}/status", get(deployment_status_handler))
        .route("/api/deploy/{id}", delete(destroy_handler))
        .route("/api/deployments", get(list_deployments_handler))
        .route("/api/saas/deploy", post(saas_deploy_handler))
        // Azure containers
        .route(
            "/api/azure/containers",
            get(list_containers_handler).post(create_container_handler),
        )
        .route(
            "/api/azure/containers/{resource_group}/{name}",
            get(get_container_handler).delete(delete_container_handler),
        )
        .route(
            "/api/azure/containers/{resource_group}/{name}/stop",
            post(stop_container_handler),
        )
        .route(
            "/api/azure/containers/{resource_group}/{name}/restart",
            post(restart_container_handler),
        )
        // Credentials
        .route(
            "/api/credentials/test/azure",
            post(test_azure_credentials_handler),
        )
        // Chat
        .route("/ws", get(ws_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the HTTP server
pub async fn serve(
    settings: &Settings,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), ServiceError>>, ServiceError> {
    let app = router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServiceError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServiceError::ServerError(e.to_string()))
    });

    Ok(handle)
}
