//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::config::{configured_credential_vars, missing_credential_vars};
use crate::errors::ServiceError;
use crate::models::container::ContainerSpec;
use crate::models::deployment::{CodeFormat, DeployRequest, Provider};
use crate::server::state::ServerState;

/// JSON error body with the status code the taxonomy maps to
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::ValidationError(_) | ServiceError::ConfigError(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::AuthError(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub azure: String,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let azure = if state.azure.is_some() {
        "configured"
    } else {
        "pending_credentials"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "instanti8-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        azure: azure.to_string(),
    })
}

/// Deployment submission body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployBody {
    pub code: Option<String>,
    pub code_type: Option<String>,
    pub provider: Option<String>,
    pub resource_type: Option<String>,
    pub user_subscription_id: Option<String>,
}

impl DeployBody {
    /// Validate presence of the required fields, enumerating every missing
    /// one rather than failing on the first
    fn validate(&self) -> Result<DeployRequest, ServiceError> {
        let mut missing = Vec::new();
        if self.code.as_deref().unwrap_or("").trim().is_empty() {
            missing.push("code");
        }
        if self.code_type.is_none() {
            missing.push("codeType");
        }
        if self.provider.is_none() {
            missing.push("provider");
        }
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let code_type: CodeFormat = self
            .code_type
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ServiceError::ValidationError)?;
        let provider: Provider = self
            .provider
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ServiceError::ValidationError)?;

        Ok(DeployRequest {
            code: self.code.clone().unwrap_or_default(),
            code_type,
            provider,
            resource_type: self
                .resource_type
                .clone()
                .unwrap_or_else(|| "infrastructure".to_string()),
        })
    }
}

/// Deployment submission response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub deployment_id: String,
    pub status: String,
}

/// Submit a deployment
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<DeployBody>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.validate()?;
    let deployment_id = state.executor.submit(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DeployResponse {
            deployment_id,
            status: "pending".to_string(),
        }),
    ))
}

/// Fetch one deployment record
pub async fn deployment_status_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .registry
        .get(&deployment_id)
        .await
        .ok_or_else(|| ServiceError::NotFound("Deployment not found".to_string()))?;

    Ok(Json(record))
}

/// Initiate a destroy for a deployment's infrastructure
pub async fn destroy_handler(
    State(state): State<Arc<ServerState>>,
    Path(deployment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.executor.destroy(&deployment_id).await?;

    Ok(Json(json!({
        "message": format!("Destroy initiated for deployment {}", deployment_id)
    })))
}

/// List all deployment records
pub async fn list_deployments_handler(
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    Json(state.registry.list().await)
}

/// Submit a deployment through the service provider
pub async fn saas_deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<DeployBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_subscription_id = body.user_subscription_id.clone();
    let request = body.validate()?;

    let deployment_id = state
        .saas
        .deploy_via_provider(crate::deploy::saas::SaasDeployRequest {
            code: request.code,
            code_type: request.code_type,
            provider: request.provider,
            resource_type: request.resource_type,
            user_subscription_id,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DeployResponse {
            deployment_id,
            status: "pending".to_string(),
        }),
    ))
}

fn azure_client(
    state: &ServerState,
) -> Result<&Arc<crate::azure::client::AzureContainerClient>, ServiceError> {
    state.azure.as_ref().ok_or_else(|| {
        ServiceError::ConfigError(format!(
            "Missing Azure credentials: {}",
            missing_credential_vars().join(", ")
        ))
    })
}

/// Container listing query
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerListQuery {
    pub resource_group: Option<String>,
}

/// List Azure container groups
pub async fn list_containers_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ContainerListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let azure = azure_client(&state)?;
    let containers = azure
        .list_containers(query.resource_group.as_deref())
        .await?;
    Ok(Json(containers))
}

/// Container creation body; sizing defaults are applied here
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContainerBody {
    pub name: Option<String>,
    pub image: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub ports: Option<Vec<u16>>,
    pub environment_variables: Option<std::collections::HashMap<String, String>>,
    pub command: Option<Vec<String>>,
}

/// Create an Azure container group
pub async fn create_container_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CreateContainerBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mut missing = Vec::new();
    if body.name.as_deref().unwrap_or("").is_empty() {
        missing.push("name");
    }
    if body.image.as_deref().unwrap_or("").is_empty() {
        missing.push("image");
    }
    if body.resource_group.as_deref().unwrap_or("").is_empty() {
        missing.push("resourceGroup");
    }
    if body.location.as_deref().unwrap_or("").is_empty() {
        missing.push("location");
    }
    if !missing.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Missing required fields: {}",
            missing.join(", ")
        ))
        .into());
    }

    let spec = ContainerSpec {
        name: body.name.unwrap_or_default(),
        image: body.image.unwrap_or_default(),
        resource_group: body.resource_group.unwrap_or_default(),
        location: body.location.unwrap_or_default(),
        cpu: body.cpu.unwrap_or(1.0),
        memory: body.memory.unwrap_or(1.0),
        ports: body.ports.unwrap_or_else(|| vec![80]),
        environment_variables: body.environment_variables,
        command: body.command,
    };

    let azure = azure_client(&state)?;
    let container = azure.create_container(&spec).await?;
    Ok((StatusCode::CREATED, Json(container)))
}

/// Fetch one container group with logs
pub async fn get_container_handler(
    State(state): State<Arc<ServerState>>,
    Path((resource_group, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let azure = azure_client(&state)?;
    let container = azure.get_container(&resource_group, &name).await?;
    Ok(Json(container))
}

/// Stop a container group
pub async fn stop_container_handler(
    State(state): State<Arc<ServerState>>,
    Path((resource_group, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let azure = azure_client(&state)?;
    let ack = azure.stop_container(&resource_group, &name).await?;
    Ok(Json(ack))
}

/// Restart a container group (stop-only, see the client docs)
pub async fn restart_container_handler(
    State(state): State<Arc<ServerState>>,
    Path((resource_group, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let azure = azure_client(&state)?;
    let ack = azure.restart_container(&resource_group, &name).await?;
    Ok(Json(ack))
}

/// Delete a container group
pub async fn delete_container_handler(
    State(state): State<Arc<ServerState>>,
    Path((resource_group, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let azure = azure_client(&state)?;
    let ack = azure.delete_container(&resource_group, &name).await?;
    Ok(Json(ack))
}

/// Validate the Azure credential environment
pub async fn test_azure_credentials_handler(
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let missing = missing_credential_vars();

    if !missing.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!("Missing Azure credentials: {}", missing.join(", ")),
                "configured": configured_credential_vars(),
            })),
        );
    }

    let (client_id, tenant_id, subscription_id) = state
        .azure_config
        .as_ref()
        .map(|c| {
            (
                c.client_id.clone(),
                c.tenant_id.clone(),
                c.subscription_id.clone(),
            )
        })
        .unwrap_or_default();

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Azure credentials validated successfully",
            "clientId": client_id,
            "tenantId": tenant_id,
            "subscriptionId": subscription_id,
        })),
    )
}
