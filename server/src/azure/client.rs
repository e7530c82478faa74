//! Cloud resource client for Azure Container Instances and App Service
//!
//! Thin client over the ARM REST API. Long-running creates and deletes are
//! awaited to completion by polling the resource's provisioning state, so
//! every operation is synchronous from the caller's perspective. The one
//! exception is `stop_container`, which only signals the change. Failures
//! are wrapped with an operation-specific prefix and never retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::azure::auth::TokenProvider;
use crate::config::AzureConfig;
use crate::errors::ServiceError;
use crate::models::container::{
    map_container_group, ContainerGroup, ContainerGroupList, ContainerLogs, ContainerResource,
    ContainerSpec,
};

const MANAGEMENT_BASE: &str = "https://management.azure.com";
const ACI_API_VERSION: &str = "2023-05-01";
const RESOURCE_GROUP_API_VERSION: &str = "2021-04-01";
const WEB_API_VERSION: &str = "2023-01-01";

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Acknowledgement for a stop or restart request
#[derive(Debug, Clone, Serialize)]
pub struct StopAck {
    pub message: String,
    pub status: String,
}

/// Acknowledgement for a completed delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteAck {
    pub message: String,
}

/// Result of ensuring a resource group exists
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupResult {
    pub name: String,
    pub location: String,
}

/// Result of creating an App Service plan
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanResult {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub sku: String,
    pub id: String,
    pub status: String,
}

/// Result of creating a web app
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAppResult {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub url: String,
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ArmResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: Option<Value>,
}

/// Client for container-like resources in one Azure subscription
pub struct AzureContainerClient {
    http: reqwest::Client,
    auth: TokenProvider,
    subscription_id: String,
    base_url: String,
}

impl AzureContainerClient {
    /// Build a client from a complete credential set. Construction never
    /// attempts a degraded or anonymous mode; incomplete credentials must
    /// be rejected before this point (see `AzureConfig::from_env`).
    pub fn new(config: AzureConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let subscription_id = config.subscription_id.clone();
        Ok(Self {
            auth: TokenProvider::new(http.clone(), config),
            http,
            subscription_id,
            base_url: MANAGEMENT_BASE.to_string(),
        })
    }

    /// Use alternative management and identity endpoints, e.g. a sovereign
    /// cloud whose ARM base differs from the public one
    pub fn with_base_urls(
        mut self,
        management_base: impl Into<String>,
        login_base: impl Into<String>,
    ) -> Self {
        self.base_url = management_base.into();
        self.auth = self.auth.with_login_base(login_base);
        self
    }

    fn group_url(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}?api-version={}",
            self.base_url, self.subscription_id, resource_group, name, ACI_API_VERSION
        )
    }

    /// Create a container group and wait for provisioning to finish
    pub async fn create_container(
        &self,
        spec: &ContainerSpec,
    ) -> Result<ContainerResource, ServiceError> {
        info!("Creating Azure Container Instance: {}", spec.name);

        let result: Result<ContainerResource, ServiceError> = async {
            let url = self.group_url(&spec.resource_group, &spec.name);
            let body = ContainerGroup::from_spec(spec);
            let group: ContainerGroup = self.put_json(&url, &body).await?;

            // beginCreateOrUpdate semantics: poll until the operation is done
            let group = if is_terminal_state(group.properties.provisioning_state.as_deref()) {
                group
            } else {
                self.poll_container_group(&spec.resource_group, &spec.name)
                    .await?
            };

            info!("Container {} created successfully", spec.name);
            let mut resource = map_container_group(&group, Some(&spec.resource_group));
            resource.created_at = chrono::Utc::now().to_rfc3339();
            Ok(resource)
        }
        .await;

        result.map_err(|e| ServiceError::AzureError(format!("Failed to create container: {}", e)))
    }

    /// List container groups, optionally scoped to one resource group
    pub async fn list_containers(
        &self,
        resource_group: Option<&str>,
    ) -> Result<Vec<ContainerResource>, ServiceError> {
        let result: Result<Vec<ContainerResource>, ServiceError> = async {
            let url = match resource_group {
                Some(rg) => format!(
                    "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups?api-version={}",
                    self.base_url, self.subscription_id, rg, ACI_API_VERSION
                ),
                None => format!(
                    "{}/subscriptions/{}/providers/Microsoft.ContainerInstance/containerGroups?api-version={}",
                    self.base_url, self.subscription_id, ACI_API_VERSION
                ),
            };

            let list: ContainerGroupList = self.get_json(&url).await?;
            Ok(list
                .value
                .iter()
                .map(|group| map_container_group(group, resource_group))
                .collect())
        }
        .await;

        result.map_err(|e| ServiceError::AzureError(format!("Failed to list containers: {}", e)))
    }

    /// Fetch one container group, with best-effort logs attached
    pub async fn get_container(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<ContainerResource, ServiceError> {
        let result: Result<ContainerResource, ServiceError> = async {
            let url = self.group_url(resource_group, name);
            let group: ContainerGroup = self.get_json(&url).await?;

            let container_name = group
                .properties
                .containers
                .first()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| name.to_string());

            let mut resource = map_container_group(&group, Some(resource_group));
            resource.logs = Some(
                self.container_logs(resource_group, name, &container_name)
                    .await,
            );
            Ok(resource)
        }
        .await;

        result.map_err(|e| ServiceError::AzureError(format!("Failed to get container: {}", e)))
    }

    /// Signal a container group to stop. Returns an in-progress
    /// acknowledgement without waiting for the stop to complete.
    pub async fn stop_container(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<StopAck, ServiceError> {
        info!("Stopping Azure Container Instance: {}", name);

        self.post_action(resource_group, name, "stop")
            .await
            .map_err(|e| ServiceError::AzureError(format!("Failed to stop container: {}", e)))?;

        Ok(StopAck {
            message: format!("Container {} stop initiated", name),
            status: "stopping".to_string(),
        })
    }

    /// Restart a container group.
    ///
    /// ACI has no atomic restart primitive, so this only issues a stop: the
    /// resource is left stopped, not running, and the caller must start it
    /// again to complete the cycle.
    pub async fn restart_container(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<StopAck, ServiceError> {
        info!("Restarting Azure Container Instance: {}", name);

        self.post_action(resource_group, name, "stop")
            .await
            .map_err(|e| ServiceError::AzureError(format!("Failed to restart container: {}", e)))?;

        Ok(StopAck {
            message: format!("Container {} restart initiated", name),
            status: "restarting".to_string(),
        })
    }

    /// Delete a container group and wait until it is gone
    pub async fn delete_container(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<DeleteAck, ServiceError> {
        info!("Deleting Azure Container Instance: {}", name);

        let result: Result<(), ServiceError> = async {
            let url = self.group_url(resource_group, name);
            let token = self.auth.token().await?;
            let response = self.http.delete(&url).bearer_auth(&token).send().await?;

            if !response.status().is_success() && response.status().as_u16() != 202 {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::AzureError(format!("{}: {}", status, body)));
            }

            // Poll until the group no longer resolves
            loop {
                let token = self.auth.token().await?;
                let response = self.http.get(&url).bearer_auth(&token).send().await?;
                if response.status().as_u16() == 404 {
                    return Ok(());
                }
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ServiceError::AzureError(format!("{}: {}", status, body)));
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        .await;

        result.map_err(|e| ServiceError::AzureError(format!("Failed to delete container: {}", e)))?;

        Ok(DeleteAck {
            message: format!("Container {} deleted successfully", name),
        })
    }

    /// Fetch a container's logs. Best-effort: any failure degrades to a
    /// placeholder rather than failing the parent operation.
    pub async fn container_logs(
        &self,
        resource_group: &str,
        group_name: &str,
        container_name: &str,
    ) -> String {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}/containers/{}/logs?api-version={}",
            self.base_url, self.subscription_id, resource_group, group_name, container_name,
            ACI_API_VERSION
        );

        match self.get_json::<ContainerLogs>(&url).await {
            Ok(logs) => logs.content,
            Err(e) => {
                warn!("Could not retrieve container logs: {}", e);
                "Logs not available".to_string()
            }
        }
    }

    /// Ensure a resource group exists
    pub async fn create_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<ResourceGroupResult, ServiceError> {
        info!("Ensuring resource group {} exists in {}", name, location);

        let result: Result<(), ServiceError> = async {
            let url = format!(
                "{}/subscriptions/{}/resourcegroups/{}?api-version={}",
                self.base_url, self.subscription_id, name, RESOURCE_GROUP_API_VERSION
            );
            let body = serde_json::json!({ "location": location });
            self.put_json::<_, ArmResource>(&url, &body).await?;
            Ok(())
        }
        .await;

        result
            .map_err(|e| ServiceError::AzureError(format!("Failed to create resource group: {}", e)))?;

        Ok(ResourceGroupResult {
            name: name.to_string(),
            location: location.to_string(),
        })
    }

    /// Create an App Service plan and wait for provisioning to finish
    pub async fn create_app_service_plan(
        &self,
        resource_group: &str,
        plan_name: &str,
        location: &str,
        sku: &str,
    ) -> Result<ServicePlanResult, ServiceError> {
        info!("Creating App Service Plan: {}", plan_name);

        let result: Result<String, ServiceError> = async {
            let url = format!(
                "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/serverfarms/{}?api-version={}",
                self.base_url, self.subscription_id, resource_group, plan_name, WEB_API_VERSION
            );
            let body = serde_json::json!({
                "location": location,
                "sku": {
                    "name": sku,
                    "tier": "PremiumV2",
                    "size": sku,
                    "family": "Pv2",
                    "capacity": 1
                },
                "kind": "app"
            });

            let created: ArmResource = self.put_json(&url, &body).await?;
            let id = created.id.clone().unwrap_or_default();
            self.wait_for_provisioning(&url).await?;
            Ok(id)
        }
        .await;

        let id = result.map_err(|e| {
            ServiceError::AzureError(format!("Failed to create App Service Plan: {}", e))
        })?;

        Ok(ServicePlanResult {
            name: plan_name.to_string(),
            resource_group: resource_group.to_string(),
            location: location.to_string(),
            sku: sku.to_string(),
            id,
            status: "created".to_string(),
        })
    }

    /// Create a web app on an existing plan and wait for provisioning
    pub async fn create_web_app(
        &self,
        resource_group: &str,
        app_name: &str,
        service_plan_id: &str,
        location: &str,
    ) -> Result<WebAppResult, ServiceError> {
        info!("Creating Web App: {}", app_name);

        let result: Result<String, ServiceError> = async {
            let url = format!(
                "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Web/sites/{}?api-version={}",
                self.base_url, self.subscription_id, resource_group, app_name, WEB_API_VERSION
            );
            let body = serde_json::json!({
                "location": location,
                "properties": {
                    "serverFarmId": service_plan_id,
                    "httpsOnly": true,
                    "siteConfig": {
                        "appSettings": [],
                        "alwaysOn": true,
                        "httpLoggingEnabled": true,
                        "requestTracingEnabled": true,
                        "detailedErrorLoggingEnabled": true
                    }
                }
            });

            let created: ArmResource = self.put_json(&url, &body).await?;
            let id = created.id.clone().unwrap_or_default();
            self.wait_for_provisioning(&url).await?;
            Ok(id)
        }
        .await;

        let id = result
            .map_err(|e| ServiceError::AzureError(format!("Failed to create Web App: {}", e)))?;

        Ok(WebAppResult {
            name: app_name.to_string(),
            resource_group: resource_group.to_string(),
            location: location.to_string(),
            url: format!("https://{}.azurewebsites.net", app_name),
            id,
            status: "created".to_string(),
        })
    }

    // --- request plumbing ---

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let token = self.auth.token().await?;
        debug!("GET {}", url);

        let response = self.http.get(url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::AzureError(format!("{}: {}", status, body)));
        }
        Ok(response.json().await?)
    }

    async fn put_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let token = self.auth.token().await?;
        debug!("PUT {}", url);

        let response = self
            .http
            .put(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::AzureError(format!("{}: {}", status, body)));
        }
        Ok(response.json().await?)
    }

    async fn post_action(
        &self,
        resource_group: &str,
        name: &str,
        action: &str,
    ) -> Result<(), ServiceError> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ContainerInstance/containerGroups/{}/{}?api-version={}",
            self.base_url, self.subscription_id, resource_group, name, action, ACI_API_VERSION
        );
        let token = self.auth.token().await?;
        debug!("POST {}", url);

        let response = self.http.post(&url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::AzureError(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn poll_container_group(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<ContainerGroup, ServiceError> {
        let url = self.group_url(resource_group, name);
        loop {
            let group: ContainerGroup = self.get_json(&url).await?;
            let state = group.properties.provisioning_state.as_deref();
            if let Some("Failed") | Some("Canceled") = state {
                return Err(ServiceError::AzureError(format!(
                    "Provisioning ended in state {}",
                    state.unwrap_or("unknown")
                )));
            }
            if is_terminal_state(state) {
                return Ok(group);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_provisioning(&self, url: &str) -> Result<(), ServiceError> {
        loop {
            let resource: ArmResource = self.get_json(url).await?;
            let state = resource
                .properties
                .as_ref()
                .and_then(|p| p.get("provisioningState"))
                .and_then(|s| s.as_str());

            match state {
                Some("Succeeded") | None => return Ok(()),
                Some("Failed") | Some("Canceled") => {
                    return Err(ServiceError::AzureError(format!(
                        "Provisioning ended in state {}",
                        state.unwrap_or("unknown")
                    )))
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }
}

fn is_terminal_state(state: Option<&str>) -> bool {
    matches!(state, Some("Succeeded") | Some("Failed") | Some("Canceled"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Request, State};
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;

    fn test_config() -> AzureConfig {
        AzureConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            tenant_id: "tenant".to_string(),
            subscription_id: "sub".to_string(),
        }
    }

    async fn record(
        State(seen): State<Arc<Mutex<Vec<String>>>>,
        request: Request,
    ) -> Json<Value> {
        let path = request.uri().path().to_string();
        seen.lock()
            .await
            .push(format!("{} {}", request.method(), path));
        if path.contains("/oauth2/") {
            Json(json!({ "access_token": "test-token", "expires_in": 3600 }))
        } else {
            Json(json!({}))
        }
    }

    /// Local stand-in for the ARM and identity endpoints. Records every
    /// request as "METHOD /path" and answers everything with 200.
    async fn mock_arm_server(seen: Arc<Mutex<Vec<String>>>) -> String {
        let app = Router::new().fallback(record).with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_stop_acknowledges_without_waiting() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = mock_arm_server(seen.clone()).await;
        let client = AzureContainerClient::new(test_config())
            .unwrap()
            .with_base_urls(base.clone(), base);

        let ack = client.stop_container("rg", "web").await.unwrap();
        assert_eq!(ack.status, "stopping");
        assert_eq!(ack.message, "Container web stop initiated");

        let seen = seen.lock().await;
        assert!(seen
            .iter()
            .any(|line| line.starts_with("POST") && line.ends_with("/containerGroups/web/stop")));
    }

    #[tokio::test]
    async fn test_restart_issues_stop_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = mock_arm_server(seen.clone()).await;
        let client = AzureContainerClient::new(test_config())
            .unwrap()
            .with_base_urls(base.clone(), base);

        let ack = client.restart_container("rg", "web").await.unwrap();
        assert_eq!(ack.status, "restarting");
        assert_eq!(ack.message, "Container web restart initiated");

        // The restart cycle is stop-only; no start or restart action goes out
        let seen = seen.lock().await;
        assert!(seen
            .iter()
            .any(|line| line.starts_with("POST") && line.ends_with("/containerGroups/web/stop")));
        assert!(!seen.iter().any(|line| line.contains("/restart")));
        assert!(!seen.iter().any(|line| line.ends_with("/start")));
    }
}
