//! IaC executor
//!
//! Writes submitted Terraform/Pulumi source into an isolated scratch
//! directory and runs the toolchain steps strictly in sequence, streaming
//! each step's output into the deployment's log. One detached task per
//! deployment; tasks are tracked by deployment id. There is no rollback,
//! no retry, and no per-step timeout.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{missing_credential_vars, AzureConfig};
use crate::errors::ServiceError;
use crate::models::deployment::{CodeFormat, DeployRequest, DeploymentStatus, Provider};
use crate::registry::DeploymentRegistry;

/// Executes infrastructure deployments via external toolchains
pub struct IacExecutor {
    registry: Arc<DeploymentRegistry>,
    deployments_dir: PathBuf,
    azure: Option<AzureConfig>,
    tasks: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl IacExecutor {
    pub fn new(
        registry: Arc<DeploymentRegistry>,
        deployments_dir: PathBuf,
        azure: Option<AzureConfig>,
    ) -> Self {
        Self {
            registry,
            deployments_dir,
            azure,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Submit a deployment. Returns the allocated identifier once the record
    /// is registered; the toolchain runs in a detached task.
    pub async fn submit(self: &Arc<Self>, request: DeployRequest) -> Result<String, ServiceError> {
        if request.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Deployment code must not be empty".to_string(),
            ));
        }

        let deployment_id = Uuid::new_v4().to_string();

        // aws/gcp are accepted but fail explicitly, with no side effects
        if matches!(request.provider, Provider::Aws | Provider::Gcp) {
            let message = format!("Provider {} deployment not implemented", request.provider);
            self.registry
                .create(&deployment_id, "Deployment initiated")
                .await;
            self.registry.append_log(&deployment_id, &message).await;
            self.registry
                .set_status(&deployment_id, DeploymentStatus::Failed, Some(message))
                .await?;
            return Ok(deployment_id);
        }

        let azure = self.azure.clone().ok_or_else(|| {
            ServiceError::ConfigError(format!(
                "Missing Azure credentials: {}",
                missing_credential_vars().join(", ")
            ))
        })?;

        // Directory creation failure aborts before any record is registered
        let deployment_path = self.deployments_dir.join(&deployment_id);
        tokio::fs::create_dir_all(&deployment_path).await?;

        self.registry
            .create(&deployment_id, "Deployment initiated")
            .await;

        info!("Deployment {} submitted ({})", deployment_id, request.provider);

        // The map lock is held across the spawn so the task's own cleanup
        // cannot run before its handle is inserted
        let mut tasks = self.tasks.write().await;
        let executor = Arc::clone(self);
        let id = deployment_id.clone();
        let handle = tokio::spawn(async move {
            let result = match request.code_type {
                CodeFormat::Terraform => {
                    executor
                        .deploy_terraform(&id, &deployment_path, &request, &azure)
                        .await
                }
                CodeFormat::Pulumi => {
                    executor
                        .deploy_pulumi(&id, &deployment_path, &request, &azure)
                        .await
                }
            };

            if let Err(e) = result {
                error!("Deployment {} failed: {}", id, e);
                if let Err(e) = executor
                    .registry
                    .set_status(&id, DeploymentStatus::Failed, Some(e.to_string()))
                    .await
                {
                    warn!("Could not mark deployment {} failed: {}", id, e);
                }
            }

            executor.tasks.write().await.remove(&id);
        });
        tasks.insert(deployment_id.clone(), handle);
        drop(tasks);

        Ok(deployment_id)
    }

    async fn deploy_terraform(
        &self,
        deployment_id: &str,
        path: &Path,
        request: &DeployRequest,
        azure: &AzureConfig,
    ) -> Result<(), ServiceError> {
        self.registry
            .append_log(deployment_id, "Writing Terraform configuration...")
            .await;

        tokio::fs::write(path.join("main.tf"), &request.code).await?;
        tokio::fs::write(path.join("terraform.tfvars"), terraform_vars(azure)).await?;

        self.registry
            .set_status(deployment_id, DeploymentStatus::Running, None)
            .await?;
        self.registry
            .append_log(deployment_id, "Initializing Terraform...")
            .await;
        self.exec_step(deployment_id, path, "terraform", &["init"])
            .await?;

        self.registry
            .append_log(deployment_id, "Planning Terraform deployment...")
            .await;
        self.exec_step(deployment_id, path, "terraform", &["plan"])
            .await?;

        self.registry
            .append_log(deployment_id, "Applying Terraform configuration...")
            .await;
        self.exec_step(deployment_id, path, "terraform", &["apply", "-auto-approve"])
            .await?;

        let outputs_json = self
            .exec_step(deployment_id, path, "terraform", &["output", "-json"])
            .await?;
        self.store_outputs(deployment_id, &outputs_json, "Could not parse Terraform outputs")
            .await;

        self.registry
            .set_status(deployment_id, DeploymentStatus::Success, None)
            .await?;
        self.registry
            .append_log(deployment_id, "Deployment completed successfully!")
            .await;
        Ok(())
    }

    async fn deploy_pulumi(
        &self,
        deployment_id: &str,
        path: &Path,
        request: &DeployRequest,
        azure: &AzureConfig,
    ) -> Result<(), ServiceError> {
        self.registry
            .append_log(deployment_id, "Writing Pulumi configuration...")
            .await;

        tokio::fs::write(path.join("index.ts"), &request.code).await?;

        let package_json = serde_json::json!({
            "name": format!("deployment-{}", deployment_id),
            "main": "index.ts",
            "dependencies": {
                "@pulumi/pulumi": "^3.0.0",
                "@pulumi/azure-native": "^2.0.0"
            }
        });
        tokio::fs::write(
            path.join("package.json"),
            serde_json::to_string_pretty(&package_json)?,
        )
        .await?;

        let pulumi_yaml = format!(
            "name: deployment-{}\nruntime: nodejs\ndescription: Infrastructure deployment via Instanti8.dev\n",
            deployment_id
        );
        tokio::fs::write(path.join("Pulumi.yaml"), pulumi_yaml).await?;

        self.registry
            .set_status(deployment_id, DeploymentStatus::Running, None)
            .await?;
        self.registry
            .append_log(deployment_id, "Installing Pulumi dependencies...")
            .await;
        self.exec_step(deployment_id, path, "npm", &["install"])
            .await?;

        self.registry
            .append_log(deployment_id, "Initializing Pulumi stack...")
            .await;
        self.exec_step(deployment_id, path, "pulumi", &["stack", "init", deployment_id])
            .await?;

        let config_values = [
            ("azure-native:clientId", azure.client_id.as_str(), false),
            ("azure-native:clientSecret", azure.client_secret.as_str(), true),
            ("azure-native:tenantId", azure.tenant_id.as_str(), false),
            ("azure-native:subscriptionId", azure.subscription_id.as_str(), false),
        ];
        for (key, value, secret) in config_values {
            let mut args = vec!["config", "set", key, value];
            if secret {
                args.push("--secret");
            }
            self.exec_step(deployment_id, path, "pulumi", &args).await?;
        }

        self.registry
            .append_log(deployment_id, "Deploying Pulumi stack...")
            .await;
        self.exec_step(deployment_id, path, "pulumi", &["up", "--yes"])
            .await?;

        let outputs_json = self
            .exec_step(deployment_id, path, "pulumi", &["stack", "output", "--json"])
            .await?;
        self.store_outputs(deployment_id, &outputs_json, "Could not parse Pulumi outputs")
            .await;

        self.registry
            .set_status(deployment_id, DeploymentStatus::Success, None)
            .await?;
        self.registry
            .append_log(deployment_id, "Deployment completed successfully!")
            .await;
        Ok(())
    }

    /// Tear down a deployment's infrastructure. The destroy runs as its own
    /// detached task under the existing identifier.
    pub async fn destroy(self: &Arc<Self>, deployment_id: &str) -> Result<(), ServiceError> {
        if self.registry.get(deployment_id).await.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Deployment {}",
                deployment_id
            )));
        }

        self.registry
            .append_log(deployment_id, "Destroying infrastructure...")
            .await;
        self.registry
            .set_status(deployment_id, DeploymentStatus::Running, None)
            .await?;

        let task_key = format!("{}/destroy", deployment_id);

        // Lock held across the spawn, as in submit
        let mut tasks = self.tasks.write().await;
        let executor = Arc::clone(self);
        let id = deployment_id.to_string();
        let key = task_key.clone();
        let path = self.deployments_dir.join(deployment_id);
        let handle = tokio::spawn(async move {
            let result = executor.run_destroy(&id, &path).await;
            match result {
                Ok(()) => {
                    executor
                        .registry
                        .append_log(&id, "Infrastructure destroyed successfully")
                        .await;
                    if let Err(e) = executor
                        .registry
                        .set_status(&id, DeploymentStatus::Success, None)
                        .await
                    {
                        warn!("Could not mark destroy {} complete: {}", id, e);
                    }
                }
                Err(e) => {
                    executor
                        .registry
                        .append_log(&id, &format!("Destroy failed: {}", e))
                        .await;
                    if let Err(e) = executor
                        .registry
                        .set_status(&id, DeploymentStatus::Failed, Some(e.to_string()))
                        .await
                    {
                        warn!("Could not mark destroy {} failed: {}", id, e);
                    }
                }
            }

            executor.tasks.write().await.remove(&key);
        });
        tasks.insert(task_key, handle);
        drop(tasks);

        Ok(())
    }

    async fn run_destroy(&self, deployment_id: &str, path: &Path) -> Result<(), ServiceError> {
        // The marker file tells us which toolchain produced this deployment
        if file_exists(&path.join("main.tf")).await {
            self.exec_step(deployment_id, path, "terraform", &["destroy", "-auto-approve"])
                .await?;
        } else if file_exists(&path.join("Pulumi.yaml")).await {
            self.exec_step(deployment_id, path, "pulumi", &["destroy", "--yes"])
                .await?;
        }
        Ok(())
    }

    /// Run one toolchain step, appending its combined output to the log.
    /// Returns the step's stdout for output parsing.
    async fn exec_step(
        &self,
        deployment_id: &str,
        cwd: &Path,
        program: &str,
        args: &[&str],
    ) -> Result<String, ServiceError> {
        let command_line = format!("{} {}", program, args.join(" "));
        self.registry
            .append_log(deployment_id, &format!("Executing: {}", command_line))
            .await;

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| ServiceError::DeployError(format!("Failed to run {}: {}", program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.trim().is_empty() {
            self.registry
                .append_log(deployment_id, &format!("Warning: {}", stderr.trim_end()))
                .await;
        }
        if !stdout.trim().is_empty() {
            self.registry
                .append_log(deployment_id, stdout.trim_end())
                .await;
        }

        if !output.status.success() {
            let message = if stderr.trim().is_empty() {
                format!("Command failed: {} ({})", command_line, output.status)
            } else {
                format!("Command failed: {}: {}", command_line, stderr.trim())
            };
            self.registry
                .append_log(deployment_id, &format!("Error: {}", message))
                .await;
            return Err(ServiceError::DeployError(message));
        }

        Ok(stdout)
    }

    /// Parse a toolchain's JSON output dump; parse failure is logged but
    /// never fails the deployment.
    async fn store_outputs(&self, deployment_id: &str, raw: &str, parse_error_log: &str) {
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(outputs) => self.registry.set_outputs(deployment_id, outputs).await,
            Err(_) => {
                self.registry.append_log(deployment_id, parse_error_log).await;
            }
        }
    }

    /// Wait for a deployment's detached task to finish. Test support.
    pub async fn wait(&self, deployment_id: &str) {
        let handle = self.tasks.write().await.remove(deployment_id);
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn terraform_vars(azure: &AzureConfig) -> String {
    format!(
        "# Azure Configuration\nclient_id       = \"{}\"\nclient_secret   = \"{}\"\ntenant_id       = \"{}\"\nsubscription_id = \"{}\"\n",
        azure.client_id, azure.client_secret, azure.tenant_id, azure.subscription_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_azure_config() -> AzureConfig {
        AzureConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            tenant_id: "tenant".to_string(),
            subscription_id: "sub".to_string(),
        }
    }

    fn terraform_request() -> DeployRequest {
        DeployRequest {
            code: "resource \"azurerm_resource_group\" \"main\" { name = \"rg-test\" location = \"East US\" }".to_string(),
            code_type: CodeFormat::Terraform,
            provider: Provider::Azure,
            resource_type: "infrastructure".to_string(),
        }
    }

    fn executor_in(dir: &Path) -> (Arc<IacExecutor>, Arc<DeploymentRegistry>) {
        let registry = Arc::new(DeploymentRegistry::new());
        let executor = Arc::new(IacExecutor::new(
            registry.clone(),
            dir.to_path_buf(),
            Some(test_azure_config()),
        ));
        (executor, registry)
    }

    #[tokio::test]
    async fn test_empty_code_is_rejected_before_any_state() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        let mut request = terraform_request();
        request.code = "   ".to_string();

        let result = executor.submit(request).await;
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_aws_fails_immediately_without_side_effects() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        let mut request = terraform_request();
        request.provider = Provider::Aws;

        let id = executor.submit(request).await.unwrap();
        let record = registry.get(&id).await.unwrap();
        assert_eq!(record.status, DeploymentStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("not implemented"));
        // No scratch directory was created for the rejected provider
        assert!(!scratch.path().join(&id).exists());
    }

    #[tokio::test]
    async fn test_azure_without_credentials_is_a_config_error() {
        let scratch = tempfile::tempdir().unwrap();
        let registry = Arc::new(DeploymentRegistry::new());
        let executor = Arc::new(IacExecutor::new(
            registry.clone(),
            scratch.path().to_path_buf(),
            None,
        ));

        let result = executor.submit(terraform_request()).await;
        assert!(matches!(result, Err(ServiceError::ConfigError(_))));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_terraform_submission_writes_entry_files() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        let id = executor.submit(terraform_request()).await.unwrap();

        // The identifier resolves immediately, before the task finishes
        let record = registry.get(&id).await.unwrap();
        assert!(matches!(
            record.status,
            DeploymentStatus::Pending | DeploymentStatus::Running
        ));

        executor.wait(&id).await;

        let main_tf = std::fs::read_to_string(scratch.path().join(&id).join("main.tf")).unwrap();
        assert!(main_tf.contains("rg-test"));
        let tfvars =
            std::fs::read_to_string(scratch.path().join(&id).join("terraform.tfvars")).unwrap();
        assert!(tfvars.contains("client_id"));
        assert!(tfvars.contains("\"tenant\""));

        // Toolchain outcome depends on the host; the record must be terminal
        // either way, with the step log present.
        let record = registry.get(&id).await.unwrap();
        assert!(record.status.is_terminal());
        assert!(record
            .logs
            .iter()
            .any(|line| line.contains("Executing: terraform init")));
    }

    #[tokio::test]
    async fn test_pulumi_submission_writes_manifest_and_stack() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        let mut request = terraform_request();
        request.code_type = CodeFormat::Pulumi;
        request.code = "import * as pulumi from '@pulumi/pulumi';".to_string();

        let id = executor.submit(request).await.unwrap();
        executor.wait(&id).await;

        let dir = scratch.path().join(&id);
        assert!(dir.join("index.ts").exists());
        assert!(dir.join("Pulumi.yaml").exists());
        let manifest = std::fs::read_to_string(dir.join("package.json")).unwrap();
        assert!(manifest.contains("@pulumi/azure-native"));

        assert!(registry.get(&id).await.unwrap().status.is_terminal());
    }

    #[tokio::test]
    async fn test_destroy_unknown_deployment() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, _) = executor_in(scratch.path());
        let result = executor.destroy("missing").await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_destroy_while_deployment_is_running() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        registry.create("d1", "Deployment initiated").await;
        registry
            .set_status("d1", DeploymentStatus::Running, None)
            .await
            .unwrap();

        // The record is still running; destroy must not be rejected
        executor.destroy("d1").await.unwrap();
        executor.wait("d1/destroy").await;

        let record = registry.get("d1").await.unwrap();
        assert!(record.status.is_terminal());
        assert!(record
            .logs
            .iter()
            .any(|line| line.contains("Destroying infrastructure...")));
    }

    #[tokio::test]
    async fn test_finished_destroy_task_releases_its_handle() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        registry.create("d1", "Deployment initiated").await;
        registry
            .set_status("d1", DeploymentStatus::Running, None)
            .await
            .unwrap();

        executor.destroy("d1").await.unwrap();

        // The task removes its own entry once it completes
        let mut released = false;
        for _ in 0..200 {
            if executor.tasks.read().await.is_empty() {
                released = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(released);
        assert!(registry.get("d1").await.unwrap().status.is_terminal());
    }

    #[tokio::test]
    async fn test_destroy_reenters_running_then_terminates() {
        let scratch = tempfile::tempdir().unwrap();
        let (executor, registry) = executor_in(scratch.path());

        let id = executor.submit(terraform_request()).await.unwrap();
        executor.wait(&id).await;

        executor.destroy(&id).await.unwrap();
        executor.wait(&format!("{}/destroy", id)).await;

        let record = registry.get(&id).await.unwrap();
        assert!(record.status.is_terminal());
        assert!(record
            .logs
            .iter()
            .any(|line| line.contains("Destroying infrastructure...")));
    }
}
