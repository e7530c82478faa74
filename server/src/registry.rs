//! In-memory deployment registry
//!
//! Process-wide mapping from deployment identifier to its record. The map is
//! the only state shared between deployment tasks; the RwLock makes per
//! operation atomicity explicit. Records are never deleted, a destroy reuses
//! the same identifier.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::deploy::fsm;
use crate::errors::ServiceError;
use crate::models::deployment::{DeploymentRecord, DeploymentStatus};

/// Registry of all deployments known to this process. Lost on restart.
#[derive(Default)]
pub struct DeploymentRegistry {
    deployments: RwLock<HashMap<String, DeploymentRecord>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new deployment in `pending` with an initial log line
    pub async fn create(&self, deployment_id: &str, initial_log: &str) {
        let mut record = DeploymentRecord::new(deployment_id);
        record.logs.push(timestamped(initial_log));
        self.deployments
            .write()
            .await
            .insert(deployment_id.to_string(), record);
    }

    /// Append a timestamped line to a deployment's log
    pub async fn append_log(&self, deployment_id: &str, message: &str) {
        if let Some(record) = self.deployments.write().await.get_mut(deployment_id) {
            record.logs.push(timestamped(message));
        }
    }

    /// Transition a deployment's status, enforcing the lifecycle order
    pub async fn set_status(
        &self,
        deployment_id: &str,
        status: DeploymentStatus,
        error: Option<String>,
    ) -> Result<(), ServiceError> {
        let mut deployments = self.deployments.write().await;
        let record = deployments
            .get_mut(deployment_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Deployment {}", deployment_id)))?;

        fsm::check_transition(record.status, status).map_err(ServiceError::DeployError)?;

        record.status = status;
        if let Some(error) = error {
            record.error = Some(error);
        }
        Ok(())
    }

    /// Store the outputs of a completed run
    pub async fn set_outputs(&self, deployment_id: &str, outputs: Map<String, Value>) {
        if let Some(record) = self.deployments.write().await.get_mut(deployment_id) {
            record.outputs = Some(outputs);
        }
    }

    /// Store the application and management URLs of a finished deployment
    pub async fn set_urls(
        &self,
        deployment_id: &str,
        deployment_url: Option<String>,
        management_url: Option<String>,
    ) {
        if let Some(record) = self.deployments.write().await.get_mut(deployment_id) {
            if deployment_url.is_some() {
                record.deployment_url = deployment_url;
            }
            if management_url.is_some() {
                record.management_url = management_url;
            }
        }
    }

    /// Snapshot of one deployment record
    pub async fn get(&self, deployment_id: &str) -> Option<DeploymentRecord> {
        self.deployments.read().await.get(deployment_id).cloned()
    }

    /// Snapshot of all deployment records
    pub async fn list(&self) -> Vec<DeploymentRecord> {
        self.deployments.read().await.values().cloned().collect()
    }
}

fn timestamped(message: &str) -> String {
    format!("{}: {}", Utc::now().to_rfc3339(), message)
}
