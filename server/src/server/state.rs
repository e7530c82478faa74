//! Server state

use std::sync::Arc;

use tracing::warn;

use crate::azure::client::AzureContainerClient;
use crate::chat::ChatAssistant;
use crate::config::{AzureConfig, Settings};
use crate::deploy::executor::IacExecutor;
use crate::deploy::saas::SaasDeployer;
use crate::errors::ServiceError;
use crate::registry::DeploymentRegistry;

/// Server state shared across handlers
///
/// Built once at startup and passed to every handler; no module-level
/// services. Azure-backed pieces are optional so the server still runs
/// without credentials, failing only the operations that need them.
pub struct ServerState {
    pub registry: Arc<DeploymentRegistry>,
    pub executor: Arc<IacExecutor>,
    pub saas: Arc<SaasDeployer>,
    pub azure: Option<Arc<AzureContainerClient>>,
    pub azure_config: Option<AzureConfig>,
    pub chat: ChatAssistant,
}

impl ServerState {
    /// Wire up all services from settings and the process environment
    pub fn build(settings: &Settings) -> Result<Arc<Self>, ServiceError> {
        let azure_config = match AzureConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Azure operations disabled: {}", e);
                None
            }
        };

        let azure = match &azure_config {
            Some(config) => Some(Arc::new(AzureContainerClient::new(config.clone())?)),
            None => None,
        };

        let registry = Arc::new(DeploymentRegistry::new());
        let executor = Arc::new(IacExecutor::new(
            Arc::clone(&registry),
            settings.deployments_dir.clone(),
            azure_config.clone(),
        ));
        let saas = Arc::new(SaasDeployer::new(Arc::clone(&registry), azure.clone()));
        let chat = ChatAssistant::new(azure.clone());

        Ok(Arc::new(Self {
            registry,
            executor,
            saas,
            azure,
            azure_config,
            chat,
        }))
    }
}
