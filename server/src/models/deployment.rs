//! Deployment models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of a single deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Registered, no external step dispatched yet
    Pending,

    /// External steps in progress
    Running,

    /// All steps completed
    Success,

    /// A step failed or the submission was rejected
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Source format of submitted infrastructure code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeFormat {
    Terraform,
    Pulumi,
}

impl std::str::FromStr for CodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terraform" => Ok(CodeFormat::Terraform),
            "pulumi" => Ok(CodeFormat::Pulumi),
            _ => Err(format!("Invalid code type: {}", s)),
        }
    }
}

/// Target cloud provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Azure,
    Aws,
    Gcp,
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure" => Ok(Provider::Azure),
            "aws" => Ok(Provider::Aws),
            "gcp" => Ok(Provider::Gcp),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::Azure => "azure",
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
        };
        write!(f, "{}", s)
    }
}

/// A validated deployment submission
#[derive(Debug, Clone)]
pub struct DeployRequest {
    /// Infrastructure source code
    pub code: String,

    /// Source format
    pub code_type: CodeFormat,

    /// Target provider
    pub provider: Provider,

    /// Logical resource kind requested by the caller
    pub resource_type: String,
}

/// The registry's status/log/outputs entry for one submitted deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Deployment identifier
    pub deployment_id: String,

    /// Current status
    pub status: DeploymentStatus,

    /// Timestamped log lines, append-only
    pub logs: Vec<String>,

    /// Toolchain or resource outputs, present after a successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,

    /// Terminal error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Public URL of the deployed application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,

    /// URL for managing the deployed resources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_url: Option<String>,
}

impl DeploymentRecord {
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            status: DeploymentStatus::Pending,
            logs: Vec::new(),
            outputs: None,
            error: None,
            deployment_url: None,
            management_url: None,
        }
    }
}

/// Normalized description of the Azure resources a deployment asks for,
/// independent of the source format it was written in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub resource_group: String,
    pub location: String,
    pub app_service_name: String,
    pub service_plan_name: String,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            resource_group: "instanti8-resources".to_string(),
            location: "East US".to_string(),
            app_service_name: "instanti8-app".to_string(),
            service_plan_name: "instanti8-plan".to_string(),
        }
    }
}
