//! Server configuration from the process environment

use std::env;
use std::path::PathBuf;

use crate::errors::ServiceError;
use crate::logs::LogLevel;

/// Environment variables holding the Azure service principal credentials.
pub const AZURE_CREDENTIAL_VARS: [&str; 4] = [
    "AZURE_CLIENT_ID",
    "AZURE_CLIENT_SECRET",
    "AZURE_TENANT_ID",
    "AZURE_SUBSCRIPTION_ID",
];

/// Azure service principal configuration
#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl AzureConfig {
    /// Build the configuration from the process environment.
    ///
    /// Fails with every missing variable name enumerated, never a partial
    /// or anonymous configuration.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = missing_in(&lookup);
        if !missing.is_empty() {
            return Err(ServiceError::ConfigError(format!(
                "Missing Azure credentials: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            client_id: lookup("AZURE_CLIENT_ID").unwrap_or_default(),
            client_secret: lookup("AZURE_CLIENT_SECRET").unwrap_or_default(),
            tenant_id: lookup("AZURE_TENANT_ID").unwrap_or_default(),
            subscription_id: lookup("AZURE_SUBSCRIPTION_ID").unwrap_or_default(),
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn missing_in<F>(lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    AZURE_CREDENTIAL_VARS
        .iter()
        .filter(|key| lookup(key).is_none())
        .map(|key| key.to_string())
        .collect()
}

/// Names of the Azure credential variables absent from the environment
pub fn missing_credential_vars() -> Vec<String> {
    missing_in(env_lookup)
}

/// Names of the Azure credential variables present in the environment
pub fn configured_credential_vars() -> Vec<String> {
    AZURE_CREDENTIAL_VARS
        .iter()
        .filter(|key| env_lookup(key).is_some())
        .map(|key| key.to_string())
        .collect()
}

/// Main server settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Scratch root for per-deployment working directories
    pub deployments_dir: PathBuf,

    /// Log level
    pub log_level: LogLevel,

    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            deployments_dir: PathBuf::from("deployments"),
            log_level: LogLevel::Info,
            json_logs: false,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ServiceError> {
        let mut settings = Self::default();

        if let Ok(host) = env::var("INSTANTI8_HOST") {
            settings.host = host;
        }
        if let Ok(port) = env::var("INSTANTI8_PORT") {
            settings.port = port
                .parse()
                .map_err(|_| ServiceError::ConfigError(format!("Invalid port: {}", port)))?;
        }
        if let Ok(dir) = env::var("INSTANTI8_DEPLOYMENTS_DIR") {
            settings.deployments_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var("INSTANTI8_LOG_LEVEL") {
            settings.log_level = level.parse().map_err(ServiceError::ConfigError)?;
        }
        if let Ok(json) = env::var("INSTANTI8_LOG_JSON") {
            settings.json_logs = json == "1" || json.eq_ignore_ascii_case("true");
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().filter(|v| !v.is_empty())
    }

    #[test]
    fn test_all_missing_names_are_enumerated() {
        let lookup = lookup_from(&[("AZURE_CLIENT_ID", "id")]);
        let err = AzureConfig::from_lookup(lookup).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("AZURE_CLIENT_SECRET"));
        assert!(message.contains("AZURE_TENANT_ID"));
        assert!(message.contains("AZURE_SUBSCRIPTION_ID"));
        assert!(!message.contains("AZURE_CLIENT_ID,"));
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let lookup = lookup_from(&[
            ("AZURE_CLIENT_ID", "id"),
            ("AZURE_CLIENT_SECRET", ""),
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_SUBSCRIPTION_ID", "sub"),
        ]);
        let err = AzureConfig::from_lookup(lookup).unwrap_err();
        assert!(err.to_string().contains("AZURE_CLIENT_SECRET"));
    }

    #[test]
    fn test_complete_credentials_build() {
        let lookup = lookup_from(&[
            ("AZURE_CLIENT_ID", "id"),
            ("AZURE_CLIENT_SECRET", "secret"),
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_SUBSCRIPTION_ID", "sub"),
        ]);
        let config = AzureConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.subscription_id, "sub");
    }
}
