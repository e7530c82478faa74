//! Azure service principal authentication
//!
//! OAuth2 client-credentials token acquisition against the Microsoft
//! identity platform, with an expiry-aware cache. Common AADSTS failure
//! codes are rewritten into messages a user can act on.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::AzureConfig;
use crate::errors::ServiceError;

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Tokens are refreshed this long before their actual expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Acquires and caches management-plane bearer tokens
pub struct TokenProvider {
    http: reqwest::Client,
    config: AzureConfig,
    login_base: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, config: AzureConfig) -> Self {
        Self {
            http,
            config,
            login_base: LOGIN_BASE.to_string(),
            cached: RwLock::new(None),
        }
    }

    /// Use an alternative identity endpoint, e.g. a sovereign cloud
    pub fn with_login_base(mut self, base: impl Into<String>) -> Self {
        self.login_base = base.into();
        self
    }

    /// Return a valid bearer token, fetching a fresh one when needed
    pub async fn token(&self) -> Result<String, ServiceError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.expires_at > Utc::now() {
                    return Ok(entry.token.clone());
                }
            }
        }

        let token = self.fetch_token().await?;
        Ok(token)
    }

    async fn fetch_token(&self) -> Result<String, ServiceError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base, self.config.tenant_id
        );
        debug!("Requesting management token from {}", url);

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self.http.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token request failed: {} - {}", status, body);
            return Err(ServiceError::AuthError(simplify_error(&body)));
        }

        let body: TokenResponse = response.json().await?;
        let expires_at =
            Utc::now() + Duration::seconds(body.expires_in.saturating_sub(EXPIRY_MARGIN_SECS));

        let mut cached = self.cached.write().await;
        *cached = Some(CachedToken {
            token: body.access_token.clone(),
            expires_at,
        });

        Ok(body.access_token)
    }
}

/// Translate raw AADSTS error payloads into actionable messages
pub fn simplify_error(message: &str) -> String {
    if message.contains("AADSTS7000215") {
        return "Invalid Azure client secret. Please verify you copied the secret value, not the secret ID.".to_string();
    }
    if message.contains("AADSTS70002") {
        return "Invalid Azure client credentials. Please check your Client ID and Secret."
            .to_string();
    }
    if message.contains("AADSTS90002") {
        return "Invalid Azure tenant ID. Please verify your Tenant ID is correct.".to_string();
    }
    if message.contains("insufficient privileges") {
        return "Azure account needs Contributor permissions. Contact your Azure administrator."
            .to_string();
    }
    "Azure authentication failed. Please verify your credentials are correct.".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_aadsts_codes_are_translated() {
        assert!(simplify_error("AADSTS7000215: Invalid client secret provided")
            .contains("secret value, not the secret ID"));
        assert!(simplify_error("AADSTS70002: Error validating credentials")
            .contains("Client ID and Secret"));
        assert!(simplify_error("AADSTS90002: Tenant not found").contains("Tenant ID"));
        assert!(simplify_error("The client has insufficient privileges")
            .contains("Contributor permissions"));
    }

    #[test]
    fn test_unknown_errors_get_generic_message() {
        assert_eq!(
            simplify_error("something else entirely"),
            "Azure authentication failed. Please verify your credentials are correct."
        );
    }
}
