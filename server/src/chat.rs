//! Keyword-matched chat assistant
//!
//! Routes a lowercased message through a fixed list of keyword rules. Deploy
//! requests come back with generated Terraform attached; list and status
//! requests hit Azure live and degrade to a credentials hint when that fails.

use std::sync::Arc;

use tracing::debug;

use crate::azure::client::AzureContainerClient;
use crate::deploy::codegen;
use crate::models::deployment::CodeFormat;

/// A single assistant reply, with optional generated code attached
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: String,
    pub code: Option<String>,
    pub code_type: Option<CodeFormat>,
}

impl ChatReply {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            code_type: None,
        }
    }

    fn with_code(message: impl Into<String>, generated: codegen::GeneratedCode) -> Self {
        Self {
            message: message.into(),
            code: Some(generated.code),
            code_type: Some(generated.code_type),
        }
    }
}

/// Chat assistant over an optional Azure client
///
/// The client is optional so the chat channel stays useful without
/// credentials; only the live queries need it.
pub struct ChatAssistant {
    azure: Option<Arc<AzureContainerClient>>,
}

impl ChatAssistant {
    pub fn new(azure: Option<Arc<AzureContainerClient>>) -> Self {
        Self { azure }
    }

    /// Produce a reply for one user message
    pub async fn respond(&self, content: &str) -> ChatReply {
        let message = content.to_lowercase();
        debug!("Chat message: {}", message);

        if message.contains("deploy") && message.contains("azure") {
            return self.deploy_reply(&message);
        }

        if message.contains("list") || message.contains("show containers") {
            return self.list_reply().await;
        }

        if message.contains("status") || message.contains("check") {
            return self.status_reply().await;
        }

        if message.contains("stop") && message.contains("container") {
            return ChatReply::text(
                "I can stop Azure containers for you.\n\nPlease specify:\n\
                 • Container name\n• Resource group\n\n\
                 Example: 'stop container web-server in my-rg'",
            );
        }

        if message.contains("delete") || message.contains("remove") {
            return ChatReply::text(
                "I can delete Azure containers.\n\nPlease specify:\n\
                 • Container name\n• Resource group\n\n\
                 Example: 'delete container web-server in my-rg'\n\n\
                 Warning: This action cannot be undone.",
            );
        }

        if message.contains("logs") || message.contains("debug") {
            return ChatReply::text(
                "I can retrieve container logs for debugging.\n\nPlease specify:\n\
                 • Container name\n• Resource group\n\n\
                 Example: 'show logs for web-server in my-rg'",
            );
        }

        if message.contains("help") {
            return ChatReply::text(
                "Azure Cloud Assistant Commands:\n\n\
                 • 'deploy nginx to azure' - Deploy web server\n\
                 • 'list containers' - Show all containers\n\
                 • 'check status' - Infrastructure overview\n\
                 • 'stop container [name] in [rg]' - Stop container\n\
                 • 'delete container [name] in [rg]' - Delete container\n\
                 • 'show logs for [name] in [rg]' - View logs\n\n\
                 Ready to deploy something?",
            );
        }

        if message.contains("hello") || message.contains("hi") {
            return ChatReply::text(
                "Hello! I'm your Azure deployment assistant.\n\n\
                 I can help you deploy and manage containers on Azure.\n\n\
                 Try: 'deploy nginx to azure' or 'list containers'",
            );
        }

        ChatReply::text(
            "I can help manage your Azure infrastructure through chat!\n\nTry:\n\
             • 'deploy nginx to azure'\n• 'list my containers'\n• 'check status'\n\
             • 'help' for more commands\n\nWhat would you like to do?",
        )
    }

    fn deploy_reply(&self, message: &str) -> ChatReply {
        if message.contains("nginx") {
            return ChatReply::with_code(
                "Here's Terraform for an nginx container on Azure Container Instances.\n\n\
                 Review the configuration, then submit it to deploy.",
                codegen::container_group("nginx:latest"),
            );
        }
        if message.contains("web") || message.contains("app") {
            return ChatReply::with_code(
                "Here's Terraform for an Azure Linux web app on an App Service plan.\n\n\
                 Review the configuration, then submit it to deploy.",
                codegen::web_app(),
            );
        }
        ChatReply::text(
            "I can deploy to Azure Container Instances! What would you like to deploy?\n\n\
             • nginx web server\n• node.js application\n• postgres database\n\
             • custom docker image\n\nTry: 'deploy nginx to azure'",
        )
    }

    async fn list_reply(&self) -> ChatReply {
        let Some(azure) = &self.azure else {
            return ChatReply::text(
                "Error fetching containers: Azure credentials are not configured.\n\n\
                 Please ensure your Azure credentials are configured in Settings.",
            );
        };

        match azure.list_containers(None).await {
            Ok(containers) if containers.is_empty() => ChatReply::text(
                "No Azure containers found in your subscription.\n\n\
                 Would you like to deploy one? Try: 'deploy nginx to azure'",
            ),
            Ok(containers) => {
                let mut response = String::from("Your Azure Container Instances:\n\n");
                for container in &containers {
                    response.push_str(&format!(
                        "• {} ({})\n  Image: {}\n  Location: {}\n  IP: {}\n\n",
                        container.name,
                        container.status,
                        container.image,
                        container.location,
                        container.public_ip.as_deref().unwrap_or("Not assigned"),
                    ));
                }
                ChatReply::text(response)
            }
            Err(e) => ChatReply::text(format!(
                "Error fetching containers: {}\n\n\
                 Please ensure your Azure credentials are configured in Settings.",
                e
            )),
        }
    }

    async fn status_reply(&self) -> ChatReply {
        let Some(azure) = &self.azure else {
            return ChatReply::text(
                "Cannot check status: Azure credentials are not configured.\n\n\
                 Please verify your Azure credentials in Settings.",
            );
        };

        match azure.list_containers(None).await {
            Ok(containers) => {
                let running = containers.iter().filter(|c| c.status == "Running").count();
                let stopped = containers.iter().filter(|c| c.status == "Stopped").count();
                let pending = containers.iter().filter(|c| c.status == "Pending").count();

                ChatReply::text(format!(
                    "Azure Infrastructure Status:\n\n\
                     • Running: {} containers\n• Stopped: {} containers\n\
                     • Pending: {} containers\n• Total: {} containers\n\n\
                     Need details on a specific container? Ask: 'show logs for [container-name]'",
                    running,
                    stopped,
                    pending,
                    containers.len(),
                ))
            }
            Err(e) => ChatReply::text(format!(
                "Cannot check status: {}\n\nPlease verify your Azure credentials in Settings.",
                e
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant() -> ChatAssistant {
        ChatAssistant::new(None)
    }

    #[tokio::test]
    async fn test_deploy_nginx_attaches_generated_code() {
        let reply = assistant().respond("please deploy nginx to azure").await;
        let code = reply.code.expect("generated code attached");
        assert!(code.contains("azurerm_container_group"));
        assert!(code.contains("nginx:latest"));
        assert_eq!(reply.code_type, Some(CodeFormat::Terraform));
    }

    #[tokio::test]
    async fn test_deploy_web_app_attaches_generated_code() {
        let reply = assistant().respond("deploy a web app to azure").await;
        let code = reply.code.expect("generated code attached");
        assert!(code.contains("azurerm_linux_web_app"));
    }

    #[tokio::test]
    async fn test_deploy_without_target_asks_what() {
        let reply = assistant().respond("deploy to azure").await;
        assert!(reply.code.is_none());
        assert!(reply.message.contains("What would you like to deploy?"));
    }

    #[tokio::test]
    async fn test_list_without_credentials_hints_settings() {
        let reply = assistant().respond("list my containers").await;
        assert!(reply.message.contains("configured in Settings"));
    }

    #[tokio::test]
    async fn test_help_and_greeting_and_fallback() {
        assert!(assistant().respond("help").await.message.contains("Commands"));
        assert!(assistant()
            .respond("hello there")
            .await
            .message
            .contains("deployment assistant"));
        assert!(assistant()
            .respond("what is the weather")
            .await
            .message
            .contains("manage your Azure infrastructure"));
    }
}
