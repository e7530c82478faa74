//! WebSocket chat channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::deployment::CodeFormat;
use crate::server::state::ServerState;

/// Incoming chat message.
///
/// The canonical shape is `{"type": "chat_message", "content": "..."}`;
/// the kebab-case type tag and the `message` field name are accepted for
/// older clients.
#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "message")]
    pub content: String,
}

impl ChatMessageIn {
    fn is_chat(&self) -> bool {
        self.kind == "chat_message" || self.kind == "chat-message"
    }
}

/// Outgoing chat response
#[derive(Debug, Serialize)]
pub struct ChatResponseOut {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "codeType", skip_serializing_if = "Option::is_none")]
    pub code_type: Option<CodeFormat>,
    pub timestamp: String,
}

/// WebSocket upgrade handler for `/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    info!("Client connected to chat");

    while let Some(result) = socket.recv().await {
        let message = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let incoming: ChatMessageIn = match serde_json::from_str(&message) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("Malformed chat message: {}", e);
                continue;
            }
        };
        if !incoming.is_chat() {
            continue;
        }

        let reply = state.chat.respond(&incoming.content).await;
        let response = ChatResponseOut {
            kind: "chat_response",
            message: reply.message,
            code: reply.code,
            code_type: reply.code_type,
            timestamp: Utc::now().to_rfc3339(),
        };

        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize chat response: {}", e);
                continue;
            }
        };
        if socket.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }

    info!("Client disconnected from chat");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_message_shape_parses() {
        let incoming: ChatMessageIn =
            serde_json::from_str(r#"{"type": "chat_message", "content": "hello"}"#).unwrap();
        assert!(incoming.is_chat());
        assert_eq!(incoming.content, "hello");
    }

    #[test]
    fn test_legacy_message_shape_parses() {
        let incoming: ChatMessageIn =
            serde_json::from_str(r#"{"type": "chat-message", "message": "hi"}"#).unwrap();
        assert!(incoming.is_chat());
        assert_eq!(incoming.content, "hi");
    }

    #[test]
    fn test_non_chat_types_are_ignored() {
        let incoming: ChatMessageIn =
            serde_json::from_str(r#"{"type": "ping", "content": ""}"#).unwrap();
        assert!(!incoming.is_chat());
    }

    #[test]
    fn test_response_serialization_skips_absent_code() {
        let response = ChatResponseOut {
            kind: "chat_response",
            message: "done".to_string(),
            code: None,
            code_type: None,
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"type\":\"chat_response\""));
        assert!(!json.contains("code"));
    }

    #[test]
    fn test_response_serialization_includes_code_type() {
        let response = ChatResponseOut {
            kind: "chat_response",
            message: "generated".to_string(),
            code: Some("resource {}".to_string()),
            code_type: Some(CodeFormat::Terraform),
            timestamp: "2025-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"codeType\":\"terraform\""));
    }
}
