//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::ConnectionHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.ws_hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut sender, mut receiver) = socket.split();

    // Serialized frames for this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let connection_id = match hub.register(tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "Failed to register WebSocket connection");
            let error_msg = ServerMessage::Error {
                message: e.to_string(),
            };
            if let Some(text) = encode(&error_msg) {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.close().await;
            return;
        }
    };

    let connected_msg = ServerMessage::Connected {
        connection_id: connection_id.clone(),
    };
    let _ = hub.send_to(&connection_id, &connected_msg).await;

    let conn_id_for_send = connection_id.clone();

    // Task to forward frames from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &ConnectionHub, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(hub, connection_id, client_msg).await;
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        text = %text,
                        "Invalid client message"
                    );
                    // Keep the connection open
                    let error_msg = ServerMessage::Error {
                        message: format!("Invalid message format: {}", e),
                    };
                    let _ = hub.send_to(connection_id, &error_msg).await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let error_msg = ServerMessage::Error {
                message: "Binary messages not supported".to_string(),
            };
            let _ = hub.send_to(connection_id, &error_msg).await;
            true
        }
        // Axum answers pings itself
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
async fn handle_client_message(hub: &ConnectionHub, connection_id: &str, message: ClientMessage) {
    let response = match message {
        ClientMessage::Subscribe { resource } => {
            match hub.subscribe(connection_id, &resource).await {
                Ok(()) => ServerMessage::Subscribed { resource },
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        resource = %resource,
                        error = %e,
                        "Subscribe error"
                    );
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        ClientMessage::Unsubscribe { resource } => {
            match hub.unsubscribe(connection_id, &resource).await {
                Ok(_) => ServerMessage::Unsubscribed { resource },
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        resource = %resource,
                        error = %e,
                        "Unsubscribe error"
                    );
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    };

    let _ = hub.send_to(connection_id, &response).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::HubConfig;

    async fn connected_hub() -> (ConnectionHub, String, mpsc::UnboundedReceiver<String>) {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();
        (hub, id, rx)
    }

    fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> ServerMessage {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_is_acknowledged() {
        let (hub, id, mut rx) = connected_hub().await;
        let text = r#"{"type":"subscribe","resource":"users:1"}"#;

        assert!(handle_ws_message(&hub, &id, Message::Text(text.to_string())).await);
        assert_eq!(
            next_frame(&mut rx),
            ServerMessage::Subscribed {
                resource: "users:1".to_string()
            }
        );
        assert_eq!(hub.subscription_count("users:1").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_resource_yields_error_frame() {
        let (hub, id, mut rx) = connected_hub().await;
        let text = r#"{"type":"subscribe","resource":"nope"}"#;

        handle_ws_message(&hub, &id, Message::Text(text.to_string())).await;
        assert!(matches!(next_frame(&mut rx), ServerMessage::Error { .. }));
    }

    #[tokio::test]
    async fn test_ping_and_garbage() {
        let (hub, id, mut rx) = connected_hub().await;

        handle_ws_message(&hub, &id, Message::Text(r#"{"type":"ping"}"#.to_string())).await;
        assert_eq!(next_frame(&mut rx), ServerMessage::Pong);

        assert!(handle_ws_message(&hub, &id, Message::Text("{oops".to_string())).await);
        assert!(matches!(next_frame(&mut rx), ServerMessage::Error { .. }));

        assert!(!handle_ws_message(&hub, &id, Message::Close(None)).await);
    }
}
