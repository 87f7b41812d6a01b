//! WebSocket Connection Hub
//!
//! Manages all WebSocket connections, their resource subscriptions, and
//! fan-out of push messages. Each connection owns an unbounded channel of
//! serialized frames, so a push is encoded once per resource regardless of
//! how many connections receive it.

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::messages::{resource, Event, PushMessage, ServerMessage};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Outbound frame channel of one connection
pub type FrameSender = mpsc::UnboundedSender<String>;

/// Manages all WebSocket connections and subscriptions
pub struct ConnectionHub {
    /// Active connections: ConnectionId → ConnectionHandle
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    /// Resource subscriptions: Resource → Set of ConnectionIds
    subscriptions: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

/// Handle for sending frames to a specific connection
pub struct ConnectionHandle {
    pub sender: FrameSender,
    /// Resources this connection is subscribed to
    pub subscriptions: HashSet<String>,
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new WebSocket connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn register(&self, sender: FrameSender) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections {
                limit: self.config.max_connections,
            });
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                subscriptions: HashSet::new(),
            },
        );

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Unregister a connection and clean up its subscriptions
    pub async fn unregister(&self, id: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(handle) = handle {
            let mut subs = self.subscriptions.write().await;
            for resource in handle.subscriptions {
                if let Some(subscribers) = subs.get_mut(&resource) {
                    subscribers.remove(id);
                    if subscribers.is_empty() {
                        subs.remove(&resource);
                    }
                }
            }
        }

        tracing::info!(connection_id = %id, "WebSocket disconnected");
    }

    /// Subscribe a connection to a resource
    ///
    /// Subscribing twice to the same resource is not an error.
    pub async fn subscribe(&self, id: &str, resource: &str) -> Result<(), HubError> {
        if !resource::is_valid(resource) {
            return Err(HubError::InvalidResource(resource.to_string()));
        }

        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        handle.subscriptions.insert(resource.to_string());
        self.subscriptions
            .write()
            .await
            .entry(resource.to_string())
            .or_default()
            .insert(id.to_string());

        tracing::debug!(connection_id = %id, resource = %resource, "Subscribed");
        Ok(())
    }

    /// Unsubscribe a connection from a resource
    ///
    /// Returns whether the connection was subscribed.
    pub async fn unsubscribe(&self, id: &str, resource: &str) -> Result<bool, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections
            .get_mut(id)
            .ok_or(HubError::ConnectionNotFound)?;

        if !handle.subscriptions.remove(resource) {
            return Ok(false);
        }

        let mut subs = self.subscriptions.write().await;
        if let Some(subscribers) = subs.get_mut(resource) {
            subscribers.remove(id);
            if subscribers.is_empty() {
                subs.remove(resource);
            }
        }

        tracing::debug!(connection_id = %id, resource = %resource, "Unsubscribed");
        Ok(true)
    }

    /// Push an event to the subscribers of each resource, in order
    ///
    /// Returns the number of frames queued.
    pub async fn publish(&self, event: &Event, resources: &[String]) -> usize {
        let subs = self.subscriptions.read().await;
        let connections = self.connections.read().await;
        let mut sent = 0;

        for resource in resources {
            let Some(subscriber_ids) = subs.get(resource) else {
                continue;
            };

            let frame = match PushMessage::new(resource.clone(), event.clone()).to_json() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, resource = %resource, "Failed to encode push");
                    continue;
                }
            };

            for id in subscriber_ids {
                if let Some(handle) = connections.get(id) {
                    if handle.sender.send(frame.clone()).is_ok() {
                        sent += 1;
                    }
                }
            }
        }

        if sent > 0 {
            tracing::trace!(
                event = event.kind(),
                resources = ?resources,
                frames = sent,
                "Broadcast event"
            );
        }
        sent
    }

    /// Send a control frame directly to a specific connection
    pub async fn send_to(&self, id: &str, message: &ServerMessage) -> Result<(), HubError> {
        let frame = serde_json::to_string(message).map_err(|_| HubError::SendFailed)?;
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle.sender.send(frame).map_err(|_| HubError::SendFailed)
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get subscription count for a resource
    pub async fn subscription_count(&self, resource: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(resource)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {limit})")]
    TooManyConnections { limit: usize },

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use chrono::Utc;

    fn user_created() -> Event {
        Event::UserCreated(User {
            id: 1,
            name: "Test User".to_string(),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_default_config() {
        assert_eq!(HubConfig::default().max_connections, 1000);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        let id = hub.register(tx).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(&id).await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_subscribe_unsubscribe() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        hub.subscribe(&id, "users:1").await.unwrap();
        hub.subscribe(&id, "users:1").await.unwrap();
        assert_eq!(hub.subscription_count("users:1").await, 1);

        assert!(hub.unsubscribe(&id, "users:1").await.unwrap());
        assert!(!hub.unsubscribe(&id, "users:1").await.unwrap());
        assert_eq!(hub.subscription_count("users:1").await, 0);

        hub.unregister(&id).await;
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_resource() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        let result = hub.subscribe(&id, "metrics.mood").await;
        assert!(matches!(result, Err(HubError::InvalidResource(_))));
        assert!(matches!(
            hub.subscribe("missing", "users").await,
            Err(HubError::ConnectionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = ConnectionHub::new(HubConfig { max_connections: 2 });

        let (tx1, _) = mpsc::unbounded_channel();
        let (tx2, _) = mpsc::unbounded_channel();
        let (tx3, _) = mpsc::unbounded_channel();

        let id1 = hub.register(tx1).await.unwrap();
        let id2 = hub.register(tx2).await.unwrap();
        let result = hub.register(tx3).await;

        assert!(matches!(
            result,
            Err(HubError::TooManyConnections { limit: 2 })
        ));

        hub.unregister(&id1).await;
        hub.unregister(&id2).await;
    }

    #[tokio::test]
    async fn test_publish_to_subscribers() {
        let hub = ConnectionHub::new(HubConfig::default());

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let id1 = hub.register(tx1).await.unwrap();
        let id2 = hub.register(tx2).await.unwrap();

        // Only id1 subscribes
        hub.subscribe(&id1, "users").await.unwrap();

        let sent = hub.publish(&user_created(), &["users".to_string()]).await;
        assert_eq!(sent, 1);

        let frame: serde_json::Value = serde_json::from_str(&rx1.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "user_created");
        assert_eq!(frame["resource"], "users");
        assert!(rx2.try_recv().is_err());

        hub.unregister(&id1).await;
        hub.unregister(&id2).await;
    }

    #[tokio::test]
    async fn test_publish_one_frame_per_resource() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        hub.subscribe(&id, "workouts:1").await.unwrap();
        hub.subscribe(&id, "users:1").await.unwrap();

        let resources = vec![
            "subsets:1".to_string(),
            "workouts:1".to_string(),
            "users:1".to_string(),
        ];
        assert_eq!(hub.publish(&user_created(), &resources).await, 2);

        let first: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let second: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(first["resource"], "workouts:1");
        assert_eq!(second["resource"], "users:1");
    }

    #[tokio::test]
    async fn test_unregister_cleans_subscriptions() {
        let hub = ConnectionHub::new(HubConfig::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.register(tx).await.unwrap();

        hub.subscribe(&id, "sets:4").await.unwrap();
        hub.unregister(&id).await;

        assert_eq!(hub.subscription_count("sets:4").await, 0);
    }
}
