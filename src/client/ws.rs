//! WebSocket subscription client
//!
//! One socket per [`WsClient`], shared by any number of subscribers. Inbound
//! push frames are dispatched by resource id to the callbacks registered in
//! the [`SubscriberRegistry`]; control frames are handled here.
//!
//! There is no reconnect policy. When the socket closes, for any reason, the
//! registry is cleared and the state returns to `Disconnected`; callers
//! `connect()` again and re-subscribe.

use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use super::registry::{Removal, SubscriberRegistry, SubscriptionId};
use crate::websocket::{resource, ClientMessage, InboundFrame, PushMessage, ServerMessage};

/// How long `disconnect` waits for the close frame to be written
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Lifecycle of the socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Errors from the WebSocket layer
#[derive(Error, Debug)]
pub enum WsError {
    #[error("WebSocket connection failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Socket closed before the operation completed
    #[error("WebSocket closed")]
    Closed,

    #[error("WebSocket not connected")]
    NotConnected,

    #[error("Failed to encode frame: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Derive the WebSocket endpoint from the server's HTTP base URL
///
/// `http://host:8080` becomes `ws://host:8080/ws`; `https` maps to `wss`.
pub fn ws_url_from_base(base_url: &str) -> Result<String, WsError> {
    let base = base_url.trim().trim_end_matches('/');
    let swapped = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(WsError::InvalidUrl(base_url.to_string()));
    };

    if swapped.ends_with("/ws") {
        Ok(swapped)
    } else {
        Ok(format!("{}/ws", swapped))
    }
}

/// A live socket: its writer channel and the two tasks driving it
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn abort(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

struct Inner {
    url: String,
    registry: SubscriberRegistry,
    state: watch::Sender<ConnectionState>,
    link: Mutex<Option<Link>>,
    /// Subscribe acknowledgements awaited per resource
    pending: Mutex<HashMap<String, Vec<oneshot::Sender<()>>>>,
    /// Bumped by every connect attempt and every disconnect
    generation: AtomicU64,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn send_frame(&self, message: &ClientMessage) -> Result<(), WsError> {
        let text = serde_json::to_string(message)?;
        let link = locked(&self.link);
        let link = link.as_ref().ok_or(WsError::NotConnected)?;
        link.outbound
            .send(Message::Text(text))
            .map_err(|_| WsError::Closed)
    }

    fn handle_text(&self, text: &str) {
        match InboundFrame::parse(text) {
            Ok(InboundFrame::Push(push)) => {
                let invoked = self.registry.dispatch(&push);
                trace!(
                    resource = %push.resource,
                    event = push.event.kind(),
                    callbacks = invoked,
                    "Dispatched push"
                );
            }
            Ok(InboundFrame::Control(message)) => self.handle_control(message),
            Err(e) => warn!(error = %e, "Dropping malformed frame"),
        }
    }

    fn handle_control(&self, message: ServerMessage) {
        match message {
            ServerMessage::Connected { connection_id } => {
                debug!(connection_id = %connection_id, "Server accepted connection");
            }
            ServerMessage::Subscribed { resource } => {
                let waiters = locked(&self.pending).remove(&resource).unwrap_or_default();
                for waiter in waiters {
                    let _ = waiter.send(());
                }
                debug!(resource = %resource, "Subscription acknowledged");
            }
            ServerMessage::Unsubscribed { resource } => {
                debug!(resource = %resource, "Unsubscription acknowledged");
            }
            ServerMessage::Pong => trace!("Pong"),
            ServerMessage::Error { message } => {
                warn!(message = %message, "Server reported an error");
            }
        }
    }

    /// Tear down after the socket closed on its own
    fn mark_closed(&self, generation: u64) {
        let mut link = locked(&self.link);
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(link) = link.take() {
            link.writer.abort();
        }

        // Observers of `Disconnected` see an empty registry
        let cleared = self.registry.clear();
        locked(&self.pending).clear();
        self.state.send_replace(ConnectionState::Disconnected);
        drop(link);
        info!(resources = cleared.len(), "WebSocket closed, subscriptions cleared");
    }
}

/// Tears the connection down when the reader task ends
struct CloseGuard {
    inner: Weak<Inner>,
    generation: u64,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            if std::thread::panicking() {
                warn!("Subscriber callback panicked, closing WebSocket");
            }
            inner.mark_closed(self.generation);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(link) = locked(&self.link).take() {
            link.abort();
        }
    }
}

/// Shared WebSocket subscription client
///
/// Cheap to clone; clones share the socket and the registry.
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<Inner>,
}

impl WsClient {
    /// Client for a `ws://` or `wss://` endpoint; does not connect yet
    pub fn new(url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                registry: SubscriberRegistry::new(),
                state,
                link: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Client for the server at an `http(s)://` base URL
    pub fn from_base_url(base_url: &str) -> Result<Self, WsError> {
        Ok(Self::new(ws_url_from_base(base_url)?))
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the socket
    ///
    /// Resolves once the handshake completes. A no-op while already
    /// connecting or connected. Every resource registered so far is
    /// subscribed on the new socket.
    pub async fn connect(&self) -> Result<(), WsError> {
        let inner = &self.inner;
        let started = inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            return Ok(());
        }
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(url = %inner.url, "Connecting WebSocket");

        let stream = match connect_async(inner.url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let _link = locked(&inner.link);
                if inner.generation.load(Ordering::SeqCst) == generation {
                    inner.state.send_replace(ConnectionState::Disconnected);
                }
                warn!(url = %inner.url, error = %e, "WebSocket connection failed");
                return Err(WsError::Connect(e));
            }
        };

        let (mut sink, mut source) = stream.split();
        let (outbound, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
        });

        let weak: Weak<Inner> = Arc::downgrade(inner);
        let reader = tokio::spawn(async move {
            // Runs on every exit, including a panicking callback
            let _guard = CloseGuard {
                inner: weak.clone(),
                generation,
            };
            while let Some(frame) = source.next().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match frame {
                    Ok(Message::Text(text)) => inner.handle_text(&text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        });

        let link = Link {
            outbound,
            reader,
            writer,
        };
        {
            let mut slot = locked(&inner.link);
            let current = inner.generation.load(Ordering::SeqCst) == generation
                && *inner.state.borrow() == ConnectionState::Connecting;
            if !current {
                // Closed or disconnected during the handshake
                drop(slot);
                link.abort();
                return Err(WsError::Closed);
            }
            *slot = Some(link);
            inner.state.send_replace(ConnectionState::Connected);
        }
        info!(url = %inner.url, "WebSocket connected");

        for resource in inner.registry.resources() {
            inner.send_frame(&ClientMessage::Subscribe { resource })?;
        }
        Ok(())
    }

    /// Close the socket and drop every subscription
    pub async fn disconnect(&self) {
        let link = {
            let mut slot = locked(&self.inner.link);
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };

        if let Some(link) = link {
            link.reader.abort();
            let _ = link.outbound.send(Message::Close(None));
            drop(link.outbound);
            let mut writer = link.writer;
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut writer)
                .await
                .is_err()
            {
                writer.abort();
            }
        }

        let cleared = self.inner.registry.clear();
        locked(&self.inner.pending).clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        info!(resources = cleared.len(), "WebSocket disconnected");
    }

    /// Register `callback` for pushes on `resource`
    ///
    /// The server is told to subscribe when this is the first callback for
    /// the resource and the socket is up; otherwise the subscription is sent
    /// on the next `connect()`.
    pub fn subscribe<F>(&self, resource: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        let resource = resource.into();
        let (id, first) = self.inner.registry.register(&resource, Arc::new(callback));
        if first {
            let _ = self.inner.send_frame(&ClientMessage::Subscribe {
                resource: resource.clone(),
            });
        }
        self.handle(resource, id)
    }

    /// Register `callback` for everything changing under a user
    ///
    /// When connected, resolves after the server acknowledged the
    /// subscription, so pushes for mutations made afterwards are delivered.
    /// Fails with [`WsError::Closed`] if the socket closes first.
    pub async fn subscribe_to_user<F>(
        &self,
        user_id: i64,
        callback: F,
    ) -> Result<Subscription, WsError>
    where
        F: Fn(&PushMessage) + Send + Sync + 'static,
    {
        let resource = resource::user(user_id);

        let ack = if self.is_connected() {
            let (tx, rx) = oneshot::channel();
            locked(&self.inner.pending)
                .entry(resource.clone())
                .or_default()
                .push(tx);
            Some(rx)
        } else {
            None
        };

        let (id, _) = self.inner.registry.register(&resource, Arc::new(callback));
        let subscription = self.handle(resource.clone(), id);

        let Some(ack) = ack else {
            return Ok(subscription);
        };

        // Always ask: the server acknowledges repeats too
        if self
            .inner
            .send_frame(&ClientMessage::Subscribe { resource })
            .is_err()
        {
            subscription.unsubscribe();
            return Err(WsError::Closed);
        }

        match ack.await {
            Ok(()) => Ok(subscription),
            Err(_) => {
                subscription.unsubscribe();
                Err(WsError::Closed)
            }
        }
    }

    /// Send a keepalive ping
    pub fn ping(&self) -> Result<(), WsError> {
        self.inner.send_frame(&ClientMessage::Ping)
    }

    /// Resources that currently have at least one callback
    pub fn subscribed_resources(&self) -> Vec<String> {
        self.inner.registry.resources()
    }

    pub fn subscriber_count(&self, resource: &str) -> usize {
        self.inner.registry.subscriber_count(resource)
    }

    fn handle(&self, resource: String, id: SubscriptionId) -> Subscription {
        Subscription {
            inner: Arc::downgrade(&self.inner),
            resource,
            id,
        }
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

/// Handle to one registered callback
///
/// Dropping the handle leaves the callback registered until the connection
/// closes; call [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping a Subscription keeps the callback registered"]
#[derive(Debug)]
pub struct Subscription {
    inner: Weak<Inner>,
    resource: String,
    id: SubscriptionId,
}

impl Subscription {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove this callback only
    ///
    /// The server is told to unsubscribe once no callback remains for the
    /// resource. Safe to call from inside a callback.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if inner.registry.remove(&self.resource, self.id) == Removal::Last {
            let _ = inner.send_frame(&ClientMessage::Unsubscribe {
                resource: self.resource,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_ws_url_from_base() {
        assert_eq!(
            ws_url_from_base("http://localhost:8080").unwrap(),
            "ws://localhost:8080/ws"
        );
        assert_eq!(
            ws_url_from_base("https://api.example.com/").unwrap(),
            "wss://api.example.com/ws"
        );
        assert_eq!(
            ws_url_from_base("ws://localhost:8080/ws").unwrap(),
            "ws://localhost:8080/ws"
        );
        assert!(ws_url_from_base("localhost:8080").is_err());
    }

    #[test]
    fn test_subscribe_while_disconnected_registers_locally() {
        let client = WsClient::new("ws://127.0.0.1:1/ws");
        let sub = client.subscribe("users:1", |_| {});

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.subscribed_resources(), vec!["users:1"]);
        assert!(matches!(client.ping(), Err(WsError::NotConnected)));

        sub.unsubscribe();
        assert!(client.subscribed_resources().is_empty());
    }

    #[test]
    fn test_inbound_push_reaches_callbacks() {
        let client = WsClient::new("ws://127.0.0.1:1/ws");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let _sub = client.subscribe("sets:1", move |push| {
            assert_eq!(push.event.kind(), "set_created");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let frame = r#"{"type":"set_created","resource":"sets:1","data":{
            "id":1,"exercise_id":1,"set_number":1,"exercise_name":"Row",
            "created_at":"2024-01-01T00:00:00Z","subsets":[]}}"#;
        client.inner.handle_text(frame);
        client.inner.handle_text("garbage");
        client.inner.handle_text(r#"{"type":"pong"}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribe_to_user_offline_resolves_immediately() {
        let client = WsClient::new("ws://127.0.0.1:1/ws");
        let sub = client.subscribe_to_user(7, |_| {}).await.unwrap();
        assert_eq!(sub.resource(), "users:7");
        assert_eq!(client.subscriber_count("users:7"), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        // Port 1 refuses connections
        let client = WsClient::new("ws://127.0.0.1:1/ws");
        let result = client.connect().await;

        assert!(matches!(result, Err(WsError::Connect(_))));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
