use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::protocol::SubscriptionId;
use crate::registry::HandlerHandles;
use crate::session::Session;
use crate::traits::*;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

/// Internal command messages for the session task
pub(crate) enum ClientCommand {
    /// Open the session (resolves once connected and flushed, or failed)
    Connect(oneshot::Sender<Result<()>>),
    /// Close the session if open
    Disconnect(oneshot::Sender<()>),
    /// Publish a serialized payload
    Send { destination: String, body: String },
    /// Register a callback for a destination
    Subscribe {
        id: SubscriptionId,
        destination: String,
        handler: Box<dyn MessageHandler>,
    },
    /// Cancel a live or buffered subscription
    Unsubscribe(SubscriptionId),
    /// Get current metrics
    GetMetrics(oneshot::Sender<Metrics>),
    /// Stop the session task
    Shutdown,
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub frames_sent: u64,
    pub messages_received: u64,
    /// Operations waiting for the next connect
    pub pending: usize,
    pub active_subscriptions: usize,
    pub connection_state: ConnectionState,
}

/// STOMP connection manager
///
/// Owns one STOMP session over a WebSocket. Messages and subscriptions
/// issued while disconnected are buffered and flushed, in call order, as
/// soon as the session connects. Connection-state changes are broadcast to
/// any number of listeners.
///
/// The client never reconnects by itself: after `disconnect()` or a lost
/// transport, call `connect()` again.
///
/// ```ignore
/// let client = stompsockets::builder()
///     .url("http://localhost:9000/websocket")
///     .build()
///     .await?;
///
/// client.subscribe("/topic/greetings", |msg: StompMessage| {
///     println!("{}", msg.body());
/// })?;
/// client.send("/app/hello", &serde_json::json!({ "name": "stomp" }))?;
///
/// client.connect().await?; // both operations are flushed here
/// ```
pub struct StompClient {
    config: Arc<ClientConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    state_tx: broadcast::Sender<bool>,
    next_subscription: AtomicU64,
    /// Callback threads whose subscription has ended
    retired_handlers: HandlerHandles,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl StompClient {
    /// Spawn the session task; does not connect
    ///
    /// Called by the builder's `build()` method.
    pub(crate) fn new(config: ClientConfig) -> Self {
        let config = Arc::new(config);
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicMetrics::new());
        let (state_tx, _) = broadcast::channel(config.state_channel_capacity);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let retired_handlers: HandlerHandles = Arc::new(Mutex::new(Vec::new()));

        let session = Session::new(
            Arc::clone(&config),
            Arc::clone(&state),
            Arc::clone(&metrics),
            state_tx.clone(),
            Arc::clone(&retired_handlers),
        );
        let task_handle = tokio::spawn(session.run(command_rx));

        Self {
            config,
            state,
            metrics,
            command_tx,
            state_tx,
            next_subscription: AtomicU64::new(0),
            retired_handlers,
            task_handle: Some(task_handle),
        }
    }

    fn command(&self, command: ClientCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| StompError::ChannelSend("session task has stopped".into()))
    }

    /// Open the STOMP session
    ///
    /// Resolves after the broker answered CONNECTED, `true` was published
    /// and every buffered operation was written. Resolves immediately when
    /// already connected. On failure the state stays disconnected and the
    /// buffer is kept.
    pub async fn connect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(ClientCommand::Connect(tx))?;
        rx.await
            .map_err(|_| StompError::ConnectionClosed("session task stopped".into()))?
    }

    /// Close the STOMP session
    ///
    /// No-op when not connected (no state notification is emitted).
    pub async fn disconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.command(ClientCommand::Disconnect(tx))?;
        rx.await
            .map_err(|_| StompError::ConnectionClosed("session task stopped".into()))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Receive `true`/`false` on every connect/disconnect
    ///
    /// Only transitions after this call are observed.
    pub fn state_changes(&self) -> broadcast::Receiver<bool> {
        self.state_tx.subscribe()
    }

    /// Subscribe `handler` to `topic`
    ///
    /// Sent to the broker right away when connected, otherwise buffered
    /// until the next successful `connect()`.
    pub fn subscribe<H>(&self, topic: impl Into<String>, handler: H) -> Result<SubscriptionId>
    where
        H: MessageHandler,
    {
        let id = SubscriptionId::from_sequence(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.command(ClientCommand::Subscribe {
            id: id.clone(),
            destination: topic.into(),
            handler: Box::new(handler),
        })?;
        Ok(id)
    }

    /// Cancel a subscription, live or still buffered
    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        self.command(ClientCommand::Unsubscribe(id.clone()))
    }

    /// Publish `payload` as JSON on `topic`
    ///
    /// The topic is used verbatim as the STOMP destination.
    pub fn send<T>(&self, topic: impl Into<String>, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_string(payload)?;
        self.command(ClientCommand::Send {
            destination: topic.into(),
            body,
        })
    }

    /// Get current metrics
    ///
    /// Answered by the session task after every previously issued
    /// operation, so `pending` reflects them.
    pub async fn metrics(&self) -> Metrics {
        let (tx, rx) = oneshot::channel();
        if self.command(ClientCommand::GetMetrics(tx)).is_ok() {
            if let Ok(metrics) = rx.await {
                return metrics;
            }
        }
        Metrics {
            frames_sent: self.metrics.frames_sent(),
            messages_received: self.metrics.messages_received(),
            pending: self.metrics.pending(),
            active_subscriptions: self.metrics.active_subscriptions(),
            connection_state: self.state.get(),
        }
    }

    /// WebSocket URL being dialed
    pub fn url(&self) -> &str {
        self.config.url()
    }

    /// Disconnect if needed, stop the session task and join callback threads
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down STOMP client");

        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        let handles: Vec<_> = self.retired_handlers.lock().drain(..).collect();
        debug!("Waiting for {} callback threads to complete", handles.len());
        tokio::task::spawn_blocking(move || {
            for handle in handles {
                let _ = handle.join();
            }
        })
        .await
        .map_err(|e| StompError::Other(format!("failed to join callback threads: {}", e)))?;

        info!("STOMP client shut down");
        Ok(())
    }
}
