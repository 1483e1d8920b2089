//! The session task
//!
//! A single tokio task owns the socket, the pending queue and the live
//! subscriptions. `StompClient` handles talk to it only through the command
//! channel, so every operation is applied in the order it was issued and the
//! pending queue is never touched concurrently.
//!
//! ```text
//!            ┌──────────── Disconnected ◄──────────────┐
//!   Connect  │   Send/Subscribe -> pending queue       │ Disconnect / transport loss
//!            ▼                                         │
//!        Connecting ── CONNECTED ──► Connected ────────┘
//!            │  (still buffering)    (publish true, flush pending, resolve connect)
//!            └── failure / Disconnect ──► Disconnected (every waiting connect() gets the error)
//! ```

use crate::client::{ClientCommand, Metrics};
use crate::config::ClientConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::heartbeat::{self, IncomingWatchdog, Negotiated};
use crate::pending::{PendingItem, PendingQueue};
use crate::protocol::{self, Command, Frame, StompMessage, SubscriptionId, HEARTBEAT};
use crate::registry::{HandlerHandles, SubscriptionRegistry};
use crate::traits::*;
use futures::stream::SplitSink;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type ConnectReply = oneshot::Sender<Result<()>>;

/// How a connected phase ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Back to idle; the client can connect again
    Disconnected,
    /// Handles are gone or shutdown was requested
    Shutdown,
}

pub(crate) struct Session {
    config: Arc<ClientConfig>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    state_tx: broadcast::Sender<bool>,
    pending: PendingQueue,
    registry: SubscriptionRegistry,
    receipt_seq: u64,
}

impl Session {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        state: Arc<AtomicConnectionState>,
        metrics: Arc<AtomicMetrics>,
        state_tx: broadcast::Sender<bool>,
        retired_handlers: HandlerHandles,
    ) -> Self {
        Self {
            config,
            state,
            metrics,
            state_tx,
            pending: PendingQueue::new(),
            registry: SubscriptionRegistry::new(retired_handlers),
            receipt_seq: 0,
        }
    }

    /// Main loop while no connection is open
    pub(crate) async fn run(mut self, mut command_rx: mpsc::UnboundedReceiver<ClientCommand>) {
        while let Some(command) = command_rx.recv().await {
            match command {
                ClientCommand::Connect(reply) => {
                    if self.connect(reply, &mut command_rx).await == Exit::Shutdown {
                        break;
                    }
                }
                ClientCommand::Disconnect(reply) => {
                    debug!("Disconnect requested while not connected, nothing to do");
                    let _ = reply.send(());
                }
                ClientCommand::Shutdown => break,
                other => self.offline_command(other),
            }
        }

        self.state.set(ConnectionState::ShuttingDown);
        self.registry.clear();
        info!("Session task exiting");
    }

    /// Commands handled the same way while disconnected or connecting
    fn offline_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Send { destination, body } => {
                debug!("Message in buffer: {} {}", destination, body);
                self.buffer(PendingItem::OutboundMessage { destination, body });
            }
            ClientCommand::Subscribe {
                id,
                destination,
                handler,
            } => {
                debug!("Subscriber in buffer: {} ({})", destination, id);
                self.buffer(PendingItem::Subscription {
                    id,
                    destination,
                    handler,
                });
            }
            ClientCommand::Unsubscribe(id) => {
                if self.pending.remove_subscription(&id) {
                    debug!("Dropped buffered subscription {}", id);
                    self.metrics.set_pending(self.pending.len());
                }
            }
            ClientCommand::GetMetrics(reply) => {
                let _ = reply.send(self.snapshot());
            }
            // Lifecycle commands are matched by the caller
            ClientCommand::Connect(_) | ClientCommand::Disconnect(_) | ClientCommand::Shutdown => {}
        }
    }

    /// Connecting phase: run the handshake while still serving commands
    ///
    /// Every `connect()` issued before the handshake finishes shares its
    /// outcome. Sends and subscriptions keep going to the pending queue, so
    /// they reach the wire after everything buffered earlier.
    async fn connect(
        &mut self,
        reply: ConnectReply,
        command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Exit {
        info!("Initialize STOMP connection to {}", self.config.url);
        self.state.set(ConnectionState::Connecting);

        let mut waiters = vec![reply];
        let handshake = handshake(Arc::clone(&self.config), Arc::clone(&self.metrics));
        tokio::pin!(handshake);

        let outcome = loop {
            tokio::select! {
                result = &mut handshake => break result,
                cmd = command_rx.recv() => match cmd {
                    Some(ClientCommand::Connect(reply)) => {
                        debug!("Connect already in progress");
                        waiters.push(reply);
                    }
                    Some(ClientCommand::Disconnect(reply)) => {
                        info!("Disconnect requested during handshake, aborting connect");
                        self.state.set(ConnectionState::Disconnected);
                        let aborted = StompError::ConnectionClosed("connect aborted by disconnect".into());
                        resolve(waiters, Err(aborted));
                        let _ = reply.send(());
                        return Exit::Disconnected;
                    }
                    Some(ClientCommand::Shutdown) | None => {
                        debug!("Shutdown requested during handshake");
                        let aborted = StompError::ConnectionClosed("client shut down".into());
                        resolve(waiters, Err(aborted));
                        return Exit::Shutdown;
                    }
                    Some(other) => self.offline_command(other),
                },
            }
        };

        match outcome {
            Ok((ws, negotiated)) => self.connected(ws, negotiated, waiters, command_rx).await,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.config.url, e);
                self.state.set(ConnectionState::Disconnected);
                resolve(waiters, Err(e));
                Exit::Disconnected
            }
        }
    }

    fn buffer(&mut self, item: PendingItem) {
        self.pending.push(item);
        self.metrics.set_pending(self.pending.len());
    }

    fn snapshot(&self) -> Metrics {
        Metrics {
            frames_sent: self.metrics.frames_sent(),
            messages_received: self.metrics.messages_received(),
            pending: self.pending.len(),
            active_subscriptions: self.registry.len(),
            connection_state: self.state.get(),
        }
    }

    /// Connected phase: publish, flush, then serve commands and inbound frames
    async fn connected(
        &mut self,
        ws: WsStream,
        negotiated: Negotiated,
        waiters: Vec<ConnectReply>,
        command_rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
    ) -> Exit {
        let (mut write, mut read) = ws.split();

        self.state.set(ConnectionState::Connected);
        info!("Connected to {}", self.config.url);
        let _ = self.state_tx.send(true);

        if let Err(e) = self.flush_pending(&mut write).await {
            error!("Flushing buffered operations failed: {}", e);
            resolve(waiters, Err(e));
            return self.lost();
        }
        resolve(waiters, Ok(()));

        let mut outgoing = negotiated.outgoing.map(heartbeat::ticker);
        let mut incoming_check = negotiated.incoming.map(heartbeat::ticker);
        let mut watchdog = negotiated.incoming.map(IncomingWatchdog::new);

        loop {
            tokio::select! {
                msg = read.next() => {
                    if let Some(w) = watchdog.as_mut() {
                        w.touch();
                    }
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.handle_inbound(&text) {
                                return self.lost();
                            }
                        }
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                            Ok(text) => {
                                if !self.handle_inbound(&text) {
                                    return self.lost();
                                }
                            }
                            Err(_) => warn!("Dropping non UTF-8 binary message"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            warn!("Server closed the WebSocket: {:?}", frame);
                            return self.lost();
                        }
                        // Ping/Pong are answered by tungstenite
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            return self.lost();
                        }
                        None => {
                            warn!("WebSocket stream closed");
                            return self.lost();
                        }
                    }
                }

                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Send { destination, body }) => {
                            debug!("Sending via web socket: {} {}", destination, body);
                            let frame = Frame::send(&destination, body.clone());
                            if let Err(e) = self.write_frame(&mut write, &frame).await {
                                error!("Send failed, keeping message for next connect: {}", e);
                                self.buffer(PendingItem::OutboundMessage { destination, body });
                                return self.lost();
                            }
                        }
                        Some(ClientCommand::Subscribe { id, destination, handler }) => {
                            info!("New subscriber for: {} ({})", destination, id);
                            let frame = Frame::subscribe(id.as_str(), &destination);
                            if let Err(e) = self.write_frame(&mut write, &frame).await {
                                error!("Subscribe failed, keeping it for next connect: {}", e);
                                self.buffer(PendingItem::Subscription { id, destination, handler });
                                return self.lost();
                            }
                            self.registry.insert(id, destination, handler);
                            self.metrics.set_active_subscriptions(self.registry.len());
                        }
                        Some(ClientCommand::Unsubscribe(id)) => {
                            if let Err(e) = self.unsubscribe(&mut write, &id).await {
                                error!("Unsubscribe failed: {}", e);
                                return self.lost();
                            }
                        }
                        Some(ClientCommand::Connect(reply)) => {
                            debug!("Already connected");
                            let _ = reply.send(Ok(()));
                        }
                        Some(ClientCommand::Disconnect(reply)) => {
                            self.close(&mut write).await;
                            let _ = reply.send(());
                            return Exit::Disconnected;
                        }
                        Some(ClientCommand::GetMetrics(reply)) => {
                            let _ = reply.send(self.snapshot());
                        }
                        Some(ClientCommand::Shutdown) | None => {
                            debug!("Shutdown requested while connected");
                            self.close(&mut write).await;
                            return Exit::Shutdown;
                        }
                    }
                }

                _ = heartbeat::tick(&mut outgoing) => {
                    if let Err(e) = write.send(Message::Text(HEARTBEAT.to_string())).await {
                        error!("Failed to send heart-beat: {}", e);
                        return self.lost();
                    }
                }

                _ = heartbeat::tick(&mut incoming_check) => {
                    if watchdog.as_ref().is_some_and(IncomingWatchdog::is_expired) {
                        warn!("No data from server within heart-beat window, dropping connection");
                        return self.lost();
                    }
                }
            }
        }
    }

    /// Write every buffered item in FIFO order
    ///
    /// An item is removed only after its frame is on the wire.
    async fn flush_pending<S>(&mut self, write: &mut S) -> Result<()>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        if !self.pending.is_empty() {
            info!("Flushing {} buffered operations", self.pending.len());
        }

        while let Some(item) = self.pending.front() {
            let frame = item.frame();
            self.write_frame(write, &frame).await?;

            if let Some(PendingItem::Subscription {
                id,
                destination,
                handler,
            }) = self.pending.pop_front()
            {
                self.registry.insert(id, destination, handler);
                self.metrics.set_active_subscriptions(self.registry.len());
            }
            self.metrics.set_pending(self.pending.len());
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, write: &mut WsSink, id: &SubscriptionId) -> Result<()> {
        match self.registry.remove(id) {
            Some(destination) => {
                info!("Unsubscribing {} from {}", id, destination);
                self.metrics.set_active_subscriptions(self.registry.len());
                self.write_frame(write, &Frame::unsubscribe(id.as_str())).await
            }
            None => {
                debug!("Unsubscribe for unknown subscription {}", id);
                Ok(())
            }
        }
    }

    /// Returns false when the connection must be dropped
    fn handle_inbound(&mut self, text: &str) -> bool {
        let frames = match protocol::decode(text) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Dropping undecodable frame: {}", e);
                return true;
            }
        };

        for frame in frames {
            match frame.command {
                Command::Message => match StompMessage::from_frame(frame) {
                    Ok(message) => {
                        self.metrics.increment_received();
                        self.registry.dispatch(message);
                    }
                    Err(e) => warn!("Dropping MESSAGE: {}", e),
                },
                Command::Receipt => {
                    debug!("RECEIPT {:?}", frame.get_header("receipt-id"));
                }
                Command::Error => {
                    error!(
                        "Broker ERROR: {} {}",
                        frame.get_header("message").unwrap_or("no message"),
                        frame.body
                    );
                    return false;
                }
                other => warn!("Unexpected {} frame from server", other),
            }
        }
        true
    }

    async fn write_frame<S>(&mut self, write: &mut S, frame: &Frame) -> Result<()>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        write
            .send(Message::Text(frame.encode()))
            .await
            .map_err(|e| StompError::WebSocket(e.to_string()))?;
        self.metrics.increment_sent();
        Ok(())
    }

    /// Graceful DISCONNECT + close, then back to Disconnected
    async fn close(&mut self, write: &mut WsSink) {
        self.receipt_seq += 1;
        let frame = Frame::disconnect(&format!("close-{}", self.receipt_seq));
        if let Err(e) = self.write_frame(write, &frame).await {
            warn!("Failed to send DISCONNECT: {}", e);
        }
        let _ = write.close().await;

        self.registry.clear();
        self.metrics.set_active_subscriptions(0);
        self.state.set(ConnectionState::Disconnected);
        info!("Disconnected");
        let _ = self.state_tx.send(false);
    }

    /// Transport went away without a DISCONNECT from us
    fn lost(&mut self) -> Exit {
        self.registry.clear();
        self.metrics.set_active_subscriptions(0);
        self.state.set(ConnectionState::Disconnected);
        warn!("Connection to {} lost", self.config.url);
        let _ = self.state_tx.send(false);
        Exit::Disconnected
    }
}

/// WebSocket upgrade plus CONNECT / CONNECTED exchange
async fn handshake(
    config: Arc<ClientConfig>,
    metrics: Arc<AtomicMetrics>,
) -> Result<(WsStream, Negotiated)> {
    let (mut ws, _) = connect_async(config.url.as_str())
        .await
        .map_err(|e| StompError::WebSocket(e.to_string()))?;

    let extra = match &config.headers {
        Some(provider) => provider.get_headers().await,
        None => Headers::new(),
    };
    let connect = Frame::connect(&config.host, config.heartbeat.header_value(), extra.iter());
    ws.send(Message::Text(connect.encode()))
        .await
        .map_err(|e| StompError::WebSocket(format!("Failed to send CONNECT: {}", e)))?;
    metrics.increment_sent();

    loop {
        let text = match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(data))) => String::from_utf8(data)
                .map_err(|_| StompError::Frame("binary frame is not UTF-8".into()))?,
            Some(Ok(Message::Close(_))) | None => {
                return Err(StompError::ConnectionClosed("closed before CONNECTED".into()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(StompError::WebSocket(e.to_string())),
        };

        for frame in protocol::decode(&text)? {
            match frame.command {
                Command::Connected => {
                    debug!(
                        "CONNECTED version={:?} server={:?}",
                        frame.get_header("version"),
                        frame.get_header("server")
                    );
                    let negotiated = heartbeat::negotiate(config.heartbeat, frame.get_header("heart-beat"));
                    return Ok((ws, negotiated));
                }
                Command::Error => {
                    let reason = frame.get_header("message").unwrap_or("no message");
                    return Err(StompError::Handshake(format!("{} {}", reason, frame.body)));
                }
                other => warn!("Ignoring {} frame during handshake", other),
            }
        }
    }
}

/// Answer every waiting `connect()` with the same outcome
fn resolve(waiters: Vec<ConnectReply>, outcome: Result<()>) {
    match outcome {
        Ok(()) => {
            for waiter in waiters {
                let _ = waiter.send(Ok(()));
            }
        }
        Err(e) => {
            for waiter in waiters {
                let _ = waiter.send(Err(same_failure(&e)));
            }
        }
    }
}

fn same_failure(e: &StompError) -> StompError {
    match e {
        StompError::WebSocket(m) => StompError::WebSocket(m.clone()),
        StompError::ConnectionClosed(m) => StompError::ConnectionClosed(m.clone()),
        StompError::Handshake(m) => StompError::Handshake(m.clone()),
        StompError::Frame(m) => StompError::Frame(m.clone()),
        other => StompError::Other(other.to_string()),
    }
}
