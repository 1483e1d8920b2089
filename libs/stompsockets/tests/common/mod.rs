//! Common test utilities for StompSockets integration tests
//!
//! `MockStompBroker` is a tiny in-process STOMP broker: it answers CONNECT,
//! routes SEND frames to matching subscriptions on the same connection, and
//! records every frame the client writes so tests can assert wire order.
#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stompsockets::protocol::{decode, Command, Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// SEND to this destination makes the broker answer with ERROR and hang up
pub const ERROR_TRIGGER: &str = "/trigger/error";

#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// Answer CONNECT with ERROR
    pub reject_connect: bool,
    /// `heart-beat` header of CONNECTED
    pub heart_beat: String,
    /// Wait this long before answering CONNECT
    pub connected_delay: Option<Duration>,
    /// Write an EOL heart-beat at this period
    pub beat_every: Option<Duration>,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            reject_connect: false,
            heart_beat: "0,0".to_string(),
            connected_delay: None,
            beat_every: None,
        }
    }
}

pub struct MockStompBroker {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    kill: Arc<Notify>,
    received: Mutex<mpsc::UnboundedReceiver<Frame>>,
    heartbeats: Arc<AtomicUsize>,
}

impl MockStompBroker {
    pub async fn start() -> Self {
        Self::start_with(BrokerOptions::default()).await
    }

    pub async fn start_with(options: BrokerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let kill = Arc::new(Notify::new());
        let heartbeats = Arc::new(AtomicUsize::new(0));
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        let shutdown_clone = Arc::clone(&shutdown);
        let kill_clone = Arc::clone(&kill);
        let heartbeats_clone = Arc::clone(&heartbeats);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let conn = Connection {
                                    options: options.clone(),
                                    frames_tx: frames_tx.clone(),
                                    heartbeats: Arc::clone(&heartbeats_clone),
                                    shutdown: Arc::clone(&shutdown_clone),
                                    kill: Arc::clone(&kill_clone),
                                };
                                tokio::spawn(conn.run(stream));
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self {
            addr,
            shutdown,
            kill,
            received: Mutex::new(frames_rx),
            heartbeats,
        }
    }

    /// Base URL the way applications configure it (SockJS style)
    pub fn sockjs_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Wait for the next frame written by a client
    pub async fn next_frame(&self) -> Frame {
        let mut rx = self.received.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("broker stopped")
    }

    /// Wait for the next frame and check its command
    pub async fn expect(&self, command: Command) -> Frame {
        let frame = self.next_frame().await;
        assert_eq!(frame.command, command, "unexpected frame: {:?}", frame);
        frame
    }

    /// Assert no client frame arrives within `window`
    pub async fn expect_silence(&self, window: Duration) {
        let mut rx = self.received.lock().await;
        if let Ok(Some(frame)) = tokio::time::timeout(window, rx.recv()).await {
            panic!("expected no frame, got {:?}", frame);
        }
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Drop every open connection without a close handshake
    pub fn kill_connections(&self) {
        self.kill.notify_waiters();
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockStompBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Connection {
    options: BrokerOptions,
    frames_tx: mpsc::UnboundedSender<Frame>,
    heartbeats: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
    kill: Arc<Notify>,
}

impl Connection {
    async fn run(self, stream: TcpStream) {
        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        // destination -> subscription ids
        let mut subscriptions: HashMap<String, Vec<String>> = HashMap::new();
        let mut message_seq = 0u64;
        let mut beat = self.options.beat_every.map(tokio::time::interval);

        loop {
            tokio::select! {
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };

                    if text.trim_matches(['\n', '\r']).is_empty() {
                        self.heartbeats.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }

                    let frames = match decode(&text) {
                        Ok(frames) => frames,
                        Err(e) => {
                            eprintln!("Broker could not decode frame: {}", e);
                            continue;
                        }
                    };

                    for frame in frames {
                        let _ = self.frames_tx.send(frame.clone());
                        let mut replies = Vec::new();
                        let mut hang_up = false;

                        match frame.command {
                            Command::Connect => {
                                if let Some(delay) = self.options.connected_delay {
                                    tokio::time::sleep(delay).await;
                                }
                                if self.options.reject_connect {
                                    replies.push(
                                        Frame::new(Command::Error)
                                            .header("message", "Bad credentials")
                                            .body("login rejected"),
                                    );
                                    hang_up = true;
                                } else {
                                    replies.push(
                                        Frame::new(Command::Connected)
                                            .header("version", "1.2")
                                            .header("heart-beat", self.options.heart_beat.as_str()),
                                    );
                                }
                            }
                            Command::Subscribe => {
                                let id = frame.get_header("id").unwrap_or_default().to_string();
                                let destination = frame.get_header("destination").unwrap_or_default().to_string();
                                subscriptions.entry(destination).or_default().push(id);
                            }
                            Command::Unsubscribe => {
                                let id = frame.get_header("id").unwrap_or_default();
                                for ids in subscriptions.values_mut() {
                                    ids.retain(|existing| existing != id);
                                }
                            }
                            Command::Send => {
                                let destination = frame.get_header("destination").unwrap_or_default();
                                if destination == ERROR_TRIGGER {
                                    replies.push(Frame::new(Command::Error).header("message", "Triggered"));
                                    hang_up = true;
                                } else if let Some(ids) = subscriptions.get(destination) {
                                    for id in ids {
                                        message_seq += 1;
                                        replies.push(
                                            Frame::new(Command::Message)
                                                .header("destination", destination)
                                                .header("subscription", id.as_str())
                                                .header("message-id", message_seq.to_string())
                                                .body(frame.body.clone()),
                                        );
                                    }
                                }
                            }
                            Command::Disconnect => {
                                if let Some(receipt) = frame.get_header("receipt") {
                                    replies.push(Frame::new(Command::Receipt).header("receipt-id", receipt));
                                }
                            }
                            _ => {}
                        }

                        for reply in replies {
                            if write.send(Message::Text(reply.encode())).await.is_err() {
                                return;
                            }
                        }
                        if hang_up {
                            let _ = write.close().await;
                            return;
                        }
                    }
                }
                _ = async {
                    match beat.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if write.send(Message::Text("\n".to_string())).await.is_err() {
                        return;
                    }
                }
                _ = self.kill.notified() => break,
                _ = self.shutdown.notified() => break,
            }
        }
    }
}

/// Wait for the next state event with a timeout
pub async fn next_state(rx: &mut tokio::sync::broadcast::Receiver<bool>) -> bool {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a state event")
        .expect("state channel closed")
}
