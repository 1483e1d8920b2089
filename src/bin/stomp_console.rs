//! Interactive STOMP console
//!
//! Usage: `stomp_console [SUBSCRIBE_TOPIC] [SEND_TOPIC]`
//!
//! Lines typed on stdin are sent to SEND_TOPIC as JSON (plain text becomes a
//! JSON string). Commands: `/connect`, `/disconnect`, `/status`, `/quit`.
//! Anything typed while disconnected is buffered until the next connect.

use anyhow::Result;
use serde_json::Value;
use stomp_relay::bin_common::{load_config_from_env, parse_args, ConfigType};
use stomp_relay::config::StompConfig;
use stomp_relay::logging::init_tracing;
use stomp_relay::stompsockets::{StompClient, StompMessage};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const DEFAULT_SUBSCRIBE_TOPIC: &str = "/topic/messages";
const DEFAULT_SEND_TOPIC: &str = "/app/messages";

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::Stomp);
    let config = StompConfig::load(&config_path)?;

    init_tracing(&config.log_level);
    config.log();

    let args = parse_args();
    let subscribe_topic = args.first().map(String::as_str).unwrap_or(DEFAULT_SUBSCRIBE_TOPIC);
    let send_topic = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_SEND_TOPIC.to_string());

    let client = config.build_client().await?;
    print_banner(client.url(), subscribe_topic, &send_topic);

    let mut states = client.state_changes();
    tokio::spawn(async move {
        while let Ok(connected) = states.recv().await {
            if connected {
                info!("Connection state: connected");
            } else {
                warn!("Connection state: disconnected");
            }
        }
    });

    let id = client.subscribe(subscribe_topic, |message: StompMessage| {
        println!("[{}] {}", message.destination(), message.body());
    })?;
    info!("Subscribed to {} as {}", subscribe_topic, id);

    if let Err(e) = client.connect().await {
        error!("Connect failed: {} (input is buffered, type /connect to retry)", e);
    }

    run_console(&client, &send_topic).await?;

    let metrics = client.metrics().await;
    client.shutdown().await?;
    print_shutdown(metrics.frames_sent, metrics.messages_received);
    Ok(())
}

async fn run_console(client: &StompClient, send_topic: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C");
                return Ok(());
            }
        };
        let Some(line) = line else {
            return Ok(());
        };
        let line = line.trim();

        match line {
            "" => {}
            "/quit" => return Ok(()),
            "/connect" => {
                if let Err(e) = client.connect().await {
                    error!("Connect failed: {}", e);
                }
            }
            "/disconnect" => client.disconnect().await?,
            "/status" => {
                let metrics = client.metrics().await;
                info!(
                    "state={:?} sent={} received={} pending={} subscriptions={}",
                    metrics.connection_state,
                    metrics.frames_sent,
                    metrics.messages_received,
                    metrics.pending,
                    metrics.active_subscriptions
                );
            }
            text => {
                let payload = serde_json::from_str::<Value>(text)
                    .unwrap_or_else(|_| Value::String(text.to_string()));
                client.send(send_topic, &payload)?;
                if !client.is_connected() {
                    info!("Buffered message for {} until connected", send_topic);
                }
            }
        }
    }
}

fn print_banner(url: &str, subscribe_topic: &str, send_topic: &str) {
    info!("");
    info!("========================================");
    info!("Starting STOMP console");
    info!("Endpoint: {}", url);
    info!("Subscribe: {}  Send: {}", subscribe_topic, send_topic);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(frames_sent: u64, messages_received: u64) {
    info!("");
    info!("========================================");
    info!("STOMP console stopped gracefully");
    info!("Frames sent: {}  Messages received: {}", frames_sent, messages_received);
    info!("========================================");
}
