//! STOMP heart-beating
//!
//! The client advertises `heart-beat:cx,cy` in CONNECT and the broker
//! answers with `heart-beat:sx,sy` in CONNECTED. Both sides must want a
//! direction for it to be enabled:
//!
//! ```text
//! outgoing = max(cx, sy)   if cx > 0 and sy > 0
//! incoming = max(sx, cy)   if sx > 0 and cy > 0
//! ```
//!
//! Outgoing beats are single EOLs written by the session loop. Incoming
//! silence longer than twice the negotiated period counts as a dead
//! connection.

use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// What the client asks for in CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub outgoing: Duration,
    pub incoming: Duration,
}

impl HeartbeatConfig {
    pub fn new(outgoing: Duration, incoming: Duration) -> Self {
        Self { outgoing, incoming }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Value of the CONNECT `heart-beat` header, in milliseconds
    pub fn header_value(&self) -> (u64, u64) {
        (
            self.outgoing.as_millis() as u64,
            self.incoming.as_millis() as u64,
        )
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(10))
    }
}

/// Result of negotiation with the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    pub outgoing: Option<Duration>,
    pub incoming: Option<Duration>,
}

/// Combine our settings with the CONNECTED `heart-beat` header
///
/// A missing or malformed header is treated as `0,0`.
pub fn negotiate(client: HeartbeatConfig, server_header: Option<&str>) -> Negotiated {
    let (sx, sy) = server_header.and_then(parse_header).unwrap_or((0, 0));
    let (cx, cy) = client.header_value();

    let pick = |ours: u64, theirs: u64| {
        (ours > 0 && theirs > 0).then(|| Duration::from_millis(ours.max(theirs)))
    };

    Negotiated {
        outgoing: pick(cx, sy),
        incoming: pick(cy, sx),
    }
}

fn parse_header(value: &str) -> Option<(u64, u64)> {
    let (x, y) = value.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Interval that skips its immediate first tick
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    // If we miss ticks due to slow processing, skip them rather than bursting
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Tick an optional interval; never resolves when absent
pub(crate) async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Tracks when the broker was last heard from
#[derive(Debug)]
pub(crate) struct IncomingWatchdog {
    period: Duration,
    last_read: Instant,
}

impl IncomingWatchdog {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            last_read: Instant::now(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_read = Instant::now();
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.last_read.elapsed() > self.period * 2
    }
}
