//! Operations issued while the session is not connected
//!
//! Items leave the queue in insertion order, and only after the frame they
//! produce has been written to the socket. A flush interrupted by a write
//! failure leaves the unsent tail queued for the next connect.

use crate::protocol::{Frame, SubscriptionId};
use crate::traits::MessageHandler;
use std::collections::VecDeque;
use std::fmt;

pub(crate) enum PendingItem {
    Subscription {
        id: SubscriptionId,
        destination: String,
        handler: Box<dyn MessageHandler>,
    },
    OutboundMessage {
        destination: String,
        body: String,
    },
}

impl PendingItem {
    /// Frame to write when this item is flushed
    pub(crate) fn frame(&self) -> Frame {
        match self {
            PendingItem::Subscription { id, destination, .. } => {
                Frame::subscribe(id.as_str(), destination)
            }
            PendingItem::OutboundMessage { destination, body } => {
                Frame::send(destination, body.clone())
            }
        }
    }
}

impl fmt::Debug for PendingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingItem::Subscription { id, destination, .. } => f
                .debug_struct("Subscription")
                .field("id", id)
                .field("destination", destination)
                .finish_non_exhaustive(),
            PendingItem::OutboundMessage { destination, body } => f
                .debug_struct("OutboundMessage")
                .field("destination", destination)
                .field("body", body)
                .finish(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    items: VecDeque<PendingItem>,
}

impl PendingQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, item: PendingItem) {
        self.items.push_back(item);
    }

    pub(crate) fn front(&self) -> Option<&PendingItem> {
        self.items.front()
    }

    pub(crate) fn pop_front(&mut self) -> Option<PendingItem> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop a subscription that never made it to the broker
    pub(crate) fn remove_subscription(&mut self, target: &SubscriptionId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| {
            !matches!(item, PendingItem::Subscription { id, .. } if id == target)
        });
        self.items.len() != before
    }
}
