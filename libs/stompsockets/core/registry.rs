//! Live subscriptions and their callback threads
//!
//! ```text
//! Session task ─ MESSAGE(subscription=sub-0) ─> sub-0 channel ─> sub-0 thread (sequential)
//!              ─ MESSAGE(subscription=sub-1) ─> sub-1 channel ─> sub-1 thread (sequential)
//! ```
//!
//! Dropping a route's sender closes its channel; the thread drains what is
//! already queued and exits. Finished thread handles are parked in a shared
//! list so `StompClient::shutdown` can join them.

use crate::protocol::{StompMessage, SubscriptionId};
use crate::traits::MessageHandler;
use crossbeam_channel::{unbounded, RecvError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Thread handles whose channel has been closed
pub(crate) type HandlerHandles = Arc<Mutex<Vec<JoinHandle<()>>>>;

struct Route {
    destination: String,
    sender: Sender<StompMessage>,
    handle: JoinHandle<()>,
}

pub(crate) struct SubscriptionRegistry {
    routes: HashMap<SubscriptionId, Route>,
    retired: HandlerHandles,
}

impl SubscriptionRegistry {
    pub(crate) fn new(retired: HandlerHandles) -> Self {
        Self {
            routes: HashMap::new(),
            retired,
        }
    }

    /// Start the callback thread for a subscription the broker now knows about
    pub(crate) fn insert(
        &mut self,
        id: SubscriptionId,
        destination: String,
        mut handler: Box<dyn MessageHandler>,
    ) {
        let (sender, receiver) = unbounded::<StompMessage>();
        let thread_id = id.clone();

        let handle = std::thread::spawn(move || loop {
            match receiver.recv() {
                Ok(message) => {
                    if let Err(e) = handler.handle(message) {
                        error!("Handler error for subscription {}: {}", thread_id, e);
                    }
                }
                Err(RecvError) => {
                    debug!("Channel closed for subscription {}, thread exiting", thread_id);
                    break;
                }
            }
        });

        if let Some(previous) = self.routes.insert(
            id,
            Route {
                destination,
                sender,
                handle,
            },
        ) {
            self.retire(previous);
        }
    }

    pub(crate) fn remove(&mut self, id: &SubscriptionId) -> Option<String> {
        let route = self.routes.remove(id)?;
        let destination = route.destination.clone();
        self.retire(route);
        Some(destination)
    }

    /// Hand a MESSAGE to its subscription thread
    pub(crate) fn dispatch(&self, message: StompMessage) {
        match self.routes.get(message.subscription()) {
            Some(route) => {
                // Fails only if the thread panicked
                if route.sender.send(message).is_err() {
                    warn!("Callback thread for {} is gone", route.destination);
                }
            }
            None => {
                warn!(
                    "MESSAGE for unknown subscription {} on {}",
                    message.subscription(),
                    message.destination()
                );
            }
        }
    }

    /// Drop every live subscription (connection ended)
    pub(crate) fn clear(&mut self) {
        let routes: Vec<Route> = self.routes.drain().map(|(_, route)| route).collect();
        for route in routes {
            self.retire(route);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: &SubscriptionId) -> bool {
        self.routes.contains_key(id)
    }

    /// Close a route's channel and park its thread handle
    ///
    /// Threads that already exited are joined here so the list only holds
    /// callbacks still draining their queue.
    fn retire(&self, route: Route) {
        drop(route.sender);

        let mut retired = self.retired.lock();
        let mut i = 0;
        while i < retired.len() {
            if retired[i].is_finished() {
                let _ = retired.swap_remove(i).join();
            } else {
                i += 1;
            }
        }
        retired.push(route.handle);
    }
}
