use super::frame::{Command, Frame};
use crate::error::{Result, StompError};
use serde::de::DeserializeOwned;
use std::fmt;

/// Client-assigned subscription identifier (`sub-N`)
///
/// Assigned when `subscribe` is called, so it is valid even while the
/// subscription is still waiting in the pending queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    pub(crate) fn from_sequence(n: u64) -> Self {
        Self(format!("sub-{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A MESSAGE frame delivered to a subscription callback
#[derive(Debug, Clone)]
pub struct StompMessage {
    destination: String,
    subscription: SubscriptionId,
    message_id: Option<String>,
    headers: Vec<(String, String)>,
    body: String,
}

impl StompMessage {
    pub(crate) fn from_frame(frame: Frame) -> Result<Self> {
        if frame.command != Command::Message {
            return Err(StompError::Frame(format!(
                "expected MESSAGE, got {}",
                frame.command
            )));
        }
        let destination = frame
            .get_header("destination")
            .ok_or_else(|| StompError::Frame("MESSAGE without destination".into()))?
            .to_string();
        let subscription = frame
            .get_header("subscription")
            .ok_or_else(|| StompError::Frame("MESSAGE without subscription".into()))?
            .to_string();
        let message_id = frame.get_header("message-id").map(str::to_string);

        Ok(Self {
            destination,
            subscription: SubscriptionId(subscription),
            message_id,
            headers: frame.headers,
            body: frame.body,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn subscription(&self) -> &SubscriptionId {
        &self.subscription
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Deserialize the JSON body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}
