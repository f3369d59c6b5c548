//! In-meeting text messages
//!
//! Messages travel as UTF-8 bytes over the vendor data channel. Delivery is
//! best effort and at most once; nothing here orders or acknowledges them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::errors::Result;

/// Default data message topic
pub const DEFAULT_CHAT_TOPIC: &str = "chat";

/// A text message as surfaced to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Raw inbound data message from the meeting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    pub topic: String,
    pub sender: String,
    pub data: Bytes,
    /// Server timestamp in milliseconds since the epoch
    pub timestamp_ms: i64,
}

impl DataMessage {
    /// Decode the payload as UTF-8 text.
    ///
    /// Invalid sequences are replaced rather than dropping the message.
    pub fn decode(&self) -> ChatMessage {
        let text = String::from_utf8_lossy(&self.data).into_owned();
        let timestamp = Utc
            .timestamp_millis_opt(self.timestamp_ms)
            .single()
            .unwrap_or_else(Utc::now);
        trace!(sender = %self.sender, topic = %self.topic, len = self.data.len(), "Decoded data message");
        ChatMessage {
            sender: self.sender.clone(),
            text,
            timestamp,
        }
    }
}

/// Encode a text message for the data channel
pub fn encode_text(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Outbound side of the vendor data channel
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, topic: &str, data: Bytes) -> Result<()>;
}
