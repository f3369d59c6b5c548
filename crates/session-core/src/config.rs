//! Session configuration
//!
//! [`SessionConfig`] collects everything a [`crate::session::MeetingSession`]
//! needs before it touches any vendor object. It deserializes from JSON and
//! offers `with_*` builder methods.
//!
//! ```rust
//! use confab_session_core::config::SessionConfig;
//! use confab_session_core::types::SessionRole;
//!
//! let config = SessionConfig::new("arn:aws:kinesisvideo:eu-west-1:123:channel/demo/1", "eu-west-1")
//!     .with_role(SessionRole::Viewer)
//!     .with_max_video_tiles(4);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.max_video_tiles, 4);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::media::{MediaConstraints, MediaOptions};
use crate::messaging::DEFAULT_CHAT_TOPIC;
use crate::roster::DEFAULT_PRESENCE_LOG_CAPACITY;
use crate::signaling::{ice_servers, IceTransportPolicy, RtcConfiguration, VendorIceServer};
use crate::tiles::DEFAULT_MAX_VIDEO_TILES;
use crate::types::SessionRole;

/// Vendor credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Configuration of one meeting session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub role: SessionRole,
    /// Human readable channel name
    pub channel_name: String,
    /// Resolved signaling channel ARN; required
    pub channel_arn: String,
    pub region: String,
    pub credentials: Credentials,
    pub media: MediaOptions,
    /// Open a data channel on every peer connection before the offer/answer
    pub open_data_channel: bool,
    pub ice_transport_policy: IceTransportPolicy,
    /// TURN servers handed out by the signaling service
    pub turn_servers: Vec<VendorIceServer>,
    pub max_video_tiles: usize,
    /// Connection stats polling interval in milliseconds; 0 disables polling
    pub stats_interval_ms: u64,
    pub presence_log_capacity: usize,
    pub chat_topic: String,
    /// Capacity of the broadcast channel behind `MeetingSession::subscribe`
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: SessionRole::Master,
            channel_name: String::new(),
            channel_arn: String::new(),
            region: "us-west-2".to_string(),
            credentials: Credentials::default(),
            media: MediaOptions::default(),
            open_data_channel: false,
            ice_transport_policy: IceTransportPolicy::All,
            turn_servers: Vec::new(),
            max_video_tiles: DEFAULT_MAX_VIDEO_TILES,
            stats_interval_ms: 1000,
            presence_log_capacity: DEFAULT_PRESENCE_LOG_CAPACITY,
            chat_topic: DEFAULT_CHAT_TOPIC.to_string(),
            event_channel_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn new(channel_arn: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            channel_arn: channel_arn.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Parse from a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_role(mut self, role: SessionRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = name.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_media(mut self, media: MediaOptions) -> Self {
        self.media = media;
        self
    }

    pub fn with_data_channel(mut self, open: bool) -> Self {
        self.open_data_channel = open;
        self
    }

    pub fn with_ice_transport_policy(mut self, policy: IceTransportPolicy) -> Self {
        self.ice_transport_policy = policy;
        self
    }

    pub fn with_turn_servers(mut self, servers: Vec<VendorIceServer>) -> Self {
        self.turn_servers = servers;
        self
    }

    pub fn with_max_video_tiles(mut self, max: usize) -> Self {
        self.max_video_tiles = max;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_chat_topic(mut self, topic: impl Into<String>) -> Self {
        self.chat_topic = topic.into();
        self
    }

    /// Check required identifiers and limits
    pub fn validate(&self) -> Result<()> {
        if self.channel_arn.trim().is_empty() {
            return Err(SessionError::config("channel ARN is empty"));
        }
        if self.region.trim().is_empty() {
            return Err(SessionError::config("region is empty"));
        }
        if self.max_video_tiles == 0 || self.max_video_tiles > DEFAULT_MAX_VIDEO_TILES {
            return Err(SessionError::config(format!(
                "max_video_tiles must be between 1 and {}",
                DEFAULT_MAX_VIDEO_TILES
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(SessionError::config("event_channel_capacity must be at least 1"));
        }
        if self.chat_topic.is_empty() {
            return Err(SessionError::config("chat topic is empty"));
        }
        Ok(())
    }

    pub fn media_constraints(&self) -> MediaConstraints {
        MediaConstraints::from_options(&self.media)
    }

    pub fn rtc_configuration(&self) -> RtcConfiguration {
        RtcConfiguration {
            ice_servers: ice_servers(&self.region, &self.turn_servers),
            ice_transport_policy: self.ice_transport_policy,
        }
    }

    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_ms > 0).then(|| Duration::from_millis(self.stats_interval_ms))
    }
}
