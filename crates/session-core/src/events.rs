//! Session events
//!
//! Two directions cross this module:
//!
//! - [`VendorEvent`] is what the vendor SDK glue feeds into a session
//!   (signaling lifecycle, negotiation messages, presence, volume, tiles,
//!   data messages).
//! - [`SessionObserver`] and [`SessionEvent`] are what the application sees.
//!   Every observer method has a no-op default, so an application overrides
//!   only the callbacks it cares about.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use confab_session_core::events::SessionObserver;
//! use confab_session_core::roster::AttendeeRecord;
//! use confab_session_core::types::AttendeeId;
//!
//! struct PrintingObserver;
//!
//! #[async_trait]
//! impl SessionObserver for PrintingObserver {
//!     async fn on_attendee_joined(&self, attendee_id: &AttendeeId, _external_user_id: Option<&str>) {
//!         println!("{} joined", attendee_id);
//!     }
//!
//!     async fn on_roster_changed(&self, roster: &[AttendeeRecord]) {
//!         println!("{} attendees", roster.len());
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::media::{LocalStream, MediaTrack};
use crate::messaging::{ChatMessage, DataMessage};
use crate::roster::{AttendeeRecord, VolumeUpdate};
use crate::signaling::{ConnectionStats, IceCandidate, SessionDescription};
use crate::tiles::{TileBinding, VideoTileState};
use crate::types::{AttendeeId, TileId};

/// Connection quality alert raised by the meeting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionQuality {
    /// Sustained poor uplink or downlink
    Poor,
    /// Video was dropped to keep audio flowing
    VideoDegraded,
    /// Back to normal after an alert
    Recovered,
}

/// Event delivered by the vendor SDKs
#[derive(Debug, Clone)]
pub enum VendorEvent {
    /// Signaling channel connected
    SignalingOpen,
    /// Signaling channel closed
    SignalingClosed,
    /// Signaling channel error
    SignalingError { message: String },
    /// Meeting session started
    SessionStarted,
    /// Meeting session stopped by the service
    SessionStopped { reason: String },
    /// Meeting session is reconnecting
    Reconnecting,
    /// Remote offer (master role)
    SdpOffer { from: AttendeeId, offer: SessionDescription },
    /// Remote answer (viewer role)
    SdpAnswer { answer: SessionDescription },
    /// Remote ICE candidate. `from` is `None` in the viewer role.
    RemoteIceCandidate { from: Option<AttendeeId>, candidate: IceCandidate },
    /// Candidate gathered locally for a connection; `None` marks end of gathering
    LocalIceCandidate { peer: AttendeeId, candidate: Option<IceCandidate> },
    /// Transport of a peer connection is up
    PeerConnected { peer: AttendeeId },
    /// Transport of a peer connection failed or was closed remotely
    PeerDisconnected { peer: AttendeeId, reason: String },
    /// Remote track arrived on a peer connection
    RemoteTrack { peer: AttendeeId, stream_id: String, track: MediaTrack },
    PresenceChanged {
        attendee_id: AttendeeId,
        present: bool,
        external_user_id: Option<String>,
    },
    VolumeIndicator { attendee_id: AttendeeId, update: VolumeUpdate },
    VideoTileUpdated { tile: VideoTileState },
    VideoTileRemoved { tile_id: TileId },
    ContentShareStarted,
    ContentShareStopped,
    ConnectionQuality { quality: ConnectionQuality },
    DataMessage { message: DataMessage },
}

impl VendorEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            VendorEvent::SignalingOpen => "signaling_open",
            VendorEvent::SignalingClosed => "signaling_closed",
            VendorEvent::SignalingError { .. } => "signaling_error",
            VendorEvent::SessionStarted => "session_started",
            VendorEvent::SessionStopped { .. } => "session_stopped",
            VendorEvent::Reconnecting => "reconnecting",
            VendorEvent::SdpOffer { .. } => "sdp_offer",
            VendorEvent::SdpAnswer { .. } => "sdp_answer",
            VendorEvent::RemoteIceCandidate { .. } => "remote_ice_candidate",
            VendorEvent::LocalIceCandidate { .. } => "local_ice_candidate",
            VendorEvent::PeerConnected { .. } => "peer_connected",
            VendorEvent::PeerDisconnected { .. } => "peer_disconnected",
            VendorEvent::RemoteTrack { .. } => "remote_track",
            VendorEvent::PresenceChanged { .. } => "presence_changed",
            VendorEvent::VolumeIndicator { .. } => "volume_indicator",
            VendorEvent::VideoTileUpdated { .. } => "video_tile_updated",
            VendorEvent::VideoTileRemoved { .. } => "video_tile_removed",
            VendorEvent::ContentShareStarted => "content_share_started",
            VendorEvent::ContentShareStopped => "content_share_stopped",
            VendorEvent::ConnectionQuality { .. } => "connection_quality",
            VendorEvent::DataMessage { .. } => "data_message",
        }
    }
}

/// Application-facing notification, also published on the broadcast channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Started,
    Stopped { reason: String },
    Reconnecting,
    AttendeeJoined {
        attendee_id: AttendeeId,
        external_user_id: Option<String>,
    },
    AttendeeLeft { attendee_id: AttendeeId },
    RosterChanged { roster: Vec<AttendeeRecord> },
    VideoTileUpdated { binding: TileBinding },
    VideoTileRemoved { tile_id: TileId, slot: Option<usize> },
    ScreenShareStarted { attendee_id: Option<AttendeeId> },
    ScreenShareStopped { attendee_id: Option<AttendeeId> },
    ConnectionQuality { quality: ConnectionQuality },
    Message { message: ChatMessage },
    RemoteStream { peer: AttendeeId, stream_id: String },
    LocalStream { stream: Option<LocalStream> },
    LocalVideoTile { tile: VideoTileState },
    DeviceError { message: String },
    ConnectionStats { peer: AttendeeId, stats: ConnectionStats },
    Error { message: String, recoverable: bool },
}

/// Application callbacks. Every method is optional.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    async fn on_started(&self) {}

    async fn on_stopped(&self, _reason: &str) {}

    async fn on_reconnecting(&self) {}

    async fn on_attendee_joined(&self, _attendee_id: &AttendeeId, _external_user_id: Option<&str>) {}

    async fn on_attendee_left(&self, _attendee_id: &AttendeeId) {}

    /// Receives the full roster after every mutation
    async fn on_roster_changed(&self, _roster: &[AttendeeRecord]) {}

    async fn on_video_tile_updated(&self, _binding: &TileBinding) {}

    /// The local camera tile; it does not occupy a remote tile slot
    async fn on_local_video_tile(&self, _tile: &VideoTileState) {}

    async fn on_video_tile_removed(&self, _tile_id: TileId, _slot: Option<usize>) {}

    async fn on_screen_share_started(&self, _attendee_id: Option<&AttendeeId>) {}

    async fn on_screen_share_stopped(&self, _attendee_id: Option<&AttendeeId>) {}

    async fn on_connection_quality(&self, _quality: ConnectionQuality) {}

    async fn on_message(&self, _message: &ChatMessage) {}

    /// The first remote stream of the session, bound as the remote view
    async fn on_remote_stream(&self, _peer: &AttendeeId, _stream_id: &str) {}

    async fn on_local_stream(&self, _stream: Option<&LocalStream>) {}

    async fn on_device_error(&self, _message: &str) {}

    async fn on_error(&self, _error: &SessionError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl SessionObserver for NoopObserver {}
