//! # Confab Session Core
//!
//! Session bookkeeping for multi-party WebRTC meetings: who is in the
//! meeting, which peer connection belongs to which attendee, and how vendor
//! SDK events reach application callbacks.
//!
//! ## Features
//!
//! - **Roster**: per-attendee presence, volume, mute and signal strength,
//!   with content share identities folded into their base attendee
//! - **Peer Connection Registry**: at most one live connection per remote
//!   attendee, with per-connection negotiation state
//! - **Event Adapter**: vendor events in, optional observer callbacks and a
//!   broadcast event stream out
//! - **Video Tiles**: fixed number of remote rendering slots
//!
//! ## Architecture
//!
//! - `session`: [`MeetingSession`], the owner of all per-meeting state
//! - `roster`, `peers`, `tiles`: the tables a session mutates
//! - `signaling`, `media`, `messaging`: vendor seams (traits) and wire shapes
//! - `events`: vendor events and the application observer
//! - `meeting`: join/end descriptors exchanged with the meeting backend
//! - `config`, `errors`, `types`: shared plumbing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use confab_session_core::prelude::*;
//!
//! # async fn run(factory: Arc<dyn PeerConnectionFactory>, signaling: Arc<dyn SignalingChannel>) -> Result<()> {
//! let config = SessionConfig::new("arn:aws:kinesisvideo:us-west-2:123:channel/demo/1", "us-west-2");
//! let session = MeetingSession::new(
//!     config,
//!     SessionCollaborators::new(factory, signaling),
//!     Arc::new(NoopObserver),
//! )?;
//!
//! session.start().await?;
//! session.handle_event(VendorEvent::PresenceChanged {
//!     attendee_id: AttendeeId::new("a-1"),
//!     present: true,
//!     external_user_id: None,
//! }).await?;
//! assert_eq!(session.roster().await.len(), 1);
//! session.stop("done").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod events;
pub mod media;
pub mod meeting;
pub mod messaging;
pub mod peers;
pub mod roster;
pub mod session;
pub mod signaling;
pub mod tiles;
pub mod types;

pub use config::{Credentials, SessionConfig};
pub use errors::{ErrorCategory, Result, SessionError};
pub use events::{ConnectionQuality, NoopObserver, SessionEvent, SessionObserver, VendorEvent};
pub use peers::{PeerConnectionRegistry, PeerConnectionState};
pub use roster::{AttendeeRecord, RosterTracker, VolumeUpdate};
pub use session::{MeetingSession, SessionCollaborators, SessionStatus};
pub use tiles::{TileBinding, VideoTileState, VideoTileTable};
pub use types::{AttendeeId, SessionId, SessionRole, SignalStrength, TileId};

/// Commonly used types
pub mod prelude {
    pub use crate::config::{Credentials, SessionConfig};
    pub use crate::errors::{Result, SessionError};
    pub use crate::events::{NoopObserver, SessionEvent, SessionObserver, VendorEvent};
    pub use crate::media::{LocalStream, MediaDevices, MediaTrack, TrackKind};
    pub use crate::messaging::{ChatMessage, DataMessage, MessageTransport};
    pub use crate::peers::PeerConnectionState;
    pub use crate::roster::{AttendeeRecord, VolumeUpdate};
    pub use crate::session::{MeetingSession, SessionCollaborators, SessionStatus};
    pub use crate::signaling::{
        IceCandidate, PeerConnection, PeerConnectionFactory, SessionDescription, SignalingChannel,
    };
    pub use crate::tiles::{TileBinding, VideoTileState};
    pub use crate::types::{AttendeeId, SessionRole, SignalStrength, TileId};
}
