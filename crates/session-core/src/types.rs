//! Core types for confab-session-core
//!
//! Identifiers, roles and small value types shared by the roster, the peer
//! connection registry and the tile table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix the meeting service appends to an attendee id for its content share stream
pub const CONTENT_SHARE_SUFFIX: &str = "#content";

/// Remote peer id used by the viewer role for its single connection to the master
pub const MASTER_PEER_ID: &str = "MASTER";

/// Unique identifier for a session
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vendor-issued attendee identifier, unique within a session
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(pub String);

impl AttendeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The well-known remote id of the master in single-party sessions
    pub fn master() -> Self {
        Self(MASTER_PEER_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id names a content share stream rather than a person
    pub fn is_content_share(&self) -> bool {
        self.0.ends_with(CONTENT_SHARE_SUFFIX) && self.0.len() > CONTENT_SHARE_SUFFIX.len()
    }

    /// Resolve a content share pseudo-identity to the attendee that owns it.
    ///
    /// Ids that are not content shares resolve to themselves.
    pub fn base(&self) -> AttendeeId {
        if self.is_content_share() {
            let end = self.0.len() - CONTENT_SHARE_SUFFIX.len();
            AttendeeId(self.0[..end].to_string())
        } else {
            self.clone()
        }
    }

    /// The content share pseudo-identity for this attendee
    pub fn content_share(&self) -> AttendeeId {
        AttendeeId(format!("{}{}", self.base().0, CONTENT_SHARE_SUFFIX))
    }
}

impl fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttendeeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AttendeeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Vendor-assigned video tile handle
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u32);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile-{}", self.0)
    }
}

/// Which side of a signaling channel this session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionRole {
    /// Multi-party host: answers offers from any number of remote attendees
    Master,
    /// Single-party client: offers to the master over one connection
    Viewer,
}

impl Default for SessionRole {
    fn default() -> Self {
        SessionRole::Master
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Master => write!(f, "MASTER"),
            SessionRole::Viewer => write!(f, "VIEWER"),
        }
    }
}

/// Coarse signal strength reported by the meeting service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalStrength {
    /// 0: no signal
    None,
    /// 0.5: degraded
    Weak,
    /// 1: good
    Strong,
}

impl SignalStrength {
    /// Map a reported fraction to the nearest of {0, 0.5, 1}
    pub fn from_fraction(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return None;
        }
        Some(if value < 0.25 {
            SignalStrength::None
        } else if value < 0.75 {
            SignalStrength::Weak
        } else {
            SignalStrength::Strong
        })
    }

    pub fn as_fraction(&self) -> f64 {
        match self {
            SignalStrength::None => 0.0,
            SignalStrength::Weak => 0.5,
            SignalStrength::Strong => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_share_resolution() {
        let share = AttendeeId::from("A#content");
        assert!(share.is_content_share());
        assert_eq!(share.base(), AttendeeId::from("A"));

        let plain = AttendeeId::from("A");
        assert!(!plain.is_content_share());
        assert_eq!(plain.base(), plain);
        assert_eq!(plain.content_share(), share);

        // A bare suffix is not a content share of anybody
        assert!(!AttendeeId::from("#content").is_content_share());
    }

    #[test]
    fn test_signal_strength_mapping() {
        assert_eq!(SignalStrength::from_fraction(0.0), Some(SignalStrength::None));
        assert_eq!(SignalStrength::from_fraction(0.5), Some(SignalStrength::Weak));
        assert_eq!(SignalStrength::from_fraction(1.0), Some(SignalStrength::Strong));
        assert_eq!(SignalStrength::from_fraction(1.5), None);
        assert_eq!(SignalStrength::from_fraction(f64::NAN), None);
        assert_eq!(SignalStrength::Weak.as_fraction(), 0.5);
    }

    #[test]
    fn test_session_role_serde() {
        let json = serde_json::to_string(&SessionRole::Viewer).unwrap();
        assert_eq!(json, "\"VIEWER\"");
        let role: SessionRole = serde_json::from_str("\"MASTER\"").unwrap();
        assert_eq!(role, SessionRole::Master);
    }
}
