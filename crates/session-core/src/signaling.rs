//! Signaling types and vendor seams
//!
//! The signaling protocol itself (SDP negotiation, ICE gathering, the
//! WebSocket channel) lives in the vendor SDK. This module only defines the
//! shapes that cross the boundary and the traits the session drives.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::media::{LocalStream, MediaTrack};
use crate::types::AttendeeId;

/// SDP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

/// An offer or answer as exchanged over the signaling channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Check that this is a well-formed description of the expected type.
    ///
    /// Only the envelope is checked: the type matches and the body starts
    /// with a version line. Full SDP validation belongs to the vendor stack.
    pub fn validate(&self, expected: SdpType, attendee_id: &AttendeeId) -> Result<()> {
        if self.sdp_type != expected {
            return Err(SessionError::negotiation(
                attendee_id.as_str(),
                format!("expected {} but received {}", expected, self.sdp_type),
            ));
        }
        let body = self.sdp.trim_start();
        if body.is_empty() {
            return Err(SessionError::negotiation(attendee_id.as_str(), format!("{} has no SDP body", expected)));
        }
        if !body.starts_with("v=") {
            return Err(SessionError::negotiation(
                attendee_id.as_str(),
                format!("{} body does not start with a version line", expected),
            ));
        }
        Ok(())
    }
}

/// A trickled ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
        }
    }
}

/// STUN/TURN server entry of an RTC configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// TURN server entry as returned by the signaling service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VendorIceServer {
    pub uris: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ttl: Option<u32>,
}

/// Which candidates the peer connection may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    All,
    Relay,
}

impl Default for IceTransportPolicy {
    fn default() -> Self {
        IceTransportPolicy::All
    }
}

/// Configuration handed to the peer connection factory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RtcConfiguration {
    pub ice_servers: Vec<IceServer>,
    pub ice_transport_policy: IceTransportPolicy,
}

/// Label of the data channel opened when `SessionConfig::open_data_channel` is set
pub const DATA_CHANNEL_LABEL: &str = "kvsDataChannel";

/// Regional STUN endpoint of the signaling service
pub fn default_stun_url(region: &str) -> String {
    format!("stun:stun.kinesisvideo.{}.amazonaws.com:443", region)
}

/// Build the ICE server list: regional STUN first, then every vendor TURN server
pub fn ice_servers(region: &str, vendor_servers: &[VendorIceServer]) -> Vec<IceServer> {
    let mut servers = Vec::with_capacity(vendor_servers.len() + 1);
    servers.push(IceServer::stun(default_stun_url(region)));
    servers.extend(vendor_servers.iter().map(|server| IceServer {
        urls: server.uris.clone(),
        username: server.username.clone(),
        credential: server.password.clone(),
    }));
    servers
}

/// Signaling endpoint protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointProtocol {
    Wss,
    Https,
}

/// Endpoint entry as returned by the signaling service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEndpoint {
    pub protocol: EndpointProtocol,
    pub resource_endpoint: String,
}

/// Signaling endpoints keyed by protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingEndpoints {
    pub wss: String,
    pub https: Option<String>,
}

/// Fold the endpoint list into one URL per protocol. Later entries win.
pub fn endpoints_by_protocol(endpoints: &[ResourceEndpoint]) -> Result<SignalingEndpoints> {
    let map: HashMap<EndpointProtocol, &str> = endpoints
        .iter()
        .map(|e| (e.protocol, e.resource_endpoint.as_str()))
        .collect();

    let wss = map
        .get(&EndpointProtocol::Wss)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| SessionError::config("signaling service returned no WSS endpoint"))?;

    Ok(SignalingEndpoints {
        wss: wss.to_string(),
        https: map.get(&EndpointProtocol::Https).map(|url| url.to_string()),
    })
}

/// Connection statistics sampled from a peer connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_lost: u64,
    pub round_trip_time_ms: Option<f64>,
}

/// One vendor peer connection
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Attach a local track for sending
    async fn add_track(&self, track: &MediaTrack, stream: &LocalStream) -> Result<()>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Create a data channel with the given label
    async fn create_data_channel(&self, label: &str) -> Result<()>;

    async fn stats(&self) -> Result<ConnectionStats>;

    /// Close the connection. Implementations may assume this is called once.
    async fn close(&self);
}

/// Creates vendor peer connections
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, config: &RtcConfiguration, remote: &AttendeeId) -> Result<std::sync::Arc<dyn PeerConnection>>;
}

/// The vendor signaling client
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn open(&self) -> Result<()>;

    async fn close(&self);

    /// Send an offer to the master (viewer role)
    async fn send_sdp_offer(&self, offer: &SessionDescription) -> Result<()>;

    /// Send an answer to a remote attendee (master role)
    async fn send_sdp_answer(&self, answer: &SessionDescription, to: &AttendeeId) -> Result<()>;

    /// Send a local candidate. `to` is `None` when talking to the master.
    async fn send_ice_candidate(&self, candidate: &IceCandidate, to: Option<&AttendeeId>) -> Result<()>;
}
