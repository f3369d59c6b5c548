//! Meeting descriptors
//!
//! Shapes exchanged with the backend join/end endpoint and the meeting
//! service. The endpoint itself is external; this module only builds its
//! requests and parses what it returns into the inputs a session needs.

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::errors::{Result, SessionError};
use crate::types::AttendeeId;

/// Media service URLs assigned to a meeting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaPlacement {
    pub audio_host_url: Option<String>,
    pub audio_fallback_url: Option<String>,
    pub screen_data_url: Option<String>,
    pub screen_sharing_url: Option<String>,
    pub screen_viewing_url: Option<String>,
    pub signaling_url: Option<String>,
    pub turn_control_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MeetingInfo {
    pub meeting_id: String,
    pub external_meeting_id: Option<String>,
    pub media_region: Option<String>,
    #[serde(default)]
    pub media_placement: MediaPlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttendeeInfo {
    pub attendee_id: AttendeeId,
    pub external_user_id: Option<String>,
    pub join_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MeetingEnvelope {
    meeting: MeetingInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttendeeEnvelope {
    attendee: AttendeeInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JoinInfo {
    meeting: MeetingEnvelope,
    attendee: AttendeeEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JoinEnvelope {
    info: JoinInfo,
}

/// Everything needed to construct a meeting session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingSessionConfiguration {
    pub meeting: MeetingInfo,
    pub attendee: AttendeeInfo,
    /// Identifier of the element that plays mixed meeting audio
    pub audio_output_element_id: Option<String>,
}

impl MeetingSessionConfiguration {
    /// Build from the separate meeting and attendee documents
    pub fn from_json(meeting_json: &str, attendee_json: &str, audio_output_element_id: Option<String>) -> Result<Self> {
        let meeting: MeetingEnvelope = serde_json::from_str(meeting_json)?;
        let attendee: AttendeeEnvelope = serde_json::from_str(attendee_json)?;
        Self::new(meeting.meeting, attendee.attendee, audio_output_element_id)
    }

    /// Build from a join endpoint response body
    pub fn from_join_response(body: &str, audio_output_element_id: Option<String>) -> Result<Self> {
        let envelope: JoinEnvelope = serde_json::from_str(body)?;
        Self::new(
            envelope.info.meeting.meeting,
            envelope.info.attendee.attendee,
            audio_output_element_id,
        )
    }

    fn new(meeting: MeetingInfo, attendee: AttendeeInfo, audio_output_element_id: Option<String>) -> Result<Self> {
        if meeting.meeting_id.trim().is_empty() {
            return Err(SessionError::config("meeting descriptor has an empty MeetingId"));
        }
        if attendee.attendee_id.as_str().trim().is_empty() {
            return Err(SessionError::config("attendee descriptor has an empty AttendeeId"));
        }
        if attendee.join_token.is_empty() {
            return Err(SessionError::config("attendee descriptor has an empty JoinToken"));
        }
        Ok(Self {
            meeting,
            attendee,
            audio_output_element_id,
        })
    }
}

/// Query of the backend join call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Existing meeting to join; a new meeting is created when absent
    pub meeting_id: Option<String>,
    pub client_id: String,
}

impl JoinRequest {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            meeting_id: None,
            client_id: client_id.into(),
        }
    }

    pub fn with_meeting_id(mut self, meeting_id: impl Into<String>) -> Self {
        self.meeting_id = Some(meeting_id.into());
        self
    }

    /// Render as a URL query string
    pub fn to_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(meeting_id) = &self.meeting_id {
            query.append_pair("meetingId", meeting_id);
        }
        query.append_pair("clientId", &self.client_id);
        query.finish()
    }
}

/// Body of the backend end call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndRequest {
    pub meeting_id: String,
}

impl EndRequest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Random upper-case base-36 client identifier
pub fn random_client_id() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::thread_rng();
    (0..11)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// External user id registered with the meeting service: `<8 hex>#<client id>`
pub fn external_user_id(client_id: &str) -> String {
    let prefix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}#{}", &prefix[..8], client_id)
}

/// Client id embedded in an external user id built by [`external_user_id`]
pub fn client_id_of(external_user_id: &str) -> Option<&str> {
    external_user_id.split_once('#').map(|(_, client)| client)
}
