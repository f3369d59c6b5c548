// Shared mocks for session integration tests
//
// In-memory stand-ins for the vendor seams. Every mock records what it was
// asked to do so tests can assert on call order.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use confab_session_core::errors::{Result, SessionError};
use confab_session_core::media::{LocalStream, MediaConstraints, MediaDevices, MediaTrack, TrackKind};
use confab_session_core::messaging::{ChatMessage, MessageTransport};
use confab_session_core::roster::AttendeeRecord;
use confab_session_core::session::{MeetingSession, SessionCollaborators};
use confab_session_core::signaling::{
    ConnectionStats, IceCandidate, PeerConnection, PeerConnectionFactory, RtcConfiguration, SessionDescription,
    SignalingChannel,
};
use confab_session_core::tiles::{TileBinding, VideoTileState};
use confab_session_core::types::{AttendeeId, SessionRole, TileId};
use confab_session_core::{SessionConfig, SessionObserver};

pub const CHANNEL_ARN: &str = "arn:aws:kinesisvideo:us-west-2:123456789012:channel/demo/1";
pub const VALID_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\n";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

/// Shared, ordered record of calls across all mocks of one test
#[derive(Debug, Default, Clone)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.entries().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

pub struct MockPeerConnection {
    pub remote: AttendeeId,
    log: CallLog,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    reject_candidates: AtomicBool,
    tracks: Mutex<Vec<String>>,
    candidates: Mutex<Vec<IceCandidate>>,
}

impl MockPeerConnection {
    pub fn new(remote: AttendeeId, log: CallLog) -> Self {
        Self {
            remote,
            log,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            reject_candidates: AtomicBool::new(false),
            tracks: Mutex::new(Vec::new()),
            candidates: Mutex::new(Vec::new()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Make every later `add_ice_candidate` call fail
    pub fn reject_candidates(&self) {
        self.reject_candidates.store(true, Ordering::SeqCst);
    }

    pub fn tracks(&self) -> Vec<String> {
        self.tracks.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().unwrap().clone()
    }
}

#[async_trait]
impl PeerConnection for MockPeerConnection {
    async fn add_track(&self, track: &MediaTrack, _stream: &LocalStream) -> Result<()> {
        self.tracks.lock().unwrap().push(track.id.clone());
        self.log.push(format!("add_track:{}", self.remote));
        Ok(())
    }

    async fn set_remote_description(&self, _description: SessionDescription) -> Result<()> {
        self.log.push(format!("set_remote:{}", self.remote));
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::answer(VALID_SDP))
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        Ok(SessionDescription::offer(VALID_SDP))
    }

    async fn set_local_description(&self, _description: SessionDescription) -> Result<()> {
        self.log.push(format!("set_local:{}", self.remote));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(SessionError::internal("OperationError: candidate rejected"));
        }
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        self.log.push(format!("data_channel:{}:{}", self.remote, label));
        Ok(())
    }

    async fn stats(&self) -> Result<ConnectionStats> {
        Ok(ConnectionStats::default())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("close:{}", self.remote));
    }
}

#[derive(Default)]
pub struct MockFactory {
    pub log: CallLog,
    created: Mutex<Vec<Arc<MockPeerConnection>>>,
}

impl MockFactory {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created(&self) -> Vec<Arc<MockPeerConnection>> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_for(&self, attendee: &str) -> Vec<Arc<MockPeerConnection>> {
        self.created()
            .into_iter()
            .filter(|c| c.remote.as_str() == attendee)
            .collect()
    }
}

#[async_trait]
impl PeerConnectionFactory for MockFactory {
    async fn create(&self, _config: &RtcConfiguration, remote: &AttendeeId) -> Result<Arc<dyn PeerConnection>> {
        self.log.push(format!("create:{}", remote));
        let connection = Arc::new(MockPeerConnection::new(remote.clone(), self.log.clone()));
        self.created.lock().unwrap().push(Arc::clone(&connection));
        Ok(connection)
    }
}

#[derive(Default)]
pub struct MockSignaling {
    pub log: CallLog,
    pub fail_open: bool,
    answers: Mutex<Vec<(AttendeeId, SessionDescription)>>,
    offers: Mutex<Vec<SessionDescription>>,
    candidates: Mutex<Vec<(Option<AttendeeId>, IceCandidate)>>,
    closed: AtomicBool,
}

impl MockSignaling {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn failing(log: CallLog) -> Self {
        Self {
            log,
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn answers(&self) -> Vec<(AttendeeId, SessionDescription)> {
        self.answers.lock().unwrap().clone()
    }

    pub fn offers(&self) -> Vec<SessionDescription> {
        self.offers.lock().unwrap().clone()
    }

    pub fn candidates(&self) -> Vec<(Option<AttendeeId>, IceCandidate)> {
        self.candidates.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalingChannel for MockSignaling {
    async fn open(&self) -> Result<()> {
        self.log.push("signaling_open");
        if self.fail_open {
            return Err(SessionError::transport("connection refused"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.log.push("signaling_close");
    }

    async fn send_sdp_offer(&self, offer: &SessionDescription) -> Result<()> {
        self.log.push("send_offer");
        self.offers.lock().unwrap().push(offer.clone());
        Ok(())
    }

    async fn send_sdp_answer(&self, answer: &SessionDescription, to: &AttendeeId) -> Result<()> {
        self.log.push(format!("send_answer:{}", to));
        self.answers.lock().unwrap().push((to.clone(), answer.clone()));
        Ok(())
    }

    async fn send_ice_candidate(&self, candidate: &IceCandidate, to: Option<&AttendeeId>) -> Result<()> {
        self.candidates.lock().unwrap().push((to.cloned(), candidate.clone()));
        Ok(())
    }
}

/// Devices that provide a camera and microphone, or fail outright
pub struct MockDevices {
    pub available: bool,
}

#[async_trait]
impl MediaDevices for MockDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<LocalStream> {
        if !self.available {
            return Err(SessionError::device("NotAllowedError: permission denied"));
        }
        let mut tracks = Vec::new();
        if constraints.video.is_some() {
            tracks.push(MediaTrack {
                id: "camera".into(),
                kind: TrackKind::Video,
            });
        }
        if constraints.audio {
            tracks.push(MediaTrack {
                id: "microphone".into(),
                kind: TrackKind::Audio,
            });
        }
        Ok(LocalStream {
            id: "local".into(),
            tracks,
        })
    }
}

pub struct MockTransport {
    pub log: CallLog,
    sent: Mutex<Vec<(String, Bytes)>>,
}

impl MockTransport {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, Bytes)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send(&self, topic: &str, data: Bytes) -> Result<()> {
        self.log.push("transport_send");
        self.sent.lock().unwrap().push((topic.to_string(), data));
        Ok(())
    }
}

/// Observer that writes every callback into the call log
#[derive(Default)]
pub struct RecordingObserver {
    pub log: CallLog,
    pub messages: Mutex<Vec<ChatMessage>>,
    pub errors: Mutex<Vec<(String, bool)>>,
    pub rosters: Mutex<Vec<Vec<AttendeeRecord>>>,
    pub tiles: Mutex<Vec<TileBinding>>,
    pub device_errors: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn errors(&self) -> Vec<(String, bool)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn last_roster(&self) -> Option<Vec<AttendeeRecord>> {
        self.rosters.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SessionObserver for RecordingObserver {
    async fn on_started(&self) {
        self.log.push("on_started");
    }

    async fn on_stopped(&self, reason: &str) {
        self.log.push(format!("on_stopped:{}", reason));
    }

    async fn on_attendee_joined(&self, attendee_id: &AttendeeId, _external_user_id: Option<&str>) {
        self.log.push(format!("on_attendee_joined:{}", attendee_id));
    }

    async fn on_attendee_left(&self, attendee_id: &AttendeeId) {
        self.log.push(format!("on_attendee_left:{}", attendee_id));
    }

    async fn on_roster_changed(&self, roster: &[AttendeeRecord]) {
        self.log.push("on_roster_changed");
        self.rosters.lock().unwrap().push(roster.to_vec());
    }

    async fn on_video_tile_updated(&self, binding: &TileBinding) {
        self.log.push(format!("on_video_tile_updated:{}", binding.tile.tile_id));
        self.tiles.lock().unwrap().push(binding.clone());
    }

    async fn on_local_video_tile(&self, tile: &VideoTileState) {
        self.log.push(format!("on_local_video_tile:{}", tile.tile_id));
    }

    async fn on_video_tile_removed(&self, tile_id: TileId, _slot: Option<usize>) {
        self.log.push(format!("on_video_tile_removed:{}", tile_id));
    }

    async fn on_screen_share_started(&self, attendee_id: Option<&AttendeeId>) {
        match attendee_id {
            Some(id) => self.log.push(format!("on_screen_share_started:{}", id)),
            None => self.log.push("on_screen_share_started"),
        }
    }

    async fn on_screen_share_stopped(&self, attendee_id: Option<&AttendeeId>) {
        match attendee_id {
            Some(id) => self.log.push(format!("on_screen_share_stopped:{}", id)),
            None => self.log.push("on_screen_share_stopped"),
        }
    }

    async fn on_message(&self, message: &ChatMessage) {
        self.log.push(format!("on_message:{}", message.text));
        self.messages.lock().unwrap().push(message.clone());
    }

    async fn on_remote_stream(&self, peer: &AttendeeId, stream_id: &str) {
        self.log.push(format!("on_remote_stream:{}:{}", peer, stream_id));
    }

    async fn on_local_stream(&self, stream: Option<&LocalStream>) {
        self.log.push(format!("on_local_stream:{}", stream.is_some()));
    }

    async fn on_device_error(&self, message: &str) {
        self.log.push("on_device_error");
        self.device_errors.lock().unwrap().push(message.to_string());
    }

    async fn on_error(&self, error: &SessionError) {
        self.log.push("on_error");
        self.errors
            .lock()
            .unwrap()
            .push((error.to_string(), error.is_recoverable()));
    }
}

/// A session wired to fresh mocks
pub struct Harness {
    pub log: CallLog,
    pub factory: Arc<MockFactory>,
    pub signaling: Arc<MockSignaling>,
    pub transport: Arc<MockTransport>,
    pub observer: Arc<RecordingObserver>,
    pub session: MeetingSession,
}

impl Harness {
    pub fn new(role: SessionRole) -> Self {
        Self::with_config(SessionConfig::new(CHANNEL_ARN, "us-west-2").with_role(role), true)
    }

    pub fn with_config(config: SessionConfig, devices_available: bool) -> Self {
        init_tracing();
        let log = CallLog::default();
        let factory = Arc::new(MockFactory::new(log.clone()));
        let signaling = Arc::new(MockSignaling::new(log.clone()));
        let transport = Arc::new(MockTransport::new(log.clone()));
        let observer = Arc::new(RecordingObserver::new(log.clone()));

        let collaborators = SessionCollaborators::new(factory.clone(), signaling.clone())
            .with_media_devices(Arc::new(MockDevices {
                available: devices_available,
            }))
            .with_message_transport(transport.clone());
        let session = MeetingSession::new(config, collaborators, observer.clone()).unwrap();

        Self {
            log,
            factory,
            signaling,
            transport,
            observer,
            session,
        }
    }
}

pub fn remote_tile(id: u32, attendee: &str) -> VideoTileState {
    VideoTileState {
        tile_id: TileId(id),
        attendee_id: Some(AttendeeId::new(attendee)),
        local_tile: false,
        is_content: false,
        paused: false,
    }
}
