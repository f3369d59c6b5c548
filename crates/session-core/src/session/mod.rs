//! Meeting Session
//!
//! [`MeetingSession`] owns the roster, the peer connection registry and the
//! video tile table of one meeting, and is the only writer of all three.
//! Vendor SDK glue feeds it [`VendorEvent`]s through
//! [`MeetingSession::handle_event`]; the application observes it through a
//! [`SessionObserver`] and/or the broadcast stream from
//! [`MeetingSession::subscribe`].
//!
//! Vendor events are applied one at a time, in the order they are handed in,
//! even when the caller delivers them from several tasks. Observer callbacks
//! run after the session state lock is released, so they may call
//! [`MeetingSession::send_message`] or [`MeetingSession::stop`], but must not
//! call `handle_event` on the same session.

mod adapter;
mod negotiation;
mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::errors::{Result, SessionError};
use crate::events::{SessionEvent, SessionObserver, VendorEvent};
use crate::media::{acquire_local_media, LocalStream, MediaDevices};
use crate::messaging::{encode_text, ChatMessage, MessageTransport};
use crate::peers::{PeerConnectionRegistry, PeerConnectionState};
use crate::roster::{AttendeeRecord, PresenceLogEntry, RosterTracker};
use crate::signaling::{PeerConnectionFactory, RtcConfiguration, SignalingChannel};
use crate::tiles::{TileBinding, VideoTileState, VideoTileTable};
use crate::types::{AttendeeId, SessionId, SessionRole, TileId};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    /// `start` was called; waiting for the signaling channel or meeting service
    Starting,
    Started,
    Stopped,
}

/// Vendor objects a session drives
#[derive(Clone)]
pub struct SessionCollaborators {
    pub peer_factory: Arc<dyn PeerConnectionFactory>,
    pub signaling: Arc<dyn SignalingChannel>,
    pub media_devices: Option<Arc<dyn MediaDevices>>,
    pub message_transport: Option<Arc<dyn MessageTransport>>,
}

impl SessionCollaborators {
    pub fn new(peer_factory: Arc<dyn PeerConnectionFactory>, signaling: Arc<dyn SignalingChannel>) -> Self {
        Self {
            peer_factory,
            signaling,
            media_devices: None,
            message_transport: None,
        }
    }

    pub fn with_media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.media_devices = Some(devices);
        self
    }

    pub fn with_message_transport(mut self, transport: Arc<dyn MessageTransport>) -> Self {
        self.message_transport = Some(transport);
        self
    }
}

/// State guarded by the session lock
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) status: SessionStatus,
    pub(crate) roster: RosterTracker,
    pub(crate) peers: PeerConnectionRegistry,
    pub(crate) tiles: VideoTileTable,
    pub(crate) local_tile: Option<VideoTileState>,
    pub(crate) local_stream: Option<LocalStream>,
    /// First remote stream bound as the remote view
    pub(crate) remote_view: Option<(AttendeeId, String)>,
    pub(crate) sharing_content: bool,
}

/// Something to tell the application once the state lock is released
#[derive(Debug)]
pub(crate) enum Notice {
    Event(SessionEvent),
    Error(SessionError),
}

/// Queue `error` for the observer and hand an equivalent one back to the caller
pub(crate) fn report(notices: &mut Vec<Notice>, error: SessionError) -> SessionError {
    let returned = match &error {
        SessionError::Negotiation { attendee_id, reason } => SessionError::negotiation(attendee_id.clone(), reason.clone()),
        SessionError::ResourceExhausted { resource, limit } => SessionError::resource_exhausted(*resource, *limit),
        SessionError::Device { message } => SessionError::device(message.clone()),
        SessionError::Transport { message } => SessionError::transport(message.clone()),
        SessionError::Configuration { message } => SessionError::config(message.clone()),
        SessionError::AttendeeNotFound { attendee_id } => SessionError::attendee_not_found(attendee_id.clone()),
        SessionError::InvalidState { message } => SessionError::invalid_state(message.clone()),
        SessionError::SessionClosed => SessionError::SessionClosed,
        SessionError::Serialization(e) => SessionError::internal(e.to_string()),
        SessionError::Internal { message } => SessionError::internal(message.clone()),
    };
    notices.push(Notice::Error(error));
    returned
}

/// One meeting session
pub struct MeetingSession {
    id: SessionId,
    config: SessionConfig,
    rtc_config: RtcConfiguration,
    local_attendee: Option<AttendeeId>,
    collaborators: SessionCollaborators,
    observer: Arc<dyn SessionObserver>,
    state: Arc<Mutex<SessionState>>,
    /// Serializes vendor event handling
    dispatch: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
    stats_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl MeetingSession {
    /// Create a session.
    ///
    /// The configuration is validated before any vendor object is used; a
    /// missing channel ARN fails here with [`SessionError::Configuration`].
    pub fn new(
        config: SessionConfig,
        collaborators: SessionCollaborators,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<Self> {
        config.validate()?;

        let (events, _) = broadcast::channel(config.event_channel_capacity);
        let state = SessionState {
            status: SessionStatus::Created,
            roster: RosterTracker::with_presence_log_capacity(config.presence_log_capacity),
            peers: PeerConnectionRegistry::new(),
            tiles: VideoTileTable::with_capacity(config.max_video_tiles),
            local_tile: None,
            local_stream: None,
            remote_view: None,
            sharing_content: false,
        };

        let id = SessionId::new();
        debug!(session_id = %id, role = %config.role, channel = %config.channel_arn, "Created meeting session");

        Ok(Self {
            id,
            rtc_config: config.rtc_configuration(),
            config,
            local_attendee: None,
            collaborators,
            observer,
            state: Arc::new(Mutex::new(state)),
            dispatch: Mutex::new(()),
            events,
            stats_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Set the attendee id this session joined as
    pub fn with_local_attendee(mut self, attendee_id: AttendeeId) -> Self {
        self.local_attendee = Some(attendee_id);
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn role(&self) -> SessionRole {
        self.config.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn local_attendee(&self) -> Option<&AttendeeId> {
        self.local_attendee.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    /// Subscribe to every application-facing notification
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start the session: capture local media (master role) and open signaling.
    ///
    /// A signaling failure is a transport error and is returned to the caller.
    pub async fn start(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        let dispatch = self.dispatch.lock().await;
        let mut notices = Vec::new();
        {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Created {
                return Err(SessionError::invalid_state(format!(
                    "session {} already started",
                    self.id
                )));
            }
            state.status = SessionStatus::Starting;

            self.capture_local_media(&mut state, &mut notices).await;
        }
        self.deliver(notices).await;
        drop(dispatch);

        info!(session_id = %self.id, role = %self.config.role, "[{}] Starting connection", self.config.role);
        if let Err(e) = self.collaborators.signaling.open().await {
            let error = match e {
                SessionError::Transport { .. } => e,
                other => SessionError::transport(other.to_string()),
            };
            warn!(session_id = %self.id, "Could not open signaling channel: {}", error);
            let mut notices = Vec::new();
            let error = report(&mut notices, error);
            self.deliver(notices).await;
            return Err(error);
        }
        Ok(())
    }

    /// Apply one vendor event.
    ///
    /// Events arriving after [`stop`](Self::stop) are ignored. Recoverable
    /// failures (negotiation, tile exhaustion) are reported to the observer
    /// and also returned.
    pub async fn handle_event(&self, event: VendorEvent) -> Result<()> {
        if self.is_closed() {
            debug!(session_id = %self.id, event = event.name(), "Session closed, dropping event");
            return Ok(());
        }
        let _dispatch = self.dispatch.lock().await;
        if self.is_closed() {
            return Ok(());
        }

        let mut notices = Vec::new();
        let result = {
            let mut state = self.state.lock().await;
            self.route(&mut state, event, &mut notices).await
        };
        self.deliver(notices).await;
        result
    }

    /// Send a text message.
    ///
    /// The local message callback fires immediately with the sender and the
    /// current time, before the transport is asked to deliver anything.
    pub async fn send_message(&self, text: &str, sender_id: &str) -> Result<ChatMessage> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        let message = ChatMessage::new(sender_id, text);
        self.deliver(vec![Notice::Event(SessionEvent::Message {
            message: message.clone(),
        })])
        .await;

        let transport = self
            .collaborators
            .message_transport
            .as_ref()
            .ok_or_else(|| SessionError::invalid_state("no message transport configured"))?;
        transport.send(&self.config.chat_topic, encode_text(text)).await?;
        Ok(message)
    }

    /// Stop the session and close every connection. Idempotent.
    pub async fn stop(&self, reason: &str) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let notices = {
            let mut state = self.state.lock().await;
            self.teardown(&mut state, reason).await
        };
        self.deliver(notices).await;
        Ok(())
    }

    /// Full roster snapshot in first-seen order
    pub async fn roster(&self) -> Vec<AttendeeRecord> {
        self.state.lock().await.roster.snapshot()
    }

    pub async fn attendee(&self, attendee_id: &AttendeeId) -> Option<AttendeeRecord> {
        self.state.lock().await.roster.get(attendee_id).cloned()
    }

    pub async fn presence_log(&self) -> Vec<PresenceLogEntry> {
        self.state.lock().await.roster.presence_log()
    }

    pub async fn peer_state(&self, attendee_id: &AttendeeId) -> Option<PeerConnectionState> {
        self.state.lock().await.peers.state(attendee_id)
    }

    pub async fn peer_count(&self) -> usize {
        self.state.lock().await.peers.len()
    }

    pub async fn tile_bindings(&self) -> Vec<TileBinding> {
        self.state.lock().await.tiles.bindings()
    }

    pub async fn local_stream(&self) -> Option<LocalStream> {
        self.state.lock().await.local_stream.clone()
    }

    pub async fn remote_view(&self) -> Option<(AttendeeId, String)> {
        self.state.lock().await.remote_view.clone()
    }

    /// Whether the local attendee is sharing content
    pub async fn is_sharing_content(&self) -> bool {
        self.state.lock().await.sharing_content
    }

    /// Release a remote tile's slot at the application's request
    pub async fn release_video_tile(&self, tile_id: TileId) -> Option<TileBinding> {
        let released = self.state.lock().await.tiles.release(tile_id);
        if let Some(binding) = &released {
            self.deliver(vec![Notice::Event(SessionEvent::VideoTileRemoved {
                tile_id,
                slot: Some(binding.slot),
            })])
            .await;
        }
        released
    }

    async fn capture_local_media(&self, state: &mut SessionState, notices: &mut Vec<Notice>) {
        let Some(devices) = self.collaborators.media_devices.as_ref() else {
            return;
        };
        let acquisition = acquire_local_media(devices.as_ref(), self.config.media_constraints()).await;
        for message in &acquisition.errors {
            notices.push(Notice::Event(SessionEvent::DeviceError {
                message: message.clone(),
            }));
        }
        state.local_stream = acquisition.stream.clone();
        notices.push(Notice::Event(SessionEvent::LocalStream {
            stream: acquisition.stream,
        }));
    }

    async fn teardown(&self, state: &mut SessionState, reason: &str) -> Vec<Notice> {
        info!(session_id = %self.id, reason, "Stopping meeting session");
        if let Some(task) = self.stats_task.lock().await.take() {
            task.abort();
        }
        state.peers.close_all().await;
        state.tiles.clear();
        state.local_tile = None;
        state.remote_view = None;
        state.sharing_content = false;
        state.roster.mark_all_absent();
        state.status = SessionStatus::Stopped;
        self.collaborators.signaling.close().await;

        vec![Notice::Event(SessionEvent::Stopped {
            reason: reason.to_string(),
        })]
    }

    /// Hand notices to the observer and the broadcast channel, in order
    pub(crate) async fn deliver(&self, notices: Vec<Notice>) {
        for notice in notices {
            let event = match notice {
                Notice::Error(error) => {
                    self.observer.on_error(&error).await;
                    SessionEvent::Error {
                        message: error.to_string(),
                        recoverable: error.is_recoverable(),
                    }
                }
                Notice::Event(event) => {
                    self.notify_observer(&event).await;
                    event
                }
            };
            // No receivers is fine
            let _ = self.events.send(event);
        }
    }

    async fn notify_observer(&self, event: &SessionEvent) {
        let observer = &self.observer;
        match event {
            SessionEvent::Started => observer.on_started().await,
            SessionEvent::Stopped { reason } => observer.on_stopped(reason).await,
            SessionEvent::Reconnecting => observer.on_reconnecting().await,
            SessionEvent::AttendeeJoined {
                attendee_id,
                external_user_id,
            } => {
                observer
                    .on_attendee_joined(attendee_id, external_user_id.as_deref())
                    .await
            }
            SessionEvent::AttendeeLeft { attendee_id } => observer.on_attendee_left(attendee_id).await,
            SessionEvent::RosterChanged { roster } => observer.on_roster_changed(roster).await,
            SessionEvent::VideoTileUpdated { binding } => observer.on_video_tile_updated(binding).await,
            SessionEvent::VideoTileRemoved { tile_id, slot } => observer.on_video_tile_removed(*tile_id, *slot).await,
            SessionEvent::ScreenShareStarted { attendee_id } => {
                observer.on_screen_share_started(attendee_id.as_ref()).await
            }
            SessionEvent::ScreenShareStopped { attendee_id } => {
                observer.on_screen_share_stopped(attendee_id.as_ref()).await
            }
            SessionEvent::ConnectionQuality { quality } => observer.on_connection_quality(*quality).await,
            SessionEvent::Message { message } => observer.on_message(message).await,
            SessionEvent::RemoteStream { peer, stream_id } => observer.on_remote_stream(peer, stream_id).await,
            SessionEvent::LocalStream { stream } => observer.on_local_stream(stream.as_ref()).await,
            SessionEvent::LocalVideoTile { tile } => observer.on_local_video_tile(tile).await,
            SessionEvent::DeviceError { message } => observer.on_device_error(message).await,
            SessionEvent::ConnectionStats { .. } | SessionEvent::Error { .. } => {}
        }
    }
}

impl std::fmt::Debug for MeetingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingSession")
            .field("id", &self.id)
            .field("role", &self.config.role)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for MeetingSession {
    fn drop(&mut self) {
        if let Ok(mut task) = self.stats_task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}
