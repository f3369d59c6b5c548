//! Vendor event routing
//!
//! Turns each [`VendorEvent`] into state changes plus the notices the
//! application should see. Runs with the session state lock held; notices
//! are delivered by the caller once the lock is released.

use std::sync::atomic::Ordering;

use tracing::{debug, info, trace, warn};

use super::{report, MeetingSession, Notice, SessionState, SessionStatus};
use crate::errors::{Result, SessionError};
use crate::events::{SessionEvent, VendorEvent};
use crate::media::MediaTrack;
use crate::messaging::DataMessage;
use crate::peers::PeerConnectionState;
use crate::roster::RosterNotification;
use crate::signaling::IceCandidate;
use crate::tiles::VideoTileState;
use crate::types::{AttendeeId, SessionRole, TileId};

impl MeetingSession {
    pub(super) async fn route(
        &self,
        state: &mut SessionState,
        event: VendorEvent,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        trace!(session_id = %self.id, event = event.name(), "Handling vendor event");

        match event {
            VendorEvent::SignalingOpen => self.on_signaling_open(state, notices).await,
            VendorEvent::SignalingClosed => {
                warn!(session_id = %self.id, "[{}] Signaling channel closed", self.config.role);
                report(notices, SessionError::transport("signaling channel closed"));
                Ok(())
            }
            VendorEvent::SignalingError { message } => {
                warn!(session_id = %self.id, "[{}] Signaling channel error: {}", self.config.role, message);
                report(notices, SessionError::transport(message));
                Ok(())
            }
            VendorEvent::SessionStarted => {
                info!(session_id = %self.id, "Meeting session started");
                state.status = SessionStatus::Started;
                notices.push(Notice::Event(SessionEvent::Started));
                Ok(())
            }
            VendorEvent::SessionStopped { reason } => {
                self.closed.store(true, Ordering::SeqCst);
                let stopped = self.teardown(state, &reason).await;
                notices.extend(stopped);
                Ok(())
            }
            VendorEvent::Reconnecting => {
                info!(session_id = %self.id, "Meeting session reconnecting");
                notices.push(Notice::Event(SessionEvent::Reconnecting));
                Ok(())
            }
            VendorEvent::SdpOffer { from, offer } => {
                if self.config.role != SessionRole::Master {
                    debug!(attendee_id = %from, "Viewer ignores SDP offer");
                    return Ok(());
                }
                self.answer_offer(state, from, offer, notices).await
            }
            VendorEvent::SdpAnswer { answer } => {
                if self.config.role != SessionRole::Viewer {
                    debug!("Master ignores SDP answer");
                    return Ok(());
                }
                self.apply_answer(state, answer, notices).await
            }
            VendorEvent::RemoteIceCandidate { from, candidate } => {
                self.on_remote_candidate(state, from, candidate, notices).await
            }
            VendorEvent::LocalIceCandidate { peer, candidate } => {
                self.on_local_candidate(state, peer, candidate, notices).await
            }
            VendorEvent::PeerConnected { peer } => {
                match state.peers.transition(&peer, PeerConnectionState::Connected) {
                    Ok(true) => info!(attendee_id = %peer, "[{}] Connection established", self.config.role),
                    Ok(false) => debug!(attendee_id = %peer, "Connected event for unknown or closed connection dropped"),
                    Err(e) => debug!(attendee_id = %peer, "Out of order connected event dropped: {}", e),
                }
                Ok(())
            }
            VendorEvent::PeerDisconnected { peer, reason } => {
                if state.peers.unregister(&peer).await {
                    info!(attendee_id = %peer, reason = %reason, "Peer connection closed");
                    if state.remote_view.as_ref().is_some_and(|(owner, _)| *owner == peer) {
                        state.remote_view = None;
                    }
                } else {
                    debug!(attendee_id = %peer, "Disconnect for unknown connection dropped");
                }
                Ok(())
            }
            VendorEvent::RemoteTrack { peer, stream_id, track } => {
                self.on_remote_track(state, peer, stream_id, track, notices);
                Ok(())
            }
            VendorEvent::PresenceChanged {
                attendee_id,
                present,
                external_user_id,
            } => {
                let changes = state.roster.on_presence_changed(&attendee_id, present, external_user_id);
                roster_notices(state, changes, notices);
                Ok(())
            }
            VendorEvent::VolumeIndicator { attendee_id, update } => {
                let changes = state.roster.on_volume_indicator(&attendee_id, update);
                roster_notices(state, changes, notices);
                Ok(())
            }
            VendorEvent::VideoTileUpdated { tile } => self.on_tile_updated(state, tile, notices),
            VendorEvent::VideoTileRemoved { tile_id } => {
                on_tile_removed(state, tile_id, notices);
                Ok(())
            }
            VendorEvent::ContentShareStarted => {
                state.sharing_content = true;
                notices.push(Notice::Event(SessionEvent::ScreenShareStarted { attendee_id: None }));
                Ok(())
            }
            VendorEvent::ContentShareStopped => {
                state.sharing_content = false;
                notices.push(Notice::Event(SessionEvent::ScreenShareStopped { attendee_id: None }));
                Ok(())
            }
            VendorEvent::ConnectionQuality { quality } => {
                debug!(session_id = %self.id, ?quality, "Connection quality alert");
                notices.push(Notice::Event(SessionEvent::ConnectionQuality { quality }));
                Ok(())
            }
            VendorEvent::DataMessage { message } => {
                self.on_data_message(message, notices);
                Ok(())
            }
        }
    }

    async fn on_signaling_open(&self, state: &mut SessionState, notices: &mut Vec<Notice>) -> Result<()> {
        info!(session_id = %self.id, "[{}] Connected to signaling service", self.config.role);
        if state.status == SessionStatus::Starting || state.status == SessionStatus::Created {
            state.status = SessionStatus::Started;
        }
        match self.config.role {
            SessionRole::Master => Ok(()),
            SessionRole::Viewer => self.start_offer(state, notices).await,
        }
    }

    async fn on_remote_candidate(
        &self,
        state: &mut SessionState,
        from: Option<AttendeeId>,
        candidate: IceCandidate,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        let peer = from.unwrap_or_else(AttendeeId::master);
        let (Some(connection), Some(generation)) = (state.peers.get(&peer), state.peers.generation(&peer)) else {
            debug!(attendee_id = %peer, "ICE candidate for unknown or closed connection dropped");
            return Ok(());
        };

        trace!(attendee_id = %peer, candidate = %candidate.candidate, "Received ICE candidate");
        if let Err(e) = connection.add_ice_candidate(candidate).await {
            return Err(self.negotiation_failed(state, &peer, Some(generation), e, notices).await);
        }
        Ok(())
    }

    async fn on_local_candidate(
        &self,
        state: &mut SessionState,
        peer: AttendeeId,
        candidate: Option<IceCandidate>,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        let Some(candidate) = candidate else {
            debug!(attendee_id = %peer, "All ICE candidates have been generated");
            return Ok(());
        };
        if state.peers.get(&peer).is_none() {
            debug!(attendee_id = %peer, "Local ICE candidate for closed connection dropped");
            return Ok(());
        }

        let to = match self.config.role {
            SessionRole::Master => Some(&peer),
            SessionRole::Viewer => None,
        };
        trace!(attendee_id = %peer, "Sending ICE candidate");
        if let Err(e) = self.collaborators.signaling.send_ice_candidate(&candidate, to).await {
            warn!(attendee_id = %peer, "Could not send ICE candidate: {}", e);
            return Err(report(notices, e));
        }
        Ok(())
    }

    fn on_remote_track(
        &self,
        state: &mut SessionState,
        peer: AttendeeId,
        stream_id: String,
        track: MediaTrack,
        notices: &mut Vec<Notice>,
    ) {
        if state.peers.get(&peer).is_none() {
            debug!(attendee_id = %peer, "Remote track for closed connection dropped");
            return;
        }
        if state.remote_view.is_some() {
            trace!(attendee_id = %peer, track_id = %track.id, "Remote view already bound");
            return;
        }
        debug!(attendee_id = %peer, stream_id = %stream_id, "[{}] Received remote track", self.config.role);
        state.remote_view = Some((peer.clone(), stream_id.clone()));
        notices.push(Notice::Event(SessionEvent::RemoteStream { peer, stream_id }));
    }

    fn on_tile_updated(&self, state: &mut SessionState, tile: VideoTileState, notices: &mut Vec<Notice>) -> Result<()> {
        if tile.local_tile {
            state.local_tile = Some(tile.clone());
            notices.push(Notice::Event(SessionEvent::LocalVideoTile { tile }));
            return Ok(());
        }

        match state.tiles.bind(tile) {
            Ok(binding) => {
                notices.push(Notice::Event(SessionEvent::VideoTileUpdated { binding }));
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.id, "Could not bind video tile: {}", e);
                Err(report(notices, e))
            }
        }
    }

    fn on_data_message(&self, message: DataMessage, notices: &mut Vec<Notice>) {
        if message.topic != self.config.chat_topic {
            trace!(topic = %message.topic, "Data message on other topic ignored");
            return;
        }
        let message = message.decode();
        notices.push(Notice::Event(SessionEvent::Message { message }));
    }
}

fn on_tile_removed(state: &mut SessionState, tile_id: TileId, notices: &mut Vec<Notice>) {
    if state.local_tile.as_ref().is_some_and(|t| t.tile_id == tile_id) {
        state.local_tile = None;
        notices.push(Notice::Event(SessionEvent::VideoTileRemoved { tile_id, slot: None }));
        return;
    }
    match state.tiles.release(tile_id) {
        Some(binding) => notices.push(Notice::Event(SessionEvent::VideoTileRemoved {
            tile_id,
            slot: Some(binding.slot),
        })),
        None => debug!(tile_id = %tile_id, "Removal of unknown video tile ignored"),
    }
}

fn roster_notices(state: &SessionState, changes: Vec<RosterNotification>, notices: &mut Vec<Notice>) {
    for change in changes {
        let event = match change {
            RosterNotification::RosterChanged => SessionEvent::RosterChanged {
                roster: state.roster.snapshot(),
            },
            RosterNotification::AttendeeJoined {
                attendee_id,
                external_user_id,
            } => SessionEvent::AttendeeJoined {
                attendee_id,
                external_user_id,
            },
            RosterNotification::AttendeeLeft { attendee_id } => SessionEvent::AttendeeLeft { attendee_id },
            RosterNotification::ContentShareChanged { attendee_id, active: true } => {
                SessionEvent::ScreenShareStarted {
                    attendee_id: Some(attendee_id),
                }
            }
            RosterNotification::ContentShareChanged { attendee_id, active: false } => {
                SessionEvent::ScreenShareStopped {
                    attendee_id: Some(attendee_id),
                }
            }
        };
        notices.push(Notice::Event(event));
    }
}
