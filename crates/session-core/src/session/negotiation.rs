//! Offer/answer negotiation
//!
//! Master role: every remote attendee sends an offer and gets its own
//! connection. Viewer role: one connection to the master, offered locally.
//! A failure closes and unregisters only the connection being negotiated.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{report, MeetingSession, Notice, SessionState};
use crate::errors::{Result, SessionError};
use crate::peers::PeerConnectionState;
use crate::signaling::{PeerConnection, SdpType, SessionDescription, DATA_CHANNEL_LABEL};
use crate::types::AttendeeId;

impl MeetingSession {
    /// Answer a remote offer (master role)
    pub(super) async fn answer_offer(
        &self,
        state: &mut SessionState,
        from: AttendeeId,
        offer: SessionDescription,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        debug!(attendee_id = %from, "[MASTER] Received SDP offer");

        let connection = match self.collaborators.peer_factory.create(&self.rtc_config, &from).await {
            Ok(connection) => connection,
            Err(e) => return Err(self.negotiation_failed(state, &from, None, e, notices).await),
        };
        let registration = state.peers.register(from.clone(), Arc::clone(&connection)).await;
        if registration.replaced {
            info!(attendee_id = %from, "Repeated offer replaced the existing connection");
        }

        if let Err(e) = self.exchange_answer(state, &from, connection.as_ref(), offer).await {
            return Err(self
                .negotiation_failed(state, &from, Some(registration.generation), e, notices)
                .await);
        }

        debug!(attendee_id = %from, "[MASTER] Sent SDP answer");
        self.ensure_stats_poller().await;
        Ok(())
    }

    async fn exchange_answer(
        &self,
        state: &mut SessionState,
        from: &AttendeeId,
        connection: &dyn PeerConnection,
        offer: SessionDescription,
    ) -> Result<()> {
        state.peers.transition(from, PeerConnectionState::OfferReceived)?;

        if let Some(stream) = &state.local_stream {
            for track in &stream.tracks {
                connection.add_track(track, stream).await?;
            }
        }

        if self.config.open_data_channel {
            connection.create_data_channel(DATA_CHANNEL_LABEL).await?;
        }

        offer.validate(SdpType::Offer, from)?;
        connection.set_remote_description(offer).await?;

        debug!(attendee_id = %from, "[MASTER] Creating SDP answer");
        let answer = connection.create_answer().await?;
        connection.set_local_description(answer.clone()).await?;
        self.collaborators.signaling.send_sdp_answer(&answer, from).await?;

        state.peers.transition(from, PeerConnectionState::AnswerSent)?;
        state.peers.transition(from, PeerConnectionState::IceExchanging)?;
        Ok(())
    }

    /// Create the connection to the master and send the local offer (viewer role)
    pub(super) async fn start_offer(&self, state: &mut SessionState, notices: &mut Vec<Notice>) -> Result<()> {
        let master = AttendeeId::master();
        if state.peers.get(&master).is_some() {
            debug!("[VIEWER] Connection to master already exists");
            return Ok(());
        }

        let connection = match self.collaborators.peer_factory.create(&self.rtc_config, &master).await {
            Ok(connection) => connection,
            Err(e) => return Err(self.negotiation_failed(state, &master, None, e, notices).await),
        };
        let registration = state.peers.register(master.clone(), Arc::clone(&connection)).await;

        if let Err(e) = self.send_offer(state, &master, connection.as_ref()).await {
            return Err(self
                .negotiation_failed(state, &master, Some(registration.generation), e, notices)
                .await);
        }

        debug!("[VIEWER] Sent SDP offer to master");
        self.ensure_stats_poller().await;
        Ok(())
    }

    async fn send_offer(&self, state: &mut SessionState, master: &AttendeeId, connection: &dyn PeerConnection) -> Result<()> {
        if let Some(stream) = &state.local_stream {
            for track in &stream.tracks {
                connection.add_track(track, stream).await?;
            }
        }

        if self.config.open_data_channel {
            connection.create_data_channel(DATA_CHANNEL_LABEL).await?;
        }

        debug!("[VIEWER] Creating SDP offer");
        let offer = connection.create_offer().await?;
        connection.set_local_description(offer.clone()).await?;
        self.collaborators.signaling.send_sdp_offer(&offer).await?;

        state.peers.transition(master, PeerConnectionState::OfferSent)?;
        Ok(())
    }

    /// Apply the master's answer (viewer role)
    pub(super) async fn apply_answer(
        &self,
        state: &mut SessionState,
        answer: SessionDescription,
        notices: &mut Vec<Notice>,
    ) -> Result<()> {
        let master = AttendeeId::master();
        let (Some(connection), Some(generation)) = (state.peers.get(&master), state.peers.generation(&master)) else {
            debug!("[VIEWER] SDP answer without a connection dropped");
            return Ok(());
        };
        if state.peers.state(&master) != Some(PeerConnectionState::OfferSent) {
            debug!("[VIEWER] Unexpected SDP answer dropped");
            return Ok(());
        }

        debug!("[VIEWER] Received SDP answer");
        let applied = async {
            answer.validate(SdpType::Answer, &master)?;
            connection.set_remote_description(answer).await?;
            state.peers.transition(&master, PeerConnectionState::AnswerReceived)?;
            state.peers.transition(&master, PeerConnectionState::IceExchanging)?;
            Ok::<(), SessionError>(())
        }
        .await;

        match applied {
            Ok(()) => Ok(()),
            Err(e) => Err(self.negotiation_failed(state, &master, Some(generation), e, notices).await),
        }
    }

    /// Tear down the failed attendee's connection and report the failure
    pub(super) async fn negotiation_failed(
        &self,
        state: &mut SessionState,
        attendee_id: &AttendeeId,
        generation: Option<u64>,
        error: SessionError,
        notices: &mut Vec<Notice>,
    ) -> SessionError {
        let error = match error {
            SessionError::Negotiation { .. } => error,
            other => SessionError::negotiation(attendee_id.as_str(), other.to_string()),
        };
        warn!(attendee_id = %attendee_id, "[{}] {}", self.config.role, error);

        if let Some(generation) = generation {
            state.peers.unregister_generation(attendee_id, generation).await;
        }
        report(notices, error)
    }
}
