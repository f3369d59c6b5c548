//! Peer Connection Registry
//!
//! Owns the mapping from remote attendee to peer connection for a session.
//! There is at most one live connection per remote attendee. Registering a
//! second connection for the same attendee closes and replaces the first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::errors::{Result, SessionError};
use crate::signaling::PeerConnection;
use crate::types::AttendeeId;

/// Negotiation state of one peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerConnectionState {
    NoConnection,
    /// Viewer: local offer sent to the master
    OfferSent,
    /// Master: remote offer received and being applied
    OfferReceived,
    /// Master: local answer sent
    AnswerSent,
    /// Viewer: remote answer applied
    AnswerReceived,
    IceExchanging,
    Connected,
    /// Terminal
    Closed,
}

impl PeerConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PeerConnectionState::Closed)
    }

    pub fn can_transition_to(&self, next: PeerConnectionState) -> bool {
        use PeerConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (NoConnection, OfferReceived) | (NoConnection, OfferSent) => true,
            (OfferReceived, AnswerSent) => true,
            (OfferSent, AnswerReceived) => true,
            (AnswerSent, IceExchanging) | (AnswerReceived, IceExchanging) => true,
            (AnswerSent, Connected) | (AnswerReceived, Connected) | (IceExchanging, Connected) => true,
            _ => false,
        }
    }
}

struct PeerEntry {
    connection: Arc<dyn PeerConnection>,
    state: PeerConnectionState,
    generation: u64,
    created_at: Instant,
}

/// Result of [`PeerConnectionRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Increases with every registration; identifies this entry
    pub generation: u64,
    /// Whether a live connection for the same attendee was closed and replaced
    pub replaced: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_registered: usize,
    pub total_replaced: usize,
    pub total_closed: usize,
}

/// Per-attendee peer connection table
pub struct PeerConnectionRegistry {
    entries: HashMap<AttendeeId, PeerEntry>,
    next_generation: u64,
    stats: RegistryStats,
}

impl PeerConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 1,
            stats: RegistryStats::default(),
        }
    }

    /// Register a connection for `attendee_id`, closing any previous one
    pub async fn register(&mut self, attendee_id: AttendeeId, connection: Arc<dyn PeerConnection>) -> Registration {
        let generation = self.next_generation;
        self.next_generation += 1;

        let previous = self.entries.insert(
            attendee_id.clone(),
            PeerEntry {
                connection,
                state: PeerConnectionState::NoConnection,
                generation,
                created_at: Instant::now(),
            },
        );
        self.stats.total_registered += 1;

        let replaced = match previous {
            Some(old) => {
                self.stats.total_replaced += 1;
                debug!(attendee_id = %attendee_id, generation = old.generation, "Replacing existing peer connection");
                self.close_entry(old).await;
                true
            }
            None => false,
        };

        debug!(attendee_id = %attendee_id, generation, "Registered peer connection");
        Registration { generation, replaced }
    }

    /// Live connection for `attendee_id`, if any
    pub fn get(&self, attendee_id: &AttendeeId) -> Option<Arc<dyn PeerConnection>> {
        self.entries
            .get(attendee_id)
            .filter(|e| !e.state.is_terminal())
            .map(|e| Arc::clone(&e.connection))
    }

    pub fn state(&self, attendee_id: &AttendeeId) -> Option<PeerConnectionState> {
        self.entries.get(attendee_id).map(|e| e.state)
    }

    pub fn generation(&self, attendee_id: &AttendeeId) -> Option<u64> {
        self.entries.get(attendee_id).map(|e| e.generation)
    }

    /// Move a connection to `next`.
    ///
    /// Returns `Ok(false)` when there is no live connection for the attendee;
    /// such events are late or out of order and are dropped by the caller.
    pub fn transition(&mut self, attendee_id: &AttendeeId, next: PeerConnectionState) -> Result<bool> {
        let Some(entry) = self.entries.get_mut(attendee_id) else {
            trace!(attendee_id = %attendee_id, ?next, "No connection to transition");
            return Ok(false);
        };
        if entry.state.is_terminal() {
            return Ok(false);
        }
        if entry.state == next {
            return Ok(true);
        }
        if !entry.state.can_transition_to(next) {
            return Err(SessionError::invalid_state(format!(
                "connection for {} cannot move from {:?} to {:?}",
                attendee_id, entry.state, next
            )));
        }
        trace!(attendee_id = %attendee_id, from = ?entry.state, to = ?next, "Peer connection state");
        entry.state = next;
        Ok(true)
    }

    /// Close and remove the connection for `attendee_id`.
    ///
    /// Unknown attendees are a no-op and return `false`.
    pub async fn unregister(&mut self, attendee_id: &AttendeeId) -> bool {
        match self.entries.remove(attendee_id) {
            Some(entry) => {
                debug!(attendee_id = %attendee_id, "Unregistered peer connection");
                self.close_entry(entry).await;
                true
            }
            None => false,
        }
    }

    /// Unregister only if the entry is still the given registration
    pub async fn unregister_generation(&mut self, attendee_id: &AttendeeId, generation: u64) -> bool {
        if self.generation(attendee_id) == Some(generation) {
            self.unregister(attendee_id).await
        } else {
            false
        }
    }

    /// Close every connection. Safe on an empty registry.
    pub async fn close_all(&mut self) -> usize {
        let entries: Vec<(AttendeeId, PeerEntry)> = self.entries.drain().collect();
        let count = entries.len();
        for (attendee_id, entry) in entries {
            trace!(attendee_id = %attendee_id, "Closing peer connection");
            self.close_entry(entry).await;
        }
        if count > 0 {
            debug!("Closed {} peer connections", count);
        }
        count
    }

    /// Live connections, for stats polling
    pub fn live_connections(&self) -> Vec<(AttendeeId, Arc<dyn PeerConnection>)> {
        self.entries
            .iter()
            .filter(|(_, e)| !e.state.is_terminal())
            .map(|(id, e)| (id.clone(), Arc::clone(&e.connection)))
            .collect()
    }

    pub fn attendees(&self) -> Vec<AttendeeId> {
        self.entries.keys().cloned().collect()
    }

    pub fn connection_age(&self, attendee_id: &AttendeeId) -> Option<std::time::Duration> {
        self.entries.get(attendee_id).map(|e| e.created_at.elapsed())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    async fn close_entry(&mut self, mut entry: PeerEntry) {
        if entry.state.is_terminal() {
            return;
        }
        entry.state = PeerConnectionState::Closed;
        entry.connection.close().await;
        self.stats.total_closed += 1;
    }
}

impl Default for PeerConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PeerConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: HashMap<&AttendeeId, PeerConnectionState> =
            self.entries.iter().map(|(id, e)| (id, e.state)).collect();
        f.debug_struct("PeerConnectionRegistry")
            .field("connections", &states)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_state_sequence() {
        use PeerConnectionState::*;
        let path = [NoConnection, OfferReceived, AnswerSent, IceExchanging, Connected, Closed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(!Closed.can_transition_to(Connected));
        assert!(!Connected.can_transition_to(OfferReceived));
        assert!(!NoConnection.can_transition_to(Connected));
    }

    #[test]
    fn test_viewer_state_sequence() {
        use PeerConnectionState::*;
        let path = [NoConnection, OfferSent, AnswerReceived, IceExchanging, Connected];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]));
        }
        assert!(!OfferSent.can_transition_to(AnswerSent));
    }
}
