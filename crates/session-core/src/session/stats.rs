//! Connection stats poller
//!
//! One background task per session samples every live connection at the
//! configured interval and publishes the results on the event stream. The
//! task holds only a weak reference to the session state and exits once the
//! session is stopped or dropped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::{MeetingSession, SessionState, SessionStatus};
use crate::events::SessionEvent;
use crate::types::SessionId;

impl MeetingSession {
    /// Start the poller unless it is running or disabled
    pub(super) async fn ensure_stats_poller(&self) {
        let Some(every) = self.config.stats_interval() else {
            return;
        };
        let mut task = self.stats_task.lock().await;
        if task.is_some() {
            return;
        }
        debug!(session_id = %self.id, interval_ms = every.as_millis() as u64, "Starting connection stats poller");
        *task = Some(spawn_stats_poller(
            self.id.clone(),
            Arc::downgrade(&self.state),
            self.events.clone(),
            every,
        ));
    }
}

fn spawn_stats_poller(
    session_id: SessionId,
    state: Weak<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Some(state) = state.upgrade() else {
                break;
            };
            let connections = {
                let guard = state.lock().await;
                if guard.status == SessionStatus::Stopped {
                    break;
                }
                guard.peers.live_connections()
            };
            drop(state);

            let samples = join_all(
                connections
                    .into_iter()
                    .map(|(peer, connection)| async move { (peer, connection.stats().await) }),
            )
            .await;

            for (peer, sample) in samples {
                match sample {
                    Ok(stats) => {
                        let _ = events.send(SessionEvent::ConnectionStats { peer, stats });
                    }
                    Err(e) => trace!(attendee_id = %peer, "Stats unavailable: {}", e),
                }
            }
        }

        debug!(session_id = %session_id, "Connection stats poller stopped");
    })
}
