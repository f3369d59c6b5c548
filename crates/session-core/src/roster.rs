//! Roster Tracker
//!
//! Keeps the live table of attendee presence, audio and content-share state.
//! Every mutating call returns the notifications it produced; the session
//! forwards them to the application once its own locks are released.
//!
//! Records are never deleted while the session runs. An attendee that leaves
//! is kept with `is_present == false` and its last known values.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{AttendeeId, SignalStrength};

/// Default number of presence events retained in the presence log
pub const DEFAULT_PRESENCE_LOG_CAPACITY: usize = 256;

/// State tracked for one attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendeeRecord {
    pub attendee_id: AttendeeId,
    /// Application supplied identity, if the meeting service reported one
    pub external_user_id: Option<String>,
    /// Volume in [0, 1]; `None` until the first volume indication
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub signal_strength: Option<SignalStrength>,
    pub is_present: bool,
    /// Whether the attendee currently has a content share stream
    pub sharing_content: bool,
    pub joined_at: Option<DateTime<Utc>>,
    pub left_at: Option<DateTime<Utc>>,
}

impl AttendeeRecord {
    fn new(attendee_id: AttendeeId) -> Self {
        Self {
            attendee_id,
            external_user_id: None,
            volume: None,
            muted: None,
            signal_strength: None,
            is_present: false,
            sharing_content: false,
            joined_at: None,
            left_at: None,
        }
    }

    fn joined(attendee_id: AttendeeId, external_user_id: Option<String>) -> Self {
        let mut record = Self::new(attendee_id);
        record.mark_present(external_user_id);
        record
    }

    fn mark_present(&mut self, external_user_id: Option<String>) {
        self.is_present = true;
        self.joined_at = Some(Utc::now());
        self.left_at = None;
        if external_user_id.is_some() {
            self.external_user_id = external_user_id;
        }
    }

    /// True once the attendee has left after having been present
    pub fn has_left(&self) -> bool {
        !self.is_present && self.left_at.is_some()
    }
}

/// One volume indication. `None` fields mean "unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeUpdate {
    pub volume: Option<f64>,
    pub muted: Option<bool>,
    pub signal_strength: Option<SignalStrength>,
}

impl VolumeUpdate {
    pub fn new(volume: Option<f64>, muted: Option<bool>, signal_strength: Option<SignalStrength>) -> Self {
        Self {
            volume,
            muted,
            signal_strength,
        }
    }
}

/// Notification produced by a roster mutation
#[derive(Debug, Clone, PartialEq)]
pub enum RosterNotification {
    /// The roster table changed; listeners receive a fresh snapshot
    RosterChanged,
    AttendeeJoined {
        attendee_id: AttendeeId,
        external_user_id: Option<String>,
    },
    AttendeeLeft {
        attendee_id: AttendeeId,
    },
    ContentShareChanged {
        attendee_id: AttendeeId,
        active: bool,
    },
}

/// Entry of the presence log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceLogEntry {
    pub attendee_id: AttendeeId,
    pub present: bool,
    pub timestamp: DateTime<Utc>,
}

/// Attendee table plus the presence log
#[derive(Debug)]
pub struct RosterTracker {
    attendees: IndexMap<AttendeeId, AttendeeRecord>,
    presence_log: VecDeque<PresenceLogEntry>,
    presence_log_capacity: usize,
}

impl RosterTracker {
    pub fn new() -> Self {
        Self::with_presence_log_capacity(DEFAULT_PRESENCE_LOG_CAPACITY)
    }

    pub fn with_presence_log_capacity(capacity: usize) -> Self {
        Self {
            attendees: IndexMap::new(),
            presence_log: VecDeque::with_capacity(capacity.min(1024)),
            presence_log_capacity: capacity,
        }
    }

    /// Apply a presence event.
    ///
    /// A present event for an attendee that previously left starts a fresh
    /// record; a present event for a record that only ever received volume
    /// indications keeps those values.
    pub fn on_presence_changed(
        &mut self,
        attendee_id: &AttendeeId,
        present: bool,
        external_user_id: Option<String>,
    ) -> Vec<RosterNotification> {
        self.log_presence(attendee_id, present);

        if attendee_id.is_content_share() {
            return self.on_content_share_presence(attendee_id, present);
        }

        let mut notifications = Vec::new();

        if !present {
            match self.attendees.get_mut(attendee_id) {
                Some(record) if record.is_present => {
                    record.is_present = false;
                    record.left_at = Some(Utc::now());
                    record.sharing_content = false;
                    debug!(attendee_id = %attendee_id, "Attendee left");
                    notifications.push(RosterNotification::RosterChanged);
                    notifications.push(RosterNotification::AttendeeLeft {
                        attendee_id: attendee_id.clone(),
                    });
                }
                Some(_) => trace!(attendee_id = %attendee_id, "Duplicate absent event ignored"),
                None => trace!(attendee_id = %attendee_id, "Absent event for unknown attendee ignored"),
            }
            return notifications;
        }

        match self.attendees.get_mut(attendee_id) {
            None => {
                let record = AttendeeRecord::joined(attendee_id.clone(), external_user_id.clone());
                self.attendees.insert(attendee_id.clone(), record);
                debug!(attendee_id = %attendee_id, "Attendee joined");
                notifications.push(RosterNotification::AttendeeJoined {
                    attendee_id: attendee_id.clone(),
                    external_user_id,
                });
                notifications.push(RosterNotification::RosterChanged);
            }
            Some(record) if record.is_present => {
                if external_user_id.is_some() && record.external_user_id != external_user_id {
                    record.external_user_id = external_user_id;
                    notifications.push(RosterNotification::RosterChanged);
                }
            }
            Some(record) => {
                if record.has_left() {
                    *record = AttendeeRecord::joined(attendee_id.clone(), external_user_id.clone());
                    debug!(attendee_id = %attendee_id, "Attendee rejoined");
                } else {
                    record.mark_present(external_user_id.clone());
                    debug!(attendee_id = %attendee_id, "Attendee joined");
                }
                notifications.push(RosterNotification::AttendeeJoined {
                    attendee_id: attendee_id.clone(),
                    external_user_id: record.external_user_id.clone(),
                });
                notifications.push(RosterNotification::RosterChanged);
            }
        }

        notifications
    }

    fn on_content_share_presence(&mut self, share_id: &AttendeeId, present: bool) -> Vec<RosterNotification> {
        let base = share_id.base();
        let Some(record) = self.attendees.get_mut(&base) else {
            debug!(attendee_id = %share_id, "Content share presence for unknown attendee ignored");
            return Vec::new();
        };
        if present && !record.is_present {
            debug!(attendee_id = %share_id, "Content share presence for absent attendee ignored");
            return Vec::new();
        }
        if record.sharing_content == present {
            return Vec::new();
        }
        record.sharing_content = present;
        vec![
            RosterNotification::ContentShareChanged {
                attendee_id: base,
                active: present,
            },
            RosterNotification::RosterChanged,
        ]
    }

    /// Apply a volume indication.
    ///
    /// Content share ids are redirected to their base attendee and only carry
    /// volume and signal strength. A volume indication never changes presence.
    pub fn on_volume_indicator(&mut self, attendee_id: &AttendeeId, update: VolumeUpdate) -> Vec<RosterNotification> {
        let base = attendee_id.base();
        let from_content_share = base != *attendee_id;

        let record = self
            .attendees
            .entry(base.clone())
            .or_insert_with(|| AttendeeRecord::new(base.clone()));

        if let Some(volume) = update.volume {
            if volume.is_finite() {
                record.volume = Some(volume.clamp(0.0, 1.0));
            }
        }
        if let Some(strength) = update.signal_strength {
            record.signal_strength = Some(strength);
        }
        if !from_content_share {
            if let Some(muted) = update.muted {
                record.muted = Some(muted);
            }
        }

        trace!(attendee_id = %base, content_share = from_content_share, "Applied volume indication");
        vec![RosterNotification::RosterChanged]
    }

    pub fn get(&self, attendee_id: &AttendeeId) -> Option<&AttendeeRecord> {
        self.attendees.get(attendee_id)
    }

    pub fn contains(&self, attendee_id: &AttendeeId) -> bool {
        self.attendees.contains_key(attendee_id)
    }

    /// All records in first-seen order
    pub fn snapshot(&self) -> Vec<AttendeeRecord> {
        self.attendees.values().cloned().collect()
    }

    pub fn present_attendees(&self) -> Vec<AttendeeId> {
        self.attendees
            .values()
            .filter(|r| r.is_present)
            .map(|r| r.attendee_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attendees.is_empty()
    }

    pub fn presence_log(&self) -> Vec<PresenceLogEntry> {
        self.presence_log.iter().cloned().collect()
    }

    /// Mark everyone absent, used at session teardown
    pub fn mark_all_absent(&mut self) {
        let now = Utc::now();
        for record in self.attendees.values_mut().filter(|r| r.is_present) {
            record.is_present = false;
            record.sharing_content = false;
            record.left_at = Some(now);
        }
    }

    fn log_presence(&mut self, attendee_id: &AttendeeId, present: bool) {
        if self.presence_log_capacity == 0 {
            return;
        }
        while self.presence_log.len() >= self.presence_log_capacity {
            self.presence_log.pop_front();
        }
        self.presence_log.push_back(PresenceLogEntry {
            attendee_id: attendee_id.clone(),
            present,
            timestamp: Utc::now(),
        });
    }
}

impl Default for RosterTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> AttendeeId {
        AttendeeId::from(s)
    }

    #[test]
    fn test_present_then_volume() {
        let mut roster = RosterTracker::new();
        let joined = roster.on_presence_changed(&id("A"), true, None);
        assert!(matches!(joined[0], RosterNotification::AttendeeJoined { .. }));

        roster.on_volume_indicator(
            &id("A"),
            VolumeUpdate::new(Some(0.8), Some(false), Some(SignalStrength::Strong)),
        );

        let record = roster.get(&id("A")).unwrap();
        assert_eq!(record.volume, Some(0.8));
        assert_eq!(record.muted, Some(false));
        assert_eq!(record.signal_strength, Some(SignalStrength::Strong));
        assert!(record.is_present);
    }

    #[test]
    fn test_absent_keeps_record() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, Some("alice".into()));
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(Some(0.3), Some(true), None));

        let notes = roster.on_presence_changed(&id("A"), false, None);
        assert_eq!(
            notes,
            vec![
                RosterNotification::RosterChanged,
                RosterNotification::AttendeeLeft { attendee_id: id("A") },
            ]
        );

        let record = roster.get(&id("A")).unwrap();
        assert!(!record.is_present);
        assert_eq!(record.volume, Some(0.3));
        assert_eq!(record.muted, Some(true));
        assert_eq!(record.external_user_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_unknown_fields_leave_values_untouched() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(Some(0.5), Some(true), Some(SignalStrength::Weak)));
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(None, None, None));

        let record = roster.get(&id("A")).unwrap();
        assert_eq!(record.volume, Some(0.5));
        assert_eq!(record.muted, Some(true));
        assert_eq!(record.signal_strength, Some(SignalStrength::Weak));
    }

    #[test]
    fn test_content_share_volume_redirects_to_base() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(Some(0.1), Some(false), None));

        roster.on_volume_indicator(
            &id("A#content"),
            VolumeUpdate::new(Some(0.9), Some(true), Some(SignalStrength::Strong)),
        );

        assert!(!roster.contains(&id("A#content")));
        let record = roster.get(&id("A")).unwrap();
        assert_eq!(record.volume, Some(0.9));
        assert_eq!(record.signal_strength, Some(SignalStrength::Strong));
        assert_eq!(record.muted, Some(false));
        assert!(record.is_present);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_volume_does_not_resurrect() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);
        roster.on_presence_changed(&id("A"), false, None);
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(Some(0.7), None, None));

        let record = roster.get(&id("A")).unwrap();
        assert!(!record.is_present);
        assert_eq!(record.volume, Some(0.7));

        // Only a later present event brings the attendee back, with a fresh record
        let notes = roster.on_presence_changed(&id("A"), true, None);
        assert!(notes.contains(&RosterNotification::RosterChanged));
        let record = roster.get(&id("A")).unwrap();
        assert!(record.is_present);
        assert_eq!(record.volume, None);
    }

    #[test]
    fn test_volume_before_presence_is_kept() {
        let mut roster = RosterTracker::new();
        roster.on_volume_indicator(&id("B"), VolumeUpdate::new(Some(0.4), Some(false), None));
        assert!(!roster.get(&id("B")).unwrap().is_present);

        roster.on_presence_changed(&id("B"), true, Some("bob".into()));
        let record = roster.get(&id("B")).unwrap();
        assert!(record.is_present);
        assert_eq!(record.volume, Some(0.4));
        assert_eq!(record.external_user_id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_repeat_present_updates_external_user_id() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);
        let notes = roster.on_presence_changed(&id("A"), true, Some("alice".into()));
        assert_eq!(notes, vec![RosterNotification::RosterChanged]);
        assert_eq!(roster.get(&id("A")).unwrap().external_user_id.as_deref(), Some("alice"));

        // Same value again is not a mutation
        assert!(roster.on_presence_changed(&id("A"), true, Some("alice".into())).is_empty());
    }

    #[test]
    fn test_content_share_presence_toggles_flag() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);

        let notes = roster.on_presence_changed(&id("A#content"), true, None);
        assert_eq!(
            notes[0],
            RosterNotification::ContentShareChanged {
                attendee_id: id("A"),
                active: true,
            }
        );
        assert!(roster.get(&id("A")).unwrap().sharing_content);
        assert!(!roster.contains(&id("A#content")));

        roster.on_presence_changed(&id("A#content"), false, None);
        let record = roster.get(&id("A")).unwrap();
        assert!(!record.sharing_content);
        assert!(record.is_present);
    }

    #[test]
    fn test_content_share_after_leaving_is_ignored() {
        let mut roster = RosterTracker::new();
        roster.on_presence_changed(&id("A"), true, None);
        roster.on_presence_changed(&id("A"), false, None);

        assert!(roster.on_presence_changed(&id("A#content"), true, None).is_empty());
        let record = roster.get(&id("A")).unwrap();
        assert!(!record.is_present);
        assert!(!record.sharing_content);
    }

    #[test]
    fn test_absent_for_unknown_attendee_is_ignored() {
        let mut roster = RosterTracker::new();
        assert!(roster.on_presence_changed(&id("ghost"), false, None).is_empty());
        assert!(roster.is_empty());
    }

    #[test]
    fn test_presence_log_is_bounded() {
        let mut roster = RosterTracker::with_presence_log_capacity(3);
        for i in 0..5 {
            roster.on_presence_changed(&id(&format!("A{}", i)), true, None);
        }
        let log = roster.presence_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].attendee_id, id("A2"));
        assert_eq!(log[2].attendee_id, id("A4"));
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut roster = RosterTracker::new();
        roster.on_volume_indicator(&id("A"), VolumeUpdate::new(Some(1.7), None, None));
        assert_eq!(roster.get(&id("A")).unwrap().volume, Some(1.0));
    }

    mod properties {
        use std::collections::{HashMap, HashSet};

        use proptest::prelude::*;

        use super::*;

        #[derive(Debug, Clone)]
        enum Op {
            Presence(&'static str, bool),
            Volume(&'static str, f64),
        }

        fn attendee() -> impl Strategy<Value = &'static str> {
            prop_oneof![Just("A"), Just("B"), Just("C"), Just("A#content"), Just("B#content")]
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (attendee(), any::<bool>()).prop_map(|(a, present)| Op::Presence(a, present)),
                (attendee(), 0.0f64..=1.0).prop_map(|(a, volume)| Op::Volume(a, volume)),
            ]
        }

        proptest! {
            #[test]
            fn prop_presence_sequences_keep_roster_consistent(ops in prop::collection::vec(op(), 0..64)) {
                let mut roster = RosterTracker::new();
                // Last presence event seen for each plain attendee id
                let mut last_presence: HashMap<AttendeeId, bool> = HashMap::new();
                let mut seen: HashSet<AttendeeId> = HashSet::new();

                for op in ops {
                    match op {
                        Op::Presence(a, present) => {
                            let attendee_id = id(a);
                            if !attendee_id.is_content_share() {
                                last_presence.insert(attendee_id.clone(), present);
                            }
                            roster.on_presence_changed(&attendee_id, present, None);
                        }
                        Op::Volume(a, volume) => {
                            roster.on_volume_indicator(&id(a), VolumeUpdate::new(Some(volume), None, None));
                        }
                    }

                    for attendee_id in &seen {
                        prop_assert!(roster.contains(attendee_id), "record for {} was lost", attendee_id);
                    }
                    for record in roster.snapshot() {
                        prop_assert!(!record.attendee_id.is_content_share());
                        let announced = last_presence.get(&record.attendee_id).copied().unwrap_or(false);
                        prop_assert_eq!(record.is_present, announced);
                        prop_assert!(!record.sharing_content || record.is_present);
                        seen.insert(record.attendee_id);
                    }
                }
            }
        }
    }
}
