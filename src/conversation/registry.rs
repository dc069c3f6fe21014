//! Process-wide registry of conversation trackers.
//!
//! Owns every [`ConversationTracker`] behind a concurrent map keyed by
//! session id, with create-on-first-use semantics. Callers get an
//! `Arc<Mutex<...>>` handle; the per-tracker mutex serializes concurrent
//! interactions on the same session (duplicate client requests) while
//! different sessions proceed without contention.
//!
//! Trackers live until [`SessionRegistry::purge_expired`] evicts them; the
//! server binary runs that sweep on an interval so the map cannot grow
//! without bound.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use super::ConversationTracker;

/// Shared handle to one session's tracker.
pub type TrackerHandle = Arc<Mutex<ConversationTracker>>;

/// Concurrent session-id → tracker map.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, TrackerHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the tracker for `session_id`, creating it on first reference.
    pub fn get_or_create(&self, session_id: &str, family_id: Option<&str>) -> TrackerHandle {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::debug!("creating conversation tracker for session {session_id}");
                Arc::new(Mutex::new(ConversationTracker::new(
                    session_id.to_string(),
                    family_id.map(str::to_string),
                )))
            })
            .clone()
    }

    /// Fetch an existing tracker without creating one.
    pub fn get(&self, session_id: &str) -> Option<TrackerHandle> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every tracker idle longer than `max_idle`; returns the count
    /// evicted.
    pub fn purge_expired(&self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        let cutoff = Utc::now() - max_idle;
        self.sessions
            .retain(|_, tracker| tracker.lock().last_activity() >= cutoff);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            log::info!("evicted {evicted} idle conversation trackers");
        }
        evicted
    }
}
