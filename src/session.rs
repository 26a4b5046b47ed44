//! Per-conversation session state and the live session store.
//!
//! A [`Session`] is the aggregation point for classifier and extractor
//! output. The [`SessionStore`] keys sessions by the externally supplied
//! conversation id and hands out per-session exclusive access: each
//! session sits behind its own `Mutex`, so two messages racing for the
//! same conversation serialize while unrelated conversations never block
//! each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::types::{IntelligenceReport, ScamIntent, Speaker, TerminationReason, Turn};

/// Session liveness. The transition is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Turns and intelligence may still be appended.
    Active,
    /// Frozen: no further turns, no further intelligence.
    Terminated,
}

/// One conversation with a suspected scammer.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    turns: Vec<Turn>,
    turn_count: usize,
    intents: BTreeSet<ScamIntent>,
    confidence_samples: Vec<f64>,
    intelligence: IntelligenceReport,
    status: SessionStatus,
    termination_reason: Option<TerminationReason>,
}

impl Session {
    /// Create a fresh active session for an externally supplied id.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            turns: Vec::new(),
            turn_count: 0,
            intents: BTreeSet::new(),
            confidence_samples: Vec::new(),
            intelligence: IntelligenceReport::default(),
            status: SessionStatus::Active,
            termination_reason: None,
        }
    }

    /// The conversation id. Immutable for the session's lifetime.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the last turn was appended.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Ordered conversation turns.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Total appended turns, both speakers counted.
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Intent labels observed so far. Never contains the `None` sentinel.
    pub fn intents(&self) -> &BTreeSet<ScamIntent> {
        &self.intents
    }

    /// Accumulated intelligence sets.
    pub fn intelligence(&self) -> &IntelligenceReport {
        &self.intelligence
    }

    /// Current liveness.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Set only once the session is terminated.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination_reason
    }

    /// Append a turn and bump activity. No validation on `text`; empty
    /// strings are allowed. Silently ignored once terminated.
    pub fn append_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        if self.status == SessionStatus::Terminated {
            return;
        }
        self.turns.push(Turn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
        self.turn_count = self.turn_count.saturating_add(1);
        self.last_activity = Utc::now();
    }

    /// Union intent labels into the session, skipping the sentinel.
    pub fn merge_intents(&mut self, intents: &[ScamIntent]) {
        for intent in intents {
            if *intent != ScamIntent::None {
                self.intents.insert(*intent);
            }
        }
    }

    /// Record one per-message confidence sample.
    pub fn record_confidence(&mut self, score: f64) {
        self.confidence_samples.push(score);
    }

    /// Union extracted intelligence into the session's sets. Ignored
    /// once terminated.
    pub fn merge_intelligence(&mut self, report: &IntelligenceReport) {
        if self.status == SessionStatus::Terminated {
            return;
        }
        self.intelligence.merge(report);
    }

    /// Decide whether the session should terminate, and why.
    ///
    /// Check order, first match wins: turn ceiling, idle timeout, manual
    /// flag. Side-effect free; the caller flips status via
    /// [`terminate`](Self::terminate).
    pub fn evaluate_termination(
        &self,
        max_turns: usize,
        idle_timeout: Duration,
    ) -> Option<TerminationReason> {
        if self.turn_count >= max_turns {
            return Some(TerminationReason::MaxTurnsReached);
        }
        if self.is_idle(idle_timeout) {
            return Some(TerminationReason::SessionTimeout);
        }
        if self.status == SessionStatus::Terminated {
            return Some(
                self.termination_reason
                    .unwrap_or(TerminationReason::ManuallyTerminated),
            );
        }
        None
    }

    /// True when no activity for longer than `idle_timeout`.
    pub fn is_idle(&self, idle_timeout: Duration) -> bool {
        let idle = Utc::now().signed_duration_since(self.last_activity);
        idle.num_milliseconds() > i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX)
    }

    /// Flip to terminated. Idempotent: a second call keeps the first
    /// reason. Returns whether this call performed the transition, so
    /// racing callers can agree on a single owner of termination
    /// processing.
    pub fn terminate(&mut self, reason: TerminationReason) -> bool {
        if self.status == SessionStatus::Terminated {
            return false;
        }
        self.status = SessionStatus::Terminated;
        self.termination_reason = Some(reason);
        true
    }

    /// Mean of the recorded confidence samples, or 0 when empty.
    pub fn average_confidence(&self) -> f64 {
        if self.confidence_samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.confidence_samples.iter().sum();
        #[allow(clippy::cast_precision_loss)] // sample counts are small
        {
            sum / self.confidence_samples.len() as f64
        }
    }

    /// Test hook: shift `last_activity` into the past.
    #[cfg(test)]
    pub(crate) fn backdate_last_activity(&mut self, by: Duration) {
        let delta = chrono::TimeDelta::milliseconds(
            i64::try_from(by.as_millis()).unwrap_or(i64::MAX),
        );
        self.last_activity = self
            .last_activity
            .checked_sub_signed(delta)
            .unwrap_or(self.last_activity);
    }

    /// Seconds since the session was created.
    pub fn duration_secs(&self) -> f64 {
        let elapsed = Utc::now().signed_duration_since(self.created_at);
        #[allow(clippy::cast_precision_loss)]
        {
            elapsed.num_milliseconds() as f64 / 1000.0
        }
    }
}

/// Shared handle to one session's mutable state.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Live session store keyed by conversation id.
///
/// The map lock is held only for lookups and insert/remove; all session
/// mutation happens under the per-session mutex, never under the map
/// lock across an await on network I/O.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the session for `id`, lazily creating an active one on
    /// first sight. Never fails.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.read().await.get(id) {
            return Arc::clone(existing);
        }
        let mut map = self.sessions.write().await;
        // Racing creators: the second one finds the first one's entry.
        Arc::clone(
            map.entry(id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(id)))),
        )
    }

    /// Look up an existing session.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).map(Arc::clone)
    }

    /// Remove a session from the live store. No-op on an unknown id.
    pub async fn delete(&self, id: &str) {
        if self.sessions.write().await.remove(id).is_some() {
            debug!(session_id = id, "session removed from live store");
        }
    }

    /// Remove `id` only while it still maps to `handle`, and report
    /// whether this call removed it. Exactly one of any number of racing
    /// callers gets `true`, and a session recreated under the same id is
    /// left alone.
    pub async fn remove(&self, id: &str, handle: &SessionHandle) -> bool {
        let mut map = self.sessions.write().await;
        match map.get(id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                map.remove(id);
                debug!(session_id = id, "session removed from live store");
                true
            }
            _ => false,
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when no sessions are live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Delete every session idle past `idle_timeout`, regardless of
    /// status. Returns the number removed.
    ///
    /// Takes each session's own lock before deciding, so a sweep racing
    /// a live request observes a consistent `last_activity`.
    pub async fn sweep_expired(&self, idle_timeout: Duration) -> usize {
        let handles: Vec<(String, SessionHandle)> = {
            let map = self.sessions.read().await;
            map.iter()
                .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
                .collect()
        };

        let mut expired = Vec::new();
        for (id, handle) in handles {
            if handle.lock().await.is_idle(idle_timeout) {
                expired.push(id);
            }
        }

        let mut removed = 0_usize;
        let mut map = self.sessions.write().await;
        for id in expired {
            if map.remove(&id).is_some() {
                removed = removed.saturating_add(1);
                debug!(session_id = %id, "expired session swept");
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_turn_count_tracks_turns_len() {
        let mut session = Session::new("s1");
        session.append_turn(Speaker::Scammer, "hello");
        session.append_turn(Speaker::Agent, "hi!");
        session.append_turn(Speaker::Scammer, "");
        assert_eq!(session.turn_count(), 3);
        assert_eq!(session.turns().len(), session.turn_count());
    }

    #[test]
    fn test_merge_intents_skips_sentinel_and_dedups() {
        let mut session = Session::new("s1");
        session.merge_intents(&[ScamIntent::FakePrize, ScamIntent::None]);
        session.merge_intents(&[ScamIntent::FakePrize, ScamIntent::UpiScam]);
        assert_eq!(session.intents().len(), 2);
        assert!(!session.intents().contains(&ScamIntent::None));
    }

    #[test]
    fn test_intelligence_merge_is_idempotent() {
        let mut session = Session::new("s1");
        let mut report = IntelligenceReport::default();
        report.upi_ids.insert("winner@paytm".to_owned());

        session.merge_intelligence(&report);
        let size = session.intelligence().upi_ids.len();
        session.merge_intelligence(&report);
        assert_eq!(session.intelligence().upi_ids.len(), size);
    }

    #[test]
    fn test_termination_precedence_max_turns_beats_timeout() {
        let mut session = Session::new("s1");
        for _ in 0..20 {
            session.append_turn(Speaker::Scammer, "msg");
        }
        // Backdating makes the session simultaneously idle.
        session.backdate_last_activity(Duration::from_secs(7200));
        let reason = session.evaluate_termination(20, HOUR);
        assert_eq!(reason, Some(TerminationReason::MaxTurnsReached));
    }

    #[test]
    fn test_timeout_detected_when_under_ceiling() {
        let mut session = Session::new("s1");
        session.append_turn(Speaker::Scammer, "msg");
        session.backdate_last_activity(Duration::from_secs(7200));
        let reason = session.evaluate_termination(20, HOUR);
        assert_eq!(reason, Some(TerminationReason::SessionTimeout));
    }

    #[test]
    fn test_manual_flag_reported_last() {
        let mut session = Session::new("s1");
        session.append_turn(Speaker::Scammer, "msg");
        session.terminate(TerminationReason::ManuallyTerminated);
        let reason = session.evaluate_termination(20, HOUR);
        assert_eq!(reason, Some(TerminationReason::ManuallyTerminated));
    }

    #[test]
    fn test_active_session_does_not_terminate() {
        let mut session = Session::new("s1");
        session.append_turn(Speaker::Scammer, "msg");
        assert_eq!(session.evaluate_termination(20, HOUR), None);
    }

    #[test]
    fn test_terminate_is_idempotent_keeps_first_reason() {
        let mut session = Session::new("s1");
        assert!(session.terminate(TerminationReason::MaxTurnsReached));
        assert!(!session.terminate(TerminationReason::SessionTimeout));
        assert_eq!(
            session.termination_reason(),
            Some(TerminationReason::MaxTurnsReached)
        );
    }

    #[test]
    fn test_terminated_session_is_frozen() {
        let mut session = Session::new("s1");
        session.append_turn(Speaker::Scammer, "msg");
        session.terminate(TerminationReason::ManuallyTerminated);

        session.append_turn(Speaker::Scammer, "more");
        let mut report = IntelligenceReport::default();
        report.urls.insert("http://late.example".to_owned());
        session.merge_intelligence(&report);

        assert_eq!(session.turn_count(), 1);
        assert!(session.intelligence().urls.is_empty());
    }

    #[test]
    fn test_average_confidence() {
        let mut session = Session::new("s1");
        assert_eq!(session.average_confidence(), 0.0);
        session.record_confidence(0.4);
        session.record_confidence(0.8);
        let avg = session.average_confidence();
        assert!((avg - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_store_get_or_create_is_lazy_and_stable() {
        let store = SessionStore::new();
        assert!(store.get("s1").await.is_none());

        let first = store.get_or_create("s1").await;
        first.lock().await.append_turn(Speaker::Scammer, "hi");

        let second = store.get_or_create("s1").await;
        assert_eq!(second.lock().await.turn_count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_single_winner_and_identity_aware() {
        let store = SessionStore::new();
        let handle = store.get_or_create("s1").await;
        assert!(store.remove("s1", &handle).await);
        assert!(!store.remove("s1", &handle).await);

        // A session recreated under the same id is not touched by the
        // stale handle.
        let fresh = store.get_or_create("s1").await;
        assert!(!store.remove("s1", &handle).await);
        assert!(store.remove("s1", &fresh).await);
    }

    #[tokio::test]
    async fn test_store_delete_is_noop_on_unknown_id() {
        let store = SessionStore::new();
        store.delete("ghost").await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_sessions_regardless_of_status() {
        let store = SessionStore::new();
        let idle = store.get_or_create("idle").await;
        idle.lock()
            .await
            .backdate_last_activity(Duration::from_secs(7200));
        let terminated = store.get_or_create("terminated").await;
        {
            let mut session = terminated.lock().await;
            session.terminate(TerminationReason::ManuallyTerminated);
            session.backdate_last_activity(Duration::from_secs(7200));
        }

        let removed = store.sweep_expired(HOUR).await;
        assert_eq!(removed, 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_sessions() {
        let store = SessionStore::new();
        let handle = store.get_or_create("fresh").await;
        handle.lock().await.append_turn(Speaker::Scammer, "hi");

        let removed = store.sweep_expired(HOUR).await;
        assert_eq!(removed, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_share_state() {
        let store = SessionStore::new();
        let a = store.get_or_create("a").await;
        a.lock().await.append_turn(Speaker::Scammer, "for a");

        let b = store.get_or_create("b").await;
        assert_eq!(b.lock().await.turn_count(), 0);
    }
}
