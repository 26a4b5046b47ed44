//! Per-message orchestration of the engagement session engine.
//!
//! Control flow per inbound message: fetch or create the session, append
//! the incoming turn, classify, extract, merge, evaluate termination;
//! then either say goodbye and fire the one-shot callback, or produce a
//! contextual reply. Network calls (generative reply, enrichment,
//! callback delivery) never run while the session's lock is held.

use tracing::{debug, info};

use crate::callback::CallbackDispatcher;
use crate::classifier::IntentClassifier;
use crate::config::EngagementConfig;
use crate::extractor::IntelligenceExtractor;
use crate::generative::GenerativeText;
use crate::reply::ReplyEngine;
use crate::session::{SessionStore, SessionStatus};
use crate::types::{ScamIntent, Speaker, TerminationReason};

/// Reply for empty or missing inbound text. Session and intelligence
/// state are not touched.
const NEUTRAL_GREETING: &str = "Hello. How can I help you?";

/// The engagement session engine.
pub struct Engine {
    store: SessionStore,
    classifier: IntentClassifier,
    extractor: IntelligenceExtractor,
    reply: ReplyEngine,
    callback: CallbackDispatcher,
    generative: GenerativeText,
    engagement: EngagementConfig,
}

impl Engine {
    /// Build an engine. The generative capability is selected once here
    /// and treated uniformly afterwards.
    pub fn new(
        engagement: EngagementConfig,
        callback: CallbackDispatcher,
        generative: GenerativeText,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            classifier: IntentClassifier::new(),
            extractor: IntelligenceExtractor::new(),
            reply: ReplyEngine::new(),
            callback,
            generative,
            engagement,
        }
    }

    /// Replace the reply engine (deterministic randomness in tests).
    #[must_use]
    pub fn with_reply_engine(mut self, reply: ReplyEngine) -> Self {
        self.reply = reply;
        self
    }

    /// Process one inbound message and produce the outbound reply.
    ///
    /// This is the single entry point the transport layer calls. It
    /// never fails: every failure path inside degrades to deterministic
    /// rule-based behavior.
    pub async fn handle_message(&self, session_id: &str, message: &str) -> String {
        if message.trim().is_empty() {
            debug!(session_id, "empty inbound text, neutral greeting");
            return NEUTRAL_GREETING.to_owned();
        }

        // Pure analysis plus optional enrichment, all before any lock.
        let classification = self.classifier.classify(message);
        let report = self
            .extractor
            .extract_enriched(message, &self.generative)
            .await;

        let handle = self.store.get_or_create(session_id).await;

        // First critical section: record the inbound turn and its
        // analysis, then decide about termination.
        let (termination, intents, agent_turns, history, known_intel) = {
            let mut session = handle.lock().await;
            session.append_turn(Speaker::Scammer, message);
            session.merge_intents(&classification.intents);
            session.record_confidence(classification.confidence);
            session.merge_intelligence(&report);

            let termination = session.evaluate_termination(
                self.engagement.max_turns,
                self.engagement.session_timeout(),
            );
            let intents: Vec<ScamIntent> = session.intents().iter().copied().collect();
            let agent_turns = session.turn_count().saturating_sub(1);
            let history: Vec<String> =
                session.turns().iter().map(|t| t.text.clone()).collect();
            let known_intel: Vec<String> =
                session.intelligence().values().map(str::to_owned).collect();
            (termination, intents, agent_turns, history, known_intel)
        };

        if let Some(reason) = termination {
            return self.finish_session(session_id, &handle, reason).await;
        }

        let reply = self
            .compose_reply(message, &intents, agent_turns, &history, &known_intel)
            .await;

        // Second critical section: record the outbound turn. The session
        // may have been terminated by a racing caller meanwhile, in
        // which case the append is a no-op by invariant.
        handle.lock().await.append_turn(Speaker::Agent, &reply);

        reply
    }

    /// Choose the outbound reply: persona guard first, then the
    /// generative path, then the tiered fallback which always succeeds.
    async fn compose_reply(
        &self,
        message: &str,
        intents: &[ScamIntent],
        agent_turns: usize,
        history: &[String],
        known_intel: &[String],
    ) -> String {
        if let Some(deflection) = self.reply.check_guard(message) {
            debug!("persona guard tripped, deflecting");
            return deflection;
        }

        if let Some(generated) = self.generative.engagement_reply(history).await {
            if leaks_intelligence(&generated, known_intel) {
                debug!("generative reply echoed extracted intelligence, discarding");
            } else {
                return generated;
            }
        }

        self.reply.fallback(intents, agent_turns)
    }

    /// Terminate a session: goodbye turn, one-shot callback, deletion.
    async fn finish_session(
        &self,
        session_id: &str,
        handle: &crate::session::SessionHandle,
        reason: TerminationReason,
    ) -> String {
        let goodbye = self.reply.goodbye();

        let snapshot = {
            let mut session = handle.lock().await;
            session.append_turn(Speaker::Agent, &goodbye);
            session.terminate(reason);
            session.clone()
        };

        // Racing messages can both observe a termination verdict once
        // the evaluation lock is dropped. Removal from the store is the
        // one-shot gate: exactly one caller gets the handle out and owns
        // reporting; losers just return the goodbye.
        if !self.store.remove(session_id, handle).await {
            return goodbye;
        }

        info!(
            session_id,
            reason = reason.as_str(),
            turns = snapshot.turn_count(),
            "session terminated"
        );

        // Delivery is best-effort; the session is already out of the
        // store by now.
        self.callback.dispatch(&snapshot).await;
        self.callback.log_summary(&snapshot);

        goodbye
    }

    /// Flip a live session to terminated from outside the message flow.
    ///
    /// The next inbound message observes the flag, says goodbye, and
    /// runs termination processing. Returns false for an unknown id.
    pub async fn terminate_session(&self, session_id: &str) -> bool {
        match self.store.get(session_id).await {
            Some(handle) => {
                let mut session = handle.lock().await;
                if session.status() == SessionStatus::Active {
                    session.terminate(TerminationReason::ManuallyTerminated);
                }
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of a live session's state, for maintenance
    /// inspection. Returns `None` for an unknown id.
    pub async fn session_snapshot(&self, session_id: &str) -> Option<crate::session::Session> {
        match self.store.get(session_id).await {
            Some(handle) => Some(handle.lock().await.clone()),
            None => None,
        }
    }

    /// Number of live sessions (maintenance side channel).
    pub async fn active_session_count(&self) -> usize {
        self.store.len().await
    }

    /// Sweep idle sessions out of the live store. Returns the number
    /// removed.
    pub async fn force_cleanup(&self) -> usize {
        let removed = self
            .store
            .sweep_expired(self.engagement.session_timeout())
            .await;
        if removed > 0 {
            info!(removed, "idle sessions swept");
        }
        removed
    }
}

/// True when a candidate reply contains any already-extracted
/// intelligence value verbatim.
fn leaks_intelligence(candidate: &str, known_intel: &[String]) -> bool {
    known_intel
        .iter()
        .any(|value| !value.is_empty() && candidate.contains(value.as_str()))
}
