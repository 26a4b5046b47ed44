//! One-shot reporting callback at session termination.
//!
//! Dispatch is best-effort: gating skips sessions without scam signal or
//! enough engagement, delivery runs once under a bounded timeout, and
//! failure is logged without retry. It never blocks session deletion
//! and never surfaces to the caller.

use std::time::Duration;

use tracing::{error, info};

use crate::session::Session;
use crate::types::{CallbackPayload, ReportedIntelligence};

/// Keyword lexicon scanned over the whole conversation history for the
/// `suspiciousKeywords` payload field.
const SUSPICIOUS_TERMS: &[&str] = &[
    "urgent",
    "prize",
    "won",
    "lottery",
    "claim",
    "verify",
    "account",
    "suspended",
    "blocked",
    "bank",
    "upi",
    "transfer",
    "payment",
];

/// Upper bound on reported suspicious keywords.
const MAX_KEYWORDS: usize = 10;

/// Delivers the terminal session summary to the reporting endpoint.
pub struct CallbackDispatcher {
    url: String,
    timeout: Duration,
    min_turns: usize,
    client: reqwest::Client,
}

impl CallbackDispatcher {
    /// Create a dispatcher for a fixed endpoint.
    pub fn new(url: String, timeout: Duration, min_turns: usize) -> Self {
        Self {
            url,
            timeout,
            min_turns,
            client: reqwest::Client::new(),
        }
    }

    /// Gating: report only sessions with some scam signal and enough
    /// engagement.
    pub fn should_report(&self, session: &Session) -> bool {
        if session.intents().is_empty() {
            info!(session_id = session.id(), "no scam signal, skipping callback");
            return false;
        }
        if session.turn_count() < self.min_turns {
            info!(
                session_id = session.id(),
                turns = session.turn_count(),
                "insufficient engagement, skipping callback"
            );
            return false;
        }
        true
    }

    /// Build the summary payload for a terminal session.
    ///
    /// Email addresses are internal-only and never forwarded.
    pub fn build_payload(&self, session: &Session) -> CallbackPayload {
        let intel = session.intelligence();
        CallbackPayload {
            session_id: session.id().to_owned(),
            scam_detected: true,
            total_messages_exchanged: session.turn_count(),
            extracted_intelligence: ReportedIntelligence {
                bank_accounts: intel.bank_accounts.iter().cloned().collect(),
                upi_ids: intel.upi_ids.iter().cloned().collect(),
                phishing_links: intel.urls.iter().cloned().collect(),
                phone_numbers: intel.phone_numbers.iter().cloned().collect(),
                suspicious_keywords: extract_keywords(session),
            },
            agent_notes: synthesize_notes(session),
        }
    }

    /// Dispatch the callback for a terminated session.
    ///
    /// Returns whether delivery succeeded. Skipped (gated) sessions and
    /// delivery failures both return false; neither is an error to the
    /// caller.
    pub async fn dispatch(&self, session: &Session) -> bool {
        if !self.should_report(session) {
            return false;
        }

        let payload = self.build_payload(session);

        let result = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(session_id = session.id(), "callback delivered");
                true
            }
            Ok(response) => {
                error!(
                    session_id = session.id(),
                    status = response.status().as_u16(),
                    "callback rejected by reporting endpoint"
                );
                false
            }
            Err(e) => {
                error!(session_id = session.id(), error = %e, "callback delivery failed");
                false
            }
        }
    }

    /// Log the terminal session summary.
    pub fn log_summary(&self, session: &Session) {
        let intents: Vec<&str> = session.intents().iter().map(|i| i.as_str()).collect();
        info!(
            session_id = session.id(),
            turns = session.turn_count(),
            intents = ?intents,
            avg_confidence = session.average_confidence(),
            duration_secs = session.duration_secs(),
            upi_ids = session.intelligence().upi_ids.len(),
            phone_numbers = session.intelligence().phone_numbers.len(),
            urls = session.intelligence().urls.len(),
            bank_accounts = session.intelligence().bank_accounts.len(),
            reason = session.termination_reason().map(|r| r.as_str()),
            "session summary"
        );
    }
}

/// Lexicon keywords seen anywhere in the history, first-seen order,
/// capped at [`MAX_KEYWORDS`].
fn extract_keywords(session: &Session) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for turn in session.turns() {
        let lower = turn.text.to_lowercase();
        for term in SUSPICIOUS_TERMS {
            if lower.contains(term) && !keywords.iter().any(|k| k == term) {
                keywords.push((*term).to_owned());
            }
        }
    }
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Short free-text synthesis of intents and intelligence volume.
fn synthesize_notes(session: &Session) -> String {
    let intents: Vec<&str> = session.intents().iter().map(|i| i.as_str()).collect();
    let intent_str = if intents.is_empty() {
        "generic scam".to_owned()
    } else {
        intents.join(", ")
    };

    format!(
        "Detected {intent_str} attempt. Engaged for {} messages. Extracted {} intelligence items.",
        session.turn_count(),
        session.intelligence().reportable_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntelligenceReport, ScamIntent, Speaker};

    fn dispatcher() -> CallbackDispatcher {
        CallbackDispatcher::new(
            "http://127.0.0.1:1/report".to_owned(),
            Duration::from_millis(200),
            3,
        )
    }

    fn scam_session(turns: usize) -> Session {
        let mut session = Session::new("cb-1");
        for i in 0..turns {
            let speaker = if i % 2 == 0 {
                Speaker::Scammer
            } else {
                Speaker::Agent
            };
            session.append_turn(speaker, "urgent: claim your prize via upi payment");
        }
        session.merge_intents(&[ScamIntent::FakePrize, ScamIntent::UpiScam]);
        let mut report = IntelligenceReport::default();
        report.upi_ids.insert("winner@paytm".to_owned());
        report.email_addresses.insert("scam@gmail.com".to_owned());
        session.merge_intelligence(&report);
        session
    }

    #[test]
    fn test_gating_rejects_empty_intents() {
        let mut session = Session::new("cb-2");
        for _ in 0..10 {
            session.append_turn(Speaker::Scammer, "hello");
        }
        assert!(!dispatcher().should_report(&session));
    }

    #[test]
    fn test_gating_rejects_insufficient_engagement() {
        let session = scam_session(2);
        assert!(!dispatcher().should_report(&session));
    }

    #[test]
    fn test_gating_passes_qualifying_session() {
        let session = scam_session(4);
        assert!(dispatcher().should_report(&session));
    }

    #[test]
    fn test_payload_excludes_emails() {
        let session = scam_session(4);
        let payload = dispatcher().build_payload(&session);
        assert_eq!(payload.extracted_intelligence.upi_ids, vec!["winner@paytm"]);
        let json = serde_json::to_string(&payload).expect("should serialize");
        assert!(!json.contains("gmail.com"));
    }

    #[test]
    fn test_payload_scam_detected_and_turn_count() {
        let session = scam_session(5);
        let payload = dispatcher().build_payload(&session);
        assert!(payload.scam_detected);
        assert_eq!(payload.total_messages_exchanged, 5);
        assert_eq!(payload.session_id, "cb-1");
    }

    #[test]
    fn test_keywords_bounded_and_deduplicated() {
        let mut session = Session::new("cb-3");
        session.append_turn(
            Speaker::Scammer,
            "urgent urgent prize won lottery claim verify account suspended blocked bank upi transfer payment",
        );
        let keywords = extract_keywords(&session);
        assert!(keywords.len() <= MAX_KEYWORDS);
        assert_eq!(keywords.iter().filter(|k| *k == "urgent").count(), 1);
    }

    #[test]
    fn test_notes_mention_intents_and_volume() {
        let session = scam_session(4);
        let notes = synthesize_notes(&session);
        assert!(notes.contains("fake_prize"));
        assert!(notes.contains("4 messages"));
        assert!(notes.contains("1 intelligence items"));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        // Port 1 is unreachable; delivery fails but returns cleanly.
        let session = scam_session(4);
        assert!(!dispatcher().dispatch(&session).await);
    }

    #[tokio::test]
    async fn test_dispatch_skips_gated_session() {
        let session = scam_session(1);
        assert!(!dispatcher().dispatch(&session).await);
    }
}
