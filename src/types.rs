//! Shared core types: intent labels, conversation turns, intelligence
//! reports, and the outbound callback payload.
//!
//! The [`ScamIntent`] enum is the single source of truth for the intent
//! label space: the classifier, the session record, and the callback all
//! share it by value, with a stable snake_case string serialization.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scam intent categories detected by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScamIntent {
    /// Bank/card fraud pressure tactics.
    FinancialFraud,
    /// Credential or identity phishing.
    Phishing,
    /// Payment-app (UPI) transfer scams.
    UpiScam,
    /// Fake prize / lottery winnings.
    FakePrize,
    /// Fraudulent job offers with upfront fees.
    JobScam,
    /// Romance-then-money scams.
    RomanceScam,
    /// Fake tech-support threats.
    TechSupport,
    /// No scam signal detected. Never stored on a session.
    None,
}

impl ScamIntent {
    /// Stable string form used in logs and callback notes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinancialFraud => "financial_fraud",
            Self::Phishing => "phishing",
            Self::UpiScam => "upi_scam",
            Self::FakePrize => "fake_prize",
            Self::JobScam => "job_scam",
            Self::RomanceScam => "romance_scam",
            Self::TechSupport => "tech_support",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for ScamIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the conversation produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The counterpart being engaged.
    Scammer,
    /// The honeypot agent.
    Agent,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The configured turn ceiling was reached.
    MaxTurnsReached,
    /// The session idled past the configured timeout.
    SessionTimeout,
    /// An external caller flipped the session to terminated.
    ManuallyTerminated,
}

impl TerminationReason {
    /// Stable string form used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxTurnsReached => "max_turns_reached",
            Self::SessionTimeout => "session_timeout",
            Self::ManuallyTerminated => "manually_terminated",
        }
    }
}

/// A single conversation turn, appended in conversational order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it.
    pub speaker: Speaker,
    /// Raw message text. Empty strings are allowed.
    pub text: String,
    /// When the turn was appended.
    pub timestamp: DateTime<Utc>,
}

/// Structured artifacts mined from message text.
///
/// All five sets are deduplicated and never contain empty strings.
/// Merging is union-only: a report's sets never shrink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligenceReport {
    /// Payment handles (UPI-style `alias@provider` tokens).
    pub upi_ids: BTreeSet<String>,
    /// 10-digit mobile numbers, country code stripped.
    pub phone_numbers: BTreeSet<String>,
    /// http/https URLs.
    pub urls: BTreeSet<String>,
    /// 9-18 digit bank account numbers.
    pub bank_accounts: BTreeSet<String>,
    /// Email addresses, excluding payment-handle providers.
    pub email_addresses: BTreeSet<String>,
}

impl IntelligenceReport {
    /// Union another report into this one, skipping empty strings.
    pub fn merge(&mut self, other: &IntelligenceReport) {
        merge_set(&mut self.upi_ids, &other.upi_ids);
        merge_set(&mut self.phone_numbers, &other.phone_numbers);
        merge_set(&mut self.urls, &other.urls);
        merge_set(&mut self.bank_accounts, &other.bank_accounts);
        merge_set(&mut self.email_addresses, &other.email_addresses);
    }

    /// Total number of externally reportable items (emails excluded).
    pub fn reportable_count(&self) -> usize {
        self.upi_ids
            .len()
            .saturating_add(self.phone_numbers.len())
            .saturating_add(self.urls.len())
            .saturating_add(self.bank_accounts.len())
    }

    /// True when all five sets are empty.
    pub fn is_empty(&self) -> bool {
        self.upi_ids.is_empty()
            && self.phone_numbers.is_empty()
            && self.urls.is_empty()
            && self.bank_accounts.is_empty()
            && self.email_addresses.is_empty()
    }

    /// Iterate every stored value across all five sets.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.upi_ids
            .iter()
            .chain(self.phone_numbers.iter())
            .chain(self.urls.iter())
            .chain(self.bank_accounts.iter())
            .chain(self.email_addresses.iter())
            .map(String::as_str)
    }
}

fn merge_set(into: &mut BTreeSet<String>, from: &BTreeSet<String>) {
    for value in from {
        if !value.is_empty() {
            into.insert(value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Callback wire types
// ---------------------------------------------------------------------------

/// Intelligence block inside the callback payload.
///
/// Field names are fixed by the external system of record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedIntelligence {
    /// Bank account numbers.
    #[serde(rename = "bankAccounts")]
    pub bank_accounts: Vec<String>,
    /// Payment handles.
    #[serde(rename = "upiIds")]
    pub upi_ids: Vec<String>,
    /// URLs observed in the conversation.
    #[serde(rename = "phishingLinks")]
    pub phishing_links: Vec<String>,
    /// Phone numbers.
    #[serde(rename = "phoneNumbers")]
    pub phone_numbers: Vec<String>,
    /// Up to 10 suspicious keywords seen anywhere in the history.
    #[serde(rename = "suspiciousKeywords")]
    pub suspicious_keywords: Vec<String>,
}

/// One-shot summary delivered to the external reporting endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    /// Session identifier as supplied by the transport.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Always true when the payload is sent; gating guarantees it.
    #[serde(rename = "scamDetected")]
    pub scam_detected: bool,
    /// Total turns appended, both speakers counted.
    #[serde(rename = "totalMessagesExchanged")]
    pub total_messages_exchanged: usize,
    /// The four externally reportable intelligence sets plus keywords.
    #[serde(rename = "extractedIntelligence")]
    pub extracted_intelligence: ReportedIntelligence,
    /// Short free-text synthesis of intents and intelligence volume.
    #[serde(rename = "agentNotes")]
    pub agent_notes: String,
}
