//! Rule-based intent classifier.
//!
//! Scores a message against per-category regex cue sets. Pure and
//! deterministic: identical input always yields identical output, no
//! external calls. This is deliberately not statistical; pattern cues
//! are injection-resistant and auditable.

use regex::Regex;

use crate::types::ScamIntent;

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// True iff `confidence > 0.3`.
    pub is_scam: bool,
    /// Detected intent labels in detection order. `[ScamIntent::None]`
    /// when no category matched.
    pub intents: Vec<ScamIntent>,
    /// Mean per-category score across detected categories, boosted x1.2
    /// (capped at 1.0) when more than one category matched.
    pub confidence: f64,
}

/// Confidence threshold above which a message counts as a scam.
const SCAM_THRESHOLD: f64 = 0.3;

/// Boost factor applied when multiple categories match.
const MULTI_SIGNAL_BOOST: f64 = 1.2;

/// Cue patterns per intent category. Matched against lowercased text.
const CUE_SETS: &[(ScamIntent, &[&str])] = &[
    (
        ScamIntent::FinancialFraud,
        &[
            r"\b(urgent|immediate|act now|limited time)\b",
            r"\b(bank account|account number|credit card|debit card)\b",
            r"\b(verify|confirm|update).*\b(account|details|information)\b",
            r"\b(suspended|blocked|locked).*\b(account|card)\b",
        ],
    ),
    (
        ScamIntent::Phishing,
        &[
            r"\b(click|visit|go to).*\b(link|url|website)\b",
            r"\b(reset|recover|verify).*\b(password|credentials)\b",
            r"\b(secure|verify|confirm).*\b(identity|account)\b",
            r"\b(unusual activity|suspicious login)\b",
        ],
    ),
    (
        ScamIntent::UpiScam,
        &[
            r"\b(upi|paytm|phonepe|google pay|gpay)\b",
            r"\b(send|transfer|payment).*\b(₹|rs|rupees)\b",
            r"\b(refund|cashback|reward)\b",
            r"\b[a-zA-Z0-9._-]+@[a-zA-Z]+\b", // UPI handle shape
        ],
    ),
    (
        ScamIntent::FakePrize,
        &[
            r"\b(won|winner|congratulations|prize|lottery)\b",
            r"\b(claim|collect).*\b(prize|reward|gift)\b",
            r"\b(lucky|selected|chosen)\b",
            r"\b(free|complimentary).*\b(gift|voucher|coupon)\b",
        ],
    ),
    (
        ScamIntent::JobScam,
        &[
            r"\b(job offer|employment|work from home|part time)\b",
            r"\b(earn|make).*\b(₹|rs|rupees|money)\b",
            r"\b(registration fee|training fee|security deposit)\b",
            r"\b(high income|guaranteed income)\b",
        ],
    ),
    (
        ScamIntent::RomanceScam,
        &[
            r"\b(love|romantic|relationship|dating)\b",
            r"\b(lonely|single|looking for)\b",
            r"\b(money|financial|help|emergency)\b",
            r"\b(meet|video call).*\b(fee|payment)\b",
        ],
    ),
    (
        ScamIntent::TechSupport,
        &[
            r"\b(technical support|tech support|customer support)\b",
            r"\b(virus|malware|security threat)\b",
            r"\b(computer|laptop|device).*\b(infected|compromised)\b",
            r"\b(microsoft|apple|google).*\b(support|team)\b",
        ],
    ),
];

/// Keyword-based scam intent classifier.
///
/// Compiles the cue regexes once at construction.
pub struct IntentClassifier {
    categories: Vec<(ScamIntent, Vec<Regex>, usize)>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    /// Build a classifier with the fixed cue sets compiled.
    pub fn new() -> Self {
        let categories = CUE_SETS
            .iter()
            .map(|(intent, cues)| {
                let compiled: Vec<Regex> =
                    cues.iter().filter_map(|p| Regex::new(p).ok()).collect();
                // Score denominator is the declared cue count, so a cue
                // that fails to compile lowers the ceiling, not the floor.
                (*intent, compiled, cues.len())
            })
            .collect();
        Self { categories }
    }

    /// Classify a message.
    ///
    /// A category is detected when at least one of its cues matches the
    /// lowercased text; its score is `matches / total_cues`. Overall
    /// confidence is the mean across detected categories only.
    pub fn classify(&self, message: &str) -> Classification {
        let lower = message.to_lowercase();

        let mut intents = Vec::new();
        let mut score_sum = 0.0_f64;

        for (intent, cues, total) in &self.categories {
            let matches = cues.iter().filter(|re| re.is_match(&lower)).count();
            if matches > 0 {
                intents.push(*intent);
                #[allow(clippy::cast_precision_loss)] // cue counts are tiny
                {
                    score_sum += matches as f64 / *total as f64;
                }
            }
        }

        if intents.is_empty() {
            return Classification {
                is_scam: false,
                intents: vec![ScamIntent::None],
                confidence: 0.0,
            };
        }

        #[allow(clippy::cast_precision_loss)] // at most 7 categories
        let mut confidence = score_sum / intents.len() as f64;

        if intents.len() > 1 {
            confidence = (confidence * MULTI_SIGNAL_BOOST).min(1.0);
        }

        Classification {
            is_scam: confidence > SCAM_THRESHOLD,
            intents,
            confidence,
        }
    }
}
