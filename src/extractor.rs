//! Intelligence extraction from raw message text.
//!
//! Regex rules are the deterministic floor; an optional generative
//! enrichment pass may add values on top but is never required for
//! correctness and all of its failures are swallowed.

use regex::Regex;
use tracing::{debug, warn};

use crate::generative::GenerativeText;
use crate::types::IntelligenceReport;

/// Payment handle: token at an all-alphabetic domain (`name@bankhandle`).
const UPI_PATTERN: &str = r"\b([a-zA-Z0-9._-]+@[a-zA-Z]+)\b";

/// Indian mobile number, optional country code which is stripped from
/// the captured value.
const PHONE_PATTERN: &str = r"\b(?:\+91|91)?[-.\s]?([6-9]\d{9})\b";

/// http/https URL with host and optional path/query. Scheme and host
/// match case-insensitively.
const URL_PATTERN: &str =
    r"(?i)https?://(?:www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b(?:[-a-zA-Z0-9()@:%_\+.~#?&/=]*)";

/// 9-18 digit run behind an account-indicator word.
const BANK_PATTERN: &str = r"(?i)\b(?:account|a/c|ac)(?:\s+no\.?|\s+number)?\s*:?\s*(\d{9,18})\b";

/// Standard local-part@domain.tld email shape.
const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// Domains that are payment-handle providers, not mail hosts. An email
/// match whose domain contains one of these is counted as a payment
/// handle, never double-counted as an email.
const UPI_PROVIDERS: &[&str] = &[
    "paytm", "oksbi", "ybl", "apl", "axl", "ibl", "icici", "okhdfc",
];

/// Pattern-based intelligence extractor with optional generative
/// enrichment.
pub struct IntelligenceExtractor {
    upi: Option<Regex>,
    phone: Option<Regex>,
    url: Option<Regex>,
    bank: Option<Regex>,
    email: Option<Regex>,
}

impl Default for IntelligenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntelligenceExtractor {
    /// Build an extractor with the fixed patterns compiled.
    pub fn new() -> Self {
        Self {
            upi: Regex::new(UPI_PATTERN).ok(),
            phone: Regex::new(PHONE_PATTERN).ok(),
            url: Regex::new(URL_PATTERN).ok(),
            bank: Regex::new(BANK_PATTERN).ok(),
            email: Regex::new(EMAIL_PATTERN).ok(),
        }
    }

    /// Extract the five intelligence sets from a message.
    ///
    /// Pure and deterministic; values are deduplicated within the call
    /// (set semantics) and empty strings never enter a set.
    pub fn extract(&self, message: &str) -> IntelligenceReport {
        let mut report = IntelligenceReport::default();

        if let Some(re) = &self.upi {
            for caps in re.captures_iter(message) {
                if let Some(m) = caps.get(1) {
                    report.upi_ids.insert(m.as_str().to_owned());
                }
            }
        }

        if let Some(re) = &self.phone {
            for caps in re.captures_iter(message) {
                if let Some(m) = caps.get(1) {
                    report.phone_numbers.insert(m.as_str().to_owned());
                }
            }
        }

        if let Some(re) = &self.url {
            for m in re.find_iter(message) {
                report.urls.insert(m.as_str().to_owned());
            }
        }

        if let Some(re) = &self.bank {
            for caps in re.captures_iter(message) {
                if let Some(m) = caps.get(1) {
                    report.bank_accounts.insert(m.as_str().to_owned());
                }
            }
        }

        if let Some(re) = &self.email {
            for m in re.find_iter(message) {
                let candidate = m.as_str();
                if !is_payment_handle(candidate) {
                    report.email_addresses.insert(candidate.to_owned());
                }
            }
        }

        debug!(
            upi_ids = report.upi_ids.len(),
            phone_numbers = report.phone_numbers.len(),
            urls = report.urls.len(),
            bank_accounts = report.bank_accounts.len(),
            emails = report.email_addresses.len(),
            "intelligence extracted"
        );

        report
    }

    /// Extract with the generative enrichment pass layered on top.
    ///
    /// The regex result is always the floor. Enrichment failure,
    /// unavailability, or malformed output leaves the floor untouched.
    pub async fn extract_enriched(
        &self,
        message: &str,
        generative: &GenerativeText,
    ) -> IntelligenceReport {
        let mut report = self.extract(message);

        match generative.extract_intelligence(message).await {
            Some(enrichment) => report.merge(&enrichment),
            None => {
                if generative.is_available() {
                    warn!("generative enrichment unavailable for this message");
                }
            }
        }

        report
    }
}

/// True when an email-shaped string routes to a payment provider.
fn is_payment_handle(email: &str) -> bool {
    let domain = email.rsplit('@').next().unwrap_or_default().to_lowercase();
    UPI_PROVIDERS.iter().any(|p| domain.contains(p))
}

/// Union any number of reports into one deduplicated report.
pub fn merge_reports(reports: &[IntelligenceReport]) -> IntelligenceReport {
    let mut merged = IntelligenceReport::default();
    for report in reports {
        merged.merge(report);
    }
    merged
}
