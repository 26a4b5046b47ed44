//! Tiered reply strategy.
//!
//! Deterministic turn-band tiers over canned reply pools, with weighted
//! random selection inside a tier. Randomness comes through the
//! [`ReplyRng`] seam so tests can script draws and assert tier selection.
//! This fallback path must always succeed without the generative
//! capability.

use std::sync::Mutex;

use rand::Rng;

use crate::persona::{PersonaGuard, DEFLECTIONS};
use crate::types::ScamIntent;

/// Injected randomness source for reply selection.
pub trait ReplyRng: Send {
    /// Pick an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
    /// Weighted coin flip, true with probability `p`.
    fn chance(&mut self, p: f64) -> bool;
}

/// Production randomness backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl ReplyRng for ThreadRandom {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len.max(1))
    }

    fn chance(&mut self, p: f64) -> bool {
        rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
    }
}

// ---------------------------------------------------------------------------
// Reply pools
// ---------------------------------------------------------------------------

const INITIAL_REPLIES: &[&str] = &[
    "Hello! Thanks for reaching out. What is this about?",
    "Hi there! I got your message. Can you tell me more?",
    "Hey! I'm interested. Please explain more.",
    "Hello! This sounds interesting. What do I need to do?",
    "Arre, thoda samajh nahi aa raha. Batao zara.",
];

const CURIOUS_REPLIES: &[&str] = &[
    "That sounds interesting. Can you provide more details?",
    "I'm not sure I understand. Can you explain further?",
    "This is new to me. How does it work exactly?",
    "Could you tell me more about this?",
    "Thoda clearly samjhaoge kya?",
];

const FINANCIAL_REPLIES: &[&str] = &[
    "What payment method do you accept?",
    "How much do I need to pay?",
    "Can you send me your payment details?",
    "Is there a processing fee involved?",
    "UPI ya bank details share karoge?",
];

const PRIZE_REPLIES: &[&str] = &[
    "Really? I won something? That's amazing!",
    "What prize did I win? How do I claim it?",
    "This is exciting! What do I need to do to get my prize?",
    "I didn't enter any contest. Are you sure it's me?",
];

const JOB_REPLIES: &[&str] = &[
    "This job sounds perfect! What are the details?",
    "I'm looking for work. What's the salary?",
    "Is this full-time or part-time? What are the requirements?",
    "When can I start? Do I need to pay anything upfront?",
];

const STALLING_REPLIES: &[&str] = &[
    "Let me check my account and get back to you.",
    "I need to discuss this with my family first.",
    "Can you give me some time to think about it?",
    "I'm at work right now. Can we continue this later?",
];

const ENGAGEMENT_REPLIES: &[&str] = &[
    "Okay, I'm ready. What should I do next?",
    "I understand. Please guide me through the process.",
    "I'm interested in proceeding. What's the next step?",
    "Sounds good. How do we move forward?",
];

const VERIFICATION_REPLIES: &[&str] = &[
    "I think I need more time to consider this.",
    "Let me verify this information first.",
    "I'll get back to you after checking.",
    "This is taking longer than I expected. Can we pause?",
];

const GOODBYE_REPLIES: &[&str] = &[
    "Accha, main thoda check karke batata hoon.",
    "Let me think about it and get back to you.",
    "Abhi thoda busy hoon, baad mein baat karte hain.",
];

/// Intents that make the payment-detail-probing branch eligible.
const PAYMENT_INTENTS: &[ScamIntent] = &[
    ScamIntent::FinancialFraud,
    ScamIntent::UpiScam,
    ScamIntent::FakePrize,
];

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Tiered reply selection over canned pools.
pub struct ReplyEngine {
    guard: PersonaGuard,
    rng: Mutex<Box<dyn ReplyRng>>,
}

impl Default for ReplyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyEngine {
    /// Build with the production randomness source.
    pub fn new() -> Self {
        Self::with_rng(Box::new(ThreadRandom))
    }

    /// Build with an injected randomness source (deterministic tests).
    pub fn with_rng(rng: Box<dyn ReplyRng>) -> Self {
        Self {
            guard: PersonaGuard::new(),
            rng: Mutex::new(rng),
        }
    }

    /// Persona guard, checked before any other reply logic.
    ///
    /// Returns a deflection utterance when the message probes the
    /// agent's nature or attempts an instruction override.
    pub fn check_guard(&self, message: &str) -> Option<String> {
        if self.guard.is_suspicious(message) {
            Some(self.choose(DEFLECTIONS))
        } else {
            None
        }
    }

    /// Rule-based tiered reply. `agent_turns` counts previous agent
    /// replies in the session (the inbound turn just appended excluded).
    pub fn fallback(&self, intents: &[ScamIntent], agent_turns: usize) -> String {
        // Turn 0: opening acknowledgment.
        if agent_turns == 0 {
            return self.choose(INITIAL_REPLIES);
        }

        // Turns 1-3: intent-specific curiosity.
        if agent_turns <= 3 {
            if intents.contains(&ScamIntent::FakePrize) {
                return self.choose(PRIZE_REPLIES);
            }
            if intents.contains(&ScamIntent::JobScam) {
                return self.choose(JOB_REPLIES);
            }
            return self.choose(CURIOUS_REPLIES);
        }

        // Turns 4-8: probe for payment details when the intents warrant.
        if agent_turns <= 8 {
            if intents.iter().any(|i| PAYMENT_INTENTS.contains(i)) && self.flip(0.6) {
                return self.choose(FINANCIAL_REPLIES);
            }
            if self.flip(0.4) {
                return self.choose(CURIOUS_REPLIES);
            }
            return self.choose(ENGAGEMENT_REPLIES);
        }

        // Turns 9-15: stall or probe, 50/50.
        if agent_turns <= 15 {
            if self.flip(0.5) {
                return self.choose(STALLING_REPLIES);
            }
            return self.choose(FINANCIAL_REPLIES);
        }

        // Turns 16+: generic verification/stalling.
        self.choose(VERIFICATION_REPLIES)
    }

    /// Closing utterance used only at termination.
    pub fn goodbye(&self) -> String {
        self.choose(GOODBYE_REPLIES)
    }

    fn choose(&self, pool: &[&str]) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let idx = rng.pick(pool.len());
        pool.get(idx)
            .or_else(|| pool.first())
            .map(|s| (*s).to_owned())
            .unwrap_or_default()
    }

    fn flip(&self, p: f64) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.chance(p)
    }
}
