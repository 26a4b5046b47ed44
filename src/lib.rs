//! Straylight, a conversational honeypot engine.
//!
//! Receives text messages from suspected scammers, classifies intent,
//! extracts identifying intelligence, keeps the counterpart talking with
//! plausible human-sounding replies, and reports each qualifying session
//! exactly once to an external endpoint.
//!
//! See `DESIGN.md` for architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod callback;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod extractor;
pub mod generative;
pub mod http;
pub mod logging;
pub mod persona;
pub mod reply;
pub mod session;
pub mod types;
