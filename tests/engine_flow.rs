//! End-to-end engine flow tests.
//!
//! Drives [`Engine::handle_message`] with the generative capability
//! unavailable, a scripted randomness source, and an unreachable
//! callback endpoint, so every assertion is deterministic.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use straylight::callback::CallbackDispatcher;
use straylight::config::EngagementConfig;
use straylight::engine::Engine;
use straylight::generative::GenerativeText;
use straylight::persona::DEFLECTIONS;
use straylight::reply::{ReplyEngine, ReplyRng};
use straylight::types::ScamIntent;

/// Fixed-draw randomness: always picks index 0, always loses flips.
struct FirstPick;

impl ReplyRng for FirstPick {
    fn pick(&mut self, _len: usize) -> usize {
        0
    }

    fn chance(&mut self, _p: f64) -> bool {
        false
    }
}

fn engagement(max_turns: usize) -> EngagementConfig {
    EngagementConfig {
        max_turns,
        session_timeout_secs: 3600,
        min_turns_for_callback: 3,
    }
}

fn dispatcher() -> CallbackDispatcher {
    // Port 1 is never listening; delivery fails fast and is swallowed.
    CallbackDispatcher::new(
        "http://127.0.0.1:1/report".to_owned(),
        Duration::from_millis(200),
        3,
    )
}

fn engine(max_turns: usize) -> Engine {
    Engine::new(engagement(max_turns), dispatcher(), GenerativeText::Unavailable)
        .with_reply_engine(ReplyEngine::with_rng(Box::new(FirstPick)))
}

const PRIZE_MESSAGE: &str = "You won Rs 50,000! Send UPI to winner@paytm";

#[tokio::test]
async fn test_prize_message_accumulates_intent_and_upi() {
    let engine = engine(20);
    let reply = engine.handle_message("s1", PRIZE_MESSAGE).await;
    assert!(!reply.is_empty());

    let session = engine.session_snapshot("s1").await.expect("session exists");
    assert!(session.intents().contains(&ScamIntent::FakePrize));
    assert!(session.intents().contains(&ScamIntent::UpiScam));
    assert!(session.intelligence().upi_ids.contains("winner@paytm"));
    // Inbound turn plus the agent's reply.
    assert_eq!(session.turn_count(), 2);
}

#[tokio::test]
async fn test_phone_numbers_extracted_with_code_stripped() {
    let engine = engine(20);
    engine
        .handle_message("s1", "Call 9876543210 or +91 8765432109")
        .await;

    let session = engine.session_snapshot("s1").await.expect("session exists");
    let phones = &session.intelligence().phone_numbers;
    assert!(phones.contains("9876543210"));
    assert!(phones.contains("8765432109"));
    assert_eq!(phones.len(), 2);
}

#[tokio::test]
async fn test_plain_message_leaves_session_clean() {
    let engine = engine(20);
    engine.handle_message("s1", "Hello, how are you?").await;

    let session = engine.session_snapshot("s1").await.expect("session exists");
    assert!(session.intents().is_empty());
    assert!(session.intelligence().is_empty());
    assert_eq!(session.average_confidence(), 0.0);
}

#[tokio::test]
async fn test_empty_message_touches_no_state() {
    let engine = engine(20);
    let reply = engine.handle_message("s1", "   ").await;
    assert_eq!(reply, "Hello. How can I help you?");
    assert_eq!(engine.active_session_count().await, 0);
}

#[tokio::test]
async fn test_intelligence_is_monotone_and_deduplicated() {
    let engine = engine(20);
    engine.handle_message("s1", PRIZE_MESSAGE).await;
    let first = engine
        .session_snapshot("s1")
        .await
        .expect("session exists")
        .intelligence()
        .clone();

    engine.handle_message("s1", PRIZE_MESSAGE).await;
    let second = engine
        .session_snapshot("s1")
        .await
        .expect("session exists")
        .intelligence()
        .clone();

    // Same value twice: the set neither shrinks nor grows.
    assert_eq!(first.upi_ids.len(), 1);
    assert_eq!(second.upi_ids.len(), 1);
    assert!(second.upi_ids.is_superset(&first.upi_ids));
}

#[tokio::test]
async fn test_intents_never_lose_elements() {
    let engine = engine(40);
    engine.handle_message("s1", PRIZE_MESSAGE).await;
    let first: Vec<ScamIntent> = engine
        .session_snapshot("s1")
        .await
        .expect("session exists")
        .intents()
        .iter()
        .copied()
        .collect();

    engine.handle_message("s1", "Hello, how are you?").await;
    let session = engine.session_snapshot("s1").await.expect("session exists");
    for intent in first {
        assert!(session.intents().contains(&intent));
    }
}

#[tokio::test]
async fn test_max_turns_terminates_and_deletes_session() {
    // Ceiling 4: msg1 -> 2 turns, msg2 -> 4 turns, msg3 trips the
    // ceiling on append, draws a goodbye and deletes the session.
    let engine = engine(4);
    engine.handle_message("s1", PRIZE_MESSAGE).await;
    engine.handle_message("s1", "tell me more").await;
    assert_eq!(engine.active_session_count().await, 1);

    let goodbye = engine.handle_message("s1", "ok what next").await;
    assert!(!goodbye.is_empty());
    assert_eq!(engine.active_session_count().await, 0);

    // The id is fresh again afterwards.
    engine.handle_message("s1", "hello again").await;
    let session = engine.session_snapshot("s1").await.expect("session exists");
    assert_eq!(session.turn_count(), 2);
}

#[tokio::test]
async fn test_four_scam_messages_qualify_for_callback() {
    let engine = engine(40);
    for _ in 0..4 {
        engine.handle_message("s1", PRIZE_MESSAGE).await;
    }

    let session = engine.session_snapshot("s1").await.expect("session exists");
    assert!(!session.intents().is_empty());
    assert!(session.turn_count() >= 3);
    assert!(dispatcher().should_report(&session));
}

#[tokio::test]
async fn test_callback_never_qualifies_without_intents() {
    let engine = engine(40);
    for _ in 0..6 {
        engine.handle_message("s1", "Hello, how are you?").await;
    }

    let session = engine.session_snapshot("s1").await.expect("session exists");
    assert!(session.intents().is_empty());
    assert!(!dispatcher().should_report(&session));
}

#[tokio::test]
async fn test_bot_probe_gets_deflection_not_tier_reply() {
    let engine = engine(20);
    let reply = engine.handle_message("s1", "are you a bot?").await;
    assert!(
        DEFLECTIONS.contains(&reply.as_str()),
        "expected a deflection, got: {reply}"
    );

    // Same deflection behavior deep into the conversation.
    for _ in 0..5 {
        engine.handle_message("s1", PRIZE_MESSAGE).await;
    }
    let later = engine.handle_message("s1", "seriously, are you an AI?").await;
    assert!(DEFLECTIONS.contains(&later.as_str()));
}

#[tokio::test]
async fn test_manual_termination_is_honored_on_next_message() {
    let engine = engine(20);
    engine.handle_message("s1", PRIZE_MESSAGE).await;
    assert!(engine.terminate_session("s1").await);

    engine.handle_message("s1", "still there?").await;
    assert_eq!(engine.active_session_count().await, 0);
}

#[tokio::test]
async fn test_terminate_unknown_session_is_false() {
    let engine = engine(20);
    assert!(!engine.terminate_session("ghost").await);
}

#[tokio::test]
async fn test_independent_sessions_do_not_interfere() {
    let engine = engine(20);
    engine.handle_message("a", PRIZE_MESSAGE).await;
    engine.handle_message("b", "Hello, how are you?").await;

    let a = engine.session_snapshot("a").await.expect("session exists");
    let b = engine.session_snapshot("b").await.expect("session exists");
    assert!(!a.intents().is_empty());
    assert!(b.intents().is_empty());
    assert_eq!(engine.active_session_count().await, 2);
}

#[tokio::test]
async fn test_concurrent_messages_on_one_session_serialize() {
    let engine = Arc::new(engine(100));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.handle_message("s1", PRIZE_MESSAGE).await
        }));
    }
    for handle in handles {
        handle.await.expect("task should not panic");
    }

    let session = engine.session_snapshot("s1").await.expect("session exists");
    // 8 inbound + 8 agent turns, no lost updates.
    assert_eq!(session.turn_count(), 16);
    assert_eq!(session.intelligence().upi_ids.len(), 1);
}

/// Minimal HTTP endpoint that counts report deliveries. Each request
/// arrives on its own connection because the response closes it.
async fn counting_endpoint(hits: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let hits = Arc::clone(&hits);
            tokio::spawn(async move {
                let mut buf = vec![0_u8; 8192];
                if matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let _ = stream
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nconnection: close\r\ncontent-length: 0\r\n\r\n",
                        )
                        .await;
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_termination_report_is_one_shot_under_racing_messages() {
    let hits = Arc::new(AtomicUsize::new(0));
    let addr = counting_endpoint(Arc::clone(&hits)).await;

    for round in 0..3 {
        let callback = CallbackDispatcher::new(
            format!("http://{addr}/report"),
            Duration::from_secs(2),
            3,
        );
        let engine = Arc::new(
            Engine::new(engagement(2), callback, GenerativeText::Unavailable)
                .with_reply_engine(ReplyEngine::with_rng(Box::new(FirstPick))),
        );

        let id = format!("race-{round}");
        let mut handles = Vec::new();
        for _ in 0..3 {
            let engine = Arc::clone(&engine);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                engine.handle_message(&id, PRIZE_MESSAGE).await
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }
    }

    // Every round terminates its session exactly once however the three
    // messages interleave.
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_force_cleanup_keeps_fresh_sessions() {
    let engine = engine(20);
    engine.handle_message("s1", PRIZE_MESSAGE).await;
    assert_eq!(engine.force_cleanup().await, 0);
    assert_eq!(engine.active_session_count().await, 1);
}
