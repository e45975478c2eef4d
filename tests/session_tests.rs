//! Tests for the session controller: scripted transport, fake clock,
//! reconnect bookkeeping, input handling and the streamed-chunk scenario.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Url;
use tokio::sync::mpsc;

use timmy_chat::panels::Tab;
use timmy_chat::protocol::{HistoryEntry, Role};
use timmy_chat::reconnect::{RetryConfig, RetryPolicy, Sleeper, Strategy};
use timmy_chat::reducer::{BubbleKind, HISTORY_END_MARKER, HISTORY_START_MARKER};
use timmy_chat::render::{Banner, Renderer, Transcript};
use timmy_chat::session::{ConnectionState, OFFLINE_NOTICE};
use timmy_chat::transport::{Connection, Connector, Endpoints};
use timmy_chat::{ClientError, Input, Result, SessionController, SessionOutcome};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Frame(String),
    Fail,
    Close,
    /// Stay silent forever.
    Hold,
}

fn frame(json: &str) -> Scripted {
    Scripted::Frame(json.to_string())
}

struct FakeConnection {
    script: VecDeque<Scripted>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl Connection for FakeConnection {
    async fn recv(&mut self) -> Option<Result<String>> {
        match self.script.pop_front() {
            Some(Scripted::Frame(s)) => Some(Ok(s)),
            Some(Scripted::Fail) => Some(Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            )))),
            Some(Scripted::Close) | None => None,
            Some(Scripted::Hold) => {
                self.script.push_front(Scripted::Hold);
                std::future::pending().await
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out one scripted connection per `connect`; `None` slots and an
/// exhausted queue refuse the connection.
#[derive(Clone, Default)]
struct FakeConnector {
    plan: Arc<Mutex<VecDeque<Option<Vec<Scripted>>>>>,
    connects: Arc<AtomicU32>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl FakeConnector {
    fn with_plan(plan: Vec<Option<Vec<Scripted>>>) -> Self {
        let c = Self::default();
        *c.plan.lock().unwrap() = plan.into();
        c
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    type Conn = FakeConnection;

    async fn connect(&self, _url: &Url) -> Result<FakeConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.plan.lock().unwrap().pop_front() {
            Some(Some(script)) => Ok(FakeConnection {
                script: script.into(),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            }),
            _ => Err(ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "refused",
            ))),
        }
    }
}

/// Records requested delays. With `hold` set, never wakes up.
#[derive(Clone, Default)]
struct FakeSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
    hold: bool,
}

impl FakeSleeper {
    fn holding() -> Self {
        Self {
            hold: true,
            ..Default::default()
        }
    }

    fn delays_ms(&self) -> Vec<u64> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }
}

impl Sleeper for FakeSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
        if self.hold {
            std::future::pending::<()>().await;
        }
    }
}

fn policy(base: u64, cap: u64, max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(RetryConfig {
        strategy: Strategy::Linear,
        base_delay_ms: base,
        max_delay_ms: cap,
        max_attempts,
    })
}

fn endpoints() -> Endpoints {
    Endpoints::from_base("http://127.0.0.1:8000").unwrap()
}

type TestSession = SessionController<FakeConnector, Transcript, FakeSleeper>;

fn session(connector: &FakeConnector, sleeper: &FakeSleeper, policy: RetryPolicy) -> TestSession {
    SessionController::new(
        endpoints(),
        connector.clone(),
        Transcript::new(),
        sleeper.clone(),
        policy,
    )
}

// ---------------------------------------------------------------------------
// Streaming scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_chunks_tool_output_and_fresh_bubble() {
    let connector = FakeConnector::with_plan(vec![Some(vec![
        frame(r#"{"type":"text_chunk","text":"Hel"}"#),
        frame(r#"{"type":"text_chunk","text":"lo"}"#),
        frame(r#"{"type":"tool_output","tool_name":"search","output":"42 results"}"#),
        frame(r#"{"type":"text_chunk","text":"Next"}"#),
        Scripted::Close,
    ])]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(100, 1_000, 1));
    let (_tx, mut rx) = mpsc::channel(8);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::GaveUp { attempts: 1 });
    assert_eq!(
        s.renderer().texts(),
        vec!["Hello", "search output: 42 results", "Next"]
    );
}

#[tokio::test]
async fn test_greeting_shown_on_open() {
    let connector = FakeConnector::with_plan(vec![Some(vec![Scripted::Close])]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1))
        .with_greeting(Some("Connected and ready.".into()));
    let (_tx, mut rx) = mpsc::channel(8);

    s.run(&mut rx).await;

    assert_eq!(s.renderer().texts_of(BubbleKind::Notice), vec!["Connected and ready."]);
}

#[tokio::test]
async fn test_malformed_frame_does_not_drop_connection() {
    let connector = FakeConnector::with_plan(vec![Some(vec![
        frame("this is not json"),
        frame(r#"{"type":"tool_output","tool_name":"search"}"#),
        frame(r#"{"type":"mystery","payload":1}"#),
        frame(r#"{"type":"text","text":"still here"}"#),
        Scripted::Close,
    ])]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    let (_tx, mut rx) = mpsc::channel(8);

    s.run(&mut rx).await;

    assert_eq!(s.renderer().texts(), vec!["still here"]);
    // One successful connect, one failed retry; the bad frames caused no
    // extra reconnect.
    assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_linear_backoff_then_give_up() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(100, 250, 4));
    let (_tx, mut rx) = mpsc::channel(8);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::GaveUp { attempts: 4 });
    assert_eq!(sleeper.delays_ms(), vec![100, 200, 250, 250]);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 5);
    let banners = &s.renderer().banners;
    assert_eq!(banners.last(), Some(&Banner::RefreshRequired));
    assert!(!banners.contains(&Banner::Online));
    assert!(s.is_disposed());
    assert_eq!(s.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_successful_open_resets_attempts() {
    let connector = FakeConnector::with_plan(vec![
        None,
        None,
        Some(vec![Scripted::Close]),
        None,
        None,
        None,
    ]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 1_000, 3));
    let (_tx, mut rx) = mpsc::channel(8);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::GaveUp { attempts: 3 });
    assert_eq!(sleeper.delays_ms(), vec![10, 20, 10, 20, 30]);
}

#[tokio::test]
async fn test_socket_error_flushes_cursor_and_reconnects() {
    let connector = FakeConnector::with_plan(vec![
        Some(vec![
            frame(r#"{"type":"thinking","text":"pondering"}"#),
            frame(r#"{"type":"text_chunk","text":"par"}"#),
            Scripted::Fail,
        ]),
        Some(vec![frame(r#"{"type":"text_chunk","text":"new"}"#), Scripted::Close]),
    ]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    let (_tx, mut rx) = mpsc::channel(8);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::GaveUp { attempts: 1 });
    assert_eq!(s.renderer().texts(), vec!["par", "new"]);
    assert!(s.renderer().progress.is_none());
    let offline = s
        .renderer()
        .banners
        .iter()
        .filter(|b| **b == Banner::Offline)
        .count();
    assert_eq!(offline, 2);
    assert!(s.cursor().is_idle());
}

#[tokio::test]
async fn test_fixed_strategy_constant_delay() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let fixed = RetryPolicy::new(RetryConfig {
        strategy: Strategy::Fixed,
        base_delay_ms: 3_000,
        max_delay_ms: 0,
        max_attempts: 3,
    });
    let mut s = session(&connector, &sleeper, fixed);
    let (_tx, mut rx) = mpsc::channel(8);

    s.run(&mut rx).await;

    assert_eq!(sleeper.delays_ms(), vec![3_000, 3_000, 3_000]);
}

#[tokio::test]
async fn test_quit_closes_socket_and_forgets_connection() {
    let connector = FakeConnector::with_plan(vec![Some(vec![Scripted::Hold])]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    assert!(s.connection_id().is_none());
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(Input::Quit).await.unwrap();

    s.run(&mut rx).await;

    // Disposal forgets the connection.
    assert!(s.connection_id().is_none());
    assert!(connector.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_input_closed_while_offline_disposes() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::holding();
    let mut s = session(&connector, &sleeper, policy(10, 10, 0));
    let (tx, mut rx) = mpsc::channel::<Input>(8);
    drop(tx);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::Disposed);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert_eq!(sleeper.delays_ms(), vec![10]);
    assert!(s.is_disposed());
    assert!(!s.renderer().banners.contains(&Banner::RefreshRequired));
}

// ---------------------------------------------------------------------------
// User input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_user_message_sent_and_blank_rejected() {
    let connector = FakeConnector::with_plan(vec![Some(vec![Scripted::Hold])]);
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(Input::Message("   ".into())).await.unwrap();
    tx.send(Input::Message("".into())).await.unwrap();
    tx.send(Input::Message("hi Timmy".into())).await.unwrap();
    drop(tx);

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::Disposed);
    assert_eq!(connector.sent(), vec![r#"{"message":"hi Timmy"}"#.to_string()]);
    assert_eq!(s.renderer().texts_of(BubbleKind::User), vec!["hi Timmy"]);
    assert!(connector.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_offline_input_is_not_sent() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::holding();
    let mut s = session(&connector, &sleeper, policy(10, 10, 0));
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(Input::SelectTab(Tab::Dreams)).await.unwrap();
    tx.send(Input::Message("anyone there?".into())).await.unwrap();
    tx.send(Input::Message("  ".into())).await.unwrap();
    tx.send(Input::Quit).await.unwrap();

    let outcome = s.run(&mut rx).await;

    assert_eq!(outcome, SessionOutcome::Disposed);
    assert!(connector.sent().is_empty());
    assert_eq!(s.active_tab(), Tab::Dreams);
    assert_eq!(s.renderer().active_tab, Tab::Dreams);
    assert_eq!(s.renderer().texts_of(BubbleKind::Notice), vec![OFFLINE_NOTICE]);
    assert!(s.renderer().texts_of(BubbleKind::User).is_empty());
}

#[test]
fn test_submit_flushes_open_bubble() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    s.handle_frame(r#"{"type":"text_chunk","text":"Hel"}"#);
    let payload = s.submit("next question").unwrap();
    s.handle_frame(r#"{"type":"text_chunk","text":"lo"}"#);

    assert_eq!(payload, r#"{"message":"next question"}"#);
    assert_eq!(s.renderer().texts(), vec!["Hel", "next question", "lo"]);
}

#[test]
fn test_expand_command_uncollapses_last_tool() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    s.handle_frame(r#"{"type":"tool_output","tool_name":"shell","output":"ls"}"#);
    s.handle_view_input(&Input::ExpandTool);
    match &s.renderer().entries[0] {
        timmy_chat::render::Entry::Tool { collapsed, .. } => assert!(!collapsed),
        other => panic!("unexpected {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Panels and history
// ---------------------------------------------------------------------------

#[test]
fn test_panel_events_routed_without_touching_chat() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    s.handle_frame(r#"{"type":"text_chunk","text":"a"}"#);
    s.handle_frame(r#"{"type":"subconscious_thought","text":"first dream"}"#);
    s.handle_frame(r#"{"type":"subconscious_thought","text":"second dream"}"#);
    s.handle_frame(r#"{"type":"pulse","temp":42.5}"#);
    s.handle_view_input(&Input::SelectTab(Tab::Dreams));
    s.handle_view_input(&Input::SelectTab(Tab::Chat));
    s.handle_frame(r#"{"type":"text_chunk","text":"b"}"#);

    assert_eq!(s.panels().dreams, vec!["second dream", "first dream"]);
    assert_eq!(s.panels().temp, Some(42.5));
    assert_eq!(s.renderer().texts(), vec!["ab"]);
}

#[test]
fn test_history_replayed_in_order_and_never_mutated() {
    let connector = FakeConnector::default();
    let sleeper = FakeSleeper::default();
    let mut s = session(&connector, &sleeper, policy(10, 10, 1));
    let entries = vec![
        HistoryEntry { role: Role::User, content: "what is rust?".into() },
        HistoryEntry { role: Role::Assistant, content: "a language".into() },
    ];
    s.replay_history(&entries);
    let replayed = s.renderer().entries.clone();

    s.handle_frame(r#"{"type":"text_chunk","text":"live"}"#);
    s.handle_frame(r#"{"type":"error","text":"oops"}"#);

    assert_eq!(
        s.renderer().texts(),
        vec![HISTORY_START_MARKER, "what is rust?", "a language", HISTORY_END_MARKER, "live", "oops"]
    );
    assert_eq!(&s.renderer().entries[..4], &replayed[..]);
}

#[test]
fn test_renderer_trait_object_usable() {
    let mut t = Transcript::new();
    let r: &mut dyn Renderer = &mut t;
    r.banner(&Banner::Online);
    assert_eq!(t.banners, vec![Banner::Online]);
}
