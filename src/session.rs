//! Session controller: owns the connection, the render cursor, the retry
//! policy and the panel state for one chat session.
//!
//! ## Lifecycle
//! 1. [`SessionController::new`] builds an idle controller.
//! 2. [`SessionController::replay_history`] renders past messages (optional).
//! 3. [`SessionController::run`] connects and multiplexes socket frames and
//!    user input until the input side closes or the retry policy gives up.
//! 4. [`SessionController::dispose`] flushes the cursor and marks the
//!    session finished. `run` calls it on exit.
//!
//! Every handler runs to completion before the next frame or input is looked
//! at; the connection is the only resource and is replaced wholesale on
//! reconnect.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::panels::{PanelBoard, Tab, TabRouter};
use crate::protocol::{decode_event, HistoryEntry, InboundEvent};
use crate::reconnect::{RetryDecision, RetryPolicy, Sleeper};
use crate::reducer::{self, RenderCursor, RenderInstruction, Transition};
use crate::render::{Banner, Renderer};
use crate::transport::{Connection, Connector, Endpoints};

pub const OFFLINE_NOTICE: &str = "Not connected. Message not sent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One line of user input, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Message(String),
    SelectTab(Tab),
    /// Re-show the active panel.
    ShowPanel,
    ExpandTool,
    Quit,
}

impl Input {
    /// Classify a raw input line. Slash commands that are not recognised are
    /// sent as ordinary messages.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.split_once(char::is_whitespace) {
            Some(("/tab", name)) => match name.parse::<Tab>() {
                Ok(tab) => Input::SelectTab(tab),
                Err(_) => Input::Message(line.to_string()),
            },
            _ => match trimmed {
                "/quit" | "/exit" => Input::Quit,
                "/panel" => Input::ShowPanel,
                "/expand" => Input::ExpandTool,
                _ => Input::Message(line.to_string()),
            },
        }
    }
}

/// Why [`SessionController::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The user quit or the input stream ended.
    Disposed,
    /// The retry policy ran out of attempts.
    GaveUp { attempts: u32 },
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Disposed => write!(f, "disposed"),
            SessionOutcome::GaveUp { attempts } => write!(f, "gave up after {} attempts", attempts),
        }
    }
}

enum Step {
    Frame(Option<crate::error::Result<String>>),
    Input(Option<Input>),
}

enum PumpEnd {
    Disconnected,
    InputClosed,
}

pub struct SessionController<C, R, S>
where
    C: Connector,
    R: Renderer,
    S: Sleeper + Clone,
{
    id: Uuid,
    endpoints: Endpoints,
    connector: C,
    renderer: R,
    sleeper: S,
    policy: RetryPolicy,
    cursor: RenderCursor,
    panels: PanelBoard,
    router: TabRouter,
    state: ConnectionState,
    connection_id: Option<Uuid>,
    greeting: Option<String>,
    disposed: bool,
}

impl<C, R, S> SessionController<C, R, S>
where
    C: Connector,
    R: Renderer,
    S: Sleeper + Clone,
{
    pub fn new(endpoints: Endpoints, connector: C, renderer: R, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoints,
            connector,
            renderer,
            sleeper,
            policy,
            cursor: RenderCursor::new(),
            panels: PanelBoard::new(),
            router: TabRouter::new(),
            state: ConnectionState::Closed,
            connection_id: None,
            greeting: None,
            disposed: false,
        }
    }

    /// Notice shown each time a connection opens.
    pub fn with_greeting(mut self, greeting: Option<String>) -> Self {
        self.greeting = greeting;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity of the current connection; a new one is minted per attempt.
    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection_id
    }

    pub fn cursor(&self) -> &RenderCursor {
        &self.cursor
    }

    pub fn panels(&self) -> &PanelBoard {
        &self.panels
    }

    pub fn active_tab(&self) -> Tab {
        self.router.active()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Render the stored transcript once, before any live event.
    pub fn replay_history(&mut self, entries: &[HistoryEntry]) {
        let t = reducer::replay(std::mem::take(&mut self.cursor), entries);
        self.commit(t);
    }

    /// Decode and apply one inbound text frame. Malformed frames are dropped.
    pub fn handle_frame(&mut self, raw: &str) {
        if let Some(event) = decode_event(raw) {
            self.handle_event(&event);
        }
    }

    pub fn handle_event(&mut self, event: &InboundEvent) {
        let t = reducer::reduce(std::mem::take(&mut self.cursor), event);
        self.commit(t);
    }

    /// Stage a user message. Returns the JSON payload to transmit, or `None`
    /// when the input was blank.
    pub fn submit(&mut self, raw: &str) -> Option<String> {
        let Some(s) = reducer::submit(self.cursor.clone(), raw) else {
            debug!(session_id = %self.id, "ignoring blank input");
            return None;
        };
        let payload = match s.outbound.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "failed to encode outbound message");
                return None;
            }
        };
        self.commit(Transition {
            cursor: s.cursor,
            instructions: s.instructions,
        });
        Some(payload)
    }

    /// View commands that never touch the socket.
    pub fn handle_view_input(&mut self, input: &Input) {
        match input {
            Input::SelectTab(tab) => {
                self.router.select(*tab);
                self.renderer.select_tab(*tab, &self.panels);
            }
            Input::ShowPanel => self.renderer.select_tab(self.router.active(), &self.panels),
            Input::ExpandTool => self.renderer.expand_last_tool(),
            Input::Message(_) | Input::Quit => {}
        }
    }

    /// Flush the cursor and mark the session finished.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        let t = reducer::flush(std::mem::take(&mut self.cursor));
        self.commit(t);
        self.state = ConnectionState::Closed;
        self.connection_id = None;
        self.disposed = true;
        info!(session_id = %self.id, "session disposed");
    }

    /// Connect and serve until the input closes or the retry policy gives up.
    pub async fn run(&mut self, input: &mut mpsc::Receiver<Input>) -> SessionOutcome {
        while !self.disposed {
            self.state = ConnectionState::Connecting;
            let conn_id = Uuid::new_v4();
            self.connection_id = Some(conn_id);
            self.renderer.banner(&Banner::Connecting {
                attempt: self.policy.attempts(),
            });

            match self.connector.connect(&self.endpoints.socket).await {
                Ok(mut conn) => {
                    self.on_open(conn_id);
                    let end = self.pump(&mut conn, input).await;
                    if let PumpEnd::InputClosed = end {
                        conn.close().await;
                        self.dispose();
                        return SessionOutcome::Disposed;
                    }
                }
                Err(e) => {
                    warn!(
                        session_id = %self.id,
                        connection_id = %conn_id,
                        url = %self.endpoints.socket,
                        error = %e,
                        "connect failed"
                    );
                }
            }

            self.on_close();

            match self.policy.on_close() {
                RetryDecision::Retry { attempt, delay } => {
                    info!(
                        session_id = %self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    self.renderer.banner(&Banner::Reconnecting { attempt, delay });
                    if self.wait_offline(delay, input).await {
                        self.dispose();
                        return SessionOutcome::Disposed;
                    }
                }
                RetryDecision::GiveUp { attempts } => {
                    error!(
                        session_id = %self.id,
                        attempts,
                        url = %self.endpoints.socket,
                        "reconnect limit reached, giving up"
                    );
                    self.renderer.banner(&Banner::RefreshRequired);
                    self.dispose();
                    return SessionOutcome::GaveUp { attempts };
                }
            }
        }
        SessionOutcome::Disposed
    }

    fn on_open(&mut self, conn_id: Uuid) {
        info!(session_id = %self.id, connection_id = %conn_id, url = %self.endpoints.socket, "connected");
        self.state = ConnectionState::Open;
        self.policy.on_open();
        self.renderer.banner(&Banner::Online);
        if let Some(greeting) = self.greeting.clone() {
            let t = reducer::notice(std::mem::take(&mut self.cursor), &greeting);
            self.commit(t);
        }
    }

    fn on_close(&mut self) {
        let was_open = self.state == ConnectionState::Open;
        self.state = ConnectionState::Closed;
        if was_open {
            self.renderer.banner(&Banner::Offline);
        }
        let t = reducer::flush(std::mem::take(&mut self.cursor));
        self.commit(t);
    }

    async fn pump(&mut self, conn: &mut C::Conn, input: &mut mpsc::Receiver<Input>) -> PumpEnd {
        loop {
            let step = tokio::select! {
                frame = conn.recv() => Step::Frame(frame),
                cmd = input.recv() => Step::Input(cmd),
            };

            match step {
                Step::Frame(Some(Ok(raw))) => self.handle_frame(&raw),
                Step::Frame(Some(Err(e))) => {
                    warn!(session_id = %self.id, connection_id = ?self.connection_id, error = %e, "socket error");
                    return PumpEnd::Disconnected;
                }
                Step::Frame(None) => {
                    info!(session_id = %self.id, connection_id = ?self.connection_id, "server closed connection");
                    return PumpEnd::Disconnected;
                }
                Step::Input(None) | Step::Input(Some(Input::Quit)) => return PumpEnd::InputClosed,
                Step::Input(Some(Input::Message(text))) => {
                    if let Some(payload) = self.submit(&text) {
                        if let Err(e) = conn.send(payload).await {
                            warn!(session_id = %self.id, error = %e, "send failed");
                            return PumpEnd::Disconnected;
                        }
                    }
                }
                Step::Input(Some(view)) => self.handle_view_input(&view),
            }
        }
    }

    /// Wait out a reconnect delay while still serving view commands.
    /// Returns `true` when the user quit or the input closed.
    async fn wait_offline(&mut self, delay: std::time::Duration, input: &mut mpsc::Receiver<Input>) -> bool {
        let sleeper = self.sleeper.clone();
        let sleep = sleeper.sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                cmd = input.recv() => match cmd {
                    None | Some(Input::Quit) => return true,
                    Some(Input::Message(text)) => {
                        if !text.trim().is_empty() {
                            let t = reducer::notice(std::mem::take(&mut self.cursor), OFFLINE_NOTICE);
                            self.commit(t);
                        }
                    }
                    Some(view) => self.handle_view_input(&view),
                },
            }
        }
    }

    fn commit(&mut self, t: Transition) {
        self.cursor = t.cursor;
        for instruction in &t.instructions {
            if let RenderInstruction::Panel(update) = instruction {
                self.panels.apply(update);
            }
            self.renderer.apply(instruction);
        }
    }
}
