//! Shell state machine.
//!
//! [`App`] turns key presses and session results into [`AppAction`]s for the
//! runtime to execute. It performs no I/O, so every behavior of the shell is
//! testable without a terminal.

use ryxmsg_client::Received;
use ryxmsg_core::PeerIdentity;

use crate::{
    commands::{self, Command},
    input::{InputState, KeyInput},
};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Send a message to a peer.
    Send {
        /// Recipient.
        peer: PeerIdentity,
        /// Message payload.
        payload: Vec<u8>,
    },

    /// Wait for one incoming message.
    Receive,
}

/// Results reported back to the App.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The last send completed.
    Sent,

    /// The last receive completed.
    Received(Received),

    /// The last operation failed.
    Failed {
        /// What was attempted.
        operation: Operation,
        /// Rendered error.
        error: String,
    },

    /// Something happened on an in-process peer.
    Peer {
        /// Peer display name.
        name: String,
        /// What happened.
        text: String,
    },
}

/// Session operation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A send.
    Send,
    /// A receive.
    Receive,
}

impl Operation {
    fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Receive => "receive",
        }
    }
}

/// One line of the conversation pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Message we sent.
    Outgoing(String),
    /// Message we received.
    Incoming(String),
    /// Informational note.
    Info(String),
    /// Failure.
    Error(String),
}

/// Application state.
#[derive(Debug)]
pub struct App {
    name: String,
    identity: PeerIdentity,
    peer: Option<PeerIdentity>,
    lines: Vec<Line>,
    input: InputState,
    in_flight: Option<Operation>,
}

impl App {
    /// Shell for the account `name` whose identity is `identity`.
    pub fn new(name: impl Into<String>, identity: PeerIdentity) -> Self {
        Self {
            name: name.into(),
            identity,
            peer: None,
            lines: vec![Line::Info("type /id, /peer <identity>, /recv or a message".into())],
            input: InputState::default(),
            in_flight: None,
        }
    }

    /// Account display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own identity.
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Selected peer, if any.
    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    /// Conversation lines, oldest first.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Input box.
    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Operation currently running, if any.
    pub fn in_flight(&self) -> Option<Operation> {
        self.in_flight
    }

    /// One-line status for the side pane.
    pub fn status(&self) -> String {
        match self.in_flight {
            Some(Operation::Send) => "sending...".into(),
            Some(Operation::Receive) => "waiting for a message...".into(),
            None => "idle".into(),
        }
    }

    /// Select `peer` as the recipient of typed messages.
    pub fn select_peer(&mut self, peer: PeerIdentity) {
        self.lines.push(Line::Info(format!("peer set to {peer}")));
        self.peer = Some(peer);
    }

    /// Handle a key press.
    pub fn handle_key(&mut self, key: KeyInput) -> Vec<AppAction> {
        match key {
            KeyInput::Quit => vec![AppAction::Quit],
            KeyInput::Char(c) => {
                self.input.insert(c);
                vec![AppAction::Render]
            },
            KeyInput::Backspace => {
                self.input.backspace();
                vec![AppAction::Render]
            },
            KeyInput::Left => {
                self.input.left();
                vec![AppAction::Render]
            },
            KeyInput::Right => {
                self.input.right();
                vec![AppAction::Render]
            },
            KeyInput::Enter => {
                let line = self.input.take();
                let mut actions = self.submit(&line);
                actions.push(AppAction::Render);
                actions
            },
            KeyInput::Resize => vec![AppAction::Render],
            KeyInput::Ignored => Vec::new(),
        }
    }

    fn submit(&mut self, line: &str) -> Vec<AppAction> {
        match commands::parse(line) {
            Command::Identity => {
                self.lines.push(Line::Info(format!("your identity: {}", self.identity)));
                Vec::new()
            },
            Command::Peer { identity } => {
                match PeerIdentity::parse(&identity) {
                    Ok(peer) => self.select_peer(peer),
                    Err(e) => self.lines.push(Line::Error(e.to_string())),
                }
                Vec::new()
            },
            Command::Receive => self.start(Operation::Receive, AppAction::Receive),
            Command::Quit => vec![AppAction::Quit],
            Command::Message { content } if content.is_empty() => Vec::new(),
            Command::Message { content } => {
                let Some(peer) = self.peer.clone() else {
                    self.lines.push(Line::Error("no peer selected: /peer <identity>".into()));
                    return Vec::new();
                };
                let actions = self.start(
                    Operation::Send,
                    AppAction::Send { peer, payload: content.clone().into_bytes() },
                );
                if !actions.is_empty() {
                    self.lines.push(Line::Outgoing(content));
                }
                actions
            },
            Command::Unknown { input } => {
                self.lines.push(Line::Error(format!("unknown command: {input}")));
                Vec::new()
            },
            Command::InvalidArgs { command, error } => {
                self.lines.push(Line::Error(format!("/{command}: {error}")));
                Vec::new()
            },
        }
    }

    fn start(&mut self, operation: Operation, action: AppAction) -> Vec<AppAction> {
        if let Some(running) = self.in_flight {
            self.lines.push(Line::Error(format!("busy: a {} is in progress", running.label())));
            return Vec::new();
        }
        self.in_flight = Some(operation);
        vec![action]
    }

    /// Handle the result of a session operation.
    pub fn handle_event(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Sent => {
                self.in_flight = None;
                self.lines.push(Line::Info("delivered".into()));
            },
            AppEvent::Received(received) => {
                self.in_flight = None;
                self.lines.push(match received {
                    Received::Message(payload) => {
                        Line::Incoming(String::from_utf8_lossy(&payload).into_owned())
                    },
                    Received::NoIncomingRequest => Line::Info("nobody contacted us".into()),
                    Received::StreamEnded => Line::Info("peer sent nothing".into()),
                });
            },
            AppEvent::Failed { operation, error } => {
                self.in_flight = None;
                self.lines.push(Line::Error(format!("{} failed: {error}", operation.label())));
            },
            AppEvent::Peer { name, text } => {
                self.lines.push(Line::Info(format!("[{name}] {text}")));
            },
        }
        vec![AppAction::Render]
    }
}
