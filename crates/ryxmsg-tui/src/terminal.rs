//! Terminal I/O.
//!
//! [`TerminalDriver`] owns the raw-mode terminal and its input stream. The
//! terminal is restored when the driver is restored or dropped, whichever
//! comes first.

use std::io;

use crossterm::event::EventStream;
use futures::StreamExt;
use ratatui::DefaultTerminal;
use thiserror::Error;

use crate::{app::App, input::KeyInput, ui};

/// Terminal failures.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// Terminal I/O failed.
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input stream ended.
    #[error("terminal input closed")]
    InputClosed,
}

/// Raw-mode terminal with an async key stream.
pub struct TerminalDriver {
    terminal: DefaultTerminal,
    events: EventStream,
    restored: bool,
}

impl TerminalDriver {
    /// Enter raw mode and the alternate screen.
    pub fn new() -> Result<Self, TerminalError> {
        let terminal = ratatui::try_init()?;
        Ok(Self { terminal, events: EventStream::new(), restored: false })
    }

    /// Next keyboard or resize input.
    pub async fn next_input(&mut self) -> Result<KeyInput, TerminalError> {
        match self.events.next().await {
            Some(event) => Ok(KeyInput::from_event(&event?)),
            None => Err(TerminalError::InputClosed),
        }
    }

    /// Draw `app`.
    pub fn draw(&mut self, app: &App) -> Result<(), TerminalError> {
        self.terminal.draw(|frame| ui::render(frame, app))?;
        Ok(())
    }

    /// Leave raw mode and the alternate screen. Idempotent.
    pub fn restore(&mut self) {
        if !self.restored {
            ratatui::restore();
            self.restored = true;
        }
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.restore();
    }
}
