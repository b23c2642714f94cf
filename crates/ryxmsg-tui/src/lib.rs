//! Terminal shell for ryxmsg.
//!
//! A thin interactive front end over [`ryxmsg_client::ClientSession`]. The
//! session runs against an in-process [`ryxmsg_harness::MemoryNetwork`], so
//! the shell needs no external service. All protocol logic stays in the
//! library crates; this crate only edits input, renders, and forwards
//! requests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod app;
pub mod commands;
pub mod echo;
pub mod error;
pub mod input;
pub mod logging;
pub mod runtime;
pub mod terminal;
pub mod ui;
pub mod worker;

pub use app::{App, AppAction, AppEvent, Line, Operation};
pub use commands::Command;
pub use error::TuiError;
pub use input::{InputState, KeyInput};
pub use runtime::{ShellOptions, run, run_on};
pub use terminal::{TerminalDriver, TerminalError};
