//! Command parsing for the terminal shell.
//!
//! This module parses input lines into structured [`Command`] values.

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show our own identity.
    Identity,

    /// Select the peer that messages are sent to.
    Peer {
        /// Encoded peer identity, not yet validated.
        identity: String,
    },

    /// Wait for one message from whoever contacts us.
    Receive,

    /// Quit the application.
    Quit,

    /// Send a message to the selected peer.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// Parse a user input string into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Message { content: String::new() };
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "id" => Command::Identity,

        "peer" => match parts.as_slice() {
            [_, identity] => Command::Peer { identity: (*identity).to_string() },
            [_] => Command::InvalidArgs {
                command: "peer".into(),
                error: "Usage: /peer <identity>".into(),
            },
            _ => Command::InvalidArgs {
                command: "peer".into(),
                error: "Identity must not contain spaces".into(),
            },
        },

        "recv" => Command::Receive,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
