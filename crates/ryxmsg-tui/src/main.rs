//! ryxmsg terminal shell.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use ryxmsg_core::{SessionConfig, StorageLocation};
use ryxmsg_tui::{ShellOptions, TuiError, logging};

/// Send and receive single messages over ryxmsg.
#[derive(Debug, Parser)]
#[command(name = "ryxmsg-tui", version)]
struct Args {
    /// Display name for this account.
    #[arg(long, default_value = "me")]
    name: String,

    /// Storage location of the account.
    #[arg(long, default_value = "ryxmsg-data")]
    data_dir: PathBuf,

    /// Write logs to this file; nothing is logged otherwise.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Start an in-process peer that echoes the first message back.
    #[arg(long)]
    echo_peer: bool,

    /// Give up waiting for a group to become ready after this many seconds.
    #[arg(long, value_name = "SECS")]
    readiness_timeout: Option<u64>,
}

impl Args {
    fn into_options(self) -> ShellOptions {
        let mut session = SessionConfig::default();
        if let Some(secs) = self.readiness_timeout {
            session = session.with_readiness_timeout(Duration::from_secs(secs));
        }
        ShellOptions {
            name: self.name,
            storage: StorageLocation::from(self.data_dir),
            echo_peer: self.echo_peer,
            session,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), TuiError> {
    let args = Args::parse();
    logging::init(args.log_file.as_deref())?;
    ryxmsg_tui::run(args.into_options()).await
}
