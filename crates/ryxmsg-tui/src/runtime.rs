//! Shell runtime.
//!
//! Wires the pieces together: a session on an in-memory network served by
//! the [`crate::worker`], an optional [`crate::echo`] peer, signal handling,
//! and the render loop driving [`App`] from terminal input and session
//! results.
//!
//! Teardown order is fixed: leave the loop, restore the terminal, cancel
//! in-flight waits, then let the worker close the session. Startup failures
//! close the session themselves.

use ryxmsg_client::{ClientSession, ShutdownHandle, watch_signals};
use ryxmsg_core::{SessionConfig, StorageLocation};
use ryxmsg_harness::MemoryNetwork;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::{
    app::{App, AppAction, AppEvent},
    echo,
    error::TuiError,
    terminal::TerminalDriver,
    worker::{self, Request},
};

/// Shell startup options.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Display name.
    pub name: String,
    /// Storage location of the shell's account.
    pub storage: StorageLocation,
    /// Start the in-process echo peer.
    pub echo_peer: bool,
    /// Session limits.
    pub session: SessionConfig,
}

/// Run the shell until the user quits or a signal arrives.
pub async fn run(options: ShellOptions) -> Result<(), TuiError> {
    run_on(&MemoryNetwork::new(), options).await
}

/// [`run`] on an existing network.
///
/// A failure before the render loop starts closes the session before
/// returning.
pub async fn run_on(network: &MemoryNetwork, options: ShellOptions) -> Result<(), TuiError> {
    let mut session =
        ClientSession::open(network, options.storage.clone(), options.session.clone()).await?;
    let identity = session.own_identity().await;
    let identity = session.close_on_error(identity).await?;
    let shutdown = session.shutdown_handle();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut app = App::new(options.name, identity.clone());
    let echo = if options.echo_peer {
        let spawned =
            echo::spawn(network, identity.clone(), event_tx.clone(), shutdown.clone(), options.session)
                .await;
        let (echo_identity, task) = session.close_on_error(spawned).await?;
        app.select_peer(echo_identity);
        Some(task)
    } else {
        None
    };

    let signals = watch_signals(shutdown.clone());
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let worker = worker::spawn(session, request_rx, event_tx);
    info!(storage = %options.storage, identity = %identity, "shell started");

    let driven = match TerminalDriver::new() {
        Ok(mut terminal) => {
            let driven = drive(&mut terminal, &mut app, &mut event_rx, &request_tx, &shutdown).await;
            terminal.restore();
            driven
        },
        Err(e) => Err(e.into()),
    };

    shutdown.shutdown();
    drop(request_tx);
    let closed = worker.await?;
    signals.abort();
    if let Some(echo) = echo {
        echo.await?;
    }
    info!("shell stopped");

    driven?;
    closed?;
    Ok(())
}

async fn drive(
    terminal: &mut TerminalDriver,
    app: &mut App,
    events: &mut UnboundedReceiver<AppEvent>,
    requests: &UnboundedSender<Request>,
    shutdown: &ShutdownHandle,
) -> Result<(), TuiError> {
    terminal.draw(app)?;

    loop {
        let actions = tokio::select! {
            () = shutdown.wait() => return Ok(()),
            input = terminal.next_input() => app.handle_key(input?),
            Some(event) = events.recv() => app.handle_event(event),
        };

        for action in actions {
            match action {
                AppAction::Render => terminal.draw(app)?,
                AppAction::Quit => return Ok(()),
                AppAction::Send { peer, payload } => {
                    requests
                        .send(Request::Send { peer, payload })
                        .map_err(|_| TuiError::WorkerStopped)?;
                },
                AppAction::Receive => {
                    requests.send(Request::Receive).map_err(|_| TuiError::WorkerStopped)?;
                },
            }
        }
    }
}
