//! Server Role
//!
//! The listening side of the rendezvous socket. The accept loop runs as
//! a task; every accepted connection gets its own short-lived handler
//! task that performs exactly one request/response exchange:
//!
//! ```text
//! AwaitingFrame ──read line──► Dispatching ──reply──► AwaitingFlush ──► Closed
//!       │                          │
//!       └── EOF / malformed ───────┴──────────── Closed (no reply)
//! ```
//!
//! A malformed frame is never answered; the client observes the closed
//! connection and reports failure on its side. There is no keep-alive
//! and no pipelining.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::{AbortHandle, JoinHandle};

use crate::codec::{self, LINE_TERM};
use crate::command::CommandRegistry;
use crate::dispatch::Dispatcher;
use crate::error::ClaimError;
use crate::message::MessageData;

/// A running server: bound socket, accept loop, live connections.
#[derive(Debug)]
pub(super) struct ServerHandle {
    socket_path: PathBuf,
    accept_task: JoinHandle<()>,
    connections: Arc<Mutex<Vec<AbortHandle>>>,
    torn_down: bool,
}

impl ServerHandle {
    /// Bind `path`, restrict it to the owner, and start accepting.
    pub(super) fn spawn(
        path: PathBuf,
        dispatcher: Arc<Dispatcher>,
        commands: Arc<CommandRegistry>,
    ) -> Result<Self, ClaimError> {
        let listener = UnixListener::bind(&path).map_err(|source| ClaimError::Bind {
            path: path.clone(),
            source,
        })?;

        // Filesystem permissions are the sole access control.
        if let Err(err) =
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(path = ?path, error = %err, "unable to restrict socket permissions");
        }

        let connections = Arc::new(Mutex::new(Vec::new()));
        let accept_connections = Arc::clone(&connections);
        let accept_path = path.clone();

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let handler = tokio::spawn(handle_connection(
                            stream,
                            Arc::clone(&dispatcher),
                            Arc::clone(&commands),
                        ));

                        let mut live = accept_connections.lock();
                        live.retain(|conn: &AbortHandle| !conn.is_finished());
                        live.push(handler.abort_handle());
                    }
                    Err(err) => {
                        tracing::warn!(path = ?accept_path, error = %err, "accept failed");
                    }
                }
            }
        });

        tracing::info!(path = ?path, "listening on rendezvous socket");

        Ok(Self {
            socket_path: path,
            accept_task,
            connections,
            torn_down: false,
        })
    }

    /// Stop accepting, unlink the socket file, abort live connections.
    ///
    /// In-flight exchanges die without a reply; their clients see a
    /// closed connection and surface it as failure.
    pub(super) fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.accept_task.abort();

        if let Err(err) = std::fs::remove_file(&self.socket_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = ?self.socket_path,
                    error = %err,
                    "unable to remove socket file"
                );
            }
        }

        let mut live = self.connections.lock();
        for conn in live.drain(..) {
            conn.abort();
        }

        tracing::info!(path = ?self.socket_path, "rendezvous server shut down");
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One request/response exchange, then teardown.
async fn handle_connection(
    stream: UnixStream,
    dispatcher: Arc<Dispatcher>,
    commands: Arc<CommandRegistry>,
) {
    let mut reader = BufReader::new(stream);

    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line).await {
        Ok(0) => {
            tracing::debug!("peer closed before sending a frame");
            return;
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "unable to receive the command");
            return;
        }
    }

    if !line.ends_with(b"\n") {
        // EOF mid-line: the peer stalled or died. No reply.
        tracing::warn!("unterminated frame from peer");
        return;
    }
    strip_line_term(&mut line);

    let frame = match codec::unpack(&line) {
        Ok(frame) => frame,
        Err(err) => {
            // Dropping the connection without a reply is the protocol's
            // failure signal for malformed frames.
            tracing::warn!(error = %err, "unable to unpack the message");
            return;
        }
    };

    let command_id = commands.id_for(&frame.command).unwrap_or_else(|| {
        tracing::warn!(command = %frame.command, "received unregistered command");
        0
    });

    let mut data = MessageData::new();
    data.set(frame.payload.as_deref());
    data.set_screen(frame.screen);
    data.set_workspace(frame.workspace);
    data.set_startup_id(frame.startup_id.as_deref());

    let response = dispatcher.dispatch(command_id, &data, frame.timestamp);

    let mut reply = response.as_nick().as_bytes().to_vec();
    reply.extend_from_slice(LINE_TERM.as_bytes());

    let stream = reader.get_mut();
    if let Err(err) = stream.write_all(&reply).await {
        tracing::warn!(error = %err, "unable to send response");
        return;
    }
    if let Err(err) = stream.flush().await {
        tracing::warn!(error = %err, "unable to flush response");
    }
}

/// Strip the trailing `\r\n` (tolerating a bare `\n`).
fn strip_line_term(line: &mut Vec<u8>) {
    if line.ends_with(b"\n") {
        line.pop();
    }
    if line.ends_with(b"\r") {
        line.pop();
    }
}
