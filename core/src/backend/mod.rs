//! Transport Backends
//!
//! A backend answers exactly two questions: *am I the first instance?*
//! ([`Backend::request_name`]) and *what did the running instance say to
//! my command?* ([`Backend::send_message`]). The set of backends is
//! closed and selected by [`Config`](crate::Config), not by subclassing:
//!
//! - [`SocketBackend`]: Unix domain socket rendezvous, the full
//!   transport (server election, framing, stale-socket recovery)
//! - [`InProcessBackend`]: process-local registry for embedded use and
//!   transport-free tests

pub mod in_process;
pub mod socket;

use std::sync::Arc;

use crate::command::CommandRegistry;
use crate::config::{BackendKind, Config};
use crate::dispatch::Dispatcher;
use crate::error::ClaimError;
use crate::message::MessageData;
use crate::response::Response;

pub use in_process::InProcessBackend;
pub use socket::SocketBackend;

/// Outcome of a name claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// This process owns the name: it accepts and dispatches messages.
    Server,
    /// Another process owns the name: messages go to it.
    Client,
}

/// The closed set of transport backends.
#[derive(Debug)]
pub enum Backend {
    /// Unix domain socket transport.
    Socket(SocketBackend),
    /// Process-local transport.
    InProcess(InProcessBackend),
}

impl Backend {
    /// Build the backend selected by `config`.
    #[must_use]
    pub fn create(
        config: &Config,
        name: &str,
        dispatcher: Arc<Dispatcher>,
        commands: Arc<CommandRegistry>,
    ) -> Self {
        match config.backend {
            BackendKind::Socket => Backend::Socket(SocketBackend::new(
                name,
                config.display_token(),
                config.socket_dir(),
                dispatcher,
                commands,
            )),
            BackendKind::InProcess => {
                Backend::InProcess(InProcessBackend::new(name, dispatcher, commands))
            }
        }
    }

    /// Claim the name: decide whether this process is the first instance.
    ///
    /// # Errors
    ///
    /// Propagates [`ClaimError`] from path resolution or socket binding;
    /// a failed claim leaves no server behind.
    pub async fn request_name(&mut self) -> Result<Role, ClaimError> {
        match self {
            Backend::Socket(backend) => backend.request_name().await,
            Backend::InProcess(backend) => Ok(backend.request_name()),
        }
    }

    /// Send one command to the running instance and wait for its reply.
    ///
    /// Transport trouble never escapes as an error: it comes back as
    /// [`Response::Fail`] (connection problems) or [`Response::Invalid`]
    /// (protocol mismatch).
    pub async fn send_message(
        &self,
        command_id: i32,
        data: &MessageData,
        timestamp: u64,
    ) -> Response {
        match self {
            Backend::Socket(backend) => backend.send_message(command_id, data, timestamp).await,
            Backend::InProcess(backend) => backend.send_message(command_id, data, timestamp),
        }
    }

    /// Tear the backend down: stop accepting, close and unlink the
    /// rendezvous socket, abort in-flight connections.
    pub fn shutdown(&mut self) {
        match self {
            Backend::Socket(backend) => backend.shutdown(),
            Backend::InProcess(backend) => backend.shutdown(),
        }
    }
}
