//! Unix Socket Backend
//!
//! The full transport: first-instance election over a rendezvous socket
//! file, a line-framed request/response exchange, and stale-socket
//! recovery.
//!
//! # Election
//!
//! Claiming a name resolves the rendezvous path and then:
//!
//! 1. no live socket file → bind a fresh PID-qualified socket, become
//!    the server;
//! 2. a socket file exists → try to connect; success proves the first
//!    instance is alive (become a client), failure proves the file is
//!    stale (unlink it and fall back to 1).
//!
//! Connect-then-fallback-to-bind keeps the race window down to a single
//! `connect()`; a separate lock file would only widen it. A failed
//! connect against a socket-type path is the authoritative staleness
//! signal.

mod client;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::UnixStream;

use crate::command::CommandRegistry;
use crate::dispatch::Dispatcher;
use crate::error::ClaimError;
use crate::message::MessageData;
use crate::rendezvous::{self, ResolvedPath};
use crate::response::Response;

use super::Role;
use server::ServerHandle;

/// Unix domain socket transport backend.
#[derive(Debug)]
pub struct SocketBackend {
    name: String,
    display_token: Option<String>,
    socket_dir: PathBuf,
    /// Set by `request_name`: the path we bound (server) or connect to
    /// (client).
    socket_path: Option<PathBuf>,
    server: Option<ServerHandle>,
    dispatcher: Arc<Dispatcher>,
    commands: Arc<CommandRegistry>,
}

impl SocketBackend {
    /// Create a backend for `name`, scoped by `display_token`, with its
    /// rendezvous directory at `socket_dir`.
    #[must_use]
    pub fn new(
        name: &str,
        display_token: Option<String>,
        socket_dir: PathBuf,
        dispatcher: Arc<Dispatcher>,
        commands: Arc<CommandRegistry>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            display_token,
            socket_dir,
            socket_path: None,
            server: None,
            dispatcher,
            commands,
        }
    }

    /// Run the first-instance election for this name.
    ///
    /// # Errors
    ///
    /// [`ClaimError`] if the display token is missing, the rendezvous
    /// directory cannot be created, or binding the server socket fails.
    pub async fn request_name(&mut self) -> Result<Role, ClaimError> {
        let resolved = rendezvous::resolve(
            &self.name,
            self.display_token.as_deref(),
            &self.socket_dir,
        )?;

        match resolved {
            ResolvedPath::Fresh(path) => self.become_server(path),
            ResolvedPath::Existing(path) => {
                if UnixStream::connect(&path).await.is_ok() {
                    tracing::debug!(path = ?path, "first instance is alive; joining as client");
                    self.socket_path = Some(path);
                    Ok(Role::Client)
                } else {
                    tracing::warn!(path = ?path, "rendezvous socket is stale; reclaiming");
                    unlink_stale(&path);
                    // The stale path carries a dead process's PID; bind
                    // under our own instead.
                    let token = self.display_token.as_deref().unwrap_or_default();
                    let fresh = rendezvous::fresh_path(&self.name, token, &self.socket_dir);
                    self.become_server(fresh)
                }
            }
        }
    }

    /// Send one command to the running instance and await its response.
    pub async fn send_message(
        &self,
        command_id: i32,
        data: &MessageData,
        timestamp: u64,
    ) -> Response {
        let Some(path) = self.socket_path.as_deref() else {
            tracing::warn!("send_message before a successful claim");
            return Response::Fail;
        };

        let Some(command_name) = self.commands.name_for(command_id) else {
            tracing::warn!(command_id, "no name registered for command");
            return Response::Invalid;
        };

        let frame = crate::codec::pack(&command_name, data, timestamp);
        client::exchange(path, &frame).await
    }

    /// Stop the server role: cancel the accept loop, unlink the socket,
    /// abort live connections. A client backend has nothing to tear down.
    pub fn shutdown(&mut self) {
        if let Some(mut server) = self.server.take() {
            server.shutdown();
        }
    }

    fn become_server(&mut self, path: PathBuf) -> Result<Role, ClaimError> {
        let server = ServerHandle::spawn(
            path.clone(),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.commands),
        )?;
        self.socket_path = Some(path);
        self.server = Some(server);
        Ok(Role::Server)
    }
}

impl Drop for SocketBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Unlink a socket file believed stale; already-gone is fine.
fn unlink_stale(path: &std::path::Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = ?path, error = %err, "unable to remove stale socket");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn backend(name: &str, dir: &TempDir) -> SocketBackend {
        SocketBackend::new(
            name,
            Some(":0".to_owned()),
            dir.path().to_path_buf(),
            Arc::new(Dispatcher::new()),
            Arc::new(CommandRegistry::new()),
        )
    }

    #[tokio::test]
    async fn first_claim_becomes_server() {
        let dir = TempDir::new().unwrap();
        let mut b = backend("org.test.Election", &dir);

        assert_eq!(b.request_name().await.unwrap(), Role::Server);

        let path = b.socket_path.clone().unwrap();
        assert!(rendezvous::is_live_candidate(&path));

        b.shutdown();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn second_claim_becomes_client() {
        let dir = TempDir::new().unwrap();
        let mut first = backend("org.test.Election2", &dir);
        let mut second = backend("org.test.Election2", &dir);

        assert_eq!(first.request_name().await.unwrap(), Role::Server);
        assert_eq!(second.request_name().await.unwrap(), Role::Client);
        // The client found the server's socket, not a fresh path.
        assert_eq!(second.socket_path, first.socket_path);
    }

    #[tokio::test]
    async fn stale_socket_is_reclaimed() {
        let dir = TempDir::new().unwrap();

        // A socket file with no listener behind it: bind with std and
        // drop the listener, which leaves the file in place.
        let stale = dir.path().join("org.test.Stale.:0.99999");
        drop(std::os::unix::net::UnixListener::bind(&stale).unwrap());
        assert!(stale.exists());

        let mut b = backend("org.test.Stale", &dir);
        assert_eq!(b.request_name().await.unwrap(), Role::Server);

        // The stale file is gone; the new server binds under our PID.
        assert!(!stale.exists());
        let bound = b.socket_path.clone().unwrap();
        assert!(bound
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with(&std::process::id().to_string()));
    }

    #[tokio::test]
    async fn send_without_server_fails_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let mut b = backend("org.test.NoServer", &dir);
        // Pretend a claim pointed us at a path nobody serves.
        b.socket_path = Some(dir.path().join("org.test.NoServer.:0.1"));

        let response = b
            .send_message(crate::command::commands::ACTIVATE, &MessageData::new(), 1)
            .await;

        assert_eq!(response, Response::Fail);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "send must not create socket files");
    }

    #[tokio::test]
    async fn unregistered_command_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut b = backend("org.test.UnknownCmd", &dir);
        b.socket_path = Some(dir.path().join("whatever"));

        let response = b.send_message(4242, &MessageData::new(), 1).await;
        assert_eq!(response, Response::Invalid);
    }
}
