//! In-Process Backend
//!
//! A process-local rendition of the same contract, for embedding
//! several logical instances in one process and for transport-free
//! tests. A global registry maps application names to the dispatcher of
//! whichever claimant got there first; later claimants become clients
//! whose messages are routed directly, but still through the wire
//! codec, so framing semantics stay identical to the socket backend.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::codec;
use crate::command::CommandRegistry;
use crate::dispatch::Dispatcher;
use crate::message::MessageData;
use crate::response::Response;

use super::Role;

/// What the first claimant leaves behind for later claimants to reach.
#[derive(Clone)]
struct Instance {
    dispatcher: Arc<Dispatcher>,
    commands: Arc<CommandRegistry>,
}

fn instances() -> &'static DashMap<String, Instance> {
    static INSTANCES: OnceLock<DashMap<String, Instance>> = OnceLock::new();
    INSTANCES.get_or_init(DashMap::new)
}

/// Process-local transport backend.
pub struct InProcessBackend {
    name: String,
    dispatcher: Arc<Dispatcher>,
    commands: Arc<CommandRegistry>,
    is_server: bool,
}

impl InProcessBackend {
    /// Create a backend for `name`.
    #[must_use]
    pub fn new(name: &str, dispatcher: Arc<Dispatcher>, commands: Arc<CommandRegistry>) -> Self {
        Self {
            name: name.to_owned(),
            dispatcher,
            commands,
            is_server: false,
        }
    }

    /// Claim the name in the process-local registry.
    ///
    /// Unlike the socket backend this cannot fail: there is no display
    /// to scope by and no filesystem to trip over.
    pub fn request_name(&mut self) -> Role {
        let entry = instances().entry(self.name.clone()).or_insert_with(|| {
            self.is_server = true;
            Instance {
                dispatcher: Arc::clone(&self.dispatcher),
                commands: Arc::clone(&self.commands),
            }
        });
        drop(entry);

        if self.is_server {
            Role::Server
        } else {
            Role::Client
        }
    }

    /// Route one command to the registered instance.
    pub fn send_message(&self, command_id: i32, data: &MessageData, timestamp: u64) -> Response {
        let Some(command_name) = self.commands.name_for(command_id) else {
            tracing::warn!(command_id, "no name registered for command");
            return Response::Invalid;
        };

        let Some(instance) = instances().get(&self.name).map(|i| i.value().clone()) else {
            tracing::warn!(name = %self.name, "no running instance registered");
            return Response::Fail;
        };

        // Same frame in, same frame out: the receiver resolves the
        // command against its own registry, exactly like over a socket.
        let frame = codec::pack(&command_name, data, timestamp);
        let line = &frame[..frame.len() - codec::LINE_TERM.len()];
        let decoded = match codec::unpack(line) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!(error = %err, "unable to unpack the message");
                return Response::Fail;
            }
        };

        let receiver_id = instance.commands.id_for(&decoded.command).unwrap_or(0);

        let mut received = MessageData::new();
        received.set(decoded.payload.as_deref());
        received.set_screen(decoded.screen);
        received.set_workspace(decoded.workspace);
        received.set_startup_id(decoded.startup_id.as_deref());

        instance
            .dispatcher
            .dispatch(receiver_id, &received, decoded.timestamp)
    }

    /// Release the name if this backend holds it.
    pub fn shutdown(&mut self) {
        if self.is_server {
            instances().remove(&self.name);
            self.is_server = false;
        }
    }
}

impl Drop for InProcessBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for InProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBackend")
            .field("name", &self.name)
            .field("is_server", &self.is_server)
            .finish_non_exhaustive()
    }
}
