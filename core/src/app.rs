//! The Coordinator
//!
//! [`App`] ties the pieces together: claim a name through the configured
//! backend, then either serve inbound messages (first instance) or send
//! commands to whoever does (redundant instance). There is no race
//! between construction and [`App::is_running`]: the claim happens
//! inside [`App::claim`], and by the time it returns the role is
//! settled.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::backend::{Backend, Role};
use crate::command::CommandRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::ClaimError;
use crate::message::MessageData;
use crate::response::Response;

/// A claimed (or conceded) application identity.
///
/// Create one with [`App::claim`] as early as possible in process
/// startup. If [`App::is_running`] reports another instance, hand it
/// your command line via [`App::send_message`] and exit; otherwise
/// register handlers with [`App::on_message`] and carry on as the one
/// true instance.
pub struct App {
    name: String,
    startup_id: String,
    screen: u32,
    workspace: i32,
    is_running: bool,
    backend: Backend,
    dispatcher: Arc<Dispatcher>,
    commands: Arc<CommandRegistry>,
}

impl App {
    /// Claim `name` for this process.
    ///
    /// `name` should be a domain-style identifier like
    /// `org.example.Editor`. If `startup_id` is `None` the
    /// `DESKTOP_STARTUP_ID` environment variable is consulted, and
    /// failing that a fake `_TIME<epoch>` token is fabricated so that
    /// receivers always see *some* startup token.
    ///
    /// # Errors
    ///
    /// [`ClaimError`] if the claim could not be attempted at all (no
    /// display token, unusable socket directory, bind failure). Losing
    /// the election is not an error; check [`App::is_running`].
    pub async fn claim(
        name: &str,
        startup_id: Option<&str>,
        config: Config,
    ) -> Result<Self, ClaimError> {
        let dispatcher = Arc::new(Dispatcher::new());
        let commands = Arc::new(CommandRegistry::new());

        let mut backend = Backend::create(
            &config,
            name,
            Arc::clone(&dispatcher),
            Arc::clone(&commands),
        );
        let role = backend.request_name().await?;

        let app = Self {
            name: name.to_owned(),
            startup_id: resolve_startup_id(startup_id),
            screen: 0,
            workspace: -1,
            is_running: role == Role::Client,
            backend,
            dispatcher,
            commands,
        };

        tracing::info!(
            name = %app.name,
            is_running = app.is_running,
            "claim settled"
        );
        Ok(app)
    }

    /// The claimed application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether another instance of this application already runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// The startup-notification token attached to outgoing messages.
    #[must_use]
    pub fn startup_id(&self) -> &str {
        &self.startup_id
    }

    /// Register `name` as a custom command with logical id `id` (> 0).
    ///
    /// Both sides must register a command before it can cross the wire:
    /// the sender to resolve the id, the receiver to dispatch it.
    pub fn add_command(&self, name: &str, id: i32) {
        self.commands.add(name, id);
    }

    /// Register a message handler, invoked in registration order for
    /// every inbound message.
    ///
    /// Return [`Response::Passthrough`] to decline and let later
    /// handlers (or the default, which answers [`Response::Ok`]) deal
    /// with the message.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(i32, &MessageData, u64) -> Response + Send + Sync + 'static,
    {
        self.dispatcher.add_handler(handler);
    }

    /// Watch an opaque window handle: it will be informed, through the
    /// callback set with [`App::set_startup_notify`], of the startup id
    /// carried by each inbound message.
    pub fn watch(&self, handle: u64) {
        self.dispatcher.watch(handle);
    }

    /// Stop watching `handle`. Call this when the handle dies; watched
    /// handles are plain values and are never cleaned up automatically.
    pub fn unwatch(&self, handle: u64) {
        self.dispatcher.unwatch(handle);
    }

    /// Set the callback that pushes inbound startup ids to watched
    /// handles.
    pub fn set_startup_notify<F>(&self, notify: F)
    where
        F: Fn(u64, &str) + Send + Sync + 'static,
    {
        self.dispatcher.set_startup_notify(notify);
    }

    /// Set the screen number stamped on outgoing messages. The value
    /// comes from the embedding application's windowing layer.
    pub fn set_screen(&mut self, screen: u32) {
        self.screen = screen;
    }

    /// Set the workspace number stamped on outgoing messages (-1 when
    /// unknown). The value comes from the windowing layer.
    pub fn set_workspace(&mut self, workspace: i32) {
        self.workspace = workspace;
    }

    /// Send `command_id` (and optionally `data`) to the running
    /// instance; wait for its response.
    ///
    /// The caller's message is cloned and the copy augmented with this
    /// app's screen, workspace and startup id, so the original is never
    /// touched. Calling this on the *first* instance is a programming
    /// error and answers [`Response::Invalid`] (there is nobody to talk
    /// to but ourselves), as does the reserved command id 0.
    pub async fn send_message(&self, command_id: i32, data: Option<&MessageData>) -> Response {
        if command_id == 0 {
            tracing::warn!("send_message called with the reserved invalid command");
            return Response::Invalid;
        }
        if !self.is_running {
            tracing::warn!("send_message called on the first instance");
            return Response::Invalid;
        }

        let mut message = data.cloned().unwrap_or_default();
        message.set_screen(self.screen);
        message.set_workspace(self.workspace);
        message.set_startup_id(Some(&self.startup_id));

        let now = epoch_seconds();
        self.backend.send_message(command_id, &message, now).await
    }

    /// Tear down the backend: a first instance stops serving and removes
    /// its rendezvous socket. Runs automatically on drop.
    pub fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}

fn resolve_startup_id(explicit: Option<&str>) -> String {
    if let Some(id) = explicit {
        if !id.is_empty() {
            return id.to_owned();
        }
    }
    if let Ok(id) = std::env::var("DESKTOP_STARTUP_ID") {
        if !id.is_empty() {
            return id;
        }
    }
    // No notification sequence in flight; fabricate a timestamp token
    // so receivers always have something to pass along.
    format!("_TIME{}", epoch_seconds())
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use crate::command::commands;
    use crate::config::BackendKind;

    use super::*;

    fn in_process_config() -> Config {
        Config {
            backend: BackendKind::InProcess,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn first_and_second_claims() {
        let first = App::claim("org.test.AppClaim", None, in_process_config())
            .await
            .unwrap();
        let second = App::claim("org.test.AppClaim", None, in_process_config())
            .await
            .unwrap();

        assert!(!first.is_running());
        assert!(second.is_running());
    }

    #[tokio::test]
    async fn send_on_first_instance_is_invalid() {
        let first = App::claim("org.test.AppSelf", None, in_process_config())
            .await
            .unwrap();
        assert_eq!(
            first.send_message(commands::ACTIVATE, None).await,
            Response::Invalid
        );
    }

    #[tokio::test]
    async fn zero_command_is_invalid() {
        let first = App::claim("org.test.AppZero", None, in_process_config())
            .await
            .unwrap();
        let second = App::claim("org.test.AppZero", None, in_process_config())
            .await
            .unwrap();

        drop(first);
        assert_eq!(second.send_message(0, None).await, Response::Invalid);
    }

    #[tokio::test]
    async fn message_is_augmented_not_mutated() {
        let first = App::claim("org.test.AppAugment", None, in_process_config())
            .await
            .unwrap();
        first.on_message(|_, data, _| {
            assert_eq!(data.screen(), 2);
            assert_eq!(data.workspace(), 4);
            assert!(data.startup_id().is_some());
            Response::Ok
        });

        let mut second = App::claim("org.test.AppAugment", Some("_TIME7"), in_process_config())
            .await
            .unwrap();
        second.set_screen(2);
        second.set_workspace(4);

        let original = MessageData::new();
        let response = second
            .send_message(commands::ACTIVATE, Some(&original))
            .await;

        assert_eq!(response, Response::Ok);
        // The caller's message was cloned, not written through.
        assert_eq!(original.startup_id(), None);
        assert_eq!(original.screen(), 0);
    }

    #[tokio::test]
    async fn custom_commands_cross_instances() {
        let first = App::claim("org.test.AppCustom", None, in_process_config())
            .await
            .unwrap();
        first.add_command("import", 3);
        first.on_message(|command, data, _| {
            assert_eq!(command, 3);
            assert_eq!(data.text().as_deref(), Some("hello"));
            Response::Ok
        });

        let second = App::claim("org.test.AppCustom", None, in_process_config())
            .await
            .unwrap();
        second.add_command("import", 3);

        let mut data = MessageData::new();
        data.set_text("hello");
        assert_eq!(second.send_message(3, Some(&data)).await, Response::Ok);
    }

    #[test]
    fn startup_id_fallback_is_a_time_token() {
        // Explicit id wins.
        assert_eq!(resolve_startup_id(Some("_TIME42")), "_TIME42");
        // Empty explicit id falls through to the fabricated token
        // (or the ambient DESKTOP_STARTUP_ID if the test runner sets one).
        let id = resolve_startup_id(Some(""));
        assert!(!id.is_empty());
    }
}
