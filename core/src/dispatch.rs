//! Message Dispatch
//!
//! The receiving side of the protocol: an ordered list of handlers,
//! invoked per inbound message in registration order. A handler that
//! returns [`Response::Passthrough`] declines the message and dispatch
//! moves on to the next one; the first non-passthrough response wins.
//! With no handlers registered (or every one declining) the dispatcher
//! answers [`Response::Ok`]; the embedding application supplies the
//! actual default action (typically "present the main window").
//!
//! The dispatcher also owns the set of *watched* opaque window handles:
//! before handlers run, the inbound startup-notification id is pushed to
//! every watched handle through the registered notify callback, so that
//! whatever window the default action presents carries the right token.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::MessageData;
use crate::response::Response;

/// A registered message handler.
pub type MessageHandler = dyn Fn(i32, &MessageData, u64) -> Response + Send + Sync;

/// Callback informing a watched handle of an inbound startup id.
pub type StartupNotify = dyn Fn(u64, &str) + Send + Sync;

/// Ordered handler registry shared between the coordinator and the
/// transport's server side.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Mutex<Vec<Arc<MessageHandler>>>,
    watched: Mutex<Vec<u64>>,
    startup_notify: Mutex<Option<Arc<StartupNotify>>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Handlers run in registration order.
    pub fn add_handler<F>(&self, handler: F)
    where
        F: Fn(i32, &MessageData, u64) -> Response + Send + Sync + 'static,
    {
        self.handlers.lock().push(Arc::new(handler));
    }

    /// Start watching an opaque window handle.
    pub fn watch(&self, handle: u64) {
        self.watched.lock().push(handle);
    }

    /// Stop watching `handle`. The owner calls this when the handle
    /// becomes invalid; nothing is cleaned up automatically.
    pub fn unwatch(&self, handle: u64) {
        self.watched.lock().retain(|&h| h != handle);
    }

    /// Register the callback used to push startup ids to watched handles.
    pub fn set_startup_notify<F>(&self, notify: F)
    where
        F: Fn(u64, &str) + Send + Sync + 'static,
    {
        *self.startup_notify.lock() = Some(Arc::new(notify));
    }

    /// Route one inbound message through the registered handlers.
    ///
    /// A zero command id never reaches application handlers; it answers
    /// [`Response::Invalid`] straight away.
    pub fn dispatch(&self, command_id: i32, data: &MessageData, timestamp: u64) -> Response {
        if command_id == 0 {
            tracing::warn!("refusing to dispatch the reserved invalid command");
            return Response::Invalid;
        }

        if let Some(startup_id) = data.startup_id() {
            let notify = self.startup_notify.lock().clone();
            if let Some(notify) = notify {
                for &handle in self.watched.lock().iter() {
                    notify(handle, startup_id);
                }
            }
        }

        // Snapshot the handler list so handlers can register more
        // handlers without deadlocking.
        let handlers: Vec<_> = self.handlers.lock().clone();
        for handler in handlers {
            let response = handler(command_id, data, timestamp);
            if response != Response::Passthrough {
                return response;
            }
        }

        Response::Ok
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers.lock().len())
            .field("watched", &*self.watched.lock())
            .finish_non_exhaustive()
    }
}
