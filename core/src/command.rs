//! Commands
//!
//! A command is an application-level verb identified by a nonzero `i32`.
//! Negative ids are reserved for the built-in commands everybody needs
//! (activate, new, open, close); applications register their own commands
//! with positive ids. The wire carries command *names*, so both sides
//! keep a bidirectional name↔id registry built at configuration time.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Built-in command ids, pre-registered on every [`CommandRegistry`].
pub mod commands {
    /// Present the main window of the running instance.
    pub const ACTIVATE: i32 = -1;
    /// Open a new document or window.
    pub const NEW: i32 = -2;
    /// Open the file(s) carried in the message payload.
    pub const OPEN: i32 = -3;
    /// Close the running instance.
    pub const CLOSE: i32 = -4;
}

const BUILTINS: &[(&str, i32)] = &[
    ("activate", commands::ACTIVATE),
    ("new", commands::NEW),
    ("open", commands::OPEN),
    ("close", commands::CLOSE),
];

/// Bidirectional mapping between command names and ids.
///
/// Shared between the coordinator (which registers commands) and the
/// transport (which translates ids to names on send and back on receive).
#[derive(Debug)]
pub struct CommandRegistry {
    by_name: RwLock<HashMap<String, i32>>,
    by_id: RwLock<HashMap<i32, String>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Create a registry with the built-in commands pre-registered.
    #[must_use]
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for &(name, id) in BUILTINS {
            by_name.insert(name.to_owned(), id);
            by_id.insert(id, name.to_owned());
        }

        Self {
            by_name: RwLock::new(by_name),
            by_id: RwLock::new(by_id),
        }
    }

    /// Register `name` as a custom command with logical id `id`.
    ///
    /// Registering the same name or id again replaces the previous
    /// mapping. Ids must be positive; the negative range belongs to the
    /// built-ins.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not positive.
    pub fn add(&self, name: &str, id: i32) {
        assert!(id > 0, "custom command ids must be positive, got {id}");

        let mut by_name = self.by_name.write();
        let mut by_id = self.by_id.write();

        if let Some(old_id) = by_name.insert(name.to_owned(), id) {
            by_id.remove(&old_id);
        }
        if let Some(old_name) = by_id.insert(id, name.to_owned()) {
            if old_name != name {
                by_name.remove(&old_name);
            }
        }
    }

    /// Look up the name for `id`, or `None` if it was never registered.
    #[must_use]
    pub fn name_for(&self, id: i32) -> Option<String> {
        self.by_id.read().get(&id).cloned()
    }

    /// Look up the id for `name`, or `None` if it was never registered.
    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<i32> {
        self.by_name.read().get(name).copied()
    }
}
