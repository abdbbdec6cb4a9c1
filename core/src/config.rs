//! Runtime Configuration
//!
//! Backend selection and path overrides. Applications normally run with
//! [`Config::default`]; tests and unusual deployments override the
//! socket directory and display token explicitly, and the environment
//! can steer everything without touching code.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which transport backend carries claims and messages.
///
/// A closed set: backends are selected by configuration, not plugged in
/// at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Unix domain socket rendezvous (the default, full transport).
    #[default]
    Socket,
    /// Process-local registry. No IPC: useful for embedding several
    /// logical instances in one process and for transport-free tests.
    InProcess,
}

/// Coordinator configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend selection.
    pub backend: BackendKind,

    /// Override for the shared rendezvous directory.
    ///
    /// Default: `<system-temp-dir>/soloist`.
    pub socket_dir: Option<PathBuf>,

    /// Override for the display-scoping token.
    ///
    /// Default: the `DISPLAY` environment variable. Claims abort when no
    /// token can be resolved at all.
    pub display_token: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Environment variables:
    /// - `SOLOIST_BACKEND`: "socket" (default) or "inprocess"
    /// - `SOLOIST_SOCKET_DIR`: rendezvous directory override
    /// - `SOLOIST_DISPLAY`: display token override
    #[must_use]
    pub fn from_env() -> Self {
        let backend = match std::env::var("SOLOIST_BACKEND")
            .as_deref()
            .map(str::to_lowercase)
        {
            Ok(ref s) if s == "inprocess" || s == "in-process" => BackendKind::InProcess,
            _ => BackendKind::Socket,
        };

        Self {
            backend,
            socket_dir: std::env::var_os("SOLOIST_SOCKET_DIR").map(PathBuf::from),
            display_token: std::env::var("SOLOIST_DISPLAY").ok(),
        }
    }

    /// The effective rendezvous directory.
    #[must_use]
    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir.clone().unwrap_or_else(default_socket_dir)
    }

    /// The effective display token, if one can be resolved.
    #[must_use]
    pub fn display_token(&self) -> Option<String> {
        self.display_token
            .clone()
            .or_else(|| std::env::var("DISPLAY").ok())
            .filter(|token| !token.is_empty())
    }
}

/// The default shared rendezvous directory, `<system-temp-dir>/soloist`.
#[must_use]
pub fn default_socket_dir() -> PathBuf {
    std::env::temp_dir().join("soloist")
}
