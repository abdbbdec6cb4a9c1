//! Error Types
//!
//! The only error that crosses the library boundary is [`ClaimError`]:
//! everything that can go wrong after a successful claim is reported
//! through a [`Response`](crate::Response) code instead, so transport
//! trouble never surfaces as an error (let alone a panic) inside
//! application logic.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to claim an application identity.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// No display-scoping token was available. Single-instance semantics
    /// need a session-scoped identity; without one the claim is aborted.
    #[error(
        "no display token found; set DISPLAY (or SOLOIST_DISPLAY) so the \
         instance can be scoped to a session"
    )]
    NoDisplay,

    /// The shared rendezvous directory could not be created.
    #[error("unable to create socket directory {path:?}: {source}")]
    SocketDir {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Binding the listening socket failed.
    #[error("unable to bind rendezvous socket {path:?}: {source}")]
    Bind {
        /// The socket path that could not be bound.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
