//! Rendezvous Path Resolution
//!
//! The rendezvous socket lives at a deterministic, collision-resistant
//! path so that a freshly launched process can find the running instance
//! without any shared state beyond the filesystem:
//!
//! ```text
//! <socket-dir>/<app-name>.<display-token>.<pid>
//! ```
//!
//! The display token scopes the instance to one session (two X displays
//! get two independent instances); the PID suffix makes fresh paths
//! unique without locking. Locating the running instance is a prefix
//! scan of the shared directory, accepting only socket-type nodes owned
//! by the current user; anything else at a matching name is someone
//! else's file, not our server.

use std::fs;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use crate::error::ClaimError;

/// Outcome of resolving the rendezvous path for a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPath {
    /// A socket file owned by us already exists: candidate live server.
    Existing(PathBuf),
    /// No candidate found; this PID-qualified path is free to bind.
    Fresh(PathBuf),
}

impl ResolvedPath {
    /// The underlying path, whichever way it was resolved.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        match self {
            ResolvedPath::Existing(path) | ResolvedPath::Fresh(path) => path,
        }
    }
}

/// Resolve the rendezvous path for `name` scoped by `token`.
///
/// Creates `dir` if needed (racing another process on the shared
/// directory is tolerated), then scans it for a live candidate socket
/// before falling back to a fresh PID-qualified path.
///
/// # Errors
///
/// [`ClaimError::NoDisplay`] if `token` is absent or empty;
/// [`ClaimError::SocketDir`] if the directory cannot be created.
pub fn resolve(name: &str, token: Option<&str>, dir: &Path) -> Result<ResolvedPath, ClaimError> {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => {
            tracing::warn!(
                app = name,
                "no display token; single-instance semantics need a session identity"
            );
            return Err(ClaimError::NoDisplay);
        }
    };

    fs::create_dir_all(dir).map_err(|source| ClaimError::SocketDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = format!("{name}.{token}.");
    if let Some(found) = find_with_prefix(dir, &prefix) {
        tracing::debug!(path = ?found, "found candidate rendezvous socket");
        return Ok(ResolvedPath::Existing(found));
    }

    Ok(ResolvedPath::Fresh(fresh_path(name, token, dir)))
}

/// The PID-qualified path this process would bind its own server at.
#[must_use]
pub fn fresh_path(name: &str, token: &str, dir: &Path) -> PathBuf {
    dir.join(format!("{name}.{token}.{}", std::process::id()))
}

/// Whether `path` is a socket-type filesystem node owned by the current
/// effective user.
#[must_use]
pub fn is_live_candidate(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    meta.file_type().is_socket() && meta.uid() == unsafe { libc::geteuid() }
}

fn find_with_prefix(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(dir = ?dir, error = %err, "unable to scan socket directory");
            return None;
        }
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with(prefix) {
            let path = entry.path();
            if is_live_candidate(&path) {
                return Some(path);
            }
        }
    }

    None
}
