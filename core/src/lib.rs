//! Soloist Core - Single-Instance Application Coordination
//!
//! This crate guarantees that only one running process owns a given
//! application identity at a time, and routes commands from redundant
//! launches to the instance that got there first.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ claim()                       ┌──────────────┐
//! │  Process B   │──────────┐         ┌──────────│  Process A   │
//! │ (launched    │          │         │          │ (first       │
//! │  second)     │          ▼         ▼          │  instance)   │
//! │              │   ┌─────────────────────┐     │              │
//! │ send_message ├──►│  rendezvous socket  ├────►│ on_message   │
//! │   ◄─ Response│   │ /tmp/soloist/<name> │     │ handlers     │
//! └──────────────┘   └─────────────────────┘     └──────────────┘
//! ```
//!
//! The first claimant binds a Unix domain socket at a deterministic,
//! per-user path and becomes the *server*; every later claimant connects
//! to it as a *client*. A client sends exactly one framed command per
//! connection and waits for a one-line [`Response`]. Sockets abandoned by
//! crashed servers are detected (connect fails against a socket-type
//! file) and reclaimed.
//!
//! # Key Types
//!
//! - [`App`]: the coordinator; claim a name, register commands and
//!   handlers, send messages to the running instance
//! - [`MessageData`]: payload container (raw bytes, text, URI list,
//!   filename) plus screen/workspace/startup-notification metadata
//! - [`Response`]: the fixed set of reply codes
//! - [`Config`]: backend selection and path overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use soloist_core::{App, Config, MessageData, Response, commands};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::claim("org.example.Editor", None, Config::from_env())
//!         .await
//!         .expect("claim failed");
//!
//!     if app.is_running() {
//!         // Another instance owns the name: hand it our file and exit.
//!         let mut data = MessageData::new();
//!         data.set_filename("/home/me/notes.txt");
//!         let resp = app.send_message(commands::OPEN, Some(&data)).await;
//!         assert_eq!(resp, Response::Ok);
//!         return;
//!     }
//!
//!     app.on_message(|command, _data, _time| {
//!         if command == commands::ACTIVATE {
//!             // present the main window ...
//!             Response::Ok
//!         } else {
//!             Response::Passthrough
//!         }
//!     });
//!
//!     // ... run the application main loop
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`app`]: the [`App`] coordinator
//! - [`backend`]: transport backends (Unix socket, in-process) and selection
//! - [`codec`]: the tab-separated, CRLF-terminated wire frame
//! - [`command`]: built-in commands and the name↔id registry
//! - [`config`]: runtime configuration and environment loading
//! - [`dispatch`]: ordered handler invocation with passthrough semantics
//! - [`message`]: the [`MessageData`] container
//! - [`rendezvous`]: socket path resolution and stale-socket detection
//! - [`response`]: the [`Response`] enumeration
//!
//! # No GUI Dependencies
//!
//! This crate has **zero** dependencies on any windowing system or GUI
//! toolkit. Screen numbers, workspaces and startup-notification ids are
//! carried as plain values; looking them up (and acting on them) is the
//! embedding application's job.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod backend;
pub mod codec;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod rendezvous;
pub mod response;

pub use app::App;
pub use command::{commands, CommandRegistry};
pub use config::{BackendKind, Config};
pub use dispatch::Dispatcher;
pub use error::ClaimError;
pub use message::MessageData;
pub use response::Response;
