//! Client Role
//!
//! One connection per command: connect to the rendezvous socket, write
//! the framed request, then wait for the one-line response. The sender
//! has nothing else to do while waiting, so the wait is a plain await
//! with no read timeout. A server that stalls mid-reply leaves the
//! client waiting, a limitation inherited from the protocol (staleness
//! is only detected when connect itself fails).

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::response::Response;

/// Connect to `path`, send `frame`, and await the response code.
///
/// A first failed connect is treated as a stale socket: the file is
/// unlinked and the connect retried once. Every transport failure maps
/// to [`Response::Fail`]; an unrecognized response token maps to
/// [`Response::Invalid`]. No error escapes.
pub(super) async fn exchange(path: &Path, frame: &[u8]) -> Response {
    let mut stream = match connect_with_retry(path).await {
        Some(stream) => stream,
        None => return Response::Fail,
    };

    if let Err(err) = stream.write_all(frame).await {
        tracing::warn!(error = %err, "unable to send message");
        return Response::Fail;
    }
    if let Err(err) = stream.flush().await {
        tracing::warn!(error = %err, "unable to flush message");
        return Response::Fail;
    }

    read_response(stream).await
}

async fn connect_with_retry(path: &Path) -> Option<UnixStream> {
    if let Ok(stream) = UnixStream::connect(path).await {
        return Some(stream);
    }

    tracing::warn!(
        path = ?path,
        "no connection to the running instance found (stale socket); retrying"
    );
    super::unlink_stale(path);

    match UnixStream::connect(path).await {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::warn!(path = ?path, error = %err, "unable to reach any instance");
            None
        }
    }
}

async fn read_response(stream: UnixStream) -> Response {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    match reader.read_line(&mut line).await {
        Ok(0) => {
            // The server dropped us without replying: it judged our
            // frame malformed, or died mid-exchange.
            tracing::warn!("connection closed before a response arrived");
            Response::Fail
        }
        Ok(_) => {
            if !line.ends_with('\n') {
                tracing::warn!("partial response before the connection closed");
                return Response::Fail;
            }
            let nick = line.trim_end_matches(['\n', '\r']);
            Response::from_nick(nick)
        }
        Err(err) => {
            tracing::warn!(error = %err, "unable to receive the response");
            Response::Fail
        }
    }
}
