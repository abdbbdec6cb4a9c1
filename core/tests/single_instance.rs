//! End-to-end tests over the real Unix socket transport.
//!
//! Each test gets its own rendezvous directory and a fixed display
//! token, so parallel tests never share an election. Two `App` values
//! in one process play the two OS processes; nothing in the protocol
//! distinguishes them from separate processes apart from the PID suffix
//! on fresh socket paths, which only matters at bind time.

use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use soloist_core::{commands, App, BackendKind, Config, MessageData, Response};

fn socket_config(dir: &TempDir) -> Config {
    Config {
        backend: BackendKind::Socket,
        socket_dir: Some(dir.path().to_path_buf()),
        display_token: Some(":0".to_owned()),
    }
}

#[tokio::test]
async fn exactly_one_server_per_identity() {
    let dir = TempDir::new().unwrap();

    let first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    let second = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    let third = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();

    assert!(!first.is_running());
    assert!(second.is_running());
    assert!(third.is_running(), "a third claimant must never win");
}

#[tokio::test]
async fn end_to_end_claim_send_dispatch() {
    let dir = TempDir::new().unwrap();
    const CUSTOM_CMD: i32 = 42;

    let first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert!(!first.is_running());

    first.add_command("custom", CUSTOM_CMD);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    first.on_message(move |command, data, timestamp| {
        sink.lock().push((
            command,
            data.data().map(<[u8]>::to_vec),
            data.startup_id().map(str::to_owned),
            timestamp,
        ));
        Response::Ok
    });

    let second = App::claim("org.test.App", Some("_TIMEtest"), socket_config(&dir))
        .await
        .unwrap();
    assert!(second.is_running());
    second.add_command("custom", CUSTOM_CMD);

    let mut data = MessageData::new();
    data.set(Some(b"hello"));
    let response = second.send_message(CUSTOM_CMD, Some(&data)).await;
    assert_eq!(response, Response::Ok);

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    let (command, payload, startup_id, timestamp) = &seen[0];
    assert_eq!(*command, CUSTOM_CMD);
    assert_eq!(payload.as_deref(), Some(b"hello".as_ref()));
    assert_eq!(startup_id.as_deref(), Some("_TIMEtest"));
    assert!(*timestamp > 0);
}

#[tokio::test]
async fn dispatch_chain_short_circuits_over_the_wire() {
    let dir = TempDir::new().unwrap();

    let first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    first.on_message(|_, _, _| Response::Passthrough);
    first.on_message(|_, _, _| Response::Cancel);
    first.on_message(|_, _, _| panic!("third handler must never run"));

    let second = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    let response = second.send_message(commands::ACTIVATE, None).await;
    assert_eq!(response, Response::Cancel);
}

#[tokio::test]
async fn all_passthrough_defaults_to_ok() {
    let dir = TempDir::new().unwrap();

    let first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    first.on_message(|_, _, _| Response::Passthrough);

    let second = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert_eq!(
        second.send_message(commands::ACTIVATE, None).await,
        Response::Ok
    );
}

#[tokio::test]
async fn binary_payload_survives_framing() {
    let dir = TempDir::new().unwrap();

    let first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    first.on_message(move |_, data, _| {
        *sink.lock() = data.data().map(<[u8]>::to_vec);
        Response::Ok
    });

    let second = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();

    let nasty = b"tabs\there\r\nnewlines\x00nul\xffhigh\\slash";
    let mut data = MessageData::new();
    data.set(Some(nasty));
    assert_eq!(
        second.send_message(commands::OPEN, Some(&data)).await,
        Response::Ok
    );

    assert_eq!(seen.lock().as_deref(), Some(nasty.as_ref()));
}

#[tokio::test]
async fn dead_server_identity_is_reclaimed() {
    let dir = TempDir::new().unwrap();

    // Simulate a server that exited without cleanup: a socket file that
    // matches the rendezvous pattern but refuses connections.
    let stale = dir.path().join("org.test.App.:0.4242");
    drop(std::os::unix::net::UnixListener::bind(&stale).unwrap());
    assert!(stale.exists());

    let next = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert!(
        !next.is_running(),
        "the next claimant reclaims the identity"
    );
    assert!(!stale.exists(), "the stale socket file was removed");
}

#[tokio::test]
async fn server_shutdown_releases_the_identity() {
    let dir = TempDir::new().unwrap();

    let mut first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert!(!first.is_running());
    first.shutdown();

    let next = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert!(!next.is_running());
}

#[tokio::test]
async fn send_to_vanished_server_fails_cleanly() {
    let dir = TempDir::new().unwrap();

    let mut first = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    let second = App::claim("org.test.App", None, socket_config(&dir))
        .await
        .unwrap();
    assert!(second.is_running());

    // The server goes away after the election.
    first.shutdown();
    drop(first);

    let response = second.send_message(commands::ACTIVATE, None).await;
    assert_eq!(response, Response::Fail);

    // Failure must not leave a socket file behind.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
}

#[tokio::test]
async fn in_process_backend_honours_the_same_contract() {
    let config = Config {
        backend: BackendKind::InProcess,
        ..Config::default()
    };

    let first = App::claim("org.test.InProcParity", None, config.clone())
        .await
        .unwrap();
    first.on_message(|command, data, _| {
        assert_eq!(command, commands::OPEN);
        assert_eq!(data.text().as_deref(), Some("hi"));
        Response::Cancel
    });

    let second = App::claim("org.test.InProcParity", None, config)
        .await
        .unwrap();
    assert!(second.is_running());

    let mut data = MessageData::new();
    data.set_text("hi");
    assert_eq!(
        second.send_message(commands::OPEN, Some(&data)).await,
        Response::Cancel
    );
}
