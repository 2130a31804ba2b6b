mod common;

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;

use common::*;
use dropblox_client::adapter::{ClientExit, ConnectionSupervisor};
use dropblox_client::types::EntryMode;

const NO_AI: &str = "/definitely/not/here/dropblox_ai";

#[tokio::test]
async fn compete_reconnects_after_unexpected_close_with_a_fresh_session() {
    let history = tempfile::tempdir().unwrap();
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        let create = recv_json(&mut first).await;
        assert_eq!(create["type"], "CREATE_NEW_GAME");
        assert_eq!(create["entry_mode"], "compete");
        send_text(&mut first, r#"{"type":"NEW_GAME_CREATED","game_id":"g1"}"#).await;
        close_with(&mut first, 1000, "server restarting").await;

        let mut second = accept(&listener).await;
        let create = recv_json(&mut second).await;
        assert_eq!(create["type"], "CREATE_NEW_GAME");
        send_text(&mut second, r#"{"type":"NEW_GAME_CREATED","game_id":"g2"}"#).await;
        send_text(&mut second, r#"{"type":"GAME_OVER","game_state":{"n":2}}"#).await;
        recv_close_code(&mut second).await
    });

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = ConnectionSupervisor::new(config(
        &url,
        EntryMode::Compete,
        Path::new(NO_AI),
        Some(history.path().to_path_buf()),
    ));
    let exit = tokio::time::timeout(Duration::from_secs(10), supervisor.run(shutdown_rx))
        .await
        .expect("client did not finish")
        .expect("client failed");

    assert_eq!(exit, ClientExit::GameCompleted);
    assert_eq!(supervisor.connections(), 2);
    assert_eq!(server.await.unwrap(), Some(1001));

    let dirs = session_dirs(history.path());
    assert_eq!(dirs.len(), 2);
    assert!(dirs[0].starts_with("g1_"));
    assert!(dirs[1].starts_with("g2_"));
    let final_state = std::fs::read_to_string(history.path().join(&dirs[1]).join("state0")).unwrap();
    assert_eq!(final_state, r#"{"n":2}"#);
}

#[tokio::test]
async fn compete_reconnects_after_connection_drops_without_close_frame() {
    let history = tempfile::tempdir().unwrap();
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        recv_json(&mut first).await;
        send_text(&mut first, r#"{"type":"NEW_GAME_CREATED","game_id":"g1"}"#).await;
        // socket goes away with no close handshake
        drop(first);

        let mut second = accept(&listener).await;
        let create = recv_json(&mut second).await;
        assert_eq!(create["type"], "CREATE_NEW_GAME");
        assert_eq!(create["team_name"], "falcons");
        send_text(&mut second, r#"{"type":"NEW_GAME_CREATED","game_id":"g2"}"#).await;
        send_text(&mut second, r#"{"type":"GAME_OVER","game_state":{}}"#).await;
        recv_close_code(&mut second).await
    });

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor = ConnectionSupervisor::new(config(
        &url,
        EntryMode::Compete,
        Path::new(NO_AI),
        Some(history.path().to_path_buf()),
    ));
    let exit = tokio::time::timeout(Duration::from_secs(10), supervisor.run(shutdown_rx))
        .await
        .expect("client did not finish")
        .expect("client failed");

    assert_eq!(exit, ClientExit::GameCompleted);
    assert_eq!(supervisor.connections(), 2);
    assert_eq!(server.await.unwrap(), Some(1001));

    let dirs = session_dirs(history.path());
    assert_eq!(dirs.len(), 2);
    assert!(dirs[0].starts_with("g1_"));
    assert!(dirs[1].starts_with("g2_"));
}

#[tokio::test]
async fn practice_exits_after_unexpected_close() {
    let (listener, url) = listener().await;

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor =
        ConnectionSupervisor::new(config(&url, EntryMode::Practice, Path::new(NO_AI), None));
    let client = tokio::spawn(async move {
        let exit = supervisor.run(shutdown_rx).await;
        (exit, supervisor.connections())
    });

    let mut ws = accept(&listener).await;
    recv_json(&mut ws).await;
    close_with(&mut ws, 1000, "bye").await;

    let (exit, connections) = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("client did not finish")
        .unwrap();
    assert_eq!(exit.unwrap(), ClientExit::ConnectionClosed { code: Some(1000) });
    assert_eq!(connections, 1);

    let again = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(again.is_err(), "practice mode must not reconnect");
}

#[tokio::test]
async fn server_terminal_close_is_not_followed_by_reconnect() {
    let (listener, url) = listener().await;

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor =
        ConnectionSupervisor::new(config(&url, EntryMode::Compete, Path::new(NO_AI), None));
    let client = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    let mut ws = accept(&listener).await;
    recv_json(&mut ws).await;
    close_with(&mut ws, 1001, "maintenance").await;

    let exit = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("client did not finish")
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::GameCompleted);

    let again = tokio::time::timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(again.is_err(), "terminal close must not reconnect");
}

#[tokio::test]
async fn shutdown_closes_the_socket_and_stops() {
    let (listener, url) = listener().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor =
        ConnectionSupervisor::new(config(&url, EntryMode::Compete, Path::new(NO_AI), None));
    let client = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    let mut ws = accept(&listener).await;
    recv_json(&mut ws).await;
    shutdown_tx.send(true).unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("client did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::Shutdown);
    assert_eq!(recv_close_code(&mut ws).await, Some(1000));
}

#[tokio::test]
async fn practice_connect_failure_is_an_error() {
    let (listener, url) = listener().await;
    drop(listener);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor =
        ConnectionSupervisor::new(config(&url, EntryMode::Practice, Path::new(NO_AI), None));
    let res = tokio::time::timeout(Duration::from_secs(5), supervisor.run(shutdown_rx))
        .await
        .expect("client did not finish");
    assert!(res.is_err());
    assert_eq!(supervisor.connections(), 0);
}

#[tokio::test]
async fn compete_keeps_retrying_until_shutdown() {
    let (listener, url) = listener().await;
    drop(listener);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut supervisor =
        ConnectionSupervisor::new(config(&url, EntryMode::Compete, Path::new(NO_AI), None));
    let client = tokio::spawn(async move { supervisor.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!client.is_finished());
    shutdown_tx.send(true).unwrap();

    let exit = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("client did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(exit, ClientExit::Shutdown);
}
