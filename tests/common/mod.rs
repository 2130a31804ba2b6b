#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use dropblox_client::adapter::{ClientConfig, Credentials, ReconnectPolicy};
use dropblox_client::types::EntryMode;

pub type ServerWs = WebSocketStream<TcpStream>;

pub async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}/ws"))
}

pub async fn accept(listener: &TcpListener) -> ServerWs {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("client did not connect")
        .expect("accept failed");
    accept_async(stream).await.expect("handshake failed")
}

/// Next text frame as JSON.
pub async fn recv_json(ws: &mut ServerWs) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client message")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("client sent invalid JSON"),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

pub async fn send_text(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string())).await.expect("send failed");
}

/// Wait for the client's close frame and return its code; drains the socket.
pub async fn recv_close_code(ws: &mut ServerWs) -> Option<u16> {
    let mut code = None;
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
            Ok(Some(Ok(Message::Close(frame)))) => {
                code = frame.map(|f| u16::from(f.code));
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(_))) | Ok(None) | Err(_) => return code,
        }
    }
}

/// Close from the server side and wait for the handshake to finish.
pub async fn close_with(ws: &mut ServerWs, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    };
    let _ = ws.close(Some(frame)).await;
    while let Ok(Some(Ok(_))) = tokio::time::timeout(Duration::from_secs(5), ws.next()).await {}
}

pub fn config(url: &str, mode: EntryMode, ai: &Path, history: Option<PathBuf>) -> Arc<ClientConfig> {
    Arc::new(ClientConfig {
        url: url.to_string(),
        web_url: "http://localhost/".to_string(),
        credentials: Credentials {
            team_name: "falcons".to_string(),
            team_password: "hunter2".to_string(),
        },
        mode,
        ai_program: ai.to_path_buf(),
        history_dir: history,
        reconnect: ReconnectPolicy {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(50),
            multiplier: 2,
        },
        close_timeout: Duration::from_secs(2),
    })
}

/// Directory names under the history root, sorted.
pub fn session_dirs(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "#!/bin/sh").unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f.sync_all().unwrap();
    drop(f);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
