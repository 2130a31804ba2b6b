//! Connection supervisor - owns the WebSocket and decides what happens when it
//! closes.
//!
//! One connection at a time. Each connection gets a fresh
//! [`SessionProtocol`]; nothing from an earlier connection is replayed. The
//! next connection attempt only starts once the previous socket's closure has
//! been observed (or its close handshake timed out and the socket was dropped).
//!
//! | Closure | `compete` | `practice` |
//! |---------|-----------|------------|
//! | code 1001 (either side) | finish | finish |
//! | any other code / no close frame | reconnect | exit |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::protocol::encode_client_message;
use crate::session::{Outbound, SessionProtocol};
use crate::term;
use crate::types::{EntryMode, DO_NOT_RECONNECT};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    /// Close status; `None` when the socket died without a close frame.
    pub code: Option<u16>,
    pub reason: String,
    /// We sent the close frame first.
    pub initiated_locally: bool,
}

/// What to do after a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureAction {
    /// Game finished normally; stop for good.
    Finish,
    Reconnect,
    /// One-shot mode: stop.
    Exit,
}

pub fn classify_closure(code: Option<u16>, mode: EntryMode) -> ClosureAction {
    if code == Some(DO_NOT_RECONNECT) {
        ClosureAction::Finish
    } else if mode.reconnects() {
        ClosureAction::Reconnect
    } else {
        ClosureAction::Exit
    }
}

/// Why the client stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientExit {
    GameCompleted,
    /// Unexpected closure in practice mode.
    ConnectionClosed { code: Option<u16> },
    Shutdown,
}

enum ConnectionEnd {
    Closed(Closure),
    Shutdown,
}

/// Resolves once `shutdown` flips to `true`; never resolves if the sender is gone.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct ConnectionSupervisor {
    config: Arc<ClientConfig>,
    /// Connections that completed the WebSocket handshake.
    connections: u64,
}

impl ConnectionSupervisor {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            connections: 0,
        }
    }

    pub fn connections(&self) -> u64 {
        self.connections
    }

    /// Connect, play, and reconnect as the entry mode dictates until the game
    /// completes, practice mode ends, or `shutdown` fires.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<ClientExit> {
        let url = self.config.url.clone();
        let mode = self.config.mode;
        // Consecutive attempts since the last connection that opened.
        let mut attempt: u32 = 0;

        loop {
            let connected = tokio::select! {
                res = connect_async(url.as_str()) => res,
                _ = wait_for_shutdown(&mut shutdown) => return Ok(ClientExit::Shutdown),
            };

            let ws = match connected {
                Ok((ws, _response)) => ws,
                Err(e) if mode.reconnects() => {
                    attempt += 1;
                    let delay = self.config.reconnect.delay(attempt);
                    term::error(format!(
                        "Could not connect to {url}: {e}. Retrying in {:.1}s",
                        delay.as_secs_f64()
                    ));
                    warn!(url = %url, attempt, error = %e, "connect failed");
                    if self.backoff(delay, &mut shutdown).await {
                        return Ok(ClientExit::Shutdown);
                    }
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("connecting to {url}"));
                }
            };

            attempt = 0;
            self.connections += 1;
            info!(url = %url, connection = self.connections, mode = %mode, "connected");

            let closure = match self.run_connection(ws, &mut shutdown).await {
                ConnectionEnd::Shutdown => return Ok(ClientExit::Shutdown),
                ConnectionEnd::Closed(closure) => closure,
            };

            let code_text = closure
                .code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string());
            let action = classify_closure(closure.code, mode);
            info!(code = ?closure.code, reason = %closure.reason, local = closure.initiated_locally, ?action, "connection closed");

            match action {
                ClosureAction::Finish => {
                    term::info(format!(
                        "Connection to server closed. Code={code_text}, Reason={}",
                        closure.reason
                    ));
                    return Ok(ClientExit::GameCompleted);
                }
                ClosureAction::Exit => {
                    term::error(format!(
                        "Connection to server closed. Code={code_text}, Reason={}",
                        closure.reason
                    ));
                    return Ok(ClientExit::ConnectionClosed { code: closure.code });
                }
                ClosureAction::Reconnect => {
                    attempt += 1;
                    let delay = self.config.reconnect.delay(attempt);
                    term::error(format!(
                        "Connection to server closed. Code={code_text}, Reason={}. Reconnecting in {:.1}s",
                        closure.reason,
                        delay.as_secs_f64()
                    ));
                    if self.backoff(delay, &mut shutdown).await {
                        return Ok(ClientExit::Shutdown);
                    }
                }
            }
        }
    }

    /// Sleep for `delay`; `true` if shutdown fired first.
    async fn backoff(&self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = wait_for_shutdown(shutdown) => true,
        }
    }

    async fn run_connection(&self, ws: WsStream, shutdown: &mut watch::Receiver<bool>) -> ConnectionEnd {
        let (mut sink, mut source) = ws.split();
        let mut protocol = SessionProtocol::new(Arc::clone(&self.config));
        let mut local_close: Option<(u16, &'static str)> = None;
        let mut peer_close: Option<Option<(u16, String)>> = None;

        let opening = protocol.on_open();
        if let Err(e) = self.perform(&mut sink, opening, &mut local_close).await {
            warn!(error = %e, "send failed");
            return ConnectionEnd::Closed(closure(local_close, peer_close));
        }

        loop {
            let closing = local_close.is_some() || peer_close.is_some();
            let frame = tokio::select! {
                frame = next_frame(&mut source, closing, self.config.close_timeout) => frame,
                _ = wait_for_shutdown(shutdown) => {
                    close_for_shutdown(&mut sink).await;
                    return ConnectionEnd::Shutdown;
                }
            };

            let text = match frame {
                None | Some(Err(WsError::ConnectionClosed)) | Some(Err(WsError::AlreadyClosed)) => {
                    return ConnectionEnd::Closed(closure(local_close, peer_close));
                }
                Some(Err(e)) => {
                    warn!(error = %e, "connection error");
                    return ConnectionEnd::Closed(closure(local_close, peer_close));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "close frame received");
                    if peer_close.is_none() {
                        peer_close = Some(frame.map(|f| (u16::from(f.code), f.reason.into_owned())));
                    }
                    continue;
                }
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        term::error("Received unsupported message type");
                        warn!("non UTF-8 binary frame, ignoring");
                        continue;
                    }
                },
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => continue,
            };

            if closing {
                debug!("message after close, ignoring");
                continue;
            }

            let actions = tokio::select! {
                out = protocol.handle_text(&text) => out,
                _ = wait_for_shutdown(shutdown) => {
                    close_for_shutdown(&mut sink).await;
                    return ConnectionEnd::Shutdown;
                }
            };

            if let Err(e) = self.perform(&mut sink, actions, &mut local_close).await {
                warn!(error = %e, "send failed");
                return ConnectionEnd::Closed(closure(local_close, peer_close));
            }
        }
    }

    /// Carry out protocol actions, attaching credentials to every message.
    async fn perform(
        &self,
        sink: &mut WsSink,
        actions: Vec<Outbound>,
        local_close: &mut Option<(u16, &'static str)>,
    ) -> Result<(), WsError> {
        for action in actions {
            match action {
                Outbound::Send(message) => {
                    let text = match encode_client_message(
                        &message,
                        &self.config.credentials,
                        self.config.mode,
                    ) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(msg_type = message.type_name(), error = %e, "cannot encode message");
                            continue;
                        }
                    };
                    debug!(msg_type = message.type_name(), "sending");
                    sink.send(Message::Text(text)).await?;
                }
                Outbound::Close { code, reason } => {
                    if local_close.is_some() {
                        continue;
                    }
                    *local_close = Some((code, reason));
                    sink.send(Message::Close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    })))
                    .await?;
                }
            }
        }
        Ok(())
    }
}

/// Next inbound frame; once closing, give up after `close_timeout`.
async fn next_frame(
    source: &mut WsSource,
    closing: bool,
    close_timeout: Duration,
) -> Option<Result<Message, WsError>> {
    if !closing {
        return source.next().await;
    }
    match tokio::time::timeout(close_timeout, source.next()).await {
        Ok(frame) => frame,
        Err(_) => {
            warn!("close handshake timed out, dropping connection");
            None
        }
    }
}

async fn close_for_shutdown(sink: &mut WsSink) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "client shutdown".into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "close on shutdown failed");
    }
}

/// Our own close code wins over the peer's echo.
fn closure(
    local_close: Option<(u16, &'static str)>,
    peer_close: Option<Option<(u16, String)>>,
) -> Closure {
    if let Some((code, reason)) = local_close {
        return Closure {
            code: Some(code),
            reason: reason.to_string(),
            initiated_locally: true,
        };
    }
    match peer_close {
        Some(Some((code, reason))) => Closure {
            code: Some(code),
            reason,
            initiated_locally: false,
        },
        Some(None) => Closure {
            code: None,
            reason: "closed without status".to_string(),
            initiated_locally: false,
        },
        None => Closure {
            code: None,
            reason: "connection lost".to_string(),
            initiated_locally: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_code_finishes_in_every_mode() {
        for mode in [EntryMode::Compete, EntryMode::Practice] {
            assert_eq!(classify_closure(Some(DO_NOT_RECONNECT), mode), ClosureAction::Finish);
        }
    }

    #[test]
    fn other_closures_depend_on_mode() {
        for code in [None, Some(1000), Some(1006), Some(1011)] {
            assert_eq!(classify_closure(code, EntryMode::Compete), ClosureAction::Reconnect);
            assert_eq!(classify_closure(code, EntryMode::Practice), ClosureAction::Exit);
        }
    }

    #[test]
    fn local_close_code_wins_over_peer_echo() {
        let c = closure(
            Some((DO_NOT_RECONNECT, "Game over!")),
            Some(Some((1000, "bye".to_string()))),
        );
        assert_eq!(c.code, Some(DO_NOT_RECONNECT));
        assert!(c.initiated_locally);

        let c = closure(None, Some(Some((1000, "bye".to_string()))));
        assert_eq!(c.code, Some(1000));
        assert_eq!(c.reason, "bye");

        assert_eq!(closure(None, None).code, None);
        assert_eq!(closure(None, Some(None)).code, None);
    }

    #[tokio::test]
    async fn wait_for_shutdown_resolves_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx))
            .await
            .expect("shutdown should be observed");
    }

    #[tokio::test]
    async fn wait_for_shutdown_stays_pending_without_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let res = tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(&mut rx)).await;
        tokio_test::assert_err!(res);
    }
}
