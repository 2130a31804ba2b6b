//! Dropblox server adapter - plays games over WebSocket with an external AI.
//!
//! # Protocol Overview
//!
//! The server speaks JSON text frames, each an object with a `type` field:
//!
//! 1. **Connection**: client connects to the game server WebSocket
//! 2. **Create**: client sends `CREATE_NEW_GAME`, server answers `NEW_GAME_CREATED`
//! 3. **Turns**: server sends `AWAITING_NEXT_MOVE` with the board and a time
//!    budget; the client runs the AI and replies with `SUBMIT_MOVE`
//! 4. **End**: server sends `GAME_OVER`; the client closes with status 1001
//!
//! Every outbound message carries `team_name`, `team_password` and
//! `entry_mode`.
//!
//! # Layout
//!
//! - [`protocol`]: wire message types and parsing
//! - [`session`]: per-connection state machine driving the AI and history
//! - [`connection`]: socket lifecycle and reconnect policy
//! - [`config`]: credentials and resolved client settings

pub mod config;
pub mod connection;
pub mod protocol;
pub mod session;

pub use dropblox_history as history;
pub use dropblox_runner as runner;
pub use dropblox_term as term;
pub use dropblox_types as types;

pub use config::{ClientConfig, ConfigError, Credentials, ReconnectPolicy};
pub use connection::{classify_closure, ClientExit, Closure, ClosureAction, ConnectionSupervisor};
pub use protocol::{parse_server_message, ClientMessage, ProtocolError, ServerMessage};
pub use session::{Outbound, ProtocolState, SessionProtocol};
