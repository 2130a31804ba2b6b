//! Dropblox competition client.
//!
//! Connects to the game server, runs a local AI executable once per turn and
//! submits the moves it prints. See [`adapter`] for the protocol.
//!
//! # Workspace
//!
//! | Crate | Role |
//! |-------|------|
//! | [`types`] | shared vocabulary: moves, entry modes, game ids, budgets |
//! | [`runner`] | deadline-bounded AI subprocess |
//! | [`history`] | per-turn state/move records on disk |
//! | [`term`] | operator console output |
//! | [`adapter`] | WebSocket session and reconnect policy |

pub mod cli;

pub use dropblox_adapter as adapter;
pub use dropblox_history as history;
pub use dropblox_runner as runner;
pub use dropblox_term as term;
pub use dropblox_types as types;
