//! Turn history - per-game records of what the AI saw and what it played
//!
//! Every game gets its own directory under the history root, named
//! `<game_id>_<epoch_seconds>`. Inside, turn `N` produces two plain-text files:
//!
//! | File | Contents |
//! |------|----------|
//! | `state<N>` | game state JSON exactly as the server sent it |
//! | `move<N>` | JSON array of the commands submitted, e.g. `["rotate","left"]` |
//!
//! The final game state is written as one extra `state<N>` with no matching
//! `move<N>`. Records are written atomically, so a viewer polling the directory
//! never sees a half-written file.
//!
//! - [`logger`]: the write side ([`TurnLogger`])
//! - [`reader`]: read helpers that turn missing files into placeholders

pub mod logger;
pub mod reader;

pub use dropblox_types as types;

pub use logger::{move_file_name, session_dir_name, state_file_name, HistoryError, TurnLogger};
pub use reader::{parse_session_dir_name, read_record, read_turn, TurnView, NOT_FOUND};
