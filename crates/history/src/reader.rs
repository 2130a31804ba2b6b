//! Read side of the turn history, for viewers.

use std::io::ErrorKind;
use std::path::Path;

use crate::logger::{move_file_name, state_file_name, HistoryError};

/// Placeholder returned for a record that does not exist.
pub const NOT_FOUND: &str = "File not found!";

/// Moves shown for a turn that never logged any.
const NO_MOVES: &str = "[]";

/// One turn as a viewer shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnView {
    pub index: u64,
    pub state: String,
    pub moves: String,
}

/// Read a record, substituting `default` (or [`NOT_FOUND`]) when it is missing.
///
/// Only a missing file degrades; other I/O failures are returned.
pub fn read_record(path: &Path, default: Option<&str>) -> Result<String, HistoryError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(default.unwrap_or(NOT_FOUND).to_string()),
        Err(source) => Err(HistoryError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn read_turn(dir: &Path, index: u64) -> Result<TurnView, HistoryError> {
    Ok(TurnView {
        index,
        state: read_record(&dir.join(state_file_name(index)), None)?,
        moves: read_record(&dir.join(move_file_name(index)), Some(NO_MOVES))?,
    })
}

/// Split `<game_id>_<epoch_seconds>` into its parts.
///
/// The timestamp follows the last underscore, so ids may contain underscores.
pub fn parse_session_dir_name(name: &str) -> Option<(&str, u64)> {
    let (game_id, ts) = name.rsplit_once('_')?;
    if game_id.is_empty() {
        return None;
    }
    Some((game_id, ts.parse().ok()?))
}
