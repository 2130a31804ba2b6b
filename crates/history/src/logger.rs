//! Write side of the turn history.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::debug;

use crate::types::{GameId, MoveCommand};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot create history directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write history record {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot read history record {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode move list: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Directory name for a game started at `epoch_seconds`.
pub fn session_dir_name(game_id: &GameId, epoch_seconds: u64) -> String {
    format!("{}_{}", game_id.path_component(), epoch_seconds)
}

pub fn state_file_name(turn: u64) -> String {
    format!("state{turn}")
}

pub fn move_file_name(turn: u64) -> String {
    format!("move{turn}")
}

/// Append-only recorder for one game.
///
/// `log_state` writes the current turn's input; `log_move` writes its output
/// and moves on to the next turn. A turn may log its state without ever
/// logging a move.
#[derive(Debug)]
pub struct TurnLogger {
    dir: PathBuf,
    turn: u64,
}

impl TurnLogger {
    /// Create (or reuse) the directory for `game_id` under `root`.
    pub fn open(root: &Path, game_id: &GameId, started_at: SystemTime) -> Result<Self, HistoryError> {
        let epoch_seconds = started_at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let dir = root.join(session_dir_name(game_id, epoch_seconds));
        std::fs::create_dir_all(&dir).map_err(|source| HistoryError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "history directory ready");
        Ok(Self { dir, turn: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Index the next `log_state` / `log_move` will use.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn log_state(&self, game_state: &str) -> Result<PathBuf, HistoryError> {
        let path = self.dir.join(state_file_name(self.turn));
        write_atomic(&self.dir, &path, game_state.as_bytes())?;
        Ok(path)
    }

    /// Record the turn's moves and advance. The index advances even when the
    /// write fails so later records keep lining up with the game's turns.
    pub fn log_move(&mut self, moves: &[MoveCommand]) -> Result<PathBuf, HistoryError> {
        let path = self.dir.join(move_file_name(self.turn));
        self.turn += 1;
        let names: Vec<&str> = moves.iter().map(MoveCommand::as_str).collect();
        let encoded = serde_json::to_vec(&names)?;
        write_atomic(&self.dir, &path, &encoded)?;
        Ok(path)
    }
}

/// Temp file in the same directory, then rename over the target.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
    let write_err = |source| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
