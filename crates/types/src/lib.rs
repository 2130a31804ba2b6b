//! Core types module - shared vocabulary for the dropblox client
//!
//! This module defines the small, dependency-free types every other crate
//! speaks: the closed set of move commands an AI may emit, the entry mode the
//! client plays in, the server-assigned game identifier, and the per-turn time
//! budget.
//!
//! # Move Commands
//!
//! The AI process answers each turn with one command per stdout line:
//!
//! | Line | Command |
//! |------|---------|
//! | `left` | [`MoveCommand::Left`] |
//! | `right` | [`MoveCommand::Right`] |
//! | `up` | [`MoveCommand::Up`] |
//! | `down` | [`MoveCommand::Down`] |
//! | `rotate` | [`MoveCommand::Rotate`] |
//!
//! Matching is exact. Anything else the AI prints is diagnostic output.
//!
//! # Protocol Constants
//!
//! - `DO_NOT_RECONNECT`: 1001 - close code that ends the client for good
//! - `DEFAULT_WEBSOCKET_URL`: the competition server endpoint
//! - `DEFAULT_AI_PROGRAM`: AI executable name, resolved against the working dir
//!
//! # Examples
//!
//! ```
//! use dropblox_types::{EntryMode, MoveCommand};
//!
//! assert_eq!(MoveCommand::from_line("rotate"), Some(MoveCommand::Rotate));
//! assert_eq!(MoveCommand::from_line("Rotate"), None);
//! assert_eq!(MoveCommand::Left.as_str(), "left");
//!
//! assert_eq!(EntryMode::from_str("compete"), Some(EntryMode::Compete));
//! assert!(EntryMode::Compete.reconnects());
//! ```

use std::fmt;
use std::time::Duration;

/// Close code meaning "the game ended normally, do not reconnect".
pub const DO_NOT_RECONNECT: u16 = 1001;

/// Reason text sent with the terminal close frame.
pub const GAME_OVER_REASON: &str = "Game over!";

/// Competition WebSocket endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://playdropblox.com/ws";

/// Competition website (used for "watch your game" links).
pub const DEFAULT_WEB_URL: &str = "https://playdropblox.com/";

/// AI executable looked up in the current working directory.
pub const DEFAULT_AI_PROGRAM: &str = "dropblox_ai";

/// History directory created under the current working directory.
pub const DEFAULT_HISTORY_DIR: &str = "history";

/// One primitive move instruction emitted by the AI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveCommand {
    Left,
    Right,
    Up,
    Down,
    Rotate,
}

impl MoveCommand {
    /// Every command, in wire order.
    pub const ALL: [MoveCommand; 5] = [
        MoveCommand::Left,
        MoveCommand::Right,
        MoveCommand::Up,
        MoveCommand::Down,
        MoveCommand::Rotate,
    ];

    /// Decode one AI output line (without its line terminator).
    ///
    /// Matching is exact and case-sensitive; surrounding whitespace makes the
    /// line diagnostic.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropblox_types::MoveCommand;
    ///
    /// assert_eq!(MoveCommand::from_line("left"), Some(MoveCommand::Left));
    /// assert_eq!(MoveCommand::from_line("down"), Some(MoveCommand::Down));
    /// assert_eq!(MoveCommand::from_line(" left"), None);
    /// assert_eq!(MoveCommand::from_line("debug info"), None);
    /// ```
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "left" => Some(MoveCommand::Left),
            "right" => Some(MoveCommand::Right),
            "up" => Some(MoveCommand::Up),
            "down" => Some(MoveCommand::Down),
            "rotate" => Some(MoveCommand::Rotate),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveCommand::Left => "left",
            MoveCommand::Right => "right",
            MoveCommand::Up => "up",
            MoveCommand::Down => "down",
            MoveCommand::Rotate => "rotate",
        }
    }
}

impl fmt::Display for MoveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the client entered the competition.
///
/// - **Compete**: ranked play; the client reconnects after unexpected closures
/// - **Practice**: a single game; any unexpected closure ends the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMode {
    Compete,
    Practice,
}

impl EntryMode {
    /// Parse the command-line mode argument (exact, lowercase).
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "compete" => Some(EntryMode::Compete),
            "practice" => Some(EntryMode::Practice),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::Compete => "compete",
            EntryMode::Practice => "practice",
        }
    }

    /// Whether an unexpected closure should trigger a new connection.
    pub fn reconnects(&self) -> bool {
        matches!(self, EntryMode::Compete)
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-assigned game identifier.
///
/// The server may send either a string or a number; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id made safe for use as a single path component.
    ///
    /// # Examples
    ///
    /// ```
    /// use dropblox_types::GameId;
    ///
    /// assert_eq!(GameId::new("g1").path_component(), "g1");
    /// assert_eq!(GameId::new("../x").path_component(), ".._x");
    /// ```
    pub fn path_component(&self) -> String {
        self.0
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time allowance for a single turn, as sent by the server.
///
/// Keeps the server's textual number (passed to the AI verbatim) next to its
/// numeric value (used as the supervision deadline).
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlineBudget {
    text: String,
    seconds: f64,
}

impl DeadlineBudget {
    pub fn new(text: impl Into<String>, seconds: f64) -> Self {
        Self {
            text: text.into(),
            seconds,
        }
    }

    /// Budget from a plain number of seconds.
    pub fn from_seconds(seconds: f64) -> Self {
        Self::new(seconds.to_string(), seconds)
    }

    /// Argument handed to the AI process.
    pub fn as_arg(&self) -> &str {
        &self.text
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Wall-clock deadline for the turn. Negative, NaN, or absurdly large
    /// budgets clamp into a representable duration.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use dropblox_types::DeadlineBudget;
    ///
    /// assert_eq!(DeadlineBudget::new("5", 5.0).timeout(), Duration::from_secs(5));
    /// assert_eq!(DeadlineBudget::new("-1", -1.0).timeout(), Duration::ZERO);
    /// ```
    pub fn timeout(&self) -> Duration {
        if !self.seconds.is_finite() || self.seconds <= 0.0 {
            if self.seconds == f64::INFINITY {
                return Duration::from_secs(MAX_BUDGET_SECS);
            }
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.seconds.min(MAX_BUDGET_SECS as f64))
    }
}

/// Upper bound on a single turn's deadline (one day).
const MAX_BUDGET_SECS: u64 = 24 * 60 * 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_commands_roundtrip_through_their_wire_names() {
        for cmd in MoveCommand::ALL {
            assert_eq!(MoveCommand::from_line(cmd.as_str()), Some(cmd));
        }
    }

    #[test]
    fn move_command_matching_is_exact() {
        assert_eq!(MoveCommand::from_line("LEFT"), None);
        assert_eq!(MoveCommand::from_line("left "), None);
        assert_eq!(MoveCommand::from_line("left\r"), None);
        assert_eq!(MoveCommand::from_line(""), None);
    }

    #[test]
    fn entry_mode_parses_only_known_modes() {
        assert_eq!(EntryMode::from_str("practice"), Some(EntryMode::Practice));
        assert_eq!(EntryMode::from_str("test"), None);
        assert_eq!(EntryMode::from_str("Compete"), None);
        assert!(!EntryMode::Practice.reconnects());
    }

    #[test]
    fn budget_timeout_handles_fractions_and_garbage() {
        assert_eq!(
            DeadlineBudget::new("0.25", 0.25).timeout(),
            Duration::from_millis(250)
        );
        assert_eq!(DeadlineBudget::new("NaN", f64::NAN).timeout(), Duration::ZERO);
        assert_eq!(
            DeadlineBudget::new("inf", f64::INFINITY).timeout(),
            Duration::from_secs(MAX_BUDGET_SECS)
        );
        assert_eq!(DeadlineBudget::from_seconds(5.0).as_arg(), "5");
    }

    #[test]
    fn game_id_display_keeps_raw_text() {
        let id = GameId::new("a/b");
        assert_eq!(id.to_string(), "a/b");
        assert_eq!(id.path_component(), "a_b");
    }
}
