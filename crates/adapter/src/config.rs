//! Client configuration.
//!
//! Everything the connection and session need is resolved once at startup into
//! a [`ClientConfig`] and handed down explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::types::{
    EntryMode, DEFAULT_AI_PROGRAM, DEFAULT_HISTORY_DIR, DEFAULT_WEBSOCKET_URL, DEFAULT_WEB_URL,
};

/// Placeholder values shipped in the template `config.txt`.
const TEAM_NAME_PLACEHOLDER: &str = "TEAM_NAME_HERE";
const TEAM_PASSWORD_PLACEHOLDER: &str = "TEAM_PASSWORD_HERE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read credentials file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credentials file {} must contain a team name line and a password line", .path.display())]
    Incomplete { path: PathBuf },
    #[error("please specify a team name and password in {}", .path.display())]
    Placeholder { path: PathBuf },
}

/// Team identity sent with every message.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub team_name: String,
    pub team_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("team_name", &self.team_name)
            .field("team_password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Load from a credentials file: team name on the first line, password on
    /// the second.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut lines = contents.lines();
        let team_name = lines.next().unwrap_or("").to_string();
        let team_password = lines.next().unwrap_or("").to_string();

        if team_name == TEAM_NAME_PLACEHOLDER || team_password == TEAM_PASSWORD_PLACEHOLDER {
            return Err(ConfigError::Placeholder {
                path: path.to_path_buf(),
            });
        }
        if team_name.trim().is_empty() || team_password.is_empty() {
            return Err(ConfigError::Incomplete {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            team_name,
            team_password,
        })
    }
}

/// Backoff between reconnect attempts.
///
/// Delays grow from `initial` by `multiplier` up to `max`; attempts are
/// unlimited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based) since the last good
    /// connection.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let factor = self.multiplier.max(1).saturating_pow(exp);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Website shown in "watch your game" hints.
    pub web_url: String,
    pub credentials: Credentials,
    pub mode: EntryMode,
    pub ai_program: PathBuf,
    /// `None` disables turn history.
    pub history_dir: Option<PathBuf>,
    pub reconnect: ReconnectPolicy,
    /// How long to wait for the server to acknowledge our close frame.
    pub close_timeout: Duration,
}

impl ClientConfig {
    /// Defaults relative to the current directory, with environment overrides:
    ///
    /// - `DROPBLOX_WS_URL`
    /// - `DROPBLOX_WEB_URL`
    /// - `DROPBLOX_AI_PATH`
    /// - `DROPBLOX_HISTORY_DIR`
    pub fn from_env(credentials: Credentials, mode: EntryMode) -> Self {
        use std::env;

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let non_empty = |key: &str| {
            env::var(key)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Self {
            url: non_empty("DROPBLOX_WS_URL").unwrap_or_else(|| DEFAULT_WEBSOCKET_URL.to_string()),
            web_url: non_empty("DROPBLOX_WEB_URL").unwrap_or_else(|| DEFAULT_WEB_URL.to_string()),
            credentials,
            mode,
            ai_program: non_empty("DROPBLOX_AI_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| cwd.join(DEFAULT_AI_PROGRAM)),
            history_dir: Some(
                non_empty("DROPBLOX_HISTORY_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| cwd.join(DEFAULT_HISTORY_DIR)),
            ),
            reconnect: ReconnectPolicy::default(),
            close_timeout: Duration::from_secs(5),
        }
    }
}
