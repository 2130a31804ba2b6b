//! Command-line parsing.
//!
//! Flags override environment, environment overrides defaults.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::adapter::{ClientConfig, Credentials};
use crate::types::EntryMode;

pub const USAGE: &str = "\
Usage: dropblox-client <compete|practice> [options]

Options:
  --config PATH       credentials file (default: config.txt)
  --url URL           game server WebSocket URL
  --web-url URL       website used in \"watch your game\" hints
  --ai PATH           AI executable (default: ./dropblox_ai)
  --history-dir PATH  where turn history is written (default: ./history)
  --no-history        do not write turn history
  --no-color          plain console output
  -h, --help          print this help

Environment: DROPBLOX_WS_URL, DROPBLOX_WEB_URL, DROPBLOX_AI_PATH,
DROPBLOX_HISTORY_DIR, DROPBLOX_LOG (tracing filter, default \"warn\")";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub mode: EntryMode,
    pub config_path: PathBuf,
    pub url: Option<String>,
    pub web_url: Option<String>,
    pub ai_program: Option<PathBuf>,
    pub history_dir: Option<PathBuf>,
    pub no_history: bool,
    pub no_color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliArgs),
    Help,
}

/// Parse arguments, excluding the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Command::Help);
    }

    let first = args
        .first()
        .ok_or_else(|| anyhow!("missing entry mode (compete or practice)"))?;
    let mode = EntryMode::from_str(first)
        .ok_or_else(|| anyhow!("unknown entry mode: {} (expected compete or practice)", first))?;

    let mut cli = CliArgs {
        mode,
        config_path: PathBuf::from("config.txt"),
        url: None,
        web_url: None,
        ai_program: None,
        history_dir: None,
        no_history: false,
        no_color: false,
    };

    let mut i = 1usize;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--no-history" => cli.no_history = true,
            "--no-color" => cli.no_color = true,
            "--config" | "--url" | "--web-url" | "--ai" | "--history-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| anyhow!("missing value for {}", flag))?
                    .clone();
                match flag {
                    "--config" => cli.config_path = PathBuf::from(v),
                    "--url" => cli.url = Some(v),
                    "--web-url" => cli.web_url = Some(v),
                    "--ai" => cli.ai_program = Some(PathBuf::from(v)),
                    _ => cli.history_dir = Some(PathBuf::from(v)),
                }
            }
            other => return Err(anyhow!("unknown argument: {}", other)),
        }
        i += 1;
    }

    Ok(Command::Run(cli))
}

impl CliArgs {
    /// Load credentials and resolve the final configuration.
    pub fn resolve(self) -> Result<ClientConfig> {
        let credentials = Credentials::from_file(&self.config_path)
            .with_context(|| format!("loading credentials for {} mode", self.mode))?;
        let base = ClientConfig::from_env(credentials, self.mode);
        Ok(self.apply(base))
    }

    fn apply(self, mut config: ClientConfig) -> ClientConfig {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(web_url) = self.web_url {
            config.web_url = web_url;
        }
        if let Some(ai) = self.ai_program {
            config.ai_program = ai;
        }
        if self.no_history {
            config.history_dir = None;
        } else if let Some(dir) = self.history_dir {
            config.history_dir = Some(dir);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(list: &[&str]) -> CliArgs {
        match parse_args(&args(list)).unwrap() {
            Command::Run(cli) => cli,
            Command::Help => panic!("expected run"),
        }
    }

    #[test]
    fn mode_alone_uses_defaults() {
        let cli = run(&["practice"]);
        assert_eq!(cli.mode, EntryMode::Practice);
        assert_eq!(cli.config_path, PathBuf::from("config.txt"));
        assert!(cli.url.is_none());
        assert!(!cli.no_history);
    }

    #[test]
    fn flags_are_parsed() {
        let cli = run(&[
            "compete",
            "--config",
            "team.txt",
            "--url",
            "ws://127.0.0.1:9000/ws",
            "--ai",
            "./bot",
            "--history-dir",
            "runs",
            "--no-color",
        ]);
        assert_eq!(cli.mode, EntryMode::Compete);
        assert_eq!(cli.config_path, PathBuf::from("team.txt"));
        assert_eq!(cli.url.as_deref(), Some("ws://127.0.0.1:9000/ws"));
        assert_eq!(cli.ai_program, Some(PathBuf::from("./bot")));
        assert_eq!(cli.history_dir, Some(PathBuf::from("runs")));
        assert!(cli.no_color);
    }

    #[test]
    fn help_wins_anywhere() {
        assert_eq!(parse_args(&args(&["compete", "--help"])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn bad_arguments_are_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["tournament"])).is_err());
        assert!(parse_args(&args(&["compete", "--url"])).is_err());
        assert!(parse_args(&args(&["compete", "--bogus"])).is_err());
    }

    #[test]
    fn flags_override_config_and_no_history_wins() {
        let creds = Credentials::parse("falcons\nhunter2\n", std::path::Path::new("x")).unwrap();
        let base = ClientConfig::from_env(creds, EntryMode::Compete);

        let cli = run(&["compete", "--url", "ws://local/ws", "--history-dir", "h", "--no-history"]);
        let config = cli.apply(base.clone());
        assert_eq!(config.url, "ws://local/ws");
        assert_eq!(config.history_dir, None);

        let cli = run(&["compete", "--history-dir", "h"]);
        assert_eq!(cli.apply(base).history_dir, Some(PathBuf::from("h")));
    }
}
