//! Session protocol - the per-connection game state machine.
//!
//! ```text
//! DISCONNECTED --open--> AWAITING_GAME_CREATED --NEW_GAME_CREATED{id}--> IN_GAME
//!                                                                          |  ^
//!                                                         AWAITING_NEXT_MOVE  |
//!                                                                          |__|
//! IN_GAME --GAME_OVER--> GAME_OVER (terminal, close 1001)
//! ```
//!
//! The protocol never touches the socket. It consumes inbound text and returns
//! [`Outbound`] actions for the connection to perform, one message at a time.
//! A turn runs the AI to completion (or deadline) before the next message is
//! looked at.

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::history::TurnLogger;
use crate::protocol::{
    create_new_game, create_submit_move, parse_server_message, AwaitingNextMove, ClientMessage,
    GameOver, NewGameCreated, ServerMessage,
};
use crate::runner::{AiProcess, DiagnosticSink};
use crate::term;
use crate::types::{EntryMode, GameId, MoveCommand, DO_NOT_RECONNECT, GAME_OVER_REASON};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Disconnected,
    AwaitingGameCreated,
    InGame,
    GameOver,
}

/// Action for the connection to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send(ClientMessage),
    Close { code: u16, reason: &'static str },
}

/// One game, from creation to game over.
#[derive(Debug, Clone)]
pub struct Session {
    pub game_id: GameId,
    pub mode: EntryMode,
    pub turn_counter: u64,
    pub started_at: SystemTime,
}

pub struct SessionProtocol {
    config: Arc<ClientConfig>,
    ai: AiProcess,
    state: ProtocolState,
    session: Option<Session>,
    logger: Option<TurnLogger>,
    /// Turns answered on this connection, with or without a session.
    turns_handled: u64,
}

impl SessionProtocol {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        let sink: DiagnosticSink = Arc::new(|line: &str| term::passthrough(line));
        let ai = AiProcess::new(config.ai_program.clone()).with_diagnostics(sink);
        Self::with_ai(config, ai)
    }

    pub fn with_ai(config: Arc<ClientConfig>, ai: AiProcess) -> Self {
        Self {
            config,
            ai,
            state: ProtocolState::Disconnected,
            session: None,
            logger: None,
            turns_handled: 0,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn history_dir(&self) -> Option<&std::path::Path> {
        self.logger.as_ref().map(TurnLogger::dir)
    }

    pub fn turns_handled(&self) -> u64 {
        self.turns_handled
    }

    /// The connection is up: ask for a game.
    pub fn on_open(&mut self) -> Vec<Outbound> {
        self.state = ProtocolState::AwaitingGameCreated;
        vec![Outbound::Send(create_new_game())]
    }

    /// Handle one inbound text frame.
    ///
    /// Never fails: a message that cannot be handled is reported and dropped,
    /// and the session carries on.
    pub async fn handle_text(&mut self, text: &str) -> Vec<Outbound> {
        match self.dispatch(text).await {
            Ok(out) => out,
            Err(err) => {
                term::error(format!("Failed to handle server message: {err:#}"));
                error!(state = ?self.state, error = ?err, message = %text, "message handler failed");
                Vec::new()
            }
        }
    }

    async fn dispatch(&mut self, text: &str) -> anyhow::Result<Vec<Outbound>> {
        let message = parse_server_message(text).context("parsing server message")?;
        debug!(msg_type = message.type_name(), state = ?self.state, "server message");

        match message {
            ServerMessage::NewGameCreated(m) => Ok(self.on_new_game_created(m)),
            ServerMessage::AwaitingNextMove(m) => self.on_awaiting_next_move(m).await,
            ServerMessage::GameOver(m) => Ok(self.on_game_over(m)),
            ServerMessage::Unsupported { msg_type } => {
                term::error("Received unsupported message type");
                warn!(msg_type = %msg_type, "unsupported message type");
                Ok(Vec::new())
            }
        }
    }

    fn on_new_game_created(&mut self, msg: NewGameCreated) -> Vec<Outbound> {
        if self.state == ProtocolState::GameOver {
            warn!("NEW_GAME_CREATED after game over, ignoring");
            return Vec::new();
        }

        let Some(game_id) = msg.game_id else {
            term::info("Waiting for competition to begin");
            return Vec::new();
        };

        let started_at = SystemTime::now();
        self.logger = self.config.history_dir.as_deref().and_then(|root| {
            match TurnLogger::open(root, &game_id, started_at) {
                Ok(logger) => Some(logger),
                Err(e) => {
                    term::error(format!("Turn history disabled for this game: {e}"));
                    warn!(error = %e, "cannot open turn history");
                    None
                }
            }
        });

        info!(game_id = %game_id, mode = %self.config.mode, "new game");
        term::info(format!(
            "New game started. Watch at {}#submission_history",
            self.config.web_url
        ));

        self.session = Some(Session {
            game_id,
            mode: self.config.mode,
            turn_counter: 0,
            started_at,
        });
        self.state = ProtocolState::InGame;
        Vec::new()
    }

    async fn on_awaiting_next_move(&mut self, msg: AwaitingNextMove) -> anyhow::Result<Vec<Outbound>> {
        match self.state {
            ProtocolState::GameOver => {
                warn!("AWAITING_NEXT_MOVE after game over, ignoring");
                return Ok(Vec::new());
            }
            ProtocolState::InGame => {}
            state => warn!(?state, "AWAITING_NEXT_MOVE before a game was created"),
        }

        let budget = msg.budget().context("reading turn budget")?;
        let game_state = msg.game_state.get();
        let turn = self.session.as_ref().map(|s| s.turn_counter);

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_state(game_state) {
                report_history_error(&e);
            }
        }

        let moves = match self.ai.run(game_state, &budget).await {
            Ok(outcome) => {
                if outcome.timed_out {
                    term::error("Terminating process");
                }
                term::info(format!("commands received: {}", format_moves(&outcome.commands)));
                info!(
                    turn,
                    commands = outcome.commands.len(),
                    timed_out = outcome.timed_out,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "turn computed"
                );
                outcome.commands
            }
            Err(e) => {
                term::error(format!("Could not run the AI: {e}"));
                error!(turn, error = %e, "AI launch failed, submitting an empty move list");
                Vec::new()
            }
        };

        if let Some(logger) = self.logger.as_mut() {
            if let Err(e) = logger.log_move(&moves) {
                report_history_error(&e);
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.turn_counter += 1;
        }
        self.turns_handled += 1;

        Ok(vec![Outbound::Send(create_submit_move(moves))])
    }

    fn on_game_over(&mut self, msg: GameOver) -> Vec<Outbound> {
        if self.state == ProtocolState::GameOver {
            warn!("duplicate GAME_OVER, ignoring");
            return Vec::new();
        }

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_state(msg.game_state.get()) {
                report_history_error(&e);
            }
        }

        let score = format_score(msg.final_score.as_ref());
        term::info(format!("Game over! Your score was: {score}"));
        info!(
            game_id = ?self.session.as_ref().map(|s| s.game_id.as_str()),
            score = %score,
            "game over"
        );

        self.state = ProtocolState::GameOver;
        vec![Outbound::Close {
            code: DO_NOT_RECONNECT,
            reason: GAME_OVER_REASON,
        }]
    }
}

fn report_history_error(e: &crate::history::HistoryError) {
    term::error(format!("Could not write turn history: {e}"));
    warn!(error = %e, "history write failed");
}

/// Scores print bare; a string score carries no JSON quotes.
fn format_score(score: Option<&serde_json::Value>) -> String {
    match score {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

fn format_moves(moves: &[MoveCommand]) -> String {
    let names: Vec<&str> = moves.iter().map(MoveCommand::as_str).collect();
    format!("[{}]", names.join(", "))
}
