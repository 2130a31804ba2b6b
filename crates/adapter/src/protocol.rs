//! Protocol module - JSON message types for the competition server
//!
//! Every frame is one JSON object with a `type` field. Messages the client
//! sends are wrapped in an [`Envelope`] that adds the team credentials and the
//! entry mode at send time.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Number;
use thiserror::Error;

use crate::config::Credentials;
use crate::types::{DeadlineBudget, EntryMode, GameId, MoveCommand};

pub const CREATE_NEW_GAME: &str = "CREATE_NEW_GAME";
pub const NEW_GAME_CREATED: &str = "NEW_GAME_CREATED";
pub const AWAITING_NEXT_MOVE: &str = "AWAITING_NEXT_MOVE";
pub const SUBMIT_MOVE: &str = "SUBMIT_MOVE";
pub const GAME_OVER: &str = "GAME_OVER";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message has no string \"type\" field")]
    MissingType,
    #[error("malformed {msg_type} message: {source}")]
    Malformed {
        msg_type: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("seconds_remaining is not a usable number: {0}")]
    InvalidBudget(Number),
}

// ============== Client -> Server Messages ==============

/// Message body sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "CREATE_NEW_GAME")]
    CreateNewGame,
    #[serde(rename = "SUBMIT_MOVE")]
    SubmitMove { move_list: MoveList },
}

impl ClientMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::CreateNewGame => CREATE_NEW_GAME,
            ClientMessage::SubmitMove { .. } => SUBMIT_MOVE,
        }
    }
}

/// Ordered move list, serialized as an array of command names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList(pub Vec<MoveCommand>);

impl Serialize for MoveList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for cmd in &self.0 {
            seq.serialize_element(cmd.as_str())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for MoveList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                MoveCommand::from_line(name)
                    .ok_or_else(|| serde::de::Error::custom(format!("unknown move {name:?}")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(MoveList)
    }
}

/// What actually goes on the wire: the message plus who is sending it.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    #[serde(flatten)]
    pub message: &'a ClientMessage,
    pub team_name: &'a str,
    pub team_password: &'a str,
    pub entry_mode: &'static str,
}

/// Serialize `message` with credentials attached.
pub fn encode_client_message(
    message: &ClientMessage,
    credentials: &Credentials,
    mode: EntryMode,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        message,
        team_name: &credentials.team_name,
        team_password: &credentials.team_password,
        entry_mode: mode.as_str(),
    })
}

pub fn create_new_game() -> ClientMessage {
    ClientMessage::CreateNewGame
}

pub fn create_submit_move(moves: Vec<MoveCommand>) -> ClientMessage {
    ClientMessage::SubmitMove {
        move_list: MoveList(moves),
    }
}

// ============== Server -> Client Messages ==============

#[derive(Debug, Deserialize)]
pub struct NewGameCreated {
    #[serde(default, deserialize_with = "deserialize_game_id")]
    pub game_id: Option<GameId>,
}

#[derive(Debug, Deserialize)]
pub struct AwaitingNextMove {
    /// Kept as the exact text the server sent.
    pub game_state: Box<RawValue>,
    pub seconds_remaining: Number,
}

impl AwaitingNextMove {
    pub fn budget(&self) -> Result<DeadlineBudget, ProtocolError> {
        budget_from_number(&self.seconds_remaining)
    }
}

#[derive(Debug, Deserialize)]
pub struct GameOver {
    pub game_state: Box<RawValue>,
    #[serde(default)]
    pub final_score: Option<serde_json::Value>,
}

/// Parsed incoming message
#[derive(Debug)]
pub enum ServerMessage {
    NewGameCreated(NewGameCreated),
    AwaitingNextMove(AwaitingNextMove),
    GameOver(GameOver),
    /// A `type` this client does not know. Not an error.
    Unsupported { msg_type: String },
}

impl ServerMessage {
    pub fn type_name(&self) -> &str {
        match self {
            ServerMessage::NewGameCreated(_) => NEW_GAME_CREATED,
            ServerMessage::AwaitingNextMove(_) => AWAITING_NEXT_MOVE,
            ServerMessage::GameOver(_) => GAME_OVER,
            ServerMessage::Unsupported { msg_type } => msg_type,
        }
    }
}

/// Parse one server frame.
///
/// The `type` is read first so that unknown types come back as
/// [`ServerMessage::Unsupported`] while malformed known types are errors.
/// `RawValue` fields do not survive serde's internally tagged enums, hence the
/// two-step decode.
pub fn parse_server_message(json: &str) -> Result<ServerMessage, ProtocolError> {
    #[derive(Debug, Deserialize)]
    struct TypeOnly {
        #[serde(rename = "type")]
        msg_type: Option<serde_json::Value>,
    }

    let msg_type = match serde_json::from_str::<TypeOnly>(json)?.msg_type {
        Some(serde_json::Value::String(s)) => s,
        _ => return Err(ProtocolError::MissingType),
    };

    fn body<'a, T: Deserialize<'a>>(json: &'a str, msg_type: &'static str) -> Result<T, ProtocolError> {
        serde_json::from_str(json).map_err(|source| ProtocolError::Malformed { msg_type, source })
    }

    match msg_type.as_str() {
        NEW_GAME_CREATED => body(json, NEW_GAME_CREATED).map(ServerMessage::NewGameCreated),
        AWAITING_NEXT_MOVE => body(json, AWAITING_NEXT_MOVE).map(ServerMessage::AwaitingNextMove),
        GAME_OVER => body(json, GAME_OVER).map(ServerMessage::GameOver),
        _ => Ok(ServerMessage::Unsupported { msg_type }),
    }
}

fn deserialize_game_id<'de, D>(deserializer: D) -> Result<Option<GameId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(Number),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => Some(GameId::new(s)),
        Some(RawId::Number(n)) => Some(GameId::new(n.to_string())),
        None => None,
    })
}

/// The AI gets the server's own spelling of the number; the deadline uses its value.
pub fn budget_from_number(n: &Number) -> Result<DeadlineBudget, ProtocolError> {
    let seconds = n
        .as_f64()
        .filter(|s| s.is_finite())
        .ok_or_else(|| ProtocolError::InvalidBudget(n.clone()))?;
    Ok(DeadlineBudget::new(n.to_string(), seconds))
}
