//! JSON messages exchanged over a match's dataframe endpoint, one per
//! length-prefixed frame.

use crate::records::{Pid, PlayerRow, ServerStateRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Admission handshake; must be the first message on a connection.
    Hello { token: String, name: String },
    /// Request a consistent snapshot of all records.
    Pull,
    /// Publish the fields this client owns. Absent fields are untouched.
    Push {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ready_for_action: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        acknowledges_game_over: Option<bool>,
    },
    /// Delete this client's player record and end the session.
    Leave,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        pid: Pid,
    },
    Rejected {
        reason: String,
    },
    Snapshot {
        version: u64,
        state: ServerStateRow,
        players: Vec<PlayerRow>,
    },
    PushOk,
}
