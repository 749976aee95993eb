use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primary key of a player record, assigned by the host on insert.
pub type Pid = u64;

/// One player's record, one per client per match.
///
/// `number` is -1 until the match server seats the player, then the seat
/// index in acceptance order. `observation` holds one entry per dimension
/// the environment declared.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub pid: Pid,
    pub name: String,
    pub number: i32,
    pub turn: bool,
    pub action: Value,
    pub ready_for_action: bool,
    pub reward_from_last_turn: f64,
    pub acknowledges_game_over: bool,
    pub observation: BTreeMap<String, Value>,
}

impl PlayerRow {
    pub fn new(pid: Pid, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            number: -1,
            turn: false,
            action: Value::Null,
            ready_for_action: false,
            reward_from_last_turn: 0.0,
            acknowledges_game_over: false,
            observation: BTreeMap::new(),
        }
    }

    /// Seat index, if the match server has seated this player.
    pub fn seat(&self) -> Option<u32> {
        u32::try_from(self.number).ok()
    }
}

/// The singleton per-match record every joining client can rely on before
/// the player schema is known.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStateRow {
    pub env_class_name: String,
    pub env_dimensions: Vec<String>,
    pub terminal: bool,
    /// Winners in their canonical encoded form; empty until terminal.
    pub winners: Vec<u8>,
    /// Opaque full-state serialization; empty in observations-only mode.
    pub serialized_state: Vec<u8>,
}
