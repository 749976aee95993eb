use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A 0-indexed role within one match.
pub type Seat = u32;

/// Observation values for one seat, keyed by dimension name.
pub type Observations = BTreeMap<String, Value>;

/// Result of advancing an environment by one action.
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    /// Updated observation values for every seat.
    pub observations: BTreeMap<Seat, Observations>,
    /// Reward earned this turn, per seat. Seats absent from the map earned 0.
    pub rewards: BTreeMap<Seat, f64>,
    /// Whether the game has finished.
    pub terminal: bool,
    /// Winning seats; meaningful only when `terminal` is true.
    pub winners: Vec<Seat>,
}

/// Error raised by an environment, either at construction or during a step.
///
/// A step error is fatal to the match it occurs in: the match is terminated
/// as a draw. It never propagates beyond that match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentError {
    message: String,
}

impl EnvironmentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "environment error: {}", self.message)
    }
}

impl std::error::Error for EnvironmentError {}

/// A turn-based game driven to completion by a match server.
///
/// Implementations are pure state machines: no I/O, and deterministic given
/// the sequence of applied actions. The match server owns the instance and
/// serializes all calls, so no interior synchronization is needed.
pub trait Environment: Send {
    /// Number of players required before the game can start. At least 1.
    fn min_players(&self) -> usize;

    /// Names of the observation dimensions every player record carries.
    fn observation_names(&self) -> &[String];

    /// The seat that acts next. Most environments cycle `0..N-1`.
    fn next_seat(&self) -> Seat;

    /// Current observation values for every seat, without advancing state.
    /// Used to publish the initial view when the game starts.
    fn observations(&self) -> BTreeMap<Seat, Observations>;

    /// The action applied on behalf of a seat that did not submit one.
    fn no_op_action(&self) -> Value;

    /// Apply `action` for `seat` and advance the game by one turn.
    fn step(&mut self, seat: Seat, action: &Value) -> Result<StepOutcome, EnvironmentError>;

    /// Opaque serialization of the full game state, pushed to clients unless
    /// the server runs in observations-only mode.
    fn serialize_state(&self) -> Vec<u8>;
}
