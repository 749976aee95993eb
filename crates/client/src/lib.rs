//! Agent-side access to the competition platform: requesting a match from
//! the matchmaker and playing it through a synchronous-feeling facade over
//! the match's shared dataframe.

pub mod adapter;
pub mod errors;
pub mod matchmaking;

pub use adapter::{MatchClient, StepResult, CLIENT_TICK_RATE};
pub use errors::{AdapterError, MatchmakingError};
pub use matchmaking::{hash_password, request_match, GameResponse};
