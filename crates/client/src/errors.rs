use arena_core::winners;
use arena_frame::FrameError;
use std::fmt;
use std::io;

/// Error while requesting a match from the matchmaking server.
#[derive(Debug)]
pub enum MatchmakingError {
    Io(io::Error),
    Decode(prost::DecodeError),
    /// The matchmaker replied `FAIL`; the payload is its stated reason.
    Refused(String),
    MalformedReply(String),
}

impl fmt::Display for MatchmakingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchmakingError::Io(err) => write!(f, "matchmaking connection error: {err}"),
            MatchmakingError::Decode(err) => write!(f, "undecodable matchmaking reply: {err}"),
            MatchmakingError::Refused(reason) => {
                write!(f, "matchmaking request refused: {reason}")
            }
            MatchmakingError::MalformedReply(detail) => {
                write!(f, "malformed matchmaking reply: {detail}")
            }
        }
    }
}

impl std::error::Error for MatchmakingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatchmakingError::Io(err) => Some(err),
            MatchmakingError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for MatchmakingError {
    fn from(err: io::Error) -> Self {
        MatchmakingError::Io(err)
    }
}

impl From<prost::DecodeError> for MatchmakingError {
    fn from(err: prost::DecodeError) -> Self {
        MatchmakingError::Decode(err)
    }
}

/// Error from the match client adapter.
#[derive(Debug)]
pub enum AdapterError {
    Frame(FrameError),
    Winners(winners::DecodeError),
    /// The server deleted this client's player record.
    RecordLost,
    /// The adapter was closed; no further steps are possible.
    Closed,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Frame(err) => write!(f, "{err}"),
            AdapterError::Winners(err) => write!(f, "{err}"),
            AdapterError::RecordLost => write!(f, "player record no longer exists on the server"),
            AdapterError::Closed => write!(f, "match client is closed"),
        }
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdapterError::Frame(err) => Some(err),
            AdapterError::Winners(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FrameError> for AdapterError {
    fn from(err: FrameError) -> Self {
        AdapterError::Frame(err)
    }
}
