use std::fmt;
use std::io;

/// Fatal configuration error at server startup.
#[derive(Debug)]
pub enum StartupError {
    /// The requested environment is not registered.
    UnknownEnvironment {
        name: String,
        available: Vec<&'static str>,
    },
    /// The environment rejected its config string.
    Environment(arena_core::EnvironmentError),
    /// The game-port range does not hold enough unallocated ports.
    NotEnoughPorts {
        start: u16,
        end: u16,
        needed: usize,
        found: usize,
    },
    /// The hostname did not resolve.
    AddressResolution(String),
    /// Opening or initializing the ranking database failed.
    Database(rusqlite::Error),
    Io(io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::UnknownEnvironment { name, available } => write!(
                f,
                "unknown environment {name:?}; available environments: {}",
                available.join(", ")
            ),
            StartupError::Environment(err) => write!(f, "{err}"),
            StartupError::NotEnoughPorts {
                start,
                end,
                needed,
                found,
            } => write!(
                f,
                "port range {start} through {end} holds only {found} unallocated ports, \
                 {needed} are needed for simultaneous games"
            ),
            StartupError::AddressResolution(host) => {
                write!(f, "hostname {host:?} did not resolve")
            }
            StartupError::Database(err) => write!(f, "ranking database error: {err}"),
            StartupError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Environment(err) => Some(err),
            StartupError::Database(err) => Some(err),
            StartupError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StartupError {
    fn from(err: rusqlite::Error) -> Self {
        StartupError::Database(err)
    }
}

impl From<io::Error> for StartupError {
    fn from(err: io::Error) -> Self {
        StartupError::Io(err)
    }
}

/// Fatal failure of the matchmaker's own state machine. Failures local to
/// one match never surface here.
#[derive(Debug)]
pub enum MatchmakerError {
    /// The free-port queue was empty when a cohort formed, which the
    /// match-limit semaphore is supposed to make impossible.
    PortPoolExhausted,
    Database(rusqlite::Error),
}

impl fmt::Display for MatchmakerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchmakerError::PortPoolExhausted => {
                write!(f, "free-port queue empty while holding a match permit")
            }
            MatchmakerError::Database(err) => write!(f, "ranking database error: {err}"),
        }
    }
}

impl std::error::Error for MatchmakerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MatchmakerError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MatchmakerError {
    fn from(err: rusqlite::Error) -> Self {
        MatchmakerError::Database(err)
    }
}

/// Why a match server failed before opening admission.
#[derive(Debug)]
pub enum MatchStartError {
    Bind(io::Error),
}

impl fmt::Display for MatchStartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStartError::Bind(err) => write!(f, "match port bind failed: {err}"),
        }
    }
}

impl std::error::Error for MatchStartError {}
