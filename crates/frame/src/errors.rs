use std::fmt;
use std::io;

/// Error on the client side of a dataframe connection.
#[derive(Debug)]
pub enum FrameError {
    /// Transport failure, including the host closing the endpoint.
    Io(io::Error),
    /// The peer sent something outside the protocol.
    Protocol(String),
    /// The host refused admission (bad or already-used token, closing match).
    Rejected(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Io(err) => write!(f, "dataframe connection error: {err}"),
            FrameError::Protocol(msg) => write!(f, "dataframe protocol violation: {msg}"),
            FrameError::Rejected(reason) => write!(f, "admission rejected: {reason}"),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        FrameError::Io(err)
    }
}
