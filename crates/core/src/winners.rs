//! Canonical wire form of a winners list: a big-endian u32 count followed by
//! one big-endian u32 per winning seat.

use crate::environment::Seat;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the declared number of seats.
    Truncated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => write!(f, "truncated winners list"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub fn encode(winners: &[Seat]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + winners.len() * 4);
    out.extend_from_slice(&(winners.len() as u32).to_be_bytes());
    for seat in winners {
        out.extend_from_slice(&seat.to_be_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Seat>, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::Truncated);
    }
    let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[4..];
    if body.len() < count * 4 {
        return Err(DecodeError::Truncated);
    }
    Ok((0..count)
        .map(|i| {
            let off = i * 4;
            u32::from_be_bytes([body[off], body[off + 1], body[off + 2], body[off + 3]])
        })
        .collect())
}
