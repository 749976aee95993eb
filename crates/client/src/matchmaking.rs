//! Matchmaking client: password hashing and the blocking `GetMatch` call.

use crate::errors::MatchmakingError;
use arena_wire::{read_frame, write_frame, QuickMatchReply, QuickMatchRequest};
use prost::Message;
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;

/// Coordinates of the match server created for this client.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResponse {
    pub host: String,
    pub port: u16,
    /// The (lowercased) username the server knows this client by.
    pub username: String,
    /// Token to present to the match server to prove cohort membership.
    pub token: String,
    pub ranking: f64,
}

/// Hash a password, salted with the username. Only this hash ever travels
/// over the wire.
pub fn hash_password(username: &str, password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(username.as_bytes());
    hasher.finalize().to_vec()
}

/// Contact a matchmaking server and ask for a new game.
///
/// Blocks until enough players have connected to form a match, then
/// returns the coordinates of the game server created for the cohort.
pub async fn request_match(
    hostname: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<GameResponse, MatchmakingError> {
    let username = username.to_lowercase();
    let mut stream = TcpStream::connect((hostname, port)).await?;

    let request = QuickMatchRequest {
        username: username.clone(),
        password: hash_password(&username, password),
    };
    write_frame(&mut stream, &request.encode_to_vec()).await?;

    let frame = read_frame(&mut stream).await?;
    let reply = QuickMatchReply::decode(frame.as_slice())?;

    if reply.server == "FAIL" {
        return Err(MatchmakingError::Refused(reply.response));
    }

    let (host, port) = reply
        .server
        .rsplit_once(':')
        .ok_or_else(|| MatchmakingError::MalformedReply(reply.server.clone()))?;
    let port = port
        .parse()
        .map_err(|_| MatchmakingError::MalformedReply(reply.server.clone()))?;

    Ok(GameResponse {
        host: host.to_string(),
        port,
        username,
        token: reply.auth_key,
        ranking: reply.ranking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_stable() {
        assert_eq!(
            hash_password("alice", "secret"),
            hash_password("alice", "secret")
        );
        assert_eq!(hash_password("alice", "secret").len(), 32);
    }

    #[test]
    fn hashing_is_order_sensitive() {
        // Password bytes are hashed before username bytes; swapping the two
        // must produce a different digest.
        assert_ne!(
            hash_password("alice", "secret"),
            hash_password("secret", "alice")
        );
    }
}
