//! Client side of the dataframe: a remote replica refreshed with
//! `pull`/`checkout` and published with `commit`/`push`.

use crate::errors::FrameError;
use crate::proto::{ClientMessage, ServerMessage};
use crate::records::{Pid, PlayerRow, ServerStateRow};
use arena_wire::{read_frame, write_frame};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpStream;

#[derive(Default, Debug)]
struct LocalEdits {
    action: Option<Value>,
    ready_for_action: Option<bool>,
    acknowledges_game_over: Option<bool>,
}

impl LocalEdits {
    fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.ready_for_action.is_none()
            && self.acknowledges_game_over.is_none()
    }
}

/// One client's connection to a match dataframe.
///
/// Reads go through the checked-out snapshot, which only changes on
/// `checkout`. Writes accumulate locally until `commit` stages them and
/// `push` publishes them; only the fields this client owns can be written.
pub struct FrameClient {
    stream: TcpStream,
    pid: Pid,
    state: ServerStateRow,
    players: Vec<PlayerRow>,
    version: u64,
    staged: Option<(u64, ServerStateRow, Vec<PlayerRow>)>,
    edits: LocalEdits,
    committed: Option<LocalEdits>,
}

impl std::fmt::Debug for FrameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClient")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("players", &self.players)
            .field("version", &self.version)
            .field("staged", &self.staged)
            .field("edits", &self.edits)
            .field("committed", &self.committed)
            .finish()
    }
}

impl FrameClient {
    /// Connect and run the admission handshake, inserting this client's
    /// player record on the host.
    pub async fn connect(addr: SocketAddr, token: &str, name: &str) -> Result<Self, FrameError> {
        let mut stream = TcpStream::connect(addr).await?;
        let hello = ClientMessage::Hello {
            token: token.to_string(),
            name: name.to_string(),
        };
        send(&mut stream, &hello).await?;

        match receive(&mut stream).await? {
            ServerMessage::Welcome { pid } => Ok(Self {
                stream,
                pid,
                state: ServerStateRow::default(),
                players: Vec::new(),
                version: 0,
                staged: None,
                edits: LocalEdits::default(),
                committed: None,
            }),
            ServerMessage::Rejected { reason } => Err(FrameError::Rejected(reason)),
            other => Err(FrameError::Protocol(format!(
                "expected admission verdict, got {other:?}"
            ))),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Fetch the host's current snapshot into the staging area.
    pub async fn pull(&mut self) -> Result<(), FrameError> {
        send(&mut self.stream, &ClientMessage::Pull).await?;
        match receive(&mut self.stream).await? {
            ServerMessage::Snapshot {
                version,
                state,
                players,
            } => {
                self.staged = Some((version, state, players));
                Ok(())
            }
            other => Err(FrameError::Protocol(format!(
                "expected snapshot, got {other:?}"
            ))),
        }
    }

    /// Make the last pulled snapshot the readable view.
    pub fn checkout(&mut self) {
        if let Some((version, state, players)) = self.staged.take() {
            self.version = version;
            self.state = state;
            self.players = players;
        }
    }

    pub fn server_state(&self) -> &ServerStateRow {
        &self.state
    }

    /// This client's own player record, as of the last checkout. `None`
    /// until the insert has replicated back, or after the host deleted it.
    pub fn player(&self) -> Option<&PlayerRow> {
        self.players.iter().find(|p| p.pid == self.pid)
    }

    pub fn players(&self) -> &[PlayerRow] {
        &self.players
    }

    pub fn set_action(&mut self, action: Value) {
        self.edits.action = Some(action);
    }

    pub fn set_ready_for_action(&mut self, ready: bool) {
        self.edits.ready_for_action = Some(ready);
    }

    pub fn set_acknowledges_game_over(&mut self, ack: bool) {
        self.edits.acknowledges_game_over = Some(ack);
    }

    /// Stage the accumulated edits for the next `push`.
    pub fn commit(&mut self) {
        let edits = std::mem::take(&mut self.edits);
        if !edits.is_empty() {
            self.committed = Some(edits);
        }
    }

    /// Publish committed edits to the host. No-op if nothing was committed.
    pub async fn push(&mut self) -> Result<(), FrameError> {
        let Some(edits) = self.committed.take() else {
            return Ok(());
        };
        let message = ClientMessage::Push {
            action: edits.action,
            ready_for_action: edits.ready_for_action,
            acknowledges_game_over: edits.acknowledges_game_over,
        };
        send(&mut self.stream, &message).await?;
        match receive(&mut self.stream).await? {
            ServerMessage::PushOk => Ok(()),
            other => Err(FrameError::Protocol(format!(
                "expected push acknowledgement, got {other:?}"
            ))),
        }
    }

    /// Delete this client's player record and end the session.
    pub async fn leave(&mut self) -> Result<(), FrameError> {
        send(&mut self.stream, &ClientMessage::Leave).await?;
        Ok(())
    }
}

async fn send(stream: &mut TcpStream, message: &ClientMessage) -> Result<(), FrameError> {
    let bytes = serde_json::to_vec(message)
        .map_err(|err| FrameError::Protocol(format!("encoding failed: {err}")))?;
    write_frame(stream, &bytes).await?;
    Ok(())
}

async fn receive(stream: &mut TcpStream) -> Result<ServerMessage, FrameError> {
    let frame = read_frame(stream).await?;
    serde_json::from_slice(&frame)
        .map_err(|err| FrameError::Protocol(format!("undecodable reply: {err}")))
}
