//! Host side of the dataframe: the authoritative record store and the
//! per-match TCP accept loop.

use crate::proto::{ClientMessage, ServerMessage};
use crate::records::{Pid, PlayerRow, ServerStateRow};
use arena_wire::{read_frame, write_frame};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One player record plus host-side bookkeeping.
pub struct PlayerSlot {
    pub row: PlayerRow,
    /// False once the owning connection dropped. A seated slot outlives its
    /// connection so the match server can substitute no-ops.
    pub connected: bool,
    token: String,
}

impl PlayerSlot {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Authoritative record store for one match. Insertion order of `players`
/// is the order in which clients were admitted.
pub struct FrameState {
    pub state: ServerStateRow,
    pub players: Vec<PlayerSlot>,
    whitelist: Vec<String>,
    version: u64,
    next_pid: Pid,
    closed: bool,
}

impl FrameState {
    fn new(whitelist: Vec<String>) -> Self {
        Self {
            state: ServerStateRow::default(),
            players: Vec::new(),
            whitelist,
            version: 0,
            next_pid: 1,
            closed: false,
        }
    }

    /// Make pending mutations visible to subsequent pulls.
    pub fn commit(&mut self) {
        self.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn seat(&self, seat: u32) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.row.seat() == Some(seat))
    }

    pub fn seat_mut(&mut self, seat: u32) -> Option<&mut PlayerSlot> {
        self.players.iter_mut().find(|p| p.row.seat() == Some(seat))
    }

    pub fn seated_count(&self) -> usize {
        self.players.iter().filter(|p| p.row.number >= 0).count()
    }

    /// Drop records of players that disconnected before being seated; their
    /// seats stay open and their tokens become usable again.
    pub fn prune_unseated_disconnects(&mut self) {
        self.players.retain(|p| p.connected || p.row.number >= 0);
    }

    fn admit(&mut self, token: &str, name: &str) -> Result<Pid, String> {
        if self.closed {
            return Err("match is closing".into());
        }
        if !self.whitelist.iter().any(|t| t == token) {
            return Err("token is not on the whitelist".into());
        }
        if self.players.iter().any(|p| p.token == token) {
            return Err("token is already in use".into());
        }
        let pid = self.next_pid;
        self.next_pid += 1;
        self.players.push(PlayerSlot {
            row: PlayerRow::new(pid, name),
            connected: true,
            token: token.to_string(),
        });
        self.commit();
        Ok(pid)
    }

    fn apply_push(
        &mut self,
        pid: Pid,
        action: Option<serde_json::Value>,
        ready_for_action: Option<bool>,
        acknowledges_game_over: Option<bool>,
    ) {
        if let Some(slot) = self.players.iter_mut().find(|p| p.row.pid == pid) {
            if let Some(action) = action {
                slot.row.action = action;
            }
            if let Some(ready) = ready_for_action {
                slot.row.ready_for_action = ready;
            }
            if let Some(ack) = acknowledges_game_over {
                slot.row.acknowledges_game_over = ack;
            }
            self.commit();
        }
    }

    /// A client left or its connection dropped. Unseated records are
    /// deleted; seated ones are kept but marked disconnected.
    fn detach(&mut self, pid: Pid) {
        if let Some(idx) = self.players.iter().position(|p| p.row.pid == pid) {
            if self.players[idx].row.number < 0 {
                self.players.remove(idx);
            } else {
                self.players[idx].connected = false;
            }
            self.commit();
        }
    }

    fn snapshot(&self) -> ServerMessage {
        ServerMessage::Snapshot {
            version: self.version,
            state: self.state.clone(),
            players: self.players.iter().map(|p| p.row.clone()).collect(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Shared access to a match's record store. The match server locks it once
/// per tick; connection tasks lock it once per message.
#[derive(Clone)]
pub struct FrameHandle {
    inner: Arc<Mutex<FrameState>>,
}

impl FrameHandle {
    pub async fn lock(&self) -> MutexGuard<'_, FrameState> {
        self.inner.lock().await
    }
}

/// Owns a match's listening endpoint and its connection tasks.
pub struct FrameHost {
    handle: FrameHandle,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
    conn_tasks: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl FrameHost {
    /// Bind the match endpoint. Only clients presenting a whitelisted token
    /// are admitted, and each token admits at most one live connection.
    pub async fn bind(addr: SocketAddr, whitelist: Vec<String>) -> io::Result<Self> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        // Match ports are recycled as soon as a game ends; lingering
        // TIME_WAIT sockets from the previous match must not block the bind.
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(64)?;
        let local_addr = listener.local_addr()?;

        let handle = FrameHandle {
            inner: Arc::new(Mutex::new(FrameState::new(whitelist))),
        };
        let conn_tasks = Arc::new(std::sync::Mutex::new(Vec::new()));
        let accept_task = tokio::spawn(accept_loop(listener, handle.clone(), conn_tasks.clone()));

        Ok(Self {
            handle,
            local_addr,
            accept_task,
            conn_tasks,
        })
    }

    pub fn handle(&self) -> FrameHandle {
        self.handle.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listening endpoint and drop every live connection.
    pub async fn close(self) {
        {
            let mut state = self.handle.lock().await;
            state.closed = true;
            state.commit();
        }
        self.accept_task.abort();
        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.conn_tasks.lock().expect("connection task list poisoned");
            guard.drain(..).collect()
        };
        for task in tasks {
            task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handle: FrameHandle,
    conn_tasks: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "dataframe connection");
                let task = tokio::spawn(serve_connection(stream, handle.clone()));
                conn_tasks
                    .lock()
                    .expect("connection task list poisoned")
                    .push(task);
            }
            Err(err) => {
                warn!(%err, "dataframe accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn serve_connection(mut stream: TcpStream, handle: FrameHandle) {
    let pid = match admit(&mut stream, &handle).await {
        Ok(Some(pid)) => pid,
        Ok(None) => return,
        Err(err) => {
            debug!(%err, "handshake failed");
            return;
        }
    };

    let result = connection_loop(&mut stream, &handle, pid).await;
    if let Err(err) = result {
        debug!(pid, %err, "dataframe connection closed");
    }
    handle.lock().await.detach(pid);
}

/// Run the admission handshake. `Ok(None)` means the host rejected the
/// client and already told it why.
async fn admit(stream: &mut TcpStream, handle: &FrameHandle) -> io::Result<Option<Pid>> {
    let hello = read_frame(stream).await?;
    let message: ClientMessage = match serde_json::from_slice(&hello) {
        Ok(message) => message,
        Err(_) => return Ok(None),
    };
    let ClientMessage::Hello { token, name } = message else {
        return Ok(None);
    };

    let verdict = handle.lock().await.admit(&token, &name);
    match verdict {
        Ok(pid) => {
            send(stream, &ServerMessage::Welcome { pid }).await?;
            Ok(Some(pid))
        }
        Err(reason) => {
            send(stream, &ServerMessage::Rejected { reason }).await?;
            Ok(None)
        }
    }
}

async fn connection_loop(
    stream: &mut TcpStream,
    handle: &FrameHandle,
    pid: Pid,
) -> io::Result<()> {
    loop {
        let frame = read_frame(stream).await?;
        let message: ClientMessage = serde_json::from_slice(&frame)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        match message {
            ClientMessage::Pull => {
                let snapshot = {
                    let state = handle.lock().await;
                    if state.is_closed() {
                        return Ok(());
                    }
                    state.snapshot()
                };
                send(stream, &snapshot).await?;
            }
            ClientMessage::Push {
                action,
                ready_for_action,
                acknowledges_game_over,
            } => {
                handle
                    .lock()
                    .await
                    .apply_push(pid, action, ready_for_action, acknowledges_game_over);
                send(stream, &ServerMessage::PushOk).await?;
            }
            ClientMessage::Leave => return Ok(()),
            ClientMessage::Hello { .. } => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "repeated handshake",
                ));
            }
        }
    }
}

async fn send(stream: &mut TcpStream, message: &ServerMessage) -> io::Result<()> {
    let bytes = serde_json::to_vec(message)?;
    write_frame(stream, &bytes).await
}
