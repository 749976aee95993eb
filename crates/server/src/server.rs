//! Assembly of the matchmaking service: the frontend accept loop plus the
//! matchmaker core task, with a shutdown switch.

use crate::errors::{MatchmakerError, StartupError};
use crate::frontend;
use crate::matchmaker::{Matchmaker, MatchmakerConfig};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the request channel between the frontend and the matchmaker.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct MatchmakingServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    frontend_task: JoinHandle<()>,
    matchmaker_task: JoinHandle<Result<(), MatchmakerError>>,
}

impl MatchmakingServer {
    /// Validate the configuration, claim ports and the database, and start
    /// serving matchmaking requests on `listener`.
    pub async fn start(
        config: MatchmakerConfig,
        listener: TcpListener,
    ) -> Result<Self, StartupError> {
        let matchmaker = Matchmaker::new(config)?;
        let local_addr = listener.local_addr()?;

        let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let matchmaker_task = tokio::spawn(matchmaker.run(request_rx, shutdown_rx));
        let frontend_task = tokio::spawn(frontend::serve(listener, request_tx));

        Ok(Self {
            local_addr,
            shutdown: shutdown_tx,
            frontend_task,
            matchmaker_task,
        })
    }

    /// Address the frontend is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves if the matchmaker dies of a fatal error. Intended for the
    /// binary's select against the interrupt signal; do not call `shutdown`
    /// after this has resolved.
    pub async fn wait(&mut self) -> Result<(), MatchmakerError> {
        match (&mut self.matchmaker_task).await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    /// Stop accepting requests, refuse the waiting queue, and let running
    /// janitors finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.frontend_task.abort();
        let _ = self.matchmaker_task.await;
    }
}
