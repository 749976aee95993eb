//! Lifecycle owner for one match: starts the match server, waits for it to
//! finish, then returns the port, logs the cohort off, and releases the
//! match-limit permit. All three resources are released exactly once on
//! every exit path.

use crate::errors::MatchStartError;
use crate::match_loop::{run_match_server, MatchConfig};
use crate::rankings::RankingStore;
use arena_core::Environment;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cooldown before a port whose bind failed is offered out again.
const BIND_FAILURE_COOLDOWN: Duration = Duration::from_secs(1);

pub(crate) struct JanitorParams {
    pub env: Box<dyn Environment>,
    pub addr: SocketAddr,
    pub port: u16,
    pub whitelist: Vec<String>,
    pub usernames: Vec<String>,
    pub match_config: MatchConfig,
    pub store: Arc<RankingStore>,
    pub port_tx: mpsc::Sender<u16>,
    pub permit: OwnedSemaphorePermit,
    pub ready: oneshot::Sender<Result<(), MatchStartError>>,
}

pub(crate) fn spawn(params: JanitorParams) -> JoinHandle<()> {
    tokio::spawn(async move {
        let JanitorParams {
            env,
            addr,
            port,
            whitelist,
            usernames,
            match_config,
            store,
            port_tx,
            permit,
            ready,
        } = params;

        let started = run_match_server(env, addr, whitelist, match_config, ready).await;
        if !started {
            tokio::time::sleep(BIND_FAILURE_COOLDOWN).await;
        }

        if port_tx.send(port).await.is_err() {
            debug!(port, "free-port queue receiver is gone");
        }
        for username in &usernames {
            if let Err(err) = store.logoff(username) {
                warn!(%username, %err, "logoff during match cleanup failed");
            }
        }
        drop(permit);
    })
}
