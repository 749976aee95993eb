//! The matchmaker core: a single task that authenticates incoming match
//! requests, pools them into cohorts, and starts one janitor-owned match
//! server per full cohort.

use crate::errors::{MatchmakerError, StartupError};
use crate::janitor::{self, JanitorParams};
use crate::match_loop::MatchConfig;
use crate::rankings::{LoginResult, RankingStore, DEFAULT_RANKING};
use crate::registry::{self, EnvironmentFactory};
use arena_wire::{QuickMatchReply, QuickMatchRequest};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct MatchmakerConfig {
    pub environment: String,
    pub hostname: String,
    pub game_port: u16,
    pub max_games: usize,
    pub tick_rate: u32,
    pub realtime: bool,
    pub observations_only: bool,
    pub env_config: String,
    pub database: String,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            environment: "test".into(),
            hostname: "localhost".into(),
            game_port: 21450,
            max_games: 1,
            tick_rate: 60,
            realtime: false,
            observations_only: false,
            env_config: String::new(),
            database: "test.sqlite".into(),
        }
    }
}

/// One request as it travels from the frontend to the matchmaker. The reply
/// channel doubles as the caller's identity: whoever holds the receiving
/// end gets the routed answer.
pub struct IncomingRequest {
    pub request: QuickMatchRequest,
    pub reply: oneshot::Sender<QuickMatchReply>,
}

struct PendingRequest {
    username: String,
    token: String,
    reply: oneshot::Sender<QuickMatchReply>,
}

pub(crate) struct Matchmaker {
    config: MatchmakerConfig,
    factory: EnvironmentFactory,
    min_players: usize,
    host_ip: IpAddr,
    store: Arc<RankingStore>,
    match_limit: Arc<Semaphore>,
    port_tx: mpsc::Sender<u16>,
    port_rx: mpsc::Receiver<u16>,
    waiting: VecDeque<PendingRequest>,
}

impl Matchmaker {
    /// Validate the configuration and claim the resources the matchmaker
    /// needs. The environment is resolved first: an unknown name fails
    /// before any port is probed or the database file is created.
    pub(crate) fn new(config: MatchmakerConfig) -> Result<Self, StartupError> {
        let factory =
            registry::lookup(&config.environment).ok_or_else(|| StartupError::UnknownEnvironment {
                name: config.environment.clone(),
                available: registry::available(),
            })?;
        let probe = factory(&config.env_config).map_err(StartupError::Environment)?;
        let min_players = probe.min_players();

        let host_ip = resolve_hostname(&config.hostname, config.game_port)?;

        let (port_tx, port_rx, found) =
            probe_port_range(host_ip, config.game_port, config.max_games);
        if found < config.max_games {
            let end = port_range_end(config.game_port, config.max_games);
            return Err(StartupError::NotEnoughPorts {
                start: config.game_port,
                end,
                needed: config.max_games,
                found,
            });
        }

        let store = Arc::new(RankingStore::open(&config.database)?);

        Ok(Self {
            match_limit: Arc::new(Semaphore::new(config.max_games)),
            factory,
            min_players,
            host_ip,
            store,
            port_tx,
            port_rx,
            waiting: VecDeque::new(),
            config,
        })
    }

    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::Receiver<IncomingRequest>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), MatchmakerError> {
        info!(
            environment = %self.config.environment,
            min_players = self.min_players,
            max_games = self.config.max_games,
            "matchmaker listening"
        );
        loop {
            if *shutdown.borrow() {
                return self.drain();
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return self.drain();
                    }
                }
                incoming = requests.recv() => {
                    match incoming {
                        Some(incoming) => self.handle_request(incoming, &mut shutdown).await?,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    async fn handle_request(
        &mut self,
        incoming: IncomingRequest,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), MatchmakerError> {
        let IncomingRequest { request, reply } = incoming;
        let username = request.username.to_lowercase();

        let mut outcome = self.store.login(&username, &request.password)?;
        if outcome == LoginResult::NoUser {
            self.store.set(&username, &request.password)?;
            outcome = self.store.login(&username, &request.password)?;
        }
        match outcome {
            LoginResult::Ok => {}
            LoginResult::AlreadyLoggedIn => {
                debug!(%username, "rejected duplicate login");
                let _ = reply.send(fail_reply(
                    &username,
                    "Failed to login: Cannot login twice at the same time.",
                ));
                return Ok(());
            }
            LoginResult::WrongPassword => {
                debug!(%username, "rejected wrong password");
                let _ = reply.send(fail_reply(&username, "Failed to login: Wrong password."));
                return Ok(());
            }
            LoginResult::NoUser => {
                let _ = reply.send(fail_reply(&username, "Failed to login: Unknown user."));
                return Ok(());
            }
        }

        self.waiting.push_back(PendingRequest {
            username,
            token: fresh_token(),
            reply,
        });

        while self.waiting.len() >= self.min_players {
            if !self.start_cohort(shutdown).await? {
                break;
            }
        }
        Ok(())
    }

    /// Pop one cohort off the waiting queue and start its match. Returns
    /// `false` if shutdown interrupted the wait for a match permit; the
    /// queue is untouched in that case, so nothing leaks.
    async fn start_cohort(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<bool, MatchmakerError> {
        let permit = tokio::select! {
            permit = self.match_limit.clone().acquire_owned() => {
                match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(false),
                }
            }
            _ = shutdown.changed() => return Ok(false),
        };

        let mut members = Vec::with_capacity(self.min_players);
        while members.len() < self.min_players {
            match self.waiting.pop_front() {
                Some(pending) => members.push(pending),
                None => break,
            }
        }

        // Sized by the same bound as the semaphore, so holding a permit
        // guarantees a free port.
        let port = match self.port_rx.try_recv() {
            Ok(port) => port,
            Err(_) => return Err(MatchmakerError::PortPoolExhausted),
        };

        let env = match (self.factory)(&self.config.env_config) {
            Ok(env) => env,
            Err(err) => {
                warn!(%err, "environment construction failed");
                return self.abort_cohort(members, port, permit).map(|_| true);
            }
        };

        let usernames: Vec<String> = members.iter().map(|m| m.username.clone()).collect();
        let whitelist: Vec<String> = members.iter().map(|m| m.token.clone()).collect();
        let rankings: HashMap<String, f64> = self
            .store
            .get_multi(&usernames)?
            .into_iter()
            .map(|user| (user.username, user.ranking))
            .collect();

        let (ready_tx, ready_rx) = oneshot::channel();
        janitor::spawn(JanitorParams {
            env,
            addr: SocketAddr::new(self.host_ip, port),
            port,
            whitelist,
            usernames,
            match_config: MatchConfig {
                env_name: self.config.environment.clone(),
                tick_rate: self.config.tick_rate,
                realtime: self.config.realtime,
                observations_only: self.config.observations_only,
            },
            store: self.store.clone(),
            port_tx: self.port_tx.clone(),
            permit,
            ready: ready_tx,
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                let server = format!("{}:{}", self.config.hostname, port);
                info!(%server, players = members.len(), "match started");
                for member in members {
                    let ranking = rankings
                        .get(&member.username)
                        .copied()
                        .unwrap_or(DEFAULT_RANKING);
                    let _ = member.reply.send(QuickMatchReply {
                        username: member.username,
                        server: server.clone(),
                        auth_key: member.token,
                        ranking,
                        response: String::new(),
                    });
                }
            }
            Ok(Err(err)) => {
                warn!(%err, port, "match failed to start");
                for member in members {
                    let _ = member
                        .reply
                        .send(fail_reply(&member.username, "Match failed to start."));
                }
            }
            Err(_) => {
                warn!(port, "janitor dropped the readiness signal");
                for member in members {
                    let _ = member
                        .reply
                        .send(fail_reply(&member.username, "Match failed to start."));
                }
            }
        }
        Ok(true)
    }

    /// A cohort that never reached its janitor: undo everything here.
    fn abort_cohort(
        &mut self,
        members: Vec<PendingRequest>,
        port: u16,
        permit: tokio::sync::OwnedSemaphorePermit,
    ) -> Result<(), MatchmakerError> {
        for member in members {
            self.store.logoff(&member.username)?;
            let _ = member
                .reply
                .send(fail_reply(&member.username, "Match failed to start."));
        }
        let _ = self.port_tx.try_send(port);
        drop(permit);
        Ok(())
    }

    /// Shutdown: refuse everyone still waiting and log them off. Janitors
    /// of running matches keep draining on their own.
    fn drain(&mut self) -> Result<(), MatchmakerError> {
        info!(waiting = self.waiting.len(), "matchmaker shutting down");
        while let Some(pending) = self.waiting.pop_front() {
            self.store.logoff(&pending.username)?;
            let _ = pending.reply.send(fail_reply(
                &pending.username,
                "Matchmaking server is shutting down.",
            ));
        }
        Ok(())
    }
}

fn fail_reply(username: &str, reason: &str) -> QuickMatchReply {
    QuickMatchReply {
        username: username.to_string(),
        server: "FAIL".into(),
        auth_key: "FAIL".into(),
        ranking: 0.0,
        response: reason.to_string(),
    }
}

/// A fresh 32-byte cryptographically-strong token, hex encoded.
fn fresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn resolve_hostname(hostname: &str, port: u16) -> Result<IpAddr, StartupError> {
    (hostname, port)
        .to_socket_addrs()
        .map_err(|_| StartupError::AddressResolution(hostname.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| StartupError::AddressResolution(hostname.to_string()))
}

fn port_range_end(start: u16, max_games: usize) -> u16 {
    let end = u32::from(start) + 2 * max_games as u32;
    u16::try_from(end).unwrap_or(u16::MAX)
}

/// Probe every port in the configured range and queue up the free ones.
/// The queue is bounded by the range size; janitors return ports into it.
fn probe_port_range(
    ip: IpAddr,
    start: u16,
    max_games: usize,
) -> (mpsc::Sender<u16>, mpsc::Receiver<u16>, usize) {
    let capacity = (2 * max_games).max(1);
    let (port_tx, port_rx) = mpsc::channel(capacity);

    let end = port_range_end(start, max_games);
    let mut found = 0;
    for port in start..end {
        match std::net::TcpListener::bind(SocketAddr::new(ip, port)) {
            Ok(listener) => {
                drop(listener);
                if port_tx.try_send(port).is_ok() {
                    found += 1;
                }
            }
            Err(_) => {
                warn!(port, "skipping port, already in use");
            }
        }
    }
    (port_tx, port_rx, found)
}
