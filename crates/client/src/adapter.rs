//! Match client adapter: a blocking, single-call-at-a-time facade over the
//! asynchronous dataframe. Tick pacing and pull/checkout/commit/push
//! orchestration stay hidden from the agent.

use crate::errors::AdapterError;
use arena_core::{winners, Observations, Pacer, Seat};
use arena_frame::{FrameClient, FrameError, ServerStateRow};
use serde_json::Value;
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::debug;

/// The adapter polls the dataframe at its own rate, independent of the
/// server's tick rate.
pub const CLIENT_TICK_RATE: u32 = 60;

/// What one `step` returns. `winners` is populated only on terminal.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub observations: Observations,
    pub reward: f64,
    pub terminal: bool,
    pub winners: Option<Vec<Seat>>,
}

pub struct MatchClient {
    frame: FrameClient,
    pacer: Pacer,
    closed: bool,
    acknowledged: bool,
}

impl MatchClient {
    /// Join a match server, insert this player's record, and wait for the
    /// game to start. Returns the adapter together with the first
    /// observation — the values of every declared dimension at the moment
    /// this player's first turn opens.
    pub async fn connect(
        host: &str,
        port: u16,
        name: &str,
        token: &str,
    ) -> Result<(Self, Observations), AdapterError> {
        let addr = resolve(host, port)?;
        let frame = FrameClient::connect(addr, token, name).await?;
        let mut client = Self {
            frame,
            pacer: Pacer::new(CLIENT_TICK_RATE),
            closed: false,
            acknowledged: false,
        };
        let first = client.wait_for_first_turn().await?;
        Ok((client, first))
    }

    async fn wait_for_first_turn(&mut self) -> Result<Observations, AdapterError> {
        debug!("connected, waiting for the game to start");
        loop {
            self.pacer.tick().await;
            self.frame.pull().await?;
            self.frame.checkout();

            let row = self.frame.player().ok_or(AdapterError::RecordLost)?;
            if self.frame.server_state().terminal
                || (row.number >= 0 && row.turn && !row.ready_for_action)
            {
                debug!(seat = row.number, "game started");
                return Ok(row.observation.clone());
            }
        }
    }

    /// Submit `action` and block until the server has applied it and
    /// prepared the next observation for this player's following turn (or
    /// the game ended). On terminal the game-over acknowledgement is
    /// committed before returning.
    pub async fn step(&mut self, action: Value) -> Result<StepResult, AdapterError> {
        if self.closed {
            return Err(AdapterError::Closed);
        }

        self.frame.pull().await?;
        self.frame.checkout();

        if !self.frame.server_state().terminal {
            self.frame.set_action(action);
            self.frame.set_ready_for_action(true);
            self.frame.commit();
            self.frame.push().await?;

            loop {
                self.pacer.tick().await;
                self.frame.pull().await?;
                self.frame.checkout();
                if self.frame.server_state().terminal {
                    break;
                }
                let row = self.frame.player().ok_or(AdapterError::RecordLost)?;
                if row.turn && !row.ready_for_action {
                    break;
                }
            }
        }

        let row = self
            .frame
            .player()
            .ok_or(AdapterError::RecordLost)?
            .clone();
        let state = self.frame.server_state().clone();

        let winners = if state.terminal {
            let decoded = winners::decode(&state.winners).map_err(AdapterError::Winners)?;
            if !self.acknowledged {
                self.acknowledged = true;
                self.frame.set_acknowledges_game_over(true);
                self.frame.commit();
                // Best effort: the server tears the endpoint down once all
                // acknowledgements are in, and ours may race that teardown.
                if let Err(err) = self.frame.push().await {
                    debug!(%err, "game-over acknowledgement did not go through");
                }
            }
            Some(decoded)
        } else {
            None
        };

        Ok(StepResult {
            observations: row.observation,
            reward: row.reward_from_last_turn,
            terminal: state.terminal,
            winners,
        })
    }

    /// Fetch the singleton server-state record.
    pub async fn server_state(&mut self) -> Result<ServerStateRow, AdapterError> {
        if self.closed {
            return Err(AdapterError::Closed);
        }
        self.frame.pull().await?;
        self.frame.checkout();
        Ok(self.frame.server_state().clone())
    }

    /// Delete this player's record and tear the connection down. A second
    /// `close` is a no-op.
    pub async fn close(&mut self) -> Result<(), AdapterError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(err) = self.frame.leave().await {
            debug!(%err, "leave during close failed");
        }
        Ok(())
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, AdapterError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|err| AdapterError::Frame(FrameError::Io(err)))?
        .next()
        .ok_or_else(|| {
            AdapterError::Frame(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("hostname {host:?} did not resolve"),
            )))
        })
}
