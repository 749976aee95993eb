//! The per-match game loop: admits the cohort, drives the environment turn
//! by turn over the shared dataframe, and tears the endpoint down when the
//! game ends.

use crate::errors::MatchStartError;
use arena_core::{winners, Environment, Pacer, Seat};
use arena_frame::{FrameHandle, FrameHost};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Grace period for game-over acknowledgements from connected players.
const ACK_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub(crate) struct MatchConfig {
    pub env_name: String,
    pub tick_rate: u32,
    pub realtime: bool,
    pub observations_only: bool,
}

/// Run one match to completion. `ready` resolves once the endpoint is
/// listening and admission is open — or with the bind error, in which case
/// the return value is `false` and nothing was started.
pub(crate) async fn run_match_server(
    mut env: Box<dyn Environment>,
    addr: SocketAddr,
    whitelist: Vec<String>,
    config: MatchConfig,
    ready: oneshot::Sender<Result<(), MatchStartError>>,
) -> bool {
    let host = match FrameHost::bind(addr, whitelist).await {
        Ok(host) => host,
        Err(err) => {
            error!(%addr, %err, "match server failed to bind");
            let _ = ready.send(Err(MatchStartError::Bind(err)));
            return false;
        }
    };

    let handle = host.handle();
    {
        let mut state = handle.lock().await;
        state.state.env_class_name = config.env_name.clone();
        state.state.env_dimensions = env.observation_names().to_vec();
        state.state.terminal = false;
        state.state.winners = winners::encode(&[]);
        state.commit();
    }
    let _ = ready.send(Ok(()));
    info!(%addr, env = %config.env_name, "match server ready");

    play(env.as_mut(), &handle, &config).await;

    {
        let mut state = handle.lock().await;
        state.commit();
    }
    host.close().await;
    info!(%addr, "match server closed");
    true
}

async fn play(env: &mut dyn Environment, handle: &FrameHandle, config: &MatchConfig) {
    let mut pacer = Pacer::new(config.tick_rate);
    let seats_needed = env.min_players();

    admit_players(handle, &mut pacer, seats_needed).await;
    debug!(seats = seats_needed, "all seats filled, starting game");

    // Publish the initial view before any turn flag goes up.
    {
        let mut state = handle.lock().await;
        let initial = env.observations();
        for slot in state.players.iter_mut() {
            if let Some(seat) = slot.row.seat() {
                if let Some(obs) = initial.get(&seat) {
                    slot.row.observation = obs.clone();
                }
            }
        }
        if !config.observations_only {
            state.state.serialized_state = env.serialize_state();
        }
        state.commit();
    }

    let mut current = env.next_seat();
    loop {
        let submitted = acquire_action(handle, &mut pacer, current, config.realtime).await;
        let action = submitted.unwrap_or_else(|| env.no_op_action());

        let step = match env.step(current, &action) {
            Ok(step) => step,
            Err(err) => {
                error!(%err, "environment step failed, ending match as a draw");
                let mut state = handle.lock().await;
                state.state.terminal = true;
                state.state.winners = winners::encode(&[]);
                state.commit();
                break;
            }
        };

        {
            let mut state = handle.lock().await;
            for slot in state.players.iter_mut() {
                if !slot.connected {
                    continue;
                }
                let Some(seat) = slot.row.seat() else {
                    continue;
                };
                if let Some(obs) = step.observations.get(&seat) {
                    slot.row.observation = obs.clone();
                }
                slot.row.reward_from_last_turn = step.rewards.get(&seat).copied().unwrap_or(0.0);
            }
            if !config.observations_only {
                state.state.serialized_state = env.serialize_state();
            }
            if step.terminal {
                state.state.terminal = true;
                state.state.winners = winners::encode(&step.winners);
            }
            state.commit();
        }

        if step.terminal {
            debug!(winners = ?step.winners, "game over");
            break;
        }
        current = env.next_seat();
    }

    await_acknowledgements(handle, &mut pacer, config.tick_rate).await;
}

/// Phase A: wait until enough players joined, seating each in the order it
/// was observed. Players that disconnect before being seated are dropped
/// and their seats stay open.
async fn admit_players(handle: &FrameHandle, pacer: &mut Pacer, seats_needed: usize) {
    loop {
        pacer.tick().await;
        let mut state = handle.lock().await;
        state.prune_unseated_disconnects();

        let mut seated = state.seated_count();
        let mut changed = false;
        for slot in state.players.iter_mut() {
            if slot.row.number < 0 && seated < seats_needed {
                slot.row.number = seated as i32;
                seated += 1;
                changed = true;
            }
        }
        if changed {
            state.commit();
        }
        if seated >= seats_needed {
            return;
        }
    }
}

/// One turn's worth of waiting: raise the seat's turn flag, then poll until
/// its action arrives. Returns `None` when a no-op must be substituted —
/// the seat is disconnected, or realtime mode found no action after one
/// tick. Clearing the readiness flag and the turn flag happens in the same
/// commit that captures the action.
async fn acquire_action(
    handle: &FrameHandle,
    pacer: &mut Pacer,
    seat: Seat,
    realtime: bool,
) -> Option<Value> {
    let live = {
        let mut state = handle.lock().await;
        let live = match state.seat_mut(seat) {
            Some(slot) if slot.connected => {
                slot.row.turn = true;
                true
            }
            _ => false,
        };
        if live {
            state.commit();
        }
        live
    };
    if !live {
        // A dead seat still costs one tick per substituted no-op, so a
        // disconnected player cannot stall or speed up the match.
        pacer.tick().await;
        return None;
    }

    if realtime {
        pacer.tick().await;
        let mut state = handle.lock().await;
        let slot = state.seat_mut(seat)?;
        let action = slot.row.ready_for_action.then(|| slot.row.action.clone());
        slot.row.ready_for_action = false;
        slot.row.turn = false;
        state.commit();
        return action;
    }

    loop {
        pacer.tick().await;
        let mut state = handle.lock().await;
        let Some(slot) = state.seat_mut(seat) else {
            return None;
        };
        if !slot.connected {
            slot.row.turn = false;
            state.commit();
            return None;
        }
        if slot.row.ready_for_action {
            let action = slot.row.action.clone();
            slot.row.ready_for_action = false;
            slot.row.turn = false;
            state.commit();
            return Some(action);
        }
    }
}

/// Wait (bounded) until every still-connected seated player has
/// acknowledged the terminal state. Disconnected players are not waited on.
async fn await_acknowledgements(handle: &FrameHandle, pacer: &mut Pacer, tick_rate: u32) {
    let max_ticks = (u64::from(tick_rate.max(1))).saturating_mul(ACK_GRACE.as_secs()).max(1);
    for _ in 0..max_ticks {
        pacer.tick().await;
        let state = handle.lock().await;
        let pending = state
            .players
            .iter()
            .any(|slot| slot.connected && slot.row.number >= 0 && !slot.row.acknowledges_game_over);
        if !pending {
            return;
        }
    }
    debug!("grace period expired before all game-over acknowledgements arrived");
}
