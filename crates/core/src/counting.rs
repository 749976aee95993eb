//! Built-in `test` environment: a deterministic counting game.
//!
//! Seats act in cycling order. An action is an integer increment applied to a
//! shared counter and to the acting seat's score; anything that does not
//! parse as an integer counts as 0, which is also the declared no-op. The
//! game ends after a fixed number of full cycles and every seat with the
//! maximal score wins.

use crate::environment::{Environment, EnvironmentError, Observations, Seat, StepOutcome};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const DEFAULT_PLAYERS: usize = 2;
const DEFAULT_ROUNDS: u64 = 5;

pub struct CountingEnvironment {
    players: usize,
    rounds: u64,
    counter: i64,
    round: u64,
    next_seat: Seat,
    scores: Vec<f64>,
    dimensions: Vec<String>,
}

impl CountingEnvironment {
    /// Build from a config string of comma-separated `key=value` pairs.
    /// Recognized keys: `players` (default 2), `rounds` (default 5).
    pub fn from_config(config: &str) -> Result<Self, EnvironmentError> {
        let mut players = DEFAULT_PLAYERS;
        let mut rounds = DEFAULT_ROUNDS;

        for pair in config.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| EnvironmentError::new(format!("malformed config entry: {pair}")))?;
            match key.trim() {
                "players" => {
                    players = value.trim().parse().map_err(|_| {
                        EnvironmentError::new(format!("invalid players value: {value}"))
                    })?;
                    if players < 1 {
                        return Err(EnvironmentError::new("players must be at least 1"));
                    }
                }
                "rounds" => {
                    rounds = value.trim().parse().map_err(|_| {
                        EnvironmentError::new(format!("invalid rounds value: {value}"))
                    })?;
                    if rounds < 1 {
                        return Err(EnvironmentError::new("rounds must be at least 1"));
                    }
                }
                other => {
                    return Err(EnvironmentError::new(format!("unknown config key: {other}")));
                }
            }
        }

        Ok(Self {
            players,
            rounds,
            counter: 0,
            round: 0,
            next_seat: 0,
            scores: vec![0.0; players],
            dimensions: ["counter", "round", "score"]
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    fn seat_observation(&self, seat: Seat) -> Observations {
        let mut obs = Observations::new();
        obs.insert("counter".into(), json!(self.counter));
        obs.insert("round".into(), json!(self.round));
        obs.insert("score".into(), json!(self.scores[seat as usize]));
        obs
    }

    fn finished(&self) -> bool {
        self.round >= self.rounds
    }

    fn winning_seats(&self) -> Vec<Seat> {
        let best = self.scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == best)
            .map(|(i, _)| i as Seat)
            .collect()
    }
}

impl Environment for CountingEnvironment {
    fn min_players(&self) -> usize {
        self.players
    }

    fn observation_names(&self) -> &[String] {
        &self.dimensions
    }

    fn next_seat(&self) -> Seat {
        self.next_seat
    }

    fn observations(&self) -> BTreeMap<Seat, Observations> {
        (0..self.players as Seat)
            .map(|seat| (seat, self.seat_observation(seat)))
            .collect()
    }

    fn no_op_action(&self) -> Value {
        json!(0)
    }

    fn step(&mut self, seat: Seat, action: &Value) -> Result<StepOutcome, EnvironmentError> {
        if self.finished() {
            return Err(EnvironmentError::new("game already finished"));
        }

        let increment = action.as_i64().unwrap_or(0);
        self.counter += increment;
        self.scores[seat as usize % self.players] += increment as f64;

        self.next_seat = (self.next_seat + 1) % self.players as Seat;
        if self.next_seat == 0 {
            self.round += 1;
        }

        let terminal = self.finished();
        let mut rewards = BTreeMap::new();
        for s in 0..self.players as Seat {
            rewards.insert(s, if s == seat { increment as f64 } else { 0.0 });
        }

        Ok(StepOutcome {
            observations: self.observations(),
            rewards,
            terminal,
            winners: if terminal { self.winning_seats() } else { Vec::new() },
        })
    }

    fn serialize_state(&self) -> Vec<u8> {
        let state = json!({
            "counter": self.counter,
            "round": self.round,
            "next_seat": self.next_seat,
            "scores": self.scores,
        });
        serde_json::to_vec(&state).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_config_parsing() {
        let env = CountingEnvironment::from_config("").unwrap();
        assert_eq!(env.min_players(), 2);

        let env = CountingEnvironment::from_config("players=3, rounds=7").unwrap();
        assert_eq!(env.min_players(), 3);
        assert_eq!(env.rounds, 7);

        assert!(CountingEnvironment::from_config("players=0").is_err());
        assert!(CountingEnvironment::from_config("speed=9").is_err());
        assert!(CountingEnvironment::from_config("players").is_err());
    }

    #[test]
    fn seats_cycle_in_order() {
        let mut env = CountingEnvironment::from_config("players=3,rounds=2").unwrap();
        let mut order = Vec::new();
        for _ in 0..6 {
            let seat = env.next_seat();
            order.push(seat);
            env.step(seat, &json!(1)).unwrap();
        }
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn rewards_go_to_the_acting_seat() {
        let mut env = CountingEnvironment::from_config("players=2,rounds=1").unwrap();
        let outcome = env.step(0, &json!(4)).unwrap();
        assert_eq!(outcome.rewards[&0], 4.0);
        assert_eq!(outcome.rewards[&1], 0.0);
        assert!(!outcome.terminal);
    }

    #[test]
    fn terminates_after_configured_rounds_with_max_score_winners() {
        let mut env = CountingEnvironment::from_config("players=2,rounds=2").unwrap();
        env.step(0, &json!(1)).unwrap();
        env.step(1, &json!(2)).unwrap();
        env.step(0, &json!(3)).unwrap();
        let last = env.step(1, &json!(4)).unwrap();
        assert!(last.terminal);
        assert_eq!(last.winners, vec![1]);
        assert_eq!(last.observations[&0]["counter"], json!(10));

        assert!(env.step(0, &json!(1)).is_err());
    }

    #[test]
    fn ties_produce_multiple_winners() {
        let mut env = CountingEnvironment::from_config("players=2,rounds=1").unwrap();
        env.step(0, &json!(3)).unwrap();
        let last = env.step(1, &json!(3)).unwrap();
        assert!(last.terminal);
        assert_eq!(last.winners, vec![0, 1]);
    }

    #[test]
    fn non_integer_actions_count_as_the_no_op() {
        let mut env = CountingEnvironment::from_config("players=1,rounds=1").unwrap();
        let outcome = env.step(0, &json!("sideways")).unwrap();
        assert_eq!(outcome.observations[&0]["counter"], json!(0));
        assert_eq!(outcome.rewards[&0], 0.0);
    }
}
