//! End-to-end scenarios over the full stack: matchmaking RPC, cohort
//! formation, match servers on real ports, and the client adapter.
//!
//! Every test uses its own disjoint game-port range so the suite can run
//! in parallel within one process.

use arena_client::{request_match, GameResponse, MatchClient, MatchmakingError};
use arena_server::{MatchmakerConfig, MatchmakingServer, StartupError};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};

async fn start_server(
    game_port: u16,
    max_games: usize,
    env_config: &str,
    tick_rate: u32,
) -> MatchmakingServer {
    let config = MatchmakerConfig {
        environment: "test".into(),
        hostname: "127.0.0.1".into(),
        game_port,
        max_games,
        tick_rate,
        realtime: false,
        observations_only: false,
        env_config: env_config.into(),
        database: ":memory:".into(),
    };
    start_server_with(config).await
}

async fn start_server_with(config: MatchmakerConfig) -> MatchmakingServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    MatchmakingServer::start(config, listener).await.unwrap()
}

/// Join the assigned match and step a constant action until terminal.
async fn play_to_completion(game: GameResponse, action: i64) -> Vec<u32> {
    let (mut client, _first) =
        MatchClient::connect(&game.host, game.port, &game.username, &game.token)
            .await
            .unwrap();
    let winners = loop {
        let result = client.step(json!(action)).await.unwrap();
        if result.terminal {
            break result.winners.unwrap();
        }
    };
    client.close().await.unwrap();
    winners
}

/// Duplicate-login refusals are transient while a previous match is being
/// cleaned up; retry until the matchmaker accepts.
async fn request_until_accepted(port: u16, username: &str, password: &str) -> GameResponse {
    for _ in 0..100 {
        match request_match("127.0.0.1", port, username, password).await {
            Ok(game) => return game,
            Err(MatchmakingError::Refused(_)) => sleep(Duration::from_millis(50)).await,
            Err(err) => panic!("unexpected matchmaking failure: {err}"),
        }
    }
    panic!("matchmaker never accepted {username}");
}

#[tokio::test]
async fn cold_first_login_creates_the_user_and_starts_a_match() {
    let server = start_server(23450, 1, "players=1,rounds=2", 120).await;
    let rpc_port = server.local_addr().port();

    let game = request_match("127.0.0.1", rpc_port, "Alice", "secret")
        .await
        .unwrap();
    assert_eq!(game.username, "alice");
    assert_eq!(game.host, "127.0.0.1");
    assert!((23450..23452).contains(&game.port));
    assert_eq!(game.token.len(), 64);
    assert!(game.token.bytes().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(game.ranking, 1000.0);

    let (mut client, first) =
        MatchClient::connect(&game.host, game.port, &game.username, &game.token)
            .await
            .unwrap();
    assert_eq!(first["counter"], json!(0));
    assert_eq!(first["round"], json!(0));

    let mid = client.step(json!(1)).await.unwrap();
    assert!(!mid.terminal);
    assert_eq!(mid.observations["counter"], json!(1));
    assert_eq!(mid.reward, 1.0);

    let last = client.step(json!(1)).await.unwrap();
    assert!(last.terminal);
    assert_eq!(last.winners, Some(vec![0]));
    client.close().await.unwrap();
    // close twice: the second must be a no-op
    client.close().await.unwrap();

    // The janitor logs alice off once the match is gone, so a fresh
    // request (any casing) is accepted again within finite time.
    let game2 = request_until_accepted(rpc_port, "ALICE", "secret").await;
    assert_eq!(game2.username, "alice");
    assert_eq!(game2.ranking, 1000.0);
    play_to_completion(game2, 1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn duplicate_login_is_refused_without_touching_the_queue() {
    let server = start_server(23460, 1, "players=2,rounds=1", 120).await;
    let rpc_port = server.local_addr().port();

    // First bob parks in the queue; his cohort needs a second player.
    let first = tokio::spawn(async move {
        request_match("127.0.0.1", rpc_port, "bob", "pw").await
    });
    sleep(Duration::from_millis(300)).await;
    assert!(!first.is_finished());

    let err = request_match("127.0.0.1", rpc_port, "Bob", "pw")
        .await
        .unwrap_err();
    match err {
        MatchmakingError::Refused(reason) => {
            assert_eq!(
                reason,
                "Failed to login: Cannot login twice at the same time."
            );
        }
        other => panic!("expected a refusal, got {other}"),
    }

    // The queued request is still intact: carol completes the cohort and
    // both receive the same server coordinates.
    let carol = request_match("127.0.0.1", rpc_port, "carol", "pw")
        .await
        .unwrap();
    let bob = first.await.unwrap().unwrap();
    assert_eq!((bob.host.as_str(), bob.port), (carol.host.as_str(), carol.port));
    assert_ne!(bob.token, carol.token);

    server.shutdown().await;
}

#[tokio::test]
async fn wrong_password_is_refused() {
    let server = start_server(23510, 1, "players=1,rounds=1", 120).await;
    let rpc_port = server.local_addr().port();

    let game = request_match("127.0.0.1", rpc_port, "dave", "hunter2")
        .await
        .unwrap();
    play_to_completion(game, 1).await;

    // dave exists and is logged off; a wrong password must never be a
    // transient condition, so no retry loop here.
    let mut last = None;
    for _ in 0..100 {
        match request_match("127.0.0.1", rpc_port, "dave", "wrong").await {
            Err(MatchmakingError::Refused(reason)) => {
                if reason == "Failed to login: Wrong password." {
                    last = Some(reason);
                    break;
                }
                // still logged in from the finishing match
                sleep(Duration::from_millis(50)).await;
            }
            Ok(_) => panic!("login with a wrong password succeeded"),
            Err(err) => panic!("unexpected failure: {err}"),
        }
    }
    assert_eq!(last.as_deref(), Some("Failed to login: Wrong password."));

    server.shutdown().await;
}

#[tokio::test]
async fn backpressure_holds_the_second_cohort_until_the_first_match_ends() {
    let server = start_server(23470, 1, "players=2,rounds=1", 120).await;
    let rpc_port = server.local_addr().port();

    let mut handles = Vec::new();
    for name in ["a", "b", "c", "d"] {
        handles.push(tokio::spawn(async move {
            request_match("127.0.0.1", rpc_port, name, "pw").await
        }));
        sleep(Duration::from_millis(150)).await;
    }
    let mut handles = handles.into_iter();
    let (a, b, c, d) = (
        handles.next().unwrap(),
        handles.next().unwrap(),
        handles.next().unwrap(),
        handles.next().unwrap(),
    );

    // a and b reply; c and d stay queued while match #1 runs.
    let game_a = a.await.unwrap().unwrap();
    let game_b = b.await.unwrap().unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(!c.is_finished());
    assert!(!d.is_finished());

    let (winners_a, winners_b) = tokio::join!(
        tokio::spawn(play_to_completion(game_a, 1)),
        tokio::spawn(play_to_completion(game_b, 2)),
    );
    assert_eq!(winners_a.unwrap(), winners_b.unwrap());

    // Match #1 is gone: its port and permit free up and match #2 starts.
    let game_c = timeout(Duration::from_secs(15), c).await.unwrap().unwrap().unwrap();
    let game_d = timeout(Duration::from_secs(15), d).await.unwrap().unwrap().unwrap();
    assert!((23470..23472).contains(&game_c.port));
    assert_eq!(
        (game_c.host.as_str(), game_c.port),
        (game_d.host.as_str(), game_d.port)
    );

    let (winners_c, winners_d) = tokio::join!(
        tokio::spawn(play_to_completion(game_c, 3)),
        tokio::spawn(play_to_completion(game_d, 4)),
    );
    assert_eq!(winners_c.unwrap(), winners_d.unwrap());

    server.shutdown().await;
}

#[tokio::test]
async fn turn_order_interleaves_observations_as_played() {
    let server = start_server(23480, 1, "players=2,rounds=2", 120).await;
    let rpc_port = server.local_addr().port();

    let seat0 = tokio::spawn(async move {
        let game = request_match("127.0.0.1", rpc_port, "p0", "pw").await.unwrap();
        let (mut client, first) =
            MatchClient::connect(&game.host, game.port, &game.username, &game.token)
                .await
                .unwrap();
        // Seat 0 opens on the initial state.
        assert_eq!(first["counter"], json!(0));

        // Returns once the server applied p1's 2 on top of our 1.
        let r1 = client.step(json!(1)).await.unwrap();
        assert!(!r1.terminal);
        assert_eq!(r1.observations["counter"], json!(3));

        // The final action of the game lands while we wait.
        let r2 = client.step(json!(3)).await.unwrap();
        assert!(r2.terminal);
        assert_eq!(r2.observations["counter"], json!(10));
        assert_eq!(r2.winners, Some(vec![1]));
        client.close().await.unwrap();
    });

    sleep(Duration::from_millis(200)).await;

    let seat1 = tokio::spawn(async move {
        let game = request_match("127.0.0.1", rpc_port, "p1", "pw").await.unwrap();
        // Both replies arrive together once the cohort fills; hold this
        // join back so seat order (acceptance order) is deterministic.
        sleep(Duration::from_millis(500)).await;
        let (mut client, first) =
            MatchClient::connect(&game.host, game.port, &game.username, &game.token)
                .await
                .unwrap();
        // Seat 1's first turn opens after seat 0 acted.
        assert_eq!(first["counter"], json!(1));

        let r1 = client.step(json!(2)).await.unwrap();
        assert!(!r1.terminal);
        assert_eq!(r1.observations["counter"], json!(6));

        let r2 = client.step(json!(4)).await.unwrap();
        assert!(r2.terminal);
        assert_eq!(r2.observations["counter"], json!(10));
        assert_eq!(r2.reward, 4.0);
        assert_eq!(r2.winners, Some(vec![1]));
        client.close().await.unwrap();
    });

    let (a, b) = tokio::join!(seat0, seat1);
    a.unwrap();
    b.unwrap();

    server.shutdown().await;
}

#[tokio::test]
async fn a_disconnected_player_cannot_stall_the_match() {
    let server = start_server(23500, 1, "players=2,rounds=3", 120).await;
    let rpc_port = server.local_addr().port();

    let survivor = tokio::spawn(async move {
        let game = request_match("127.0.0.1", rpc_port, "stayer", "pw").await.unwrap();
        let (mut client, _first) =
            MatchClient::connect(&game.host, game.port, &game.username, &game.token)
                .await
                .unwrap();
        let mut steps = 0u32;
        loop {
            let result = client.step(json!(1)).await.unwrap();
            steps += 1;
            if result.terminal {
                break;
            }
        }
        client.close().await.unwrap();
        steps
    });

    sleep(Duration::from_millis(400)).await;

    let quitter = tokio::spawn(async move {
        let game = request_match("127.0.0.1", rpc_port, "quitter", "pw").await.unwrap();
        let (mut client, _first) =
            MatchClient::connect(&game.host, game.port, &game.username, &game.token)
                .await
                .unwrap();
        let _ = client.step(json!(5)).await.unwrap();
        client.close().await.unwrap();
    });

    // The match reaches terminal in bounded time even though one seat only
    // produces no-ops from the second round on.
    let steps = timeout(Duration::from_secs(15), survivor)
        .await
        .expect("match stalled after a disconnect")
        .unwrap();
    assert_eq!(steps, 3);
    quitter.await.unwrap();

    server.shutdown().await;
}

#[tokio::test]
async fn realtime_mode_advances_without_waiting_for_actions() {
    let config = MatchmakerConfig {
        environment: "test".into(),
        hostname: "127.0.0.1".into(),
        game_port: 23520,
        max_games: 1,
        tick_rate: 120,
        realtime: true,
        observations_only: false,
        env_config: "players=1,rounds=5".into(),
        database: ":memory:".into(),
    };
    let server = start_server_with(config).await;
    let rpc_port = server.local_addr().port();

    let game = request_match("127.0.0.1", rpc_port, "speedy", "pw")
        .await
        .unwrap();
    let (mut client, _first) = timeout(
        Duration::from_secs(10),
        MatchClient::connect(&game.host, game.port, &game.username, &game.token),
    )
    .await
    .unwrap()
    .unwrap();

    // The server substitutes no-ops every tick, so the game runs to
    // completion whether or not we keep up.
    let terminal = timeout(Duration::from_secs(10), async {
        loop {
            let result = client.step(json!(1)).await.unwrap();
            if result.terminal {
                break result;
            }
        }
    })
    .await
    .expect("realtime match did not finish");
    assert_eq!(terminal.winners, Some(vec![0]));

    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn observations_only_mode_withholds_the_serialized_state() {
    let config = MatchmakerConfig {
        environment: "test".into(),
        hostname: "127.0.0.1".into(),
        game_port: 23530,
        max_games: 1,
        tick_rate: 120,
        realtime: false,
        observations_only: true,
        env_config: "players=1,rounds=2".into(),
        database: ":memory:".into(),
    };
    let server = start_server_with(config).await;
    let rpc_port = server.local_addr().port();

    let game = request_match("127.0.0.1", rpc_port, "watcher", "pw")
        .await
        .unwrap();
    let (mut client, _first) =
        MatchClient::connect(&game.host, game.port, &game.username, &game.token)
            .await
            .unwrap();

    let state = client.server_state().await.unwrap();
    assert_eq!(state.env_class_name, "test");
    assert_eq!(state.env_dimensions, ["counter", "round", "score"]);
    assert!(state.serialized_state.is_empty());

    loop {
        if client.step(json!(1)).await.unwrap().terminal {
            break;
        }
    }
    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn the_full_state_is_pushed_by_default() {
    let server = start_server(23540, 1, "players=1,rounds=3", 120).await;
    let rpc_port = server.local_addr().port();

    let game = request_match("127.0.0.1", rpc_port, "observer", "pw")
        .await
        .unwrap();
    let (mut client, _first) =
        MatchClient::connect(&game.host, game.port, &game.username, &game.token)
            .await
            .unwrap();

    client.step(json!(4)).await.unwrap();
    let state = client.server_state().await.unwrap();
    let decoded: serde_json::Value = serde_json::from_slice(&state.serialized_state).unwrap();
    assert_eq!(decoded["counter"], json!(4));

    loop {
        if client.step(json!(1)).await.unwrap().terminal {
            break;
        }
    }
    client.close().await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_environment_is_fatal_before_any_resource_is_touched() {
    let db_path = std::env::temp_dir()
        .join(format!("arena-test-{}-unknown-env.sqlite", std::process::id()));
    let db_path = db_path.to_str().unwrap().to_string();
    let _ = std::fs::remove_file(&db_path);

    let config = MatchmakerConfig {
        environment: "does-not-exist".into(),
        hostname: "127.0.0.1".into(),
        game_port: 23490,
        database: db_path.clone(),
        ..MatchmakerConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let err = MatchmakingServer::start(config, listener).await.unwrap_err();

    match err {
        StartupError::UnknownEnvironment { name, available } => {
            assert_eq!(name, "does-not-exist");
            assert!(available.contains(&"test"));
        }
        other => panic!("expected an unknown-environment error, got {other}"),
    }
    assert!(
        !std::path::Path::new(&db_path).exists(),
        "database file must not be created for an invalid configuration"
    );
}

#[tokio::test]
async fn a_fully_occupied_port_range_is_fatal() {
    // max_games=1 probes exactly two ports; occupy both.
    let _holder_a = std::net::TcpListener::bind("127.0.0.1:23495").unwrap();
    let _holder_b = std::net::TcpListener::bind("127.0.0.1:23496").unwrap();

    let config = MatchmakerConfig {
        hostname: "127.0.0.1".into(),
        game_port: 23495,
        database: ":memory:".into(),
        ..MatchmakerConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let err = MatchmakingServer::start(config, listener).await.unwrap_err();

    match err {
        StartupError::NotEnoughPorts { needed, found, .. } => {
            assert_eq!(needed, 1);
            assert_eq!(found, 0);
        }
        other => panic!("expected a port-allocation error, got {other}"),
    }
}
