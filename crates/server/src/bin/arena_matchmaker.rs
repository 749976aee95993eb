//! Matchmaking server binary: authenticates players, pools them into
//! matches, and runs one game server per match on a port from the
//! configured range.

use arena_server::{MatchmakerConfig, MatchmakingServer};
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arena-matchmaker")]
#[command(about = "Matchmaking and match-lifecycle server for turn-based RL competitions")]
struct Args {
    /// Name of the environment to run.
    #[arg(long, short = 'e', default_value = "test")]
    environment: String,

    /// Hostname to start the matchmaking and game servers on.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Port for the matchmaking RPC.
    #[arg(long, default_value_t = 50051)]
    matchmaking_port: u16,

    /// First port of the game-server range; the range spans twice the
    /// number of simultaneous games.
    #[arg(long, default_value_t = 21450)]
    game_port: u16,

    /// Number of games to run in parallel.
    #[arg(long, short = 'm', default_value_t = 1)]
    max_games: usize,

    /// Max tick rate the game servers run on.
    #[arg(long, short = 't', default_value_t = 60)]
    tick_rate: u32,

    /// Do not wait for the current player: apply whatever action is
    /// present (or the no-op) after one tick.
    #[arg(long, short = 'r')]
    realtime: bool,

    /// Do not push the serialized true game state to clients, only the
    /// per-player observations.
    #[arg(long, short = 'f')]
    observations_only: bool,

    /// Config string passed verbatim to the environment.
    #[arg(long, short = 'c', default_value = "")]
    config: String,

    /// Path of the ranking database file.
    #[arg(long, default_value = "test.sqlite")]
    database: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = MatchmakerConfig {
        environment: args.environment,
        hostname: args.hostname.clone(),
        game_port: args.game_port,
        max_games: args.max_games,
        tick_rate: args.tick_rate,
        realtime: args.realtime,
        observations_only: args.observations_only,
        env_config: args.config,
        database: args.database,
    };

    let listener = TcpListener::bind((args.hostname.as_str(), args.matchmaking_port)).await?;
    let mut server = MatchmakingServer::start(config, listener).await?;
    tracing::info!(addr = %server.local_addr(), "matchmaking server listening");

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        result = server.wait() => {
            result?;
            false
        }
    };
    if interrupted {
        tracing::info!("interrupt received, shutting down");
        server.shutdown().await;
    }
    Ok(())
}
