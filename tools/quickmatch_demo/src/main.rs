//! Minimal agent: request a match from a running matchmaking server, join
//! the game, and play random increments until the game ends.

use arena_client::{request_match, MatchClient};
use clap::Parser;
use rand::Rng;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quickmatch-demo")]
#[command(about = "Request a quick match and play random actions")]
struct Args {
    /// Hostname of the matchmaking server.
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Port of the matchmaking RPC.
    #[arg(long, default_value_t = 50051)]
    port: u16,

    #[arg(long, default_value = "noobmaster68")]
    username: String,

    #[arg(long, default_value = "")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let game = request_match(&args.hostname, args.port, &args.username, &args.password).await?;
    println!(
        "Got match: {}:{} (ranking {:.1})",
        game.host, game.port, game.ranking
    );

    let (mut client, first) =
        MatchClient::connect(&game.host, game.port, &game.username, &game.token).await?;
    println!("First observation: {first:?}");

    let mut turns = 0u32;
    loop {
        let action = json!(rand::thread_rng().gen_range(0..10));
        let result = client.step(action).await?;
        turns += 1;
        println!(
            "turn {turns}: reward {:.1}, observation {:?}",
            result.reward, result.observations
        );
        if result.terminal {
            println!("Game over, winners: {:?}", result.winners);
            break;
        }
    }

    client.close().await?;
    Ok(())
}
