use clap::Parser;
use client::game::{build_submission, RunRecorder};
use client::input::{BotInput, BotProfile};
use client::network::Client;
use log::{info, warn};
use shared::{EndReason, GAME_FPS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name to submit the score under
    #[arg(short = 'n', long, default_value = "bot")]
    player: String,

    /// Fingerprint sent with the session request and the submission
    #[arg(short = 'f', long)]
    fingerprint: Option<String>,

    /// Length of the simulated run in seconds
    #[arg(short = 'd', long, default_value = "10")]
    seconds: u64,

    /// Distance points per frame
    #[arg(long, default_value = "2")]
    base_points: u64,

    /// Chance per frame of picking up a power coin on screen
    #[arg(long, default_value = "0.02")]
    power_chance: f64,

    /// Seed for the bot's own decisions
    #[arg(long, default_value = "1")]
    bot_seed: u64,

    /// Print the submission instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let client = Client::new(&args.server, Duration::from_millis(args.timeout_ms))?;

    info!("Requesting session from {}", client.base());
    let grant = client.request_session(args.fingerprint.clone()).await?;
    info!(
        "Session {} (seed {}, expires at {})",
        grant.session_id, grant.seed, grant.expires_at
    );

    let started_at = shared::get_timestamp().max(grant.issued_at);
    let ended_at = started_at + args.seconds * 1000;
    if ended_at > grant.expires_at {
        warn!("Run ends after the session expires; the server will reject it");
    }

    let profile = BotProfile {
        base_points: args.base_points,
        power_coin_chance: args.power_chance,
        ..BotProfile::default()
    };
    let mut recorder = RunRecorder::new(&grant, started_at);
    BotInput::new(profile, args.bot_seed).play(&mut recorder, args.seconds * GAME_FPS);
    info!(
        "Simulated {} frames, score {}",
        recorder.frame(),
        recorder.score()
    );

    // The server bounds frames by wall-clock time since issuance
    let wait = ended_at.saturating_sub(shared::get_timestamp());
    info!("Waiting {}ms for the run to end in real time", wait);
    tokio::time::sleep(Duration::from_millis(wait)).await;

    let summary = recorder.finish(ended_at, 0, EndReason::Collision);
    let submission = build_submission(
        &args.player,
        &grant.session_id,
        &summary,
        args.fingerprint.clone(),
    )?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&submission)?);
        return Ok(());
    }

    let response = client.submit(&submission).await?;
    info!("Score accepted");
    for (rank, entry) in response.leaderboard.iter().enumerate() {
        println!("{:>2}. {:<32} {}", rank + 1, entry.player_name, entry.score);
    }

    Ok(())
}
