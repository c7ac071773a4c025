//! Strictly Othello - command-line front end
//!
//! Runs automated self-play, prints statistics, and shows stored games.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::sync::Arc;
use std::time::Duration;
use strictly_othello::{Cell, Player, PolicyKind};
use strictly_othello_server::{
    GameRepository, Participant, Persistence, ServerConfig, SessionEvent, SessionOrchestrator,
    SessionView,
};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_othello=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(database = %config.database_url(), "Using database");

    let repository = GameRepository::new(config.database_url().clone())?;
    repository.run_migrations()?;

    match cli.command {
        Command::Migrate => {
            println!("Database ready at {}", config.database_url());
            Ok(())
        }
        Command::Selfplay {
            games,
            black,
            white,
            delay_ms,
        } => run_selfplay(&config, repository, games, black, white, delay_ms).await,
        Command::Stats { user } => show_stats(&config, repository, user).await,
        Command::Board { game, moves } => show_board(&config, repository, game, moves).await,
    }
}

/// Merges the config file, environment, and command-line overrides.
#[instrument(skip(cli))]
fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config = config.with_database_url(url);
    }
    if let Some(url) = &cli.database_url {
        config = config.with_database_url(url.clone());
    }
    Ok(config)
}

/// Plays `games` automated games and prints each final board.
#[instrument(skip(config, repository))]
async fn run_selfplay(
    config: &ServerConfig,
    repository: GameRepository,
    games: u32,
    black: PolicyKind,
    white: PolicyKind,
    delay_ms: u64,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = SessionOrchestrator::from_config(config, Arc::new(repository))
        .with_thinking_delay(Duration::from_millis(delay_ms))
        .with_events(tx);

    for round in 1..=games {
        let start = orchestrator
            .start_session(
                Participant::automated(format!("{} (black)", black), black),
                Participant::automated(format!("{} (white)", white), white),
            )
            .await?;
        info!(round, session_id = start.id, "Self-play game started");

        let finished = loop {
            let event = rx.recv().await.context("Event stream closed")?;
            match event {
                SessionEvent::Ended(view) if view.id == start.id => break view,
                SessionEvent::Stalled {
                    session, reason, ..
                } if session == start.id => {
                    anyhow::bail!("Game {} stalled: {}", session, reason);
                }
                _ => {}
            }
        };

        println!("Game {} ({} moves)", finished.id, finished.moves_played);
        println!("{}", render_board(&finished));
        println!("{}\n", render_result(&finished));
    }
    Ok(())
}

/// Prints a user's statistics.
#[instrument(skip(config, repository))]
async fn show_stats(config: &ServerConfig, repository: GameRepository, user: i64) -> Result<()> {
    let name = repository
        .get_user(user)?
        .map(|u| u.display_name().clone())
        .unwrap_or_else(|| format!("user {}", user));
    let orchestrator = SessionOrchestrator::from_config(config, Arc::new(repository));
    let stats = orchestrator.player_stats(user).await?;

    let overall = stats.overall();
    println!("Statistics for {}", name);
    println!(
        "  {} games: {} wins, {} losses, {} draws ({:.1}% won)",
        overall.total_games(),
        overall.wins(),
        overall.losses(),
        overall.draws(),
        overall.win_rate()
    );
    println!(
        "  as black: {} of {} won",
        stats.as_black().wins(),
        stats.as_black().total_games()
    );
    println!(
        "  as white: {} of {} won",
        stats.as_white().wins(),
        stats.as_white().total_games()
    );
    for record in stats.opponents() {
        let s = record.stats();
        let tag = match (record.opponent_id(), record.policy()) {
            (Some(id), _) => format!("#{}", id),
            (None, Some(policy)) => policy.to_string(),
            (None, None) => String::new(),
        };
        println!(
            "  vs {} [{}]: {}-{}-{}",
            record.opponent(),
            tag,
            s.wins(),
            s.losses(),
            s.draws()
        );
    }
    Ok(())
}

/// Prints a stored game and optionally its move log.
#[instrument(skip(config, repository))]
async fn show_board(
    config: &ServerConfig,
    repository: GameRepository,
    game: i32,
    moves: bool,
) -> Result<()> {
    let log = if moves {
        repository.moves_for(game)?
    } else {
        Vec::new()
    };
    // Showing a game must not play it, so automated turns stay paused.
    let orchestrator = SessionOrchestrator::from_config(config, Arc::new(repository))
        .with_thinking_delay(Duration::from_secs(3600));
    let view = orchestrator.request_status(game).await?;

    println!("{} (black) vs {} (white)", view.black.name, view.white.name);
    println!("{}", render_board(&view));
    println!("{}", render_result(&view));
    for (n, mv) in log.iter().enumerate() {
        println!(
            "  {:>2}. {:<5} ({}, {}) flipped {}",
            n + 1,
            mv.player(),
            mv.row(),
            mv.col(),
            mv.flipped()
        );
    }
    if moves && log.is_empty() {
        warn!(game, "No moves logged");
    }
    Ok(())
}

fn render_board(view: &SessionView) -> String {
    let mut out = String::from("  0 1 2 3 4 5 6 7\n");
    for (r, row) in view.board.iter().enumerate() {
        out.push_str(&r.to_string());
        for cell in row {
            out.push(' ');
            out.push(match cell {
                Cell::Empty => '.',
                Cell::Black => 'X',
                Cell::White => 'O',
            });
        }
        out.push('\n');
    }
    out
}

fn render_result(view: &SessionView) -> String {
    let score = format!("Black {} - {} White", view.black_score, view.white_score);
    match view.outcome {
        Some(outcome) => format!("{}: {}", score, outcome),
        None => {
            let to_move = match view.current_player {
                Player::Black => &view.black.name,
                Player::White => &view.white.name,
            };
            format!("{}, {} to move", score, to_move)
        }
    }
}
