//! Command-line interface for strictly_othello.

use clap::{Parser, Subcommand};
use strictly_othello::PolicyKind;

/// Strictly Othello - Reversi sessions with automated opponents
#[derive(Parser, Debug)]
#[command(name = "strictly_othello")]
#[command(about = "Othello engine and session orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Database path, overriding DATABASE_URL and the config file
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Play automated games against each other and store them
    Selfplay {
        /// Number of games to play
        #[arg(short, long, default_value = "1")]
        games: u32,

        /// Policy playing Black
        #[arg(long, default_value = "random")]
        black: PolicyKind,

        /// Policy playing White
        #[arg(long, default_value = "greedy")]
        white: PolicyKind,

        /// Pause before each automated move, in milliseconds
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },

    /// Show a user's statistics
    Stats {
        /// User id
        user: i64,
    },

    /// Show a stored game
    Board {
        /// Game id
        game: i32,

        /// Also list the logged moves
        #[arg(long)]
        moves: bool,
    },
}
