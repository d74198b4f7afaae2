//! Command-line interface parsing for the Epic Timeline CLI
//!
//! This module handles parsing of CLI arguments using clap: the browse
//! subcommands plus the global --base-url override used to point the client
//! at a non-default backend (or at a test server).

use clap::{Parser, Subcommand};

/// Epic Timeline CLI - browse saga events and characters
#[derive(Parser, Debug)]
#[command(name = "epictimeline")]
#[command(about = "Browse Epic Timeline saga events and characters")]
#[command(version)]
pub struct Cli {
    /// Base URL of the Epic Timeline backend API
    #[arg(long, value_name = "URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List timeline events, optionally filtered
    Events {
        /// Filter by location id or name (e.g. "troy")
        #[arg(long)]
        location: Option<String>,

        /// Filter by saga id
        #[arg(long)]
        saga: Option<u64>,

        /// Search titles, descriptions, and character names
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of events to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show details for one character
    Character {
        /// Character id (e.g. 1 for Odysseus)
        id: u64,
    },

    /// Print the cache health report
    Health,

    /// Invalidate hot data and re-run the preload
    Refresh,
}
