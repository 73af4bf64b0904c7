//! CLI argument parsing for the dispatch-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dispatch-worker", about = "Technician itinerary optimization worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Compute one itinerary from a JSON request file and print the result
    Compute {
        /// Path to an itinerary request (same shape as the NATS payload)
        #[arg(long, short)]
        input: PathBuf,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}
