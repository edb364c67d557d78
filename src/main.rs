use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod collection;
mod config;
mod error;
mod handler;
mod local;
mod logical;
mod msgentry;
mod recursion;
mod remote;
mod selflock;
mod server;
mod service;

#[derive(Parser, Debug)]
#[command(version, about = "A modular, programmable recursive-style DNS resolver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the resolver service until SIGINT/SIGTERM.
    Resolve {
        #[arg(short = 'c', long = "config")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Resolve { config } => service::run(&config).await,
    }
}
