//! CLI module for authgate

pub mod serve;

use clap::{Parser, Subcommand};

/// Authgate - token issuance and role-based access control
#[derive(Parser)]
#[command(name = "authgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,
}
