//! Command line surface of the hosting process.

use clap::{Parser, Subcommand};

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "catalogd", version, about = "Event-sourced product catalog service")]
pub struct Args {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Commands of the hosting process.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Starts the HTTP API. The server blocks the process; press CTRL-C to
    /// stop it.
    Server {
        /// Host for the HTTP listener.
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Port for the HTTP listener.
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Says hello.
    Hello,
}
