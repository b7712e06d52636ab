//! Process-level CLI surface (§10.4): where to find the config file, how
//! chatty to be, and whether to actually serve or just run the sweeper once.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "eoss", version, about = "Single-node HTTP object storage service")]
pub struct Cli {
    /// Path to the YAML configuration file. Falls back to EOSS_CONFIG if unset.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging regardless of RUST_LOG.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the crash-recovery sweep and start serving requests (default).
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        address: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Run only the crash-recovery sweep, then exit. Useful for operators who
    /// want to reconcile storage without booting the HTTP listener.
    Sweep,
}
