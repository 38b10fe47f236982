//! CLI interface for Agent Desktop
//!
//! Command-line interface built with clap's derive API.

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agent Desktop
///
/// Give a natural-language task; a language model carries it out on this
/// machine with shell, file and directory tools.
#[derive(Parser, Debug)]
#[command(name = "agent-desktop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a task and stream its steps
    Run {
        /// The task to execute
        task: String,

        /// Extra context appended to the task
        #[arg(long)]
        context: Option<String>,

        /// Override the iteration budget
        #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        max_steps: Option<usize>,
    },

    /// Interactive conversation; Ctrl-C stops the current turn, again to quit
    Chat,

    /// List the tools offered to the model
    Tools,

    /// Check whether a command would be blocked by the safety filter
    Check {
        /// Command line to classify
        command: String,
    },

    /// Check configuration and the model connection
    Doctor,
}
