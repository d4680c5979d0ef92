// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Two commands: an interactive REPL and a one-shot query (§6).
#[derive(Parser, Debug)]
#[command(
    name = "stepwise",
    about = "An agentic task runner: plans a goal into tool calls, executes and re-plans around failures",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a config file; overrides auto-discovery (§2.1).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a REPL, preserving one Agent (and its Memory) across turns.
    Interactive,
    /// Send a single message to the agent and print its response.
    Query {
        /// The message to send.
        text: String,
    },
}
