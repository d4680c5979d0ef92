// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;

use cli::{Cli, Commands};
use stepwise_core::Sender;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = stepwise_config::load(cli.config.as_deref()).context("loading configuration")?;
    let agent = stepwise_bootstrap::build_agent(&config).context("initializing agent")?;

    match cli.command {
        Commands::Query { text } => {
            let response = agent.process_message(&text, Sender::User, None).await;
            println!("{response}");
            Ok(())
        }
        Commands::Interactive => run_interactive(&agent).await,
    }
}

/// REPL wrapping `process_message`, preserving one `Agent` (and its Memory)
/// across turns (§6). Loops until EOF or an explicit quit command; a runtime
/// error on a single turn is reported and the loop continues.
async fn run_interactive(agent: &stepwise_core::Agent) -> anyhow::Result<()> {
    println!("Stepwise Interactive Mode");
    println!("Type 'exit' or 'quit' to end the session.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("You: ");
        io::stdout().flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("Error: {err}");
                continue;
            }
            None => {
                println!("\nGoodbye!");
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            println!("Goodbye!");
            break;
        }

        let response = agent.process_message(input, Sender::User, None).await;
        println!("Agent: {response}\n");
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
