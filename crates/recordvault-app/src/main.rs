// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record Vault: operator tool for the security core.
//
// Entry point. Initialises logging, resolves the data directory and config,
// opens the security service, and runs one sub-command.

mod commands;
mod services;

use std::process::ExitCode;

use recordvault_core::error::Result;
use recordvault_security::SecurityService;

use commands::{Command, USAGE};
use services::{data_dir, settings};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if matches!(args.first().map(String::as_str), None | Some("help" | "--help" | "-h")) {
        eprintln!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    let dir = data_dir::data_dir()?;
    let config = settings::load_or_init(&dir)?;
    tracing::info!(dir = %dir.display(), "Record Vault starting");

    let service = SecurityService::open(&dir, config)?;
    let mutates = command.mutates();
    let output = command.run(&service);

    if mutates {
        service.shutdown()?;
    }

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}
