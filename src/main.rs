//! # Payment Receipts Command Line
//!
//! ```bash
//! payment-receipts generate --name Alice --amount 5000 --date 2024-01-01 --desc Rent
//! payment-receipts generate            # every row of the recipient spreadsheet
//! payment-receipts sync
//! payment-receipts verify --id R001
//! payment-receipts init-config
//! ```
//!
//! Logs go to stderr and a rolling file; the summary line of each command
//! goes to stdout. Any failure ends the process with a non-zero status.

#![expect(clippy::print_stdout)] // Allow println! in main binary

mod cli;

use anyhow::Result;
use clap::Parser as _;
use payment_receipts::logging;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();

    let config = cli::load_config(&cli.command, &cli.config)?;
    let _guard = logging::init(&config.resolved_log_dir())?;

    cli::run_command(cli.command, config, &cli.config)
}
