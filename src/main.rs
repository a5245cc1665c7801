// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use clap::Parser;
use crm_session::{cli, logging};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    logging::init(cli.log_format);

    if let Err(e) = cli::run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
