// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{
    commands::{plan_request, Cli, Handle, HandledResult},
    config::Config,
    orchestrator::Orchestrator,
};

#[derive(Args, Debug, Clone)]
pub struct CountArgs {
    /// Number of I/O servers.
    pub num_io: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RestartArgs {
    /// Number of I/O servers. Without it the persisted plan is reused.
    pub num_io: Option<usize>,
}

pub fn build(
    cli: &Cli,
    config: &Config,
    orchestrator: &Orchestrator,
    args: &CountArgs,
) -> HandledResult<()> {
    let request = plan_request(cli, config, args.num_io)?;
    let cluster = orchestrator
        .build(&request)
        .handle_err(|e| eprintln!("Could not build deployment: {e}"))?;

    if cli.verbose {
        cluster.print_summary();
    }
    Ok(())
}

pub fn start(
    cli: &Cli,
    config: &Config,
    orchestrator: &Orchestrator,
    args: &CountArgs,
) -> HandledResult<()> {
    let request = plan_request(cli, config, args.num_io)?;
    let cluster = orchestrator
        .start(&request)
        .handle_err(|e| eprintln!("Could not start deployment: {e}"))?;

    if cli.verbose {
        cluster.print_summary();
    }
    Ok(())
}

pub fn restart(
    cli: &Cli,
    config: &Config,
    orchestrator: &Orchestrator,
    args: &RestartArgs,
) -> HandledResult<()> {
    let request = match args.num_io {
        Some(num_io) => Some(plan_request(cli, config, num_io)?),
        None => None,
    };
    orchestrator
        .restart(request.as_ref())
        .handle_err(|e| eprintln!("Could not restart deployment: {e}"))
}
