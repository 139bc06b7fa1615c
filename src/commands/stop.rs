// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Args;

use crate::{
    commands::{Handle, HandledResult},
    orchestrator::Orchestrator,
};

#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    /// Keep the persisted plan so that `restart` can reuse it.
    #[arg(long)]
    pub keep: bool,
}

pub fn stop(orchestrator: &Orchestrator, args: &StopArgs) -> HandledResult<()> {
    let phase = orchestrator
        .stop(args.keep)
        .handle_err(|e| eprintln!("Could not stop deployment: {e}"))?;
    log::info!("deployment is now {phase}");
    Ok(())
}
