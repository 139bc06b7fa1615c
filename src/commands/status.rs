// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::{
    cluster::{print_handles, summary},
    commands::{Handle, HandledResult},
    descriptor::DeploymentDescriptor,
    orchestrator::Orchestrator,
};

pub fn status(orchestrator: &Orchestrator) -> HandledResult<()> {
    let status = orchestrator
        .status()
        .handle_err(|e| eprintln!("Could not get status: {e}"))?;

    println!("{:<25}{}", "Phase:", status.phase);
    if let Some(plan) = status.plan {
        let tab_file = format!(
            "{}/{}",
            orchestrator.config().remote_dir,
            DeploymentDescriptor::TAB_FILE_NAME
        );
        for line in summary(&plan.options, &plan.topology, &tab_file) {
            println!("{line}");
        }
        print_handles(&plan.handles);
    }
    Ok(())
}
