// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use clap::Parser;

use pvdeploy_lib::{
    self,
    commands::{self, Cli},
};

/// The pvdeploy binary plans, launches and tears down a filesystem deployment.
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("PVDEPLOY_LOG", "warn"))
        .init();

    // Usage errors exit 1 like every other failure; help and version exit 0.
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if commands::main(&args).is_err() {
        std::process::exit(1);
    }
}
