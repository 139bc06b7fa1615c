// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Remote execution of commands on groups of hosts.
//!
//! A batch is one command sent to a group of hosts through a `Launcher`, a set of files copied to
//! them, or a command run on this machine. The launcher returns a single aggregate status for the
//! whole group; there is no per-host result.

use std::{fmt, io};

use crate::error::DeployError;

pub mod fanout;

pub use fanout::{launcher_from_config, ProgramLauncher, SshLauncher};

/// What to do when a batch comes back with a failing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Stop the sequence and report a `RemoteBatchFailure`.
    Abort,
    /// Print a diagnostic and carry on with the next batch.
    Warn,
}

/// Aggregate exit status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    /// At least one host failed. Holds the first failing exit code, if there was one.
    Failed(Option<i32>),
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Success => write!(f, "success"),
            BatchStatus::Failed(Some(code)) => write!(f, "exit status {code}"),
            BatchStatus::Failed(None) => write!(f, "terminated by signal"),
        }
    }
}

impl From<std::process::ExitStatus> for BatchStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            BatchStatus::Success
        } else {
            BatchStatus::Failed(status.code())
        }
    }
}

/// Something that can run one command on a group of hosts and wait for all of them.
pub trait Launcher {
    fn run(&self, hosts: &[String], command: &[String]) -> io::Result<BatchStatus>;

    /// Copy local `files` into the directory `dest` on every host.
    fn copy(&self, hosts: &[String], files: &[String], dest: &str) -> io::Result<BatchStatus>;

    /// Run a command on this machine.
    fn run_local(&self, command: &[String]) -> io::Result<BatchStatus>;
}

/// What a batch does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a command on every host of the batch.
    Run(Vec<String>),
    /// Copy local files into a directory on every host of the batch.
    Copy { files: Vec<String>, dest: String },
    /// Run a command once, here. The batch has no hosts.
    Local(Vec<String>),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run(command) | Action::Local(command) => write!(f, "{}", command.join(" ")),
            Action::Copy { files, dest } => write!(f, "copy {} to {dest}", files.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub label: &'static str,
    pub hosts: Vec<String>,
    pub action: Action,
    pub on_failure: OnFailure,
}

fn host_list<S: AsRef<str>>(hosts: &[S]) -> Vec<String> {
    hosts.iter().map(|h| h.as_ref().to_string()).collect()
}

impl Batch {
    pub fn run<S: AsRef<str>>(
        label: &'static str,
        hosts: &[S],
        command: Vec<String>,
        on_failure: OnFailure,
    ) -> Self {
        Batch {
            label,
            hosts: host_list(hosts),
            action: Action::Run(command),
            on_failure,
        }
    }

    pub fn copy<S: AsRef<str>>(
        label: &'static str,
        hosts: &[S],
        files: Vec<String>,
        dest: &str,
        on_failure: OnFailure,
    ) -> Self {
        Batch {
            label,
            hosts: host_list(hosts),
            action: Action::Copy {
                files,
                dest: dest.to_string(),
            },
            on_failure,
        }
    }

    pub fn local(label: &'static str, command: Vec<String>, on_failure: OnFailure) -> Self {
        Batch {
            label,
            hosts: Vec::new(),
            action: Action::Local(command),
            on_failure,
        }
    }

    /// Where the batch runs, for diagnostics.
    fn place(&self) -> String {
        match self.action {
            Action::Local(_) => "localhost".to_string(),
            _ => self.hosts.join(","),
        }
    }
}

/// Run a batch and apply its failure policy. Remote batches with no hosts are skipped.
pub fn run_batch(launcher: &dyn Launcher, batch: &Batch) -> Result<(), DeployError> {
    let remote = !matches!(batch.action, Action::Local(_));
    if remote && batch.hosts.is_empty() {
        log::debug!("skipping '{}': no hosts", batch.label);
        return Ok(());
    }

    log::info!(
        "{}: running '{}' on {}",
        batch.label,
        batch.action,
        batch.place()
    );

    let status = match &batch.action {
        Action::Run(command) => launcher.run(&batch.hosts, command),
        Action::Copy { files, dest } => launcher.copy(&batch.hosts, files, dest),
        Action::Local(command) => launcher.run_local(command),
    }
    .map_err(|source| DeployError::Launch {
        label: batch.label,
        source,
    })?;

    match (status, batch.on_failure) {
        (BatchStatus::Success, _) => Ok(()),
        (status, OnFailure::Warn) => {
            log::warn!(
                "{} failed on [{}]: {status}; continuing",
                batch.label,
                batch.place()
            );
            Ok(())
        }
        (status, OnFailure::Abort) => Err(DeployError::RemoteBatchFailure {
            label: batch.label,
            hosts: batch.place(),
            status: status.to_string(),
        }),
    }
}
