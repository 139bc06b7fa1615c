// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Error types for planning and deploying a filesystem.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

/// Failures that abort a deployment before any remote action is taken.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("insufficient nodes: requested {requested} servers, {available} available")]
    InsufficientNodes { requested: usize, available: usize },

    #[error("inconsistent options: {0}")]
    InconsistentOptions(String),

    #[error("could not read mirror node list '{path}': {source}")]
    MissingMirrorFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("mirror node list for {0} is empty")]
    EmptyMirrorList(&'static str),

    #[error("no metadata node can host the filesystem root")]
    NoRootCandidate,

    #[error("could not read node list '{path}': {source}")]
    NodeList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bad persisted state '{path}': {reason}")]
    State { path: String, reason: String },

    #[error("state directory I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures that can occur once remote batches are being issued.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("remote batch '{label}' failed on [{hosts}]: {status}")]
    RemoteBatchFailure {
        label: &'static str,
        hosts: String,
        status: String,
    },

    #[error("could not launch remote batch '{label}': {source}")]
    Launch {
        label: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot {action} while the deployment is {phase}")]
    Phase {
        action: &'static str,
        phase: crate::state::Phase,
    },
}
