// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod cluster;
pub mod commands;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handles;
pub mod nodes;
pub mod options;
pub mod orchestrator;
pub mod remote;
pub mod state;
pub mod test_env;
pub mod topology;

pub fn default_config_path() -> String {
    match std::env::var("PVDEPLOY_CONFIG") {
        Ok(conf) => conf,
        Err(_) => "/etc/pvdeploy/pvdeploy.toml".to_string(),
    }
}

pub fn default_nodes_file() -> String {
    match std::env::var("PVDEPLOY_NODES") {
        Ok(nodes) => nodes,
        Err(_) => "/etc/pvdeploy/nodes".to_string(),
    }
}

pub fn default_state_dir() -> String {
    match std::env::var("PVDEPLOY_STATE_DIR") {
        Ok(dir) => dir,
        Err(_) => "/var/lib/pvdeploy".to_string(),
    }
}
