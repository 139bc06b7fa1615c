// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::io;

use serde::{Deserialize, Serialize};

use crate::options::Storage;

/// Config is the site-specific part of a deployment that does not change between runs: where to
/// find the node pool, where to keep state, which server programs to launch and how to reach
/// remote hosts. The file is deserialized into a Config object; any field left out takes its
/// default.
///
/// Per-run choices (protocol, backend, counts, ...) are command line options, not config.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub nodes_file: String,
    pub state_dir: String,
    pub fs_name: String,
    /// Directory on every remote node that receives the descriptors and the client table.
    pub remote_dir: String,
    pub storage: StoragePaths,
    pub programs: Programs,
    pub fanout: Fanout,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nodes_file: crate::default_nodes_file(),
            state_dir: crate::default_state_dir(),
            fs_name: "pvfs2-fs".to_string(),
            remote_dir: "/tmp/pvdeploy".to_string(),
            storage: StoragePaths::default(),
            programs: Programs::default(),
            fanout: Fanout::default(),
        }
    }
}

impl Config {
    /// Load the config file.
    ///
    /// When no path is given the default location is tried, and a missing file there simply
    /// means defaults. A path given explicitly must exist.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let (path, explicit) = match path {
            Some(p) => (p.to_string(), true),
            None => (crate::default_config_path(), false),
        };
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !explicit => {
                log::info!("no config file at '{path}', using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                eprintln!("Could not open config file \"{path}\": {e}");
                return Err(Box::new(e));
            }
        };
        Ok(toml::from_str(&contents)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StoragePaths {
    /// Storage root on local disk.
    pub disk: String,
    /// Storage root on a memory-backed filesystem.
    pub tmpfs: String,
    pub log_dir: String,
}

impl Default for StoragePaths {
    fn default() -> Self {
        StoragePaths {
            disk: "/var/lib/pvfs2-storage".to_string(),
            tmpfs: "/dev/shm/pvfs2-storage".to_string(),
            log_dir: "/tmp".to_string(),
        }
    }
}

impl StoragePaths {
    pub fn root(&self, storage: Storage) -> &str {
        match storage {
            Storage::Disk => &self.disk,
            Storage::Tmpfs => &self.tmpfs,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Programs {
    pub pvfs_server: String,
    pub osd_target: String,
    /// iSCSI initiator control on the clients, run as `<initiator> start|stop [targets...]`.
    pub initiator: String,
    /// Formats one OSD and writes the initial filesystem layout onto it. Runs on this machine.
    pub pvfs_init: String,
    /// Formats the partition of an OSD-integrated filesystem server. Runs on this machine.
    pub pvfs_osd_integrated_init: String,
}

impl Default for Programs {
    fn default() -> Self {
        Programs {
            pvfs_server: "pvfs2-server".to_string(),
            osd_target: "tgtd".to_string(),
            initiator: "iscsi-initiator".to_string(),
            pvfs_init: "pvfs-init".to_string(),
            pvfs_osd_integrated_init: "pvfs-osd-integrated-init".to_string(),
        }
    }
}

/// How commands reach remote hosts. Without a `program`, each host of a batch is reached with
/// its own ssh (or scp) process. With one, the program is invoked once per batch as
/// `<program> <host_flag> host1,host2,... <command...>`, and files are copied with
/// `<copy_program> <host_flag> host1,host2,... <files...> <dest>`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Fanout {
    pub program: Option<String>,
    pub copy_program: String,
    pub host_flag: String,
    pub ssh: String,
    pub scp: String,
}

impl Default for Fanout {
    fn default() -> Self {
        Fanout {
            program: None,
            copy_program: "pdcp".to_string(),
            host_flag: "-w".to_string(),
            ssh: "ssh".to_string(),
            scp: "scp".to_string(),
        }
    }
}
