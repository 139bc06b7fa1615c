// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Rendering of the filesystem configuration read by the remote servers.

use std::fmt::{self, Write};

use crate::config::Config;
use crate::handles::{HandleAssignment, RangeTable};
use crate::options::{BackendType, DirType, MirrorMode, Options};
use crate::topology::{Role, Topology};

/// Server tuning that is not configurable; written verbatim into every descriptor, between the
/// protocol module and the flow module lines.
const DEFAULTS: &[(&str, &str)] = &[
    ("UnexpectedRequests", "50"),
    ("EventLogging", "none"),
    ("LogStamp", "usec"),
];

const TIMEOUTS: &[(&str, &str)] = &[
    ("PerfUpdateInterval", "1000"),
    ("ServerJobBMITimeoutSecs", "30"),
    ("ServerJobFlowTimeoutSecs", "30"),
    ("ClientJobBMITimeoutSecs", "300"),
    ("ClientJobFlowTimeoutSecs", "300"),
    ("ClientRetryLimit", "5"),
    ("ClientRetryDelayMilliSecs", "2000"),
];

const FLOW_MODULE: &str = "flowproto_multiqueue";

const STORAGE_HINTS: &[(&str, &str)] = &[
    ("TroveSyncMeta", "no"),
    ("TroveSyncData", "no"),
    ("ImmediateCompletion", "yes"),
    ("CoalescingHighWatermark", "infinity"),
    ("CoalescingLowWatermark", "1"),
    ("TroveMethod", "dbpf"),
];

const FLOW_BUFFER_SIZE_BYTES: u64 = 16_777_216;

/// Every deployment uses the same filesystem id.
pub const FS_ID: u32 = 424242;

const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub node: String,
    pub address: String,
}

/// The per-node file used in multi-file mode, binding one server to its own address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub node: String,
    pub address: String,
    pub storage_space: String,
    pub log_file: String,
}

impl ServerDescriptor {
    pub fn file_name(&self) -> String {
        format!("server.conf-{}", self.node)
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StorageSpace {}", self.storage_space)?;
        writeln!(f, "HostID \"{}\"", self.address)?;
        writeln!(f, "LogFile {}", self.log_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    pub fs_name: String,
    pub fs_id: u32,
    pub bmi_module: &'static str,
    /// `OSDType` and `OSDDirType`, each present only when an OSD role of that kind is deployed.
    pub osd_types: Vec<(&'static str, String)>,
    pub is_mirror: bool,
    pub aliases: Vec<Alias>,
    pub data: RangeTable,
    pub meta: RangeTable,
    pub root_handle: u64,
    /// Storage and log settings for the shared file. `None` in multi-file mode, where each
    /// server descriptor carries its own.
    pub storage: Option<(String, String)>,
    pub servers: Vec<ServerDescriptor>,
    /// The client mount table line pointing at the root handle's host.
    pub tab_entry: String,
}

fn is_osd(topology: &Topology, index: usize) -> bool {
    topology.contains(Role::Backend, index) || topology.contains(Role::Directory, index)
}

fn transport_address(options: &Options, node: &str) -> String {
    format!(
        "{}://{}:{}",
        options.protocol.scheme(),
        node,
        options.protocol.port()
    )
}

/// Where clients mount the filesystem: `/pvfs`, suffixed with the transport unless it is tcp.
pub fn mountpoint(options: &Options) -> String {
    match options.protocol.scheme() {
        "tcp" => "/pvfs".to_string(),
        scheme => format!("/pvfs-{scheme}"),
    }
}

/// The address a server node is known by in the alias table. Backend and directory nodes are
/// OSD targets; every other server is reached through the configured transport.
fn address(topology: &Topology, options: &Options, index: usize) -> String {
    let node = topology.name(index);
    if is_osd(topology, index) {
        format!("osd://{node}")
    } else {
        transport_address(options, node)
    }
}

/// OSD nodes first, then the transport-side servers, each in arena order.
fn aliases(topology: &Topology, options: &Options) -> Vec<Alias> {
    let (osd, pvfs): (Vec<usize>, Vec<usize>) = topology
        .servers()
        .into_iter()
        .partition(|&i| is_osd(topology, i));
    osd.into_iter()
        .chain(pvfs)
        .map(|i| Alias {
            node: topology.name(i).to_string(),
            address: address(topology, options, i),
        })
        .collect()
}

fn tab_entry(topology: &Topology, handles: &HandleAssignment, options: &Options, fs: &str) -> String {
    let root = &handles.root.host;
    let root_is_osd = topology
        .nodes()
        .iter()
        .position(|n| n == root)
        .is_some_and(|i| is_osd(topology, i));
    let url = if root_is_osd {
        format!("osd://{root}/{fs}")
    } else {
        format!("{}/{fs}", transport_address(options, root))
    };
    format!("{url} {} pvfs2 defaults 0 0", mountpoint(options))
}

/// Build the descriptor for a resolved topology and its handle assignment.
pub fn render(
    topology: &Topology,
    handles: &HandleAssignment,
    options: &Options,
    config: &Config,
) -> DeploymentDescriptor {
    let mut osd_types = Vec::new();
    if options.backend != BackendType::None {
        osd_types.push(("OSDType", options.backend.to_string()));
    }
    if options.dir != DirType::Pvfs {
        osd_types.push(("OSDDirType", options.dir.to_string()));
    }

    let storage_root = config.storage.root(options.storage);
    let log_file = format!("{}/pvfs2.log", config.storage.log_dir);

    let (storage, servers) = if options.one_config_file {
        (Some((storage_root.to_string(), log_file)), Vec::new())
    } else {
        let servers = topology
            .indices(Role::Pvfs)
            .iter()
            .map(|&i| {
                let node = topology.name(i);
                ServerDescriptor {
                    node: node.to_string(),
                    address: transport_address(options, node),
                    storage_space: storage_root.to_string(),
                    log_file: log_file.clone(),
                }
            })
            .collect();
        (None, servers)
    };

    DeploymentDescriptor {
        fs_name: config.fs_name.clone(),
        fs_id: FS_ID,
        bmi_module: options.protocol.bmi_module(),
        osd_types,
        is_mirror: options.mirror != MirrorMode::None,
        aliases: aliases(topology, options),
        data: handles.data.clone(),
        meta: handles.meta.clone(),
        root_handle: handles.root.value,
        storage,
        servers,
        tab_entry: tab_entry(topology, handles, options, &config.fs_name),
    }
}

fn write_pairs(out: &mut String, depth: usize, pairs: &[(&str, &str)]) -> fmt::Result {
    for (key, value) in pairs {
        writeln!(out, "{}{key} {value}", INDENT.repeat(depth))?;
    }
    Ok(())
}

fn write_ranges(out: &mut String, section: &str, table: &RangeTable) -> fmt::Result {
    writeln!(out, "{INDENT}<{section}>")?;
    for (node, range) in table {
        writeln!(out, "{INDENT}{INDENT}Range {node} {range}")?;
    }
    writeln!(out, "{INDENT}</{section}>")
}

impl DeploymentDescriptor {
    pub const FILE_NAME: &'static str = "fs.conf";
    pub const TAB_FILE_NAME: &'static str = "pvfs2tab";

    fn write_conf(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "<Defaults>")?;
        write_pairs(out, 1, DEFAULTS)?;
        writeln!(out, "{INDENT}BMIModules {}", self.bmi_module)?;
        writeln!(out, "{INDENT}FlowModules {FLOW_MODULE}")?;
        write_pairs(out, 1, TIMEOUTS)?;
        for (key, value) in &self.osd_types {
            writeln!(out, "{INDENT}{key} {value}")?;
        }
        if let Some((space, log)) = &self.storage {
            writeln!(out, "{INDENT}StorageSpace {space}")?;
            writeln!(out, "{INDENT}LogFile {log}")?;
        }
        writeln!(out, "</Defaults>")?;
        writeln!(out)?;

        writeln!(out, "<Aliases>")?;
        for alias in &self.aliases {
            writeln!(out, "{INDENT}Alias {} {}", alias.node, alias.address)?;
        }
        writeln!(out, "</Aliases>")?;
        writeln!(out)?;

        writeln!(out, "<Filesystem>")?;
        writeln!(out, "{INDENT}Name {}", self.fs_name)?;
        writeln!(out, "{INDENT}ID {}", self.fs_id)?;
        if self.is_mirror {
            writeln!(out, "{INDENT}IsMirror 1")?;
        }
        write_ranges(out, "DataHandleRanges", &self.data)?;
        write_ranges(out, "MetaHandleRanges", &self.meta)?;
        writeln!(out, "{INDENT}RootHandle {}", self.root_handle)?;
        writeln!(out, "{INDENT}<StorageHints>")?;
        write_pairs(out, 2, STORAGE_HINTS)?;
        writeln!(out, "{INDENT}</StorageHints>")?;
        writeln!(out, "{INDENT}FlowBufferSizeBytes {FLOW_BUFFER_SIZE_BYTES}")?;
        writeln!(out, "</Filesystem>")
    }
}

impl fmt::Display for DeploymentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_conf(&mut out)?;
        f.write_str(&out)
    }
}
