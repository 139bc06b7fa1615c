// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use crate::config::Config;
use crate::descriptor::{self, DeploymentDescriptor};
use crate::error::Result;
use crate::handles::{self, HandleAssignment};
use crate::nodes::{MirrorPeers, NodePool};
use crate::options::{Options, RoleCounts};
use crate::topology::{self, Role, Topology};

/// Everything needed to plan a deployment: the node pool and the per-run choices.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub pool: NodePool,
    pub options: Options,
    pub counts: RoleCounts,
    pub peers: Option<MirrorPeers>,
}

/// Cluster is the resolved plan for a deployment: which node runs what, which handles each
/// server owns, and the descriptor the servers will read.
///
/// A Cluster is only ever produced by planning; once persisted, later commands work from the
/// persisted form (`state::PersistedPlan`) so nothing is recomputed.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub options: Options,
    pub topology: Topology,
    pub handles: HandleAssignment,
    pub descriptor: DeploymentDescriptor,
}

impl Cluster {
    /// Resolve roles, allocate handles and render the descriptor.
    pub fn plan(request: &PlanRequest, config: &Config) -> Result<Self> {
        let peers = request.peers.as_ref();
        let topology = topology::resolve(&request.pool, &request.options, request.counts, peers)?;
        let handles = handles::allocate(&topology, &request.options, peers)?;
        let descriptor = descriptor::render(&topology, &handles, &request.options, config);

        Ok(Cluster {
            options: request.options.clone(),
            topology,
            handles,
            descriptor,
        })
    }

    pub fn print_summary(&self) {
        print_groups(&self.topology);
        print_handles(&self.handles);
    }
}

pub fn print_groups(topology: &Topology) {
    for role in Role::ALL {
        let members = topology.members(role);
        if members.is_empty() {
            println!("{role}: <none>");
        } else {
            println!("{role}: {}", members.join(" "));
        }
    }
    if !topology.remote_nodes().is_empty() {
        println!("remote: {}", topology.remote_nodes().join(" "));
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Members of `role` split into those hosted on an OSD target and those on a transport-side
/// server.
fn split_by_host<'a>(topology: &'a Topology, role: Role) -> (Vec<&'a str>, Vec<&'a str>) {
    let osd = topology
        .servers()
        .into_iter()
        .filter(|&i| topology.contains(role, i))
        .filter(|&i| topology.contains(Role::Backend, i) || topology.contains(Role::Directory, i))
        .map(|i| topology.name(i))
        .collect();
    let pvfs = topology
        .indices(Role::Pvfs)
        .iter()
        .filter(|&&i| topology.contains(role, i))
        .map(|&i| topology.name(i))
        .collect();
    (osd, pvfs)
}

/// The human-readable deployment summary: the options, then the servers grouped by role and by
/// what hosts them, the clients, and how to point a client at the mount table. Server lines with
/// no members are left out.
pub fn summary(options: &Options, topology: &Topology, tab_file: &str) -> Vec<String> {
    let mut rows = vec![
        ("Protocol:", options.protocol.scheme().to_string()),
        ("OSDType:", options.backend.to_string()),
        ("OSDDirType:", options.dir.to_string()),
        ("Storage:", options.storage.to_string()),
        ("Meta-on-io:", yes_no(options.meta_on_io).to_string()),
        ("One config file:", yes_no(options.one_config_file).to_string()),
        ("Mirror:", options.mirror.to_string()),
    ];

    let (meta_osd, meta_pvfs) = split_by_host(topology, Role::Meta);
    let (io_osd, io_pvfs) = split_by_host(topology, Role::Io);
    for (label, members) in [
        ("Metadata servers (osd):", meta_osd),
        ("Metadata servers (pvfs):", meta_pvfs),
        ("IO servers (osd):", io_osd),
        ("IO servers (pvfs):", io_pvfs),
    ] {
        if !members.is_empty() {
            rows.push((label, members.join(" ")));
        }
    }
    rows.push(("Clients:", topology.members(Role::Compute).join(" ")));

    let mut lines: Vec<String> = rows
        .into_iter()
        .map(|(label, value)| format!("{label:<25}{value}"))
        .collect();
    lines.push(format!("export PVFS2TAB_FILE={tab_file}"));
    lines
}

pub fn print_handles(handles: &HandleAssignment) {
    for (node, range) in &handles.data {
        println!("data {node} {range}");
    }
    for (node, range) in &handles.meta {
        println!("meta {node} {range}");
    }
    println!("root {} on {}", handles.root.value, handles.root.host);
}
