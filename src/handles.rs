// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Handle space allocation.
//!
//! Every node in the I/O group owns one contiguous data handle range, and every node in the
//! metadata group owns one contiguous metadata handle range. Data ranges are laid out first,
//! starting at `BASE_HANDLE`; metadata ranges follow the end of the data span. Handles below
//! `0x10000` are reserved by the servers, so allocation never starts there.

use std::fmt;

use crate::error::{PlanError, Result};
use crate::nodes::MirrorPeers;
use crate::options::{DirType, MirrorMode, Options};
use crate::topology::{Role, Topology};

pub const BASE_HANDLE: u64 = 1_000_000;
pub const HANDLES_PER_NODE: u64 = 1_000_000;

/// An inclusive range of handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    pub start: u64,
    pub end: u64,
}

impl HandleRange {
    pub fn overlaps(&self, other: &HandleRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for HandleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl std::str::FromStr for HandleRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some((start, end)) = s.split_once('-') else {
            return Err(format!("handle range '{s}' is not of the form start-end"));
        };
        let parse = |v: &str| {
            v.parse::<u64>()
                .map_err(|e| format!("bad handle '{v}' in range '{s}': {e}"))
        };
        Ok(HandleRange {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

/// The handle of the filesystem's top-level directory and the metadata node that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootHandle {
    pub value: u64,
    pub host: String,
}

/// An ordered table of node to handle range.
pub type RangeTable = Vec<(String, HandleRange)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleAssignment {
    pub data: RangeTable,
    pub meta: RangeTable,
    pub root: RootHandle,
}

impl HandleAssignment {
    pub fn data_range(&self, node: &str) -> Option<HandleRange> {
        lookup(&self.data, node)
    }

    pub fn meta_range(&self, node: &str) -> Option<HandleRange> {
        lookup(&self.meta, node)
    }
}

fn lookup(table: &RangeTable, node: &str) -> Option<HandleRange> {
    table
        .iter()
        .find(|(name, _)| name == node)
        .map(|(_, range)| *range)
}

/// Lay out one range per node starting at `base`.
///
/// The group's span covers `peers` nodes' worth of handles. When `peers` differs from the group
/// size, the per-node step is the span divided by the group size with integer division, and the
/// last node's range is stretched to the end of the span, taking the truncated remainder.
///
/// Returns the table and the first handle after the span.
fn lay_out(topology: &Topology, role: Role, base: u64, peers: u64) -> (RangeTable, u64) {
    let members = topology.indices(role);
    if members.is_empty() {
        return (Vec::new(), base);
    }

    let span = peers * HANDLES_PER_NODE;
    let step = span / members.len() as u64;
    let last = members.len() - 1;

    let table = members
        .iter()
        .enumerate()
        .map(|(pos, &index)| {
            let start = base + pos as u64 * step;
            let end = if pos == last {
                base + span - 1
            } else {
                base + (pos as u64 + 1) * step - 1
            };
            (topology.name(index).to_string(), HandleRange { start, end })
        })
        .collect();

    (table, base + span)
}

/// Nodes that may host the root directory: the transport-side servers when the directory lives
/// in the filesystem itself, otherwise the OSD directory and backend servers.
fn root_eligible(topology: &Topology, dir: DirType, index: usize) -> bool {
    match dir {
        DirType::Pvfs => topology.contains(Role::Pvfs, index),
        DirType::Attr4 | DirType::Attr1 | DirType::Obj => {
            topology.contains(Role::Directory, index) || topology.contains(Role::Backend, index)
        }
    }
}

/// Assign data and metadata handle ranges and pick the root handle.
///
/// `peers` is consulted only for the mirror modes that rescale a group against a peer set.
pub fn allocate(
    topology: &Topology,
    options: &Options,
    peers: Option<&MirrorPeers>,
) -> Result<HandleAssignment> {
    let own_io = topology.indices(Role::Io).len();
    let own_meta = topology.indices(Role::Meta).len();

    let scaled = |own: usize, list: Option<&Vec<String>>, what: &'static str| {
        let Some(list) = list else {
            return Err(PlanError::InconsistentOptions(format!(
                "mirror mode '{}' requires the {what} peer node list",
                options.mirror
            )));
        };
        if list.is_empty() && own > 0 {
            return Err(PlanError::EmptyMirrorList(what));
        }
        Ok(list.len())
    };

    let io_peers = match options.mirror {
        MirrorMode::DataCache => scaled(own_io, peers.map(|p| &p.io), "io")?,
        _ => own_io,
    };
    let meta_peers = match options.mirror {
        MirrorMode::MetaMirror | MirrorMode::DataCache => {
            scaled(own_meta, peers.map(|p| &p.meta), "meta")?
        }
        _ => own_meta,
    };

    let (data, next) = lay_out(topology, Role::Io, BASE_HANDLE, io_peers as u64);
    let (meta, _) = lay_out(topology, Role::Meta, next, meta_peers as u64);

    let host = topology
        .indices(Role::Meta)
        .iter()
        .copied()
        .find(|&i| root_eligible(topology, options.dir, i))
        .ok_or(PlanError::NoRootCandidate)?;
    let host = topology.name(host).to_string();
    let value = lookup(&meta, &host)
        .map(|range| range.start)
        .ok_or(PlanError::NoRootCandidate)?;

    log::info!("root handle {value} hosted on {host}");

    Ok(HandleAssignment {
        data,
        meta,
        root: RootHandle { value, host },
    })
}
