// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Role resolution: deciding which node runs which server role.
//!
//! A `Topology` owns a single node arena and describes each role as a list of indices into it,
//! so that roles which share physical nodes (packed layouts) share indices rather than copies
//! of the names. Index order within a role is the pool order and drives handle assignment.

use std::fmt;

use crate::error::{PlanError, Result};
use crate::nodes::{extract_tail, MirrorPeers, NodePool};
use crate::options::{BackendType, DirType, MirrorMode, Options, RoleCounts};

/// The node groups a deployment is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client nodes. Never overlaps a server role.
    Compute,
    /// OSD servers holding file data or metadata objects.
    Backend,
    /// OSD servers holding directory entries.
    Directory,
    /// Nodes owning data handle ranges.
    Io,
    /// Nodes owning metadata handle ranges.
    Meta,
    /// Nodes running the transport-side filesystem server.
    Pvfs,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Compute,
        Role::Backend,
        Role::Directory,
        Role::Io,
        Role::Meta,
        Role::Pvfs,
    ];

    pub const SERVERS: [Role; 5] = [
        Role::Backend,
        Role::Directory,
        Role::Io,
        Role::Meta,
        Role::Pvfs,
    ];

    /// Name used for this group in status output and in the state directory.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Compute => "compute",
            Role::Backend => "backend",
            Role::Directory => "directory",
            Role::Io => "io",
            Role::Meta => "meta",
            Role::Pvfs => "pvfs",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Directory backends split into the legacy in-filesystem directory and the OSD-hosted ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirClass {
    Pvfs,
    Osd,
}

impl From<DirType> for DirClass {
    fn from(dir: DirType) -> Self {
        match dir {
            DirType::Pvfs => DirClass::Pvfs,
            DirType::Attr4 | DirType::Attr1 | DirType::Obj => DirClass::Osd,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<String>,
    /// Nodes before this index come from the local pool; the rest are remote mirror nodes.
    pool_len: usize,
    compute: Vec<usize>,
    backend: Vec<usize>,
    directory: Vec<usize>,
    io: Vec<usize>,
    meta: Vec<usize>,
    pvfs: Vec<usize>,
}

impl Topology {
    /// All nodes known to this topology: the local pool followed by any remote mirror nodes.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn pool_len(&self) -> usize {
        self.pool_len
    }

    pub fn is_local(&self, index: usize) -> bool {
        index < self.pool_len
    }

    pub fn indices(&self, role: Role) -> &[usize] {
        match role {
            Role::Compute => &self.compute,
            Role::Backend => &self.backend,
            Role::Directory => &self.directory,
            Role::Io => &self.io,
            Role::Meta => &self.meta,
            Role::Pvfs => &self.pvfs,
        }
    }

    fn indices_mut(&mut self, role: Role) -> &mut Vec<usize> {
        match role {
            Role::Compute => &mut self.compute,
            Role::Backend => &mut self.backend,
            Role::Directory => &mut self.directory,
            Role::Io => &mut self.io,
            Role::Meta => &mut self.meta,
            Role::Pvfs => &mut self.pvfs,
        }
    }

    pub fn name(&self, index: usize) -> &str {
        &self.nodes[index]
    }

    /// The members of a group, in group order.
    pub fn members(&self, role: Role) -> Vec<&str> {
        self.indices(role).iter().map(|&i| self.name(i)).collect()
    }

    /// Members of a group that belong to the local pool.
    pub fn local_members(&self, role: Role) -> Vec<&str> {
        self.indices(role)
            .iter()
            .filter(|&&i| self.is_local(i))
            .map(|&i| self.name(i))
            .collect()
    }

    pub fn contains(&self, role: Role, index: usize) -> bool {
        self.indices(role).contains(&index)
    }

    pub fn is_server(&self, index: usize) -> bool {
        Role::SERVERS.iter().any(|&role| self.contains(role, index))
    }

    /// Indices of every node holding at least one server role, in arena order.
    pub fn servers(&self) -> Vec<usize> {
        (0..self.nodes.len()).filter(|&i| self.is_server(i)).collect()
    }

    /// Nodes of the arena that came from mirror lists rather than the pool.
    pub fn remote_nodes(&self) -> &[String] {
        &self.nodes[self.pool_len..]
    }

    /// Rebuild a topology from persisted group membership lists.
    pub fn from_groups(
        pool: Vec<String>,
        remote: Vec<String>,
        groups: impl IntoIterator<Item = (Role, Vec<String>)>,
    ) -> std::result::Result<Self, String> {
        let pool_len = pool.len();
        let mut nodes = pool;
        nodes.extend(remote);
        let mut topology = Topology {
            nodes,
            pool_len,
            ..Default::default()
        };
        for (role, members) in groups {
            let mut indices = Vec::with_capacity(members.len());
            for member in members {
                match topology.position(&member) {
                    Some(i) => indices.push(i),
                    None => return Err(format!("{role} member '{member}' is not a known node")),
                }
            }
            *topology.indices_mut(role) = indices;
        }
        Ok(topology)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == name)
    }

    /// Index of `name` in the arena, appending it if it isn't there yet.
    fn intern(&mut self, name: &str) -> usize {
        match self.position(name) {
            Some(i) => i,
            None => {
                self.nodes.push(name.to_string());
                self.nodes.len() - 1
            }
        }
    }

    /// Every pool node that ended up in no server group is a client.
    fn assign_compute(&mut self) {
        self.compute = (0..self.pool_len)
            .filter(|&i| !self.is_server(i))
            .collect();
    }

    fn apply_mirror(
        &mut self,
        class: DirClass,
        mirror: MirrorMode,
        peers: Option<&MirrorPeers>,
    ) -> Result<()> {
        if mirror == MirrorMode::None {
            return Ok(());
        }
        let Some(peers) = peers else {
            return Err(PlanError::InconsistentOptions(format!(
                "mirror mode '{mirror}' requires metadata and I/O node lists"
            )));
        };

        match mirror {
            MirrorMode::None | MirrorMode::DataCache => {}
            MirrorMode::RemoteMount => {
                self.replace_io(&peers.io)?;
                self.replace_meta(class, &peers.meta)?;
            }
            MirrorMode::MetaMirror => self.replace_meta(class, &peers.meta)?,
        }
        Ok(())
    }

    fn replace_io(&mut self, remote: &[String]) -> Result<()> {
        if remote.is_empty() {
            return Err(PlanError::EmptyMirrorList("io"));
        }
        let replacement: Vec<usize> = remote.iter().map(|n| self.intern(n)).collect();
        let old = std::mem::replace(&mut self.io, replacement.clone());
        self.rehost(&old, &replacement);
        Ok(())
    }

    /// For OSD directories the directory hosts keep their place at the front of the metadata
    /// group; only the remainder is swapped for the remote list.
    fn replace_meta(&mut self, class: DirClass, remote: &[String]) -> Result<()> {
        if remote.is_empty() {
            return Err(PlanError::EmptyMirrorList("meta"));
        }
        let mut replacement: Vec<usize> = match class {
            DirClass::Pvfs => Vec::new(),
            DirClass::Osd => self
                .meta
                .iter()
                .copied()
                .filter(|&i| self.directory.contains(&i))
                .collect(),
        };
        for name in remote {
            let i = self.intern(name);
            if !replacement.contains(&i) {
                replacement.push(i);
            }
        }
        let old = std::mem::replace(&mut self.meta, replacement.clone());
        self.rehost(&old, &replacement);
        Ok(())
    }

    /// Move pvfs hosting from nodes that left io/meta to the nodes that replaced them.
    fn rehost(&mut self, old: &[usize], new: &[usize]) {
        let dropped: Vec<usize> = old
            .iter()
            .copied()
            .filter(|&i| !self.io.contains(&i) && !self.meta.contains(&i))
            .collect();
        self.pvfs.retain(|i| !dropped.contains(i));

        for &i in new.iter().filter(|i| !old.contains(i)) {
            if !self.pvfs.contains(&i) {
                self.pvfs.push(i);
            }
        }
    }
}

/// Successive tail extraction over the not-yet-assigned head of the pool.
struct Carver<'a> {
    head: &'a [usize],
}

impl<'a> Carver<'a> {
    fn tail(&mut self, n: usize) -> Result<Vec<usize>> {
        let (head, tail) = extract_tail(self.head, n)?;
        self.head = head;
        Ok(tail.to_vec())
    }
}

#[derive(Default)]
struct Groups {
    backend: Vec<usize>,
    directory: Vec<usize>,
    io: Vec<usize>,
    meta: Vec<usize>,
    pvfs: Vec<usize>,
}

fn concat(a: &[usize], b: &[usize]) -> Vec<usize> {
    a.iter().chain(b.iter()).copied().collect()
}

/// Carve the server groups out of the pool according to the layout selected by the directory
/// class, the backend type and metadata packing.
fn carve(
    indices: &[usize],
    class: DirClass,
    options: &Options,
    counts: RoleCounts,
) -> Result<Groups> {
    let RoleCounts {
        num_io: io,
        num_meta: meta,
        num_dir: dir,
    } = counts;
    let mut c = Carver { head: indices };

    // Every layout takes one tail for all of its servers. OSD groups sit at the low end of that
    // tail and the pvfs-hosted servers above them.
    let groups = match (class, options.backend, options.meta_on_io) {
        (DirClass::Pvfs, BackendType::None, false) => {
            let t = c.tail(io + meta)?;
            Groups {
                io: t[..io].to_vec(),
                meta: t[io..].to_vec(),
                pvfs: t,
                ..Default::default()
            }
        }
        (DirClass::Pvfs, BackendType::None, true) => {
            let t = c.tail(io)?;
            Groups {
                io: t.clone(),
                meta: t[..meta].to_vec(),
                pvfs: t,
                ..Default::default()
            }
        }
        (DirClass::Pvfs, BackendType::Datafile, false) => {
            let t = c.tail(io + meta)?;
            let (b, p) = t.split_at(io);
            Groups {
                io: b.to_vec(),
                backend: b.to_vec(),
                meta: p.to_vec(),
                pvfs: p.to_vec(),
                ..Default::default()
            }
        }
        (DirClass::Pvfs, BackendType::Metafile, false) => {
            let t = c.tail(io + meta + dir)?;
            let (b, p) = t.split_at(io + meta);
            Groups {
                io: b[..io].to_vec(),
                meta: concat(&b[io..], p),
                backend: b.to_vec(),
                pvfs: p.to_vec(),
                ..Default::default()
            }
        }
        (DirClass::Pvfs, BackendType::Mdfile, false) => {
            let b = c.tail(io)?;
            Groups {
                io: b.clone(),
                meta: b.clone(),
                pvfs: b.clone(),
                backend: b,
                ..Default::default()
            }
        }
        (DirClass::Osd, BackendType::None, false) => {
            let t = c.tail(dir + io + meta)?;
            let (d, p) = t.split_at(dir);
            Groups {
                io: p[meta..].to_vec(),
                meta: concat(d, &p[..meta]),
                directory: d.to_vec(),
                pvfs: p.to_vec(),
                ..Default::default()
            }
        }
        (DirClass::Osd, BackendType::None, true) => {
            let t = c.tail(dir + io)?;
            let (d, p) = t.split_at(dir);
            Groups {
                io: p.to_vec(),
                meta: concat(d, &p[..meta]),
                directory: d.to_vec(),
                pvfs: p.to_vec(),
                ..Default::default()
            }
        }
        (DirClass::Osd, BackendType::Datafile, false) => {
            let t = c.tail(io + dir + meta)?;
            let (b, rest) = t.split_at(io);
            let (d, p) = rest.split_at(dir);
            Groups {
                io: b.to_vec(),
                backend: b.to_vec(),
                meta: concat(d, p),
                directory: d.to_vec(),
                pvfs: p.to_vec(),
            }
        }
        // The metadata objects live on the backend, so its metadata part hosts the directory.
        (DirClass::Osd, BackendType::Metafile, false) => {
            let b = c.tail(io + meta)?;
            Groups {
                io: b[..io].to_vec(),
                meta: b[io..].to_vec(),
                directory: b[io..].to_vec(),
                backend: b,
                pvfs: Vec::new(),
            }
        }
        (DirClass::Osd, BackendType::Mdfile, false) => {
            let b = c.tail(io)?;
            Groups {
                io: b.clone(),
                meta: b.clone(),
                directory: b.clone(),
                backend: b,
                pvfs: Vec::new(),
            }
        }
        (_, backend, true) => {
            return Err(PlanError::InconsistentOptions(format!(
                "metadata on I/O nodes requires backend 'none', got '{backend}'"
            )));
        }
    };
    Ok(groups)
}

/// Partition `pool` into compute and server groups.
///
/// `peers` carries the node lists given with a mirror flag and is required whenever
/// `options.mirror` is not `none`.
pub fn resolve(
    pool: &NodePool,
    options: &Options,
    counts: RoleCounts,
    peers: Option<&MirrorPeers>,
) -> Result<Topology> {
    options.validate()?;
    let counts = counts.normalize(options)?;
    let class = DirClass::from(options.dir);

    let indices: Vec<usize> = (0..pool.len()).collect();
    let groups = carve(&indices, class, options, counts)?;

    let mut topology = Topology {
        nodes: pool.nodes().to_vec(),
        pool_len: pool.len(),
        compute: Vec::new(),
        backend: groups.backend,
        directory: groups.directory,
        io: groups.io,
        meta: groups.meta,
        pvfs: groups.pvfs,
    };
    topology.apply_mirror(class, options.mirror, peers)?;
    topology.assign_compute();

    if topology.compute.is_empty() {
        log::warn!(
            "all {} nodes were assigned server roles; no client nodes remain",
            pool.len()
        );
    }
    log::info!(
        "resolved {} io, {} meta, {} backend, {} directory, {} compute nodes",
        topology.io.len(),
        topology.meta.len(),
        topology.backend.len(),
        topology.directory.len(),
        topology.compute.len()
    );

    Ok(topology)
}
