// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! The state directory holds a built deployment between commands.
//!
//! Every artifact is plain text with one value or one node per line, so that `status` and `stop`
//! can reload exactly what `build` decided. There is no locking: only one invocation is
//! expected to use a state directory at a time.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::{
    cluster::Cluster,
    descriptor::DeploymentDescriptor,
    error::{PlanError, Result},
    handles::{HandleAssignment, HandleRange, RangeTable, RootHandle},
    nodes::parse_node_list,
    options::Options,
    topology::{Role, Topology},
};

const OPTIONS_FILE: &str = "options";
const POOL_FILE: &str = "nodes";
const REMOTE_FILE: &str = "remote_nodes";
const DATA_HANDLES_FILE: &str = "data_handles";
const META_HANDLES_FILE: &str = "meta_handles";
const ROOT_FILE: &str = "root_handle";
const PHASE_FILE: &str = "phase";
const SERVER_CONF_PREFIX: &str = "server.conf-";

/// Lifecycle of a deployment, as recorded in the state directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been built, or the last stop removed the artifacts.
    Unbuilt,
    /// A plan is persisted but no servers were launched from it.
    Built,
    /// Servers were launched from the persisted plan.
    Running,
    /// Servers were torn down but the plan was kept.
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Unbuilt => "unbuilt",
                Self::Built => "built",
                Self::Running => "running",
                Self::Stopped => "stopped",
            }
        )
    }
}

impl TryFrom<&str> for Phase {
    type Error = String;
    fn try_from(val: &str) -> std::result::Result<Self, Self::Error> {
        Ok(match val {
            "unbuilt" => Self::Unbuilt,
            "built" => Self::Built,
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            _ => return Err(format!("failed to parse '{val}' as a phase")),
        })
    }
}

/// What a persisted deployment reloads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPlan {
    pub options: Options,
    pub topology: Topology,
    pub handles: HandleAssignment,
}

impl From<&Cluster> for PersistedPlan {
    fn from(cluster: &Cluster) -> Self {
        PersistedPlan {
            options: cluster.options.clone(),
            topology: cluster.topology.clone(),
            handles: cluster.handles.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateDir {
    path: PathBuf,
}

impl StateDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateDir { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Path of the shared descriptor, as handed to the remote servers.
    pub fn descriptor_path(&self) -> PathBuf {
        self.file(DeploymentDescriptor::FILE_NAME)
    }

    /// Path of the client mount table.
    pub fn tab_path(&self) -> PathBuf {
        self.file(DeploymentDescriptor::TAB_FILE_NAME)
    }

    pub fn server_descriptor_path(&self, node: &str) -> PathBuf {
        self.file(&format!("{SERVER_CONF_PREFIX}{node}"))
    }

    fn bad(&self, name: &str, reason: impl Into<String>) -> PlanError {
        PlanError::State {
            path: self.file(name).display().to_string(),
            reason: reason.into(),
        }
    }

    /// A missing phase file means nothing was built.
    pub fn phase(&self) -> Result<Phase> {
        match fs::read_to_string(self.file(PHASE_FILE)) {
            Ok(contents) => {
                Phase::try_from(contents.trim()).map_err(|reason| self.bad(PHASE_FILE, reason))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Phase::Unbuilt),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_phase(&self, phase: Phase) -> Result<()> {
        fs::write(self.file(PHASE_FILE), format!("{phase}\n"))?;
        Ok(())
    }

    /// Persist a freshly planned cluster, replacing whatever was there, and mark it built.
    pub fn save(&self, cluster: &Cluster) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        self.clear()?;

        let topology = &cluster.topology;
        fs::write(self.file(OPTIONS_FILE), cluster.options.to_table())?;
        fs::write(
            self.file(POOL_FILE),
            lines(&topology.nodes()[..topology.pool_len()]),
        )?;
        fs::write(self.file(REMOTE_FILE), lines(topology.remote_nodes()))?;
        for role in Role::ALL {
            fs::write(self.file(role.name()), lines(&topology.members(role)))?;
        }

        fs::write(self.file(DATA_HANDLES_FILE), range_lines(&cluster.handles.data))?;
        fs::write(self.file(META_HANDLES_FILE), range_lines(&cluster.handles.meta))?;
        let root = &cluster.handles.root;
        fs::write(self.file(ROOT_FILE), format!("{} {}\n", root.value, root.host))?;

        fs::write(self.descriptor_path(), cluster.descriptor.to_string())?;
        for server in &cluster.descriptor.servers {
            fs::write(self.server_descriptor_path(&server.node), server.to_string())?;
        }
        fs::write(self.tab_path(), format!("{}\n", cluster.descriptor.tab_entry))?;

        self.set_phase(Phase::Built)?;
        log::info!("saved deployment to '{}'", self.path.display());
        Ok(())
    }

    /// Reload a persisted plan without recomputing anything.
    pub fn load(&self) -> Result<PersistedPlan> {
        let options = Options::from_table(&self.read(OPTIONS_FILE)?)
            .map_err(|reason| self.bad(OPTIONS_FILE, reason))?;

        let pool = parse_node_list(&self.read(POOL_FILE)?);
        let remote = parse_node_list(&self.read(REMOTE_FILE)?);
        let mut groups = Vec::new();
        for role in Role::ALL {
            groups.push((role, parse_node_list(&self.read(role.name())?)));
        }
        let topology = Topology::from_groups(pool, remote, groups)
            .map_err(|reason| self.bad(POOL_FILE, reason))?;

        let data = self.read_ranges(DATA_HANDLES_FILE)?;
        let meta = self.read_ranges(META_HANDLES_FILE)?;
        let root = self.read_root()?;

        Ok(PersistedPlan {
            options,
            topology,
            handles: HandleAssignment { data, meta, root },
        })
    }

    fn read(&self, name: &str) -> Result<String> {
        fs::read_to_string(self.file(name)).map_err(|e| self.bad(name, e.to_string()))
    }

    fn read_ranges(&self, name: &str) -> Result<RangeTable> {
        let mut table = Vec::new();
        for line in self.read(name)?.lines().filter(|l| !l.trim().is_empty()) {
            let Some((node, range)) = line.trim().split_once(' ') else {
                return Err(self.bad(name, format!("malformed line '{line}'")));
            };
            let range: HandleRange = range.parse().map_err(|reason| self.bad(name, reason))?;
            table.push((node.to_string(), range));
        }
        Ok(table)
    }

    fn read_root(&self) -> Result<RootHandle> {
        let contents = self.read(ROOT_FILE)?;
        let mut fields = contents.split_whitespace();
        let (Some(value), Some(host)) = (fields.next(), fields.next()) else {
            return Err(self.bad(ROOT_FILE, "expected '<handle> <node>'"));
        };
        let value = value
            .parse::<u64>()
            .map_err(|e| self.bad(ROOT_FILE, e.to_string()))?;
        Ok(RootHandle {
            value,
            host: host.to_string(),
        })
    }

    /// Remove every artifact this module writes. The directory itself is left in place.
    pub fn clear(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut fixed = vec![
            OPTIONS_FILE,
            POOL_FILE,
            REMOTE_FILE,
            DATA_HANDLES_FILE,
            META_HANDLES_FILE,
            ROOT_FILE,
            PHASE_FILE,
            DeploymentDescriptor::FILE_NAME,
            DeploymentDescriptor::TAB_FILE_NAME,
        ];
        fixed.extend(Role::ALL.iter().map(|r| r.name()));

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if fixed.contains(&&*name) || name.starts_with(SERVER_CONF_PREFIX) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

fn lines<S: AsRef<str>>(items: &[S]) -> String {
    items.iter().map(|s| format!("{}\n", s.as_ref())).collect()
}

fn range_lines(table: &RangeTable) -> String {
    table
        .iter()
        .map(|(node, range)| format!("{node} {range}\n"))
        .collect()
}
