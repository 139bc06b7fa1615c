// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::collections::HashMap;
use std::fmt;

use clap::ValueEnum;

use crate::error::PlanError;

/// The transport the filesystem servers listen on.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Ib,
    Portals,
    Auto,
}

impl Protocol {
    /// `auto` is rendered as tcp in addresses.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Tcp | Protocol::Auto => "tcp",
            Protocol::Ib => "ib",
            Protocol::Portals => "portals",
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Protocol::Ib => 3335,
            _ => 3334,
        }
    }

    pub fn bmi_module(&self) -> &'static str {
        match self {
            Protocol::Tcp | Protocol::Auto => "bmi_tcp",
            Protocol::Ib => "bmi_ib",
            Protocol::Portals => "bmi_portals",
        }
    }
}

/// What the object-storage (OSD) servers hold, if any are deployed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    #[default]
    None,
    Datafile,
    Metafile,
    Mdfile,
}

/// Where directory entries live.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirType {
    #[default]
    Pvfs,
    Attr4,
    Attr1,
    Obj,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Storage {
    #[default]
    Disk,
    Tmpfs,
}

/// Deployment variants where a group is served by, or scaled against, a remote node set.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorMode {
    #[default]
    None,
    RemoteMount,
    MetaMirror,
    DataCache,
}

macro_rules! value_enum_display {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match self.to_possible_value() {
                        Some(v) => write!(f, "{}", v.get_name()),
                        None => write!(f, "{:?}", self),
                    }
                }
            }
        )*
    };
}

value_enum_display!(Protocol, BackendType, DirType, Storage, MirrorMode);

/// Immutable configuration passed through planning and rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub protocol: Protocol,
    pub backend: BackendType,
    pub dir: DirType,
    pub storage: Storage,
    pub meta_on_io: bool,
    pub mirror: MirrorMode,
    pub one_config_file: bool,
    pub pvfs_osd_integrated: bool,
    pub rdma: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            protocol: Protocol::default(),
            backend: BackendType::default(),
            dir: DirType::default(),
            storage: Storage::default(),
            meta_on_io: false,
            mirror: MirrorMode::default(),
            one_config_file: true,
            pvfs_osd_integrated: false,
            rdma: false,
        }
    }
}

impl Options {
    /// Reject option combinations that no layout supports.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.meta_on_io && self.backend != BackendType::None {
            return Err(PlanError::InconsistentOptions(format!(
                "metadata on I/O nodes requires backend 'none', got '{}'",
                self.backend
            )));
        }
        if self.meta_on_io && self.mirror != MirrorMode::None {
            return Err(PlanError::InconsistentOptions(format!(
                "metadata on I/O nodes cannot be combined with mirror mode '{}'",
                self.mirror
            )));
        }
        Ok(())
    }

    /// True when any OSD server role is deployed.
    pub fn uses_osd(&self) -> bool {
        self.backend != BackendType::None || self.dir != DirType::Pvfs
    }

    /// Serialize into the persisted options table, one `key value` pair per line.
    pub fn to_table(&self) -> String {
        let rows = [
            ("protocol", self.protocol.to_string()),
            ("backend", self.backend.to_string()),
            ("dir", self.dir.to_string()),
            ("storage", self.storage.to_string()),
            ("meta_on_io", self.meta_on_io.to_string()),
            ("mirror", self.mirror.to_string()),
            ("one_config_file", self.one_config_file.to_string()),
            ("pvfs_osd_integrated", self.pvfs_osd_integrated.to_string()),
            ("rdma", self.rdma.to_string()),
        ];
        rows.iter()
            .map(|(k, v)| format!("{k} {v}\n"))
            .collect()
    }

    /// Parse a table written by `to_table()`. Missing keys keep their default values.
    pub fn from_table(table: &str) -> Result<Self, String> {
        let mut rows = HashMap::new();
        for line in table.lines().filter(|l| !l.trim().is_empty()) {
            let Some((key, value)) = line.trim().split_once(' ') else {
                return Err(format!("malformed options line '{line}'"));
            };
            rows.insert(key, value.trim());
        }

        let mut options = Options::default();
        for (key, value) in rows {
            match key {
                "protocol" => options.protocol = parse_value(key, value)?,
                "backend" => options.backend = parse_value(key, value)?,
                "dir" => options.dir = parse_value(key, value)?,
                "storage" => options.storage = parse_value(key, value)?,
                "mirror" => options.mirror = parse_value(key, value)?,
                "meta_on_io" => options.meta_on_io = parse_bool(key, value)?,
                "one_config_file" => options.one_config_file = parse_bool(key, value)?,
                "pvfs_osd_integrated" => options.pvfs_osd_integrated = parse_bool(key, value)?,
                "rdma" => options.rdma = parse_bool(key, value)?,
                other => return Err(format!("unknown option '{other}'")),
            }
        }
        Ok(options)
    }
}

fn parse_value<T: ValueEnum>(key: &str, value: &str) -> Result<T, String> {
    T::from_str(value, false).map_err(|_| format!("invalid value '{value}' for option '{key}'"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    value
        .parse::<bool>()
        .map_err(|_| format!("invalid value '{value}' for option '{key}'"))
}

/// Requested cardinalities for each server role. There is always exactly one config server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCounts {
    pub num_io: usize,
    pub num_meta: usize,
    pub num_dir: usize,
}

impl RoleCounts {
    pub const NUM_CONFIG: usize = 1;

    pub fn new(num_io: usize, num_meta: usize, num_dir: usize) -> Self {
        RoleCounts {
            num_io,
            num_meta,
            num_dir,
        }
    }

    /// Apply the count rules that depend on the options: `mdfile` forces one metadata server per
    /// I/O server, an OSD directory over a `metafile` backend gets one directory server per
    /// metadata server, and packing metadata onto I/O nodes cannot ask for more metadata nodes than
    /// there are I/O nodes.
    pub fn normalize(self, options: &Options) -> Result<Self, PlanError> {
        let mut counts = self;
        if options.backend == BackendType::Mdfile && counts.num_meta != counts.num_io {
            log::info!(
                "mdfile backend: forcing metadata server count from {} to {}",
                counts.num_meta,
                counts.num_io
            );
            counts.num_meta = counts.num_io;
        }
        if options.backend == BackendType::Metafile
            && options.dir != DirType::Pvfs
            && counts.num_dir != counts.num_meta
        {
            log::info!(
                "metafile backend: directory server count follows the {} metadata servers",
                counts.num_meta
            );
            counts.num_dir = counts.num_meta;
        }
        if options.meta_on_io && counts.num_meta > counts.num_io {
            return Err(PlanError::InconsistentOptions(format!(
                "cannot pack {} metadata servers onto {} I/O nodes",
                counts.num_meta, counts.num_io
            )));
        }
        Ok(counts)
    }
}
