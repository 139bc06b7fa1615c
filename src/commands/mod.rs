// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

pub mod start;
pub mod status;
pub mod stop;

use {
    start::{CountArgs, RestartArgs},
    stop::StopArgs,
};

use clap::{Args, Parser, Subcommand};

use crate::{
    cluster::PlanRequest,
    config::Config,
    nodes::{MirrorPeers, NodePool},
    options::{BackendType, DirType, MirrorMode, Options, Protocol, RoleCounts, Storage},
    orchestrator::Orchestrator,
    remote::{self, Launcher},
    state::StateDir,
};

/// A `HandledError` represents an error that has already been handled. When you call a function
/// that returns a `HandledError` or `HandledResult`, you don't need to do anything with that error,
/// other than just be aware that it happened, and return it on to your caller.
///
/// `main()` has a special responsibility: since its "caller" is, in a certain sense, the operating
/// system, `main()` must return a nonzero exit status when it gets a `HandledError`.
///
/// The primary way to construct a `HandledError` is with the `handle_err()` function, which turns a
/// generic error into a `HandledError`, and also runs some caller-provided code to handle the
/// error. That provided code would normally do something like report the error to stderr.
#[derive(Debug, PartialEq)]
pub struct HandledError {}

pub type HandledResult<T> = std::result::Result<T, HandledError>;

pub trait Handle<T, F> {
    fn handle_err(self, handler: F) -> HandledResult<T>;
}

impl<T, E, F: FnOnce(E)> Handle<T, F> for std::result::Result<T, E> {
    /// Handle an error by running the provided `handler` code, giving it the error.
    ///
    /// Then, return a `HandledResult`, so that transitive callers of this function know that they
    /// do not need to do anything further to handle the error.
    fn handle_err(self, handler: F) -> HandledResult<T> {
        self.map_err(|e| {
            handler(e);
            HandledError {}
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Plan and run a PVFS/OSD filesystem deployment", long_about = None)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Node list file; overrides the config file.
    #[arg(long, global = true)]
    pub nodes: Option<String>,

    /// State directory; overrides the config file.
    #[arg(long, global = true)]
    pub state_dir: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub plan: PlanArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// The per-run deployment choices.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(short = 'p', long, value_enum, default_value_t, global = true)]
    pub protocol: Protocol,

    #[arg(short = 'o', long, value_enum, default_value_t, global = true)]
    pub backend: BackendType,

    #[arg(short = 'd', long, value_enum, default_value_t, global = true)]
    pub dir: DirType,

    #[arg(short = 's', long, value_enum, default_value_t, global = true)]
    pub storage: Storage,

    /// Number of metadata servers.
    #[arg(short = 'm', long, default_value_t = 1, global = true)]
    pub num_meta: usize,

    /// Number of OSD directory servers.
    #[arg(short = 'n', long, default_value_t = 1, global = true)]
    pub num_dir: usize,

    /// Run the metadata servers on the I/O nodes.
    #[arg(long, global = true)]
    pub mio: bool,

    /// Write one descriptor per server next to the shared one.
    #[arg(short = '2', long, global = true)]
    pub multi_config: bool,

    #[arg(
        long,
        num_args = 2,
        value_names = ["META_NODES", "IO_NODES"],
        conflicts_with_all = ["meta_mirror", "data_cache"],
        global = true
    )]
    pub remote_mount: Option<Vec<String>>,

    #[arg(
        long,
        num_args = 2,
        value_names = ["META_NODES", "IO_NODES"],
        conflicts_with = "data_cache",
        global = true
    )]
    pub meta_mirror: Option<Vec<String>>,

    #[arg(long, num_args = 2, value_names = ["META_NODES", "IO_NODES"], global = true)]
    pub data_cache: Option<Vec<String>>,

    /// Run the filesystem server integrated with the OSD target.
    #[arg(long, global = true)]
    pub poi: bool,

    #[arg(long, global = true)]
    pub rdma: bool,
}

/// The (metadata, I/O) pair of a two-valued mirror flag.
fn files(v: &[String]) -> (&str, &str) {
    (v[0].as_str(), v[1].as_str())
}

impl PlanArgs {
    /// The mirror mode and its (metadata, I/O) node list files, if any.
    pub fn mirror(&self) -> (MirrorMode, Option<(&str, &str)>) {
        if let Some(v) = &self.remote_mount {
            (MirrorMode::RemoteMount, Some(files(v)))
        } else if let Some(v) = &self.meta_mirror {
            (MirrorMode::MetaMirror, Some(files(v)))
        } else if let Some(v) = &self.data_cache {
            (MirrorMode::DataCache, Some(files(v)))
        } else {
            (MirrorMode::None, None)
        }
    }

    pub fn options(&self) -> Options {
        Options {
            protocol: self.protocol,
            backend: self.backend,
            dir: self.dir,
            storage: self.storage,
            meta_on_io: self.mio,
            mirror: self.mirror().0,
            one_config_file: !self.multi_config,
            pvfs_osd_integrated: self.poi,
            rdma: self.rdma,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Plan a deployment and persist it without launching anything.
    Build(CountArgs),
    /// Plan, persist and launch a deployment.
    Start(CountArgs),
    /// Tear down and launch again, optionally from a new plan.
    Restart(RestartArgs),
    /// Tear down a running deployment.
    Stop(StopArgs),
    /// Show the persisted deployment.
    Status,
}

/// Assemble everything needed to plan from the command line and the config.
fn plan_request(cli: &Cli, config: &Config, num_io: usize) -> HandledResult<PlanRequest> {
    let nodes_file = cli.nodes.as_deref().unwrap_or(&config.nodes_file);
    let pool = NodePool::from_file(nodes_file).handle_err(|e| eprintln!("{e}"))?;

    let peers = match cli.plan.mirror().1 {
        Some((meta, io)) => {
            Some(MirrorPeers::from_files(meta, io).handle_err(|e| eprintln!("{e}"))?)
        }
        None => None,
    };

    Ok(PlanRequest {
        pool,
        options: cli.plan.options(),
        counts: RoleCounts::new(num_io, cli.plan.num_meta, cli.plan.num_dir),
        peers,
    })
}

/// Run a command with an already loaded config and a given launcher.
pub fn execute(cli: &Cli, config: &Config, launcher: &dyn Launcher) -> HandledResult<()> {
    let state_dir = cli.state_dir.as_deref().unwrap_or(&config.state_dir);
    let orchestrator = Orchestrator::new(config, StateDir::new(state_dir), launcher);

    match &cli.command {
        Commands::Build(args) => start::build(cli, config, &orchestrator, args),
        Commands::Start(args) => start::start(cli, config, &orchestrator, args),
        Commands::Restart(args) => start::restart(cli, config, &orchestrator, args),
        Commands::Stop(args) => stop::stop(&orchestrator, args),
        Commands::Status => status::status(&orchestrator),
    }
}

pub fn main(cli: &Cli) -> HandledResult<()> {
    let config = Config::load(cli.config.as_deref())
        .handle_err(|e| eprintln!("Could not load config: {e}"))?;

    let launcher = remote::launcher_from_config(&config.fanout)
        .handle_err(|e| eprintln!("Could not set up remote execution: {e}"))?;

    execute(cli, &config, launcher.as_ref())
}
