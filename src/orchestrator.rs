// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Sequencing of build, start, stop, restart and status over a state directory.
//!
//! The only I/O against other machines happens here, through a `Launcher`. Each batch carries
//! its own failure policy. Distributing the descriptors, starting the OSD targets and starting
//! the servers abort the sequence when they fail. Everything else only prints a diagnostic:
//! storage preparation and creation, client setup, the initiators, the OSD layout and
//! integrated-server initialization, and every teardown batch.

use crate::{
    cluster::{Cluster, PlanRequest},
    config::Config,
    descriptor::{DeploymentDescriptor, FS_ID},
    error::DeployError,
    options::{Options, Storage},
    remote::{run_batch, Batch, Launcher, OnFailure},
    state::{Phase, PersistedPlan, StateDir},
    topology::{Role, Topology},
};

pub struct Orchestrator<'a> {
    config: &'a Config,
    state: StateDir,
    launcher: &'a dyn Launcher,
}

/// What `status` reports.
#[derive(Debug)]
pub struct Status {
    pub phase: Phase,
    pub plan: Option<PersistedPlan>,
}

/// Local server nodes of any role, deduplicated, in arena order.
fn local_servers(topology: &Topology) -> Vec<&str> {
    topology
        .servers()
        .into_iter()
        .filter(|&i| topology.is_local(i))
        .map(|i| topology.name(i))
        .collect()
}

/// Local nodes running an OSD target, deduplicated, in arena order.
fn local_osds(topology: &Topology) -> Vec<&str> {
    topology
        .servers()
        .into_iter()
        .filter(|&i| topology.is_local(i))
        .filter(|&i| topology.contains(Role::Backend, i) || topology.contains(Role::Directory, i))
        .map(|i| topology.name(i))
        .collect()
}

/// The name a node's target is reached by over the RDMA fabric.
fn ib_name(node: &str) -> String {
    if node.contains("opt") {
        node.replacen("opt", "opt-ib-", 1)
    } else {
        format!("{node}-ib")
    }
}

/// The targets the client initiators log in to: every local OSD, plus the integrated servers.
fn initiator_targets(topology: &Topology, options: &Options) -> Vec<String> {
    let mut targets: Vec<&str> = local_osds(topology);
    if options.pvfs_osd_integrated {
        for node in topology.local_members(Role::Pvfs) {
            if !targets.contains(&node) {
                targets.push(node);
            }
        }
    }
    targets
        .into_iter()
        .map(|n| if options.rdma { ib_name(n) } else { n.to_string() })
        .collect()
}

fn words(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, state: StateDir, launcher: &'a dyn Launcher) -> Self {
        Orchestrator {
            config,
            state,
            launcher,
        }
    }

    pub fn state(&self) -> &StateDir {
        &self.state
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Plan a deployment and persist it. Unbuilt, Built or Stopped become Built.
    pub fn build(&self, request: &PlanRequest) -> Result<Cluster, DeployError> {
        let phase = self.state.phase()?;
        if phase == Phase::Running {
            return Err(DeployError::Phase {
                action: "build",
                phase,
            });
        }
        let cluster = Cluster::plan(request, self.config)?;
        self.state.save(&cluster)?;
        Ok(cluster)
    }

    /// Build and launch. Refused while the deployment is running.
    pub fn start(&self, request: &PlanRequest) -> Result<Cluster, DeployError> {
        let cluster = self.build(request)?;
        self.launch()?;
        Ok(cluster)
    }

    /// Tear down if running, then launch again: from a new plan when `request` is given,
    /// otherwise from the persisted one.
    pub fn restart(&self, request: Option<&PlanRequest>) -> Result<(), DeployError> {
        let phase = self.state.phase()?;
        if phase == Phase::Running {
            self.teardown()?;
            self.state.set_phase(Phase::Stopped)?;
        }
        match request {
            Some(request) => {
                self.build(request)?;
            }
            None if phase == Phase::Unbuilt => {
                return Err(DeployError::Phase {
                    action: "restart without an I/O server count",
                    phase,
                });
            }
            None => {}
        }
        self.launch()
    }

    /// Tear down the servers. Without `keep` the persisted artifacts are removed as well.
    pub fn stop(&self, keep: bool) -> Result<Phase, DeployError> {
        let phase = self.state.phase()?;
        if phase == Phase::Unbuilt {
            return Err(DeployError::Phase {
                action: "stop",
                phase,
            });
        }
        self.teardown()?;
        if keep {
            self.state.set_phase(Phase::Stopped)?;
            Ok(Phase::Stopped)
        } else {
            self.state.clear()?;
            Ok(Phase::Unbuilt)
        }
    }

    /// Reload whatever is persisted. Nothing is recomputed.
    pub fn status(&self) -> Result<Status, DeployError> {
        let phase = self.state.phase()?;
        let plan = match phase {
            Phase::Unbuilt => None,
            _ => Some(self.state.load()?),
        };
        Ok(Status { phase, plan })
    }

    fn launch(&self) -> Result<(), DeployError> {
        let plan = self.state.load()?;
        for batch in self.launch_batches(&plan) {
            run_batch(self.launcher, &batch)?;
        }
        self.state.set_phase(Phase::Running)?;
        Ok(())
    }

    fn teardown(&self) -> Result<(), DeployError> {
        let plan = self.state.load()?;
        for batch in self.teardown_batches(&plan) {
            run_batch(self.launcher, &batch)?;
        }
        Ok(())
    }

    /// The batches that bring a persisted plan up, in order.
    pub fn launch_batches(&self, plan: &PersistedPlan) -> Vec<Batch> {
        let topology = &plan.topology;
        let options = &plan.options;
        let programs = &self.config.programs;
        let remote_dir = &self.config.remote_dir;
        let storage = self.config.storage.root(options.storage);
        let conf = self.state.descriptor_path().display().to_string();
        let remote_conf = format!("{remote_dir}/{}", DeploymentDescriptor::FILE_NAME);
        let pvfs = topology.local_members(Role::Pvfs);
        let osds = local_osds(topology);
        let clients = topology.members(Role::Compute);

        let mut batches = vec![Batch::run(
            "prepare storage",
            &local_servers(topology),
            words(&["mkdir", "-p", remote_dir, storage]),
            OnFailure::Warn,
        )];

        if options.one_config_file {
            batches.push(Batch::copy(
                "distribute descriptors",
                &pvfs,
                vec![conf.clone()],
                remote_dir,
                OnFailure::Abort,
            ));
        } else {
            for node in &pvfs {
                let server_conf = self.state.server_descriptor_path(node).display().to_string();
                batches.push(Batch::copy(
                    "distribute descriptors",
                    &[node],
                    vec![conf.clone(), server_conf],
                    remote_dir,
                    OnFailure::Abort,
                ));
            }
        }

        batches.push(Batch::run(
            "start osd targets",
            &osds,
            words(&[&programs.osd_target, &format!("{storage}/osd")]),
            OnFailure::Abort,
        ));

        if options.one_config_file {
            batches.push(Batch::run(
                "create storage space",
                &pvfs,
                words(&[&programs.pvfs_server, "--mkfs", &remote_conf]),
                OnFailure::Warn,
            ));
            batches.push(Batch::run(
                "start servers",
                &pvfs,
                words(&[&programs.pvfs_server, &remote_conf]),
                OnFailure::Abort,
            ));
        } else {
            // Each server reads its own descriptor, so each gets its own batch.
            for node in &pvfs {
                let server_conf = format!("{remote_dir}/server.conf-{node}");
                batches.push(Batch::run(
                    "create storage space",
                    &[node],
                    words(&[&programs.pvfs_server, "--mkfs", &remote_conf, &server_conf]),
                    OnFailure::Warn,
                ));
                batches.push(Batch::run(
                    "start servers",
                    &[node],
                    words(&[&programs.pvfs_server, &remote_conf, &server_conf]),
                    OnFailure::Abort,
                ));
            }
        }

        batches.push(Batch::run(
            "prepare clients",
            &clients,
            words(&["mkdir", "-p", remote_dir]),
            OnFailure::Warn,
        ));
        batches.push(Batch::copy(
            "distribute client table",
            &clients,
            vec![self.state.tab_path().display().to_string()],
            remote_dir,
            OnFailure::Warn,
        ));

        let targets = initiator_targets(topology, options);
        if !targets.is_empty() {
            let mut command = words(&[&programs.initiator, "start"]);
            if options.rdma {
                command.push("--rdma".to_string());
            }
            command.extend(targets);
            batches.push(Batch::run(
                "start initiators",
                &clients,
                command,
                OnFailure::Warn,
            ));
        }

        // Laying out the OSDs needs the initiator sessions, so it runs here, after the clients.
        let root = &plan.handles.root;
        for node in &osds {
            let data = plan.handles.data_range(node).map_or(0, |r| r.start);
            let meta = plan.handles.meta_range(node).map_or(0, |r| r.start);
            let mut command = vec![
                programs.pvfs_init.clone(),
                node.to_string(),
                data.to_string(),
                meta.to_string(),
            ];
            if meta == root.value {
                command.push(root.value.to_string());
                command.push(conf.clone());
            }
            batches.push(Batch::local("initialize osd layout", command, OnFailure::Warn));
        }

        if options.pvfs_osd_integrated {
            for node in &pvfs {
                batches.push(Batch::local(
                    "initialize integrated servers",
                    words(&[&programs.pvfs_osd_integrated_init, node, &FS_ID.to_string()]),
                    OnFailure::Warn,
                ));
            }
        }
        batches
    }

    /// The batches that take a persisted plan down, in order.
    pub fn teardown_batches(&self, plan: &PersistedPlan) -> Vec<Batch> {
        let topology = &plan.topology;
        let programs = &self.config.programs;
        let remote_dir = &self.config.remote_dir;
        let clients = topology.members(Role::Compute);

        let mut batches = Vec::new();
        if !initiator_targets(topology, &plan.options).is_empty() {
            batches.push(Batch::run(
                "stop initiators",
                &clients,
                words(&[&programs.initiator, "stop"]),
                OnFailure::Warn,
            ));
        }
        batches.extend([
            Batch::run(
                "remove client table",
                &clients,
                words(&[
                    "rm",
                    "-f",
                    &format!("{remote_dir}/{}", DeploymentDescriptor::TAB_FILE_NAME),
                ]),
                OnFailure::Warn,
            ),
            Batch::run(
                "stop osd targets",
                &local_osds(topology),
                words(&["pkill", "-f", &programs.osd_target]),
                OnFailure::Warn,
            ),
            Batch::run(
                "stop servers",
                &topology.local_members(Role::Pvfs),
                words(&["pkill", "-f", &programs.pvfs_server]),
                OnFailure::Warn,
            ),
            Batch::run(
                "remove descriptors",
                &local_servers(topology),
                words(&["rm", "-rf", remote_dir]),
                OnFailure::Warn,
            ),
        ]);

        if plan.options.storage == Storage::Tmpfs {
            let storage = self.config.storage.root(Storage::Tmpfs);
            batches.push(Batch::run(
                "remove storage",
                &local_servers(topology),
                words(&["rm", "-rf", storage]),
                OnFailure::Warn,
            ));
        }
        batches
    }
}
