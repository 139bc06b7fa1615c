// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

use std::cell::RefCell;
use std::io;

use crate::config::{Config, Programs};
use crate::nodes::NodePool;
use crate::orchestrator::Orchestrator;
use crate::remote::{BatchStatus, Launcher};
use crate::state::StateDir;

/// Given a relative `path` in the test directory, prepend the
/// full path to the test directory.
fn test_path(path: &str) -> String {
    std::env::var("CARGO_MANIFEST_DIR").unwrap() + "/tests/" + path
}

trait IgnoreEexist {
    fn ignore_eexist(self) -> Self;
}

impl IgnoreEexist for io::Result<()> {
    fn ignore_eexist(self) -> Self {
        match self {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A pool of `n` nodes named `n1` through `n<n>`.
pub fn numbered_pool(n: usize) -> NodePool {
    NodePool::new((1..=n).map(|i| format!("n{i}")))
}

/// One command a `RecordingLauncher` was asked to run. A copy is recorded as the command
/// `copy <files...> <dest>`, and a local command has no hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub hosts: Vec<String>,
    pub command: Vec<String>,
}

type FailurePredicate = Box<dyn Fn(&Invocation) -> bool>;

/// A launcher that runs nothing. It remembers every invocation, and reports failure for any
/// invocation matching a predicate registered with `fail_when`.
#[derive(Default)]
pub struct RecordingLauncher {
    invocations: RefCell<Vec<Invocation>>,
    failures: RefCell<Vec<FailurePredicate>>,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when(&self, predicate: impl Fn(&Invocation) -> bool + 'static) {
        self.failures.borrow_mut().push(Box::new(predicate));
    }

    /// Make every invocation of `program` fail.
    pub fn fail_program(&self, program: &str) {
        let program = program.to_string();
        self.fail_when(move |inv| inv.command.first() == Some(&program));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// The first word of each command run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|inv| inv.command.first().cloned().unwrap_or_default())
            .collect()
    }

    pub fn clear(&self) {
        self.invocations.borrow_mut().clear();
    }

    fn record(&self, hosts: &[String], command: Vec<String>) -> io::Result<BatchStatus> {
        let invocation = Invocation {
            hosts: hosts.to_vec(),
            command,
        };
        let failed = self.failures.borrow().iter().any(|p| p(&invocation));
        self.invocations.borrow_mut().push(invocation);
        Ok(if failed {
            BatchStatus::Failed(Some(1))
        } else {
            BatchStatus::Success
        })
    }
}

impl Launcher for RecordingLauncher {
    fn run(&self, hosts: &[String], command: &[String]) -> io::Result<BatchStatus> {
        self.record(hosts, command.to_vec())
    }

    fn copy(&self, hosts: &[String], files: &[String], dest: &str) -> io::Result<BatchStatus> {
        let mut command = vec!["copy".to_string()];
        command.extend_from_slice(files);
        command.push(dest.to_string());
        self.record(hosts, command)
    }

    fn run_local(&self, command: &[String]) -> io::Result<BatchStatus> {
        self.record(&[], command.to_vec())
    }
}

/// A TestEnvironment holds all the information needed to access a test's runtime state. This
/// includes a "private" working directory holding the node files and the state directory for the
/// test.
///
/// All access to the test's state on the filesystem should be done via methods on TestEnvironment
/// rather than coded in the tests themselves.
pub struct TestEnvironment {
    /// The path to this test's private working directory.
    private_dir_path: String,

    config: Config,
}

impl TestEnvironment {
    /// Set up an environment for a test named `test_id`.
    ///
    /// Creates a specific unique subdirectory for the test, holding its node files and its state
    /// directory.
    pub fn new(test_id: &str) -> Self {
        // Each test gets a "private" directory named after its test_id.
        let private_dir_path = test_path(&format!("test_output/{test_id}"));
        // Start by emptying out the test's private directory, so that files from a previous test
        // run don't impact this run:
        match std::fs::remove_dir_all(&private_dir_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => panic!("Could not clean up test directory: {e}"),
        };

        std::fs::create_dir(test_path("test_output"))
            .ignore_eexist()
            .unwrap();

        std::fs::create_dir(&private_dir_path).unwrap();

        let config = Config {
            nodes_file: format!("{private_dir_path}/nodes"),
            state_dir: format!("{private_dir_path}/state"),
            programs: Programs {
                pvfs_server: "test-pvfs-server".to_string(),
                osd_target: "test-osd-target".to_string(),
                initiator: "test-initiator".to_string(),
                pvfs_init: "test-pvfs-init".to_string(),
                pvfs_osd_integrated_init: "test-integrated-init".to_string(),
            },
            ..Config::default()
        };

        Self {
            private_dir_path,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state_dir(&self) -> StateDir {
        StateDir::new(&self.config.state_dir)
    }

    pub fn orchestrator<'a>(&'a self, launcher: &'a dyn Launcher) -> Orchestrator<'a> {
        Orchestrator::new(&self.config, self.state_dir(), launcher)
    }

    /// Write a node list file named `name` in the private directory and return its path.
    pub fn write_nodes(&self, name: &str, nodes: &[&str]) -> String {
        let path = format!("{}/{name}", self.private_dir_path);
        let mut contents = nodes.join("\n");
        contents.push('\n');
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write the pool file the config points at.
    pub fn write_pool(&self, nodes: &[&str]) -> String {
        self.write_nodes("nodes", nodes)
    }

    /// The path of a file inside the private directory, whether or not it exists.
    pub fn path(&self, name: &str) -> String {
        format!("{}/{name}", self.private_dir_path)
    }
}
