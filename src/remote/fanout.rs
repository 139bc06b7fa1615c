// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! Launchers that reach real hosts.

use std::{io, process::Command};

use futures::future;

use crate::config::Fanout;
use crate::remote::{BatchStatus, Launcher};

/// Run `command` on this machine and wait for it.
fn run_here(command: &[String]) -> io::Result<BatchStatus> {
    let Some((program, args)) = command.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };
    let status = Command::new(program)
        .args(args)
        .status()
        .inspect_err(|e| eprintln!("Could not run {program}: {e}"))?;
    Ok(BatchStatus::from(status))
}

/// Reaches every host of a batch with its own ssh (or scp) process. The processes of one batch
/// run concurrently on a single-threaded runtime, and the call returns once all of them exited.
pub struct SshLauncher {
    ssh: String,
    scp: String,
    rt: tokio::runtime::Runtime,
}

impl SshLauncher {
    pub fn new(ssh: &str, scp: &str) -> io::Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(SshLauncher {
            ssh: ssh.to_string(),
            scp: scp.to_string(),
            rt,
        })
    }

    /// Run one process per host and fold their exit statuses; the first failure wins.
    fn each_host(
        &self,
        hosts: &[String],
        command_for: impl Fn(&str) -> tokio::process::Command,
    ) -> io::Result<BatchStatus> {
        self.rt.block_on(async {
            let sessions = hosts.iter().map(|host| {
                let mut cmd = command_for(host);
                async move { cmd.status().await }
            });

            let mut aggregate = BatchStatus::Success;
            for status in future::join_all(sessions).await {
                let status = BatchStatus::from(status?);
                if aggregate == BatchStatus::Success {
                    aggregate = status;
                }
            }
            Ok::<_, io::Error>(aggregate)
        })
    }
}

impl Launcher for SshLauncher {
    fn run(&self, hosts: &[String], command: &[String]) -> io::Result<BatchStatus> {
        self.each_host(hosts, |host| {
            let mut ssh = tokio::process::Command::new(&self.ssh);
            ssh.arg(host).args(command);
            ssh
        })
    }

    fn copy(&self, hosts: &[String], files: &[String], dest: &str) -> io::Result<BatchStatus> {
        self.each_host(hosts, |host| {
            let mut scp = tokio::process::Command::new(&self.scp);
            scp.args(files).arg(format!("{host}:{dest}"));
            scp
        })
    }

    fn run_local(&self, command: &[String]) -> io::Result<BatchStatus> {
        run_here(command)
    }
}

/// Hands the whole batch to an external fan-out program (pdsh and the like), invoked once as
/// `<program> <host_flag> host1,host2,... <command...>`. Copies go through its companion
/// (pdcp and the like) as `<copy_program> <host_flag> host1,host2,... <files...> <dest>`.
pub struct ProgramLauncher {
    program: String,
    copy_program: String,
    host_flag: String,
}

impl ProgramLauncher {
    pub fn new(program: &str, copy_program: &str, host_flag: &str) -> Self {
        ProgramLauncher {
            program: program.to_string(),
            copy_program: copy_program.to_string(),
            host_flag: host_flag.to_string(),
        }
    }

    fn fan_out(&self, program: &str, hosts: &[String], args: &[String]) -> io::Result<BatchStatus> {
        let status = Command::new(program)
            .arg(&self.host_flag)
            .arg(hosts.join(","))
            .args(args)
            .status()
            .inspect_err(|e| eprintln!("Could not run fan-out program {program}: {e}"))?;
        Ok(BatchStatus::from(status))
    }
}

impl Launcher for ProgramLauncher {
    fn run(&self, hosts: &[String], command: &[String]) -> io::Result<BatchStatus> {
        self.fan_out(&self.program, hosts, command)
    }

    fn copy(&self, hosts: &[String], files: &[String], dest: &str) -> io::Result<BatchStatus> {
        let mut args = files.to_vec();
        args.push(dest.to_string());
        self.fan_out(&self.copy_program, hosts, &args)
    }

    fn run_local(&self, command: &[String]) -> io::Result<BatchStatus> {
        run_here(command)
    }
}

pub fn launcher_from_config(fanout: &Fanout) -> io::Result<Box<dyn Launcher>> {
    Ok(match &fanout.program {
        Some(program) => Box::new(ProgramLauncher::new(
            program,
            &fanout.copy_program,
            &fanout.host_flag,
        )),
        None => Box::new(SshLauncher::new(&fanout.ssh, &fanout.scp)?),
    })
}
