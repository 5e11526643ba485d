//! Remote execution of the physical-layer commands the consolidator needs on a resource's
//! own host. Commands are typed; `argv()` renders the quoted argument string used on the wire.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Command failed on the target host. The OS errno, when known, is subtracted from it.
pub const EXEC_CMD_FAILED: i32 = -149_000;
/// Target address is not served by this executor.
pub const EXEC_HOST_UNREACHABLE: i32 = -305_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum RemoteCommand {
    Mkdir { path: String, parents: bool },
    Link { src: String, dest: String },
}

impl RemoteCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::Mkdir { .. } => "mkdir",
            RemoteCommand::Link { .. } => "link",
        }
    }

    pub fn argv(&self) -> String {
        match self {
            RemoteCommand::Mkdir { path, parents: true } => format!("-p '{}'", path),
            RemoteCommand::Mkdir { path, parents: false } => format!("'{}'", path),
            RemoteCommand::Link { src, dest } => format!("'{}' '{}'", src, dest),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecRequest {
    /// Host address of the resource that owns the files.
    pub address: String,
    pub command: RemoteCommand,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("exec status {status}: {message}")]
pub struct ExecError {
    pub status: i32,
    pub message: String,
}

pub trait RemoteExecutor {
    fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, ExecError>;
}

/// Runs commands with `std::fs` for the host addresses it owns.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    hosts: Vec<String>,
}

impl LocalExecutor {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { hosts: hosts.into_iter().map(Into::into).collect() }
    }

    pub fn serves(&self, address: &str) -> bool { self.hosts.iter().any(|h| h == address) }
}

fn io_failure(cmd: &RemoteCommand, e: std::io::Error) -> ExecError {
    ExecError { status: EXEC_CMD_FAILED - e.raw_os_error().unwrap_or(0), message: format!("{} {}: {}", cmd.name(), cmd.argv(), e) }
}

impl RemoteExecutor for LocalExecutor {
    fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, ExecError> {
        if !self.serves(&req.address) {
            warn!(target: "gridvault::remote", "exec: no route to host '{}' for {}", req.address, req.command.name());
            return Err(ExecError { status: EXEC_HOST_UNREACHABLE, message: format!("host '{}' is not reachable", req.address) });
        }
        let res = match &req.command {
            RemoteCommand::Mkdir { path, parents: true } => std::fs::create_dir_all(Path::new(path)),
            RemoteCommand::Mkdir { path, parents: false } => std::fs::create_dir(Path::new(path)),
            RemoteCommand::Link { src, dest } => std::fs::hard_link(Path::new(src), Path::new(dest)),
        };
        match res {
            Ok(()) => {
                debug!(target: "gridvault::remote", "exec: {} {} on '{}'", req.command.name(), req.command.argv(), req.address);
                Ok(ExecOutput::default())
            }
            Err(e) => {
                warn!(target: "gridvault::remote", "exec: {} {} on '{}' failed: {}", req.command.name(), req.command.argv(), req.address, e);
                Err(io_failure(&req.command, e))
            }
        }
    }
}
