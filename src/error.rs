//! Unified error model for the handle, vault, query and consolidation layers.
//! Every core operation returns `GridResult<T>`; collaborator failures are wrapped with the
//! step that produced them so partial multi-step failures can be diagnosed.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Named steps of the multi-step operations. Surfaced in errors and logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MergeStep {
    Lookup,
    CollCreate,
    Rename,
    Checksum,
    ObjectInfo,
    RemoteMkdir,
    RemoteLink,
    RegisterReplica,
    Unlink,
    SetAttribute,
    Query,
}

impl MergeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStep::Lookup => "lookup",
            MergeStep::CollCreate => "coll_create",
            MergeStep::Rename => "rename",
            MergeStep::Checksum => "checksum",
            MergeStep::ObjectInfo => "object_info",
            MergeStep::RemoteMkdir => "remote_mkdir",
            MergeStep::RemoteLink => "remote_link",
            MergeStep::RegisterReplica => "register_replica",
            MergeStep::Unlink => "unlink",
            MergeStep::SetAttribute => "set_attribute",
            MergeStep::Query => "query",
        }
    }
}

impl Display for MergeStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridError {
    #[error("out of file handles (capacity {capacity})")]
    ResourceExhaustion { capacity: usize },

    #[error("invalid handle {handle}: {reason}")]
    InvalidHandle { handle: i32, reason: String },

    #[error("security violation on '{path}': {reason}")]
    SecurityViolation { path: String, reason: String },

    #[error("{step} failed on host '{host}' (status {status}): {message}")]
    RemoteOperation { step: MergeStep, host: String, status: i32, message: String },

    #[error("{step} failed for '{target}' (status {status}): {message}")]
    CatalogOperation { step: MergeStep, target: String, status: i32, message: String },

    #[error("'{path}' exists and is not a directory")]
    NotADirectory { path: String },

    #[error("{op} failed for '{path}': {message}")]
    FileDriver { op: String, path: String, message: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("query cursor misuse: {message}")]
    QueryState { message: String },
}

impl GridError {
    pub fn code_str(&self) -> &'static str {
        match self {
            GridError::ResourceExhaustion { .. } => "out_of_file_desc",
            GridError::InvalidHandle { .. } => "bad_file_descriptor",
            GridError::SecurityViolation { .. } => "invalid_file_path",
            GridError::RemoteOperation { .. } => "remote_operation_failed",
            GridError::CatalogOperation { .. } => "catalog_operation_failed",
            GridError::NotADirectory { .. } => "not_a_directory",
            GridError::FileDriver { .. } => "file_driver_error",
            GridError::InvalidInput { .. } => "null_input",
            GridError::QueryState { .. } => "query_state",
        }
    }

    /// Numeric status in the grid's negative-status convention. Collaborator failures
    /// keep the underlying status when one was reported.
    pub fn status(&self) -> i32 {
        match self {
            GridError::ResourceExhaustion { .. } => -1_000,
            GridError::InvalidHandle { .. } => -1_100,
            GridError::SecurityViolation { .. } => -1_200,
            GridError::RemoteOperation { status, .. } | GridError::CatalogOperation { status, .. } => {
                if *status < 0 { *status } else { -1_300 }
            }
            GridError::NotADirectory { .. } => -1_400,
            GridError::FileDriver { .. } => -1_500,
            GridError::InvalidInput { .. } => -316_000,
            GridError::QueryState { .. } => -1_600,
        }
    }

    /// Step that failed, for multi-step operations.
    pub fn step(&self) -> Option<MergeStep> {
        match self {
            GridError::RemoteOperation { step, .. } | GridError::CatalogOperation { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn invalid_handle<S: Into<String>>(handle: i32, reason: S) -> Self { GridError::InvalidHandle { handle, reason: reason.into() } }
    pub fn security<S: Into<String>>(path: S, reason: S) -> Self { GridError::SecurityViolation { path: path.into(), reason: reason.into() } }
    pub fn input<S: Into<String>>(message: S) -> Self { GridError::InvalidInput { message: message.into() } }
    pub fn query_state<S: Into<String>>(message: S) -> Self { GridError::QueryState { message: message.into() } }
}

pub type GridResult<T> = Result<T, GridError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
