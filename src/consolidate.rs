//! Converges duplicate copies of a data object into one replica set under a master
//! collection.
//!
//! Per object the outcome is one of:
//! - `Moved`: no master object existed, the copy was renamed into the master collection
//! - `Linked`: checksums matched, the copy's file was hard-linked under the master path,
//!   registered as a replica of the master object and the copy unlinked
//! - `FlaggedMismatch`: checksums differ, the copy carries a marker attribute holding the
//!   master checksum
//! - `Failed`: a checksum is missing on either side; nothing was changed
//!
//! Steps are not transactional. A failure aborts at that step and leaves earlier steps in
//! place (e.g. a link without its replica registration); recovery is an administrative task.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

use crate::catalog::{in_collection_tree, Catalog, CatalogError, CollectionDriver, Condition, QueryCursor, QueryExecutor};
use crate::config::{GridConfig, DEFAULT_DIR_MODE, DEFAULT_MAX_ROWS, DEFAULT_MISMATCH_ATTRIBUTE};
use crate::error::{GridError, GridResult, MergeStep};
use crate::materialize::{ensure_parent_dirs, split_path};
use crate::remote::{ExecError, ExecRequest, RemoteCommand, RemoteExecutor};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    ChecksumUnavailable { current_missing: bool, master_missing: bool },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Moved { to: String },
    Linked { replica_path: String, physical_path: String },
    FlaggedMismatch { master_checksum: String },
    Failed(FailureReason),
}

/// A per-object failure recorded by a batch merge.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MergeFailure {
    pub obj_path: String,
    pub step: Option<MergeStep>,
    pub error: GridError,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MergeReport {
    pub moved: usize,
    pub linked: usize,
    pub flagged: usize,
    pub checksum_unavailable: usize,
    pub errors: Vec<MergeFailure>,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.moved + self.linked + self.flagged + self.checksum_unavailable + self.errors.len()
    }

    fn record(&mut self, outcome: &MergeOutcome) {
        match outcome {
            MergeOutcome::Moved { .. } => self.moved += 1,
            MergeOutcome::Linked { .. } => self.linked += 1,
            MergeOutcome::FlaggedMismatch { .. } => self.flagged += 1,
            MergeOutcome::Failed(_) => self.checksum_unavailable += 1,
        }
    }
}

fn catalog_failure(step: MergeStep, target: &str, e: CatalogError) -> GridError {
    error!(target: "gridvault::consolidate", "{} failed for '{}' status={}: {}", step, target, e.status(), e.message());
    GridError::CatalogOperation { step, target: target.to_string(), status: e.status(), message: e.message() }
}

fn remote_failure(step: MergeStep, req: &ExecRequest, e: ExecError) -> GridError {
    error!(target: "gridvault::consolidate", "{} failed on '{}' for {} {} status={}: {}", step, req.address, req.command.name(), req.command.argv(), e.status, e.message);
    GridError::RemoteOperation { step, host: req.address.clone(), status: e.status, message: e.message }
}

/// "/zoneA/archive/x" -> "/zoneA"
fn zone_root(path: &str) -> &str {
    match path[1..].find('/') {
        Some(i) => &path[..i + 1],
        None => path,
    }
}

pub struct ReplicaConsolidator<'a> {
    catalog: &'a dyn Catalog,
    exec: &'a dyn RemoteExecutor,
    mismatch_attribute: String,
    dir_mode: u32,
    page_size: i32,
}

impl<'a> ReplicaConsolidator<'a> {
    pub fn new(catalog: &'a dyn Catalog, exec: &'a dyn RemoteExecutor) -> Self {
        Self {
            catalog,
            exec,
            mismatch_attribute: DEFAULT_MISMATCH_ATTRIBUTE.to_string(),
            dir_mode: DEFAULT_DIR_MODE,
            page_size: DEFAULT_MAX_ROWS,
        }
    }

    pub fn with_config(catalog: &'a dyn Catalog, exec: &'a dyn RemoteExecutor, cfg: &GridConfig) -> Self {
        Self {
            catalog,
            exec,
            mismatch_attribute: cfg.checksum_mismatch_attribute.clone(),
            dir_mode: cfg.dir_mode,
            page_size: cfg.max_rows_per_page,
        }
    }

    pub fn mismatch_attribute(&self) -> &str { &self.mismatch_attribute }

    /// Logical path the object would have under the master collection.
    pub fn master_path(obj_path: &str, current_coll: &str, master_coll: &str) -> GridResult<String> {
        if obj_path.is_empty() || current_coll.is_empty() || master_coll.is_empty() {
            return Err(GridError::input("object path and collection names must be non-empty"));
        }
        let current = current_coll.trim_end_matches('/');
        let master = master_coll.trim_end_matches('/');
        let rel = obj_path
            .strip_prefix(current)
            .and_then(|r| r.strip_prefix('/'))
            .filter(|r| !r.is_empty())
            .ok_or_else(|| GridError::input(format!("'{}' is not inside collection '{}'", obj_path, current_coll)))?;
        if !master.starts_with('/') {
            return Err(GridError::input(format!("master collection '{}' is not absolute", master_coll)));
        }
        Ok(format!("{}/{}", master, rel))
    }

    /// Merge one object from `current_coll` into `master_coll`.
    pub fn merge(&self, obj_path: &str, current_coll: &str, master_coll: &str) -> GridResult<MergeOutcome> {
        let master_path = Self::master_path(obj_path, current_coll, master_coll)?;
        debug!(target: "gridvault::consolidate", "merge: '{}' -> '{}'", obj_path, master_path);

        let master_id = match self.catalog.object_id(&master_path) {
            Ok(id) => id,
            Err(CatalogError::NoRowsFound) => None,
            Err(e) => return Err(catalog_failure(MergeStep::Lookup, &master_path, e)),
        };
        match master_id {
            None => self.move_orphan(obj_path, &master_path),
            Some(_) => self.compare_and_merge(obj_path, &master_path),
        }
    }

    fn move_orphan(&self, obj_path: &str, master_path: &str) -> GridResult<MergeOutcome> {
        let driver = CollectionDriver::new(self.catalog);
        ensure_parent_dirs(&driver, zone_root(master_path), master_path, self.dir_mode).map_err(|e| {
            error!(target: "gridvault::consolidate", "coll_create failed for '{}': {}", master_path, e);
            GridError::CatalogOperation { step: MergeStep::CollCreate, target: master_path.to_string(), status: e.status(), message: e.to_string() }
        })?;
        self.catalog
            .rename_object(obj_path, master_path)
            .map_err(|e| catalog_failure(MergeStep::Rename, obj_path, e))?;
        info!(target: "gridvault::consolidate", "moved orphan '{}' -> '{}'", obj_path, master_path);
        Ok(MergeOutcome::Moved { to: master_path.to_string() })
    }

    fn checksum_of(&self, path: &str) -> GridResult<Option<String>> {
        self.catalog
            .checksum(path)
            .map(|c| c.filter(|s| !s.is_empty()))
            .map_err(|e| catalog_failure(MergeStep::Checksum, path, e))
    }

    fn compare_and_merge(&self, obj_path: &str, master_path: &str) -> GridResult<MergeOutcome> {
        let current_sum = self.checksum_of(obj_path)?;
        let master_sum = self.checksum_of(master_path)?;
        let (current_sum, master_sum) = match (current_sum, master_sum) {
            (Some(c), Some(m)) => (c, m),
            (c, m) => {
                warn!(target: "gridvault::consolidate", "missing checksum: '{}' present={} '{}' present={}", obj_path, c.is_some(), master_path, m.is_some());
                return Ok(MergeOutcome::Failed(FailureReason::ChecksumUnavailable {
                    current_missing: c.is_none(),
                    master_missing: m.is_none(),
                }));
            }
        };

        if current_sum == master_sum {
            self.link_into_master(obj_path, master_path)
        } else {
            self.catalog
                .set_attribute(obj_path, &self.mismatch_attribute, &master_sum)
                .map_err(|e| catalog_failure(MergeStep::SetAttribute, obj_path, e))?;
            info!(target: "gridvault::consolidate", "flagged '{}': {}={}", obj_path, self.mismatch_attribute, master_sum);
            Ok(MergeOutcome::FlaggedMismatch { master_checksum: master_sum })
        }
    }

    fn link_into_master(&self, obj_path: &str, master_path: &str) -> GridResult<MergeOutcome> {
        let current = self.catalog.object_info(obj_path).map_err(|e| catalog_failure(MergeStep::ObjectInfo, obj_path, e))?;
        let master = self.catalog.object_info(master_path).map_err(|e| catalog_failure(MergeStep::ObjectInfo, master_path, e))?;

        // The physical copy stays on the current resource, laid out like the master logical path.
        let zone_prefix = format!("/{}/", current.resource.zone);
        let suffix = master_path.strip_prefix(zone_prefix.as_str()).ok_or_else(|| {
            GridError::input(format!("'{}' is outside zone '{}' of resource '{}'", master_path, current.resource.zone, current.resource.name))
        })?;
        let physical_path = format!("{}/{}", current.resource.vault_path.trim_end_matches('/'), suffix);
        let (physical_parent, _) = split_path(&physical_path)?;
        let address = current.resource.location().to_string();

        let mkdir = ExecRequest { address: address.clone(), command: RemoteCommand::Mkdir { path: physical_parent.to_string(), parents: true } };
        self.exec.exec(&mkdir).map_err(|e| remote_failure(MergeStep::RemoteMkdir, &mkdir, e))?;

        let link = ExecRequest { address, command: RemoteCommand::Link { src: current.file_path.clone(), dest: physical_path.clone() } };
        self.exec.exec(&link).map_err(|e| remote_failure(MergeStep::RemoteLink, &link, e))?;

        let mut replica = current;
        replica.file_path = physical_path.clone();
        replica.obj_path = master_path.to_string();
        self.catalog
            .register_replica(&master, &replica)
            .map_err(|e| catalog_failure(MergeStep::RegisterReplica, &physical_path, e))?;

        self.catalog
            .unlink_object(obj_path, true)
            .map_err(|e| catalog_failure(MergeStep::Unlink, obj_path, e))?;

        info!(target: "gridvault::consolidate", "linked '{}' as replica of '{}' at '{}'", obj_path, master_path, physical_path);
        Ok(MergeOutcome::Linked { replica_path: master_path.to_string(), physical_path })
    }

    /// Merge every object below `current_coll`. The full object list is read before anything is
    /// changed. When `master_coll` lies inside `current_coll`, objects already under the master
    /// are skipped. A failing object is recorded in the report and the batch continues.
    pub fn merge_collection(&self, query: &dyn QueryExecutor, current_coll: &str, master_coll: &str) -> GridResult<MergeReport> {
        if current_coll.trim().is_empty() || master_coll.trim().is_empty() {
            return Err(GridError::input("collection names must be non-empty"));
        }
        let current = current_coll.trim_end_matches('/');
        let master = master_coll.trim_end_matches('/');
        if current == master {
            return Err(GridError::input(format!("current and master collection are both '{}'", current)));
        }

        let mut cursor = QueryCursor::new(
            vec!["COLL_NAME".to_string(), "DATA_NAME".to_string()],
            vec![Condition::in_collection("COLL_NAME", current)],
            self.page_size,
        );
        let mut paths = BTreeSet::new();
        cursor.for_each_page(query, |page| {
            for row in page.rows() {
                if let [coll, name, ..] = row.as_slice() {
                    if !in_collection_tree(coll, current) {
                        continue;
                    }
                    paths.insert(format!("{}/{}", coll.trim_end_matches('/'), name));
                }
            }
            Ok(())
        })?;

        // A master nested inside the current collection is listed too; its objects are already merged.
        let master_nested = in_collection_tree(master, current);
        let under_master = format!("{}/", master);
        let mut report = MergeReport::default();
        for path in paths.iter().filter(|p| !(master_nested && p.starts_with(&under_master))) {
            match self.merge(path, current, master) {
                Ok(outcome) => report.record(&outcome),
                Err(e) => report.errors.push(MergeFailure { obj_path: path.clone(), step: e.step(), error: e }),
            }
        }
        info!(
            target: "gridvault::consolidate",
            "merge_collection: '{}' -> '{}' moved={} linked={} flagged={} no_checksum={} errors={}",
            current, master, report.moved, report.linked, report.flagged, report.checksum_unavailable, report.errors.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "consolidate_tests.rs"]
mod consolidate_tests;
