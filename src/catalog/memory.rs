//! In-memory catalog backend. Implements both the query primitive (with server-side cursors)
//! and the mutation primitives. Used by tests and by the diagnostic binary.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, warn};

use crate::error::MergeStep;
use crate::materialize::split_path;

use super::query::{QueryExecutor, QueryInput, QueryOutput, CLOSE_MAX_ROWS};
use super::strcond::alternatives;
use super::{Catalog, CatalogError, DataObjectInfo, ReplicaStatus};

pub const CAT_ALREADY_EXISTS: i32 = -809_000;
pub const CAT_UNKNOWN_COLLECTION: i32 = -814_000;
pub const CAT_INVALID_ARGUMENT: i32 = -816_000;
pub const CAT_UNKNOWN_FILE: i32 = -817_000;

#[derive(Debug, Clone)]
struct ObjectRecord {
    id: i64,
    replicas: Vec<DataObjectInfo>,
    attributes: Vec<(String, String)>,
}

impl ObjectRecord {
    fn primary(&self) -> Option<&DataObjectInfo> {
        self.replicas
            .iter()
            .find(|r| r.replica_status == ReplicaStatus::Good)
            .or_else(|| self.replicas.first())
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    next_cursor: i64,
    collections: BTreeSet<String>,
    objects: BTreeMap<String, ObjectRecord>,
    cursors: HashMap<i64, VecDeque<Vec<String>>>,
    failures: HashMap<MergeStep, i32>,
    mutations: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

fn status(status: i32, message: String) -> CatalogError { CatalogError::Status { status, message } }

fn unknown_file(path: &str) -> CatalogError { status(CAT_UNKNOWN_FILE, format!("unknown data object '{}'", path)) }

fn parent_of(path: &str) -> String {
    match split_path(path) {
        Ok((parent, _)) => parent.to_string(),
        Err(_) => String::new(),
    }
}

fn leaf_of(path: &str) -> String {
    match split_path(path) {
        Ok((_, leaf)) => leaf.to_string(),
        Err(_) => path.to_string(),
    }
}

fn column_value(path: &str, rec: &ObjectRecord, column: &str) -> Option<String> {
    let primary = rec.primary();
    let v = match column.to_ascii_uppercase().as_str() {
        "COLL_NAME" => parent_of(path),
        "DATA_NAME" => leaf_of(path),
        "DATA_ID" => rec.id.to_string(),
        "DATA_TYPE_NAME" => primary.map(|r| r.data_type.clone()).unwrap_or_default(),
        "DATA_CHECKSUM" => primary.and_then(|r| r.checksum.clone()).unwrap_or_default(),
        "DATA_REPL_NUM" => primary.map(|r| r.replica_number.to_string()).unwrap_or_default(),
        "DATA_PATH" => primary.map(|r| r.file_path.clone()).unwrap_or_default(),
        "DATA_RESC_NAME" => primary.map(|r| r.resource.name.clone()).unwrap_or_default(),
        "DATA_SIZE" => primary.map(|r| r.size.to_string()).unwrap_or_default(),
        _ => return None,
    };
    Some(v)
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    s.strip_prefix('\'').and_then(|r| r.strip_suffix('\''))
}

fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

/// Evaluate one predicate (with `||` alternatives) against a value.
fn predicate_matches(predicate: &str, value: &str) -> Result<bool, CatalogError> {
    for alt in alternatives(predicate) {
        let lower = alt.to_ascii_lowercase();
        let (negate, like, operand) = if let Some(rest) = lower.strip_prefix("not like") {
            (true, true, &alt[alt.len() - rest.len()..])
        } else if let Some(rest) = lower.strip_prefix("like") {
            (false, true, &alt[alt.len() - rest.len()..])
        } else if let Some(rest) = alt.strip_prefix("<>").or_else(|| alt.strip_prefix("!=")) {
            (true, false, rest)
        } else if let Some(rest) = alt.strip_prefix('=') {
            (false, false, rest)
        } else {
            return Err(status(CAT_INVALID_ARGUMENT, format!("unsupported predicate '{}'", alt)));
        };
        let operand = unquote(operand).ok_or_else(|| status(CAT_INVALID_ARGUMENT, format!("unquoted operand in '{}'", alt)))?;
        let hit = if like {
            like_regex(operand)
                .ok_or_else(|| status(CAT_INVALID_ARGUMENT, format!("bad like pattern '{}'", operand)))?
                .is_match(value)
        } else {
            value == operand
        };
        if hit != negate {
            return Ok(true);
        }
    }
    Ok(false)
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    /// Seed a collection and all of its ancestors.
    pub fn add_collection(&self, coll: &str) {
        let mut st = self.state.write();
        Self::insert_collection_chain(&mut st, coll);
    }

    fn insert_collection_chain(st: &mut State, coll: &str) {
        let coll = coll.trim_end_matches('/');
        let mut end = 0usize;
        while end < coll.len() {
            end = coll[end + 1..].find('/').map(|i| end + 1 + i).unwrap_or(coll.len());
            st.collections.insert(coll[..end].to_string());
        }
    }

    /// Seed a data object replica, creating its collection chain. A second call with the same
    /// logical path adds another replica. Returns the object id.
    pub fn add_object(&self, info: DataObjectInfo) -> i64 {
        let mut st = self.state.write();
        Self::insert_collection_chain(&mut st, &parent_of(&info.obj_path));
        if let Some(rec) = st.objects.get_mut(&info.obj_path) {
            rec.replicas.push(info);
            return rec.id;
        }
        st.next_id += 1;
        let id = 10_000 + st.next_id;
        st.objects.insert(info.obj_path.clone(), ObjectRecord { id, replicas: vec![info], attributes: Vec::new() });
        id
    }

    /// Make every later call of the primitive behind `step` fail with `status`.
    pub fn fail_step(&self, step: MergeStep, status: i32) {
        self.state.write().failures.insert(step, status);
    }

    pub fn clear_failures(&self) { self.state.write().failures.clear(); }

    pub fn replicas(&self, obj_path: &str) -> Vec<DataObjectInfo> {
        self.state.read().objects.get(obj_path).map(|r| r.replicas.clone()).unwrap_or_default()
    }

    pub fn attributes(&self, obj_path: &str) -> Vec<(String, String)> {
        self.state.read().objects.get(obj_path).map(|r| r.attributes.clone()).unwrap_or_default()
    }

    pub fn object_paths(&self) -> Vec<String> { self.state.read().objects.keys().cloned().collect() }

    pub fn open_cursors(&self) -> usize { self.state.read().cursors.len() }

    /// Number of successful mutating calls.
    pub fn mutation_count(&self) -> usize { self.state.read().mutations }

    fn check_failure(st: &State, step: MergeStep, target: &str) -> Result<(), CatalogError> {
        match st.failures.get(&step) {
            Some(code) => {
                warn!(target: "gridvault::catalog", "{}: injected failure for '{}' status={}", step, target, code);
                Err(status(*code, format!("injected {} failure", step)))
            }
            None => Ok(()),
        }
    }

    fn matching_rows(st: &State, input: &QueryInput) -> Result<Vec<Vec<String>>, CatalogError> {
        let mut rows = Vec::new();
        'objects: for (path, rec) in st.objects.iter() {
            for cond in &input.conditions {
                let v = column_value(path, rec, &cond.column)
                    .ok_or_else(|| status(CAT_INVALID_ARGUMENT, format!("unknown column '{}'", cond.column)))?;
                if !predicate_matches(&cond.predicate, &v)? {
                    continue 'objects;
                }
            }
            let mut row = Vec::with_capacity(input.select.len());
            for col in &input.select {
                row.push(column_value(path, rec, col).ok_or_else(|| status(CAT_INVALID_ARGUMENT, format!("unknown column '{}'", col)))?);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

impl QueryExecutor for InMemoryCatalog {
    fn execute_query(&self, input: &QueryInput) -> Result<QueryOutput, CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::Query, &input.select.join(","))?;

        if input.max_rows == CLOSE_MAX_ROWS {
            let released = st.cursors.remove(&input.continue_index).is_some();
            debug!(target: "gridvault::catalog", "query: close cursor {} released={}", input.continue_index, released);
            return Ok(QueryOutput { rows: Vec::new(), continue_index: 0, attribute_count: input.select.len() });
        }
        if input.max_rows <= 0 {
            return Err(status(CAT_INVALID_ARGUMENT, format!("invalid max_rows {}", input.max_rows)));
        }
        let page = input.max_rows as usize;

        let mut pending: VecDeque<Vec<String>> = if input.continue_index > 0 {
            st.cursors
                .remove(&input.continue_index)
                .ok_or_else(|| status(CAT_INVALID_ARGUMENT, format!("unknown continuation index {}", input.continue_index)))?
        } else {
            let rows = Self::matching_rows(&st, input)?;
            if rows.is_empty() {
                return Err(CatalogError::NoRowsFound);
            }
            rows.into()
        };

        let take = page.min(pending.len());
        let rows: Vec<Vec<String>> = pending.drain(..take).collect();
        let continue_index = if pending.is_empty() {
            0
        } else {
            st.next_cursor += 1;
            let id = st.next_cursor;
            st.cursors.insert(id, pending);
            id
        };
        debug!(target: "gridvault::catalog", "query: rows={} continue_index={}", rows.len(), continue_index);
        Ok(QueryOutput { rows, continue_index, attribute_count: input.select.len() })
    }
}

impl Catalog for InMemoryCatalog {
    fn object_id(&self, obj_path: &str) -> Result<Option<i64>, CatalogError> {
        let st = self.state.read();
        Self::check_failure(&st, MergeStep::Lookup, obj_path)?;
        Ok(st.objects.get(obj_path).map(|r| r.id))
    }

    fn collection_exists(&self, coll: &str) -> Result<bool, CatalogError> {
        let st = self.state.read();
        Ok(st.collections.contains(coll.trim_end_matches('/')))
    }

    fn create_collection(&self, coll: &str) -> Result<(), CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::CollCreate, coll)?;
        let coll = coll.trim_end_matches('/');
        if st.collections.contains(coll) || st.objects.contains_key(coll) {
            return Err(status(CAT_ALREADY_EXISTS, format!("'{}' already exists", coll)));
        }
        let parent = parent_of(coll);
        if parent != "/" && !st.collections.contains(&parent) {
            return Err(status(CAT_UNKNOWN_COLLECTION, format!("parent collection '{}' does not exist", parent)));
        }
        st.collections.insert(coll.to_string());
        st.mutations += 1;
        debug!(target: "gridvault::catalog", "create_collection: '{}'", coll);
        Ok(())
    }

    fn rename_object(&self, src: &str, dest: &str) -> Result<(), CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::Rename, src)?;
        if !st.objects.contains_key(src) {
            return Err(unknown_file(src));
        }
        if st.objects.contains_key(dest) || st.collections.contains(dest) {
            return Err(status(CAT_ALREADY_EXISTS, format!("'{}' already exists", dest)));
        }
        let parent = parent_of(dest);
        if !st.collections.contains(&parent) {
            return Err(status(CAT_UNKNOWN_COLLECTION, format!("collection '{}' does not exist", parent)));
        }
        if let Some(mut rec) = st.objects.remove(src) {
            for r in rec.replicas.iter_mut() {
                r.obj_path = dest.to_string();
            }
            st.objects.insert(dest.to_string(), rec);
        }
        st.mutations += 1;
        debug!(target: "gridvault::catalog", "rename_object: '{}' -> '{}'", src, dest);
        Ok(())
    }

    fn unlink_object(&self, obj_path: &str, force: bool) -> Result<(), CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::Unlink, obj_path)?;
        if st.objects.remove(obj_path).is_none() {
            return Err(unknown_file(obj_path));
        }
        st.mutations += 1;
        debug!(target: "gridvault::catalog", "unlink_object: '{}' force={}", obj_path, force);
        Ok(())
    }

    fn checksum(&self, obj_path: &str) -> Result<Option<String>, CatalogError> {
        let st = self.state.read();
        Self::check_failure(&st, MergeStep::Checksum, obj_path)?;
        let rec = st.objects.get(obj_path).ok_or_else(|| unknown_file(obj_path))?;
        Ok(rec.primary().and_then(|r| r.checksum.clone()).filter(|c| !c.is_empty()))
    }

    fn object_info(&self, obj_path: &str) -> Result<DataObjectInfo, CatalogError> {
        let st = self.state.read();
        Self::check_failure(&st, MergeStep::ObjectInfo, obj_path)?;
        st.objects
            .get(obj_path)
            .and_then(|r| r.primary().cloned())
            .ok_or_else(|| unknown_file(obj_path))
    }

    fn register_replica(&self, src: &DataObjectInfo, dest: &DataObjectInfo) -> Result<(), CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::RegisterReplica, &dest.obj_path)?;
        if src.obj_path != dest.obj_path {
            return Err(status(CAT_INVALID_ARGUMENT, format!("replica path '{}' differs from '{}'", dest.obj_path, src.obj_path)));
        }
        let rec = st.objects.get_mut(&src.obj_path).ok_or_else(|| unknown_file(&src.obj_path))?;
        if rec.replicas.iter().any(|r| r.file_path == dest.file_path && r.resource.name == dest.resource.name) {
            return Err(status(CAT_ALREADY_EXISTS, format!("replica at '{}' already registered", dest.file_path)));
        }
        let mut replica = dest.clone();
        replica.replica_number = rec.replicas.iter().map(|r| r.replica_number).max().unwrap_or(-1) + 1;
        replica.modify_time = chrono::Utc::now().timestamp();
        debug!(target: "gridvault::catalog", "register_replica: '{}' repl={} path='{}'", replica.obj_path, replica.replica_number, replica.file_path);
        rec.replicas.push(replica);
        st.mutations += 1;
        Ok(())
    }

    fn set_attribute(&self, obj_path: &str, name: &str, value: &str) -> Result<(), CatalogError> {
        let mut st = self.state.write();
        Self::check_failure(&st, MergeStep::SetAttribute, obj_path)?;
        let rec = st.objects.get_mut(obj_path).ok_or_else(|| unknown_file(obj_path))?;
        rec.attributes.push((name.to_string(), value.to_string()));
        st.mutations += 1;
        debug!(target: "gridvault::catalog", "set_attribute: '{}' {}={}", obj_path, name, value);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
