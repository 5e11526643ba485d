//! Per-data-type object counts for a collection tree.

use std::collections::BTreeMap;
use tracing::info;

use crate::error::{GridError, GridResult};

use super::query::{in_collection_tree, Condition, QueryCursor, QueryExecutor};

/// Count the objects in `coll` and every sub-collection, keyed by data type name.
/// An empty collection yields an empty map.
pub fn collection_contents_report(exec: &dyn QueryExecutor, coll: &str, page_size: i32) -> GridResult<BTreeMap<String, u64>> {
    if coll.trim().is_empty() {
        return Err(GridError::input("collection name is empty"));
    }
    let mut cursor = QueryCursor::new(
        vec!["COLL_NAME".to_string(), "DATA_TYPE_NAME".to_string(), "DATA_ID".to_string()],
        vec![Condition::in_collection("COLL_NAME", coll)],
        page_size,
    );
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut total = 0u64;
    cursor.for_each_page(exec, |page| {
        for row in page.rows() {
            if let [row_coll, data_type, ..] = row.as_slice() {
                if !in_collection_tree(row_coll, coll) {
                    continue;
                }
                *counts.entry(data_type.to_string()).or_insert(0) += 1;
                total += 1;
            }
        }
        Ok(())
    })?;
    info!(target: "gridvault::query", "contents report: coll='{}' objects={} types={}", coll, total, counts.len());
    Ok(counts)
}
