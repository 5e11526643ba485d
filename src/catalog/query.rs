//! Paginated catalog queries.
//!
//! A cursor moves `Idle -> Open -> {Open, Closed}`. The continuation index returned by the
//! backend is opaque: `> 0` means rows remain server-side, `0` means exhausted. A cursor left
//! `Open` must either be advanced to exhaustion or closed; closing sends one final request
//! with `max_rows = -1` so the backend can release its state.
//!
//! Each page is returned as owned storage. Callers that keep pages around are expected to
//! drop the previous page before advancing, the same as with a single shared result buffer.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GridError, GridResult, MergeStep};

use super::CatalogError;

/// `max_rows` value that tells the backend to release an open cursor.
pub const CLOSE_MAX_ROWS: i32 = -1;

/// `COLUMN <predicate>`, e.g. `COLL_NAME = '/zoneA/home'` or `DATA_NAME like 'x%'`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub predicate: String,
}

impl Condition {
    pub fn new(column: &str, predicate: &str) -> Self {
        Self { column: column.to_string(), predicate: predicate.to_string() }
    }

    pub fn eq(column: &str, value: &str) -> Self {
        Self::new(column, &format!("= '{}'", value))
    }

    /// Matches a collection and everything below it.
    pub fn in_collection(column: &str, coll: &str) -> Self {
        let coll = coll.trim_end_matches('/');
        Self::new(column, &format!("= '{}' || like '{}/%'", coll, coll))
    }
}

/// True when collection `coll` is `root` or lies below it. `like` treats `_` and `%` in a
/// collection name as wildcards, so rows from an `in_collection` query are re-checked with this.
pub fn in_collection_tree(coll: &str, root: &str) -> bool {
    let coll = coll.trim_end_matches('/');
    let root = root.trim_end_matches('/');
    match coll.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Input of one call to the query primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryInput {
    pub select: Vec<String>,
    pub conditions: Vec<Condition>,
    pub max_rows: i32,
    pub continue_index: i64,
}

/// Output of one call to the query primitive. Rows hold one value per selected column.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryOutput {
    pub rows: Vec<Vec<String>>,
    pub continue_index: i64,
    pub attribute_count: usize,
}

/// The stateless query primitive offered by the catalog.
pub trait QueryExecutor {
    fn execute_query(&self, input: &QueryInput) -> Result<QueryOutput, CatalogError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Page {
    pub fn row_count(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn rows(&self) -> &[Vec<String>] { &self.rows }

    pub fn into_rows(self) -> Vec<Vec<String>> { self.rows }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let ci = self.column_index(column)?;
        self.rows.get(row)?.get(ci).map(|s| s.as_str())
    }

    /// Values of one column across the page.
    pub fn column(&self, column: &str) -> Vec<&str> {
        match self.column_index(column) {
            Some(ci) => self.rows.iter().filter_map(|r| r.get(ci).map(|s| s.as_str())).collect(),
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    Idle,
    Open,
    Closed,
}

/// One logical catalog query, owned by the request that created it.
#[derive(Debug, Clone)]
pub struct QueryCursor {
    select: Vec<String>,
    conditions: Vec<Condition>,
    page_size: i32,
    max_rows: i32,
    continue_index: i64,
    attribute_count: usize,
    row_count: usize,
    state: CursorState,
}

impl QueryCursor {
    pub fn new(select: Vec<String>, conditions: Vec<Condition>, page_size: i32) -> Self {
        Self {
            select,
            conditions,
            page_size,
            max_rows: page_size,
            continue_index: 0,
            attribute_count: 0,
            row_count: 0,
            state: CursorState::Idle,
        }
    }

    pub fn state(&self) -> CursorState { self.state }
    pub fn continue_index(&self) -> i64 { self.continue_index }
    /// Continuation index rendered as text, for rule conditions that compare strings.
    pub fn continuation_token(&self) -> String { self.continue_index.to_string() }
    pub fn attribute_count(&self) -> usize { self.attribute_count }
    /// Rows in the last page fetched.
    pub fn row_count(&self) -> usize { self.row_count }
    pub fn max_rows(&self) -> i32 { self.max_rows }
    pub fn page_size(&self) -> i32 { self.page_size }
    pub fn select(&self) -> &[String] { &self.select }
    pub fn conditions(&self) -> &[Condition] { &self.conditions }

    fn input(&self) -> QueryInput {
        QueryInput {
            select: self.select.clone(),
            conditions: self.conditions.clone(),
            max_rows: self.max_rows,
            continue_index: self.continue_index,
        }
    }

    fn describe(&self) -> String { self.select.join(",") }

    fn run(&mut self, exec: &dyn QueryExecutor) -> GridResult<Option<Page>> {
        match exec.execute_query(&self.input()) {
            Ok(out) => {
                self.continue_index = out.continue_index.max(0);
                self.attribute_count = out.attribute_count;
                self.row_count = out.rows.len();
                self.state = if self.continue_index > 0 { CursorState::Open } else { CursorState::Closed };
                debug!(target: "gridvault::query", "page: select={} rows={} continue_index={}", self.describe(), self.row_count, self.continue_index);
                Ok(Some(Page { columns: self.select.clone(), rows: out.rows }))
            }
            Err(CatalogError::NoRowsFound) => {
                self.continue_index = 0;
                self.row_count = 0;
                self.state = CursorState::Closed;
                debug!(target: "gridvault::query", "page: select={} no rows found", self.describe());
                Ok(None)
            }
            Err(e) => {
                warn!(target: "gridvault::query", "page: select={} failed: {}", self.describe(), e);
                Err(GridError::CatalogOperation { step: MergeStep::Query, target: self.describe(), status: e.status(), message: e.message() })
            }
        }
    }

    /// Run the first page. `Ok(None)` is the empty-result outcome, not a failure.
    pub fn execute(&mut self, exec: &dyn QueryExecutor) -> GridResult<Option<Page>> {
        if self.state != CursorState::Idle {
            return Err(GridError::query_state(format!("execute on a {:?} cursor", self.state)));
        }
        if self.select.is_empty() {
            return Err(GridError::input("query has no select columns"));
        }
        self.max_rows = self.page_size;
        self.continue_index = 0;
        self.run(exec)
    }

    /// Fetch the next page of an open cursor.
    pub fn fetch_next(&mut self, exec: &dyn QueryExecutor) -> GridResult<Option<Page>> {
        if self.state != CursorState::Open {
            return Err(GridError::query_state(format!("fetch_next on a {:?} cursor", self.state)));
        }
        self.max_rows = self.page_size;
        self.run(exec)
    }

    /// Release server-side state of an open cursor. The cursor is closed afterwards even if
    /// the release request itself fails.
    pub fn close(&mut self, exec: &dyn QueryExecutor) -> GridResult<()> {
        if self.state != CursorState::Open {
            return Err(GridError::query_state(format!("close on a {:?} cursor", self.state)));
        }
        self.max_rows = CLOSE_MAX_ROWS;
        let res = exec.execute_query(&self.input());
        self.state = CursorState::Closed;
        self.continue_index = 0;
        self.row_count = 0;
        match res {
            Ok(_) | Err(CatalogError::NoRowsFound) => Ok(()),
            Err(e) => {
                warn!(target: "gridvault::query", "close: select={} release failed: {}", self.describe(), e);
                Err(GridError::CatalogOperation { step: MergeStep::Query, target: self.describe(), status: e.status(), message: e.message() })
            }
        }
    }

    /// Drive the cursor to exhaustion, handing each page to `f`. If `f` or a page fetch fails,
    /// an open cursor is closed before the error is returned. Returns the number of rows seen.
    pub fn for_each_page<F>(&mut self, exec: &dyn QueryExecutor, mut f: F) -> GridResult<usize>
    where
        F: FnMut(&Page) -> GridResult<()>,
    {
        let mut total = 0usize;
        let mut next = self.execute(exec)?;
        while let Some(page) = next.take() {
            total += page.row_count();
            if let Err(e) = f(&page) {
                if self.state == CursorState::Open {
                    let _ = self.close(exec);
                }
                return Err(e);
            }
            drop(page);
            if self.state != CursorState::Open {
                break;
            }
            next = match self.fetch_next(exec) {
                Ok(page) => page,
                Err(e) => {
                    if self.state == CursorState::Open {
                        let _ = self.close(exec);
                    }
                    return Err(e);
                }
            };
        }
        Ok(total)
    }

    /// Collect every row of the query.
    pub fn collect_rows(&mut self, exec: &dyn QueryExecutor) -> GridResult<Vec<Vec<String>>> {
        let mut out = Vec::new();
        self.for_each_page(exec, |page| {
            out.extend(page.rows().iter().cloned());
            Ok(())
        })?;
        Ok(out)
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod query_tests;
