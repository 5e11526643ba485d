//! Catalog collaborator surface: data object records, the mutation primitives the
//! consolidator drives, and the paginated query protocol layered over the query primitive.

pub mod query;
pub mod strcond;
pub mod memory;
pub mod report;

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::fsdriver::{FileDriver, FileStat};
use crate::resources::Resource;

pub use query::{in_collection_tree, Condition, CursorState, Page, QueryCursor, QueryExecutor, QueryInput, QueryOutput, CLOSE_MAX_ROWS};
pub use strcond::make_query;
pub use memory::InMemoryCatalog;
pub use report::collection_contents_report;

/// Catalog status for "query matched nothing".
pub const CAT_NO_ROWS_FOUND: i32 = -808_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no rows found")]
    NoRowsFound,
    #[error("catalog status {status}: {message}")]
    Status { status: i32, message: String },
}

impl CatalogError {
    pub fn status(&self) -> i32 {
        match self {
            CatalogError::NoRowsFound => CAT_NO_ROWS_FOUND,
            CatalogError::Status { status, .. } => *status,
        }
    }

    pub fn message(&self) -> String {
        match self {
            CatalogError::NoRowsFound => "no rows found".to_string(),
            CatalogError::Status { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    #[default]
    Good,
    Stale,
}

/// One replica of a logical data object, with the resource that stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataObjectInfo {
    pub obj_path: String,
    pub file_path: String,
    pub resource: Resource,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub replica_number: i32,
    #[serde(default)]
    pub replica_status: ReplicaStatus,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modify_time: i64,
}

/// Mutation and lookup primitives of the catalog.
pub trait Catalog {
    /// Id of the data object at `obj_path`, if one exists.
    fn object_id(&self, obj_path: &str) -> Result<Option<i64>, CatalogError>;
    fn collection_exists(&self, coll: &str) -> Result<bool, CatalogError>;
    fn create_collection(&self, coll: &str) -> Result<(), CatalogError>;
    fn rename_object(&self, src: &str, dest: &str) -> Result<(), CatalogError>;
    fn unlink_object(&self, obj_path: &str, force: bool) -> Result<(), CatalogError>;
    /// Checksum of the object, computing it if the backend can; `None` when unavailable.
    fn checksum(&self, obj_path: &str) -> Result<Option<String>, CatalogError>;
    /// Physical-location record of the object's first good replica.
    fn object_info(&self, obj_path: &str) -> Result<DataObjectInfo, CatalogError>;
    /// Register `dest` as an additional replica of the object described by `src`.
    fn register_replica(&self, src: &DataObjectInfo, dest: &DataObjectInfo) -> Result<(), CatalogError>;
    /// Attach an attribute/value pair to a data object.
    fn set_attribute(&self, obj_path: &str, name: &str, value: &str) -> Result<(), CatalogError>;
}

/// Presents the catalog's collection namespace as a file driver so that missing parent
/// collections are created with the same walk used for physical directories.
pub struct CollectionDriver<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> CollectionDriver<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self { Self { catalog } }
}

impl FileDriver for CollectionDriver<'_> {
    fn stat(&self, path: &str) -> io::Result<FileStat> {
        match self.catalog.collection_exists(path) {
            Ok(true) => Ok(FileStat { is_dir: true, size: 0 }),
            Ok(false) => match self.catalog.object_id(path) {
                Ok(Some(_)) => Ok(FileStat { is_dir: false, size: 0 }),
                Ok(None) => Err(io::Error::new(io::ErrorKind::NotFound, format!("collection '{}' not found", path))),
                Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
            },
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }

    fn mkdir(&self, path: &str, _mode: u32) -> io::Result<()> {
        self.catalog
            .create_collection(path)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}
