//! End-to-end replica consolidation against a real vault directory: the in-memory catalog
//! holds the logical namespace, the local executor performs mkdir and hard links on disk.

use anyhow::Result;
use std::path::Path;
use tempfile::tempdir;

use gridvault::catalog::{Catalog, DataObjectInfo, InMemoryCatalog, ReplicaStatus};
use gridvault::consolidate::{MergeOutcome, ReplicaConsolidator};
use gridvault::remote::LocalExecutor;
use gridvault::resources::{Resource, ServerHost};
use gridvault::{tprintln, MergeStep};

struct Grid {
    _tmp: tempfile::TempDir,
    vault: String,
    resource: Resource,
    catalog: InMemoryCatalog,
}

impl Grid {
    fn new() -> Result<Self> {
        let tmp = tempdir()?;
        let vault = tmp.path().join("Vault").to_string_lossy().to_string();
        std::fs::create_dir_all(&vault)?;
        let resource = Resource::new("demoResc", &vault, ServerHost::local("localhost", "tempZone"), "tempZone");
        Ok(Self { _tmp: tmp, vault, resource, catalog: InMemoryCatalog::new() })
    }

    /// Write a physical file for `obj_path` at its default vault location and register it.
    fn put(&self, obj_path: &str, body: &[u8], checksum: &str) -> Result<String> {
        self.put_file(obj_path, &obj_path["/tempZone/".len()..], body, checksum)
    }

    fn put_file(&self, obj_path: &str, rel: &str, body: &[u8], checksum: &str) -> Result<String> {
        let file_path = format!("{}/{}", self.vault, rel);
        if let Some(parent) = Path::new(&file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&file_path, body)?;
        self.catalog.add_object(DataObjectInfo {
            obj_path: obj_path.to_string(),
            file_path: file_path.clone(),
            resource: self.resource.clone(),
            checksum: Some(checksum.to_string()),
            replica_number: 0,
            replica_status: ReplicaStatus::Good,
            data_type: "generic".to_string(),
            size: body.len() as u64,
            modify_time: 0,
        });
        Ok(file_path)
    }
}

#[test]
fn identical_copy_becomes_hard_linked_replica() -> Result<()> {
    let grid = Grid::new()?;
    let cur_file = grid.put("/tempZone/home/alice/data/run1.csv", b"a,b\n1,2\n", "sha2:aa")?;
    // master copy was ingested somewhere else in the same vault
    grid.put_file("/tempZone/archive/alice/data/run1.csv", "ingest/0001.csv", b"a,b\n1,2\n", "sha2:aa")?;

    let exec = LocalExecutor::new(["localhost"]);
    let c = ReplicaConsolidator::new(&grid.catalog, &exec);
    let out = c.merge("/tempZone/home/alice/data/run1.csv", "/tempZone/home/alice", "/tempZone/archive/alice")?;
    tprintln!("outcome: {:?}", out);

    let expected = format!("{}/archive/alice/data/run1.csv", grid.vault);
    assert_eq!(
        out,
        MergeOutcome::Linked { replica_path: "/tempZone/archive/alice/data/run1.csv".into(), physical_path: expected.clone() }
    );
    assert_eq!(std::fs::read(&expected)?, b"a,b\n1,2\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        assert_eq!(std::fs::metadata(&expected)?.ino(), std::fs::metadata(&cur_file)?.ino());
    }
    assert!(grid.catalog.object_id("/tempZone/home/alice/data/run1.csv")?.is_none());
    assert_eq!(grid.catalog.replicas("/tempZone/archive/alice/data/run1.csv").len(), 2);
    Ok(())
}

#[test]
fn existing_link_target_fails_at_link_step() -> Result<()> {
    let grid = Grid::new()?;
    grid.put("/tempZone/home/alice/x", b"same", "c1")?;
    // master's physical file already occupies the link target
    grid.put("/tempZone/archive/alice/x", b"same", "c1")?;

    let exec = LocalExecutor::new(["localhost"]);
    let err = ReplicaConsolidator::new(&grid.catalog, &exec)
        .merge("/tempZone/home/alice/x", "/tempZone/home/alice", "/tempZone/archive/alice")
        .unwrap_err();
    assert_eq!(err.step(), Some(MergeStep::RemoteLink));
    assert!(grid.catalog.object_id("/tempZone/home/alice/x")?.is_some());
    Ok(())
}

#[test]
fn unreachable_resource_host_fails_at_mkdir() -> Result<()> {
    let grid = Grid::new()?;
    grid.put("/tempZone/home/alice/x", b"same", "c1")?;
    grid.put("/tempZone/archive/alice/x", b"same", "c1")?;

    let exec = LocalExecutor::new(["some-other-host"]);
    let err = ReplicaConsolidator::new(&grid.catalog, &exec)
        .merge("/tempZone/home/alice/x", "/tempZone/home/alice", "/tempZone/archive/alice")
        .unwrap_err();
    assert_eq!(err.step(), Some(MergeStep::RemoteMkdir));
    assert_eq!(err.code_str(), "remote_operation_failed");
    Ok(())
}

#[test]
fn collection_merge_mixes_outcomes() -> Result<()> {
    let grid = Grid::new()?;
    grid.put("/tempZone/home/alice/a", b"1", "h1")?;
    grid.put("/tempZone/home/alice/b", b"2", "h2")?;
    grid.put("/tempZone/archive/alice/b", b"2-other", "h2-other")?;
    grid.put("/tempZone/home/alice/nested/c", b"3", "h3")?;

    let exec = LocalExecutor::new(["localhost"]);
    let report = ReplicaConsolidator::new(&grid.catalog, &exec)
        .merge_collection(&grid.catalog, "/tempZone/home/alice", "/tempZone/archive/alice")?;
    tprintln!("report: {}", serde_json::to_string(&report)?);

    assert_eq!((report.moved, report.flagged), (2, 1));
    assert!(report.errors.is_empty());
    assert!(grid.catalog.object_id("/tempZone/archive/alice/nested/c")?.is_some());
    assert_eq!(
        grid.catalog.attributes("/tempZone/home/alice/b"),
        vec![("CHECKSUM_MISMATCH".to_string(), "h2-other".to_string())]
    );
    Ok(())
}
