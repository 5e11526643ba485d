use super::*;
use crate::catalog::{Condition, CursorState, QueryCursor};
use crate::resources::{Resource, ServerHost};

fn resource() -> Resource {
    Resource::new("demoResc", "/var/lib/grid/Vault", ServerHost::local("localhost", "zoneA"), "zoneA")
}

fn object(path: &str, checksum: Option<&str>, data_type: &str) -> DataObjectInfo {
    DataObjectInfo {
        obj_path: path.to_string(),
        file_path: format!("/var/lib/grid/Vault{}", &path["/zoneA".len()..]),
        resource: resource(),
        checksum: checksum.map(|s| s.to_string()),
        replica_number: 0,
        replica_status: ReplicaStatus::Good,
        data_type: data_type.to_string(),
        size: 12,
        modify_time: 0,
    }
}

fn seeded(n: usize) -> InMemoryCatalog {
    let cat = InMemoryCatalog::new();
    for i in 0..n {
        cat.add_object(object(&format!("/zoneA/home/alice/f{:02}", i), Some("abc"), "generic"));
    }
    cat
}

#[test]
fn seeding_creates_collection_chain() {
    let cat = seeded(1);
    assert!(cat.collection_exists("/zoneA").unwrap());
    assert!(cat.collection_exists("/zoneA/home/alice/").unwrap());
    assert!(!cat.collection_exists("/zoneA/archive").unwrap());
    assert!(cat.object_id("/zoneA/home/alice/f00").unwrap().is_some());
    assert!(cat.object_id("/zoneA/home/alice/nope").unwrap().is_none());
}

#[test]
fn pages_through_server_cursor() {
    let cat = seeded(13);
    let mut c = QueryCursor::new(vec!["DATA_NAME".into()], vec![Condition::eq("COLL_NAME", "/zoneA/home/alice")], 5);
    let mut sizes = Vec::new();
    let mut page = c.execute(&cat).unwrap();
    while let Some(p) = page.take() {
        sizes.push(p.row_count());
        if c.state() != CursorState::Open {
            break;
        }
        page = c.fetch_next(&cat).unwrap();
    }
    assert_eq!(sizes, vec![5, 5, 3]);
    assert_eq!(c.state(), CursorState::Closed);
    assert_eq!(cat.open_cursors(), 0);
}

#[test]
fn close_releases_cursor() {
    let cat = seeded(8);
    let mut c = QueryCursor::new(vec!["DATA_ID".into()], vec![], 3);
    c.execute(&cat).unwrap();
    assert_eq!(cat.open_cursors(), 1);
    c.close(&cat).unwrap();
    assert_eq!(cat.open_cursors(), 0);
}

#[test]
fn empty_result_is_no_rows_found() {
    let cat = seeded(2);
    let input = QueryInput {
        select: vec!["DATA_NAME".into()],
        conditions: vec![Condition::eq("COLL_NAME", "/zoneB")],
        max_rows: 10,
        continue_index: 0,
    };
    assert_eq!(cat.execute_query(&input).unwrap_err(), CatalogError::NoRowsFound);
}

#[test]
fn like_and_alternatives() {
    let cat = seeded(2);
    cat.add_object(object("/zoneA/home/alice/sub/deep.txt", None, "text"));
    cat.add_object(object("/zoneA/home/alicex/other", None, "text"));
    let mut c = QueryCursor::new(
        vec!["COLL_NAME".into(), "DATA_NAME".into()],
        vec![Condition::in_collection("COLL_NAME", "/zoneA/home/alice")],
        100,
    );
    let rows = c.collect_rows(&cat).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r[0].starts_with("/zoneA/home/alice") && !r[0].starts_with("/zoneA/home/alicex")));

    assert!(predicate_matches("not like '%.txt'", "deep.bin").unwrap());
    assert!(!predicate_matches("<> 'a'", "a").unwrap());
    assert!(predicate_matches("like 'f_1'", "f01").unwrap());
}

#[test]
fn unknown_column_is_rejected() {
    let cat = seeded(1);
    let input = QueryInput { select: vec!["BOGUS".into()], conditions: vec![], max_rows: 1, continue_index: 0 };
    assert_eq!(cat.execute_query(&input).unwrap_err().status(), CAT_INVALID_ARGUMENT);
}

#[test]
fn create_collection_requires_parent() {
    let cat = seeded(1);
    let err = cat.create_collection("/zoneA/archive/alice").unwrap_err();
    assert_eq!(err.status(), CAT_UNKNOWN_COLLECTION);
    cat.create_collection("/zoneA/archive").unwrap();
    cat.create_collection("/zoneA/archive/alice").unwrap();
    assert_eq!(cat.create_collection("/zoneA/archive").unwrap_err().status(), CAT_ALREADY_EXISTS);
}

#[test]
fn rename_moves_record() {
    let cat = seeded(1);
    cat.add_collection("/zoneA/archive/alice");
    cat.rename_object("/zoneA/home/alice/f00", "/zoneA/archive/alice/f00").unwrap();
    assert!(cat.object_id("/zoneA/home/alice/f00").unwrap().is_none());
    assert_eq!(cat.object_info("/zoneA/archive/alice/f00").unwrap().obj_path, "/zoneA/archive/alice/f00");
}

#[test]
fn register_replica_appends_numbered_copy() {
    let cat = seeded(1);
    let src = cat.object_info("/zoneA/home/alice/f00").unwrap();
    let mut dest = src.clone();
    dest.file_path = "/var/lib/grid/Vault/archive/alice/f00".into();
    cat.register_replica(&src, &dest).unwrap();
    let reps = cat.replicas("/zoneA/home/alice/f00");
    assert_eq!(reps.len(), 2);
    assert_eq!(reps[1].replica_number, 1);
    assert!(reps[1].modify_time > 0);
    assert_eq!(cat.register_replica(&src, &dest).unwrap_err().status(), CAT_ALREADY_EXISTS);
}

#[test]
fn empty_checksum_reads_as_absent() {
    let cat = InMemoryCatalog::new();
    cat.add_object(object("/zoneA/home/alice/x", Some(""), "generic"));
    assert_eq!(cat.checksum("/zoneA/home/alice/x").unwrap(), None);
}

#[test]
fn injected_failures_surface_status() {
    let cat = seeded(1);
    cat.fail_step(MergeStep::SetAttribute, -818_000);
    let err = cat.set_attribute("/zoneA/home/alice/f00", "A", "v").unwrap_err();
    assert_eq!(err.status(), -818_000);
    assert_eq!(cat.mutation_count(), 0);
    cat.clear_failures();
    cat.set_attribute("/zoneA/home/alice/f00", "A", "v").unwrap();
    assert_eq!(cat.attributes("/zoneA/home/alice/f00"), vec![("A".to_string(), "v".to_string())]);
}
