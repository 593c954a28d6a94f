use std::path::{Path, PathBuf};
use std::time::Duration;

use muster::collect::collector::{Record, KIND_DNS_DOMAIN, KIND_DNS_RECORD};
use muster::store::{Status, Store, StoreError};
use tempfile::TempDir;

fn temp_store() -> (TempDir, PathBuf, Store) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inventory.db");
    let store = Store::open(path.to_str().unwrap()).unwrap();
    (dir, path, store)
}

fn vm(source: &str, id: &str) -> Record {
    Record {
        source: source.to_string(),
        kind: "vm".to_string(),
        id: Some(id.to_string()),
        name: Some(format!("vm-{id}")),
        cluster: Some("zone-a".to_string()),
        project: Some("prod".to_string()),
        cpus: Some(2),
        memory: Some(4096),
        status: Some("running".to_string()),
        is_on: Some(1),
        ..Record::default()
    }
}

fn dns_record(source: &str, name: &str, attributes: &str) -> Record {
    Record {
        source: source.to_string(),
        kind: KIND_DNS_RECORD.to_string(),
        name: Some(name.to_string()),
        attributes: Some(attributes.to_string()),
        ..Record::default()
    }
}

/// Shift every status-log timestamp into the past, as if the snapshots had
/// been committed `days` ago.
fn backdate(path: &Path, days: i64) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute(
        "UPDATE inv_source SET ts = ts - ?1",
        rusqlite::params![days * 86_400],
    )
    .unwrap();
}

fn table_count(path: &Path, table: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn fresh_source_starts_at_version_one() {
    let (_dir, _path, mut store) = temp_store();

    assert_eq!(store.next_version("aws1").unwrap(), 1);

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    assert_eq!(store.next_version("aws1").unwrap(), 2);

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    assert_eq!(store.next_version("aws1").unwrap(), 3);
}

#[test]
fn sources_version_independently() {
    let (_dir, _path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    store.save(&[vm("aws1", "i-1")], None).unwrap();
    store.save(&[vm("gcp1", "inst-1")], None).unwrap();

    let versions = store.current_versions().unwrap();
    assert_eq!(versions.get("aws1"), Some(&2));
    assert_eq!(versions.get("gcp1"), Some(&1));
    assert_eq!(versions.get("azure1"), None);
}

#[test]
fn two_source_batch_commits_both_at_version_one() {
    let (_dir, _path, mut store) = temp_store();

    let records = vec![vm("a", "i-1"), vm("a", "i-2"), vm("b", "i-3")];
    let commits = store
        .save(&records, Some(Duration::from_secs(7)))
        .unwrap();

    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].source, "a");
    assert_eq!(commits[0].version, 1);
    assert_eq!(commits[0].entries, 2);
    assert_eq!(commits[1].source, "b");
    assert_eq!(commits[1].version, 1);
    assert_eq!(commits[1].entries, 1);

    // data rows stamped with the matching version
    assert_eq!(store.records("a", 1).unwrap().len(), 2);
    assert_eq!(store.records("b", 1).unwrap().len(), 1);

    // one OK status row per contributing source, runtime carried through
    let entries = store.status_entries(None, None).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry.status, Status::Ok);
        assert_eq!(entry.runtime, Some(7));
        assert!(entry.error.is_none());
    }
}

#[test]
fn empty_batch_rejected_and_writes_nothing() {
    let (_dir, path, mut store) = temp_store();

    assert!(matches!(
        store.save(&[], None),
        Err(StoreError::EmptyBatch)
    ));

    assert!(store.status_entries(None, None).unwrap().is_empty());
    assert_eq!(table_count(&path, "inv_inventory"), 0);
}

#[test]
fn duplicate_identity_rolls_back_the_whole_batch() {
    let (_dir, path, mut store) = temp_store();

    // identical (version, source, type, name, cluster, project, id)
    let records = vec![vm("aws1", "i-1"), vm("aws1", "i-1")];
    let err = store.save(&records, None).unwrap_err();

    match err {
        StoreError::Constraint { source, version } => {
            assert_eq!(source, "aws1");
            assert_eq!(version, 1);
        }
        other => panic!("expected Constraint error, got {other:?}"),
    }

    // atomicity: no rows from the failed batch in any table
    assert!(store.status_entries(None, None).unwrap().is_empty());
    assert_eq!(table_count(&path, "inv_inventory"), 0);
    assert_eq!(store.next_version("aws1").unwrap(), 1);
}

#[test]
fn failure_path_advances_version_without_data() {
    let (_dir, _path, mut store) = temp_store();

    let version = store
        .log_status("aws1", Status::Fail, None, Some("auth failed"))
        .unwrap();
    assert_eq!(version, 1);

    let entries = store.status_entries(Some("aws1"), None).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, Status::Fail);
    assert_eq!(entries[0].error.as_deref(), Some("auth failed"));
    assert_eq!(entries[0].entries, None);

    // no data rows exist for the failed version
    assert!(store.records("aws1", 1).unwrap().is_empty());
    assert_eq!(store.latest_ok_version("aws1").unwrap(), None);

    // a subsequent successful save allocates the next version
    let commits = store.save(&[vm("aws1", "i-1")], None).unwrap();
    assert_eq!(commits[0].version, 2);
    assert_eq!(store.latest_ok_version("aws1").unwrap(), Some(2));
}

#[test]
fn dns_attributes_merge_into_columns() {
    let (_dir, _path, mut store) = temp_store();

    let record = dns_record(
        "dns1",
        "www.example.com",
        r#"{"ttl": "300", "record_type": "A", "domain": "example.com", "data": "203.0.113.9"}"#,
    );

    let domain = Record {
        source: "dns1".to_string(),
        kind: KIND_DNS_DOMAIN.to_string(),
        name: Some("example.com".to_string()),
        attributes: Some(r#"{"domain": "example.com", "domain_type": "public", "ttl": "3600"}"#.to_string()),
        ..Record::default()
    };

    store.save(&[record, domain], None).unwrap();

    let rows = store.dns_records("dns1", 1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name.as_deref(), Some("www.example.com"));
    assert_eq!(rows[0].ttl.as_deref(), Some("300"));
    assert_eq!(rows[0].record_type.as_deref(), Some("A"));
    assert_eq!(rows[0].domain.as_deref(), Some("example.com"));
    assert_eq!(rows[0].data.as_deref(), Some("203.0.113.9"));
    // the payload itself is stored once, untouched
    assert!(rows[0].attributes.as_deref().unwrap().contains("\"ttl\""));

    let domains = store.dns_domains("dns1", 1).unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].domain.as_deref(), Some("example.com"));
    assert_eq!(domains[0].domain_type.as_deref(), Some("public"));
    assert_eq!(domains[0].ttl.as_deref(), Some("3600"));
}

#[test]
fn malformed_dns_attributes_fail_the_batch_atomically() {
    let (_dir, path, mut store) = temp_store();

    let records = vec![
        vm("mixed", "i-1"),
        dns_record("mixed", "bad.example.com", "not json"),
    ];

    let err = store.save(&records, None).unwrap_err();
    assert!(matches!(err, StoreError::Serialization { .. }));

    // the healthy record in the same batch must not survive
    assert!(store.status_entries(None, None).unwrap().is_empty());
    assert_eq!(table_count(&path, "inv_inventory"), 0);
    assert_eq!(table_count(&path, "inv_dns_record"), 0);
}

#[test]
fn prune_removes_expired_snapshot_from_all_four_tables() {
    let (_dir, path, mut store) = temp_store();

    let records = vec![
        vm("mix", "i-1"),
        dns_record(
            "mix",
            "www.example.com",
            r#"{"ttl": "300", "record_type": "A", "domain": "example.com"}"#,
        ),
        Record {
            source: "mix".to_string(),
            kind: KIND_DNS_DOMAIN.to_string(),
            name: Some("example.com".to_string()),
            ..Record::default()
        },
    ];
    store.save(&records, None).unwrap();

    // yesterday's snapshot, threshold zero days
    backdate(&path, 1);
    let result = store.prune(0).unwrap();

    assert_eq!(result.snapshots, vec![("mix".to_string(), 1)]);
    assert_eq!(result.rows, 4);

    // zero orphaned rows anywhere
    for table in ["inv_source", "inv_inventory", "inv_dns_record", "inv_dns_domain"] {
        assert_eq!(table_count(&path, table), 0, "orphans left in {table}");
    }

    // idempotent: a second run finds nothing
    let again = store.prune(0).unwrap();
    assert!(again.snapshots.is_empty());
    assert_eq!(again.rows, 0);
}

#[test]
fn prune_spares_snapshots_newer_than_threshold() {
    let (_dir, path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    backdate(&path, 3);
    store.save(&[vm("aws1", "i-2")], None).unwrap();

    let result = store.prune(1).unwrap();
    assert_eq!(result.snapshots, vec![("aws1".to_string(), 1)]);

    // the fresh snapshot is untouched
    assert_eq!(store.records("aws1", 2).unwrap().len(), 1);
    assert_eq!(store.next_version("aws1").unwrap(), 3);
}

#[test]
fn prune_with_threshold_older_than_everything_is_a_noop() {
    let (_dir, path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    backdate(&path, 2);

    let result = store.prune(30).unwrap();
    assert!(result.snapshots.is_empty());
    assert_eq!(result.rows, 0);
    assert_eq!(table_count(&path, "inv_source"), 1);
    assert_eq!(table_count(&path, "inv_inventory"), 1);
}

#[test]
fn expired_is_a_read_only_preview() {
    let (_dir, path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    backdate(&path, 5);

    let pairs = store.expired(1).unwrap();
    assert_eq!(pairs, vec![("aws1".to_string(), 1)]);

    // nothing deleted by the preview
    assert_eq!(table_count(&path, "inv_source"), 1);
    assert_eq!(table_count(&path, "inv_inventory"), 1);
}

#[test]
fn schema_creation_is_idempotent_across_reopens() {
    let (_dir, path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();
    store.close().unwrap();

    // reopening must not disturb existing data
    let store = Store::open(path.to_str().unwrap()).unwrap();
    assert_eq!(store.next_version("aws1").unwrap(), 2);
    assert_eq!(store.records("aws1", 1).unwrap().len(), 1);
}

#[test]
fn saved_records_round_trip_through_queries() {
    let (_dir, _path, mut store) = temp_store();

    let mut record = vm("aws1", "i-1");
    record.tags = Some(serde_json::json!({"env": "prod", "team": "infra"}));
    record.networks = Some(serde_json::json!([{"ip": "10.0.0.5"}]));

    store.save(&[record], None).unwrap();

    let loaded = store.records("aws1", 1).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].kind, "vm");
    assert_eq!(loaded[0].name.as_deref(), Some("vm-i-1"));
    assert_eq!(loaded[0].cpus, Some(2));
    assert_eq!(loaded[0].tags.as_ref().unwrap()["env"], "prod");
    assert_eq!(loaded[0].networks.as_ref().unwrap()[0]["ip"], "10.0.0.5");
}

#[test]
fn racing_writer_on_same_source_collides_on_unique_constraint() {
    let (_dir, path, mut store) = temp_store();

    store.save(&[vm("aws1", "i-1")], None).unwrap();

    // second writer that allocated the same version out of band
    let conn = rusqlite::Connection::open(&path).unwrap();
    let dup = conn.execute(
        "INSERT INTO inv_source (ts, source, version, status) VALUES (0, 'aws1', 1, 'OK')",
        [],
    );
    assert!(dup.is_err());
}
