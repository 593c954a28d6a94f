//! SQLite snapshot store.
//!
//! Persists collection runs as immutable, versioned snapshots across four
//! tables:
//! - inv_source: one status row per (source, version) collection attempt
//! - inv_inventory: generic inventory records
//! - inv_dns_record / inv_dns_domain: DNS resources with attribute fields
//!   merged into queryable columns
//!
//! Versions are allocated per source inside the committing transaction, so a
//! snapshot is either fully visible or absent. Rows are never updated in
//! place; the only deletion path is the retention pruner.

pub mod diff;
mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::collect::collector::{Record, KIND_DNS_DOMAIN, KIND_DNS_RECORD};

#[derive(Debug)]
pub enum StoreError {
    Connection {
        dsn: String,
        source: rusqlite::Error,
    },

    EmptyBatch,

    Constraint { source: String, version: i64 },

    Serialization {
        kind: String,
        name: String,
        source: serde_json::Error,
    },

    Database(rusqlite::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection { dsn, source } => {
                write!(f, "cannot open inventory store at {dsn}: {source}")
            }
            StoreError::EmptyBatch => write!(f, "snapshot batch contains no records"),
            StoreError::Constraint { source, version } => {
                write!(f, "version {version} already exists for source {source}")
            }
            StoreError::Serialization { kind, name, source } => {
                write!(f, "malformed attributes payload on {kind} record '{name}': {source}")
            }
            StoreError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Connection { source, .. } => Some(source),
            StoreError::Serialization { source, .. } => Some(source),
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e)
    }
}

/// Outcome of one collection attempt, as recorded in the status log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Fail,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Fail => "FAIL",
            Status::Error => "ERROR",
        }
    }

    fn parse(s: &str) -> Status {
        match s {
            "OK" => Status::Ok,
            "FAIL" => Status::Fail,
            _ => Status::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status-log row.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub id: i64,
    pub timestamp: i64,
    pub source: String,
    pub version: i64,
    pub runtime: Option<i64>,
    pub entries: Option<i64>,
    pub status: Status,
    pub error: Option<String>,
}

/// Per-source receipt returned by a successful save.
#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    pub source: String,
    pub version: i64,
    pub entries: i64,
}

#[derive(Debug, Serialize)]
pub struct PruneResult {
    /// (source, version) pairs removed.
    pub snapshots: Vec<(String, i64)>,
    /// Total rows deleted across all four tables.
    pub rows: usize,
}

/// Row of the DNS record table, attribute fields already merged.
#[derive(Debug, Clone, Serialize)]
pub struct DnsRecordRow {
    pub id: Option<String>,
    pub name: Option<String>,
    pub record_type: Option<String>,
    pub domain: Option<String>,
    pub ttl: Option<String>,
    pub kind: String,
    pub source: String,
    pub version: i64,
    pub data: Option<String>,
    pub attributes: Option<String>,
    pub details: Option<String>,
}

/// Row of the DNS domain table.
#[derive(Debug, Clone, Serialize)]
pub struct DnsDomainRow {
    pub id: Option<String>,
    pub domain: Option<String>,
    pub domain_type: Option<String>,
    pub ttl: Option<String>,
    pub kind: String,
    pub source: String,
    pub version: i64,
    pub attributes: Option<String>,
    pub details: Option<String>,
}

/// Typed view of a DNS record's `attributes` payload. Unknown keys stay in
/// the stored blob; a payload that fails to decode aborts the whole batch.
#[derive(Debug, Default, Deserialize)]
struct DnsAttributes {
    id: Option<String>,
    name: Option<String>,
    record_type: Option<String>,
    domain: Option<String>,
    domain_type: Option<String>,
    ttl: Option<String>,
    data: Option<String>,
}

/// Database handle. The connection is exclusively owned by the in-flight
/// operation; the store holds no cross-call locks.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database at `dsn` and create the schema if missing.
    pub fn open(dsn: &str) -> Result<Store, StoreError> {
        let conn = Connection::open(dsn).map_err(|e| StoreError::Connection {
            dsn: dsn.to_string(),
            source: e,
        })?;

        // other processes may be writing other sources; wait out their commits
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::init(&conn)?;
        Ok(Store { conn })
    }

    /// Explicit close. Dropping the store also releases the connection; this
    /// surfaces close errors instead of swallowing them.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }

    /// Highest logged version per source. Sources with no status rows are
    /// absent; callers treat them as version 0.
    pub fn current_versions(&self) -> Result<BTreeMap<String, i64>, StoreError> {
        versions_in(&self.conn)
    }

    pub fn next_version(&self, source: &str) -> Result<i64, StoreError> {
        Ok(self
            .current_versions()?
            .get(source)
            .copied()
            .unwrap_or(0)
            + 1)
    }

    /// Commit a batch of records as one snapshot per contributing source.
    ///
    /// Allocates each contributing source's next version from a read inside
    /// the same transaction that writes, partitions records by kind, stamps
    /// versions, and inserts the status rows plus all data rows atomically.
    /// Sources absent from the batch are untouched. An empty batch writes
    /// nothing and fails with `EmptyBatch`.
    pub fn save(
        &mut self,
        records: &[Record],
        runtime: Option<Duration>,
    ) -> Result<Vec<Commit>, StoreError> {
        if records.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let tx = self.conn.transaction()?;
        let versions = versions_in(&tx)?;

        let mut commits: BTreeMap<&str, Commit> = BTreeMap::new();
        for rec in records {
            let commit = commits.entry(rec.source.as_str()).or_insert_with(|| Commit {
                source: rec.source.clone(),
                version: versions.get(rec.source.as_str()).copied().unwrap_or(0) + 1,
                entries: 0,
            });
            commit.entries += 1;
        }

        let ts = Utc::now().timestamp();
        let runtime_secs = runtime.map(|d| d.as_secs() as i64);

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO inv_source (ts, source, version, runtime, entries, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            )?;

            for commit in commits.values() {
                stmt.execute(params![
                    ts,
                    commit.source,
                    commit.version,
                    runtime_secs,
                    commit.entries,
                    Status::Ok.as_str()
                ])
                .map_err(|e| constraint_error(e, &commit.source, commit.version))?;
            }
        }

        for rec in records {
            let version = commits[rec.source.as_str()].version;
            match rec.kind.as_str() {
                KIND_DNS_RECORD => insert_dns_record(&tx, rec, version)?,
                KIND_DNS_DOMAIN => insert_dns_domain(&tx, rec, version)?,
                _ => insert_inventory(&tx, rec, version)?,
            }
        }

        tx.commit()?;
        Ok(commits.into_values().collect())
    }

    /// Record the outcome of a run that produced no records (login or fetch
    /// failure). Allocates the source's next version like `save` and writes a
    /// single status row in its own transaction. Readers looking for "latest
    /// data" must therefore join against the latest OK row, not the latest
    /// version.
    pub fn log_status(
        &mut self,
        source: &str,
        status: Status,
        runtime: Option<Duration>,
        error: Option<&str>,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let version = versions_in(&tx)?.get(source).copied().unwrap_or(0) + 1;

        tx.execute(
            "INSERT INTO inv_source (ts, source, version, runtime, entries, status, error)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)",
            params![
                Utc::now().timestamp(),
                source,
                version,
                runtime.map(|d| d.as_secs() as i64),
                status.as_str(),
                error
            ],
        )
        .map_err(|e| constraint_error(e, source, version))?;

        tx.commit()?;
        Ok(version)
    }

    /// (source, version) pairs whose status timestamp is older than the
    /// cutoff; what `prune` would delete.
    pub fn expired(&self, older_than_days: u64) -> Result<Vec<(String, i64)>, StoreError> {
        expired_in(&self.conn, older_than_days)
    }

    /// Delete every snapshot older than the retention window from all four
    /// tables in one transaction. A pair is removed completely or not at
    /// all; re-running with the same threshold is a no-op.
    pub fn prune(&mut self, older_than_days: u64) -> Result<PruneResult, StoreError> {
        let tx = self.conn.transaction()?;
        let pairs = expired_in(&tx, older_than_days)?;

        let mut rows = 0usize;
        for (source, version) in &pairs {
            for table in [
                "inv_inventory",
                "inv_dns_record",
                "inv_dns_domain",
                "inv_source",
            ] {
                rows += tx.execute(
                    &format!("DELETE FROM {table} WHERE source = ?1 AND version = ?2"),
                    params![source, version],
                )?;
            }
        }

        tx.commit()?;
        Ok(PruneResult {
            snapshots: pairs,
            rows,
        })
    }

    /// Status-log rows, newest first.
    pub fn status_entries(
        &self,
        source: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StatusEntry>, StoreError> {
        let mut sql = String::from(
            "SELECT id, ts, source, version, runtime, entries, status, error FROM inv_source",
        );
        if source.is_some() {
            sql.push_str(" WHERE source = ?1");
        }
        sql.push_str(" ORDER BY ts DESC, id DESC");
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let entries = match source {
            Some(s) => stmt
                .query_map(params![s], status_entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], status_entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(entries)
    }

    /// Latest version of a source that actually committed data. Versions
    /// consumed by the failure path have no data rows and are skipped.
    pub fn latest_ok_version(&self, source: &str) -> Result<Option<i64>, StoreError> {
        let version = self.conn.query_row(
            "SELECT MAX(version) FROM inv_source WHERE source = ?1 AND status = 'OK'",
            params![source],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(version)
    }

    /// Generic inventory records of one snapshot.
    pub fn records(&self, source: &str, version: i64) -> Result<Vec<Record>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source, type, name, cluster, project, location, id, created,
                    cpus, memory, disks, storage, primary_ip, os, os_family,
                    status, is_on, owner, tags, networks, storages, description,
                    attributes, details
             FROM inv_inventory
             WHERE source = ?1 AND version = ?2
             ORDER BY type, name",
        )?;

        let records = stmt
            .query_map(params![source, version], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// DNS record rows of one snapshot.
    pub fn dns_records(&self, source: &str, version: i64) -> Result<Vec<DnsRecordRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, record_type, domain, ttl, type, source, version,
                    data, attributes, details
             FROM inv_dns_record
             WHERE source = ?1 AND version = ?2
             ORDER BY domain, name",
        )?;

        let rows = stmt
            .query_map(params![source, version], |row| {
                Ok(DnsRecordRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    record_type: row.get(2)?,
                    domain: row.get(3)?,
                    ttl: row.get(4)?,
                    kind: row.get(5)?,
                    source: row.get(6)?,
                    version: row.get(7)?,
                    data: row.get(8)?,
                    attributes: row.get(9)?,
                    details: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// DNS domain rows of one snapshot.
    pub fn dns_domains(&self, source: &str, version: i64) -> Result<Vec<DnsDomainRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, domain, domain_type, ttl, type, source, version,
                    attributes, details
             FROM inv_dns_domain
             WHERE source = ?1 AND version = ?2
             ORDER BY domain",
        )?;

        let rows = stmt
            .query_map(params![source, version], |row| {
                Ok(DnsDomainRow {
                    id: row.get(0)?,
                    domain: row.get(1)?,
                    domain_type: row.get(2)?,
                    ttl: row.get(3)?,
                    kind: row.get(4)?,
                    source: row.get(5)?,
                    version: row.get(6)?,
                    attributes: row.get(7)?,
                    details: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn versions_in(conn: &Connection) -> Result<BTreeMap<String, i64>, StoreError> {
    let mut stmt = conn.prepare("SELECT source, MAX(version) FROM inv_source GROUP BY source")?;

    let versions = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(versions)
}

fn expired_in(conn: &Connection, older_than_days: u64) -> Result<Vec<(String, i64)>, StoreError> {
    let cutoff = (Utc::now() - chrono::Duration::days(older_than_days as i64)).timestamp();

    let mut stmt = conn.prepare(
        "SELECT source, version FROM inv_source WHERE ts <= ?1 ORDER BY source, version",
    )?;

    let pairs = stmt
        .query_map(params![cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pairs)
}

fn insert_inventory(tx: &Connection, rec: &Record, version: i64) -> Result<(), StoreError> {
    let mut stmt = tx.prepare_cached(
        "INSERT INTO inv_inventory (version, source, type, name, cluster, project, location,
            id, created, cpus, memory, disks, storage, primary_ip, os, os_family, status,
            is_on, owner, tags, networks, storages, description, attributes, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
            ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
    )?;

    stmt.execute(params![
        version,
        rec.source,
        rec.kind,
        rec.name,
        rec.cluster,
        rec.project,
        rec.location,
        rec.id,
        rec.created,
        rec.cpus,
        rec.memory,
        rec.disks,
        rec.storage,
        rec.primary_ip,
        rec.os,
        rec.os_family,
        rec.status,
        rec.is_on,
        rec.owner,
        rec.tags.as_ref().map(Value::to_string),
        rec.networks.as_ref().map(Value::to_string),
        rec.storages.as_ref().map(Value::to_string),
        rec.description,
        rec.attributes,
        rec.details,
    ])
    .map_err(|e| constraint_error(e, &rec.source, version))?;

    Ok(())
}

fn insert_dns_record(tx: &Connection, rec: &Record, version: i64) -> Result<(), StoreError> {
    let attrs = decode_attributes(rec)?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO inv_dns_record (id, name, record_type, domain, ttl, type, source,
            version, data, attributes, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    stmt.execute(params![
        attrs.id.clone().or_else(|| rec.id.clone()),
        attrs.name.clone().or_else(|| rec.name.clone()),
        attrs.record_type,
        attrs.domain,
        attrs.ttl,
        rec.kind,
        rec.source,
        version,
        attrs.data,
        rec.attributes,
        rec.details,
    ])
    .map_err(|e| constraint_error(e, &rec.source, version))?;

    Ok(())
}

fn insert_dns_domain(tx: &Connection, rec: &Record, version: i64) -> Result<(), StoreError> {
    let attrs = decode_attributes(rec)?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO inv_dns_domain (id, domain, domain_type, ttl, type, source, version,
            attributes, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    stmt.execute(params![
        attrs.id.clone().or_else(|| rec.id.clone()),
        attrs.domain.clone().or_else(|| rec.name.clone()),
        attrs.domain_type,
        attrs.ttl,
        rec.kind,
        rec.source,
        version,
        rec.attributes,
        rec.details,
    ])
    .map_err(|e| constraint_error(e, &rec.source, version))?;

    Ok(())
}

/// Decode a DNS-kind record's serialized attributes payload. A missing
/// payload is an empty set of attribute fields; a malformed one fails the
/// batch so nothing partial is committed.
fn decode_attributes(rec: &Record) -> Result<DnsAttributes, StoreError> {
    match rec.attributes.as_deref() {
        None => Ok(DnsAttributes::default()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
            kind: rec.kind.clone(),
            name: rec.name.clone().unwrap_or_default(),
            source: e,
        }),
    }
}

/// Surface unique-key collisions (racing writers on one source, duplicate
/// identity within a batch) with the source and attempted version so the
/// caller can retry.
fn constraint_error(err: rusqlite::Error, source: &str, version: i64) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Constraint {
                source: source.to_string(),
                version,
            }
        }
        other => StoreError::Database(other),
    }
}

fn status_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<StatusEntry> {
    let status: String = row.get(6)?;
    Ok(StatusEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        source: row.get(2)?,
        version: row.get(3)?,
        runtime: row.get(4)?,
        entries: row.get(5)?,
        status: Status::parse(&status),
        error: row.get(7)?,
    })
}

fn record_from_row(row: &rusqlite::Row) -> rusqlite::Result<Record> {
    let parse = |text: Option<String>| text.and_then(|s| serde_json::from_str(&s).ok());

    Ok(Record {
        source: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        cluster: row.get(3)?,
        project: row.get(4)?,
        location: row.get(5)?,
        id: row.get(6)?,
        created: row.get(7)?,
        cpus: row.get(8)?,
        memory: row.get(9)?,
        disks: row.get(10)?,
        storage: row.get(11)?,
        primary_ip: row.get(12)?,
        os: row.get(13)?,
        os_family: row.get(14)?,
        status: row.get(15)?,
        is_on: row.get(16)?,
        owner: row.get(17)?,
        tags: parse(row.get(18)?),
        networks: parse(row.get(19)?),
        storages: parse(row.get(20)?),
        description: row.get(21)?,
        attributes: row.get(22)?,
        details: row.get(23)?,
    })
}
