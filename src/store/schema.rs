//! Table creation for the snapshot store.
//!
//! Idempotent: every statement is CREATE ... IF NOT EXISTS, so connecting to
//! an existing database leaves it untouched. There is no migration logic; a
//! schema change needs a fresh store.

use rusqlite::Connection;

pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS inv_source (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts INTEGER NOT NULL,
            source TEXT NOT NULL,
            version INTEGER NOT NULL,
            runtime INTEGER,
            entries INTEGER,
            status TEXT NOT NULL,
            error TEXT,
            UNIQUE(source, version)
        );

        CREATE TABLE IF NOT EXISTS inv_inventory (
            inventory_id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL,
            source TEXT NOT NULL,
            type TEXT NOT NULL,
            name TEXT,
            cluster TEXT,
            project TEXT,
            location TEXT,
            id TEXT,
            created TEXT,
            cpus INTEGER,
            memory INTEGER,
            disks INTEGER,
            storage INTEGER,
            primary_ip TEXT,
            os TEXT,
            os_family TEXT,
            status TEXT,
            is_on INTEGER,
            owner TEXT,
            tags TEXT,
            networks TEXT,
            storages TEXT,
            description TEXT,
            attributes TEXT,
            details TEXT,
            UNIQUE(version, source, type, name, cluster, project, id)
        );

        CREATE TABLE IF NOT EXISTS inv_dns_record (
            id TEXT,
            name TEXT,
            record_type TEXT,
            domain TEXT,
            ttl TEXT,
            type TEXT,
            source TEXT NOT NULL,
            version INTEGER NOT NULL,
            data TEXT,
            attributes TEXT,
            details TEXT
        );

        CREATE TABLE IF NOT EXISTS inv_dns_domain (
            id TEXT,
            domain TEXT,
            domain_type TEXT,
            ttl TEXT,
            type TEXT,
            source TEXT NOT NULL,
            version INTEGER NOT NULL,
            attributes TEXT,
            details TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_inventory_source_version
            ON inv_inventory(source, version);
        CREATE INDEX IF NOT EXISTS idx_dns_record_source_version
            ON inv_dns_record(source, version);
        CREATE INDEX IF NOT EXISTS idx_dns_domain_source_version
            ON inv_dns_domain(source, version);",
    )
}
