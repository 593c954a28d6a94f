//! Snapshot comparison engine.
//!
//! Compares two versions of one source's inventory and reports changes:
//! - Matches records by kind + id (name when the provider has no id)
//! - Added and removed resources
//! - Field-level changes for capacity, status, power state and primary IP

use std::collections::HashMap;

use crate::collect::collector::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub name: String,
    pub kind: String,
    pub diff_type: DiffType,
    pub changes: Vec<FieldChange>,
}

pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub source: String,
    pub from_version: i64,
    pub to_version: i64,
}

/// Key for matching records across versions. Ids are stable across renames,
/// so they win over names.
fn make_key(rec: &Record) -> String {
    let identity = rec
        .id
        .as_deref()
        .or(rec.name.as_deref())
        .unwrap_or_default();
    format!("{}:{}", rec.kind, identity)
}

fn display_name(rec: &Record) -> String {
    rec.name
        .clone()
        .or_else(|| rec.id.clone())
        .unwrap_or_else(|| "(unnamed)".to_string())
}

pub fn compare_records(
    from: &[Record],
    to: &[Record],
    source: &str,
    from_version: i64,
    to_version: i64,
) -> DiffResult {
    let mut from_map: HashMap<String, &Record> = HashMap::new();
    for rec in from {
        from_map.insert(make_key(rec), rec);
    }

    let mut to_map: HashMap<String, &Record> = HashMap::new();
    for rec in to {
        to_map.insert(make_key(rec), rec);
    }

    let mut entries = Vec::new();

    for (key, to_rec) in &to_map {
        if let Some(from_rec) = from_map.get(key) {
            let changes = field_changes(from_rec, to_rec);
            if !changes.is_empty() {
                entries.push(DiffEntry {
                    name: display_name(to_rec),
                    kind: to_rec.kind.clone(),
                    diff_type: DiffType::Changed,
                    changes,
                });
            }
        } else {
            entries.push(DiffEntry {
                name: display_name(to_rec),
                kind: to_rec.kind.clone(),
                diff_type: DiffType::Added,
                changes: Vec::new(),
            });
        }
    }

    for (key, from_rec) in &from_map {
        if !to_map.contains_key(key) {
            entries.push(DiffEntry {
                name: display_name(from_rec),
                kind: from_rec.kind.clone(),
                diff_type: DiffType::Removed,
                changes: Vec::new(),
            });
        }
    }

    DiffResult {
        entries,
        source: source.to_string(),
        from_version,
        to_version,
    }
}

fn field_changes(old: &Record, new: &Record) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    change(&mut changes, "cpus", &old.cpus, &new.cpus);
    change(&mut changes, "memory", &old.memory, &new.memory);
    change(&mut changes, "disks", &old.disks, &new.disks);
    change(&mut changes, "storage", &old.storage, &new.storage);
    change(&mut changes, "status", &old.status, &new.status);
    change(&mut changes, "primary_ip", &old.primary_ip, &new.primary_ip);
    change(&mut changes, "cluster", &old.cluster, &new.cluster);

    if old.is_on != new.is_on {
        changes.push(FieldChange {
            field: "power",
            old: power(old.is_on),
            new: power(new.is_on),
        });
    }

    changes
}

fn change<T: PartialEq + std::fmt::Display>(
    changes: &mut Vec<FieldChange>,
    field: &'static str,
    old: &Option<T>,
    new: &Option<T>,
) {
    if old != new {
        changes.push(FieldChange {
            field,
            old: display_opt(old),
            new: display_opt(new),
        });
    }
}

fn display_opt<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn power(is_on: Option<i64>) -> String {
    match is_on {
        Some(0) => "off".to_string(),
        Some(_) => "on".to_string(),
        None => "-".to_string(),
    }
}
