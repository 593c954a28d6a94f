//! Terminal table rendering for status logs and snapshots.
//!
//! - Status log: one row per collection attempt, newest first
//! - Snapshot: records grouped by kind with per-kind counts
//! - DNS snapshot: domains then records

use std::collections::BTreeMap;

use crate::collect::collector::Record;
use crate::store::{DnsDomainRow, DnsRecordRow, StatusEntry};
use crate::util::{format_count, format_runtime, format_timestamp};

pub fn status(entries: &[StatusEntry]) -> String {
    if entries.is_empty() {
        return String::from("No collection attempts logged.\n");
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<20} {:<16} {:>4} {:<6} {:>8} {:>8}  {}\n",
        "ID", "DATE", "SOURCE", "VER", "STATUS", "ENTRIES", "RUNTIME", "ERROR"
    ));
    output.push_str(&"-".repeat(84));
    output.push('\n');

    for entry in entries {
        output.push_str(&format!(
            "{:<6} {:<20} {:<16} {:>4} {:<6} {:>8} {:>8}  {}\n",
            entry.id,
            format_timestamp(entry.timestamp),
            truncate(&entry.source, 16),
            entry.version,
            entry.status.as_str(),
            format_count(entry.entries),
            format_runtime(entry.runtime),
            entry.error.as_deref().unwrap_or("")
        ));
    }

    output
}

pub fn snapshot(records: &[Record]) -> String {
    if records.is_empty() {
        return String::from("No inventory records in this snapshot.\n");
    }

    let mut output = String::new();

    // group records by kind
    let mut by_kind: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for rec in records {
        by_kind.entry(rec.kind.as_str()).or_default().push(rec);
    }

    for (kind, group) in &by_kind {
        output.push_str(&format!("\n{kind}\n"));
        output.push_str(&"-".repeat(76));
        output.push('\n');

        for rec in group {
            output.push_str(&format!(
                "  {:<22} {:<16} {:<14} {:<15} {}\n",
                truncate(rec.name.as_deref().unwrap_or("(unnamed)"), 22),
                truncate(rec.id.as_deref().unwrap_or("-"), 16),
                truncate(rec.cluster.as_deref().unwrap_or("-"), 14),
                rec.primary_ip.as_deref().unwrap_or("-"),
                rec.status.as_deref().unwrap_or("-")
            ));
        }

        output.push_str(&format!("  {} {kind} record(s)\n", group.len()));
    }

    output.push_str(&format!("\nTOTAL: {} record(s)\n", records.len()));
    output
}

pub fn dns_snapshot(domains: &[DnsDomainRow], records: &[DnsRecordRow]) -> String {
    let mut output = String::new();

    if !domains.is_empty() {
        output.push_str("\ndomains\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for domain in domains {
            output.push_str(&format!(
                "  {:<30} {:<10} ttl={}\n",
                truncate(domain.domain.as_deref().unwrap_or("-"), 30),
                domain.domain_type.as_deref().unwrap_or("-"),
                domain.ttl.as_deref().unwrap_or("-")
            ));
        }
    }

    if !records.is_empty() {
        output.push_str("\nrecords\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for record in records {
            output.push_str(&format!(
                "  {:<30} {:<6} {:>6}  {}\n",
                truncate(record.name.as_deref().unwrap_or("-"), 30),
                record.record_type.as_deref().unwrap_or("-"),
                record.ttl.as_deref().unwrap_or("-"),
                record.data.as_deref().unwrap_or("")
            ));
        }
    }

    output
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Status;

    #[test]
    fn empty_status_log_has_hint() {
        assert!(status(&[]).contains("No collection attempts"));
    }

    #[test]
    fn status_rows_render_error_text() {
        let entries = vec![StatusEntry {
            id: 1,
            timestamp: 0,
            source: "aws1".to_string(),
            version: 1,
            runtime: Some(12),
            entries: None,
            status: Status::Fail,
            error: Some("auth failed".to_string()),
        }];

        let rendered = status(&entries);
        assert!(rendered.contains("aws1"));
        assert!(rendered.contains("FAIL"));
        assert!(rendered.contains("auth failed"));
        assert!(rendered.contains("12s"));
    }

    #[test]
    fn snapshot_groups_by_kind() {
        let records = vec![
            Record {
                kind: "vm".to_string(),
                name: Some("web-1".to_string()),
                ..Record::default()
            },
            Record {
                kind: "storage".to_string(),
                name: Some("backups".to_string()),
                ..Record::default()
            },
        ];

        let rendered = snapshot(&records);
        assert!(rendered.contains("\nvm\n"));
        assert!(rendered.contains("\nstorage\n"));
        assert!(rendered.contains("TOTAL: 2 record(s)"));
    }

    #[test]
    fn long_names_truncated() {
        assert_eq!(truncate("abcdef", 6), "abcdef");
        assert_eq!(truncate("abcdefg", 6), "abc...");
    }
}
