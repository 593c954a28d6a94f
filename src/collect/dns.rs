//! DNS collector.
//!
//! Emits one `dns_domain` record per zone and one `dns_record` per entry.
//! The DNS-specific fields (domain, record type, TTL, resource data) travel
//! in the serialized `attributes` payload; the snapshot writer decodes that
//! payload and surfaces the fields as columns in the DNS tables.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SourceConfig;
use super::collector::{self, CollectError, Collector, Record, KIND_DNS_DOMAIN, KIND_DNS_RECORD};

pub struct DnsCollector {
    source: SourceConfig,
}

impl DnsCollector {
    pub fn new(source: SourceConfig) -> Self {
        DnsCollector { source }
    }
}

impl Collector for DnsCollector {
    fn name(&self) -> &str {
        &self.source.name
    }

    fn available(&self) -> bool {
        collector::command_available(&self.source.command)
    }

    fn collect(&mut self) -> Result<Vec<Record>, CollectError> {
        let payload = collector::run_export(&self.source.command)?;
        normalize(payload).map_err(|e| CollectError::Payload {
            command: self.source.command.join(" "),
            source: e,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    domains: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    domain: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    domain_type: Option<String>,
    #[serde(default)]
    ttl: Option<Value>,
    #[serde(default)]
    records: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ZoneRecord {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    record_type: Option<String>,
    #[serde(default)]
    ttl: Option<Value>,
    #[serde(default)]
    data: Option<String>,
}

fn normalize(payload: Value) -> Result<Vec<Record>, serde_json::Error> {
    let payload: Payload = serde_json::from_value(payload)?;
    let mut records = Vec::new();

    for raw_zone in payload.domains {
        let zone: Zone = serde_json::from_value(raw_zone.clone())?;

        let domain_attrs = json!({
            "domain": zone.domain,
            "domain_type": zone.domain_type,
            "ttl": zone.ttl.as_ref().map(text),
        });

        records.push(Record {
            kind: KIND_DNS_DOMAIN.to_string(),
            name: Some(zone.domain.clone()),
            id: zone.id,
            attributes: Some(domain_attrs.to_string()),
            details: Some(raw_zone.to_string()),
            ..Record::default()
        });

        for raw_record in zone.records {
            let entry: ZoneRecord = serde_json::from_value(raw_record.clone())?;

            let record_attrs = json!({
                "domain": zone.domain,
                "record_type": entry.record_type,
                "ttl": entry.ttl.as_ref().map(text),
                "data": entry.data,
            });

            records.push(Record {
                kind: KIND_DNS_RECORD.to_string(),
                name: Some(entry.name),
                id: entry.id,
                attributes: Some(record_attrs.to_string()),
                details: Some(raw_record.to_string()),
                ..Record::default()
            });
        }
    }

    Ok(records)
}

/// Providers disagree on whether TTLs are numbers or strings; the store
/// columns are text, so render either form without JSON quoting.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
