//! Virtual machine collector.
//!
//! Runs the source's export command and normalizes the instance list it
//! prints. Expected payload shape:
//!
//! ```json
//! {"instances": [{"id": "...", "name": "...", "zone": "...", "cpus": 2,
//!                 "memory_mb": 4096, "state": "running", "tags": {...},
//!                 "networks": [...]}]}
//! ```
//!
//! Unknown fields are kept in the raw object stored under `details`.

use serde::Deserialize;
use serde_json::Value;

use crate::config::SourceConfig;
use super::collector::{self, CollectError, Collector, Record};

pub struct ComputeCollector {
    source: SourceConfig,
}

impl ComputeCollector {
    pub fn new(source: SourceConfig) -> Self {
        ComputeCollector { source }
    }
}

impl Collector for ComputeCollector {
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
    instances: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Instance {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    cpus: Option<i64>,
    #[serde(default)]
    memory_mb: Option<i64>,
    #[serde(default)]
    disks: Option<i64>,
    #[serde(default)]
    storage_mb: Option<i64>,
    #[serde(default)]
    primary_ip: Option<String>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    os_family: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    tags: Option<Value>,
    #[serde(default)]
    networks: Option<Value>,
    #[serde(default)]
    storages: Option<Value>,
}

fn normalize(payload: Value) -> Result<Vec<Record>, serde_json::Error> {
    let payload: Payload = serde_json::from_value(payload)?;
    let mut records = Vec::with_capacity(payload.instances.len());

    for raw in payload.instances {
        let instance: Instance = serde_json::from_value(raw.clone())?;

        // prefer the explicit name, fall back to a Name tag, then the id
        let name = instance
            .name
            .or_else(|| name_tag(instance.tags.as_ref()))
            .unwrap_or_else(|| instance.id.clone());

        let is_on = instance
            .state
            .as_deref()
            .map(|s| i64::from(s.eq_ignore_ascii_case("running")));

        records.push(Record {
            kind: "vm".to_string(),
            name: Some(name),
            id: Some(instance.id),
            cluster: instance.zone,
            project: instance.project,
            created: instance.created,
            cpus: instance.cpus,
            memory: instance.memory_mb,
            disks: instance.disks,
            storage: instance.storage_mb,
            primary_ip: instance.primary_ip,
            os: instance.os,
            os_family: instance.os_family,
            status: instance.state,
            is_on,
            owner: instance.owner,
            tags: instance.tags,
            networks: instance.networks,
            storages: instance.storages,
            details: Some(raw.to_string()),
            ..Record::default()
        });
    }

    Ok(records)
}

fn name_tag(tags: Option<&Value>) -> Option<String> {
    tags?.get("Name")?.as_str().map(str::to_string)
}
