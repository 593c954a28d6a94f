use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SourceConfig, SourceKind};
use crate::store::Status;

/// Record kind routed to the DNS record table.
pub const KIND_DNS_RECORD: &str = "dns_record";
/// Record kind routed to the DNS domain table.
pub const KIND_DNS_DOMAIN: &str = "dns_domain";

/// A normalized inventory record, the shape every collector produces and the
/// snapshot store persists. Every kind other than the two DNS kinds lands in
/// the generic inventory table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    /// Source name; stamped by the run loop, not by collectors.
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub cluster: Option<String>,
    pub project: Option<String>,
    pub location: Option<String>,
    pub created: Option<String>,
    pub cpus: Option<i64>,
    pub memory: Option<i64>,
    pub disks: Option<i64>,
    pub storage: Option<i64>,
    pub primary_ip: Option<String>,
    pub os: Option<String>,
    pub os_family: Option<String>,
    pub status: Option<String>,
    pub is_on: Option<i64>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub tags: Option<serde_json::Value>,
    pub networks: Option<serde_json::Value>,
    pub storages: Option<serde_json::Value>,
    /// Serialized key/value payload; decoded by the snapshot writer for DNS
    /// kinds and surfaced as queryable columns.
    pub attributes: Option<String>,
    /// Raw provider object, serialized as-is.
    pub details: Option<String>,
}

impl Record {
    pub fn new(kind: &str) -> Record {
        Record {
            kind: kind.to_string(),
            ..Record::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("source has no export command configured")]
    NoCommand,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("invalid payload from {command}: {source}")]
    Payload {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CollectError {
    /// Status-log status for this failure: a command that launched and exited
    /// non-zero is FAIL, everything the collector could not attempt or could
    /// not understand is ERROR.
    pub fn status(&self) -> Status {
        match self {
            CollectError::Command { .. } => Status::Fail,
            _ => Status::Error,
        }
    }
}

pub trait Collector {
    /// Source name this collector reports under.
    fn name(&self) -> &str;
    fn available(&self) -> bool;
    fn collect(&mut self) -> Result<Vec<Record>, CollectError>;
}

/// Build the collector for a configured source, selected by kind.
pub fn for_source(source: &SourceConfig) -> Box<dyn Collector> {
    match source.kind {
        SourceKind::Compute => Box::new(super::compute::ComputeCollector::new(source.clone())),
        SourceKind::LoadBalancer => {
            Box::new(super::loadbalancer::LoadBalancerCollector::new(source.clone()))
        }
        SourceKind::ObjectStorage => {
            Box::new(super::objectstorage::ObjectStorageCollector::new(source.clone()))
        }
        SourceKind::Dns => Box::new(super::dns::DnsCollector::new(source.clone())),
    }
}

/// Run a source's export command and parse its stdout as one JSON document.
pub(crate) fn run_export(command: &[String]) -> Result<serde_json::Value, CollectError> {
    let program = command.first().ok_or(CollectError::NoCommand)?;
    let display = command.join(" ");

    let output = Command::new(program)
        .args(&command[1..])
        .output()
        .map_err(|e| CollectError::Spawn {
            command: display.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(CollectError::Command {
            command: display,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|e| CollectError::Payload {
        command: display,
        source: e,
    })
}

/// True when the export command's program can be found, either as an explicit
/// path or somewhere on PATH.
pub(crate) fn command_available(command: &[String]) -> bool {
    let Some(program) = command.first() else {
        return false;
    };

    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).exists();
    }

    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };

    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}
