//! Object storage collector.
//!
//! Normalizes the export command's bucket list. Buckets have no numeric id
//! with most providers, so the bucket name doubles as the record id.
//! Versioning state and region land in the `attributes` payload.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SourceConfig;
use super::collector::{self, CollectError, Collector, Record};

pub struct ObjectStorageCollector {
    source: SourceConfig,
}

impl ObjectStorageCollector {
    pub fn new(source: SourceConfig) -> Self {
        ObjectStorageCollector { source }
    }
}

impl Collector for ObjectStorageCollector {
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
    buckets: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    versioning: Option<String>,
    #[serde(default)]
    size_mb: Option<i64>,
    #[serde(default)]
    tags: Option<Value>,
}

fn normalize(payload: Value) -> Result<Vec<Record>, serde_json::Error> {
    let payload: Payload = serde_json::from_value(payload)?;
    let mut records = Vec::with_capacity(payload.buckets.len());

    for raw in payload.buckets {
        let bucket: Bucket = serde_json::from_value(raw.clone())?;

        let attributes = json!({
            "versioning": bucket.versioning,
            "location": bucket.location,
        });

        records.push(Record {
            kind: "storage".to_string(),
            name: Some(bucket.name.clone()),
            id: Some(bucket.name),
            created: bucket.created,
            location: bucket.location,
            storage: bucket.size_mb,
            owner: bucket.owner,
            tags: bucket.tags,
            attributes: Some(attributes.to_string()),
            details: Some(raw.to_string()),
            ..Record::default()
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bucket_name_doubles_as_id() {
        let payload = json!({
            "buckets": [{
                "name": "backups-prod",
                "owner": "123456",
                "location": "eu-west-1",
                "versioning": "Enabled",
                "size_mb": 2048,
                "tags": {"team": "infra"}
            }]
        });

        let rec = &normalize(payload).unwrap()[0];
        assert_eq!(rec.kind, "storage");
        assert_eq!(rec.name.as_deref(), Some("backups-prod"));
        assert_eq!(rec.id.as_deref(), Some("backups-prod"));
        assert_eq!(rec.storage, Some(2048));
        assert_eq!(rec.owner.as_deref(), Some("123456"));

        let attrs: Value = serde_json::from_str(rec.attributes.as_deref().unwrap()).unwrap();
        assert_eq!(attrs["versioning"], "Enabled");
        assert_eq!(attrs["location"], "eu-west-1");
    }

    #[test]
    fn minimal_bucket_normalizes() {
        let payload = json!({"buckets": [{"name": "scratch"}]});
        let rec = &normalize(payload).unwrap()[0];
        assert_eq!(rec.name.as_deref(), Some("scratch"));
        assert!(rec.storage.is_none());
    }
}
