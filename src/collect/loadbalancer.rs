//! Load balancer collector.
//!
//! Normalizes the export command's balancer list. Power state is aggregated
//! from the attached instance health states: any in-service instance means
//! the balancer is on. Scheme, subnets and the public DNS name ride along in
//! the `attributes` payload.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::SourceConfig;
use super::collector::{self, CollectError, Collector, Record};

pub struct LoadBalancerCollector {
    source: SourceConfig,
}

impl LoadBalancerCollector {
    pub fn new(source: SourceConfig) -> Self {
        LoadBalancerCollector { source }
    }
}

impl Collector for LoadBalancerCollector {
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
    load_balancers: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Balancer {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    zones: Vec<String>,
    #[serde(default)]
    scheme: Option<String>,
    #[serde(default)]
    subnets: Vec<String>,
    #[serde(default)]
    dns_name: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    /// instance id -> health state, e.g. "InService"
    #[serde(default)]
    instances: BTreeMap<String, String>,
}

fn normalize(payload: Value) -> Result<Vec<Record>, serde_json::Error> {
    let payload: Payload = serde_json::from_value(payload)?;
    let mut records = Vec::with_capacity(payload.load_balancers.len());

    for raw in payload.load_balancers {
        let lb: Balancer = serde_json::from_value(raw.clone())?;
        let state = aggregate_state(&lb.instances);

        let attributes = json!({
            "scheme": lb.scheme,
            "subnets": lb.subnets,
            "dns_name": lb.dns_name,
        });

        records.push(Record {
            kind: "lb".to_string(),
            name: Some(lb.name),
            id: lb.id,
            cluster: join_zones(&lb.zones),
            created: lb.created,
            status: Some(state.to_string()),
            is_on: Some(i64::from(state == "on")),
            owner: lb.owner,
            attributes: Some(attributes.to_string()),
            details: Some(raw.to_string()),
            ..Record::default()
        });
    }

    Ok(records)
}

fn join_zones(zones: &[String]) -> Option<String> {
    if zones.is_empty() {
        None
    } else {
        Some(zones.join(","))
    }
}

/// Any in-service instance turns the balancer on; known-bad states turn it
/// off; no information at all leaves it unknown.
fn aggregate_state(instances: &BTreeMap<String, String>) -> &'static str {
    let mut state = "unknown";
    for health in instances.values() {
        if health == "InService" {
            return "on";
        }
        if state == "unknown" && health == "OutOfService" {
            state = "off";
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_service_instance_means_on() {
        let payload = json!({
            "load_balancers": [{
                "name": "web-lb",
                "id": "Z123",
                "zones": ["eu-west-1a", "eu-west-1b"],
                "scheme": "internet-facing",
                "instances": {"i-1": "OutOfService", "i-2": "InService"}
            }]
        });

        let rec = &normalize(payload).unwrap()[0];
        assert_eq!(rec.kind, "lb");
        assert_eq!(rec.status.as_deref(), Some("on"));
        assert_eq!(rec.is_on, Some(1));
        assert_eq!(rec.cluster.as_deref(), Some("eu-west-1a,eu-west-1b"));

        let attrs: Value = serde_json::from_str(rec.attributes.as_deref().unwrap()).unwrap();
        assert_eq!(attrs["scheme"], "internet-facing");
    }

    #[test]
    fn all_out_of_service_means_off() {
        let payload = json!({
            "load_balancers": [{
                "name": "idle-lb",
                "instances": {"i-1": "OutOfService"}
            }]
        });

        let rec = &normalize(payload).unwrap()[0];
        assert_eq!(rec.status.as_deref(), Some("off"));
        assert_eq!(rec.is_on, Some(0));
    }

    #[test]
    fn no_instances_means_unknown() {
        let payload = json!({"load_balancers": [{"name": "empty-lb"}]});
        let rec = &normalize(payload).unwrap()[0];
        assert_eq!(rec.status.as_deref(), Some("unknown"));
        assert_eq!(rec.is_on, Some(0));
        assert!(rec.cluster.is_none());
    }
}
