pub mod collector;
pub mod compute;
pub mod dns;
pub mod loadbalancer;
pub mod objectstorage;

use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::store::Status;
use collector::Record;

/// One source that produced no records this run; routed to the status-log
/// failure path by the caller, never through the snapshot writer.
#[derive(Debug, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub status: Status,
    pub error: String,
}

pub struct CollectResult {
    pub records: Vec<Record>,
    pub failures: Vec<SourceFailure>,
    pub diagnostics: Vec<String>,
    pub duration: Option<Duration>,
    pub peak_memory_bytes: Option<usize>,
}

impl CollectResult {
    pub fn empty() -> Self {
        CollectResult {
            records: Vec::new(),
            failures: Vec::new(),
            diagnostics: Vec::new(),
            duration: None,
            peak_memory_bytes: None,
        }
    }
}

/// Run every configured source's collector sequentially and gather the
/// normalized records. A failing source never aborts the run; its outcome is
/// captured so the caller can log it, and the other sources proceed.
pub fn run(config: &Config, only: Option<&[String]>, progressive: bool) -> CollectResult {
    let start = std::time::Instant::now();
    let mut result = CollectResult::empty();

    if config.sources.is_empty() {
        result
            .diagnostics
            .push("no sources configured; nothing to collect".to_string());
    }

    for source in &config.sources {
        if let Some(filter) = only {
            if !filter.iter().any(|name| name == &source.name) {
                continue;
            }
        }

        let mut collector = collector::for_source(source);

        if !collector.available() {
            result.failures.push(SourceFailure {
                source: source.name.clone(),
                status: Status::Error,
                error: format!(
                    "export command not found: {}",
                    source.command.join(" ")
                ),
            });
            continue;
        }

        if progressive {
            eprintln!("collecting {} ({})...", source.name, source.kind.as_str());
        }

        let source_start = std::time::Instant::now();
        match collector.collect() {
            Ok(mut records) => {
                for rec in &mut records {
                    rec.source = source.name.clone();
                    if rec.project.is_none() {
                        rec.project = source.project.clone();
                    }
                    if rec.cluster.is_none() {
                        rec.cluster = source.cluster.clone();
                    }
                }

                if progressive {
                    eprintln!(
                        "{} complete: {} records, {:.2}s",
                        source.name,
                        records.len(),
                        source_start.elapsed().as_secs_f64()
                    );
                }

                result.records.extend(records);
            }
            Err(e) => {
                result.failures.push(SourceFailure {
                    source: source.name.clone(),
                    status: e.status(),
                    error: e.to_string(),
                });
            }
        }
    }

    result.duration = Some(start.elapsed());
    result.peak_memory_bytes = memory_stats::memory_stats().map(|usage| usage.physical_mem);
    result
}
