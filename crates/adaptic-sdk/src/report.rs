// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Human-readable engine reports.
//!
//! A report has four sections, always in this order: `[Config]`,
//! `[Status]`, `[Statistics]` and `[History]`. Each line is `key = value`.
//! Rendering takes a snapshot of the engine; writing the file happens on
//! the caller's thread, on a [`ReportWorker`], or on tokio's blocking pool
//! through [`generate_report_async`].

use crate::engine::ResourceAdaptiveEngine;
use adaptic_core::monitoring::ResourceKind;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Section headers, in report order.
pub const SECTIONS: [&str; 4] = ["[Config]", "[Status]", "[Statistics]", "[History]"];

/// Renders the current state of `engine` as report text.
pub fn render_report(engine: &ResourceAdaptiveEngine) -> Result<String> {
    let mut lines: Vec<(String, String)> = Vec::new();
    let mut out = String::new();
    let now = engine.clock().now_millis();
    let _ = writeln!(out, "# Adaptic resource report");
    let _ = writeln!(out, "generated_at_ms = {}", now);

    // [Config]
    flatten_into("", &to_value(&engine.config())?, &mut lines);
    push_section(&mut out, SECTIONS[0], &mut lines);

    // [Status]
    let capability = engine.capability();
    let availability = engine.allocator().check_availability(0, 0);
    lines.push(("engine.running".into(), engine.is_running().to_string()));
    lines.push(("monitor.state".into(), format!("{:?}", engine.monitor().state())));
    lines.push(("adjuster.state".into(), format!("{:?}", engine.adjuster().state())));
    lines.push((
        "capacity.current".into(),
        engine.adjuster().current_capacity().to_string(),
    ));
    lines.push((
        "allocation.total_capacity".into(),
        availability.total_capacity.to_string(),
    ));
    lines.push((
        "allocation.available_capacity".into(),
        availability.available_capacity.to_string(),
    ));
    lines.push(("device.id".into(), capability.device_id.clone()));
    lines.push(("device.name".into(), capability.device_name.clone()));
    lines.push(("device.score".into(), format!("{:.1}", capability.score)));
    lines.push((
        "device.recommended_capacity".into(),
        capability.recommended_capacity.to_string(),
    ));
    lines.push((
        "device.accelerator".into(),
        capability.has_accelerator().to_string(),
    ));
    if let Some(status) = engine.monitor().last_status() {
        lines.push(("status.timestamp_ms".into(), status.timestamp_ms.to_string()));
        for kind in ResourceKind::ALL {
            if let Some(reading) = status.reading(kind) {
                let key = kind_key(kind);
                lines.push((
                    format!("resource.{key}.usage_percent"),
                    format!("{:.2}", reading.usage_percent),
                ));
                lines.push((format!("resource.{key}.used"), reading.used.to_string()));
                lines.push((format!("resource.{key}.total"), reading.total.to_string()));
                lines.push((format!("resource.{key}.level"), format!("{:?}", reading.level)));
                lines.push((format!("resource.{key}.stale"), reading.stale.to_string()));
            }
        }
    }
    push_section(&mut out, SECTIONS[1], &mut lines);

    // [Statistics]
    flatten_into("engine", &to_value(&engine.stats())?, &mut lines);
    flatten_into("monitor", &to_value(&engine.monitor().stats())?, &mut lines);
    flatten_into("capacity", &to_value(&engine.adjuster().capacity_state())?, &mut lines);
    flatten_into("allocation", &to_value(&engine.allocator().stats())?, &mut lines);
    flatten_into("balancer", &to_value(&engine.balancer().stats())?, &mut lines);
    push_section(&mut out, SECTIONS[2], &mut lines);

    // [History]
    for (i, record) in engine.adjuster().history(usize::MAX).iter().enumerate() {
        lines.push((
            format!("adjustment.{i}"),
            format!(
                "{} ms {} -> {} ({:?}) {}",
                record.timestamp_ms, record.old, record.new, record.trigger, record.reason
            ),
        ));
    }
    let history_size = engine.monitor().config().history_size;
    for (i, status) in engine.monitor().history(history_size).iter().enumerate() {
        let mut line = format!("{} ms", status.timestamp_ms);
        for (kind, reading) in &status.readings {
            let _ = write!(line, " {}={:.1}%", kind_key(*kind), reading.usage_percent);
        }
        lines.push((format!("status.{i}"), line));
    }
    push_section(&mut out, SECTIONS[3], &mut lines);

    Ok(out)
}

/// Renders and writes a report to `path`, on the calling thread.
pub fn generate_report(engine: &ResourceAdaptiveEngine, path: impl AsRef<Path>) -> Result<()> {
    let content = render_report(engine)?;
    write_report(path.as_ref(), &content)
}

/// Renders a report, then writes it on tokio's blocking pool.
pub async fn generate_report_async(
    engine: &ResourceAdaptiveEngine,
    path: impl Into<PathBuf>,
) -> Result<PathBuf> {
    let content = render_report(engine)?;
    let path = path.into();
    tokio::task::spawn_blocking(move || write_report(&path, &content).map(|()| path))
        .await
        .context("Report writer task failed")?
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    log::info!("Engine: Report written to {}.", path.display());
    Ok(())
}

struct ReportJob {
    path: PathBuf,
    content: String,
    done: Sender<Result<PathBuf>>,
}

/// A background thread that writes reports so the caller never blocks on
/// file I/O.
pub struct ReportWorker {
    jobs: Option<Sender<ReportJob>>,
    handle: Option<JoinHandle<()>>,
}

impl ReportWorker {
    /// Spawns the writer thread.
    pub fn spawn() -> Result<Self> {
        let (jobs, queue) = crossbeam_channel::unbounded::<ReportJob>();
        let handle = thread::Builder::new()
            .name("adaptic-report".into())
            .spawn(move || {
                for job in queue.iter() {
                    let written = write_report(&job.path, &job.content).map(|()| job.path);
                    if let Err(e) = &written {
                        log::warn!("Engine: {:#}", e);
                    }
                    let _ = job.done.send(written);
                }
            })
            .context("Failed to spawn report worker")?;
        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    /// Snapshots `engine` now and queues the write. The returned receiver
    /// yields the outcome once the file is written.
    pub fn submit(
        &self,
        engine: &ResourceAdaptiveEngine,
        path: impl Into<PathBuf>,
    ) -> Result<Receiver<Result<PathBuf>>> {
        let content = render_report(engine)?;
        let (done, outcome) = crossbeam_channel::bounded(1);
        let jobs = self
            .jobs
            .as_ref()
            .context("Report worker is shut down")?;
        jobs.send(ReportJob {
            path: path.into(),
            content,
            done,
        })
        .context("Report worker is gone")?;
        Ok(outcome)
    }

    /// Finishes the queued writes and joins the thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReportWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to snapshot report data")
}

fn push_section(out: &mut String, header: &str, lines: &mut Vec<(String, String)>) {
    let _ = writeln!(out, "\n{}", header);
    for (key, value) in lines.drain(..) {
        let _ = writeln!(out, "{} = {}", key, value);
    }
}

fn kind_key(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Cpu => "cpu",
        ResourceKind::Memory => "memory",
        ResourceKind::Storage => "storage",
        ResourceKind::Network => "network",
        ResourceKind::Accelerator => "accelerator",
        ResourceKind::ComputeUnits => "compute_units",
    }
}

/// Flattens nested JSON into dotted `key = value` pairs.
fn flatten_into(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&join(key), nested, out);
            }
        }
        Value::Array(items) if items.iter().all(|v| !v.is_object()) => {
            let rendered: Vec<String> = items.iter().map(scalar).collect();
            out.push((prefix.to_string(), rendered.join(", ")));
        }
        Value::Array(items) => {
            for (i, nested) in items.iter().enumerate() {
                flatten_into(&join(&i.to_string()), nested, out);
            }
        }
        other => out.push((prefix.to_string(), scalar(other))),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nests_with_dots() {
        let mut lines = Vec::new();
        flatten_into(
            "capacity",
            &json!({ "strategy": "Balanced", "bounds": { "min": 1, "max": 32 }, "target": null }),
            &mut lines,
        );
        assert_eq!(
            lines,
            vec![
                ("capacity.strategy".to_string(), "Balanced".to_string()),
                ("capacity.bounds.min".to_string(), "1".to_string()),
                ("capacity.bounds.max".to_string(), "32".to_string()),
                ("capacity.target".to_string(), "none".to_string()),
            ]
        );
    }

    #[test]
    fn test_flatten_joins_scalar_arrays() {
        let mut lines = Vec::new();
        flatten_into("kinds", &json!(["Cpu", "Memory"]), &mut lines);
        assert_eq!(lines, vec![("kinds".to_string(), "Cpu, Memory".to_string())]);
    }
}
