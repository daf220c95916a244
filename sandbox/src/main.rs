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

//! Runs the engine against the local machine for a few seconds, feeding it
//! a mixed workload, then writes a report.
//!
//! Usage: `sandbox [config.json] [report.txt]`

use adaptic_sdk::prelude::*;
use adaptic_sdk::{generate_report, ReportWorker};
use anyhow::{Context, Result};
use std::thread;
use std::time::Duration;

fn workloads() -> Vec<(WorkloadDescriptor, Priority)> {
    vec![
        (WorkloadDescriptor::new("calibration", 4, 20), Priority::High),
        (
            WorkloadDescriptor::new("sweep", 8, 120).with_deadline(1_500),
            Priority::Normal,
        ),
        (WorkloadDescriptor::new("background", 10, 60), Priority::Low),
        (
            WorkloadDescriptor::new("hotfix", 6, 10).non_preemptible(),
            Priority::Critical,
        ),
    ]
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => EngineConfig::load(&path)?,
        None => EngineConfig::default(),
    };
    let report_path = args.next().unwrap_or_else(|| "adaptic-report.txt".into());

    let engine = ResourceAdaptiveEngine::for_host(config).context("Failed to build engine")?;
    let capability = engine.capability();
    log::info!(
        "Sandbox: '{}' scored {:.1}, running {} units.",
        capability.device_name,
        capability.score,
        engine.adjuster().current_capacity()
    );

    for (workload, priority) in workloads() {
        let estimate = engine.optimize_workload(&workload)?;
        log::info!(
            "Sandbox: '{}' needs {} units, {} grantable, fidelity {:.3}, feasible={}.",
            workload.name,
            estimate.requested_capacity,
            estimate.grantable_capacity,
            estimate.prediction.fidelity,
            estimate.feasible
        );
        engine.submit(workload, priority)?;
    }

    engine.start()?;
    let worker = ReportWorker::spawn()?;
    let mut midrun = None;
    for round in 0..6 {
        thread::sleep(Duration::from_millis(500));
        // Finish whatever is running so the queue keeps moving.
        for task in engine.balancer().tasks() {
            if task.status == TaskStatus::Running {
                let feedback = ExecutionFeedback {
                    capacity: task.granted_capacity,
                    circuit_depth: task.workload.circuit_depth,
                    error_rate: 0.01,
                    runtime_ms: 500.0,
                };
                // The loop may have preempted it since the snapshot.
                if let Err(e) = engine.balancer().complete_task(task.id, Some(feedback)) {
                    log::warn!("Sandbox: {} not completed: {}", task.id, e);
                }
            }
        }
        if round == 2 {
            midrun = Some(worker.submit(&engine, "adaptic-report-midrun.txt")?);
        }
    }
    engine.stop();
    if let Some(outcome) = midrun {
        let path = outcome.recv().context("Report worker dropped the job")??;
        log::info!("Sandbox: Mid-run report in {}.", path.display());
    }

    generate_report(&engine, &report_path)?;
    let stats = engine.balancer().stats();
    log::info!(
        "Sandbox: {} submitted, {} completed, {} failed. Report in {}.",
        stats.submitted,
        stats.completed,
        stats.failed,
        report_path
    );
    Ok(())
}
