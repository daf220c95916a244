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

use adaptic_sdk::prelude::*;
use adaptic_sdk::report::SECTIONS;
use adaptic_sdk::{generate_report, generate_report_async, render_report, ReportWorker};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

fn busy_engine() -> ResourceAdaptiveEngine {
    let clock = Arc::new(ManualClock::new(5_000));
    let provider = Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB).with_recommended_capacity(8),
    ));
    let engine = ResourceAdaptiveEngine::new(EngineConfig::default(), provider, clock).unwrap();
    engine
        .submit(WorkloadDescriptor::new("job", 2, 10), Priority::Normal)
        .unwrap();
    // The second tick samples the allocation the first one made.
    engine.tick();
    engine.tick();
    engine
}

/// Positions of the section headers, in file order.
fn section_positions(text: &str) -> Vec<usize> {
    SECTIONS
        .iter()
        .map(|header| text.find(header).unwrap_or(usize::MAX))
        .collect()
}

#[test]
fn test_sections_appear_in_order() {
    // --- 1. ARRANGE ---
    let engine = busy_engine();

    // --- 2. ACT ---
    let text = render_report(&engine).unwrap();

    // --- 3. ASSERT ---
    let positions = section_positions(&text);
    assert!(positions.iter().all(|p| *p != usize::MAX), "Missing section in:\n{text}");
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_report_carries_key_value_lines() {
    let engine = busy_engine();
    let text = render_report(&engine).unwrap();

    assert!(text.contains("level = Standard"));
    assert!(text.contains("capacity.min_capacity = 1"));
    assert!(text.contains("capacity.current = 8"));
    assert!(text.contains("resource.compute_units.usage_percent = 25.00"));
    assert!(text.contains("balancer.running = 1"));
    assert!(text.contains("-> 8 (Initialization)"));
    for line in text.lines().filter(|l| !l.is_empty() && !l.starts_with(['#', '['])) {
        assert!(line.contains(" = "), "Not a key = value line: {line}");
    }
}

#[test]
fn test_generate_report_writes_file() {
    let engine = busy_engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");

    generate_report(&engine, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("# Adaptic resource report"));
    assert!(written.contains("[History]"));
}

#[test]
fn test_unwritable_path_reports_context() {
    let engine = busy_engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.txt");

    let err = generate_report(&engine, &path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to write report"));
}

#[test]
fn test_worker_writes_off_thread() {
    // --- 1. ARRANGE ---
    let engine = busy_engine();
    let dir = tempfile::tempdir().unwrap();
    let mut worker = ReportWorker::spawn().unwrap();

    // --- 2. ACT ---
    let first = worker.submit(&engine, dir.path().join("a.txt")).unwrap();
    let second = worker.submit(&engine, dir.path().join("b.txt")).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(first.recv().unwrap().unwrap(), dir.path().join("a.txt"));
    assert_eq!(second.recv().unwrap().unwrap(), dir.path().join("b.txt"));

    worker.shutdown();
    worker.shutdown();
    assert!(worker.submit(&engine, dir.path().join("c.txt")).is_err());
}

#[tokio::test]
async fn test_async_report_runs_on_blocking_pool() {
    let engine = busy_engine();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.txt");

    let written = generate_report_async(&engine, path.clone()).await.unwrap();

    assert_eq!(written, path);
    let text = std::fs::read_to_string(&path).unwrap();
    let positions = section_positions(&text);
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    let config = EngineConfig {
        level: OptimizationLevel::Aggressive,
        balancer: BalancerConfig {
            strategy: SchedulingStrategy::Fair,
            ..Default::default()
        },
        ..Default::default()
    };

    config.save(&path).unwrap();
    let loaded = EngineConfig::load(&path).unwrap();

    assert_eq!(loaded, config);
    assert!(EngineConfig::load(dir.path().join("absent.json")).is_err());
}
