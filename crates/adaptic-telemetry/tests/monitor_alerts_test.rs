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

use adaptic_core::{
    AlertLevel, ManualClock, ResourceError, ResourceFilter, ResourceKind, ResourceProbe,
    ResourceResult, ResourceSample,
};
use adaptic_telemetry::{AlertEvent, MonitorConfig, ResourceMonitor};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A probe fed from a queue of utilization values; an exhausted queue fails.
#[derive(Debug)]
struct QueueProbe {
    kind: ResourceKind,
    values: Mutex<VecDeque<f64>>,
}

impl QueueProbe {
    fn new(kind: ResourceKind, values: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            kind,
            values: Mutex::new(values.iter().copied().collect()),
        })
    }
}

impl ResourceProbe for QueueProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Owned(format!("queue-{}", self.kind))
    }
    fn resource_kind(&self) -> ResourceKind {
        self.kind
    }
    fn sample(&self) -> ResourceResult<ResourceSample> {
        self.values
            .lock()
            .unwrap()
            .pop_front()
            .map(ResourceSample::from_percent)
            .ok_or_else(|| ResourceError::DeviceUnavailable("queue exhausted".into()))
    }
}

fn recording_callback(
    monitor: &ResourceMonitor,
    filter: ResourceFilter,
    min_level: AlertLevel,
) -> Arc<Mutex<Vec<(usize, AlertEvent)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    monitor.register_callback(filter, min_level, move |event| {
        let mut sink = sink.lock().unwrap();
        let step = sink.len();
        sink.push((step, *event));
    });
    seen
}

#[test]
fn test_cpu_alert_fires_only_on_transitions() {
    // --- 1. ARRANGE ---
    let clock = Arc::new(ManualClock::new(0));
    let monitor = ResourceMonitor::new(MonitorConfig::default(), clock.clone()).unwrap();
    monitor
        .set_alert_threshold(ResourceKind::Cpu, 70.0, 90.0)
        .unwrap();
    monitor.register_probe(QueueProbe::new(ResourceKind::Cpu, &[50.0, 75.0, 95.0, 60.0]));

    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let sink = fired_at.clone();
    let step = Arc::new(Mutex::new(0usize));
    let step_reader = step.clone();
    monitor.register_callback(
        ResourceFilter::Kind(ResourceKind::Cpu),
        AlertLevel::Warning,
        move |event| {
            let step = *step_reader.lock().unwrap();
            sink.lock().unwrap().push((step, event.previous, event.current));
        },
    );

    // --- 2. ACT ---
    for i in 1..=4 {
        *step.lock().unwrap() = i;
        assert!(monitor.refresh(), "refresh {} should succeed", i);
        clock.advance(100);
    }

    // --- 3. ASSERT ---
    let fired = fired_at.lock().unwrap().clone();
    assert_eq!(
        fired,
        vec![
            (2, AlertLevel::None, AlertLevel::Warning),
            (3, AlertLevel::Warning, AlertLevel::Critical),
            (4, AlertLevel::Critical, AlertLevel::None),
        ],
        "Callback must fire exactly on the three level transitions"
    );
    assert_eq!(monitor.stats().alert_transitions, 3);
}

#[test]
fn test_min_level_filters_warning_transitions() {
    let clock = Arc::new(ManualClock::new(0));
    let monitor = ResourceMonitor::new(MonitorConfig::default(), clock).unwrap();
    monitor.register_probe(QueueProbe::new(ResourceKind::Cpu, &[50.0, 75.0, 95.0, 60.0]));
    let critical_only = recording_callback(
        &monitor,
        ResourceFilter::Kind(ResourceKind::Cpu),
        AlertLevel::Critical,
    );
    let memory_only = recording_callback(
        &monitor,
        ResourceFilter::Kind(ResourceKind::Memory),
        AlertLevel::None,
    );

    for _ in 0..4 {
        monitor.refresh();
    }

    let critical_only = critical_only.lock().unwrap();
    let levels: Vec<(AlertLevel, AlertLevel)> = critical_only
        .iter()
        .map(|(_, e)| (e.previous, e.current))
        .collect();
    assert_eq!(
        levels,
        vec![
            (AlertLevel::Warning, AlertLevel::Critical),
            (AlertLevel::Critical, AlertLevel::None),
        ]
    );
    assert!(memory_only.lock().unwrap().is_empty());
}

#[test]
fn test_stale_kind_does_not_raise_transition() {
    let clock = Arc::new(ManualClock::new(0));
    let monitor = ResourceMonitor::new(MonitorConfig::default(), clock).unwrap();
    monitor.register_probe(QueueProbe::new(ResourceKind::Cpu, &[95.0]));
    monitor.register_probe(QueueProbe::new(ResourceKind::Memory, &[10.0, 20.0]));
    let seen = recording_callback(&monitor, ResourceFilter::Any, AlertLevel::None);

    assert!(monitor.refresh());
    // CPU probe is now exhausted: the kind goes stale, memory still samples.
    assert!(monitor.refresh());
    // Both exhausted.
    assert!(!monitor.refresh());

    let status = monitor.last_status().unwrap();
    let cpu = status.reading(ResourceKind::Cpu).unwrap();
    assert!(cpu.stale);
    assert_eq!(cpu.level, AlertLevel::Critical);
    assert_eq!(status.stale_kinds(), vec![ResourceKind::Cpu]);
    assert_eq!(seen.lock().unwrap().len(), 1, "Only the first CPU escalation");
    assert_eq!(monitor.history(10).len(), 2);
}

#[test]
fn test_invalid_threshold_is_rejected_without_side_effect() {
    let monitor =
        ResourceMonitor::new(MonitorConfig::default(), Arc::new(ManualClock::new(0))).unwrap();
    let err = monitor
        .set_alert_threshold(ResourceKind::Memory, 90.0, 50.0)
        .unwrap_err();
    assert_eq!(err.kind(), adaptic_core::ErrorKind::InvalidArgument);
    assert_eq!(monitor.thresholds().get(ResourceKind::Memory).warning, 80.0);
}
