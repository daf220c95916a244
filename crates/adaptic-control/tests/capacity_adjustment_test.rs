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

use adaptic_control::{
    AdjusterState, AdjustmentTrigger, CapacityAdjuster, CapacityConfiguration, CapacityStrategy,
    ExecutionMode,
};
use adaptic_core::{
    AlertLevel, CapabilitySnapshot, ErrorKind, ManualClock, ResourceKind, ResourceReading,
    ResourceStatus, StaticCapabilityProvider,
};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

fn provider(recommended: u32) -> Arc<StaticCapabilityProvider> {
    Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB).with_recommended_capacity(recommended),
    ))
}

/// A status whose memory reading sits at `level`.
fn memory_at(level: AlertLevel) -> ResourceStatus {
    let mut status = ResourceStatus::default();
    status.readings.insert(
        ResourceKind::Memory,
        ResourceReading {
            level,
            ..Default::default()
        },
    );
    status
}

#[test]
fn test_capacity_stays_within_bounds() {
    let bounds = [(1, 8), (4, 16), (10, 12), (2, 32), (18, 24)];
    let strategies = [
        CapacityStrategy::Conservative,
        CapacityStrategy::Balanced,
        CapacityStrategy::Aggressive,
        CapacityStrategy::Adaptive,
    ];
    let levels = [AlertLevel::None, AlertLevel::Critical, AlertLevel::Warning];

    for (min_capacity, max_capacity) in bounds {
        for strategy in strategies {
            // --- 1. ARRANGE ---
            let clock = Arc::new(ManualClock::new(0));
            let config = CapacityConfiguration {
                strategy,
                min_capacity,
                max_capacity,
                stability_period_ms: 1_000,
                ..Default::default()
            };
            let adjuster = CapacityAdjuster::new(config, provider(20), clock.clone()).unwrap();

            // --- 2. ACT ---
            adjuster.initialize().unwrap();
            for round in 0..12 {
                clock.advance(1_500);
                adjuster.adjust(&memory_at(levels[round % levels.len()])).unwrap();

                // --- 3. ASSERT ---
                let current = adjuster.current_capacity();
                assert!(
                    (min_capacity..=max_capacity).contains(&current),
                    "{:?} [{}, {}] produced {}",
                    strategy,
                    min_capacity,
                    max_capacity,
                    current
                );
            }
        }
    }
}

#[test]
fn test_automatic_adjustments_respect_cooldown() {
    // --- 1. ARRANGE ---
    let clock = Arc::new(ManualClock::new(0));
    let config = CapacityConfiguration {
        stability_period_ms: 5_000,
        max_step: 2,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config, provider(20), clock.clone()).unwrap();
    adjuster.initialize().unwrap();

    // --- 2. ACT ---
    for round in 0..30u64 {
        clock.advance(1_000);
        let level = if (round / 3) % 2 == 0 {
            AlertLevel::Critical
        } else {
            AlertLevel::None
        };
        adjuster.adjust(&memory_at(level)).unwrap();
        if round == 13 {
            adjuster.set_capacity(12, "operator override").unwrap();
        }
    }

    // --- 3. ASSERT ---
    let mut history = adjuster.history(usize::MAX);
    history.reverse();
    assert!(history.len() > 3, "Expected several adjustments");
    assert!(history
        .iter()
        .any(|r| r.trigger == AdjustmentTrigger::Manual));
    for pair in history.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        if earlier.trigger == AdjustmentTrigger::Initialization
            || later.trigger == AdjustmentTrigger::Manual
        {
            continue;
        }
        assert!(
            later.timestamp_ms - earlier.timestamp_ms >= 5_000,
            "{:?} at {}ms followed {:?} at {}ms",
            later.trigger,
            later.timestamp_ms,
            earlier.trigger,
            earlier.timestamp_ms
        );
    }
}

#[test]
fn test_steps_are_limited() {
    let clock = Arc::new(ManualClock::new(0));
    let capability = Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB).with_recommended_capacity(4),
    ));
    let config = CapacityConfiguration {
        max_step: 3,
        stability_period_ms: 0,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config, capability.clone(), clock.clone()).unwrap();
    assert_eq!(adjuster.initialize().unwrap(), 4);

    capability.replace(CapabilitySnapshot::simulated(GIB).with_recommended_capacity(20));
    let record = adjuster.adjust(&ResourceStatus::default()).unwrap().unwrap();
    assert_eq!((record.old, record.new), (4, 7));
}

#[test]
fn test_hardware_mode_without_device_enters_error() {
    let clock = Arc::new(ManualClock::new(0));
    let config = CapacityConfiguration {
        mode: ExecutionMode::Hardware,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config, provider(20), clock).unwrap();

    let err = adjuster.initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    assert_eq!(adjuster.state(), AdjusterState::Error);

    // Reconfiguring back to simulation recovers.
    adjuster.set_config(CapacityConfiguration::default()).unwrap();
    assert_eq!(adjuster.state(), AdjusterState::Active);
}

#[test]
fn test_hardware_floor_above_device_fails() {
    // --- 1. ARRANGE ---
    let clock = Arc::new(ManualClock::new(0));
    let capability = Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB)
            .with_accelerator("qpu-4", 4)
            .with_recommended_capacity(20),
    ));
    let config = CapacityConfiguration {
        mode: ExecutionMode::Hardware,
        min_capacity: 8,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config, capability, clock).unwrap();

    // --- 2. ACT ---
    let err = adjuster.initialize().unwrap_err();

    // --- 3. ASSERT ---
    assert_eq!(err.kind(), ErrorKind::InsufficientResources);
    assert_eq!(adjuster.state(), AdjusterState::Error);

    // A floor the device can run recovers.
    adjuster
        .set_config(CapacityConfiguration {
            mode: ExecutionMode::Hardware,
            min_capacity: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(adjuster.state(), AdjusterState::Active);
    assert_eq!(adjuster.current_capacity(), 4);
}

#[test]
fn test_reconfiguration_clamp_skips_stability_period() {
    let clock = Arc::new(ManualClock::new(0));
    let config = CapacityConfiguration {
        stability_period_ms: 60_000,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config.clone(), provider(20), clock.clone()).unwrap();
    let initial = adjuster.initialize().unwrap();
    assert!(initial > 2);
    clock.advance(10);

    adjuster
        .set_config(CapacityConfiguration {
            max_capacity: initial - 1,
            ..config
        })
        .unwrap();

    assert_eq!(adjuster.current_capacity(), initial - 1);
    let last = adjuster.history(1).remove(0);
    assert_eq!(last.trigger, AdjustmentTrigger::Reconfiguration);
    assert_eq!((last.old, last.new), (initial, initial - 1));
}

#[test]
fn test_hardware_mode_uses_accelerator_units() {
    let clock = Arc::new(ManualClock::new(0));
    let capability = Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB)
            .with_accelerator("qpu-7", 7)
            .with_recommended_capacity(20),
    ));
    let config = CapacityConfiguration {
        mode: ExecutionMode::Hardware,
        ..Default::default()
    };
    let adjuster = CapacityAdjuster::new(config, capability, clock).unwrap();
    assert_eq!(adjuster.initialize().unwrap(), 7);
    assert_eq!(
        adjuster.set_capacity(8, "too many").unwrap_err().kind(),
        ErrorKind::InsufficientResources
    );
}
