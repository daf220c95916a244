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
    AllocationConfig, AllocationManager, BalancerConfig, CapacityAdjuster, CapacityConfiguration,
    SchedulingStrategy, TaskBalancer, TaskStatus,
};
use adaptic_core::{
    CapabilitySnapshot, ExecutionFeedback, ManualClock, Priority, ResourceError,
    StaticCapabilityProvider, WorkloadDescriptor,
};
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

struct Harness {
    balancer: TaskBalancer,
    allocator: Arc<AllocationManager>,
    adjuster: Arc<CapacityAdjuster>,
    clock: Arc<ManualClock>,
}

/// A balancer over `units` computation units, estimating workloads with a
/// real capacity adjuster.
fn harness(units: u32, config: BalancerConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(10_000));
    let provider = Arc::new(StaticCapabilityProvider::new(
        CapabilitySnapshot::simulated(GIB).with_recommended_capacity(units),
    ));
    let adjuster = Arc::new(
        CapacityAdjuster::new(CapacityConfiguration::default(), provider, clock.clone()).unwrap(),
    );
    adjuster.initialize().unwrap();
    let allocator = Arc::new(
        AllocationManager::new(
            AllocationConfig {
                max_capacity: units,
                ..Default::default()
            },
            clock.clone(),
        )
        .unwrap()
        .with_predictor(adjuster.clone()),
    );
    let balancer =
        TaskBalancer::new(config, allocator.clone(), adjuster.clone(), clock.clone()).unwrap();
    Harness {
        balancer,
        allocator,
        adjuster,
        clock,
    }
}

fn strategy(strategy: SchedulingStrategy) -> BalancerConfig {
    BalancerConfig {
        strategy,
        ..Default::default()
    }
}

#[test]
fn test_deadline_first_runs_earliest_deadline() {
    // --- 1. ARRANGE ---
    let h = harness(4, strategy(SchedulingStrategy::DeadlineFirst));
    let later = h
        .balancer
        .submit(
            WorkloadDescriptor::new("later", 4, 20).with_deadline(10),
            Priority::Normal,
        )
        .unwrap();
    let sooner = h
        .balancer
        .submit(
            WorkloadDescriptor::new("sooner", 4, 20).with_deadline(5),
            Priority::Normal,
        )
        .unwrap();

    // --- 2. ACT ---
    let report = h.balancer.rebalance();

    // --- 3. ASSERT ---
    assert_eq!(report.scheduled, vec![sooner]);
    assert_eq!(report.deferred, vec![later]);
    assert_eq!(h.balancer.task(sooner).unwrap().status, TaskStatus::Running);
    assert_eq!(h.balancer.task(later).unwrap().status, TaskStatus::Pending);
}

#[test]
fn test_priority_strategy_orders_classes() {
    let h = harness(2, strategy(SchedulingStrategy::Priority));
    let low = h
        .balancer
        .submit(WorkloadDescriptor::new("low", 2, 5), Priority::Low)
        .unwrap();
    let high = h
        .balancer
        .submit(WorkloadDescriptor::new("high", 2, 5), Priority::High)
        .unwrap();

    let report = h.balancer.rebalance();
    assert_eq!(report.scheduled, vec![high]);
    assert_eq!(report.deferred, vec![low]);
}

#[test]
fn test_critical_task_preempts_lowest_priority_victim() {
    // --- 1. ARRANGE ---
    let h = harness(8, BalancerConfig::default());
    let background = h
        .balancer
        .submit(WorkloadDescriptor::new("background", 6, 10), Priority::Low)
        .unwrap();
    let small = h
        .balancer
        .submit(WorkloadDescriptor::new("small", 2, 10), Priority::Normal)
        .unwrap();
    h.balancer.rebalance();
    assert_eq!(h.allocator.stats().units_in_use, 8);

    let urgent = h
        .balancer
        .submit(WorkloadDescriptor::new("urgent", 5, 10), Priority::Critical)
        .unwrap();

    // --- 2. ACT ---
    let report = h.balancer.rebalance();

    // --- 3. ASSERT ---
    assert_eq!(report.preempted, vec![background]);
    assert_eq!(report.scheduled, vec![urgent]);

    let victim = h.balancer.task(background).unwrap();
    assert_eq!(victim.status, TaskStatus::Pending);
    assert_eq!(victim.priority, Priority::Low, "Priority must survive preemption");
    assert_eq!(victim.preemption_count, 1);
    assert_eq!(victim.allocation_id, None);

    let winner = h.balancer.task(urgent).unwrap();
    assert_eq!(winner.granted_capacity, 5);
    assert_eq!(h.balancer.task(small).unwrap().status, TaskStatus::Running);
    assert_eq!(h.allocator.stats().units_in_use, 7);
}

#[test]
fn test_preempted_task_resumes_ahead_of_its_class() {
    let h = harness(8, BalancerConfig::default());
    let victim = h
        .balancer
        .submit(WorkloadDescriptor::new("victim", 6, 10), Priority::Low)
        .unwrap();
    h.balancer.rebalance();
    let queued = h
        .balancer
        .submit(WorkloadDescriptor::new("queued", 6, 10), Priority::Low)
        .unwrap();
    let urgent = h
        .balancer
        .submit(WorkloadDescriptor::new("urgent", 8, 10), Priority::Critical)
        .unwrap();
    let report = h.balancer.rebalance();
    assert_eq!(report.preempted, vec![victim]);

    h.balancer.complete_task(urgent, None).unwrap();
    let report = h.balancer.rebalance();
    assert_eq!(report.scheduled, vec![victim]);
    assert_eq!(report.deferred, vec![queued]);
}

/// Times out tasks left pending for one second.
fn short_queue() -> BalancerConfig {
    BalancerConfig {
        max_task_age_ms: 1_000,
        ..Default::default()
    }
}

#[test]
fn test_preempted_task_outlives_queue_age_since_submission() {
    // --- 1. ARRANGE ---
    let h = harness(8, short_queue());
    let background = h
        .balancer
        .submit(WorkloadDescriptor::new("background", 6, 10), Priority::Low)
        .unwrap();
    h.balancer.rebalance();
    h.clock.advance(750);
    h.balancer.rebalance();
    h.clock.advance(750);
    let urgent = h
        .balancer
        .submit(WorkloadDescriptor::new("urgent", 5, 10), Priority::Critical)
        .unwrap();
    assert_eq!(h.balancer.rebalance().preempted, vec![background]);

    // --- 2. ACT ---
    h.clock.advance(900);
    let waiting = h.balancer.rebalance();
    h.balancer.complete_task(urgent, None).unwrap();
    let resumed = h.balancer.rebalance();

    // --- 3. ASSERT ---
    assert!(waiting.timed_out.is_empty());
    assert_eq!(waiting.deferred, vec![background]);
    assert!(resumed.timed_out.is_empty());
    assert_eq!(resumed.scheduled, vec![background]);
    let task = h.balancer.task(background).unwrap();
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.last_error, None);
}

#[test]
fn test_retried_task_outlives_queue_age_since_submission() {
    // --- 1. ARRANGE ---
    let h = harness(8, short_queue());
    let id = h
        .balancer
        .submit(WorkloadDescriptor::new("flaky", 4, 10), Priority::Normal)
        .unwrap();
    h.balancer.rebalance();
    h.clock.advance(750);
    h.balancer.rebalance();
    h.clock.advance(750);

    // --- 2. ACT ---
    let status = h
        .balancer
        .fail_task(id, ResourceError::Internal("transient".into()))
        .unwrap();
    let report = h.balancer.rebalance();

    // --- 3. ASSERT ---
    assert_eq!(status, TaskStatus::Pending);
    assert!(report.timed_out.is_empty());
    assert_eq!(report.scheduled, vec![id]);
    let task = h.balancer.task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(task.retry_count, 1);

    // A requeued task still times out once it waits the full age.
    h.balancer
        .fail_task(id, ResourceError::Internal("transient".into()))
        .unwrap();
    h.clock.advance(1_000);
    assert_eq!(h.balancer.rebalance().timed_out, vec![id]);
}

#[test]
fn test_non_preemptible_tasks_are_not_victims() {
    let h = harness(4, BalancerConfig::default());
    let pinned = h
        .balancer
        .submit(
            WorkloadDescriptor::new("pinned", 4, 10).non_preemptible(),
            Priority::Low,
        )
        .unwrap();
    h.balancer.rebalance();
    let urgent = h
        .balancer
        .submit(WorkloadDescriptor::new("urgent", 2, 10), Priority::Critical)
        .unwrap();

    let report = h.balancer.rebalance();
    assert!(report.preempted.is_empty());
    assert_eq!(report.deferred, vec![urgent]);
    assert_eq!(h.balancer.task(pinned).unwrap().status, TaskStatus::Running);
}

#[test]
fn test_preemption_disabled_defers_critical_work() {
    let h = harness(
        4,
        BalancerConfig {
            enable_task_preemption: false,
            ..Default::default()
        },
    );
    h.balancer
        .submit(WorkloadDescriptor::new("busy", 4, 10), Priority::Low)
        .unwrap();
    h.balancer.rebalance();
    h.balancer
        .submit(WorkloadDescriptor::new("urgent", 2, 10), Priority::Critical)
        .unwrap();

    let report = h.balancer.rebalance();
    assert!(report.preempted.is_empty());
    assert_eq!(report.deferred.len(), 1);
}

#[test]
fn test_completion_feedback_reaches_adjuster() {
    let h = harness(4, BalancerConfig::default());
    let id = h
        .balancer
        .submit(WorkloadDescriptor::new("job", 3, 40), Priority::Normal)
        .unwrap();
    h.balancer.rebalance();
    h.clock.advance(80);

    h.balancer
        .complete_task(
            id,
            Some(ExecutionFeedback {
                capacity: 3,
                circuit_depth: 40,
                error_rate: 0.01,
                runtime_ms: 80.0,
            }),
        )
        .unwrap();

    assert_eq!(h.adjuster.feedback_samples(), 1);
    assert_eq!(h.allocator.stats().units_in_use, 0);
    let stats = h.balancer.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.running, 0);
}

#[test]
fn test_fair_strategy_alternates_classes() {
    let h = harness(1, strategy(SchedulingStrategy::Fair));
    for i in 0..2 {
        h.balancer
            .submit(WorkloadDescriptor::new(format!("high-{i}"), 1, 1), Priority::High)
            .unwrap();
        h.balancer
            .submit(WorkloadDescriptor::new(format!("low-{i}"), 1, 1), Priority::Low)
            .unwrap();
    }

    let mut served = Vec::new();
    for _ in 0..4 {
        let report = h.balancer.rebalance();
        let id = report.scheduled[0];
        served.push(h.balancer.task(id).unwrap().priority);
        h.balancer.complete_task(id, None).unwrap();
    }

    assert!(served.contains(&Priority::Low), "Low class starved: {:?}", served);
    assert_eq!(served.iter().filter(|p| **p == Priority::High).count(), 2);
}
