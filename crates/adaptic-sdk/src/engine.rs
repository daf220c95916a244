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

//! The resource-adaptive engine: one instance of each component, driven by
//! a single ordered tick.

use crate::config::{EngineConfig, OptimizationLevel};
use adaptic_control::{
    AdjusterState, AdjustmentRecord, AllocationManager, AllocationProbe, Availability,
    CapacityAdjuster, RebalanceReport, SweepReport, TaskBalancer, TaskId,
};
use adaptic_core::capability::{CapabilityProvider, CapabilitySnapshot};
use adaptic_core::clock::{Clock, SystemClock};
use adaptic_core::control::{PerformancePrediction, PerformancePredictor};
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::ResourceProbe;
use adaptic_core::workload::{Priority, WorkloadDescriptor};
use adaptic_infra::{host_probes, SysinfoCapabilityDetector};
use adaptic_telemetry::ResourceMonitor;
use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineTickReport {
    /// Sequence number of the tick, starting at 1.
    pub tick: u64,
    /// When the tick started.
    pub timestamp_ms: u64,
    /// Whether the device was re-probed.
    pub capability_refreshed: bool,
    /// Whether at least one probe produced a sample.
    pub status_refreshed: bool,
    /// Capacity change applied by the adjuster.
    pub adjustment: Option<AdjustmentRecord>,
    /// Capacity offered after the adjuster ran.
    pub capacity: u32,
    /// Whether the allocator was told about a new ceiling.
    pub ceiling_changed: bool,
    /// Reservations and allocations reclaimed.
    pub sweep: SweepReport,
    /// Outcome of the balancer pass, if one ran.
    pub rebalance: Option<RebalanceReport>,
    /// Component failures that did not abort the tick.
    pub errors: Vec<ResourceError>,
}

/// Running counters of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngineStats {
    /// Completed ticks.
    pub ticks: u64,
    /// Capacity changes applied during ticks.
    pub adjustments: u64,
    /// Ceiling notifications sent to the allocator.
    pub ceiling_updates: u64,
    /// Balancer passes.
    pub rebalances: u64,
    /// Allocations reclaimed by sweeps.
    pub expired_allocations: u64,
    /// Reservations reclaimed by sweeps.
    pub expired_reservations: u64,
    /// Device re-probes.
    pub capability_refreshes: u64,
    /// Component errors reported by ticks.
    pub tick_errors: u64,
    /// Start of the last tick.
    pub last_tick_ms: u64,
}

/// Pre-submission feasibility estimate of a workload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadEstimate {
    /// Units the workload asked for.
    pub requested_capacity: u32,
    /// Units an allocation would grant right now; 0 if it would be denied.
    pub grantable_capacity: u32,
    /// Predicted execution at the requested capacity.
    pub prediction: PerformancePrediction,
    /// Allocator headroom for the predicted footprint.
    pub availability: Availability,
    /// Whether the predicted fidelity reaches the required one.
    pub meets_fidelity: bool,
    /// Whether the requested capacity is within the adjuster's current size.
    pub within_capacity: bool,
    /// Whether the workload could be admitted and run now.
    pub feasible: bool,
}

struct EngineInner {
    config: EngineConfig,
    stats: EngineStats,
    last_capability_refresh_ms: Option<u64>,
}

struct EngineShared {
    monitor: Arc<ResourceMonitor>,
    adjuster: Arc<CapacityAdjuster>,
    allocator: Arc<AllocationManager>,
    balancer: Arc<TaskBalancer>,
    provider: Arc<dyn CapabilityProvider>,
    clock: Arc<dyn Clock>,
    inner: Mutex<EngineInner>,
    tick_lock: Mutex<()>,
}

struct LoopHandle {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns a monitor, a capacity adjuster, an allocation manager and a task
/// balancer, and runs them in that order on every tick.
pub struct ResourceAdaptiveEngine {
    shared: Arc<EngineShared>,
    runner: Mutex<Option<LoopHandle>>,
}

impl EngineShared {
    fn inner(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn tick(&self) -> EngineTickReport {
        let _serial = self.tick_lock.lock().unwrap_or_else(|p| p.into_inner());
        let now = self.clock.now_millis();
        let (flags, refresh_due, tick) = {
            let inner = self.inner();
            let refresh_due = inner.last_capability_refresh_ms.map_or(true, |last| {
                now.saturating_sub(last) >= inner.config.capability_refresh_interval_ms
            });
            (inner.config.level.flags(), refresh_due, inner.stats.ticks + 1)
        };
        let mut report = EngineTickReport {
            tick,
            timestamp_ms: now,
            ..Default::default()
        };

        if flags.capability_refresh && refresh_due {
            match self.provider.refresh() {
                Ok(()) => report.capability_refreshed = true,
                Err(e) => {
                    log::warn!("Engine: Capability refresh failed: {}", e);
                    report.errors.push(e);
                }
            }
            self.inner().last_capability_refresh_ms = Some(now);
        }

        // 1. Monitor
        if flags.monitor {
            report.status_refreshed = self.monitor.refresh();
        }
        let status = self.monitor.last_status().unwrap_or_default();

        // 2. Adjuster
        if flags.adjuster {
            match self.adjuster.maybe_adjust(&status) {
                Ok(applied) => report.adjustment = applied,
                Err(e) => {
                    log::warn!("Engine: Capacity adjustment failed: {}", e);
                    report.errors.push(e);
                }
            }
        }
        report.capacity = self.adjuster.current_capacity();

        // 3. Allocation manager
        if sizes_the_system(self.adjuster.state())
            && self.allocator.capacity_ceiling() != Some(report.capacity)
        {
            self.allocator.set_capacity_ceiling(report.capacity);
            report.ceiling_changed = true;
        }
        if flags.sweep {
            report.sweep = self.allocator.sweep_expired();
        }

        // 4. Balancer
        if flags.balancer && (flags.rebalance_every_tick || self.balancer.is_due()) {
            report.rebalance = Some(self.balancer.rebalance());
        }

        // 5. Statistics
        {
            let mut inner = self.inner();
            let stats = &mut inner.stats;
            stats.ticks = tick;
            stats.last_tick_ms = now;
            stats.adjustments += report.adjustment.is_some() as u64;
            stats.ceiling_updates += report.ceiling_changed as u64;
            stats.rebalances += report.rebalance.is_some() as u64;
            stats.expired_allocations += report.sweep.expired_allocations.len() as u64;
            stats.expired_reservations += report.sweep.expired_reservations.len() as u64;
            stats.capability_refreshes += report.capability_refreshed as u64;
            stats.tick_errors += report.errors.len() as u64;
        }

        log::debug!(
            "Engine: Tick {} capacity={} adjusted={} swept={} rebalanced={}",
            tick,
            report.capacity,
            report.adjustment.is_some(),
            !report.sweep.is_empty(),
            report.rebalance.is_some()
        );
        report
    }
}

/// Whether the adjuster's capacity is meaningful for admission.
fn sizes_the_system(state: AdjusterState) -> bool {
    matches!(state, AdjusterState::Active | AdjusterState::Paused)
}

impl ResourceAdaptiveEngine {
    /// Builds an engine over `provider`, wiring every component to `clock`.
    ///
    /// The adjuster is initialized immediately. A device failure leaves it in
    /// its error state and is reported by every tick until
    /// [`set_config`](Self::set_config) recovers it.
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn CapabilityProvider>,
        clock: Arc<dyn Clock>,
    ) -> ResourceResult<Self> {
        config.validate()?;

        let monitor = Arc::new(ResourceMonitor::new(config.monitor.clone(), clock.clone())?);
        let adjuster = Arc::new(CapacityAdjuster::new(
            config.capacity.clone(),
            provider.clone(),
            clock.clone(),
        )?);
        let allocator = Arc::new(
            AllocationManager::new(config.allocation.clone(), clock.clone())?
                .with_predictor(adjuster.clone()),
        );
        let balancer = Arc::new(TaskBalancer::new(
            config.balancer.clone(),
            allocator.clone(),
            adjuster.clone(),
            clock.clone(),
        )?);
        monitor.register_probe(Arc::new(AllocationProbe::new(allocator.clone())));

        match adjuster.initialize() {
            Ok(capacity) => allocator.set_capacity_ceiling(capacity),
            Err(e) => log::error!("Engine: Capacity adjuster failed to initialize: {}", e),
        }

        log::info!(
            "Engine: Created at level {:?} with capacity {}.",
            config.level,
            adjuster.current_capacity()
        );

        Ok(Self {
            shared: Arc::new(EngineShared {
                monitor,
                adjuster,
                allocator,
                balancer,
                provider,
                clock,
                inner: Mutex::new(EngineInner {
                    config,
                    stats: EngineStats::default(),
                    last_capability_refresh_ms: None,
                }),
                tick_lock: Mutex::new(()),
            }),
            runner: Mutex::new(None),
        })
    }

    /// Builds an engine for the local machine: a sysinfo capability detector,
    /// the host resource probes and the system clock.
    pub fn for_host(config: EngineConfig) -> ResourceResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let detector = Arc::new(SysinfoCapabilityDetector::new(clock.clone()));
        let engine = Self::new(config, detector, clock)?;
        for probe in host_probes() {
            engine.register_probe(probe);
        }
        Ok(engine)
    }

    /// Adds a probe to the monitor.
    pub fn register_probe(&self, probe: Arc<dyn ResourceProbe>) {
        self.shared.monitor.register_probe(probe);
    }

    /// Runs one ordered pass: monitor, adjuster, allocator, balancer.
    ///
    /// Ticks never overlap; a concurrent call waits for the running one.
    pub fn tick(&self) -> EngineTickReport {
        self.shared.tick()
    }

    /// Starts the background loop ticking every `tick_interval_ms`.
    /// Calling it while running is a no-op.
    pub fn start(&self) -> ResourceResult<()> {
        let mut runner = self.runner.lock().unwrap_or_else(|p| p.into_inner());
        if runner.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);

        let handle = thread::Builder::new()
            .name("adaptic-engine".into())
            .spawn(move || {
                log::info!("Engine: Loop started.");
                loop {
                    shared.tick();
                    let interval = Duration::from_millis(shared.inner().config.tick_interval_ms);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Engine: Loop stopped.");
            })
            .map_err(|e| ResourceError::Internal(format!("failed to spawn engine loop: {e}")))?;

        *runner = Some(LoopHandle { stop_tx, handle });
        Ok(())
    }

    /// Stops the background loop and waits for an in-flight tick. Idempotent.
    pub fn stop(&self) {
        let taken = self
            .runner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(LoopHandle { stop_tx, handle }) = taken {
            let _ = stop_tx.try_send(());
            drop(stop_tx);
            // A callback running inside a tick must not join its own thread.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Whether the background loop is running.
    pub fn is_running(&self) -> bool {
        self.runner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Queues a workload with the balancer.
    pub fn submit(&self, workload: WorkloadDescriptor, priority: Priority) -> ResourceResult<TaskId> {
        self.shared.balancer.submit(workload, priority)
    }

    /// Estimates whether `workload` could run now, without changing any state.
    pub fn optimize_workload(&self, workload: &WorkloadDescriptor) -> ResourceResult<WorkloadEstimate> {
        workload.validate()?;
        let capacity = workload.required_capacity;
        let prediction = self
            .shared
            .adjuster
            .predict_performance(capacity, workload.circuit_depth);
        let availability = self
            .shared
            .allocator
            .check_availability(capacity, prediction.memory_bytes);

        let allocation = self.shared.allocator.config();
        let grantable_capacity = if availability.sufficient {
            capacity
        } else if allocation.flexible_allocation
            && availability.available_memory >= prediction.memory_bytes
            && availability.available_capacity >= allocation.min_acceptable_units
            && allocation.min_acceptable_units <= availability.total_capacity
        {
            availability.available_capacity.min(capacity)
        } else {
            0
        };

        let meets_fidelity = prediction.fidelity >= workload.required_fidelity;
        let within_capacity = capacity <= self.shared.adjuster.current_capacity();
        let feasible =
            prediction.feasible && meets_fidelity && within_capacity && grantable_capacity > 0;

        Ok(WorkloadEstimate {
            requested_capacity: capacity,
            grantable_capacity,
            prediction,
            availability,
            meets_fidelity,
            within_capacity,
            feasible,
        })
    }

    /// Replaces the configuration of the engine and every component.
    ///
    /// All parts are validated first; nothing changes on a validation error.
    /// A device failure while re-initializing the adjuster is returned after
    /// the other components were reconfigured.
    pub fn set_config(&self, config: EngineConfig) -> ResourceResult<()> {
        config.validate()?;
        let _serial = self
            .shared
            .tick_lock
            .lock()
            .unwrap_or_else(|p| p.into_inner());

        self.shared.monitor.set_config(config.monitor.clone())?;
        self.shared.allocator.set_config(config.allocation.clone())?;
        self.shared.balancer.set_config(config.balancer.clone())?;
        let adjusted = self.shared.adjuster.set_config(config.capacity.clone());
        if adjusted.is_ok() && sizes_the_system(self.shared.adjuster.state()) {
            self.shared
                .allocator
                .set_capacity_ceiling(self.shared.adjuster.current_capacity());
        }

        log::info!("Engine: Configuration updated (level {:?}).", config.level);
        self.shared.inner().config = config;
        adjusted
    }

    /// Changes the optimization level only.
    pub fn set_level(&self, level: OptimizationLevel) {
        self.shared.inner().config.level = level;
        log::info!("Engine: Optimization level set to {:?}.", level);
    }

    /// Returns a copy of the configuration.
    pub fn config(&self) -> EngineConfig {
        self.shared.inner().config.clone()
    }

    /// The current optimization level.
    pub fn level(&self) -> OptimizationLevel {
        self.shared.inner().config.level
    }

    /// Returns the running counters.
    pub fn stats(&self) -> EngineStats {
        self.shared.inner().stats
    }

    /// The device capability currently used for sizing.
    pub fn capability(&self) -> CapabilitySnapshot {
        self.shared.provider.capability()
    }

    /// The clock every component reads.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// The resource monitor.
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.shared.monitor
    }

    /// The capacity adjuster.
    pub fn adjuster(&self) -> &Arc<CapacityAdjuster> {
        &self.shared.adjuster
    }

    /// The allocation manager.
    pub fn allocator(&self) -> &Arc<AllocationManager> {
        &self.shared.allocator
    }

    /// The task balancer.
    pub fn balancer(&self) -> &Arc<TaskBalancer> {
        &self.shared.balancer
    }
}

impl Drop for ResourceAdaptiveEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
