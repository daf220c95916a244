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

//! The capacity adjuster: a feedback loop sizing the number of computation
//! units the layer offers.
//!
//! Each evaluation starts from the device's recommended capacity, scales it
//! by the configured strategy and the current resource pressure, fits it to
//! the execution mode, and clamps it to the configured bounds. Applied
//! changes are step limited and separated by a stability period.

pub mod config;
pub mod feedback;

pub use config::{CapacityConfiguration, CapacityStrategy, ExecutionMode};
pub use feedback::FeedbackStore;

use adaptic_core::callback::{CallbackHandle, CallbackRegistry};
use adaptic_core::capability::{state_vector_bytes, CapabilityProvider, CapabilitySnapshot};
use adaptic_core::clock::Clock;
use adaptic_core::control::{ExecutionFeedback, PerformancePrediction, PerformancePredictor};
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::history::HistoryRing;
use adaptic_core::monitoring::{AlertLevel, ResourceKind, ResourceStatus};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bytes of control memory per physical unit.
const HARDWARE_BYTES_PER_UNIT: u64 = 1024;

/// Lifecycle of the adjuster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AdjusterState {
    /// Constructed, not yet initialized.
    #[default]
    Inactive,
    /// Computing the initial capacity.
    Initializing,
    /// Evaluating and applying adjustments.
    Active,
    /// Holding the current capacity; periodic evaluation is skipped.
    Paused,
    /// Applying a change.
    Adjusting,
    /// Resetting feedback and cooldown.
    Calibrating,
    /// Misconfigured until `set_config` is called.
    Error,
}

impl AdjusterState {
    /// Returns `true` if moving from `self` to `next` is a valid transition.
    pub fn can_transition_to(self, next: AdjusterState) -> bool {
        use AdjusterState::*;
        matches!(
            (self, next),
            (Inactive, Initializing)
                | (Initializing, Active)
                | (Initializing, Error)
                | (Active, Paused)
                | (Active, Adjusting)
                | (Active, Calibrating)
                | (Active, Error)
                | (Paused, Active)
                | (Paused, Adjusting)
                | (Paused, Calibrating)
                | (Paused, Error)
                | (Adjusting, Active)
                | (Adjusting, Paused)
                | (Adjusting, Error)
                | (Calibrating, Active)
                | (Calibrating, Paused)
                | (Error, Inactive)
                | (Error, Initializing)
        )
    }
}

/// What caused a capacity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdjustmentTrigger {
    /// The initial capacity.
    Initialization,
    /// A periodic evaluation without resource pressure.
    Periodic,
    /// A periodic evaluation while memory or CPU was under pressure.
    ResourcePressure,
    /// An explicit `set_capacity` call.
    Manual,
    /// New bounds from `set_config`.
    Reconfiguration,
}

/// One applied capacity change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentRecord {
    /// Capacity before the change.
    pub old: u32,
    /// Capacity after the change.
    pub new: u32,
    /// Why the change happened.
    pub trigger: AdjustmentTrigger,
    /// Human-readable explanation.
    pub reason: String,
    /// When the change was applied.
    pub timestamp_ms: u64,
}

/// The adjuster's externally visible state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapacityState {
    /// Capacity currently offered.
    pub current_capacity: u32,
    /// Reason of the last change.
    pub last_reason: String,
    /// Time of the last periodic or manual change.
    pub last_adjustment_ms: Option<u64>,
    /// Trigger of the last change.
    pub last_trigger: Option<AdjustmentTrigger>,
    /// Number of applied changes, initialization excluded.
    pub adjustment_count: u64,
    /// Changes that raised the capacity.
    pub up_count: u64,
    /// Changes that lowered the capacity.
    pub down_count: u64,
    /// Whether the last evaluation was cut short by memory.
    pub resource_limited: bool,
}

/// Result of a target computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityDecision {
    /// The clamped target capacity.
    pub target: u32,
    /// Whether memory forced the target down.
    pub resource_limited: bool,
    /// Whether the resource status scaled the target down.
    pub under_pressure: bool,
    /// Explanation recorded with an applied change.
    pub reason: String,
}

/// Handler invoked with `(old, new)` after every applied change.
pub type CapacityCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Memory budget for simulation under `config`.
pub fn memory_limit(config: &CapacityConfiguration, capability: &CapabilitySnapshot) -> u64 {
    if config.memory_limit_bytes > 0 {
        config.memory_limit_bytes
    } else {
        capability.memory.available_bytes
    }
}

/// Splits a hybrid capacity into its simulated and physical shares.
pub fn split_hybrid(capacity: u32, physical_units: u32) -> (u32, u32) {
    let physical = (capacity - capacity / 2).min(physical_units);
    (capacity - physical, physical)
}

fn fit_simulated(capacity: u32, floor: u32, limit: u64, precision: u32) -> (u32, bool) {
    let mut fitted = capacity;
    let mut limited = false;
    while fitted > floor && state_vector_bytes(fitted, precision) > limit {
        fitted -= 1;
        limited = true;
    }
    (fitted, limited)
}

/// Computes the target capacity for `status` without side effects.
pub fn compute_target(
    config: &CapacityConfiguration,
    feedback: &FeedbackStore,
    capability: &CapabilitySnapshot,
    status: &ResourceStatus,
) -> ResourceResult<CapacityDecision> {
    let base = capability.recommended_capacity as f64;
    let feedback_multiplier = feedback.multiplier(config.error_threshold, config.reference_depth);
    let factor = match config.strategy {
        CapacityStrategy::Adaptive => feedback_multiplier,
        CapacityStrategy::Custom => config.custom_factor * feedback_multiplier,
        fixed => fixed.fixed_factor().unwrap_or(1.0),
    };

    let mut pressure = match status.level(ResourceKind::Memory) {
        AlertLevel::Critical => 0.8,
        AlertLevel::Warning => 0.9,
        AlertLevel::None => 1.0,
    };
    if status.level(ResourceKind::Cpu) == AlertLevel::Critical {
        pressure *= 0.9;
    }

    let scaled = (base * factor * pressure).round().max(0.0);
    let scaled = scaled.min(u32::MAX as f64) as u32;
    let limit = memory_limit(config, capability);

    let (fitted, resource_limited) = match config.mode {
        ExecutionMode::Simulated => {
            fit_simulated(scaled, config.min_capacity, limit, config.precision_factor)
        }
        ExecutionMode::Hardware => {
            if !capability.has_accelerator() {
                return Err(ResourceError::DeviceUnavailable(format!(
                    "hardware mode requested but device '{}' has no accelerator",
                    capability.device_name
                )));
            }
            let units = capability.physical_units();
            if units < config.min_capacity {
                return Err(ResourceError::insufficient(format!(
                    "device '{}' has {} physical units, below min_capacity {}",
                    capability.device_name, units, config.min_capacity
                )));
            }
            (scaled.min(units), false)
        }
        ExecutionMode::Hybrid => {
            let share = scaled / 2;
            let (simulated, limited) = fit_simulated(share, 0, limit, config.precision_factor);
            let physical = (scaled - share).min(capability.physical_units());
            (simulated + physical, limited)
        }
    };

    let target = config.clamp(fitted);
    Ok(CapacityDecision {
        target,
        resource_limited,
        under_pressure: pressure < 1.0,
        reason: format!(
            "{:?}/{:?}: base {} × {:.2} × pressure {:.2} → {}{}",
            config.strategy,
            config.mode,
            capability.recommended_capacity,
            factor,
            pressure,
            target,
            if resource_limited { " (memory limited)" } else { "" }
        ),
    })
}

/// Checks that `capacity` is within bounds and supported by the device.
pub fn check_capacity(
    config: &CapacityConfiguration,
    capability: &CapabilitySnapshot,
    capacity: u32,
) -> ResourceResult<()> {
    if !(config.min_capacity..=config.max_capacity).contains(&capacity) {
        return Err(ResourceError::invalid(format!(
            "capacity {} outside [{}, {}]",
            capacity, config.min_capacity, config.max_capacity
        )));
    }
    let limit = memory_limit(config, capability);
    let simulated = match config.mode {
        ExecutionMode::Simulated => capacity,
        ExecutionMode::Hardware => {
            if !capability.has_accelerator() {
                return Err(ResourceError::DeviceUnavailable(format!(
                    "device '{}' has no accelerator",
                    capability.device_name
                )));
            }
            if capacity > capability.physical_units() {
                return Err(ResourceError::insufficient(format!(
                    "capacity {} exceeds the {} physical units of '{}'",
                    capacity,
                    capability.physical_units(),
                    capability.device_name
                )));
            }
            return Ok(());
        }
        ExecutionMode::Hybrid => split_hybrid(capacity, capability.physical_units()).0,
    };
    let needed = state_vector_bytes(simulated, config.precision_factor);
    if needed > limit {
        return Err(ResourceError::insufficient(format!(
            "{} simulated units need {} bytes, limit is {}",
            simulated, needed, limit
        )));
    }
    Ok(())
}

/// Predicts fidelity, memory and runtime of a workload.
pub fn predict(
    config: &CapacityConfiguration,
    capability: &CapabilitySnapshot,
    capacity: u32,
    circuit_depth: u32,
) -> PerformancePrediction {
    let compute = &capability.compute;
    let fidelity = (compute.base_fidelity
        * (-compute.gate_error_rate * circuit_depth as f64).exp()
        * (-config.strategy.unit_penalty() * capacity as f64).exp())
    .clamp(0.0, 1.0);

    let simulated_memory = state_vector_bytes(capacity, config.precision_factor);
    let hardware_memory = (capacity as u64).saturating_mul(HARDWARE_BYTES_PER_UNIT);
    let simulated_runtime = circuit_depth as f64 * 2f64.powi(capacity as i32) / 1e6;
    let hardware_runtime = circuit_depth as f64 * config.gate_time_us / 1000.0;

    let (memory_bytes, runtime_ms) = match config.mode {
        ExecutionMode::Simulated => (simulated_memory, simulated_runtime),
        ExecutionMode::Hardware => (hardware_memory, hardware_runtime),
        ExecutionMode::Hybrid => (
            (simulated_memory / 2).saturating_add(hardware_memory / 2),
            (simulated_runtime + hardware_runtime) / 2.0,
        ),
    };

    PerformancePrediction {
        capacity,
        circuit_depth,
        fidelity,
        memory_bytes,
        runtime_ms,
        feasible: fidelity >= config.fidelity_threshold
            && memory_bytes <= memory_limit(config, capability),
    }
}

struct AdjusterInner {
    config: CapacityConfiguration,
    state: AdjusterState,
    capacity: CapacityState,
    history: HistoryRing<AdjustmentRecord>,
    feedback: FeedbackStore,
    last_evaluation_ms: Option<u64>,
    last_target: Option<u32>,
    last_error: Option<ResourceError>,
}

impl AdjusterInner {
    fn transition(&mut self, next: AdjusterState) -> ResourceResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ResourceError::invalid(format!(
                "adjuster cannot move from {:?} to {:?}",
                self.state, next
            )));
        }
        log::trace!("Adjuster: {:?} → {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, error: ResourceError) {
        log::error!("Adjuster: Entering error state: {}", error);
        self.state = AdjusterState::Error;
        self.last_error = Some(error);
    }

    fn apply(
        &mut self,
        new: u32,
        trigger: AdjustmentTrigger,
        reason: String,
        now: u64,
    ) -> ResourceResult<AdjustmentRecord> {
        let resume_to = self.state;
        self.transition(AdjusterState::Adjusting)?;

        let old = self.capacity.current_capacity;
        debug_assert!((self.config.min_capacity..=self.config.max_capacity).contains(&new));
        self.capacity.current_capacity = new;
        self.capacity.last_reason = reason.clone();
        self.capacity.last_adjustment_ms = Some(now);
        self.capacity.last_trigger = Some(trigger);
        self.capacity.adjustment_count += 1;
        if new > old {
            self.capacity.up_count += 1;
        } else {
            self.capacity.down_count += 1;
        }

        let record = AdjustmentRecord {
            old,
            new,
            trigger,
            reason,
            timestamp_ms: now,
        };
        self.history.push(record.clone());
        self.transition(resume_to)?;

        log::info!(
            "Adjuster: Capacity {} → {} ({:?}: {})",
            old,
            new,
            trigger,
            record.reason
        );
        Ok(record)
    }
}

/// Sizes the capacity of the layer from device capability, resource status
/// and execution feedback.
pub struct CapacityAdjuster {
    inner: Mutex<AdjusterInner>,
    callbacks: Mutex<CallbackRegistry<CapacityCallback>>,
    provider: Arc<dyn CapabilityProvider>,
    clock: Arc<dyn Clock>,
}

impl CapacityAdjuster {
    /// Creates an inactive adjuster. The capacity starts at `min_capacity`
    /// until [`initialize`](Self::initialize) is called.
    pub fn new(
        config: CapacityConfiguration,
        provider: Arc<dyn CapabilityProvider>,
        clock: Arc<dyn Clock>,
    ) -> ResourceResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Mutex::new(AdjusterInner {
                capacity: CapacityState {
                    current_capacity: config.min_capacity,
                    ..Default::default()
                },
                history: HistoryRing::with_capacity(config.history_size),
                feedback: FeedbackStore::new(config.feedback_window),
                state: AdjusterState::Inactive,
                last_evaluation_ms: None,
                last_target: None,
                last_error: None,
                config,
            }),
            callbacks: Mutex::new(CallbackRegistry::new()),
            provider,
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, AdjusterInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn notify(&self, old: u32, new: u32) {
        if old == new {
            return;
        }
        let callbacks: Vec<CapacityCallback> = self
            .callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .snapshot_where(|_| true);
        for callback in callbacks {
            callback(old, new);
        }
    }

    /// Computes and applies the initial capacity.
    ///
    /// Uses `target_capacity` when configured, the computed target otherwise.
    /// Calling it on an active or paused adjuster returns the current capacity.
    pub fn initialize(&self) -> ResourceResult<u32> {
        let capability = self.provider.capability();
        let now = self.clock.now_millis();
        let (old, new) = {
            let mut inner = self.lock();
            match inner.state {
                AdjusterState::Active | AdjusterState::Paused => {
                    return Ok(inner.capacity.current_capacity)
                }
                _ => inner.transition(AdjusterState::Initializing)?,
            }

            let pinned = inner.config.target_capacity;
            let target = match pinned {
                Some(target) => check_capacity(&inner.config, &capability, target).map(|_| target),
                None => compute_target(
                    &inner.config,
                    &inner.feedback,
                    &capability,
                    &ResourceStatus::default(),
                )
                .map(|decision| {
                    inner.capacity.resource_limited = decision.resource_limited;
                    decision.target
                }),
            };
            let target = match target {
                Ok(target) => target,
                Err(e) => {
                    inner.fail(e.clone());
                    return Err(e);
                }
            };

            inner.transition(AdjusterState::Active)?;
            inner.last_error = None;
            let old = inner.capacity.current_capacity;
            inner.capacity.current_capacity = target;
            inner.capacity.last_trigger = Some(AdjustmentTrigger::Initialization);
            inner.capacity.last_reason = "initialization".into();
            inner.history.push(AdjustmentRecord {
                old,
                new: target,
                trigger: AdjustmentTrigger::Initialization,
                reason: "initialization".into(),
                timestamp_ms: now,
            });
            log::info!(
                "Adjuster: Initialized at {} units ({:?}, {:?}).",
                target,
                inner.config.strategy,
                inner.config.mode
            );
            (old, target)
        };
        self.notify(old, new);
        Ok(new)
    }

    fn evaluate(
        &self,
        status: &ResourceStatus,
        gated: bool,
    ) -> ResourceResult<Option<AdjustmentRecord>> {
        let capability = self.provider.capability();
        let now = self.clock.now_millis();
        let record = {
            let mut inner = self.lock();
            match inner.state {
                AdjusterState::Active => {}
                AdjusterState::Paused => return Ok(None),
                AdjusterState::Error => {
                    return Err(inner.last_error.clone().unwrap_or_else(|| {
                        ResourceError::DeviceUnavailable("adjuster in error state".into())
                    }))
                }
                other => {
                    return Err(ResourceError::invalid(format!(
                        "adjuster is {:?}, not active",
                        other
                    )))
                }
            }

            if gated {
                if !inner.config.auto_adjust {
                    return Ok(None);
                }
                if let Some(last) = inner.last_evaluation_ms {
                    if now.saturating_sub(last) < inner.config.adjustment_interval_ms {
                        return Ok(None);
                    }
                }
                inner.last_evaluation_ms = Some(now);
            }

            let decision = match compute_target(&inner.config, &inner.feedback, &capability, status)
            {
                Ok(decision) => decision,
                Err(e) => {
                    inner.fail(e.clone());
                    return Err(e);
                }
            };
            inner.capacity.resource_limited = decision.resource_limited;
            inner.last_target = Some(decision.target);

            if let Some(last) = inner.capacity.last_adjustment_ms {
                let elapsed = now.saturating_sub(last);
                if elapsed < inner.config.stability_period_ms {
                    log::debug!(
                        "Adjuster: Target {} held back by cooldown ({}ms of {}ms).",
                        decision.target,
                        elapsed,
                        inner.config.stability_period_ms
                    );
                    return Ok(None);
                }
            }

            let current = inner.capacity.current_capacity;
            if decision.target == current {
                return Ok(None);
            }
            let step = inner.config.max_step;
            let next = if decision.target > current {
                current + (decision.target - current).min(step)
            } else {
                current - (current - decision.target).min(step)
            };
            let trigger = if decision.under_pressure {
                AdjustmentTrigger::ResourcePressure
            } else {
                AdjustmentTrigger::Periodic
            };
            inner.apply(next, trigger, decision.reason, now)?
        };
        self.notify(record.old, record.new);
        Ok(Some(record))
    }

    /// Evaluates the target for `status` and applies a step toward it if the
    /// cooldown has elapsed. Returns the applied change, if any.
    pub fn adjust(&self, status: &ResourceStatus) -> ResourceResult<Option<AdjustmentRecord>> {
        self.evaluate(status, false)
    }

    /// Like [`adjust`](Self::adjust), but only when `auto_adjust` is set and
    /// `adjustment_interval_ms` has passed since the last evaluation.
    pub fn maybe_adjust(
        &self,
        status: &ResourceStatus,
    ) -> ResourceResult<Option<AdjustmentRecord>> {
        self.evaluate(status, true)
    }

    /// Computes the target for `status` without applying it.
    pub fn compute_target(&self, status: &ResourceStatus) -> ResourceResult<CapacityDecision> {
        let capability = self.provider.capability();
        let inner = self.lock();
        compute_target(&inner.config, &inner.feedback, &capability, status)
    }

    /// Sets the capacity directly, bypassing the cooldown.
    pub fn set_capacity(&self, capacity: u32, reason: &str) -> ResourceResult<()> {
        let capability = self.provider.capability();
        let now = self.clock.now_millis();
        let record = {
            let mut inner = self.lock();
            match inner.state {
                AdjusterState::Active | AdjusterState::Paused => {}
                AdjusterState::Error => {
                    return Err(inner.last_error.clone().unwrap_or_else(|| {
                        ResourceError::DeviceUnavailable("adjuster in error state".into())
                    }))
                }
                other => {
                    return Err(ResourceError::invalid(format!(
                        "adjuster is {:?}, not active",
                        other
                    )))
                }
            }
            check_capacity(&inner.config, &capability, capacity)?;
            if capacity == inner.capacity.current_capacity {
                return Ok(());
            }
            inner.apply(capacity, AdjustmentTrigger::Manual, reason.to_string(), now)?
        };
        self.notify(record.old, record.new);
        Ok(())
    }

    /// Holds the current capacity.
    pub fn pause(&self) -> ResourceResult<()> {
        self.lock().transition(AdjusterState::Paused)?;
        log::info!("Adjuster: Paused.");
        Ok(())
    }

    /// Resumes evaluation.
    pub fn resume(&self) -> ResourceResult<()> {
        self.lock().transition(AdjusterState::Active)?;
        log::info!("Adjuster: Resumed.");
        Ok(())
    }

    /// Clears the feedback window and the cooldown, so the next evaluation
    /// starts from a neutral multiplier.
    pub fn calibrate(&self) -> ResourceResult<()> {
        let mut inner = self.lock();
        let resume_to = inner.state;
        inner.transition(AdjusterState::Calibrating)?;
        inner.feedback.clear();
        inner.capacity.last_adjustment_ms = None;
        inner.last_evaluation_ms = None;
        inner.transition(resume_to)?;
        log::info!("Adjuster: Calibrated; feedback cleared.");
        Ok(())
    }

    /// Replaces the configuration.
    ///
    /// The current capacity is clamped into the new bounds. Like a manual
    /// [`set_capacity`](Self::set_capacity), that clamp is applied at once
    /// and ignores the stability period, since the old value is no longer
    /// legal. An adjuster in the error state is re-initialized.
    pub fn set_config(&self, config: CapacityConfiguration) -> ResourceResult<()> {
        config.validate()?;
        let now = self.clock.now_millis();
        let (record, reinitialize) = {
            let mut inner = self.lock();
            inner.history.set_capacity(config.history_size);
            inner.feedback.set_window(config.feedback_window);
            let current = inner.capacity.current_capacity;
            let clamped = config.clamp(current);
            inner.config = config;

            match inner.state {
                AdjusterState::Error => {
                    inner.transition(AdjusterState::Inactive)?;
                    (None, true)
                }
                AdjusterState::Active | AdjusterState::Paused if clamped != current => {
                    let record = inner.apply(
                        clamped,
                        AdjustmentTrigger::Reconfiguration,
                        "bounds changed".into(),
                        now,
                    )?;
                    (Some(record), false)
                }
                AdjusterState::Inactive => {
                    inner.capacity.current_capacity = clamped;
                    (None, false)
                }
                _ => (None, false),
            }
        };
        log::info!("Adjuster: Configuration updated.");
        if let Some(record) = record {
            self.notify(record.old, record.new);
        }
        if reinitialize {
            self.initialize()?;
        }
        Ok(())
    }

    /// Registers a handler called with `(old, new)` after each change.
    pub fn register_callback<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .register(Arc::new(callback))
    }

    /// Removes a handler. Returns `false` if the handle was unknown.
    pub fn unregister_callback(&self, handle: CallbackHandle) -> bool {
        self.callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .unregister(handle)
    }

    /// Capacity currently offered.
    pub fn current_capacity(&self) -> u32 {
        self.lock().capacity.current_capacity
    }

    /// Lifecycle state.
    pub fn state(&self) -> AdjusterState {
        self.lock().state
    }

    /// A copy of the capacity state.
    pub fn capacity_state(&self) -> CapacityState {
        self.lock().capacity.clone()
    }

    /// Up to `max_items` adjustment records, most recent first.
    pub fn history(&self, max_items: usize) -> Vec<AdjustmentRecord> {
        self.lock().history.recent(max_items)
    }

    /// A copy of the configuration.
    pub fn config(&self) -> CapacityConfiguration {
        self.lock().config.clone()
    }

    /// Target of the last evaluation.
    pub fn last_target(&self) -> Option<u32> {
        self.lock().last_target
    }

    /// The error that put the adjuster in the error state.
    pub fn last_error(&self) -> Option<ResourceError> {
        self.lock().last_error.clone()
    }

    /// Current feedback multiplier.
    pub fn feedback_multiplier(&self) -> f64 {
        let inner = self.lock();
        inner
            .feedback
            .multiplier(inner.config.error_threshold, inner.config.reference_depth)
    }

    /// Number of feedback samples held.
    pub fn feedback_samples(&self) -> usize {
        self.lock().feedback.sample_count()
    }
}

impl PerformancePredictor for CapacityAdjuster {
    fn predict_performance(&self, capacity: u32, circuit_depth: u32) -> PerformancePrediction {
        let capability = self.provider.capability();
        let config = self.lock().config.clone();
        predict(&config, &capability, capacity, circuit_depth)
    }

    fn record_execution(&self, feedback: ExecutionFeedback) {
        let mut inner = self.lock();
        inner.feedback.push(&feedback);
        log::debug!(
            "Adjuster: Feedback capacity={} depth={} error={:.4} ({} samples)",
            feedback.capacity,
            feedback.circuit_depth,
            feedback.error_rate,
            inner.feedback.sample_count()
        );
    }
}
