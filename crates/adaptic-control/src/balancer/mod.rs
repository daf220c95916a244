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

//! The task balancer: queues workloads and binds them to allocations.
//!
//! The balancer owns the task table. Admission itself is delegated to the
//! [`AllocationManager`]; the queue lock is never held while the manager is
//! called, so a task can change state between the snapshot of a pass and its
//! admission. Such a task gets its fresh allocation released immediately.

pub mod config;
pub mod scheduling;
pub mod task;

pub use config::{BalancerConfig, DynamicWeights, SchedulingStrategy};
pub use scheduling::{Candidate, SchedulingContext};
pub use task::{ResourceEstimate, Task, TaskId, TaskStatus};

use crate::allocation::{AllocationId, AllocationManager, AllocationRequest, AllocationResult};
use adaptic_core::callback::{CallbackHandle, CallbackRegistry};
use adaptic_core::clock::Clock;
use adaptic_core::control::{ExecutionFeedback, PerformancePredictor};
use adaptic_core::error::{ErrorKind, ResourceError, ResourceResult};
use adaptic_core::workload::{Priority, WorkloadDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback invoked with the task after the move, its previous status and
/// its new status.
pub type TaskCallback = Arc<dyn Fn(&Task, TaskStatus, TaskStatus) + Send + Sync>;

/// Which status transitions a task callback hears about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventFilter {
    /// Every transition.
    Any,
    /// Transitions into the given status.
    Status(TaskStatus),
}

impl TaskEventFilter {
    fn matches(&self, status: TaskStatus) -> bool {
        match self {
            TaskEventFilter::Any => true,
            TaskEventFilter::Status(wanted) => *wanted == status,
        }
    }
}

#[derive(Clone)]
struct TaskSubscription {
    filter: TaskEventFilter,
    callback: TaskCallback,
}

struct TaskEvent {
    task: Task,
    previous: TaskStatus,
    current: TaskStatus,
}

/// Counters of the balancer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BalancerStats {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Admissions that bound an allocation.
    pub scheduled: u64,
    /// Tasks completed.
    pub completed: u64,
    /// Tasks failed with no retry left.
    pub failed: u64,
    /// Tasks cancelled.
    pub cancelled: u64,
    /// Pending tasks aged out.
    pub timed_out: u64,
    /// Failures sent back to the queue.
    pub retries: u64,
    /// Running tasks preempted for a critical one.
    pub preemptions: u64,
    /// Running tasks whose allocation was reclaimed.
    pub reclaimed: u64,
    /// Rebalance passes.
    pub rebalances: u64,
    /// Tasks currently pending.
    pub pending: usize,
    /// Tasks currently running.
    pub running: usize,
    /// Tasks currently paused.
    pub paused: usize,
    /// Mean time from submission to admission.
    pub average_wait_ms: f64,
    /// Mean time from start to completion.
    pub average_runtime_ms: f64,
}

/// Outcome of one [`TaskBalancer::rebalance`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RebalanceReport {
    /// Tasks bound to an allocation, in admission order.
    pub scheduled: Vec<TaskId>,
    /// Pending tasks that aged out.
    pub timed_out: Vec<TaskId>,
    /// Running tasks sent back to the queue.
    pub preempted: Vec<TaskId>,
    /// Failed tasks requeued for another attempt.
    pub retried: Vec<TaskId>,
    /// Running tasks whose allocation had been reclaimed.
    pub reclaimed: Vec<TaskId>,
    /// Pending tasks left waiting for headroom.
    pub deferred: Vec<TaskId>,
}

struct BalancerInner {
    config: BalancerConfig,
    tasks: BTreeMap<TaskId, Task>,
    next_id: u64,
    /// Tail of the queue; grows.
    next_sequence: i64,
    /// Head of the queue for preempted tasks; shrinks.
    head_sequence: i64,
    fair_cursor: usize,
    last_rebalance_ms: Option<u64>,
    stats: BalancerStats,
    wait_total_ms: u64,
    runtime_total_ms: u64,
}

impl BalancerInner {
    fn task(&self, id: TaskId) -> ResourceResult<&Task> {
        self.tasks
            .get(&id)
            .ok_or_else(|| ResourceError::not_found(format!("unknown {}", id)))
    }

    fn tail_sequence(&mut self) -> i64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Moves `id` to `next`. Returns the allocation the task stopped holding,
    /// which the caller releases once the lock is dropped.
    fn transition(
        &mut self,
        id: TaskId,
        next: TaskStatus,
        now: u64,
        events: &mut Vec<TaskEvent>,
    ) -> ResourceResult<Option<AllocationId>> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| ResourceError::not_found(format!("unknown {}", id)))?;
        let previous = task.status;
        if !previous.can_transition_to(next) {
            return Err(ResourceError::invalid(format!(
                "{} cannot move from {:?} to {:?}",
                id, previous, next
            )));
        }

        task.status = next;
        let dropped = if next.holds_allocation() {
            None
        } else {
            task.granted_capacity = 0;
            task.granted_memory = 0;
            task.allocation_id.take()
        };
        match next {
            TaskStatus::Running => task.started_at_ms = Some(now),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                task.completed_at_ms = Some(now)
            }
            TaskStatus::Pending => {
                task.completed_at_ms = None;
                task.queued_at_ms = now;
            }
            _ => {}
        }
        events.push(TaskEvent {
            task: task.clone(),
            previous,
            current: next,
        });
        Ok(dropped)
    }

    /// Fails `id`, requeueing it at the tail while `retry` holds and retries
    /// remain. Returns the resulting status and the dropped allocation.
    fn fail(
        &mut self,
        id: TaskId,
        error: ResourceError,
        retry: bool,
        now: u64,
        events: &mut Vec<TaskEvent>,
    ) -> ResourceResult<(TaskStatus, Option<AllocationId>)> {
        let status = self.task(id)?.status;
        if !status.can_transition_to(TaskStatus::Failed) {
            return Err(ResourceError::invalid(format!(
                "{} cannot fail from {:?}",
                id, status
            )));
        }
        if let Some(task) = self.tasks.get_mut(&id) {
            task.last_error = Some(error);
        }
        let dropped = self.transition(id, TaskStatus::Failed, now, events)?;

        let sequence = self.next_sequence;
        let retried = match self.tasks.get_mut(&id) {
            Some(task) if retry && task.retry_count < task.max_retries => {
                task.retry_count += 1;
                task.sequence = sequence;
                true
            }
            _ => false,
        };
        if retried {
            self.next_sequence += 1;
            self.stats.retries += 1;
            self.transition(id, TaskStatus::Pending, now, events)?;
            Ok((TaskStatus::Pending, dropped))
        } else {
            self.stats.failed += 1;
            Ok((TaskStatus::Failed, dropped))
        }
    }

    /// Binds `grant` to a task that is still pending. Returns `false` if the
    /// task moved on since the snapshot.
    fn bind(
        &mut self,
        id: TaskId,
        grant: &AllocationResult,
        now: u64,
        events: &mut Vec<TaskEvent>,
    ) -> bool {
        match self.tasks.get(&id) {
            Some(task) if task.status == TaskStatus::Pending => {}
            _ => return false,
        }
        if self
            .transition(id, TaskStatus::Scheduled, now, events)
            .is_err()
        {
            return false;
        }
        if let Some(task) = self.tasks.get_mut(&id) {
            task.allocation_id = Some(grant.id);
            task.granted_capacity = grant.granted_capacity;
            task.granted_memory = grant.granted_memory;
            task.last_error = None;
            self.wait_total_ms += task.queued_ms(now);
        }
        if self
            .transition(id, TaskStatus::Running, now, events)
            .is_err()
        {
            return false;
        }
        self.stats.scheduled += 1;
        true
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }
}

/// Orders pending tasks, admits them through the allocation manager and
/// tracks them through completion.
pub struct TaskBalancer {
    inner: Mutex<BalancerInner>,
    callbacks: Mutex<CallbackRegistry<TaskSubscription>>,
    allocator: Arc<AllocationManager>,
    predictor: Arc<dyn PerformancePredictor>,
    clock: Arc<dyn Clock>,
}

impl TaskBalancer {
    /// Creates a balancer admitting through `allocator` and estimating with
    /// `predictor`.
    pub fn new(
        config: BalancerConfig,
        allocator: Arc<AllocationManager>,
        predictor: Arc<dyn PerformancePredictor>,
        clock: Arc<dyn Clock>,
    ) -> ResourceResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Mutex::new(BalancerInner {
                config,
                tasks: BTreeMap::new(),
                next_id: 1,
                next_sequence: 1,
                head_sequence: 0,
                fair_cursor: 0,
                last_rebalance_ms: None,
                stats: BalancerStats::default(),
                wait_total_ms: 0,
                runtime_total_ms: 0,
            }),
            callbacks: Mutex::new(CallbackRegistry::new()),
            allocator,
            predictor,
            clock,
        })
    }

    fn lock(&self) -> MutexGuard<'_, BalancerInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn finish(&self, events: Vec<TaskEvent>, releases: Vec<AllocationId>) {
        for id in releases {
            self.allocator.release(id);
        }
        if events.is_empty() {
            return;
        }
        let subscriptions = self
            .callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .snapshot_where(|_| true);
        for event in &events {
            for sub in subscriptions
                .iter()
                .filter(|s| s.filter.matches(event.current))
            {
                (sub.callback)(&event.task, event.previous, event.current);
            }
        }
    }

    /// Queues `workload` at `priority`.
    ///
    /// # Errors
    /// `InvalidArgument` if the descriptor fails validation.
    pub fn submit(&self, workload: WorkloadDescriptor, priority: Priority) -> ResourceResult<TaskId> {
        workload.validate()?;
        let prediction = self
            .predictor
            .predict_performance(workload.required_capacity, workload.circuit_depth);
        let now = self.clock.now_millis();

        let mut inner = self.lock();
        let id = TaskId(inner.next_id);
        inner.next_id += 1;
        let sequence = inner.tail_sequence();
        let task = Task {
            id,
            priority,
            status: TaskStatus::Pending,
            sequence,
            submitted_at_ms: now,
            queued_at_ms: now,
            started_at_ms: None,
            completed_at_ms: None,
            deadline_at_ms: workload.deadline_in_ms.map(|d| now.saturating_add(d)),
            estimate: ResourceEstimate {
                capacity: workload.required_capacity,
                memory_bytes: prediction.memory_bytes.max(1),
                runtime_ms: prediction.runtime_ms,
                fidelity: prediction.fidelity,
            },
            retry_count: 0,
            max_retries: inner.config.max_retries,
            preemption_count: 0,
            allocation_id: None,
            granted_capacity: 0,
            granted_memory: 0,
            last_error: None,
            workload,
        };
        log::info!(
            "Balancer: Queued {} '{}' ({:?}, {} units).",
            id,
            task.workload.name,
            priority,
            task.estimate.capacity
        );
        inner.tasks.insert(id, task);
        inner.stats.submitted += 1;
        Ok(id)
    }

    /// Runs one scheduling pass.
    ///
    /// Renews the allocations of running tasks, fails pending tasks queued
    /// for longer than `max_task_age_ms`, then offers the pending queue to the
    /// allocation manager in strategy order. A critical task that does not
    /// fit may preempt one lower-priority running task.
    pub fn rebalance(&self) -> RebalanceReport {
        let now = self.clock.now_millis();
        let mut report = RebalanceReport::default();
        let mut events = Vec::new();
        let mut releases = Vec::new();

        self.reclaim_lost_allocations(now, &mut report, &mut events);

        let availability = self.allocator.check_availability(0, 0);
        let (strategy, candidates, ctx, preemption) = {
            let mut inner = self.lock();
            let max_age = inner.config.max_task_age_ms;
            let expired: Vec<TaskId> = inner
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending && t.queued_ms(now) >= max_age)
                .map(|t| t.id)
                .collect();
            for id in expired {
                let error = ResourceError::Timeout(format!(
                    "{} waited longer than {}ms",
                    id, max_age
                ));
                if let Ok((_, dropped)) = inner.fail(id, error, false, now, &mut events) {
                    releases.extend(dropped);
                    inner.stats.timed_out += 1;
                    report.timed_out.push(id);
                    log::warn!("Balancer: {} timed out in queue.", id);
                }
            }

            let candidates: Vec<Candidate> = inner
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .map(Candidate::from)
                .collect();
            let ctx = SchedulingContext {
                now_ms: now,
                available_capacity: availability.available_capacity,
                max_task_age_ms: max_age,
                deadline_horizon_ms: inner.config.deadline_horizon_ms,
                weights: inner.config.weights,
                fair_cursor: inner.fair_cursor,
            };
            inner.fair_cursor = (inner.fair_cursor + 1) % Priority::CLASSES.len();
            inner.last_rebalance_ms = Some(now);
            inner.stats.rebalances += 1;
            (
                inner.config.strategy,
                candidates,
                ctx,
                inner.config.enable_task_preemption,
            )
        };

        for candidate in scheduling::order(strategy, candidates, &ctx) {
            let outcome = self.admit(candidate.id, now, &mut events);
            let admitted = match outcome {
                Admission::Bound => true,
                Admission::Skipped => continue,
                Admission::Rejected(error)
                    if preemption
                        && candidate.priority == Priority::Critical
                        && error.kind() == ErrorKind::InsufficientResources =>
                {
                    match self.preempt_for(candidate.id, now, &mut events) {
                        Some(victim) => {
                            report.preempted.push(victim);
                            matches!(
                                self.admit(candidate.id, now, &mut events),
                                Admission::Bound
                            )
                        }
                        None => false,
                    }
                }
                Admission::Rejected(_) => false,
            };
            if admitted {
                report.scheduled.push(candidate.id);
            } else {
                report.deferred.push(candidate.id);
            }
        }

        if !report.scheduled.is_empty() || !report.preempted.is_empty() {
            log::info!(
                "Balancer: Pass scheduled {} task(s), preempted {}, deferred {}.",
                report.scheduled.len(),
                report.preempted.len(),
                report.deferred.len()
            );
        } else {
            log::debug!(
                "Balancer: Pass scheduled nothing ({} deferred).",
                report.deferred.len()
            );
        }
        self.finish(events, releases);
        report
    }

    /// Renews every bound allocation. A task whose allocation is gone is
    /// failed with a timeout and retried if it has retries left.
    fn reclaim_lost_allocations(
        &self,
        now: u64,
        report: &mut RebalanceReport,
        events: &mut Vec<TaskEvent>,
    ) {
        let held: Vec<(TaskId, AllocationId)> = self
            .lock()
            .tasks
            .values()
            .filter(|t| t.status.holds_allocation())
            .filter_map(|t| t.allocation_id.map(|a| (t.id, a)))
            .collect();
        let lost: Vec<(TaskId, AllocationId)> = held
            .into_iter()
            .filter(|(_, allocation)| self.allocator.renew(*allocation).is_err())
            .collect();
        if lost.is_empty() {
            return;
        }

        let mut inner = self.lock();
        for (id, allocation) in lost {
            match inner.tasks.get_mut(&id) {
                Some(task) if task.allocation_id == Some(allocation) => {
                    task.allocation_id = None;
                }
                _ => continue,
            }
            let error = ResourceError::Timeout(format!(
                "allocation {} of {} was reclaimed",
                allocation, id
            ));
            if let Ok((status, _)) = inner.fail(id, error, true, now, events) {
                inner.stats.reclaimed += 1;
                report.reclaimed.push(id);
                if status == TaskStatus::Pending {
                    report.retried.push(id);
                }
                log::warn!("Balancer: {} lost its allocation; now {:?}.", id, status);
            }
        }
    }

    fn admit(&self, id: TaskId, now: u64, events: &mut Vec<TaskEvent>) -> Admission {
        let request = {
            let inner = self.lock();
            match inner.tasks.get(&id) {
                Some(task) if task.status == TaskStatus::Pending => {
                    let mut request = AllocationRequest::for_workload(
                        &task.workload,
                        task.priority,
                        task.estimate.memory_bytes,
                    );
                    request.deadline_ms = task.deadline_at_ms;
                    request
                }
                _ => return Admission::Skipped,
            }
        };

        match self.allocator.allocate(request) {
            Ok(grant) => {
                let bound = self.lock().bind(id, &grant, now, events);
                if bound {
                    log::info!(
                        "Balancer: Started {} with {} units.",
                        id,
                        grant.granted_capacity
                    );
                    Admission::Bound
                } else {
                    log::debug!("Balancer: {} changed during admission; releasing.", id);
                    self.allocator.release(grant.id);
                    Admission::Skipped
                }
            }
            Err(error) => {
                if let Some(task) = self.lock().tasks.get_mut(&id) {
                    task.last_error = Some(error.clone());
                }
                Admission::Rejected(error)
            }
        }
    }

    /// Sends the cheapest sufficient victim back to the queue head.
    ///
    /// Victims are running, preemptible, of lower priority than the task and
    /// hold at least the missing capacity and memory. The lowest priority
    /// wins, then the smallest grant.
    fn preempt_for(&self, id: TaskId, now: u64, events: &mut Vec<TaskEvent>) -> Option<TaskId> {
        let availability = self.allocator.check_availability(0, 0);
        let (victim, dropped) = {
            let mut inner = self.lock();
            let task = inner.tasks.get(&id)?;
            let missing_capacity = task
                .estimate
                .capacity
                .saturating_sub(availability.available_capacity);
            let missing_memory = task
                .estimate
                .memory_bytes
                .saturating_sub(availability.available_memory);
            let priority = task.priority;

            let victim = inner
                .tasks
                .values()
                .filter(|t| {
                    t.status == TaskStatus::Running
                        && t.is_preemptible()
                        && t.priority < priority
                        && t.granted_capacity >= missing_capacity
                        && t.granted_memory >= missing_memory
                })
                .min_by_key(|t| (t.priority, t.granted_capacity, t.id))
                .map(|t| t.id)?;

            let dropped = inner
                .transition(victim, TaskStatus::Paused, now, events)
                .ok()?;
            let sequence = inner.head_sequence;
            inner.head_sequence -= 1;
            if let Some(task) = inner.tasks.get_mut(&victim) {
                task.sequence = sequence;
                task.preemption_count += 1;
            }
            if let Err(e) = inner.transition(victim, TaskStatus::Pending, now, events) {
                log::error!("Balancer: Preempted {} could not requeue: {}", victim, e);
            }
            inner.stats.preemptions += 1;
            (victim, dropped)
        };

        if let Some(allocation) = dropped {
            self.allocator.release(allocation);
        }
        log::warn!("Balancer: Preempted {} for critical {}.", victim, id);
        Some(victim)
    }

    /// Marks a running task completed, releases its allocation and forwards
    /// `feedback` to the predictor.
    ///
    /// # Errors
    /// `NotFound` for unknown ids; `InvalidArgument` unless the task runs.
    pub fn complete_task(&self, id: TaskId, feedback: Option<ExecutionFeedback>) -> ResourceResult<()> {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        let dropped = {
            let mut inner = self.lock();
            let task = inner.task(id)?;
            if task.status != TaskStatus::Running {
                return Err(ResourceError::invalid(format!(
                    "{} is {:?}, not running",
                    id, task.status
                )));
            }
            let runtime = task.started_at_ms.map_or(0, |s| now.saturating_sub(s));
            let dropped = inner.transition(id, TaskStatus::Completed, now, &mut events)?;
            inner.stats.completed += 1;
            inner.runtime_total_ms += runtime;
            log::info!("Balancer: Completed {} in {}ms.", id, runtime);
            dropped
        };
        self.finish(events, dropped.into_iter().collect());
        if let Some(feedback) = feedback {
            self.predictor.record_execution(feedback);
        }
        Ok(())
    }

    /// Fails a task. It returns to the queue while retries remain.
    ///
    /// Returns the resulting status, `Pending` or `Failed`.
    pub fn fail_task(&self, id: TaskId, error: ResourceError) -> ResourceResult<TaskStatus> {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        let (status, dropped) = {
            let mut inner = self.lock();
            let message = error.to_string();
            let outcome = inner.fail(id, error, true, now, &mut events)?;
            log::warn!("Balancer: {} failed ({}); now {:?}.", id, message, outcome.0);
            outcome
        };
        self.finish(events, dropped.into_iter().collect());
        Ok(status)
    }

    /// Cancels a task that has not finished.
    pub fn cancel(&self, id: TaskId) -> ResourceResult<()> {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        let dropped = {
            let mut inner = self.lock();
            let dropped = inner.transition(id, TaskStatus::Cancelled, now, &mut events)?;
            inner.stats.cancelled += 1;
            log::info!("Balancer: Cancelled {}.", id);
            dropped
        };
        self.finish(events, dropped.into_iter().collect());
        Ok(())
    }

    /// Suspends a pending or running task. A running task gives up its
    /// allocation.
    pub fn pause_task(&self, id: TaskId) -> ResourceResult<()> {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        let dropped = self
            .lock()
            .transition(id, TaskStatus::Paused, now, &mut events)?;
        log::info!("Balancer: Paused {}.", id);
        self.finish(events, dropped.into_iter().collect());
        Ok(())
    }

    /// Returns a paused task to the queue at its former position.
    pub fn resume_task(&self, id: TaskId) -> ResourceResult<()> {
        let now = self.clock.now_millis();
        let mut events = Vec::new();
        {
            let mut inner = self.lock();
            let status = inner.task(id)?.status;
            if status != TaskStatus::Paused {
                return Err(ResourceError::invalid(format!(
                    "{} is {:?}, not paused",
                    id, status
                )));
            }
            inner.transition(id, TaskStatus::Pending, now, &mut events)?;
        }
        log::info!("Balancer: Resumed {}.", id);
        self.finish(events, Vec::new());
        Ok(())
    }

    /// A copy of one task.
    pub fn task(&self, id: TaskId) -> ResourceResult<Task> {
        self.lock().task(id).cloned()
    }

    /// Copies of every known task, by id.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.values().cloned().collect()
    }

    /// Number of tasks waiting for admission.
    pub fn pending_count(&self) -> usize {
        self.lock().count(TaskStatus::Pending)
    }

    /// Number of tasks holding an allocation.
    pub fn running_count(&self) -> usize {
        self.lock().count(TaskStatus::Running)
    }

    /// Drops completed, cancelled and permanently failed tasks. Returns how
    /// many were removed.
    pub fn collect_garbage(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|_, t| !t.status.is_terminal());
        let removed = before - inner.tasks.len();
        if removed > 0 {
            log::debug!("Balancer: Collected {} finished task(s).", removed);
        }
        removed
    }

    /// Counters plus the current queue composition.
    pub fn stats(&self) -> BalancerStats {
        let inner = self.lock();
        let mut stats = inner.stats;
        stats.pending = inner.count(TaskStatus::Pending);
        stats.running = inner.count(TaskStatus::Running);
        stats.paused = inner.count(TaskStatus::Paused);
        if stats.scheduled > 0 {
            stats.average_wait_ms = inner.wait_total_ms as f64 / stats.scheduled as f64;
        }
        if stats.completed > 0 {
            stats.average_runtime_ms = inner.runtime_total_ms as f64 / stats.completed as f64;
        }
        stats
    }

    /// Whether `rebalance_interval_ms` elapsed since the last pass.
    pub fn is_due(&self) -> bool {
        let now = self.clock.now_millis();
        let inner = self.lock();
        inner
            .last_rebalance_ms
            .map_or(true, |last| now.saturating_sub(last) >= inner.config.rebalance_interval_ms)
    }

    /// Replaces the configuration. Queued tasks keep their retry budget.
    pub fn set_config(&self, config: BalancerConfig) -> ResourceResult<()> {
        config.validate()?;
        let mut inner = self.lock();
        log::info!(
            "Balancer: Strategy {:?} → {:?}.",
            inner.config.strategy,
            config.strategy
        );
        inner.config = config;
        Ok(())
    }

    /// A copy of the configuration.
    pub fn config(&self) -> BalancerConfig {
        self.lock().config.clone()
    }

    /// Registers `callback` for status transitions matching `filter`.
    pub fn register_callback<F>(&self, filter: TaskEventFilter, callback: F) -> CallbackHandle
    where
        F: Fn(&Task, TaskStatus, TaskStatus) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .register(TaskSubscription {
                filter,
                callback: Arc::new(callback),
            })
    }

    /// Removes a callback. Returns `false` for unknown handles.
    pub fn unregister_callback(&self, handle: CallbackHandle) -> bool {
        self.callbacks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .unregister(handle)
    }
}

enum Admission {
    Bound,
    /// The task is no longer pending.
    Skipped,
    Rejected(ResourceError),
}
