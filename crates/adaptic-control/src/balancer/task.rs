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

//! Tasks and their status machine.

use crate::allocation::AllocationId;
use adaptic_core::error::ResourceError;
use adaptic_core::workload::{Priority, WorkloadDescriptor};
use serde::{Deserialize, Serialize};

/// Identifier of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for an allocation.
    Pending,
    /// Bound to an allocation, about to run.
    Scheduled,
    /// Executing with a bound allocation.
    Running,
    /// Suspended; holds no allocation.
    Paused,
    /// Finished successfully.
    Completed,
    /// Failed; terminal unless retried.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` if moving from `self` to `next` is a valid transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Paused)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Scheduled, Running)
                | (Scheduled, Failed)
                | (Scheduled, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Pending)
                | (Paused, Failed)
                | (Paused, Cancelled)
                | (Failed, Pending)
        )
    }

    /// Whether the task holds an allocation in this status.
    pub fn holds_allocation(self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Running)
    }

    /// Whether no further transition is expected.
    ///
    /// `Failed` counts as terminal once retries are exhausted; the balancer
    /// moves retried tasks back to `Pending` immediately.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// Resources a task is expected to need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceEstimate {
    /// Units to request.
    pub capacity: u32,
    /// Bytes to request.
    pub memory_bytes: u64,
    /// Predicted runtime.
    pub runtime_ms: f64,
    /// Predicted fidelity.
    pub fidelity: f64,
}

/// A submitted workload and its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// The workload to run.
    pub workload: WorkloadDescriptor,
    /// Scheduling priority. Never changed by preemption.
    pub priority: Priority,
    /// Current status.
    pub status: TaskStatus,
    /// Queue position; lower runs first within a priority class.
    pub sequence: i64,
    /// Submission time.
    pub submitted_at_ms: u64,
    /// Time of the last transition to `Pending`; queue age counts from here.
    pub queued_at_ms: u64,
    /// Time of the last transition to `Running`.
    pub started_at_ms: Option<u64>,
    /// Time of the terminal transition.
    pub completed_at_ms: Option<u64>,
    /// Absolute deadline.
    pub deadline_at_ms: Option<u64>,
    /// Expected requirements.
    pub estimate: ResourceEstimate,
    /// Retries used so far.
    pub retry_count: u32,
    /// Retries allowed.
    pub max_retries: u32,
    /// Times the task was preempted.
    pub preemption_count: u32,
    /// Allocation bound while `Scheduled` or `Running`.
    pub allocation_id: Option<AllocationId>,
    /// Units granted by the bound allocation.
    pub granted_capacity: u32,
    /// Bytes granted by the bound allocation.
    pub granted_memory: u64,
    /// Error of the last failure or admission attempt.
    pub last_error: Option<ResourceError>,
}

impl Task {
    /// Time spent in the queue since the task last became `Pending`.
    pub fn queued_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.queued_at_ms)
    }

    /// Signed time left until the deadline; negative when overdue.
    pub fn time_to_deadline_ms(&self, now: u64) -> Option<i64> {
        self.deadline_at_ms
            .map(|deadline| deadline as i64 - now as i64)
    }

    /// Whether the task may be preempted.
    pub fn is_preemptible(&self) -> bool {
        self.workload.preemptible && self.priority < Priority::Critical
    }
}
