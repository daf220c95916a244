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

//! # Adaptic Control
//!
//! The decision side of the adaptation layer: the capacity adjuster sizes
//! the system, the allocation manager admits requests against that size and
//! the task balancer queues workloads and binds them to allocations.

#![warn(missing_docs)]

pub mod allocation;
pub mod balancer;
pub mod capacity;

pub use allocation::{
    AllocationConfig, AllocationId, AllocationManager, AllocationProbe, AllocationRequest,
    AllocationResult, AllocationStats, AllocationStrategy, Availability, Reservation,
    ReservationId, SweepReport,
};
pub use balancer::{
    BalancerConfig, BalancerStats, DynamicWeights, RebalanceReport, SchedulingStrategy, Task,
    TaskBalancer, TaskEventFilter, TaskId, TaskStatus,
};
pub use capacity::{
    AdjusterState, AdjustmentRecord, AdjustmentTrigger, CapacityAdjuster, CapacityConfiguration,
    CapacityDecision, CapacityState, CapacityStrategy, ExecutionMode,
};
