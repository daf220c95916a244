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

//! Requests, grants and configuration of the allocation manager.

use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::workload::{Priority, WorkloadDescriptor};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a granted allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationId(Uuid);

impl AllocationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AllocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AllocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "alloc-{}", self.0)
    }
}

/// Identifier of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "resv-{}", self.0)
    }
}

/// Order in which competing requests of a batch are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AllocationStrategy {
    /// Priority first, then arrival order.
    #[default]
    Balanced,
    /// Priority first, then the largest capacity.
    Performance,
    /// Smallest combined capacity and memory footprint first.
    Efficiency,
    /// Highest target fidelity first.
    Fidelity,
    /// Shortest estimated runtime first.
    Speed,
}

/// A request for computation units and memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Units needed.
    pub required_capacity: u32,
    /// Bytes needed.
    pub required_memory: u64,
    /// Depth of the circuit to run.
    pub circuit_depth: u32,
    /// Fidelity the caller aims for, 0–1.
    pub target_fidelity: f64,
    /// Importance of the request.
    pub priority: Priority,
    /// Absolute deadline.
    pub deadline_ms: Option<u64>,
    /// Whether the holder may be preempted.
    pub preemptible: bool,
}

impl AllocationRequest {
    /// A normal-priority, preemptible request.
    pub fn new(required_capacity: u32, required_memory: u64) -> Self {
        Self {
            required_capacity,
            required_memory,
            circuit_depth: 0,
            target_fidelity: 0.0,
            priority: Priority::Normal,
            deadline_ms: None,
            preemptible: true,
        }
    }

    /// A request sized for `workload` with `required_memory` bytes.
    pub fn for_workload(
        workload: &WorkloadDescriptor,
        priority: Priority,
        required_memory: u64,
    ) -> Self {
        Self {
            required_capacity: workload.required_capacity,
            required_memory,
            circuit_depth: workload.circuit_depth,
            target_fidelity: workload.required_fidelity,
            priority,
            deadline_ms: None,
            preemptible: workload.preemptible,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the circuit depth.
    pub fn with_depth(mut self, circuit_depth: u32) -> Self {
        self.circuit_depth = circuit_depth;
        self
    }

    /// Sets the target fidelity.
    pub fn with_fidelity(mut self, target_fidelity: f64) -> Self {
        self.target_fidelity = target_fidelity;
        self
    }

    /// Sets the absolute deadline.
    pub fn with_deadline(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Rejects malformed requests.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.required_capacity == 0 {
            return Err(ResourceError::invalid("required capacity must be positive"));
        }
        if self.required_memory == 0 {
            return Err(ResourceError::invalid("required memory must be positive"));
        }
        if !(0.0..=1.0).contains(&self.target_fidelity) {
            return Err(ResourceError::invalid(format!(
                "target fidelity {} outside [0, 1]",
                self.target_fidelity
            )));
        }
        Ok(())
    }
}

/// A granted allocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    /// Id to release or renew the allocation with.
    pub id: AllocationId,
    /// Units granted.
    pub granted_capacity: u32,
    /// Bytes granted.
    pub granted_memory: u64,
    /// `true` if less capacity than requested was granted.
    pub partial: bool,
    /// Predicted probability the workload succeeds, 0–1.
    pub success_probability: f64,
    /// Predicted runtime.
    pub estimated_runtime_ms: f64,
    /// When the grant was made.
    pub allocated_at_ms: u64,
    /// End of validity unless renewed.
    pub expires_at_ms: u64,
}

/// An active allocation held by the manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// Id of the allocation.
    pub id: AllocationId,
    /// The request it was granted for.
    pub request: AllocationRequest,
    /// Units granted.
    pub granted_capacity: u32,
    /// Bytes granted.
    pub granted_memory: u64,
    /// When the grant was made.
    pub allocated_at_ms: u64,
    /// End of validity unless renewed.
    pub expires_at_ms: u64,
}

/// Headroom held for a request without granting execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservation {
    /// Id to claim or cancel the reservation with.
    pub id: ReservationId,
    /// The held request.
    pub request: AllocationRequest,
    /// When the reservation was made.
    pub created_at_ms: u64,
    /// The reservation lapses at this time.
    pub expires_at_ms: u64,
}

/// Answer of an availability query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Availability {
    /// Units free for new requests.
    pub available_capacity: u32,
    /// Bytes free for new requests.
    pub available_memory: u64,
    /// Effective capacity ceiling.
    pub total_capacity: u32,
    /// Memory budget.
    pub total_memory: u64,
    /// Whether the queried amounts fit.
    pub sufficient: bool,
}

/// Expired entries removed by one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Allocations past their validity.
    pub expired_allocations: Vec<AllocationId>,
    /// Reservations past their TTL.
    pub expired_reservations: Vec<ReservationId>,
}

impl SweepReport {
    /// Whether nothing expired.
    pub fn is_empty(&self) -> bool {
        self.expired_allocations.is_empty() && self.expired_reservations.is_empty()
    }
}

/// Counters of the allocation manager, updated under the table lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AllocationStats {
    /// Calls to `allocate`, claims included.
    pub total_allocations: u64,
    /// Granted allocations.
    pub successful_allocations: u64,
    /// Rejected allocations.
    pub failed_allocations: u64,
    /// Grants below the requested capacity.
    pub partial_allocations: u64,
    /// Successful releases.
    pub releases: u64,
    /// Allocations reclaimed by a sweep.
    pub expired_allocations: u64,
    /// Reservations that lapsed.
    pub expired_reservations: u64,
    /// Units held by active allocations.
    pub units_in_use: u32,
    /// Units held by reservations.
    pub units_reserved: u32,
    /// Bytes held by active allocations.
    pub memory_in_use: u64,
    /// Highest `units_in_use` seen.
    pub peak_units_in_use: u32,
    /// `units_in_use / total_capacity`, 0–1.
    pub resource_utilization: f64,
    /// Number of active allocations.
    pub active_allocations: usize,
    /// Number of live reservations.
    pub active_reservations: usize,
}

/// Configuration for the [`AllocationManager`](super::AllocationManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Batch ordering.
    pub strategy: AllocationStrategy,
    /// Configured capacity; the adjuster's ceiling may lower it.
    pub max_capacity: u32,
    /// Memory budget in bytes.
    pub max_memory_bytes: u64,
    /// Grant less than requested instead of failing.
    pub flexible_allocation: bool,
    /// Smallest flexible grant.
    pub min_acceptable_units: u32,
    /// Validity of an allocation before it must be renewed.
    pub allocation_validity_ms: u64,
    /// TTL used when `reserve` is called with 0.
    pub default_reservation_ttl_ms: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            strategy: AllocationStrategy::default(),
            max_capacity: 32,
            max_memory_bytes: 16 * 1024 * 1024 * 1024,
            flexible_allocation: false,
            min_acceptable_units: 1,
            allocation_validity_ms: 60_000,
            default_reservation_ttl_ms: 30_000,
        }
    }
}

impl AllocationConfig {
    /// Rejects unusable configurations.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.max_capacity == 0 {
            return Err(ResourceError::invalid("max_capacity must be positive"));
        }
        if self.max_memory_bytes == 0 {
            return Err(ResourceError::invalid("max_memory_bytes must be positive"));
        }
        if self.min_acceptable_units == 0 || self.min_acceptable_units > self.max_capacity {
            return Err(ResourceError::invalid(format!(
                "min_acceptable_units {} outside [1, {}]",
                self.min_acceptable_units, self.max_capacity
            )));
        }
        if self.allocation_validity_ms == 0 || self.default_reservation_ttl_ms == 0 {
            return Err(ResourceError::invalid(
                "allocation validity and reservation TTL must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(AllocationRequest::new(4, 1024).validate().is_ok());
        assert!(AllocationRequest::new(0, 1024).validate().is_err());
        assert!(AllocationRequest::new(4, 0).validate().is_err());
        assert!(AllocationRequest::new(4, 1024)
            .with_fidelity(1.5)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_floor_must_fit_capacity() {
        let config = AllocationConfig {
            max_capacity: 8,
            min_acceptable_units: 9,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(AllocationId::new(), AllocationId::new());
        assert!(ReservationId::new().to_string().starts_with("resv-"));
    }
}
