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

//! Admission control over computation units and memory.
//!
//! The manager owns a single allocation table. Every grant, release, claim
//! and sweep mutates the table and its statistics under the same lock, so
//! `units_in_use` always equals the sum of the active grants.

pub mod types;

pub use types::{
    Allocation, AllocationConfig, AllocationId, AllocationRequest, AllocationResult,
    AllocationStats, AllocationStrategy, Availability, Reservation, ReservationId, SweepReport,
};

use adaptic_core::clock::Clock;
use adaptic_core::control::PerformancePredictor;
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::{ResourceKind, ResourceProbe, ResourceSample};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct AllocationTable {
    config: AllocationConfig,
    ceiling: Option<u32>,
    allocations: HashMap<AllocationId, Allocation>,
    reservations: HashMap<ReservationId, Reservation>,
    memory_reserved: u64,
    stats: AllocationStats,
}

impl AllocationTable {
    /// Configured capacity lowered by the ceiling, but never below what is
    /// already held.
    fn effective_total(&self) -> u32 {
        let nominal = self
            .ceiling
            .map_or(self.config.max_capacity, |c| c.min(self.config.max_capacity));
        nominal.max(self.stats.units_in_use + self.stats.units_reserved)
    }

    fn available_capacity(&self) -> u32 {
        self.effective_total() - self.stats.units_in_use - self.stats.units_reserved
    }

    fn available_memory(&self) -> u64 {
        self.config
            .max_memory_bytes
            .saturating_sub(self.stats.memory_in_use + self.memory_reserved)
    }

    fn availability(&self, capacity: u32, memory: u64) -> Availability {
        let available_capacity = self.available_capacity();
        let available_memory = self.available_memory();
        Availability {
            available_capacity,
            available_memory,
            total_capacity: self.effective_total(),
            total_memory: self.config.max_memory_bytes,
            sufficient: capacity <= available_capacity && memory <= available_memory,
        }
    }

    fn refresh_stats(&mut self) {
        let total = self.effective_total();
        self.stats.resource_utilization = if total == 0 {
            0.0
        } else {
            self.stats.units_in_use as f64 / total as f64
        };
        self.stats.active_allocations = self.allocations.len();
        self.stats.active_reservations = self.reservations.len();
        self.stats.peak_units_in_use = self.stats.peak_units_in_use.max(self.stats.units_in_use);

        debug_assert_eq!(
            self.stats.units_in_use,
            self.allocations.values().map(|a| a.granted_capacity).sum::<u32>(),
            "units in use diverged from the allocation table"
        );
    }

    fn reject(&mut self, error: ResourceError) -> ResourceError {
        self.stats.total_allocations += 1;
        self.stats.failed_allocations += 1;
        log::debug!("Allocator: Rejected request: {}", error);
        error
    }

    fn admit(&mut self, request: &AllocationRequest, now: u64) -> ResourceResult<Allocation> {
        let total = self.effective_total();
        let available = self.available_capacity();
        let available_memory = self.available_memory();

        if request.required_memory > available_memory {
            return Err(self.reject(ResourceError::insufficient(format!(
                "{} bytes requested, {} available",
                request.required_memory, available_memory
            ))));
        }

        let granted = if request.required_capacity <= available {
            request.required_capacity
        } else if self.config.flexible_allocation {
            let floor = self.config.min_acceptable_units;
            if floor > total {
                return Err(ResourceError::invalid(format!(
                    "min_acceptable_units {} exceeds the capacity ceiling {}",
                    floor, total
                )));
            }
            if available < floor || request.required_capacity < floor {
                return Err(self.reject(ResourceError::insufficient(format!(
                    "{} units requested, {} available, flexible floor {}",
                    request.required_capacity, available, floor
                ))));
            }
            available
        } else {
            return Err(self.reject(ResourceError::insufficient(format!(
                "{} units requested, {} available",
                request.required_capacity, available
            ))));
        };

        let allocation = Allocation {
            id: AllocationId::new(),
            request: request.clone(),
            granted_capacity: granted,
            granted_memory: request.required_memory,
            allocated_at_ms: now,
            expires_at_ms: now.saturating_add(self.config.allocation_validity_ms),
        };
        self.insert(allocation.clone());
        if granted < request.required_capacity {
            self.stats.partial_allocations += 1;
        }
        Ok(allocation)
    }

    fn insert(&mut self, allocation: Allocation) {
        self.stats.total_allocations += 1;
        self.stats.successful_allocations += 1;
        self.stats.units_in_use += allocation.granted_capacity;
        self.stats.memory_in_use += allocation.granted_memory;
        self.allocations.insert(allocation.id, allocation);
        self.refresh_stats();
    }

    fn remove(&mut self, id: &AllocationId) -> Option<Allocation> {
        let allocation = self.allocations.remove(id)?;
        match self
            .stats
            .units_in_use
            .checked_sub(allocation.granted_capacity)
        {
            Some(units) => self.stats.units_in_use = units,
            None => {
                log::error!(
                    "Allocator: Releasing {} would drive units in use below zero.",
                    id
                );
                self.stats.units_in_use = 0;
            }
        }
        self.stats.memory_in_use = self
            .stats
            .memory_in_use
            .saturating_sub(allocation.granted_memory);
        self.refresh_stats();
        Some(allocation)
    }

    fn remove_reservation(&mut self, id: &ReservationId) -> Option<Reservation> {
        let reservation = self.reservations.remove(id)?;
        self.stats.units_reserved = self
            .stats
            .units_reserved
            .saturating_sub(reservation.request.required_capacity);
        self.memory_reserved = self
            .memory_reserved
            .saturating_sub(reservation.request.required_memory);
        self.refresh_stats();
        Some(reservation)
    }
}

/// Orders the requests of a batch per `strategy`. Returns request indices.
pub fn batch_order(
    strategy: AllocationStrategy,
    requests: &[AllocationRequest],
    runtimes_ms: &[f64],
    total_capacity: u32,
    total_memory: u64,
) -> Vec<usize> {
    let total_capacity = total_capacity.max(1) as f64;
    let total_memory = total_memory.max(1) as f64;
    let footprint = |r: &AllocationRequest| {
        r.required_capacity as f64 / total_capacity + r.required_memory as f64 / total_memory
    };

    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (&requests[a], &requests[b]);
        let primary = match strategy {
            AllocationStrategy::Balanced => rb.priority.cmp(&ra.priority),
            AllocationStrategy::Performance => rb
                .priority
                .cmp(&ra.priority)
                .then(rb.required_capacity.cmp(&ra.required_capacity)),
            AllocationStrategy::Efficiency => footprint(ra).total_cmp(&footprint(rb)),
            AllocationStrategy::Fidelity => rb.target_fidelity.total_cmp(&ra.target_fidelity),
            AllocationStrategy::Speed => {
                let ta = runtimes_ms.get(a).copied().unwrap_or(0.0);
                let tb = runtimes_ms.get(b).copied().unwrap_or(0.0);
                ta.total_cmp(&tb)
            }
        };
        primary.then(a.cmp(&b))
    });
    order
}

/// Grants, reserves and reclaims computation units.
pub struct AllocationManager {
    table: Mutex<AllocationTable>,
    predictor: Option<Arc<dyn PerformancePredictor>>,
    clock: Arc<dyn Clock>,
}

impl AllocationManager {
    /// Creates a manager without a performance predictor.
    pub fn new(config: AllocationConfig, clock: Arc<dyn Clock>) -> ResourceResult<Self> {
        config.validate()?;
        Ok(Self {
            table: Mutex::new(AllocationTable {
                config,
                ceiling: None,
                allocations: HashMap::new(),
                reservations: HashMap::new(),
                memory_reserved: 0,
                stats: AllocationStats::default(),
            }),
            predictor: None,
            clock,
        })
    }

    /// Uses `predictor` to estimate success probability and runtime.
    pub fn with_predictor(mut self, predictor: Arc<dyn PerformancePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    fn lock(&self) -> MutexGuard<'_, AllocationTable> {
        self.table.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn to_result(&self, allocation: &Allocation) -> AllocationResult {
        // The predictor is consulted after the table lock is released.
        let (success_probability, estimated_runtime_ms) = match &self.predictor {
            Some(predictor) => {
                let p = predictor.predict_performance(
                    allocation.granted_capacity,
                    allocation.request.circuit_depth,
                );
                (p.fidelity, p.runtime_ms)
            }
            None => (1.0, 0.0),
        };
        AllocationResult {
            id: allocation.id,
            granted_capacity: allocation.granted_capacity,
            granted_memory: allocation.granted_memory,
            partial: allocation.granted_capacity < allocation.request.required_capacity,
            success_probability,
            estimated_runtime_ms,
            allocated_at_ms: allocation.allocated_at_ms,
            expires_at_ms: allocation.expires_at_ms,
        }
    }

    /// Headroom for `capacity` units and `memory` bytes. Pure read.
    pub fn check_availability(&self, capacity: u32, memory: u64) -> Availability {
        self.lock().availability(capacity, memory)
    }

    /// Grants `request`, or less than requested when flexible allocation is
    /// enabled.
    ///
    /// # Errors
    /// `InvalidArgument` for malformed requests, or when a flexible request's
    /// floor exceeds the current ceiling; `InsufficientResources` when the
    /// headroom is too small. Failures leave the headroom unchanged.
    pub fn allocate(&self, request: AllocationRequest) -> ResourceResult<AllocationResult> {
        request.validate()?;
        let now = self.clock.now_millis();
        let allocation = {
            let mut table = self.lock();
            let allocation = table.admit(&request, now)?;
            log::info!(
                "Allocator: Granted {}/{} units to {} ({} free).",
                allocation.granted_capacity,
                request.required_capacity,
                allocation.id,
                table.available_capacity()
            );
            allocation
        };
        Ok(self.to_result(&allocation))
    }

    /// Admits competing requests in the order of the configured strategy.
    /// Results are returned in input order.
    pub fn allocate_batch(
        &self,
        requests: Vec<AllocationRequest>,
    ) -> Vec<ResourceResult<AllocationResult>> {
        let (strategy, total_capacity, total_memory) = {
            let table = self.lock();
            (
                table.config.strategy,
                table.effective_total(),
                table.config.max_memory_bytes,
            )
        };
        let runtimes: Vec<f64> = match (strategy, &self.predictor) {
            (AllocationStrategy::Speed, Some(predictor)) => requests
                .iter()
                .map(|r| {
                    predictor
                        .predict_performance(r.required_capacity, r.circuit_depth)
                        .runtime_ms
                })
                .collect(),
            _ => requests
                .iter()
                .map(|r| r.circuit_depth as f64 * r.required_capacity as f64)
                .collect(),
        };

        let order = batch_order(strategy, &requests, &runtimes, total_capacity, total_memory);
        let mut results: Vec<Option<ResourceResult<AllocationResult>>> =
            requests.iter().map(|_| None).collect();
        for index in order {
            results[index] = Some(self.allocate(requests[index].clone()));
        }
        results.into_iter().flatten().collect()
    }

    /// Frees an allocation. Returns `false` for unknown or already released
    /// ids, leaving the statistics untouched.
    pub fn release(&self, id: AllocationId) -> bool {
        let mut table = self.lock();
        match table.remove(&id) {
            Some(allocation) => {
                table.stats.releases += 1;
                log::info!(
                    "Allocator: Released {} units of {}.",
                    allocation.granted_capacity,
                    id
                );
                true
            }
            None => {
                log::debug!("Allocator: Release of unknown {} ignored.", id);
                false
            }
        }
    }

    /// Holds headroom for `request` for `ttl_ms` (0 uses the default TTL).
    pub fn reserve(&self, request: AllocationRequest, ttl_ms: u64) -> ResourceResult<Reservation> {
        request.validate()?;
        let now = self.clock.now_millis();
        let mut table = self.lock();
        let ttl = if ttl_ms == 0 {
            table.config.default_reservation_ttl_ms
        } else {
            ttl_ms
        };
        let availability = table.availability(request.required_capacity, request.required_memory);
        if !availability.sufficient {
            return Err(ResourceError::insufficient(format!(
                "cannot reserve {} units / {} bytes ({} units / {} bytes free)",
                request.required_capacity,
                request.required_memory,
                availability.available_capacity,
                availability.available_memory
            )));
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            created_at_ms: now,
            expires_at_ms: now.saturating_add(ttl),
            request,
        };
        table.stats.units_reserved += reservation.request.required_capacity;
        table.memory_reserved += reservation.request.required_memory;
        table
            .reservations
            .insert(reservation.id, reservation.clone());
        table.refresh_stats();
        log::info!(
            "Allocator: Reserved {} units as {} until {}ms.",
            reservation.request.required_capacity,
            reservation.id,
            reservation.expires_at_ms
        );
        Ok(reservation)
    }

    /// Turns a live reservation into an allocation of exactly the reserved
    /// amounts.
    ///
    /// # Errors
    /// `NotFound` for unknown ids; `Timeout` if the TTL has passed.
    pub fn claim_reservation(&self, id: ReservationId) -> ResourceResult<AllocationResult> {
        let now = self.clock.now_millis();
        let allocation = {
            let mut table = self.lock();
            let reservation = table
                .remove_reservation(&id)
                .ok_or_else(|| ResourceError::not_found(format!("reservation {}", id)))?;
            if now >= reservation.expires_at_ms {
                table.stats.expired_reservations += 1;
                return Err(ResourceError::Timeout(format!(
                    "reservation {} expired at {}ms",
                    id, reservation.expires_at_ms
                )));
            }
            let allocation = Allocation {
                id: AllocationId::new(),
                granted_capacity: reservation.request.required_capacity,
                granted_memory: reservation.request.required_memory,
                allocated_at_ms: now,
                expires_at_ms: now.saturating_add(table.config.allocation_validity_ms),
                request: reservation.request,
            };
            table.insert(allocation.clone());
            log::info!("Allocator: Claimed {} as {}.", id, allocation.id);
            allocation
        };
        Ok(self.to_result(&allocation))
    }

    /// Drops a reservation. Returns `false` for unknown ids.
    pub fn cancel_reservation(&self, id: ReservationId) -> bool {
        self.lock().remove_reservation(&id).is_some()
    }

    /// Extends the validity of an allocation. Returns the new expiry.
    ///
    /// # Errors
    /// `NotFound` for unknown ids; `Timeout` if the validity has already
    /// passed (the next sweep reclaims it).
    pub fn renew(&self, id: AllocationId) -> ResourceResult<u64> {
        let now = self.clock.now_millis();
        let mut table = self.lock();
        let validity = table.config.allocation_validity_ms;
        let allocation = table
            .allocations
            .get_mut(&id)
            .ok_or_else(|| ResourceError::not_found(format!("allocation {}", id)))?;
        if now >= allocation.expires_at_ms {
            return Err(ResourceError::Timeout(format!(
                "allocation {} expired at {}ms",
                id, allocation.expires_at_ms
            )));
        }
        allocation.expires_at_ms = now.saturating_add(validity);
        Ok(allocation.expires_at_ms)
    }

    /// Reclaims allocations past their validity and reservations past their
    /// TTL.
    pub fn sweep_expired(&self) -> SweepReport {
        let now = self.clock.now_millis();
        let mut table = self.lock();
        let mut report = SweepReport::default();

        let expired: Vec<AllocationId> = table
            .allocations
            .values()
            .filter(|a| now >= a.expires_at_ms)
            .map(|a| a.id)
            .collect();
        for id in expired {
            if let Some(allocation) = table.remove(&id) {
                table.stats.expired_allocations += 1;
                log::warn!(
                    "Allocator: {} expired; reclaimed {} units.",
                    id,
                    allocation.granted_capacity
                );
                report.expired_allocations.push(id);
            }
        }

        let lapsed: Vec<ReservationId> = table
            .reservations
            .values()
            .filter(|r| now >= r.expires_at_ms)
            .map(|r| r.id)
            .collect();
        for id in lapsed {
            if table.remove_reservation(&id).is_some() {
                table.stats.expired_reservations += 1;
                log::debug!("Allocator: Reservation {} lapsed.", id);
                report.expired_reservations.push(id);
            }
        }
        report
    }

    /// Lowers or raises the capacity ceiling. Capacity already held stays
    /// granted; new requests see the lower headroom.
    pub fn set_capacity_ceiling(&self, ceiling: u32) {
        let mut table = self.lock();
        let before = table.effective_total();
        table.ceiling = Some(ceiling);
        let after = table.effective_total();
        table.refresh_stats();
        if before != after {
            log::info!("Allocator: Capacity ceiling {} → {}.", before, after);
        }
    }

    /// The ceiling last set by the engine.
    pub fn capacity_ceiling(&self) -> Option<u32> {
        self.lock().ceiling
    }

    /// Effective capacity new requests are checked against.
    pub fn total_capacity(&self) -> u32 {
        self.lock().effective_total()
    }

    /// Replaces the configuration. Existing grants stay valid.
    pub fn set_config(&self, config: AllocationConfig) -> ResourceResult<()> {
        config.validate()?;
        let mut table = self.lock();
        table.config = config;
        table.refresh_stats();
        log::info!("Allocator: Configuration updated.");
        Ok(())
    }

    /// A copy of the configuration.
    pub fn config(&self) -> AllocationConfig {
        self.lock().config.clone()
    }

    /// A copy of the statistics.
    pub fn stats(&self) -> AllocationStats {
        self.lock().stats
    }

    /// Whether `id` is an active allocation.
    pub fn is_active(&self, id: AllocationId) -> bool {
        self.lock().allocations.contains_key(&id)
    }

    /// A copy of one allocation.
    pub fn allocation(&self, id: AllocationId) -> Option<Allocation> {
        self.lock().allocations.get(&id).cloned()
    }

    /// Every active allocation, oldest first.
    pub fn allocations(&self) -> Vec<Allocation> {
        let mut allocations: Vec<Allocation> = self.lock().allocations.values().cloned().collect();
        allocations.sort_by_key(|a| (a.allocated_at_ms, a.id));
        allocations
    }

    /// Every live reservation, oldest first.
    pub fn reservations(&self) -> Vec<Reservation> {
        let mut reservations: Vec<Reservation> =
            self.lock().reservations.values().cloned().collect();
        reservations.sort_by_key(|r| (r.created_at_ms, r.id));
        reservations
    }
}

/// Exposes compute-unit utilization of an [`AllocationManager`] as the
/// [`ResourceKind::ComputeUnits`] resource.
pub struct AllocationProbe {
    manager: Arc<AllocationManager>,
}

impl AllocationProbe {
    /// Probes `manager`.
    pub fn new(manager: Arc<AllocationManager>) -> Self {
        Self { manager }
    }
}

impl std::fmt::Debug for AllocationProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationProbe").finish_non_exhaustive()
    }
}

impl ResourceProbe for AllocationProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("allocation-units")
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::ComputeUnits
    }

    fn sample(&self) -> ResourceResult<ResourceSample> {
        let availability = self.manager.check_availability(0, 0);
        let total = availability.total_capacity as u64;
        let used = total - availability.available_capacity as u64;
        Ok(ResourceSample::from_absolute(used, total))
    }
}
