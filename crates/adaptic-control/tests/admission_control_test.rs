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

use adaptic_control::{AllocationConfig, AllocationManager, AllocationRequest};
use adaptic_core::{ErrorKind, ManualClock};
use std::sync::Arc;

const MIB: u64 = 1024 * 1024;

fn manager(config: AllocationConfig) -> (AllocationManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let manager = AllocationManager::new(config, clock.clone()).unwrap();
    (manager, clock)
}

#[test]
fn test_oversized_request_is_denied_without_side_effects() {
    // --- 1. ARRANGE ---
    let (allocator, _) = manager(AllocationConfig {
        max_capacity: 8,
        flexible_allocation: false,
        ..Default::default()
    });
    let before = allocator.check_availability(0, 0);

    // --- 2. ACT ---
    let result = allocator.allocate(AllocationRequest::new(10, MIB));

    // --- 3. ASSERT ---
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientResources);
    assert_eq!(
        allocator.check_availability(0, 0),
        before,
        "Headroom must be unchanged after a denial"
    );
    let stats = allocator.stats();
    assert_eq!(stats.failed_allocations, 1);
    assert_eq!(stats.units_in_use, 0);
    assert_eq!(stats.active_allocations, 0);
}

#[test]
fn test_flexible_allocation_grants_what_is_left() {
    // --- 1. ARRANGE ---
    let (allocator, _) = manager(AllocationConfig {
        max_capacity: 8,
        flexible_allocation: true,
        min_acceptable_units: 4,
        ..Default::default()
    });

    // --- 2. ACT ---
    let grant = allocator.allocate(AllocationRequest::new(10, MIB)).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(grant.granted_capacity, 8, "min(available, requested)");
    assert!(grant.partial);
    assert!(grant.granted_capacity >= 4);
    assert_eq!(allocator.stats().partial_allocations, 1);
    assert_eq!(allocator.check_availability(1, 1).available_capacity, 0);
}

#[test]
fn test_flexible_grant_never_drops_below_floor() {
    let (allocator, _) = manager(AllocationConfig {
        max_capacity: 8,
        flexible_allocation: true,
        min_acceptable_units: 4,
        ..Default::default()
    });
    allocator.allocate(AllocationRequest::new(5, MIB)).unwrap();

    // Three units left, below the floor of four.
    let err = allocator
        .allocate(AllocationRequest::new(6, MIB))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientResources);
    assert_eq!(allocator.stats().units_in_use, 5);
}

#[test]
fn test_floor_above_lowered_ceiling_is_invalid() {
    let (allocator, _) = manager(AllocationConfig {
        max_capacity: 16,
        flexible_allocation: true,
        min_acceptable_units: 6,
        ..Default::default()
    });
    // The adjuster shrank the system below the configured floor.
    allocator.set_capacity_ceiling(4);

    let err = allocator
        .allocate(AllocationRequest::new(8, MIB))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(allocator.stats().total_allocations, 0);

    // Requests that fit the ceiling outright are still granted.
    let grant = allocator.allocate(AllocationRequest::new(4, MIB)).unwrap();
    assert!(!grant.partial);
}

#[test]
fn test_allocation_sum_never_exceeds_total() {
    // --- 1. ARRANGE ---
    let (allocator, _) = manager(AllocationConfig {
        max_capacity: 12,
        flexible_allocation: true,
        min_acceptable_units: 1,
        ..Default::default()
    });
    let sizes = [3u32, 5, 7, 2, 9, 1, 4, 6];
    let mut granted = Vec::new();

    // --- 2. ACT ---
    for (round, size) in sizes.iter().enumerate() {
        if let Ok(grant) = allocator.allocate(AllocationRequest::new(*size, MIB)) {
            granted.push(grant.id);
        }
        if round % 3 == 2 {
            if let Some(id) = granted.first().copied() {
                assert!(allocator.release(id));
                granted.remove(0);
            }
        }

        // --- 3. ASSERT ---
        let held: u32 = allocator
            .allocations()
            .iter()
            .map(|a| a.granted_capacity)
            .sum();
        assert!(held <= allocator.total_capacity());
        assert_eq!(held, allocator.stats().units_in_use);
    }

    for id in granted {
        assert!(allocator.release(id));
        assert!(!allocator.release(id), "Second release must be a no-op");
    }
    let stats = allocator.stats();
    assert_eq!(stats.units_in_use, 0);
    assert_eq!(stats.memory_in_use, 0);
    assert_eq!(stats.resource_utilization, 0.0);
}

#[test]
fn test_reservation_claim_and_expiry() {
    let (allocator, clock) = manager(AllocationConfig {
        max_capacity: 8,
        ..Default::default()
    });

    let held = allocator
        .reserve(AllocationRequest::new(4, MIB), 500)
        .unwrap();
    let lapsing = allocator
        .reserve(AllocationRequest::new(2, MIB), 100)
        .unwrap();
    assert_eq!(allocator.check_availability(0, 0).available_capacity, 2);

    clock.advance(200);
    let report = allocator.sweep_expired();
    assert_eq!(report.expired_reservations, vec![lapsing.id]);
    assert_eq!(
        allocator.claim_reservation(lapsing.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let grant = allocator.claim_reservation(held.id).unwrap();
    assert_eq!(grant.granted_capacity, 4);
    assert_eq!(allocator.stats().units_reserved, 0);
    assert_eq!(allocator.stats().units_in_use, 4);
}

#[test]
fn test_unrenewed_allocation_is_swept() {
    let (allocator, clock) = manager(AllocationConfig {
        max_capacity: 8,
        allocation_validity_ms: 1_000,
        ..Default::default()
    });
    let kept = allocator.allocate(AllocationRequest::new(2, MIB)).unwrap();
    let dropped = allocator.allocate(AllocationRequest::new(3, MIB)).unwrap();

    clock.advance(600);
    allocator.renew(kept.id).unwrap();
    clock.advance(600);

    let report = allocator.sweep_expired();
    assert_eq!(report.expired_allocations, vec![dropped.id]);
    assert!(allocator.is_active(kept.id));
    assert_eq!(allocator.stats().units_in_use, 2);
    assert_eq!(
        allocator.renew(dropped.id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
