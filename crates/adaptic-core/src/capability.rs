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

//! Device capability snapshots and the provider contract.
//!
//! A [`CapabilitySnapshot`] is the immutable result of probing a device. The
//! adaptation layer never probes the operating system itself; it reads
//! snapshots from a [`CapabilityProvider`], typically the sysinfo-backed
//! detector in `adaptic-infra`.

use crate::error::ResourceResult;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Bytes per real component of a double-precision amplitude.
pub const DEFAULT_PRECISION_FACTOR: u32 = 8;

/// Memory needed to hold a state vector of `capacity` computation units.
///
/// Each amplitude is a complex number of two reals, so the footprint is
/// `2 × precision_factor × 2^capacity` bytes. Saturates at `u64::MAX`.
pub fn state_vector_bytes(capacity: u32, precision_factor: u32) -> u64 {
    let per_amplitude = 2u64.saturating_mul(precision_factor as u64);
    if capacity >= 64 {
        return u64::MAX;
    }
    per_amplitude.saturating_mul(1u64 << capacity)
}

/// Processor characteristics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuCapability {
    /// Number of logical cores.
    pub logical_cores: u32,
    /// Number of physical cores.
    pub physical_cores: u32,
    /// Nominal clock frequency in MHz.
    pub frequency_mhz: u64,
}

/// System memory figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCapability {
    /// Installed memory in bytes.
    pub total_bytes: u64,
    /// Memory available to the process at probe time, in bytes.
    pub available_bytes: u64,
}

/// Persistent storage figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageCapability {
    /// Total storage in bytes.
    pub total_bytes: u64,
    /// Free storage in bytes.
    pub available_bytes: u64,
    /// Sequential read speed, MB/s.
    pub read_mbps: f64,
    /// Sequential write speed, MB/s.
    pub write_mbps: f64,
}

/// Network link figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkCapability {
    /// Link bandwidth in Mbit/s.
    pub bandwidth_mbps: f64,
    /// Round-trip latency in milliseconds.
    pub latency_ms: f64,
    /// Whether any interface is up.
    pub connected: bool,
}

/// An attached accelerator able to execute workloads on physical units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorCapability {
    /// Whether an accelerator was detected.
    pub present: bool,
    /// Vendor/device name.
    pub name: String,
    /// Onboard memory in bytes.
    pub memory_bytes: u64,
    /// Physical computation units offered by the device.
    pub compute_units: u32,
}

/// Computation-unit capacity and fidelity characteristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeUnitCapability {
    /// Largest state the simulator accepts, in units. 0 means unbounded.
    pub max_simulated_units: u32,
    /// Units physically available on the accelerator.
    pub max_physical_units: u32,
    /// Fidelity of a depth-zero workload.
    pub base_fidelity: f64,
    /// Error probability per circuit layer.
    pub gate_error_rate: f64,
    /// Coherence time of physical units in microseconds.
    pub coherence_time_us: f64,
}

impl Default for ComputeUnitCapability {
    fn default() -> Self {
        Self {
            max_simulated_units: 32,
            max_physical_units: 0,
            base_fidelity: 0.999,
            gate_error_rate: 0.001,
            coherence_time_us: 100.0,
        }
    }
}

/// The immutable result of a device probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Stable device identity.
    pub device_id: String,
    /// Human-readable device name.
    pub device_name: String,
    /// When the probe ran, epoch millis.
    pub detected_at_ms: u64,
    /// Processor record.
    pub cpu: CpuCapability,
    /// Memory record.
    pub memory: MemoryCapability,
    /// Storage record.
    pub storage: StorageCapability,
    /// Network record.
    pub network: NetworkCapability,
    /// Accelerator record.
    pub accelerator: AcceleratorCapability,
    /// Computation-unit record.
    pub compute: ComputeUnitCapability,
    /// Composite score, 0–100.
    pub score: f64,
    /// Capacity the device comfortably sustains.
    pub recommended_capacity: u32,
}

impl CapabilitySnapshot {
    /// Builds a snapshot and derives its score and recommended capacity.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: impl Into<String>,
        device_name: impl Into<String>,
        detected_at_ms: u64,
        cpu: CpuCapability,
        memory: MemoryCapability,
        storage: StorageCapability,
        network: NetworkCapability,
        accelerator: AcceleratorCapability,
        compute: ComputeUnitCapability,
    ) -> Self {
        let mut snapshot = Self {
            device_id: device_id.into(),
            device_name: device_name.into(),
            detected_at_ms,
            cpu,
            memory,
            storage,
            network,
            accelerator,
            compute,
            score: 0.0,
            recommended_capacity: 0,
        };
        snapshot.score = snapshot.composite_score();
        snapshot.recommended_capacity = snapshot.derive_recommended_capacity();
        snapshot
    }

    /// A nominal simulation host with `available_bytes` of free memory and no
    /// accelerator.
    pub fn simulated(available_bytes: u64) -> Self {
        Self::new(
            "sim-0",
            "simulated host",
            0,
            CpuCapability {
                logical_cores: 8,
                physical_cores: 4,
                frequency_mhz: 3000,
            },
            MemoryCapability {
                total_bytes: available_bytes.saturating_mul(2),
                available_bytes,
            },
            StorageCapability::default(),
            NetworkCapability::default(),
            AcceleratorCapability::default(),
            ComputeUnitCapability::default(),
        )
    }

    /// Returns a copy with an accelerator of `compute_units` physical units.
    pub fn with_accelerator(mut self, name: impl Into<String>, compute_units: u32) -> Self {
        self.accelerator = AcceleratorCapability {
            present: true,
            name: name.into(),
            memory_bytes: 0,
            compute_units,
        };
        self.compute.max_physical_units = compute_units;
        self.score = self.composite_score();
        self.recommended_capacity = self.derive_recommended_capacity();
        self
    }

    /// Returns a copy with `recommended_capacity` overridden.
    ///
    /// Used for simulated devices whose nominal capacity is known up front.
    pub fn with_recommended_capacity(mut self, capacity: u32) -> Self {
        self.recommended_capacity = capacity;
        self
    }

    /// Whether physical execution is possible on this device.
    pub fn has_accelerator(&self) -> bool {
        self.accelerator.present && self.physical_units() > 0
    }

    /// Physical units offered by the accelerator, if any.
    pub fn physical_units(&self) -> u32 {
        if !self.accelerator.present {
            return 0;
        }
        self.accelerator
            .compute_units
            .max(self.compute.max_physical_units)
    }

    /// Weighted score: CPU 30%, memory 30%, storage 10%, network 10%, accelerator 20%.
    pub fn composite_score(&self) -> f64 {
        let cpu = (self.cpu.logical_cores as f64 / 16.0 * 60.0
            + self.cpu.frequency_mhz as f64 / 4000.0 * 40.0)
            .min(100.0);
        let memory = (self.memory.total_bytes as f64 / GIB / 32.0 * 100.0).min(100.0);
        let storage = (self.storage.available_bytes as f64 / GIB / 512.0 * 70.0
            + self.storage.read_mbps / 3000.0 * 30.0)
            .min(100.0);
        let network = if self.network.connected {
            let latency = if self.network.latency_ms <= 10.0 {
                30.0
            } else {
                300.0 / self.network.latency_ms
            };
            (self.network.bandwidth_mbps / 1000.0 * 70.0 + latency).min(100.0)
        } else {
            0.0
        };
        let accelerator = if self.accelerator.present {
            (50.0 + self.physical_units() as f64 / 128.0 * 50.0).min(100.0)
        } else {
            0.0
        };

        (cpu * 0.3 + memory * 0.3 + storage * 0.1 + network * 0.1 + accelerator * 0.2)
            .clamp(0.0, 100.0)
    }

    /// Largest state-vector capacity that fits in half of the available
    /// memory, capped by the simulator limit; physical units win if larger.
    fn derive_recommended_capacity(&self) -> u32 {
        let budget = self.memory.available_bytes / 2;
        let mut simulated = 0u32;
        while simulated < 63
            && state_vector_bytes(simulated + 1, DEFAULT_PRECISION_FACTOR) <= budget
        {
            simulated += 1;
        }
        if self.compute.max_simulated_units > 0 {
            simulated = simulated.min(self.compute.max_simulated_units);
        }
        simulated.max(self.physical_units())
    }
}

/// Source of device capability snapshots.
pub trait CapabilityProvider: Send + Sync {
    /// Returns the most recent snapshot.
    fn capability(&self) -> CapabilitySnapshot;

    /// Re-probes the device, replacing the snapshot wholesale.
    /// Providers with fixed data keep the default no-op.
    fn refresh(&self) -> ResourceResult<()> {
        Ok(())
    }
}

/// A provider serving a caller-supplied snapshot.
#[derive(Debug)]
pub struct StaticCapabilityProvider {
    snapshot: RwLock<CapabilitySnapshot>,
}

impl StaticCapabilityProvider {
    /// Wraps `snapshot`.
    pub fn new(snapshot: CapabilitySnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Replaces the served snapshot.
    pub fn replace(&self, snapshot: CapabilitySnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl CapabilityProvider for StaticCapabilityProvider {
    fn capability(&self) -> CapabilitySnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
