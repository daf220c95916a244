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

//! sysinfo-based implementation of the CapabilityProvider trait.

use adaptic_core::capability::{
    AcceleratorCapability, CapabilityProvider, CapabilitySnapshot, ComputeUnitCapability,
    CpuCapability, MemoryCapability, NetworkCapability, StorageCapability,
};
use adaptic_core::clock::Clock;
use adaptic_core::error::{ResourceError, ResourceResult};
use std::sync::{Arc, Mutex, RwLock};
use sysinfo::{Disks, Networks, System};

/// Link speed assumed for connected interfaces; sysinfo does not report it.
pub const DEFAULT_LINK_MBPS: f64 = 1000.0;

/// A capability provider that probes the host with the `sysinfo` crate.
///
/// sysinfo knows nothing about accelerators, so an attached device is
/// described through [`with_accelerator`](Self::with_accelerator).
pub struct SysinfoCapabilityDetector {
    system: Mutex<System>,
    snapshot: RwLock<CapabilitySnapshot>,
    accelerator: Option<AcceleratorCapability>,
    compute: ComputeUnitCapability,
    link_mbps: f64,
    clock: Arc<dyn Clock>,
}

impl SysinfoCapabilityDetector {
    /// Creates a detector and runs the first probe.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        let compute = ComputeUnitCapability::default();
        let snapshot = probe(&system, None, &compute, DEFAULT_LINK_MBPS, clock.now_millis());
        log::info!(
            "Detector: '{}' scored {:.1}, recommends {} units.",
            snapshot.device_name,
            snapshot.score,
            snapshot.recommended_capacity
        );
        Self {
            system: Mutex::new(system),
            snapshot: RwLock::new(snapshot),
            accelerator: None,
            compute,
            link_mbps: DEFAULT_LINK_MBPS,
            clock,
        }
    }

    /// Declares an attached accelerator and re-probes.
    pub fn with_accelerator(mut self, accelerator: AcceleratorCapability) -> Self {
        self.accelerator = Some(accelerator);
        self.reprobe();
        self
    }

    /// Overrides the computation-unit characteristics and re-probes.
    pub fn with_compute(mut self, compute: ComputeUnitCapability) -> Self {
        self.compute = compute;
        self.reprobe();
        self
    }

    /// Overrides the assumed link speed of connected interfaces.
    pub fn with_link_speed(mut self, link_mbps: f64) -> Self {
        self.link_mbps = link_mbps;
        self.reprobe();
        self
    }

    fn reprobe(&self) -> CapabilitySnapshot {
        let now = self.clock.now_millis();
        let snapshot = {
            let mut system = self.system.lock().unwrap_or_else(|p| p.into_inner());
            system.refresh_cpu_all();
            system.refresh_memory();
            probe(
                &system,
                self.accelerator.as_ref(),
                &self.compute,
                self.link_mbps,
                now,
            )
        };
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot.clone(),
            Err(poisoned) => *poisoned.into_inner() = snapshot.clone(),
        }
        snapshot
    }
}

impl CapabilityProvider for SysinfoCapabilityDetector {
    fn capability(&self) -> CapabilitySnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn refresh(&self) -> ResourceResult<()> {
        let snapshot = self.reprobe();
        if snapshot.memory.total_bytes == 0 {
            return Err(ResourceError::DeviceUnavailable(
                "sysinfo reported no memory on this platform".into(),
            ));
        }
        log::debug!(
            "Detector: Re-probed '{}' ({} bytes free, recommends {} units).",
            snapshot.device_name,
            snapshot.memory.available_bytes,
            snapshot.recommended_capacity
        );
        Ok(())
    }
}

fn probe(
    system: &System,
    accelerator: Option<&AcceleratorCapability>,
    compute: &ComputeUnitCapability,
    link_mbps: f64,
    now: u64,
) -> CapabilitySnapshot {
    let cpus = system.cpus();
    let logical_cores = cpus.len() as u32;
    let cpu = CpuCapability {
        logical_cores,
        physical_cores: System::physical_core_count()
            .map(|n| n as u32)
            .unwrap_or(logical_cores),
        frequency_mhz: cpus.iter().map(|c| c.frequency()).max().unwrap_or(0),
    };

    let memory = MemoryCapability {
        total_bytes: system.total_memory(),
        available_bytes: system.available_memory(),
    };

    let disks = Disks::new_with_refreshed_list();
    let storage = StorageCapability {
        total_bytes: disks.list().iter().map(|d| d.total_space()).sum(),
        available_bytes: disks.list().iter().map(|d| d.available_space()).sum(),
        read_mbps: 0.0,
        write_mbps: 0.0,
    };

    let networks = Networks::new_with_refreshed_list();
    let connected = networks.list().keys().any(|name| !is_loopback(name));
    let network = NetworkCapability {
        bandwidth_mbps: if connected { link_mbps } else { 0.0 },
        latency_ms: 0.0,
        connected,
    };

    let host = System::host_name().unwrap_or_else(|| "localhost".to_string());
    let mut compute = compute.clone();
    let accelerator = match accelerator {
        Some(accelerator) => {
            compute.max_physical_units = accelerator.compute_units;
            AcceleratorCapability {
                present: true,
                ..accelerator.clone()
            }
        }
        None => AcceleratorCapability::default(),
    };

    CapabilitySnapshot::new(
        format!("host-{}", host),
        host,
        now,
        cpu,
        memory,
        storage,
        network,
        accelerator,
        compute,
    )
}

pub(crate) fn is_loopback(interface: &str) -> bool {
    interface == "lo" || interface.starts_with("lo0") || interface.starts_with("Loopback")
}
