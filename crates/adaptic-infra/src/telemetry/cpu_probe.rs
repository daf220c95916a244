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

//! Processor load probe.

use adaptic_core::error::ResourceResult;
use adaptic_core::monitoring::{ResourceKind, ResourceProbe, ResourceSample};
use std::borrow::Cow;
use std::sync::Mutex;
use sysinfo::System;

/// Samples the global CPU utilization.
///
/// sysinfo derives usage from the delta between two refreshes, so the first
/// sample after construction reads close to zero.
#[derive(Debug)]
pub struct CpuProbe {
    id: String,
    system: Mutex<System>,
}

impl CpuProbe {
    /// Creates a probe named `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            id: id.into(),
            system: Mutex::new(system),
        }
    }
}

impl Default for CpuProbe {
    fn default() -> Self {
        Self::new("sysinfo-cpu")
    }
}

impl ResourceProbe for CpuProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Owned(self.id.clone())
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Cpu
    }

    fn update(&self) {
        self.system
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .refresh_cpu_all();
    }

    fn sample(&self) -> ResourceResult<ResourceSample> {
        let system = self.system.lock().unwrap_or_else(|p| p.into_inner());
        let cores = system.cpus().len() as u64;
        let usage = system.global_cpu_usage() as f64;
        let mut sample = ResourceSample::from_percent(usage);
        // Busy cores, rounded, out of the logical core count.
        sample.total = cores;
        sample.used = ((usage / 100.0) * cores as f64).round() as u64;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_probe_reports_percentage() {
        let probe = CpuProbe::default();
        assert_eq!(probe.resource_kind(), ResourceKind::Cpu);
        assert_eq!(probe.probe_id(), "sysinfo-cpu");
        probe.update();
        let sample = probe.sample().unwrap();
        assert!((0.0..=100.0).contains(&sample.usage_percent));
        assert!(sample.used <= sample.total);
    }
}
