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

//! System memory probe.

use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::{ResourceKind, ResourceProbe, ResourceSample};
use std::borrow::Cow;
use std::sync::Mutex;
use sysinfo::System;

/// Samples used versus installed system memory, in bytes.
#[derive(Debug)]
pub struct MemoryProbe {
    id: String,
    system: Mutex<System>,
}

impl MemoryProbe {
    /// Creates a probe named `id`.
    pub fn new(id: impl Into<String>) -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            id: id.into(),
            system: Mutex::new(system),
        }
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new("sysinfo-memory")
    }
}

impl ResourceProbe for MemoryProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Owned(self.id.clone())
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Memory
    }

    fn update(&self) {
        self.system
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .refresh_memory();
    }

    fn sample(&self) -> ResourceResult<ResourceSample> {
        let system = self.system.lock().unwrap_or_else(|p| p.into_inner());
        let total = system.total_memory();
        if total == 0 {
            return Err(ResourceError::DeviceUnavailable(
                "memory figures unavailable".into(),
            ));
        }
        let used = total.saturating_sub(system.available_memory());
        Ok(ResourceSample::from_absolute(used, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_probe_used_within_total() {
        let probe = MemoryProbe::new("mem");
        probe.update();
        let sample = probe.sample().unwrap();
        assert!(sample.total > 0);
        assert!(sample.used <= sample.total);
        assert!((0.0..=100.0).contains(&sample.usage_percent));
    }
}
