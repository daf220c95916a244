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

//! Registry for managing resource probes.

use adaptic_core::monitoring::{ResourceKind, ResourceProbe};
use std::sync::{Arc, Mutex, MutexGuard};

/// A thread-safe registry for resource probes.
#[derive(Debug, Clone)]
pub struct ProbeRegistry {
    probes: Arc<Mutex<Vec<Arc<dyn ResourceProbe>>>>,
}

impl ProbeRegistry {
    /// Creates a new, empty probe registry.
    pub fn new() -> Self {
        Self {
            probes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Arc<dyn ResourceProbe>>> {
        self.probes.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Registers a new probe. A probe with the same id replaces the old one.
    pub fn register(&self, probe: Arc<dyn ResourceProbe>) {
        let mut probes = self.guard();
        let probe_id = probe.probe_id().to_string();
        probes.retain(|p| p.probe_id() != probe_id);
        log::info!(
            "Registered resource probe: {} ({})",
            probe_id,
            probe.resource_kind()
        );
        probes.push(probe);
    }

    /// Removes the probe with `probe_id`. Returns `false` if none matched.
    pub fn unregister(&self, probe_id: &str) -> bool {
        let mut probes = self.guard();
        let before = probes.len();
        probes.retain(|p| p.probe_id() != probe_id);
        probes.len() != before
    }

    /// Returns a clone of all registered probes.
    ///
    /// The registry lock is released before the caller samples them.
    pub fn get_all_probes(&self) -> Vec<Arc<dyn ResourceProbe>> {
        self.guard().clone()
    }

    /// Returns the probes measuring `kind`.
    pub fn probes_for(&self, kind: ResourceKind) -> Vec<Arc<dyn ResourceProbe>> {
        self.guard()
            .iter()
            .filter(|p| p.resource_kind() == kind)
            .cloned()
            .collect()
    }

    /// Returns the number of registered probes.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Returns `true` if no probe is registered.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptic_core::error::ResourceResult;
    use adaptic_core::monitoring::ResourceSample;
    use std::borrow::Cow;

    #[derive(Debug)]
    struct FixedProbe {
        id: &'static str,
        kind: ResourceKind,
    }

    impl ResourceProbe for FixedProbe {
        fn probe_id(&self) -> Cow<'static, str> {
            Cow::Borrowed(self.id)
        }
        fn resource_kind(&self) -> ResourceKind {
            self.kind
        }
        fn sample(&self) -> ResourceResult<ResourceSample> {
            Ok(ResourceSample::from_percent(10.0))
        }
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ProbeRegistry::new();
        registry.register(Arc::new(FixedProbe {
            id: "cpu",
            kind: ResourceKind::Cpu,
        }));
        registry.register(Arc::new(FixedProbe {
            id: "cpu",
            kind: ResourceKind::Cpu,
        }));
        registry.register(Arc::new(FixedProbe {
            id: "mem",
            kind: ResourceKind::Memory,
        }));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.probes_for(ResourceKind::Cpu).len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = ProbeRegistry::new();
        registry.register(Arc::new(FixedProbe {
            id: "cpu",
            kind: ResourceKind::Cpu,
        }));
        assert!(registry.unregister("cpu"));
        assert!(!registry.unregister("cpu"));
        assert!(registry.is_empty());
    }
}
