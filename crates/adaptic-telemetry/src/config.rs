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

//! Configuration for the resource monitor.

use crate::alerts::AlertThresholds;
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::ResourceKind;
use serde::{Deserialize, Serialize};

/// Configuration for the [`ResourceMonitor`](crate::ResourceMonitor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Period of the sampler thread.
    pub sampling_interval_ms: u64,
    /// `status()` refreshes first when the cached status is older than this.
    pub staleness_bound_ms: u64,
    /// Number of statuses kept in the history ring.
    pub history_size: usize,
    /// Kinds that are sampled; probes for other kinds are skipped.
    pub enabled_kinds: Vec<ResourceKind>,
    /// Per-kind alert thresholds.
    pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 1000,
            staleness_bound_ms: 2000,
            history_size: 120,
            enabled_kinds: ResourceKind::ALL.to_vec(),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Rejects values the monitor cannot work with.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.sampling_interval_ms == 0 {
            return Err(ResourceError::invalid("sampling interval must be positive"));
        }
        if self.history_size == 0 {
            return Err(ResourceError::invalid("history size must be positive"));
        }
        self.thresholds.validate()
    }

    /// Whether `kind` is sampled.
    pub fn is_enabled(&self, kind: ResourceKind) -> bool {
        self.enabled_kinds.contains(&kind)
    }
}
