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

//! Alert thresholds and level transitions.

use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::{AlertLevel, ResourceFilter, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Warning and critical utilization thresholds for one resource kind, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThreshold {
    /// Usage at or above this is a warning.
    pub warning: f64,
    /// Usage at or above this is critical.
    pub critical: f64,
}

impl AlertThreshold {
    /// Creates a validated threshold pair.
    pub fn new(warning: f64, critical: f64) -> ResourceResult<Self> {
        let threshold = Self { warning, critical };
        threshold.validate()?;
        Ok(threshold)
    }

    /// Checks `0 ≤ warning ≤ critical ≤ 100`.
    pub fn validate(&self) -> ResourceResult<()> {
        if !(0.0..=100.0).contains(&self.warning) || !(0.0..=100.0).contains(&self.critical) {
            return Err(ResourceError::invalid(format!(
                "thresholds {}/{} outside [0, 100]",
                self.warning, self.critical
            )));
        }
        if self.warning > self.critical {
            return Err(ResourceError::invalid(format!(
                "warning threshold {} above critical threshold {}",
                self.warning, self.critical
            )));
        }
        Ok(())
    }

    /// `usage ≥ critical → Critical; usage ≥ warning → Warning; else None`.
    pub fn classify(&self, usage_percent: f64) -> AlertLevel {
        if usage_percent >= self.critical {
            AlertLevel::Critical
        } else if usage_percent >= self.warning {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        }
    }
}

/// The per-kind threshold table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    thresholds: BTreeMap<ResourceKind, AlertThreshold>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        let defaults = [
            (ResourceKind::Cpu, 70.0, 90.0),
            (ResourceKind::Memory, 80.0, 95.0),
            (ResourceKind::Storage, 85.0, 95.0),
            (ResourceKind::Network, 80.0, 95.0),
            (ResourceKind::Accelerator, 80.0, 95.0),
            (ResourceKind::ComputeUnits, 85.0, 95.0),
        ];
        Self {
            thresholds: defaults
                .into_iter()
                .map(|(kind, warning, critical)| (kind, AlertThreshold { warning, critical }))
                .collect(),
        }
    }
}

impl AlertThresholds {
    /// Returns the threshold for `kind`, falling back to 80/95.
    pub fn get(&self, kind: ResourceKind) -> AlertThreshold {
        self.thresholds
            .get(&kind)
            .copied()
            .unwrap_or(AlertThreshold {
                warning: 80.0,
                critical: 95.0,
            })
    }

    /// Validates and stores a threshold for `kind`.
    pub fn set(&mut self, kind: ResourceKind, warning: f64, critical: f64) -> ResourceResult<()> {
        let threshold = AlertThreshold::new(warning, critical)?;
        self.thresholds.insert(kind, threshold);
        Ok(())
    }

    /// Classifies `usage_percent` against the threshold of `kind`.
    pub fn classify(&self, kind: ResourceKind, usage_percent: f64) -> AlertLevel {
        self.get(kind).classify(usage_percent)
    }

    /// Validates every stored threshold.
    pub fn validate(&self) -> ResourceResult<()> {
        self.thresholds.values().try_for_each(|t| t.validate())
    }

    /// Iterates over stored thresholds in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, &AlertThreshold)> {
        self.thresholds.iter()
    }
}

/// A level transition observed for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertEvent {
    /// The resource whose level changed.
    pub kind: ResourceKind,
    /// Level before the tick.
    pub previous: AlertLevel,
    /// Level after the tick.
    pub current: AlertLevel,
    /// Utilization that produced `current`.
    pub usage_percent: f64,
    /// When the transition was observed.
    pub timestamp_ms: u64,
}

impl AlertEvent {
    /// Returns `true` if the level went up.
    pub fn is_escalation(&self) -> bool {
        self.current > self.previous
    }
}

/// Handler invoked on an alert transition.
pub type AlertCallback = Arc<dyn Fn(&AlertEvent) + Send + Sync>;

/// A registered alert handler and its filter.
#[derive(Clone)]
pub(crate) struct AlertSubscription {
    pub filter: ResourceFilter,
    pub min_level: AlertLevel,
    pub callback: AlertCallback,
}

impl AlertSubscription {
    /// A subscriber hears a transition when its kind matches and its minimum
    /// level is reached by either side of the transition, so recoveries reach
    /// the same subscribers that heard the escalation.
    pub fn accepts(&self, event: &AlertEvent) -> bool {
        self.filter.matches(event.kind) && self.min_level <= event.previous.max(event.current)
    }
}

impl std::fmt::Debug for AlertSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSubscription")
            .field("filter", &self.filter)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}
