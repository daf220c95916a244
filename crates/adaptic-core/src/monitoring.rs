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

//! Traits and data structures for active resource monitoring.
//!
//! A [`ResourceProbe`] actively polls one resource and returns a
//! [`ResourceSample`]. The monitor in `adaptic-telemetry` folds the samples of
//! all probes into a [`ResourceStatus`] each tick.

use crate::error::ResourceResult;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// The kinds of resource the monitor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Processor load.
    Cpu,
    /// System memory.
    Memory,
    /// Persistent storage.
    Storage,
    /// Network link.
    Network,
    /// Attached accelerator.
    Accelerator,
    /// Allocated computation units.
    ComputeUnits,
}

impl ResourceKind {
    /// Every kind, in report order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Cpu,
        ResourceKind::Memory,
        ResourceKind::Storage,
        ResourceKind::Network,
        ResourceKind::Accelerator,
        ResourceKind::ComputeUnits,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Severity derived from a utilization percentage and its thresholds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum AlertLevel {
    /// Below the warning threshold.
    #[default]
    None,
    /// At or above the warning threshold.
    Warning,
    /// At or above the critical threshold.
    Critical,
}

/// Selects which resource kinds a subscriber hears about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceFilter {
    /// Every kind.
    Any,
    /// A single kind.
    Kind(ResourceKind),
}

impl ResourceFilter {
    /// Whether `kind` passes this filter.
    pub fn matches(&self, kind: ResourceKind) -> bool {
        match self {
            ResourceFilter::Any => true,
            ResourceFilter::Kind(k) => *k == kind,
        }
    }
}

/// A single measurement returned by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Utilization, 0–100.
    pub usage_percent: f64,
    /// Absolute amount in use (bytes, units or Mbit/s depending on the kind).
    pub used: u64,
    /// Absolute amount available in total, same unit as `used`.
    pub total: u64,
}

impl ResourceSample {
    /// Builds a sample from absolute figures, deriving the percentage.
    pub fn from_absolute(used: u64, total: u64) -> Self {
        let usage_percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Self {
            usage_percent,
            used,
            total,
        }
    }

    /// Builds a sample from a percentage alone.
    pub fn from_percent(usage_percent: f64) -> Self {
        Self {
            usage_percent: usage_percent.clamp(0.0, 100.0),
            used: 0,
            total: 0,
        }
    }
}

/// The monitor's view of one resource kind at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceReading {
    /// Utilization, 0–100.
    pub usage_percent: f64,
    /// Absolute amount in use.
    pub used: u64,
    /// Absolute total.
    pub total: u64,
    /// Derived alert level.
    pub level: AlertLevel,
    /// `true` if the last probe failed and these figures are carried over.
    pub stale: bool,
    /// When the figures were last successfully sampled.
    pub sampled_at_ms: u64,
}

/// A timestamped view of every sampled resource kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// When the status was produced, epoch millis.
    pub timestamp_ms: u64,
    /// One reading per sampled kind.
    pub readings: BTreeMap<ResourceKind, ResourceReading>,
}

impl ResourceStatus {
    /// Returns the reading for `kind`, if it was sampled.
    pub fn reading(&self, kind: ResourceKind) -> Option<&ResourceReading> {
        self.readings.get(&kind)
    }

    /// Utilization of `kind`, or 0.0 if it was never sampled.
    pub fn usage(&self, kind: ResourceKind) -> f64 {
        self.reading(kind).map(|r| r.usage_percent).unwrap_or(0.0)
    }

    /// Alert level of `kind`, or `None` if it was never sampled.
    pub fn level(&self, kind: ResourceKind) -> AlertLevel {
        self.reading(kind).map(|r| r.level).unwrap_or_default()
    }

    /// The most severe level across all kinds.
    pub fn overall_level(&self) -> AlertLevel {
        self.readings
            .values()
            .map(|r| r.level)
            .max()
            .unwrap_or_default()
    }

    /// Kinds whose last probe failed.
    pub fn stale_kinds(&self) -> Vec<ResourceKind> {
        self.readings
            .iter()
            .filter(|(_, r)| r.stale)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// The core trait for a resource probe.
///
/// A probe is a stateful object, typically living in `adaptic-infra`, that
/// knows how to query one system resource. The monitor holds a collection of
/// probes and calls `update` then `sample` on each tick.
pub trait ResourceProbe: Send + Sync + Debug + 'static {
    /// Returns a unique, human-readable identifier for this probe instance.
    fn probe_id(&self) -> Cow<'static, str>;

    /// Returns the kind of resource this probe measures.
    fn resource_kind(&self) -> ResourceKind;

    /// Returns a measurement, or an error if the resource could not be read.
    fn sample(&self) -> ResourceResult<ResourceSample>;

    /// Lets the probe refresh internal state before sampling.
    fn update(&self) {
        // Default: no-op
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_levels_are_ordered() {
        assert!(AlertLevel::None < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Critical);
    }

    #[test]
    fn test_filter_matching() {
        assert!(ResourceFilter::Any.matches(ResourceKind::Network));
        assert!(ResourceFilter::Kind(ResourceKind::Cpu).matches(ResourceKind::Cpu));
        assert!(!ResourceFilter::Kind(ResourceKind::Cpu).matches(ResourceKind::Memory));
    }

    #[test]
    fn test_sample_from_absolute() {
        let sample = ResourceSample::from_absolute(3, 4);
        assert_eq!(sample.usage_percent, 75.0);
        assert_eq!(ResourceSample::from_absolute(5, 0).usage_percent, 0.0);
    }

    #[test]
    fn test_status_accessors() {
        let mut status = ResourceStatus::default();
        status.readings.insert(
            ResourceKind::Cpu,
            ResourceReading {
                usage_percent: 91.0,
                level: AlertLevel::Critical,
                ..Default::default()
            },
        );
        status.readings.insert(
            ResourceKind::Memory,
            ResourceReading {
                usage_percent: 40.0,
                stale: true,
                ..Default::default()
            },
        );
        assert_eq!(status.usage(ResourceKind::Cpu), 91.0);
        assert_eq!(status.level(ResourceKind::Storage), AlertLevel::None);
        assert_eq!(status.overall_level(), AlertLevel::Critical);
        assert_eq!(status.stale_kinds(), vec![ResourceKind::Memory]);
    }
}
