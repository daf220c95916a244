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

//! Engine configuration and its JSON persistence.

use adaptic_control::{AllocationConfig, BalancerConfig, CapacityConfiguration};
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_telemetry::MonitorConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The sub-loops a tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopFlags {
    /// Refresh the resource monitor.
    pub monitor: bool,
    /// Reclaim expired reservations and allocations.
    pub sweep: bool,
    /// Offer pending tasks to the allocator.
    pub balancer: bool,
    /// Let the capacity adjuster re-size the system.
    pub adjuster: bool,
    /// Rebalance on every tick instead of every `rebalance_interval_ms`.
    pub rebalance_every_tick: bool,
    /// Re-probe the device every `capability_refresh_interval_ms`.
    pub capability_refresh: bool,
}

/// How much of the adaptation machinery the engine runs.
///
/// Each level includes everything the previous one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizationLevel {
    /// Monitoring and expiry only.
    None,
    /// Adds task balancing.
    Minimal,
    /// Adds capacity adjustment.
    #[default]
    Standard,
    /// Rebalances every tick and re-probes the device.
    Aggressive,
    /// Explicit choice of sub-loops.
    Custom(LoopFlags),
}

impl OptimizationLevel {
    /// The sub-loops enabled at this level.
    pub fn flags(&self) -> LoopFlags {
        let base = LoopFlags {
            monitor: true,
            sweep: true,
            ..Default::default()
        };
        match self {
            OptimizationLevel::None => base,
            OptimizationLevel::Minimal => LoopFlags {
                balancer: true,
                ..base
            },
            OptimizationLevel::Standard => LoopFlags {
                balancer: true,
                adjuster: true,
                ..base
            },
            OptimizationLevel::Aggressive => LoopFlags {
                balancer: true,
                adjuster: true,
                rebalance_every_tick: true,
                capability_refresh: true,
                ..base
            },
            OptimizationLevel::Custom(flags) => *flags,
        }
    }
}

/// Configuration of a [`ResourceAdaptiveEngine`](crate::ResourceAdaptiveEngine)
/// and all of its components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which sub-loops run.
    pub level: OptimizationLevel,
    /// Period of the background loop.
    pub tick_interval_ms: u64,
    /// Minimum time between two device re-probes.
    pub capability_refresh_interval_ms: u64,
    /// Resource monitor settings.
    pub monitor: MonitorConfig,
    /// Capacity adjuster settings.
    pub capacity: CapacityConfiguration,
    /// Allocation manager settings.
    pub allocation: AllocationConfig,
    /// Task balancer settings.
    pub balancer: BalancerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level: OptimizationLevel::default(),
            tick_interval_ms: 100,
            capability_refresh_interval_ms: 30_000,
            monitor: MonitorConfig::default(),
            capacity: CapacityConfiguration::default(),
            allocation: AllocationConfig::default(),
            balancer: BalancerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validates the engine settings and every component configuration.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(ResourceError::invalid("tick_interval_ms must be positive"));
        }
        self.monitor.validate()?;
        self.capacity.validate()?;
        self.allocation.validate()?;
        self.balancer.validate()?;
        Ok(())
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse engine configuration")?;
        config
            .validate()
            .context("Engine configuration is invalid")?;
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize engine configuration")
    }

    /// Reads a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine configuration {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("In {}", path.display()))
    }

    /// Writes the configuration to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write engine configuration {}", path.display()))?;
        log::info!("Engine: Configuration saved to {}.", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptic_control::SchedulingStrategy;

    #[test]
    fn test_levels_are_cumulative() {
        let none = OptimizationLevel::None.flags();
        assert!(none.monitor && none.sweep);
        assert!(!none.balancer && !none.adjuster);

        let minimal = OptimizationLevel::Minimal.flags();
        assert!(minimal.balancer && !minimal.adjuster);

        let standard = OptimizationLevel::Standard.flags();
        assert!(standard.balancer && standard.adjuster);
        assert!(!standard.rebalance_every_tick);

        let aggressive = OptimizationLevel::Aggressive.flags();
        assert!(aggressive.rebalance_every_tick && aggressive.capability_refresh);
    }

    #[test]
    fn test_custom_flags_are_taken_verbatim() {
        let flags = LoopFlags {
            adjuster: true,
            ..Default::default()
        };
        assert_eq!(OptimizationLevel::Custom(flags).flags(), flags);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "level": "Minimal", "balancer": { "strategy": "DeadlineFirst" } }"#,
        )
        .unwrap();
        assert_eq!(config.level, OptimizationLevel::Minimal);
        assert_eq!(config.balancer.strategy, SchedulingStrategy::DeadlineFirst);
        assert_eq!(config.balancer.max_retries, BalancerConfig::default().max_retries);
        assert_eq!(config.tick_interval_ms, 100);
    }

    #[test]
    fn test_invalid_json_config_is_rejected() {
        let err = EngineConfig::from_json(r#"{ "tick_interval_ms": 0 }"#).unwrap_err();
        assert!(format!("{err:#}").contains("tick_interval_ms"));
    }

    #[test]
    fn test_json_round_trip_keeps_custom_level() {
        let config = EngineConfig {
            level: OptimizationLevel::Custom(LoopFlags {
                monitor: true,
                balancer: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        let parsed = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
