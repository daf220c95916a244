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

//! Configuration of the capacity adjuster.

use adaptic_core::capability::DEFAULT_PRECISION_FACTOR;
use adaptic_core::error::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};

/// Upper bound for any capacity value; beyond it the state-vector estimate
/// no longer fits in 64 bits.
pub const MAX_SUPPORTED_CAPACITY: u32 = 63;

/// How aggressively the recommended capacity is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CapacityStrategy {
    /// Stays at 70 % of the recommendation.
    Conservative,
    /// Follows the recommendation.
    #[default]
    Balanced,
    /// Pushes to 130 % of the recommendation.
    Aggressive,
    /// Scales with execution feedback.
    Adaptive,
    /// A caller-chosen factor combined with execution feedback.
    Custom,
}

impl CapacityStrategy {
    /// The fixed factor of the strategy, or  when it is feedback driven.
    pub fn fixed_factor(&self) -> Option<f64> {
        match self {
            CapacityStrategy::Conservative => Some(0.7),
            CapacityStrategy::Balanced => Some(1.0),
            CapacityStrategy::Aggressive => Some(1.3),
            CapacityStrategy::Adaptive | CapacityStrategy::Custom => None,
        }
    }

    /// Fidelity loss assumed per allocated unit when predicting performance.
    pub fn unit_penalty(&self) -> f64 {
        match self {
            CapacityStrategy::Conservative => 0.002,
            CapacityStrategy::Balanced | CapacityStrategy::Adaptive | CapacityStrategy::Custom => {
                0.001
            }
            CapacityStrategy::Aggressive => 0.0005,
        }
    }
}

/// Where computation units come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// State-vector simulation bounded by memory.
    #[default]
    Simulated,
    /// Physical accelerator units only.
    Hardware,
    /// Half simulated, the rest from the accelerator when present.
    Hybrid,
}

/// Configuration for the [`CapacityAdjuster`](super::CapacityAdjuster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfiguration {
    /// Scaling strategy.
    pub strategy: CapacityStrategy,
    /// Factor used by [`CapacityStrategy::Custom`].
    pub custom_factor: f64,
    /// Source of computation units.
    pub mode: ExecutionMode,
    /// Lower bound of the capacity.
    pub min_capacity: u32,
    /// Upper bound of the capacity.
    pub max_capacity: u32,
    /// Capacity applied on initialization; `None` uses the computed target.
    pub target_capacity: Option<u32>,
    /// Memory budget for simulation; 0 uses the device's available memory.
    pub memory_limit_bytes: u64,
    /// Bytes per real number in the state-vector estimate.
    pub precision_factor: u32,
    /// Mean error rate above which capacity is reduced.
    pub error_threshold: f64,
    /// Minimum fidelity for a prediction to be feasible.
    pub fidelity_threshold: f64,
    /// Minimum time between two periodic evaluations.
    pub adjustment_interval_ms: u64,
    /// Cooldown between two applied periodic adjustments.
    pub stability_period_ms: u64,
    /// Largest change applied by one adjustment.
    pub max_step: u32,
    /// Number of adjustment records kept.
    pub history_size: usize,
    /// Number of execution feedback samples kept.
    pub feedback_window: usize,
    /// Circuit depth considered typical; deeper workloads damp capacity.
    pub reference_depth: u32,
    /// Duration of one hardware gate, in microseconds.
    pub gate_time_us: f64,
    /// Whether `maybe_adjust` applies changes on its own.
    pub auto_adjust: bool,
}

impl Default for CapacityConfiguration {
    fn default() -> Self {
        Self {
            strategy: CapacityStrategy::default(),
            custom_factor: 1.0,
            mode: ExecutionMode::default(),
            min_capacity: 1,
            max_capacity: 32,
            target_capacity: None,
            memory_limit_bytes: 0,
            precision_factor: DEFAULT_PRECISION_FACTOR,
            error_threshold: 0.05,
            fidelity_threshold: 0.5,
            adjustment_interval_ms: 1000,
            stability_period_ms: 5000,
            max_step: 4,
            history_size: 64,
            feedback_window: 32,
            reference_depth: 100,
            gate_time_us: 0.1,
            auto_adjust: true,
        }
    }
}

impl CapacityConfiguration {
    /// Rejects configurations the adjuster cannot run with.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.min_capacity == 0 {
            return Err(ResourceError::invalid("min_capacity must be at least 1"));
        }
        if self.min_capacity > self.max_capacity {
            return Err(ResourceError::invalid(format!(
                "min_capacity {} above max_capacity {}",
                self.min_capacity, self.max_capacity
            )));
        }
        if self.max_capacity > MAX_SUPPORTED_CAPACITY {
            return Err(ResourceError::invalid(format!(
                "max_capacity {} above supported {}",
                self.max_capacity, MAX_SUPPORTED_CAPACITY
            )));
        }
        if let Some(target) = self.target_capacity {
            if !(self.min_capacity..=self.max_capacity).contains(&target) {
                return Err(ResourceError::invalid(format!(
                    "target_capacity {} outside [{}, {}]",
                    target, self.min_capacity, self.max_capacity
                )));
            }
        }
        if !(self.custom_factor.is_finite() && self.custom_factor > 0.0) {
            return Err(ResourceError::invalid("custom_factor must be positive"));
        }
        if self.precision_factor == 0 {
            return Err(ResourceError::invalid("precision_factor must be positive"));
        }
        if !(0.0..=1.0).contains(&self.error_threshold)
            || !(0.0..=1.0).contains(&self.fidelity_threshold)
        {
            return Err(ResourceError::invalid(
                "error and fidelity thresholds must lie in [0, 1]",
            ));
        }
        if self.max_step == 0 {
            return Err(ResourceError::invalid("max_step must be positive"));
        }
        if self.history_size == 0 || self.feedback_window == 0 {
            return Err(ResourceError::invalid(
                "history_size and feedback_window must be positive",
            ));
        }
        if self.reference_depth == 0 {
            return Err(ResourceError::invalid("reference_depth must be positive"));
        }
        if !(self.gate_time_us.is_finite() && self.gate_time_us >= 0.0) {
            return Err(ResourceError::invalid("gate_time_us must be non-negative"));
        }
        Ok(())
    }

    /// Clamps `capacity` into `[min_capacity, max_capacity]`.
    pub fn clamp(&self, capacity: u32) -> u32 {
        capacity.clamp(self.min_capacity, self.max_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(CapacityConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = CapacityConfiguration {
            min_capacity: 10,
            max_capacity: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_outside_bounds_rejected() {
        let config = CapacityConfiguration {
            target_capacity: Some(40),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_factors() {
        assert_eq!(CapacityStrategy::Conservative.fixed_factor(), Some(0.7));
        assert_eq!(CapacityStrategy::Aggressive.fixed_factor(), Some(1.3));
        assert_eq!(CapacityStrategy::Adaptive.fixed_factor(), None);
    }
}
