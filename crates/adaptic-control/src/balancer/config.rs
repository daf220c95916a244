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

//! Configuration of the task balancer.

use adaptic_core::error::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};

/// Order in which pending tasks are offered to the allocation manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchedulingStrategy {
    /// Submission order.
    Fifo,
    /// Highest priority first, submission order within a class.
    #[default]
    Priority,
    /// Earliest deadline first; priority only breaks deadline ties.
    DeadlineFirst,
    /// Tasks that best fill the free capacity first.
    ResourceEfficiency,
    /// Weighted score of priority, urgency, fit and waiting time.
    Dynamic,
    /// Round-robin across priority classes.
    Fair,
}

/// Weights of the [`SchedulingStrategy::Dynamic`] score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicWeights {
    /// Weight of the normalized priority.
    pub priority: f64,
    /// Weight of `1 / time_to_deadline`.
    pub deadline: f64,
    /// Weight of the resource fit.
    pub resource_fit: f64,
    /// Weight of the normalized waiting time.
    pub waiting_time: f64,
}

impl Default for DynamicWeights {
    fn default() -> Self {
        Self {
            priority: 0.4,
            deadline: 0.3,
            resource_fit: 0.2,
            waiting_time: 0.1,
        }
    }
}

/// Configuration for the [`TaskBalancer`](super::TaskBalancer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Scheduling strategy.
    pub strategy: SchedulingStrategy,
    /// Weights used by the dynamic strategy.
    pub weights: DynamicWeights,
    /// Minimum time between two periodic rebalances.
    pub rebalance_interval_ms: u64,
    /// Tasks that stay `Pending` this long fail with a timeout. The clock
    /// restarts each time a task is requeued.
    pub max_task_age_ms: u64,
    /// Scale of the dynamic urgency term; a deadline this far away scores
    /// one half.
    pub deadline_horizon_ms: u64,
    /// Retries granted to a failed task.
    pub max_retries: u32,
    /// Let critical tasks preempt lower-priority running tasks.
    pub enable_task_preemption: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: SchedulingStrategy::default(),
            weights: DynamicWeights::default(),
            rebalance_interval_ms: 500,
            max_task_age_ms: 60_000,
            deadline_horizon_ms: 10_000,
            max_retries: 3,
            enable_task_preemption: true,
        }
    }
}

impl BalancerConfig {
    /// Rejects unusable configurations.
    pub fn validate(&self) -> ResourceResult<()> {
        let w = &self.weights;
        if [w.priority, w.deadline, w.resource_fit, w.waiting_time]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(ResourceError::invalid(
                "dynamic weights must be finite and non-negative",
            ));
        }
        if self.max_task_age_ms == 0 {
            return Err(ResourceError::invalid("max_task_age_ms must be positive"));
        }
        if self.deadline_horizon_ms == 0 {
            return Err(ResourceError::invalid("deadline_horizon_ms must be positive"));
        }
        Ok(())
    }
}
