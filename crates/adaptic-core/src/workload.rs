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

//! Workload descriptors submitted by external collaborators.

use crate::error::{ResourceError, ResourceResult};
use serde::{Deserialize, Serialize};

/// Scheduling priority of a workload.
///
/// The order of variants defines importance (last = highest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Priority {
    /// Background work.
    Low,
    /// Regular work.
    #[default]
    Normal,
    /// Latency-sensitive work.
    High,
    /// Work that may preempt others.
    Critical,
}

impl Priority {
    /// Every priority class, highest first.
    pub const CLASSES: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Numeric weight used by score-based strategies (0 = Low, 3 = Critical).
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 0.0,
            Priority::Normal => 1.0,
            Priority::High => 2.0,
            Priority::Critical => 3.0,
        }
    }
}

/// An abstract circuit descriptor.
///
/// The adaptation layer only reads the capacity estimate, depth and fidelity
/// target; execution itself happens outside of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    /// Label for logs and reports.
    pub name: String,
    /// Computation units the workload needs.
    pub required_capacity: u32,
    /// Number of circuit layers.
    pub circuit_depth: u32,
    /// Minimum acceptable fidelity, 0–1.
    pub required_fidelity: f64,
    /// Relative deadline from submission, in milliseconds.
    pub deadline_in_ms: Option<u64>,
    /// Whether a running instance may be preempted.
    pub preemptible: bool,
}

impl WorkloadDescriptor {
    /// A preemptible workload without deadline.
    pub fn new(name: impl Into<String>, required_capacity: u32, circuit_depth: u32) -> Self {
        Self {
            name: name.into(),
            required_capacity,
            circuit_depth,
            required_fidelity: 0.0,
            deadline_in_ms: None,
            preemptible: true,
        }
    }

    /// Sets the relative deadline.
    pub fn with_deadline(mut self, deadline_in_ms: u64) -> Self {
        self.deadline_in_ms = Some(deadline_in_ms);
        self
    }

    /// Sets the fidelity target.
    pub fn with_fidelity(mut self, required_fidelity: f64) -> Self {
        self.required_fidelity = required_fidelity;
        self
    }

    /// Marks the workload as not preemptible.
    pub fn non_preemptible(mut self) -> Self {
        self.preemptible = false;
        self
    }

    /// Rejects descriptors no component could ever admit.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.required_capacity == 0 {
            return Err(ResourceError::invalid(format!(
                "workload '{}' requires zero computation units",
                self.name
            )));
        }
        if !(0.0..=1.0).contains(&self.required_fidelity) {
            return Err(ResourceError::invalid(format!(
                "workload '{}' fidelity {} outside [0, 1]",
                self.name, self.required_fidelity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::CLASSES[0], Priority::Critical);
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(WorkloadDescriptor::new("ok", 4, 10).validate().is_ok());
        assert!(WorkloadDescriptor::new("zero", 0, 10).validate().is_err());
        assert!(WorkloadDescriptor::new("bad", 4, 10)
            .with_fidelity(1.5)
            .validate()
            .is_err());
    }
}
