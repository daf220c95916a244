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

//! Contracts between the capacity adjuster and the components that consult it.

use serde::{Deserialize, Serialize};

/// Predicted cost and quality of running a workload at a given capacity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformancePrediction {
    /// Capacity the prediction was made for.
    pub capacity: u32,
    /// Circuit depth the prediction was made for.
    pub circuit_depth: u32,
    /// Expected fidelity, 0–1.
    pub fidelity: f64,
    /// Expected memory footprint in bytes.
    pub memory_bytes: u64,
    /// Expected wall time in milliseconds.
    pub runtime_ms: f64,
    /// `true` if fidelity and memory are within the configured limits.
    pub feasible: bool,
}

/// Observed outcome of a completed workload, fed back into the adjuster.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionFeedback {
    /// Capacity the workload ran with.
    pub capacity: u32,
    /// Circuit depth of the workload.
    pub circuit_depth: u32,
    /// Measured error rate, 0–1.
    pub error_rate: f64,
    /// Measured runtime in milliseconds.
    pub runtime_ms: f64,
}

/// Estimates workload cost. Implemented by the capacity adjuster and used by
/// the allocation manager and task balancer for admission decisions.
pub trait PerformancePredictor: Send + Sync {
    /// Predicts fidelity, memory and runtime.
    fn predict_performance(&self, capacity: u32, circuit_depth: u32) -> PerformancePrediction;

    /// Records an observed execution outcome. The default ignores it.
    fn record_execution(&self, _feedback: ExecutionFeedback) {}
}
