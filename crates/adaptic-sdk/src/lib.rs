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

//! # Adaptic SDK
//!
//! The public entry point of the adaptation layer. A
//! [`ResourceAdaptiveEngine`] owns one resource monitor, capacity adjuster,
//! allocation manager and task balancer, and ticks them in that order.

#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod report;

pub use config::{EngineConfig, LoopFlags, OptimizationLevel};
pub use engine::{EngineStats, EngineTickReport, ResourceAdaptiveEngine, WorkloadEstimate};
pub use report::{generate_report, generate_report_async, render_report, ReportWorker};

/// Everything a typical caller needs.
pub mod prelude {
    pub use crate::{EngineConfig, OptimizationLevel, ResourceAdaptiveEngine};
    pub use adaptic_control::{
        AllocationConfig, BalancerConfig, CapacityConfiguration, CapacityStrategy, ExecutionMode,
        SchedulingStrategy, TaskId, TaskStatus,
    };
    pub use adaptic_core::{
        CapabilitySnapshot, ExecutionFeedback, ManualClock, Priority, ResourceError,
        ResourceKind, StaticCapabilityProvider, SystemClock, WorkloadDescriptor,
    };
    pub use adaptic_telemetry::MonitorConfig;
}
