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

//! # Adaptic Core
//!
//! Foundational crate containing the types, traits and contracts shared by
//! the monitor, the capacity adjuster, the allocation manager and the task
//! balancer.

#![warn(missing_docs)]

pub mod callback;
pub mod capability;
pub mod clock;
pub mod control;
pub mod error;
pub mod history;
pub mod monitoring;
pub mod workload;

pub use callback::{CallbackHandle, CallbackRegistry};
pub use capability::{CapabilityProvider, CapabilitySnapshot, StaticCapabilityProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use control::{ExecutionFeedback, PerformancePrediction, PerformancePredictor};
pub use error::{ErrorKind, ResourceError, ResourceResult};
pub use history::HistoryRing;
pub use monitoring::{
    AlertLevel, ResourceFilter, ResourceKind, ResourceProbe, ResourceReading, ResourceSample,
    ResourceStatus,
};
pub use workload::{Priority, WorkloadDescriptor};
