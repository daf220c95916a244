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

//! # Adaptic Telemetry
//!
//! Samples registered resource probes into timestamped statuses, classifies
//! them against per-kind thresholds and notifies subscribers of level
//! transitions.

#![warn(missing_docs)]

pub mod alerts;
pub mod config;
pub mod monitoring;
pub mod service;

pub use alerts::{AlertCallback, AlertEvent, AlertThreshold, AlertThresholds};
pub use config::MonitorConfig;
pub use monitoring::ProbeRegistry;
pub use service::{MonitorState, MonitorStats, ResourceMonitor};
