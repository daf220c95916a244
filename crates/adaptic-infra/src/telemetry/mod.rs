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

//! Resource probes backed by `sysinfo`.

pub mod cpu_probe;
pub mod memory_probe;
pub mod network_probe;
pub mod storage_probe;

pub use cpu_probe::CpuProbe;
pub use memory_probe::MemoryProbe;
pub use network_probe::NetworkProbe;
pub use storage_probe::StorageProbe;

use adaptic_core::monitoring::ResourceProbe;
use std::sync::Arc;

/// One probe per host resource sysinfo can observe.
///
/// Accelerator and computation-unit kinds have no host probe; the latter is
/// served by the allocation manager.
pub fn host_probes() -> Vec<Arc<dyn ResourceProbe>> {
    vec![
        Arc::new(CpuProbe::default()),
        Arc::new(MemoryProbe::default()),
        Arc::new(StorageProbe::default()),
        Arc::new(NetworkProbe::default()),
    ]
}
