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

//! Disk space probe.

use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::monitoring::{ResourceKind, ResourceProbe, ResourceSample};
use std::borrow::Cow;
use sysinfo::Disks;

/// Samples used versus total space summed over every mounted disk.
#[derive(Debug)]
pub struct StorageProbe {
    id: String,
}

impl StorageProbe {
    /// Creates a probe named `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Default for StorageProbe {
    fn default() -> Self {
        Self::new("sysinfo-storage")
    }
}

impl ResourceProbe for StorageProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Owned(self.id.clone())
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Storage
    }

    fn sample(&self) -> ResourceResult<ResourceSample> {
        // Mounts come and go; the list is rebuilt on every sample.
        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks
            .list()
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });
        if total == 0 {
            return Err(ResourceError::DeviceUnavailable("no disks listed".into()));
        }
        Ok(ResourceSample::from_absolute(
            total.saturating_sub(available),
            total,
        ))
    }
}
