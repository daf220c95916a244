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

//! Network throughput probe.

use crate::platform::sysinfo_impl::is_loopback;
use crate::platform::DEFAULT_LINK_MBPS;
use adaptic_core::error::ResourceResult;
use adaptic_core::monitoring::{ResourceKind, ResourceProbe, ResourceSample};
use std::borrow::Cow;
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::Networks;

#[derive(Debug)]
struct NetworkState {
    networks: Networks,
    last_refresh: Instant,
    throughput_mbps: f64,
}

/// Samples combined receive and transmit throughput of non-loopback
/// interfaces, in Mbit/s, against an assumed link speed.
#[derive(Debug)]
pub struct NetworkProbe {
    id: String,
    link_mbps: f64,
    state: Mutex<NetworkState>,
}

impl NetworkProbe {
    /// Creates a probe named `id` measuring against `link_mbps`.
    pub fn new(id: impl Into<String>, link_mbps: f64) -> Self {
        Self {
            id: id.into(),
            link_mbps: link_mbps.max(1.0),
            state: Mutex::new(NetworkState {
                networks: Networks::new_with_refreshed_list(),
                last_refresh: Instant::now(),
                throughput_mbps: 0.0,
            }),
        }
    }
}

impl Default for NetworkProbe {
    fn default() -> Self {
        Self::new("sysinfo-network", DEFAULT_LINK_MBPS)
    }
}

impl ResourceProbe for NetworkProbe {
    fn probe_id(&self) -> Cow<'static, str> {
        Cow::Owned(self.id.clone())
    }

    fn resource_kind(&self) -> ResourceKind {
        ResourceKind::Network
    }

    fn update(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.networks.refresh(true);
        let elapsed = state.last_refresh.elapsed().as_secs_f64();
        state.last_refresh = Instant::now();
        if elapsed <= 0.0 {
            return;
        }
        let bytes: u64 = state
            .networks
            .list()
            .iter()
            .filter(|(name, _)| !is_loopback(name))
            .map(|(_, data)| data.received() + data.transmitted())
            .sum();
        state.throughput_mbps = bytes as f64 * 8.0 / 1_000_000.0 / elapsed;
    }

    fn sample(&self) -> ResourceResult<ResourceSample> {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let used = state.throughput_mbps.round() as u64;
        let mut sample = ResourceSample::from_absolute(used, self.link_mbps.round() as u64);
        sample.usage_percent = (state.throughput_mbps / self.link_mbps * 100.0).clamp(0.0, 100.0);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_probe_before_first_update_is_idle() {
        let probe = NetworkProbe::new("net", 100.0);
        let sample = probe.sample().unwrap();
        assert_eq!(sample.usage_percent, 0.0);
        assert_eq!(sample.total, 100);
    }

    #[test]
    fn test_network_probe_update_stays_in_range() {
        let probe = NetworkProbe::default();
        probe.update();
        let sample = probe.sample().unwrap();
        assert!((0.0..=100.0).contains(&sample.usage_percent));
    }
}
