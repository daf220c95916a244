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

//! Service for sampling resources, keeping history and raising alerts.

use crate::alerts::{AlertCallback, AlertEvent, AlertSubscription, AlertThresholds};
use crate::config::MonitorConfig;
use crate::monitoring::registry::ProbeRegistry;
use adaptic_core::callback::{CallbackHandle, CallbackRegistry};
use adaptic_core::clock::Clock;
use adaptic_core::error::{ResourceError, ResourceResult};
use adaptic_core::history::HistoryRing;
use adaptic_core::monitoring::{
    AlertLevel, ResourceFilter, ResourceKind, ResourceProbe, ResourceReading, ResourceSample,
    ResourceStatus,
};
use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle state of the monitor's sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    /// No sampler thread.
    Stopped,
    /// Sampler thread is refreshing periodically.
    Running,
    /// Sampler thread is alive but skipping refreshes.
    Paused,
}

/// Running counters of the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonitorStats {
    /// Refreshes that produced a status.
    pub refresh_count: u64,
    /// Refreshes in which every probe failed.
    pub failed_refreshes: u64,
    /// Individual probe failures.
    pub probe_failures: u64,
    /// Level transitions observed.
    pub alert_transitions: u64,
    /// Timestamp of the last produced status.
    pub last_refresh_ms: u64,
}

struct MonitorInner {
    config: MonitorConfig,
    current: Option<ResourceStatus>,
    history: HistoryRing<ResourceStatus>,
    stats: MonitorStats,
}

struct MonitorShared {
    inner: Mutex<MonitorInner>,
    subscriptions: Mutex<CallbackRegistry<AlertSubscription>>,
    probes: ProbeRegistry,
    clock: Arc<dyn Clock>,
    paused: AtomicBool,
}

struct SamplerHandle {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Samples every registered probe into a [`ResourceStatus`], keeps a bounded
/// history, and notifies subscribers when a resource changes alert level.
pub struct ResourceMonitor {
    shared: Arc<MonitorShared>,
    sampler: Mutex<Option<SamplerHandle>>,
}

impl MonitorShared {
    fn inner(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn subscriptions(&self) -> MutexGuard<'_, CallbackRegistry<AlertSubscription>> {
        self.subscriptions.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn refresh(&self) -> bool {
        let now = self.clock.now_millis();
        let enabled = self.inner().config.enabled_kinds.clone();

        // Probes are sampled without holding the status lock.
        let results: Vec<(ResourceKind, String, ResourceResult<ResourceSample>)> = self
            .probes
            .get_all_probes()
            .iter()
            .filter(|p| enabled.contains(&p.resource_kind()))
            .map(|probe| sample_probe(probe.as_ref()))
            .collect();

        if results.is_empty() {
            log::warn!("Monitor: No enabled probe registered; nothing to sample.");
            self.inner().stats.failed_refreshes += 1;
            return false;
        }

        let successes = results.iter().filter(|(_, _, r)| r.is_ok()).count();

        let events = {
            let mut inner = self.inner();
            let previous = inner.current.clone().unwrap_or_default();
            let mut status = ResourceStatus {
                timestamp_ms: now,
                readings: Default::default(),
            };

            for (kind, probe_id, result) in results {
                match result {
                    Ok(sample) => {
                        let level = inner.config.thresholds.classify(kind, sample.usage_percent);
                        status.readings.insert(
                            kind,
                            ResourceReading {
                                usage_percent: sample.usage_percent,
                                used: sample.used,
                                total: sample.total,
                                level,
                                stale: false,
                                sampled_at_ms: now,
                            },
                        );
                    }
                    Err(e) => {
                        log::warn!("Monitor: Probe '{}' ({}) failed: {}", probe_id, kind, e);
                        inner.stats.probe_failures += 1;
                        let fresh_already = status.reading(kind).is_some_and(|r| !r.stale);
                        if !fresh_already {
                            let carried = previous.reading(kind).copied().unwrap_or_default();
                            status.readings.insert(
                                kind,
                                ResourceReading {
                                    stale: true,
                                    ..carried
                                },
                            );
                        }
                    }
                }
            }

            if successes == 0 {
                inner.stats.failed_refreshes += 1;
                log::warn!("Monitor: Every probe failed at {}ms.", now);
                return false;
            }

            let events: Vec<AlertEvent> = status
                .readings
                .iter()
                .filter(|(_, reading)| !reading.stale)
                .filter_map(|(kind, reading)| {
                    let before = previous.level(*kind);
                    (before != reading.level).then_some(AlertEvent {
                        kind: *kind,
                        previous: before,
                        current: reading.level,
                        usage_percent: reading.usage_percent,
                        timestamp_ms: now,
                    })
                })
                .collect();

            inner.stats.refresh_count += 1;
            inner.stats.alert_transitions += events.len() as u64;
            inner.stats.last_refresh_ms = now;
            inner.history.push(status.clone());
            inner.current = Some(status);
            events
        };

        for event in &events {
            if event.is_escalation() {
                log::warn!(
                    "Monitor: {} {:?} → {:?} ({:.1}%)",
                    event.kind,
                    event.previous,
                    event.current,
                    event.usage_percent
                );
            } else {
                log::info!(
                    "Monitor: {} {:?} → {:?} ({:.1}%)",
                    event.kind,
                    event.previous,
                    event.current,
                    event.usage_percent
                );
            }
            let subscribers = self.subscriptions().snapshot_where(|s| s.accepts(event));
            for subscriber in subscribers {
                (subscriber.callback)(event);
            }
        }

        log::trace!(
            "Monitor: Refreshed {} probes ({} ok) at {}ms.",
            enabled.len(),
            successes,
            now
        );
        true
    }
}

fn sample_probe(probe: &dyn ResourceProbe) -> (ResourceKind, String, ResourceResult<ResourceSample>) {
    probe.update();
    (
        probe.resource_kind(),
        probe.probe_id().into_owned(),
        probe.sample(),
    )
}

impl ResourceMonitor {
    /// Creates a stopped monitor.
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>) -> ResourceResult<Self> {
        config.validate()?;
        let history = HistoryRing::with_capacity(config.history_size);
        Ok(Self {
            shared: Arc::new(MonitorShared {
                inner: Mutex::new(MonitorInner {
                    config,
                    current: None,
                    history,
                    stats: MonitorStats::default(),
                }),
                subscriptions: Mutex::new(CallbackRegistry::new()),
                probes: ProbeRegistry::new(),
                clock,
                paused: AtomicBool::new(false),
            }),
            sampler: Mutex::new(None),
        })
    }

    /// Registers a probe.
    pub fn register_probe(&self, probe: Arc<dyn ResourceProbe>) {
        self.shared.probes.register(probe);
    }

    /// Returns the probe registry.
    pub fn probe_registry(&self) -> &ProbeRegistry {
        &self.shared.probes
    }

    /// Starts the sampler thread. Calling it while running is a no-op.
    pub fn start(&self) -> ResourceResult<()> {
        let mut sampler = self.sampler.lock().unwrap_or_else(|p| p.into_inner());
        if sampler.is_some() {
            return Ok(());
        }

        let interval = Duration::from_millis(self.shared.inner().config.sampling_interval_ms);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        self.shared.paused.store(false, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("adaptic-monitor".into())
            .spawn(move || {
                log::info!("Monitor: Sampler thread started.");
                loop {
                    if !shared.paused.load(Ordering::SeqCst) {
                        shared.refresh();
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Monitor: Sampler thread stopped.");
            })
            .map_err(|e| ResourceError::Internal(format!("failed to spawn sampler: {e}")))?;

        *sampler = Some(SamplerHandle { stop_tx, handle });
        Ok(())
    }

    /// Stops the sampler thread and waits for an in-flight refresh to finish.
    /// Idempotent.
    pub fn stop(&self) {
        let taken = self
            .sampler
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(SamplerHandle { stop_tx, handle }) = taken {
            let _ = stop_tx.try_send(());
            drop(stop_tx);
            // A callback running on the sampler thread must not join itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    /// Suspends periodic sampling; the last status is kept.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        log::debug!("Monitor: Paused.");
    }

    /// Resumes periodic sampling.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        log::debug!("Monitor: Resumed.");
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> MonitorState {
        let running = self
            .sampler
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some();
        match (running, self.is_paused()) {
            (false, _) => MonitorState::Stopped,
            (true, true) => MonitorState::Paused,
            (true, false) => MonitorState::Running,
        }
    }

    /// Whether periodic sampling is suspended.
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    /// Samples every enabled probe now.
    ///
    /// Returns `false` only if every probe failed or none is registered.
    pub fn refresh(&self) -> bool {
        self.shared.refresh()
    }

    /// Returns the current status, refreshing first if it is older than the
    /// staleness bound. A paused monitor returns its last status as is.
    pub fn status(&self) -> ResourceStatus {
        let needs_refresh = {
            let inner = self.shared.inner();
            let now = self.shared.clock.now_millis();
            match &inner.current {
                None => true,
                Some(status) => {
                    now.saturating_sub(status.timestamp_ms) > inner.config.staleness_bound_ms
                }
            }
        };
        if needs_refresh && !self.is_paused() {
            self.shared.refresh();
        }
        self.shared.inner().current.clone().unwrap_or_default()
    }

    /// Returns the cached status without refreshing.
    pub fn last_status(&self) -> Option<ResourceStatus> {
        self.shared.inner().current.clone()
    }

    /// Returns up to `max_items` past statuses, most recent first.
    pub fn history(&self, max_items: usize) -> Vec<ResourceStatus> {
        self.shared.inner().history.recent(max_items)
    }

    /// Registers `callback` for level transitions of kinds matching `filter`
    /// that reach at least `min_level`.
    pub fn register_callback<F>(
        &self,
        filter: ResourceFilter,
        min_level: AlertLevel,
        callback: F,
    ) -> CallbackHandle
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        let callback: AlertCallback = Arc::new(callback);
        self.shared.subscriptions().register(AlertSubscription {
            filter,
            min_level,
            callback,
        })
    }

    /// Removes a callback. Returns `false` if the handle was unknown.
    pub fn unregister_callback(&self, handle: CallbackHandle) -> bool {
        self.shared.subscriptions().unregister(handle)
    }

    /// Sets the thresholds of `kind`. Applies from the next refresh.
    pub fn set_alert_threshold(
        &self,
        kind: ResourceKind,
        warning: f64,
        critical: f64,
    ) -> ResourceResult<()> {
        self.shared
            .inner()
            .config
            .thresholds
            .set(kind, warning, critical)?;
        log::info!(
            "Monitor: {} thresholds set to warning={:.1}%, critical={:.1}%.",
            kind,
            warning,
            critical
        );
        Ok(())
    }

    /// Returns the current threshold table.
    pub fn thresholds(&self) -> AlertThresholds {
        self.shared.inner().config.thresholds.clone()
    }

    /// Replaces the configuration. The sampling interval applies on the next
    /// `start`.
    pub fn set_config(&self, config: MonitorConfig) -> ResourceResult<()> {
        config.validate()?;
        let mut inner = self.shared.inner();
        inner.history.set_capacity(config.history_size);
        inner.config = config;
        Ok(())
    }

    /// Returns a copy of the configuration.
    pub fn config(&self) -> MonitorConfig {
        self.shared.inner().config.clone()
    }

    /// Returns the running counters.
    pub fn stats(&self) -> MonitorStats {
        self.shared.inner().stats
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
