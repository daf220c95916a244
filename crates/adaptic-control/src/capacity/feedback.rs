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

//! Rolling store of execution feedback.

use adaptic_core::control::ExecutionFeedback;
use adaptic_core::history::HistoryRing;

/// Bounds of the feedback multiplier.
pub const MULTIPLIER_RANGE: (f64, f64) = (0.5, 1.5);

/// Rolling windows of error rate, circuit depth and runtime.
#[derive(Debug, Clone)]
pub struct FeedbackStore {
    error_rates: HistoryRing<f64>,
    depths: HistoryRing<f64>,
    runtimes: HistoryRing<f64>,
}

impl FeedbackStore {
    /// Creates a store keeping the last `window` samples.
    pub fn new(window: usize) -> Self {
        Self {
            error_rates: HistoryRing::with_capacity(window),
            depths: HistoryRing::with_capacity(window),
            runtimes: HistoryRing::with_capacity(window),
        }
    }

    /// Pushes one execution outcome.
    pub fn push(&mut self, feedback: &ExecutionFeedback) {
        self.error_rates.push(feedback.error_rate.clamp(0.0, 1.0));
        self.depths.push(feedback.circuit_depth as f64);
        self.runtimes.push(feedback.runtime_ms.max(0.0));
    }

    /// Resizes every window, dropping the oldest samples first.
    pub fn set_window(&mut self, window: usize) {
        self.error_rates.set_capacity(window);
        self.depths.set_capacity(window);
        self.runtimes.set_capacity(window);
    }

    /// Drops every sample.
    pub fn clear(&mut self) {
        self.error_rates.clear();
        self.depths.clear();
        self.runtimes.clear();
    }

    /// Number of samples held.
    pub fn sample_count(&self) -> usize {
        self.error_rates.len()
    }

    /// Mean error rate, or 0.0 if empty.
    pub fn mean_error_rate(&self) -> f64 {
        self.error_rates.average()
    }

    /// Difference between the newer and older half of the error window.
    /// Positive means errors are increasing.
    pub fn error_trend(&self) -> f64 {
        self.error_rates.trend()
    }

    /// Mean circuit depth, or 0.0 if empty.
    pub fn mean_depth(&self) -> f64 {
        self.depths.average()
    }

    /// Mean runtime in milliseconds, or 0.0 if empty.
    pub fn mean_runtime_ms(&self) -> f64 {
        self.runtimes.average()
    }

    /// Capacity multiplier derived from the recent feedback.
    ///
    /// | Condition | Multiplier |
    /// |---|---|
    /// | mean error above `error_threshold` | 0.8 |
    /// | error trend rising | 0.9 |
    /// | mean error below half the threshold | 1.15 |
    /// | otherwise | 1.0 |
    ///
    /// An extra 0.9 applies when the mean depth exceeds 1.5 × `reference_depth`.
    /// The result is clamped to [`MULTIPLIER_RANGE`]. An empty store yields 1.0.
    pub fn multiplier(&self, error_threshold: f64, reference_depth: u32) -> f64 {
        if self.sample_count() == 0 {
            return 1.0;
        }

        let mean = self.mean_error_rate();
        let mut multiplier: f64 = if mean > error_threshold {
            0.8
        } else if self.error_trend() > f64::EPSILON {
            0.9
        } else if mean < error_threshold / 2.0 {
            1.15
        } else {
            1.0
        };

        if self.mean_depth() > 1.5 * reference_depth as f64 {
            multiplier *= 0.9;
        }

        multiplier.clamp(MULTIPLIER_RANGE.0, MULTIPLIER_RANGE.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn feedback(error_rate: f64, circuit_depth: u32) -> ExecutionFeedback {
        ExecutionFeedback {
            capacity: 8,
            circuit_depth,
            error_rate,
            runtime_ms: 1.0,
        }
    }

    #[test]
    fn test_empty_store_is_neutral() {
        let store = FeedbackStore::new(8);
        assert_eq!(store.multiplier(0.05, 100), 1.0);
    }

    #[test]
    fn test_high_error_reduces() {
        let mut store = FeedbackStore::new(8);
        for _ in 0..4 {
            store.push(&feedback(0.2, 10));
        }
        assert_relative_eq!(store.multiplier(0.05, 100), 0.8);
    }

    #[test]
    fn test_rising_trend_reduces_slightly() {
        let mut store = FeedbackStore::new(8);
        store.push(&feedback(0.01, 10));
        store.push(&feedback(0.01, 10));
        store.push(&feedback(0.04, 10));
        store.push(&feedback(0.04, 10));
        // mean 0.025 is below the threshold but the trend is rising
        assert_relative_eq!(store.multiplier(0.05, 100), 0.9);
    }

    #[test]
    fn test_low_error_grows_and_depth_damps() {
        let mut store = FeedbackStore::new(8);
        for _ in 0..4 {
            store.push(&feedback(0.001, 10));
        }
        assert_relative_eq!(store.multiplier(0.05, 100), 1.15);

        let mut deep = FeedbackStore::new(8);
        for _ in 0..4 {
            deep.push(&feedback(0.001, 400));
        }
        assert_relative_eq!(deep.multiplier(0.05, 100), 1.15 * 0.9);
    }

    #[test]
    fn test_window_bounds_samples() {
        let mut store = FeedbackStore::new(2);
        store.push(&feedback(0.5, 10));
        store.push(&feedback(0.0, 10));
        store.push(&feedback(0.0, 10));
        assert_eq!(store.sample_count(), 2);
        assert_eq!(store.mean_error_rate(), 0.0);
        store.clear();
        assert_eq!(store.sample_count(), 0);
    }
}
