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

//! Fixed-capacity history buffers.

use std::collections::VecDeque;

/// A bounded circular buffer that overwrites its oldest entry when full.
///
/// Capacity is chosen at runtime so histories can follow configuration; it
/// never grows past the configured bound.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryRing<T> {
    /// Creates an empty ring holding at most `capacity` items (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes a new value, overwriting the oldest if full.
    pub fn push(&mut self, value: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the maximum number of items retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the bound, dropping the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.data.len() > self.capacity {
            self.data.pop_front();
        }
    }

    /// Iterates in chronological order (oldest to newest).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.data.iter()
    }

    /// Returns the most recently pushed value.
    pub fn latest(&self) -> Option<&T> {
        self.data.back()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T: Clone> HistoryRing<T> {
    /// Returns up to `max_items` entries, most recent first.
    pub fn recent(&self, max_items: usize) -> Vec<T> {
        self.data.iter().rev().take(max_items).cloned().collect()
    }
}

impl HistoryRing<f64> {
    /// Arithmetic mean of the stored samples, or 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Difference between the mean of the newer half and the older half.
    /// Positive when the series is rising.
    pub fn trend(&self) -> f64 {
        let count = self.data.len();
        if count < 2 {
            return 0.0;
        }
        let half = count / 2;
        let older: f64 = self.data.iter().take(half).sum::<f64>() / half as f64;
        let newer: f64 = self.data.iter().skip(count - half).sum::<f64>() / half as f64;
        newer - older
    }

    /// Population variance of the stored samples.
    pub fn variance(&self) -> f64 {
        if self.data.len() < 2 {
            return 0.0;
        }
        let avg = self.average();
        let sum_sq: f64 = self.data.iter().map(|v| (v - avg) * (v - avg)).sum();
        sum_sq / self.data.len() as f64
    }
}
