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

//! Dynamic callback registry with unregistration handles.

use std::collections::BTreeMap;

/// An opaque token returned by a `register_callback` call.
///
/// Passing it back to the matching `unregister_callback` removes the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    /// Returns the raw numeric value of the handle.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A growable map from handle to registered entry.
///
/// Entries are kept in registration order so callbacks fire deterministically.
#[derive(Debug)]
pub struct CallbackRegistry<T> {
    next_handle: u64,
    entries: BTreeMap<CallbackHandle, T>,
}

impl<T> CallbackRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            entries: BTreeMap::new(),
        }
    }

    /// Stores `entry` and returns its handle.
    pub fn register(&mut self, entry: T) -> CallbackHandle {
        let handle = CallbackHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.insert(handle, entry);
        handle
    }

    /// Removes the entry for `handle`. Returns `false` if it was unknown.
    pub fn unregister(&mut self, handle: CallbackHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Returns the number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T: Clone> CallbackRegistry<T> {
    /// Clones the entries accepted by `filter`.
    ///
    /// Components call this while holding their lock, then invoke the
    /// returned handlers after releasing it.
    pub fn snapshot_where(&self, mut filter: impl FnMut(&T) -> bool) -> Vec<T> {
        self.entries.values().filter(|e| filter(e)).cloned().collect()
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let mut registry = CallbackRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(a));
        assert!(!registry.unregister(a));
        assert_eq!(registry.iter().copied().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_no_fixed_ceiling() {
        let mut registry = CallbackRegistry::new();
        for i in 0..1_000 {
            registry.register(i);
        }
        assert_eq!(registry.len(), 1_000);
    }

    #[test]
    fn test_snapshot_where_filters() {
        let mut registry = CallbackRegistry::new();
        for i in 0..6 {
            registry.register(i);
        }
        assert_eq!(registry.snapshot_where(|v| v % 2 == 0), vec![0, 2, 4]);
    }
}
