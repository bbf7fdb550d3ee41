// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Bounded ring-buffer logs
//!
//! Every history list stored on entities and edges is a `BoundedLog`: pushes
//! beyond capacity evict the oldest element first. Timestamps placed inside a
//! log are always supplied by the caller, never by the store.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity log that evicts oldest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedLog<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> BoundedLog<T> {
    /// Create an empty log. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Create a log seeded with a single item
    pub fn with_item(capacity: usize, item: T) -> Self {
        let mut log = Self::new(capacity);
        log.push(item);
        log
    }

    /// Append an item, returning the evicted element if capacity was exceeded.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Most recently pushed item
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.iter().cloned().collect()
    }
}

impl<T: PartialEq> BoundedLog<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Append only if the item is not already present.
    ///
    /// Returns `true` when the item was appended.
    pub fn push_unique(&mut self, item: T) -> bool {
        if self.contains(&item) {
            return false;
        }
        self.push(item);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_oldest_first() {
        let mut log = BoundedLog::new(3);
        assert_eq!(log.push(1), None);
        assert_eq!(log.push(2), None);
        assert_eq!(log.push(3), None);
        assert_eq!(log.push(4), Some(1));
        assert_eq!(log.to_vec(), vec![2, 3, 4]);
        assert_eq!(log.latest(), Some(&4));
    }

    #[test]
    fn test_push_unique() {
        let mut log = BoundedLog::new(2);
        assert!(log.push_unique("conv-1"));
        assert!(!log.push_unique("conv-1"));
        assert!(log.push_unique("conv-2"));
        assert!(log.push_unique("conv-3"));
        assert_eq!(log.to_vec(), vec!["conv-2", "conv-3"]);
    }

    #[test]
    fn test_serde_keeps_capacity() {
        let log = BoundedLog::with_item(5, "a".to_string());
        let json = serde_json::to_string(&log).unwrap();
        let back: BoundedLog<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.capacity(), 5);
        assert_eq!(back.to_vec(), vec!["a".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_keeps_newest_suffix(cap in 1usize..8, values in proptest::collection::vec(0u32..100, 0..40)) {
            let mut log = BoundedLog::new(cap);
            for v in &values {
                log.push(*v);
            }
            let expected: Vec<u32> = values.iter().rev().take(cap).rev().cloned().collect();
            prop_assert_eq!(log.to_vec(), expected);
            prop_assert!(log.len() <= cap);
        }
    }
}
