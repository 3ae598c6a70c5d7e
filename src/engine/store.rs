//! A bounded cache which keeps warm engine sessions alive between games.
//
//  Copyright 2021 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::sync::Mutex;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A thread-safe, bounded store of idle values, evicted oldest-first.
///
/// Entries are moved in and out: checking a value out removes it, so it is exclusively
/// owned until it is released back. Releasing beyond capacity destroys the oldest
/// entry. A capacity of zero means nothing is ever cached; every release destroys the
/// value it was given.
#[derive(Debug)]
pub struct Store<T> {
    capacity: usize,
    cache: Mutex<Vec<T>>,
}

impl<T> Store<T> {
    /// Creates a store which holds at most `capacity` entries.
    pub fn new(capacity: usize) -> Store<T> {
        Store {
            capacity,
            cache: Mutex::new(Vec::new()),
        }
    }

    /// Removes and returns the first entry satisfying `pred`, or `None`.
    pub fn get<F>(&self, pred: F) -> Option<T>
        where F: Fn(&T) -> bool {
        let mut cache = self.cache.lock().expect("INFALLIBLE");
        let index = cache.iter().position(pred)?;

        Some(cache.remove(index))
    }

    /// Removes and returns the most recently released entry, or `None`.
    pub fn get_any(&self) -> Option<T> {
        self.cache.lock().expect("INFALLIBLE").pop()
    }

    /// Inserts a value at the tail, evicting (destroying) the oldest entry if the
    /// store is full. Returns `true` if an entry was destroyed.
    pub fn release(&self, value: T) -> bool {
        // Destroy outside the lock: dropping an engine session reaps a subprocess.
        let evicted;
        {
            let mut cache = self.cache.lock().expect("INFALLIBLE");
            if self.capacity == 0 {
                return true;
            }

            evicted = if cache.len() == self.capacity {
                Some(cache.remove(0))
            } else {
                None
            };
            cache.push(value);
        }

        evicted.is_some()
    }

    /// Removes and destroys the oldest entry, if any.
    pub fn remove_oldest(&self) {
        let removed;
        {
            let mut cache = self.cache.lock().expect("INFALLIBLE");
            removed = if cache.is_empty() { None } else { Some(cache.remove(0)) };
        }
        drop(removed);
    }

    /// Destroys every cached entry.
    pub fn clear(&self) {
        let drained: Vec<T> = {
            let mut cache = self.cache.lock().expect("INFALLIBLE");
            cache.drain(..).collect()
        };
        drop(drained);
    }

    /// Returns `true` if the store holds no entries.
    pub fn empty(&self) -> bool {
        self.cache.lock().expect("INFALLIBLE").is_empty()
    }

    /// Returns `true` if the store is at capacity.
    pub fn full(&self) -> bool {
        self.cache.lock().expect("INFALLIBLE").len() == self.capacity
    }

    /// The number of entries currently cached.
    pub fn size(&self) -> usize {
        self.cache.lock().expect("INFALLIBLE").len()
    }

    /// The maximum number of entries the store will cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_reports_eviction() {
        let store = Store::new(4);

        assert!(!store.release(0));
        assert!(!store.release(1));
        assert!(!store.release(2));
        assert!(!store.release(3));
        assert!(store.release(4));
        assert_eq!(store.size(), 4);
    }

    #[test]
    fn release_evicts_the_oldest() {
        let store = Store::new(2);

        store.release(1);
        store.release(2);
        assert!(store.release(3));
        // 1 was evicted, so only 2 and 3 remain
        assert!(store.get(|&v| v == 1).is_none());
        assert_eq!(store.get(|&v| v == 2), Some(2));
        assert_eq!(store.get(|&v| v == 3), Some(3));
    }

    #[test]
    fn get_removes_the_first_match() {
        let store = Store::new(4);

        store.release(1);
        store.release(2);

        assert_eq!(store.get(|&v| v == 1), Some(1));
        assert!(store.get(|&v| v == 3).is_none());
        assert_eq!(store.get_any(), Some(2));
        assert!(store.get_any().is_none());
    }

    #[test]
    fn get_any_is_lifo() {
        let store = Store::new(4);

        store.release(1);
        store.release(2);
        store.release(3);

        assert_eq!(store.get_any(), Some(3));
        assert_eq!(store.get_any(), Some(2));
        assert_eq!(store.get_any(), Some(1));
    }

    #[test]
    fn zero_capacity_never_caches() {
        let store = Store::new(0);

        assert!(store.release(1));
        assert!(store.empty());
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn empty_and_full() {
        let store = Store::new(4);
        assert!(store.empty());
        assert!(!store.full());

        for v in 0..4 {
            store.release(v);
        }
        assert!(!store.empty());
        assert!(store.full());
    }

    #[test]
    fn size_saturates_at_capacity() {
        let store = Store::new(4);
        assert_eq!(store.capacity(), 4);

        for v in 0..6usize {
            store.release(v);
            assert_eq!(store.size(), (v + 1).min(4));
        }
    }

    #[test]
    fn clear_and_remove_oldest() {
        let store = Store::new(4);

        store.release(1);
        store.release(2);
        store.release(3);
        assert_eq!(store.size(), 3);

        store.remove_oldest();
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(|&v| v == 2), Some(2));

        store.clear();
        assert!(store.empty());
    }
}
