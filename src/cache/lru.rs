//! Bounded LRU map
//!
//! Recency is kept in a `VecDeque` (front = least recent). Lookups that
//! touch an entry are O(n) in the entry count, which stays small.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub(crate) struct LruCache<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    map: HashMap<K, V>,
}

impl<K: Copy + Eq + Hash, V> LruCache<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Look up and mark as most recently used
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        if !self.map.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.map.get(key)
    }

    /// Insert as most recently used; returns the entry evicted to make room
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.map.contains_key(&key) {
            self.touch(&key);
            self.map.insert(key, value);
            return None;
        }

        let evicted = if self.map.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        self.order.push_back(key);
        self.map.insert(key, value);
        evicted
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.map.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(value)
    }

    /// Remove every entry whose key matches, in recency order
    pub(crate) fn remove_where(&mut self, mut pred: impl FnMut(&K) -> bool) -> Vec<(K, V)> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.order.len());
        for key in self.order.drain(..) {
            if pred(&key) {
                if let Some(value) = self.map.remove(&key) {
                    removed.push((key, value));
                }
            } else {
                kept.push_back(key);
            }
        }
        self.order = kept;
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn pop_lru(&mut self) -> Option<(K, V)> {
        let key = self.order.pop_front()?;
        let value = self.map.remove(&key)?;
        Some((key, value))
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}
