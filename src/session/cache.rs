// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Session cache: ordered map of shadowed entries plus the change list.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Cached values are shared so a clean entry's original and current value
/// alias a single allocation.
pub(crate) type SharedValue = Arc<Vec<u8>>;

/// One cached entry, keyed by full composite key.
///
/// `orig_value` is the value as it existed in the store when the entry was
/// created (or at the last flush); `current_value` is what session readers
/// see. `None` means not present / erased. An entry is dirty iff the two
/// differ.
pub(crate) struct CachedValue {
    pub num_erases: u64,
    pub orig_value: Option<SharedValue>,
    pub current_value: Option<SharedValue>,
    pub in_change_list: bool,
}

impl CachedValue {
    pub fn clean(value: Option<SharedValue>) -> Self {
        Self {
            num_erases: 0,
            orig_value: value.clone(),
            current_value: value,
            in_change_list: false,
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.orig_value != self.current_value
    }
}

/// The session's view of the keyspace: every key the session has observed,
/// plus a LIFO of the dirty ones.
///
/// Entries are never removed before session end; erases keep the entry with
/// an absent `current_value` so iterators can detect and skip them. The
/// change list stores keys (entries are re-looked-up at flush) and holds
/// each dirty key exactly once.
pub(crate) struct Cache {
    pub entries: BTreeMap<Vec<u8>, CachedValue>,
    pub change_list: Vec<Vec<u8>>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            change_list: Vec::new(),
        }
    }

    /// Materializes a store row as a clean entry. Idempotent: an existing
    /// entry (clean or dirty) is left untouched.
    pub fn fill(&mut self, key: &[u8], value: &[u8]) {
        if !self.entries.contains_key(key) {
            self.entries.insert(
                key.to_vec(),
                CachedValue::clean(Some(Arc::new(value.to_vec()))),
            );
        }
    }

    /// Links an entry into the change list unless it is already there.
    pub fn mark_changed(&mut self, key: &[u8]) {
        if let Some(entry) = self.entries.get_mut(key) {
            if !entry.in_change_list {
                entry.in_change_list = true;
                self.change_list.push(key.to_vec());
            }
        }
    }

    /// Consumes the change list after a successful flush: listed entries
    /// become clean relative to the store state the flush produced.
    pub fn settle_changes(&mut self) {
        for key in std::mem::take(&mut self.change_list) {
            if let Some(entry) = self.entries.get_mut(&key) {
                entry.in_change_list = false;
                entry.orig_value = entry.current_value.clone();
            }
        }
    }

    /// First cached key `>=` the given key.
    pub fn first_key_at_or_after(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    /// First cached key strictly greater than the given key.
    pub fn next_key_after(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .range::<[u8], _>((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
    }

    /// Last cached key strictly less than the given key.
    pub fn prev_key_before(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(key)))
            .next_back()
            .map(|(k, _)| k.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_is_idempotent() {
        let mut cache = Cache::new();
        cache.fill(&[0x20], &[0x50]);
        cache.fill(&[0x20], &[0x60]);

        let entry = cache.entries.get(&vec![0x20]).unwrap();
        assert_eq!(entry.current_value.as_deref(), Some(&vec![0x50]));
        assert!(!entry.is_dirty());
    }

    #[test]
    fn test_fill_does_not_clobber_dirty_entry() {
        let mut cache = Cache::new();
        cache.entries.insert(
            vec![0x20],
            CachedValue {
                num_erases: 1,
                orig_value: Some(Arc::new(vec![0x50])),
                current_value: None,
                in_change_list: true,
            },
        );
        cache.fill(&[0x20], &[0x50]);
        assert!(cache.entries.get(&vec![0x20]).unwrap().current_value.is_none());
    }

    #[test]
    fn test_mark_changed_links_once() {
        let mut cache = Cache::new();
        cache.fill(&[0x20], &[0x50]);
        cache.mark_changed(&[0x20]);
        cache.mark_changed(&[0x20]);
        assert_eq!(cache.change_list, vec![vec![0x20]]);
    }

    #[test]
    fn test_settle_makes_entries_clean() {
        let mut cache = Cache::new();
        cache.entries.insert(
            vec![0x20],
            CachedValue {
                num_erases: 0,
                orig_value: None,
                current_value: Some(Arc::new(vec![0x50])),
                in_change_list: true,
            },
        );
        cache.change_list.push(vec![0x20]);

        cache.settle_changes();

        assert!(cache.change_list.is_empty());
        let entry = cache.entries.get(&vec![0x20]).unwrap();
        assert!(!entry.in_change_list);
        assert!(!entry.is_dirty());
        assert_eq!(entry.orig_value.as_deref(), Some(&vec![0x50]));
    }

    #[test]
    fn test_key_neighbors() {
        let mut cache = Cache::new();
        cache.fill(&[0x20], &[]);
        cache.fill(&[0x22], &[]);
        cache.fill(&[0x24], &[]);

        assert_eq!(cache.first_key_at_or_after(&[0x21]), Some(vec![0x22]));
        assert_eq!(cache.first_key_at_or_after(&[0x22]), Some(vec![0x22]));
        assert_eq!(cache.next_key_after(&[0x22]), Some(vec![0x24]));
        assert_eq!(cache.next_key_after(&[0x24]), None);
        assert_eq!(cache.prev_key_before(&[0x22]), Some(vec![0x20]));
        assert_eq!(cache.prev_key_before(&[0x20]), None);
    }
}
