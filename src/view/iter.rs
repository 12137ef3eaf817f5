// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Merged iteration over the session cache and the store.

use crate::error::KvError;
use crate::session::{Cache, WriteSession};
use crate::storage::key::{full_key, next_prefix};
use crate::storage::StoreCursor;

/// Iterator over one contract's keys under one view prefix.
///
/// The cache is the iteration substrate: the store cursor is advanced only
/// to discover rows, which are filled into the cache before the cache
/// position moves past them, and positions are then ordinary ordered-map
/// neighbors. A position is remembered as the full key plus the entry's
/// erase generation at the time it was taken; an erase of that key elsewhere
/// in the session makes the position stale and every access fails until a
/// re-seek (`move_to_begin`, `move_to_end`, or `lower_bound`).
///
/// Iterators are move-only and borrow their session for their whole
/// lifetime.
pub struct ViewIterator<'a> {
    session: &'a WriteSession,
    cursor: StoreCursor<'a>,
    full_prefix: Vec<u8>,
    next_prefix: Vec<u8>,
    hidden_prefix_len: usize,
    position: Option<Position>,
}

struct Position {
    key: Vec<u8>,
    num_erases: u64,
}

impl<'a> ViewIterator<'a> {
    pub(crate) fn new(
        session: &'a WriteSession,
        view_prefix: &[u8],
        contract: u64,
        user_prefix: &[u8],
    ) -> Result<Self, KvError> {
        let full_prefix = full_key(view_prefix, contract, user_prefix);
        let bound = next_prefix(&full_prefix);
        let mut cursor = session.database().cursor();

        // Prime the cache with the range's neighbors so every later merge
        // step finds its boundary rows already materialized.
        {
            let mut cache = session.cache();
            cursor.seek(&full_prefix)?;
            fill_from_cursor(&mut cache, &cursor);
            cursor.prev()?;
            fill_from_cursor(&mut cache, &cursor);
            cursor.seek(&bound)?;
            fill_from_cursor(&mut cache, &cursor);
        }

        Ok(Self {
            session,
            cursor,
            full_prefix,
            next_prefix: bound,
            hidden_prefix_len: view_prefix.len() + 8,
            position: None,
        })
    }

    /// Positions at the first live key of the range, or end when empty.
    pub fn move_to_begin(&mut self) -> Result<(), KvError> {
        let full = self.full_prefix.clone();
        self.seek_full_key(&full)
    }

    /// Positions past the last key of the range.
    pub fn move_to_end(&mut self) {
        self.position = None;
    }

    /// Positions at the first live key `>=` the given user key, clamped to
    /// the iterator's range.
    pub fn lower_bound(&mut self, user_key: &[u8]) -> Result<(), KvError> {
        let user_prefix = &self.full_prefix[self.hidden_prefix_len..];
        let key = if user_key < user_prefix {
            user_prefix
        } else {
            user_key
        };
        let mut full = Vec::with_capacity(self.hidden_prefix_len + key.len());
        full.extend_from_slice(&self.full_prefix[..self.hidden_prefix_len]);
        full.extend_from_slice(key);
        self.seek_full_key(&full)
    }

    /// Steps to the next live key; from the end position this re-enters at
    /// the beginning of the range.
    pub fn next(&mut self) -> Result<(), KvError> {
        let current = match &self.position {
            None => return self.move_to_begin(),
            Some(pos) => pos.key.clone(),
        };
        let mut cache = self.session.cache();
        self.check_fresh(&cache)?;

        while self.cursor.key().is_some_and(|k| k <= current.as_slice()) {
            self.cursor.next()?;
            fill_from_cursor(&mut cache, &self.cursor);
        }
        let candidate = cache.next_key_after(&current);
        let landed = self.skip_absent_forward(&mut cache, candidate)?;
        self.settle_forward(&cache, landed);
        Ok(())
    }

    /// Steps to the previous live key; from the end position this lands on
    /// the last live key of the range.
    pub fn prev(&mut self) -> Result<(), KvError> {
        let mut cache = self.session.cache();
        let start = match &self.position {
            None => {
                let bound = self.next_prefix.clone();
                self.cursor.seek(&bound)?;
                fill_from_cursor(&mut cache, &self.cursor);
                match cache.first_key_at_or_after(&bound) {
                    Some(key) => key,
                    None => {
                        self.position = None;
                        return Ok(());
                    }
                }
            }
            Some(pos) => {
                self.check_fresh(&cache)?;
                pos.key.clone()
            }
        };
        let landed = self.skip_absent_backward(&mut cache, start)?;
        self.settle_backward(&cache, landed);
        Ok(())
    }

    /// Returns the current (user key, value), `None` at end, or a
    /// programming error when the position was erased.
    pub fn get_kv(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>, KvError> {
        let Some(pos) = &self.position else {
            return Ok(None);
        };
        let cache = self.session.cache();
        let entry = cache.entries.get(&pos.key);
        let fresh = entry.is_some_and(|e| e.num_erases == pos.num_erases);
        match entry.and_then(|e| e.current_value.as_ref()) {
            Some(value) if fresh => Ok(Some((
                pos.key[self.hidden_prefix_len..].to_vec(),
                value.to_vec(),
            ))),
            _ => Err(KvError::Programming("iterator is at an erased position")),
        }
    }

    /// True when positioned past the range in either direction.
    #[inline]
    pub fn is_end(&self) -> bool {
        self.position.is_none()
    }

    /// True when positioned on a key whose entry has not been erased since.
    pub fn is_valid(&self) -> bool {
        match &self.position {
            None => false,
            Some(pos) => self
                .session
                .cache()
                .entries
                .get(&pos.key)
                .is_some_and(|e| e.num_erases == pos.num_erases),
        }
    }

    fn seek_full_key(&mut self, full: &[u8]) -> Result<(), KvError> {
        self.cursor.seek(full)?;
        let mut cache = self.session.cache();
        fill_from_cursor(&mut cache, &self.cursor);
        let candidate = cache.first_key_at_or_after(full);
        let landed = self.skip_absent_forward(&mut cache, candidate)?;
        self.settle_forward(&cache, landed);
        Ok(())
    }

    /// Walks forward from `candidate` to the first entry with a live value,
    /// keeping the merge invariant: the store cursor is pushed past every
    /// skipped key, filling the cache, before the cache position moves on.
    fn skip_absent_forward(
        &mut self,
        cache: &mut Cache,
        mut candidate: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, KvError> {
        while let Some(key) = candidate {
            let absent = matches!(cache.entries.get(&key), Some(e) if e.current_value.is_none());
            if !absent {
                return Ok(Some(key));
            }
            while self.cursor.key().is_some_and(|k| k <= key.as_slice()) {
                self.cursor.next()?;
                fill_from_cursor(cache, &self.cursor);
            }
            candidate = cache.next_key_after(&key);
        }
        Ok(None)
    }

    fn skip_absent_backward(
        &mut self,
        cache: &mut Cache,
        mut key: Vec<u8>,
    ) -> Result<Option<Vec<u8>>, KvError> {
        loop {
            while self.cursor.key().is_some_and(|k| k >= key.as_slice()) {
                self.cursor.prev()?;
                fill_from_cursor(cache, &self.cursor);
            }
            let Some(prev) = cache.prev_key_before(&key) else {
                return Ok(None);
            };
            let present = cache
                .entries
                .get(&prev)
                .is_some_and(|e| e.current_value.is_some());
            key = prev;
            if present {
                return Ok(Some(key));
            }
        }
    }

    fn settle_forward(&mut self, cache: &Cache, landed: Option<Vec<u8>>) {
        self.position = landed.and_then(|key| {
            if key.as_slice() >= self.next_prefix.as_slice() {
                None
            } else {
                let num_erases = cache
                    .entries
                    .get(&key)
                    .map(|e| e.num_erases)
                    .unwrap_or_default();
                Some(Position { key, num_erases })
            }
        });
    }

    fn settle_backward(&mut self, cache: &Cache, landed: Option<Vec<u8>>) {
        self.position = landed.and_then(|key| {
            if key.as_slice() < self.full_prefix.as_slice() {
                None
            } else {
                let num_erases = cache
                    .entries
                    .get(&key)
                    .map(|e| e.num_erases)
                    .unwrap_or_default();
                Some(Position { key, num_erases })
            }
        });
    }

    fn check_fresh(&self, cache: &Cache) -> Result<(), KvError> {
        if let Some(pos) = &self.position {
            let fresh = cache
                .entries
                .get(&pos.key)
                .is_some_and(|e| e.num_erases == pos.num_erases);
            if !fresh {
                return Err(KvError::Programming("iterator is at an erased position"));
            }
        }
        Ok(())
    }
}

fn fill_from_cursor(cache: &mut Cache, cursor: &StoreCursor<'_>) {
    if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
        cache.fill(key, value);
    }
}
