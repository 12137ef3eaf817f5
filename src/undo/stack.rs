// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The undo stack.

use std::sync::Arc;

use rocksdb::WriteBatch;
use tracing::debug;

use crate::error::KvError;
use crate::session::Cache;
use crate::storage::key::{append_u64_be, next_prefix, valid_prefix};
use crate::storage::Database;

use super::record::{apply_segment, pack_put, pack_remove};
use super::state::UndoState;

/// Default flush threshold for the in-memory segment buffer.
pub const DEFAULT_TARGET_SEGMENT_SIZE: usize = 64 * 1024 * 1024;

/// Multi-level reversible history over a [`Database`].
///
/// Each `push` opens a revision frame; flushed change sets append reverse
/// deltas to numbered segments owned by the top frame. `undo` replays and
/// deletes the top frame's segments, `squash` fuses the top two frames, and
/// `commit` makes history before a revision unrecoverable. The state record
/// and the segments live in the store itself, so the stack survives process
/// restarts and stays consistent with the last durable forward data.
pub struct UndoStack {
    db: Arc<Database>,
    state_key: Vec<u8>,
    segment_prefix: Vec<u8>,
    segment_next_prefix: Vec<u8>,
    target_segment_size: usize,
    state: UndoState,
}

impl UndoStack {
    /// Opens the undo stack under `undo_prefix`, reading the persisted state
    /// record if one exists.
    pub fn new(db: Arc<Database>, undo_prefix: Vec<u8>) -> Result<Self, KvError> {
        Self::with_target_segment_size(db, undo_prefix, DEFAULT_TARGET_SEGMENT_SIZE)
    }

    /// Like [`UndoStack::new`] with an explicit segment flush threshold.
    pub fn with_target_segment_size(
        db: Arc<Database>,
        undo_prefix: Vec<u8>,
        target_segment_size: usize,
    ) -> Result<Self, KvError> {
        if !valid_prefix(&undo_prefix) {
            return Err(KvError::Programming(
                "undo prefix must be non-empty and start with a byte in 0x01..=0xfe",
            ));
        }

        let mut state_key = undo_prefix.clone();
        state_key.push(0x00);
        let mut segment_prefix = undo_prefix;
        segment_prefix.push(0x80);
        let segment_next_prefix = next_prefix(&segment_prefix);

        let state = match db.get(&state_key)? {
            Some(raw) => {
                let state = UndoState::decode(&raw)?;
                debug!(
                    revision = state.revision,
                    frames = state.undo_stack.len(),
                    "loaded undo state"
                );
                state
            }
            None => UndoState::default(),
        };

        Ok(Self {
            db,
            state_key,
            segment_prefix,
            segment_next_prefix,
            target_segment_size,
            state,
        })
    }

    /// The current revision.
    #[inline]
    pub fn revision(&self) -> i64 {
        self.state.revision
    }

    /// Sets the revision counter on a stack with no live history.
    ///
    /// The revision may not decrease and must fit in an `i64`.
    pub fn set_revision(&mut self, revision: u64) -> Result<(), KvError> {
        if !self.state.undo_stack.is_empty() {
            return Err(KvError::InvalidState(
                "cannot set revision while undo history exists",
            ));
        }
        if revision > i64::MAX as u64 {
            return Err(KvError::InvalidState("revision to set is too high"));
        }
        let revision = revision as i64;
        if revision < self.state.revision {
            return Err(KvError::InvalidState("revision cannot decrease"));
        }
        self.state.revision = revision;
        self.persist_state()
    }

    /// Opens a new, initially empty revision frame.
    pub fn push(&mut self) -> Result<(), KvError> {
        self.state.undo_stack.push(0);
        self.state.revision += 1;
        self.persist_state()?;
        debug!(revision = self.state.revision, "pushed revision frame");
        Ok(())
    }

    /// Fuses the top two revision frames into one.
    pub fn squash(&mut self) -> Result<(), KvError> {
        if self.state.undo_stack.len() < 2 {
            return Err(KvError::InvalidState("nothing to squash"));
        }
        if let Some(top) = self.state.undo_stack.pop() {
            if let Some(below) = self.state.undo_stack.last_mut() {
                *below += top;
            }
        }
        self.state.revision -= 1;
        self.persist_state()?;
        debug!(revision = self.state.revision, "squashed revision frames");
        Ok(())
    }

    /// Reverts the store to its state at the top of the undo stack.
    ///
    /// The top frame's segments are replayed in descending id order and
    /// deleted, all in one atomic batch with the updated state record.
    pub fn undo(&mut self) -> Result<(), KvError> {
        let Some(&top) = self.state.undo_stack.last() else {
            return Err(KvError::InvalidState("nothing to undo"));
        };

        let mut batch = WriteBatch::default();
        let first = self.segment_key(self.state.next_undo_segment - top);

        let mut cursor = self.db.cursor();
        cursor.seek(&self.segment_next_prefix)?;
        if cursor.key().is_some() {
            cursor.prev()?;
        } else {
            cursor.seek_to_last()?;
        }
        loop {
            let Some(key) = cursor.key().map(<[u8]>::to_vec) else {
                break;
            };
            if key < first {
                break;
            }
            let payload = cursor.value().map(<[u8]>::to_vec).unwrap_or_default();
            apply_segment(&payload, &mut batch)?;
            batch.delete(&key);
            cursor.prev()?;
        }
        drop(cursor);

        self.state.next_undo_segment -= top;
        self.state.undo_stack.pop();
        self.state.revision -= 1;
        self.write_state(&mut batch)?;
        self.db.write(batch)?;
        debug!(revision = self.state.revision, "reverted one revision");
        Ok(())
    }

    /// Discards all undo history before `revision`, clamped to the current
    /// revision. Idempotent; the data of every still-reachable revision is
    /// untouched.
    pub fn commit(&mut self, revision: i64) -> Result<(), KvError> {
        let revision = revision.min(self.state.revision);
        let first_revision = self.state.revision - self.state.undo_stack.len() as i64;
        if first_revision < revision {
            let mut batch = WriteBatch::default();
            self.state.undo_stack.drain(..(revision - first_revision) as usize);
            let live: u64 = self.state.undo_stack.iter().sum();
            let keep = self.state.next_undo_segment - live;
            if keep > 0 {
                batch.delete_range(self.segment_key(0), self.segment_key(keep));
            }
            self.write_state(&mut batch)?;
            self.db.write(batch)?;
            debug!(revision, "committed undo history");
        }
        Ok(())
    }

    /// Flushes a session's change list: the forward batch, any reverse-delta
    /// segments, and the state record land in one atomic write.
    ///
    /// Reverse deltas are only recorded while at least one revision frame is
    /// open; the segment buffer is flushed whenever the next record would
    /// push it past the target size, so one call may produce zero, one, or
    /// many segments. On success the cache's change list is consumed.
    pub(crate) fn write_changes(&mut self, cache: &mut Cache) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        let mut segment: Vec<u8> = Vec::new();
        let mut forward_ops = 0usize;

        for key in cache.change_list.iter().rev() {
            let Some(entry) = cache.entries.get(key) else {
                continue;
            };
            if !entry.is_dirty() {
                continue;
            }

            match &entry.current_value {
                Some(value) => batch.put(key, value.as_slice()),
                None => batch.delete(key),
            }
            forward_ops += 1;

            if self.state.undo_stack.is_empty() {
                continue;
            }
            let mut record = Vec::new();
            match &entry.orig_value {
                Some(orig) => pack_put(&mut record, key, orig)?,
                None => pack_remove(&mut record, key)?,
            }
            if !segment.is_empty() && segment.len() + record.len() > self.target_segment_size {
                self.flush_segment(&mut batch, &mut segment);
            }
            segment.extend_from_slice(&record);
        }

        self.flush_segment(&mut batch, &mut segment);
        self.write_state(&mut batch)?;
        self.db.write(batch)?;
        cache.settle_changes();
        debug!(
            forward = forward_ops,
            revision = self.state.revision,
            "flushed change set"
        );
        Ok(())
    }

    fn flush_segment(&mut self, batch: &mut WriteBatch, segment: &mut Vec<u8>) {
        if segment.is_empty() {
            return;
        }
        let key = self.segment_key(self.state.next_undo_segment);
        self.state.next_undo_segment += 1;
        batch.put(&key, segment.as_slice());
        if let Some(top) = self.state.undo_stack.last_mut() {
            *top += 1;
        }
        segment.clear();
    }

    fn segment_key(&self, segment: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.segment_prefix.len() + 8);
        key.extend_from_slice(&self.segment_prefix);
        append_u64_be(&mut key, segment);
        key
    }

    fn write_state(&self, batch: &mut WriteBatch) -> Result<(), KvError> {
        batch.put(&self.state_key, self.state.encode()?);
        Ok(())
    }

    fn persist_state(&self) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        self.write_state(&mut batch)?;
        self.db.write(batch)?;
        Ok(())
    }
}
