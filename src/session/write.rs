// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The write session.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::KvError;
use crate::storage::Database;
use crate::undo::UndoStack;

use super::cache::{Cache, CachedValue};

/// A buffered writer over the store.
///
/// All reads and writes go through the session cache, which shadows the
/// original store value per key; nothing reaches the store until
/// [`WriteSession::write_changes`]. A session, its views, and their
/// iterators are driven by one logical agent at a time — the internal lock
/// only lets iterators and mutations interleave on that agent, it does not
/// make the session multi-writer.
pub struct WriteSession {
    db: Arc<Database>,
    cache: Mutex<Cache>,
}

impl WriteSession {
    /// Creates a session with an empty cache.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cache: Mutex::new(Cache::new()),
        }
    }

    /// The store this session writes to.
    #[inline]
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub(crate) fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock()
    }

    /// Reads the session-visible value for a full key.
    ///
    /// A store hit is cached as a clean entry; a store miss is not cached.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.entries.get(key) {
            return Ok(entry.current_value.as_ref().map(|v| v.to_vec()));
        }

        match self.db.get(key)? {
            None => Ok(None),
            Some(value) => {
                let shared = Arc::new(value);
                cache
                    .entries
                    .insert(key.to_vec(), CachedValue::clean(Some(shared.clone())));
                Ok(Some(shared.to_vec()))
            }
        }
    }

    /// Sets the session-visible value for a full key.
    pub fn set(&self, key: Vec<u8>, value: &[u8]) -> Result<(), KvError> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.entries.get_mut(&key) {
            let changes = entry
                .current_value
                .as_ref()
                .map_or(true, |current| current.as_slice() != value);
            if changes {
                entry.current_value = Some(Arc::new(value.to_vec()));
                cache.mark_changed(&key);
            }
            return Ok(());
        }

        match self.db.get(&key)? {
            None => {
                cache.entries.insert(
                    key.clone(),
                    CachedValue {
                        num_erases: 0,
                        orig_value: None,
                        current_value: Some(Arc::new(value.to_vec())),
                        in_change_list: false,
                    },
                );
                cache.mark_changed(&key);
            }
            Some(orig) if orig != value => {
                cache.entries.insert(
                    key.clone(),
                    CachedValue {
                        num_erases: 0,
                        orig_value: Some(Arc::new(orig)),
                        current_value: Some(Arc::new(value.to_vec())),
                        in_change_list: false,
                    },
                );
                cache.mark_changed(&key);
            }
            Some(orig) => {
                // Writing the stored value back is a no-op, but the clean
                // entry keeps a later overwrite detectable.
                cache
                    .entries
                    .insert(key, CachedValue::clean(Some(Arc::new(orig))));
            }
        }
        Ok(())
    }

    /// Erases the session-visible value for a full key.
    ///
    /// Each erase of a present key bumps the entry's erase generation, which
    /// invalidates iterators parked on it.
    pub fn erase(&self, key: Vec<u8>) -> Result<(), KvError> {
        let mut cache = self.cache.lock();
        if let Some(entry) = cache.entries.get_mut(&key) {
            if entry.current_value.is_some() {
                entry.num_erases += 1;
                entry.current_value = None;
                cache.mark_changed(&key);
            }
            return Ok(());
        }

        match self.db.get(&key)? {
            None => {
                cache.entries.insert(key, CachedValue::clean(None));
            }
            Some(orig) => {
                cache.entries.insert(
                    key.clone(),
                    CachedValue {
                        num_erases: 1,
                        orig_value: Some(Arc::new(orig)),
                        current_value: None,
                        in_change_list: false,
                    },
                );
                cache.mark_changed(&key);
            }
        }
        Ok(())
    }

    /// Flushes the change list through the undo stack as one atomic batch.
    ///
    /// On success the change list is consumed: flushed entries become clean
    /// relative to the new store state, so the session can keep going.
    pub fn write_changes(&self, undo: &mut UndoStack) -> Result<(), KvError> {
        let mut cache = self.cache.lock();
        undo.write_changes(&mut cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_db() -> (Arc<Database>, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(dir.path(), true).unwrap());
        (db, dir)
    }

    fn seed(db: &Database, key: &[u8], value: &[u8]) {
        let mut batch = rocksdb::WriteBatch::default();
        batch.put(key, value);
        db.write(batch).unwrap();
    }

    #[test]
    fn test_get_reads_through_to_store() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db);
        assert_eq!(session.get(&[0x20, 0x01]).unwrap(), Some(vec![0x50]));
        assert_eq!(session.get(&[0x20, 0x02]).unwrap(), None);
    }

    #[test]
    fn test_set_shadows_store_until_flush() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db.clone());
        session.set(vec![0x20, 0x01], &[0x60]).unwrap();

        assert_eq!(session.get(&[0x20, 0x01]).unwrap(), Some(vec![0x60]));
        assert_eq!(db.get(&[0x20, 0x01]).unwrap(), Some(vec![0x50]));
    }

    #[test]
    fn test_erase_is_visible_in_session() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db);
        session.erase(vec![0x20, 0x01]).unwrap();
        assert_eq!(session.get(&[0x20, 0x01]).unwrap(), None);

        // Erasing again is a no-op.
        session.erase(vec![0x20, 0x01]).unwrap();
        assert_eq!(session.get(&[0x20, 0x01]).unwrap(), None);
    }

    #[test]
    fn test_erase_of_missing_key_is_clean() {
        let (db, _dir) = open_db();
        let session = WriteSession::new(db);
        session.erase(vec![0x20, 0x01]).unwrap();
        assert!(session.cache().change_list.is_empty());
    }

    #[test]
    fn test_set_to_stored_value_is_clean() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db);
        session.set(vec![0x20, 0x01], &[0x50]).unwrap();

        let cache = session.cache();
        assert!(cache.change_list.is_empty());
        assert!(cache.entries.contains_key(&vec![0x20, 0x01]));
    }

    #[test]
    fn test_compensating_set_returns_to_clean_value() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db);
        session.set(vec![0x20, 0x01], &[0x60]).unwrap();
        session.set(vec![0x20, 0x01], &[0x50]).unwrap();

        // The entry is linked (it was dirty at some point) but no longer dirty.
        let cache = session.cache();
        let entry = cache.entries.get(&vec![0x20, 0x01]).unwrap();
        assert!(!entry.is_dirty());
        assert!(entry.in_change_list);
    }

    #[test]
    fn test_repeated_set_links_once() {
        let (db, _dir) = open_db();
        let session = WriteSession::new(db);
        session.set(vec![0x20, 0x01], &[0x50]).unwrap();
        session.set(vec![0x20, 0x01], &[0x60]).unwrap();
        session.set(vec![0x20, 0x01], &[0x70]).unwrap();
        assert_eq!(session.cache().change_list.len(), 1);
    }

    #[test]
    fn test_erase_bumps_generation() {
        let (db, _dir) = open_db();
        seed(&db, &[0x20, 0x01], &[0x50]);

        let session = WriteSession::new(db);
        session.get(&[0x20, 0x01]).unwrap();
        session.erase(vec![0x20, 0x01]).unwrap();
        session.set(vec![0x20, 0x01], &[0x60]).unwrap();
        session.erase(vec![0x20, 0x01]).unwrap();

        let cache = session.cache();
        assert_eq!(cache.entries.get(&vec![0x20, 0x01]).unwrap().num_erases, 2);
    }
}
