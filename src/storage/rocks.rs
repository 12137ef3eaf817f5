// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! RocksDB-backed store adapter.

use std::path::Path;

use rocksdb::{
    BlockBasedOptions, DBRawIteratorWithThreadMode, DBWithThreadMode, FlushOptions, MultiThreaded,
    Options, WriteBatch, WriteOptions,
};
use tracing::{debug, info};

use super::key::{MAX_SENTINEL, MIN_SENTINEL};
use super::StorageError;

type Db = DBWithThreadMode<MultiThreaded>;

/// Handle to the underlying ordered store.
///
/// Writes go through atomic batches with the WAL disabled; durability is
/// obtained only via [`Database::flush`]. On open, the sentinel keys `{0x00}`
/// and `{0xff}` are written (with empty values) if absent so that ordered
/// iteration over any legal prefix always finds a neighbor.
pub struct Database {
    db: Db,
    write_opts: WriteOptions,
}

impl Database {
    /// Opens or creates a database at the given path with default tuning.
    pub fn open(path: &Path, create_if_missing: bool) -> Result<Self, StorageError> {
        Self::open_with_tuning(path, create_if_missing, None, None)
    }

    /// Opens a database with explicit engine tuning.
    ///
    /// `parallelism` sizes the engine's background thread pool;
    /// `max_open_files` caps table-file handles. Both fall back to the
    /// engine defaults when `None`.
    pub fn open_with_tuning(
        path: &Path,
        create_if_missing: bool,
        parallelism: Option<i32>,
        max_open_files: Option<i32>,
    ) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(create_if_missing);
        opts.set_level_compaction_dynamic_level_bytes(true);
        opts.set_bytes_per_sync(1024 * 1024);

        if let Some(threads) = parallelism {
            opts.increase_parallelism(threads);
        }

        opts.optimize_level_style_compaction(256 * 1024 * 1024);

        if let Some(max) = max_open_files {
            opts.set_max_open_files(max);
        }

        let mut table_opts = BlockBasedOptions::default();
        table_opts.set_format_version(4);
        table_opts.set_index_block_restart_interval(16);
        opts.set_block_based_table_factory(&table_opts);

        let db = Db::open(&opts, path)?;

        let mut write_opts = WriteOptions::default();
        write_opts.disable_wal(true);

        let database = Self { db, write_opts };
        database.write_sentinels()?;

        info!(path = %path.display(), "opened database");
        Ok(database)
    }

    fn write_sentinels(&self) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        let mut modified = false;
        for sentinel in [[MIN_SENTINEL], [MAX_SENTINEL]] {
            if self.db.get(sentinel)?.is_none() {
                batch.put(sentinel, []);
                modified = true;
            }
        }
        if modified {
            self.write(batch)?;
            debug!("wrote iteration sentinels");
        }
        Ok(())
    }

    /// Point lookup. `None` means the key is not present.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key)?)
    }

    /// Atomically applies a batch of puts and deletes.
    pub fn write(&self, batch: WriteBatch) -> Result<(), StorageError> {
        self.db.write_opt(batch, &self.write_opts)?;
        Ok(())
    }

    /// Flushes memtables to disk. With the WAL disabled this is the only
    /// durability point; a crash may lose everything since the last flush.
    pub fn flush(&self, wait: bool) -> Result<(), StorageError> {
        let mut opts = FlushOptions::default();
        opts.set_wait(wait);
        self.db.flush_opt(&opts)?;
        Ok(())
    }

    /// Returns an ordered cursor over the whole keyspace.
    pub fn cursor(&self) -> StoreCursor<'_> {
        StoreCursor {
            raw: self.db.raw_iterator(),
        }
    }
}

/// Ordered cursor over the store.
///
/// Every movement checks the engine status, so positioning errors surface as
/// [`StorageError`] instead of a silently invalid cursor. A cursor with no
/// current row reports `None` from [`StoreCursor::key`].
pub struct StoreCursor<'a> {
    raw: DBRawIteratorWithThreadMode<'a, Db>,
}

impl StoreCursor<'_> {
    /// Positions the cursor at the first key `>=` the given key.
    pub fn seek(&mut self, key: &[u8]) -> Result<(), StorageError> {
        self.raw.seek(key);
        self.check()
    }

    /// Positions the cursor at the last key in the store.
    pub fn seek_to_last(&mut self) -> Result<(), StorageError> {
        self.raw.seek_to_last();
        self.check()
    }

    /// Advances to the next key; no-op when the cursor has no current row.
    pub fn next(&mut self) -> Result<(), StorageError> {
        if self.raw.valid() {
            self.raw.next();
        }
        self.check()
    }

    /// Steps back to the previous key; no-op when the cursor has no current row.
    pub fn prev(&mut self) -> Result<(), StorageError> {
        if self.raw.valid() {
            self.raw.prev();
        }
        self.check()
    }

    /// Current key, or `None` when positioned before/after all rows.
    #[inline]
    pub fn key(&self) -> Option<&[u8]> {
        self.raw.key()
    }

    /// Current value, or `None` when positioned before/after all rows.
    #[inline]
    pub fn value(&self) -> Option<&[u8]> {
        self.raw.value()
    }

    fn check(&self) -> Result<(), StorageError> {
        self.raw.status()?;
        Ok(())
    }
}
