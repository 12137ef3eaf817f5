// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! ledgerkv: a transactional key-value layer with multi-level undo history,
//! built on RocksDB for blockchain-style host applications.
//!
//! A [`WriteSession`] buffers mutations in an ordered cache that shadows the
//! original store values; [`UndoStack`] persists reverse deltas so whole
//! revisions can be reverted, squashed, or committed across restarts; a
//! [`View`] scopes reads, writes, and merged iteration to one prefixed,
//! contract-addressed sub-keyspace.

pub mod error;
pub mod session;
pub mod storage;
pub mod undo;
pub mod view;

pub use error::KvError;
pub use session::WriteSession;
pub use storage::{Database, StorageError, StoreCursor};
pub use undo::{UndoStack, UndoState, DEFAULT_TARGET_SEGMENT_SIZE};
pub use view::{View, ViewIterator};
