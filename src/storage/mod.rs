// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Store adapter and key codec.
//!
//! This module is the only place that touches RocksDB directly. [`Database`]
//! wraps the engine with the write discipline this layer needs (atomic
//! batches with the WAL disabled, explicit flush for durability) and writes
//! the iteration sentinels on open. [`key`] builds the composite keys every
//! higher layer operates on.

mod error;
pub mod key;
mod rocks;

pub use error::StorageError;
pub use rocks::{Database, StoreCursor};
