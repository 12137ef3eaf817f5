// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Undo stack: reversible history persisted in the store.
//!
//! Every flushed change set appends reverse deltas to numbered segment
//! records; a small state record tracks the revision counter, the per
//! revision segment counts, and the segment id allocator. Because both live
//! in the same store as the forward data and are written in the same atomic
//! batch, the history is always consistent with the data after a restart.

pub(crate) mod codec;
mod record;
mod stack;
mod state;

pub use stack::{UndoStack, DEFAULT_TARGET_SEGMENT_SIZE};
pub use state::UndoState;
