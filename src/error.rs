// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Crate-level error type.

use crate::storage::StorageError;

/// Errors that can occur in session, undo-stack, and view operations.
///
/// `Storage` failures are fatal: the session that observed one must be
/// discarded. Every other kind is recoverable at the call site and leaves
/// no persistent change.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Undo-stack precondition violation.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Iterator misuse or an invalid prefix.
    #[error("programming error: {0}")]
    Programming(&'static str),

    /// Malformed persisted record, or an object too large to length-prefix.
    #[error("serialization error: {0}")]
    Serialization(String),
}
