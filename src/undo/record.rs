// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Reverse-delta records.
//!
//! A segment payload is a concatenation of records, each `tag ‖ key` (remove)
//! or `tag ‖ key ‖ value` (put), with keys and values length-prefixed.
//! Applying a segment replays its records into a write batch.

use rocksdb::WriteBatch;

use crate::error::KvError;

use super::codec::{put_bytes, read_bytes, read_u8};

const TAG_REMOVE: u8 = 0;
const TAG_PUT: u8 = 1;

/// Appends a record that removes `key` when the segment is applied.
pub(crate) fn pack_remove(out: &mut Vec<u8>, key: &[u8]) -> Result<(), KvError> {
    out.push(TAG_REMOVE);
    put_bytes(out, key)
}

/// Appends a record that restores `key` to `value` when the segment is applied.
pub(crate) fn pack_put(out: &mut Vec<u8>, key: &[u8], value: &[u8]) -> Result<(), KvError> {
    out.push(TAG_PUT);
    put_bytes(out, key)?;
    put_bytes(out, value)
}

/// Replays every record in a segment payload into the batch.
pub(crate) fn apply_segment(mut payload: &[u8], batch: &mut WriteBatch) -> Result<(), KvError> {
    while !payload.is_empty() {
        match read_u8(&mut payload)? {
            TAG_REMOVE => {
                let key = read_bytes(&mut payload)?;
                batch.delete(key);
            }
            TAG_PUT => {
                let key = read_bytes(&mut payload)?;
                let value = read_bytes(&mut payload)?;
                batch.put(key, value);
            }
            _ => return Err(KvError::Serialization("unknown undo record tag".into())),
        }
    }
    Ok(())
}
