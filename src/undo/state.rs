// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The persisted undo-stack state record.

use crate::error::KvError;

use super::codec::{put_i64, put_u64, put_varint, read_i64, read_u64, read_varint};

const FORMAT_VERSION: u8 = 0;

/// Bookkeeping for the undo stack, stored as a single record at
/// `undo_prefix ‖ 0x00`.
///
/// `undo_stack` holds one segment count per live revision, oldest first;
/// `next_undo_segment` allocates contiguous segment ids. The record is
/// rewritten in the same atomic batch as every operation that changes it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UndoState {
    pub revision: i64,
    pub undo_stack: Vec<u64>,
    pub next_undo_segment: u64,
}

impl UndoState {
    /// Serializes the record, including its format version.
    pub fn encode(&self) -> Result<Vec<u8>, KvError> {
        let mut out = Vec::with_capacity(17 + 8 * self.undo_stack.len() + 2);
        out.push(FORMAT_VERSION);
        put_i64(&mut out, self.revision);
        let count = u32::try_from(self.undo_stack.len())
            .map_err(|_| KvError::Serialization("undo stack too deep".into()))?;
        put_varint(&mut out, count);
        for &segments in &self.undo_stack {
            put_u64(&mut out, segments);
        }
        put_u64(&mut out, self.next_undo_segment);
        Ok(out)
    }

    /// Deserializes a record, rejecting unknown format versions and
    /// trailing bytes as corruption.
    pub fn decode(mut input: &[u8]) -> Result<Self, KvError> {
        let Some((&version, rest)) = input.split_first() else {
            return Err(KvError::Serialization("empty undo state record".into()));
        };
        if version != FORMAT_VERSION {
            return Err(KvError::Serialization(format!(
                "unsupported undo state format {version}"
            )));
        }
        input = rest;

        let revision = read_i64(&mut input)?;
        let count = read_varint(&mut input)? as usize;
        let mut undo_stack = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            undo_stack.push(read_u64(&mut input)?);
        }
        let next_undo_segment = read_u64(&mut input)?;

        if !input.is_empty() {
            return Err(KvError::Serialization(
                "trailing bytes in undo state record".into(),
            ));
        }
        Ok(Self {
            revision,
            undo_stack,
            next_undo_segment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let state = UndoState {
            revision: 42,
            undo_stack: vec![0, 3, 1],
            next_undo_segment: 17,
        };
        let decoded = UndoState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_default_round_trip() {
        let state = UndoState::default();
        let decoded = UndoState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut encoded = UndoState::default().encode().unwrap();
        encoded[0] = 1;
        assert!(matches!(
            UndoState::decode(&encoded),
            Err(KvError::Serialization(_))
        ));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut encoded = UndoState::default().encode().unwrap();
        encoded.push(0);
        assert!(matches!(
            UndoState::decode(&encoded),
            Err(KvError::Serialization(_))
        ));
    }

    #[test]
    fn test_rejects_truncation() {
        let encoded = UndoState {
            revision: 1,
            undo_stack: vec![2],
            next_undo_segment: 3,
        }
        .encode()
        .unwrap();
        for len in 0..encoded.len() {
            assert!(
                UndoState::decode(&encoded[..len]).is_err(),
                "truncation at {len} must not decode"
            );
        }
    }
}
