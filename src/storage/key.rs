// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Composite key construction.
//!
//! User data lives at `view_prefix ‖ contract ‖ user_key`, with the contract
//! id encoded big-endian so that byte-order iteration keeps each contract's
//! range contiguous. Range scans are bounded above by [`next_prefix`], the
//! lexicographic successor of a prefix.

/// Sentinel key at the low end of the keyspace.
pub const MIN_SENTINEL: u8 = 0x00;

/// Sentinel key at the high end of the keyspace.
pub const MAX_SENTINEL: u8 = 0xff;

/// Appends a u64 to a key buffer, most-significant byte first.
#[inline]
pub fn append_u64_be(dest: &mut Vec<u8>, value: u64) {
    dest.extend_from_slice(&value.to_be_bytes());
}

/// Builds the composite key `prefix ‖ be(contract) ‖ user_key`.
pub fn full_key(prefix: &[u8], contract: u64, user_key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + 8 + user_key.len());
    result.extend_from_slice(prefix);
    append_u64_be(&mut result, contract);
    result.extend_from_slice(user_key);
    result
}

/// Returns the smallest byte string strictly greater than every string that
/// starts with `prefix`.
///
/// Increments the last byte; on overflow the byte is dropped and the next
/// one is incremented. An empty result means "no upper bound"; it cannot
/// occur for prefixes accepted by [`valid_prefix`], whose first byte is at
/// most `0xfe`.
pub fn next_prefix(prefix: &[u8]) -> Vec<u8> {
    let mut next = prefix.to_vec();
    while let Some(last) = next.last_mut() {
        *last = last.wrapping_add(1);
        if *last != 0 {
            break;
        }
        next.pop();
    }
    next
}

/// Returns true if `prefix` may scope a view or the undo stack.
///
/// The sentinels reserve `0x00` and `0xff`, so a legal prefix is non-empty
/// and starts with a byte in `[0x01, 0xfe]`.
#[inline]
pub fn valid_prefix(prefix: &[u8]) -> bool {
    matches!(prefix.first(), Some(&b) if b != MIN_SENTINEL && b != MAX_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_key_layout() {
        let key = full_key(&[0x70], 0x1234, &[0x30, 0x40]);
        assert_eq!(
            key,
            vec![0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x12, 0x34, 0x30, 0x40]
        );
    }

    #[test]
    fn test_full_key_empty_user_key() {
        let key = full_key(&[0x70], 1, &[]);
        assert_eq!(key.len(), 9);
        assert_eq!(key[8], 1);
    }

    #[test]
    fn test_contract_order_preserved() {
        let a = full_key(&[0x70], 0x00ff, &[]);
        let b = full_key(&[0x70], 0x0100, &[]);
        assert!(a < b);
    }

    #[test]
    fn test_next_prefix_simple() {
        assert_eq!(next_prefix(&[0x70]), vec![0x71]);
        assert_eq!(next_prefix(&[0x70, 0x30]), vec![0x70, 0x31]);
    }

    #[test]
    fn test_next_prefix_carries() {
        assert_eq!(next_prefix(&[0x70, 0xff]), vec![0x71]);
        assert_eq!(next_prefix(&[0x70, 0xff, 0xff]), vec![0x71]);
    }

    #[test]
    fn test_next_prefix_unbounded() {
        assert_eq!(next_prefix(&[0xff, 0xff]), Vec::<u8>::new());
        assert_eq!(next_prefix(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_valid_prefix() {
        assert!(valid_prefix(&[0x01]));
        assert!(valid_prefix(&[0xfe, 0x00]));
        assert!(!valid_prefix(&[]));
        assert!(!valid_prefix(&[0x00, 0x10]));
        assert!(!valid_prefix(&[0xff]));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn next_prefix_bounds_the_range(
            first in 0x01u8..=0xfe,
            rest in prop::collection::vec(any::<u8>(), 0..8),
            suffix in prop::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut prefix = vec![first];
            prefix.extend_from_slice(&rest);
            let next = next_prefix(&prefix);
            prop_assert!(!next.is_empty());

            let mut inside = prefix.clone();
            inside.extend_from_slice(&suffix);
            prop_assert!(inside < next);
            prop_assert!(prefix < next);
        }

        #[test]
        fn full_key_is_ordered_by_contract(
            prefix in prop::collection::vec(0x01u8..=0xfe, 1..4),
            a in any::<u64>(),
            b in any::<u64>(),
        ) {
            let ka = full_key(&prefix, a, &[]);
            let kb = full_key(&prefix, b, &[]);
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }
    }
}
