// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Contract-scoped access to a sub-keyspace.

use crate::error::KvError;
use crate::session::WriteSession;
use crate::storage::key::{full_key, valid_prefix};

use super::iter::ViewIterator;

/// A sub-keyspace of the store, addressed per contract.
///
/// Every operation works on the composite key
/// `view_prefix ‖ be(contract) ‖ user_key` and goes through the bound write
/// session, so uncommitted session state is visible.
pub struct View<'a> {
    session: &'a WriteSession,
    prefix: Vec<u8>,
}

impl<'a> View<'a> {
    /// Binds a view to a session.
    ///
    /// The prefix must be non-empty and start with a byte in `[0x01, 0xfe]`;
    /// the sentinels reserve `0x00` and `0xff`.
    pub fn new(session: &'a WriteSession, prefix: Vec<u8>) -> Result<Self, KvError> {
        if !valid_prefix(&prefix) {
            return Err(KvError::Programming(
                "view prefix must be non-empty and start with a byte in 0x01..=0xfe",
            ));
        }
        Ok(Self { session, prefix })
    }

    /// The view's key prefix.
    #[inline]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Reads the session-visible value for a contract-scoped key.
    pub fn get(&self, contract: u64, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.session.get(&full_key(&self.prefix, contract, key))
    }

    /// Sets a contract-scoped key in the session.
    pub fn set(&self, contract: u64, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.session.set(full_key(&self.prefix, contract, key), value)
    }

    /// Erases a contract-scoped key in the session.
    pub fn erase(&self, contract: u64, key: &[u8]) -> Result<(), KvError> {
        self.session.erase(full_key(&self.prefix, contract, key))
    }

    /// Returns an iterator over the contract's keys that start with
    /// `user_prefix`. The iterator starts in the end position.
    pub fn iter(&self, contract: u64, user_prefix: &[u8]) -> Result<ViewIterator<'a>, KvError> {
        ViewIterator::new(self.session, &self.prefix, contract, user_prefix)
    }
}
