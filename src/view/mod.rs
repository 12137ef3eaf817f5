// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Prefix-scoped views over a write session.
//!
//! A [`View`] confines reads, writes, and iteration to one sub-keyspace and
//! one contract at a time. Its iterator merges the session cache with the
//! on-disk data and detects positions invalidated by erases.

mod iter;
mod view;

pub use iter::ViewIterator;
pub use view::View;
