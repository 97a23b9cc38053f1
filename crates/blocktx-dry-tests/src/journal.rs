// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared ordered log of what doubles observed.

use std::cell::RefCell;
use std::rc::Rc;

/// Append-only log shared between doubles of one test.
///
/// Clones share the same log, so a dispatcher and the mutations it sees can
/// interleave their entries and a test can assert the global order.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Snapshot of every entry in order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Entries starting with `prefix`, with the prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_owned))
            .collect()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.borrow().iter().position(|e| e == entry)
    }
}
