// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena handles for captured transactions and side-effect chains.

/// Stable handle to a captured mutation node.
///
/// Handles index into the supplier's arena and stay valid until the supplier
/// is cleared or reset. They are never reused within one unit of logic, so a
/// handle observed before processing still names the same node afterwards.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct TxnId(u32);

impl TxnId {
    pub(crate) fn from_index(index: usize) -> Self {
        // Arena growth is bounded by one tick of gameplay; u32 is ample.
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for TxnId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// Stable handle to a side-effect chain attached under a parent node.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct EffectId(u32);

impl EffectId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for EffectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Identifier assigned to each generated event, unique within one supplier
/// lifetime (restarts at 1 after [`crate::CaptureSupplier::reset`]).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct EventId(u64);

impl EventId {
    /// Constructs an `EventId` from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Label for the pipeline step that opened a side-effect chain.
///
/// Tags are static names such as `"set_block_state"`; they only serve
/// diagnostics and equality checks by producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectTag(pub &'static str);

impl EffectTag {
    /// Returns the tag name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}
