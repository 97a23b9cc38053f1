// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the external listener layer.

use crate::error::DispatchError;
use crate::event::{GameEvent, TransactionKind};

/// Receives generated events and may cancel them.
///
/// Listeners observe the world before any rollback: every batch of a unit is
/// dispatched before the first restore runs.
pub trait EventDispatcher {
    /// Delivers one event. Listeners cancel through
    /// [`GameEvent::set_cancelled`] or veto single block transitions through
    /// [`GameEvent::invalidate_block`].
    fn dispatch(&mut self, event: &mut GameEvent) -> Result<(), DispatchError>;

    /// Delivers the final (post-rollback) view of every event of one kind,
    /// once per kind after processing. Defaults to doing nothing.
    fn dispatch_post(
        &mut self,
        _kind: TransactionKind,
        _events: &[GameEvent],
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

impl<D: EventDispatcher + ?Sized> EventDispatcher for &mut D {
    fn dispatch(&mut self, event: &mut GameEvent) -> Result<(), DispatchError> {
        (**self).dispatch(event)
    }

    fn dispatch_post(
        &mut self,
        kind: TransactionKind,
        events: &[GameEvent],
    ) -> Result<(), DispatchError> {
        (**self).dispatch_post(kind, events)
    }
}
