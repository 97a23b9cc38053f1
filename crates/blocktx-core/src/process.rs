// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-of-unit processing: dispatch every batch, then roll back what was
//! cancelled.
//!
//! Processing runs in three passes over the batched events:
//! 1. forward: dispatch each event in generation order, propagating
//!    cancellation from parents to nested batches and from events to members;
//! 2. backward: restore cancelled nodes newest first, each at most once;
//! 3. fan-out: hand the final view of every event to the dispatcher, grouped
//!    by kind.

use tracing::{debug, instrument};

use crate::batch::{BatchedEvent, Batcher};
use crate::capture::CaptureSupplier;
use crate::cause::CauseStack;
use crate::chain::Arena;
use crate::dispatch::EventDispatcher;
use crate::error::CaptureError;
use crate::event::{GameEvent, TransactionKind};
use crate::ident::TxnId;
use crate::mutation::BatchMember;

/// Result of [`CaptureSupplier::process_transactions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Nothing was captured.
    Empty,
    /// Every dispatched event went through.
    Committed {
        /// Number of events generated.
        batches: usize,
    },
    /// At least one node was cancelled and restored.
    RolledBack {
        /// Number of events generated, including ones cancelled with
        /// their parent without reaching the dispatcher.
        batches: usize,
        /// Number of nodes whose restore ran.
        restored: usize,
    },
}

impl ProcessOutcome {
    /// Returns true when something was captured and nothing was cancelled.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

impl<W> CaptureSupplier<W> {
    /// Batches, dispatches and, where cancelled, restores everything captured
    /// in this unit.
    ///
    /// Every event is dispatched before the first restore runs. Captured
    /// nodes stay in place afterwards (with their `cancelled` and `restored`
    /// flags set) until [`CaptureSupplier::clear`] is called.
    ///
    /// # Errors
    /// Returns [`CaptureError::Dispatch`] when the dispatcher fails; nothing
    /// is restored in that case.
    #[instrument(level = "debug", skip_all, fields(phase = %self.unit.phase))]
    pub fn process_transactions<D>(
        &mut self,
        world: &mut W,
        dispatcher: &mut D,
    ) -> Result<ProcessOutcome, CaptureError>
    where
        D: EventDispatcher + ?Sized,
    {
        let Some(head) = self.top.head() else {
            debug!("nothing captured");
            return Ok(ProcessOutcome::Empty);
        };
        let mut causes = self.unit.cause_stack();
        let mut batched = {
            let mut batcher = Batcher::new(&self.arena, &self.unit, &*world, &mut self.next_event);
            batcher.batch_chain(head, None, &mut causes);
            batcher.finish()
        };
        debug!(batches = batched.len(), nodes = self.arena.len(), "batched");

        let mut cancelled_any = false;
        for batch in &mut batched {
            cancelled_any |= self.dispatch_batch(batch, world, dispatcher)?;
        }

        let restored = if cancelled_any {
            self.roll_back(&batched, world, &mut causes)
        } else {
            0
        };

        let dispatched = batched.len();
        fan_out(batched, dispatcher)?;

        if cancelled_any {
            debug!(batches = dispatched, restored, "rolled back");
            Ok(ProcessOutcome::RolledBack {
                batches: dispatched,
                restored,
            })
        } else {
            debug!(batches = dispatched, "committed");
            Ok(ProcessOutcome::Committed {
                batches: dispatched,
            })
        }
    }

    /// Dispatches one batch and applies the cancellation outcome to its
    /// members. Returns true if any member ended up cancelled.
    fn dispatch_batch<D>(
        &mut self,
        batch: &mut BatchedEvent,
        world: &mut W,
        dispatcher: &mut D,
    ) -> Result<bool, CaptureError>
    where
        D: EventDispatcher + ?Sized,
    {
        let inherited = self.arena.node(batch.decider).cancelled
            || batch
                .parent
                .is_some_and(|parent| self.arena.node(parent).cancelled);
        if inherited {
            batch.event.set_cancelled(true);
        } else {
            dispatcher.dispatch(&mut batch.event)?;
        }

        let mut cancelled_any = false;
        if batch.event.is_cancelled() {
            cancelled_any |= mark_cancelled(&mut self.arena, &batch.members);
        } else {
            let dependents = {
                let members: Vec<BatchMember<'_, W>> = batch
                    .members
                    .iter()
                    .map(|id| {
                        let node = self.arena.node(*id);
                        BatchMember {
                            mutation: node.mutation(),
                            cancelled: node.cancelled,
                        }
                    })
                    .collect();
                self.arena
                    .node(batch.decider)
                    .mutation()
                    .cancel_dependents(&batch.event, &members)
            };
            let targets: Vec<TxnId> = dependents
                .into_iter()
                .filter_map(|index| batch.members.get(index).copied())
                .collect();
            cancelled_any |= mark_cancelled(&mut self.arena, &targets);
        }

        for id in &batch.members {
            let node = self.arena.node_mut(*id);
            if node.cancelled {
                cancelled_any = true;
                node.mutation.on_cancelled(&mut batch.event);
            } else {
                node.mutation.post_process(&self.unit, world, &batch.event);
            }
        }
        debug!(
            event = batch.event.id().value(),
            kind = ?batch.event.kind(),
            cancelled = batch.event.is_cancelled(),
            inherited,
            "dispatched"
        );
        Ok(cancelled_any)
    }

    /// Restores cancelled nodes, newest batch first and newest member first.
    fn roll_back(
        &mut self,
        batched: &[BatchedEvent],
        world: &mut W,
        causes: &mut CauseStack,
    ) -> usize {
        let mut restored = 0;
        for batch in batched.iter().rev() {
            let mut frame = causes.push_frame();
            {
                let parent = batch.parent.map(|id| self.arena.node(id).mutation());
                self.arena
                    .node(batch.decider)
                    .mutation()
                    .contribute_cause(&self.unit, parent, &mut frame);
            }
            let cause = frame.current_cause();
            for id in batch.members.iter().rev() {
                let node = self.arena.node_mut(*id);
                if !node.cancelled || node.restored {
                    continue;
                }
                node.restored = true;
                node.mutation.restore(&self.unit, world, &batch.event, &cause);
                restored += 1;
            }
        }
        restored
    }
}

/// Hands every event to `dispatch_post`, grouped by kind in first-seen order.
fn fan_out<D>(batched: Vec<BatchedEvent>, dispatcher: &mut D) -> Result<(), CaptureError>
where
    D: EventDispatcher + ?Sized,
{
    let mut groups: Vec<(TransactionKind, Vec<GameEvent>)> = Vec::new();
    for batch in batched {
        let kind = batch.event.kind();
        match groups.iter_mut().find(|(seen, _)| *seen == kind) {
            Some((_, events)) => events.push(batch.event),
            None => groups.push((kind, vec![batch.event])),
        }
    }
    for (kind, events) in &groups {
        dispatcher.dispatch_post(*kind, events)?;
    }
    Ok(())
}

fn mark_cancelled<W>(arena: &mut Arena<W>, ids: &[TxnId]) -> bool {
    let mut changed = false;
    for id in ids {
        let node = arena.node_mut(*id);
        if !node.cancelled {
            node.cancelled = true;
            changed = true;
        }
    }
    changed
}
