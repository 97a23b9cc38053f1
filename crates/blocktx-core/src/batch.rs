// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Grouping of captured chains into batches, and event generation per batch.
//!
//! A chain is walked head to tail with a *decider*: the first node of the
//! batch being accumulated. Each following node is offered to the decider's
//! `starts_new_batch` policy. A node that owns non-empty side-effect chains,
//! is unbatchable, or ends the chain closes the batch it belongs to. After a
//! batch's event is generated, the side-effect chains of its members are
//! batched recursively with the owning member as parent, so every nested
//! event follows the event of its parent.

use std::mem;

use tracing::{debug, trace};

use crate::cause::{CauseEntry, CauseStack};
use crate::chain::Arena;
use crate::event::GameEvent;
use crate::ident::{EventId, TxnId};
use crate::mutation::{Mutation, UnitContext};

/// One generated event and the nodes it covers.
#[derive(Debug)]
pub(crate) struct BatchedEvent {
    pub(crate) event: GameEvent,
    pub(crate) members: Vec<TxnId>,
    pub(crate) decider: TxnId,
    pub(crate) parent: Option<TxnId>,
}

/// Walks chains and produces [`BatchedEvent`]s in dispatch order.
pub(crate) struct Batcher<'a, W> {
    arena: &'a Arena<W>,
    unit: &'a UnitContext,
    world: &'a W,
    next_event: &'a mut u64,
    out: Vec<BatchedEvent>,
}

impl<'a, W> Batcher<'a, W> {
    pub(crate) fn new(
        arena: &'a Arena<W>,
        unit: &'a UnitContext,
        world: &'a W,
        next_event: &'a mut u64,
    ) -> Self {
        Self {
            arena,
            unit,
            world,
            next_event,
            out: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> Vec<BatchedEvent> {
        self.out
    }

    /// Batches the chain starting at `head`, whose nodes hang under `parent`.
    pub(crate) fn batch_chain(
        &mut self,
        head: TxnId,
        parent: Option<TxnId>,
        causes: &mut CauseStack,
    ) {
        let arena = self.arena;
        let mut pointer = Some(head);
        let mut decider: Option<TxnId> = None;
        let mut accumulated: Vec<TxnId> = Vec::new();

        while let Some(current) = pointer {
            let deciding = *decider.get_or_insert(current);
            let node = arena.node(current);
            if deciding != current
                && arena
                    .node(deciding)
                    .mutation()
                    .starts_new_batch(self.unit, node.mutation())
            {
                let members = mem::take(&mut accumulated);
                if !members.is_empty() {
                    self.generate(deciding, parent, members, causes);
                }
                // Re-examine `current` as the decider of a fresh batch.
                decider = Some(current);
                continue;
            }

            accumulated.push(current);
            let owns_effects = node
                .side_effects()
                .iter()
                .any(|effect| !arena.effect(*effect).chain.is_empty());
            if owns_effects || node.mutation().is_unbatchable() || node.next().is_none() {
                let members = mem::take(&mut accumulated);
                self.generate(current, parent, members, causes);
                decider = node.next();
            }
            pointer = node.next();
        }

        if let Some(first) = accumulated.first().copied() {
            self.generate(decider.unwrap_or(first), parent, accumulated, causes);
        }
    }

    fn generate(
        &mut self,
        decider: TxnId,
        parent: Option<TxnId>,
        members: Vec<TxnId>,
        causes: &mut CauseStack,
    ) {
        let arena = self.arena;
        let mut frame = causes.push_frame();
        let deciding = arena.node(decider).mutation();
        let parent_mutation = parent.map(|id| arena.node(id).mutation());
        deciding.contribute_cause(self.unit, parent_mutation, &mut frame);

        let batch: Vec<&dyn Mutation<W>> = members
            .iter()
            .map(|id| arena.node(*id).mutation())
            .collect();
        let cause = frame.current_cause();
        let generated = deciding.generate_event(self.unit, self.world, parent_mutation, &batch, &cause);

        let event_id = match generated {
            Some(payload) => {
                let id = EventId::from_raw(*self.next_event);
                *self.next_event += 1;
                let event = GameEvent::new(id, deciding.kind(), cause, payload);
                if self.unit.config.trace_batches {
                    debug!(
                        event = id.value(),
                        kind = ?event.kind(),
                        decider = %decider,
                        members = members.len(),
                        nested = parent.is_some(),
                        "batched"
                    );
                }
                self.out.push(BatchedEvent {
                    event,
                    members: members.clone(),
                    decider,
                    parent,
                });
                Some(id)
            }
            None => {
                trace!(decider = %decider, "event declined");
                None
            }
        };

        let mut event_pushed = false;
        for member in &members {
            let node = arena.node(*member);
            for effect in node.side_effects() {
                let Some(head) = arena.effect(*effect).chain.head() else {
                    continue;
                };
                if let (Some(id), false) = (event_id, event_pushed) {
                    frame.push_cause(CauseEntry::Event(id));
                    event_pushed = true;
                }
                self.batch_chain(head, Some(*member), &mut frame);
            }
        }
    }
}
