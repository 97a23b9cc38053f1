// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena-backed doubly linked chains of captured transactions.
//!
//! Nodes are stored in a flat arena and linked by [`TxnId`] handles rather than
//! references. The top-level chain and every side-effect chain are plain
//! head/tail pairs over that arena, which keeps parent/child back-links free of
//! ownership cycles.
//!
//! Invariants:
//! - a node is linked into exactly one chain, once;
//! - `head.prev` and `tail.next` are `None`;
//! - following `next` from `head` reaches `tail` without revisiting a node.

use crate::ident::{EffectId, EffectTag, TxnId};
use crate::mutation::Mutation;

/// Head/tail pair over the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chain {
    head: Option<TxnId>,
    tail: Option<TxnId>,
}

impl Chain {
    /// First node, if any.
    #[must_use]
    pub fn head(&self) -> Option<TxnId> {
        self.head
    }

    /// Last node, if any.
    #[must_use]
    pub fn tail(&self) -> Option<TxnId> {
        self.tail
    }

    /// Returns true when no node has been linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Which chain a node was linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOwner {
    /// The supplier's top-level chain.
    TopLevel,
    /// A side-effect chain.
    Effect(EffectId),
}

/// One captured transaction plus its bookkeeping.
#[derive(Debug)]
pub struct MutationNode<W> {
    pub(crate) mutation: Box<dyn Mutation<W>>,
    pub(crate) cancelled: bool,
    pub(crate) restored: bool,
    pub(crate) side_effects: Vec<EffectId>,
    pub(crate) owner: ChainOwner,
    pub(crate) prev: Option<TxnId>,
    pub(crate) next: Option<TxnId>,
}

impl<W> MutationNode<W> {
    /// The node's capabilities.
    #[must_use]
    pub fn mutation(&self) -> &dyn Mutation<W> {
        self.mutation.as_ref()
    }

    /// Whether the node was cancelled during processing.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the node's restore ran.
    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Side-effect chains in the order they were opened.
    #[must_use]
    pub fn side_effects(&self) -> &[EffectId] {
        &self.side_effects
    }

    /// Chain this node is linked into.
    #[must_use]
    pub fn owner(&self) -> ChainOwner {
        self.owner
    }

    /// Previous node in the same chain.
    #[must_use]
    pub fn prev(&self) -> Option<TxnId> {
        self.prev
    }

    /// Next node in the same chain.
    #[must_use]
    pub fn next(&self) -> Option<TxnId> {
        self.next
    }
}

/// A nested chain produced while a pipeline step of `parent` ran.
#[derive(Debug, Clone, Copy)]
pub struct SideEffectChain {
    /// Step that opened the chain.
    pub effect: EffectTag,
    /// Node the chain hangs under.
    pub parent: TxnId,
    /// Nodes captured while the step ran.
    pub chain: Chain,
}

/// Flat storage for every node and side-effect chain of one unit.
#[derive(Debug)]
pub(crate) struct Arena<W> {
    nodes: Vec<MutationNode<W>>,
    effects: Vec<SideEffectChain>,
}

impl<W> Default for Arena<W> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            effects: Vec::new(),
        }
    }
}

impl<W> Arena<W> {
    pub(crate) fn node(&self, id: TxnId) -> &MutationNode<W> {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: TxnId) -> &mut MutationNode<W> {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn get(&self, id: TxnId) -> Option<&MutationNode<W>> {
        self.nodes.get(id.index())
    }

    pub(crate) fn effect(&self, id: EffectId) -> &SideEffectChain {
        &self.effects[id.index()]
    }

    pub(crate) fn effect_get(&self, id: EffectId) -> Option<&SideEffectChain> {
        self.effects.get(id.index())
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.effects.clear();
    }

    /// Stores a node without linking it anywhere yet.
    pub(crate) fn alloc(&mut self, mutation: Box<dyn Mutation<W>>, owner: ChainOwner) -> TxnId {
        let id = TxnId::from_index(self.nodes.len());
        self.nodes.push(MutationNode {
            mutation,
            cancelled: false,
            restored: false,
            side_effects: Vec::new(),
            owner,
            prev: None,
            next: None,
        });
        id
    }

    /// Links an allocated node at the end of `chain`.
    pub(crate) fn push_back(&mut self, chain: &mut Chain, id: TxnId) {
        let prev = chain.tail;
        {
            let node = self.node_mut(id);
            node.prev = prev;
            node.next = None;
        }
        match prev {
            Some(tail) => self.node_mut(tail).next = Some(id),
            None => chain.head = Some(id),
        }
        chain.tail = Some(id);
    }

    /// Allocates a node and appends it to the chain owned by `owner`.
    pub(crate) fn append(
        &mut self,
        top: &mut Chain,
        owner: ChainOwner,
        mutation: Box<dyn Mutation<W>>,
    ) -> TxnId {
        let id = self.alloc(mutation, owner);
        match owner {
            ChainOwner::TopLevel => self.push_back(top, id),
            ChainOwner::Effect(effect) => {
                let mut chain = self.effects[effect.index()].chain;
                self.push_back(&mut chain, id);
                self.effects[effect.index()].chain = chain;
            }
        }
        id
    }

    /// Opens an empty side-effect chain under `parent`.
    pub(crate) fn open_effect(&mut self, parent: TxnId, effect: EffectTag) -> EffectId {
        let id = EffectId::from_index(self.effects.len());
        self.effects.push(SideEffectChain {
            effect,
            parent,
            chain: Chain::default(),
        });
        self.node_mut(parent).side_effects.push(id);
        id
    }

    /// Nodes of `chain`, head to tail.
    pub(crate) fn forward(&self, chain: Chain) -> Walk<'_, W> {
        Walk {
            arena: self,
            cursor: chain.head,
            reverse: false,
        }
    }

    /// Nodes of `chain`, tail to head.
    pub(crate) fn backward(&self, chain: Chain) -> Walk<'_, W> {
        Walk {
            arena: self,
            cursor: chain.tail,
            reverse: true,
        }
    }

    /// Depth-first ids starting at `chain`: each node is followed by the
    /// contents of its side-effect chains in opening order.
    pub(crate) fn deep(&self, chain: Chain, out: &mut Vec<TxnId>) {
        for id in self.forward(chain) {
            out.push(id);
            for effect in &self.node(id).side_effects {
                self.deep(self.effect(*effect).chain, out);
            }
        }
    }
}

/// Iterator over one chain's node ids.
pub(crate) struct Walk<'a, W> {
    arena: &'a Arena<W>,
    cursor: Option<TxnId>,
    reverse: bool,
}

impl<W> Iterator for Walk<'_, W> {
    type Item = TxnId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        let node = self.arena.node(current);
        self.cursor = if self.reverse { node.prev } else { node.next };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::cause::Cause;
    use crate::event::{EventPayload, GameEvent, TransactionKind};
    use crate::mutation::UnitContext;

    #[derive(Debug)]
    struct Marker;

    impl Mutation<()> for Marker {
        fn kind(&self) -> TransactionKind {
            TransactionKind::Custom("marker")
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn starts_new_batch(&self, _: &UnitContext, _: &dyn Mutation<()>) -> bool {
            true
        }
        fn generate_event(
            &self,
            _: &UnitContext,
            _: &(),
            _: Option<&dyn Mutation<()>>,
            _: &[&dyn Mutation<()>],
            _: &Cause,
        ) -> Option<EventPayload> {
            None
        }
        fn restore(&mut self, _: &UnitContext, _: &mut (), _: &GameEvent, _: &Cause) {}
    }

    #[test]
    fn push_back_links_both_directions() {
        let mut arena: Arena<()> = Arena::default();
        let mut top = Chain::default();
        let a = arena.append(&mut top, ChainOwner::TopLevel, Box::new(Marker));
        let b = arena.append(&mut top, ChainOwner::TopLevel, Box::new(Marker));
        let c = arena.append(&mut top, ChainOwner::TopLevel, Box::new(Marker));

        assert_eq!(top.head(), Some(a));
        assert_eq!(top.tail(), Some(c));
        assert_eq!(arena.node(a).prev(), None);
        assert_eq!(arena.node(b).prev(), Some(a));
        assert_eq!(arena.node(c).next(), None);
        assert_eq!(arena.forward(top).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(arena.backward(top).collect::<Vec<_>>(), vec![c, b, a]);
    }

    #[test]
    fn deep_walk_visits_effects_after_their_parent() {
        let mut arena: Arena<()> = Arena::default();
        let mut top = Chain::default();
        let a = arena.append(&mut top, ChainOwner::TopLevel, Box::new(Marker));
        let effect = arena.open_effect(a, EffectTag("neighbors"));
        let nested = arena.append(&mut top, ChainOwner::Effect(effect), Box::new(Marker));
        let b = arena.append(&mut top, ChainOwner::TopLevel, Box::new(Marker));

        let mut order = Vec::new();
        arena.deep(top, &mut order);
        assert_eq!(order, vec![a, nested, b]);
        assert_eq!(arena.effect(effect).parent, a);
        assert_eq!(arena.node(nested).owner(), ChainOwner::Effect(effect));
    }
}
