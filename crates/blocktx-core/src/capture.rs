// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The capture supplier: per-unit log of transactions and its effect frames.
//!
//! Producers call the `log_*` family while gameplay logic runs. Each call
//! either merges the new data into an already captured node (absorption or an
//! accept hook) or appends a node to the active chain. Pipeline steps redirect
//! logging into nested side-effect chains with [`CaptureSupplier::push_effect`].
//!
//! At the end of the unit the driver calls
//! [`CaptureSupplier::process_transactions`] (see `process.rs`).

use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::cause::CauseEntry;
use crate::chain::{Arena, Chain, ChainOwner, MutationNode, SideEffectChain};
use crate::error::CaptureError;
use crate::event::{CraftingPreview, CraftingRecord};
use crate::ident::{EffectId, EffectTag, TxnId};
use crate::kinds::{EntityDrops, TileAddition, TileRemoval, TileReplacement};
use crate::mutation::{Mutation, UnitContext};
use crate::world::{
    BlockPos, CraftingGrid, EntitySnapshot, ItemStack, PlayerId, RecipeId, TileEntity, WorldAccess,
    WorldId,
};

/// Tag of the effect frame opened under an [`EntityDrops`] node.
pub const ENTITY_DROPS_EFFECT: EffectTag = EffectTag("entity_performing_drops");

/// Tag of the effect frame a block opens while it computes its drops.
pub const PREPARE_BLOCK_DROPS_EFFECT: EffectTag = EffectTag("prepare_block_drops");

/// Where a logged transaction ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logged {
    /// Linked as a new node.
    Appended(TxnId),
    /// Merged into this existing node.
    Absorbed(TxnId),
}

impl Logged {
    /// The node now holding the transaction.
    #[must_use]
    pub fn id(self) -> TxnId {
        match self {
            Self::Appended(id) | Self::Absorbed(id) => id,
        }
    }
}

/// Owns every transaction captured during one unit of logic.
pub struct CaptureSupplier<W> {
    pub(crate) unit: UnitContext,
    pub(crate) arena: Arena<W>,
    pub(crate) top: Chain,
    pub(crate) active: Option<EffectId>,
    pub(crate) generation: u64,
    pub(crate) next_event: u64,
}

impl<W> CaptureSupplier<W> {
    /// Creates an empty supplier bound to `unit`.
    pub fn new(unit: UnitContext) -> Self {
        Self {
            unit,
            arena: Arena::default(),
            top: Chain::default(),
            active: None,
            generation: 0,
            next_event: 1,
        }
    }

    /// Context this supplier is bound to.
    #[must_use]
    pub fn unit(&self) -> &UnitContext {
        &self.unit
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }

    /// The top-level chain.
    #[must_use]
    pub fn top_level(&self) -> Chain {
        self.top
    }

    /// Number of top-level nodes.
    #[must_use]
    pub fn top_level_len(&self) -> usize {
        self.arena.forward(self.top).count()
    }

    /// Top-level node ids, oldest first.
    #[must_use]
    pub fn top_level_ids(&self) -> Vec<TxnId> {
        self.arena.forward(self.top).collect()
    }

    /// Total number of captured nodes at every depth.
    #[must_use]
    pub fn captured_len(&self) -> usize {
        self.arena.len()
    }

    /// Looks up a captured node.
    #[must_use]
    pub fn node(&self, id: TxnId) -> Option<&MutationNode<W>> {
        self.arena.get(id)
    }

    /// Looks up a side-effect chain.
    #[must_use]
    pub fn side_effect(&self, id: EffectId) -> Option<&SideEffectChain> {
        self.arena.effect_get(id)
    }

    /// Node ids of a side-effect chain, oldest first.
    #[must_use]
    pub fn effect_ids(&self, id: EffectId) -> Vec<TxnId> {
        self.arena
            .effect_get(id)
            .map(|effect| self.arena.forward(effect.chain).collect())
            .unwrap_or_default()
    }

    /// The effect frame currently receiving new nodes, if any.
    #[must_use]
    pub fn active_effect(&self) -> Option<EffectId> {
        self.active
    }

    /// Every captured node in depth-first capture order: each node is followed
    /// by the contents of its side-effect chains.
    #[must_use]
    pub fn iter_deep(&self) -> Vec<TxnId> {
        let mut out = Vec::with_capacity(self.arena.len());
        self.arena.deep(self.top, &mut out);
        out
    }

    /// [`Self::iter_deep`] reversed: newest first.
    #[must_use]
    pub fn iter_deep_rev(&self) -> Vec<TxnId> {
        let mut out = self.iter_deep();
        out.reverse();
        out
    }

    /// Drops all captured state and the active effect frame.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.top = Chain::default();
        self.active = None;
        self.generation += 1;
    }

    /// [`Self::clear`] plus restarting event numbering. Idempotent.
    pub fn reset(&mut self) {
        self.clear();
        self.next_event = 1;
    }

    /// Captures a transaction.
    ///
    /// The first node always becomes the top-level head. Afterwards an
    /// absorbable node is offered to the active chain newest first; if no
    /// existing node absorbs it, it is appended to the active chain.
    pub fn log_transaction<M>(&mut self, transaction: M) -> Option<TxnId>
    where
        M: Mutation<W> + 'static,
    {
        self.log_boxed(Box::new(transaction))
    }

    /// [`Self::log_transaction`] for an already boxed mutation. Returns the id
    /// of the appended node, or `None` when it was absorbed.
    pub fn log_boxed(&mut self, transaction: Box<dyn Mutation<W>>) -> Option<TxnId> {
        match self.record_boxed(transaction) {
            Logged::Appended(id) => Some(id),
            Logged::Absorbed(_) => None,
        }
    }

    /// Like [`Self::log_transaction`], but also names the absorbing node.
    ///
    /// Producers that open effect frames for the transaction they just logged
    /// parent those frames on [`Logged::id`].
    pub fn record_transaction<M>(&mut self, transaction: M) -> Logged
    where
        M: Mutation<W> + 'static,
    {
        self.record_boxed(Box::new(transaction))
    }

    fn record_boxed(&mut self, transaction: Box<dyn Mutation<W>>) -> Logged {
        if self.top.is_empty() {
            let id = self
                .arena
                .append(&mut self.top, ChainOwner::TopLevel, transaction);
            trace!(txn = %id, kind = ?self.arena.node(id).mutation.kind(), "captured head");
            return Logged::Appended(id);
        }
        if transaction.can_be_absorbed() {
            if let Some(into) = self.try_absorb(transaction.as_ref()) {
                return Logged::Absorbed(into);
            }
        }
        let owner = self.active.map_or(ChainOwner::TopLevel, ChainOwner::Effect);
        let id = self.arena.append(&mut self.top, owner, transaction);
        trace!(txn = %id, owner = ?owner, kind = ?self.arena.node(id).mutation.kind(), "captured");
        Logged::Appended(id)
    }

    fn active_chain(&self) -> Chain {
        match self.active {
            Some(effect) => self.arena.effect(effect).chain,
            None => self.top,
        }
    }

    fn try_absorb(&mut self, incoming: &dyn Mutation<W>) -> Option<TxnId> {
        let limit = self.unit.config.absorb_scan_limit.unwrap_or(usize::MAX);
        let candidates: Vec<TxnId> = self
            .arena
            .backward(self.active_chain())
            .take(limit)
            .collect();
        for id in candidates {
            if self.arena.node_mut(id).mutation.absorb(&self.unit, incoming) {
                trace!(into = %id, kind = ?incoming.kind(), "absorbed");
                return Some(id);
            }
        }
        None
    }

    /// Candidates for accept hooks per the configured depth. Each candidate
    /// comes before its own side effects; siblings go newest first.
    fn accept_candidates(&self) -> Vec<TxnId> {
        let mut out = Vec::new();
        if let Some(tail) = self.top.tail() {
            self.collect_candidates(tail, self.unit.config.accept_search.max_depth(), &mut out);
        }
        out
    }

    fn collect_candidates(&self, id: TxnId, depth: usize, out: &mut Vec<TxnId>) {
        out.push(id);
        if depth == 0 {
            return;
        }
        for effect in self.arena.node(id).side_effects.iter().rev() {
            let chain = self.arena.effect(*effect).chain;
            for nested in self.arena.backward(chain) {
                self.collect_candidates(nested, depth - 1, out);
            }
        }
    }

    fn offer<F>(&mut self, mut accept: F) -> Option<TxnId>
    where
        F: FnMut(&mut dyn Mutation<W>) -> bool,
    {
        for id in self.accept_candidates() {
            if accept(self.arena.node_mut(id).mutation.as_mut()) {
                trace!(into = %id, "accepted");
                return Some(id);
            }
        }
        None
    }

    /// Records a tile appearing. A compatible captured node takes it;
    /// otherwise a standalone [`TileAddition`] is captured.
    pub fn log_tile_addition(&mut self, world: WorldId, tile: TileEntity) -> bool
    where
        W: WorldAccess,
    {
        if self
            .offer(|candidate| candidate.accept_tile_addition(world, &tile))
            .is_some()
        {
            return true;
        }
        self.log_transaction(TileAddition::new(world, tile));
        true
    }

    /// Records a tile disappearing. Returns false (capturing nothing) when
    /// there is no tile.
    pub fn log_tile_removal(&mut self, world: WorldId, tile: Option<TileEntity>) -> bool
    where
        W: WorldAccess,
    {
        let Some(tile) = tile else {
            return false;
        };
        if self
            .offer(|candidate| candidate.accept_tile_removal(world, &tile))
            .is_some()
        {
            return true;
        }
        self.log_transaction(TileRemoval::new(world, tile));
        true
    }

    /// Records a tile swap at `pos`. Returns false (capturing nothing) when
    /// there is no proposed tile.
    pub fn log_tile_replacement(
        &mut self,
        world: WorldId,
        pos: BlockPos,
        existing: Option<TileEntity>,
        proposed: Option<TileEntity>,
    ) -> bool
    where
        W: WorldAccess,
    {
        let Some(proposed) = proposed else {
            return false;
        };
        if self
            .offer(|candidate| {
                candidate.accept_tile_replacement(world, existing.as_ref(), &proposed)
            })
            .is_some()
        {
            return true;
        }
        self.log_transaction(TileReplacement::new(world, pos, existing, proposed));
        true
    }

    /// Records that `player`'s open container was set. Nothing is captured
    /// when no node takes it.
    pub fn log_container_set(&mut self, player: PlayerId) -> bool {
        self.offer(|candidate| candidate.accept_container_set(player))
            .is_some()
    }

    /// Records a completed craft into the enclosing container interaction.
    ///
    /// # Errors
    /// [`CaptureError::UnnestedCrafting`] when no captured node takes it.
    pub fn log_crafting(
        &mut self,
        player: PlayerId,
        crafted: Option<ItemStack>,
        grid: CraftingGrid,
        recipe: Option<RecipeId>,
    ) -> Result<TxnId, CaptureError> {
        let record = CraftingRecord {
            player,
            crafted,
            grid,
            recipe,
        };
        self.offer(|candidate| candidate.accept_crafting(&record))
            .ok_or(CaptureError::UnnestedCrafting)
    }

    /// Records a crafting preview into the enclosing container interaction.
    ///
    /// # Errors
    /// [`CaptureError::UnnestedCraftingPreview`] when no captured node takes it.
    pub fn log_crafting_preview(
        &mut self,
        player: PlayerId,
        grid: CraftingGrid,
        preview: Option<ItemStack>,
    ) -> Result<TxnId, CaptureError> {
        let preview = CraftingPreview {
            player,
            grid,
            preview,
        };
        self.offer(|candidate| candidate.accept_crafting_preview(&preview))
            .ok_or(CaptureError::UnnestedCraftingPreview)
    }

    /// Prepares capture of an entity's drops.
    ///
    /// If a captured node already claims this entity's drops, returns `None`
    /// and drops keep flowing into the current frame. Otherwise captures an
    /// [`EntityDrops`] node and opens an effect frame under it; the drops
    /// logged through the returned guard become its side effects.
    ///
    /// # Errors
    /// Never in practice: the drops node is captured first, so the frame
    /// always has a parent.
    pub fn log_entity_drops(
        &mut self,
        entity: EntitySnapshot,
        last_attacker: Option<CauseEntry>,
    ) -> Result<Option<EffectTransactor<'_, W>>, CaptureError>
    where
        W: WorldAccess,
    {
        let id = entity.id;
        if self
            .offer(|candidate| candidate.accept_entity_drops(id))
            .is_some()
        {
            return Ok(None);
        }
        self.log_transaction(EntityDrops::new(entity, last_attacker));
        self.push_effect(ENTITY_DROPS_EFFECT).map(Some)
    }

    /// Redirects subsequent logging into a new side-effect chain.
    ///
    /// The parent is the newest node of the active chain; when the active
    /// nested chain is still empty, the parent of the active frame; with no
    /// active frame, the top-level tail. The previous frame comes back when
    /// the returned guard drops.
    ///
    /// # Errors
    /// [`CaptureError::NoParentTransaction`] when nothing has been captured.
    pub fn push_effect(&mut self, effect: EffectTag) -> Result<EffectTransactor<'_, W>, CaptureError> {
        let parent = match self.active {
            Some(active) => {
                let frame = self.arena.effect(active);
                frame.chain.tail().unwrap_or(frame.parent)
            }
            None => self.top.tail().ok_or(CaptureError::NoParentTransaction)?,
        };
        Ok(self.open_frame(parent, effect))
    }

    /// Redirects subsequent logging into a new side-effect chain under
    /// `parent`, whatever the active chain currently ends with.
    ///
    /// # Errors
    /// [`CaptureError::UnknownParent`] when `parent` is not a captured node.
    pub fn push_effect_under(
        &mut self,
        parent: TxnId,
        effect: EffectTag,
    ) -> Result<EffectTransactor<'_, W>, CaptureError> {
        if self.arena.get(parent).is_none() {
            return Err(CaptureError::UnknownParent(parent));
        }
        Ok(self.open_frame(parent, effect))
    }

    /// Opens a [`PREPARE_BLOCK_DROPS_EFFECT`] frame under the newest node.
    /// Close it with [`EffectTransactor::complete_block_drops`].
    ///
    /// # Errors
    /// [`CaptureError::NoParentTransaction`] when nothing has been captured.
    pub fn prepare_block_drops(&mut self) -> Result<EffectTransactor<'_, W>, CaptureError> {
        self.push_effect(PREPARE_BLOCK_DROPS_EFFECT)
    }

    /// Tag of the active effect frame, if any.
    #[must_use]
    pub fn active_effect_tag(&self) -> Option<EffectTag> {
        self.active.map(|id| self.arena.effect(id).effect)
    }

    fn open_frame(&mut self, parent: TxnId, effect: EffectTag) -> EffectTransactor<'_, W> {
        let id = self.arena.open_effect(parent, effect);
        let previous = self.active.replace(id);
        let generation = self.generation;
        trace!(effect = effect.name(), parent = %parent, frame = %id, "pushed effect");
        EffectTransactor {
            generation,
            supplier: self,
            previous,
            frame: id,
        }
    }

    fn pop_effect(&mut self, frame: EffectId, previous: Option<EffectId>, generation: u64) {
        if generation != self.generation {
            // Cleared while the frame was open; nothing to restore.
            self.active = None;
            return;
        }
        trace!(frame = %frame, "popped effect");
        self.active = previous;
    }
}

impl<W> fmt::Debug for CaptureSupplier<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSupplier")
            .field("phase", &self.unit.phase)
            .field("head", &self.top.head())
            .field("tail", &self.top.tail())
            .field("effect", &self.active)
            .field("captured", &self.arena.len())
            .finish()
    }
}

/// Scoped handle over an open effect frame.
///
/// Derefs to the supplier so nested producers log through it. Dropping the
/// handle restores the frame that was active before it was pushed, on every
/// exit path including `?` and unwinding.
pub struct EffectTransactor<'a, W> {
    supplier: &'a mut CaptureSupplier<W>,
    previous: Option<EffectId>,
    frame: EffectId,
    generation: u64,
}

impl<W> EffectTransactor<'_, W> {
    /// The frame this handle opened.
    #[must_use]
    pub fn frame(&self) -> EffectId {
        self.frame
    }

    /// Closes the frame now. Same as dropping the handle.
    pub fn pop(self) {}

    /// Closes the frame if the active one is a block-drops frame. Otherwise
    /// hands the guard back still open.
    #[must_use]
    pub fn complete_block_drops(self) -> Option<Self> {
        if self.supplier.active_effect_tag() == Some(PREPARE_BLOCK_DROPS_EFFECT) {
            trace!(frame = %self.frame, "block drops complete");
            return None;
        }
        Some(self)
    }
}

impl<W> Deref for EffectTransactor<'_, W> {
    type Target = CaptureSupplier<W>;

    fn deref(&self) -> &Self::Target {
        self.supplier
    }
}

impl<W> DerefMut for EffectTransactor<'_, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.supplier
    }
}

impl<W> Drop for EffectTransactor<'_, W> {
    fn drop(&mut self) {
        self.supplier
            .pop_effect(self.frame, self.previous, self.generation);
    }
}
