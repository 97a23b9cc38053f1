// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cell replacement.

use std::any::Any;

use tracing::{trace, warn};

use super::tile::TileReplacement;
use crate::cause::{Cause, CauseEntry, CauseStack, ContextKey};
use crate::event::{BlockTransition, EventPayload, GameEvent, TransactionKind};
use crate::mutation::{BatchMember, Mutation, UnitContext};
use crate::world::{BlockPos, BlockSnapshot, BlockState, TileEntity, WorldAccess, WorldId};

/// A cell changed from `original` to `replacement`.
///
/// Repeated changes of the same cell collapse into the first captured node,
/// which keeps the oldest original and the newest replacement. Tile changes
/// at the same cell that happen while the change applies are attached to it.
#[derive(Debug, Clone)]
pub struct BlockChange {
    world: WorldId,
    pos: BlockPos,
    original: BlockSnapshot,
    replacement: BlockState,
    added_tile: Option<TileEntity>,
    removed_tile: Option<TileEntity>,
    notifier: Option<CauseEntry>,
}

impl BlockChange {
    /// Describes a change of `pos` away from `original`.
    pub fn new(
        world: WorldId,
        pos: BlockPos,
        original: BlockSnapshot,
        replacement: BlockState,
    ) -> Self {
        Self {
            world,
            pos,
            original,
            replacement,
            added_tile: None,
            removed_tile: None,
            notifier: None,
        }
    }

    /// Records who notified the cell.
    #[must_use]
    pub fn with_notifier(mut self, notifier: CauseEntry) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// World of the cell.
    #[must_use]
    pub fn world_id(&self) -> WorldId {
        self.world
    }

    /// The changed cell.
    #[must_use]
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    /// Cell state and tile before the first captured change.
    #[must_use]
    pub fn original(&self) -> &BlockSnapshot {
        &self.original
    }

    /// State after the latest captured change.
    #[must_use]
    pub fn replacement(&self) -> BlockState {
        self.replacement
    }

    /// Tile attached while the change applied.
    #[must_use]
    pub fn added_tile(&self) -> Option<&TileEntity> {
        self.added_tile.as_ref()
    }

    /// Tile detached while the change applied.
    #[must_use]
    pub fn removed_tile(&self) -> Option<&TileEntity> {
        self.removed_tile.as_ref()
    }

    fn same_cell(&self, world: WorldId, pos: BlockPos) -> bool {
        self.world == world && self.pos == pos
    }

    fn transition(&self) -> BlockTransition {
        BlockTransition {
            pos: self.pos,
            original: self.original.state,
            replacement: self.replacement,
            valid: true,
        }
    }
}

impl<W: WorldAccess> Mutation<W> for BlockChange {
    fn kind(&self) -> TransactionKind {
        TransactionKind::BlockChange
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn world(&self) -> Option<WorldId> {
        Some(self.world)
    }

    fn can_be_absorbed(&self) -> bool {
        true
    }

    fn absorb(&mut self, _unit: &UnitContext, incoming: &dyn Mutation<W>) -> bool {
        let Some(other) = incoming.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if !self.same_cell(other.world, other.pos) {
            return false;
        }
        self.replacement = other.replacement;
        if other.added_tile.is_some() {
            self.added_tile.clone_from(&other.added_tile);
        }
        if self.removed_tile.is_none() {
            self.removed_tile.clone_from(&other.removed_tile);
        }
        true
    }

    fn accept_tile_addition(&mut self, world: WorldId, tile: &TileEntity) -> bool {
        if !self.same_cell(world, tile.pos) {
            return false;
        }
        self.added_tile = Some(tile.clone());
        true
    }

    fn accept_tile_removal(&mut self, world: WorldId, tile: &TileEntity) -> bool {
        if !self.same_cell(world, tile.pos) {
            return false;
        }
        if self.removed_tile.is_none() {
            self.removed_tile = Some(tile.clone());
        }
        true
    }

    fn accept_tile_replacement(
        &mut self,
        world: WorldId,
        existing: Option<&TileEntity>,
        proposed: &TileEntity,
    ) -> bool {
        if !self.same_cell(world, proposed.pos) {
            return false;
        }
        if self.removed_tile.is_none() {
            self.removed_tile = existing.cloned();
        }
        self.added_tile = Some(proposed.clone());
        true
    }

    fn starts_new_batch(&self, _unit: &UnitContext, next: &dyn Mutation<W>) -> bool {
        match next.kind() {
            TransactionKind::BlockChange | TransactionKind::TileReplacement => {
                next.world() != Some(self.world)
            }
            _ => true,
        }
    }

    fn contribute_cause(
        &self,
        _unit: &UnitContext,
        _parent: Option<&dyn Mutation<W>>,
        frame: &mut CauseStack,
    ) {
        frame.add_context(
            ContextKey::BlockTarget,
            CauseEntry::Block {
                world: self.world,
                pos: self.pos,
            },
        );
        if let Some(notifier) = &self.notifier {
            frame.add_context(ContextKey::Notifier, notifier.clone());
        }
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        world: &W,
        _parent: Option<&dyn Mutation<W>>,
        batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        if !world.is_loaded(self.world) {
            trace!(world = self.world.0, "world unloaded; declining block event");
            return None;
        }
        let transitions = batch
            .iter()
            .filter_map(|member| member.as_any().downcast_ref::<Self>())
            .map(Self::transition)
            .collect();
        Some(EventPayload::ChangeBlock {
            world: self.world,
            transitions,
        })
    }

    fn cancel_dependents(&self, event: &GameEvent, batch: &[BatchMember<'_, W>]) -> Vec<usize> {
        let mut cancelled = Vec::new();
        let mut dead_cells = Vec::new();
        for (index, member) in batch.iter().enumerate() {
            let Some(change) = member.mutation.as_any().downcast_ref::<Self>() else {
                continue;
            };
            let invalid = event
                .block_transition(change.pos)
                .is_some_and(|transition| !transition.valid);
            if invalid && !member.cancelled {
                cancelled.push(index);
            }
            if invalid || member.cancelled {
                dead_cells.push(change.pos);
            }
        }
        for (index, member) in batch.iter().enumerate() {
            let Some(tile) = member.mutation.as_any().downcast_ref::<TileReplacement>() else {
                continue;
            };
            if !member.cancelled && dead_cells.contains(&tile.pos()) {
                cancelled.push(index);
            }
        }
        cancelled
    }

    fn on_cancelled(&self, event: &mut GameEvent) {
        event.invalidate_block(self.pos);
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        let current = world.set_block(self.world, self.pos, self.original.state);
        if current != self.replacement {
            warn!(
                pos = ?self.pos,
                expected = self.replacement.0,
                found = current.0,
                "cell diverged before restore"
            );
        }
        world.set_tile(self.world, self.pos, self.original.tile.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{EntitySnapshot, ItemStack, PlayerId};

    struct Void;

    impl WorldAccess for Void {
        fn is_loaded(&self, _: WorldId) -> bool {
            true
        }
        fn block(&self, _: WorldId, _: BlockPos) -> BlockState {
            BlockState::AIR
        }
        fn set_block(&mut self, _: WorldId, _: BlockPos, _: BlockState) -> BlockState {
            BlockState::AIR
        }
        fn tile(&self, _: WorldId, _: BlockPos) -> Option<TileEntity> {
            None
        }
        fn set_tile(&mut self, _: WorldId, _: BlockPos, _: Option<TileEntity>) {}
        fn restore_entity(&mut self, _: &EntitySnapshot) {}
        fn set_slot(&mut self, _: PlayerId, _: u32, _: Option<ItemStack>) {}
    }

    fn change(pos: BlockPos, to: u32) -> BlockChange {
        BlockChange::new(
            WorldId(0),
            pos,
            BlockSnapshot {
                state: BlockState(1),
                tile: None,
            },
            BlockState(to),
        )
    }

    #[test]
    fn absorb_keeps_oldest_original_and_newest_replacement() {
        let unit = UnitContext::new("test");
        let pos = BlockPos::new(0, 64, 0);
        let mut first = change(pos, 2);
        let later = change(pos, 3);
        assert!(Mutation::<Void>::absorb(&mut first, &unit, &later));
        assert_eq!(first.replacement(), BlockState(3));
        assert_eq!(first.original().state, BlockState(1));

        let elsewhere = change(pos.offset(1, 0, 0), 4);
        assert!(!Mutation::<Void>::absorb(&mut first, &unit, &elsewhere));
    }

    #[test]
    fn tile_replacement_at_same_cell_is_attached() {
        let pos = BlockPos::new(3, 3, 3);
        let mut block = change(pos, 2);
        let old = TileEntity::new(pos, "chest", &b"old"[..]);
        let new = TileEntity::new(pos, "chest", &b"new"[..]);
        assert!(Mutation::<Void>::accept_tile_replacement(
            &mut block,
            WorldId(0),
            Some(&old),
            &new
        ));
        assert_eq!(block.removed_tile(), Some(&old));
        assert_eq!(block.added_tile(), Some(&new));
        assert!(!Mutation::<Void>::accept_tile_addition(
            &mut block,
            WorldId(1),
            &new
        ));
    }
}
