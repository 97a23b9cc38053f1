// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Standalone tile changes (no cell change took them).

use std::any::Any;

use crate::cause::Cause;
use crate::event::{EventPayload, GameEvent, TransactionKind};
use crate::mutation::{Mutation, UnitContext};
use crate::world::{BlockPos, TileEntity, WorldAccess, WorldId};

fn tile_event<W: WorldAccess>(
    world: &W,
    id: WorldId,
    pos: BlockPos,
    original: Option<&TileEntity>,
    replacement: Option<&TileEntity>,
) -> Option<EventPayload> {
    world.is_loaded(id).then(|| EventPayload::ChangeTile {
        world: id,
        pos,
        original: original.cloned(),
        replacement: replacement.cloned(),
    })
}

/// A tile was attached to a cell.
#[derive(Debug, Clone)]
pub struct TileAddition {
    world: WorldId,
    tile: TileEntity,
}

impl TileAddition {
    /// Describes `tile` appearing in `world`.
    pub fn new(world: WorldId, tile: TileEntity) -> Self {
        Self { world, tile }
    }

    /// The added tile.
    #[must_use]
    pub fn tile(&self) -> &TileEntity {
        &self.tile
    }
}

impl<W: WorldAccess> Mutation<W> for TileAddition {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TileAddition
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn world(&self) -> Option<WorldId> {
        Some(self.world)
    }

    fn starts_new_batch(&self, _unit: &UnitContext, _next: &dyn Mutation<W>) -> bool {
        true
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        world: &W,
        _parent: Option<&dyn Mutation<W>>,
        _batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        tile_event(world, self.world, self.tile.pos, None, Some(&self.tile))
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        world.set_tile(self.world, self.tile.pos, None);
    }
}

/// A tile was detached from a cell.
#[derive(Debug, Clone)]
pub struct TileRemoval {
    world: WorldId,
    tile: TileEntity,
}

impl TileRemoval {
    /// Describes `tile` disappearing from `world`.
    pub fn new(world: WorldId, tile: TileEntity) -> Self {
        Self { world, tile }
    }

    /// The removed tile.
    #[must_use]
    pub fn tile(&self) -> &TileEntity {
        &self.tile
    }
}

impl<W: WorldAccess> Mutation<W> for TileRemoval {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TileRemoval
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn world(&self) -> Option<WorldId> {
        Some(self.world)
    }

    fn starts_new_batch(&self, _unit: &UnitContext, _next: &dyn Mutation<W>) -> bool {
        true
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        world: &W,
        _parent: Option<&dyn Mutation<W>>,
        _batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        tile_event(world, self.world, self.tile.pos, Some(&self.tile), None)
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        world.set_tile(self.world, self.tile.pos, Some(self.tile.clone()));
    }
}

/// A tile was swapped for another at the same cell.
#[derive(Debug, Clone)]
pub struct TileReplacement {
    world: WorldId,
    pos: BlockPos,
    existing: Option<TileEntity>,
    proposed: TileEntity,
}

impl TileReplacement {
    /// Describes `existing` giving way to `proposed` at `pos`.
    pub fn new(
        world: WorldId,
        pos: BlockPos,
        existing: Option<TileEntity>,
        proposed: TileEntity,
    ) -> Self {
        Self {
            world,
            pos,
            existing,
            proposed,
        }
    }

    /// Cell of the swap.
    #[must_use]
    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    /// The tile that was there before, if any.
    #[must_use]
    pub fn existing(&self) -> Option<&TileEntity> {
        self.existing.as_ref()
    }

    /// The tile that replaced it.
    #[must_use]
    pub fn proposed(&self) -> &TileEntity {
        &self.proposed
    }
}

impl<W: WorldAccess> Mutation<W> for TileReplacement {
    fn kind(&self) -> TransactionKind {
        TransactionKind::TileReplacement
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn world(&self) -> Option<WorldId> {
        Some(self.world)
    }

    fn starts_new_batch(&self, _unit: &UnitContext, _next: &dyn Mutation<W>) -> bool {
        true
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        world: &W,
        _parent: Option<&dyn Mutation<W>>,
        _batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        tile_event(
            world,
            self.world,
            self.pos,
            self.existing.as_ref(),
            Some(&self.proposed),
        )
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        world.set_tile(self.world, self.pos, self.existing.clone());
    }
}
