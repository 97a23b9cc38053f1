// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory world implementing the restore port.

use blocktx_core::{
    BlockPos, BlockState, EntityId, EntitySnapshot, ItemStack, PlayerId, TileEntity, WorldAccess,
    WorldId,
};
use rustc_hash::{FxHashMap, FxHashSet};

/// Sparse world: unset cells read as [`BlockState::AIR`].
///
/// Every write through [`WorldAccess`] bumps a counter so tests can tell a
/// restore happened even when it wrote back the same value.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    blocks: FxHashMap<(WorldId, BlockPos), BlockState>,
    tiles: FxHashMap<(WorldId, BlockPos), TileEntity>,
    unloaded: FxHashSet<WorldId>,
    entities: FxHashMap<EntityId, EntitySnapshot>,
    slots: FxHashMap<(PlayerId, u32), ItemStack>,
    writes: usize,
}

impl InMemoryWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a cell without counting a write.
    pub fn with_block(mut self, world: WorldId, pos: BlockPos, state: BlockState) -> Self {
        self.blocks.insert((world, pos), state);
        self
    }

    /// Builder: attach a tile without counting a write.
    pub fn with_tile(mut self, world: WorldId, tile: TileEntity) -> Self {
        self.tiles.insert((world, tile.pos), tile);
        self
    }

    /// Builder: fill a slot without counting a write.
    pub fn with_slot(mut self, player: PlayerId, slot: u32, stack: ItemStack) -> Self {
        self.slots.insert((player, slot), stack);
        self
    }

    /// Marks a world as unloaded; it stays readable.
    pub fn unload(&mut self, world: WorldId) {
        self.unloaded.insert(world);
    }

    /// Entity currently present, if any.
    pub fn entity(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.entities.get(&id)
    }

    /// Removes an entity (as dying would).
    pub fn remove_entity(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.remove(&id)
    }

    /// Current contents of a slot.
    pub fn slot(&self, player: PlayerId, slot: u32) -> Option<&ItemStack> {
        self.slots.get(&(player, slot))
    }

    /// Number of writes made through [`WorldAccess`].
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl WorldAccess for InMemoryWorld {
    fn is_loaded(&self, world: WorldId) -> bool {
        !self.unloaded.contains(&world)
    }

    fn block(&self, world: WorldId, pos: BlockPos) -> BlockState {
        self.blocks
            .get(&(world, pos))
            .copied()
            .unwrap_or(BlockState::AIR)
    }

    fn set_block(&mut self, world: WorldId, pos: BlockPos, state: BlockState) -> BlockState {
        self.writes += 1;
        let previous = if state.is_air() {
            self.blocks.remove(&(world, pos))
        } else {
            self.blocks.insert((world, pos), state)
        };
        previous.unwrap_or(BlockState::AIR)
    }

    fn tile(&self, world: WorldId, pos: BlockPos) -> Option<TileEntity> {
        self.tiles.get(&(world, pos)).cloned()
    }

    fn set_tile(&mut self, world: WorldId, pos: BlockPos, tile: Option<TileEntity>) {
        self.writes += 1;
        match tile {
            Some(tile) => {
                self.tiles.insert((world, pos), tile);
            }
            None => {
                self.tiles.remove(&(world, pos));
            }
        }
    }

    fn restore_entity(&mut self, snapshot: &EntitySnapshot) {
        self.writes += 1;
        self.entities.insert(snapshot.id, snapshot.clone());
    }

    fn set_slot(&mut self, player: PlayerId, slot: u32, stack: Option<ItemStack>) {
        self.writes += 1;
        match stack {
            Some(stack) => {
                self.slots.insert((player, slot), stack);
            }
            None => {
                self.slots.remove(&(player, slot));
            }
        }
    }
}
