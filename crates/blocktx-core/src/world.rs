// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! World-facing value types and the port that restore logic writes through.
//!
//! The engine never owns world state. Mutation kinds record the values they
//! need to undo themselves and write them back through [`WorldAccess`] when an
//! event is cancelled.

use bytes::Bytes;

/// Identifier of a loaded world (dimension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct WorldId(pub u32);

/// Integer cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct BlockPos {
    /// East/west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North/south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Constructs a position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position offset by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Opaque cell state identifier (palette index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct BlockState(pub u32);

impl BlockState {
    /// The empty cell.
    pub const AIR: Self = Self(0);

    /// Returns true for [`BlockState::AIR`].
    #[must_use]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }
}

/// Per-cell object attached to a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEntity {
    /// Cell the tile is attached to.
    pub pos: BlockPos,
    /// Registry key of the tile type (e.g. `"chest"`).
    pub kind: String,
    /// Serialized tile data.
    pub payload: Bytes,
}

impl TileEntity {
    /// Constructs a tile at `pos`.
    pub fn new(pos: BlockPos, kind: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            pos,
            kind: kind.into(),
            payload: payload.into(),
        }
    }
}

/// Cell state plus its tile at the moment it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSnapshot {
    /// Captured state.
    pub state: BlockState,
    /// Captured tile, if any.
    pub tile: Option<TileEntity>,
}

impl BlockSnapshot {
    /// Reads the current state and tile of `pos` from `world`.
    pub fn capture<W: WorldAccess + ?Sized>(world: &W, id: WorldId, pos: BlockPos) -> Self {
        Self {
            state: world.block(id, pos),
            tile: world.tile(id, pos),
        }
    }
}

/// Entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct EntityId(pub u64);

/// Serialized entity captured before it performed drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    /// Entity identifier.
    pub id: EntityId,
    /// World the entity lived in.
    pub world: WorldId,
    /// Registry key of the entity type.
    pub kind: String,
    /// Serialized entity data.
    pub payload: Bytes,
}

/// Player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct PlayerId(pub u64);

/// Stack of items in an inventory slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStack {
    /// Registry key of the item.
    pub item: String,
    /// Stack size.
    pub count: u32,
}

impl ItemStack {
    /// Constructs a stack.
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

/// Recipe identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeId(pub String);

/// Contents of a crafting grid at the moment of capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftingGrid {
    /// Row-major slot contents.
    pub slots: Vec<Option<ItemStack>>,
}

/// Port through which mutation kinds read and restore world state.
///
/// Implemented by the server's in-memory world. Writes performed through this
/// trait during rollback are not captured again.
pub trait WorldAccess {
    /// Returns false once the world has been unloaded.
    fn is_loaded(&self, world: WorldId) -> bool;
    /// Current state of a cell.
    fn block(&self, world: WorldId, pos: BlockPos) -> BlockState;
    /// Writes a cell state, returning the previous one.
    fn set_block(&mut self, world: WorldId, pos: BlockPos, state: BlockState) -> BlockState;
    /// Current tile at a cell.
    fn tile(&self, world: WorldId, pos: BlockPos) -> Option<TileEntity>;
    /// Replaces (or removes, with `None`) the tile at a cell.
    fn set_tile(&mut self, world: WorldId, pos: BlockPos, tile: Option<TileEntity>);
    /// Brings an entity back from its snapshot.
    fn restore_entity(&mut self, snapshot: &EntitySnapshot);
    /// Writes an inventory slot for a player.
    fn set_slot(&mut self, player: PlayerId, slot: u32, stack: Option<ItemStack>);
}
