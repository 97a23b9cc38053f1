// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Events synthesized from batches of captured transactions.

use crate::cause::Cause;
use crate::ident::EventId;
use crate::world::{
    BlockPos, BlockState, CraftingGrid, EntityId, ItemStack, PlayerId, RecipeId, TileEntity,
    WorldId,
};

/// Tag identifying the family of a captured mutation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// A cell was replaced.
    BlockChange,
    /// A tile was attached to a cell.
    TileAddition,
    /// A tile was detached from a cell.
    TileRemoval,
    /// A tile was swapped for another.
    TileReplacement,
    /// An entity is producing drops (its loot is captured as side effects).
    EntityDrops,
    /// A player moved items through a container.
    ContainerInteraction,
    /// Kind defined outside this crate.
    Custom(&'static str),
}

/// One cell transition inside a [`EventPayload::ChangeBlock`] event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTransition {
    /// Cell that changed.
    pub pos: BlockPos,
    /// State before the unit of logic touched the cell.
    pub original: BlockState,
    /// State the cell ended up with.
    pub replacement: BlockState,
    /// Listeners clear this to veto just this transition.
    pub valid: bool,
}

/// One slot transition inside a container event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTransition {
    /// Slot index.
    pub slot: u32,
    /// Contents before the interaction.
    pub original: Option<ItemStack>,
    /// Contents after the interaction.
    pub replacement: Option<ItemStack>,
}

/// A craft that completed as part of a container interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftingRecord {
    /// Crafting player.
    pub player: PlayerId,
    /// Result taken out of the output slot, if any.
    pub crafted: Option<ItemStack>,
    /// Grid contents at the moment of crafting.
    pub grid: CraftingGrid,
    /// Recipe that matched, if any.
    pub recipe: Option<RecipeId>,
}

/// The output preview shown while a player edits a crafting grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftingPreview {
    /// Player editing the grid.
    pub player: PlayerId,
    /// Grid contents.
    pub grid: CraftingGrid,
    /// Previewed result.
    pub preview: Option<ItemStack>,
}

/// Kind-specific content of a generated event.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// One or more cells changed in a world.
    ChangeBlock {
        /// World of every transition.
        world: WorldId,
        /// Transitions in capture order.
        transitions: Vec<BlockTransition>,
    },
    /// A tile was added, removed or replaced outside a cell change.
    ChangeTile {
        /// World of the tile.
        world: WorldId,
        /// Cell of the tile.
        pos: BlockPos,
        /// Tile before the change.
        original: Option<TileEntity>,
        /// Tile after the change.
        replacement: Option<TileEntity>,
    },
    /// An entity is about to produce drops.
    EntityDrops {
        /// World of the entity.
        world: WorldId,
        /// The entity.
        entity: EntityId,
    },
    /// A player interacted with a container.
    ClickContainer {
        /// Interacting player.
        player: PlayerId,
        /// Slot transitions in capture order.
        transitions: Vec<SlotTransition>,
        /// Whether the player's open container was set during the interaction.
        container_set: bool,
        /// Completed craft, if any.
        crafting: Option<CraftingRecord>,
        /// Latest crafting preview, if any.
        preview: Option<CraftingPreview>,
    },
    /// Payload for kinds defined outside this crate.
    Custom {
        /// Free-form labels describing the batch members, in order.
        labels: Vec<String>,
    },
}

/// A cancellable event produced from one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEvent {
    id: EventId,
    kind: TransactionKind,
    cause: Cause,
    payload: EventPayload,
    cancelled: bool,
}

impl GameEvent {
    /// Constructs an uncancelled event.
    pub fn new(id: EventId, kind: TransactionKind, cause: Cause, payload: EventPayload) -> Self {
        Self {
            id,
            kind,
            cause,
            payload,
            cancelled: false,
        }
    }

    /// Event identifier.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Kind of the deciding transaction.
    #[must_use]
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Cause snapshot taken when the event was generated.
    #[must_use]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Kind-specific content.
    #[must_use]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Mutable content, for listeners that veto individual transitions.
    pub fn payload_mut(&mut self) -> &mut EventPayload {
        &mut self.payload
    }

    /// Whether a listener cancelled the event.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Sets the cancelled flag.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Marks the transition at `pos` invalid. Returns false when the event has
    /// no such transition.
    pub fn invalidate_block(&mut self, pos: BlockPos) -> bool {
        let EventPayload::ChangeBlock { transitions, .. } = &mut self.payload else {
            return false;
        };
        let mut found = false;
        for transition in transitions.iter_mut().filter(|t| t.pos == pos) {
            transition.valid = false;
            found = true;
        }
        found
    }

    /// Returns the transition at `pos`, if this is a block event.
    #[must_use]
    pub fn block_transition(&self, pos: BlockPos) -> Option<&BlockTransition> {
        match &self.payload {
            EventPayload::ChangeBlock { transitions, .. } => {
                transitions.iter().find(|t| t.pos == pos)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_event() -> GameEvent {
        GameEvent::new(
            EventId::from_raw(1),
            TransactionKind::BlockChange,
            Cause::default(),
            EventPayload::ChangeBlock {
                world: WorldId(0),
                transitions: vec![BlockTransition {
                    pos: BlockPos::new(1, 2, 3),
                    original: BlockState::AIR,
                    replacement: BlockState(5),
                    valid: true,
                }],
            },
        )
    }

    #[test]
    fn invalidate_block_only_touches_matching_transition() {
        let mut event = block_event();
        assert!(!event.invalidate_block(BlockPos::new(0, 0, 0)));
        assert!(event.invalidate_block(BlockPos::new(1, 2, 3)));
        let transition = event.block_transition(BlockPos::new(1, 2, 3));
        assert_eq!(transition.map(|t| t.valid), Some(false));
        assert!(!event.is_cancelled());
    }
}
