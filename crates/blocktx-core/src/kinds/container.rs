// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Player container interactions.

use std::any::Any;

use crate::cause::{Cause, CauseEntry, CauseStack};
use crate::event::{
    CraftingPreview, CraftingRecord, EventPayload, GameEvent, SlotTransition, TransactionKind,
};
use crate::mutation::{Mutation, UnitContext};
use crate::world::{ItemStack, PlayerId, WorldAccess};

/// Items moved through a player's open container.
///
/// Container sets, crafts and crafting previews logged while the interaction
/// is the newest capture are recorded here rather than as separate nodes.
#[derive(Debug, Clone)]
pub struct ContainerInteraction {
    player: PlayerId,
    transitions: Vec<SlotTransition>,
    container_set: bool,
    crafting: Option<CraftingRecord>,
    preview: Option<CraftingPreview>,
}

impl ContainerInteraction {
    /// Starts an interaction for `player` with no slot changes.
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            transitions: Vec::new(),
            container_set: false,
            crafting: None,
            preview: None,
        }
    }

    /// Adds a slot transition.
    #[must_use]
    pub fn with_slot(
        mut self,
        slot: u32,
        original: Option<ItemStack>,
        replacement: Option<ItemStack>,
    ) -> Self {
        self.transitions.push(SlotTransition {
            slot,
            original,
            replacement,
        });
        self
    }

    /// Interacting player.
    #[must_use]
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Slot transitions in capture order.
    #[must_use]
    pub fn transitions(&self) -> &[SlotTransition] {
        &self.transitions
    }

    /// Completed craft, if one was recorded.
    #[must_use]
    pub fn crafting(&self) -> Option<&CraftingRecord> {
        self.crafting.as_ref()
    }

    /// Latest crafting preview, if one was recorded.
    #[must_use]
    pub fn preview(&self) -> Option<&CraftingPreview> {
        self.preview.as_ref()
    }

    /// Whether the player's open container was set.
    #[must_use]
    pub fn container_set(&self) -> bool {
        self.container_set
    }
}

impl<W: WorldAccess> Mutation<W> for ContainerInteraction {
    fn kind(&self) -> TransactionKind {
        TransactionKind::ContainerInteraction
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn accept_container_set(&mut self, player: PlayerId) -> bool {
        if player != self.player {
            return false;
        }
        self.container_set = true;
        true
    }

    fn accept_crafting(&mut self, record: &CraftingRecord) -> bool {
        if record.player != self.player {
            return false;
        }
        self.crafting = Some(record.clone());
        true
    }

    fn accept_crafting_preview(&mut self, preview: &CraftingPreview) -> bool {
        if preview.player != self.player {
            return false;
        }
        self.preview = Some(preview.clone());
        true
    }

    fn starts_new_batch(&self, _unit: &UnitContext, next: &dyn Mutation<W>) -> bool {
        next.as_any()
            .downcast_ref::<Self>()
            .is_none_or(|other| other.player != self.player)
    }

    fn contribute_cause(
        &self,
        _unit: &UnitContext,
        _parent: Option<&dyn Mutation<W>>,
        frame: &mut CauseStack,
    ) {
        frame.push_cause(CauseEntry::Player(self.player));
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        _world: &W,
        _parent: Option<&dyn Mutation<W>>,
        batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        let mut transitions = Vec::new();
        let mut container_set = false;
        let mut crafting = None;
        let mut preview = None;
        for member in batch
            .iter()
            .filter_map(|member| member.as_any().downcast_ref::<Self>())
        {
            transitions.extend(member.transitions.iter().cloned());
            container_set |= member.container_set;
            if member.crafting.is_some() {
                crafting.clone_from(&member.crafting);
            }
            if member.preview.is_some() {
                preview.clone_from(&member.preview);
            }
        }
        Some(EventPayload::ClickContainer {
            player: self.player,
            transitions,
            container_set,
            crafting,
            preview,
        })
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        for transition in self.transitions.iter().rev() {
            world.set_slot(self.player, transition.slot, transition.original.clone());
        }
    }
}
