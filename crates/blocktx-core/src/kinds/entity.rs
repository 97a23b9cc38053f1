// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! An entity about to produce drops.

use std::any::Any;

use tracing::debug;

use crate::cause::{Cause, CauseEntry, CauseStack, ContextKey};
use crate::event::{EventPayload, GameEvent, TransactionKind};
use crate::mutation::{Mutation, UnitContext};
use crate::world::{EntityId, EntitySnapshot, WorldAccess, WorldId};

/// Parent of everything an entity drops.
///
/// Captured by [`crate::CaptureSupplier::log_entity_drops`], which opens an
/// effect frame under it; the drops themselves land in that frame. The node
/// always gets its own batch, so its event is dispatched before any drop.
#[derive(Debug, Clone)]
pub struct EntityDrops {
    entity: EntitySnapshot,
    last_attacker: Option<CauseEntry>,
}

impl EntityDrops {
    /// Describes `entity` performing drops.
    pub fn new(entity: EntitySnapshot, last_attacker: Option<CauseEntry>) -> Self {
        Self {
            entity,
            last_attacker,
        }
    }

    /// The entity as it was before dropping.
    #[must_use]
    pub fn entity(&self) -> &EntitySnapshot {
        &self.entity
    }
}

impl<W: WorldAccess> Mutation<W> for EntityDrops {
    fn kind(&self) -> TransactionKind {
        TransactionKind::EntityDrops
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn world(&self) -> Option<WorldId> {
        Some(self.entity.world)
    }

    fn accept_entity_drops(&mut self, entity: EntityId) -> bool {
        self.entity.id == entity
    }

    fn starts_new_batch(&self, _unit: &UnitContext, _next: &dyn Mutation<W>) -> bool {
        true
    }

    fn is_unbatchable(&self) -> bool {
        true
    }

    fn contribute_cause(
        &self,
        _unit: &UnitContext,
        _parent: Option<&dyn Mutation<W>>,
        frame: &mut CauseStack,
    ) {
        frame.push_cause(CauseEntry::Entity(self.entity.id));
        if let Some(attacker) = &self.last_attacker {
            frame.add_context(ContextKey::LastAttacker, attacker.clone());
        }
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        world: &W,
        _parent: Option<&dyn Mutation<W>>,
        _batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        world
            .is_loaded(self.entity.world)
            .then_some(EventPayload::EntityDrops {
                world: self.entity.world,
                entity: self.entity.id,
            })
    }

    fn restore(&mut self, _unit: &UnitContext, world: &mut W, _event: &GameEvent, _cause: &Cause) {
        debug!(entity = self.entity.id.0, "restoring entity after cancelled drops");
        world.restore_entity(&self.entity);
    }
}
