// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The capability interface every captured mutation kind implements.
//!
//! The engine treats kinds uniformly through [`Mutation`]; kind-specific
//! knowledge (what absorbs what, where a batch ends, how to undo) lives in the
//! implementations. Kinds that need to inspect a sibling of the same family
//! downcast it through [`Mutation::as_any`].

use std::any::Any;
use std::fmt;

use crate::cause::{Cause, CauseEntry, CauseStack};
use crate::config::CaptureConfig;
use crate::event::{CraftingPreview, CraftingRecord, EventPayload, GameEvent, TransactionKind};
use crate::world::{EntityId, PlayerId, TileEntity, WorldId};

/// Context of the unit of logic that owns a capture supplier.
#[derive(Debug, Clone, Default)]
pub struct UnitContext {
    /// Name of the simulation phase driving the unit (e.g. `"block_tick"`).
    pub phase: String,
    /// Primary source of the unit, pushed as the base cause.
    pub source: Option<CauseEntry>,
    /// Capture tuning.
    pub config: CaptureConfig,
}

impl UnitContext {
    /// Context for `phase` with default config and no source.
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            source: None,
            config: CaptureConfig::default(),
        }
    }

    /// Sets the primary source.
    #[must_use]
    pub fn with_source(mut self, source: CauseEntry) -> Self {
        self.source = Some(source);
        self
    }

    /// Replaces the capture config.
    #[must_use]
    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Fresh cause stack seeded with the phase and source.
    pub(crate) fn cause_stack(&self) -> CauseStack {
        let mut stack = CauseStack::with_root(CauseEntry::Phase(self.phase.clone()));
        if let Some(source) = &self.source {
            stack.push_cause(source.clone());
        }
        stack
    }
}

/// A batch member as seen by the deciding node's cancellation policy.
pub struct BatchMember<'a, W> {
    /// The member's capabilities.
    pub mutation: &'a dyn Mutation<W>,
    /// Whether the member is already cancelled.
    pub cancelled: bool,
}

/// One atomic, undoable state change captured during a unit of logic.
///
/// `W` is the world type restore logic writes through.
pub trait Mutation<W>: fmt::Debug {
    /// Family tag.
    fn kind(&self) -> TransactionKind;

    /// Upcast for same-family downcasts.
    fn as_any(&self) -> &dyn Any;

    /// World the mutation happened in, when it has one.
    fn world(&self) -> Option<WorldId> {
        None
    }

    /// Whether an existing node may absorb this one instead of appending it.
    fn can_be_absorbed(&self) -> bool {
        false
    }

    /// Offers `incoming` to this (already captured) node. Returning true
    /// consumes `incoming`; it is never appended.
    fn absorb(&mut self, _unit: &UnitContext, _incoming: &dyn Mutation<W>) -> bool {
        false
    }

    /// Attach a tile that appeared while this mutation applied.
    fn accept_tile_addition(&mut self, _world: WorldId, _tile: &TileEntity) -> bool {
        false
    }

    /// Attach a tile that disappeared while this mutation applied.
    fn accept_tile_removal(&mut self, _world: WorldId, _tile: &TileEntity) -> bool {
        false
    }

    /// Attach a tile swap that happened while this mutation applied.
    fn accept_tile_replacement(
        &mut self,
        _world: WorldId,
        _existing: Option<&TileEntity>,
        _proposed: &TileEntity,
    ) -> bool {
        false
    }

    /// Record that `player`'s open container was set.
    fn accept_container_set(&mut self, _player: PlayerId) -> bool {
        false
    }

    /// Record a completed craft.
    fn accept_crafting(&mut self, _record: &CraftingRecord) -> bool {
        false
    }

    /// Record a crafting preview.
    fn accept_crafting_preview(&mut self, _preview: &CraftingPreview) -> bool {
        false
    }

    /// Claim drops of `entity` that are about to be captured.
    fn accept_entity_drops(&mut self, _entity: EntityId) -> bool {
        false
    }

    /// When this node decides a batch: does `next` start a new one?
    fn starts_new_batch(&self, unit: &UnitContext, next: &dyn Mutation<W>) -> bool;

    /// Forces a batch boundary right after this node.
    fn is_unbatchable(&self) -> bool {
        false
    }

    /// Adds causal context to the frame opened for this node's batch.
    fn contribute_cause(
        &self,
        _unit: &UnitContext,
        _parent: Option<&dyn Mutation<W>>,
        _frame: &mut CauseStack,
    ) {
    }

    /// Synthesizes the event for a batch this node decides. Returning `None`
    /// declines (e.g. the world is gone); nested side effects still process.
    fn generate_event(
        &self,
        unit: &UnitContext,
        world: &W,
        parent: Option<&dyn Mutation<W>>,
        batch: &[&dyn Mutation<W>],
        cause: &Cause,
    ) -> Option<EventPayload>;

    /// Indices of batch members to cancel after dispatch, beyond what the
    /// event's own cancellation implies.
    fn cancel_dependents(&self, _event: &GameEvent, _batch: &[BatchMember<'_, W>]) -> Vec<usize> {
        Vec::new()
    }

    /// Reflects this node's cancellation into the event it belongs to.
    fn on_cancelled(&self, _event: &mut GameEvent) {}

    /// Runs once for every node that survived dispatch.
    fn post_process(&mut self, _unit: &UnitContext, _world: &mut W, _event: &GameEvent) {}

    /// Undoes the mutation. Called at most once; never retried. `cause` is
    /// the frame the batch decider contributed to.
    fn restore(&mut self, unit: &UnitContext, world: &mut W, event: &GameEvent, cause: &Cause);
}
