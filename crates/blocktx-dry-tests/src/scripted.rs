// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mutation kind whose batching and absorption are scripted by the test.

use std::any::Any;

use blocktx_core::{
    Cause, CauseEntry, CauseStack, EntityId, EventPayload, GameEvent, Mutation, TransactionKind,
    UnitContext,
};

use crate::journal::Journal;

/// Kind tag of every [`ScriptedMutation`].
pub const SCRIPTED: TransactionKind = TransactionKind::Custom("scripted");

/// A mutation that only talks to a [`Journal`].
///
/// Consecutive scripted nodes with the same group share a batch. The event
/// payload lists the labels of the batch members. Restores append
/// `restore:<label>` and committed nodes append `commit:<label>`.
#[derive(Debug, Clone)]
pub struct ScriptedMutation {
    label: String,
    group: u32,
    unbatchable: bool,
    absorb_key: Option<u32>,
    declines: bool,
    cause: Option<CauseEntry>,
    claims_drops_of: Option<EntityId>,
    absorbed: Vec<String>,
    journal: Journal,
}

impl ScriptedMutation {
    /// Mutation in group 0 that never absorbs.
    pub fn new(label: impl Into<String>, journal: &Journal) -> Self {
        Self {
            label: label.into(),
            group: 0,
            unbatchable: false,
            absorb_key: None,
            declines: false,
            cause: None,
            claims_drops_of: None,
            absorbed: Vec::new(),
            journal: journal.clone(),
        }
    }

    /// Batching group; a different group starts a new batch.
    pub fn group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    /// Forces a batch boundary after this node.
    pub fn unbatchable(mut self) -> Self {
        self.unbatchable = true;
        self
    }

    /// Absorbs, and may be absorbed by, scripted nodes with the same key.
    pub fn absorbs(mut self, key: u32) -> Self {
        self.absorb_key = Some(key);
        self
    }

    /// Declines to produce an event when deciding a batch.
    pub fn declining(mut self) -> Self {
        self.declines = true;
        self
    }

    /// Pushes `entry` as a cause when deciding a batch.
    pub fn with_cause(mut self, entry: CauseEntry) -> Self {
        self.cause = Some(entry);
        self
    }

    /// Claims drops of `entity` offered through the accept hook.
    pub fn claiming_drops_of(mut self, entity: EntityId) -> Self {
        self.claims_drops_of = Some(entity);
        self
    }

    /// The label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Labels of the nodes this one absorbed, in order.
    pub fn absorbed(&self) -> &[String] {
        &self.absorbed
    }
}

impl<W> Mutation<W> for ScriptedMutation {
    fn kind(&self) -> TransactionKind {
        SCRIPTED
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_be_absorbed(&self) -> bool {
        self.absorb_key.is_some()
    }

    fn absorb(&mut self, _unit: &UnitContext, incoming: &dyn Mutation<W>) -> bool {
        let Some(other) = incoming.as_any().downcast_ref::<Self>() else {
            return false;
        };
        if self.absorb_key.is_none() || self.absorb_key != other.absorb_key {
            return false;
        }
        self.journal
            .record(format!("absorb:{}<-{}", self.label, other.label));
        self.absorbed.push(other.label.clone());
        true
    }

    fn accept_entity_drops(&mut self, entity: EntityId) -> bool {
        self.claims_drops_of == Some(entity)
    }

    fn starts_new_batch(&self, _unit: &UnitContext, next: &dyn Mutation<W>) -> bool {
        next.as_any()
            .downcast_ref::<Self>()
            .is_none_or(|other| other.group != self.group)
    }

    fn is_unbatchable(&self) -> bool {
        self.unbatchable
    }

    fn contribute_cause(
        &self,
        _unit: &UnitContext,
        _parent: Option<&dyn Mutation<W>>,
        frame: &mut CauseStack,
    ) {
        if let Some(cause) = &self.cause {
            frame.push_cause(cause.clone());
        }
    }

    fn generate_event(
        &self,
        _unit: &UnitContext,
        _world: &W,
        _parent: Option<&dyn Mutation<W>>,
        batch: &[&dyn Mutation<W>],
        _cause: &Cause,
    ) -> Option<EventPayload> {
        if self.declines {
            return None;
        }
        let labels = batch
            .iter()
            .filter_map(|member| member.as_any().downcast_ref::<Self>())
            .map(|member| member.label.clone())
            .collect();
        Some(EventPayload::Custom { labels })
    }

    fn post_process(&mut self, _unit: &UnitContext, _world: &mut W, _event: &GameEvent) {
        self.journal.record(format!("commit:{}", self.label));
    }

    fn restore(&mut self, _unit: &UnitContext, _world: &mut W, _event: &GameEvent, _cause: &Cause) {
        self.journal.record(format!("restore:{}", self.label));
    }
}
