// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dispatcher that records events and cancels them by rule.

use std::fmt;

use blocktx_core::{
    BlockPos, DispatchError, EventDispatcher, EventPayload, GameEvent, TransactionKind,
};

use crate::journal::Journal;

type CancelRule = Box<dyn Fn(&GameEvent) -> bool>;

/// Stand-in for the listener layer.
///
/// Each dispatched event first has its vetoed cells invalidated, then is
/// cancelled if any rule matches, then is recorded as the listener saw it.
/// With a [`Journal`] attached, every dispatch appends `dispatch:<event id>`.
#[derive(Default)]
pub struct RecordingDispatcher {
    rules: Vec<CancelRule>,
    vetoed_cells: Vec<BlockPos>,
    fail_at: Option<usize>,
    seen: Vec<GameEvent>,
    post: Vec<(TransactionKind, Vec<GameEvent>)>,
    journal: Option<Journal>,
}

impl RecordingDispatcher {
    /// Dispatcher that lets everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every event matching `rule`.
    pub fn cancel_when<F>(mut self, rule: F) -> Self
    where
        F: Fn(&GameEvent) -> bool + 'static,
    {
        self.rules.push(Box::new(rule));
        self
    }

    /// Cancels every event of `kind`.
    pub fn cancel_kind(self, kind: TransactionKind) -> Self {
        self.cancel_when(move |event| event.kind() == kind)
    }

    /// Cancels custom events whose labels include `label`.
    pub fn cancel_label(self, label: &'static str) -> Self {
        self.cancel_when(move |event| match event.payload() {
            EventPayload::Custom { labels } => labels.iter().any(|l| l == label),
            _ => false,
        })
    }

    /// Invalidates the transition at `pos` in every block event, without
    /// cancelling the event.
    pub fn veto_cell(mut self, pos: BlockPos) -> Self {
        self.vetoed_cells.push(pos);
        self
    }

    /// Fails the dispatch of the `n`th event (0-based).
    pub fn fail_at(mut self, n: usize) -> Self {
        self.fail_at = Some(n);
        self
    }

    /// Appends `dispatch:<id>` to `journal` on every dispatch.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Events in dispatch order, as listeners left them.
    pub fn seen(&self) -> &[GameEvent] {
        &self.seen
    }

    /// Raw ids of dispatched events, in dispatch order.
    pub fn seen_ids(&self) -> Vec<u64> {
        self.seen.iter().map(|event| event.id().value()).collect()
    }

    /// Post-processing fan-out, one entry per kind.
    pub fn post(&self) -> &[(TransactionKind, Vec<GameEvent>)] {
        &self.post
    }
}

impl fmt::Debug for RecordingDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingDispatcher")
            .field("rules", &self.rules.len())
            .field("vetoed_cells", &self.vetoed_cells)
            .field("seen", &self.seen.len())
            .finish_non_exhaustive()
    }
}

impl EventDispatcher for RecordingDispatcher {
    fn dispatch(&mut self, event: &mut GameEvent) -> Result<(), DispatchError> {
        if self.fail_at == Some(self.seen.len()) {
            return Err(DispatchError::new("listener failed"));
        }
        for pos in &self.vetoed_cells {
            event.invalidate_block(*pos);
        }
        if self.rules.iter().any(|rule| rule(event)) {
            event.set_cancelled(true);
        }
        if let Some(journal) = &self.journal {
            journal.record(format!("dispatch:{}", event.id().value()));
        }
        self.seen.push(event.clone());
        Ok(())
    }

    fn dispatch_post(
        &mut self,
        kind: TransactionKind,
        events: &[GameEvent],
    ) -> Result<(), DispatchError> {
        self.post.push((kind, events.to_vec()));
        Ok(())
    }
}
