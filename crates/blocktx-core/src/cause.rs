// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Causal frames: the scoped record of why a mutation is happening.
//!
//! The stack is passed explicitly through event generation and restore; there
//! is no process-global "current cause". Frames are opened with
//! [`CauseStack::push_frame`] and closed when the returned [`FrameGuard`] is
//! dropped, so early returns and `?` cannot leave a frame behind.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::ident::EventId;
use crate::world::{BlockPos, EntityId, PlayerId, WorldId};

/// One participant in a cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CauseEntry {
    /// A connected player.
    Player(PlayerId),
    /// An entity in the world.
    Entity(EntityId),
    /// A cell acting as the source (e.g. a piston or redstone torch).
    Block {
        /// World of the cell.
        world: WorldId,
        /// Position of the cell.
        pos: BlockPos,
    },
    /// A previously generated event that caused this one.
    Event(EventId),
    /// Named simulation phase (e.g. `"block_tick"`).
    Phase(String),
    /// Plugin or subsystem identified by name.
    Plugin(String),
}

/// Keys for contextual (non-primary) cause information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextKey {
    /// Who notified the cell that changed.
    Notifier,
    /// Who originally created the affected object.
    Creator,
    /// Last attacker of a dying entity.
    LastAttacker,
    /// Cell targeted by the interaction.
    BlockTarget,
}

/// One level of the cause stack.
#[derive(Debug, Clone, Default)]
pub struct CauseFrame {
    causes: Vec<CauseEntry>,
    context: BTreeMap<ContextKey, CauseEntry>,
}

/// Immutable snapshot of the whole stack, attached to generated events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cause {
    entries: Vec<CauseEntry>,
    context: BTreeMap<ContextKey, CauseEntry>,
}

impl Cause {
    /// The most recently pushed entry, if any.
    #[must_use]
    pub fn root(&self) -> Option<&CauseEntry> {
        self.entries.last()
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[CauseEntry] {
        &self.entries
    }

    /// Looks up a context value.
    #[must_use]
    pub fn context(&self, key: ContextKey) -> Option<&CauseEntry> {
        self.context.get(&key)
    }

    /// Returns true if `entry` appears anywhere in the cause.
    #[must_use]
    pub fn contains(&self, entry: &CauseEntry) -> bool {
        self.entries.contains(entry)
    }
}

/// Stack of causal frames for one unit of logic.
#[derive(Debug, Clone, Default)]
pub struct CauseStack {
    frames: Vec<CauseFrame>,
}

impl CauseStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a stack whose base frame holds `root`.
    pub fn with_root(root: CauseEntry) -> Self {
        let mut stack = Self::new();
        stack.frames.push(CauseFrame {
            causes: vec![root],
            context: BTreeMap::new(),
        });
        stack
    }

    /// Opens a new frame; it is popped when the guard drops.
    pub fn push_frame(&mut self) -> FrameGuard<'_> {
        self.frames.push(CauseFrame::default());
        let depth = self.frames.len();
        FrameGuard { stack: self, depth }
    }

    /// Pushes a cause onto the innermost frame, opening a base frame if none.
    pub fn push_cause(&mut self, entry: CauseEntry) {
        self.top_frame().causes.push(entry);
    }

    /// Adds context to the innermost frame. Later frames shadow earlier ones.
    pub fn add_context(&mut self, key: ContextKey, value: CauseEntry) {
        self.top_frame().context.insert(key, value);
    }

    /// Number of open frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Snapshots every frame into a [`Cause`].
    #[must_use]
    pub fn current_cause(&self) -> Cause {
        let mut cause = Cause::default();
        for frame in &self.frames {
            cause.entries.extend(frame.causes.iter().cloned());
            for (key, value) in &frame.context {
                cause.context.insert(*key, value.clone());
            }
        }
        cause
    }

    fn top_frame(&mut self) -> &mut CauseFrame {
        if self.frames.is_empty() {
            self.frames.push(CauseFrame::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

/// Scoped handle over an open frame.
///
/// Derefs to the stack so nested frames can be opened through it.
pub struct FrameGuard<'a> {
    stack: &'a mut CauseStack,
    depth: usize,
}

impl Deref for FrameGuard<'_> {
    type Target = CauseStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stack
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        // Nested guards borrow through this one, so they are gone by now.
        self.stack.frames.truncate(self.depth - 1);
    }
}
