// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block-change pipeline: captures a cell change and runs its follow-up steps
//! inside nested effect frames.
//!
//! Everything a step logs through its `sink` lands in a side-effect chain
//! under the captured change, so a cancelled change also rolls back whatever
//! it caused.

use std::fmt;

use tracing::trace;

use crate::capture::CaptureSupplier;
use crate::error::CaptureError;
use crate::ident::EffectTag;
use crate::kinds::BlockChange;
use crate::world::{BlockPos, BlockSnapshot, BlockState, WorldAccess, WorldId};

/// Outcome of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectResult {
    /// Continue with the next step.
    Pass,
    /// Stop the pipeline and return this value from [`BlockPipeline::process`].
    Return(Option<BlockState>),
}

/// What every step sees about the change being applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCursor {
    /// World of the cell.
    pub world: WorldId,
    /// Cell being changed.
    pub pos: BlockPos,
    /// State and tile before the change.
    pub original: BlockSnapshot,
    /// State being written.
    pub proposed: BlockState,
}

/// One named step of a [`BlockPipeline`].
pub trait ProcessingSideEffect<W> {
    /// Tag of the effect frame the step runs in.
    fn name(&self) -> EffectTag;

    /// Applies the step. Mutations logged into `sink` become side effects of
    /// the captured change.
    ///
    /// # Errors
    /// Producer contract violations from the sink.
    fn process(
        &self,
        sink: &mut CaptureSupplier<W>,
        world: &mut W,
        cursor: &PipelineCursor,
    ) -> Result<EffectResult, CaptureError>;
}

/// Stops the pipeline when the target world is gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckLoadedEffect;

impl<W: WorldAccess> ProcessingSideEffect<W> for CheckLoadedEffect {
    fn name(&self) -> EffectTag {
        EffectTag("check_loaded")
    }

    fn process(
        &self,
        _sink: &mut CaptureSupplier<W>,
        world: &mut W,
        cursor: &PipelineCursor,
    ) -> Result<EffectResult, CaptureError> {
        if world.is_loaded(cursor.world) {
            Ok(EffectResult::Pass)
        } else {
            Ok(EffectResult::Return(None))
        }
    }
}

/// Detaches the old tile when the cell state actually changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveTileOnReplaceEffect;

impl<W: WorldAccess> ProcessingSideEffect<W> for RemoveTileOnReplaceEffect {
    fn name(&self) -> EffectTag {
        EffectTag("remove_tile_on_replace")
    }

    fn process(
        &self,
        sink: &mut CaptureSupplier<W>,
        world: &mut W,
        cursor: &PipelineCursor,
    ) -> Result<EffectResult, CaptureError> {
        if cursor.original.tile.is_none() || cursor.original.state == cursor.proposed {
            return Ok(EffectResult::Pass);
        }
        sink.log_tile_removal(cursor.world, cursor.original.tile.clone());
        world.set_tile(cursor.world, cursor.pos, None);
        Ok(EffectResult::Pass)
    }
}

/// Writes the proposed state into the world.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetBlockStateEffect;

impl<W: WorldAccess> ProcessingSideEffect<W> for SetBlockStateEffect {
    fn name(&self) -> EffectTag {
        EffectTag("set_block_state")
    }

    fn process(
        &self,
        _sink: &mut CaptureSupplier<W>,
        world: &mut W,
        cursor: &PipelineCursor,
    ) -> Result<EffectResult, CaptureError> {
        world.set_block(cursor.world, cursor.pos, cursor.proposed);
        Ok(EffectResult::Pass)
    }
}

type StepFn<W> =
    dyn Fn(&mut CaptureSupplier<W>, &mut W, &PipelineCursor) -> Result<EffectResult, CaptureError>;

/// Step backed by a closure (neighbor notification, custom drops, ...).
pub struct FnEffect<W> {
    name: EffectTag,
    step: Box<StepFn<W>>,
}

impl<W> FnEffect<W> {
    /// Wraps `step` under `name`.
    pub fn new<F>(name: EffectTag, step: F) -> Self
    where
        F: Fn(&mut CaptureSupplier<W>, &mut W, &PipelineCursor) -> Result<EffectResult, CaptureError>
            + 'static,
    {
        Self {
            name,
            step: Box::new(step),
        }
    }
}

impl<W> fmt::Debug for FnEffect<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEffect").field("name", &self.name).finish()
    }
}

impl<W> ProcessingSideEffect<W> for FnEffect<W> {
    fn name(&self) -> EffectTag {
        self.name
    }

    fn process(
        &self,
        sink: &mut CaptureSupplier<W>,
        world: &mut W,
        cursor: &PipelineCursor,
    ) -> Result<EffectResult, CaptureError> {
        (self.step)(sink, world, cursor)
    }
}

/// Ordered steps applied to every cell change.
pub struct BlockPipeline<W> {
    steps: Vec<Box<dyn ProcessingSideEffect<W>>>,
}

impl<W> Default for BlockPipeline<W> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<W> fmt::Debug for BlockPipeline<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.name().name()))
            .finish()
    }
}

impl<W: WorldAccess + 'static> BlockPipeline<W> {
    /// Pipeline with no steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loaded check, tile removal, then the state write.
    pub fn standard() -> Self {
        Self::new()
            .with(CheckLoadedEffect)
            .with(RemoveTileOnReplaceEffect)
            .with(SetBlockStateEffect)
    }

    /// Appends a step.
    #[must_use]
    pub fn with<E>(mut self, step: E) -> Self
    where
        E: ProcessingSideEffect<W> + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Captures a change of `pos` to `proposed` and runs every step.
    ///
    /// Returns the state the cell had before the change, or whatever a step
    /// returned early (`None` when the change did not happen).
    ///
    /// # Errors
    /// Propagates the first step error; the effect frame of the failing step
    /// is closed before returning.
    pub fn process(
        &self,
        supplier: &mut CaptureSupplier<W>,
        world: &mut W,
        world_id: WorldId,
        pos: BlockPos,
        proposed: BlockState,
    ) -> Result<Option<BlockState>, CaptureError> {
        let original = BlockSnapshot::capture(world, world_id, pos);
        let cursor = PipelineCursor {
            world: world_id,
            pos,
            original: original.clone(),
            proposed,
        };
        // An absorbed change keeps its effects under the node that absorbed it.
        let owner = supplier
            .record_transaction(BlockChange::new(world_id, pos, original, proposed))
            .id();
        for step in &self.steps {
            let mut frame = supplier.push_effect_under(owner, step.name())?;
            if let EffectResult::Return(value) = step.process(&mut frame, world, &cursor)? {
                trace!(step = step.name().name(), pos = ?pos, "pipeline returned early");
                return Ok(value);
            }
        }
        Ok(Some(cursor.original.state))
    }
}
