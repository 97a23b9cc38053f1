// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! blocktx-core: tick-scoped capture, batching and rollback of world mutations.
//!
//! Gameplay logic running inside one unit of work (a block tick, a player
//! packet, an entity update) reports every mutation it makes to a
//! [`CaptureSupplier`]. When the unit ends, the supplier groups the captured
//! transactions into minimal batches, turns each batch into a cancellable
//! [`GameEvent`], hands the events to an [`EventDispatcher`], and restores
//! whatever the listeners cancelled, newest first.
//!
//! Mutations made while applying another mutation (a neighbor update, the
//! drops of a dying entity) are captured into side-effect chains nested under
//! the node that caused them; cancelling the parent rolls them back too.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod batch;
mod capture;
mod cause;
mod chain;
/// Capture tuning and its storage port.
pub mod config;
mod dispatch;
mod error;
mod event;
mod ident;
/// Built-in mutation kinds.
pub mod kinds;
mod mutation;
/// Block-change pipeline and its reference steps.
pub mod pipeline;
mod process;
mod world;

// Re-exports for stable public API
/// Capture supplier and its scoped effect frame.
pub use capture::{
    CaptureSupplier, EffectTransactor, Logged, ENTITY_DROPS_EFFECT, PREPARE_BLOCK_DROPS_EFFECT,
};
/// Causal frames attached to generated events.
pub use cause::{Cause, CauseEntry, CauseFrame, CauseStack, ContextKey, FrameGuard};
/// Chains over the capture arena.
pub use chain::{Chain, ChainOwner, MutationNode, SideEffectChain};
pub use config::{
    AcceptSearch, CaptureConfig, ConfigError, ConfigService, ConfigStore, CAPTURE_CONFIG_KEY,
};
/// Listener port.
pub use dispatch::EventDispatcher;
pub use error::{CaptureError, DispatchError};
/// Generated events and their payloads.
pub use event::{
    BlockTransition, CraftingPreview, CraftingRecord, EventPayload, GameEvent, SlotTransition,
    TransactionKind,
};
pub use ident::{EffectId, EffectTag, EventId, TxnId};
/// Capability interface of captured mutations.
pub use mutation::{BatchMember, Mutation, UnitContext};
pub use process::ProcessOutcome;
/// World value types and the restore port.
pub use world::{
    BlockPos, BlockSnapshot, BlockState, CraftingGrid, EntityId, EntitySnapshot, ItemStack,
    PlayerId, RecipeId, TileEntity, WorldAccess, WorldId,
};
