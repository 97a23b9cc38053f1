// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in mutation kinds.
//!
//! Each kind records just enough to describe itself in an event and to undo
//! itself through [`crate::WorldAccess`]. Servers register further kinds by
//! implementing [`crate::Mutation`] directly.

mod block;
mod container;
mod entity;
mod tile;

pub use block::BlockChange;
pub use container::ContainerInteraction;
pub use entity::EntityDrops;
pub use tile::{TileAddition, TileRemoval, TileReplacement};
