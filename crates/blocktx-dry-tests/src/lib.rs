// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for blocktx crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`dispatch`] - Dispatcher that records events and cancels by rule
//! - [`journal`] - Shared ordered log of what doubles observed
//! - [`scripted`] - Mutation kind whose batching and absorption are scripted
//! - [`world`] - In-memory world implementing the restore port

pub mod config;
pub mod dispatch;
pub mod journal;
pub mod scripted;
pub mod world;

pub use config::InMemoryConfigStore;
pub use dispatch::RecordingDispatcher;
pub use journal::Journal;
pub use scripted::ScriptedMutation;
pub use world::InMemoryWorld;

/// Installs a `tracing` subscriber writing through the test harness.
///
/// Filtering follows `RUST_LOG`. Safe to call from every test; only the first
/// call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
