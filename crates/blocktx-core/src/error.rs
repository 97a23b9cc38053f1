// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors surfaced by the capture supplier.

use thiserror::Error;

use crate::ident::TxnId;

/// Failure reported by an [`crate::EventDispatcher`].
///
/// The engine never swallows these; they propagate out of
/// [`crate::CaptureSupplier::process_transactions`] unchanged.
#[derive(Debug, Error)]
#[error("event dispatch failed: {message}")]
pub struct DispatchError {
    message: String,
}

impl DispatchError {
    /// Constructs a dispatch error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The dispatcher's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors emitted by the capture supplier.
///
/// Every variant except [`CaptureError::Dispatch`] is a producer contract
/// violation and is fatal for the current unit of logic.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// An effect frame was pushed before any transaction was captured.
    #[error("cannot push a side effect without a parent transaction")]
    NoParentTransaction,
    /// An effect frame was pushed under a node that was never captured.
    #[error("no captured transaction {0} to parent a side effect")]
    UnknownParent(TxnId),
    /// A crafting result was logged with no container interaction to nest in.
    #[error("crafting must be nested in another transaction")]
    UnnestedCrafting,
    /// A crafting preview was logged with no container interaction to nest in.
    #[error("crafting preview must be nested in another transaction")]
    UnnestedCraftingPreview,
    /// The event dispatcher failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
