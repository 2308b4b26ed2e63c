//! Error type for the processing layer.
//!
//! Uses [`thiserror`] for ergonomic error derivation. [`ProcessError`]
//! wraps the core taxonomy: structural [`StreamFault`]s abort a pass,
//! [`SetupError`]s reject a misconfigured pipeline before it runs.
//! Recoverable per-operator problems never surface here; they become
//! [`inkstream_core::ProcessWarning`]s on the processor.

use inkstream_core::{SetupError, StreamFault};
use thiserror::Error;

/// Error returned by [`crate::ContentStreamProcessor`] entry points.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Structural fault in the content stream syntax. Events delivered
    /// before the fault remain valid.
    #[error("content stream fault: {0}")]
    Stream(#[from] StreamFault),

    /// The pipeline was misconfigured before processing began.
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),
}
