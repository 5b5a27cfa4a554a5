//! Error taxonomy (spec.md §7).
//!
//! [`CoreError`] covers recoverable failures: every call site treats it as
//! "log and revert or postpone", never as a reason to unwind out of a
//! manage/render/commit sequence. [`ProtocolError`] covers the wire error
//! codes a conforming embedder posts back to the offending client; the
//! crate never sends these itself since wire serialization is out of
//! scope, it only classifies which code applies.

use thiserror::Error;

/// Recoverable failures raised while driving the transaction/output
/// pipelines. None of these are fatal; see spec.md §7.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("backend rejected output commit: {0}")]
    BackendCommitFailed(String),

    #[error("swapchain manager failed to prepare batch state: {0}")]
    SwapchainPrepareFailed(String),

    #[error("failed to allocate a WM protocol object")]
    WmObjectAllocationFailed,

    #[error("output configuration rejected: {0}")]
    OutputConfigRejected(String),
}

/// Wire-level protocol errors (spec.md §6). An embedder posts the
/// matching error code on the named object and disconnects the client's
/// further non-destroy requests to it (see [`crate::wm_bridge::WmBridge`]
/// invariant I-B2/I-B3).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("negative dimension in propose_dimensions")]
    InvalidDimensions,

    #[error("negative border width in set_borders")]
    InvalidBorder,

    #[error("negative clip box dimensions")]
    InvalidClipBox,

    #[error("get_window_node called twice for the same node")]
    NodeExists,
}
