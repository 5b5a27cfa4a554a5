//! river-core — the transactional windowing core of a dynamic tiling
//! Wayland compositor.
//!
//! This crate owns the two-phase transaction engine, the output modeset
//! pipeline, and the session-lock render state machine. It does not
//! dispatch Wayland wire protocol, rasterize anything, or read input —
//! those are the embedder's job, modeled here only as the trait seams
//! ([`scene::SceneTree`], [`output::HardwareBackend`],
//! [`output::SwapchainManager`], [`window::WindowAdapter`]) the engine
//! drives.

pub mod config;
pub mod error;
pub mod ids;
pub mod output;
pub mod scene;
pub mod session_lock;
pub mod transaction;
pub mod window;
pub mod wm_bridge;

pub use config::CoreConfig;
pub use error::{CoreError, ProtocolError};
pub use output::OutputManager;
pub use session_lock::LockManager;
pub use transaction::TransactionEngine;
pub use wm_bridge::WmBridge;

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
