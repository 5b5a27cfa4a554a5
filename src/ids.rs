//! Stable identifiers for windowing-core records.
//!
//! The upstream pattern of stashing an owning pointer in a backend `data`
//! slot (and recovering the containing struct from a listener via field
//! offset) has no safe equivalent in Rust. We replace both with slotmap
//! keys: every record lives in a slotmap owned by [`crate::wm_bridge::WmBridge`]
//! or [`crate::output::OutputManager`], and every cross-reference (scene
//! listener, hardware handle, protocol object) stores one of these keys
//! instead of a raw back-pointer.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a [`crate::window::WindowRecord`].
    pub struct WindowId;

    /// Key for an [`crate::output::OutputRecord`].
    pub struct OutputId;

    /// Key for a node in the external scene graph (see [`crate::scene`]).
    pub struct SceneNodeId;

    /// Key for a `river_window_manager_v1`-family protocol object (see
    /// [`crate::wm_bridge`]).
    pub struct WmObjectId;

    /// Key for an `ext_foreign_toplevel_list_v1` handle owned by the
    /// embedder (see [`crate::window::WindowRecord::foreign_toplevel`]).
    pub struct ForeignToplevelId;
}
