//! Thin adapter over the external scene graph (spec.md §4, "SceneTree
//! bindings").
//!
//! The real scene-graph rasterizer (the wlroots-equivalent named in
//! spec.md §1) is an external collaborator; this module only describes
//! the operations the rest of the core needs from it: create/destroy
//! nodes, position them, enable/disable them, reparent them between the
//! fixed top-level subtrees, and save/drop a reference-counted copy of a
//! surface's current buffers for frame-perfect replacement (spec.md §4.3,
//! §5 "saved-surface lifetime").
//!
//! `SceneTree` is a trait so tests can exercise the engine against an
//! in-memory double instead of a real renderer.

use crate::ids::SceneNodeId;
use smithay::utils::{Logical, Point};

/// The fixed top-level subtrees a node can be reparented between. Outputs
/// own `Background`..`Overlay`/`Popups`; `Hidden` holds unmapped/evacuated
/// windows (spec.md I-W2); `Locked` is the session-lock subtree (spec.md
/// §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneLayer {
    Hidden,
    Background,
    Bottom,
    Normal,
    Top,
    Overlay,
    Popups,
    Fullscreen,
    Locked,
}

/// Operations the transaction engine, output manager, and session-lock
/// coordinator need from the external scene graph.
pub trait SceneTree {
    /// Create a new, initially-disabled node parented under `layer`.
    fn create_node(&mut self, layer: SceneLayer) -> SceneNodeId;

    /// Destroy a node and all its children.
    fn destroy_node(&mut self, node: SceneNodeId);

    /// Move a node to a new logical position relative to its parent.
    fn set_position(&mut self, node: SceneNodeId, position: Point<i32, Logical>);

    /// Enable or disable a node's subtree for rendering.
    fn set_enabled(&mut self, node: SceneNodeId, enabled: bool);

    /// Reparent a node to a different top-level layer, preserving order
    /// within the new layer (appended on top).
    fn reparent(&mut self, node: SceneNodeId, layer: SceneLayer);

    /// Take a reference-counted snapshot of a surface node's current
    /// buffers, to be shown in place of the live surface until the
    /// client's next commit is ready (spec.md §4.3 "save its surface
    /// tree"). Returns a new node holding the snapshot.
    fn save_buffers(&mut self, surface_node: SceneNodeId) -> SceneNodeId;

    /// Release a saved-buffer snapshot created by [`Self::save_buffers`].
    /// The underlying buffer references are dropped once this call
    /// returns (spec.md §5 "exactly one reference per saved surface").
    fn drop_saved_buffers(&mut self, saved_node: SceneNodeId);
}

/// An in-memory [`SceneTree`] used by unit/integration tests. Tracks just
/// enough bookkeeping (position, enabled, layer, outstanding saved-buffer
/// count) to assert on in test scenarios; it does not rasterize anything.
#[derive(Debug, Default)]
pub struct TestScene {
    nodes: slotmap::SlotMap<SceneNodeId, TestSceneNode>,
}

#[derive(Debug, Clone)]
pub struct TestSceneNode {
    pub layer: SceneLayer,
    pub position: Point<i32, Logical>,
    pub enabled: bool,
    pub is_saved_snapshot: bool,
}

impl TestScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: SceneNodeId) -> Option<&TestSceneNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SceneTree for TestScene {
    fn create_node(&mut self, layer: SceneLayer) -> SceneNodeId {
        self.nodes.insert(TestSceneNode {
            layer,
            position: (0, 0).into(),
            enabled: false,
            is_saved_snapshot: false,
        })
    }

    fn destroy_node(&mut self, node: SceneNodeId) {
        self.nodes.remove(node);
    }

    fn set_position(&mut self, node: SceneNodeId, position: Point<i32, Logical>) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.position = position;
        }
    }

    fn set_enabled(&mut self, node: SceneNodeId, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.enabled = enabled;
        }
    }

    fn reparent(&mut self, node: SceneNodeId, layer: SceneLayer) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.layer = layer;
        }
    }

    fn save_buffers(&mut self, surface_node: SceneNodeId) -> SceneNodeId {
        let layer = self.nodes.get(surface_node).map(|n| n.layer).unwrap_or(SceneLayer::Hidden);
        self.nodes.insert(TestSceneNode {
            layer,
            position: (0, 0).into(),
            enabled: true,
            is_saved_snapshot: true,
        })
    }

    fn drop_saved_buffers(&mut self, saved_node: SceneNodeId) {
        self.nodes.remove(saved_node);
    }
}
