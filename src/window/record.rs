use super::{WindowLifecycle, WmState};
use crate::ids::{ForeignToplevelId, SceneNodeId, WindowId};

/// Scene nodes owned by a window (spec.md §3: "main subtree, surface
/// subtree, saved-surface subtree, four border rectangles, popup
/// subtree, optional fullscreen background rectangle").
#[derive(Debug, Clone)]
pub struct WindowSceneNodes {
    pub main: SceneNodeId,
    pub surface: SceneNodeId,
    pub saved_surface: Option<SceneNodeId>,
    pub border_left: SceneNodeId,
    pub border_right: SceneNodeId,
    pub border_top: SceneNodeId,
    pub border_bottom: SceneNodeId,
    pub popups: SceneNodeId,
    pub fullscreen_background: Option<SceneNodeId>,
}

/// Per-window state quadruple — five value copies plus lifecycle/scene
/// bookkeeping (spec.md §3 `WindowRecord`).
pub struct WindowRecord {
    pub id: WindowId,

    /// Staged for the next manage sequence.
    pub pending: WmState,
    /// Last values sent to the WM (for diffing).
    pub sent: WmState,
    /// WM requests accumulated since the last WM commit.
    pub uncommitted: WmState,
    /// WM requests committed atomically at WM commit.
    pub committed: WmState,
    /// Committed state being propagated to the surface, awaiting client
    /// ack.
    pub inflight: WmState,
    /// State realized in the scene graph.
    pub current: WmState,

    pub lifecycle: WindowLifecycle,
    pub mapped: bool,
    pub destroying: bool,
    pub initialized: bool,

    pub scene: WindowSceneNodes,

    /// Handle into the embedder's `ext_foreign_toplevel_list_v1` instance
    /// for this window, if one has been advertised (spec.md §3).
    pub foreign_toplevel: Option<ForeignToplevelId>,

    /// Whether a `Window` WM protocol object has been created for this
    /// record yet (spec.md §4.3 "create the WM object on first exposure").
    pub wm_object_created: bool,

    /// True once this window's WM fields have been touched since the
    /// last manage sequence and need to be (re-)sent.
    pub windowing_dirty: bool,
}

impl WindowRecord {
    pub fn new(id: WindowId, scene: WindowSceneNodes) -> Self {
        Self {
            id,
            pending: WmState::default(),
            sent: WmState::default(),
            uncommitted: WmState::default(),
            committed: WmState::default(),
            inflight: WmState::default(),
            current: WmState::default(),
            lifecycle: WindowLifecycle::Init,
            mapped: false,
            destroying: false,
            initialized: false,
            scene,
            foreign_toplevel: None,
            wm_object_created: false,
            windowing_dirty: true,
        }
    }

    /// I-W1: `destroying ⇒` no scene-graph presence. We model "impl =
    /// none" as both subtrees disabled; callers must have already
    /// reparented this record to `Hidden` before setting `destroying`.
    pub fn assert_destroying_invariant(&self, main_enabled: bool, surface_enabled: bool) {
        debug_assert!(
            !self.destroying || (!main_enabled && !surface_enabled),
            "a destroying window must not keep scene nodes enabled",
        );
    }

    /// I-W2: a window with a zero current box and `mapped = false` must
    /// not appear outside the hidden subtree. Checked by the caller which
    /// knows the window's current scene layer; this just states the
    /// predicate half of the invariant.
    pub fn should_be_hidden(&self) -> bool {
        !self.mapped && self.current.proposed_size.is_none() && self.current == Default::default()
    }

    /// Re-entering `mapped` on a re-map resets the re-entrant portion of
    /// the lifecycle (spec.md §3: "re-entrant on re-map").
    pub fn remap(&mut self) {
        self.lifecycle = WindowLifecycle::Ready;
        self.mapped = false;
        self.destroying = false;
    }
}
