use super::{LockRenderState, OutputState};
use crate::ids::SceneNodeId;

/// Per-output state triple plus lock-render FSM and membership flags
/// (spec.md §3 `OutputRecord`).
#[derive(Debug, Clone)]
pub struct OutputRecord {
    /// Next state to propose to the WM.
    pub scheduled: OutputState,
    /// State proposed in the most recent manage sequence.
    pub sent: OutputState,
    /// State reflected in the scene graph and hardware.
    pub current: OutputState,

    pub lock_render_state: LockRenderState,
    pub gamma_dirty: bool,

    /// Handle into the external scene graph for this output's subtree.
    pub scene_output: SceneNodeId,

    /// Membership in the all-outputs list maintained by
    /// [`crate::output::OutputManager`].
    pub in_all_list: bool,
    /// Membership in the currently-laid-out (enabled) list.
    pub in_active_list: bool,
    /// Whether a WM protocol object has been created for this output.
    pub in_wm_sent_list: bool,

    /// Set once hardware destroy has been observed; the record is freed
    /// once `destroying` has also been sent and acknowledged in a manage
    /// sequence (spec.md §4.1 `on_output_destroy`).
    pub hw_gone: bool,
}

impl OutputRecord {
    pub fn new(scene_output: SceneNodeId) -> Self {
        Self {
            scheduled: OutputState::disabled(),
            sent: OutputState::disabled(),
            current: OutputState::disabled(),
            lock_render_state: LockRenderState::Unlocked,
            gamma_dirty: false,
            scene_output,
            in_all_list: true,
            in_active_list: false,
            in_wm_sent_list: false,
            hw_gone: false,
        }
    }

    /// I-O1: `current.lifecycle != Destroying` implies the scene handle
    /// is still valid. We can't check handle validity here (that's the
    /// scene graph's job); we assert the cheaper half of the invariant —
    /// a destroying record never re-enters the active list.
    pub fn assert_invariants(&self) {
        debug_assert!(
            !(matches!(self.current.lifecycle, super::OutputLifecycle::Destroying) && self.in_active_list),
            "a destroying output must not remain in the active (laid-out) list",
        );
    }

    /// Ready to be freed: hardware is gone and the `destroying` state has
    /// round-tripped through a manage sequence.
    pub fn ready_to_free(&self) -> bool {
        self.hw_gone && self.sent.lifecycle == super::OutputLifecycle::Destroying
    }
}
