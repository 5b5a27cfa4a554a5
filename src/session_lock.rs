//! Session-lock render-state coordination (spec.md §4.5).
//!
//! `LockManager` holds the global `unlocked / waiting_for_blank /
//! waiting_for_lock_surfaces / locked` state machine and drives each
//! output's `lock_render_state` toward the buffer class the present
//! policy table calls for. It never touches the scene graph directly —
//! callers ask [`LockManager::drive_output`] what to submit, submit it
//! through the scene/backend, then report back via
//! [`LockManager::on_present`].

use tracing::info;

use crate::ids::OutputId;
use crate::output::{LockRenderState, OutputManager};

/// The four states named in spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockManagerState {
    Unlocked,
    WaitingForBlank,
    WaitingForLockSurfaces,
    Locked,
}

/// What an output's next submitted buffer should be, per the present
/// policy table in spec.md §4.5. `None` means nothing new needs
/// submitting this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentAction {
    SubmitNormal,
    SubmitBlank,
    SubmitLockSurface,
    None,
}

/// Global session-lock coordinator (spec.md §4.5 `lock_manager`).
pub struct LockManager {
    state: LockManagerState,
}

impl LockManager {
    pub fn new() -> Self {
        Self { state: LockManagerState::Unlocked }
    }

    pub fn state(&self) -> LockManagerState {
        self.state
    }

    /// `ext_session_lock_v1.lock` — begins the lock sequence. A no-op if
    /// already locking/locked.
    pub fn request_lock(&mut self) {
        if self.state == LockManagerState::Unlocked {
            info!("session lock requested");
            self.state = LockManagerState::WaitingForBlank;
        }
    }

    /// `ext_session_lock_v1.unlock_and_destroy` — always succeeds
    /// immediately; per-output content catches up on the next present.
    pub fn request_unlock(&mut self) {
        info!("session unlocked");
        self.state = LockManagerState::Unlocked;
    }

    /// Decides what this output should submit next, and stages its
    /// `lock_render_state` into the matching `pending_*` value (spec.md
    /// §4.5 present policy table). Returns `PresentAction::None` when the
    /// output is already in the state this cycle calls for.
    pub fn drive_output(&self, render_state: &mut LockRenderState) -> PresentAction {
        match self.state {
            LockManagerState::Unlocked => match *render_state {
                LockRenderState::Blanked => {
                    *render_state = LockRenderState::PendingUnlock;
                    PresentAction::SubmitNormal
                }
                LockRenderState::Unlocked | LockRenderState::PendingUnlock => PresentAction::None,
                _ => {
                    *render_state = LockRenderState::PendingUnlock;
                    PresentAction::SubmitNormal
                }
            },
            LockManagerState::WaitingForBlank => {
                if *render_state == LockRenderState::Blanked {
                    PresentAction::None
                } else {
                    *render_state = LockRenderState::PendingBlank;
                    PresentAction::SubmitBlank
                }
            }
            LockManagerState::WaitingForLockSurfaces => {
                if *render_state == LockRenderState::LockSurface {
                    PresentAction::None
                } else {
                    *render_state = LockRenderState::PendingLockSurface;
                    PresentAction::SubmitLockSurface
                }
            }
            LockManagerState::Locked => PresentAction::None,
        }
    }

    /// Called once a submitted buffer actually presents: settles the
    /// output's `pending_*` state and re-evaluates whether the global
    /// state machine can advance (`maybe_lock`).
    pub fn on_present(&mut self, output: OutputId, outputs: &mut OutputManager) {
        if let Some(record) = outputs.get_mut(output) {
            record.lock_render_state = match record.lock_render_state {
                LockRenderState::PendingUnlock => LockRenderState::Unlocked,
                LockRenderState::PendingBlank => LockRenderState::Blanked,
                LockRenderState::PendingLockSurface => LockRenderState::LockSurface,
                other => other,
            };
        }
        self.maybe_lock(outputs);
    }

    fn maybe_lock(&mut self, outputs: &OutputManager) {
        let settled = |target: LockRenderState| {
            outputs.ordered_ids().iter().all(|&id| {
                outputs
                    .get(id)
                    .map(|r| !r.in_active_list || r.lock_render_state == target)
                    .unwrap_or(true)
            })
        };

        match self.state {
            LockManagerState::WaitingForBlank if settled(LockRenderState::Blanked) => {
                info!("all active outputs blanked, requesting lock surfaces");
                self.state = LockManagerState::WaitingForLockSurfaces;
            }
            LockManagerState::WaitingForLockSurfaces if settled(LockRenderState::LockSurface) => {
                info!("all active outputs presented lock surfaces, session locked");
                self.state = LockManagerState::Locked;
            }
            _ => {}
        }
    }

    /// I-L1: while locking/locked, the normal scene subtree must be
    /// disabled and the locked subtree enabled on every active output.
    /// Called by the renderer ahead of every present.
    pub fn assert_scene_invariant(&self, normal_subtree_enabled: bool, locked_subtree_enabled: bool) {
        let must_be_locked = matches!(
            self.state,
            LockManagerState::Locked
                | LockManagerState::WaitingForLockSurfaces
                | LockManagerState::WaitingForBlank
        );
        debug_assert!(
            !must_be_locked || (!normal_subtree_enabled && locked_subtree_enabled),
            "I-L1 violated: normal subtree visible while session-lock is active",
        );
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::output::{HardwareBackend, HwHandle, ModeSelection, OutputState, SwapchainManager};
    use crate::scene::TestScene;

    struct AlwaysOk;
    impl HardwareBackend for AlwaysOk {
        fn try_modeset(&mut self, _hw: HwHandle, _mode: ModeSelection) -> Result<(), CoreError> {
            Ok(())
        }
        fn commit(&mut self, _states: &[(OutputId, OutputState)]) -> Result<(), CoreError> {
            Ok(())
        }
    }
    struct NoopSwapchain;
    impl SwapchainManager for NoopSwapchain {
        fn prepare(&mut self, _states: &[(OutputId, OutputState)]) -> Result<(), CoreError> {
            Ok(())
        }
        fn apply(&mut self) {}
    }

    fn enabled_output(outputs: &mut OutputManager, scene: &mut TestScene) -> OutputId {
        let mut backend = AlwaysOk;
        let id = outputs.on_new_output(
            HwHandle(1),
            &[ModeSelection::Standard { width: 1920, height: 1080, refresh_mhz: 60000 }],
            scene,
            &mut backend,
        );
        outputs.get_mut(id).unwrap().sent = outputs.get(id).unwrap().scheduled.clone();
        let mut swapchain = NoopSwapchain;
        outputs.commit_output_state(&[id], scene, &mut swapchain, &mut backend, &crate::config::CoreConfig::default());
        id
    }

    #[test]
    fn lock_sequence_reaches_locked_once_blank_and_lock_surface_settle() {
        let mut scene = TestScene::new();
        let mut outputs = OutputManager::new();
        let id = enabled_output(&mut outputs, &mut scene);

        let mut lock = LockManager::new();
        lock.request_lock();
        assert_eq!(lock.state(), LockManagerState::WaitingForBlank);

        let action = lock.drive_output(&mut outputs.get_mut(id).unwrap().lock_render_state);
        assert_eq!(action, PresentAction::SubmitBlank);
        lock.on_present(id, &mut outputs);
        assert_eq!(lock.state(), LockManagerState::WaitingForLockSurfaces);

        let action = lock.drive_output(&mut outputs.get_mut(id).unwrap().lock_render_state);
        assert_eq!(action, PresentAction::SubmitLockSurface);
        lock.on_present(id, &mut outputs);
        assert_eq!(lock.state(), LockManagerState::Locked);
    }

    #[test]
    fn unlock_resets_state_immediately() {
        let mut lock = LockManager::new();
        lock.request_lock();
        lock.request_unlock();
        assert_eq!(lock.state(), LockManagerState::Unlocked);
    }

    #[test]
    #[should_panic(expected = "I-L1")]
    fn scene_invariant_panics_when_normal_subtree_visible_while_locking() {
        let mut lock = LockManager::new();
        lock.request_lock();
        lock.assert_scene_invariant(true, false);
    }

    #[test]
    fn output_power_change_forces_blanked_and_blocks_premature_unlock_settle() {
        let mut scene = TestScene::new();
        let mut outputs = OutputManager::new();
        let id = enabled_output(&mut outputs, &mut scene);
        outputs.on_output_power_change(id);
        assert_eq!(outputs.get(id).unwrap().lock_render_state, LockRenderState::Blanked);
    }
}
