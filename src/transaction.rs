//! `TransactionEngine` — the two-phase manage/render sequence driver
//! (spec.md §4.3, §5).
//!
//! The manage sequence pushes scheduled windowing/output state to the WM
//! and waits for `ack_update`; the render sequence configures clients and
//! outputs toward the WM's committed requests and waits for every tracked
//! configure to be acked+committed (or for the transaction timeout),
//! before calling [`OutputManager::commit_output_state`] to realize
//! everything at once.

use std::time::{Duration, Instant};

use smithay::utils::SERIAL_COUNTER;
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::ids::{OutputId, WindowId};
use crate::output::{HardwareBackend, OutputManager, SwapchainManager};
use crate::scene::SceneTree;
use crate::window::{ConfigureTarget, WindowLifecycle};
use crate::wm_bridge::WmBridge;

/// What a manage sequence produced (spec.md §4.3 step 1): the serial the
/// WM must `ack_update`, plus the outputs whose `sent` state was just
/// promoted — the caller threads this list into
/// [`TransactionEngine::commit_transaction`]'s `sent_output_ids`.
#[derive(Debug, Clone)]
pub struct ManageSequenceOutcome {
    pub serial: smithay::utils::Serial,
    pub sent_outputs: Vec<OutputId>,
}

/// Why a render sequence ended (spec.md §4.3/§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSequenceOutcome {
    /// Every tracked configure was acked and committed before the engine
    /// ran out of other work to wait on.
    AllSettled,
    /// The transaction timeout elapsed with configures still in flight;
    /// the engine committed using clients' current committed geometry.
    TimedOut,
    /// Nothing was in flight — a manage sequence produced no windowing
    /// changes worth a render sequence.
    Noop,
}

/// Drives the manage/render sequence cadence described in spec.md §4.3.
/// Stateless aside from the render-sequence deadline, since the counters
/// and per-window state copies live on [`WmBridge`]/[`crate::window::WindowRecord`].
pub struct TransactionEngine {
    deadline: Option<Instant>,
}

impl TransactionEngine {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Runs one manage sequence (spec.md §4.3 step 1): for every output,
    /// diffs `scheduled` against `sent`, creates its WM object on first
    /// exposure, and promotes `sent ← scheduled`; for every window, diffs
    /// `pending` against `sent`, creates its WM object on first exposure,
    /// and promotes `sent ← pending`. Emits `update(serial)` via the
    /// returned outcome if anything changed. Returns `None` if there was
    /// nothing to send (idempotence, spec.md §8 "coalesced dirties").
    pub fn run_manage_sequence(
        &mut self,
        bridge: &mut WmBridge,
        outputs: &mut OutputManager,
    ) -> Option<ManageSequenceOutcome> {
        if !bridge.take_windowing_dirty() {
            return None;
        }

        let mut any_changed = false;

        let sent_outputs: Vec<OutputId> = outputs.ordered_ids().to_vec();
        for &id in &sent_outputs {
            let Some(record) = outputs.get_mut(id) else { continue };
            if record.sent != record.scheduled {
                record.sent = record.scheduled.clone();
                any_changed = true;
            }
        }
        for &id in &sent_outputs {
            let already_sent = outputs.get(id).map(|r| r.in_wm_sent_list).unwrap_or(true);
            if !already_sent {
                bridge.create_output_object(id);
                if let Some(record) = outputs.get_mut(id) {
                    record.in_wm_sent_list = true;
                }
            }
        }

        let window_ids = bridge.window_ids();
        for &id in &window_ids {
            let changed = match bridge.window_mut(id) {
                Some(window) if window.pending != window.sent => {
                    window.sent = window.pending.clone();
                    true
                }
                _ => false,
            };
            any_changed |= changed;

            let needs_object = bridge.window(id).map(|w| !w.wm_object_created).unwrap_or(false);
            if needs_object {
                bridge.create_window_object(id);
                if let Some(window) = bridge.window_mut(id) {
                    window.wm_object_created = true;
                }
            }
        }

        if !any_changed {
            return None;
        }

        let serial = SERIAL_COUNTER.next_serial();
        bridge.begin_manage_sequence(serial);
        debug!(?serial, outputs = sent_outputs.len(), "manage sequence: update emitted");
        Some(ManageSequenceOutcome { serial, sent_outputs })
    }

    /// Starts the render sequence after the WM's `commit` request: promotes
    /// `inflight ← committed` for every touched window, computes each
    /// window's `ConfigureTarget` (folding in seat focus per I-W3), and
    /// drives each adapter's `configure()`. Arms the transaction timeout.
    pub fn begin_render_sequence(
        &mut self,
        bridge: &mut WmBridge,
        touched: &[WindowId],
        scene: &mut dyn SceneTree,
        config: &CoreConfig,
    ) -> RenderSequenceOutcome {
        if touched.is_empty() {
            return RenderSequenceOutcome::Noop;
        }

        let focused = bridge.focused_windows().clone();
        let mut tracked = 0u32;

        for &id in touched {
            let activated = focused.contains(&id);
            let Some(window) = bridge.window_mut(id) else { continue };
            let resizing = window.committed.proposed_size.is_some()
                && window.committed.proposed_size != window.current.proposed_size;
            window.inflight = window.committed.clone();
            window.inflight.activated = activated;
            if matches!(window.lifecycle, WindowLifecycle::Init) {
                window.lifecycle = WindowLifecycle::Ready;
            }

            // Save the live surface so a resize doesn't flash unscaled
            // content while the client catches up (spec.md §4.3 "save its
            // surface tree", §8 scenario 2 "saved surfaces are dropped").
            if resizing && window.scene.saved_surface.is_none() {
                window.scene.saved_surface = Some(scene.save_buffers(window.scene.surface));
            }

            let size = window
                .inflight
                .proposed_size
                .unwrap_or_else(|| (window.inflight.position.0, window.inflight.position.1));
            let target = ConfigureTarget {
                width: size.0,
                height: size.1,
                activated: window.inflight.activated,
                maximized: window.inflight.maximized,
                fullscreen: window.inflight.fullscreen_output,
                tiled: window.inflight.tiled_edges,
                resizing: window.inflight.resizing,
                bounds: None,
            };

            if let Some(adapter) = bridge.adapter_mut(id) {
                if adapter.configure(&target) {
                    tracked += 1;
                }
            }
        }

        bridge.transaction_mut().inflight_configures = tracked;

        if tracked == 0 {
            return RenderSequenceOutcome::AllSettled;
        }

        self.deadline = Some(Instant::now() + config.transaction_timeout);
        info!(tracked, "render sequence: configures dispatched, timeout armed");
        RenderSequenceOutcome::AllSettled
    }

    /// Whether the armed transaction timeout has elapsed. The caller
    /// (the embedder's event loop) polls this; there is no timer-fd
    /// plumbing in this crate (spec.md §1: event loop wiring is assumed).
    pub fn timeout_elapsed(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// Called once every tracked configure for a window has been acked and
    /// committed. Decrements the in-flight counter; once it reaches zero
    /// the caller should call [`Self::commit_transaction`].
    pub fn notify_window_settled(&mut self, bridge: &mut WmBridge) {
        let t = bridge.transaction_mut();
        t.inflight_configures = t.inflight_configures.saturating_sub(1);
    }

    /// Commits the transaction (spec.md §4.3 step 3): promotes
    /// `current ← inflight` for every touched window, realizes the output
    /// batch via [`OutputManager::commit_output_state`], clears the
    /// deadline, and restarts a fresh manage sequence immediately if
    /// `pending_state_dirty` was set mid-transaction (spec.md §5).
    pub fn commit_transaction(
        &mut self,
        bridge: &mut WmBridge,
        touched: &[WindowId],
        outputs: &mut OutputManager,
        sent_output_ids: &[crate::ids::OutputId],
        scene: &mut dyn SceneTree,
        swapchain: &mut dyn SwapchainManager,
        backend: &mut dyn HardwareBackend,
        config: &CoreConfig,
    ) -> crate::output::CommitOutcome {
        for &id in touched {
            let actual_size = bridge.adapter_mut(id).map(|a| a.committed_size());
            let saved = bridge.window(id).and_then(|w| w.scene.saved_surface);
            if let Some(window) = bridge.window_mut(id) {
                if window.inflight.close {
                    window.lifecycle = WindowLifecycle::Closing;
                }

                let old_pos = window.current.position;
                let requested_size = window.inflight.proposed_size;
                let edges = window.inflight.resize_edges;

                let mut new_state = std::mem::take(&mut window.inflight);
                if let (Some((aw, ah)), Some((ow, oh))) = (actual_size, requested_size) {
                    let mut pos = old_pos;
                    if edges.left {
                        pos.0 = old_pos.0 + (ow - aw);
                    }
                    if edges.top {
                        pos.1 = old_pos.1 + (oh - ah);
                    }
                    new_state.position = pos;
                    new_state.proposed_size = Some((aw, ah));
                } else if let Some(size) = actual_size {
                    new_state.proposed_size = Some(size);
                }

                window.current = new_state;
                window.mapped = !window.current.hidden;
            }
            if let Some(saved_node) = saved {
                scene.drop_saved_buffers(saved_node);
                if let Some(window) = bridge.window_mut(id) {
                    window.scene.saved_surface = None;
                }
            }
        }

        self.deadline = None;
        let t = bridge.transaction_mut();
        t.inflight_configures = 0;
        let restart = t.pending_state_dirty;
        t.pending_state_dirty = false;

        if restart {
            bridge.mark_windowing_dirty();
        }

        let outcome = outputs.commit_output_state(sent_output_ids, scene, swapchain, backend, config);
        if outcome.windowing_dirty {
            bridge.mark_windowing_dirty();
        }
        outcome
    }

    /// Forces the timeout to fire immediately; used by tests to exercise
    /// the timeout path deterministically (spec.md §8 "configure timeout").
    pub fn force_timeout(&mut self) {
        self.deadline = Some(Instant::now() - Duration::from_millis(1));
    }

    /// Settles every still-inflight window using its adapter's current
    /// committed geometry rather than the requested one (spec.md §4.2/§4.3:
    /// never draw a border around a size the client never adopted).
    pub fn settle_on_timeout(&mut self, bridge: &mut WmBridge, touched: &[WindowId]) -> RenderSequenceOutcome {
        warn!("transaction timeout: committing with current client geometry");
        for &id in touched {
            let committed_size = bridge.adapter_mut(id).map(|a| a.committed_size());
            if let (Some(window), Some(size)) = (bridge.window_mut(id), committed_size) {
                window.inflight.proposed_size = Some(size);
            }
        }
        bridge.transaction_mut().inflight_configures = 0;
        self.deadline = None;
        RenderSequenceOutcome::TimedOut
    }
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::ids::OutputId;
    use crate::output::{HwHandle, ModeSelection, OutputState};
    use crate::scene::{SceneLayer, TestScene};
    use crate::window::adapter::TestXdgAdapter;
    use crate::window::WindowSceneNodes;

    struct NoopBackend;
    impl HardwareBackend for NoopBackend {
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

    fn make_window(bridge: &mut WmBridge, scene: &mut TestScene) -> WindowId {
        let mut ids: slotmap::SlotMap<WindowId, ()> = slotmap::SlotMap::with_key();
        let id = ids.insert(());
        let nodes = WindowSceneNodes {
            main: scene.create_node(SceneLayer::Normal),
            surface: scene.create_node(SceneLayer::Normal),
            saved_surface: None,
            border_left: scene.create_node(SceneLayer::Normal),
            border_right: scene.create_node(SceneLayer::Normal),
            border_top: scene.create_node(SceneLayer::Normal),
            border_bottom: scene.create_node(SceneLayer::Normal),
            popups: scene.create_node(SceneLayer::Popups),
            fullscreen_background: None,
        };
        let record = crate::window::WindowRecord::new(id, nodes);
        bridge.insert_window(record, Box::new(TestXdgAdapter::new((0, 0))))
    }

    #[test]
    fn manage_sequence_is_noop_without_dirty_windows() {
        let mut bridge = WmBridge::new();
        let mut outputs = OutputManager::new();
        let mut engine = TransactionEngine::new();
        assert!(engine.run_manage_sequence(&mut bridge, &mut outputs).is_none());
    }

    #[test]
    fn manage_sequence_emits_serial_when_pending_differs_from_sent() {
        let mut scene = TestScene::new();
        let mut bridge = WmBridge::new();
        let mut outputs = OutputManager::new();
        let id = make_window(&mut bridge, &mut scene);
        bridge.window_mut(id).unwrap().pending.proposed_size = Some((800, 600));
        bridge.mark_windowing_dirty();

        let mut engine = TransactionEngine::new();
        assert!(engine.run_manage_sequence(&mut bridge, &mut outputs).is_some());
        assert_eq!(bridge.window(id).unwrap().sent.proposed_size, Some((800, 600)));
        assert!(bridge.window(id).unwrap().wm_object_created);
    }

    #[test]
    fn manage_sequence_creates_output_wm_object_on_first_exposure() {
        let mut scene = TestScene::new();
        let mut bridge = WmBridge::new();
        let mut outputs = OutputManager::new();
        struct AlwaysOk;
        impl HardwareBackend for AlwaysOk {
            fn try_modeset(&mut self, _hw: HwHandle, _mode: ModeSelection) -> Result<(), CoreError> {
                Ok(())
            }
            fn commit(&mut self, _states: &[(OutputId, OutputState)]) -> Result<(), CoreError> {
                Ok(())
            }
        }
        let mut backend = AlwaysOk;
        let id = outputs.on_new_output(
            HwHandle(1),
            &[ModeSelection::Standard { width: 1920, height: 1080, refresh_mhz: 60000 }],
            &mut scene,
            &mut backend,
        );
        bridge.mark_windowing_dirty();

        let mut engine = TransactionEngine::new();
        let outcome = engine.run_manage_sequence(&mut bridge, &mut outputs).unwrap();
        assert_eq!(outcome.sent_outputs, vec![id]);
        assert!(outputs.get(id).unwrap().in_wm_sent_list);
        assert_eq!(outputs.get(id).unwrap().sent, outputs.get(id).unwrap().scheduled);
    }

    #[test]
    fn single_window_configure_then_settle() {
        let mut scene = TestScene::new();
        let mut bridge = WmBridge::new();
        let id = make_window(&mut bridge, &mut scene);
        let config = CoreConfig::default();
        let mut engine = TransactionEngine::new();

        bridge.propose_dimensions(id, 800, 600).unwrap();
        let touched = bridge.wm_commit();
        assert_eq!(touched, vec![id]);

        let outcome = engine.begin_render_sequence(&mut bridge, &touched, &mut scene, &config);
        assert_eq!(outcome, RenderSequenceOutcome::AllSettled);
        assert!(bridge.transaction().inflight_configures >= 1);

        bridge
            .adapter_mut(id)
            .unwrap()
            .as_any_mut()
            .downcast_mut::<TestXdgAdapter>()
            .unwrap()
            .client_commit((800, 600));

        let mut outputs = OutputManager::new();
        let mut out_swap = NoopSwapchain;
        let mut out_backend = NoopBackend;
        engine.notify_window_settled(&mut bridge);
        engine.commit_transaction(
            &mut bridge,
            &touched,
            &mut outputs,
            &[],
            &mut scene,
            &mut out_swap,
            &mut out_backend,
            &config,
        );

        assert_eq!(bridge.window(id).unwrap().current.proposed_size, Some((800, 600)));
        assert!(bridge.window(id).unwrap().mapped);
    }

    #[test]
    fn timeout_uses_client_committed_geometry_not_requested() {
        let mut scene = TestScene::new();
        let mut bridge = WmBridge::new();
        let id = make_window(&mut bridge, &mut scene);
        let config = CoreConfig::default();
        let mut engine = TransactionEngine::new();

        bridge.propose_dimensions(id, 1000, 1000).unwrap();
        let touched = bridge.wm_commit();
        engine.begin_render_sequence(&mut bridge, &touched, &mut scene, &config);

        engine.force_timeout();
        assert!(engine.timeout_elapsed(Instant::now()));

        assert_eq!(engine.settle_on_timeout(&mut bridge, &touched), RenderSequenceOutcome::TimedOut);
        assert_eq!(bridge.window(id).unwrap().inflight.proposed_size, Some((0, 0)));
    }
}
