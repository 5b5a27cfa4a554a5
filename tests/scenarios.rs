//! End-to-end scenarios from spec.md §8, driven entirely through the
//! public API against the in-memory test doubles.

use river_core::config::CoreConfig;
use river_core::ids::WindowId;
use river_core::output::{CommitOutcome, HardwareBackend, HwHandle, ModeSelection, OutputState, SwapchainManager};
use river_core::scene::{SceneLayer, SceneTree, TestScene};
use river_core::session_lock::{LockManager, LockManagerState, PresentAction};
use river_core::transaction::{RenderSequenceOutcome, TransactionEngine};
use river_core::window::adapter::TestXdgAdapter;
use river_core::window::{BorderRects, Edges, WindowRecord, WindowSceneNodes};
use river_core::wm_bridge::WmBridge;
use river_core::{CoreError, OutputManager};

struct AlwaysOk;
impl HardwareBackend for AlwaysOk {
    fn try_modeset(&mut self, _hw: HwHandle, _mode: ModeSelection) -> Result<(), CoreError> {
        Ok(())
    }
    fn commit(&mut self, _states: &[(river_core::ids::OutputId, OutputState)]) -> Result<(), CoreError> {
        Ok(())
    }
}
struct NoopSwapchain;
impl SwapchainManager for NoopSwapchain {
    fn prepare(&mut self, _states: &[(river_core::ids::OutputId, OutputState)]) -> Result<(), CoreError> {
        Ok(())
    }
    fn apply(&mut self) {}
}

fn spawn_window(bridge: &mut WmBridge, scene: &mut TestScene) -> WindowId {
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
    let record = WindowRecord::new(id, nodes);
    bridge.insert_window(record, Box::new(TestXdgAdapter::new((0, 0))))
}

fn standard_mode() -> ModeSelection {
    ModeSelection::Standard { width: 1920, height: 1080, refresh_mhz: 60000 }
}

#[test]
fn scenario_1_single_window_configure_and_borders() {
    let mut scene = TestScene::new();
    let mut bridge = WmBridge::new();
    let config = CoreConfig::default();
    let mut engine = TransactionEngine::new();

    let id = spawn_window(&mut bridge, &mut scene);
    bridge.propose_dimensions(id, 800, 600).unwrap();
    let touched = bridge.wm_commit();
    assert_eq!(touched, vec![id]);

    let outcome = engine.begin_render_sequence(&mut bridge, &touched, &mut scene, &config);
    assert_eq!(outcome, RenderSequenceOutcome::AllSettled);
    assert_eq!(bridge.transaction().inflight_configures, 1);

    bridge
        .adapter_mut(id)
        .unwrap()
        .as_any_mut()
        .downcast_mut::<TestXdgAdapter>()
        .unwrap()
        .client_commit((800, 600));
    engine.notify_window_settled(&mut bridge);

    let mut outputs = OutputManager::new();
    let mut swapchain = NoopSwapchain;
    let mut backend = AlwaysOk;
    engine.commit_transaction(&mut bridge, &touched, &mut outputs, &[], &mut scene, &mut swapchain, &mut backend, &config);

    let window = bridge.window(id).unwrap();
    assert_eq!(window.current.proposed_size, Some((800, 600)));
    let box_rect = window.current.box_rect((800, 600));
    let borders = BorderRects::around(box_rect, config.border_width);
    assert_eq!(borders.left.size, (2, 604).into());
    assert_eq!(borders.right.loc, (800, -2).into());
    assert_eq!(borders.top.size, (800, 2).into());
    assert_eq!(borders.bottom.loc, (0, 600).into());
}

#[test]
fn scenario_2_configure_timeout_uses_committed_geometry() {
    let mut scene = TestScene::new();
    let mut bridge = WmBridge::new();
    let config = CoreConfig::default();
    let mut engine = TransactionEngine::new();

    let id = spawn_window(&mut bridge, &mut scene);
    bridge.propose_dimensions(id, 800, 600).unwrap();
    let touched = bridge.wm_commit();
    engine.begin_render_sequence(&mut bridge, &touched, &mut scene, &config);

    // Client never acks or commits.
    engine.force_timeout();
    assert!(engine.timeout_elapsed(std::time::Instant::now()));
    assert_eq!(engine.settle_on_timeout(&mut bridge, &touched), RenderSequenceOutcome::TimedOut);

    let mut outputs = OutputManager::new();
    let mut swapchain = NoopSwapchain;
    let mut backend = AlwaysOk;
    engine.commit_transaction(&mut bridge, &touched, &mut outputs, &[], &mut scene, &mut swapchain, &mut backend, &config);

    // TestXdgAdapter::new((0, 0)) never had a committed size set, so the
    // engine must commit with the client's pre-transaction geometry, not
    // the requested 800x600.
    assert_eq!(bridge.window(id).unwrap().current.proposed_size, Some((0, 0)));
}

#[test]
fn scenario_3_resize_anchored_on_left_top_edges() {
    let mut scene = TestScene::new();
    let mut bridge = WmBridge::new();
    let config = CoreConfig::default();
    let mut engine = TransactionEngine::new();

    let id = spawn_window(&mut bridge, &mut scene);

    // Establish an initial current box of (100, 100, 400, 300).
    {
        let window = bridge.window_mut(id).unwrap();
        window.current.position = (100, 100);
        window.current.proposed_size = Some((400, 300));
    }
    bridge
        .adapter_mut(id)
        .unwrap()
        .as_any_mut()
        .downcast_mut::<TestXdgAdapter>()
        .unwrap()
        .committed_size = (400, 300);

    bridge.propose_dimensions(id, 500, 350).unwrap();
    bridge.inform_resize_start(id, Edges { left: true, top: true, right: false, bottom: false });
    let touched = bridge.wm_commit();

    engine.begin_render_sequence(&mut bridge, &touched, &mut scene, &config);

    bridge
        .adapter_mut(id)
        .unwrap()
        .as_any_mut()
        .downcast_mut::<TestXdgAdapter>()
        .unwrap()
        .client_commit((480, 340));
    engine.notify_window_settled(&mut bridge);

    let mut outputs = OutputManager::new();
    let mut swapchain = NoopSwapchain;
    let mut backend = AlwaysOk;
    engine.commit_transaction(&mut bridge, &touched, &mut outputs, &[], &mut scene, &mut swapchain, &mut backend, &config);

    // Gravity anchors the opposite (right/bottom) edge in place: the new
    // position shifts by (requested_size − actual_size) along each resized
    // edge (spec.md §8 scenario 3: requested 500x350, actual 480x340, so
    // x = 100 + (500 − 480) = 120, y = 100 + (350 − 340) = 110).
    let window = bridge.window(id).unwrap();
    assert_eq!(window.current.position, (120, 110));
    assert_eq!(window.current.proposed_size, Some((480, 340)));
}

#[test]
fn scenario_4_output_hotplug_evacuates_fullscreen_window() {
    let mut scene = TestScene::new();
    let mut bridge = WmBridge::new();
    let mut outputs = OutputManager::new();
    let mut backend = AlwaysOk;

    let o1 = outputs.on_new_output(HwHandle(1), &[standard_mode()], &mut scene, &mut backend);
    let o2 = outputs.on_new_output(HwHandle(2), &[standard_mode()], &mut scene, &mut backend);
    let _ = o1;

    let id = spawn_window(&mut bridge, &mut scene);
    bridge.fullscreen(id, Some(o2));
    bridge.wm_commit();
    bridge.window_mut(id).unwrap().current.fullscreen_output = Some(o2);

    outputs.on_output_destroy(HwHandle(2));
    bridge.evacuate_fullscreen_from_output(o2, &mut scene);

    let window = bridge.window(id).unwrap();
    assert_eq!(window.current.fullscreen_output, None);
    assert_eq!(window.committed.fullscreen_output, None);
    assert!(!window.mapped);
    assert_eq!(scene.node(window.scene.main).unwrap().layer, SceneLayer::Hidden);
    assert!(bridge.is_windowing_dirty());
}

#[test]
fn scenario_5_session_lock_never_exposes_normal_subtree() {
    let mut scene = TestScene::new();
    let mut outputs = OutputManager::new();
    let mut backend = AlwaysOk;
    let mut swapchain = NoopSwapchain;
    let id = outputs.on_new_output(HwHandle(1), &[standard_mode()], &mut scene, &mut backend);
    outputs.get_mut(id).unwrap().sent = outputs.get(id).unwrap().scheduled.clone();
    outputs.commit_output_state(&[id], &mut scene, &mut swapchain, &mut backend, &CoreConfig::default());

    let mut lock = LockManager::new();
    lock.request_lock();
    assert_eq!(lock.state(), LockManagerState::WaitingForBlank);
    // I-L1 must already hold once locking begins.
    lock.assert_scene_invariant(false, true);

    let action = lock.drive_output(&mut outputs.get_mut(id).unwrap().lock_render_state);
    assert_eq!(action, PresentAction::SubmitBlank);
    lock.on_present(id, &mut outputs);
    assert_eq!(lock.state(), LockManagerState::WaitingForLockSurfaces);
    lock.assert_scene_invariant(false, true);

    let action = lock.drive_output(&mut outputs.get_mut(id).unwrap().lock_render_state);
    assert_eq!(action, PresentAction::SubmitLockSurface);
    lock.on_present(id, &mut outputs);
    assert_eq!(lock.state(), LockManagerState::Locked);
    lock.assert_scene_invariant(false, true);
}

#[test]
fn scenario_6_coalesced_dirties_yield_one_manage_sequence() {
    let mut scene = TestScene::new();
    let mut bridge = WmBridge::new();
    let mut outputs = OutputManager::new();
    let id = spawn_window(&mut bridge, &mut scene);
    bridge.window_mut(id).unwrap().pending.proposed_size = Some((640, 480));

    bridge.mark_windowing_dirty();
    bridge.mark_windowing_dirty();
    bridge.mark_windowing_dirty();

    let mut engine = TransactionEngine::new();
    let mut updates = 0;
    if engine.run_manage_sequence(&mut bridge, &mut outputs).is_some() {
        updates += 1;
    }
    if engine.run_manage_sequence(&mut bridge, &mut outputs).is_some() {
        updates += 1;
    }
    assert_eq!(updates, 1);
}

#[test]
fn output_commit_outcome_reverts_on_backend_rejection() {
    struct AlwaysFail;
    impl HardwareBackend for AlwaysFail {
        fn try_modeset(&mut self, _hw: HwHandle, _mode: ModeSelection) -> Result<(), CoreError> {
            Err(CoreError::BackendCommitFailed("no".into()))
        }
        fn commit(&mut self, _states: &[(river_core::ids::OutputId, OutputState)]) -> Result<(), CoreError> {
            Err(CoreError::BackendCommitFailed("no".into()))
        }
    }

    let mut scene = TestScene::new();
    let mut outputs = OutputManager::new();
    let mut good = AlwaysOk;
    let id = outputs.on_new_output(HwHandle(1), &[standard_mode()], &mut scene, &mut good);
    outputs.get_mut(id).unwrap().sent = outputs.get(id).unwrap().scheduled.clone();

    let mut bad = AlwaysFail;
    let mut swapchain = NoopSwapchain;
    let outcome: CommitOutcome =
        outputs.commit_output_state(&[id], &mut scene, &mut swapchain, &mut bad, &CoreConfig::default());
    assert!(outcome.reverted);
    assert!(!outputs.get(id).unwrap().current.is_enabled());
}
