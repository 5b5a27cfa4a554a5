use std::collections::HashMap;

use slotmap::SlotMap;
use tracing::{debug, info, warn};

use super::{LockRenderState, ModeSelection, OutputLifecycle, OutputRecord, OutputState};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::ids::OutputId;
use crate::scene::{SceneLayer, SceneTree};

/// Opaque handle identifying a physical (or headless) output to the
/// external backend. The core never interprets this beyond equality and
/// hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HwHandle(pub u64);

/// External collaborator that can attempt a KMS/backend commit. Assumed
/// per spec.md §1 ("KMS commit primitives are assumed").
pub trait HardwareBackend {
    /// Try a single-output modeset during output discovery (spec.md
    /// `on_new_output`: "iterate modes in listed order until one
    /// succeeds").
    fn try_modeset(&mut self, hw: HwHandle, mode: ModeSelection) -> Result<(), CoreError>;

    /// Commit a batch of output states (spec.md `commit_output_state`
    /// step 4).
    fn commit(&mut self, states: &[(OutputId, OutputState)]) -> Result<(), CoreError>;
}

/// External collaborator that prepares compatible buffers for a batch of
/// output states ahead of a KMS commit (spec.md glossary: "swapchain
/// manager").
pub trait SwapchainManager {
    fn prepare(&mut self, states: &[(OutputId, OutputState)]) -> Result<(), CoreError>;
    fn apply(&mut self);
}

/// Identifies one `wlr-output-management` configuration request; spec.md
/// only ever has one pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfigId(pub u64);

struct PendingOutputConfig {
    id: OutputConfigId,
    states: Vec<(OutputId, OutputState)>,
}

/// Outcome of a `request_state`/`commit_output_state` round, reported
/// back so the caller can feed the right protocol events and re-drive the
/// manage sequence if needed.
#[derive(Debug, Default)]
pub struct CommitOutcome {
    pub modeset_attempted: bool,
    pub reverted: bool,
    /// `Some((id, true))` = succeeded, `Some((id, false))` = failed.
    pub config_result: Option<(OutputConfigId, bool)>,
    pub freed: Vec<OutputId>,
    pub windowing_dirty: bool,
}

/// Aggregates [`OutputRecord`]s, drives hardware modeset batches, and
/// reconciles `wlr-output-management` requests (spec.md §4.1).
pub struct OutputManager {
    records: SlotMap<OutputId, OutputRecord>,
    hw_index: HashMap<HwHandle, OutputId>,
    order: Vec<OutputId>,
    pending: Option<PendingOutputConfig>,
    next_config_id: u64,
    /// Reject negative output coordinates due to the documented upstream
    /// X11-bridging bug (spec.md §4.1 `on_manager_apply`).
    pub x11_bridging_active: bool,
}

impl OutputManager {
    pub fn new() -> Self {
        Self {
            records: SlotMap::with_key(),
            hw_index: HashMap::new(),
            order: Vec::new(),
            pending: None,
            next_config_id: 0,
            x11_bridging_active: false,
        }
    }

    pub fn get(&self, id: OutputId) -> Option<&OutputRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: OutputId) -> Option<&mut OutputRecord> {
        self.records.get_mut(id)
    }

    /// Outputs in first-attached-first order (spec.md §4.1 tie-break:
    /// "first attached → leftmost").
    pub fn ordered_ids(&self) -> &[OutputId] {
        &self.order
    }

    /// New hardware appeared. Creates the record disabled, then tries the
    /// preferred mode followed by the rest in listed order until one
    /// modesets successfully; if none do, the output stays disabled
    /// pending a WM-driven custom mode.
    pub fn on_new_output(
        &mut self,
        hw: HwHandle,
        modes: &[ModeSelection],
        scene: &mut dyn SceneTree,
        backend: &mut dyn HardwareBackend,
    ) -> OutputId {
        let scene_output = scene.create_node(SceneLayer::Background);
        let id = self.records.insert(OutputRecord::new(scene_output));
        self.hw_index.insert(hw, id);
        self.order.push(id);

        for mode in modes {
            if backend.try_modeset(hw, *mode).is_ok() {
                let record = self.records.get_mut(id).unwrap();
                record.scheduled.lifecycle = OutputLifecycle::Enabled;
                record.scheduled.mode = *mode;
                info!(?hw, ?mode, "output enabled with mode");
                break;
            }
        }
        if self.records[id].scheduled.mode == ModeSelection::None {
            warn!(?hw, "no mode succeeded, output left disabled");
        }
        id
    }

    /// Hardware disappeared. Always succeeds (spec.md §4.1: "hardware
    /// destroy is always processable and cannot fail"); memory is freed
    /// only once `destroying` round-trips a manage sequence.
    pub fn on_output_destroy(&mut self, hw: HwHandle) -> Option<OutputId> {
        let id = self.hw_index.remove(&hw)?;
        if let Some(record) = self.records.get_mut(id) {
            record.scheduled.lifecycle = OutputLifecycle::Destroying;
            record.hw_gone = true;
            record.in_active_list = false;
        }
        Some(id)
    }

    /// Backend-reported state change. Only `mode` is accepted from the
    /// backend; anything else is logged and dropped.
    pub fn on_request_state(&mut self, hw: HwHandle, requested_mode: ModeSelection) {
        let Some(&id) = self.hw_index.get(&hw) else {
            warn!(?hw, "request_state for unknown output");
            return;
        };
        if let Some(record) = self.records.get_mut(id) {
            debug!(?hw, ?requested_mode, "backend-requested mode change");
            record.scheduled.mode = requested_mode;
        }
    }

    /// `wlr-output-management` test request: validate and dry-run through
    /// the swapchain manager, reporting the outcome immediately without
    /// mutating scheduled state.
    pub fn on_manager_test(
        &self,
        config: &[(OutputId, OutputState)],
        swapchain: &mut dyn SwapchainManager,
    ) -> Result<(), CoreError> {
        self.validate_config(config)?;
        swapchain.prepare(config)
    }

    /// `wlr-output-management` apply request: validate, store as the
    /// pending config, and report that windowing became dirty so the
    /// caller re-drives a manage sequence; the config is actually
    /// committed at the tail of the next transaction (`commit_output_state`).
    pub fn on_manager_apply(
        &mut self,
        config: Vec<(OutputId, OutputState)>,
    ) -> Result<OutputConfigId, CoreError> {
        self.validate_config(&config)?;
        let id = OutputConfigId(self.next_config_id);
        self.next_config_id += 1;
        for (output_id, state) in &config {
            if let Some(record) = self.records.get_mut(*output_id) {
                record.scheduled = state.clone();
            }
        }
        self.pending = Some(PendingOutputConfig { id, states: config });
        Ok(id)
    }

    fn validate_config(&self, config: &[(OutputId, OutputState)]) -> Result<(), CoreError> {
        if self.x11_bridging_active {
            for (_, state) in config {
                if state.position.0 < 0 || state.position.1 < 0 {
                    return Err(CoreError::OutputConfigRejected(
                        "negative coordinates are unsupported while X11 bridging is active".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Called by the transaction engine at the end of a commit sequence.
    /// `sent_ids` is `wm.sent.outputs` (spec.md §4.1 step list).
    pub fn commit_output_state(
        &mut self,
        sent_ids: &[OutputId],
        scene: &mut dyn SceneTree,
        swapchain: &mut dyn SwapchainManager,
        backend: &mut dyn HardwareBackend,
        _config: &CoreConfig,
    ) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();

        // Step 1: enabled/soft-disabled outputs are positioned in the
        // layout (the WM already computed `sent.position`); disabled-hard
        // and destroying outputs drop out of the active list.
        for &id in sent_ids {
            if let Some(record) = self.records.get_mut(id) {
                record.in_active_list = !record.sent.is_removed();
            }
        }

        // Step 2: does anything need a modeset?
        let needs_modeset = sent_ids.iter().any(|&id| {
            self.records
                .get(id)
                .map(|r| r.sent.needs_modeset_against(&r.current))
                .unwrap_or(false)
        });
        outcome.modeset_attempted = needs_modeset;

        let batch: Vec<(OutputId, OutputState)> = sent_ids
            .iter()
            .filter_map(|&id| self.records.get(id).map(|r| (id, r.sent.clone())))
            .collect();

        if needs_modeset {
            if let Err(err) = swapchain.prepare(&batch) {
                warn!(%err, "swapchain prepare failed, reverting output state");
                self.revert(sent_ids);
                outcome.reverted = true;
                outcome.config_result = self.pending.take().map(|p| (p.id, false));
                outcome.windowing_dirty = true;
                return outcome;
            }

            // Step 3/4: stage scene nodes, then ask the backend to commit.
            for &id in sent_ids {
                if let Some(record) = self.records.get(id) {
                    scene.set_enabled(record.scene_output, record.sent.is_enabled());
                }
            }
            if let Err(err) = backend.commit(&batch) {
                warn!(%err, "backend commit failed, reverting output state");
                self.revert(sent_ids);
                outcome.reverted = true;
                outcome.config_result = self.pending.take().map(|p| (p.id, false));
                outcome.windowing_dirty = true;
                return outcome;
            }
            swapchain.apply();
        }

        // Step 5: overall success.
        if let Some(pending) = self.pending.take() {
            outcome.config_result = Some((pending.id, true));
        }
        for &id in sent_ids {
            if let Some(record) = self.records.get_mut(id) {
                record.current = record.sent.clone();
                record.assert_invariants();
                if record.ready_to_free() {
                    outcome.freed.push(id);
                }
            }
        }
        for id in &outcome.freed {
            self.records.remove(*id);
            self.order.retain(|x| x != id);
        }
        outcome
    }

    fn revert(&mut self, sent_ids: &[OutputId]) {
        for &id in sent_ids {
            if let Some(record) = self.records.get_mut(id) {
                record.scheduled = record.current.clone();
                record.sent = record.current.clone();
            }
        }
    }

    /// Output enable/disable always forces `lock_render_state` back to
    /// `Blanked` to avoid a brief flash of stale content on power-on
    /// (spec.md §4.5).
    pub fn on_output_power_change(&mut self, id: OutputId) {
        if let Some(record) = self.records.get_mut(id) {
            record.lock_render_state = LockRenderState::Blanked;
        }
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}
