//! Protocol-facing registry of WM objects (spec.md §4.4 `WmBridge`).
//!
//! Hosts the `river_window_manager_v1`-family protocol objects described
//! in spec.md §6 as plain Rust methods — wire serialization itself is out
//! of scope, so there is no `Dispatch` machinery here, only the semantic
//! contract: which request does what, which ones buffer into
//! `uncommitted` (I-B1), and which become no-ops once an object is inert
//! (I-B2).

use std::collections::HashSet;

use slotmap::{SecondaryMap, SlotMap};
use smithay::utils::Serial;
use tracing::{trace, warn};

use crate::error::ProtocolError;
use crate::ids::{OutputId, WindowId, WmObjectId};
use crate::scene::{SceneLayer, SceneTree};
use crate::window::{BorderSpec, Capabilities, Edges, WindowAdapter, WindowRecord};

/// What kind of protocol object a [`WmObjectId`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmObjectKind {
    WindowManager,
    Window(WindowId),
    Output(OutputId),
    Seat,
    Node(WindowId),
}

struct WmObject {
    kind: WmObjectKind,
    inert: bool,
}

/// The `Transaction` singleton (spec.md §3): counters and the dirty flag
/// the manage/render sequence driver consults. The timeout timer itself
/// is owned by [`crate::transaction::TransactionEngine`], which is the
/// active driver; this struct is pure state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Transaction {
    pub inflight_configures: u32,
    pub inflight_layout_demands: u32,
    pub pending_state_dirty: bool,
}

/// Registry of WM protocol objects plus the dirty-windowing/dirty-
/// rendering flags and the window records they govern (spec.md §4.4).
pub struct WmBridge {
    windows: SlotMap<WindowId, WindowRecord>,
    adapters: SecondaryMap<WindowId, Box<dyn WindowAdapter>>,

    objects: SlotMap<WmObjectId, WmObject>,
    window_objects: SecondaryMap<WindowId, WmObjectId>,
    output_objects: SecondaryMap<OutputId, WmObjectId>,
    window_nodes: SecondaryMap<WindowId, WmObjectId>,

    windowing_dirty: bool,
    rendering_dirty: bool,
    transaction: Transaction,

    last_update_serial: Option<Serial>,

    /// Union of every seat's current keyboard focus (spec.md I-W3).
    focused: HashSet<WindowId>,
}

impl WmBridge {
    pub fn new() -> Self {
        Self {
            windows: SlotMap::with_key(),
            adapters: SecondaryMap::new(),
            objects: SlotMap::with_key(),
            window_objects: SecondaryMap::new(),
            output_objects: SecondaryMap::new(),
            window_nodes: SecondaryMap::new(),
            windowing_dirty: false,
            rendering_dirty: false,
            transaction: Transaction::default(),
            last_update_serial: None,
            focused: HashSet::new(),
        }
    }

    // ---- record access -------------------------------------------------

    pub fn insert_window(&mut self, record: WindowRecord, adapter: Box<dyn WindowAdapter>) -> WindowId {
        let id = record.id;
        self.windows.insert(record);
        self.adapters.insert(id, adapter);
        self.windowing_dirty = true;
        id
    }

    pub fn window(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.get(id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.windows.get_mut(id)
    }

    pub fn adapter_mut(&mut self, id: WindowId) -> Option<&mut Box<dyn WindowAdapter>> {
        self.adapters.get_mut(id)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().collect()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn transaction_mut(&mut self) -> &mut Transaction {
        &mut self.transaction
    }

    // ---- dirty flags ----------------------------------------------------

    pub fn mark_windowing_dirty(&mut self) {
        self.windowing_dirty = true;
    }

    pub fn mark_rendering_dirty(&mut self) {
        self.rendering_dirty = true;
    }

    /// Edge-triggered: returns whether windowing was dirty and clears the
    /// flag, so repeated `mark_windowing_dirty` calls within one idle
    /// cycle still yield exactly one manage sequence (spec.md §5/§8
    /// "Idempotence").
    pub fn take_windowing_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.windowing_dirty, false)
    }

    pub fn take_rendering_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.rendering_dirty, false)
    }

    pub fn is_windowing_dirty(&self) -> bool {
        self.windowing_dirty
    }

    // ---- manage sequence plumbing ---------------------------------------

    /// Called by the engine when it emits `update(serial)` (spec.md §6).
    pub fn begin_manage_sequence(&mut self, serial: Serial) {
        self.last_update_serial = Some(serial);
    }

    /// `ack_update(serial)` request. Returns whether the serial matched
    /// the most recently emitted `update` — a mismatched ack is ignored
    /// (the WM is acking a stale or future sequence).
    pub fn wm_ack_update(&mut self, serial: Serial) -> bool {
        self.last_update_serial == Some(serial)
    }

    /// `commit` request: atomically promotes `uncommitted → committed`
    /// for every window with buffered requests, returning the windows
    /// touched so the engine can compute their `inflight` state.
    pub fn wm_commit(&mut self) -> Vec<WindowId> {
        let mut touched = Vec::new();
        for (id, window) in self.windows.iter_mut() {
            if window.uncommitted != window.committed {
                window.committed = window.uncommitted.clone();
                touched.push(id);
            }
        }
        touched
    }

    // ---- WM object lifecycle (I-B2) -------------------------------------

    pub fn create_window_object(&mut self, window: WindowId) -> WmObjectId {
        let obj = self.objects.insert(WmObject { kind: WmObjectKind::Window(window), inert: false });
        self.window_objects.insert(window, obj);
        obj
    }

    pub fn create_output_object(&mut self, output: OutputId) -> WmObjectId {
        let obj = self.objects.insert(WmObject { kind: WmObjectKind::Output(output), inert: false });
        self.output_objects.insert(output, obj);
        obj
    }

    /// `get_seat(id, seat)` request (spec.md §4.4): creates a `Seat` WM
    /// object. Focus requests the client routes through it are applied via
    /// [`Self::set_seat_focus`]; the object becomes inert like any other
    /// (I-B2) once the seat goes away.
    pub fn get_seat(&mut self) -> WmObjectId {
        self.objects.insert(WmObject { kind: WmObjectKind::Seat, inert: false })
    }

    /// `get_window_node(id, window)` request (spec.md §4.4). Raises
    /// `node_exists` if this window already has a node (I-B3 family).
    pub fn get_window_node(&mut self, window: WindowId) -> Result<WmObjectId, ProtocolError> {
        if self.window_nodes.contains_key(window) {
            return Err(ProtocolError::NodeExists);
        }
        let obj = self.objects.insert(WmObject { kind: WmObjectKind::Node(window), inert: false });
        self.window_nodes.insert(window, obj);
        Ok(obj)
    }

    /// Turns a WM object inert (I-B2): further non-destroy requests on it
    /// become no-ops. Must be called before the `removed` event is
    /// delivered to the client.
    pub fn make_inert(&mut self, object: WmObjectId) {
        if let Some(obj) = self.objects.get_mut(object) {
            obj.inert = true;
        }
    }

    pub fn is_inert(&self, object: WmObjectId) -> bool {
        self.objects.get(object).map(|o| o.inert).unwrap_or(true)
    }

    /// Called when a [`WindowRecord`] is destroyed: makes its Window and
    /// Node objects inert (I-B2) ahead of the `removed` event.
    pub fn retire_window(&mut self, window: WindowId) {
        if let Some(obj) = self.window_objects.get(window).copied() {
            self.make_inert(obj);
        }
        if let Some(obj) = self.window_nodes.get(window).copied() {
            self.make_inert(obj);
        }
    }

    pub fn retire_output(&mut self, output: OutputId) {
        if let Some(obj) = self.output_objects.get(output).copied() {
            self.make_inert(obj);
        }
    }

    /// Clears fullscreen and evacuates to the hidden subtree every window
    /// fullscreened on `output` (spec.md §8 scenario 4, resolving the open
    /// question on §9 as "evacuate to hidden, clear fullscreen"). Marks
    /// windowing dirty if anything was touched.
    pub fn evacuate_fullscreen_from_output(&mut self, output: OutputId, scene: &mut dyn SceneTree) {
        let affected: Vec<WindowId> = self
            .windows
            .iter()
            .filter(|(_, w)| {
                w.current.fullscreen_output == Some(output) || w.pending.fullscreen_output == Some(output)
            })
            .map(|(id, _)| id)
            .collect();

        for id in &affected {
            if let Some(window) = self.windows.get_mut(*id) {
                window.pending.fullscreen_output = None;
                window.committed.fullscreen_output = None;
                window.current.fullscreen_output = None;
                window.mapped = false;
                scene.reparent(window.scene.main, SceneLayer::Hidden);
                scene.set_enabled(window.scene.main, false);
                trace!(?id, "evacuated fullscreen window off destroyed output");
            }
        }

        if !affected.is_empty() {
            self.windowing_dirty = true;
        }
    }

    fn guard_window(&mut self, window: WindowId) -> Option<&mut WindowRecord> {
        if let Some(&obj) = self.window_objects.get(window) {
            if self.is_inert(obj) {
                trace!(?window, "ignoring request on inert window object");
                return None;
            }
        }
        self.windows.get_mut(window)
    }

    // ---- per-window requests (spec.md §4.4), buffered into `uncommitted`
    // per I-B1 until the WM's `commit` request promotes them.

    pub fn propose_dimensions(
        &mut self,
        window: WindowId,
        width: i32,
        height: i32,
    ) -> Result<(), ProtocolError> {
        if width < 0 || height < 0 {
            return Err(ProtocolError::InvalidDimensions);
        }
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.proposed_size = Some((width, height));
        }
        Ok(())
    }

    pub fn hide(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.hidden = true;
        }
    }

    pub fn show(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.hidden = false;
        }
    }

    pub fn use_ssd(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.ssd = true;
        }
    }

    pub fn use_csd(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.ssd = false;
        }
    }

    pub fn set_borders(
        &mut self,
        window: WindowId,
        edges: Edges,
        width: i32,
        rgba: (u8, u8, u8, u8),
    ) -> Result<(), ProtocolError> {
        if width < 0 {
            return Err(ProtocolError::InvalidBorder);
        }
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.border = BorderSpec { edges, width: width as u32, rgba };
        }
        Ok(())
    }

    /// Validates a clip-box request (spec.md §6 `invalid_clip_box`).
    /// Per-node clip boxes are not otherwise modeled in this crate since
    /// actual clipping is a scene-graph rendering concern; this exists so
    /// the protocol error is producible at the boundary a real dispatch
    /// layer would check.
    pub fn set_clip_box(&self, width: i32, height: i32) -> Result<(), ProtocolError> {
        if width < 0 || height < 0 {
            return Err(ProtocolError::InvalidClipBox);
        }
        Ok(())
    }

    pub fn set_tiled(&mut self, window: WindowId, edges: Edges) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.tiled_edges = edges;
        }
    }

    pub fn set_capabilities(&mut self, window: WindowId, capabilities: Capabilities) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.capabilities = capabilities;
        }
    }

    pub fn inform_maximized(&mut self, window: WindowId, maximized: bool) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.maximized = maximized;
        }
    }

    pub fn fullscreen(&mut self, window: WindowId, output: Option<OutputId>) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.fullscreen_output = output;
        }
    }

    pub fn exit_fullscreen(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.fullscreen_output = None;
        }
    }

    /// `inform_resize_start` (spec.md §4.4): `edges` anchors the opposite
    /// sides in place for the duration of the resize (spec.md §8 scenario
    /// 3 "Resize with left/top edges").
    pub fn inform_resize_start(&mut self, window: WindowId, edges: Edges) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.resizing = true;
            record.uncommitted.resize_edges = edges;
        }
    }

    pub fn inform_resize_end(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.resizing = false;
            record.uncommitted.resize_edges = Edges::NONE;
        }
    }

    pub fn close(&mut self, window: WindowId) {
        if let Some(record) = self.guard_window(window) {
            record.uncommitted.close = true;
        }
    }

    // ---- node requests ----------------------------------------------------

    /// `place_above`/`place_below` only affect scene stacking order, which
    /// is the embedder's scene-graph concern; we just validate that both
    /// nodes are live (non-inert) windows.
    pub fn place_relative(
        &self,
        node: WmObjectId,
        sibling: WmObjectId,
    ) -> Result<(WindowId, WindowId), ()> {
        let a = self.objects.get(node).filter(|o| !o.inert);
        let b = self.objects.get(sibling).filter(|o| !o.inert);
        match (a.map(|o| o.kind), b.map(|o| o.kind)) {
            (Some(WmObjectKind::Node(w1)), Some(WmObjectKind::Node(w2))) => Ok((w1, w2)),
            _ => Err(()),
        }
    }

    pub fn node_get_window(&self, node: WmObjectId) -> Option<WindowId> {
        match self.objects.get(node)?.kind {
            WmObjectKind::Node(w) | WmObjectKind::Window(w) => Some(w),
            _ => None,
        }
    }

    // ---- seat focus -------------------------------------------------------

    /// Sets a single seat's keyboard focus, recomputing the focus union
    /// that will be reflected into `inflight.activated` at the top of the
    /// next render sequence (spec.md I-W3, §4.4 "Seat focus").
    pub fn set_seat_focus(&mut self, previous: Option<WindowId>, next: Option<WindowId>) {
        if let Some(prev) = previous {
            self.focused.remove(&prev);
        }
        if let Some(next) = next {
            self.focused.insert(next);
        }
    }

    pub fn is_focused(&self, window: WindowId) -> bool {
        self.focused.contains(&window)
    }

    pub fn focused_windows(&self) -> &HashSet<WindowId> {
        &self.focused
    }
}

impl Default for WmBridge {
    fn default() -> Self {
        Self::new()
    }
}
