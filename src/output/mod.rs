//! Per-output state (spec.md §3 `OutputRecord`, §4.1 `OutputManager`).

mod manager;
mod record;

pub use manager::{CommitOutcome, HardwareBackend, HwHandle, OutputConfigId, OutputManager, SwapchainManager};
pub use record::OutputRecord;

use smithay::utils::Transform;

/// `state` field of [`OutputState`]: where the output sits in the
/// hardware lifecycle (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLifecycle {
    Enabled,
    DisabledSoft,
    DisabledHard,
    Destroying,
}

/// A mode proposal: a reference to one of the hardware's advertised
/// modes, a fully custom mode (from `wlr-output-management`), or no mode
/// at all (spec.md I-O3: only valid before first modeset or after
/// hardware disappearance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeSelection {
    Standard { width: i32, height: i32, refresh_mhz: i32 },
    Custom { width: i32, height: i32, refresh_mhz: i32 },
    None,
}

impl ModeSelection {
    pub fn size(&self) -> Option<(i32, i32)> {
        match self {
            ModeSelection::Standard { width, height, .. }
            | ModeSelection::Custom { width, height, .. } => Some((*width, *height)),
            ModeSelection::None => None,
        }
    }
}

/// One of the three state copies an [`OutputRecord`] carries
/// (`scheduled`/`sent`/`current`, spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct OutputState {
    pub lifecycle: OutputLifecycle,
    pub position: (i32, i32),
    pub mode: ModeSelection,
    pub scale: f64,
    pub transform: Transform,
    pub adaptive_sync: bool,
    pub auto_layout: bool,
}

impl OutputState {
    pub fn disabled() -> Self {
        Self {
            lifecycle: OutputLifecycle::DisabledHard,
            position: (0, 0),
            mode: ModeSelection::None,
            scale: 1.0,
            transform: Transform::Normal,
            adaptive_sync: false,
            auto_layout: true,
        }
    }

    /// Output width after transform parity and scale are applied.
    pub fn width(&self) -> Option<i32> {
        let (w, h) = self.mode.size()?;
        let (w, _) = if transform_swaps_axes(self.transform) { (h, w) } else { (w, h) };
        Some(((w as f64) / self.scale).round() as i32)
    }

    /// Output height after transform parity and scale are applied.
    pub fn height(&self) -> Option<i32> {
        let (w, h) = self.mode.size()?;
        let (_, h) = if transform_swaps_axes(self.transform) { (h, w) } else { (w, h) };
        Some(((h as f64) / self.scale).round() as i32)
    }

    /// Whether this state requires a hardware modeset batch (spec.md
    /// §4.1 `commit_output_state` step 2): enable flip, mode delta, or
    /// adaptive-sync delta relative to `other`.
    pub fn needs_modeset_against(&self, other: &OutputState) -> bool {
        self.is_enabled() != other.is_enabled()
            || self.mode != other.mode
            || self.adaptive_sync != other.adaptive_sync
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.lifecycle, OutputLifecycle::Enabled)
    }

    pub fn is_removed(&self) -> bool {
        matches!(self.lifecycle, OutputLifecycle::DisabledHard | OutputLifecycle::Destroying)
    }
}

fn transform_swaps_axes(transform: Transform) -> bool {
    matches!(transform, Transform::_90 | Transform::_270 | Transform::Flipped90 | Transform::Flipped270)
}

/// Per-output lock-render pipeline state (spec.md §4.5 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRenderState {
    PendingUnlock,
    Unlocked,
    PendingBlank,
    Blanked,
    PendingLockSurface,
    LockSurface,
}
