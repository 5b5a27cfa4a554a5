//! Per-window state (spec.md §3 `WindowRecord`, §4.2 window adapters).

pub mod adapter;
mod record;

pub use adapter::{ConfigureTarget, WindowAdapter, XdgConfigureState};
pub use record::{WindowRecord, WindowSceneNodes};

use smithay::utils::{Logical, Rectangle};

/// Window lifecycle (spec.md §3): `init → ready → (initialized) →
/// mapped → closing → init`, re-entrant on re-map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLifecycle {
    Init,
    Ready,
    Mapped,
    Closing,
}

/// Edges a resize or tile assignment can touch (bitmask in spec.md, a
/// proper bitflag type here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl Edges {
    pub const NONE: Self = Self { left: false, right: false, top: false, bottom: false };

    pub fn any(&self) -> bool {
        self.left || self.right || self.top || self.bottom
    }
}

/// What a window is currently allowed to do, negotiated via
/// `set_capabilities` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub window_menu: bool,
    pub maximize: bool,
    pub fullscreen: bool,
    pub minimize: bool,
}

/// Min/max width/height the window adapter reports (spec.md §3
/// "Constraints box").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Constraints {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
}

impl Constraints {
    /// Clamp a proposed size to these constraints. A `max_*` of 0 means
    /// unconstrained, matching the XDG toplevel convention.
    pub fn clamp(&self, width: i32, height: i32) -> (i32, i32) {
        let w = width.max(self.min_width);
        let w = if self.max_width > 0 { w.min(self.max_width) } else { w };
        let h = height.max(self.min_height);
        let h = if self.max_height > 0 { h.min(self.max_height) } else { h };
        (w, h)
    }
}

/// The WM-side view of a window's state (spec.md §3 `WmState`). This is
/// the shape shared by `pending`/`sent`/`uncommitted`/`committed`/
/// `inflight`/`current` in [`WindowRecord`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WmState {
    pub position: (i32, i32),
    pub proposed_size: Option<(i32, i32)>,
    pub hidden: bool,
    pub ssd: bool,
    pub border: BorderSpec,
    pub tiled_edges: Edges,
    pub capabilities: Capabilities,
    pub maximized: bool,
    pub fullscreen_output: Option<crate::ids::OutputId>,
    pub close: bool,
    pub activated: bool,
    pub resizing: bool,
    /// Edges an interactive resize is anchored against (spec.md §8
    /// scenario 3): the opposite edges stay fixed on commit, so the
    /// window's position shifts by `old_size − actual_size` along any
    /// edge set here.
    pub resize_edges: Edges,
}

impl WmState {
    /// The realized box once this state is `current` (spec.md I-W2/I-W4).
    /// `Rectangle::default()` (zero box) is the "unmapped" sentinel.
    pub fn box_rect(&self, size: (i32, i32)) -> Rectangle<i32, Logical> {
        Rectangle::new(self.position.into(), size.into())
    }
}

/// Server-side decoration spec for a window's border (spec.md §4.4
/// `set_borders`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BorderSpec {
    pub edges: Edges,
    pub width: u32,
    pub rgba: (u8, u8, u8, u8),
}

/// The four border rectangles around a window's box, in the layout spec.md
/// §8 scenario 1 pins down: `left: (x−w, y−w, w, h+2w)`, `right: (x+w', y−w,
/// w, h+2w)`, `top: (x, y−w, w', w)`, `bottom: (x, y+h, w', w)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderRects {
    pub left: Rectangle<i32, Logical>,
    pub right: Rectangle<i32, Logical>,
    pub top: Rectangle<i32, Logical>,
    pub bottom: Rectangle<i32, Logical>,
}

impl BorderRects {
    pub fn around(box_rect: Rectangle<i32, Logical>, width: u32) -> Self {
        let w = width as i32;
        let (x, y) = (box_rect.loc.x, box_rect.loc.y);
        let (bw, bh) = (box_rect.size.w, box_rect.size.h);
        Self {
            left: Rectangle::new((x - w, y - w).into(), (w, bh + 2 * w).into()),
            right: Rectangle::new((x + bw, y - w).into(), (w, bh + 2 * w).into()),
            top: Rectangle::new((x, y - w).into(), (bw, w).into()),
            bottom: Rectangle::new((x, y + bh).into(), (bw, w).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_rects_match_scenario_1_layout() {
        let box_rect = Rectangle::new((0, 0).into(), (800, 600).into());
        let borders = BorderRects::around(box_rect, 2);
        assert_eq!(borders.left, Rectangle::new((-2, -2).into(), (2, 604).into()));
        assert_eq!(borders.right, Rectangle::new((800, -2).into(), (2, 604).into()));
        assert_eq!(borders.top, Rectangle::new((0, -2).into(), (800, 2).into()));
        assert_eq!(borders.bottom, Rectangle::new((0, 600).into(), (800, 2).into()));
    }

    #[test]
    fn clamp_respects_min_and_max() {
        let c = Constraints { min_width: 100, min_height: 100, max_width: 800, max_height: 600 };
        assert_eq!(c.clamp(50, 50), (100, 100));
        assert_eq!(c.clamp(1000, 1000), (800, 600));
        assert_eq!(c.clamp(400, 300), (400, 300));
    }

    #[test]
    fn clamp_treats_zero_max_as_unconstrained() {
        let c = Constraints::default();
        assert_eq!(c.clamp(4000, 3000), (4000, 3000));
    }
}
