//! Ambient configuration owned by the windowing core itself.
//!
//! This is deliberately narrow: spec.md §6 puts the compositor's
//! process-env/control-plane configuration surface out of scope. What
//! remains in scope is the handful of numeric knobs the core needs to be
//! tunable and testable — the transaction timeout and the border/backdrop
//! defaults it applies when no WM request has overridden them yet. There
//! is no file/env parsing here; an embedder constructs a `CoreConfig` and
//! hands it to the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An RGBA color, matching the teacher's `AppearanceConfig` border/
/// background fields but stored as components instead of a hex string
/// since nothing in this crate parses user-facing config text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Numeric knobs the transaction engine and output manager consult.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Render-sequence timeout (spec.md §4.3, §5): how long the engine
    /// waits for every tracked configure to be acked+committed before it
    /// gives up and commits with whatever geometry the client currently
    /// has.
    #[serde(with = "duration_millis")]
    pub transaction_timeout: Duration,

    /// Width in logical pixels of the four SSD border rectangles.
    pub border_width: u32,

    /// Border color for the focused window.
    pub border_color_active: Rgba,

    /// Border color for unfocused windows.
    pub border_color_inactive: Rgba,

    /// Color submitted for the per-output blank buffer while
    /// `lock_render_state` is `pending_blank`/`blanked` (spec.md §4.5).
    pub lock_backdrop_color: Rgba,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_millis(100),
            border_width: 2,
            border_color_active: Rgba::new(0x00, 0x78, 0xD4, 0xFF),
            border_color_inactive: Rgba::new(0x80, 0x80, 0x80, 0xFF),
            lock_backdrop_color: Rgba::new(0x00, 0x00, 0x00, 0xFF),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
