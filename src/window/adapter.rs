//! Surface-role adapters (spec.md §4.2). Each mapped window has exactly
//! one backing adapter — an XDG toplevel or an X11 window — that the
//! transaction engine drives through `configure()`/`notify_configured()`.
//! Real role plumbing (actually talking to `xdg_toplevel`/Xwayland) is
//! out of scope (spec.md §1); this module only describes the contract.

use smithay::utils::Serial;

use super::{Capabilities, Constraints, Edges};
use crate::ids::OutputId;

/// What the engine asks an adapter to configure a client toward (spec.md
/// §4.2 `configure(target_state)`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigureTarget {
    pub width: i32,
    pub height: i32,
    pub activated: bool,
    pub maximized: bool,
    pub fullscreen: Option<OutputId>,
    pub tiled: Edges,
    pub resizing: bool,
    pub bounds: Option<(i32, i32)>,
}

/// XDG toplevel configure state machine (spec.md §4.2):
/// `idle → inflight(serial) → acked → committed → idle`, with
/// `inflight → timed_out` / `acked → timed_out_acked` on transaction
/// timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XdgConfigureState {
    Idle,
    Inflight(Serial),
    Acked(Serial),
    Committed,
    TimedOut,
    TimedOutAcked,
}

impl XdgConfigureState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Committed | Self::TimedOut | Self::TimedOutAcked)
    }
}

/// The per-window contract the transaction engine drives (spec.md §4.2).
pub trait WindowAdapter {
    /// Schedule a configure. Returns whether this configure should be
    /// tracked by the transaction engine — i.e. whether it will produce
    /// an ack+commit the engine must wait for. X11 adapters always
    /// return `false` (frame-perfection is not attempted for them).
    fn configure(&mut self, target: &ConfigureTarget) -> bool;

    fn needs_configure(&self) -> bool;

    fn send_close(&mut self);
    fn set_fullscreen(&mut self, enabled: bool);
    fn set_activated(&mut self, activated: bool);
    fn set_resizing(&mut self, resizing: bool);
    fn destroy_popups(&mut self);

    fn get_title(&self) -> Option<String>;
    fn get_app_id(&self) -> Option<String>;
    fn unreliable_pid(&self) -> i32;

    /// The committed geometry the client currently has, independent of
    /// any outstanding configure. Used by the transaction engine on
    /// timeout (spec.md §4.2/§4.3: read the *committed* geometry, not the
    /// requested one, to avoid drawing a border around a size the client
    /// never adopted).
    fn committed_size(&self) -> (i32, i32);

    /// Constraints this adapter currently reports.
    fn constraints(&self) -> Constraints;

    /// Capabilities this adapter currently advertises.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Downcasting escape hatch so tests can reach into a concrete test
    /// double (e.g. to simulate a client ack+commit) through the trait
    /// object the engine otherwise only drives abstractly.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// A tracked, in-memory adapter used by tests to stand in for a real XDG
/// toplevel. Models the full configure FSM so the scenarios in spec.md §8
/// can be exercised precisely.
#[derive(Debug, Default)]
pub struct TestXdgAdapter {
    pub state: Option<XdgConfigureState>,
    pub last_target: Option<ConfigureTarget>,
    pub committed_size: (i32, i32),
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub constraints: Constraints,
    pub closes_requested: u32,
    pub popups_destroyed: u32,
}

impl TestXdgAdapter {
    pub fn new(initial_size: (i32, i32)) -> Self {
        Self { committed_size: initial_size, ..Default::default() }
    }

    /// Test helper: simulate the client acking and committing the
    /// in-flight configure at `size` (which may differ from what was
    /// requested — the client is always free to pick its own size within
    /// its constraints).
    pub fn client_commit(&mut self, size: (i32, i32)) {
        self.committed_size = size;
        self.state = Some(XdgConfigureState::Committed);
    }

    pub fn is_tracked_and_pending(&self) -> bool {
        matches!(self.state, Some(XdgConfigureState::Inflight(_)) | Some(XdgConfigureState::Acked(_)))
    }
}

impl WindowAdapter for TestXdgAdapter {
    fn configure(&mut self, target: &ConfigureTarget) -> bool {
        let serial = smithay::utils::SERIAL_COUNTER.next_serial();
        self.state = Some(XdgConfigureState::Inflight(serial));
        self.last_target = Some(target.clone());
        true
    }

    fn needs_configure(&self) -> bool {
        self.last_target.is_none()
    }

    fn send_close(&mut self) {
        self.closes_requested += 1;
    }

    fn set_fullscreen(&mut self, _enabled: bool) {}
    fn set_activated(&mut self, _activated: bool) {}
    fn set_resizing(&mut self, _resizing: bool) {}
    fn destroy_popups(&mut self) {
        self.popups_destroyed += 1;
    }

    fn get_title(&self) -> Option<String> {
        self.title.clone()
    }

    fn get_app_id(&self) -> Option<String> {
        self.app_id.clone()
    }

    fn unreliable_pid(&self) -> i32 {
        -1
    }

    fn committed_size(&self) -> (i32, i32) {
        self.committed_size
    }

    fn constraints(&self) -> Constraints {
        self.constraints
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// An X11 adapter always reports untracked configures — frame-perfection
/// is not attempted for Xwayland windows (spec.md §4.2).
#[derive(Debug, Default)]
pub struct TestX11Adapter {
    pub committed_size: (i32, i32),
}

impl WindowAdapter for TestX11Adapter {
    fn configure(&mut self, _target: &ConfigureTarget) -> bool {
        false
    }
    fn needs_configure(&self) -> bool {
        false
    }
    fn send_close(&mut self) {}
    fn set_fullscreen(&mut self, _enabled: bool) {}
    fn set_activated(&mut self, _activated: bool) {}
    fn set_resizing(&mut self, _resizing: bool) {}
    fn destroy_popups(&mut self) {}
    fn get_title(&self) -> Option<String> {
        None
    }
    fn get_app_id(&self) -> Option<String> {
        None
    }
    fn unreliable_pid(&self) -> i32 {
        -1
    }
    fn committed_size(&self) -> (i32, i32) {
        self.committed_size
    }
    fn constraints(&self) -> Constraints {
        Constraints::default()
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x11_adapter_configure_is_never_tracked() {
        let mut adapter = TestX11Adapter::default();
        let target = ConfigureTarget {
            width: 100,
            height: 100,
            activated: true,
            maximized: false,
            fullscreen: None,
            tiled: Edges::NONE,
            resizing: false,
            bounds: None,
        };
        assert!(!adapter.configure(&target));
    }

    #[test]
    fn xdg_adapter_tracks_configure_until_committed() {
        let mut adapter = TestXdgAdapter::new((100, 100));
        let target = ConfigureTarget {
            width: 800,
            height: 600,
            activated: true,
            maximized: false,
            fullscreen: None,
            tiled: Edges::NONE,
            resizing: false,
            bounds: None,
        };
        assert!(adapter.configure(&target));
        assert!(adapter.is_tracked_and_pending());
        adapter.client_commit((800, 600));
        assert!(!adapter.is_tracked_and_pending());
        assert_eq!(adapter.committed_size(), (800, 600));
    }
}
