//! Mute button handling.
//!
//! The GPIO edge interrupt only raises a [`ButtonFlag`]. The tick loop drains
//! the flag through [`ButtonDebouncer::handle_pending`], which decides whether
//! the edge is a real press or a bounce.

use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::{
    state::MonitorState,
    time::{elapsed, Millis},
};

pub const DEFAULT_DEBOUNCE_MS: Millis = 200;

/// Single-slot event cell written from interrupt context.
///
/// Any number of edges raised between two drains collapse into one pending
/// press.
#[derive(Debug, Default)]
pub struct ButtonFlag(AtomicBool);

impl ButtonFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Safe to call from an ISR: one atomic store, no allocation, no locks.
    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Muted,
    Unmuted,
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonDebouncer {
    window_ms: Millis,
}

impl Default for ButtonDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl ButtonDebouncer {
    pub fn new(window_ms: Millis) -> Self {
        Self { window_ms }
    }

    pub fn window_ms(&self) -> Millis {
        self.window_ms
    }

    /// Drains the flag. A press inside the debounce window is dropped, not
    /// queued.
    pub fn handle_pending(
        &self,
        flag: &ButtonFlag,
        state: &mut MonitorState,
        now: Millis,
    ) -> Option<ToggleAction> {
        if !flag.take() {
            return None;
        }

        let since_last = elapsed(state.last_button_press, now);
        if since_last < self.window_ms {
            debug!("button bounce ignored ({since_last}ms since last press)");
            return None;
        }

        state.last_button_press = now;
        state.is_muted = !state.is_muted;

        let action = if state.is_muted {
            ToggleAction::Muted
        } else {
            ToggleAction::Unmuted
        };
        info!("mute toggled: {action:?}");
        Some(action)
    }
}
