//! WiFi link supervision.
//!
//! ```text
//!                 radio reports down
//!   Connected ─────────────────────────► Disconnected
//!       ▲                                    │
//!       │   reconnect interval elapsed,      │
//!       │   reconnect(), radio reports up    │
//!       └────────────────────────────────────┘
//! ```
//!
//! There is no other transition. While disconnected, reconnect attempts are
//! throttled to one per reconnect interval.

use log::{debug, info, warn};

use crate::{
    state::MonitorState,
    time::{elapsed, interval_passed, Millis},
};

pub const DEFAULT_RECONNECT_INTERVAL_MS: Millis = 60_000;
pub const DEFAULT_WIFI_TIMEOUT_MS: Millis = 15_000;
pub const DEFAULT_RECONNECT_GRACE_MS: Millis = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// The station-mode WiFi radio.
pub trait WifiRadio {
    /// Starts the station and blocks until associated or `timeout_ms` passes.
    fn connect(&mut self, ssid: &str, password: &str, timeout_ms: Millis) -> bool;

    fn status(&mut self) -> LinkStatus;

    /// Blocks for at most `grace_ms` while the radio re-associates.
    fn reconnect(&mut self, grace_ms: Millis);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSignal {
    ConnectionLost,
    ReconnectAttempt,
    Reconnected,
}

#[derive(Debug, Clone)]
pub struct ConnectivityMachine {
    link: LinkStatus,
    reconnect_interval_ms: Millis,
    reconnect_grace_ms: Millis,
}

impl ConnectivityMachine {
    pub fn new(reconnect_interval_ms: Millis, reconnect_grace_ms: Millis) -> Self {
        Self {
            link: LinkStatus::Disconnected,
            reconnect_interval_ms,
            reconnect_grace_ms,
        }
    }

    pub fn link(&self) -> LinkStatus {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Result of the boot-time connect, which happens outside the tick loop.
    pub fn mark_connected(&mut self, state: &mut MonitorState) {
        self.link = LinkStatus::Connected;
        state.wifi_connected = true;
    }

    pub fn on_tick<R: WifiRadio>(
        &mut self,
        radio: &mut R,
        state: &mut MonitorState,
        now: Millis,
    ) -> Vec<LinkSignal> {
        let mut signals = Vec::new();

        if self.link == LinkStatus::Connected {
            if radio.status().is_connected() {
                return signals;
            }
            warn!("wifi connection lost");
            self.link = LinkStatus::Disconnected;
            state.wifi_connected = false;
            signals.push(LinkSignal::ConnectionLost);
        }

        if !interval_passed(state.last_reconnect, now, self.reconnect_interval_ms) {
            debug!(
                "wifi reconnect throttled ({}ms since last attempt)",
                elapsed(state.last_reconnect, now)
            );
            return signals;
        }

        state.last_reconnect = now;
        state.reconnect_attempts = state.reconnect_attempts.saturating_add(1);
        signals.push(LinkSignal::ReconnectAttempt);
        info!("wifi reconnect attempt {}", state.reconnect_attempts);
        radio.reconnect(self.reconnect_grace_ms);

        if radio.status().is_connected() {
            info!("wifi reconnected");
            self.link = LinkStatus::Connected;
            state.wifi_connected = true;
            signals.push(LinkSignal::Reconnected);
        } else {
            warn!(
                "wifi reconnect failed; next attempt in {}s",
                self.reconnect_interval_ms / 1000
            );
        }

        signals
    }
}

impl Default for ConnectivityMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_RECONNECT_GRACE_MS)
    }
}
