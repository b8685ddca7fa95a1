use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    alert::{DEFAULT_ALERT_TONE_HZ, DEFAULT_CONFIRM_TONE_HZ, DEFAULT_CONFIRM_TONE_MS},
    button::DEFAULT_DEBOUNCE_MS,
    connectivity::{
        DEFAULT_RECONNECT_GRACE_MS, DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_WIFI_TIMEOUT_MS,
    },
    display::DEFAULT_SCROLL_SPEED,
    http::DEFAULT_HTTP_TIMEOUT_MS,
    time::Millis,
};

pub const DEFAULT_CHECK_INTERVAL_MS: Millis = 30_000;

/// Upper bound on how long one tick may block: a reconnect grace, a site
/// check and a confirmation beep back to back. Device watchdogs are sized
/// above this.
pub const MAX_TICK_STALL_MS: Millis = 25_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("wifi ssid is empty")]
    MissingSsid,
    #[error("site url is empty")]
    MissingUrl,
    #[error("site url `{0}` must start with http:// or https://")]
    UnsupportedUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_ms: Millis,
    pub debounce_ms: Millis,
    pub reconnect_interval_ms: Millis,
    pub http_timeout_ms: Millis,
    pub wifi_timeout_ms: Millis,
    pub reconnect_grace_ms: Millis,
    pub alert_tone_hz: u32,
    pub confirm_tone_hz: u32,
    pub confirm_tone_ms: Millis,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            wifi_timeout_ms: DEFAULT_WIFI_TIMEOUT_MS,
            reconnect_grace_ms: DEFAULT_RECONNECT_GRACE_MS,
            alert_tone_hz: DEFAULT_ALERT_TONE_HZ,
            confirm_tone_hz: DEFAULT_CONFIRM_TONE_HZ,
            confirm_tone_ms: DEFAULT_CONFIRM_TONE_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub site_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub modules: u8,
    pub intensity: u8,
    pub scroll_speed: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            modules: 4,
            intensity: 2,
            scroll_speed: DEFAULT_SCROLL_SPEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub buzzer: i32,
    pub button: i32,
    pub display_cs: i32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            buzzer: 4,
            button: 5,
            display_cs: 12,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub pins: PinConfig,
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        self.check_interval_ms = self.check_interval_ms.clamp(1_000, 86_400_000);
        self.debounce_ms = self.debounce_ms.clamp(10, 2_000);
        self.reconnect_interval_ms = self.reconnect_interval_ms.clamp(5_000, 3_600_000);
        self.http_timeout_ms = self.http_timeout_ms.clamp(500, 12_000);
        self.wifi_timeout_ms = self.wifi_timeout_ms.clamp(1_000, 60_000);
        self.reconnect_grace_ms = self.reconnect_grace_ms.clamp(500, 12_000);
        self.alert_tone_hz = self.alert_tone_hz.clamp(100, 10_000);
        self.confirm_tone_hz = self.confirm_tone_hz.clamp(100, 10_000);
        self.confirm_tone_ms = self.confirm_tone_ms.clamp(10, 1_000);
    }

    /// Longest a single tick can block with these settings. The boot-time
    /// WiFi connect runs outside the tick loop and is not counted.
    pub fn worst_tick_stall_ms(&self) -> Millis {
        self.reconnect_grace_ms
            .saturating_add(self.http_timeout_ms)
            .saturating_add(self.confirm_tone_ms)
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.trim().is_empty() {
            return Err(ConfigError::MissingSsid);
        }

        let url = self.site_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::UnsupportedUrl(url.to_string()));
        }
        Ok(())
    }
}

impl DisplayConfig {
    pub fn sanitize(&mut self) {
        self.modules = self.modules.clamp(1, 16);
        self.intensity = self.intensity.min(15);
        self.scroll_speed = self.scroll_speed.clamp(5, 500);
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.monitor.sanitize();
        self.display.sanitize();
        self.network.site_url = self.network.site_url.trim().to_string();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()
    }
}
