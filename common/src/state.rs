use serde::Serialize;

use crate::{status::StatusClass, time::Millis};

/// Everything the tick loop mutates. Owned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    pub is_muted: bool,
    pub site_is_up: bool,
    pub wifi_connected: bool,
    pub message_scrolling: bool,
    pub last_check_time: Millis,
    pub last_reconnect: Millis,
    pub last_button_press: Millis,

    pub alert_sounding: bool,
    pub last_status: Option<StatusClass>,
    pub checks_run: u32,
    pub reconnect_attempts: u32,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            is_muted: false,
            site_is_up: true,
            wifi_connected: false,
            message_scrolling: false,
            last_check_time: 0,
            last_reconnect: 0,
            last_button_press: 0,
            alert_sounding: false,
            last_status: None,
            checks_run: 0,
            reconnect_attempts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    #[serde(rename = "nowMs")]
    pub now_ms: Millis,
    pub muted: bool,
    #[serde(rename = "siteUp")]
    pub site_up: bool,
    #[serde(rename = "wifiConnected")]
    pub wifi_connected: bool,
    #[serde(rename = "alertSounding")]
    pub alert_sounding: bool,
    #[serde(rename = "messageScrolling")]
    pub message_scrolling: bool,
    #[serde(rename = "lastStatus")]
    pub last_status: Option<&'static str>,
    #[serde(rename = "checksRun")]
    pub checks_run: u32,
    #[serde(rename = "reconnectAttempts")]
    pub reconnect_attempts: u32,
    #[serde(rename = "nextCheckInMs")]
    pub next_check_in_ms: Option<Millis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_site_up_and_wifi_down() {
        let state = MonitorState::default();

        assert!(!state.is_muted);
        assert!(state.site_is_up);
        assert!(!state.wifi_connected);
        assert!(!state.message_scrolling);
        assert_eq!(state.last_check_time, 0);
        assert_eq!(state.last_reconnect, 0);
        assert_eq!(state.last_button_press, 0);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let snapshot = MonitorSnapshot {
            now_ms: 42,
            muted: true,
            site_up: false,
            wifi_connected: true,
            alert_sounding: false,
            message_scrolling: false,
            last_status: Some("Server Error"),
            checks_run: 3,
            reconnect_attempts: 1,
            next_check_in_ms: Some(29_958),
        };

        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["siteUp"], false);
        assert_eq!(json["lastStatus"], "Server Error");
        assert_eq!(json["nextCheckInMs"], 29_958);
    }
}
