use std::sync::Arc;

use log::{info, warn};

use crate::{
    alert::Buzzer,
    button::{ButtonDebouncer, ButtonFlag, ToggleAction},
    config::{MonitorConfig, NetworkConfig, RuntimeConfig},
    connectivity::{ConnectivityMachine, LinkSignal, WifiRadio},
    display::{
        Display, DisplayText, MSG_CHECKING, MSG_MUTED, MSG_SITE_DOWN, MSG_SITE_UP, MSG_UNMUTED,
        MSG_WIFI_CONNECTING, MSG_WIFI_ERROR, MSG_WIFI_LOST, MSG_WIFI_OK,
    },
    http::{HttpProbe, TransportError},
    state::{MonitorSnapshot, MonitorState},
    status::SiteVerdict,
    time::{elapsed, interval_passed, Millis},
};

/// Drives one monitor from a free-running loop.
///
/// Each [`tick`](Self::tick) runs, in order: display animation, the mute
/// button, WiFi supervision, and the periodic site check. The button always
/// goes before the blocking work so a press is never starved by a check
/// scheduled in the same tick.
pub struct MonitorScheduler<D, R, H, B> {
    config: MonitorConfig,
    network: NetworkConfig,
    scroll_speed: u16,

    state: MonitorState,
    debouncer: ButtonDebouncer,
    connectivity: ConnectivityMachine,
    button: Arc<ButtonFlag>,

    display: D,
    radio: R,
    http: H,
    buzzer: B,
}

impl<D, R, H, B> MonitorScheduler<D, R, H, B>
where
    D: Display,
    R: WifiRadio,
    H: HttpProbe,
    B: Buzzer,
{
    pub fn new(
        runtime: &RuntimeConfig,
        button: Arc<ButtonFlag>,
        display: D,
        radio: R,
        http: H,
        buzzer: B,
    ) -> Self {
        let config = runtime.monitor.clone();
        Self {
            debouncer: ButtonDebouncer::new(config.debounce_ms),
            connectivity: ConnectivityMachine::new(
                config.reconnect_interval_ms,
                config.reconnect_grace_ms,
            ),
            config,
            network: runtime.network.clone(),
            scroll_speed: runtime.display.scroll_speed,
            state: MonitorState::default(),
            button,
            display,
            radio,
            http,
            buzzer,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Initial blocking WiFi connect. A failure is not fatal: the alert is
    /// raised and the tick loop keeps retrying on the reconnect interval.
    pub fn boot(&mut self, now: Millis) -> bool {
        self.show_status(MSG_WIFI_CONNECTING);
        info!("wifi connecting to `{}`", self.network.wifi_ssid);

        let connected = self.radio.connect(
            &self.network.wifi_ssid,
            &self.network.wifi_pass,
            self.config.wifi_timeout_ms,
        );

        if connected {
            info!("wifi connected");
            self.connectivity.mark_connected(&mut self.state);
            self.show_transient(MSG_WIFI_OK);
        } else {
            warn!(
                "wifi connect timed out after {}ms (boot at {now}ms); retrying every {}s",
                self.config.wifi_timeout_ms,
                self.config.reconnect_interval_ms / 1000
            );
            self.show_status(MSG_WIFI_ERROR);
            self.sound_alert();
        }

        connected
    }

    pub fn tick(&mut self, now: Millis) {
        self.step_display();
        self.handle_button(now);
        self.handle_link(now);

        if self.state.wifi_connected
            && interval_passed(self.state.last_check_time, now, self.config.check_interval_ms)
        {
            self.run_site_check(now);
        }
    }

    pub fn snapshot(&self, now: Millis) -> MonitorSnapshot {
        let next_check_in_ms = self.state.wifi_connected.then(|| {
            self.config
                .check_interval_ms
                .saturating_sub(elapsed(self.state.last_check_time, now))
        });

        MonitorSnapshot {
            now_ms: now,
            muted: self.state.is_muted,
            site_up: self.state.site_is_up,
            wifi_connected: self.state.wifi_connected,
            alert_sounding: self.state.alert_sounding,
            message_scrolling: self.state.message_scrolling,
            last_status: self.state.last_status.map(|class| class.as_str()),
            checks_run: self.state.checks_run,
            reconnect_attempts: self.state.reconnect_attempts,
            next_check_in_ms,
        }
    }

    fn step_display(&mut self) {
        if !self.display.animate() {
            return;
        }

        if self.state.message_scrolling {
            self.state.message_scrolling = false;
            self.display.clear();
        } else {
            self.display.reset();
        }
    }

    fn handle_button(&mut self, now: Millis) {
        let Some(action) = self
            .debouncer
            .handle_pending(&self.button, &mut self.state, now)
        else {
            return;
        };

        match action {
            ToggleAction::Muted => {
                self.silence_alert();
                self.show_transient(MSG_MUTED);
            }
            ToggleAction::Unmuted => {
                self.show_transient(MSG_UNMUTED);
                self.buzzer
                    .beep(self.config.confirm_tone_hz, self.config.confirm_tone_ms);
            }
        }
    }

    fn handle_link(&mut self, now: Millis) {
        let signals = self
            .connectivity
            .on_tick(&mut self.radio, &mut self.state, now);

        for signal in signals {
            match signal {
                LinkSignal::ConnectionLost => {
                    self.show_status(MSG_WIFI_LOST);
                    self.sound_alert();
                }
                LinkSignal::ReconnectAttempt => {}
                LinkSignal::Reconnected => {
                    self.silence_alert();
                    self.show_transient(MSG_WIFI_OK);
                }
            }
        }
    }

    fn run_site_check(&mut self, now: Millis) {
        self.state.last_check_time = now;
        self.state.checks_run = self.state.checks_run.saturating_add(1);

        self.display.show(&DisplayText::printed(MSG_CHECKING));
        let code = self
            .http
            .get(&self.network.site_url, self.config.http_timeout_ms);
        let verdict = SiteVerdict::from_code(code);

        match TransportError::from_code(code) {
            Some(err) => warn!("site check failed: {err} ({code})"),
            None => info!(
                "site check: HTTP {code} {} -> {}",
                verdict.class.as_str(),
                if verdict.is_up { "up" } else { "down" }
            ),
        }

        if verdict.is_up != self.state.site_is_up {
            info!(
                "site status changed: {}",
                if verdict.is_up { "UP" } else { "DOWN" }
            );
        }

        self.state.site_is_up = verdict.is_up;
        self.state.last_status = Some(verdict.class);

        if verdict.is_up {
            self.silence_alert();
            self.show_status(MSG_SITE_UP);
        } else {
            self.show_status(MSG_SITE_DOWN);
            self.sound_alert();
        }
    }

    /// A message that repeats until replaced.
    fn show_status(&mut self, text: &str) {
        self.state.message_scrolling = false;
        self.display
            .show(&DisplayText::scrolling(text, self.scroll_speed));
    }

    /// A message that scrolls once, after which the panel is cleared.
    fn show_transient(&mut self, text: &str) {
        self.state.message_scrolling = true;
        self.display
            .show(&DisplayText::scrolling(text, self.scroll_speed));
    }

    fn sound_alert(&mut self) {
        if self.state.is_muted || self.state.alert_sounding {
            return;
        }
        self.buzzer.tone(self.config.alert_tone_hz);
        self.state.alert_sounding = true;
    }

    fn silence_alert(&mut self) {
        if !self.state.alert_sounding {
            return;
        }
        self.buzzer.no_tone();
        self.state.alert_sounding = false;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{connectivity::LinkStatus, status::StatusClass};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum DisplayCall {
        Show(String),
        Reset,
        Clear,
    }

    #[derive(Default)]
    struct FakeDisplay {
        finished: bool,
        animate_calls: usize,
        calls: Vec<DisplayCall>,
    }

    impl Display for FakeDisplay {
        fn show(&mut self, message: &DisplayText) {
            self.calls.push(DisplayCall::Show(message.text.clone()));
        }

        fn animate(&mut self) -> bool {
            self.animate_calls += 1;
            self.finished
        }

        fn reset(&mut self) {
            self.calls.push(DisplayCall::Reset);
        }

        fn clear(&mut self) {
            self.calls.push(DisplayCall::Clear);
        }
    }

    impl FakeDisplay {
        fn shown(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    DisplayCall::Show(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    #[derive(Default)]
    struct FakeRadio {
        up: bool,
        connect_succeeds: bool,
        up_after_reconnect: bool,
        connects: Vec<(String, Millis)>,
        reconnects: usize,
    }

    impl WifiRadio for FakeRadio {
        fn connect(&mut self, ssid: &str, _password: &str, timeout_ms: Millis) -> bool {
            self.connects.push((ssid.to_string(), timeout_ms));
            self.up = self.connect_succeeds;
            self.up
        }

        fn status(&mut self) -> LinkStatus {
            if self.up {
                LinkStatus::Connected
            } else {
                LinkStatus::Disconnected
            }
        }

        fn reconnect(&mut self, _grace_ms: Millis) {
            self.reconnects += 1;
            if self.up_after_reconnect {
                self.up = true;
            }
        }
    }

    #[derive(Default)]
    struct FakeHttp {
        responses: VecDeque<i32>,
        requests: Vec<(String, Millis)>,
    }

    impl HttpProbe for FakeHttp {
        fn get(&mut self, url: &str, timeout_ms: Millis) -> i32 {
            self.requests.push((url.to_string(), timeout_ms));
            self.responses.pop_front().unwrap_or(200)
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum BuzzerCall {
        Tone(u32),
        NoTone,
        Beep(u32, Millis),
    }

    #[derive(Default)]
    struct FakeBuzzer {
        calls: Vec<BuzzerCall>,
    }

    impl Buzzer for FakeBuzzer {
        fn tone(&mut self, freq_hz: u32) {
            self.calls.push(BuzzerCall::Tone(freq_hz));
        }

        fn no_tone(&mut self) {
            self.calls.push(BuzzerCall::NoTone);
        }

        fn beep(&mut self, freq_hz: u32, duration_ms: Millis) {
            self.calls.push(BuzzerCall::Beep(freq_hz, duration_ms));
        }
    }

    type TestScheduler = MonitorScheduler<FakeDisplay, FakeRadio, FakeHttp, FakeBuzzer>;

    const URL: &str = "https://status.example.com/health";

    fn scheduler(radio: FakeRadio) -> TestScheduler {
        let runtime = RuntimeConfig {
            network: NetworkConfig {
                wifi_ssid: "home".to_string(),
                wifi_pass: "secret".to_string(),
                site_url: URL.to_string(),
            },
            ..RuntimeConfig::default()
        };
        MonitorScheduler::new(
            &runtime,
            Arc::new(ButtonFlag::new()),
            FakeDisplay::default(),
            radio,
            FakeHttp::default(),
            FakeBuzzer::default(),
        )
    }

    fn online() -> TestScheduler {
        let mut scheduler = scheduler(FakeRadio {
            connect_succeeds: true,
            ..Default::default()
        });
        assert!(scheduler.boot(0));
        scheduler
    }

    fn offline() -> TestScheduler {
        let mut scheduler = scheduler(FakeRadio::default());
        assert!(!scheduler.boot(0));
        scheduler
    }

    fn clear_logs(scheduler: &mut TestScheduler) {
        scheduler.display.calls.clear();
        scheduler.buzzer.calls.clear();
        scheduler.http.requests.clear();
    }

    #[test]
    fn boot_connects_with_configured_credentials() {
        let scheduler = online();

        assert_eq!(
            scheduler.radio.connects,
            vec![("home".to_string(), 15_000)]
        );
        assert!(scheduler.state.wifi_connected);
        assert!(scheduler.state.message_scrolling);
        assert_eq!(scheduler.display.shown(), vec![MSG_WIFI_CONNECTING, MSG_WIFI_OK]);
        assert!(scheduler.buzzer.calls.is_empty());
    }

    #[test]
    fn boot_failure_raises_alert_and_retries_on_interval() {
        let mut scheduler = offline();

        assert!(!scheduler.state.wifi_connected);
        assert_eq!(scheduler.display.shown(), vec![MSG_WIFI_CONNECTING, MSG_WIFI_ERROR]);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::Tone(2_000)]);
        assert!(!scheduler.state.message_scrolling);

        scheduler.tick(15_000);
        scheduler.tick(59_999);
        assert_eq!(scheduler.radio.reconnects, 0);

        scheduler.tick(60_000);
        assert_eq!(scheduler.radio.reconnects, 1);
        assert_eq!(scheduler.state.last_reconnect, 60_000);
        assert!(!scheduler.state.wifi_connected);
        assert!(scheduler.state.alert_sounding);
    }

    #[test]
    fn site_check_fires_exactly_at_interval() {
        let mut scheduler = online();

        scheduler.tick(29_999);
        assert!(scheduler.http.requests.is_empty());

        scheduler.tick(30_000);
        scheduler.tick(30_000);
        scheduler.tick(59_999);
        assert_eq!(scheduler.http.requests, vec![(URL.to_string(), 5_000)]);
        assert_eq!(scheduler.state.last_check_time, 30_000);

        scheduler.tick(60_000);
        assert_eq!(scheduler.http.requests.len(), 2);
    }

    #[test]
    fn site_check_schedule_survives_counter_wrap() {
        let mut scheduler = online();
        scheduler.state.last_check_time = u32::MAX - 10_000;

        scheduler.tick(19_998);
        assert!(scheduler.http.requests.is_empty());

        scheduler.tick(19_999);
        assert_eq!(scheduler.http.requests.len(), 1);
    }

    #[test]
    fn up_result_shows_status_and_keeps_quiet() {
        let mut scheduler = online();
        scheduler.http.responses.push_back(404);
        clear_logs(&mut scheduler);

        scheduler.tick(30_000);

        assert_eq!(scheduler.display.shown(), vec![MSG_CHECKING, MSG_SITE_UP]);
        assert!(scheduler.state.site_is_up);
        assert_eq!(scheduler.state.last_status, Some(StatusClass::ClientError));
        assert!(scheduler.buzzer.calls.is_empty());
        assert!(!scheduler.state.message_scrolling);
    }

    #[test]
    fn down_result_sounds_alert_once_then_up_silences_it() {
        let mut scheduler = online();
        scheduler.http.responses.extend([503, -1, 200]);
        clear_logs(&mut scheduler);

        scheduler.tick(30_000);
        assert!(!scheduler.state.site_is_up);
        assert_eq!(scheduler.display.shown(), vec![MSG_CHECKING, MSG_SITE_DOWN]);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::Tone(2_000)]);

        scheduler.tick(60_000);
        assert_eq!(scheduler.state.last_status, Some(StatusClass::ConnectionError));
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::Tone(2_000)]);

        scheduler.tick(90_000);
        assert!(scheduler.state.site_is_up);
        assert_eq!(
            scheduler.buzzer.calls,
            vec![BuzzerCall::Tone(2_000), BuzzerCall::NoTone]
        );
        assert!(!scheduler.state.alert_sounding);
    }

    #[test]
    fn down_result_while_muted_stays_silent() {
        let mut scheduler = online();
        scheduler.state.is_muted = true;
        scheduler.http.responses.push_back(500);

        scheduler.tick(30_000);

        assert!(!scheduler.state.site_is_up);
        assert!(scheduler.buzzer.calls.is_empty());
    }

    #[test]
    fn no_site_check_while_disconnected() {
        let mut scheduler = offline();

        scheduler.tick(30_000);
        scheduler.tick(45_000);

        assert!(scheduler.http.requests.is_empty());
    }

    #[test]
    fn connection_loss_alerts_and_blocks_checks() {
        let mut scheduler = online();
        clear_logs(&mut scheduler);
        scheduler.radio.up = false;

        scheduler.tick(1_000);

        assert!(!scheduler.state.wifi_connected);
        assert_eq!(scheduler.display.shown(), vec![MSG_WIFI_LOST]);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::Tone(2_000)]);

        scheduler.tick(30_000);
        assert!(scheduler.http.requests.is_empty());
        assert_eq!(scheduler.radio.reconnects, 0);
    }

    #[test]
    fn reconnect_silences_alert_and_resumes_checks() {
        let mut scheduler = online();
        scheduler.radio.up = false;
        scheduler.tick(1_000);
        clear_logs(&mut scheduler);
        scheduler.radio.up_after_reconnect = true;

        scheduler.tick(60_000);

        assert_eq!(scheduler.radio.reconnects, 1);
        assert!(scheduler.state.wifi_connected);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::NoTone]);
        assert_eq!(
            scheduler.display.shown(),
            vec![MSG_WIFI_OK, MSG_CHECKING, MSG_SITE_UP]
        );
        assert_eq!(scheduler.http.requests.len(), 1);
    }

    #[test]
    fn mute_silences_running_alert() {
        let mut scheduler = offline();
        clear_logs(&mut scheduler);

        scheduler.button.raise();
        scheduler.tick(1_000);

        assert!(scheduler.state.is_muted);
        assert!(!scheduler.state.alert_sounding);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::NoTone]);
        assert_eq!(scheduler.display.shown(), vec![MSG_MUTED]);
        assert!(scheduler.state.message_scrolling);
    }

    #[test]
    fn unmute_plays_confirmation_tone() {
        let mut scheduler = online();
        scheduler.state.is_muted = true;
        clear_logs(&mut scheduler);

        scheduler.button.raise();
        scheduler.tick(1_000);

        assert!(!scheduler.state.is_muted);
        assert_eq!(scheduler.buzzer.calls, vec![BuzzerCall::Beep(1_000, 80)]);
        assert_eq!(scheduler.display.shown(), vec![MSG_UNMUTED]);
    }

    #[test]
    fn button_is_handled_before_a_due_site_check() {
        let mut scheduler = online();
        scheduler.http.responses.push_back(502);
        clear_logs(&mut scheduler);

        scheduler.button.raise();
        scheduler.tick(30_000);

        assert!(scheduler.state.is_muted);
        assert!(!scheduler.state.site_is_up);
        assert!(scheduler.buzzer.calls.is_empty());
        assert_eq!(
            scheduler.display.shown(),
            vec![MSG_MUTED, MSG_CHECKING, MSG_SITE_DOWN]
        );
    }

    #[test]
    fn rapid_presses_flip_mute_once() {
        let mut scheduler = online();

        scheduler.button.raise();
        scheduler.tick(1_000);
        scheduler.button.raise();
        scheduler.tick(1_199);
        assert!(scheduler.state.is_muted);

        scheduler.button.raise();
        scheduler.tick(1_400);
        assert!(!scheduler.state.is_muted);
    }

    #[test]
    fn finished_transient_message_clears_panel_once() {
        let mut scheduler = online();
        clear_logs(&mut scheduler);
        scheduler.display.finished = true;

        scheduler.tick(1_000);
        assert_eq!(scheduler.display.calls, vec![DisplayCall::Clear]);
        assert!(!scheduler.state.message_scrolling);

        scheduler.tick(1_001);
        assert_eq!(
            scheduler.display.calls,
            vec![DisplayCall::Clear, DisplayCall::Reset]
        );
    }

    #[test]
    fn finished_status_message_repeats() {
        let mut scheduler = offline();
        clear_logs(&mut scheduler);
        scheduler.display.finished = true;

        scheduler.tick(1_000);

        assert_eq!(scheduler.display.calls, vec![DisplayCall::Reset]);
    }

    #[test]
    fn idle_ticks_change_nothing() {
        let mut scheduler = online();
        scheduler.tick(30_000);
        clear_logs(&mut scheduler);
        let before = scheduler.state.clone();
        let animate_before = scheduler.display.animate_calls;

        for _ in 0..5 {
            scheduler.tick(30_000);
        }

        assert_eq!(scheduler.state, before);
        assert_eq!(scheduler.display.animate_calls, animate_before + 5);
        assert!(scheduler.display.calls.is_empty());
        assert!(scheduler.buzzer.calls.is_empty());
        assert!(scheduler.http.requests.is_empty());
        assert_eq!(scheduler.radio.connects.len(), 1);
        assert_eq!(scheduler.radio.reconnects, 0);
    }

    #[test]
    fn snapshot_reports_schedule_and_status() {
        let mut scheduler = online();
        scheduler.http.responses.push_back(500);
        scheduler.tick(30_000);

        let snapshot = scheduler.snapshot(40_000);

        assert_eq!(
            snapshot,
            MonitorSnapshot {
                now_ms: 40_000,
                muted: false,
                site_up: false,
                wifi_connected: true,
                alert_sounding: true,
                message_scrolling: false,
                last_status: Some("Server Error"),
                checks_run: 1,
                reconnect_attempts: 0,
                next_check_in_ms: Some(20_000),
            }
        );

        assert_eq!(offline().snapshot(5_000).next_check_in_ms, None);
    }
}
