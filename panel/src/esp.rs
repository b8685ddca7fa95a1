use std::{sync::Arc, thread, time::Duration};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::{client::Client as HttpClient, Status},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    gpio::{AnyIOPin, AnyOutputPin, Input, InterruptType, PinDriver, Pull},
    ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver},
    units::Hertz,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    io::EspIOError,
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
    sys::esp_err_t,
    wifi::EspWifi,
};
use log::{debug, info, warn};

use sitemon_common::{
    config::MAX_TICK_STALL_MS, ButtonFlag, Buzzer, Deadline, HttpProbe, LinkStatus, Millis,
    MonitorScheduler, RuntimeConfig, TransportError, WifiRadio,
};

use crate::display::LogDisplay;

const NVS_NAMESPACE: &str = "sitemon";
const NVS_RUNTIME_KEY: &str = "runtime_json";

const WATCHDOG_TIMEOUT_SEC: u32 = MAX_TICK_STALL_MS / 1000 + 5;
const _: () = assert!(WATCHDOG_TIMEOUT_SEC * 1000 > MAX_TICK_STALL_MS);
const TICK_PERIOD_MS: u64 = 10;
const LINK_POLL_MS: u64 = 100;

#[derive(Clone)]
struct NvsStore {
    partition: EspDefaultNvsPartition,
}

struct EspRadio {
    wifi: EspWifi<'static>,
}

struct EspProbe;

struct LedcBuzzer {
    channel: LedcDriver<'static>,
    timer: esp_idf_svc::sys::ledc_timer_t,
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let nvs_store = NvsStore {
        partition: nvs_partition.clone(),
    };

    let mut runtime = nvs_store.load_runtime_config().unwrap_or_else(|err| {
        warn!("failed to load runtime config from NVS: {err:#}");
        RuntimeConfig::default()
    });
    ensure_network_defaults(&mut runtime);
    runtime.sanitize();
    if let Err(err) = runtime.validate() {
        warn!("runtime config is incomplete ({err}); monitoring will stay offline");
    }

    let Peripherals { modem, ledc, .. } = Peripherals::take()?;

    let button_flag = Arc::new(ButtonFlag::new());
    let mut button = init_button(runtime.pins.button, button_flag.clone())
        .context("failed to initialize mute button")?;

    if runtime.pins.buzzer < 0 {
        return Err(anyhow!("invalid buzzer pin: {}", runtime.pins.buzzer));
    }
    // Kept alive for the program lifetime; the channel only references it.
    let buzzer_timer = LedcTimerDriver::new(
        ledc.timer0,
        &TimerConfig::default().frequency(Hertz(runtime.monitor.alert_tone_hz)),
    )
    .context("failed to initialize buzzer timer")?;
    let buzzer_channel = LedcDriver::new(ledc.channel0, &buzzer_timer, unsafe {
        AnyOutputPin::new(runtime.pins.buzzer)
    })
    .context("failed to initialize buzzer channel")?;
    let buzzer = LedcBuzzer::new(buzzer_channel)?;

    let radio = EspRadio::new(modem, sys_loop, nvs_partition).context("wifi startup failed")?;
    let display = LogDisplay::new(&runtime.display, runtime.pins.display_cs, now_ms);

    let mut scheduler =
        MonitorScheduler::new(&runtime, button_flag, display, radio, EspProbe, buzzer);
    scheduler.boot(now_ms());

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;
    info!("monitor loop started");

    loop {
        feed_watchdog();
        // The driver disables the interrupt after each edge.
        if let Err(err) = button.enable_interrupt() {
            warn!("failed to re-arm button interrupt: {err}");
        }
        scheduler.tick(now_ms());
        thread::sleep(Duration::from_millis(TICK_PERIOD_MS));
    }
}

fn init_button(
    pin: i32,
    flag: Arc<ButtonFlag>,
) -> anyhow::Result<PinDriver<'static, AnyIOPin, Input>> {
    if pin < 0 {
        return Err(anyhow!("invalid button pin: {pin}"));
    }

    let mut button = PinDriver::input(unsafe { AnyIOPin::new(pin) })?;
    button.set_pull(Pull::Up)?;
    button.set_interrupt_type(InterruptType::NegEdge)?;
    unsafe {
        button.subscribe(move || flag.raise())?;
    }
    button.enable_interrupt()?;

    info!("mute button armed on gpio{pin}");
    Ok(button)
}

fn ensure_network_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or_default().to_string();
    }

    if runtime.network.wifi_pass.is_empty() {
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or_default().to_string();
    }

    if runtime.network.site_url.is_empty() {
        runtime.network.site_url = option_env!("SITE_URL").unwrap_or_default().to_string();
    }
}

impl EspRadio {
    fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs_partition: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition))?;
        Ok(Self { wifi })
    }

    fn start_station(&mut self, ssid: &str, password: &str) -> anyhow::Result<()> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid
                    .try_into()
                    .map_err(|_| anyhow!("wifi ssid too long"))?,
                password: password
                    .try_into()
                    .map_err(|_| anyhow!("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))?;

        self.wifi.start()?;
        self.wifi.connect()?;
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn wait_for_link(&self, timeout_ms: Millis) -> bool {
        let deadline = Deadline::new(now_ms(), timeout_ms);
        loop {
            if self.is_up() {
                return true;
            }
            if deadline.expired(now_ms()) {
                return false;
            }
            feed_watchdog();
            thread::sleep(Duration::from_millis(LINK_POLL_MS));
        }
    }
}

impl WifiRadio for EspRadio {
    fn connect(&mut self, ssid: &str, password: &str, timeout_ms: Millis) -> bool {
        if ssid.trim().is_empty() {
            warn!("no wifi ssid configured");
            return false;
        }

        if let Err(err) = self.start_station(ssid, password) {
            warn!("wifi station start failed: {err:#}");
            return false;
        }
        self.wait_for_link(timeout_ms)
    }

    fn status(&mut self) -> LinkStatus {
        if self.is_up() {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }

    fn reconnect(&mut self, grace_ms: Millis) {
        if let Err(err) = self.wifi.disconnect() {
            debug!("wifi disconnect before reconnect failed: {err}");
        }
        if let Err(err) = self.wifi.connect() {
            warn!("wifi reconnect request failed: {err}");
            return;
        }
        self.wait_for_link(grace_ms);
    }
}

impl HttpProbe for EspProbe {
    fn get(&mut self, url: &str, timeout_ms: Millis) -> i32 {
        match fetch_status(url, timeout_ms) {
            Ok(status) => i32::from(status),
            Err(err) => {
                debug!("GET {url} failed: {err:?}");
                transport_error(&err).code()
            }
        }
    }
}

fn fetch_status(url: &str, timeout_ms: Millis) -> Result<u16, EspIOError> {
    let config = HttpClientConfiguration {
        timeout: Some(Duration::from_millis(timeout_ms.into())),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    };

    let mut client = HttpClient::wrap(EspHttpConnection::new(&config)?);
    let response = client.get(url)?.submit()?;
    Ok(response.status())
}

fn transport_error(err: &EspIOError) -> TransportError {
    use esp_idf_svc::sys::{
        ESP_ERR_HTTP_CONNECT, ESP_ERR_HTTP_EAGAIN, ESP_ERR_HTTP_FETCH_HEADER,
        ESP_ERR_HTTP_WRITE_DATA, ESP_ERR_NO_MEM, ESP_ERR_TIMEOUT,
    };

    let code = err.0.code();
    if code == ESP_ERR_HTTP_CONNECT as esp_err_t {
        TransportError::ConnectionRefused
    } else if code == ESP_ERR_HTTP_EAGAIN as esp_err_t || code == ESP_ERR_TIMEOUT as esp_err_t {
        TransportError::ReadTimeout
    } else if code == ESP_ERR_HTTP_WRITE_DATA as esp_err_t {
        TransportError::SendHeaderFailed
    } else if code == ESP_ERR_HTTP_FETCH_HEADER as esp_err_t {
        TransportError::NoHttpServer
    } else if code == ESP_ERR_NO_MEM as esp_err_t {
        TransportError::OutOfMemory
    } else {
        TransportError::ConnectionLost
    }
}

impl LedcBuzzer {
    fn new(mut channel: LedcDriver<'static>) -> anyhow::Result<Self> {
        channel.set_duty(0).context("failed to silence buzzer")?;
        Ok(Self {
            channel,
            timer: esp_idf_svc::sys::ledc_timer_t_LEDC_TIMER_0,
        })
    }
}

impl Buzzer for LedcBuzzer {
    fn tone(&mut self, freq_hz: u32) {
        let rc = unsafe {
            esp_idf_svc::sys::ledc_set_freq(
                esp_idf_svc::sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
                self.timer,
                freq_hz,
            )
        };
        if rc != esp_idf_svc::sys::ESP_OK {
            warn!("buzzer rejected {freq_hz} Hz: esp_err_t={rc}");
            return;
        }

        let duty = self.channel.get_max_duty() / 2;
        if let Err(err) = self.channel.set_duty(duty) {
            warn!("failed to start buzzer: {err}");
        }
    }

    fn no_tone(&mut self) {
        if let Err(err) = self.channel.set_duty(0) {
            warn!("failed to stop buzzer: {err}");
        }
    }

    fn beep(&mut self, freq_hz: u32, duration_ms: Millis) {
        self.tone(freq_hz);
        thread::sleep(Duration::from_millis(duration_ms.into()));
        self.no_tone();
    }
}

impl NvsStore {
    fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = vec![0_u8; 2048];

        match nvs.get_str(NVS_RUNTIME_KEY, &mut buffer)? {
            Some(value) => Ok(serde_json::from_str::<RuntimeConfig>(value)?),
            None => Ok(RuntimeConfig::default()),
        }
    }
}

/// Milliseconds since boot, truncated to the 32-bit counter the scheduler
/// works with.
fn now_ms() -> Millis {
    let micros = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
    (micros / 1000) as Millis
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}
