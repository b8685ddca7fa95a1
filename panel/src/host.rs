use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, OnceLock,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, runtime::Handle, sync::Mutex};
use tracing::{debug, info, warn};

use sitemon_common::{
    ButtonFlag, Buzzer, Deadline, HttpProbe, LinkStatus, Millis, MonitorScheduler,
    MonitorSnapshot, RuntimeConfig, TransportError, WifiRadio,
};

use crate::display::LogDisplay;

const TICK_PERIOD_MS: u64 = 10;
const LINK_POLL_MS: u64 = 100;

#[derive(Clone)]
struct AppState {
    button: Arc<ButtonFlag>,
    link_up: Arc<AtomicBool>,
    snapshot: Arc<Mutex<Option<MonitorSnapshot>>>,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct LinkView {
    #[serde(rename = "wifiUp")]
    wifi_up: bool,
}

/// Station radio whose link is a flag flipped through the control API.
struct SimRadio {
    link_up: Arc<AtomicBool>,
}

/// Real reachability check; the monitor thread borrows the tokio runtime for
/// each request.
struct ReqwestProbe {
    client: reqwest::Client,
    runtime: Handle,
}

struct LogBuzzer;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime);
    runtime.sanitize();
    if let Err(err) = runtime.validate() {
        warn!("runtime config is incomplete ({err}); monitoring will stay offline");
    }

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("sitemon-panel/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")?;

    let app_state = AppState {
        button: Arc::new(ButtonFlag::new()),
        link_up: Arc::new(AtomicBool::new(true)),
        snapshot: Arc::new(Mutex::new(None)),
    };

    spawn_monitor_loop(app_state.clone(), runtime, client)?;

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/button", post(handle_press_button))
        .route("/api/wifi/up", post(handle_wifi_up))
        .route("/api/wifi/down", post(handle_wifi_down))
        .with_state(app_state);

    let port = env_parse::<u16>("SITEMON_HTTP_PORT").unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind panel control server at {addr}"))?;

    info!("panel simulator listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn spawn_monitor_loop(
    app_state: AppState,
    runtime: RuntimeConfig,
    client: reqwest::Client,
) -> anyhow::Result<()> {
    let handle = Handle::current();

    thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let display =
                LogDisplay::new(&runtime.display, runtime.pins.display_cs, monotonic_ms);
            let radio = SimRadio {
                link_up: app_state.link_up.clone(),
            };
            let http = ReqwestProbe {
                client,
                runtime: handle,
            };

            let mut scheduler = MonitorScheduler::new(
                &runtime,
                app_state.button.clone(),
                display,
                radio,
                http,
                LogBuzzer,
            );
            scheduler.boot(monotonic_ms());

            loop {
                let now = monotonic_ms();
                scheduler.tick(now);
                *app_state.snapshot.blocking_lock() = Some(scheduler.snapshot(now));
                thread::sleep(Duration::from_millis(TICK_PERIOD_MS));
            }
        })
        .context("failed to spawn monitor thread")?;

    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    match state.snapshot.lock().await.clone() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => error_response(StatusCode::SERVICE_UNAVAILABLE, "Monitor is still booting"),
    }
}

async fn handle_press_button(State(state): State<AppState>) -> impl IntoResponse {
    state.button.raise();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "pressed": true })),
    )
}

async fn handle_wifi_up(State(state): State<AppState>) -> impl IntoResponse {
    set_link(&state, true)
}

async fn handle_wifi_down(State(state): State<AppState>) -> impl IntoResponse {
    set_link(&state, false)
}

fn set_link(state: &AppState, up: bool) -> Json<LinkView> {
    let previous = state.link_up.swap(up, Ordering::Relaxed);
    if previous != up {
        info!("simulated wifi link {}", if up { "restored" } else { "dropped" });
    }
    Json(LinkView { wifi_up: up })
}

impl SimRadio {
    fn wait_for_link(&self, timeout_ms: Millis) -> bool {
        let deadline = Deadline::new(monotonic_ms(), timeout_ms);
        loop {
            if self.link_up.load(Ordering::Relaxed) {
                return true;
            }
            if deadline.expired(monotonic_ms()) {
                return false;
            }
            thread::sleep(Duration::from_millis(LINK_POLL_MS));
        }
    }
}

impl WifiRadio for SimRadio {
    fn connect(&mut self, ssid: &str, _password: &str, timeout_ms: Millis) -> bool {
        if ssid.trim().is_empty() {
            warn!("no wifi ssid configured");
            return false;
        }
        self.wait_for_link(timeout_ms)
    }

    fn status(&mut self) -> LinkStatus {
        if self.link_up.load(Ordering::Relaxed) {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }

    fn reconnect(&mut self, grace_ms: Millis) {
        self.wait_for_link(grace_ms);
    }
}

impl HttpProbe for ReqwestProbe {
    fn get(&mut self, url: &str, timeout_ms: Millis) -> i32 {
        let request = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms.into()));

        match self.runtime.block_on(request.send()) {
            Ok(response) => i32::from(response.status().as_u16()),
            Err(err) => {
                debug!("GET {url} failed: {err}");
                transport_error(&err).code()
            }
        }
    }
}

fn transport_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::ReadTimeout
    } else if err.is_connect() {
        TransportError::ConnectionRefused
    } else if err.is_builder() || err.is_request() {
        TransportError::SendHeaderFailed
    } else if err.is_decode() || err.is_body() {
        TransportError::Encoding
    } else {
        TransportError::ConnectionLost
    }
}

impl Buzzer for LogBuzzer {
    fn tone(&mut self, freq_hz: u32) {
        info!("buzzer on at {freq_hz} Hz");
    }

    fn no_tone(&mut self) {
        info!("buzzer off");
    }

    fn beep(&mut self, freq_hz: u32, duration_ms: Millis) {
        info!("buzzer beep {freq_hz} Hz for {duration_ms}ms");
        thread::sleep(Duration::from_millis(duration_ms.into()));
    }
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("SITEMON_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.sitemon"));

        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw).with_context(|| {
                format!("invalid runtime config at {}", self.runtime_path.display())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(ssid) = std::env::var("WIFI_SSID") {
        runtime.network.wifi_ssid = ssid;
    }
    if let Ok(pass) = std::env::var("WIFI_PASS") {
        runtime.network.wifi_pass = pass;
    }
    if let Ok(url) = std::env::var("SITE_URL") {
        runtime.network.site_url = url;
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse::<T>().ok())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down panel simulator");
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Milliseconds since start on a 32-bit counter, shifted by
/// `SITEMON_CLOCK_OFFSET_MS` so the wrap can be reached without waiting
/// 49 days.
fn monotonic_ms() -> Millis {
    static START: OnceLock<Instant> = OnceLock::new();
    static OFFSET: OnceLock<Millis> = OnceLock::new();

    let offset = *OFFSET.get_or_init(|| env_parse("SITEMON_CLOCK_OFFSET_MS").unwrap_or(0));
    let elapsed = START.get_or_init(Instant::now).elapsed().as_millis() as Millis;
    elapsed.wrapping_add(offset)
}
