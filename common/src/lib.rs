pub mod alert;
pub mod button;
pub mod config;
pub mod connectivity;
pub mod display;
pub mod http;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod time;

pub use alert::Buzzer;
pub use button::{ButtonDebouncer, ButtonFlag, ToggleAction};
pub use config::{ConfigError, DisplayConfig, MonitorConfig, NetworkConfig, PinConfig, RuntimeConfig};
pub use connectivity::{ConnectivityMachine, LinkSignal, LinkStatus, WifiRadio};
pub use display::{Display, DisplayText, ScrollAnimation, TextEffect};
pub use http::{HttpProbe, TransportError};
pub use scheduler::MonitorScheduler;
pub use state::{MonitorSnapshot, MonitorState};
pub use status::{classify, SiteVerdict, StatusClass};
pub use time::{elapsed, has_timed_out, interval_passed, Deadline, Millis};
