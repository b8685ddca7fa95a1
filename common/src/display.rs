use crate::time::{elapsed, Millis};

pub const DEFAULT_SCROLL_SPEED: u16 = 40;

/// Columns per character cell of the 5x7 font, including spacing.
const CHAR_COLUMNS: u32 = 6;
const COLUMNS_PER_MODULE: u32 = 8;

pub const MSG_WIFI_CONNECTING: &str = "Wifi...";
pub const MSG_WIFI_OK: &str = "Wifi ok";
pub const MSG_WIFI_ERROR: &str = "Wifi error";
pub const MSG_WIFI_LOST: &str = "Wifi lost";
pub const MSG_CHECKING: &str = "PING";
pub const MSG_SITE_UP: &str = "UP";
pub const MSG_SITE_DOWN: &str = "Error!!!";
pub const MSG_MUTED: &str = "MUTE";
pub const MSG_UNMUTED: &str = "SOUND ON";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEffect {
    /// Text appears in place.
    Print,
    /// Text slides through the panel right to left.
    ScrollLeft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
    pub text: String,
    pub alignment: Alignment,
    /// Milliseconds per animation frame.
    pub speed: u16,
    pub pause_ms: Millis,
    pub entry: TextEffect,
    pub exit: TextEffect,
}

impl DisplayText {
    pub fn scrolling(text: &str, speed: u16) -> Self {
        Self {
            text: text.to_string(),
            alignment: Alignment::Center,
            speed,
            pause_ms: 0,
            entry: TextEffect::ScrollLeft,
            exit: TextEffect::ScrollLeft,
        }
    }

    pub fn printed(text: &str) -> Self {
        Self {
            text: text.to_string(),
            alignment: Alignment::Center,
            speed: 0,
            pause_ms: 0,
            entry: TextEffect::Print,
            exit: TextEffect::Print,
        }
    }
}

/// The LED matrix text animator.
pub trait Display {
    /// Replaces the current message and restarts the animation.
    fn show(&mut self, message: &DisplayText);

    /// Advances the animation. Returns true once the full entry/pause/exit
    /// sequence has completed, and keeps returning true until reset.
    fn animate(&mut self) -> bool;

    /// Restarts the current message from its entry effect.
    fn reset(&mut self);

    fn clear(&mut self);
}

/// Time-based model of one message's animation, for displays that do not
/// report completion themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollAnimation {
    started_at: Millis,
    duration_ms: Millis,
}

impl ScrollAnimation {
    pub fn start(message: &DisplayText, panel_modules: u8, now: Millis) -> Self {
        Self {
            started_at: now,
            duration_ms: Self::duration_ms(message, panel_modules),
        }
    }

    pub fn duration_ms(message: &DisplayText, panel_modules: u8) -> Millis {
        let panel_columns = u32::from(panel_modules) * COLUMNS_PER_MODULE;
        let text_columns = (message.text.chars().count() as u32).saturating_mul(CHAR_COLUMNS);
        let frame_ms = u32::from(message.speed);

        // An entry scroll brings the text in from the right edge; an exit
        // scroll carries it out past the left edge.
        let mut frames = 0_u32;
        if message.entry == TextEffect::ScrollLeft {
            frames = frames.saturating_add(panel_columns);
        }
        if message.exit == TextEffect::ScrollLeft {
            frames = frames.saturating_add(text_columns);
        }

        frames
            .saturating_mul(frame_ms)
            .saturating_add(message.pause_ms)
    }

    pub fn restart(&mut self, now: Millis) {
        self.started_at = now;
    }

    pub fn is_complete(&self, now: Millis) -> bool {
        elapsed(self.started_at, now) >= self.duration_ms
    }
}
