use crate::time::Millis;

pub const DEFAULT_ALERT_TONE_HZ: u32 = 2_000;
pub const DEFAULT_CONFIRM_TONE_HZ: u32 = 1_000;
pub const DEFAULT_CONFIRM_TONE_MS: Millis = 80;

/// Piezo buzzer on a PWM-capable pin.
pub trait Buzzer {
    /// Starts a continuous tone. Replaces any tone already playing.
    fn tone(&mut self, freq_hz: u32);

    fn no_tone(&mut self);

    /// Plays a short tone and returns when it has finished.
    fn beep(&mut self, freq_hz: u32, duration_ms: Millis);
}
