use log::{debug, info};

use sitemon_common::{Display, DisplayConfig, DisplayText, Millis, ScrollAnimation, TextEffect};

/// Matrix display that reports each message on the log and models the
/// scroll timing with [`ScrollAnimation`], so `animate()` completes when a
/// real panel of the same width would.
pub struct LogDisplay<C> {
    clock: C,
    modules: u8,
    current: Option<(DisplayText, ScrollAnimation)>,
}

impl<C> LogDisplay<C>
where
    C: Fn() -> Millis,
{
    pub fn new(config: &DisplayConfig, cs_pin: i32, clock: C) -> Self {
        info!(
            "display ready on cs gpio{cs_pin}: {} modules, intensity {}",
            config.modules, config.intensity
        );
        Self {
            clock,
            modules: config.modules,
            current: None,
        }
    }

    #[cfg(test)]
    fn text(&self) -> Option<&str> {
        self.current.as_ref().map(|(message, _)| message.text.as_str())
    }
}

impl<C> Display for LogDisplay<C>
where
    C: Fn() -> Millis,
{
    fn show(&mut self, message: &DisplayText) {
        let mode = match message.entry {
            TextEffect::Print => "print",
            TextEffect::ScrollLeft => "scroll",
        };
        info!("display [{mode}] {}", message.text);

        let animation = ScrollAnimation::start(message, self.modules, (self.clock)());
        self.current = Some((message.clone(), animation));
    }

    fn animate(&mut self) -> bool {
        match &self.current {
            Some((_, animation)) => animation.is_complete((self.clock)()),
            None => true,
        }
    }

    fn reset(&mut self) {
        let now = (self.clock)();
        if let Some((_, animation)) = &mut self.current {
            animation.restart(now);
        }
    }

    fn clear(&mut self) {
        if let Some((message, _)) = self.current.take() {
            debug!("display cleared after `{}`", message.text);
        }
    }
}
