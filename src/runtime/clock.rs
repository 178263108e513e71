use std::time::Duration;

/// Host time as seen by the scheduler. Advanced once per `Engine::tick`.
///
/// Scaled time stops while `time_scale` is zero; real time never does.
#[derive(Debug, Clone)]
pub struct Clock {
    scaled: f64,
    real: f64,
    time_scale: f32,
    pause_menus_on: bool,
    frame: u64,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            scaled: 0.0,
            real: 0.0,
            time_scale: 1.0,
            pause_menus_on: false,
            frame: 0,
        }
    }

    pub fn advance(&mut self, delta: Duration) {
        let seconds = delta.as_secs_f64();
        self.real += seconds;
        self.scaled += seconds * f64::from(self.time_scale);
        self.frame += 1;
    }

    pub fn scaled_time(&self) -> f64 {
        self.scaled
    }

    pub fn real_time(&self) -> f64 {
        self.real
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn is_frozen(&self) -> bool {
        self.time_scale == 0.0
    }

    pub fn pause_menus_on(&self) -> bool {
        self.pause_menus_on
    }

    pub fn set_pause_menus(&mut self, on: bool) {
        self.pause_menus_on = on;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_time_only_moves_real_clock() {
        let mut clock = Clock::new();
        clock.advance(Duration::from_millis(500));
        clock.set_time_scale(0.0);
        clock.advance(Duration::from_millis(500));

        assert!(clock.is_frozen());
        assert_eq!(clock.scaled_time(), 0.5);
        assert_eq!(clock.real_time(), 1.0);
        assert_eq!(clock.frame(), 2);
    }
}
