//! Shared simulation clock. Pausing freezes it, which is how every in-flight
//! command stops progressing.

use blockbot_logic::constants::MAX_TIME_SCALE;

#[derive(Debug, Clone, PartialEq)]
pub struct SimClock {
    /// Simulated seconds since the clock was created.
    elapsed: f64,
    time_scale: f32,
    frozen: bool,
}

/// Clamp into `0..=MAX_TIME_SCALE`; NaN and infinities fall back to real time.
fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(0.0, MAX_TIME_SCALE)
    } else {
        1.0
    }
}

impl SimClock {
    pub fn new(time_scale: f32) -> Self {
        Self {
            elapsed: 0.0,
            time_scale: sanitize_scale(time_scale),
            frozen: false,
        }
    }

    /// Advance by a host frame of `dt` real seconds, returning the simulated
    /// delta (0 while frozen).
    pub fn advance(&mut self, dt: f32) -> f32 {
        if self.frozen {
            return 0.0;
        }
        let scaled = dt.max(0.0) * self.time_scale;
        self.elapsed += scaled as f64;
        scaled
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn resume(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = sanitize_scale(scale);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_scale() {
        let mut clock = SimClock::default();
        clock.set_time_scale(2.0);
        assert_eq!(clock.advance(1.0), 2.0);
        assert!((clock.elapsed() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_scale_is_clamped() {
        let mut clock = SimClock::default();
        clock.set_time_scale(-3.0);
        assert_eq!(clock.time_scale(), 0.0);
        clock.set_time_scale(1000.0);
        assert_eq!(clock.time_scale(), MAX_TIME_SCALE);
    }

    #[test]
    fn test_non_finite_scale_runs_in_real_time() {
        let mut clock = SimClock::new(f32::NAN);
        assert_eq!(clock.time_scale(), 1.0);
        assert_eq!(clock.advance(0.5), 0.5);
        clock.set_time_scale(f32::INFINITY);
        assert_eq!(clock.time_scale(), 1.0);
    }

    #[test]
    fn test_frozen_clock_does_not_advance() {
        let mut clock = SimClock::default();
        clock.advance(0.5);
        clock.freeze();
        assert_eq!(clock.advance(10.0), 0.0);
        assert!((clock.elapsed() - 0.5).abs() < 1e-9);
        clock.resume();
        assert_eq!(clock.advance(0.5), 0.5);
    }
}
