//! Animation time and frame-rate sampling.

use std::time::{Duration, Instant};

/// How often a frame-rate sample is produced.
const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Time since the loop started, plus a frame counter that yields a
/// frames-per-second sample every [`REPORT_INTERVAL`].
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    window_start: Instant,
    frames: u32,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            window_start: now,
            frames: 0,
        }
    }

    /// Elapsed time driving the animation.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }

    /// Count one frame; returns a frame-rate sample once per interval.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let span = now.saturating_duration_since(self.window_start);
        if span < REPORT_INTERVAL {
            return None;
        }
        let fps = self.frames as f32 / span.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

/// Window title, with the frame rate appended when one is known.
pub fn window_title(base: &str, fps: Option<f32>) -> String {
    match fps {
        Some(fps) => format!("{base} | {fps:.1} FPS"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_reported_once_per_interval() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        for i in 1..30 {
            assert_eq!(clock.tick(t0 + Duration::from_millis(i * 10)), None);
        }
        let fps = clock.tick(t0 + Duration::from_millis(500)).unwrap();
        assert!((fps - 60.0).abs() < 1e-3);
        // Counter restarts after a sample.
        assert_eq!(clock.tick(t0 + Duration::from_millis(510)), None);
    }

    #[test]
    fn elapsed_is_measured_from_start() {
        let t0 = Instant::now();
        let clock = FrameClock::new(t0);
        assert_eq!(clock.elapsed(t0 + Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn title_includes_fps_when_known() {
        assert_eq!(window_title("Orrery", None), "Orrery");
        assert_eq!(window_title("Orrery", Some(59.94)), "Orrery | 59.9 FPS");
    }
}
