//! Frame scheduling and the hand-off to whatever draws the test
//!
//! The core never draws. Each frame it produces a [`FrameSnapshot`] and a
//! [`Renderer`] turns that into pixels (or log lines, when headless).

use crate::types::{FrameSnapshot, SessionResult, TestPhase};
use crate::GazeTest;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frames-per-second estimate, refreshed every half second
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    frames: u32,
    window_start_ms: f64,
    fps: u32,
}

impl FpsMeter {
    const WINDOW_MS: f64 = 500.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Count one frame at `now_ms` and return the current estimate
    pub fn frame(&mut self, now_ms: f64) -> u32 {
        self.frames += 1;
        let span = now_ms - self.window_start_ms;
        if span >= Self::WINDOW_MS {
            self.fps = (self.frames as f64 * 1000.0 / span).round() as u32;
            self.frames = 0;
            self.window_start_ms = now_ms;
        }
        self.fps
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

/// Consumer of per-frame output
pub trait Renderer {
    fn draw(&mut self, frame: &FrameSnapshot);
}

/// Headless renderer: reports phase changes and a stats line per second
#[derive(Debug, Default)]
pub struct LogRenderer {
    last_phase: Option<TestPhase>,
    last_second: Option<u32>,
}

impl Renderer for LogRenderer {
    fn draw(&mut self, frame: &FrameSnapshot) {
        if self.last_phase != Some(frame.phase) {
            log::info!("phase: {}", frame.phase.as_str());
            self.last_phase = Some(frame.phase);
        }

        match frame.phase {
            TestPhase::Countdown => {
                if let Some(n) = frame.countdown.filter(|n| Some(*n) != self.last_second) {
                    log::info!("{n}");
                    self.last_second = Some(n);
                }
            }
            TestPhase::Tracking => {
                let Some(secs) = frame.remaining_secs.filter(|s| Some(*s) != self.last_second) else {
                    return;
                };
                self.last_second = Some(secs);
                match frame.live {
                    Some(live) => log::info!(
                        "{secs}s left | deviation {:.0}px ({}%) | accuracy {}% | {} fps",
                        live.deviation_px,
                        live.deviation_pct,
                        live.running_accuracy,
                        frame.fps
                    ),
                    None => log::info!("{secs}s left | no gaze | {} fps", frame.fps),
                }
            }
            _ => {}
        }
    }
}

/// Fixed-rate frame driver standing in for the display's refresh callback
pub struct RenderLoop {
    frame_interval: Duration,
}

impl RenderLoop {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }

    /// ~60 Hz
    pub fn display_rate() -> Self {
        Self::new(Duration::from_millis(16))
    }

    /// Tick `test` once per frame until its session finishes or `shutdown` is
    /// raised. `on_frame` runs after every tick with the frame's time in ms.
    ///
    /// Returns `None` when stopped early; the in-flight session is discarded.
    pub async fn run<F>(
        &self,
        test: &mut GazeTest,
        renderer: &mut dyn Renderer,
        shutdown: Arc<AtomicBool>,
        mut on_frame: F,
    ) -> Option<SessionResult>
    where
        F: FnMut(&mut GazeTest, &FrameSnapshot, f64),
    {
        let origin = Instant::now();
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                log::warn!("Stopped during {}, session discarded", test.phase().as_str());
                return None;
            }

            let now_ms = origin.elapsed().as_secs_f64() * 1000.0;
            let frame = test.tick(now_ms);
            renderer.draw(&frame);
            on_frame(test, &frame, now_ms);

            match frame.phase {
                TestPhase::Finished => return frame.result,
                TestPhase::Unavailable => return None,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_over_half_second_windows() {
        let mut meter = FpsMeter::new();
        let mut now = 0.0;
        for _ in 0..31 {
            now += 1000.0 / 60.0;
            meter.frame(now);
        }
        // the first window closes on the first frame at or past 500ms
        assert!((59..=61).contains(&meter.fps()), "fps {}", meter.fps());
    }

    #[test]
    fn fps_is_zero_before_first_window() {
        let mut meter = FpsMeter::new();
        assert_eq!(meter.frame(100.0), 0);
        assert_eq!(meter.frame(200.0), 0);
    }
}
