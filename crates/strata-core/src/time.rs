//! Tick timing for the strata crates
//!
//! A [`Ticker`] turns wall-clock timestamps into [`TickInfo`] values that are
//! handed, untouched, to every system on each world update.

use serde::{Deserialize, Serialize};

/// Timing payload passed to systems once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickInfo {
    /// Milliseconds elapsed since the previous tick (clamped)
    pub elapsed_ms: f64,
    /// Timestamp of this tick in milliseconds
    pub last_time: f64,
    /// Elapsed time in frames at the target rate; 1.0 is one full frame
    pub delta_time: f32,
}

impl TickInfo {
    /// Elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        (self.elapsed_ms / 1000.0) as f32
    }
}

/// Configuration for the ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Frame rate that `delta_time == 1.0` corresponds to
    pub target_fps: f32,
    /// Multiplier applied to `delta_time` (0.0 = frozen, 2.0 = double speed)
    pub speed: f32,
    /// Maximum elapsed time per tick to prevent spiral of death
    pub max_elapsed_ms: f64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            speed: 1.0,
            max_elapsed_ms: 250.0,
        }
    }
}

impl TickerConfig {
    /// Length of one target frame in milliseconds.
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(f32::EPSILON) as f64
    }
}

/// Frame clock producing [`TickInfo`] values
#[derive(Debug, Clone, Default)]
pub struct Ticker {
    /// Configuration
    pub config: TickerConfig,
    /// Timestamp of the previous tick, if any
    last_time: Option<f64>,
    /// Tick counter
    frame_count: u64,
    /// Whether the ticker is paused
    paused: bool,
}

impl Ticker {
    /// Create a ticker with custom config
    pub fn new(config: TickerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Produce the tick for timestamp `now_ms`.
    ///
    /// The first tick reports zero elapsed time. Timestamps that go backwards
    /// are treated as zero elapsed.
    pub fn tick(&mut self, now_ms: f64) -> TickInfo {
        let elapsed = match self.last_time {
            Some(last) => (now_ms - last).clamp(0.0, self.config.max_elapsed_ms),
            None => 0.0,
        };
        self.last_time = Some(now_ms);
        self.frame_count += 1;

        if self.paused {
            return TickInfo {
                elapsed_ms: 0.0,
                last_time: now_ms,
                delta_time: 0.0,
            };
        }

        TickInfo {
            elapsed_ms: elapsed,
            last_time: now_ms,
            delta_time: (elapsed / self.config.frame_ms()) as f32 * self.config.speed,
        }
    }

    /// Advance by a fixed amount of milliseconds from the previous tick.
    pub fn advance(&mut self, elapsed_ms: f64) -> TickInfo {
        let now = match self.last_time {
            Some(last) => last + elapsed_ms,
            None => {
                // Anchor so the first fixed step still reports its elapsed time.
                self.last_time = Some(0.0);
                elapsed_ms
            }
        };
        self.tick(now)
    }

    /// Number of ticks produced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the ticker is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause the ticker
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume the ticker
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Toggle pause state
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Set the speed multiplier (negative values clamp to 0.0)
    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_has_no_elapsed_time() {
        let mut ticker = Ticker::default();
        let tick = ticker.tick(1_000.0);
        assert_eq!(tick.elapsed_ms, 0.0);
        assert_eq!(tick.delta_time, 0.0);
        assert_eq!(tick.last_time, 1_000.0);
        assert_eq!(ticker.frame_count(), 1);
    }

    #[test]
    fn delta_is_normalized_to_target_frame() {
        let mut ticker = Ticker::default();
        ticker.tick(0.0);
        let tick = ticker.tick(1000.0 / 60.0);
        assert!((tick.delta_time - 1.0).abs() < 1e-4);

        ticker.set_speed(2.0);
        let tick = ticker.tick(2.0 * 1000.0 / 60.0);
        assert!((tick.delta_time - 2.0).abs() < 1e-4);
    }

    #[test]
    fn elapsed_is_clamped() {
        let mut ticker = Ticker::default();
        ticker.tick(0.0);
        let tick = ticker.tick(10_000.0);
        assert_eq!(tick.elapsed_ms, 250.0);

        let tick = ticker.tick(5_000.0);
        assert_eq!(tick.elapsed_ms, 0.0);
    }

    #[test]
    fn paused_ticks_report_zero() {
        let mut ticker = Ticker::default();
        ticker.tick(0.0);
        ticker.pause();
        let tick = ticker.tick(16.0);
        assert_eq!(tick.delta_time, 0.0);
        assert_eq!(tick.elapsed_ms, 0.0);
        assert_eq!(ticker.frame_count(), 2);

        ticker.toggle_pause();
        assert!(!ticker.is_paused());
        let tick = ticker.tick(32.0);
        assert_eq!(tick.elapsed_ms, 16.0);
    }

    #[test]
    fn advance_uses_fixed_steps() {
        let mut ticker = Ticker::default();
        let first = ticker.advance(20.0);
        assert_eq!(first.elapsed_ms, 20.0);
        assert_eq!(first.last_time, 20.0);
        let second = ticker.advance(20.0);
        assert_eq!(second.last_time, 40.0);
        assert!((second.elapsed_secs() - 0.02).abs() < 1e-6);
    }

    #[test]
    fn speed_never_negative() {
        let mut ticker = Ticker::default();
        ticker.set_speed(-3.0);
        assert_eq!(ticker.config.speed, 0.0);
    }
}
