//! Input level meter
//!
//! Computes a smoothed 0.0-1.0 loudness value from the blocks the audio
//! callback delivers. Rendering it is someone else's job; the daemon only
//! writes the number to the level file.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Smoothing time constant
const TAU: Duration = Duration::from_millis(150);

/// Quietest level that still registers, in dBFS
const FLOOR_DB: f32 = -60.0;

/// Root mean square and peak of a block, both clamped to 0.0-1.0
pub fn compute_levels(samples: &[f32]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let mut peak = 0.0f32;
    let mut sum_sq = 0.0f32;
    for &s in samples {
        peak = peak.max(s.abs());
        sum_sq += s * s;
    }

    let rms = (sum_sq / samples.len() as f32).sqrt();
    (rms.clamp(0.0, 1.0), peak.clamp(0.0, 1.0))
}

/// Exponential smoothing toward `next` over `dt`
pub fn smooth_level(prev: f32, next: f32, dt: Duration) -> f32 {
    let alpha = 1.0 - (-dt.as_secs_f32() / TAU.as_secs_f32()).exp();
    prev + (next - prev) * alpha
}

/// Map an RMS amplitude onto a perceptual 0.0-1.0 scale
fn loudness(rms: f32) -> f32 {
    if rms <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * rms.log10();
    ((db - FLOOR_DB) / -FLOOR_DB).clamp(0.0, 1.0)
}

#[derive(Debug, Default)]
struct LevelState {
    level: f32,
    last: Option<Instant>,
}

/// Shared, smoothed input level
///
/// Cloned into the audio callback, which updates it, while the daemon reads it.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    state: Arc<Mutex<LevelState>>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new block into the level
    pub fn update(&self, samples: &[f32]) {
        self.update_at(samples, Instant::now());
    }

    pub fn update_at(&self, samples: &[f32], now: Instant) {
        let (rms, _peak) = compute_levels(samples);
        let target = loudness(rms);

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let dt = state
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(TAU);
        state.level = smooth_level(state.level, target, dt);
        state.last = Some(now);
    }

    /// Current smoothed level, 0.0-1.0
    pub fn current(&self) -> f32 {
        match self.state.lock() {
            Ok(state) => state.level,
            Err(poisoned) => poisoned.into_inner().level,
        }
    }

    /// Back to silence, for the next session
    pub fn reset(&self) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = LevelState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_levels() {
        assert_eq!(compute_levels(&[]), (0.0, 0.0));
        let (rms, peak) = compute_levels(&[0.5, -0.5, 0.5, -0.5]);
        assert!((rms - 0.5).abs() < 1e-6);
        assert!((peak - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_loudness_scale() {
        assert_eq!(loudness(0.0), 0.0);
        assert_eq!(loudness(1.0), 1.0);
        assert!(loudness(0.001) <= 0.0 + f32::EPSILON);
        let mid = loudness(0.03);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_meter_rises_and_decays_smoothly() {
        let meter = LevelMeter::new();
        let start = Instant::now();
        let loud = vec![0.8f32; 320];
        let silent = vec![0.0f32; 320];

        meter.update_at(&loud, start);
        let first = meter.current();
        assert!(first > 0.0);

        meter.update_at(&loud, start + Duration::from_millis(20));
        let second = meter.current();
        assert!(second > first);

        meter.update_at(&silent, start + Duration::from_millis(40));
        let third = meter.current();
        assert!(third < second && third > 0.0);
    }

    #[test]
    fn test_meter_reset() {
        let meter = LevelMeter::new();
        meter.update(&[0.9; 64]);
        meter.reset();
        assert_eq!(meter.current(), 0.0);
    }
}
