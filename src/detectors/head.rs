//! Head movement and repetition detection
//!
//! Tracks the nose tip over a rolling window and scores oscillation: cycles
//! counted from smoothed local extrema, weighted by how much the head actually
//! moved. Large but slow movement and fast but tiny jitter both score low.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::landmarks::LandmarkSet;
use crate::types::Level;

/// Face mesh index of the nose tip
pub const NOSE_TIP: usize = 1;

/// Deltas smaller than this are treated as flat
const FLAT_EPSILON: f64 = 1e-9;

/// Head position: nose tip, falling back to the face centroid
pub fn head_center(landmarks: &LandmarkSet) -> Option<(f64, f64)> {
    let face = landmarks.face.as_ref()?;
    face.point(NOSE_TIP)
        .or_else(|| face.centroid())
        .map(|p| (p.x, p.y))
}

/// Head metrics over the current rolling window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadWindowMetrics {
    /// False until the window is full; all other fields are neutral until then
    pub ready: bool,
    pub position_std: f64,
    pub peaks: u32,
    pub cycles: f64,
    pub repetition_score: f64,
    pub repetitive: bool,
    pub level: Level,
}

impl Default for HeadWindowMetrics {
    fn default() -> Self {
        Self {
            ready: false,
            position_std: 0.0,
            peaks: 0,
            cycles: 0.0,
            repetition_score: 0.0,
            repetitive: false,
            level: Level::Normal,
        }
    }
}

/// Moving average with window `width`. Output has `len - width + 1` samples.
pub fn moving_average(series: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 || series.len() < width {
        return series.to_vec();
    }
    series
        .windows(width)
        .map(|w| w.iter().sum::<f64>() / width as f64)
        .collect()
}

/// Population variance
pub fn variance(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

fn range(series: &[f64]) -> f64 {
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    if max.is_finite() && min.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Count local extrema (peaks and troughs) after smoothing.
///
/// Returns 0 when the raw range does not exceed `min_range`.
pub fn count_extrema(series: &[f64], smoothing: usize, min_range: f64) -> u32 {
    if series.len() < 3 || range(series) <= min_range {
        return 0;
    }
    let smoothed = moving_average(series, smoothing);

    let mut extrema = 0;
    let mut last_sign = 0.0;
    for pair in smoothed.windows(2) {
        let delta = pair[1] - pair[0];
        if delta.abs() <= FLAT_EPSILON {
            continue;
        }
        let sign = delta.signum();
        if last_sign != 0.0 && sign != last_sign {
            extrema += 1;
        }
        last_sign = sign;
    }
    extrema
}

/// Movement level from positional std
pub fn movement_level(std: f64, low: f64, high: f64) -> Level {
    if std < low {
        Level::Low
    } else if std >= high {
        Level::High
    } else {
        Level::Normal
    }
}

/// Score a full window of head positions
pub fn analyze_head_window(positions: &[(f64, f64)], config: &DetectorConfig) -> HeadWindowMetrics {
    let xs: Vec<f64> = positions.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = positions.iter().map(|p| p.1).collect();

    let position_std = (variance(&xs) + variance(&ys)).sqrt();
    let peaks = count_extrema(&xs, config.smoothing, config.head_min_range).max(count_extrema(
        &ys,
        config.smoothing,
        config.head_min_range,
    ));
    let cycles = peaks as f64 / 2.0;
    let variance_factor = 1.0 - (-position_std / config.head_reference_std).exp();
    let repetition_score = cycles * variance_factor;

    HeadWindowMetrics {
        ready: true,
        position_std,
        peaks,
        cycles,
        repetition_score,
        repetitive: repetition_score > config.head_repetition_threshold,
        level: movement_level(position_std, config.head_low_std, config.head_high_std),
    }
}

/// Welford running mean/variance
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Population variance
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Per-session head movement tracker
#[derive(Debug, Clone)]
pub struct HeadMovementTracker {
    window_size: usize,
    window: VecDeque<(f64, f64)>,
    frames_since_eval: usize,
    windows_evaluated: u32,
    repetitive_windows: u32,
    max_cycles: f64,
    max_score: f64,
    stats_x: RunningStats,
    stats_y: RunningStats,
    total_displacement: f64,
    last_position: Option<(f64, f64)>,
}

impl HeadMovementTracker {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            frames_since_eval: 0,
            windows_evaluated: 0,
            repetitive_windows: 0,
            max_cycles: 0.0,
            max_score: 0.0,
            stats_x: RunningStats::default(),
            stats_y: RunningStats::default(),
            total_displacement: 0.0,
            last_position: None,
        }
    }

    /// Add a head position and score the current window.
    ///
    /// Every `window_size` frames the window is also recorded into the
    /// session counters, so each frame contributes to one recorded window.
    pub fn update(&mut self, position: (f64, f64), config: &DetectorConfig) -> HeadWindowMetrics {
        if let Some((lx, ly)) = self.last_position {
            self.total_displacement += ((position.0 - lx).powi(2) + (position.1 - ly).powi(2)).sqrt();
        }
        self.last_position = Some(position);
        self.stats_x.push(position.0);
        self.stats_y.push(position.1);

        self.window.push_back(position);
        while self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.frames_since_eval += 1;

        if self.window.len() < self.window_size {
            return HeadWindowMetrics::default();
        }

        let positions: Vec<(f64, f64)> = self.window.iter().copied().collect();
        let metrics = analyze_head_window(&positions, config);

        if self.frames_since_eval >= self.window_size {
            self.frames_since_eval = 0;
            self.windows_evaluated += 1;
            if metrics.repetitive {
                self.repetitive_windows += 1;
            }
            self.max_cycles = self.max_cycles.max(metrics.cycles);
            self.max_score = self.max_score.max(metrics.repetition_score);
            debug!(
                window = self.windows_evaluated,
                cycles = metrics.cycles,
                score = metrics.repetition_score,
                repetitive = metrics.repetitive,
                "Head window evaluated"
            );
        }

        metrics
    }

    /// Positional std over the whole session
    pub fn position_std(&self) -> f64 {
        (self.stats_x.variance() + self.stats_y.variance()).sqrt()
    }

    pub fn total_displacement(&self) -> f64 {
        self.total_displacement
    }

    pub fn windows_evaluated(&self) -> u32 {
        self.windows_evaluated
    }

    pub fn repetitive_windows(&self) -> u32 {
        self.repetitive_windows
    }

    pub fn max_cycles(&self) -> f64 {
        self.max_cycles
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    pub fn samples(&self) -> u64 {
        self.stats_x.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn make_test_config(window: usize) -> DetectorConfig {
        DetectorConfig {
            head_window: window,
            ..Default::default()
        }
    }

    fn make_test_sine(frames: usize, period: f64, amplitude: f64) -> Vec<(f64, f64)> {
        (0..frames)
            .map(|t| {
                let y = 0.5 + amplitude * (2.0 * PI * t as f64 / period + 0.3).sin();
                (0.5, y)
            })
            .collect()
    }

    #[test]
    fn test_peak_count_proportional_to_frequency() {
        let config = make_test_config(60);
        let window = 60.0;
        for period in [20.0, 10.0] {
            let metrics = analyze_head_window(&make_test_sine(60, period, 0.05), &config);
            let expected = 2.0 * window / period;
            assert!(
                (metrics.peaks as f64 - expected).abs() <= 1.0,
                "period {period}: {} peaks, expected ~{expected}",
                metrics.peaks
            );
        }
    }

    #[test]
    fn test_small_range_has_no_extrema() {
        let series: Vec<f64> = (0..30).map(|t| 0.5 + 0.005 * (t as f64).sin()).collect();
        assert_eq!(count_extrema(&series, 3, 0.02), 0);
    }

    #[test]
    fn test_fast_nodding_is_repetitive() {
        let config = make_test_config(30);
        let metrics = analyze_head_window(&make_test_sine(30, 6.0, 0.05), &config);

        assert!(metrics.cycles >= 4.0);
        assert!(metrics.repetitive);
        assert_eq!(metrics.level, Level::High);
    }

    #[test]
    fn test_still_head() {
        let config = make_test_config(30);
        let positions = vec![(0.5, 0.5); 30];
        let metrics = analyze_head_window(&positions, &config);

        assert_eq!(metrics.peaks, 0);
        assert!(!metrics.repetitive);
        assert_eq!(metrics.level, Level::Low);
    }

    #[test]
    fn test_tracker_neutral_until_window_full() {
        let config = make_test_config(30);
        let mut tracker = HeadMovementTracker::new(30);
        let series = make_test_sine(29, 6.0, 0.05);
        for p in series {
            let metrics = tracker.update(p, &config);
            assert!(!metrics.ready);
            assert!(!metrics.repetitive);
        }
        assert_eq!(tracker.windows_evaluated(), 0);
    }

    #[test]
    fn test_tracker_records_non_overlapping_windows() {
        let config = make_test_config(30);
        let mut tracker = HeadMovementTracker::new(30);
        for p in make_test_sine(95, 6.0, 0.05) {
            tracker.update(p, &config);
        }
        assert_eq!(tracker.windows_evaluated(), 3);
        assert_eq!(tracker.repetitive_windows(), 3);
        assert!(tracker.max_score() > 3.0);
    }

    #[test]
    fn test_running_stats_matches_batch_variance() {
        let values = [0.1, 0.4, 0.35, 0.8, 0.2];
        let mut stats = RunningStats::default();
        for v in values {
            stats.push(v);
        }
        assert!((stats.variance() - variance(&values)).abs() < 1e-12);
    }

    #[test]
    fn test_head_center_falls_back_to_centroid() {
        use crate::landmarks::{FaceLandmarks, Point};
        let set = LandmarkSet {
            face: Some(FaceLandmarks {
                points: vec![Point::new(0.2, 0.4)],
            }),
            ..Default::default()
        };
        assert_eq!(head_center(&set), Some((0.2, 0.4)));
    }
}
