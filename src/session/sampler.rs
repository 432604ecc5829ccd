//! Frame sampling for batch ingestion
//!
//! Recordings are usually captured at 25-60 fps, but the detectors are tuned
//! for roughly 10 frames per second. The sampler keeps frames at a target rate
//! based on their timestamps.

/// Default sampling rate for recorded video
pub const DEFAULT_BATCH_FPS: f64 = 10.0;

/// What to do with a recorded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDecision {
    /// Due at the target rate
    Keep,
    /// Between two due frames
    Skip,
    /// Earlier than the last kept frame; forwarded so the session counts it
    OutOfOrder,
    /// Non-finite timestamp; forwarded so the session counts it as malformed
    Invalid,
}

impl SampleDecision {
    /// Whether the frame goes on to the session
    pub fn forwards(&self) -> bool {
        !matches!(self, SampleDecision::Skip)
    }
}

/// Timestamp-driven frame decimator
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: f64,
    next_due: Option<f64>,
    last_kept: Option<f64>,
}

impl FrameSampler {
    /// Sampler keeping at most `target_fps` frames per second.
    /// A non-positive rate keeps every frame.
    pub fn new(target_fps: f64) -> Self {
        let interval = if target_fps.is_finite() && target_fps > 0.0 {
            1.0 / target_fps
        } else {
            0.0
        };
        Self {
            interval,
            next_due: None,
            last_kept: None,
        }
    }

    /// Classify the frame at `timestamp`. Only `Keep` advances the sampler.
    pub fn decide(&mut self, timestamp: f64) -> SampleDecision {
        if !timestamp.is_finite() {
            return SampleDecision::Invalid;
        }
        if self.last_kept.is_some_and(|last| timestamp < last) {
            return SampleDecision::OutOfOrder;
        }

        match self.next_due {
            Some(due) if timestamp + 1e-9 < due => SampleDecision::Skip,
            Some(due) if self.interval > 0.0 => {
                // Skip whole intervals after a gap instead of bursting
                let elapsed = ((timestamp - due) / self.interval).floor().max(0.0);
                self.next_due = Some(due + (elapsed + 1.0) * self.interval);
                self.last_kept = Some(timestamp);
                SampleDecision::Keep
            }
            _ => {
                self.next_due = Some(timestamp + self.interval);
                self.last_kept = Some(timestamp);
                SampleDecision::Keep
            }
        }
    }

    /// Whether the frame at `timestamp` should be passed to the session
    pub fn accept(&mut self, timestamp: f64) -> bool {
        self.decide(timestamp).forwards()
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimates_30_to_10_fps() {
        let mut sampler = FrameSampler::new(10.0);
        let kept = (0..90)
            .map(|i| i as f64 / 30.0)
            .filter(|&t| sampler.accept(t))
            .count();
        assert_eq!(kept, 30);
    }

    #[test]
    fn test_slower_source_keeps_everything() {
        let mut sampler = FrameSampler::new(10.0);
        let kept = (0..25).map(|i| i as f64 / 5.0).filter(|&t| sampler.accept(t)).count();
        assert_eq!(kept, 25);
    }

    #[test]
    fn test_zero_rate_keeps_everything() {
        let mut sampler = FrameSampler::new(0.0);
        assert!((0..10).all(|i| sampler.accept(i as f64 * 0.001)));
    }

    #[test]
    fn test_non_finite_timestamp_is_forwarded_untouched() {
        let mut sampler = FrameSampler::new(10.0);
        assert_eq!(sampler.decide(0.0), SampleDecision::Keep);
        assert_eq!(sampler.decide(f64::INFINITY), SampleDecision::Invalid);
        assert_eq!(sampler.decide(f64::NAN), SampleDecision::Invalid);
        // Sampling state is unchanged
        assert_eq!(sampler.decide(0.05), SampleDecision::Skip);
        assert_eq!(sampler.decide(0.1), SampleDecision::Keep);
    }

    #[test]
    fn test_large_gap_resumes_on_grid() {
        let mut sampler = FrameSampler::new(10.0);
        assert!(sampler.accept(0.0));
        assert!(sampler.accept(1.0e8));
        let kept = (1..=100)
            .map(|i| 1.0e8 + i as f64 * 0.01)
            .filter(|&t| sampler.accept(t))
            .count();
        assert!((9..=11).contains(&kept), "kept {kept}");
    }

    #[test]
    fn test_reordered_frame_is_forwarded() {
        let mut sampler = FrameSampler::new(0.0);
        assert_eq!(sampler.decide(1.0), SampleDecision::Keep);
        assert_eq!(sampler.decide(0.5), SampleDecision::OutOfOrder);
        assert_eq!(sampler.decide(1.1), SampleDecision::Keep);

        let mut sampler = FrameSampler::new(10.0);
        assert_eq!(sampler.decide(1.0), SampleDecision::Keep);
        assert_eq!(sampler.decide(0.2), SampleDecision::OutOfOrder);
        assert_eq!(sampler.decide(1.05), SampleDecision::Skip);
    }
}
