//! Facial expression variability
//!
//! Dominant emotion labels sampled through the session are summarized as the
//! normalized Shannon entropy of their histogram. A child who shows one
//! expression the whole time scores 0; an even spread across labels scores 1.

use std::collections::BTreeMap;

use crate::types::Emotion;

/// Shannon entropy of a histogram, normalized by log2 of the distinct-label count.
///
/// Returns 0 for an empty histogram or a single label. Always in [0, 1].
pub fn normalized_entropy(counts: &BTreeMap<Emotion, u64>) -> f64 {
    let total: u64 = counts.values().sum();
    let distinct = counts.values().filter(|&&c| c > 0).count();
    if total == 0 || distinct < 2 {
        return 0.0;
    }

    let entropy: f64 = counts
        .values()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    (entropy / (distinct as f64).log2()).clamp(0.0, 1.0)
}

/// Fraction of consecutive samples whose label differs from the previous one
pub fn change_rate(history: &[Emotion]) -> f64 {
    if history.len() < 2 {
        return 0.0;
    }
    let changes = history.windows(2).filter(|w| w[0] != w[1]).count();
    changes as f64 / (history.len() - 1) as f64
}

/// Per-session emotion label history and sampling schedule
#[derive(Debug, Clone, Default)]
pub struct ExpressionTracker {
    history: Vec<Emotion>,
    eligible_frames: u64,
}

impl ExpressionTracker {
    /// Decide whether this frame should be sent to the classifier.
    ///
    /// Frames inside the warmup period are never eligible. After warmup every
    /// `sample_every`-th eligible frame is sampled, starting with the first.
    pub fn should_sample(
        &mut self,
        timestamp: f64,
        first_timestamp: f64,
        warmup_secs: f64,
        sample_every: u32,
    ) -> bool {
        if timestamp - first_timestamp < warmup_secs {
            return false;
        }
        let index = self.eligible_frames;
        self.eligible_frames += 1;
        index % sample_every.max(1) as u64 == 0
    }

    pub fn record(&mut self, emotion: Emotion) {
        self.history.push(emotion);
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn history(&self) -> &[Emotion] {
        &self.history
    }

    pub fn distribution(&self) -> BTreeMap<Emotion, u64> {
        let mut counts = BTreeMap::new();
        for &emotion in &self.history {
            *counts.entry(emotion).or_insert(0) += 1;
        }
        counts
    }

    /// Most frequent label; ties resolve to the earliest variant
    pub fn dominant(&self) -> Option<Emotion> {
        let counts = self.distribution();
        let max = counts.values().copied().max()?;
        counts
            .into_iter()
            .find(|&(_, c)| c == max)
            .map(|(e, _)| e)
    }

    pub fn variability(&self) -> f64 {
        normalized_entropy(&self.distribution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_label_has_zero_entropy() {
        let mut counts = BTreeMap::new();
        counts.insert(Emotion::Neutral, 40);
        assert_eq!(normalized_entropy(&counts), 0.0);
        assert_eq!(normalized_entropy(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_uniform_labels_have_full_entropy() {
        let mut counts = BTreeMap::new();
        counts.insert(Emotion::Happy, 10);
        counts.insert(Emotion::Sad, 10);
        counts.insert(Emotion::Neutral, 10);
        assert!((normalized_entropy(&counts) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_skewed_labels() {
        let mut counts = BTreeMap::new();
        counts.insert(Emotion::Neutral, 30);
        counts.insert(Emotion::Happy, 10);
        let value = normalized_entropy(&counts);
        // H(0.75, 0.25) = 0.811 bits over log2(2) = 1
        assert!((value - 0.8113).abs() < 0.001);
    }

    #[test]
    fn test_change_rate() {
        let history = [Emotion::Happy, Emotion::Happy, Emotion::Sad, Emotion::Happy];
        assert!((change_rate(&history) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(change_rate(&[Emotion::Happy]), 0.0);
    }

    #[test]
    fn test_warmup_and_stride() {
        let mut tracker = ExpressionTracker::default();
        let picks: Vec<bool> = [0.0, 1.0, 2.0, 2.5, 3.0, 3.5, 4.0]
            .iter()
            .map(|&t| tracker.should_sample(t, 0.0, 2.0, 2))
            .collect();
        assert_eq!(picks, vec![false, false, true, false, true, false, true]);
    }

    #[test]
    fn test_dominant_label() {
        let mut tracker = ExpressionTracker::default();
        for e in [Emotion::Sad, Emotion::Neutral, Emotion::Neutral] {
            tracker.record(e);
        }
        assert_eq!(tracker.dominant(), Some(Emotion::Neutral));
        assert_eq!(tracker.samples(), 3);
    }
}
