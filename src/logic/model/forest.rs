//! Isolation Forest
//!
//! Tree-based outlier isolation over the normalized training window.
//! Anomalous points sit far from the bulk of the data, so random
//! axis-aligned splits isolate them in few cuts; the shorter the average
//! isolation path, the higher the anomaly score.
//!
//! Tree traversal alone saturates for points beyond the training
//! envelope: every cut is drawn inside the training range, so a reading
//! ten times past the maximum walks the same path as the maximum itself.
//! The forest therefore also keeps the per-channel envelope of its
//! training data and scores escapes directly: a point outside the
//! envelope is separable by a single cut on its most deviant channel,
//! and the expected number of cuts shrinks toward one as the overshoot
//! grows. The reported score is the larger of the two estimates.
//!
//! The RNG is seeded with a fixed value, so fitting the same window
//! always produces the same forest and identical readings always score
//! identically against the same model state.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::{CONTAMINATION, FOREST_MAX_SAMPLES, FOREST_SEED, FOREST_TREES};
use crate::logic::channels::{ChannelVector, CHANNEL_COUNT};
use crate::logic::error::TrainingError;

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Guard for channels with no spread in training.
const MIN_SPAN: f64 = 1e-9;

/// Average unsuccessful-search path length in a binary search tree of
/// n nodes. Normalizes isolation depths across subsample sizes.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug)]
enum Node {
    Split {
        channel: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn path_length(&self, sample: &ChannelVector, depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                channel,
                value,
                left,
                right,
            } => {
                if sample[*channel] < *value {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
    /// Per-channel [lo, hi] of the training data.
    envelope_lo: ChannelVector,
    envelope_hi: ChannelVector,
    score_threshold: f64,
}

impl IsolationForest {
    /// Fit a forest on the given (already normalized) samples.
    ///
    /// `deadline` bounds the whole pass; when exceeded between trees the
    /// fit aborts with `TrainingError::Timeout` and the caller keeps
    /// whatever model it had before.
    pub fn fit(
        samples: &[ChannelVector],
        deadline: Option<Instant>,
    ) -> Result<Self, TrainingError> {
        let started = Instant::now();

        if samples.len() < 2 {
            return Err(TrainingError::Degenerate(format!(
                "need at least 2 samples, got {}",
                samples.len()
            )));
        }
        if samples.iter().any(|s| s.iter().any(|v| !v.is_finite())) {
            return Err(TrainingError::Degenerate(
                "window contains non-finite values".to_string(),
            ));
        }

        let subsample = samples.len().min(FOREST_MAX_SAMPLES);
        let height_limit = ((subsample as f64).log2().ceil() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(FOREST_SEED);

        let mut envelope_lo = samples[0];
        let mut envelope_hi = samples[0];
        for sample in &samples[1..] {
            for i in 0..CHANNEL_COUNT {
                envelope_lo[i] = envelope_lo[i].min(sample[i]);
                envelope_hi[i] = envelope_hi[i].max(sample[i]);
            }
        }

        let mut trees = Vec::with_capacity(FOREST_TREES);
        for _ in 0..FOREST_TREES {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(TrainingError::Timeout {
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
            }

            let picked = rand::seq::index::sample(&mut rng, samples.len(), subsample);
            let rows: Vec<ChannelVector> = picked.iter().map(|i| samples[i]).collect();
            trees.push(build_tree(rows, 0, height_limit, &mut rng));
        }

        let mut forest = Self {
            trees,
            subsample,
            envelope_lo,
            envelope_hi,
            score_threshold: 0.0,
        };

        // Decision threshold: the (1 - contamination) quantile of the
        // training scores, so roughly the configured fraction of history
        // lands above it.
        let mut train_scores: Vec<f64> = samples.iter().map(|s| forest.score(s)).collect();
        train_scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = train_scores.len();
        let idx = (((1.0 - CONTAMINATION) * n as f64).ceil() as usize)
            .saturating_sub(1)
            .min(n - 1);
        forest.score_threshold = train_scores[idx];

        Ok(forest)
    }

    /// Raw anomaly score in (0, 1): ~0.5 for ordinary points, approaching
    /// 1 for points isolated in very few cuts.
    pub fn score(&self, sample: &ChannelVector) -> f64 {
        self.traversal_score(sample).max(self.escape_score(sample))
    }

    /// Normalized average isolation depth over all trees.
    fn traversal_score(&self, sample: &ChannelVector) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(sample, 0)).sum();
        let mean_path = total / self.trees.len() as f64;
        2f64.powf(-mean_path / self.normalizer())
    }

    /// Isolation estimate for points outside the training envelope.
    /// A cut drawn uniformly over the extended range of the most deviant
    /// channel separates the point with probability gap / (span + gap);
    /// its reciprocal is the expected number of cuts to isolation.
    fn escape_score(&self, sample: &ChannelVector) -> f64 {
        let mut best_p = 0.0f64;
        for i in 0..CHANNEL_COUNT {
            let span = (self.envelope_hi[i] - self.envelope_lo[i]).max(MIN_SPAN);
            let gap = if sample[i] > self.envelope_hi[i] {
                sample[i] - self.envelope_hi[i]
            } else if sample[i] < self.envelope_lo[i] {
                self.envelope_lo[i] - sample[i]
            } else {
                0.0
            };
            if gap > 0.0 {
                best_p = best_p.max(gap / (span + gap));
            }
        }

        if best_p <= 0.0 {
            return 0.0;
        }
        let expected_cuts = (1.0 / best_p).max(1.0);
        2f64.powf(-expected_cuts / self.normalizer())
    }

    fn normalizer(&self) -> f64 {
        average_path_length(self.subsample).max(1.0)
    }

    /// Binary inlier/outlier label for a raw score.
    pub fn is_anomalous(&self, score: f64) -> bool {
        score > self.score_threshold
    }

    pub fn score_threshold(&self) -> f64 {
        self.score_threshold
    }
}

fn build_tree(
    mut rows: Vec<ChannelVector>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // Only channels with spread can split the node.
    let mut lo = rows[0];
    let mut hi = rows[0];
    for row in &rows[1..] {
        for i in 0..row.len() {
            lo[i] = lo[i].min(row[i]);
            hi[i] = hi[i].max(row[i]);
        }
    }
    let eligible: Vec<usize> = (0..lo.len()).filter(|&i| hi[i] > lo[i]).collect();
    if eligible.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let channel = eligible[rng.gen_range(0..eligible.len())];
    let value = rng.gen_range(lo[channel]..hi[channel]);

    let mut left = Vec::new();
    let mut right = Vec::new();
    for row in rows.drain(..) {
        if row[channel] < value {
            left.push(row);
        } else {
            right.push(row);
        }
    }
    if left.is_empty() || right.is_empty() {
        let size = left.len() + right.len();
        return Node::Leaf { size };
    }

    Node::Split {
        channel,
        value,
        left: Box::new(build_tree(left, depth + 1, height_limit, rng)),
        right: Box::new(build_tree(right, depth + 1, height_limit, rng)),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn clustered_window(n: usize) -> Vec<ChannelVector> {
        (0..n)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.05;
                let wobble = (i % 3) as f64 * 0.04;
                [
                    jitter,
                    0.1 - jitter,
                    wobble,
                    -jitter + wobble,
                    0.05 + jitter,
                ]
            })
            .collect()
    }

    #[test]
    fn test_fit_is_deterministic() {
        let window = clustered_window(60);
        let a = IsolationForest::fit(&window, None).unwrap();
        let b = IsolationForest::fit(&window, None).unwrap();

        let probe = [3.0, -2.0, 1.0, 0.5, -1.0];
        assert_eq!(a.score(&probe), b.score(&probe));
        assert_eq!(a.score_threshold(), b.score_threshold());
    }

    #[test]
    fn test_far_outlier_scores_high_and_is_flagged() {
        let window = clustered_window(100);
        let forest = IsolationForest::fit(&window, None).unwrap();

        let inlier_score = forest.score(&window[3]);
        let outlier_score = forest.score(&[25.0, 18.0, -20.0, 30.0, -15.0]);

        assert!(outlier_score > inlier_score);
        assert!(outlier_score > 0.8, "outlier scored {outlier_score}");
        assert!(forest.is_anomalous(outlier_score));
    }

    #[test]
    fn test_single_channel_escape_is_flagged() {
        let window = clustered_window(40);
        let forest = IsolationForest::fit(&window, None).unwrap();

        // Far past the envelope on one channel only.
        let mut probe = window[5];
        probe[0] = 50.0;
        let score = forest.score(&probe);
        assert!(forest.is_anomalous(score), "escape scored {score}");
    }

    #[test]
    fn test_escape_score_monotone_in_overshoot() {
        let window = clustered_window(50);
        let forest = IsolationForest::fit(&window, None).unwrap();

        let mut near = window[0];
        near[0] = 2.0;
        let mut far = window[0];
        far[0] = 20.0;
        assert!(forest.score(&far) > forest.score(&near));
    }

    #[test]
    fn test_inlier_not_flagged() {
        let window = clustered_window(100);
        let forest = IsolationForest::fit(&window, None).unwrap();
        // A point at the center of the cluster scores near 0.5.
        let s = forest.score(&[0.1, 0.0, 0.04, 0.0, 0.1]);
        assert!(s < 0.7, "central point scored {s}");
    }

    #[test]
    fn test_too_few_samples_is_degenerate() {
        let err = IsolationForest::fit(&[[0.0; 5]], None).unwrap_err();
        assert!(matches!(err, TrainingError::Degenerate(_)));
    }

    #[test]
    fn test_non_finite_window_is_degenerate() {
        let mut window = clustered_window(30);
        window[4][2] = f64::NAN;
        let err = IsolationForest::fit(&window, None).unwrap_err();
        assert!(matches!(err, TrainingError::Degenerate(_)));
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let window = clustered_window(100);
        let deadline = Instant::now() - Duration::from_millis(1);
        let err = IsolationForest::fit(&window, Some(deadline)).unwrap_err();
        assert!(matches!(err, TrainingError::Timeout { .. }));
    }

    #[test]
    fn test_average_path_length_monotone() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(64) < average_path_length(256));
    }
}
