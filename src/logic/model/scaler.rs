//! Channel Normalizer
//!
//! Zero-mean unit-variance scaling per channel, fit on the training
//! window and refit whenever the model retrains. Scores computed on
//! unscaled data would let high-magnitude channels (pressure, power)
//! drown out the low-magnitude ones (vibration, efficiency deltas).

use serde::{Deserialize, Serialize};

use crate::logic::channels::{ChannelVector, CHANNEL_COUNT};

/// Guard against zero-variance channels.
const MIN_STD: f64 = 1e-8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelScaler {
    mean: ChannelVector,
    std: ChannelVector,
}

impl ChannelScaler {
    /// Fit mean/std per channel over the given samples.
    pub fn fit(samples: &[ChannelVector]) -> Self {
        let n = samples.len().max(1) as f64;

        let mut mean = [0.0; CHANNEL_COUNT];
        for sample in samples {
            for (m, v) in mean.iter_mut().zip(sample.iter()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut std = [0.0; CHANNEL_COUNT];
        for sample in samples {
            for i in 0..CHANNEL_COUNT {
                let d = sample[i] - mean[i];
                std[i] += d * d;
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n).sqrt().max(MIN_STD);
        }

        Self { mean, std }
    }

    /// Scale one sample into z-space.
    pub fn transform(&self, sample: &ChannelVector) -> ChannelVector {
        let mut scaled = [0.0; CHANNEL_COUNT];
        for i in 0..CHANNEL_COUNT {
            scaled[i] = (sample[i] - self.mean[i]) / self.std[i];
        }
        scaled
    }

    /// Scale a batch.
    pub fn transform_all(&self, samples: &[ChannelVector]) -> Vec<ChannelVector> {
        samples.iter().map(|s| self.transform(s)).collect()
    }

    pub fn mean(&self) -> &ChannelVector {
        &self.mean
    }

    pub fn std(&self) -> &ChannelVector {
        &self.std
    }
}

// ============================================================================
// TESTS
// ============================================================================
