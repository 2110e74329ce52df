//! Exponentially weighted average with per-sample weights.

use crate::types::Precision;

/// Decaying weighted average over roughly `window_size` samples.
///
/// `initial_buffer` seeds both the weighted sum and the total weight,
/// acting as an inertia prior: until real weight accumulates, the average
/// reads 1.0-per-unit of the seed and moves slowly.
#[derive(Debug, Clone)]
pub struct ExponentialWeightedAverage {
    weighted_sum: Precision,
    total_weight: Precision,
    initial_buffer: Precision,
    decay_factor: Precision,
}

impl ExponentialWeightedAverage {
    pub fn new(window_size: u16, initial_buffer: Precision) -> Self {
        Self {
            weighted_sum: initial_buffer,
            total_weight: initial_buffer,
            initial_buffer,
            decay_factor: 1.0 - 1.0 / Precision::from(window_size.max(1)),
        }
    }

    pub fn push(&mut self, value: Precision, weight: Precision) {
        let weighted_value = value * weight;
        self.weighted_sum = self.weighted_sum * self.decay_factor + weighted_value;
        self.total_weight = self.total_weight * self.decay_factor + weight;
    }

    /// Shrink both accumulators, forcing re-learning without a full reset.
    pub fn decay(&mut self, decay_factor_override: Precision) {
        self.weighted_sum *= decay_factor_override;
        self.total_weight *= decay_factor_override;
    }

    pub fn average(&self) -> Precision {
        if self.total_weight > 0.0 {
            self.weighted_sum / self.total_weight
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.weighted_sum = self.initial_buffer;
        self.total_weight = self.initial_buffer;
    }
}
