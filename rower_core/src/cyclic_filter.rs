//! Per-magnet cyclic error correction.
//!
//! Physical magnet spacing is never perfect, so even a clean impulse
//! stream carries a periodic timing error at the magnet-count frequency.
//! The filter learns one multiplicative correction per slot (position mod
//! magnet count) from the gap between observed delta times and the delta
//! times a linear model of the flywheel predicts, and normalizes the
//! corrections so a full revolution's total time is unchanged.

use crate::ewa::ExponentialWeightedAverage;
use crate::ols::OLSLinearSeries;
use crate::series::Series;
use crate::types::Precision;

const MAX_ALLOCATION_CAPACITY: usize = 1_000;

/// Per-update clamp on how far a single sample may move a slot correction.
const ABSOLUTE_MAX_DEVIATION: Precision = 0.02;

/// Misalignment decay mapping: clean-fit degradation beyond the
/// volatility margin decays slot averages by a factor in [0.1, 0.5].
const VOLATILITY_MARGIN: Precision = 0.8;
const MAX_DECAY: Precision = 0.5;
const MIN_DECAY: Precision = 0.1;

/// Ring of recent signed deviations for one slot; drives the convergence
/// boost when a slot's error is persistent and one-signed.
#[derive(Debug, Clone)]
struct SlotErrorTracker {
    buffer: [Precision; Self::BUFFER_SIZE],
    count: usize,
    head: usize,
    sign_sum: i32,
}

impl SlotErrorTracker {
    const BUFFER_SIZE: usize = 5;

    const MEDIAN_SATURATION: Precision = 0.004;
    const MAX_BOOST: Precision = 5.0;
    const MEDIAN_THRESHOLD: Precision = 0.001;
    const SIGN_THRESHOLD: Precision = 1.0;

    fn new() -> Self {
        Self {
            buffer: [0.0; Self::BUFFER_SIZE],
            count: 0,
            head: 0,
            sign_sum: 0,
        }
    }

    fn push(&mut self, deviation: Precision) {
        let old_value = self.buffer[self.head];
        if self.count == Self::BUFFER_SIZE {
            self.sign_sum -= sign_of(old_value);
        }
        self.sign_sum += sign_of(deviation);
        self.buffer[self.head] = deviation;
        self.head = (self.head + 1) % Self::BUFFER_SIZE;
        if self.count < Self::BUFFER_SIZE {
            self.count += 1;
        }
    }

    fn median(&self) -> Precision {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted = self.buffer;
        sorted[..self.count].sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = self.count / 2;
        if self.count % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        }
    }

    fn mean_sign(&self) -> Precision {
        if self.count == 0 {
            return 0.0;
        }
        self.sign_sum as Precision / self.count as Precision
    }

    fn calculate_boost(&self) -> Precision {
        if self.count < Self::BUFFER_SIZE
            || self.median().abs() < Self::MEDIAN_THRESHOLD
            || self.mean_sign().abs() < Self::SIGN_THRESHOLD
        {
            return 1.0;
        }
        let median_norm = (self.median().abs() / Self::MEDIAN_SATURATION).min(1.0);
        let confidence = median_norm * self.mean_sign().abs();
        1.0 + confidence * (Self::MAX_BOOST - 1.0)
    }

    fn reset(&mut self) {
        self.count = 0;
        self.head = 0;
        self.sign_sum = 0;
    }
}

#[inline]
fn sign_of(value: Precision) -> i32 {
    i32::from(value > 0.0) - i32::from(value < 0.0)
}

/// Learns and applies per-slot multiplicative delta-time corrections.
#[derive(Debug, Clone)]
pub struct CyclicErrorFilter {
    recording_buffer_capacity: usize,
    number_of_slots: usize,
    aggressiveness: Precision,

    regression_slope: Precision,
    regression_intercept: Precision,
    goodness_of_fit: Precision,

    filter_array: Vec<ExponentialWeightedAverage>,
    filter_config: Vec<Precision>,
    slot_error_trackers: Vec<SlotErrorTracker>,

    recorded_relative_position: Vec<u64>,
    recorded_absolute_position: Vec<Precision>,
    recorded_raw_value: Vec<Precision>,

    raw: Series,
    clean: Series,
    raw_ols_series: OLSLinearSeries,
    clean_ols_series: OLSLinearSeries,

    cursor: usize,
    filter_sum: Precision,
    weight_correction: Precision,
    data_point_count: usize,
}

impl CyclicErrorFilter {
    pub fn new(
        number_of_slots: u8,
        impulse_data_array_length: u8,
        aggressiveness: Precision,
        recording_buffer_capacity: u16,
    ) -> Self {
        let slots = usize::from(number_of_slots.max(1));
        let recording_capacity = usize::from(recording_buffer_capacity);
        // Slot averages window ~the recording buffer, bounded to keep the
        // prior meaningful on both tiny and huge capacities.
        let slot_window = recording_capacity.clamp(15, 50);

        let mut filter_array = Vec::with_capacity(slots);
        let mut filter_config = Vec::with_capacity(slots);
        let mut slot_error_trackers = Vec::with_capacity(slots);
        for _ in 0..slots {
            filter_array.push(ExponentialWeightedAverage::new(
                slot_window as u16,
                slot_window as Precision,
            ));
            filter_config.push(1.0);
            slot_error_trackers.push(SlotErrorTracker::new());
        }

        Self {
            recording_buffer_capacity: recording_capacity,
            number_of_slots: slots,
            aggressiveness,
            regression_slope: 0.0,
            regression_intercept: 0.0,
            goodness_of_fit: 0.0,
            filter_array,
            filter_config,
            slot_error_trackers,
            recorded_relative_position: Vec::with_capacity(recording_capacity),
            recorded_absolute_position: Vec::with_capacity(recording_capacity),
            recorded_raw_value: Vec::with_capacity(recording_capacity),
            raw: Series::new(usize::from(impulse_data_array_length)),
            clean: Series::new(usize::from(impulse_data_array_length)),
            raw_ols_series: OLSLinearSeries::with_capacity(
                0,
                recording_capacity.max(1),
                MAX_ALLOCATION_CAPACITY,
            ),
            clean_ols_series: OLSLinearSeries::with_capacity(
                0,
                recording_capacity.max(1),
                MAX_ALLOCATION_CAPACITY,
            ),
            cursor: 0,
            filter_sum: slots as Precision,
            weight_correction: 1.0,
            data_point_count: 0,
        }
    }

    pub fn raw_series(&self) -> &Series {
        &self.raw
    }

    pub fn clean_series(&self) -> &Series {
        &self.clean
    }

    /// Apply the learned correction for `position mod slots` to one raw
    /// delta time, recording both raw and corrected values.
    pub fn apply_filter(&mut self, position: u64, raw_value: Precision) {
        self.raw.push(raw_value);
        self.clean.push(
            raw_value * self.filter_config[self.slot_of(position)] * self.weight_correction,
        );
    }

    #[inline]
    fn slot_of(&self, position: u64) -> usize {
        (position % self.number_of_slots as u64) as usize
    }

    /// Record one learning sample. Once stabilized, also extend the
    /// raw/clean fit-quality regressions used for misalignment detection.
    pub fn record_raw_datapoint(
        &mut self,
        relative_position: u64,
        absolute_position: Precision,
        raw_value: Precision,
    ) {
        if self.aggressiveness == 0.0 {
            return;
        }
        if self.recorded_raw_value.len() >= MAX_ALLOCATION_CAPACITY {
            // Recording has outrun processing; the cursor will catch up
            // and restart the cycle.
            return;
        }

        self.recorded_relative_position.push(relative_position);
        self.recorded_absolute_position.push(absolute_position);
        self.recorded_raw_value.push(raw_value);

        if !self.is_stabilized() {
            return;
        }

        let clean_value =
            raw_value * self.filter_config[self.slot_of(relative_position)] * self.weight_correction;

        let raw_x = if self.raw_ols_series.len() > 0 {
            self.raw_ols_series.x_at_series_end()
        } else {
            0.0
        };
        self.raw_ols_series.push(raw_x + raw_value, raw_value);
        let clean_x = if self.clean_ols_series.len() > 0 {
            self.clean_ols_series.x_at_series_end()
        } else {
            0.0
        };
        self.clean_ols_series.push(clean_x + clean_value, clean_value);
    }

    /// Process one recorded sample against the current linear model.
    /// Overrunning the recorded buffer restarts the recording cycle
    /// rather than looping, so no sample is learned twice.
    pub fn process_next_raw_datapoint(&mut self) {
        if self.recorded_raw_value.is_empty() {
            return;
        }
        if self.cursor >= self.recorded_raw_value.len() {
            self.restart();
            return;
        }
        let perfect_current_dt = self.regression_slope
            * self.recorded_absolute_position[self.cursor]
            + self.regression_intercept;
        self.update_filter(
            self.recorded_relative_position[self.cursor],
            self.recorded_raw_value[self.cursor],
            perfect_current_dt,
        );
        self.cursor += 1;
    }

    pub fn update_regression_coefficients(
        &mut self,
        slope: Precision,
        intercept: Precision,
        goodness_of_fit: Precision,
    ) {
        self.regression_slope = slope;
        self.regression_intercept = intercept;
        self.goodness_of_fit = goodness_of_fit;
    }

    pub fn is_stabilized(&self) -> bool {
        self.data_point_count >= self.recording_buffer_capacity
    }

    /// Clear the learning buffers and fit-quality regressions while
    /// preserving the learned slot corrections.
    pub fn restart(&mut self) {
        if self.recorded_raw_value.is_empty() && self.raw_ols_series.len() == 0 {
            return;
        }
        let optimal_capacity = self
            .recorded_relative_position
            .len()
            .min(MAX_ALLOCATION_CAPACITY);
        self.recorded_relative_position = Vec::with_capacity(optimal_capacity);
        self.recorded_absolute_position = Vec::with_capacity(optimal_capacity);
        self.recorded_raw_value = Vec::with_capacity(optimal_capacity);
        self.raw_ols_series.reset();
        self.clean_ols_series.reset();
        self.cursor = 0;
    }

    /// Full reset: restart plus identity corrections everywhere.
    pub fn reset(&mut self) {
        self.restart();
        self.filter_sum = self.number_of_slots as Precision;
        self.weight_correction = 1.0;
        self.data_point_count = 0;
        self.regression_slope = 0.0;
        self.regression_intercept = 0.0;
        self.goodness_of_fit = 0.0;
        for slot in 0..self.number_of_slots {
            self.filter_array[slot].reset();
            self.filter_config[slot] = 1.0;
            self.slot_error_trackers[slot].reset();
        }
    }

    fn update_filter(&mut self, position: u64, raw_value: Precision, clean_value: Precision) {
        let slot = self.slot_of(position);
        let correction_factor = clean_value / raw_value;

        let min_correction_factor = self.filter_config[slot] * (1.0 - ABSOLUTE_MAX_DEVIATION);
        let max_correction_factor = self.filter_config[slot] * (1.0 + ABSOLUTE_MAX_DEVIATION);
        let clamped_correction_factor =
            correction_factor.clamp(min_correction_factor, max_correction_factor);

        let weight_corrected_correction_factor =
            (clamped_correction_factor - 1.0) * self.aggressiveness + 1.0;

        let signed_deviation =
            (clamped_correction_factor - self.filter_config[slot]) / self.filter_config[slot];
        self.slot_error_trackers[slot].push(signed_deviation);

        let boost = self.slot_error_trackers[slot].calculate_boost();
        let weight = self.goodness_of_fit * boost;

        self.filter_array[slot].push(weight_corrected_correction_factor, weight);

        // The running sum must drop the old value before the slot is
        // replaced; reordering this shifts the weight correction by sub-ulp
        // amounts that accumulate over a session.
        self.filter_sum -= self.filter_config[slot];
        self.filter_config[slot] = self.filter_array[slot].average();
        self.filter_sum += self.filter_config[slot];

        if !self.is_stabilized() {
            self.data_point_count += 1;
        }

        if self.filter_sum != 0.0 {
            self.weight_correction = self.number_of_slots as Precision / self.filter_sum;
        }
    }

    /// Detect a shifted magnet pattern: once the corrected stream fits a
    /// line markedly worse than the raw stream, the filter is adding noise
    /// and every slot's average is decayed in proportion.
    pub fn is_potentially_misaligned(&mut self) -> bool {
        if !self.is_stabilized() {
            return false;
        }

        let raw_r2 = self.raw_ols_series.goodness_of_fit();
        let clean_r2 = self.clean_ols_series.goodness_of_fit();

        if clean_r2 >= raw_r2 * VOLATILITY_MARGIN {
            return false;
        }

        let threshold = raw_r2 * VOLATILITY_MARGIN;
        let misalignment_ratio = (threshold - clean_r2) / threshold;
        let decay_factor = MAX_DECAY - misalignment_ratio * (MAX_DECAY - MIN_DECAY);

        tracing::debug!(
            raw_r2,
            clean_r2,
            decay_factor,
            "magnet pattern shift suspected; decaying slot corrections"
        );
        for array in &mut self.filter_array {
            array.decay(decay_factor);
        }

        true
    }
}
