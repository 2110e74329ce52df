//! Main-task pipeline orchestration.
//!
//! Drains the impulse queue and runs cyclic-error correction, kinematics
//! estimation, stroke classification and metrics aggregation sequentially
//! per impulse. Owns all downstream state; the only data shared with
//! interrupt context is the queue and the published atomic counters.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::builder::validate_settings;
use crate::conditioner::SharedCounters;
use crate::config::Settings;
use crate::cyclic_filter::CyclicErrorFilter;
use crate::error::Result;
use crate::flywheel::FlywheelEstimator;
use crate::metrics::{MetricsAggregator, RowerMetrics, StrokeEvent};
use crate::stroke::StrokeEngine;
use crate::types::{Impulse, Precision, StrokePhase, TWO_PI};
use crate::util::{cm_to_m, ms_to_us};

pub struct RowingMonitor {
    rx: Receiver<Impulse>,
    shared: Arc<SharedCounters>,
    settings: Settings,
    pending_settings: Option<Settings>,

    filter: CyclicErrorFilter,
    estimator: FlywheelEstimator,
    strokes: StrokeEngine,
    aggregator: MetricsAggregator,

    stopped_threshold_us: u64,
    distance_per_rev_base_m: Precision,
    last_impulse_time_us: u64,
    last_delta_time_us: u32,
}

impl RowingMonitor {
    pub(crate) fn new(rx: Receiver<Impulse>, shared: Arc<SharedCounters>, settings: Settings) -> Self {
        let filter = CyclicErrorFilter::new(
            settings.machine.impulses_per_revolution,
            settings.stroke.impulse_data_array_length,
            settings.signal.cyclic_error_aggressiveness,
            settings.signal.cyclic_error_recording_capacity,
        );
        let estimator =
            FlywheelEstimator::new(&settings.machine, settings.stroke.impulse_data_array_length);
        let strokes = StrokeEngine::new(&settings.machine, &settings.stroke, &settings.drag);
        let stopped_threshold_us = ms_to_us(settings.signal.rowing_stopped_threshold_ms);
        let distance_per_rev_base_m = TWO_PI * cm_to_m(settings.machine.sprocket_radius_cm);
        Self {
            rx,
            shared,
            settings,
            pending_settings: None,
            filter,
            estimator,
            strokes,
            aggregator: MetricsAggregator::new(),
            stopped_threshold_us,
            distance_per_rev_base_m,
            last_impulse_time_us: 0,
            last_delta_time_us: 0,
        }
    }

    /// Drain all queued impulses, then run the stopped-state watchdog
    /// against `now_us`. Called from the host's cooperative loop.
    pub fn update(&mut self, now_us: u64) {
        while let Ok(impulse) = self.rx.try_recv() {
            self.process_impulse(&impulse);
        }
        if self.last_impulse_time_us > 0
            && now_us.saturating_sub(self.last_impulse_time_us) > self.stopped_threshold_us
        {
            self.strokes.on_stopped(now_us);
        }
    }

    fn process_impulse(&mut self, impulse: &Impulse) {
        let position = impulse.raw_impulse_count;
        let raw_delta_us = impulse.delta_time_us as Precision;

        // Keep the filter's expected-delta model current, then correct.
        let (slope, intercept, fit) = self.estimator.observe_raw_delta(position, raw_delta_us);
        self.filter.update_regression_coefficients(slope, intercept, fit);
        self.filter.apply_filter(position, raw_delta_us);
        self.filter
            .record_raw_datapoint(position, position as Precision, raw_delta_us);
        self.filter.process_next_raw_datapoint();

        let clean_delta_us = self.filter.clean_series().back();

        let frame = self.estimator.advance(
            clean_delta_us,
            impulse.total_time_us,
            self.strokes.drag_coefficient(),
        );

        if let Some(event) = self.strokes.process(&frame) {
            self.publish_stroke(event);
        }
        self.aggregator.set_drag_coefficient(self.strokes.drag_coefficient());

        let slots = u64::from(self.settings.machine.impulses_per_revolution);
        if position % slots == 0 {
            let increment = self.distance_per_revolution();
            self.aggregator.on_revolution(impulse, increment);
            // Checking misalignment once per revolution bounds how often a
            // genuine shift can decay the learned corrections.
            if self.filter.is_potentially_misaligned() {
                tracing::debug!("cyclic error corrections decayed toward identity");
            }
        }

        self.last_impulse_time_us = impulse.total_time_us;
        self.last_delta_time_us = impulse.delta_time_us;
    }

    fn publish_stroke(&mut self, event: StrokeEvent) {
        tracing::info!(
            stroke = event.stroke_count,
            drive_duration_s = event.drive_duration_s,
            avg_stroke_power_w = event.avg_stroke_power_w,
            forced = event.forced,
            "stroke completed"
        );
        self.aggregator.on_stroke(event);
    }

    /// Per-revolution distance from the Concept2 pace convention.
    fn distance_per_revolution(&self) -> Precision {
        let drag = self.strokes.drag_coefficient();
        if drag <= 0.0 {
            return 0.0;
        }
        (drag / self.settings.machine.concept2_magic_number).cbrt() * self.distance_per_rev_base_m
    }

    // ── Outputs polled by collaborators ──────────────────────────────────

    pub fn snapshot(&self) -> RowerMetrics {
        self.aggregator.snapshot(self.strokes.handle_forces())
    }

    pub fn last_event(&self) -> Option<&StrokeEvent> {
        self.aggregator.last_event()
    }

    /// Drain stroke events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<StrokeEvent> {
        self.aggregator.take_events()
    }

    pub fn phase(&self) -> StrokePhase {
        self.strokes.phase()
    }

    pub fn rev_count(&self) -> u32 {
        self.aggregator.metrics().rev_count
    }

    pub fn stroke_count(&self) -> u16 {
        self.aggregator.metrics().stroke_count
    }

    pub fn distance_m(&self) -> Precision {
        self.aggregator.metrics().distance_m
    }

    pub fn drive_duration_s(&self) -> Precision {
        self.aggregator.metrics().drive_duration_s
    }

    pub fn recovery_duration_s(&self) -> Precision {
        self.aggregator.metrics().recovery_duration_s
    }

    pub fn avg_stroke_power_w(&self) -> i16 {
        let power = self.aggregator.metrics().avg_stroke_power_w;
        if !power.is_finite() {
            return 0;
        }
        power
            .round()
            .clamp(Precision::from(i16::MIN), Precision::from(i16::MAX)) as i16
    }

    /// Concept2-style integer drag factor (k × 1e6), saturating.
    pub fn drag_factor(&self) -> u8 {
        let factor = self.strokes.drag_coefficient() * 1e6;
        if !factor.is_finite() || factor <= 0.0 {
            return 0;
        }
        factor.round().min(Precision::from(u8::MAX)) as u8
    }

    pub fn drag_coefficient(&self) -> Precision {
        self.strokes.drag_coefficient()
    }

    pub fn last_impulse_time_us(&self) -> u64 {
        self.last_impulse_time_us
    }

    pub fn delta_time_us(&self) -> u32 {
        self.last_delta_time_us
    }

    /// Raw accepted-edge count as published from interrupt context.
    pub fn raw_impulse_count(&self) -> u64 {
        self.shared.raw_impulse_count()
    }

    pub fn stopped_threshold_us(&self) -> u64 {
        self.stopped_threshold_us
    }

    /// Change-detection helpers for pollers.
    pub fn previous_rev_count(&self) -> u32 {
        self.aggregator.previous_rev_count()
    }

    pub fn mark_rev_count(&mut self) {
        self.aggregator.mark_rev_count();
    }

    pub fn previous_stroke_count(&self) -> u16 {
        self.aggregator.previous_stroke_count()
    }

    pub fn mark_stroke_count(&mut self) {
        self.aggregator.mark_stroke_count();
    }

    // ── Control surface ──────────────────────────────────────────────────

    /// Validate and stage a new configuration; it takes effect on the
    /// next `reset()` boundary.
    pub fn configure(&mut self, settings: Settings) -> Result<()> {
        validate_settings(&settings)?;
        self.pending_settings = Some(settings);
        Ok(())
    }

    /// Clear all pipeline state, applying any staged configuration.
    pub fn reset(&mut self) {
        if let Some(settings) = self.pending_settings.take() {
            self.settings = settings;
            self.filter = CyclicErrorFilter::new(
                self.settings.machine.impulses_per_revolution,
                self.settings.stroke.impulse_data_array_length,
                self.settings.signal.cyclic_error_aggressiveness,
                self.settings.signal.cyclic_error_recording_capacity,
            );
            self.estimator = FlywheelEstimator::new(
                &self.settings.machine,
                self.settings.stroke.impulse_data_array_length,
            );
            self.strokes = StrokeEngine::new(
                &self.settings.machine,
                &self.settings.stroke,
                &self.settings.drag,
            );
            self.stopped_threshold_us = ms_to_us(self.settings.signal.rowing_stopped_threshold_ms);
            self.distance_per_rev_base_m =
                TWO_PI * cm_to_m(self.settings.machine.sprocket_radius_cm);
        } else {
            self.filter.reset();
            self.estimator.reset();
            self.strokes.reset();
        }
        self.aggregator.reset();
        self.last_impulse_time_us = 0;
        self.last_delta_time_us = 0;
        // Drop anything still queued from before the reset.
        while self.rx.try_recv().is_ok() {}
    }
}
