//! Rolling rower metrics and per-stroke events.

use serde::Serialize;

use crate::types::{Impulse, Precision};

/// One completed stroke, emitted on the Drive→Recovery transition.
#[derive(Debug, Clone, Serialize)]
pub struct StrokeEvent {
    pub stroke_count: u16,
    /// Timestamp of the transition that closed the drive, µs.
    pub stroke_time_us: u64,
    pub drive_duration_s: Precision,
    /// Duration of the recovery preceding this drive; 0 for the first
    /// stroke of a session.
    pub recovery_duration_s: Precision,
    pub avg_stroke_power_w: Precision,
    pub drag_coefficient: Precision,
    /// Handle-force curve over the drive, in order.
    pub handle_forces: Vec<Precision>,
    /// True when the drive was closed by the handle-force capacity
    /// failsafe rather than phase detection.
    pub forced: bool,
}

/// Aggregated view exposed to external collaborators.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RowerMetrics {
    pub distance_m: Precision,
    pub last_rev_time_us: u64,
    pub rev_count: u32,
    pub last_stroke_time_us: u64,
    pub stroke_count: u16,
    pub drive_duration_s: Precision,
    pub recovery_duration_s: Precision,
    pub avg_stroke_power_w: Precision,
    pub drag_coefficient: Precision,
    /// Owned copy of the in-progress drive's handle-force curve.
    pub handle_forces: Vec<Precision>,
}

/// Exclusive owner of the rolling metrics record.
///
/// Updated per impulse (revolutions, distance) and per stroke event
/// (everything else); read through value-copy snapshots so external
/// consumers never coordinate with the producer.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    metrics: RowerMetrics,
    last_event: Option<StrokeEvent>,
    pending_events: Vec<StrokeEvent>,
    previous_rev_count: u32,
    previous_stroke_count: u16,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a completed flywheel revolution.
    pub fn on_revolution(&mut self, impulse: &Impulse, distance_increment_m: Precision) {
        self.metrics.rev_count += 1;
        self.metrics.last_rev_time_us = impulse.total_time_us;
        self.metrics.distance_m += distance_increment_m;
    }

    /// Fold a completed stroke into the rolling record.
    pub fn on_stroke(&mut self, event: StrokeEvent) {
        self.metrics.stroke_count = event.stroke_count;
        self.metrics.last_stroke_time_us = event.stroke_time_us;
        self.metrics.drive_duration_s = event.drive_duration_s;
        self.metrics.recovery_duration_s = event.recovery_duration_s;
        self.metrics.avg_stroke_power_w = event.avg_stroke_power_w;
        self.metrics.drag_coefficient = event.drag_coefficient;
        self.last_event = Some(event.clone());
        self.pending_events.push(event);
    }

    /// Keep the published drag current between strokes.
    pub fn set_drag_coefficient(&mut self, drag: Precision) {
        self.metrics.drag_coefficient = drag;
    }

    /// Value snapshot with the given live handle-force curve attached.
    pub fn snapshot(&self, handle_forces: &[Precision]) -> RowerMetrics {
        let mut snapshot = self.metrics.clone();
        snapshot.handle_forces = handle_forces.to_vec();
        snapshot
    }

    pub fn metrics(&self) -> &RowerMetrics {
        &self.metrics
    }

    pub fn last_event(&self) -> Option<&StrokeEvent> {
        self.last_event.as_ref()
    }

    /// Drain stroke events accumulated since the last call, in order.
    pub fn take_events(&mut self) -> Vec<StrokeEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Change-detection helpers so pollers can spot new revolutions and
    /// strokes without diffing snapshots.
    pub fn previous_rev_count(&self) -> u32 {
        self.previous_rev_count
    }

    pub fn mark_rev_count(&mut self) {
        self.previous_rev_count = self.metrics.rev_count;
    }

    pub fn previous_stroke_count(&self) -> u16 {
        self.previous_stroke_count
    }

    pub fn mark_stroke_count(&mut self) {
        self.previous_stroke_count = self.metrics.stroke_count;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
