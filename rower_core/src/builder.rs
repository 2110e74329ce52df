//! Pipeline assembly with boundary validation.

use std::sync::Arc;

use crate::conditioner::{ImpulseConditioner, SharedCounters};
use crate::config::Settings;
use crate::error::{BuildError, Result};
use crate::monitor::RowingMonitor;

/// Default depth of the ISR → main-task impulse queue. At 10 ms per
/// impulse this buys more than half a second of main-task stall.
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Builder for the two halves of the pipeline. All settings are validated
/// on `build()`; the core never sees an invalid configuration.
#[derive(Default)]
pub struct MonitorBuilder {
    settings: Settings,
    queue_capacity: Option<usize>,
}

impl MonitorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_machine(mut self, machine: crate::config::MachineSettings) -> Self {
        self.settings.machine = machine;
        self
    }

    pub fn with_signal(mut self, signal: crate::config::SensorSignalSettings) -> Self {
        self.settings.signal = signal;
        self
    }

    pub fn with_drag(mut self, drag: crate::config::DragFactorSettings) -> Self {
        self.settings.drag = drag;
        self
    }

    pub fn with_stroke(mut self, stroke: crate::config::StrokePhaseSettings) -> Self {
        self.settings.stroke = stroke;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Validate and assemble the interrupt-side conditioner and the
    /// main-task monitor, joined by a bounded SPSC queue.
    pub fn build(self) -> Result<(ImpulseConditioner, RowingMonitor)> {
        validate_settings(&self.settings)?;
        let capacity = self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        if capacity == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "queue capacity must be > 0",
            )));
        }

        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let shared = Arc::new(SharedCounters::default());
        let conditioner = ImpulseConditioner::new(tx, Arc::clone(&shared), &self.settings.signal);
        let monitor = RowingMonitor::new(rx, shared, self.settings);
        Ok((conditioner, monitor))
    }
}

/// Validate a full settings record; shared by `build()` and
/// `RowingMonitor::configure`.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    let invalid = |msg: &'static str| Err(eyre::Report::new(BuildError::InvalidConfig(msg)));

    let machine = &settings.machine;
    if machine.impulses_per_revolution == 0 {
        return invalid("impulses_per_revolution must be > 0");
    }
    if !(machine.flywheel_inertia.is_finite() && machine.flywheel_inertia > 0.0) {
        return invalid("flywheel_inertia must be > 0");
    }
    if !(machine.sprocket_radius_cm.is_finite() && machine.sprocket_radius_cm > 0.0) {
        return invalid("sprocket_radius_cm must be > 0");
    }
    if !(machine.concept2_magic_number.is_finite() && machine.concept2_magic_number > 0.0) {
        return invalid("concept2_magic_number must be > 0");
    }

    let signal = &settings.signal;
    if signal.rotation_debounce_time_min_ms == 0 {
        return invalid("rotation_debounce_time_min_ms must be >= 1");
    }
    if signal.rowing_stopped_threshold_ms == 0 {
        return invalid("rowing_stopped_threshold_ms must be > 0");
    }
    if !(signal.cyclic_error_aggressiveness.is_finite()
        && (0.0..=1.0).contains(&signal.cyclic_error_aggressiveness))
    {
        return invalid("cyclic_error_aggressiveness must be within [0, 1]");
    }
    if signal.cyclic_error_recording_capacity == 0 {
        return invalid("cyclic_error_recording_capacity must be > 0");
    }

    let drag = &settings.drag;
    if !(drag.goodness_of_fit_threshold.is_finite()
        && (0.0..=1.0).contains(&drag.goodness_of_fit_threshold))
    {
        return invalid("goodness_of_fit_threshold must be within [0, 1]");
    }
    if drag.max_drag_factor_recovery_period_ms == 0 {
        return invalid("max_drag_factor_recovery_period_ms must be > 0");
    }
    if !(drag.lower_drag_factor_threshold.is_finite() && drag.lower_drag_factor_threshold > 0.0) {
        return invalid("lower_drag_factor_threshold must be > 0");
    }
    if !(drag.upper_drag_factor_threshold.is_finite()
        && drag.upper_drag_factor_threshold > drag.lower_drag_factor_threshold)
    {
        return invalid("upper_drag_factor_threshold must exceed the lower threshold");
    }
    if drag.drag_coefficients_array_length == 0 {
        return invalid("drag_coefficients_array_length must be > 0");
    }

    let stroke = &settings.stroke;
    if !stroke.minimum_powered_torque.is_finite() || stroke.minimum_powered_torque < 0.0 {
        return invalid("minimum_powered_torque must be >= 0");
    }
    if !stroke.minimum_drag_torque.is_finite() || stroke.minimum_drag_torque < 0.0 {
        return invalid("minimum_drag_torque must be >= 0");
    }
    if !stroke.minimum_recovery_slope.is_finite() {
        return invalid("minimum_recovery_slope must be finite");
    }
    if !stroke.minimum_recovery_slope_margin.is_finite()
        || stroke.minimum_recovery_slope_margin < 0.0
    {
        return invalid("minimum_recovery_slope_margin must be >= 0");
    }
    if stroke.impulse_data_array_length < 3 {
        return invalid("impulse_data_array_length must be >= 3");
    }
    if stroke.drive_handle_forces_max_capacity == 0 {
        return invalid("drive_handle_forces_max_capacity must be > 0");
    }

    Ok(())
}
