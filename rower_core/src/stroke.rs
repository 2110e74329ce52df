//! Stroke phase state machine.
//!
//! Classifies each impulse as Drive or Recovery from torque and/or
//! angular-velocity slope, enforces minimum phase times, and reduces each
//! completed drive into a stroke event. Also owns the drag regression,
//! since drag is defined over exactly one recovery window.

use crate::config::{DragFactorSettings, MachineSettings, StrokeDetectionType, StrokePhaseSettings};
use crate::metrics::StrokeEvent;
use crate::ols::OLSLinearSeries;
use crate::series::Series;
use crate::types::{KinematicsFrame, Precision, StrokePhase};
use crate::util::{cm_to_m, ms_to_us, us_to_s};

pub struct StrokeEngine {
    detection: StrokeDetectionType,
    minimum_powered_torque: Precision,
    minimum_drag_torque: Precision,
    minimum_recovery_slope: Precision,
    minimum_recovery_slope_margin: Precision,
    minimum_drive_time_us: u64,
    minimum_recovery_time_us: u64,
    handle_forces_capacity: usize,
    sprocket_radius_m: Precision,
    inertia: Precision,

    goodness_of_fit_threshold: Precision,
    max_drag_recovery_period_us: u64,
    lower_drag_coefficient: Precision,
    upper_drag_coefficient: Precision,

    phase: StrokePhase,
    phase_start_us: u64,
    stroke_count: u16,
    last_recovery_duration_s: Precision,

    handle_forces: Vec<Precision>,
    power_integral_j: Precision,
    previous_power_sample: Option<(u64, Precision)>,

    /// (t, 1/ω) over the current recovery; its slope × inertia is a drag
    /// coefficient candidate.
    drag_ols: OLSLinearSeries,
    drag_coefficients: Series,
    drag_coefficient: Precision,
}

impl StrokeEngine {
    pub fn new(
        machine: &MachineSettings,
        stroke: &StrokePhaseSettings,
        drag: &DragFactorSettings,
    ) -> Self {
        Self {
            detection: stroke.stroke_detection_type,
            minimum_powered_torque: stroke.minimum_powered_torque,
            minimum_drag_torque: stroke.minimum_drag_torque,
            minimum_recovery_slope: stroke.minimum_recovery_slope,
            minimum_recovery_slope_margin: stroke.minimum_recovery_slope_margin,
            minimum_drive_time_us: ms_to_us(stroke.minimum_drive_time_ms),
            minimum_recovery_time_us: ms_to_us(stroke.minimum_recovery_time_ms),
            handle_forces_capacity: usize::from(stroke.drive_handle_forces_max_capacity),
            sprocket_radius_m: cm_to_m(machine.sprocket_radius_cm),
            inertia: machine.flywheel_inertia,
            goodness_of_fit_threshold: drag.goodness_of_fit_threshold,
            max_drag_recovery_period_us: ms_to_us(drag.max_drag_factor_recovery_period_ms),
            lower_drag_coefficient: drag.lower_drag_factor_threshold * 1e-6,
            upper_drag_coefficient: drag.upper_drag_factor_threshold * 1e-6,
            phase: StrokePhase::Stopped,
            phase_start_us: 0,
            stroke_count: 0,
            last_recovery_duration_s: 0.0,
            handle_forces: Vec::with_capacity(usize::from(stroke.drive_handle_forces_max_capacity)),
            power_integral_j: 0.0,
            previous_power_sample: None,
            drag_ols: OLSLinearSeries::new(0),
            drag_coefficients: Series::new(usize::from(drag.drag_coefficients_array_length)),
            drag_coefficient: 0.0,
        }
    }

    /// Classify one kinematics frame; returns the stroke event when this
    /// frame closes a drive. The frame that triggers a transition counts
    /// as the first sample of the new phase.
    pub fn process(&mut self, frame: &KinematicsFrame) -> Option<StrokeEvent> {
        match self.phase {
            StrokePhase::Stopped => {
                // Earliest possible drive entry: the powered criterion with
                // no dwell-time requirement.
                if self.flywheel_powered(frame) {
                    self.begin_drive(frame, false);
                    self.accumulate_drive(frame);
                }
                None
            }
            StrokePhase::Drive => {
                let elapsed = frame.total_time_us.saturating_sub(self.phase_start_us);
                if elapsed >= self.minimum_drive_time_us {
                    // The capacity failsafe honors the dwell minimum like
                    // every other drive exit; until then further force
                    // samples are simply dropped.
                    if self.handle_forces.len() >= self.handle_forces_capacity {
                        let event = self.finish_drive(frame, true);
                        self.accumulate_recovery(frame);
                        return Some(event);
                    }
                    if self.flywheel_unpowered(frame) {
                        let event = self.finish_drive(frame, false);
                        self.accumulate_recovery(frame);
                        return Some(event);
                    }
                }
                self.accumulate_drive(frame);
                None
            }
            StrokePhase::Recovery => {
                let elapsed = frame.total_time_us.saturating_sub(self.phase_start_us);
                if elapsed >= self.minimum_recovery_time_us && self.flywheel_powered(frame) {
                    self.begin_drive(frame, true);
                    self.accumulate_drive(frame);
                    return None;
                }
                self.accumulate_recovery(frame);
                None
            }
        }
    }

    /// No impulses for the stopped threshold: freeze in place. Forces
    /// reset, drag preserved.
    pub fn on_stopped(&mut self, now_us: u64) {
        if self.phase == StrokePhase::Stopped {
            return;
        }
        tracing::info!(phase = ?self.phase, "rowing stopped");
        self.phase = StrokePhase::Stopped;
        self.phase_start_us = now_us;
        self.handle_forces.clear();
        self.power_integral_j = 0.0;
        self.previous_power_sample = None;
        self.drag_ols.reset();
    }

    pub fn phase(&self) -> StrokePhase {
        self.phase
    }

    pub fn stroke_count(&self) -> u16 {
        self.stroke_count
    }

    pub fn drag_coefficient(&self) -> Precision {
        self.drag_coefficient
    }

    pub fn handle_forces(&self) -> &[Precision] {
        &self.handle_forces
    }

    pub fn reset(&mut self) {
        self.phase = StrokePhase::Stopped;
        self.phase_start_us = 0;
        self.stroke_count = 0;
        self.last_recovery_duration_s = 0.0;
        self.handle_forces.clear();
        self.power_integral_j = 0.0;
        self.previous_power_sample = None;
        self.drag_ols.reset();
        self.drag_coefficients.reset();
        self.drag_coefficient = 0.0;
    }

    // ── Phase criteria ───────────────────────────────────────────────────

    fn flywheel_powered(&self, frame: &KinematicsFrame) -> bool {
        match self.detection {
            StrokeDetectionType::Torque => frame.torque > self.minimum_powered_torque,
            StrokeDetectionType::Slope => frame.velocity_slope > 0.0,
            StrokeDetectionType::Both => {
                frame.torque > self.minimum_powered_torque || frame.velocity_slope > 0.0
            }
        }
    }

    fn flywheel_unpowered(&self, frame: &KinematicsFrame) -> bool {
        match self.detection {
            StrokeDetectionType::Torque => frame.torque < self.minimum_drag_torque,
            StrokeDetectionType::Slope => frame.velocity_slope <= self.minimum_recovery_slope,
            StrokeDetectionType::Both => {
                // Torque is primary; the slope decides only inside the
                // inconclusive band around the threshold.
                let torque_margin = (frame.torque - self.minimum_drag_torque).abs();
                if torque_margin <= self.minimum_recovery_slope_margin {
                    frame.velocity_slope <= self.minimum_recovery_slope
                } else {
                    frame.torque < self.minimum_drag_torque
                }
            }
        }
    }

    // ── Phase bookkeeping ────────────────────────────────────────────────

    fn accumulate_drive(&mut self, frame: &KinematicsFrame) {
        if self.handle_forces.len() < self.handle_forces_capacity {
            self.handle_forces.push(frame.torque / self.sprocket_radius_m);
        }
        let power = frame.torque * frame.angular_velocity;
        if let Some((prev_t, prev_power)) = self.previous_power_sample {
            let dt_s = us_to_s(frame.total_time_us.saturating_sub(prev_t));
            self.power_integral_j += (power + prev_power) / 2.0 * dt_s;
        }
        self.previous_power_sample = Some((frame.total_time_us, power));
    }

    fn accumulate_recovery(&mut self, frame: &KinematicsFrame) {
        let elapsed = frame.total_time_us.saturating_sub(self.phase_start_us);
        if elapsed <= self.max_drag_recovery_period_us && frame.reciprocal_velocity > 0.0 {
            self.drag_ols
                .push(us_to_s(frame.total_time_us), frame.reciprocal_velocity);
        }
    }

    fn begin_drive(&mut self, frame: &KinematicsFrame, from_recovery: bool) {
        let now = frame.total_time_us;
        if from_recovery {
            let recovery_us = now.saturating_sub(self.phase_start_us);
            self.last_recovery_duration_s = us_to_s(recovery_us);
            self.update_drag(recovery_us);
        }
        tracing::debug!(total_time_us = now, "drive start");
        self.phase = StrokePhase::Drive;
        self.phase_start_us = now;
        self.handle_forces.clear();
        self.power_integral_j = 0.0;
        self.previous_power_sample = None;
    }

    fn finish_drive(&mut self, frame: &KinematicsFrame, forced: bool) -> StrokeEvent {
        let now = frame.total_time_us;
        let drive_us = now.saturating_sub(self.phase_start_us);
        let drive_duration_s = us_to_s(drive_us);
        self.stroke_count = self.stroke_count.wrapping_add(1);
        let avg_stroke_power_w = if drive_us > 0 {
            self.power_integral_j / drive_duration_s
        } else {
            0.0
        };
        let handle_forces = std::mem::take(&mut self.handle_forces);

        self.phase = StrokePhase::Recovery;
        self.phase_start_us = now;
        self.power_integral_j = 0.0;
        self.previous_power_sample = None;
        self.drag_ols.reset();

        tracing::debug!(
            stroke = self.stroke_count,
            drive_duration_s,
            avg_stroke_power_w,
            forced,
            "drive end"
        );
        StrokeEvent {
            stroke_count: self.stroke_count,
            stroke_time_us: now,
            drive_duration_s,
            recovery_duration_s: self.last_recovery_duration_s,
            avg_stroke_power_w,
            drag_coefficient: self.drag_coefficient,
            handle_forces,
            forced,
        }
    }

    /// Fold the just-ended recovery window into the drag estimate.
    ///
    /// During recovery the flywheel obeys I·dω/dt = −k·ω², so d(1/ω)/dt
    /// = k/I is constant: the slope of the (t, 1/ω) fit times the inertia
    /// is a drag coefficient sample.
    fn update_drag(&mut self, recovery_us: u64) {
        if recovery_us > self.max_drag_recovery_period_us {
            return;
        }
        if self.drag_ols.len() < 2 {
            return;
        }
        let goodness_of_fit = self.drag_ols.goodness_of_fit();
        if goodness_of_fit < self.goodness_of_fit_threshold {
            tracing::trace!(goodness_of_fit, "drag regression below fit threshold");
            return;
        }
        let candidate = self.drag_ols.slope() * self.inertia;
        if candidate < self.lower_drag_coefficient || candidate > self.upper_drag_coefficient {
            tracing::trace!(candidate, "drag coefficient out of configured bounds");
            return;
        }
        self.drag_coefficients.push(candidate);
        self.drag_coefficient = self.drag_coefficients.median();
        tracing::debug!(
            drag_factor = self.drag_coefficient * 1e6,
            goodness_of_fit,
            "drag coefficient updated"
        );
    }
}
