//! Runtime-adjustable pipeline settings.
//!
//! Defaults match the Kettler Stroker machine profile. All settings are
//! validated at the builder/configure boundary; the pipeline itself never
//! sees an invalid configuration.

use crate::types::Precision;

/// Which signal the stroke state machine uses to classify Drive/Recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeDetectionType {
    /// Torque thresholds only.
    Torque,
    /// Angular-velocity slope only.
    Slope,
    /// Torque as the primary criterion, slope consulted when torque is
    /// within the configured margin of the threshold.
    Both,
}

/// Physical machine parameters.
#[derive(Debug, Clone)]
pub struct MachineSettings {
    /// Magnet count on the flywheel; also the cyclic-error slot count.
    pub impulses_per_revolution: u8,
    /// Flywheel moment of inertia, kg·m².
    pub flywheel_inertia: Precision,
    /// Effective sprocket radius, cm. Converts torque to handle force.
    pub sprocket_radius_cm: Precision,
    /// Distance-conversion constant from the Concept2 pace convention.
    pub concept2_magic_number: Precision,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            impulses_per_revolution: 4,
            flywheel_inertia: 0.0293,
            // Pulley train reduced to a single equivalent radius.
            sprocket_radius_cm: 6.5 / 8.0 * 1.6875,
            concept2_magic_number: 2.8,
        }
    }
}

/// Sensor signal conditioning and cyclic-error learning.
#[derive(Debug, Clone)]
pub struct SensorSignalSettings {
    /// Toggles the relative-spike debouncer for reed-switch sensors.
    pub enable_debounce_filter: bool,
    /// Hard minimum between accepted edges, ms.
    pub rotation_debounce_time_min_ms: u32,
    /// No edges for this long means rowing has stopped, ms.
    pub rowing_stopped_threshold_ms: u32,
    /// Cyclic-error learning aggressiveness in [0, 1]; 0 disables learning.
    pub cyclic_error_aggressiveness: Precision,
    /// Samples recorded before the cyclic-error filter counts as stabilized.
    pub cyclic_error_recording_capacity: u16,
}

impl Default for SensorSignalSettings {
    fn default() -> Self {
        Self {
            enable_debounce_filter: false,
            rotation_debounce_time_min_ms: 8,
            rowing_stopped_threshold_ms: 7_000,
            cyclic_error_aggressiveness: 1.0,
            cyclic_error_recording_capacity: 240,
        }
    }
}

/// Drag factor estimation bounds and smoothing.
#[derive(Debug, Clone)]
pub struct DragFactorSettings {
    /// Minimum R² for a recovery regression to yield a drag sample.
    pub goodness_of_fit_threshold: Precision,
    /// Recoveries longer than this are not used for drag, ms.
    pub max_drag_factor_recovery_period_ms: u32,
    /// Lower bound on the drag factor (× 1e-6).
    pub lower_drag_factor_threshold: Precision,
    /// Upper bound on the drag factor (× 1e-6). Magnetic rowers can run
    /// very high.
    pub upper_drag_factor_threshold: Precision,
    /// Depth of the drag median window.
    pub drag_coefficients_array_length: u8,
}

impl Default for DragFactorSettings {
    fn default() -> Self {
        Self {
            goodness_of_fit_threshold: 0.8,
            max_drag_factor_recovery_period_ms: 6_000,
            lower_drag_factor_threshold: 25.0,
            upper_drag_factor_threshold: 2_500.0,
            drag_coefficients_array_length: 10,
        }
    }
}

/// Stroke phase detection thresholds and windows.
#[derive(Debug, Clone)]
pub struct StrokePhaseSettings {
    pub stroke_detection_type: StrokeDetectionType,
    /// Torque above which the flywheel counts as powered, N·m.
    pub minimum_powered_torque: Precision,
    /// Torque below which the flywheel counts as unpowered, N·m.
    pub minimum_drag_torque: Precision,
    /// Angular-velocity slope at or below which recovery is assumed.
    pub minimum_recovery_slope: Precision,
    /// Torque band around the drag threshold within which the slope
    /// criterion decides (detection type Both only).
    pub minimum_recovery_slope_margin: Precision,
    /// Phase dwell minima, ms.
    pub minimum_recovery_time_ms: u32,
    pub minimum_drive_time_ms: u32,
    /// Kinematics regression window, samples.
    pub impulse_data_array_length: u8,
    /// Hard cap on the per-drive handle-force vector.
    pub drive_handle_forces_max_capacity: u16,
}

impl Default for StrokePhaseSettings {
    fn default() -> Self {
        Self {
            stroke_detection_type: StrokeDetectionType::Torque,
            minimum_powered_torque: 0.0,
            minimum_drag_torque: 0.4,
            minimum_recovery_slope: 0.0,
            minimum_recovery_slope_margin: 0.0,
            minimum_recovery_time_ms: 500,
            minimum_drive_time_ms: 200,
            impulse_data_array_length: 8,
            drive_handle_forces_max_capacity: 100,
        }
    }
}

/// The full settings record the builder validates and the monitor applies
/// on its next reset boundary.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub machine: MachineSettings,
    pub signal: SensorSignalSettings,
    pub drag: DragFactorSettings,
    pub stroke: StrokePhaseSettings,
}
