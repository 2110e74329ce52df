//! TOML configuration and impulse-log loading for the rowing monitor.
//!
//! Mirrors the machine-profile layout the firmware ships: a `[machine]`
//! table with the physical constants, `[signal]`, `[drag]` and `[stroke]`
//! tables for the pipeline tunables, and an optional `[logging]` table
//! consumed by the CLI. Everything is validated here before it is mapped
//! into `rower_core` settings, so the core never sees an invalid value.

use serde::Deserialize;
use thiserror::Error;

use rower_core::config as core;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(&'static str),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("impulse log error: {0}")]
    ImpulseLog(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Machine {
    pub impulses_per_revolution: u8,
    pub flywheel_inertia: f64,
    pub sprocket_radius_cm: f64,
    pub concept2_magic_number: f64,
}

impl Default for Machine {
    fn default() -> Self {
        let defaults = core::MachineSettings::default();
        Self {
            impulses_per_revolution: defaults.impulses_per_revolution,
            flywheel_inertia: defaults.flywheel_inertia as f64,
            sprocket_radius_cm: defaults.sprocket_radius_cm as f64,
            concept2_magic_number: defaults.concept2_magic_number as f64,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Signal {
    pub enable_debounce_filter: bool,
    pub rotation_debounce_time_min_ms: u32,
    pub rowing_stopped_threshold_ms: u32,
    pub cyclic_error_aggressiveness: f64,
    pub cyclic_error_recording_capacity: u16,
}

impl Default for Signal {
    fn default() -> Self {
        let defaults = core::SensorSignalSettings::default();
        Self {
            enable_debounce_filter: defaults.enable_debounce_filter,
            rotation_debounce_time_min_ms: defaults.rotation_debounce_time_min_ms,
            rowing_stopped_threshold_ms: defaults.rowing_stopped_threshold_ms,
            cyclic_error_aggressiveness: defaults.cyclic_error_aggressiveness as f64,
            cyclic_error_recording_capacity: defaults.cyclic_error_recording_capacity,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Drag {
    pub goodness_of_fit_threshold: f64,
    pub max_drag_factor_recovery_period_ms: u32,
    pub lower_drag_factor_threshold: f64,
    pub upper_drag_factor_threshold: f64,
    pub drag_coefficients_array_length: u8,
}

impl Default for Drag {
    fn default() -> Self {
        let defaults = core::DragFactorSettings::default();
        Self {
            goodness_of_fit_threshold: defaults.goodness_of_fit_threshold as f64,
            max_drag_factor_recovery_period_ms: defaults.max_drag_factor_recovery_period_ms,
            lower_drag_factor_threshold: defaults.lower_drag_factor_threshold as f64,
            upper_drag_factor_threshold: defaults.upper_drag_factor_threshold as f64,
            drag_coefficients_array_length: defaults.drag_coefficients_array_length,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Stroke {
    /// "torque" | "slope" | "both"
    pub detection: String,
    pub minimum_powered_torque: f64,
    pub minimum_drag_torque: f64,
    pub minimum_recovery_slope: f64,
    pub minimum_recovery_slope_margin: f64,
    pub minimum_recovery_time_ms: u32,
    pub minimum_drive_time_ms: u32,
    pub impulse_data_array_length: u8,
    pub drive_handle_forces_max_capacity: u16,
}

impl Default for Stroke {
    fn default() -> Self {
        let defaults = core::StrokePhaseSettings::default();
        Self {
            detection: "torque".to_string(),
            minimum_powered_torque: defaults.minimum_powered_torque as f64,
            minimum_drag_torque: defaults.minimum_drag_torque as f64,
            minimum_recovery_slope: defaults.minimum_recovery_slope as f64,
            minimum_recovery_slope_margin: defaults.minimum_recovery_slope_margin as f64,
            minimum_recovery_time_ms: defaults.minimum_recovery_time_ms,
            minimum_drive_time_ms: defaults.minimum_drive_time_ms,
            impulse_data_array_length: defaults.impulse_data_array_length,
            drive_handle_forces_max_capacity: defaults.drive_handle_forces_max_capacity,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    /// Path to a JSON-lines log file.
    pub file: Option<String>,
    /// "trace" | "debug" | "info" | "warn" | "error"
    pub level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub machine: Machine,
    pub signal: Signal,
    pub drag: Drag,
    pub stroke: Stroke,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str::<Config>(s)?)
}

impl Config {
    /// Cross-field validation beyond what serde typing gives us; the
    /// builder in `rower_core` revalidates, but failing here produces the
    /// friendlier boundary error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine.impulses_per_revolution == 0 {
            return Err(ConfigError::Invalid("impulses_per_revolution must be > 0"));
        }
        if !(self.machine.flywheel_inertia > 0.0) {
            return Err(ConfigError::Invalid("flywheel_inertia must be > 0"));
        }
        if !(self.machine.sprocket_radius_cm > 0.0) {
            return Err(ConfigError::Invalid("sprocket_radius_cm must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.signal.cyclic_error_aggressiveness) {
            return Err(ConfigError::Invalid(
                "cyclic_error_aggressiveness must be within [0, 1]",
            ));
        }
        if self.signal.rotation_debounce_time_min_ms == 0 {
            return Err(ConfigError::Invalid(
                "rotation_debounce_time_min_ms must be >= 1",
            ));
        }
        if self.drag.upper_drag_factor_threshold <= self.drag.lower_drag_factor_threshold {
            return Err(ConfigError::Invalid(
                "upper_drag_factor_threshold must exceed the lower threshold",
            ));
        }
        if self.stroke.impulse_data_array_length < 3 {
            return Err(ConfigError::Invalid(
                "impulse_data_array_length must be >= 3",
            ));
        }
        self.stroke_detection_type()?;
        Ok(())
    }

    fn stroke_detection_type(&self) -> Result<core::StrokeDetectionType, ConfigError> {
        match self.stroke.detection.as_str() {
            "torque" => Ok(core::StrokeDetectionType::Torque),
            "slope" => Ok(core::StrokeDetectionType::Slope),
            "both" => Ok(core::StrokeDetectionType::Both),
            _ => Err(ConfigError::Invalid(
                "stroke detection must be one of torque|slope|both",
            )),
        }
    }

    /// Map into the validated core settings record.
    pub fn to_settings(&self) -> Result<core::Settings, ConfigError> {
        self.validate()?;
        type P = rower_core::Precision;
        Ok(core::Settings {
            machine: core::MachineSettings {
                impulses_per_revolution: self.machine.impulses_per_revolution,
                flywheel_inertia: self.machine.flywheel_inertia as P,
                sprocket_radius_cm: self.machine.sprocket_radius_cm as P,
                concept2_magic_number: self.machine.concept2_magic_number as P,
            },
            signal: core::SensorSignalSettings {
                enable_debounce_filter: self.signal.enable_debounce_filter,
                rotation_debounce_time_min_ms: self.signal.rotation_debounce_time_min_ms,
                rowing_stopped_threshold_ms: self.signal.rowing_stopped_threshold_ms,
                cyclic_error_aggressiveness: self.signal.cyclic_error_aggressiveness as P,
                cyclic_error_recording_capacity: self.signal.cyclic_error_recording_capacity,
            },
            drag: core::DragFactorSettings {
                goodness_of_fit_threshold: self.drag.goodness_of_fit_threshold as P,
                max_drag_factor_recovery_period_ms: self.drag.max_drag_factor_recovery_period_ms,
                lower_drag_factor_threshold: self.drag.lower_drag_factor_threshold as P,
                upper_drag_factor_threshold: self.drag.upper_drag_factor_threshold as P,
                drag_coefficients_array_length: self.drag.drag_coefficients_array_length,
            },
            stroke: core::StrokePhaseSettings {
                stroke_detection_type: self.stroke_detection_type()?,
                minimum_powered_torque: self.stroke.minimum_powered_torque as P,
                minimum_drag_torque: self.stroke.minimum_drag_torque as P,
                minimum_recovery_slope: self.stroke.minimum_recovery_slope as P,
                minimum_recovery_slope_margin: self.stroke.minimum_recovery_slope_margin as P,
                minimum_recovery_time_ms: self.stroke.minimum_recovery_time_ms,
                minimum_drive_time_ms: self.stroke.minimum_drive_time_ms,
                impulse_data_array_length: self.stroke.impulse_data_array_length,
                drive_handle_forces_max_capacity: self.stroke.drive_handle_forces_max_capacity,
            },
        })
    }
}

/// Load recorded edge timestamps (µs) from an impulse log.
///
/// Two formats are accepted: plain text with one microsecond timestamp
/// per line, and CSV with a `timestamp_us` column (the format the
/// calibration tooling exports). Timestamps must be strictly increasing.
pub fn load_impulse_log(path: &std::path::Path) -> Result<Vec<u64>, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let timestamps = if contents.lines().next().is_some_and(|l| l.contains(',')) {
        parse_impulse_csv(&contents)?
    } else {
        parse_impulse_lines(&contents)?
    };
    if timestamps.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(ConfigError::ImpulseLog(
            "timestamps must be strictly increasing".to_string(),
        ));
    }
    Ok(timestamps)
}

fn parse_impulse_lines(contents: &str) -> Result<Vec<u64>, ConfigError> {
    let mut timestamps = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value = line.parse::<u64>().map_err(|_| {
            ConfigError::ImpulseLog(format!("line {}: not a timestamp: {line}", number + 1))
        })?;
        timestamps.push(value);
    }
    Ok(timestamps)
}

fn parse_impulse_csv(contents: &str) -> Result<Vec<u64>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ConfigError::ImpulseLog(e.to_string()))?;
    let column = headers
        .iter()
        .position(|h| h.trim() == "timestamp_us")
        .ok_or_else(|| ConfigError::ImpulseLog("missing timestamp_us column".to_string()))?;

    let mut timestamps = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConfigError::ImpulseLog(e.to_string()))?;
        let field = record.get(column).unwrap_or_default().trim();
        let value = field
            .parse::<u64>()
            .map_err(|_| ConfigError::ImpulseLog(format!("not a timestamp: {field}")))?;
        timestamps.push(value);
    }
    Ok(timestamps)
}
