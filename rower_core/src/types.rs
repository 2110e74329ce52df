//! Pipeline-wide primitive types.

use serde::Serialize;

/// Numeric precision used throughout the pipeline.
///
/// A single alias keeps regression math, drag estimation and test
/// expectations consistent end-to-end. The `single-precision` feature
/// switches the whole pipeline to f32 for small targets.
#[cfg(not(feature = "single-precision"))]
pub type Precision = f64;
#[cfg(feature = "single-precision")]
pub type Precision = f32;

/// One full turn in radians.
pub const TWO_PI: Precision = std::f64::consts::TAU as Precision;

/// One accepted sensor edge, as queued from interrupt context to the
/// main task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Impulse {
    /// Running count of accepted edges since start/reset (1-based).
    pub raw_impulse_count: u64,
    /// Time since the previous accepted edge, microseconds.
    pub delta_time_us: u32,
    /// Monotonic timestamp of this edge, microseconds.
    pub total_time_us: u64,
}

/// Stroke cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrokePhase {
    Stopped,
    Drive,
    Recovery,
}

/// Instantaneous flywheel dynamics derived for one impulse.
///
/// Produced by the kinematics estimator and consumed by the stroke state
/// machine; carries everything phase detection needs so the state machine
/// can be driven with synthetic traces in tests.
#[derive(Debug, Clone, Copy)]
pub struct KinematicsFrame {
    pub total_time_us: u64,
    /// Angular velocity, rad/s.
    pub angular_velocity: Precision,
    /// Angular acceleration, rad/s².
    pub angular_acceleration: Precision,
    /// Net torque at the flywheel axle, N·m.
    pub torque: Precision,
    /// Rolling slope of angular velocity over the kinematics window.
    pub velocity_slope: Precision,
    /// R² of the quadratic position fit; proxy for signal quality.
    pub goodness_of_fit: Precision,
    /// 1/ω, used by the drag regression during recovery. Zero when ω is
    /// not positive.
    pub reciprocal_velocity: Precision,
}
