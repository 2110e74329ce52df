//! Flywheel kinematics estimation.
//!
//! Maintains rolling regressions over the angular position curve and
//! derives angular velocity, angular acceleration and instantaneous
//! torque for each corrected impulse.

use crate::config::MachineSettings;
use crate::ols::OLSLinearSeries;
use crate::ts_linear::TSLinearSeries;
use crate::ts_quadratic::TSQuadraticSeries;
use crate::types::{KinematicsFrame, Precision, TWO_PI};

pub struct FlywheelEstimator {
    angular_displacement_per_impulse: Precision,
    inertia: Precision,

    total_time_s: Precision,
    angular_position: Precision,

    /// (t, θ) linear fit; its slope is the fallback angular velocity while
    /// the quadratic fit is still warming up.
    position_ts: TSLinearSeries,
    /// (t, θ) quadratic fit; derivative at the newest sample gives a
    /// less-noisy ω, second derivative gives α.
    position_quad: TSQuadraticSeries,
    /// (t, ω) fit whose slope feeds the slope-based stroke criterion.
    velocity_ols: OLSLinearSeries,
    /// (absolute impulse index, raw Δt) fit: the linear model the cyclic
    /// error filter learns against.
    raw_delta_ols: OLSLinearSeries,
}

impl FlywheelEstimator {
    pub fn new(machine: &MachineSettings, impulse_data_array_length: u8) -> Self {
        let window = usize::from(impulse_data_array_length);
        Self {
            angular_displacement_per_impulse: TWO_PI
                / Precision::from(machine.impulses_per_revolution),
            inertia: machine.flywheel_inertia,
            total_time_s: 0.0,
            angular_position: 0.0,
            position_ts: TSLinearSeries::new(window),
            position_quad: TSQuadraticSeries::new(window),
            velocity_ols: OLSLinearSeries::new(window),
            raw_delta_ols: OLSLinearSeries::new(window),
        }
    }

    /// Track one raw delta for the cyclic filter's expected-delta model.
    /// Returns (slope, intercept, R²) of Δt over absolute position.
    pub fn observe_raw_delta(
        &mut self,
        absolute_position: u64,
        raw_delta_us: Precision,
    ) -> (Precision, Precision, Precision) {
        self.raw_delta_ols
            .push(absolute_position as Precision, raw_delta_us);
        (
            self.raw_delta_ols.slope(),
            self.raw_delta_ols.intercept(),
            self.raw_delta_ols.goodness_of_fit(),
        )
    }

    /// Advance the angular position curve by one corrected impulse and
    /// derive the dynamics for it. `drag_coefficient` is the live k used
    /// for the k·ω² term of the torque.
    pub fn advance(
        &mut self,
        clean_delta_us: Precision,
        total_time_us: u64,
        drag_coefficient: Precision,
    ) -> KinematicsFrame {
        self.total_time_s += clean_delta_us / 1e6;
        self.angular_position += self.angular_displacement_per_impulse;

        self.position_ts.push(self.total_time_s, self.angular_position);
        self.position_quad.push(self.total_time_s, self.angular_position);

        let samples = self.position_quad.len();
        let (angular_velocity, angular_acceleration, goodness_of_fit) = if samples > 2 {
            (
                self.position_quad.first_derivative_at_position(samples - 1),
                self.position_quad.second_derivative_at_position(samples - 1),
                self.position_quad.goodness_of_fit(),
            )
        } else {
            (self.position_ts.coefficient_a(), 0.0, 0.0)
        };

        self.velocity_ols.push(self.total_time_s, angular_velocity);

        let torque =
            self.inertia * angular_acceleration + drag_coefficient * angular_velocity * angular_velocity;
        let reciprocal_velocity = if angular_velocity > 0.0 {
            1.0 / angular_velocity
        } else {
            0.0
        };

        KinematicsFrame {
            total_time_us,
            angular_velocity,
            angular_acceleration,
            torque,
            velocity_slope: self.velocity_ols.slope(),
            goodness_of_fit,
            reciprocal_velocity,
        }
    }

    pub fn reset(&mut self) {
        self.total_time_s = 0.0;
        self.angular_position = 0.0;
        self.position_ts.reset();
        self.position_quad.reset();
        self.velocity_ols.reset();
        self.raw_delta_ols.reset();
    }
}
