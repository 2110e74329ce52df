//! Test and demo helpers: canned and synthetic edge sources.

use rower_traits::EdgeSource;

use crate::types::{Precision, TWO_PI};

/// Replays a fixed list of edge timestamps.
pub struct VecEdgeSource {
    timestamps: std::vec::IntoIter<u64>,
}

impl VecEdgeSource {
    pub fn new(timestamps: impl Into<Vec<u64>>) -> Self {
        Self {
            timestamps: timestamps.into().into_iter(),
        }
    }

    /// Uniform rotation: `count` edges spaced `delta_us` apart starting at
    /// `start_us`.
    pub fn uniform(start_us: u64, delta_us: u64, count: usize) -> Self {
        let timestamps: Vec<u64> = (0..count as u64).map(|i| start_us + i * delta_us).collect();
        Self {
            timestamps: timestamps.into_iter(),
        }
    }
}

impl EdgeSource for VecEdgeSource {
    fn next_edge(&mut self) -> Option<u64> {
        self.timestamps.next()
    }
}

/// One piecewise-constant-acceleration segment of a synthetic session.
#[derive(Debug, Clone, Copy)]
pub struct RowingSegment {
    pub duration_s: Precision,
    pub angular_acceleration: Precision,
}

/// Generates physically consistent edge timestamps for a flywheel driven
/// through piecewise-constant angular acceleration segments: one edge per
/// 2π/N of angular travel.
pub struct SyntheticRower {
    delta_theta: Precision,
    start_time_us: u64,
    segments: Vec<RowingSegment>,
    segment_index: usize,
    segment_elapsed_s: Precision,
    time_s: Precision,
    omega: Precision,
    theta: Precision,
    next_theta: Precision,
}

impl SyntheticRower {
    pub fn new(
        impulses_per_revolution: u8,
        start_velocity_rad_s: Precision,
        start_time_us: u64,
        segments: Vec<RowingSegment>,
    ) -> Self {
        let delta_theta = TWO_PI / Precision::from(impulses_per_revolution.max(1));
        Self {
            delta_theta,
            start_time_us,
            segments,
            segment_index: 0,
            segment_elapsed_s: 0.0,
            time_s: 0.0,
            omega: start_velocity_rad_s,
            theta: 0.0,
            next_theta: delta_theta,
        }
    }

    /// A session of identical strokes: each stroke is a powered drive
    /// followed by a decelerating recovery.
    pub fn strokes(
        impulses_per_revolution: u8,
        start_velocity_rad_s: Precision,
        stroke_count: usize,
        drive_s: Precision,
        drive_acceleration: Precision,
        recovery_s: Precision,
        recovery_acceleration: Precision,
    ) -> Self {
        let mut segments = Vec::with_capacity(stroke_count * 2);
        for _ in 0..stroke_count {
            segments.push(RowingSegment {
                duration_s: drive_s,
                angular_acceleration: drive_acceleration,
            });
            segments.push(RowingSegment {
                duration_s: recovery_s,
                angular_acceleration: recovery_acceleration,
            });
        }
        Self::new(impulses_per_revolution, start_velocity_rad_s, 0, segments)
    }

    /// Time within the current segment until the next magnet pass, if it
    /// happens before the segment ends.
    fn time_to_next_edge(&self, remaining_s: Precision) -> Option<Precision> {
        let displacement = self.next_theta - self.theta;
        let alpha = self.segments[self.segment_index].angular_acceleration;
        let dt = if alpha == 0.0 {
            if self.omega <= 0.0 {
                return None;
            }
            displacement / self.omega
        } else {
            let discriminant = self.omega * self.omega + 2.0 * alpha * displacement;
            if discriminant < 0.0 {
                // Flywheel stops before reaching the next magnet.
                return None;
            }
            (-self.omega + discriminant.sqrt()) / alpha
        };
        (dt >= 0.0 && dt <= remaining_s).then_some(dt)
    }
}

impl EdgeSource for SyntheticRower {
    fn next_edge(&mut self) -> Option<u64> {
        while self.segment_index < self.segments.len() {
            let segment = self.segments[self.segment_index];
            let remaining_s = segment.duration_s - self.segment_elapsed_s;
            if let Some(dt) = self.time_to_next_edge(remaining_s) {
                let alpha = segment.angular_acceleration;
                self.time_s += dt;
                self.segment_elapsed_s += dt;
                self.omega = (self.omega + alpha * dt).max(0.0);
                self.theta = self.next_theta;
                self.next_theta += self.delta_theta;
                let timestamp =
                    self.start_time_us + (self.time_s * 1e6).round() as u64;
                return Some(timestamp);
            }
            // No edge left in this segment: coast to its end (or to a
            // standstill, whichever comes first).
            let alpha = segment.angular_acceleration;
            let coast_s = if alpha < 0.0 {
                (-self.omega / alpha).min(remaining_s)
            } else {
                remaining_s
            };
            self.theta += self.omega * coast_s + 0.5 * alpha * coast_s * coast_s;
            self.omega = (self.omega + alpha * coast_s).max(0.0);
            self.time_s += remaining_s;
            self.segment_index += 1;
            self.segment_elapsed_s = 0.0;
        }
        None
    }
}
