#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Rowing ergometer metrics pipeline (hardware-agnostic).
//!
//! Converts a stream of flywheel rotation impulses into rowing metrics:
//! stroke count, drive and recovery durations, average stroke power,
//! distance, drag factor, and a per-drive handle-force curve. The sensor,
//! radio, persistent storage and power management are external
//! collaborators; the host supplies monotonic microsecond timestamps and
//! polls snapshots.
//!
//! ## Architecture
//!
//! Data flows through a strict unidirectional pipeline:
//!
//! ```text
//! sensor edge (ISR)
//!     → ImpulseConditioner   (debounce, delta time)
//!     → CyclicErrorFilter    (per-magnet correction, learning)
//!     → FlywheelEstimator    (rolling regressions, ω/α/torque)
//!     → StrokeEngine         (Drive/Recovery transitions, reductions)
//!     → MetricsAggregator    (rolling rower state, handle forces)
//! ```
//!
//! The conditioner runs in interrupt context and only appends to a
//! bounded queue; everything downstream runs in the host's cooperative
//! main loop via [`RowingMonitor::update`]. There is no shared mutation
//! between contexts beyond the queue and two published atomic counters.
//!
//! ## Precision
//!
//! All pipeline math uses a single [`types::Precision`] alias (f64 by
//! default; the `single-precision` feature selects f32).

pub mod builder;
pub mod conditioner;
pub mod config;
pub mod cyclic_filter;
pub mod error;
pub mod ewa;
pub mod flywheel;
pub mod metrics;
pub mod mocks;
pub mod monitor;
pub mod ols;
pub mod runner;
pub mod series;
pub mod stroke;
pub mod ts_linear;
pub mod ts_quadratic;
pub mod types;
pub mod util;

pub use builder::MonitorBuilder;
pub use conditioner::ImpulseConditioner;
pub use config::{
    DragFactorSettings, MachineSettings, SensorSignalSettings, Settings, StrokeDetectionType,
    StrokePhaseSettings,
};
pub use cyclic_filter::CyclicErrorFilter;
pub use error::{BuildError, Result};
pub use metrics::{RowerMetrics, StrokeEvent};
pub use monitor::RowingMonitor;
pub use types::{Impulse, KinematicsFrame, Precision, StrokePhase};
