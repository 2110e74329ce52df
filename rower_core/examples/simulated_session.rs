//! Run a synthetic rowing session through the pipeline and print the
//! per-stroke events plus the final metrics.
//!
//! ```sh
//! cargo run --example simulated_session
//! ```

use rower_core::config::{Settings, StrokePhaseSettings};
use rower_core::mocks::SyntheticRower;
use rower_core::runner::run_replay;
use rower_core::MonitorBuilder;

fn main() -> rower_core::Result<()> {
    let settings = Settings {
        stroke: StrokePhaseSettings {
            minimum_powered_torque: 0.1,
            minimum_drag_torque: 0.05,
            minimum_drive_time_ms: 300,
            minimum_recovery_time_ms: 500,
            ..StrokePhaseSettings::default()
        },
        ..Settings::default()
    };
    let (mut conditioner, mut monitor) = MonitorBuilder::new().with_settings(settings).build()?;

    let mut source = SyntheticRower::strokes(4, 50.0, 10, 0.8, 15.0, 1.6, -7.5);
    let metrics = run_replay(&mut source, &mut conditioner, &mut monitor, |event| {
        println!(
            "stroke {:>2}  drive {:.2}s  recovery {:.2}s  power {:>5.1}W  drag factor {:.0}",
            event.stroke_count,
            event.drive_duration_s,
            event.recovery_duration_s,
            event.avg_stroke_power_w,
            event.drag_coefficient * 1e6,
        );
    });

    println!(
        "session: {} strokes, {} revolutions, {:.1} m, drag factor {}",
        metrics.stroke_count,
        metrics.rev_count,
        metrics.distance_m,
        monitor.drag_factor(),
    );
    Ok(())
}
