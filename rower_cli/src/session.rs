//! Session drivers for the replay and simulate subcommands.

use std::path::Path;

use rower_core::mocks::{SyntheticRower, VecEdgeSource};
use rower_core::runner::run_replay;
use rower_core::{MonitorBuilder, RowerMetrics, RowingMonitor, StrokeEvent};
use rower_traits::EdgeSource;

use crate::cli::Cli;

pub fn replay(cli: &Cli, config: &rower_config::Config, input: &Path) -> eyre::Result<()> {
    let timestamps = rower_config::load_impulse_log(input)?;
    tracing::info!(count = timestamps.len(), input = %input.display(), "replaying impulse log");
    let mut source = VecEdgeSource::new(timestamps);
    run_session(cli, config, &mut source)
}

pub fn simulate(
    cli: &Cli,
    config: &rower_config::Config,
    strokes: usize,
    drive_s: f64,
    recovery_s: f64,
) -> eyre::Result<()> {
    let impulses_per_revolution = config.machine.impulses_per_revolution;
    tracing::info!(strokes, drive_s, recovery_s, "simulating session");
    type P = rower_core::Precision;
    // Balance the recovery deceleration against the drive so the flywheel
    // speed does not drift across strokes, whatever durations were asked.
    let drive_acceleration: P = 25.0;
    let recovery_acceleration =
        -(drive_acceleration * drive_s as P) / (recovery_s as P).max(0.1);
    let mut source = SyntheticRower::strokes(
        impulses_per_revolution,
        50.0,
        strokes,
        drive_s as P,
        drive_acceleration,
        recovery_s as P,
        recovery_acceleration,
    );
    run_session(cli, config, &mut source)
}

fn run_session<E: EdgeSource>(
    cli: &Cli,
    config: &rower_config::Config,
    source: &mut E,
) -> eyre::Result<()> {
    let settings = config.to_settings()?;
    let (mut conditioner, mut monitor) = MonitorBuilder::new().with_settings(settings).build()?;

    let json = cli.json;
    let metrics = run_replay(source, &mut conditioner, &mut monitor, |event| {
        print_stroke(event, json);
    });

    print_summary(&metrics, &monitor, json)?;
    Ok(())
}

fn print_stroke(event: &StrokeEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    } else {
        println!(
            "stroke {:>3}  drive {:>5.2}s  recovery {:>5.2}s  power {:>6.1}W  drag factor {:>5.0}{}",
            event.stroke_count,
            event.drive_duration_s,
            event.recovery_duration_s,
            event.avg_stroke_power_w,
            event.drag_coefficient * 1e6,
            if event.forced { "  [forced]" } else { "" },
        );
    }
}

fn print_summary(metrics: &RowerMetrics, monitor: &RowingMonitor, json: bool) -> eyre::Result<()> {
    if json {
        let line = serde_json::json!({
            "summary": {
                "stroke_count": metrics.stroke_count,
                "rev_count": metrics.rev_count,
                "distance_m": metrics.distance_m,
                "drag_factor": monitor.drag_factor(),
                "avg_stroke_power_w": metrics.avg_stroke_power_w,
            }
        });
        println!("{line}");
    } else {
        println!(
            "session: {} strokes, {} revolutions, {:.1} m, drag factor {}",
            metrics.stroke_count,
            metrics.rev_count,
            metrics.distance_m,
            monitor.drag_factor(),
        );
    }
    Ok(())
}
