//! Drive the pipeline from an edge source.
//!
//! Two modes: `run_replay` consumes a recorded stream inline in virtual
//! time (tests, log analysis), and `spawn_paced_feeder` replays edges on a
//! feeder thread paced by a clock so the main loop runs as it would
//! against live hardware.

use std::thread::JoinHandle;
use std::time::Duration;

use rower_traits::clock::Clock;
use rower_traits::EdgeSource;

use crate::conditioner::ImpulseConditioner;
use crate::metrics::{RowerMetrics, StrokeEvent};
use crate::monitor::RowingMonitor;

/// Replay a recorded edge stream through the pipeline in virtual time.
///
/// `on_stroke` is invoked once per completed stroke, in order. The stream
/// end is treated as a rowing stop so the final state is settled.
pub fn run_replay<E, F>(
    source: &mut E,
    conditioner: &mut ImpulseConditioner,
    monitor: &mut RowingMonitor,
    mut on_stroke: F,
) -> RowerMetrics
where
    E: EdgeSource,
    F: FnMut(&StrokeEvent),
{
    let mut last_edge_us = 0u64;
    while let Some(timestamp_us) = source.next_edge() {
        conditioner.on_edge(timestamp_us);
        monitor.update(timestamp_us);
        for event in monitor.take_events() {
            on_stroke(&event);
        }
        last_edge_us = timestamp_us;
    }
    // Let the stopped watchdog observe the end of the stream.
    let settle_at = last_edge_us.saturating_add(monitor.stopped_threshold_us() + 1);
    monitor.update(settle_at);
    for event in monitor.take_events() {
        on_stroke(&event);
    }
    monitor.snapshot()
}

/// Feed edges into the conditioner on a background thread, pacing them by
/// their timestamp gaps against the supplied clock. The caller keeps the
/// monitor and polls `update()` from its own loop.
pub fn spawn_paced_feeder<E, C>(
    mut source: E,
    mut conditioner: ImpulseConditioner,
    clock: C,
) -> JoinHandle<ImpulseConditioner>
where
    E: EdgeSource + Send + 'static,
    C: Clock + Send + 'static,
{
    std::thread::spawn(move || {
        let mut previous: Option<u64> = None;
        while let Some(timestamp_us) = source.next_edge() {
            if let Some(prev) = previous {
                clock.sleep(Duration::from_micros(timestamp_us.saturating_sub(prev)));
            }
            previous = Some(timestamp_us);
            conditioner.on_edge(timestamp_us);
        }
        conditioner
    })
}
