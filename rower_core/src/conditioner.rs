//! Interrupt-side signal conditioning.
//!
//! `on_edge` is the only code that runs in interrupt context: it is
//! bounded-work, allocation-free and non-blocking. It timestamps falling
//! edges, applies the debounce rule, and hands accepted impulses to the
//! main task over a bounded channel. The only other cross-context data is
//! a pair of atomics the main task and external pollers read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::config::SensorSignalSettings;
use crate::types::Impulse;
use crate::util::ms_to_us;

/// Counters published from interrupt context for lock-free readout.
#[derive(Debug, Default)]
pub struct SharedCounters {
    raw_impulse_count: AtomicU64,
    last_total_time_us: AtomicU64,
}

impl SharedCounters {
    pub fn raw_impulse_count(&self) -> u64 {
        self.raw_impulse_count.load(Ordering::Acquire)
    }

    pub fn last_total_time_us(&self) -> u64 {
        self.last_total_time_us.load(Ordering::Acquire)
    }

    fn publish(&self, count: u64, total_time_us: u64) {
        self.raw_impulse_count.store(count, Ordering::Release);
        self.last_total_time_us.store(total_time_us, Ordering::Release);
    }

    fn clear(&self) {
        self.publish(0, 0);
    }
}

/// Debounces sensor edges and produces clean inter-impulse delta times.
pub struct ImpulseConditioner {
    tx: Sender<Impulse>,
    shared: Arc<SharedCounters>,
    debounce_enabled: bool,
    min_delta_us: u64,
    last_edge_us: Option<u64>,
    last_delta_us: u64,
    accepted_count: u64,
}

impl ImpulseConditioner {
    pub(crate) fn new(
        tx: Sender<Impulse>,
        shared: Arc<SharedCounters>,
        settings: &SensorSignalSettings,
    ) -> Self {
        Self {
            tx,
            shared,
            debounce_enabled: settings.enable_debounce_filter,
            min_delta_us: ms_to_us(settings.rotation_debounce_time_min_ms),
            last_edge_us: None,
            last_delta_us: 0,
            accepted_count: 0,
        }
    }

    /// Handle one falling edge with a monotonic microsecond timestamp.
    ///
    /// ISR-safe: no allocation, no blocking; a full queue drops the
    /// impulse rather than waiting.
    pub fn on_edge(&mut self, now_us: u64) {
        let Some(last_edge) = self.last_edge_us else {
            // First edge of the session: a delta does not exist yet, but
            // the magnet pass itself counts.
            self.last_edge_us = Some(now_us);
            self.accepted_count = 1;
            self.shared.publish(self.accepted_count, now_us);
            return;
        };

        let delta = now_us.saturating_sub(last_edge);
        let rejected = if self.debounce_enabled {
            // A genuine impulse differs from the previous interval by less
            // than its own length once steady state is reached; a bounce is
            // a sub-debounce spike. Short-but-consistent intervals from
            // fast rotation pass, unlike a plain minimum-time rule. Until a
            // first interval exists, fall back to the hard minimum.
            let spike =
                self.last_delta_us == 0 || delta.abs_diff(self.last_delta_us) > delta;
            spike && delta < self.min_delta_us
        } else {
            delta < self.min_delta_us
        };
        if rejected {
            return;
        }

        self.last_edge_us = Some(now_us);
        self.last_delta_us = delta;
        self.accepted_count += 1;
        self.shared.publish(self.accepted_count, now_us);

        let impulse = Impulse {
            raw_impulse_count: self.accepted_count,
            delta_time_us: delta.min(u64::from(u32::MAX)) as u32,
            total_time_us: now_us,
        };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(impulse) {
            // Queue overrun: the main task has fallen behind. Dropping the
            // impulse keeps the handler bounded.
        }
    }

    /// Apply new signal settings; takes effect immediately on the next edge.
    pub fn configure(&mut self, settings: &SensorSignalSettings) {
        self.debounce_enabled = settings.enable_debounce_filter;
        self.min_delta_us = ms_to_us(settings.rotation_debounce_time_min_ms);
    }

    /// Forget all edge history and restart counting from zero.
    pub fn reset(&mut self) {
        self.last_edge_us = None;
        self.last_delta_us = 0;
        self.accepted_count = 0;
        self.shared.clear();
    }
}
