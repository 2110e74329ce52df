//! Common unit-conversion helpers for rower_core.

use crate::types::Precision;

/// Milliseconds to microseconds without overflow for any u32 input.
#[inline]
pub fn ms_to_us(ms: u32) -> u64 {
    u64::from(ms) * 1_000
}

/// Microseconds to seconds in pipeline precision.
#[inline]
pub fn us_to_s(us: u64) -> Precision {
    us as Precision / 1e6
}

/// Centimetres to metres in pipeline precision.
#[inline]
pub fn cm_to_m(cm: Precision) -> Precision {
    cm / 100.0
}
