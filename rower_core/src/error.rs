use thiserror::Error;

/// Errors raised while assembling or reconfiguring the pipeline.
///
/// Once built, per-impulse processing is total: discarded input,
/// insufficient regression data and out-of-range drag slopes all degrade
/// to neutral values instead of erroring.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
