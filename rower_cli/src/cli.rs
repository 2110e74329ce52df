use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "rower",
    about = "Rowing ergometer metrics pipeline: replay recorded sessions or simulate one",
    version
)]
pub struct Cli {
    /// Path to a TOML machine profile. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level filter (overrides RUST_LOG), e.g. "info" or "rower_core=debug".
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit per-stroke events as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a recorded impulse log (one µs timestamp per line, or CSV
    /// with a timestamp_us column) through the pipeline.
    Replay {
        /// Impulse log to replay.
        #[arg(long)]
        input: PathBuf,
    },
    /// Run a synthetic session through the pipeline.
    Simulate {
        /// Number of strokes to generate.
        #[arg(long, default_value_t = 10)]
        strokes: usize,
        /// Drive duration in seconds.
        #[arg(long, default_value_t = 0.8)]
        drive_s: f64,
        /// Recovery duration in seconds.
        #[arg(long, default_value_t = 1.6)]
        recovery_s: f64,
    },
}
