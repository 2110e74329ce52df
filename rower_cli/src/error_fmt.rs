//! Human-readable error rendering for the CLI.

use rower_config::ConfigError;
use rower_core::BuildError;

/// Turn a boundary error into a what/why/fix message for the terminal.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return match ce {
            ConfigError::Invalid(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the profile TOML.\nHow to fix: Edit the profile and rerun. See README for a sample."
            ),
            ConfigError::Toml(e) => format!(
                "What happened: The profile TOML did not parse ({e}).\nLikely causes: A typo in a key or a wrong value type.\nHow to fix: Compare against the sample profile in the README."
            ),
            ConfigError::ImpulseLog(msg) => format!(
                "What happened: The impulse log could not be read ({msg}).\nLikely causes: Wrong file, truncated recording, or mixed formats.\nHow to fix: Export the log again (plain µs timestamps or CSV with a timestamp_us column)."
            ),
            ConfigError::Io(e) => format!(
                "What happened: Could not read a file ({e}).\nLikely causes: Wrong path or missing permissions.\nHow to fix: Check the --config / --input paths."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::InvalidConfig(msg) => format!(
                "What happened: The pipeline rejected its configuration ({msg}).\nLikely causes: Values that parse but are out of range.\nHow to fix: Adjust the profile TOML and rerun."
            ),
        };
    }

    format!("What happened: {err}.\nHow to fix: Re-run with --log-level=debug for more detail.")
}
