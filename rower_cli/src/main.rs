mod cli;
mod error_fmt;
mod session;

use std::sync::OnceLock;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command};

static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", error_fmt::humanize(&err));
            std::process::exit(2);
        }
    };

    init_tracing(&cli, &config);

    let result = match &cli.command {
        Command::Replay { input } => session::replay(&cli, &config, input),
        Command::Simulate {
            strokes,
            drive_s,
            recovery_s,
        } => session::simulate(&cli, &config, *strokes, *drive_s, *recovery_s),
    };

    if let Err(err) = result {
        eprintln!("{}", error_fmt::humanize(&err));
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> eyre::Result<rower_config::Config> {
    match &cli.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| eyre::Report::new(rower_config::ConfigError::Io(e)))?;
            let config = rower_config::load_toml(&contents)?;
            config.validate()?;
            Ok(config)
        }
        None => Ok(rower_config::Config::default()),
    }
}

fn init_tracing(cli: &Cli, config: &rower_config::Config) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));

    if let Some(path) = &config.logging.file {
        let appender = tracing_appender::rolling::never(".", path.clone());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let _ = registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init();
    } else {
        let _ = registry.try_init();
    }
}
