//! survey-etl CLI.

use clap::{ColorChoice, Parser};
use std::io::{self, IsTerminal};
use survey_cli::logging::{LogConfig, LogFormat, init_logging};
use survey_store::{LoadError, StoreError};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{
    EXIT_DRIFT, EXIT_FAILED, EXIT_OK, run_check, run_history, run_run, run_schema, run_show,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(EXIT_FAILED);
    }
    let config = cli.config.as_deref();
    let result = match &cli.command {
        Command::Run(args) => run_run(config, args),
        Command::Check(args) => run_check(config, args),
        Command::Schema(args) => run_schema(config, args).map(|()| EXIT_OK),
        Command::History(args) => run_history(config, args).map(|()| EXIT_OK),
        Command::Show(args) => run_show(config, args).map(|()| EXIT_OK),
    };
    let exit_code = match result {
        Ok(code) => code,
        Err(error) => report_error(&error),
    };
    std::process::exit(exit_code);
}

fn report_error(error: &anyhow::Error) -> i32 {
    if let Some(drift @ LoadError::SchemaDrift { .. }) = error.downcast_ref::<LoadError>() {
        tracing::error!("aborted: schema drift");
        eprintln!("error: {drift}");
        eprintln!("No data was written. Load this poll under a new survey id to start a new history.");
        return EXIT_DRIFT;
    }
    tracing::error!(error = %error, "aborted");
    eprintln!("error: {error}");
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    let store_error = error.downcast_ref::<StoreError>().or_else(|| {
        match error.downcast_ref::<LoadError>() {
            Some(LoadError::Store(inner)) => Some(inner),
            _ => None,
        }
    });
    if let Some(hint) = store_error.and_then(StoreError::suggestion) {
        eprintln!("hint: {hint}");
    }
    EXIT_FAILED
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
