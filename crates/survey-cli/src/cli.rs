//! CLI argument definitions for `survey-etl`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use survey_cli::config::ConfigOverrides;

#[derive(Parser)]
#[command(
    name = "survey-etl",
    version,
    about = "Load survey poll waves into versioned storage",
    long_about = "Fetch a poll's metadata and results, infer a typed schema, validate \
                  every response and append the wave to the survey's history.\n\n\
                  A run whose schema differs from the stored one aborts with a drift \
                  report (exit code 2) and writes nothing."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow respondent values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// TOML configuration file; environment and flags override it.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch, validate and load one poll wave.
    Run(WaveArgs),

    /// Dry run: report what `run` would do without writing.
    Check(WaveArgs),

    /// Print the schema inferred for a poll.
    Schema(WaveArgs),

    /// List committed waves for a survey.
    History(SurveyArgs),

    /// Print committed rows as a table.
    Show(ShowArgs),
}

#[derive(Args, Clone, Default)]
pub struct WaveArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    /// Poll instance to fetch.
    #[arg(long = "poll-id", value_name = "ID")]
    pub poll_id: Option<u64>,

    /// Directory holding exported polls as `<poll_id>/questions.json` and
    /// `<poll_id>/results.csv`.
    #[arg(long = "source-dir", value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Preferred language for question and label text.
    #[arg(long = "language", value_name = "CODE")]
    pub language: Option<String>,

    /// JSON table of variable name suggestions.
    #[arg(long = "suggestions", value_name = "PATH")]
    pub suggestions: Option<PathBuf>,

    /// Commit attempts when another run commits concurrently.
    #[arg(long = "commit-attempts", value_name = "N")]
    pub commit_attempts: Option<u32>,
}

#[derive(Args, Clone, Default)]
pub struct SurveyArgs {
    /// Stable survey identity shared by all of its waves.
    #[arg(long = "survey-id", value_name = "ID")]
    pub survey_id: Option<String>,

    /// Root directory of the versioned store.
    #[arg(long = "store-dir", value_name = "DIR")]
    pub store_dir: Option<PathBuf>,
}

#[derive(Args, Clone, Default)]
pub struct ShowArgs {
    #[command(flatten)]
    pub survey: SurveyArgs,

    /// Only rows committed with this load counter.
    #[arg(long = "load-counter", value_name = "N")]
    pub load_counter: Option<u64>,

    /// Maximum number of rows to print.
    #[arg(long = "limit", value_name = "N", default_value_t = 20)]
    pub limit: usize,
}

impl SurveyArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            survey_id: self.survey_id.clone(),
            store_dir: self.store_dir.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl WaveArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            poll_id: self.poll_id,
            language: self.language.clone(),
            source_dir: self.source_dir.clone(),
            suggestions: self.suggestions.clone(),
            commit_attempts: self.commit_attempts,
            ..self.survey.overrides()
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
